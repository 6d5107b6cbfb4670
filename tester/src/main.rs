use std::{net::TcpListener, thread, time::Duration};

use flood::{client, server};

const STREAMS: u8 = 8;
const DURATION: Duration = Duration::from_secs(2);

/// Runs one full benchmark session over loopback inside this process.
fn main() {
    env_logger::Builder::new()
        .filter(None, log::LevelFilter::Info)
        .init();

    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("cannot bind loopback listener");
    let addr = listener.local_addr().expect("listener has an address");

    let server_thread = thread::spawn(move || {
        let (control, _) = listener.accept().expect("control accept");
        server::session(&listener, control)
    });

    let report = client::session(addr, STREAMS, DURATION).expect("client run");
    let received = server_thread
        .join()
        .expect("server thread")
        .expect("server session");

    log::info!("sent {} bytes, received {} bytes", report.bytes, received);
    log::info!("{:.3} Gbps over loopback", report.gigabits_per_sec());

    assert_ne!(received, 0);
    assert!(received <= report.bytes);
    log::info!("test is passed");
}
