use std::{
    io::{ErrorKind, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread,
    time::Duration,
};

use crate::{
    client,
    control::{Command, Error},
    server,
};

fn loopback() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("cannot bind loopback listener");
    let addr = listener.local_addr().expect("listener has an address");
    (listener, addr)
}

fn serve_one(listener: TcpListener) -> thread::JoinHandle<Result<u64, Error>> {
    thread::spawn(move || {
        let (control, _) = listener.accept().expect("control accept");
        server::session(&listener, control)
    })
}

#[test]
fn full_session() {
    let (listener, addr) = loopback();
    let server = serve_one(listener);

    let report = client::session(addr, 3, Duration::from_millis(300)).expect("client run");
    let received = server.join().expect("server thread").expect("server session");

    assert_ne!(received, 0);
    assert!(received <= report.bytes, "{received} > {}", report.bytes);
    assert!(report.elapsed >= Duration::from_millis(300));
}

#[test]
fn zero_streams_session() {
    let (listener, addr) = loopback();
    let server = serve_one(listener);

    let report = client::session(addr, 0, Duration::from_millis(50)).expect("client run");
    let received = server.join().expect("server thread").expect("server session");

    assert_eq!(report.bytes, 0);
    assert_eq!(received, 0);
}

#[test]
fn malformed_init_rejected_next_session_served() {
    let (listener, addr) = loopback();
    let server = thread::spawn(move || {
        let (control, _) = listener.accept().expect("control accept");
        let first = server::session(&listener, control);
        let (control, _) = listener.accept().expect("control accept");
        let second = server::session(&listener, control);
        (first, second)
    });

    let mut bad = TcpStream::connect(addr).expect("connect bad control");
    bad.write_all(&[0x77]).expect("send garbage");

    // the server must drop the bad session before it can serve the good one
    let mut buf = [0];
    assert_eq!(bad.read(&mut buf).expect("server closes bad control"), 0);

    let report = client::session(addr, 1, Duration::from_millis(100)).expect("client run");
    let (first, second) = server.join().expect("server thread");

    assert!(matches!(first, Err(Error::UnknownTag(0x77))));
    let second = second.expect("second session");
    assert_ne!(second, 0);
    assert!(second <= report.bytes);
}

#[test]
fn start_sent_only_after_all_streams_accepted() {
    let (listener, addr) = loopback();
    let server = serve_one(listener);

    let mut control = TcpStream::connect(addr).expect("connect control");
    Command::Init { streams: 2 }
        .write_to(&mut control)
        .expect("send init");

    // with the second stream stalled the server sits in accept
    let first = TcpStream::connect(addr).expect("connect first stream");
    control
        .set_read_timeout(Some(Duration::from_millis(200)))
        .expect("set timeout");
    let mut buf = [0];
    let timed_out = control.read(&mut buf).expect_err("start must not arrive yet");
    assert!(matches!(
        timed_out.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut
    ));

    let second = TcpStream::connect(addr).expect("connect second stream");
    control.set_read_timeout(None).expect("clear timeout");
    assert!(matches!(
        Command::read_from(&mut control),
        Ok(Command::Start)
    ));

    drop(first);
    drop(second);
    Command::End.write_to(&mut control).expect("send end");
    let received = server.join().expect("server thread").expect("server session");
    assert_eq!(received, 0);
}

#[test]
fn client_aborts_on_unexpected_command() {
    let (listener, addr) = loopback();
    let fake = thread::spawn(move || {
        let (mut control, _) = listener.accept().expect("control accept");
        let init = Command::read_from(&mut control).expect("read init");
        assert_eq!(init, Command::Init { streams: 1 });
        let (data, _) = listener.accept().expect("data accept");
        Command::End.write_to(&mut control).expect("send end instead of start");
        drop(data);
        control
    });

    let err = client::session(addr, 1, Duration::from_secs(1)).expect_err("protocol violation");
    let err = err.downcast::<Error>().expect("protocol error");
    assert!(matches!(
        err,
        Error::Unexpected {
            expected: "start",
            actual: Command::End,
        }
    ));
    drop(fake.join().expect("fake server"));
}
