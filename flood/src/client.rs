use std::{
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use serde::Serialize;

use super::{
    control::{Command, Error, PORT},
    pool::Pool,
    pump::Direction,
};

/// Outcome of one client run. `elapsed` is the measured interval between
/// receiving START and deciding to stop, not the configured duration.
#[derive(Debug, Serialize)]
pub struct Report {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Report {
    pub fn gigabytes(&self) -> f64 {
        self.bytes as f64 / 1e9
    }

    pub fn gigabits_per_sec(&self) -> f64 {
        self.bytes as f64 * 8.0 / self.elapsed.as_secs_f64() / 1e9
    }
}

const TICK: Duration = Duration::from_secs(1);

/// Resolves the server name and drives one timed run against it.
pub fn run(server: &str, streams: u8, duration: Duration) -> anyhow::Result<Report> {
    let addr = (server, PORT)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {server}"))?
        .next()
        .with_context(|| format!("no address for {server}"))?;
    session(addr, streams, duration)
}

/// One full run against `addr`: INIT, stream fan-out, START, timed window,
/// teardown, END.
pub fn session(addr: SocketAddr, streams: u8, duration: Duration) -> anyhow::Result<Report> {
    let mut control = TcpStream::connect(addr).context("cannot connect control channel")?;
    Command::Init { streams }.write_to(&mut control)?;
    log::info!("opening {streams} streams");

    let mut pool = Pool::default();
    for _ in 0..streams {
        let stream = match TcpStream::connect(addr) {
            Ok(v) => v,
            Err(err) => {
                pool.stop_and_join();
                return Err(err).context("cannot connect data stream");
            }
        };
        if let Ok(local) = stream.local_addr() {
            log::info!("data connection {local} -> {addr}");
        }
        pool.spawn(stream, Direction::Send);
    }

    // senders are already pushing zeros, START only gates the timing window
    match Command::read_from(&mut control) {
        Ok(Command::Start) => (),
        Ok(actual) => {
            pool.stop_and_join();
            return Err(Error::Unexpected {
                expected: "start",
                actual,
            }
            .into());
        }
        Err(err) => {
            pool.stop_and_join();
            return Err(err.into());
        }
    }
    log::info!("all streams established, test will run for {duration:?}");

    let start = Instant::now();
    let mut elapsed = start.elapsed();
    while elapsed < duration {
        log::info!("running...");
        thread::sleep(TICK.min(duration - elapsed));
        elapsed = start.elapsed();
    }

    log::info!("shutting down all senders");
    let bytes = pool.stop_and_join();
    Command::End.write_to(&mut control)?;

    Ok(Report { bytes, elapsed })
}
