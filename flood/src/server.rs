use std::net::{Ipv4Addr, TcpListener, TcpStream};

use anyhow::Context;

use super::{
    control::{Command, Error},
    pool::Pool,
    pump::Direction,
};

/// Binds the well-known port and serves benchmark sessions until the
/// process is killed. Only the bind is fatal, a failed session is logged
/// and the next one is accepted.
pub fn run(port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .with_context(|| format!("cannot listen on port {port}"))?;
    log::info!("listening at {}", listener.local_addr()?);

    loop {
        let (control, addr) = match listener.accept() {
            Ok(v) => v,
            Err(err) => {
                log::error!("control accept failed: {err}");
                continue;
            }
        };
        log::info!("control connection from {addr}");
        match session(&listener, control) {
            Ok(total) => log::info!("{:.3} GB received", total as f64 / 1e9),
            Err(err) => log::error!("session failed: {err}"),
        }
    }
}

/// One full session on an accepted control connection: INIT, data accepts,
/// START, END, teardown. Connections accepted on `listener` after INIT are
/// the data streams, in order, there is no distinguishing handshake.
pub fn session(listener: &TcpListener, mut control: TcpStream) -> Result<u64, Error> {
    let streams = match Command::read_from(&mut control)? {
        Command::Init { streams } => streams,
        actual => {
            return Err(Error::Unexpected {
                expected: "init",
                actual,
            })
        }
    };
    log::info!("opening {streams} streams");

    let mut pool = Pool::default();
    for _ in 0..streams {
        match listener.accept() {
            Ok((stream, addr)) => {
                log::info!("data connection from {addr}");
                pool.spawn(stream, Direction::Receive);
            }
            Err(err) => {
                pool.stop_and_join();
                return Err(err.into());
            }
        }
    }
    log::info!("all streams established");

    // receivers are already draining, the client owns the timing window
    let result = finish(&mut control);
    let total = pool.stop_and_join();
    result.map(|()| total)
}

fn finish(control: &mut TcpStream) -> Result<(), Error> {
    Command::Start.write_to(control)?;
    match Command::read_from(control)? {
        Command::End => Ok(()),
        actual => Err(Error::Unexpected {
            expected: "end",
            actual,
        }),
    }
}
