use std::{
    io::{Read, Write},
    net::TcpStream,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

/// 1 MiB, transferred whole between iterations of the outer loop.
const CHUNK_LEN: usize = 0x100000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// Moves opaque bytes in one direction over `stream` until `stop` is raised
/// or the peer goes away, then adds the local count to `total` exactly once.
/// The stream is closed on return.
pub fn run(mut stream: TcpStream, direction: Direction, stop: &AtomicBool, total: &AtomicU64) {
    let mut buf = vec![0; CHUNK_LEN];
    let mut moved = 0u64;

    'transfer: while !stop.load(Ordering::SeqCst) {
        // partial transfers advance the cursor, `offset + remainder == CHUNK_LEN`
        let mut offset = 0;
        while offset < CHUNK_LEN {
            let result = match direction {
                Direction::Send => stream.write(&buf[offset..]),
                Direction::Receive => stream.read(&mut buf[offset..]),
            };
            match result {
                Ok(0) => break 'transfer,
                Ok(len) => {
                    offset += len;
                    moved += len as u64;
                }
                Err(err) => {
                    log::debug!("stream closing: {err}");
                    break 'transfer;
                }
            }
            if stop.load(Ordering::SeqCst) {
                break 'transfer;
            }
        }
    }

    total.fetch_add(moved, Ordering::SeqCst);
}

#[cfg(test)]
#[test]
fn receive_until_peer_closes_test() {
    use std::{net::TcpListener, thread};

    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    let writer = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(&[0x11; 0x10000]).unwrap();
        stream.write_all(&[0x22; 0x789]).unwrap();
    });
    let (stream, _) = listener.accept().unwrap();

    let stop = AtomicBool::new(false);
    let total = AtomicU64::new(0);
    run(stream, Direction::Receive, &stop, &total);
    writer.join().unwrap();

    assert_eq!(total.load(Ordering::SeqCst), 0x10000 + 0x789);
}

#[cfg(test)]
#[test]
fn sender_count_matches_wire_test() {
    use std::{net::TcpListener, sync::Arc, thread, time::Duration};

    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let addr = listener.local_addr().unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let total = Arc::new(AtomicU64::new(0));
    let sender = thread::spawn({
        let stop = stop.clone();
        let total = total.clone();
        move || {
            let stream = TcpStream::connect(addr).unwrap();
            run(stream, Direction::Send, &stop, &total);
        }
    });

    let (mut peer, _) = listener.accept().unwrap();
    thread::sleep(Duration::from_millis(50));
    stop.store(true, Ordering::SeqCst);

    // everything the pump counted must be on the wire, no more, no less
    let mut drained = 0u64;
    let mut buf = vec![0; 0x10000];
    loop {
        match peer.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(len) => drained += len as u64,
        }
    }
    sender.join().unwrap();

    assert_ne!(drained, 0);
    assert_eq!(total.load(Ordering::SeqCst), drained);
}
