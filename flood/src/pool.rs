use std::{
    net::TcpStream,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use super::pump::{self, Direction};

/// All pumps of one test run, with the shared stop flag and byte counter.
/// One instance per session, so sequential sessions cannot interfere.
#[derive(Default)]
pub struct Pool {
    stop: Arc<AtomicBool>,
    total: Arc<AtomicU64>,
    pumps: Vec<thread::JoinHandle<()>>,
}

impl Pool {
    /// Starts one pump over `stream`. Returns immediately.
    pub fn spawn(&mut self, stream: TcpStream, direction: Direction) {
        let stop = self.stop.clone();
        let total = self.total.clone();
        let handle = thread::spawn(move || pump::run(stream, direction, &stop, &total));
        self.pumps.push(handle);
    }

    /// Raises the stop flag, waits for every pump and yields the final byte
    /// count. Consumes the pool, there is no partial cancellation.
    pub fn stop_and_join(self) -> u64 {
        self.stop.store(true, Ordering::SeqCst);
        for pump in self.pumps {
            if pump.join().is_err() {
                log::error!("pump thread panic, this is a bug, must not happen");
            }
        }
        self.total.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[test]
fn empty_pool_test() {
    assert_eq!(Pool::default().stop_and_join(), 0);
}

#[cfg(test)]
#[test]
fn aggregate_is_exact_sum_test() {
    use std::{
        io::Write,
        net::{TcpListener, TcpStream},
        time::Duration,
    };

    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let addr = listener.local_addr().unwrap();

    // one peer disconnects without sending anything, the rest send
    // different amounts, one of them more than a whole pump buffer
    let sizes = [0usize, 0x1000, 0x2345, 0x100001];
    let expected = sizes.iter().map(|size| *size as u64).sum::<u64>();
    let writers = sizes.map(|size| {
        thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(&vec![0x11; size]).unwrap();
        })
    });

    let mut pool = Pool::default();
    for _ in 0..sizes.len() {
        let (stream, _) = listener.accept().unwrap();
        pool.spawn(stream, Direction::Receive);
    }
    for writer in writers {
        writer.join().unwrap();
    }

    // pumps contribute only at exit, equality means every receiver saw eof
    for _ in 0..500 {
        if pool.total.load(Ordering::SeqCst) == expected {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(pool.stop_and_join(), expected);
}
