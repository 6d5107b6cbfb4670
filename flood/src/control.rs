use std::io::{self, Read, Write};

use thiserror::Error;

/// The control connection and every data connection go to this port.
pub const PORT: u16 = 8000;

const INIT: u8 = 0x00;
const START: u8 = 0x01;
const END: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Declares how many data connections will follow.
    Init { streams: u8 },
    /// The server holds all declared data connections and its receivers run.
    Start,
    /// The client has finished sending and joined its senders.
    End,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown command tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("expected {expected} command, got {actual:?}")]
    Unexpected {
        expected: &'static str,
        actual: Command,
    },
}

impl Command {
    pub fn write_to<W>(&self, w: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        match self {
            Command::Init { streams } => w.write_all(&[INIT, *streams]),
            Command::Start => w.write_all(&[START]),
            Command::End => w.write_all(&[END]),
        }
    }

    /// Blocks for the next command. A premature disconnect surfaces as
    /// `Error::Io` with `UnexpectedEof`.
    pub fn read_from<R>(r: &mut R) -> Result<Self, Error>
    where
        R: Read,
    {
        let mut tag = [0];
        r.read_exact(&mut tag)?;
        match tag[0] {
            INIT => {
                let mut streams = [0];
                r.read_exact(&mut streams)?;
                Ok(Command::Init {
                    streams: streams[0],
                })
            }
            START => Ok(Command::Start),
            END => Ok(Command::End),
            tag => Err(Error::UnknownTag(tag)),
        }
    }
}

#[cfg(test)]
#[test]
fn wire_encoding_test() {
    let mut buf = vec![];
    Command::Init { streams: 7 }.write_to(&mut buf).unwrap();
    Command::Start.write_to(&mut buf).unwrap();
    Command::End.write_to(&mut buf).unwrap();
    assert_eq!(buf, [0x00, 7, 0x01, 0x02]);

    let mut cursor = io::Cursor::new(buf);
    assert_eq!(
        Command::read_from(&mut cursor).unwrap(),
        Command::Init { streams: 7 }
    );
    assert_eq!(Command::read_from(&mut cursor).unwrap(), Command::Start);
    assert_eq!(Command::read_from(&mut cursor).unwrap(), Command::End);
}

#[cfg(test)]
#[test]
fn unknown_tag_test() {
    let mut cursor = io::Cursor::new([0x77u8]);
    assert!(matches!(
        Command::read_from(&mut cursor),
        Err(Error::UnknownTag(0x77))
    ));
}

#[cfg(test)]
#[test]
fn truncated_init_test() {
    let mut cursor = io::Cursor::new([INIT]);
    match Command::read_from(&mut cursor) {
        Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
        other => panic!("{other:?}"),
    }
}
