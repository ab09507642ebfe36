//! Internal buffers for the line-framed stream socket.

use super::{RecvError, SendError};
use std::io;

/// Size of the receive buffer, and therefore the longest frame accepted.
const LINEBUF_SIZE: usize = 65536;

/// Receive-side buffer. Valid data (possibly none) lives in a slice
/// delimited by `start` and `end`; complete lines are split off the
/// front as they arrive.
pub struct LineBuf {
    buf: Vec<u8>,
    /// Start offset of valid data in `buf`.
    start: usize,
    /// End offset of valid data in `buf`.
    end: usize,
}

impl LineBuf {
    pub fn new() -> LineBuf {
        LineBuf {
            buf: vec![0; LINEBUF_SIZE],
            start: 0,
            end: 0,
        }
    }

    fn size(&self) -> usize {
        self.end - self.start
    }

    /// Moves the data internally to the start of the buffer.
    fn compact(&mut self) {
        if self.start != 0 {
            let len = self.size();
            self.buf.copy_within(self.start..self.end, 0);
            self.start = 0;
            self.end = len;
        }
    }

    /// Refills the buffer as much as possible from an object implementing
    /// `io::Read`.
    pub fn refill<T: io::Read>(&mut self, reader: &mut T) -> Result<(), RecvError> {
        self.compact();
        match reader.read(&mut self.buf[self.end..]) {
            Ok(size) => {
                if size > 0 {
                    self.end += size;
                    Ok(())
                } else {
                    Err(RecvError::Disconnected)
                }
            }
            Err(e) => {
                if e.kind() == io::ErrorKind::WouldBlock {
                    Err(RecvError::NotReady)
                } else {
                    Err(RecvError::IO(e))
                }
            }
        }
    }

    /// Splits the next complete line (newline stripped) off the front of
    /// the buffered data. When a line overflows the whole buffer, the
    /// buffered prefix is returned as-is so the parser rejects it; the
    /// tail of that line then fails parsing the same way.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let data = &self.buf[self.start..self.end];
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            let line = data[..pos].to_vec();
            self.start += pos + 1;
            Some(line)
        } else if self.size() == LINEBUF_SIZE {
            let line = data.to_vec();
            self.start = 0;
            self.end = 0;
            Some(line)
        } else {
            None
        }
    }
}

/// Transmit-side buffer holding the unwritten remainder of a frame after
/// a partial send.
pub struct TxBuf {
    pending: Vec<u8>,
}

impl TxBuf {
    pub fn new() -> TxBuf {
        TxBuf {
            pending: Vec::new(),
        }
    }

    pub fn empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stashes frame bytes that could not be written yet.
    pub fn add_data(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Sends as much of the pending data as possible to an object
    /// implementing `io::Write`.
    pub fn drain<T: io::Write>(&mut self, writer: &mut T) -> Result<(), SendError> {
        while !self.pending.is_empty() {
            match writer.write(&self.pending) {
                Ok(size) => {
                    self.pending.drain(..size);
                    if size == 0 {
                        return Err(SendError::MustDrain);
                    }
                }
                Err(e) => {
                    if e.kind() == io::ErrorKind::WouldBlock {
                        return Err(SendError::MustDrain);
                    } else {
                        return Err(SendError::IO(e));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_off_the_front() {
        let mut buf = LineBuf::new();
        let mut input: &[u8] = b"one\ntwo\nthr";
        buf.refill(&mut input).unwrap();
        assert_eq!(buf.next_line().as_deref(), Some(&b"one"[..]));
        assert_eq!(buf.next_line().as_deref(), Some(&b"two"[..]));
        assert_eq!(buf.next_line(), None);
        let mut rest: &[u8] = b"ee\n";
        buf.refill(&mut rest).unwrap();
        assert_eq!(buf.next_line().as_deref(), Some(&b"three"[..]));
    }

    #[test]
    fn refill_maps_stream_end_to_disconnected() {
        let mut buf = LineBuf::new();
        let mut input: &[u8] = b"";
        assert!(matches!(
            buf.refill(&mut input),
            Err(RecvError::Disconnected)
        ));
    }

    #[test]
    fn overflowing_line_is_flushed_for_rejection() {
        let mut buf = LineBuf::new();
        let big = vec![b'x'; LINEBUF_SIZE];
        let mut input: &[u8] = &big;
        buf.refill(&mut input).unwrap();
        let line = buf.next_line().unwrap();
        assert_eq!(line.len(), LINEBUF_SIZE);
        assert_eq!(buf.next_line(), None);
        // the tail of the oversized line comes through as its own bogus line
        let mut tail: &[u8] = b"xxx\n[\"ok\"]\n";
        buf.refill(&mut tail).unwrap();
        assert_eq!(buf.next_line().as_deref(), Some(&b"xxx"[..]));
        assert_eq!(buf.next_line().as_deref(), Some(&b"[\"ok\"]"[..]));
    }

    #[test]
    fn txbuf_drains_across_partial_writes() {
        struct Trickle(Vec<u8>);
        impl io::Write for Trickle {
            fn write(&mut self, data: &[u8]) -> io::Result<usize> {
                let n = data.len().min(2);
                self.0.extend_from_slice(&data[..n]);
                Ok(n)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut tx = TxBuf::new();
        tx.add_data(b"hello\n");
        let mut sink = Trickle(Vec::new());
        tx.drain(&mut sink).unwrap();
        assert!(tx.empty());
        assert_eq!(sink.0, b"hello\n");
    }
}
