//! Framed TCP port to the pad backend.
//!
//! Wraps a nonblocking MIO `TcpStream` and speaks newline-delimited JSON
//! frames over it. The connect is nonblocking, so the port starts out in
//! limbo until the socket reports writable and `connected()` confirms the
//! handshake finished.

use super::framing::{LineBuf, TxBuf};
use super::{RecvError, SendError};
use crate::proto::{Inbound, Outbound};
use mio::net::TcpStream;
use std::io;
use std::io::Write;
use std::net::SocketAddr;

pub struct Port {
    stream: TcpStream,
    /// Incoming buffer, used to reassemble lines.
    rxbuf: LineBuf,
    /// Outgoing buffer, holding the tail of a partially written frame.
    txbuf: TxBuf,
}

impl Port {
    /// Starts a nonblocking connect to `address` and wraps the stream.
    pub fn connect(address: &SocketAddr) -> Result<Port, io::Error> {
        let stream = TcpStream::connect(*address)?;
        Ok(Port {
            stream: stream,
            rxbuf: LineBuf::new(),
            txbuf: TxBuf::new(),
        })
    }

    /// Checks whether the nonblocking connect completed. `Ok(false)`
    /// means the handshake is still in flight; an error means it failed
    /// and the port is dead.
    pub fn connected(&self) -> Result<bool, io::Error> {
        if let Some(err) = self.stream.take_error()? {
            return Err(err);
        }
        match self.stream.peer_addr() {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Receives the next well-formed frame from the socket. Reads until
    /// the socket would block, so it is safe to call repeatedly off a
    /// single readiness event.
    pub fn recv(&mut self) -> Result<Inbound, RecvError> {
        loop {
            if let Some(line) = self.rxbuf.next_line() {
                match Inbound::parse(&line) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => return Err(RecvError::Protocol(e)),
                }
            }
            self.rxbuf.refill(&mut self.stream)?;
        }
    }

    /// Sends one frame. A partial write parks the remainder in the
    /// outgoing buffer and reports `MustDrain`; until it is drained,
    /// further sends report `Full`. When nothing could be written at all
    /// the frame is not taken: the caller keeps it and retries once the
    /// socket reports writable again.
    pub fn send(&mut self, msg: &Outbound) -> Result<(), SendError> {
        if self.has_data_to_drain() {
            return Err(SendError::Full);
        }
        let raw = msg.serialize();
        match self.stream.write(&raw) {
            Ok(size) => {
                if size == raw.len() {
                    Ok(())
                } else {
                    self.txbuf.add_data(&raw[size..]);
                    Err(SendError::MustDrain)
                }
            }
            Err(err) => {
                match err.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::NotConnected => {
                        // Right after the nonblocking connect, or with the
                        // TCP buffer completely full. No bytes went out,
                        // so the frame stays with the caller.
                        Err(SendError::Full)
                    }
                    _ => Err(SendError::IO(err)),
                }
            }
        }
    }

    pub fn drain(&mut self) -> Result<(), SendError> {
        self.txbuf.drain(&mut self.stream)
    }

    pub fn has_data_to_drain(&self) -> bool {
        !self.txbuf.empty()
    }
}

impl mio::event::Source for Port {
    fn register(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interests: mio::Interest,
    ) -> io::Result<()> {
        self.stream.register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interests: mio::Interest,
    ) -> io::Result<()> {
        self.stream.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        self.stream.deregister(registry)
    }
}
