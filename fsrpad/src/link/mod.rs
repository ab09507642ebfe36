//! Resilient duplex link to the pad backend.
//!
//! A `Link` owns a worker thread that drives a nonblocking TCP socket
//! through a MIO poll loop, bridged to the application with crossbeam
//! channels and a waker. Commands queue FIFO in the worker and the queue
//! survives reconnect cycles, so `emit` never blocks and never loses a
//! message to a dead socket: whatever could not be sent goes out, in
//! order, on the next open connection. A lost connection schedules
//! exactly one reconnect attempt after a fixed delay; dropping the `Link`
//! (or calling `shutdown`) closes deliberately and cancels it.

mod framing;
mod tcp;

use crate::proto::{self, Inbound, Outbound};
use crossbeam::channel;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Fixed delay between losing a connection and the reconnect attempt.
pub static RECONNECT_DELAY: Duration = Duration::from_millis(1000);

static FSR_DEFAULT_PORT: u16 = 7878;

/// Backend address used when none is given.
pub fn default_endpoint() -> String {
    format!("localhost:{}", FSR_DEFAULT_PORT)
}

#[derive(Debug)]
pub enum RecvError {
    NotReady,
    Disconnected,
    Protocol(proto::Error),
    IO(io::Error),
}

#[derive(Debug)]
pub enum SendError {
    MustDrain,
    Full,
    IO(io::Error),
}

/// Connection lifecycle. A non-deliberate `Closed` re-enters
/// `Connecting` after `RECONNECT_DELAY`; after a deliberate shutdown
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum LinkState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    #[num_enum(default)]
    Closed = 3,
}

/// What the link delivers to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The connection opened and queued commands were flushed.
    Up,
    /// An open connection was lost.
    Down,
    /// A well-formed frame arrived.
    Frame(Inbound),
}

pub struct Link {
    commands: Option<channel::Sender<Outbound>>,
    waker: mio::Waker,
    state: Arc<AtomicU8>,
}

impl Link {
    /// Returns a channel pair suitable for `Link::new`.
    pub fn event_channel() -> (channel::Sender<LinkEvent>, channel::Receiver<LinkEvent>) {
        channel::unbounded()
    }

    /// Resolves `addr` (port defaults to 7878) and spawns the worker.
    /// Returns immediately; connecting happens on the worker.
    pub fn new(addr: &str, events: channel::Sender<LinkEvent>) -> Result<Link, io::Error> {
        let address = resolve(addr)?;
        let poll = mio::Poll::new()?;
        let waker = mio::Waker::new(poll.registry(), mio::Token(0))?;
        let (commands_tx, commands_rx) = channel::unbounded();
        let state = Arc::new(AtomicU8::new(u8::from(LinkState::Connecting)));
        let shared = state.clone();
        thread::spawn(move || {
            Worker::new(address, poll, commands_rx, events, shared).run();
        });
        Ok(Link {
            commands: Some(commands_tx),
            waker: waker,
            state: state,
        })
    }

    /// Queues a command for transmission. Never blocks and never fails:
    /// with the socket down the command waits in the queue for the next
    /// open connection. After shutdown this is a no-op.
    pub fn emit(&self, msg: Outbound) {
        if let Some(commands) = &self.commands {
            if commands.send(msg).is_ok() {
                self.waker.wake().expect("wake failed");
            }
        }
    }

    pub fn state(&self) -> LinkState {
        LinkState::from(self.state.load(Ordering::Relaxed))
    }

    /// Deliberate close. Cancels any pending reconnect and terminates the
    /// worker; no further connection attempts happen.
    pub fn shutdown(&mut self) {
        if let Some(commands) = self.commands.take() {
            drop(commands);
            self.waker.wake().expect("wake failed");
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn resolve(addr: &str) -> Result<SocketAddr, io::Error> {
    let addrs = match addr.to_socket_addrs() {
        Ok(iter) => iter,
        Err(err) => match (addr, FSR_DEFAULT_PORT).to_socket_addrs() {
            Ok(iter) => iter,
            Err(_) => return Err(err),
        },
    };
    addrs.into_iter().next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no address for endpoint")
    })
}

/// Outcome of one connection (or of the reconnect wait).
enum Flow {
    Reconnect,
    Shutdown,
}

enum Drained {
    Alive,
    Shutdown,
}

struct Worker {
    address: SocketAddr,
    poll: mio::Poll,
    mio_events: mio::Events,
    commands: channel::Receiver<Outbound>,
    events: channel::Sender<LinkEvent>,
    /// Outbound FIFO. Lives here rather than with the socket so it
    /// carries over from one connection to the next.
    queue: VecDeque<Outbound>,
    state: Arc<AtomicU8>,
}

impl Worker {
    fn new(
        address: SocketAddr,
        poll: mio::Poll,
        commands: channel::Receiver<Outbound>,
        events: channel::Sender<LinkEvent>,
        state: Arc<AtomicU8>,
    ) -> Worker {
        Worker {
            address: address,
            poll: poll,
            mio_events: mio::Events::with_capacity(4),
            commands: commands,
            events: events,
            queue: VecDeque::new(),
            state: state,
        }
    }

    fn set_state(&self, state: LinkState) {
        self.state.store(u8::from(state), Ordering::Relaxed);
    }

    fn run(&mut self) {
        loop {
            if let Flow::Shutdown = self.run_connection() {
                break;
            }
            self.set_state(LinkState::Closed);
            if let Flow::Shutdown = self.wait_reconnect() {
                break;
            }
        }
        self.set_state(LinkState::Closed);
    }

    /// One connection attempt, from nonblocking connect to teardown.
    fn run_connection(&mut self) -> Flow {
        self.set_state(LinkState::Connecting);
        let mut port = match tcp::Port::connect(&self.address) {
            Ok(port) => port,
            Err(e) => {
                log::debug!("connect to {} failed: {}", self.address, e);
                return Flow::Reconnect;
            }
        };
        if let Err(e) = self.poll.registry().register(
            &mut port,
            mio::Token(1),
            mio::Interest::READABLE | mio::Interest::WRITABLE,
        ) {
            log::debug!("socket registration failed: {}", e);
            return Flow::Reconnect;
        }
        let flow = self.connection_io(&mut port);
        let _ = self.poll.registry().deregister(&mut port);
        flow
    }

    fn connection_io(&mut self, port: &mut tcp::Port) -> Flow {
        let mut open = false;
        loop {
            if let Err(e) = self.poll.poll(&mut self.mio_events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                log::debug!("poll failed: {}", e);
                return self.lost(open);
            }
            let mut wake = false;
            let mut readable = false;
            let mut writable = false;
            for event in self.mio_events.iter() {
                match event.token() {
                    mio::Token(0) => wake = true,
                    _ => {
                        readable = readable || event.is_readable();
                        writable = writable || event.is_writable();
                    }
                }
            }
            if wake {
                if let Drained::Shutdown = self.drain_commands() {
                    self.set_state(LinkState::Closing);
                    return Flow::Shutdown;
                }
            }
            // a failed connect can surface as readable/hup without writable
            if (writable || readable) && !open {
                match port.connected() {
                    Ok(true) => {
                        open = true;
                        self.set_state(LinkState::Open);
                        log::info!("link to {} up", self.address);
                        if self.events.send(LinkEvent::Up).is_err() {
                            return Flow::Shutdown;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        log::debug!("connect to {} failed: {}", self.address, e);
                        return Flow::Reconnect;
                    }
                }
            }
            if open {
                if port.has_data_to_drain() {
                    match port.drain() {
                        Ok(()) | Err(SendError::MustDrain) => {}
                        Err(e) => {
                            log::debug!("drain failed: {:?}", e);
                            return self.lost(open);
                        }
                    }
                }
                if !port.has_data_to_drain() && self.flush(port).is_err() {
                    return self.lost(open);
                }
                if readable {
                    if let Err(flow) = self.read_frames(port) {
                        return match flow {
                            Flow::Shutdown => Flow::Shutdown,
                            Flow::Reconnect => self.lost(open),
                        };
                    }
                }
            }
        }
    }

    /// Sends queued commands in order until the queue empties or the
    /// socket backs up. A command is popped only once bytes of it are
    /// with the socket (fully written, or partially written and parked
    /// for drain); a command the socket refused outright stays at the
    /// front of the queue. Each command goes out at most once.
    fn flush(&mut self, port: &mut tcp::Port) -> Result<(), ()> {
        while let Some(msg) = self.queue.front() {
            match port.send(msg) {
                Ok(()) => {
                    self.queue.pop_front();
                }
                Err(SendError::MustDrain) => {
                    self.queue.pop_front();
                    break;
                }
                Err(SendError::Full) => break,
                Err(SendError::IO(e)) => {
                    log::debug!("send failed: {}", e);
                    return Err(());
                }
            }
        }
        Ok(())
    }

    fn read_frames(&mut self, port: &mut tcp::Port) -> Result<(), Flow> {
        loop {
            match port.recv() {
                Ok(frame) => {
                    if self.events.send(LinkEvent::Frame(frame)).is_err() {
                        return Err(Flow::Shutdown);
                    }
                }
                Err(RecvError::NotReady) => return Ok(()),
                Err(RecvError::Protocol(e)) => {
                    log::debug!("dropping bad frame: {:?}", e);
                }
                Err(RecvError::Disconnected) => {
                    log::debug!("backend closed the connection");
                    return Err(Flow::Reconnect);
                }
                Err(RecvError::IO(e)) => {
                    log::debug!("receive failed: {}", e);
                    return Err(Flow::Reconnect);
                }
            }
        }
    }

    fn drain_commands(&mut self) -> Drained {
        loop {
            match self.commands.try_recv() {
                Ok(msg) => self.queue.push_back(msg),
                Err(channel::TryRecvError::Empty) => return Drained::Alive,
                Err(channel::TryRecvError::Disconnected) => return Drained::Shutdown,
            }
        }
    }

    /// Sits out the reconnect delay. This is the only place the worker
    /// waits between connections, so at most one reconnect can ever be
    /// pending. Commands arriving meanwhile just queue up; shutdown
    /// cancels the reconnect.
    fn wait_reconnect(&mut self) -> Flow {
        let deadline = Instant::now() + RECONNECT_DELAY;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Flow::Reconnect;
            }
            if let Err(e) = self.poll.poll(&mut self.mio_events, Some(deadline - now)) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::debug!("poll failed: {}", e);
                }
                continue;
            }
            if let Drained::Shutdown = self.drain_commands() {
                self.set_state(LinkState::Closing);
                return Flow::Shutdown;
            }
        }
    }

    fn lost(&mut self, open: bool) -> Flow {
        if open {
            log::info!("link to {} down", self.address);
            if self.events.send(LinkEvent::Down).is_err() {
                return Flow::Shutdown;
            }
        }
        Flow::Reconnect
    }
}
