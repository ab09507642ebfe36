//! Stand-in pad backend for development and demos.
//!
//! Listens for dashboard connections and behaves like the real thing:
//! sends the full threshold vector on connect, streams reading snapshots
//! at 100 Hz from a clamped random walk, applies `update_threshold`
//! commands and echoes the resulting vector to every client.

use fsrpad::proto::{Inbound, Outbound, ThresholdsPayload, ValuesPayload, FULL_SCALE};

use getopts::Options;
use rand::Rng;
use std::env;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

static SIM_DEFAULT_PORT: u16 = 7878;
static DEFAULT_CHANNELS: usize = 4;
/// 100 Hz snapshot rate.
static POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Backend {
    thresholds: Mutex<Vec<u16>>,
    clients: Mutex<Vec<TcpStream>>,
}

impl Backend {
    fn new(channels: usize) -> Backend {
        Backend {
            thresholds: Mutex::new(vec![FULL_SCALE / 2; channels]),
            clients: Mutex::new(Vec::new()),
        }
    }

    fn thresholds_frame(&self) -> Vec<u8> {
        let thresholds = self.thresholds.lock().unwrap().clone();
        Inbound::Thresholds(ThresholdsPayload {
            thresholds: thresholds,
        })
        .serialize()
    }

    /// Applies the edited index from a client's vector. Only that slot is
    /// authoritative; the rest of the client's vector is ignored.
    fn apply_update(&self, thresholds: &[u16], index: usize) {
        let mut current = self.thresholds.lock().unwrap();
        if let (Some(slot), Some(value)) = (current.get_mut(index), thresholds.get(index)) {
            *slot = (*value).min(FULL_SCALE);
        }
    }

    fn has_clients(&self) -> bool {
        !self.clients.lock().unwrap().is_empty()
    }

    /// Writes a frame to every client, dropping the ones that went away.
    fn broadcast(&self, raw: &[u8]) {
        let mut clients = self.clients.lock().unwrap();
        clients.retain_mut(|client| client.write_all(raw).is_ok());
    }
}

fn serve_client(backend: Arc<Backend>, stream: TcpStream) {
    let peer = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => return,
    };
    let reader = match stream.try_clone() {
        Ok(clone) => clone,
        Err(_) => return,
    };
    log::info!("client {} connected", peer);
    {
        let mut stream = stream;
        if stream.write_all(&backend.thresholds_frame()).is_err() {
            return;
        }
        backend.clients.lock().unwrap().push(stream);
    }

    for line in BufReader::new(reader).lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        match Outbound::parse(line.as_bytes()) {
            Ok(Outbound::UpdateThreshold { thresholds, index }) => {
                backend.apply_update(&thresholds, index);
                let frame = backend.thresholds_frame();
                backend.broadcast(&frame);
            }
            Err(e) => log::debug!("client {}: dropping bad frame: {:?}", peer, e),
        }
    }
    log::info!("client {} disconnected", peer);
}

/// Random walk over the channel values, one step per poll interval.
/// Higher channels get a wider step so the panels do not move in lockstep.
fn run_values(backend: Arc<Backend>, channels: usize) {
    let mut rng = rand::thread_rng();
    let mut values: Vec<u16> = vec![0; channels];
    loop {
        thread::sleep(POLL_INTERVAL);
        for (i, value) in values.iter_mut().enumerate() {
            let spread = (i as i64 + 1) * 3;
            let step = rng.gen_range(-spread..=spread);
            *value = (*value as i64 + step).clamp(0, FULL_SCALE as i64) as u16;
        }
        if !backend.has_clients() {
            continue;
        }
        let frame = Inbound::Values(ValuesPayload {
            values: values.clone(),
        })
        .serialize();
        backend.broadcast(&frame);
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let mut opts = Options::new();
    opts.optopt(
        "p",
        "",
        &format!("port to listen on (default {})", SIM_DEFAULT_PORT),
        "port",
    );
    opts.optopt(
        "n",
        "",
        &format!("number of channels (default {})", DEFAULT_CHANNELS),
        "channels",
    );
    opts.optflag("h", "help", "print this help menu");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            panic!("{}", f.to_string())
        }
    };
    if matches.opt_present("h") {
        print!("{}", opts.usage(&format!("Usage: {} [options]", args[0])));
        return Ok(());
    }
    let port: u16 = match matches.opt_str("p") {
        Some(p) => p.parse().expect("invalid port"),
        None => SIM_DEFAULT_PORT,
    };
    let channels: usize = match matches.opt_str("n") {
        Some(n) => n.parse().expect("invalid channel count"),
        None => DEFAULT_CHANNELS,
    };

    let backend = Arc::new(Backend::new(channels));
    let walker = backend.clone();
    thread::spawn(move || run_values(walker, channels));

    let listener = TcpListener::bind(("0.0.0.0", port))?;
    log::info!("listening on port {}, {} channels", port, channels);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let backend = backend.clone();
                thread::spawn(move || serve_client(backend, stream));
            }
            Err(e) => log::debug!("accept failed: {}", e),
        }
    }
    Ok(())
}
