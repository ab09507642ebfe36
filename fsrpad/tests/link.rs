//! Link tests against real loopback TCP listeners.

use crossbeam::channel::Receiver;
use fsrpad::history::History;
use fsrpad::link::{Link, LinkEvent, LinkState};
use fsrpad::panel::{Panel, PanelFrame, Surface};
use fsrpad::proto::{Inbound, Outbound};
use fsrpad::thresholds::Thresholds;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

static RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn command(value: u16) -> Outbound {
    Outbound::UpdateThreshold {
        thresholds: vec![value],
        index: 0,
    }
}

fn read_frames(stream: TcpStream, count: usize) -> Vec<Outbound> {
    stream.set_read_timeout(Some(RECV_TIMEOUT)).unwrap();
    let mut reader = BufReader::new(stream);
    let mut frames = Vec::new();
    for _ in 0..count {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        frames.push(Outbound::parse(line.trim_end().as_bytes()).unwrap());
    }
    frames
}

fn next_frame(events: &Receiver<LinkEvent>) -> Inbound {
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("timed out waiting for a frame");
        match events.recv_timeout(remaining).unwrap() {
            LinkEvent::Frame(frame) => return frame,
            _ => continue,
        }
    }
}

#[test]
fn queued_commands_flush_in_order_exactly_once() {
    // learn a free port, then leave it unbound so the first attempt fails
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let (events_tx, _events) = Link::event_channel();
    let mut link = Link::new(&format!("127.0.0.1:{}", port), events_tx).unwrap();
    for value in [100, 200, 300] {
        link.emit(command(value));
    }

    // now stand the backend up; the retry finds it
    let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
    let (stream, _) = listener.accept().unwrap();
    let probe = stream.try_clone().unwrap();
    let frames = read_frames(stream, 3);
    assert_eq!(frames, vec![command(100), command(200), command(300)]);

    // nothing is delivered twice
    probe
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    let mut reader = BufReader::new(probe);
    let mut extra = String::new();
    assert!(reader.read_line(&mut extra).is_err());
    assert!(extra.is_empty());
    link.shutdown();
}

#[test]
fn commands_sent_while_open_arrive_immediately() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = Link::event_channel();
    let mut link = Link::new(&addr.to_string(), events_tx).unwrap();
    let (stream, _) = listener.accept().unwrap();

    assert_eq!(events.recv_timeout(RECV_TIMEOUT).unwrap(), LinkEvent::Up);
    assert_eq!(link.state(), LinkState::Open);
    link.emit(command(42));
    assert_eq!(read_frames(stream, 1), vec![command(42)]);
    link.shutdown();
}

#[test]
fn reconnect_happens_once_after_the_fixed_delay() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = Link::event_channel();
    let mut link = Link::new(&addr.to_string(), events_tx).unwrap();

    let (first, _) = listener.accept().unwrap();
    assert_eq!(events.recv_timeout(RECV_TIMEOUT).unwrap(), LinkEvent::Up);
    let dropped_at = Instant::now();
    drop(first);
    assert_eq!(events.recv_timeout(RECV_TIMEOUT).unwrap(), LinkEvent::Down);

    // exactly one reconnect, and not before the full delay
    let (_second, _) = listener.accept().unwrap();
    let elapsed = dropped_at.elapsed();
    assert!(elapsed >= Duration::from_millis(950), "reconnected after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "reconnected after {:?}", elapsed);

    listener.set_nonblocking(true).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(listener.accept().is_err());
    link.shutdown();
}

#[test]
fn shutdown_cancels_a_pending_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = Link::event_channel();
    let mut link = Link::new(&addr.to_string(), events_tx).unwrap();

    let (first, _) = listener.accept().unwrap();
    assert_eq!(events.recv_timeout(RECV_TIMEOUT).unwrap(), LinkEvent::Up);
    drop(first);
    assert_eq!(events.recv_timeout(RECV_TIMEOUT).unwrap(), LinkEvent::Down);

    // shut down inside the reconnect window
    link.shutdown();
    listener.set_nonblocking(true).unwrap();
    std::thread::sleep(Duration::from_millis(1500));
    assert!(listener.accept().is_err());
    assert_eq!(link.state(), LinkState::Closed);
}

#[test]
fn inbound_frames_dispatch_in_order_and_junk_is_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = Link::event_channel();
    let mut link = Link::new(&addr.to_string(), events_tx).unwrap();
    let (mut stream, _) = listener.accept().unwrap();

    stream
        .write_all(
            b"[\"values\", {\"values\": [512, 300]}]\n\
              this is not json\n\
              [\"profiles\", {\"names\": []}]\n\
              [\"thresholds\", {\"thresholds\": [400, 600]}]\n",
        )
        .unwrap();

    match next_frame(&events) {
        Inbound::Values(payload) => assert_eq!(payload.values, vec![512, 300]),
        other => panic!("unexpected frame: {:?}", other),
    }
    // the junk lines never surface; the next frame is the threshold sync
    match next_frame(&events) {
        Inbound::Thresholds(payload) => assert_eq!(payload.thresholds, vec![400, 600]),
        other => panic!("unexpected frame: {:?}", other),
    }
    link.shutdown();
}

struct CapturedSurface {
    height: u16,
    frames: Vec<PanelFrame>,
}

impl Surface for CapturedSurface {
    fn height(&self) -> u16 {
        self.height
    }
    fn paint(&mut self, frame: &PanelFrame) {
        self.frames.push(frame.clone());
    }
}

#[test]
fn dashboard_state_tracks_the_wire() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = Link::event_channel();
    let mut link = Link::new(&addr.to_string(), events_tx).unwrap();
    let (mut stream, _) = listener.accept().unwrap();

    stream
        .write_all(
            b"[\"thresholds\", {\"thresholds\": [400, 600]}]\n\
              [\"values\", {\"values\": [512, 300]}]\n",
        )
        .unwrap();

    let mut history = History::new(1000);
    let mut thresholds = Thresholds::new();
    for _ in 0..2 {
        match next_frame(&events) {
            Inbound::Values(payload) => history.push(payload.values),
            Inbound::Thresholds(payload) => thresholds.set_all(payload.thresholds),
        }
    }

    let mut surface = CapturedSurface {
        height: 100,
        frames: Vec::new(),
    };
    let now = Instant::now();
    assert!(Panel::new(0).render(now, &history, &thresholds, &mut surface));
    assert!(Panel::new(1).render(now, &history, &thresholds, &mut surface));
    assert!(surface.frames[0].above, "512 >= 400 renders as above");
    assert!(!surface.frames[1].above, "300 < 600 renders as below");

    // drag channel 0 to a quarter of the way down and release
    let mut panel = Panel::new(0);
    panel.press(25.0, 100, &mut thresholds);
    let cmd = panel.release(&thresholds).unwrap();
    assert_eq!(
        cmd,
        Outbound::UpdateThreshold {
            thresholds: vec![767, 600],
            index: 0
        }
    );
    link.emit(cmd);
    assert_eq!(
        read_frames(stream, 1),
        vec![Outbound::UpdateThreshold {
            thresholds: vec![767, 600],
            index: 0
        }]
    );
    link.shutdown();
}
