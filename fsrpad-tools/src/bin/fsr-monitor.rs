//! Live terminal dashboard for an FSR pad backend.
//!
//! One vertical panel per channel: background keyed on whether the
//! reading clears the threshold, a level bar in the middle of the band,
//! and a draggable threshold line. The threshold update goes to the
//! backend only when the drag is released; `+`/`-` nudge the selected
//! channel and emit immediately.

use fsrpad::history::{self, History};
use fsrpad::link::{Link, LinkEvent, LinkState};
use fsrpad::panel::{LabelAnchor, Panel, PanelFrame, Surface};
use fsrpad::proto::Inbound;
use fsrpad::thresholds::Thresholds;
use fsrpad_tools::Layout;

use getopts::Options;
use std::io::{stdout, Stdout, Write};
use std::time::{Duration, Instant};
use std::{env, io};

use crossbeam::channel;
use futures::{future::FutureExt, select, StreamExt};
use futures_timer::Delay;

use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEventKind,
    MouseButton, MouseEventKind,
};
use crossterm::{cursor::*, style::*, terminal::*, ExecutableCommand, QueueableCommand};

/// Paints one channel band with crossterm.
struct TermSurface<'a> {
    out: &'a mut Stdout,
    x0: u16,
    width: u16,
    y0: u16,
    height: u16,
    title: String,
}

impl Surface for TermSurface<'_> {
    fn height(&self) -> u16 {
        self.height
    }

    fn paint(&mut self, frame: &PanelFrame) {
        // errors surface on the flush at the end of the draw pass
        let _ = self.paint_band(frame);
    }
}

impl TermSurface<'_> {
    fn paint_band(&mut self, frame: &PanelFrame) -> io::Result<()> {
        let backdrop = if frame.above {
            Color::DarkBlue
        } else {
            Color::DarkGrey
        };
        let bar = if frame.above {
            Color::Red
        } else {
            Color::DarkYellow
        };
        let bar_x = self.width / 4;
        let bar_width = (self.width / 2).max(1);
        let pad_left = " ".repeat(bar_x as usize);
        let pad_bar = " ".repeat(bar_width as usize);
        let pad_right = " "
            .repeat(self.width.saturating_sub(bar_x + bar_width) as usize);

        for row in 0..self.height {
            self.out.queue(MoveTo(self.x0, self.y0 + row))?;
            if row == frame.line_row {
                self.out.queue(SetBackgroundColor(Color::White))?;
                self.out
                    .queue(Print(format!("{}{}{}", pad_left, pad_bar, pad_right)))?;
                continue;
            }
            let in_bar = self.height - row <= frame.bar_rows;
            self.out.queue(SetBackgroundColor(backdrop))?;
            self.out.queue(Print(&pad_left))?;
            self.out
                .queue(SetBackgroundColor(if in_bar { bar } else { backdrop }))?;
            self.out.queue(Print(&pad_bar))?;
            self.out.queue(SetBackgroundColor(backdrop))?;
            self.out.queue(Print(&pad_right))?;
        }

        self.out.queue(SetBackgroundColor(backdrop))?;
        self.out.queue(SetForegroundColor(Color::White))?;
        self.out.queue(MoveTo(self.x0 + 1, self.y0))?;
        self.out.queue(Print(&self.title))?;
        self.out.queue(MoveTo(self.x0 + 1, self.y0 + 1))?;
        self.out.queue(Print(frame.value))?;
        let label_row = match frame.label_anchor {
            LabelAnchor::AboveLine => frame.line_row.saturating_sub(1),
            LabelAnchor::BelowLine => (frame.line_row + 1).min(self.height - 1),
        };
        self.out.queue(MoveTo(self.x0 + 1, self.y0 + label_row))?;
        self.out.queue(Print(frame.threshold))?;
        self.out.queue(ResetColor)?;
        Ok(())
    }
}

fn draw(
    out: &mut Stdout,
    layout: &Layout,
    link: &Link,
    panels: &mut [Panel],
    selected: usize,
    history: &History,
    thresholds: &Thresholds,
) -> io::Result<()> {
    let status = match link.state() {
        LinkState::Open => "online",
        LinkState::Connecting => "connecting",
        LinkState::Closing | LinkState::Closed => "offline",
    };
    out.queue(MoveTo(0, 0))?;
    out.queue(Clear(ClearType::CurrentLine))?;
    out.queue(Print(format!(
        "fsr-monitor   {} channels   [{}]",
        panels.len(),
        status
    )))?;
    out.queue(MoveTo(0, 1))?;
    out.queue(Clear(ClearType::CurrentLine))?;
    out.queue(Print(
        "q quit   left/right select   +/- adjust   drag to set threshold",
    ))?;

    let now = Instant::now();
    for panel in panels.iter_mut() {
        let index = panel.index();
        if !layout.visible(index) {
            continue;
        }
        let (x0, width) = layout.band(index);
        let mut surface = TermSurface {
            out: &mut *out,
            x0: x0,
            width: width,
            y0: layout.panel_top(),
            height: layout.panel_height(),
            title: format!("ch {}{}", index, if index == selected { "*" } else { "" }),
        };
        panel.render(now, history, thresholds, &mut surface);
    }
    out.flush()
}

async fn run_monitor(addr: String) -> io::Result<()> {
    let (events_tx, link_events) = Link::event_channel();
    let mut link = Link::new(&addr, events_tx)?;
    let mut history = History::new(history::DEFAULT_CAPACITY);
    let mut thresholds = Thresholds::new();
    let mut panels: Vec<Panel> = Vec::new();
    let mut selected: usize = 0;
    let (cols, rows) = size()?;
    let mut layout = Layout::new(cols, rows, 0);
    let mut reader = EventStream::new();
    let mut out = stdout();

    'dashboard: loop {
        let mut tick = Delay::new(Duration::from_millis(5)).fuse();
        let mut event = reader.next().fuse();

        select! {
            _ = tick => {
                loop {
                    match link_events.try_recv() {
                        Ok(LinkEvent::Frame(Inbound::Values(payload))) => {
                            history.push(payload.values);
                        }
                        Ok(LinkEvent::Frame(Inbound::Thresholds(payload))) => {
                            thresholds.set_all(payload.thresholds);
                        }
                        Ok(LinkEvent::Up) | Ok(LinkEvent::Down) => {}
                        Err(channel::TryRecvError::Empty) => break,
                        Err(channel::TryRecvError::Disconnected) => break 'dashboard,
                    }
                }
                while panels.len() < history.channels() {
                    panels.push(Panel::new(panels.len()));
                }
                if layout.channels() != panels.len() {
                    layout = Layout::new(layout.cols(), layout.rows(), panels.len());
                    out.execute(Clear(ClearType::All))?;
                }
                draw(&mut out, &layout, &link, &mut panels, selected, &history, &thresholds)?;
            },
            maybe_event = event => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if key.kind != KeyEventKind::Release {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => break 'dashboard,
                            KeyCode::Left => selected = selected.saturating_sub(1),
                            KeyCode::Right => {
                                if selected + 1 < panels.len() {
                                    selected += 1;
                                }
                            }
                            KeyCode::Char('+') | KeyCode::Char('=') => {
                                if let Some(panel) = panels.get(selected) {
                                    if let Some(cmd) = panel.increment(&mut thresholds) {
                                        link.emit(cmd);
                                    }
                                }
                            }
                            KeyCode::Char('-') => {
                                if let Some(panel) = panels.get(selected) {
                                    if let Some(cmd) = panel.decrement(&mut thresholds) {
                                        link.emit(cmd);
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Some(Ok(Event::Mouse(mouse))) => match mouse.kind {
                    MouseEventKind::Down(MouseButton::Left) if !layout.in_header(mouse.row) => {
                        if let Some(index) = layout.channel_at(mouse.column) {
                            selected = index;
                            if let Some(panel) = panels.get_mut(index) {
                                panel.press(
                                    layout.row_in_panel(mouse.row),
                                    layout.panel_height(),
                                    &mut thresholds,
                                );
                            }
                        }
                    }
                    MouseEventKind::Drag(MouseButton::Left) => {
                        if let Some(panel) = panels.get_mut(selected) {
                            panel.drag(
                                layout.row_in_panel(mouse.row),
                                layout.panel_height(),
                                &mut thresholds,
                            );
                        }
                    }
                    MouseEventKind::Up(MouseButton::Left) => {
                        if let Some(panel) = panels.get_mut(selected) {
                            if let Some(cmd) = panel.release(&thresholds) {
                                link.emit(cmd);
                            }
                        }
                    }
                    _ => {}
                },
                Some(Ok(Event::Resize(new_cols, new_rows))) => {
                    layout = Layout::new(new_cols, new_rows, panels.len());
                    out.execute(Clear(ClearType::All))?;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => log::debug!("event stream error: {}", e),
                None => break 'dashboard,
            },
        }
    }
    link.shutdown();
    Ok(())
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let mut opts = Options::new();
    opts.optopt(
        "r",
        "",
        &format!(
            "backend address (default {})",
            fsrpad::link::default_endpoint()
        ),
        "address",
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
    let addr = matches
        .opt_str("r")
        .unwrap_or_else(fsrpad::link::default_endpoint);

    let mut stdout = stdout();

    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableMouseCapture)?;
    stdout.execute(Clear(ClearType::All))?;
    stdout.execute(Hide)?;

    let res = async_std::task::block_on(run_monitor(addr));

    stdout.execute(DisableMouseCapture)?;
    stdout.execute(LeaveAlternateScreen)?;
    stdout.execute(Show)?;
    disable_raw_mode()?;

    res
}
