//! Per-channel panel controller.
//!
//! A `Panel` turns the latest reading and threshold into a fully computed
//! `PanelFrame` and hands it to a `Surface` for painting, at most once per
//! frame interval. It also owns the pointer interaction for its channel:
//! press/drag rewrite the threshold locally, and only the release emits
//! the `update_threshold` command. The trait seam keeps all of this logic
//! independent of the terminal painter, so it can be driven from tests
//! with a fake surface and a fake clock.

use crate::history::History;
use crate::proto::{Outbound, FULL_SCALE};
use crate::thresholds::Thresholds;
use std::time::{Duration, Instant};

/// Minimum time between painted frames, 1000/60.1 ms. The slack over a
/// plain 60 Hz period absorbs timer jitter so a tick landing a hair early
/// still paints.
pub static MIN_FRAME_INTERVAL: Duration = Duration::from_micros(16_639);

/// Thresholds above this paint their label below the line instead of
/// above it, to keep it on the surface near the top edge.
static LABEL_FLIP: u16 = 990;

/// Where the threshold label sits relative to the threshold line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAnchor {
    AboveLine,
    BelowLine,
}

/// One fully computed paint pass for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelFrame {
    pub value: u16,
    pub threshold: u16,
    /// Whether the reading is at or above the threshold.
    pub above: bool,
    /// Rows covered by the value bar, measured up from the bottom edge.
    pub bar_rows: u16,
    /// Row of the threshold line, 0 at the top edge.
    pub line_row: u16,
    pub label_anchor: LabelAnchor,
}

/// Drawing target for a panel. Implemented by the terminal painter, and
/// by fakes in tests.
pub trait Surface {
    /// Height of the drawable area, in rows.
    fn height(&self) -> u16;
    /// Paints one frame. Called at most once per frame interval.
    fn paint(&mut self, frame: &PanelFrame);
}

pub struct Panel {
    index: usize,
    dragging: bool,
    last_paint: Option<Instant>,
}

impl Panel {
    pub fn new(index: usize) -> Panel {
        Panel {
            index: index,
            dragging: false,
            last_paint: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    /// Paints the current reading against the current threshold, unless
    /// the frame interval since the last paint has not elapsed yet, or
    /// there is nothing to show for this channel. Returns whether the
    /// surface was painted.
    pub fn render(
        &mut self,
        now: Instant,
        history: &History,
        thresholds: &Thresholds,
        surface: &mut dyn Surface,
    ) -> bool {
        if let Some(last) = self.last_paint {
            if now.duration_since(last) < MIN_FRAME_INTERVAL {
                return false;
            }
        }
        // the wire is not trusted: a buggy backend can sync past full scale
        let value = match history.latest().and_then(|s| s.get(self.index)) {
            Some(value) => (*value).min(FULL_SCALE),
            None => return false,
        };
        let threshold = match thresholds.get(self.index) {
            Some(threshold) => threshold.min(FULL_SCALE),
            None => return false,
        };
        let height = surface.height();
        if height == 0 {
            return false;
        }
        let frame = PanelFrame {
            value: value,
            threshold: threshold,
            above: value >= threshold,
            bar_rows: bar_rows(value, height),
            line_row: line_row(threshold, height),
            label_anchor: if threshold > LABEL_FLIP {
                LabelAnchor::BelowLine
            } else {
                LabelAnchor::AboveLine
            },
        };
        surface.paint(&frame);
        self.last_paint = Some(now);
        true
    }

    /// Pointer press at `y` rows from the top of a surface `height` rows
    /// tall. Sets the threshold locally and enters drag mode. Nothing is
    /// emitted until release.
    pub fn press(&mut self, y: f64, height: u16, thresholds: &mut Thresholds) {
        self.dragging = true;
        thresholds.set_one(self.index, position_to_threshold(y, height));
    }

    /// Pointer motion while dragging. Ignored when no drag is active.
    pub fn drag(&mut self, y: f64, height: u16, thresholds: &mut Thresholds) {
        if self.dragging {
            thresholds.set_one(self.index, position_to_threshold(y, height));
        }
    }

    /// Pointer release. Leaves drag mode and returns the single command
    /// for the whole gesture, carrying the full threshold vector and this
    /// channel's index. Returns nothing when no drag was active or the
    /// store does not cover this channel.
    pub fn release(&mut self, thresholds: &Thresholds) -> Option<Outbound> {
        if !self.dragging {
            return None;
        }
        self.dragging = false;
        thresholds.get(self.index)?;
        Some(self.update_command(thresholds))
    }

    /// Raises the threshold by one, saturating at full scale. Emits
    /// immediately on change, nothing at the rail.
    pub fn increment(&self, thresholds: &mut Thresholds) -> Option<Outbound> {
        self.nudge(thresholds, 1)
    }

    /// Lowers the threshold by one, saturating at zero.
    pub fn decrement(&self, thresholds: &mut Thresholds) -> Option<Outbound> {
        self.nudge(thresholds, -1)
    }

    fn nudge(&self, thresholds: &mut Thresholds, delta: i64) -> Option<Outbound> {
        let current = thresholds.get(self.index)?;
        let updated = clamp_to_scale(current as i64 + delta);
        if updated == current {
            return None;
        }
        thresholds.set_one(self.index, updated);
        Some(self.update_command(thresholds))
    }

    fn update_command(&self, thresholds: &Thresholds) -> Outbound {
        Outbound::UpdateThreshold {
            thresholds: thresholds.values().to_vec(),
            index: self.index,
        }
    }
}

/// Maps a pointer row to a threshold: top of the surface is full scale,
/// bottom is zero.
pub fn position_to_threshold(y: f64, height: u16) -> u16 {
    if height == 0 {
        return 0;
    }
    let raw = (FULL_SCALE as f64 - y / height as f64 * FULL_SCALE as f64).floor();
    clamp_to_scale(raw as i64)
}

pub fn clamp_to_scale(value: i64) -> u16 {
    value.clamp(0, FULL_SCALE as i64) as u16
}

/// Height of the value bar on a surface `height` rows tall.
fn bar_rows(value: u16, height: u16) -> u16 {
    (value as f64 / FULL_SCALE as f64 * height as f64).round() as u16
}

/// Row of the threshold line: zero threshold sits on the bottom row,
/// full scale on the top row.
fn line_row(threshold: u16, height: u16) -> u16 {
    let row = ((FULL_SCALE - threshold) as f64 / FULL_SCALE as f64 * height as f64) as u16;
    row.min(height - 1)
}
