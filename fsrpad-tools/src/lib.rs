//! Shared pieces for the pad tools.

/// Rows reserved at the top of the screen for title and key help.
pub static HEADER_ROWS: u16 = 2;

/// Splits the terminal into equal-width vertical bands, one per channel,
/// under a fixed header. Rebuilt whenever the terminal resizes or the
/// channel count changes.
pub struct Layout {
    cols: u16,
    rows: u16,
    channels: usize,
}

impl Layout {
    pub fn new(cols: u16, rows: u16, channels: usize) -> Layout {
        Layout {
            cols: cols,
            rows: rows,
            channels: channels,
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Width of one channel band. At least one column, even when the
    /// terminal is too narrow for every channel to fit.
    pub fn band_width(&self) -> u16 {
        if self.channels == 0 {
            return 0;
        }
        let even = self.cols / (self.channels.min(u16::MAX as usize) as u16).max(1);
        even.max(1)
    }

    /// Horizontal extent of a channel band: (first column, width).
    pub fn band(&self, index: usize) -> (u16, u16) {
        let width = self.band_width();
        ((index as u16).saturating_mul(width), width)
    }

    /// Whether a channel band fits on the screen.
    pub fn visible(&self, index: usize) -> bool {
        if index >= self.channels {
            return false;
        }
        let (x0, width) = self.band(index);
        x0 as u32 + width as u32 <= self.cols as u32
    }

    /// Channel whose band covers the given column, if any.
    pub fn channel_at(&self, column: u16) -> Option<usize> {
        let width = self.band_width();
        if width == 0 {
            return None;
        }
        let index = (column / width) as usize;
        if self.visible(index) {
            Some(index)
        } else {
            None
        }
    }

    pub fn panel_top(&self) -> u16 {
        HEADER_ROWS
    }

    pub fn panel_height(&self) -> u16 {
        self.rows.saturating_sub(HEADER_ROWS)
    }

    /// Whether a screen row falls in the header rather than a panel.
    pub fn in_header(&self, row: u16) -> bool {
        row < HEADER_ROWS
    }

    /// Screen row mapped into a panel-relative position.
    pub fn row_in_panel(&self, row: u16) -> f64 {
        row.saturating_sub(HEADER_ROWS) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_split_the_width_evenly() {
        let layout = Layout::new(80, 24, 4);
        assert_eq!(layout.band_width(), 20);
        assert_eq!(layout.band(0), (0, 20));
        assert_eq!(layout.band(3), (60, 20));
        assert!(layout.visible(3));
        assert!(!layout.visible(4));
        assert_eq!(layout.panel_height(), 22);
    }

    #[test]
    fn mouse_columns_map_to_channels() {
        let layout = Layout::new(80, 24, 4);
        assert_eq!(layout.channel_at(0), Some(0));
        assert_eq!(layout.channel_at(19), Some(0));
        assert_eq!(layout.channel_at(20), Some(1));
        assert_eq!(layout.channel_at(79), Some(3));
    }

    #[test]
    fn no_channels_means_no_bands() {
        let layout = Layout::new(80, 24, 0);
        assert_eq!(layout.band_width(), 0);
        assert_eq!(layout.channel_at(10), None);
        assert!(!layout.visible(0));
    }

    #[test]
    fn narrow_terminal_hides_overflowing_channels() {
        let layout = Layout::new(3, 24, 5);
        assert_eq!(layout.band_width(), 1);
        assert!(layout.visible(2));
        assert!(!layout.visible(4));
        assert_eq!(layout.channel_at(4), None);
    }

    #[test]
    fn header_rows_are_not_part_of_any_panel() {
        let layout = Layout::new(80, 24, 4);
        assert!(layout.in_header(0));
        assert!(layout.in_header(1));
        assert!(!layout.in_header(2));
    }

    #[test]
    fn rows_map_into_panel_space() {
        let layout = Layout::new(80, 24, 2);
        assert_eq!(layout.row_in_panel(1), 0.0);
        assert_eq!(layout.row_in_panel(2), 0.0);
        assert_eq!(layout.row_in_panel(10), 8.0);
    }
}
