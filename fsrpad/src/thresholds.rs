//! Per-channel threshold store.
//!
//! The backend owns the authoritative vector and pushes it on connect and
//! after every accepted update. Local edits are optimistic: they rewrite
//! the store immediately and the next backend sync confirms or corrects
//! them. The store itself does not clamp; callers that compute new values
//! are responsible for keeping them on scale.

pub struct Thresholds {
    values: Vec<u16>,
}

impl Thresholds {
    pub fn new() -> Thresholds {
        Thresholds { values: Vec::new() }
    }

    /// Replaces the whole vector (backend sync).
    pub fn set_all(&mut self, values: Vec<u16>) {
        self.values = values;
    }

    /// Rewrites a single threshold (local edit). Out-of-range indices are
    /// a silent no-op; the channel simply is not configurable yet.
    pub fn set_one(&mut self, index: usize, value: u16) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied()
    }

    pub fn values(&self) -> &[u16] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Thresholds {
    fn default() -> Thresholds {
        Thresholds::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_then_edit() {
        let mut thresholds = Thresholds::new();
        assert_eq!(thresholds.get(0), None);
        thresholds.set_all(vec![400, 600]);
        thresholds.set_one(1, 601);
        assert_eq!(thresholds.values(), &[400, 601]);
        assert_eq!(thresholds.get(1), Some(601));
    }

    #[test]
    fn out_of_range_edit_is_a_no_op() {
        let mut thresholds = Thresholds::new();
        thresholds.set_one(0, 100);
        assert!(thresholds.is_empty());
        thresholds.set_all(vec![500]);
        thresholds.set_one(5, 100);
        assert_eq!(thresholds.values(), &[500]);
    }

    #[test]
    fn sync_overwrites_local_edits() {
        let mut thresholds = Thresholds::new();
        thresholds.set_all(vec![400, 600]);
        thresholds.set_one(0, 123);
        thresholds.set_all(vec![410, 610]);
        assert_eq!(thresholds.values(), &[410, 610]);
    }
}
