//! Rolling window of reading snapshots.
//!
//! Fixed capacity ring with a single writer. Once full, each push
//! overwrites the oldest snapshot, so memory stays bounded no matter how
//! long the stream runs.

/// Snapshots retained in the window.
pub static DEFAULT_CAPACITY: usize = 1000;

pub struct History {
    /// Stored snapshots. Grows up to `capacity`, then recycles slots.
    slots: Vec<Vec<u16>>,
    /// Index of the most recent snapshot. Meaningless while `slots` is empty.
    cursor: usize,
    /// Widest snapshot seen so far. Only ever grows.
    channels: usize,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> History {
        if capacity == 0 {
            panic!("history capacity must be nonzero");
        }
        History {
            slots: Vec::new(),
            cursor: 0,
            channels: 0,
            capacity: capacity,
        }
    }

    /// Appends a snapshot, evicting the oldest one when full.
    pub fn push(&mut self, snapshot: Vec<u16>) {
        if snapshot.len() > self.channels {
            self.channels = snapshot.len();
        }
        if self.slots.len() < self.capacity {
            self.slots.push(snapshot);
            self.cursor = self.slots.len() - 1;
        } else {
            self.cursor = (self.cursor + 1) % self.capacity;
            self.slots[self.cursor] = snapshot;
        }
    }

    /// The most recent snapshot, if any arrived yet.
    pub fn latest(&self) -> Option<&[u16]> {
        self.recent(0)
    }

    /// The snapshot `offset` pushes before the most recent one.
    /// `recent(0)` is `latest()`.
    pub fn recent(&self, offset: usize) -> Option<&[u16]> {
        if offset >= self.slots.len() {
            return None;
        }
        let idx = (self.cursor + self.capacity - offset) % self.capacity;
        Some(&self.slots[idx])
    }

    /// Number of live snapshots, saturating at capacity.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Channel count of the widest snapshot seen so far.
    pub fn channels(&self) -> usize {
        self.channels
    }
}
