//! Byte accounting for one upload job.
//!
//! `total_bytes` is fixed when the tracker is built from the job's asset
//! sizes. Each asset contributes its in-flight `loaded` count until it
//! completes, at which point its full size moves into `completed_bytes`.
//! Counting per asset keeps interleaved progress events from parallel
//! transfers from double-counting.

use serde::{Deserialize, Serialize};

/// Index of an asset inside its job, as returned by [`ProgressTracker::register`].
pub type AssetSlot = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AssetBytes {
    size: u64,
    loaded: u64,
    done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub percent: u8,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    assets: Vec<AssetBytes>,
    total_bytes: u64,
    completed_bytes: u64,
    frozen: bool,
    last_percent: u8,
}

impl ProgressTracker {
    /// Build a tracker over every asset size known up front.
    pub fn new(sizes: &[u64]) -> Self {
        let mut tracker = Self::default();
        for &size in sizes {
            tracker.register(size);
        }
        tracker
    }

    /// Add one asset. Only valid before any bytes are reported; the total
    /// never moves once transfers start.
    pub fn register(&mut self, size: u64) -> AssetSlot {
        debug_assert!(self.uploaded_bytes() == 0, "total is fixed once bytes flow");
        self.assets.push(AssetBytes {
            size,
            loaded: 0,
            done: false,
        });
        self.total_bytes += size;
        self.assets.len() - 1
    }

    /// Record that `loaded` bytes of `slot` have been sent so far. Stale or
    /// out-of-range values are clamped; a frozen tracker ignores the call.
    pub fn advance(&mut self, slot: AssetSlot, loaded: u64) -> ProgressSnapshot {
        if !self.frozen {
            if let Some(asset) = self.assets.get_mut(slot) {
                if !asset.done {
                    asset.loaded = asset.loaded.max(loaded.min(asset.size));
                }
            }
        }
        self.snapshot()
    }

    /// Mark `slot` fully transferred and move its whole size into the baseline.
    pub fn complete(&mut self, slot: AssetSlot) -> ProgressSnapshot {
        if !self.frozen {
            if let Some(asset) = self.assets.get_mut(slot) {
                if !asset.done {
                    asset.done = true;
                    asset.loaded = asset.size;
                    self.completed_bytes += asset.size;
                }
            }
        }
        self.snapshot()
    }

    /// Stop accepting byte reports (cancellation).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn all_complete(&self) -> bool {
        self.assets.iter().all(|a| a.done)
    }

    /// Completed baseline plus in-flight bytes of unfinished assets.
    pub fn uploaded_bytes(&self) -> u64 {
        let in_flight: u64 = self
            .assets
            .iter()
            .filter(|a| !a.done)
            .map(|a| a.loaded)
            .sum();
        (self.completed_bytes + in_flight).min(self.total_bytes)
    }

    /// Whole percent, floored, clamped to `[0, 100]`. 100 is reserved for
    /// the moment every asset has completed.
    pub fn percent(&mut self) -> u8 {
        let raw = if self.all_complete() {
            100
        } else if self.total_bytes == 0 {
            0
        } else {
            let pct = (self.uploaded_bytes() as u128 * 100) / self.total_bytes as u128;
            pct.min(99) as u8
        };
        self.last_percent = self.last_percent.max(raw);
        self.last_percent
    }

    pub fn snapshot(&mut self) -> ProgressSnapshot {
        ProgressSnapshot {
            uploaded_bytes: self.uploaded_bytes(),
            total_bytes: self.total_bytes,
            percent: self.percent(),
        }
    }
}
