use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Generation id of one fetch cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out monotonically increasing epochs.
///
/// Work captures the epoch it was dispatched under and checks
/// [`is_current`](Self::is_current) before committing anything.
#[derive(Debug, Default)]
pub struct EpochManager {
    current: AtomicU64,
}

impl EpochManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch, superseding the current one.
    pub fn begin(&self) -> Epoch {
        Epoch(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Epoch {
        Epoch(self.current.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}
