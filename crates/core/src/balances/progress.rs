use serde::{Deserialize, Serialize};

use super::epoch::Epoch;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressPhase {
    #[default]
    Idle,
    Fetching,
    Complete,
}

/// Work-unit progress of one epoch. Units are tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub epoch: Epoch,
    pub processed: usize,
    pub total: usize,
    pub percentage: u8,
    pub phase: ProgressPhase,
}

impl ProgressState {
    pub fn is_complete(&self) -> bool {
        self.phase == ProgressPhase::Complete
    }
}

/// Tracks processed/total for the current epoch.
///
/// `total` is fixed by [`start`](Self::start); `processed` only grows and
/// never passes `total`. Updates for any other epoch are ignored.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: ProgressState,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Back to `Idle` for a new epoch.
    pub fn reset(&mut self, epoch: Epoch) {
        self.state = ProgressState {
            epoch,
            ..ProgressState::default()
        };
    }

    /// Fix `total` for the epoch. A cycle with no work is complete at once.
    pub fn start(&mut self, epoch: Epoch, total: usize) -> bool {
        if epoch != self.state.epoch || self.state.phase != ProgressPhase::Idle {
            return false;
        }
        self.state.total = total;
        self.state.processed = 0;
        if total == 0 {
            self.state.percentage = 100;
            self.state.phase = ProgressPhase::Complete;
        } else {
            self.state.percentage = 0;
            self.state.phase = ProgressPhase::Fetching;
        }
        true
    }

    /// Record a terminal batch outcome covering `count` tokens.
    pub fn advance(&mut self, epoch: Epoch, count: usize) -> bool {
        if epoch != self.state.epoch || self.state.phase != ProgressPhase::Fetching {
            return false;
        }
        let state = &mut self.state;
        state.processed = state.processed.saturating_add(count).min(state.total);
        state.percentage = percentage(state.processed, state.total);
        if state.processed == state.total {
            state.phase = ProgressPhase::Complete;
        }
        true
    }
}

fn percentage(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}
