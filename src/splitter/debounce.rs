//! Cooldown gating for outbound split commands.
//!
//! OCR keeps reporting the same transition for many consecutive ticks, so one
//! physical stage boundary must not turn into a burst of splits.

use std::time::{Duration, Instant};

use crate::splitter::state::RunState;

#[derive(Clone, Copy, Debug)]
pub struct SplitDebouncer {
    cooldown: Duration,
}

impl SplitDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Returns true and records the split if the cooldown has elapsed.
    pub fn try_split(&self, state: &mut RunState, now: Instant) -> bool {
        let ready = match state.last_split_time {
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
            None => true,
        };
        if ready {
            state.last_split_time = Some(now);
        }
        ready
    }

    /// Records a split that bypasses the cooldown (end of run).
    pub fn force_split(&self, state: &mut RunState, now: Instant) {
        state.last_split_time = Some(now);
    }
}
