//! Run lifecycle state.
//!
//! A single `RunState` lives for the whole process. Only the splitter mutates it.

use std::time::Instant;

use crate::splitter::observation::CountdownDigit;

/// Coarse lifecycle state of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    /// Behaves like `Running` for split logic; a fresh start re-enters `Running`.
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Running => write!(f, "Running"),
            Phase::Finished => write!(f, "Finished"),
        }
    }
}

/// Mutable run state shared by all rules of the splitter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunState {
    pub phase: Phase,
    /// Timer reading at the detected start
    pub start_timer_value: Option<u32>,
    /// Most recent accepted timer reading
    pub last_timer_value: Option<u32>,
    /// Index into the stage sequence; `None` before a run starts
    pub current_stage_index: Option<usize>,
    /// When the most recent split was emitted
    pub last_split_time: Option<Instant>,
    pub last_countdown_digit: Option<CountdownDigit>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every field to its idle default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Enters `Running` from the given timer reading, at the first stage.
    pub fn start_run(&mut self, timer_value: u32) {
        self.phase = Phase::Running;
        self.start_timer_value = Some(timer_value);
        self.last_timer_value = Some(timer_value);
        self.current_stage_index = Some(0);
    }

    pub fn finish_run(&mut self) {
        self.phase = Phase::Finished;
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Stage index and phase never disagree: a stage is tracked iff a run has started.
    pub fn is_consistent(&self) -> bool {
        self.current_stage_index.is_some() == self.is_active()
    }

    /// Elapsed seconds since the start reading, when the timer counts down from it.
    pub fn elapsed_since_start(&self, timer_seconds: u32) -> Option<u64> {
        let start = self.start_timer_value?;
        start.checked_sub(timer_seconds).map(u64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_then_reset_restores_defaults() {
        let mut state = RunState::new();
        state.start_run(1800);
        state.last_split_time = Some(Instant::now());
        state.last_countdown_digit = Some(CountdownDigit::Two);
        state.current_stage_index = Some(3);
        state.finish_run();
        assert_eq!(state.phase, Phase::Finished);

        state.reset();
        assert_eq!(state, RunState::default());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_start_run_sets_first_stage() {
        let mut state = RunState::new();
        assert!(state.is_consistent());
        state.start_run(1850);
        assert_eq!(state.phase, Phase::Running);
        assert_eq!(state.start_timer_value, Some(1850));
        assert_eq!(state.last_timer_value, Some(1850));
        assert_eq!(state.current_stage_index, Some(0));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_elapsed_since_start() {
        let mut state = RunState::new();
        assert_eq!(state.elapsed_since_start(100), None);
        state.start_run(1800);
        assert_eq!(state.elapsed_since_start(1795), Some(5));
        assert_eq!(state.elapsed_since_start(1800), Some(0));
        assert_eq!(state.elapsed_since_start(1900), None);
    }
}
