//! Observation channel scheduler.
//!
//! Recognizing every region on every tick is expensive, so the schedule narrows
//! sampling to the channels that matter for the current phase:
//! - `PreRun`: countdown and session label (plus timer when no countdown gate)
//! - `Armed`: timer only, waiting for the start jump
//! - `Tracking`: timer and stage label, plus session label at the final stage

use std::time::{Duration, Instant};

use crate::splitter::observation::{Channel, ChannelSet, CountdownDigit};
use crate::splitter::stages::contains_keyword;
use crate::splitter::state::RunState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulePhase {
    PreRun,
    Armed,
    Tracking { at_final_stage: bool },
}

impl std::fmt::Display for SchedulePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulePhase::PreRun => write!(f, "pre-run"),
            SchedulePhase::Armed => write!(f, "armed"),
            SchedulePhase::Tracking { at_final_stage: false } => write!(f, "tracking"),
            SchedulePhase::Tracking { at_final_stage: true } => write!(f, "tracking (final stage)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChannelScheduler {
    phase: SchedulePhase,
    require_countdown: bool,
    countdown_cooldown: Duration,
    session_keyword: String,
    /// Survives `reset_to_pre_run` so a quick re-read of the countdown cannot retrigger.
    last_countdown_reset: Option<Instant>,
    session_confirmed: bool,
}

impl ChannelScheduler {
    pub fn new(require_countdown: bool, countdown_cooldown: Duration, session_keyword: &str) -> Self {
        Self {
            phase: SchedulePhase::PreRun,
            require_countdown,
            countdown_cooldown,
            session_keyword: session_keyword.to_string(),
            last_countdown_reset: None,
            session_confirmed: false,
        }
    }

    pub fn phase(&self) -> SchedulePhase {
        self.phase
    }

    pub fn session_confirmed(&self) -> bool {
        self.session_confirmed
    }

    /// Channels worth sampling on the next tick.
    pub fn enabled(&self) -> ChannelSet {
        match self.phase {
            SchedulePhase::PreRun => {
                let set = ChannelSet::COUNTDOWN | ChannelSet::SESSION;
                if self.require_countdown {
                    set
                } else {
                    set | ChannelSet::TIMER
                }
            }
            SchedulePhase::Armed => ChannelSet::TIMER,
            SchedulePhase::Tracking { at_final_stage } => {
                let set = ChannelSet::TIMER | ChannelSet::STAGE;
                if at_final_stage {
                    set | ChannelSet::SESSION
                } else {
                    set
                }
            }
        }
    }

    /// Feeds one countdown read. Returns true when a `3 -> 2` edge confirms the countdown.
    ///
    /// Anything other than a countdown digit clears the remembered digit, so noise
    /// between a 3 and a 2 never forms an edge.
    pub fn observe_countdown(
        &mut self,
        state: &mut RunState,
        digit: Option<CountdownDigit>,
        now: Instant,
    ) -> bool {
        if !self.enabled().has(Channel::Countdown) {
            return false;
        }

        let previous = state.last_countdown_digit;
        state.last_countdown_digit = digit;

        let edge = previous == Some(CountdownDigit::Three) && digit == Some(CountdownDigit::Two);
        if !edge {
            return false;
        }

        if let Some(last) = self.last_countdown_reset {
            let since = now.saturating_duration_since(last);
            if since < self.countdown_cooldown {
                crate::log(&format!(
                    "Countdown edge ignored ({:.1}s since last reset)",
                    since.as_secs_f32()
                ));
                return false;
            }
        }

        self.last_countdown_reset = Some(now);
        self.phase = SchedulePhase::Armed;
        crate::log(&format!("Countdown confirmed, channels now {}", self.enabled()));
        true
    }

    /// Feeds one session-label read. Returns true the first time the keyword is seen.
    pub fn observe_session(&mut self, label: Option<&str>) -> bool {
        if self.session_confirmed || !self.enabled().has(Channel::Session) {
            return false;
        }
        match label {
            Some(text) if contains_keyword(text, &self.session_keyword) => {
                self.session_confirmed = true;
                true
            }
            _ => false,
        }
    }

    /// `is_final` is true when the first stage is already the last one.
    pub fn on_start(&mut self, is_final: bool) {
        self.phase = SchedulePhase::Tracking { at_final_stage: is_final };
        crate::log(&format!("Run started, channels now {}", self.enabled()));
    }

    pub fn on_stage_advance(&mut self, is_final: bool) {
        if let SchedulePhase::Tracking { at_final_stage } = self.phase {
            if at_final_stage != is_final {
                self.phase = SchedulePhase::Tracking { at_final_stage: is_final };
                crate::log(&format!("Final stage reached, channels now {}", self.enabled()));
            }
        }
    }

    pub fn on_finish(&mut self) {
        self.reset_to_pre_run();
    }

    /// Returns to the pre-run configuration; the countdown cooldown is kept.
    pub fn reset_to_pre_run(&mut self) {
        self.phase = SchedulePhase::PreRun;
        self.session_confirmed = false;
    }
}
