//! Run state machine.
//!
//! `Splitter::step` turns one masked observation into a list of outcomes and
//! mutates the run state; it never talks to the timer. `apply_outcomes` is the
//! thin layer that turns outcomes into protocol commands.

use anyhow::Result;
use std::time::Instant;

use crate::automation::config::{GameTimeReporting, SplitterConfig, StartPolicy};
use crate::livesplit::{TimerClient, TimerCommand};
use crate::splitter::debounce::SplitDebouncer;
use crate::splitter::observation::{ChannelSet, Observation};
use crate::splitter::scheduler::ChannelScheduler;
use crate::splitter::stages::{contains_keyword, is_clean_candidate, StageMatch, StageSequence};
use crate::splitter::state::{Phase, RunState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitReason {
    /// Session keyword shown in the stage label between two stages
    SessionTransition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinishReason {
    /// Session label changed away from the keyword at the final stage
    SessionEnded,
    /// A terminal keyword appeared in the stage label
    TerminalKeyword(String),
}

/// One decision taken during a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    CountdownReset,
    SessionConfirmed,
    Started { timer_value: u32 },
    GameTime(u64),
    StageAdvanced(StageMatch),
    Split(SplitReason),
    Finished(FinishReason),
}

pub struct Splitter {
    config: SplitterConfig,
    stages: StageSequence,
    debouncer: SplitDebouncer,
    scheduler: ChannelScheduler,
    state: RunState,
    game_time_reported: bool,
}

impl Splitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        let stages = StageSequence::new(&config.stages)?;
        let debouncer = SplitDebouncer::new(config.split_cooldown());
        let scheduler = ChannelScheduler::new(
            config.require_countdown,
            config.countdown_cooldown(),
            &config.session_keyword,
        );
        Ok(Self {
            config,
            stages,
            debouncer,
            scheduler,
            state: RunState::new(),
            game_time_reported: false,
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &ChannelScheduler {
        &self.scheduler
    }

    /// Channels to sample on the next tick.
    pub fn enabled_channels(&self) -> ChannelSet {
        self.scheduler.enabled()
    }

    pub fn current_stage_name(&self) -> Option<&str> {
        self.state
            .current_stage_index
            .and_then(|i| self.stages.name(i))
    }

    /// Returns the run and the schedule to their idle configuration.
    #[cfg(test)]
    pub fn reset(&mut self) {
        self.state.reset();
        self.scheduler.reset_to_pre_run();
        self.game_time_reported = false;
    }

    /// Short description for status display.
    pub fn progress_string(&self) -> String {
        match (self.state.phase, self.state.current_stage_index) {
            (Phase::Idle, _) | (_, None) => format!("{} - {}", self.state.phase, self.scheduler.phase()),
            (phase, Some(i)) => format!(
                "{} - stage {}/{} ({})",
                phase,
                i + 1,
                self.stages.len(),
                self.current_stage_name().unwrap_or("?")
            ),
        }
    }

    /// Runs every rule against one observation.
    ///
    /// Fields of channels that were not enabled for this tick are ignored.
    pub fn step(&mut self, observation: &Observation, now: Instant) -> Vec<Outcome> {
        let obs = observation.masked(self.scheduler.enabled());
        let mut outcomes = Vec::new();

        if self
            .scheduler
            .observe_countdown(&mut self.state, obs.countdown_digit, now)
        {
            self.state.reset();
            self.game_time_reported = false;
            outcomes.push(Outcome::CountdownReset);
            return outcomes;
        }

        if self.scheduler.observe_session(obs.session_label.as_deref()) {
            crate::log(&format!(
                "Session confirmed: {}",
                obs.session_label.as_deref().unwrap_or_default()
            ));
            outcomes.push(Outcome::SessionConfirmed);
        }

        if let Some(seconds) = obs.timer_seconds {
            self.observe_timer(seconds, &mut outcomes);
        }

        // End of run bypasses the split cooldown and wins over the stage rules.
        if self.state.phase == Phase::Running {
            if let Some(reason) = self.finish_reason(&obs) {
                self.debouncer.force_split(&mut self.state, now);
                self.state.finish_run();
                self.scheduler.on_finish();
                crate::log(&format!("Run finished: {:?}", reason));
                outcomes.push(Outcome::Finished(reason));
                return outcomes;
            }
        }

        if self.state.is_active() {
            if let Some(label) = obs.stage_label.as_deref() {
                self.observe_stage_label(label, now, &mut outcomes);
            }
        }

        debug_assert!(self.state.is_consistent());
        outcomes
    }

    fn observe_timer(&mut self, seconds: u32, outcomes: &mut Vec<Outcome>) {
        match self.state.phase {
            Phase::Idle | Phase::Finished => {
                if self.is_start(seconds) {
                    self.state.start_run(seconds);
                    self.scheduler.on_start(self.stages.is_final(0));
                    self.game_time_reported = false;
                    crate::log(&format!("Run started! Initial timer: {}s", seconds));
                    outcomes.push(Outcome::Started { timer_value: seconds });
                } else {
                    self.state.last_timer_value = Some(seconds);
                }
            }
            Phase::Running => {
                self.state.last_timer_value = Some(seconds);
                if let Some(elapsed) = self.game_time_to_report(seconds) {
                    outcomes.push(Outcome::GameTime(elapsed));
                }
            }
        }
    }

    fn is_start(&self, seconds: u32) -> bool {
        match self.config.start_policy {
            StartPolicy::Jump { min_delta } => self
                .state
                .last_timer_value
                .is_some_and(|last| seconds.saturating_sub(last) >= min_delta && seconds > last),
            StartPolicy::Absolute { min_value } => {
                self.state.last_timer_value.is_none() && seconds > min_value
            }
        }
    }

    fn game_time_to_report(&mut self, seconds: u32) -> Option<u64> {
        let report = match self.config.game_time_reporting {
            GameTimeReporting::Off => false,
            GameTimeReporting::OncePerStart => !self.game_time_reported,
            GameTimeReporting::EveryTick => true,
        };
        if !report {
            return None;
        }
        let elapsed = self.state.elapsed_since_start(seconds)?;
        self.game_time_reported = true;
        let compensated = (elapsed as i64 + self.config.latency_compensation_secs).max(0);
        Some(compensated as u64)
    }

    fn observe_stage_label(&mut self, label: &str, now: Instant, outcomes: &mut Vec<Outcome>) {
        if contains_keyword(label, &self.config.session_keyword) {
            if self.debouncer.try_split(&mut self.state, now) {
                crate::log("Triggering split: session transition");
                outcomes.push(Outcome::Split(SplitReason::SessionTransition));
            }
            return;
        }

        if !is_clean_candidate(label, &self.config.session_keyword) {
            return;
        }

        let Some(current) = self.state.current_stage_index else {
            return;
        };
        if let Some(advance) = self.stages.match_forward(label, current) {
            self.state.current_stage_index = Some(advance.to);
            self.scheduler.on_stage_advance(self.stages.is_final(advance.to));
            let from = self.stages.name(current).unwrap_or_default();
            let to = self.stages.name(advance.to).unwrap_or_default();
            if advance.is_in_sequence() {
                crate::log(&format!("Stage changed: {} -> {}", from, to));
            } else {
                crate::log(&format!(
                    "Stage changed: {} -> {} (skipped {} stage(s))",
                    from,
                    to,
                    advance.skipped()
                ));
            }
            outcomes.push(Outcome::StageAdvanced(advance));
        }
    }

    fn finish_reason(&self, obs: &Observation) -> Option<FinishReason> {
        if let Some(label) = obs.stage_label.as_deref() {
            if let Some(keyword) = self
                .config
                .terminal_keywords
                .iter()
                .find(|k| contains_keyword(label, k))
            {
                return Some(FinishReason::TerminalKeyword(keyword.clone()));
            }
        }

        let at_final = self
            .state
            .current_stage_index
            .is_some_and(|i| self.stages.is_final(i));
        if at_final && self.scheduler.session_confirmed() {
            if let Some(session) = obs.session_label.as_deref() {
                if !session.trim().is_empty()
                    && !contains_keyword(session, &self.config.session_keyword)
                {
                    return Some(FinishReason::SessionEnded);
                }
            }
        }
        None
    }
}

/// Sends the protocol commands for a tick's outcomes.
pub fn apply_outcomes(outcomes: &[Outcome], client: &mut dyn TimerClient) {
    for outcome in outcomes {
        match outcome {
            Outcome::CountdownReset => client.send(TimerCommand::Reset),
            Outcome::Started { .. } => {
                client.send(TimerCommand::StartTimer);
                client.send(TimerCommand::SetGameTime(0));
            }
            Outcome::GameTime(seconds) => client.send(TimerCommand::SetGameTime(*seconds)),
            Outcome::Split(_) | Outcome::Finished(_) => client.send(TimerCommand::Split),
            Outcome::SessionConfirmed | Outcome::StageAdvanced(_) => {}
        }
    }
}
