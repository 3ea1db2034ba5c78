//! Event detection over noisy OCR observations.
//!
//! This module provides:
//! - The per-tick `Observation` model and channel sets
//! - The run state machine (`Splitter`) and its effect layer
//! - Forward-only stage matching with skip recovery
//! - Split cooldown and the channel scheduler

pub mod debounce;
pub mod machine;
pub mod observation;
pub mod scheduler;
pub mod stages;
pub mod state;

pub use machine::{apply_outcomes, Splitter};
pub use observation::{Channel, ChannelSet, CountdownDigit, Observation};
