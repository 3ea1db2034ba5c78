//! Automated timer control from the watched video feed.
//!
//! This module provides:
//! - Configuration loading (config.json)
//! - The sensing layer that turns frames into observations
//! - The worker loop that feeds observations to the splitter

pub mod config;
pub mod runner;
pub mod sensor;

pub use config::{get_config, init_config, init_config_from};
pub use runner::{start_analysis, SharedClient};
