//! Configuration types for the splitter.
//!
//! Loads settings from config.json at startup. Provides the stage sequence,
//! detection keywords, thresholds, capture regions, and timing parameters.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::splitter::observation::Channel;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<SplitterConfig> = OnceLock::new();

/// A rectangle in relative coordinates (0.0 to 1.0).
/// Used for defining screen regions that scale with the captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.1,
            height: 0.1,
        }
    }
}

/// One capture region per observation channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regions {
    pub timer: Option<RelativeRect>,
    pub stage: Option<RelativeRect>,
    pub session: Option<RelativeRect>,
    pub countdown: Option<RelativeRect>,
}

impl Regions {
    pub fn get(&self, channel: Channel) -> Option<&RelativeRect> {
        match channel {
            Channel::Timer => self.timer.as_ref(),
            Channel::Stage => self.stage.as_ref(),
            Channel::Session => self.session.as_ref(),
            Channel::Countdown => self.countdown.as_ref(),
        }
    }
}

/// How the start of a run is recognized from the timer channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartPolicy {
    /// Reading rose by at least `min_delta` seconds over the last accepted reading
    /// (lobby/countdown value replaced by the full session value).
    Jump { min_delta: u32 },
    /// First reading of an idle run is above `min_value` seconds.
    Absolute { min_value: u32 },
}

impl Default for StartPolicy {
    fn default() -> Self {
        StartPolicy::Jump { min_delta: 600 }
    }
}

/// When elapsed game time is pushed to the timer while a run is going.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameTimeReporting {
    /// Only the zero sent at start
    #[default]
    Off,
    OncePerStart,
    EveryTick,
}

/// Complete splitter configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Expected stages in run order; the last one is the final stage
    pub stages: Vec<String>,
    /// Game-mode marker; in the stage label it means "stage boundary"
    pub session_keyword: String,
    /// Any of these in the stage label ends the run
    pub terminal_keywords: Vec<String>,
    pub start_policy: StartPolicy,
    /// Minimum time between two debounced splits (milliseconds)
    pub split_cooldown_ms: u64,
    /// Minimum time between two countdown resets (milliseconds)
    pub countdown_cooldown_ms: u64,
    pub game_time_reporting: GameTimeReporting,
    /// Added to every reported elapsed game time (seconds)
    pub latency_compensation_secs: i64,
    /// Keep the timer channel off until the 3 -> 2 countdown edge is seen
    pub require_countdown: bool,
    /// Delay between ticks (milliseconds)
    pub tick_interval_ms: u64,
    /// Delay after a failed tick (milliseconds)
    pub error_backoff_ms: u64,
    pub regions: Regions,
    /// OCR binarization threshold (pixels with luma above it are text)
    pub binarize_threshold: u8,
    /// Tesseract executable, looked up on PATH if not absolute
    pub tesseract_path: String,
    pub livesplit_host: String,
    pub livesplit_port: u16,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            stages: ["HARBOR", "OLD TOWN", "SEWERS", "FACTORY", "ROOFTOPS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            session_keyword: "ZOMBIES".to_string(),
            terminal_keywords: vec!["VICTORY".to_string(), "SCORE".to_string()],
            start_policy: StartPolicy::default(),
            split_cooldown_ms: 5000,
            countdown_cooldown_ms: 10000,
            game_time_reporting: GameTimeReporting::Off,
            latency_compensation_secs: 0,
            require_countdown: true,
            tick_interval_ms: 100,
            error_backoff_ms: 500,
            regions: Regions::default(),
            binarize_threshold: 150,
            tesseract_path: "tesseract".to_string(),
            livesplit_host: "localhost".to_string(),
            livesplit_port: 16834,
        }
    }
}

impl SplitterConfig {
    pub fn split_cooldown(&self) -> Duration {
        Duration::from_millis(self.split_cooldown_ms)
    }

    pub fn countdown_cooldown(&self) -> Duration {
        Duration::from_millis(self.countdown_cooldown_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Channels whose regions must be configured before analysis can start.
    pub fn required_channels(&self) -> Vec<Channel> {
        if self.require_countdown {
            Channel::ALL.to_vec()
        } else {
            vec![Channel::Timer, Channel::Stage]
        }
    }

    /// Checks everything the worker loop needs before it ticks.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(anyhow!("No stages configured"));
        }
        if self.session_keyword.trim().is_empty() {
            return Err(anyhow!("Session keyword must not be empty"));
        }
        let missing: Vec<String> = self
            .required_channels()
            .into_iter()
            .filter(|&c| self.regions.get(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!("Missing capture region(s): {}", missing.join(", ")));
        }
        Ok(())
    }
}

/// Loads configuration from a file, falling back to defaults on any problem.
pub fn load_config_from(config_path: &Path) -> SplitterConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    SplitterConfig::default()
}

/// Initializes the global configuration from config.json next to the executable.
pub fn init_config() {
    init_config_from(&crate::paths::get_config_path());
}

/// Initializes the global configuration from an explicit path.
pub fn init_config_from(config_path: &Path) {
    let _ = CONFIG.set(load_config_from(config_path));
}

/// Returns the global configuration, or defaults if `init_config` was never called.
pub fn get_config() -> &'static SplitterConfig {
    CONFIG.get_or_init(SplitterConfig::default)
}
