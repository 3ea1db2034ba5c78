//! Analysis runner - drives the splitter from a dedicated worker thread.
//!
//! One tick: sample the scheduled channels, run the splitter, send the
//! resulting commands. Ticks run strictly in sequence; the only state shared
//! with the caller is the running flag, the status line, the capture regions,
//! and the timer client.

use anyhow::{anyhow, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::automation::config::{Regions, SplitterConfig};
use crate::automation::sensor::{Sensor, SharedRegions};
use crate::capture::FrameSource;
use crate::livesplit::TimerClient;
use crate::ocr::Recognizer;
use crate::splitter::{apply_outcomes, Splitter};

/// Ticks that may panic back to back before the worker gives up.
const MAX_CONSECUTIVE_PANICS: u32 = 5;

/// Timer connection shared between the worker and whoever (re)connects it.
pub type SharedClient = Arc<Mutex<dyn TimerClient + Send>>;

/// Control handle for a running analysis thread.
pub struct AnalysisHandle {
    running: Arc<AtomicBool>,
    status: Arc<Mutex<String>>,
    regions: SharedRegions,
    thread: Option<JoinHandle<()>>,
}

impl AnalysisHandle {
    /// Checks if the worker loop is still ticking.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests a cooperative stop; the current tick finishes first.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Gets the latest status line published by the worker.
    pub fn status(&self) -> String {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Replaces the capture regions; takes effect on the next tick without touching the run.
    pub fn update_regions(&self, regions: Regions) {
        if let Ok(mut current) = self.regions.lock() {
            *current = regions;
            crate::log("Capture regions updated");
        }
    }

    /// Waits for the worker thread to exit.
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("Analysis thread panicked")),
            None => Ok(()),
        }
    }
}

/// Starts the analysis loop in a background thread.
///
/// Returns immediately after spawning the thread.
///
/// # Errors
/// Returns an error, without spawning anything, if the configuration is incomplete
/// (no stages, or a required capture region is missing).
pub fn start_analysis(
    config: SplitterConfig,
    source: Box<dyn FrameSource>,
    recognizer: Box<dyn Recognizer>,
    client: SharedClient,
) -> Result<AnalysisHandle> {
    config
        .validate()
        .map_err(|e| anyhow!("Cannot start analysis: {}", e))?;

    let splitter = Splitter::new(config.clone())?;
    let sensor = Sensor::new(source, recognizer, config.regions.clone(), config.binarize_threshold);

    let running = Arc::new(AtomicBool::new(true));
    let status = Arc::new(Mutex::new(splitter.progress_string()));
    let regions = sensor.regions();

    crate::log(&format!(
        "Starting analysis: {} stages, session keyword \"{}\", tick {}ms",
        config.stages.len(),
        config.session_keyword,
        config.tick_interval_ms
    ));

    let thread_running = Arc::clone(&running);
    let thread_status = Arc::clone(&status);
    let thread = thread::spawn(move || {
        run_analysis_loop(&config, splitter, sensor, &client, &thread_running, &thread_status);
        thread_running.store(false, Ordering::SeqCst);
        crate::log("Analysis thread finished");
    });

    Ok(AnalysisHandle {
        running,
        status,
        regions,
        thread: Some(thread),
    })
}

/// Runs ticks until stopped, the frame source ends, or ticks keep panicking.
fn run_analysis_loop(
    config: &SplitterConfig,
    mut splitter: Splitter,
    mut sensor: Sensor,
    client: &SharedClient,
    running: &AtomicBool,
    status: &Mutex<String>,
) {
    let mut consecutive_panics = 0;

    while running.load(Ordering::SeqCst) {
        if sensor.source_finished() {
            crate::log("Frame source exhausted");
            break;
        }

        let tick = panic::catch_unwind(AssertUnwindSafe(|| {
            run_tick(&mut splitter, &mut sensor, client)
        }));

        match tick {
            Ok(Ok(())) => {
                consecutive_panics = 0;
                thread::sleep(config.tick_interval());
            }
            Ok(Err(e)) => {
                consecutive_panics = 0;
                crate::log(&format!(
                    "Tick failed in phase {}: {:#}",
                    splitter.state().phase,
                    e
                ));
                thread::sleep(config.error_backoff());
            }
            Err(_) => {
                consecutive_panics += 1;
                if consecutive_panics >= MAX_CONSECUTIVE_PANICS {
                    crate::log(&format!(
                        "Unexpected failure in phase {} ({} in a row), stopping analysis",
                        splitter.state().phase,
                        consecutive_panics
                    ));
                    break;
                }
                crate::log(&format!(
                    "Unexpected failure in phase {}, retrying after backoff",
                    splitter.state().phase
                ));
                thread::sleep(config.error_backoff());
            }
        }

        if let Ok(mut s) = status.lock() {
            *s = splitter.progress_string();
        }
    }

    crate::log(&format!("Analysis stopped: {}", splitter.progress_string()));
}

fn run_tick(splitter: &mut Splitter, sensor: &mut Sensor, client: &SharedClient) -> Result<()> {
    let observation = sensor.observe(splitter.enabled_channels());
    let outcomes = splitter.step(&observation, Instant::now());
    if outcomes.is_empty() {
        return Ok(());
    }

    // A panic in an earlier tick may have poisoned the lock; the client itself stays usable.
    let mut client = client.lock().unwrap_or_else(PoisonError::into_inner);
    apply_outcomes(&outcomes, &mut *client);
    Ok(())
}
