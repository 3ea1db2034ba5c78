//! Splitwatch
//!
//! Watches a game's video feed through OCR and drives a LiveSplit timer:
//! start on the run's timer jump, split on stage transitions, split once more
//! at the end of the run.

mod automation;
mod capture;
mod livesplit;
mod ocr;
mod paths;
mod splitter;

use anyhow::{bail, Result};
use chrono::Local;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use automation::SharedClient;
use capture::ReplaySource;
use livesplit::{LiveSplitClient, TimerClient};
use ocr::TesseractRecognizer;

/// Replays recorded frames through the splitter and drives LiveSplit.
#[derive(Parser, Debug)]
#[command(name = "splitwatch", version)]
struct Args {
    /// Directory of recorded frames, replayed in file-name order
    frames_dir: PathBuf,
    /// Config file to use instead of the one next to the executable
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("splitwatch.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("splitwatch.log");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    let args = Args::parse();

    // Ensure output directories exist
    paths::ensure_directories()?;

    // Load configuration
    match &args.config {
        Some(path) => automation::init_config_from(path),
        None => automation::init_config(),
    }
    let config = automation::get_config().clone();

    let source = ReplaySource::from_dir(&args.frames_dir)?;
    if source.is_empty() {
        bail!("No frames to replay in {}", args.frames_dir.display());
    }

    let mut livesplit = LiveSplitClient::new(&config.livesplit_host, config.livesplit_port);
    if livesplit.connect().is_err() {
        log("Make sure LiveSplit Server is running. Continuing without a timer connection.");
    }
    let livesplit = Arc::new(Mutex::new(livesplit));
    let client: SharedClient = livesplit.clone();

    let recognizer = TesseractRecognizer::new(&config.tesseract_path);

    let handle = automation::start_analysis(config, Box::new(source), Box::new(recognizer), client)?;
    handle.join()?;

    if let Ok(mut livesplit) = livesplit.lock() {
        if livesplit.is_connected() {
            livesplit.disconnect();
        }
    }

    log("Splitwatch finished");
    Ok(())
}
