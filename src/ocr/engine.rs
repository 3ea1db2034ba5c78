use anyhow::{anyhow, Result};
use image::GrayImage;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Longest a single recognition may take before the process is killed.
const RECOGNIZE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// What kind of text a region holds; selects the recognizer settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextKind {
    /// Timer and countdown digits (`0-9` and `:`)
    Digits,
    /// A single line of free text
    Line,
}

/// Turns a preprocessed region into text.
pub trait Recognizer: Send {
    fn recognize(&self, img: &GrayImage, kind: TextKind) -> Result<String>;
}

/// Runs the Tesseract CLI once per region.
pub struct TesseractRecognizer {
    executable: String,
}

impl TesseractRecognizer {
    pub fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
        }
    }

    fn args(kind: TextKind) -> Vec<&'static str> {
        // psm 7 = treat the image as a single text line
        let mut args = vec!["-l", "eng", "--psm", "7"];
        if kind == TextKind::Digits {
            args.extend(["-c", "tessedit_char_whitelist=0123456789:"]);
        }
        args
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, img: &GrayImage, kind: TextKind) -> Result<String> {
        if img.width() == 0 || img.height() == 0 {
            return Err(anyhow!("Empty region"));
        }

        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        let mut command = Command::new(&self.executable);
        command
            .arg(temp_input.path())
            .arg("stdout")
            .args(Self::args(kind));
        let output = run_with_timeout(&mut command, RECOGNIZE_TIMEOUT)
            .map_err(|e| anyhow!("Failed to run {}: {}", self.executable, e))?;

        if !output.status.success() {
            return Err(anyhow!("Tesseract failed: {}", output.stderr));
        }

        Ok(output.stdout.trim().to_string())
    }
}

struct BoundedOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Runs `command` to completion, killing it once `timeout` has passed.
///
/// Output goes to anonymous temp files rather than pipes, so a chatty child can
/// never stall on a full pipe while we poll.
fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<BoundedOutput> {
    let mut stdout = tempfile::tempfile()?;
    let mut stderr = tempfile::tempfile()?;

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout.try_clone()?))
        .stderr(Stdio::from(stderr.try_clone()?))
        .spawn()?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out after {}ms", timeout.as_millis()));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(BoundedOutput {
        status,
        stdout: read_back(&mut stdout)?,
        stderr: read_back(&mut stderr)?,
    })
}

fn read_back(file: &mut File) -> Result<String> {
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
