//! Replays a directory of recorded frames, one file per capture.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::FrameSource;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ReplaySource {
    frames: Vec<PathBuf>,
    next: usize,
}

impl ReplaySource {
    /// Collects the image files in `dir`, ordered by file name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(anyhow!("Frame directory not found: {}", dir.display()));
        }

        let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        frames.sort();

        crate::log(&format!(
            "Replay source: {} frame(s) from {}",
            frames.len(),
            dir.display()
        ));

        Ok(Self { frames, next: 0 })
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        self.frames.len() - self.next
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl FrameSource for ReplaySource {
    fn capture(&mut self) -> Result<Option<RgbaImage>> {
        let Some(path) = self.frames.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let img = image::open(path)
            .map_err(|e| anyhow!("Failed to load {}: {}", path.display(), e))?;
        Ok(Some(img.to_rgba8()))
    }

    fn is_finished(&self) -> bool {
        self.next >= self.frames.len()
    }
}
