//! Frame sources for the sensing layer.
//!
//! This module provides:
//! - The `FrameSource` seam the worker loop captures from
//! - Directory replay of recorded screenshots (`ReplaySource`)

pub mod replay;

pub use replay::ReplaySource;

use anyhow::Result;
use image::RgbaImage;

/// Produces full frames of the watched area.
pub trait FrameSource: Send {
    /// Grabs the current frame, or `None` if nothing is available right now.
    fn capture(&mut self) -> Result<Option<RgbaImage>>;

    /// True once the source will never produce another frame.
    fn is_finished(&self) -> bool {
        false
    }
}
