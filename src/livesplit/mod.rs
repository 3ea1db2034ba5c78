//! Outbound control of the external run timer (LiveSplit Server).
//!
//! This module provides:
//! - The text-line command set (`TimerCommand`)
//! - The `TimerClient` seam used by the splitter's effect layer
//! - A TCP client with drop-on-failure reconnect semantics

pub mod client;

pub use client::{LiveSplitClient, TimerClient, TimerCommand};

#[cfg(test)]
pub use client::RecordingClient;
