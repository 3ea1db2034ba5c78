//! Sensing layer: frame capture, per-channel OCR, and parsing into an `Observation`.
//!
//! Only channels enabled by the scheduler are cropped and recognized. Every
//! failure inside a channel is logged and leaves that field absent.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::sync::{Arc, Mutex};

use crate::automation::config::{Regions, RelativeRect};
use crate::capture::FrameSource;
use crate::ocr::{binarize, crop_region, parse_countdown, parse_label, parse_time, Recognizer, TextKind};
use crate::splitter::{Channel, ChannelSet, Observation};

/// Capture regions shared with the front end; replaced at any time, read once per tick.
pub type SharedRegions = Arc<Mutex<Regions>>;

pub struct Sensor {
    source: Box<dyn FrameSource>,
    recognizer: Box<dyn Recognizer>,
    regions: SharedRegions,
    threshold: u8,
}

impl Sensor {
    pub fn new(
        source: Box<dyn FrameSource>,
        recognizer: Box<dyn Recognizer>,
        regions: Regions,
        threshold: u8,
    ) -> Self {
        Self {
            source,
            recognizer,
            regions: Arc::new(Mutex::new(regions)),
            threshold,
        }
    }

    pub fn regions(&self) -> SharedRegions {
        Arc::clone(&self.regions)
    }

    pub fn source_finished(&self) -> bool {
        self.source.is_finished()
    }

    /// Samples the enabled channels for one tick.
    pub fn observe(&mut self, enabled: ChannelSet) -> Observation {
        let mut observation = Observation::default();
        if enabled.is_empty() {
            return observation;
        }

        let frame = match self.source.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => return observation,
            Err(e) => {
                crate::log(&format!("Capture failed: {}", e));
                return observation;
            }
        };

        let regions = match self.regions.lock() {
            Ok(regions) => regions.clone(),
            Err(_) => {
                crate::log("Region lock poisoned, skipping tick");
                return observation;
            }
        };

        for channel in enabled.channels() {
            let Some(region) = regions.get(channel) else {
                continue;
            };
            let text = match self.read_channel(&frame, region, channel) {
                Ok(text) => text,
                Err(e) => {
                    crate::log(&format!("Recognition failed for {} channel: {}", channel, e));
                    continue;
                }
            };
            match channel {
                Channel::Timer => observation.timer_seconds = parse_time(&text),
                Channel::Countdown => observation.countdown_digit = parse_countdown(&text),
                Channel::Stage => observation.stage_label = parse_label(&text),
                Channel::Session => observation.session_label = parse_label(&text),
            }
        }

        observation
    }

    fn read_channel(&self, frame: &RgbaImage, region: &RelativeRect, channel: Channel) -> Result<String> {
        let cropped = crop_region(frame, region);
        if cropped.width() == 0 || cropped.height() == 0 {
            return Err(anyhow!("region lies outside the frame"));
        }
        let kind = match channel {
            Channel::Timer | Channel::Countdown => TextKind::Digits,
            Channel::Stage | Channel::Session => TextKind::Line,
        };
        self.recognizer.recognize(&binarize(&cropped, self.threshold), kind)
    }
}

#[cfg(test)]
pub mod fakes {
    //! Scripted collaborators for the sensing layer.

    use super::*;
    use image::{GrayImage, ImageBuffer, Rgba};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed number of blank frames, counting captures.
    pub struct BlankFrames {
        pub remaining: Option<usize>,
        pub captures: Arc<AtomicUsize>,
    }

    impl BlankFrames {
        pub fn endless() -> Self {
            Self {
                remaining: None,
                captures: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn limited(count: usize) -> Self {
            Self {
                remaining: Some(count),
                captures: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl FrameSource for BlankFrames {
        fn capture(&mut self) -> Result<Option<RgbaImage>> {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    return Ok(None);
                }
                *remaining -= 1;
            }
            self.captures.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ImageBuffer::from_pixel(100, 100, Rgba([0, 0, 0, 255]))))
        }

        fn is_finished(&self) -> bool {
            self.remaining == Some(0)
        }
    }

    /// Regions of distinct widths on a 100px frame, so the recognizer can tell channels apart.
    pub fn test_regions() -> Regions {
        let rect = |width: f32| Some(RelativeRect { x: 0.0, y: 0.0, width, height: 0.1 });
        Regions {
            timer: rect(0.1),
            stage: rect(0.2),
            session: rect(0.3),
            countdown: rect(0.4),
        }
    }

    pub fn channel_for_width(width: u32) -> Option<Channel> {
        match width {
            10 => Some(Channel::Timer),
            20 => Some(Channel::Stage),
            30 => Some(Channel::Session),
            40 => Some(Channel::Countdown),
            _ => None,
        }
    }

    /// Returns queued text per channel; an exhausted queue repeats its last entry.
    /// `Err` entries simulate recognizer failures.
    pub struct ScriptedRecognizer {
        pub scripts: Mutex<Vec<(Channel, VecDeque<Result<String, String>>)>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl ScriptedRecognizer {
        pub fn new(scripts: Vec<(Channel, Vec<Result<&str, &str>>)>) -> Self {
            let scripts = scripts
                .into_iter()
                .map(|(channel, texts)| {
                    let queue = texts
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect();
                    (channel, queue)
                })
                .collect();
            Self {
                scripts: Mutex::new(scripts),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Recognizer for ScriptedRecognizer {
        fn recognize(&self, img: &GrayImage, _kind: TextKind) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let channel = channel_for_width(img.width())
                .ok_or_else(|| anyhow!("unexpected region width {}", img.width()))?;
            let mut scripts = self.scripts.lock().map_err(|_| anyhow!("poisoned"))?;
            let queue = scripts
                .iter_mut()
                .find(|(c, _)| *c == channel)
                .map(|(_, q)| q)
                .ok_or_else(|| anyhow!("no script for {}", channel))?;
            let entry = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            match entry {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(anyhow!(e)),
                None => Ok(String::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::splitter::CountdownDigit;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_only_enabled_channels_are_recognized() {
        let recognizer = ScriptedRecognizer::new(vec![
            (Channel::Timer, vec![Ok("30:00")]),
            (Channel::Stage, vec![Ok("HARBOR")]),
            (Channel::Session, vec![Ok(" ZOMBIES ")]),
            (Channel::Countdown, vec![Ok("3")]),
        ]);
        let calls = Arc::clone(&recognizer.calls);
        let mut sensor = Sensor::new(
            Box::new(BlankFrames::endless()),
            Box::new(recognizer),
            test_regions(),
            150,
        );

        let obs = sensor.observe(ChannelSet::COUNTDOWN | ChannelSet::SESSION);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(obs.countdown_digit, Some(CountdownDigit::Three));
        assert_eq!(obs.session_label.as_deref(), Some("ZOMBIES"));
        assert_eq!(obs.timer_seconds, None);
        assert_eq!(obs.stage_label, None);

        let obs = sensor.observe(ChannelSet::TIMER | ChannelSet::STAGE);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(obs.timer_seconds, Some(1800));
        assert_eq!(obs.stage_label.as_deref(), Some("HARBOR"));
    }

    #[test]
    fn test_empty_schedule_skips_capture() {
        let source = BlankFrames::endless();
        let captures = Arc::clone(&source.captures);
        let mut sensor = Sensor::new(
            Box::new(source),
            Box::new(ScriptedRecognizer::new(Vec::new())),
            test_regions(),
            150,
        );

        assert!(sensor.observe(ChannelSet::empty()).is_empty());
        assert_eq!(captures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failures_leave_fields_absent() {
        let recognizer = ScriptedRecognizer::new(vec![
            (Channel::Timer, vec![Err("tesseract crashed")]),
            (Channel::Stage, vec![Ok("12:3x")]),
        ]);
        let mut sensor = Sensor::new(
            Box::new(BlankFrames::endless()),
            Box::new(recognizer),
            test_regions(),
            150,
        );

        let obs = sensor.observe(ChannelSet::TIMER | ChannelSet::STAGE);
        assert_eq!(obs.timer_seconds, None);
        assert_eq!(obs.stage_label.as_deref(), Some("12:3x"));
    }

    #[test]
    fn test_unparsable_timer_is_absent() {
        let recognizer = ScriptedRecognizer::new(vec![(Channel::Timer, vec![Ok("--:--")])]);
        let mut sensor = Sensor::new(
            Box::new(BlankFrames::endless()),
            Box::new(recognizer),
            test_regions(),
            150,
        );
        assert!(sensor.observe(ChannelSet::TIMER).is_empty());
    }

    #[test]
    fn test_region_update_applies_next_tick() {
        let recognizer = ScriptedRecognizer::new(vec![
            (Channel::Timer, vec![Ok("05:00")]),
            (Channel::Stage, vec![Ok("SEWERS")]),
        ]);
        let mut sensor = Sensor::new(
            Box::new(BlankFrames::endless()),
            Box::new(recognizer),
            Regions::default(),
            150,
        );

        // No regions configured: nothing can be read.
        assert!(sensor.observe(ChannelSet::TIMER).is_empty());

        *sensor.regions().lock().unwrap() = test_regions();
        let obs = sensor.observe(ChannelSet::TIMER);
        assert_eq!(obs.timer_seconds, Some(300));
    }

    #[test]
    fn test_exhausted_source() {
        let mut sensor = Sensor::new(
            Box::new(BlankFrames::limited(1)),
            Box::new(ScriptedRecognizer::new(vec![(Channel::Timer, vec![Ok("01:00")])])),
            test_regions(),
            150,
        );
        assert!(!sensor.source_finished());
        assert_eq!(sensor.observe(ChannelSet::TIMER).timer_seconds, Some(60));
        assert!(sensor.source_finished());
        assert!(sensor.observe(ChannelSet::TIMER).is_empty());
    }
}
