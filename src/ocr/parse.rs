//! Text-to-value parsers for OCR output.

use regex::Regex;
use std::sync::OnceLock;

use crate::splitter::observation::CountdownDigit;

/// `M:SS` or `MM:SS`; `.` and spaces are accepted as separators.
const TIME_PATTERN: &str = r"(\d{1,2})\s*[:. ]\s*(\d{2})";

fn time_regex() -> Option<&'static Regex> {
    static TIME_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    TIME_REGEX
        .get_or_init(|| Regex::new(TIME_PATTERN).ok())
        .as_ref()
}

/// Replaces the usual OCR misreads of zero.
fn normalize_zero(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'O' | 'o' | 'D' | 'Q' => '0',
            other => other,
        })
        .collect()
}

/// Parses a timer display into seconds.
///
/// Returns `None` when no `MM:SS` pattern is found or the seconds field is out of range.
pub fn parse_time(text: &str) -> Option<u32> {
    let normalized = normalize_zero(text);
    let caps = time_regex()?.captures(&normalized)?;
    let minutes: u32 = caps[1].parse().ok()?;
    let seconds: u32 = caps[2].parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    Some(minutes * 60 + seconds)
}

/// Parses a single countdown glyph.
pub fn parse_countdown(text: &str) -> Option<CountdownDigit> {
    let c = text.trim().chars().next()?;
    let digit = match c {
        'l' | 'I' | '|' => 1,
        c => c.to_digit(10)?,
    };
    CountdownDigit::from_digit(digit)
}

/// Trims a label; blank reads are absent.
pub fn parse_label(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
