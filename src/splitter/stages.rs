//! Ordered stage matching with forward-skip recovery.
//!
//! Stage names are matched as case-insensitive substrings of the OCR text,
//! so partial or noisy reads still line up with the configured sequence.

use anyhow::{anyhow, Result};

/// Result of a successful forward match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageMatch {
    pub from: usize,
    pub to: usize,
}

impl StageMatch {
    /// Number of stages passed over without being recognized.
    pub fn skipped(&self) -> usize {
        self.to - self.from - 1
    }

    pub fn is_in_sequence(&self) -> bool {
        self.skipped() == 0
    }
}

/// Fixed ordered list of expected stage names.
#[derive(Clone, Debug)]
pub struct StageSequence {
    names: Vec<String>,
    /// Uppercased copies used for matching
    keys: Vec<String>,
}

impl StageSequence {
    pub fn new(names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Err(anyhow!("Stage sequence must contain at least one stage"));
        }
        if let Some(blank) = names.iter().position(|n| n.trim().is_empty()) {
            return Err(anyhow!("Stage {} has an empty name", blank));
        }
        Ok(Self {
            names: names.to_vec(),
            keys: names.iter().map(|n| n.trim().to_uppercase()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn final_index(&self) -> usize {
        self.names.len() - 1
    }

    pub fn is_final(&self, index: usize) -> bool {
        index == self.final_index()
    }

    /// Searches forward from `current + 1` for the first stage contained in `candidate`.
    ///
    /// Never rewinds: a label matching the current or an earlier stage yields `None`.
    pub fn match_forward(&self, candidate: &str, current: usize) -> Option<StageMatch> {
        let text = candidate.to_uppercase();
        self.keys
            .iter()
            .enumerate()
            .skip(current + 1)
            .find(|(_, key)| text.contains(key.as_str()))
            .map(|(to, _)| StageMatch { from: current, to })
    }
}

/// Returns true if a stage-label read is plausible enough to feed the matcher.
///
/// Rejects very short reads, anything with digits or punctuation once spaces are
/// removed, and reads containing the session keyword (handled as a transition marker).
pub fn is_clean_candidate(candidate: &str, session_keyword: &str) -> bool {
    let trimmed = candidate.trim();
    if trimmed.chars().count() <= 2 {
        return false;
    }
    if !trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .all(char::is_alphabetic)
    {
        return false;
    }
    !contains_keyword(trimmed, session_keyword)
}

/// Case-insensitive substring test. An empty keyword never matches.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    !keyword.is_empty() && text.to_uppercase().contains(&keyword.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence() -> StageSequence {
        let names: Vec<String> = ["Harbor", "Old Town", "Sewers", "Factory", "Rooftops"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        StageSequence::new(&names).unwrap()
    }

    #[test]
    fn test_forward_only_rejects_regression() {
        let stages = sequence();
        assert_eq!(stages.match_forward("OLD TOWN", 2), None);
        assert_eq!(stages.match_forward("sewers", 2), None);
    }

    #[test]
    fn test_skip_reports_count() {
        let stages = sequence();
        let m = stages.match_forward("ROOFTOPS", 2).unwrap();
        assert_eq!(m.to, 4);
        assert_eq!(m.skipped(), 1);
        assert!(!m.is_in_sequence());
    }

    #[test]
    fn test_in_sequence_substring_match() {
        let stages = sequence();
        let m = stages.match_forward("ZONE  old town  NORTH", 0).unwrap();
        assert_eq!(m, StageMatch { from: 0, to: 1 });
        assert!(m.is_in_sequence());
    }

    #[test]
    fn test_no_match_past_final() {
        let stages = sequence();
        assert_eq!(stages.match_forward("ROOFTOPS", 4), None);
        assert!(stages.is_final(4));
        assert_eq!(stages.final_index(), 4);
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert!(StageSequence::new(&[]).is_err());
        assert!(StageSequence::new(&["  ".to_string()]).is_err());
    }

    #[test]
    fn test_candidate_filter() {
        assert!(is_clean_candidate("Old Town", "ZOMBIES"));
        assert!(!is_clean_candidate("OT", "ZOMBIES"));
        assert!(!is_clean_candidate("  ab ", "ZOMBIES"));
        assert!(!is_clean_candidate("Sewers 2", "ZOMBIES"));
        assert!(!is_clean_candidate("Sewers!", "ZOMBIES"));
        assert!(!is_clean_candidate("zombies incoming", "ZOMBIES"));
    }

    #[test]
    fn test_contains_keyword() {
        assert!(contains_keyword("--Zombies--", "ZOMBIES"));
        assert!(!contains_keyword("Harbor", "ZOMBIES"));
        assert!(!contains_keyword("Harbor", ""));
    }
}
