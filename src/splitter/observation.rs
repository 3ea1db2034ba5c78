//! Per-tick observation snapshot and the channels it is sampled from.

use bitflags::bitflags;
use std::fmt;

/// A parsed pre-run countdown glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownDigit {
    One,
    Two,
    Three,
}

impl CountdownDigit {
    /// Maps a numeric digit to a countdown glyph. Only 1..=3 are countdown digits.
    pub fn from_digit(d: u32) -> Option<Self> {
        match d {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }
}

/// One independently sampled observation source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Timer,
    Stage,
    Session,
    Countdown,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Timer,
        Channel::Stage,
        Channel::Session,
        Channel::Countdown,
    ];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Timer => write!(f, "timer"),
            Channel::Stage => write!(f, "stage"),
            Channel::Session => write!(f, "session"),
            Channel::Countdown => write!(f, "countdown"),
        }
    }
}

bitflags! {
    /// Set of channels enabled for a tick.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ChannelSet: u8 {
        const TIMER     = 0b0001;
        const STAGE     = 0b0010;
        const SESSION   = 0b0100;
        const COUNTDOWN = 0b1000;
    }
}

impl From<Channel> for ChannelSet {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Timer => ChannelSet::TIMER,
            Channel::Stage => ChannelSet::STAGE,
            Channel::Session => ChannelSet::SESSION,
            Channel::Countdown => ChannelSet::COUNTDOWN,
        }
    }
}

impl ChannelSet {
    pub fn has(self, channel: Channel) -> bool {
        self.contains(channel.into())
    }

    /// Enabled channels in `Channel::ALL` order.
    pub fn channels(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |&c| self.has(c))
    }
}

impl fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.channels().map(|c| c.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// One tick's parsed signals. Any field may be absent on any tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// Parsed timer value in seconds
    pub timer_seconds: Option<u32>,
    /// Parsed pre-run countdown glyph
    pub countdown_digit: Option<CountdownDigit>,
    /// Free-text level/stage label
    pub stage_label: Option<String>,
    /// Free-text game-mode/session label
    pub session_label: Option<String>,
}

impl Observation {
    /// Drops every field whose channel was not enabled this tick.
    ///
    /// A disabled channel may still carry a stale value; it must never reach the rules.
    pub fn masked(&self, enabled: ChannelSet) -> Observation {
        Observation {
            timer_seconds: self.timer_seconds.filter(|_| enabled.has(Channel::Timer)),
            countdown_digit: self
                .countdown_digit
                .filter(|_| enabled.has(Channel::Countdown)),
            stage_label: self
                .stage_label
                .clone()
                .filter(|_| enabled.has(Channel::Stage)),
            session_label: self
                .session_label
                .clone()
                .filter(|_| enabled.has(Channel::Session)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timer_seconds.is_none()
            && self.countdown_digit.is_none()
            && self.stage_label.is_none()
            && self.session_label.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_set_membership() {
        let set = ChannelSet::TIMER | ChannelSet::STAGE;
        assert!(set.has(Channel::Timer));
        assert!(set.has(Channel::Stage));
        assert!(!set.has(Channel::Session));
        assert!(!set.has(Channel::Countdown));
        assert_eq!(set.channels().count(), 2);
        assert!(ChannelSet::empty().is_empty());
        assert_eq!(format!("{}", set), "[timer, stage]");
        assert_eq!(format!("{}", ChannelSet::empty()), "[]");
    }

    #[test]
    fn test_channel_conversion_matches_flags() {
        let all: ChannelSet = Channel::ALL
            .into_iter()
            .fold(ChannelSet::empty(), |set, c| set | ChannelSet::from(c));
        assert_eq!(all, ChannelSet::all());
        assert_eq!(
            format!("{}", all),
            "[timer, stage, session, countdown]"
        );
    }

    #[test]
    fn test_masked_drops_disabled_fields() {
        let obs = Observation {
            timer_seconds: Some(1800),
            countdown_digit: Some(CountdownDigit::Three),
            stage_label: Some("DOCKS".to_string()),
            session_label: Some("ZOMBIES".to_string()),
        };

        let masked = obs.masked(ChannelSet::COUNTDOWN | ChannelSet::SESSION);
        assert_eq!(masked.timer_seconds, None);
        assert_eq!(masked.stage_label, None);
        assert_eq!(masked.countdown_digit, Some(CountdownDigit::Three));
        assert_eq!(masked.session_label.as_deref(), Some("ZOMBIES"));

        assert!(obs.masked(ChannelSet::empty()).is_empty());
    }

    #[test]
    fn test_countdown_digit_range() {
        assert_eq!(CountdownDigit::from_digit(3), Some(CountdownDigit::Three));
        assert_eq!(CountdownDigit::from_digit(0), None);
        assert_eq!(CountdownDigit::from_digit(4), None);
    }
}
