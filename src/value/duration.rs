//! Durations written as `<signed-integer><unit>`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ValueError, ValueResult};

/// Unit suffix of a [`HumanDuration`]. Case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    fn from_suffix(c: char) -> Option<Self> {
        match c {
            's' => Some(DurationUnit::Seconds),
            'm' => Some(DurationUnit::Minutes),
            'h' => Some(DurationUnit::Hours),
            'd' => Some(DurationUnit::Days),
            _ => None,
        }
    }

    pub fn suffix(&self) -> char {
        match self {
            DurationUnit::Seconds => 's',
            DurationUnit::Minutes => 'm',
            DurationUnit::Hours => 'h',
            DurationUnit::Days => 'd',
        }
    }

    /// Seconds in one unit.
    pub fn scale(&self) -> i64 {
        match self {
            DurationUnit::Seconds => 1,
            DurationUnit::Minutes => 60,
            DurationUnit::Hours => 3_600,
            DurationUnit::Days => 86_400,
        }
    }
}

/// A duration such as `1h`, stored as a second count plus the unit it was
/// written in.
///
/// Equality and hashing use the second count only, so `60m == 1h`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HumanDuration {
    seconds: i64,
    unit: DurationUnit,
}

impl HumanDuration {
    /// Parse `<signed-integer><unit>` where unit is one of `s`, `m`, `h`, `d`.
    pub fn parse(text: &str) -> ValueResult<Self> {
        if text.is_empty() {
            return Err(ValueError::format(text, "empty duration"));
        }
        if text.len() < 2 {
            return Err(ValueError::format(text, "duration needs a number and a unit"));
        }

        let suffix = text.chars().last().unwrap_or_default();
        let unit = DurationUnit::from_suffix(suffix)
            .ok_or_else(|| ValueError::format(text, format!("unknown duration unit `{suffix}`")))?;

        let body = &text[..text.len() - suffix.len_utf8()];
        let digits = body.strip_prefix(['-', '+']).unwrap_or(body);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValueError::format(text, "duration body must be an integer"));
        }

        let count: i64 = body
            .parse()
            .map_err(|_| ValueError::format(text, "duration out of range"))?;
        let seconds = count
            .checked_mul(unit.scale())
            .ok_or_else(|| ValueError::format(text, "duration out of range"))?;

        Ok(Self { seconds, unit })
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds,
            unit: DurationUnit::Seconds,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn unit(&self) -> DurationUnit {
        self.unit
    }
}

impl PartialEq for HumanDuration {
    fn eq(&self, other: &Self) -> bool {
        self.seconds == other.seconds
    }
}

impl Eq for HumanDuration {}

impl Hash for HumanDuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seconds.hash(state);
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.seconds / self.unit.scale(), self.unit.suffix())
    }
}

impl FromStr for HumanDuration {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HumanDuration {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HumanDuration> for String {
    fn from(value: HumanDuration) -> Self {
        value.to_string()
    }
}
