//! Percentages written as `<number>%`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::{ValueError, ValueResult};

/// A percentage such as `50%`. Compares and hashes by its fraction (`0.5`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Percentage {
    percent: f64,
}

impl Percentage {
    pub fn parse(text: &str) -> ValueResult<Self> {
        let number = text
            .strip_suffix('%')
            .ok_or_else(|| ValueError::format(text, "percentage must end with `%`"))?;

        let percent: f64 = number
            .trim()
            .parse()
            .map_err(|_| ValueError::invalid(text, "not a number"))?;
        if !percent.is_finite() {
            return Err(ValueError::invalid(text, "percentage must be finite"));
        }

        Ok(Self { percent })
    }

    pub fn from_fraction(fraction: f64) -> Self {
        Self {
            percent: fraction * 100.0,
        }
    }

    /// The value divided by 100.
    pub fn fraction(&self) -> f64 {
        self.percent / 100.0
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }
}

impl PartialEq for Percentage {
    fn eq(&self, other: &Self) -> bool {
        OrderedFloat(self.fraction()) == OrderedFloat(other.fraction())
    }
}

impl Eq for Percentage {}

impl Hash for Percentage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        OrderedFloat(self.fraction()).hash(state);
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent)
    }
}

impl FromStr for Percentage {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Percentage {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Percentage> for String {
    fn from(value: Percentage) -> Self {
        value.to_string()
    }
}
