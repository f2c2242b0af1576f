//! Byte and decimal magnitudes such as `10K`, `1MiB` or `2GB`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ValueError, ValueResult};

const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Unit system used when formatting a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    /// IEC units, base 1024: `KiB`, `MiB`, ...
    #[default]
    Binary,
    /// Base 1000 with a byte suffix: `KB`, `MB`, ...
    DecimalByte,
    /// Base 1000 without suffix: `K`, `M`, ...
    Decimal,
}

impl UnitSystem {
    fn base(&self) -> i64 {
        match self {
            UnitSystem::Binary => 1024,
            UnitSystem::DecimalByte | UnitSystem::Decimal => 1000,
        }
    }

    fn suffix(&self, prefix: char) -> String {
        match self {
            UnitSystem::Binary => format!("{prefix}iB"),
            UnitSystem::DecimalByte => format!("{prefix}B"),
            UnitSystem::Decimal => prefix.to_string(),
        }
    }

    fn bare(&self, value: i64) -> String {
        match self {
            UnitSystem::Binary | UnitSystem::DecimalByte => format!("{value}B"),
            UnitSystem::Decimal => value.to_string(),
        }
    }
}

/// A non-negative magnitude parsed from `<integer>[unit]`.
///
/// `K M G T P` are decimal (x1000). `Ki Mi ..`, `KiB MiB ..` and `KB MB ..`
/// are binary (x1024). A lone `B` means bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HumanSize {
    value: i64,
}

impl HumanSize {
    pub fn parse(text: &str) -> ValueResult<Self> {
        if text.is_empty() {
            return Err(ValueError::format(text, "empty size"));
        }
        if text.starts_with('-') {
            return Err(ValueError::format(text, "size must not be negative"));
        }

        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);
        if digits.is_empty() {
            return Err(ValueError::format(text, "size must start with an integer"));
        }

        let number: i64 = digits
            .parse()
            .map_err(|_| ValueError::format(text, "size out of range"))?;
        let multiplier = unit_multiplier(unit)
            .ok_or_else(|| ValueError::format(text, format!("unknown size unit `{unit}`")))?;
        let value = number
            .checked_mul(multiplier)
            .ok_or_else(|| ValueError::format(text, "size out of range"))?;

        Ok(Self { value })
    }

    pub fn from_value(value: i64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Format `value` with `precision` fractional digits (0..=3).
    pub fn format(value: i64, precision: usize, system: UnitSystem) -> ValueResult<String> {
        if precision > 3 {
            return Err(ValueError::invalid(
                &precision.to_string(),
                "precision must be between 0 and 3",
            ));
        }

        let base = system.base();
        if value > -base && value < base {
            return Ok(system.bare(value));
        }

        let magnitude = value.unsigned_abs();
        let mut exponent = 0usize;
        let mut scale: u64 = 1;
        while exponent < PREFIXES.len() {
            match scale.checked_mul(base as u64) {
                Some(next) if next <= magnitude => {
                    scale = next;
                    exponent += 1;
                }
                _ => break,
            }
        }

        let scaled = value as f64 / scale as f64;
        Ok(format!(
            "{:.*}{}",
            precision,
            scaled,
            system.suffix(PREFIXES[exponent - 1])
        ))
    }
}

fn unit_multiplier(unit: &str) -> Option<i64> {
    if unit.is_empty() {
        return Some(1);
    }
    if unit.eq_ignore_ascii_case("b") {
        return Some(1);
    }

    let mut chars = unit.chars();
    let prefix = chars.next()?.to_ascii_uppercase();
    let exponent = PREFIXES[..5].iter().position(|p| *p == prefix)? as u32 + 1;
    let rest = chars.as_str().to_ascii_lowercase();

    match rest.as_str() {
        "" => Some(1000i64.pow(exponent)),
        "i" | "ib" | "b" => Some(1024i64.pow(exponent)),
        _ => None,
    }
}

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for HumanSize {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HumanSize {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HumanSize> for String {
    fn from(value: HumanSize) -> Self {
        value.to_string()
    }
}
