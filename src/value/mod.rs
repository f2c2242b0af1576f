//! Human-readable literal values.
//!
//! Three literal families show up in metric queries and configuration:
//!
//! - [`HumanDuration`] - `30s`, `5m`, `1h`, `7d`
//! - [`HumanSize`] - `512`, `10K`, `1MiB`, `2GB`
//! - [`Percentage`] - `50%`, `12.5%`
//!
//! Each parses to a canonical numeric value and compares/hashes by that
//! value, never by its spelling.

mod duration;
mod percentage;
mod size;

pub use duration::{DurationUnit, HumanDuration};
pub use percentage::Percentage;
pub use size::{HumanSize, UnitSystem};

/// Errors produced while parsing or formatting human-readable values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("invalid format `{text}`: {reason}")]
    Format { text: String, reason: String },

    #[error("invalid value `{text}`: {reason}")]
    InvalidValue { text: String, reason: String },
}

impl ValueError {
    pub(crate) fn format(text: &str, reason: impl Into<String>) -> Self {
        ValueError::Format {
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(text: &str, reason: impl Into<String>) -> Self {
        ValueError::InvalidValue {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ValueResult<T> = Result<T, ValueError>;
