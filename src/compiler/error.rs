//! Compile errors.

use crate::expr::ParseError;

/// Errors raised while compiling a metric query.
///
/// All of them are deterministic in the (query, schema, dialect) triple:
/// retrying with the same inputs reproduces the same error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("Invalid expression: {0}")]
    Parse(#[from] ParseError),

    #[error("Unknown column `{0}`")]
    UnknownColumn(String),

    #[error("Unknown function `{0}`")]
    UnknownFunction(String),

    #[error("Derived columns form a cycle: {}", .0.join(" -> "))]
    DerivedCycle(Vec<String>),

    #[error("`{0}` is not an output column")]
    UnknownOutput(String),

    #[error("Aggregate `{inner}` is nested inside `{outer}`")]
    NestedAggregate { outer: String, inner: String },

    #[error("Macro `{{{0}}}` cannot be resolved")]
    UnresolvedMacro(String),

    #[error("Column `{column}` is neither aggregated nor grouped in `{expr}`")]
    UngroupedColumn { expr: String, column: String },

    #[error("Filter `{0}` combines raw columns and aggregated values in one OR/NOT branch")]
    MixedFilterLevels(String),

    #[error("Unsupported expression `{expr}`: {reason}")]
    Unsupported { expr: String, reason: String },

    #[error("Selector `{0}` needs an alias")]
    AmbiguousOutputName(String),

    #[error("Output name `{0}` is used more than once")]
    DuplicateOutputName(String),

    /// The dialect resolves a name inside a SELECT to a sibling alias
    /// before the table column, so the alias would change what is read.
    #[error("Output name `{alias}` hides column `{alias}` read in the same SELECT on {dialect}")]
    ShadowedColumn {
        alias: String,
        dialect: &'static str,
    },

    #[error("Dialect `{dialect}` cannot render {construct}")]
    DialectCapability {
        dialect: &'static str,
        construct: String,
    },

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Query has no selectors")]
    NoSelectors,
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Coarse error classes reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed human-readable literal.
    Format,
    /// Expression text that does not parse.
    Syntax,
    /// Unknown column, function or derived-column cycle.
    SchemaResolution,
    /// Nested aggregates, unresolved macros, unroutable filters.
    UnsupportedExpression,
    AmbiguousOutputName,
    DialectCapability,
    InvalidInterval,
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Parse(ParseError::Literal { .. }) => ErrorKind::Format,
            CompileError::Parse(ParseError::Syntax { .. }) => ErrorKind::Syntax,
            CompileError::UnknownColumn(_)
            | CompileError::UnknownFunction(_)
            | CompileError::DerivedCycle(_)
            | CompileError::UnknownOutput(_) => ErrorKind::SchemaResolution,
            CompileError::NestedAggregate { .. }
            | CompileError::UnresolvedMacro(_)
            | CompileError::UngroupedColumn { .. }
            | CompileError::MixedFilterLevels(_)
            | CompileError::Unsupported { .. }
            | CompileError::NoSelectors => ErrorKind::UnsupportedExpression,
            CompileError::AmbiguousOutputName(_)
            | CompileError::DuplicateOutputName(_)
            | CompileError::ShadowedColumn { .. } => ErrorKind::AmbiguousOutputName,
            CompileError::DialectCapability { .. } => ErrorKind::DialectCapability,
            CompileError::InvalidInterval(_) => ErrorKind::InvalidInterval,
        }
    }

    pub(crate) fn unsupported(expr: impl ToString, reason: impl Into<String>) -> Self {
        CompileError::Unsupported {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}
