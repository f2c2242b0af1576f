//! Metric query input.

use chrono::{DateTime, Utc};

use super::error::{CompileError, CompileResult};
use crate::expr::{self, Expr};
use crate::value::HumanDuration;

/// One output expression with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Selector {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    /// Parse selector text such as `sum(totalCount)`.
    pub fn parse(text: &str) -> CompileResult<Self> {
        Ok(Self::new(expr::parse(text)?))
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The alias, or the column name for a bare column reference.
    pub fn output_name(&self) -> CompileResult<&str> {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => Ok(alias),
            (None, Expr::Column(name)) => Ok(name),
            (None, other) => Err(CompileError::AmbiguousOutputName(other.to_string())),
        }
    }
}

/// Time range `[start, end)` with an optional bucket length.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Option<HumanDuration>,
    /// Overrides the schema's timestamp column.
    pub time_column: Option<String>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            step: None,
            time_column: None,
        }
    }

    pub fn with_step(mut self, step: HumanDuration) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = Some(column.into());
        self
    }

    /// Length of one bucket in seconds: the step, or the whole range.
    pub fn bucket_seconds(&self) -> CompileResult<i64> {
        let span = (self.end - self.start).num_seconds();
        if span <= 0 {
            return Err(CompileError::InvalidInterval(format!(
                "end {} is not after start {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        match &self.step {
            Some(step) if step.seconds() <= 0 => Err(CompileError::InvalidInterval(format!(
                "step `{step}` must be positive"
            ))),
            Some(step) => Ok(step.seconds()),
            None => Ok(span),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub name: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: false,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub limit: u64,
    pub offset: u64,
}

/// A declarative metric query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "builders have no effect until compiled"]
pub struct MetricQuery {
    pub selectors: Vec<Selector>,
    pub filter: Option<Expr>,
    pub group_by: Vec<String>,
    pub interval: Option<Interval>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Limit>,
}

impl MetricQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    /// Add a filter; repeated calls are ANDed.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => expr::binary(existing, expr::BinaryOp::And, condition),
            None => condition,
        });
        self
    }

    pub fn group_by<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.group_by.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some(Limit { limit, offset });
        self
    }
}
