//! Schema descriptor: dimensions, metrics and derived expression columns.
//!
//! Schemas are usually loaded from TOML:
//! ```toml
//! name = "jvm-metrics"
//! table = "bithon_jvm_metrics"
//! timestamp = "timestamp"
//!
//! [[dimensions]]
//! name = "appName"
//!
//! [[metrics]]
//! name = "activeThreads"
//! type = "long"
//! aggregator = "last"
//!
//! [[derived]]
//! name = "avgResponseTime"
//! expression = "sum(responseTime) / sum(totalCount)"
//! ```

mod graph;
mod loader;
mod types;

pub use types::DataType;

use indexmap::IndexMap;
use std::path::PathBuf;

use crate::expr::{self, AggregateFunc, Expr, FunctionRegistry, ParseError};
use graph::DerivedGraph;

/// Errors raised while building, loading or validating a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read schema file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse schema file: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Column `{0}` is declared more than once")]
    DuplicateColumn(String),

    #[error("Derived column `{column}` has an invalid expression: {source}")]
    InvalidExpression {
        column: String,
        #[source]
        source: ParseError,
    },

    #[error("Derived column `{column}` references unknown column `{reference}`")]
    UnknownColumn { column: String, reference: String },

    #[error("Derived column `{column}` calls unknown function `{function}`")]
    UnknownFunction { column: String, function: String },

    #[error("Unknown data type `{0}`")]
    UnknownDataType(String),

    #[error("Metric `{metric}` declares unknown aggregator `{aggregator}`")]
    UnknownAggregator { metric: String, aggregator: String },

    #[error("Derived columns form a cycle: {}", .0.join(" -> "))]
    DerivedCycle(Vec<String>),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub data_type: DataType,
    /// Applied when the metric is selected without an aggregate.
    pub aggregator: AggregateFunc,
}

/// A named expression reusable by name in selectors and filters.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub name: String,
    pub text: String,
    pub expr: Expr,
}

/// What a schema name resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind<'a> {
    Timestamp,
    Dimension(&'a Dimension),
    Metric(&'a Metric),
    Derived(&'a DerivedColumn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub table: String,
    pub timestamp: String,
    pub dimensions: IndexMap<String, Dimension>,
    pub metrics: IndexMap<String, Metric>,
    pub derived: IndexMap<String, DerivedColumn>,
}

impl Schema {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            timestamp: "timestamp".to_string(),
            dimensions: IndexMap::new(),
            metrics: IndexMap::new(),
            derived: IndexMap::new(),
        }
    }

    pub fn with_timestamp(mut self, column: impl Into<String>) -> Self {
        self.timestamp = column.into();
        self
    }

    pub fn with_dimension(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.dimensions.insert(
            name.clone(),
            Dimension {
                name,
                data_type: DataType::String,
            },
        );
        self
    }

    pub fn with_metric(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.with_metric_aggregator(name, data_type, AggregateFunc::Sum)
    }

    pub fn with_metric_aggregator(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        aggregator: AggregateFunc,
    ) -> Self {
        let name = name.into();
        self.metrics.insert(
            name.clone(),
            Metric {
                name,
                data_type,
                aggregator,
            },
        );
        self
    }

    /// Declare a derived column from expression text.
    pub fn with_derived(
        mut self,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> SchemaResult<Self> {
        let name = name.into();
        let text = text.into();
        let expr = expr::parse(&text).map_err(|source| SchemaError::InvalidExpression {
            column: name.clone(),
            source,
        })?;
        self.derived
            .insert(name.clone(), DerivedColumn { name, text, expr });
        Ok(self)
    }

    /// Resolve a name against the schema. Stored columns shadow derived ones.
    pub fn column(&self, name: &str) -> Option<ColumnKind<'_>> {
        if name == self.timestamp {
            return Some(ColumnKind::Timestamp);
        }
        if let Some(d) = self.dimensions.get(name) {
            return Some(ColumnKind::Dimension(d));
        }
        if let Some(m) = self.metrics.get(name) {
            return Some(ColumnKind::Metric(m));
        }
        self.derived.get(name).map(ColumnKind::Derived)
    }

    /// True for columns physically stored in the table.
    pub fn is_stored(&self, name: &str) -> bool {
        matches!(
            self.column(name),
            Some(ColumnKind::Timestamp | ColumnKind::Dimension(_) | ColumnKind::Metric(_))
        )
    }

    pub fn data_type(&self, name: &str) -> Option<DataType> {
        match self.column(name)? {
            ColumnKind::Timestamp => Some(DataType::Timestamp),
            ColumnKind::Dimension(d) => Some(d.data_type),
            ColumnKind::Metric(m) => Some(m.data_type),
            ColumnKind::Derived(_) => None,
        }
    }

    /// Every declared name, stored columns first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.timestamp.as_str())
            .chain(self.dimensions.keys().map(String::as_str))
            .chain(self.metrics.keys().map(String::as_str))
            .chain(self.derived.keys().map(String::as_str))
    }

    /// Check references in derived columns and reject dependency cycles.
    pub fn validate(&self, registry: &FunctionRegistry) -> SchemaResult<()> {
        for derived in self.derived.values() {
            for reference in derived.expr.columns() {
                if self.column(reference).is_none() {
                    return Err(SchemaError::UnknownColumn {
                        column: derived.name.clone(),
                        reference: reference.to_string(),
                    });
                }
            }

            let mut unknown = None;
            derived.expr.visit(&mut |e| {
                if let Expr::Call { name, .. } = e {
                    if unknown.is_none() && registry.get(name).is_none() {
                        unknown = Some(name.clone());
                    }
                }
                true
            });
            if let Some(function) = unknown {
                return Err(SchemaError::UnknownFunction {
                    column: derived.name.clone(),
                    function,
                });
            }
        }

        if let Some(cycle) = DerivedGraph::build(self).cycles().into_iter().next() {
            return Err(SchemaError::DerivedCycle(cycle));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new("http", "bithon_http_incoming")
            .with_dimension("appName")
            .with_metric("totalCount", DataType::Int)
            .with_metric("responseTime", DataType::Int)
            .with_derived("avgResponseTime", "sum(responseTime) / sum(totalCount)")
            .unwrap()
    }

    #[test]
    fn test_column_lookup() {
        let s = schema();
        assert_eq!(s.column("timestamp"), Some(ColumnKind::Timestamp));
        assert!(matches!(s.column("appName"), Some(ColumnKind::Dimension(_))));
        assert!(matches!(s.column("avgResponseTime"), Some(ColumnKind::Derived(_))));
        assert!(s.column("missing").is_none());
        assert!(s.is_stored("totalCount"));
        assert!(!s.is_stored("avgResponseTime"));
    }

    #[test]
    fn test_validate_ok() {
        schema().validate(&FunctionRegistry::builtin()).unwrap();
    }

    #[test]
    fn test_validate_unknown_reference() {
        let s = schema().with_derived("bad", "sum(nope)").unwrap();
        let err = s.validate(&FunctionRegistry::builtin()).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { reference, .. } if reference == "nope"));
    }

    #[test]
    fn test_validate_unknown_function() {
        let s = schema().with_derived("bad", "median(totalCount)").unwrap();
        let err = s.validate(&FunctionRegistry::builtin()).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFunction { function, .. } if function == "median"));
    }

    #[test]
    fn test_validate_cycle() {
        let s = schema()
            .with_derived("x", "y + 1")
            .unwrap()
            .with_derived("y", "x + 1")
            .unwrap();
        let err = s.validate(&FunctionRegistry::builtin()).unwrap_err();
        assert!(matches!(err, SchemaError::DerivedCycle(c) if c == vec!["x", "y"]));
    }

    #[test]
    fn test_invalid_derived_text() {
        let err = Schema::new("s", "t").with_derived("x", "sum(").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidExpression { .. }));
    }
}
