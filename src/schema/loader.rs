//! TOML schema loading.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{DataType, Schema, SchemaError, SchemaResult};
use crate::expr::AggregateFunc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchema {
    name: String,
    table: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    dimensions: Vec<RawDimension>,
    #[serde(default)]
    metrics: Vec<RawMetric>,
    #[serde(default)]
    derived: Vec<RawDerived>,
}

#[derive(Debug, Deserialize)]
struct RawDimension {
    name: String,
    #[serde(rename = "type")]
    data_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMetric {
    name: String,
    #[serde(rename = "type")]
    data_type: Option<String>,
    aggregator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDerived {
    name: String,
    expression: String,
}

fn data_type(name: Option<&str>, default: DataType) -> SchemaResult<DataType> {
    match name {
        None => Ok(default),
        Some(n) => DataType::from_name(n).ok_or_else(|| SchemaError::UnknownDataType(n.into())),
    }
}

impl Schema {
    /// Load a schema from a TOML document. The table defaults to the schema name.
    pub fn from_toml_str(content: &str) -> SchemaResult<Self> {
        let raw: RawSchema = toml::from_str(content)?;

        let table = raw.table.unwrap_or_else(|| raw.name.clone());
        let mut schema = Schema::new(raw.name, table);
        if let Some(ts) = raw.timestamp {
            schema = schema.with_timestamp(ts);
        }

        for dim in raw.dimensions {
            if schema.column(&dim.name).is_some() {
                return Err(SchemaError::DuplicateColumn(dim.name));
            }
            let dt = data_type(dim.data_type.as_deref(), DataType::String)?;
            schema = schema.with_dimension(dim.name.clone());
            if let Some(d) = schema.dimensions.get_mut(&dim.name) {
                d.data_type = dt;
            }
        }

        for metric in raw.metrics {
            if schema.column(&metric.name).is_some() {
                return Err(SchemaError::DuplicateColumn(metric.name));
            }
            let dt = data_type(metric.data_type.as_deref(), DataType::Int)?;
            let aggregator = match metric.aggregator {
                None => AggregateFunc::Sum,
                Some(a) => AggregateFunc::from_name(&a).ok_or(SchemaError::UnknownAggregator {
                    metric: metric.name.clone(),
                    aggregator: a,
                })?,
            };
            schema = schema.with_metric_aggregator(metric.name, dt, aggregator);
        }

        for derived in raw.derived {
            if schema.column(&derived.name).is_some() {
                return Err(SchemaError::DuplicateColumn(derived.name));
            }
            schema = schema.with_derived(derived.name, derived.expression)?;
        }

        Ok(schema)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SchemaError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
