//! Column data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type of a schema column or a compiled output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    #[serde(alias = "long", alias = "integer")]
    Int,
    #[serde(alias = "double", alias = "decimal")]
    Float,
    #[serde(alias = "boolean")]
    Bool,
    Timestamp,
}

impl DataType {
    /// Parse a data type from a string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" => Some(DataType::String),
            "int" | "integer" | "long" => Some(DataType::Int),
            "float" | "double" | "decimal" => Some(DataType::Float),
            "bool" | "boolean" => Some(DataType::Bool),
            "timestamp" => Some(DataType::Timestamp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Bool => "bool",
            DataType::Timestamp => "timestamp",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }

    /// Result type of arithmetic over two operands.
    pub fn widen(self, other: DataType) -> DataType {
        match (self, other) {
            (DataType::Int, DataType::Int) => DataType::Int,
            _ => DataType::Float,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
