//! End-to-end compilation from files or JSON requests to SQL.
//!
//! This module provides the high-level API used by the CLI:
//!
//! ```text
//! schema TOML ─▶ Schema ─┐
//!                        ├─▶ Compiler ─▶ QueryPlan ─▶ SQL
//! request JSON ─▶ MetricQuery ┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tally::compile::{compile_request, CompileOptions};
//! use tally::schema::Schema;
//! use tally::sql::Dialect;
//!
//! let schema = Schema::from_file("schemas/jvm.toml")?;
//! let request = r#"{ "selectors": [{ "expression": "sum(totalCount)" }] }"#;
//!
//! let options = CompileOptions::default().with_dialect(Dialect::ClickHouse);
//! let compiled = compile_request(&schema, request, &options)?;
//! println!("{}", compiled.sql);
//! ```

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::compiler::{self, CompiledQuery, Compiler, ErrorKind, MetricQuery};
use crate::config::{Settings, SettingsError};
use crate::expr::FunctionRegistry;
use crate::request::{QueryRequest, RequestError};
use crate::schema::{Schema, SchemaError};
use crate::sql::Dialect;

/// Errors that can occur anywhere between reading inputs and emitting SQL.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("{0}")]
    Compile(#[from] compiler::CompileError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Error class of a request or compilation failure. Schema, settings
    /// and I/O problems have no class.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CompileError::Request(e) => Some(e.kind()),
            CompileError::Compile(e) => Some(e.kind()),
            _ => None,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Options for compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,
    /// Multi-line SQL output.
    pub pretty: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            pretty: true,
        }
    }
}

impl CompileOptions {
    /// Take the defaults from the `[compiler]` section of the settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dialect: settings.compiler.dialect,
            pretty: settings.compiler.pretty,
        }
    }

    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Compile a metric query built in code.
pub fn compile_query(
    schema: &Schema,
    query: &MetricQuery,
    options: &CompileOptions,
) -> CompileResult<CompiledQuery> {
    let registry = FunctionRegistry::builtin();
    schema.validate(&registry)?;

    let compiled = Compiler::new(schema, &options.dialect, &registry)
        .pretty(options.pretty)
        .compile(query)?;
    Ok(compiled)
}

/// Compile a JSON query request.
pub fn compile_request(
    schema: &Schema,
    json: &str,
    options: &CompileOptions,
) -> CompileResult<CompiledQuery> {
    let query = QueryRequest::from_json(json)?.into_query()?;
    debug!(
        schema = %schema.name,
        selectors = query.selectors.len(),
        "parsed query request"
    );
    compile_query(schema, &query, options)
}

/// Compile the request in `query_path` against the schema in `schema_path`.
pub fn compile_files(
    schema_path: impl AsRef<Path>,
    query_path: impl AsRef<Path>,
    options: &CompileOptions,
) -> CompileResult<CompiledQuery> {
    let schema_path = schema_path.as_ref();
    let query_path = query_path.as_ref();

    let schema = Schema::from_file(schema_path)?;
    let json = fs::read_to_string(query_path).map_err(|source| CompileError::Io {
        path: query_path.display().to_string(),
        source,
    })?;

    info!(
        schema = %schema_path.display(),
        query = %query_path.display(),
        dialect = %options.dialect,
        "compiling"
    );
    compile_request(&schema, &json, options)
}

/// Load and validate a schema file.
pub fn check_schema(path: impl AsRef<Path>) -> CompileResult<Schema> {
    let schema = Schema::from_file(path)?;
    schema.validate(&FunctionRegistry::builtin())?;
    Ok(schema)
}
