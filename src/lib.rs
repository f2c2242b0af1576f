//! # Tally
//!
//! A metric query compiler that turns selectors over a metric schema into
//! staged SQL for one of several dialects.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Schema (dimensions, metrics, derived columns)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [expr parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │   MetricQuery (selectors, filter, group by, interval)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │         QueryPlan (1-3 stages, innermost first)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [plan serializer + dialect]
//! ┌─────────────────────────────────────────────────────────┐
//! │                       SQL text                           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod compile;
pub mod compiler;
pub mod config;
pub mod expr;
pub mod plan;
pub mod request;
pub mod schema;
pub mod sql;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile_query, compile_request, CompileOptions};
    pub use crate::compiler::{
        CompiledQuery, Compiler, ErrorKind, Interval, Limit, MetricQuery, OrderBy, OutputColumn,
        Selector,
    };
    pub use crate::expr::{parse, Expr, FunctionRegistry};
    pub use crate::plan::{QueryPlan, Stage};
    pub use crate::request::QueryRequest;
    pub use crate::schema::{DataType, Schema};
    pub use crate::sql::{Dialect, SqlDialect};
    pub use crate::value::{HumanDuration, HumanSize, Percentage};
}

// Also export at crate root for convenience
pub use compiler::{CompiledQuery, Compiler, MetricQuery};
pub use schema::Schema;
pub use sql::Dialect;
