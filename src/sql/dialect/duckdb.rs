//! DuckDB SQL dialect.
//!
//! DuckDB is PostgreSQL-compatible with extensions:
//! - ANSI identifier quoting (`"`)
//! - `arg_min`/`arg_max` aggregates for first/last values
//! - `epoch()` for timestamp to seconds conversion

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::{func, Expr};

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn use_window_function_as_aggregator(&self, _name: &str) -> bool {
        false
    }

    fn first_last_aggregate(&self, last: bool, value: Expr, time: Expr) -> Option<Expr> {
        let name = if last { "arg_max" } else { "arg_min" };
        Some(func(name, vec![value, time]))
    }

    fn time_floor(&self, time: Expr, seconds: i64) -> Option<Expr> {
        Some(helpers::floor_epoch(func("epoch", vec![time]), seconds))
    }
}
