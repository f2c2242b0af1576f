//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - No first/last aggregate, computed with `first_value` windows
//! - `date_part('epoch', ...)` for timestamp to seconds conversion

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::{func, lit_str, Expr};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn time_floor(&self, time: Expr, seconds: i64) -> Option<Expr> {
        let epoch = func("date_part", vec![lit_str("epoch"), time]);
        Some(helpers::floor_epoch(epoch, seconds))
    }
}
