//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), returns 1/0
//! - `GROUP_CONCAT` instead of `string_agg`
//! - Timestamps compare against plain string literals
//! - first/last need window functions (8.0+)

use chrono::{DateTime, Utc};

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::{func, lit_str, Expr};

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_timestamp(&self, ts: &DateTime<Utc>) -> Expr {
        lit_str(&ts.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_mysql(name)
    }

    fn group_concat(&self, value: Expr) -> Option<Expr> {
        Some(func("group_concat", vec![value]))
    }

    fn time_floor(&self, time: Expr, seconds: i64) -> Option<Expr> {
        Some(helpers::floor_epoch(
            func("unix_timestamp", vec![time]),
            seconds,
        ))
    }
}
