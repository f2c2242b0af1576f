//! ClickHouse SQL dialect.
//!
//! ClickHouse differences from ANSI:
//! - `argMin`/`argMax` aggregates give first/last values without windows
//! - `toStartOfInterval` for time bucketing
//! - SELECT aliases are visible in WHERE
//! - DateTime columns compare against `fromUnixTimestamp(...)`

use chrono::{DateTime, Utc};

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::{func, lit_int, lit_str, Expr};

/// ClickHouse SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct ClickHouse;

impl SqlDialect for ClickHouse {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn format_timestamp(&self, ts: &DateTime<Utc>) -> Expr {
        func("fromUnixTimestamp", vec![lit_int(ts.timestamp())])
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_clickhouse(name)
    }

    fn use_window_function_as_aggregator(&self, _name: &str) -> bool {
        false
    }

    fn first_last_aggregate(&self, last: bool, value: Expr, time: Expr) -> Option<Expr> {
        let name = if last { "argMax" } else { "argMin" };
        Some(func(name, vec![value, time]))
    }

    fn group_concat(&self, value: Expr) -> Option<Expr> {
        Some(func(
            "arrayStringConcat",
            vec![func("groupArray", vec![value]), lit_str(",")],
        ))
    }

    fn count_distinct(&self, value: Expr) -> Expr {
        func("uniqExact", vec![value])
    }

    fn time_floor(&self, time: Expr, seconds: i64) -> Option<Expr> {
        let start = func(
            "toStartOfInterval",
            vec![
                time,
                Expr::Interval {
                    value: seconds,
                    unit: "SECOND",
                },
            ],
        );
        Some(func("toUnixTimestamp", vec![start]))
    }

    fn allows_alias_in_where(&self) -> bool {
        true
    }
}
