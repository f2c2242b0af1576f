//! H2 SQL dialect.
//!
//! H2 is an embedded database used for local development:
//! - ANSI identifier quoting (`"`)
//! - `LISTAGG` for string aggregation
//! - `DATEDIFF('SECOND', epoch, ts)` for timestamp to seconds conversion
//! - first/last need window functions

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::{func, lit_str, Expr};

/// H2 SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct H2;

impl SqlDialect for H2 {
    fn name(&self) -> &'static str {
        "h2"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_h2(name)
    }

    fn group_concat(&self, value: Expr) -> Option<Expr> {
        Some(func("LISTAGG", vec![value, lit_str(",")]))
    }

    fn time_floor(&self, time: Expr, seconds: i64) -> Option<Expr> {
        let epoch = func(
            "DATEDIFF",
            vec![
                lit_str("SECOND"),
                Expr::TypedString {
                    data_type: "TIMESTAMP",
                    value: "1970-01-01 00:00:00".into(),
                },
                time,
            ],
        );
        Some(helpers::floor_epoch(epoch, seconds))
    }
}
