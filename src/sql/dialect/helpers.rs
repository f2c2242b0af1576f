//! Building blocks the five dialects share.

use chrono::{DateTime, Utc};

use super::super::expr::{
    binary, func, lit_float, lit_int, lit_str, BinaryOperator, Expr, WindowOrderBy,
};
use super::super::token::{Token, TokenStream};

/// `"name"`, doubling embedded quotes.
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `` `name` `` for MySQL.
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

pub fn format_bool_literal(b: bool) -> &'static str {
    ["false", "true"][usize::from(b)]
}

pub fn format_bool_numeric(b: bool) -> &'static str {
    ["0", "1"][usize::from(b)]
}

/// `LIMIT n OFFSET m`. A zero offset is left out.
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let bounds = [
        (Token::Limit, limit),
        (Token::Offset, offset.filter(|&o| o > 0)),
    ];
    let mut ts = TokenStream::new();
    for (keyword, value) in bounds {
        let Some(n) = value else { continue };
        if !ts.is_empty() {
            ts.space();
        }
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        ts.push(keyword).space().push(Token::LitInt(n));
    }
    ts
}

/// Looks `name` up in a table of generic-to-native function names.
fn remap(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(generic, _)| generic.eq_ignore_ascii_case(name))
        .map(|&(_, native)| native)
}

pub fn remap_function_mysql(name: &str) -> Option<&'static str> {
    remap(&[("length", "char_length")], name)
}

pub fn remap_function_h2(name: &str) -> Option<&'static str> {
    remap(&[("ceil", "CEILING")], name)
}

/// ClickHouse string functions count bytes unless the UTF8 variant is used.
pub fn remap_function_clickhouse(name: &str) -> Option<&'static str> {
    remap(
        &[
            ("length", "lengthUTF8"),
            ("lower", "lowerUTF8"),
            ("upper", "upperUTF8"),
        ],
        name,
    )
}

/// `TIMESTAMP 'YYYY-MM-DD HH:MM:SS'`
pub fn timestamp_literal(ts: &DateTime<Utc>) -> Expr {
    Expr::TypedString {
        data_type: "TIMESTAMP",
        value: ts.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// `floor(epoch / n) * n`
pub fn floor_epoch(epoch: Expr, seconds: i64) -> Expr {
    binary(
        func(
            "floor",
            vec![binary(epoch, BinaryOperator::Div, lit_int(seconds))],
        ),
        BinaryOperator::Mul,
        lit_int(seconds),
    )
}

/// `first_value(value) OVER (PARTITION BY ... ORDER BY time [DESC])`.
///
/// The last value is the first one in descending time order.
pub fn first_value_window(last: bool, value: Expr, partition_by: Vec<Expr>, time: Expr) -> Expr {
    Expr::WindowFunction {
        function: Box::new(func("first_value", vec![value])),
        partition_by,
        order_by: vec![if last {
            WindowOrderBy::desc(time)
        } else {
            WindowOrderBy::asc(time)
        }],
    }
}

/// `string_agg(value, ',')`
pub fn string_agg(value: Expr) -> Expr {
    func("string_agg", vec![value, lit_str(",")])
}

/// `sum(value) / seconds` with a float divisor.
pub fn rate(sum: Expr, seconds: i64) -> Expr {
    binary(sum, BinaryOperator::Div, lit_float(seconds as f64))
}
