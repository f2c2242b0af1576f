//! Per-database spelling of the SQL the compiler emits.
//!
//! Quoting, literals and pagination differ in small ways between the five
//! targets. The larger differences are capabilities: time bucketing,
//! string aggregation and whether `first`/`last` need a window stage.
//!
//! ```ignore
//! use tally::sql::{Dialect, SqlDialect};
//!
//! assert_eq!(Dialect::MySql.quote_identifier("appName"), "`appName`");
//! ```
//!
//! # Metric aggregation capabilities
//!
//! | Capability | ClickHouse | DuckDB | H2 | MySQL | PostgreSQL |
//! |------------|-----------|--------|----|-------|------------|
//! | first/last | argMin/argMax | arg_min/arg_max | window | window | window |
//! | groupConcat | arrayStringConcat | string_agg | LISTAGG | GROUP_CONCAT | string_agg |
//! | Alias in WHERE | ✓ | ❌ | ❌ | ❌ | ❌ |

mod clickhouse;
mod duckdb;
mod h2;
pub mod helpers;
mod mysql;
mod postgres;

pub use clickhouse::ClickHouse;
pub use duckdb::DuckDb;
pub use h2::H2;
pub use mysql::MySql;
pub use postgres::Postgres;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::expr::{func_distinct, Expr};
use super::token::TokenStream;

/// Rendering and capability hooks of one target database.
///
/// Defaults are ANSI. Implementations are stateless: every hook is a pure
/// function of its arguments.
pub trait SqlDialect: std::fmt::Debug {
    /// Lowercase name used in settings and logs.
    fn name(&self) -> &'static str;

    /// Quote a column, table or alias name.
    ///
    /// Must be injective: distinct names never quote to the same text.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal with `''` escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn format_bool(&self, b: bool) -> &'static str;

    fn format_null(&self) -> &'static str {
        "NULL"
    }

    /// Render a point in time for comparison against the timestamp column.
    fn format_timestamp(&self, ts: &DateTime<Utc>) -> Expr {
        helpers::timestamp_literal(ts)
    }

    /// Row window clause; empty when both bounds are absent.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Native name of a generic function such as `lower`, if it differs.
    /// Matching ignores case.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }

    /// Whether the aggregator named `name` must be computed as a window
    /// function followed by a grouping stage.
    fn use_window_function_as_aggregator(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("first") || name.eq_ignore_ascii_case("last")
    }

    /// Plain aggregate computing the first (or last) value by time, for
    /// dialects that do not need the window form.
    fn first_last_aggregate(&self, last: bool, value: Expr, time: Expr) -> Option<Expr> {
        let _ = (last, value, time);
        None
    }

    /// Window function computing the first (or last) value per partition.
    fn first_last_window(
        &self,
        last: bool,
        value: Expr,
        partition_by: Vec<Expr>,
        time: Expr,
    ) -> Expr {
        helpers::first_value_window(last, value, partition_by, time)
    }

    /// Concatenate the group's values into one string.
    fn group_concat(&self, value: Expr) -> Option<Expr> {
        Some(helpers::string_agg(value))
    }

    /// Number of distinct values.
    fn count_distinct(&self, value: Expr) -> Expr {
        func_distinct("count", value)
    }

    /// Epoch seconds of `time` floored to a multiple of `seconds`.
    ///
    /// `None` means the dialect cannot bucket by time.
    fn time_floor(&self, time: Expr, seconds: i64) -> Option<Expr> {
        let _ = (time, seconds);
        None
    }

    /// Whether a WHERE clause may reference a SELECT alias of the same level.
    fn allows_alias_in_where(&self) -> bool {
        false
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    ClickHouse,
    #[default]
    DuckDb,
    H2,
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
}

impl Dialect {
    /// The stateless implementation behind this variant.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::ClickHouse => &ClickHouse,
            Dialect::DuckDb => &DuckDb,
            Dialect::H2 => &H2,
            Dialect::MySql => &MySql,
            Dialect::Postgres => &Postgres,
        }
    }

    pub fn all() -> [Dialect; 5] {
        [
            Dialect::ClickHouse,
            Dialect::DuckDb,
            Dialect::H2,
            Dialect::MySql,
            Dialect::Postgres,
        ]
    }

    /// Look up a dialect by name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Dialect> {
        match name.to_lowercase().as_str() {
            "postgresql" => Some(Dialect::Postgres),
            lower => Self::all().into_iter().find(|d| d.name() == lower),
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn format_timestamp(&self, ts: &DateTime<Utc>) -> Expr {
        self.dialect().format_timestamp(ts)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }

    fn use_window_function_as_aggregator(&self, name: &str) -> bool {
        self.dialect().use_window_function_as_aggregator(name)
    }

    fn first_last_aggregate(&self, last: bool, value: Expr, time: Expr) -> Option<Expr> {
        self.dialect().first_last_aggregate(last, value, time)
    }

    fn first_last_window(
        &self,
        last: bool,
        value: Expr,
        partition_by: Vec<Expr>,
        time: Expr,
    ) -> Expr {
        self.dialect()
            .first_last_window(last, value, partition_by, time)
    }

    fn group_concat(&self, value: Expr) -> Option<Expr> {
        self.dialect().group_concat(value)
    }

    fn count_distinct(&self, value: Expr) -> Expr {
        self.dialect().count_distinct(value)
    }

    fn time_floor(&self, time: Expr, seconds: i64) -> Option<Expr> {
        self.dialect().time_floor(time, seconds)
    }

    fn allows_alias_in_where(&self) -> bool {
        self.dialect().allows_alias_in_where()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
