//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that generates multi-dialect SQL.
//! It includes:
//!
//! - [`query`] - SELECT query builder with derived-table sources
//! - [`expr`] - Expression AST and constructors
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{ClickHouse, Dialect, DuckDb, MySql, Postgres, SqlDialect, H2};
pub use expr::{
    binary, col, conjunction, func, func_distinct, lit_float, lit_int, lit_str, star,
    BinaryOperator, Expr, Literal, SortDir, UnaryOperator, WindowOrderBy,
};
pub use query::{FromItem, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef};
pub use token::{Token, TokenStream};
