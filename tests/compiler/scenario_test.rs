//! End-to-end compilation scenarios over a JVM metrics schema.
//!
//! Every emitted statement is also run through sqlparser for the dialects
//! it supports.

use sqlparser::dialect::{DuckDbDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tally::compiler::{CompileResult, CompiledQuery, Compiler, MetricQuery, Selector};
use tally::expr::FunctionRegistry;
use tally::schema::Schema;
use tally::sql::Dialect;

const JVM: &str = r#"
name = "jvm"
table = "jvm_metrics"

[[dimensions]]
name = "appName"

[[dimensions]]
name = "instanceName"

[[metrics]]
name = "totalCount"

[[metrics]]
name = "responseTime"

[[metrics]]
name = "activeThreads"
aggregator = "last"

[[derived]]
name = "avgResponseTime"
expression = "sum(responseTime) / sum(totalCount)"
"#;

fn compile(dialect: Dialect, query: &MetricQuery) -> CompileResult<CompiledQuery> {
    let schema = Schema::from_toml_str(JVM).unwrap();
    let registry = FunctionRegistry::builtin();
    Compiler::new(&schema, &dialect, &registry)
        .pretty(false)
        .compile(query)
}

fn sel(text: &str, alias: &str) -> Selector {
    Selector::parse(text).unwrap().with_alias(alias)
}

fn assert_parses(sql: &str, dialect: Dialect) {
    let result = match dialect {
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
        Dialect::MySql => Parser::parse_sql(&MySqlDialect {}, sql),
        Dialect::DuckDb => Parser::parse_sql(&DuckDbDialect {}, sql),
        other => panic!("no parser for {}", other),
    };
    assert!(result.is_ok(), "invalid {} SQL: {:?}\n{}", dialect, result, sql);
}

// ============================================================================
// Scenario A: single aggregate, single stage
// ============================================================================

#[test]
fn test_single_aggregate_is_flat() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query).unwrap();

    assert_eq!(compiled.plan.depth(), 1);
    insta::assert_snapshot!(
        compiled.sql,
        @r#"SELECT "appName", sum("totalCount") AS "t" FROM "jvm_metrics" GROUP BY "appName""#
    );
    assert_parses(&compiled.sql, Dialect::Postgres);
}

// ============================================================================
// Scenario B: ratio of aggregates, two stages
// ============================================================================

#[test]
fn test_ratio_reuses_column_names() {
    let query = MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query).unwrap();

    assert_eq!(compiled.plan.depth(), 2);
    assert_eq!(
        compiled.sql,
        concat!(
            r#"SELECT "appName", "responseTime" / "totalCount" AS "avg" FROM ("#,
            r#"SELECT "appName", sum("responseTime") AS "responseTime", "#,
            r#"sum("totalCount") AS "totalCount" FROM "jvm_metrics" GROUP BY "appName") AS "tbl1""#
        )
    );
    assert_parses(&compiled.sql, Dialect::Postgres);
}

#[test]
fn test_ratio_mysql_quoting() {
    let query = MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::MySql, &query).unwrap();

    assert!(compiled
        .sql
        .starts_with("SELECT `appName`, `responseTime` / `totalCount` AS `avg` FROM ("));
    assert!(compiled.sql.ends_with(") AS `tbl1`"));
    assert_parses(&compiled.sql, Dialect::MySql);
}

#[test]
fn test_derived_column_expands_like_its_expression() {
    let derived = MetricQuery::new()
        .select(sel("avgResponseTime", "avg"))
        .group_by(["appName"]);
    let inline = MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"]);

    assert_eq!(
        compile(Dialect::DuckDb, &derived).unwrap().sql,
        compile(Dialect::DuckDb, &inline).unwrap().sql
    );
}

// ============================================================================
// Scenario C: first/last as window function or native aggregate
// ============================================================================

#[test]
fn test_first_as_window_function() {
    let query = MetricQuery::new()
        .select(sel("first(activeThreads)", "a"))
        .group_by(["appName", "instanceName"]);
    let compiled = compile(Dialect::Postgres, &query).unwrap();

    assert_eq!(compiled.plan.depth(), 2);
    let inner = &compiled.plan.innermost().unwrap();
    assert!(inner.group_by.is_empty());
    assert!(compiled.sql.contains(
        r#"first_value("activeThreads") OVER (PARTITION BY "appName", "instanceName" ORDER BY "timestamp""#
    ));
    assert!(compiled
        .sql
        .ends_with(r#"GROUP BY "appName", "instanceName", "a""#));
    assert_parses(&compiled.sql, Dialect::Postgres);
}

#[test]
fn test_last_window_orders_descending() {
    let query = MetricQuery::new()
        .select(sel("last(activeThreads)", "a"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::MySql, &query).unwrap();

    assert!(compiled
        .sql
        .contains("OVER (PARTITION BY `appName` ORDER BY `timestamp` DESC)"));
    assert_parses(&compiled.sql, Dialect::MySql);
}

#[test]
fn test_first_as_native_aggregate() {
    let query = MetricQuery::new()
        .select(sel("first(activeThreads)", "a"))
        .group_by(["appName", "instanceName"]);
    let compiled = compile(Dialect::ClickHouse, &query).unwrap();

    assert_eq!(compiled.plan.depth(), 1);
    assert!(compiled
        .sql
        .contains(r#"argMin("activeThreads", "timestamp") AS "a""#));
    assert!(compiled
        .sql
        .ends_with(r#"GROUP BY "appName", "instanceName""#));
}

#[test]
fn test_metric_default_aggregator_last() {
    let query = MetricQuery::new()
        .select(Selector::parse("activeThreads").unwrap())
        .group_by(["appName"]);
    let compiled = compile(Dialect::DuckDb, &query).unwrap();

    assert!(compiled
        .sql
        .contains(r#"arg_max("activeThreads", "timestamp") AS "activeThreads""#));
    assert_parses(&compiled.sql, Dialect::DuckDb);
}

// ============================================================================
// Scenario D: filter split across stages
// ============================================================================

fn filtered_ratio() -> MetricQuery {
    MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"])
        .filter(tally::expr::parse("appName = 'bithon' and avg > 0.2").unwrap())
}

#[test]
fn test_filter_split_expands_alias() {
    let compiled = compile(Dialect::Postgres, &filtered_ratio()).unwrap();

    assert_eq!(
        compiled.sql,
        concat!(
            r#"SELECT "appName", "responseTime" / "totalCount" AS "avg" FROM ("#,
            r#"SELECT "appName", sum("responseTime") AS "responseTime", "#,
            r#"sum("totalCount") AS "totalCount" FROM "jvm_metrics" "#,
            r#"WHERE "appName" = 'bithon' GROUP BY "appName") AS "tbl1" "#,
            r#"WHERE "responseTime" / "totalCount" > 0.2"#
        )
    );
    assert_parses(&compiled.sql, Dialect::Postgres);
}

#[test]
fn test_filter_split_uses_alias_when_allowed() {
    let compiled = compile(Dialect::ClickHouse, &filtered_ratio()).unwrap();

    let (inner, outer) = compiled.sql.split_once(r#") AS "tbl1""#).unwrap();
    assert!(inner.contains(r#"WHERE "appName" = 'bithon'"#));
    assert_eq!(outer, r#" WHERE "avg" > 0.2"#);
}
