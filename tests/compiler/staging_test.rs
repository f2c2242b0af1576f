//! Stage routing, deduplication and naming across layouts.

use chrono::{TimeZone, Utc};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tally::compiler::{
    CompiledQuery, Compiler, Interval, MetricQuery, OrderBy, Selector, TIMESTAMP_FIELD,
};
use tally::expr::{parse, FunctionRegistry};
use tally::plan::StageSource;
use tally::schema::{DataType, Schema};
use tally::sql::Dialect;
use tally::value::HumanDuration;

fn schema() -> Schema {
    Schema::new("jvm", "jvm_metrics")
        .with_dimension("appName")
        .with_dimension("instanceName")
        .with_metric("totalCount", DataType::Int)
        .with_metric("responseTime", DataType::Int)
        .with_metric("activeThreads", DataType::Int)
        .with_derived("avgResponseTime", "sum(responseTime) / sum(totalCount)")
        .unwrap()
}

fn compile(dialect: Dialect, query: &MetricQuery) -> CompiledQuery {
    let schema = schema();
    let registry = FunctionRegistry::builtin();
    Compiler::new(&schema, &dialect, &registry)
        .pretty(false)
        .compile(query)
        .unwrap()
}

fn sel(text: &str, alias: &str) -> Selector {
    Selector::parse(text).unwrap().with_alias(alias)
}

fn hour() -> Interval {
    Interval::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
    )
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_plain_aggregates_stay_flat() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .select(sel("max(responseTime)", "peak"))
        .select(sel("count()", "rows"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    assert_eq!(compiled.plan.depth(), 1);
    let stage = compiled.plan.innermost().unwrap();
    assert_eq!(stage.source, StageSource::Table("jvm_metrics".into()));
    assert_eq!(
        stage.names().collect::<Vec<_>>(),
        vec!["appName", "t", "peak", "rows"]
    );
}

#[test]
fn test_arithmetic_over_aggregates_adds_stage() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount) * 2", "double"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    assert_eq!(compiled.plan.depth(), 2);
    let outer = compiled.plan.outermost().unwrap();
    assert_eq!(outer.source, StageSource::Previous);
    assert!(!outer.is_grouped());
}

#[test]
fn test_window_with_true_aggregate_uses_three_stages() {
    let query = MetricQuery::new()
        .select(sel("first(activeThreads)", "a"))
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    assert_eq!(compiled.plan.depth(), 3);
    assert!(Parser::parse_sql(&PostgreSqlDialect {}, &compiled.sql).is_ok());

    let window = compiled.plan.innermost().unwrap();
    assert!(!window.is_grouped());
    assert!(window.input_columns().contains(&"totalCount"));
    let names: Vec<_> = compiled
        .plan
        .outermost()
        .unwrap()
        .names()
        .collect();
    assert_eq!(names, vec!["appName", "a", "t"]);
}

// ============================================================================
// Deduplication and naming
// ============================================================================

#[test]
fn test_shared_aggregate_computed_once() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    assert_eq!(compiled.sql.matches(r#"sum("totalCount")"#).count(), 1);
    assert!(compiled.sql.contains(r#""responseTime" / "t" AS "avg""#));
}

#[test]
fn test_same_column_different_aggregates_get_synthetic_names() {
    let query = MetricQuery::new()
        .select(sel("max(responseTime) - min(responseTime)", "spread"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    let inner = compiled.plan.innermost().unwrap();
    assert_eq!(
        inner.names().collect::<Vec<_>>(),
        vec!["appName", "_var0", "_var1"]
    );
    assert!(compiled.sql.contains(r#""_var0" - "_var1" AS "spread""#));
}

#[test]
fn test_shared_subexpression_folded_into_inner_stage() {
    let query = MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .select(sel("sum(responseTime) / sum(totalCount) * 1000", "avgMicros"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    assert_eq!(compiled.plan.depth(), 2);
    assert_eq!(
        compiled
            .sql
            .matches(r#"sum("responseTime") / sum("totalCount")"#)
            .count(),
        1
    );
    assert!(compiled.sql.contains(r#""avg" * 1000 AS "avgMicros""#));
}

#[test]
fn test_int_and_float_literals_are_different_aggregates() {
    let query = MetricQuery::new()
        .select(sel("sum(responseTime / 2)", "half_int"))
        .select(sel("sum(responseTime / 2.0)", "half_float"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    assert!(compiled.sql.contains(r#"sum("responseTime" / 2) AS "half_int""#));
    assert!(compiled.sql.contains(r#"sum("responseTime" / 2.0) AS "half_float""#));

    let query = MetricQuery::new()
        .select(sel("sum(responseTime / 2) / sum(totalCount)", "a"))
        .select(sel("sum(responseTime / 2.0) / sum(totalCount)", "b"))
        .group_by(["appName"]);
    let compiled = compile(Dialect::Postgres, &query);

    let inner = compiled.plan.innermost().unwrap();
    assert_eq!(inner.names().count(), 4, "{}", compiled.sql);
    assert!(compiled.sql.contains(r#"sum("responseTime" / 2.0)"#));
    assert!(!compiled.sql.contains(r#""a" AS "b""#));
}

#[test]
fn test_compilation_is_deterministic() {
    let query = MetricQuery::new()
        .select(sel("max(responseTime) - min(responseTime)", "spread"))
        .select(sel("first(activeThreads)", "a"))
        .group_by(["appName", "instanceName"])
        .filter(parse("instanceName <> 'x' and spread > 10").unwrap());

    let first = compile(Dialect::MySql, &query);
    let second = compile(Dialect::MySql, &query);
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.plan, second.plan);
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn test_aggregate_filter_becomes_having() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"])
        .filter(parse("sum(responseTime) > 100").unwrap());
    let compiled = compile(Dialect::Postgres, &query);

    assert_eq!(compiled.plan.depth(), 1);
    assert!(compiled
        .sql
        .ends_with(r#"GROUP BY "appName" HAVING sum("responseTime") > 100"#));
}

#[test]
fn test_filter_on_unselected_derived_column_keeps_outputs() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"])
        .filter(parse("avgResponseTime > 5").unwrap());
    let compiled = compile(Dialect::Postgres, &query);

    let names: Vec<_> = compiled.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["appName", "t"]);
    assert!(compiled
        .sql
        .ends_with(r#"HAVING sum("responseTime") / sum("totalCount") > 5"#));
}

#[test]
fn test_human_literal_in_filter() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"])
        .filter(parse("responseTime > 1m and totalCount < 1KiB").unwrap());
    let compiled = compile(Dialect::Postgres, &query);

    assert!(compiled
        .sql
        .contains(r#"WHERE "responseTime" > 60 AND "totalCount" < 1024"#));
}

// ============================================================================
// Interval, order and limit
// ============================================================================

#[test]
fn test_bucketed_interval_exposes_timestamp() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"])
        .interval(hour().with_step(HumanDuration::parse("5m").unwrap()));
    let compiled = compile(Dialect::Postgres, &query);

    assert_eq!(compiled.columns[0].name, TIMESTAMP_FIELD);
    assert_eq!(compiled.columns[0].data_type, DataType::Int);
    assert!(compiled.sql.starts_with(
        r#"SELECT floor(date_part('epoch', "timestamp") / 300) * 300 AS "_timestamp", "appName""#
    ));
    assert!(compiled.sql.ends_with(r#"GROUP BY "appName", "_timestamp""#));
}

#[test]
fn test_interval_without_step_only_filters() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount) / {interval}", "qps"))
        .interval(hour());
    let compiled = compile(Dialect::Postgres, &query);

    assert!(!compiled.sql.contains(TIMESTAMP_FIELD));
    assert!(compiled.sql.contains(
        r#"WHERE "timestamp" >= TIMESTAMP '2024-03-01 10:00:00' AND "timestamp" < TIMESTAMP '2024-03-01 11:00:00'"#
    ));
    assert!(compiled.sql.contains(r#" / 3600 AS "qps""#));
}

#[test]
fn test_rate_uses_bucket_length() {
    let query = MetricQuery::new()
        .select(sel("rate(totalCount)", "r"))
        .interval(hour().with_step(HumanDuration::parse("1m").unwrap()));
    let compiled = compile(Dialect::DuckDb, &query);

    assert!(compiled.sql.contains(r#"sum("totalCount") / 60.0 AS "r""#));
    assert_eq!(compiled.columns[1].data_type, DataType::Float);
}

#[test]
fn test_order_and_limit_on_outermost_stage() {
    let query = MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"])
        .order_by(OrderBy::desc("avg"))
        .limit(10, 20);
    let compiled = compile(Dialect::Postgres, &query);

    let inner = compiled.plan.innermost().unwrap();
    assert!(inner.order_by.is_empty() && inner.limit.is_none());
    assert!(compiled
        .sql
        .ends_with(r#") AS "tbl1" ORDER BY "avg" DESC LIMIT 10 OFFSET 20"#));
}
