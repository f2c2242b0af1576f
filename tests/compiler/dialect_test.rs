//! Dialect-specific rendering and capability checks.

use chrono::{TimeZone, Utc};
use sqlparser::dialect::{DuckDbDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tally::compiler::{
    CompileError, CompileResult, CompiledQuery, Compiler, ErrorKind, Interval, MetricQuery,
    Selector,
};
use tally::expr::{parse, FunctionRegistry};
use tally::schema::{DataType, Schema};
use tally::sql::{Dialect, Expr, SqlDialect};
use tally::value::HumanDuration;

fn schema() -> Schema {
    Schema::new("jvm", "jvm_metrics")
        .with_dimension("appName")
        .with_dimension("instanceName")
        .with_metric("totalCount", DataType::Int)
        .with_metric("responseTime", DataType::Int)
        .with_metric("activeThreads", DataType::Int)
}

fn compile(dialect: &dyn SqlDialect, query: &MetricQuery) -> CompileResult<CompiledQuery> {
    let schema = schema();
    let registry = FunctionRegistry::builtin();
    Compiler::new(&schema, dialect, &registry)
        .pretty(false)
        .compile(query)
}

fn sel(text: &str, alias: &str) -> Selector {
    Selector::parse(text).unwrap().with_alias(alias)
}

/// A query touching every stage kind: buckets, a window aggregate, a
/// post-aggregate expression and filters at each level.
fn everything() -> MetricQuery {
    MetricQuery::new()
        .select(sel("first(activeThreads)", "threads"))
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .select(sel("cardinality(instanceName)", "instances"))
        .group_by(["appName"])
        .filter(parse("appName in ('a', 'b') and avg > 0.5").unwrap())
        .interval(
            Interval::new(
                Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
            )
            .with_step(HumanDuration::parse("1h").unwrap()),
        )
}

#[test]
fn test_sqlparser_accepts_output() {
    let parsers: [(Dialect, Box<dyn sqlparser::dialect::Dialect>); 3] = [
        (Dialect::Postgres, Box::new(PostgreSqlDialect {})),
        (Dialect::MySql, Box::new(MySqlDialect {})),
        (Dialect::DuckDb, Box::new(DuckDbDialect {})),
    ];
    for (dialect, parser) in parsers {
        for pretty in [false, true] {
            let schema = schema();
            let registry = FunctionRegistry::builtin();
            let compiled = Compiler::new(&schema, &dialect, &registry)
                .pretty(pretty)
                .compile(&everything())
                .unwrap();
            let parsed = Parser::parse_sql(&*parser, &compiled.sql);
            assert!(
                parsed.is_ok(),
                "{} rejected: {:?}\n{}",
                dialect,
                parsed,
                compiled.sql
            );
        }
    }
}

#[test]
fn test_stage_depth_per_dialect() {
    for dialect in Dialect::all() {
        let compiled = compile(&dialect, &everything()).unwrap();
        let expected = if dialect.use_window_function_as_aggregator("first") {
            3
        } else {
            2
        };
        assert_eq!(compiled.plan.depth(), expected, "{}", dialect);
    }
}

#[test]
fn test_output_columns_independent_of_dialect() {
    let columns: Vec<_> = Dialect::all()
        .into_iter()
        .map(|d| compile(&d, &everything()).unwrap().columns)
        .collect();
    assert!(columns.windows(2).all(|w| w[0] == w[1]));

    let names: Vec<_> = columns[0].iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["_timestamp", "appName", "threads", "avg", "instances"]
    );
    assert_eq!(columns[0][3].data_type, DataType::Float);
    assert_eq!(columns[0][4].data_type, DataType::Int);
}

#[test]
fn test_clickhouse_functions() {
    let query = MetricQuery::new()
        .select(sel("cardinality(instanceName)", "instances"))
        .select(sel("groupConcat(instanceName)", "names"))
        .group_by(["appName"]);
    let compiled = compile(&Dialect::ClickHouse, &query).unwrap();

    assert!(compiled.sql.contains(r#"uniqExact("instanceName") AS "instances""#));
    assert!(compiled
        .sql
        .contains(r#"arrayStringConcat(groupArray("instanceName"), ',') AS "names""#));
}

#[test]
fn test_group_concat_per_dialect() {
    let query = MetricQuery::new()
        .select(sel("groupConcat(instanceName)", "names"))
        .group_by(["appName"]);

    let cases = [
        (Dialect::Postgres, r#"string_agg("instanceName", ',')"#),
        (Dialect::DuckDb, r#"string_agg("instanceName", ',')"#),
        (Dialect::MySql, "group_concat(`instanceName`)"),
        (Dialect::H2, r#"LISTAGG("instanceName", ',')"#),
    ];
    for (dialect, expected) in cases {
        let sql = compile(&dialect, &query).unwrap().sql;
        assert!(sql.contains(expected), "{}: {}", dialect, sql);
    }
}

#[test]
fn test_clickhouse_time_range_uses_epoch_seconds() {
    let compiled = compile(&Dialect::ClickHouse, &everything()).unwrap();
    assert!(compiled
        .sql
        .contains(r#""timestamp" >= fromUnixTimestamp(1714521600)"#));
}

#[test]
fn test_clickhouse_rejects_aliases_hiding_columns() {
    let aggregate_alias = MetricQuery::new()
        .select(sel("sum(responseTime)", "totalCount"))
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"]);
    let key_alias = MetricQuery::new()
        .select(sel("appName", "totalCount"))
        .select(sel("sum(totalCount)", "t"));

    for query in [&aggregate_alias, &key_alias] {
        assert_eq!(
            compile(&Dialect::ClickHouse, query).unwrap_err(),
            CompileError::ShadowedColumn {
                alias: "totalCount".into(),
                dialect: "clickhouse",
            }
        );
        // aliases stay private to the SELECT list elsewhere
        let sql = compile(&Dialect::Postgres, query).unwrap().sql;
        assert!(sql.contains(r#"sum("totalCount") AS "t""#), "{}", sql);
    }
}

#[test]
fn test_clickhouse_allows_self_named_aggregates() {
    let query = MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"])
        .filter(parse("avg > 0.2").unwrap());
    let sql = compile(&Dialect::ClickHouse, &query).unwrap().sql;
    assert!(sql.contains(r#"sum("responseTime") AS "responseTime""#), "{}", sql);
    assert!(sql.contains(r#"WHERE "avg" > 0.2"#), "{}", sql);
}

// ============================================================================
// Capabilities
// ============================================================================

/// A dialect that can neither bucket time nor compute first/last values.
#[derive(Debug)]
struct Bare;

impl SqlDialect for Bare {
    fn name(&self) -> &'static str {
        "bare"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn use_window_function_as_aggregator(&self, _name: &str) -> bool {
        false
    }

    fn group_concat(&self, _value: Expr) -> Option<Expr> {
        None
    }
}

fn assert_capability(result: CompileResult<CompiledQuery>) {
    match result {
        Err(e @ CompileError::DialectCapability { dialect: "bare", .. }) => {
            assert_eq!(e.kind(), ErrorKind::DialectCapability)
        }
        other => panic!("expected a capability error, got {:?}", other),
    }
}

#[test]
fn test_missing_first_last() {
    let query = MetricQuery::new().select(sel("last(activeThreads)", "t"));
    assert_capability(compile(&Bare, &query));
}

#[test]
fn test_missing_group_concat() {
    let query = MetricQuery::new().select(sel("groupConcat(appName)", "names"));
    assert_capability(compile(&Bare, &query));
}

#[test]
fn test_missing_time_bucketing() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .interval(
            Interval::new(
                Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap(),
            )
            .with_step(HumanDuration::parse("1m").unwrap()),
        );
    assert_capability(compile(&Bare, &query));
}

#[test]
fn test_bare_dialect_still_compiles_plain_queries() {
    let query = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .group_by(["appName"]);
    let compiled = compile(&Bare, &query).unwrap();
    assert_eq!(
        compiled.sql,
        r#"SELECT "appName", sum("totalCount") AS "t" FROM "jvm_metrics" GROUP BY "appName""#
    );
}
