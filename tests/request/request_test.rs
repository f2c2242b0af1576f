//! JSON requests through to SQL.

use tally::compile::{compile_request, CompileOptions};
use tally::compiler::ErrorKind;
use tally::request::{QueryRequest, RequestError, SortOrder};
use tally::schema::Schema;
use tally::sql::Dialect;

const SCHEMA: &str = r#"
name = "http"
table = "http_requests"
timestamp = "ts"

[[dimensions]]
name = "uri"

[[dimensions]]
name = "status"
type = "int"

[[metrics]]
name = "requests"

[[metrics]]
name = "bytes"

[[metrics]]
name = "maxLatency"
aggregator = "max"
"#;

fn options(dialect: Dialect) -> CompileOptions {
    CompileOptions::default()
        .with_dialect(dialect)
        .with_pretty(false)
}

#[test]
fn test_request_shape() {
    let request = QueryRequest::from_json(
        r#"{
            "selectors": [
                { "expression": "sum(bytes) / sum(requests)", "alias": "avgBytes" },
                { "expression": "maxLatency" }
            ],
            "groupBy": ["uri"],
            "orderBy": [{ "name": "avgBytes", "order": "desc" }, { "name": "uri" }],
            "limit": { "limit": 5 }
        }"#,
    )
    .unwrap();

    assert_eq!(request.selectors.len(), 2);
    assert_eq!(request.order_by[0].order, SortOrder::Desc);
    assert_eq!(request.order_by[1].order, SortOrder::Asc);
    assert_eq!(request.limit.map(|l| l.offset), Some(0));

    let query = request.into_query().unwrap();
    assert_eq!(query.group_by, vec!["uri".to_string()]);
    assert_eq!(query.limit.map(|l| l.limit), Some(5));
}

#[test]
fn test_request_compiles_end_to_end() {
    let schema = Schema::from_toml_str(SCHEMA).unwrap();
    let json = r#"{
        "selectors": [
            { "expression": "sum(requests)", "alias": "hits" },
            { "expression": "maxLatency" }
        ],
        "filter": "status >= 500 and bytes < 10KiB",
        "groupBy": ["uri"],
        "interval": {
            "start": "2024-06-01T00:00:00Z",
            "end": "2024-06-01T06:00:00Z",
            "step": "1h"
        },
        "orderBy": [{ "name": "hits", "order": "desc" }],
        "limit": { "limit": 20 }
    }"#;
    let compiled = compile_request(&schema, json, &options(Dialect::DuckDb)).unwrap();

    assert_eq!(
        compiled.sql,
        concat!(
            r#"SELECT floor(epoch("ts") / 3600) * 3600 AS "_timestamp", "uri", "#,
            r#"sum("requests") AS "hits", max("maxLatency") AS "maxLatency" "#,
            r#"FROM "http_requests" "#,
            r#"WHERE "ts" >= TIMESTAMP '2024-06-01 00:00:00' AND "ts" < TIMESTAMP '2024-06-01 06:00:00' "#,
            r#"AND "status" >= 500 AND "bytes" < 10240 "#,
            r#"GROUP BY "uri", "_timestamp" ORDER BY "hits" DESC LIMIT 20"#
        )
    );
    let names: Vec<_> = compiled.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["_timestamp", "uri", "hits", "maxLatency"]);
}

#[test]
fn test_custom_time_column_must_exist() {
    let schema = Schema::from_toml_str(SCHEMA).unwrap();
    let json = r#"{
        "selectors": [{ "expression": "sum(requests)", "alias": "hits" }],
        "interval": {
            "start": "2024-06-01T00:00:00Z",
            "end": "2024-06-01T06:00:00Z",
            "timeColumn": "eventTime"
        }
    }"#;
    let err = compile_request(&schema, json, &options(Dialect::Postgres)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::SchemaResolution));
}

#[test]
fn test_malformed_requests() {
    let missing_selectors = QueryRequest::from_json(r#"{ "groupBy": ["uri"] }"#);
    assert!(matches!(missing_selectors, Err(RequestError::Json(_))));

    let bad_order = QueryRequest::from_json(
        r#"{ "selectors": [], "orderBy": [{ "name": "x", "order": "sideways" }] }"#,
    );
    assert!(matches!(bad_order, Err(RequestError::Json(_))));

    let bad_expression = QueryRequest::from_json(
        r#"{ "selectors": [{ "expression": "sum(bytes", "alias": "b" }] }"#,
    )
    .unwrap()
    .into_query()
    .unwrap_err();
    assert_eq!(bad_expression.kind(), ErrorKind::Syntax);
    assert!(bad_expression.to_string().contains("sum(bytes"));
}
