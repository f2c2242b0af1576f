//! Error classification for rejected queries.

use chrono::{TimeZone, Utc};
use tally::compile::{compile_request, CompileOptions};
use tally::compiler::{
    CompileError, CompileResult, CompiledQuery, Compiler, ErrorKind, Interval, MetricQuery,
    OrderBy, Selector,
};
use tally::expr::{parse, FunctionRegistry};
use tally::schema::{DataType, Schema};
use tally::sql::Dialect;
use tally::value::HumanDuration;

fn schema() -> Schema {
    Schema::new("jvm", "jvm_metrics")
        .with_dimension("appName")
        .with_dimension("instanceName")
        .with_metric("totalCount", DataType::Int)
        .with_metric("responseTime", DataType::Int)
        .with_derived("avgResponseTime", "sum(responseTime) / sum(totalCount)")
        .unwrap()
}

fn compile(query: &MetricQuery) -> CompileResult<CompiledQuery> {
    let schema = schema();
    let registry = FunctionRegistry::builtin();
    Compiler::new(&schema, &Dialect::Postgres, &registry).compile(query)
}

fn kind_of(query: MetricQuery) -> ErrorKind {
    compile(&query).unwrap_err().kind()
}

fn sel(text: &str, alias: &str) -> Selector {
    Selector::parse(text).unwrap().with_alias(alias)
}

fn request_kind(json: &str) -> Option<ErrorKind> {
    compile_request(&schema(), json, &CompileOptions::default())
        .unwrap_err()
        .kind()
}

#[test]
fn test_syntax_errors() {
    let err = Selector::parse("sum(totalCount").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);

    let json = r#"{ "selectors": [{ "expression": "sum(totalCount) +", "alias": "t" }] }"#;
    assert_eq!(request_kind(json), Some(ErrorKind::Syntax));
}

#[test]
fn test_format_errors() {
    let err = parse("responseTime > 5q").unwrap_err();
    assert!(matches!(err, tally::expr::ParseError::Literal { .. }));

    let json = r#"{
        "selectors": [{ "expression": "sum(totalCount)", "alias": "t" }],
        "filter": "responseTime > 10xb"
    }"#;
    assert_eq!(request_kind(json), Some(ErrorKind::Format));
}

#[test]
fn test_schema_resolution_errors() {
    let unknown_column = MetricQuery::new().select(sel("sum(heapUsed)", "h"));
    assert_eq!(
        compile(&unknown_column).unwrap_err(),
        CompileError::UnknownColumn("heapUsed".into())
    );

    let unknown_function = MetricQuery::new().select(sel("median(totalCount)", "m"));
    assert_eq!(
        compile(&unknown_function).unwrap_err(),
        CompileError::UnknownFunction("median".into())
    );

    let unknown_group = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .group_by(["region"]);
    assert_eq!(kind_of(unknown_group), ErrorKind::SchemaResolution);

    let unknown_order = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .order_by(OrderBy::asc("total"));
    assert_eq!(kind_of(unknown_order), ErrorKind::SchemaResolution);
}

#[test]
fn test_unsupported_expressions() {
    let nested = MetricQuery::new().select(sel("sum(avgResponseTime)", "s"));
    assert!(matches!(
        compile(&nested).unwrap_err(),
        CompileError::NestedAggregate { .. }
    ));

    let ungrouped = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .select(sel("length(instanceName)", "len"))
        .group_by(["appName"]);
    assert!(matches!(
        compile(&ungrouped).unwrap_err(),
        CompileError::UngroupedColumn { .. }
    ));

    let mixed = MetricQuery::new()
        .select(sel("sum(responseTime) / sum(totalCount)", "avg"))
        .group_by(["appName"])
        .filter(parse("instanceName = 'a' or avg > 1").unwrap());
    assert!(matches!(
        compile(&mixed).unwrap_err(),
        CompileError::MixedFilterLevels(_)
    ));

    let bad_macro = MetricQuery::new().select(sel("sum(totalCount) / {window}", "w"));
    assert_eq!(
        compile(&bad_macro).unwrap_err(),
        CompileError::UnresolvedMacro("window".into())
    );

    let rate_without_interval = MetricQuery::new().select(sel("rate(totalCount)", "r"));
    assert_eq!(kind_of(rate_without_interval), ErrorKind::UnsupportedExpression);

    assert_eq!(kind_of(MetricQuery::new()), ErrorKind::UnsupportedExpression);
}

#[test]
fn test_ambiguous_output_names() {
    let unnamed = MetricQuery::new().select(Selector::parse("sum(totalCount) * 2").unwrap());
    assert_eq!(
        compile(&unnamed).unwrap_err(),
        CompileError::AmbiguousOutputName("sum(totalCount) * 2".into())
    );

    let duplicate = MetricQuery::new()
        .select(sel("sum(totalCount)", "x"))
        .select(sel("max(totalCount)", "x"));
    assert_eq!(kind_of(duplicate), ErrorKind::AmbiguousOutputName);
}

#[test]
fn test_invalid_intervals() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let empty = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .interval(Interval::new(start, start));
    assert_eq!(kind_of(empty), ErrorKind::InvalidInterval);

    let zero_step = MetricQuery::new()
        .select(sel("sum(totalCount)", "t"))
        .interval(
            Interval::new(start, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
                .with_step(HumanDuration::parse("0s").unwrap()),
        );
    assert_eq!(kind_of(zero_step), ErrorKind::InvalidInterval);
}

#[test]
fn test_error_messages_name_the_problem() {
    let err = compile(&MetricQuery::new().select(sel("sum(heapUsed)", "h"))).unwrap_err();
    assert!(err.to_string().contains("heapUsed"));

    let err = compile(
        &MetricQuery::new()
            .select(sel("sum(totalCount)", "t"))
            .order_by(OrderBy::desc("nope")),
    )
    .unwrap_err();
    assert!(err.to_string().contains("nope"));
}
