//! Schema files on disk: loading, validation and compilation.

use std::fs;
use std::path::PathBuf;

use tally::compile::{check_schema, compile_files, CompileError, CompileOptions};
use tally::schema::{ColumnKind, DataType, SchemaError};
use tally::sql::Dialect;

fn write_temp(dir: &str, name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(dir);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const JVM: &str = r#"
name = "jvm-metrics"
table = "bithon_jvm_metrics"

[[dimensions]]
name = "appName"

[[metrics]]
name = "heapUsed"
type = "double"
aggregator = "avg"

[[metrics]]
name = "heapMax"
type = "double"
aggregator = "max"

[[derived]]
name = "heapRatio"
expression = "sum(heapUsed) / sum(heapMax)"
"#;

#[test]
fn test_check_schema_file() {
    let path = write_temp("tally-schema-test", "jvm.toml", JVM);
    let schema = check_schema(&path).unwrap();

    assert_eq!(schema.table, "bithon_jvm_metrics");
    assert_eq!(schema.data_type("heapUsed"), Some(DataType::Float));
    assert!(matches!(
        schema.column("heapRatio"),
        Some(ColumnKind::Derived(_))
    ));
    assert!(matches!(schema.column("timestamp"), Some(ColumnKind::Timestamp)));
}

#[test]
fn test_derived_cycle_rejected() {
    let text = r#"
name = "loop"

[[metrics]]
name = "x"

[[derived]]
name = "a"
expression = "b + x"

[[derived]]
name = "b"
expression = "a * 2"
"#;
    let path = write_temp("tally-schema-test", "loop.toml", text);
    match check_schema(&path) {
        Err(CompileError::Schema(SchemaError::DerivedCycle(cycle))) => {
            assert!(cycle.contains(&"a".to_string()));
            assert!(cycle.contains(&"b".to_string()));
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}

#[test]
fn test_derived_unknown_reference_rejected() {
    let text = r#"
name = "broken"

[[derived]]
name = "ratio"
expression = "sum(missing) / 2"
"#;
    let path = write_temp("tally-schema-test", "broken.toml", text);
    assert!(matches!(
        check_schema(&path),
        Err(CompileError::Schema(SchemaError::UnknownColumn { .. }))
    ));
}

#[test]
fn test_compile_files() {
    let schema_path = write_temp("tally-schema-test", "jvm-files.toml", JVM);
    let query_path = write_temp(
        "tally-schema-test",
        "ratio.json",
        r#"{
            "selectors": [
                { "expression": "heapUsed", "alias": "heap" },
                { "expression": "heapRatio", "alias": "ratio" }
            ],
            "groupBy": ["appName"]
        }"#,
    );
    let options = CompileOptions::default()
        .with_dialect(Dialect::Postgres)
        .with_pretty(false);
    let compiled = compile_files(&schema_path, &query_path, &options).unwrap();

    assert_eq!(compiled.plan.depth(), 2);
    assert!(compiled.sql.contains(r#"avg("heapUsed") AS "heap""#));
    assert_eq!(compiled.columns[2].data_type, DataType::Float);
}
