//! Tally CLI - Compile metric queries to SQL
//!
//! Usage:
//!   tally compile --schema <schema.toml> --query <query.json> [--dialect <dialect>]
//!   tally check-schema <schema.toml>
//!   tally parse-value <duration|size|percentage> <text>
//!
//! Examples:
//!   tally compile --schema schemas/jvm.toml --query avg.json --dialect clickhouse
//!   tally compile --schema jvm --query avg.json --output json
//!   tally parse-value size 10MiB

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tally::compile::{check_schema, compile_files, CompileOptions};
use tally::compiler::OutputColumn;
use tally::config::Settings;
use tally::sql::Dialect;
use tally::value::{HumanDuration, HumanSize, Percentage};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally - compiles metric queries to multi-dialect SQL")]
#[command(version)]
struct Cli {
    /// Path to a tally.toml settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query request to SQL
    Compile {
        /// Schema file, or the name of a schema in the configured schema directory
        #[arg(short, long)]
        schema: String,

        /// Path to the JSON query request
        #[arg(short, long)]
        query: PathBuf,

        /// SQL dialect to generate (defaults to the configured dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,

        /// Emit the SQL on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Load a schema file and check its derived columns
    CheckSchema {
        /// Path to the schema file
        file: PathBuf,
    },

    /// Parse a human-readable literal and print its normalized value
    ParseValue {
        kind: ValueKind,
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Clickhouse,
    Duckdb,
    H2,
    Mysql,
    #[value(alias = "postgresql")]
    Postgres,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Clickhouse => Dialect::ClickHouse,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::H2 => Dialect::H2,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Postgres => Dialect::Postgres,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL and result columns as JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ValueKind {
    Duration,
    Size,
    Percentage,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    dialect: String,
    sql: &'a str,
    columns: &'a [OutputColumn],
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let settings = match load_settings(cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile {
            schema,
            query,
            dialect,
            output,
            compact,
        } => cmd_compile(&settings, schema, query, dialect, output, compact),
        Commands::CheckSchema { file } => cmd_check_schema(file),
        Commands::ParseValue { kind, text } => cmd_parse_value(kind, &text),
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings, tally::config::SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

/// A schema argument is a file path, or a bare name looked up in `[schemas] dir`.
fn resolve_schema(settings: &Settings, schema: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(schema);
    if path.exists() {
        return Ok(path);
    }
    match settings.schema_path(schema) {
        Ok(Some(candidate)) if candidate.exists() => Ok(candidate),
        Ok(_) => Ok(path),
        Err(e) => Err(e.to_string()),
    }
}

fn cmd_compile(
    settings: &Settings,
    schema: String,
    query: PathBuf,
    dialect: Option<DialectArg>,
    output: OutputFormat,
    compact: bool,
) -> ExitCode {
    let schema_path = match resolve_schema(settings, &schema) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error resolving schema '{}': {}", schema, e);
            return ExitCode::FAILURE;
        }
    };
    debug!(schema = %schema_path.display(), "resolved schema");

    let mut options = CompileOptions::from_settings(settings);
    if let Some(d) = dialect {
        options = options.with_dialect(d.into());
    }
    if compact {
        options = options.with_pretty(false);
    }

    let compiled = match compile_files(&schema_path, &query, &options) {
        Ok(c) => c,
        Err(e) => {
            error!(kind = ?e.kind(), "compilation failed");
            eprintln!("Compilation error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match output {
        OutputFormat::Sql => {
            println!("{}", compiled.sql);
        }
        OutputFormat::Json => {
            let out = JsonOutput {
                dialect: options.dialect.to_string(),
                sql: &compiled.sql,
                columns: &compiled.columns,
            };
            match serde_json::to_string_pretty(&out) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error encoding output: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }
    ExitCode::SUCCESS
}

fn cmd_check_schema(file: PathBuf) -> ExitCode {
    match check_schema(&file) {
        Ok(schema) => {
            println!(
                "Schema '{}' (table {}) is valid",
                schema.name, schema.table
            );
            println!("  Dimensions: {}", schema.dimensions.len());
            println!("  Metrics:    {}", schema.metrics.len());
            println!("  Derived:    {}", schema.derived.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Invalid schema '{}': {}", file.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_parse_value(kind: ValueKind, text: &str) -> ExitCode {
    let parsed = match kind {
        ValueKind::Duration => text
            .parse::<HumanDuration>()
            .map(|d| format!("{} = {} seconds", d, d.seconds())),
        ValueKind::Size => text
            .parse::<HumanSize>()
            .map(|s| format!("{} = {} bytes", s, s.value())),
        ValueKind::Percentage => text
            .parse::<Percentage>()
            .map(|p| format!("{} = {}", p, p.fraction())),
    };

    match parsed {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Invalid value '{}': {}", text, e);
            ExitCode::FAILURE
        }
    }
}
