//! sqlparser checks for emitted SQL in unit tests.

use sqlparser::ast::Statement;
use sqlparser::dialect::{
    ClickHouseDialect, DuckDbDialect, GenericDialect, MySqlDialect, PostgreSqlDialect,
};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

fn parser_for(dialect: Dialect) -> Box<dyn sqlparser::dialect::Dialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::ClickHouse => Box::new(ClickHouseDialect {}),
        // no H2 parser upstream
        Dialect::H2 => Box::new(GenericDialect {}),
    }
}

/// Parse `sql` as exactly one statement in the given dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<Statement, String> {
    let mut statements = Parser::parse_sql(&*parser_for(dialect), sql)
        .map_err(|e| format!("{dialect} rejected SQL: {e}\n{sql}"))?;
    match statements.len() {
        1 => Ok(statements.remove(0)),
        n => Err(format!("expected one statement, got {n}\n{sql}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_select_parses() {
        let sql = r#"SELECT "appName", sum("totalCount") FROM "jvm" GROUP BY "appName""#;
        for dialect in [Dialect::Postgres, Dialect::DuckDb, Dialect::H2] {
            assert!(matches!(
                validate_sql(sql, dialect),
                Ok(Statement::Query(_))
            ));
        }
    }

    #[test]
    fn test_rejects_garbage_and_batches() {
        assert!(validate_sql("SELEC sum(x) FORM t", Dialect::Postgres).is_err());
        assert!(validate_sql("SELECT 1; SELECT 2", Dialect::MySql).is_err());
    }
}
