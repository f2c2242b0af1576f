//! Rendering a [`QueryPlan`] as SQL text.

use super::{QueryPlan, Stage, StageSource};
use crate::sql::{Expr, Query, SelectExpr, SqlDialect, TableRef};

/// Derived-table aliases for one serialization: `tbl1`, `tbl2`, ...
#[derive(Debug, Default)]
struct AliasCounter {
    next: usize,
}

impl AliasCounter {
    fn next(&mut self) -> String {
        self.next += 1;
        format!("tbl{}", self.next)
    }
}

impl QueryPlan {
    /// Nest the stages into a single SELECT, innermost first.
    ///
    /// Returns `None` for an empty plan.
    pub fn to_query(&self) -> Option<Query> {
        let mut aliases = AliasCounter::default();
        let mut current: Option<Query> = None;
        for stage in &self.stages {
            let query = stage_query(stage);
            current = Some(match (current.take(), &stage.source) {
                (Some(inner), StageSource::Previous) => {
                    query.from_subquery(inner, &aliases.next())
                }
                (_, StageSource::Table(table)) => query.from(TableRef::new(table)),
                (None, StageSource::Previous) => query,
            });
        }
        current
    }

    /// Render the plan. `pretty` only changes whitespace.
    pub fn to_sql(&self, dialect: &dyn SqlDialect, pretty: bool) -> String {
        match self.to_query() {
            Some(query) if pretty => query.to_sql(dialect),
            Some(query) => query.to_compact_sql(dialect),
            None => String::new(),
        }
    }
}

fn stage_query(stage: &Stage) -> Query {
    let select: Vec<SelectExpr> = stage
        .fields
        .iter()
        .map(|field| match &field.expr {
            Expr::Column { table: None, column } if *column == field.name => {
                SelectExpr::new(field.expr.clone())
            }
            expr => SelectExpr::new(expr.clone()).with_alias(&field.name),
        })
        .collect();

    let mut query = Query::new()
        .select(select)
        .group_by(stage.group_by.clone())
        .order_by(stage.order_by.clone());
    if let Some(condition) = &stage.where_clause {
        query = query.filter(condition.clone());
    }
    if let Some(condition) = &stage.having {
        query = query.having(condition.clone());
    }
    if let Some(limit_offset) = &stage.limit {
        query.limit_offset = Some(limit_offset.clone());
    }
    query
}
