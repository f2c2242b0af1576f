//! Staged query plans.
//!
//! A [`QueryPlan`] is a list of SELECT stages. Stage 0 reads the base
//! table; every later stage reads the previous one as a derived table and
//! may only reference names that stage produced. ORDER BY and LIMIT live on
//! the last stage.

mod serializer;

use crate::sql::{Expr, LimitOffset, OrderByExpr};

/// One projected column of a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub expr: Expr,
}

impl Field {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// Where a stage reads its rows from.
#[derive(Debug, Clone, PartialEq)]
pub enum StageSource {
    Table(String),
    Previous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub fields: Vec<Field>,
    pub source: StageSource,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<LimitOffset>,
}

impl Stage {
    pub fn new(source: StageSource) -> Self {
        Self {
            fields: Vec::new(),
            source,
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Column names read by this stage's projections, in first-seen order.
    pub fn input_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for field in &self.fields {
            collect_columns(&field.expr, &mut out);
        }
        out
    }

    /// Columns read anywhere in this stage except the projection at
    /// `skip`. WHERE counts only over the base table; a later stage's WHERE
    /// may name its own aliases on purpose.
    pub fn columns_read_besides(&self, skip: usize) -> Vec<&str> {
        let mut out = Vec::new();
        for (i, field) in self.fields.iter().enumerate() {
            if i != skip {
                collect_columns(&field.expr, &mut out);
            }
        }
        for expr in &self.group_by {
            collect_columns(expr, &mut out);
        }
        if let Some(having) = &self.having {
            collect_columns(having, &mut out);
        }
        if let (StageSource::Table(_), Some(cond)) = (&self.source, &self.where_clause) {
            collect_columns(cond, &mut out);
        }
        out
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }
}

/// A plan of one to three nested stages, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub stages: Vec<Stage>,
}

impl QueryPlan {
    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    pub fn innermost(&self) -> Option<&Stage> {
        self.stages.first()
    }

    pub fn outermost(&self) -> Option<&Stage> {
        self.stages.last()
    }
}

fn collect_columns<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Column { column, .. } => {
            if !out.contains(&column.as_str()) {
                out.push(column);
            }
        }
        Expr::Literal(_) | Expr::Star { .. } | Expr::Interval { .. } | Expr::TypedString { .. } => {}
        Expr::BinaryOp { left, right, .. } => {
            collect_columns(left, out);
            collect_columns(right, out);
        }
        Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => {
            collect_columns(expr, out)
        }
        Expr::Function { args, .. } => args.iter().for_each(|a| collect_columns(a, out)),
        Expr::In { expr, values, .. } => {
            collect_columns(expr, out);
            values.iter().for_each(|v| collect_columns(v, out));
        }
        Expr::WindowFunction {
            function,
            partition_by,
            order_by,
        } => {
            collect_columns(function, out);
            partition_by.iter().for_each(|p| collect_columns(p, out));
            order_by.iter().for_each(|o| collect_columns(&o.expr, out));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{binary, col, func, BinaryOperator};

    #[test]
    fn test_input_columns() {
        let mut stage = Stage::new(StageSource::Previous);
        stage.fields.push(Field::new(
            "avg",
            binary(col("responseTime"), BinaryOperator::Div, col("totalCount")),
        ));
        stage
            .fields
            .push(Field::new("max", func("max", vec![col("responseTime")])));
        assert_eq!(stage.input_columns(), vec!["responseTime", "totalCount"]);
        assert_eq!(stage.names().collect::<Vec<_>>(), vec!["avg", "max"]);
        assert!(stage.field("max").is_some());
        assert!(!stage.is_grouped());
    }

    #[test]
    fn test_columns_read_besides() {
        let mut stage = Stage::new(StageSource::Table("jvm".into()));
        stage
            .fields
            .push(Field::new("totalCount", func("sum", vec![col("responseTime")])));
        stage
            .fields
            .push(Field::new("t", func("sum", vec![col("totalCount")])));
        stage.group_by.push(col("appName"));
        stage.where_clause = Some(binary(col("region"), BinaryOperator::Eq, col("zone")));

        assert_eq!(
            stage.columns_read_besides(0),
            vec!["totalCount", "appName", "region", "zone"]
        );
        assert_eq!(
            stage.columns_read_besides(1),
            vec!["responseTime", "appName", "region", "zone"]
        );

        stage.source = StageSource::Previous;
        assert_eq!(stage.columns_read_besides(1), vec!["responseTime", "appName"]);
    }
}
