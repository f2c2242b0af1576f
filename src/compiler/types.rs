//! Output column type inference.

use super::lift::{AggCall, Key, PostExpr};
use crate::expr::{AggregateFunc, BinaryOp, Expr, Literal, UnaryOp};
use crate::schema::{DataType, Schema};

pub(crate) fn literal_type(lit: &Literal) -> DataType {
    match lit {
        Literal::Int(_) | Literal::Duration(_) | Literal::Size(_) => DataType::Int,
        Literal::Float(_) | Literal::Percentage(_) => DataType::Float,
        Literal::Bool(_) => DataType::Bool,
        Literal::String(_) | Literal::Null => DataType::String,
    }
}

fn binary_type(op: BinaryOp, left: DataType, right: DataType) -> DataType {
    match op {
        BinaryOp::Div => DataType::Float,
        op if op.is_arithmetic() => left.widen(right),
        _ => DataType::Bool,
    }
}

fn call_type(name: &str, args: Vec<DataType>) -> DataType {
    match name.to_ascii_lowercase().as_str() {
        "length" => DataType::Int,
        "lower" | "upper" => DataType::String,
        "round" if args.len() > 1 => DataType::Float,
        _ => args.first().copied().unwrap_or(DataType::Float),
    }
}

/// Type of a row-level expression.
pub(crate) fn raw_type(schema: &Schema, expr: &Expr) -> DataType {
    match expr {
        Expr::Literal(lit) => literal_type(lit),
        Expr::Column(name) => schema.data_type(name).unwrap_or(DataType::String),
        Expr::Macro(_) => DataType::Int,
        Expr::Binary { op, left, right } => {
            binary_type(*op, raw_type(schema, left), raw_type(schema, right))
        }
        Expr::Unary {
            op: UnaryOp::Not, ..
        }
        | Expr::InList { .. } => DataType::Bool,
        Expr::Unary { expr, .. } => raw_type(schema, expr),
        Expr::Call { name, args } => {
            call_type(name, args.iter().map(|a| raw_type(schema, a)).collect())
        }
    }
}

pub(crate) fn aggregate_type(schema: &Schema, call: &AggCall) -> DataType {
    match call.func {
        AggregateFunc::Count | AggregateFunc::Cardinality => DataType::Int,
        AggregateFunc::Avg | AggregateFunc::Rate => DataType::Float,
        AggregateFunc::GroupConcat => DataType::String,
        AggregateFunc::Sum
        | AggregateFunc::Min
        | AggregateFunc::Max
        | AggregateFunc::First
        | AggregateFunc::Last => call
            .arg
            .as_ref()
            .map(|a| raw_type(schema, a))
            .unwrap_or(DataType::Int),
    }
}

/// What a lifted expression's references resolve to.
pub(crate) struct TypeEnv<'a> {
    pub schema: &'a Schema,
    pub keys: &'a [Key],
    pub aggs: &'a [AggCall],
    pub folded: &'a [PostExpr],
}

impl TypeEnv<'_> {
    pub fn post_type(&self, expr: &PostExpr) -> DataType {
        match expr {
            PostExpr::Column(name) => self.schema.data_type(name).unwrap_or(DataType::String),
            PostExpr::Key(k) => self
                .schema
                .data_type(&self.keys[*k].column)
                .unwrap_or(DataType::String),
            PostExpr::Agg(i) => aggregate_type(self.schema, &self.aggs[*i]),
            PostExpr::Folded(j) => self.post_type(&self.folded[*j]),
            PostExpr::Output(_) => DataType::Float,
            PostExpr::Literal(lit) => literal_type(lit),
            PostExpr::Binary { op, left, right } => {
                binary_type(*op, self.post_type(left), self.post_type(right))
            }
            PostExpr::Unary {
                op: UnaryOp::Not, ..
            }
            | PostExpr::InList { .. } => DataType::Bool,
            PostExpr::Unary { expr, .. } => self.post_type(expr),
            PostExpr::Call { name, args } => {
                call_type(name, args.iter().map(|a| self.post_type(a)).collect())
            }
        }
    }
}
