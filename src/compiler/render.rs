//! Lowering lifted expressions into dialect SQL.

use super::error::{CompileError, CompileResult};
use super::fold::Folded;
use super::lift::{AggCall, Key, Output, PostExpr};
use crate::expr::{AggregateFunc, BinaryOp, Expr, Literal, UnaryOp};
use crate::sql::dialect::helpers;
use crate::sql::{self, BinaryOperator, SqlDialect, UnaryOperator};

/// Which stage an expression is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Grouping stage reading the base table.
    Base,
    /// Grouping stage reading per-row window results.
    Regroup,
    /// Stage reading named aggregate results.
    Post,
}

/// An interned aggregate with its rendering decisions.
#[derive(Debug, Clone)]
pub(crate) struct AggSlot {
    pub call: AggCall,
    /// Computed by a window function in the innermost stage.
    pub window: bool,
    pub name: Option<String>,
}

pub(crate) struct Renderer<'a> {
    pub dialect: &'a dyn SqlDialect,
    pub keys: &'a [Key],
    pub aggs: &'a [AggSlot],
    pub folded: &'a [Folded],
    pub outputs: &'a [Output],
    pub time_column: &'a str,
    /// Bucket length used by `rate`; `None` without an interval.
    pub bucket_seconds: Option<i64>,
}

impl Renderer<'_> {
    /// Row-level expression over stored columns.
    pub fn raw(&self, expr: &Expr) -> CompileResult<sql::Expr> {
        Ok(match expr {
            Expr::Literal(lit) => literal(lit),
            Expr::Column(name) => sql::col(name),
            Expr::Macro(name) => return Err(CompileError::UnresolvedMacro(name.clone())),
            Expr::Binary { op, left, right } => {
                compare(self.raw(left)?, binary_operator(*op), self.raw(right)?)
            }
            Expr::Unary { op, expr } => unary(*op, self.raw(expr)?),
            Expr::InList {
                expr,
                list,
                negated,
            } => sql::Expr::In {
                expr: Box::new(self.raw(expr)?),
                values: list.iter().map(|e| self.raw(e)).collect::<CompileResult<_>>()?,
                negated: *negated,
            },
            Expr::Call { name, args } => sql::func(
                name,
                args.iter().map(|a| self.raw(a)).collect::<CompileResult<_>>()?,
            ),
        })
    }

    pub fn post(&self, expr: &PostExpr, scope: Scope) -> CompileResult<sql::Expr> {
        Ok(match expr {
            PostExpr::Column(name) => sql::col(name),
            PostExpr::Key(k) => {
                let key = &self.keys[*k];
                match scope {
                    Scope::Base => sql::col(&key.column),
                    Scope::Regroup | Scope::Post => sql::col(&key.name),
                }
            }
            PostExpr::Agg(i) => {
                let slot = &self.aggs[*i];
                match scope {
                    Scope::Base | Scope::Regroup if !slot.window => self.aggregate(*i)?,
                    _ => sql::col(self.agg_name(*i)?),
                }
            }
            PostExpr::Folded(j) => match scope {
                Scope::Base | Scope::Regroup => self.post(&self.folded[*j].expr, scope)?,
                Scope::Post => sql::col(self.folded_name(*j)?),
            },
            PostExpr::Output(i) => {
                let output = &self.outputs[*i];
                if scope != Scope::Post {
                    return Err(CompileError::unsupported(
                        &output.name,
                        "output is not available before aggregation",
                    ));
                }
                if self.dialect.allows_alias_in_where() {
                    sql::col(&output.name)
                } else {
                    self.post(&output.expr, scope)?
                }
            }
            PostExpr::Literal(lit) => literal(lit),
            PostExpr::Binary { op, left, right } => compare(
                self.post(left, scope)?,
                binary_operator(*op),
                self.post(right, scope)?,
            ),
            PostExpr::Unary { op, expr } => unary(*op, self.post(expr, scope)?),
            PostExpr::InList {
                expr,
                list,
                negated,
            } => sql::Expr::In {
                expr: Box::new(self.post(expr, scope)?),
                values: list
                    .iter()
                    .map(|e| self.post(e, scope))
                    .collect::<CompileResult<_>>()?,
                negated: *negated,
            },
            PostExpr::Call { name, args } => sql::func(
                name,
                args.iter()
                    .map(|a| self.post(a, scope))
                    .collect::<CompileResult<_>>()?,
            ),
        })
    }

    pub fn agg_name(&self, i: usize) -> CompileResult<&str> {
        self.aggs[i]
            .name
            .as_deref()
            .ok_or_else(|| CompileError::unsupported(self.call_text(i), "aggregate has no field"))
    }

    pub fn folded_name(&self, j: usize) -> CompileResult<&str> {
        self.folded[j].name.as_deref().ok_or_else(|| {
            CompileError::unsupported(format!("{:?}", self.folded[j].expr), "expression has no field")
        })
    }

    fn call_text(&self, i: usize) -> String {
        let call = &self.aggs[i].call;
        match &call.arg {
            Some(arg) => format!("{}({arg})", call.func),
            None => format!("{}()", call.func),
        }
    }

    fn capability(&self, i: usize) -> CompileError {
        CompileError::DialectCapability {
            dialect: self.dialect.name(),
            construct: self.call_text(i),
        }
    }

    /// The aggregate as a grouping-stage expression.
    pub fn aggregate(&self, i: usize) -> CompileResult<sql::Expr> {
        let call = &self.aggs[i].call;
        let arg = match &call.arg {
            Some(arg) => Some(self.raw(arg)?),
            None => None,
        };
        let Some(value) = arg else {
            return match call.func {
                AggregateFunc::Count => Ok(sql::func("count", vec![sql::star()])),
                _ => Err(CompileError::unsupported(self.call_text(i), "missing argument")),
            };
        };
        Ok(match call.func {
            AggregateFunc::Sum => sql::func("sum", vec![value]),
            AggregateFunc::Count => sql::func("count", vec![value]),
            AggregateFunc::Avg => sql::func("avg", vec![value]),
            AggregateFunc::Min => sql::func("min", vec![value]),
            AggregateFunc::Max => sql::func("max", vec![value]),
            AggregateFunc::Cardinality => self.dialect.count_distinct(value),
            AggregateFunc::GroupConcat => self
                .dialect
                .group_concat(value)
                .ok_or_else(|| self.capability(i))?,
            AggregateFunc::Rate => match self.bucket_seconds {
                Some(seconds) => helpers::rate(sql::func("sum", vec![value]), seconds),
                None => {
                    return Err(CompileError::unsupported(
                        self.call_text(i),
                        "rate needs an interval",
                    ))
                }
            },
            AggregateFunc::First | AggregateFunc::Last => self
                .dialect
                .first_last_aggregate(
                    call.func == AggregateFunc::Last,
                    value,
                    sql::col(self.time_column),
                )
                .ok_or_else(|| self.capability(i))?,
        })
    }

    /// A first/last aggregate as a per-row window function.
    pub fn window(&self, i: usize, partition_by: Vec<sql::Expr>) -> CompileResult<sql::Expr> {
        let call = &self.aggs[i].call;
        let value = match &call.arg {
            Some(arg) => self.raw(arg)?,
            None => return Err(CompileError::unsupported(self.call_text(i), "missing argument")),
        };
        Ok(self.dialect.first_last_window(
            call.func == AggregateFunc::Last,
            value,
            partition_by,
            sql::col(self.time_column),
        ))
    }
}

pub(crate) fn literal(lit: &Literal) -> sql::Expr {
    match lit {
        Literal::Int(n) => sql::lit_int(*n),
        Literal::Float(f) => sql::lit_float(f.0),
        Literal::String(s) => sql::lit_str(s),
        Literal::Bool(b) => sql::Expr::Literal(sql::Literal::Bool(*b)),
        Literal::Null => sql::Expr::Literal(sql::Literal::Null),
        Literal::Duration(d) => sql::lit_int(d.seconds()),
        Literal::Size(s) => sql::lit_int(s.value()),
        Literal::Percentage(p) => sql::lit_float(p.fraction()),
    }
}

fn binary_operator(op: BinaryOp) -> BinaryOperator {
    match op {
        BinaryOp::Add => BinaryOperator::Plus,
        BinaryOp::Sub => BinaryOperator::Minus,
        BinaryOp::Mul => BinaryOperator::Mul,
        BinaryOp::Div => BinaryOperator::Div,
        BinaryOp::Mod => BinaryOperator::Mod,
        BinaryOp::Eq => BinaryOperator::Eq,
        BinaryOp::Ne => BinaryOperator::Ne,
        BinaryOp::Lt => BinaryOperator::Lt,
        BinaryOp::Lte => BinaryOperator::Lte,
        BinaryOp::Gt => BinaryOperator::Gt,
        BinaryOp::Gte => BinaryOperator::Gte,
        BinaryOp::Like => BinaryOperator::Like,
        BinaryOp::NotLike => BinaryOperator::NotLike,
        BinaryOp::And => BinaryOperator::And,
        BinaryOp::Or => BinaryOperator::Or,
    }
}

/// Binary node, except that `= NULL` and `<> NULL` become null tests:
/// compared with NULL they are never true.
fn compare(left: sql::Expr, op: BinaryOperator, right: sql::Expr) -> sql::Expr {
    let null = sql::Expr::Literal(sql::Literal::Null);
    let negated = match op {
        BinaryOperator::Eq => false,
        BinaryOperator::Ne => true,
        _ => return sql::binary(left, op, right),
    };
    let operand = if right == null {
        left
    } else if left == null {
        right
    } else {
        return sql::binary(left, op, right);
    };
    sql::Expr::IsNull {
        expr: Box::new(operand),
        negated,
    }
}

fn unary(op: UnaryOp, expr: sql::Expr) -> sql::Expr {
    sql::Expr::UnaryOp {
        op: match op {
            UnaryOp::Not => UnaryOperator::Not,
            UnaryOp::Neg => UnaryOperator::Minus,
        },
        expr: Box::new(expr),
    }
}
