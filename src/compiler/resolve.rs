//! Name and macro resolution for selector and filter expressions.

use super::error::{CompileError, CompileResult};
use crate::expr::{Expr, FunctionKind, FunctionRegistry, Literal};
use crate::schema::{ColumnKind, Schema};

/// Macro standing for the bucket length in seconds.
pub(crate) const INTERVAL_MACRO: &str = "interval";

/// Rewrites expressions so that only stored columns remain.
pub(crate) struct Resolver<'a> {
    schema: &'a Schema,
    registry: &'a FunctionRegistry,
    bucket_seconds: Option<i64>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        schema: &'a Schema,
        registry: &'a FunctionRegistry,
        bucket_seconds: Option<i64>,
    ) -> Self {
        Self {
            schema,
            registry,
            bucket_seconds,
        }
    }

    /// Inline derived columns, substitute macros and check calls.
    pub fn resolve(&self, expr: Expr) -> CompileResult<Expr> {
        let resolved = self.inline(expr, &mut Vec::new())?;
        self.check_calls(&resolved, None)?;
        Ok(resolved)
    }

    fn inline(&self, expr: Expr, stack: &mut Vec<String>) -> CompileResult<Expr> {
        expr.try_rewrite(&mut |node| match node {
            Expr::Column(name) => self.inline_column(name, stack),
            Expr::Macro(name) => self.substitute_macro(&name),
            other => Ok(other),
        })
    }

    fn inline_column(&self, name: String, stack: &mut Vec<String>) -> CompileResult<Expr> {
        match self.schema.column(&name) {
            Some(ColumnKind::Derived(derived)) => {
                if let Some(pos) = stack.iter().position(|n| *n == name) {
                    let mut cycle = stack[pos..].to_vec();
                    cycle.push(name);
                    return Err(CompileError::DerivedCycle(cycle));
                }
                stack.push(name);
                let inlined = self.inline(derived.expr.clone(), stack)?;
                stack.pop();
                Ok(inlined)
            }
            Some(_) => Ok(Expr::Column(name)),
            None => Err(CompileError::UnknownColumn(name)),
        }
    }

    fn substitute_macro(&self, name: &str) -> CompileResult<Expr> {
        match self.bucket_seconds {
            Some(seconds) if name == INTERVAL_MACRO => Ok(Expr::Literal(Literal::Int(seconds))),
            _ => Err(CompileError::UnresolvedMacro(name.to_string())),
        }
    }

    /// Reject unknown functions, bad arity and aggregates inside aggregates.
    fn check_calls(&self, expr: &Expr, enclosing: Option<&str>) -> CompileResult<()> {
        if let Expr::Call { name, args } = expr {
            let spec = self
                .registry
                .get(name)
                .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
            if !spec.accepts(args.len()) {
                return Err(CompileError::unsupported(
                    expr,
                    format!(
                        "`{}` takes {} to {} arguments",
                        spec.name, spec.min_args, spec.max_args
                    ),
                ));
            }
            if let FunctionKind::Aggregate(_) = spec.kind {
                if let Some(outer) = enclosing {
                    return Err(CompileError::NestedAggregate {
                        outer: outer.to_string(),
                        inner: expr.to_string(),
                    });
                }
                let outer = expr.to_string();
                for arg in args {
                    self.check_calls(arg, Some(&outer))?;
                }
                return Ok(());
            }
        }
        for child in expr.children() {
            self.check_calls(child, enclosing)?;
        }
        Ok(())
    }

    /// Wrap metric columns that are not inside an aggregate with the
    /// metric's default aggregator.
    pub fn apply_default_aggregators(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Call { ref name, .. } if self.registry.is_aggregate(name) => expr,
            Expr::Column(name) => match self.schema.metrics.get(&name) {
                Some(metric) => Expr::Call {
                    name: metric.aggregator.name().to_string(),
                    args: vec![Expr::Column(name)],
                },
                None => Expr::Column(name),
            },
            Expr::Literal(_) | Expr::Macro(_) => expr,
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: Box::new(self.apply_default_aggregators(*left)),
                right: Box::new(self.apply_default_aggregators(*right)),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op,
                expr: Box::new(self.apply_default_aggregators(*expr)),
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: Box::new(self.apply_default_aggregators(*expr)),
                list: list
                    .into_iter()
                    .map(|e| self.apply_default_aggregators(e))
                    .collect(),
                negated,
            },
            Expr::Call { name, args } => Expr::Call {
                name,
                args: args
                    .into_iter()
                    .map(|e| self.apply_default_aggregators(e))
                    .collect(),
            },
        }
    }
}
