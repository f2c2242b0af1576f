//! Lifting resolved expressions out of the row domain.
//!
//! Selector and filter expressions are rewritten into [`PostExpr`] trees
//! whose leaves point at group keys, deduplicated aggregate calls, folded
//! subexpressions or other outputs. Stage rendering decides what each
//! reference turns into at a given nesting level.

use indexmap::IndexSet;

use super::error::{CompileError, CompileResult};
use super::resolve::Resolver;
use crate::expr::{AggregateFunc, BinaryOp, Expr, FunctionRegistry, Literal, UnaryOp};
use crate::schema::{ColumnKind, Schema};

/// An aggregate call, identified by function and argument structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct AggCall {
    pub func: AggregateFunc,
    pub arg: Option<Expr>,
}

impl AggCall {
    /// The column name when the argument is a bare column.
    pub fn single_column(&self) -> Option<&str> {
        match &self.arg {
            Some(Expr::Column(name)) => Some(name),
            _ => None,
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.arg.as_ref().map(Expr::columns).unwrap_or_default()
    }
}

/// A grouping column and the name it is exposed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Key {
    pub column: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PostExpr {
    /// Raw column; only filters produce these.
    Column(String),
    Key(usize),
    Agg(usize),
    Folded(usize),
    /// Another selector's output, referenced from a filter.
    Output(usize),
    Literal(Literal),
    Binary {
        op: BinaryOp,
        left: Box<PostExpr>,
        right: Box<PostExpr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<PostExpr>,
    },
    InList {
        expr: Box<PostExpr>,
        list: Vec<PostExpr>,
        negated: bool,
    },
    Call {
        name: String,
        args: Vec<PostExpr>,
    },
}

impl PostExpr {
    pub fn children(&self) -> Vec<&PostExpr> {
        match self {
            PostExpr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            PostExpr::Unary { expr, .. } => vec![expr.as_ref()],
            PostExpr::InList { expr, list, .. } => {
                let mut out = vec![expr.as_ref()];
                out.extend(list.iter());
                out
            }
            PostExpr::Call { args, .. } => args.iter().collect(),
            _ => vec![],
        }
    }

    /// Whether `pred` holds for this node or any descendant.
    pub fn any(&self, pred: &impl Fn(&PostExpr) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(pred))
    }

    pub fn has_agg(&self) -> bool {
        self.any(&|e| matches!(e, PostExpr::Agg(_) | PostExpr::Folded(_)))
    }

    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            PostExpr::Binary { .. }
                | PostExpr::Unary { .. }
                | PostExpr::InList { .. }
                | PostExpr::Call { .. }
        )
    }

    /// Evaluation level of this expression.
    pub fn level(&self) -> Level {
        match self {
            PostExpr::Column(_) | PostExpr::Key(_) | PostExpr::Literal(_) => Level::Raw,
            PostExpr::Agg(_) | PostExpr::Folded(_) => Level::Agg,
            PostExpr::Output(_) => Level::Post,
            _ => self
                .children()
                .into_iter()
                .map(PostExpr::level)
                .max()
                .unwrap_or(Level::Raw),
        }
    }

    /// Raw column names in this expression.
    pub fn raw_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_raw_columns(&mut out);
        out
    }

    fn collect_raw_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let PostExpr::Column(name) = self {
            out.push(name);
        }
        for child in self.children() {
            child.collect_raw_columns(out);
        }
    }

    /// Aggregate and folded references, without descending into folded
    /// definitions.
    pub fn collect_refs(&self, aggs: &mut Vec<usize>, folded: &mut Vec<usize>) {
        match self {
            PostExpr::Agg(i) if !aggs.contains(i) => aggs.push(*i),
            PostExpr::Folded(j) if !folded.contains(j) => folded.push(*j),
            _ => {}
        }
        for child in self.children() {
            child.collect_refs(aggs, folded);
        }
    }

    /// Rebuild this node with `f` applied to each child.
    pub fn map_children<E>(
        self,
        f: &mut impl FnMut(PostExpr) -> Result<PostExpr, E>,
    ) -> Result<PostExpr, E> {
        Ok(match self {
            PostExpr::Binary { op, left, right } => PostExpr::Binary {
                op,
                left: Box::new(f(*left)?),
                right: Box::new(f(*right)?),
            },
            PostExpr::Unary { op, expr } => PostExpr::Unary {
                op,
                expr: Box::new(f(*expr)?),
            },
            PostExpr::InList {
                expr,
                list,
                negated,
            } => PostExpr::InList {
                expr: Box::new(f(*expr)?),
                list: list.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                negated,
            },
            PostExpr::Call { name, args } => PostExpr::Call {
                name,
                args: args.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
            },
            leaf => leaf,
        })
    }
}

/// Where a value can first be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Level {
    /// Per row, before grouping.
    Raw,
    /// At the grouping stage.
    Agg,
    /// Only after aggregation, from output aliases.
    Post,
}

/// How a selector is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputKind {
    /// A group key exposed under its own name.
    Key(usize),
    /// A single aggregate call with nothing around it.
    Direct(usize),
    /// No aggregate: keys, literals and scalar functions over them.
    Scalar,
    /// Arithmetic or functions over aggregates.
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Output {
    pub name: String,
    pub expr: PostExpr,
    pub kind: OutputKind,
}

/// A filter conjunct with its routing level.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FilterLeaf {
    pub expr: PostExpr,
    pub level: Level,
    pub text: String,
}

/// Lifts expressions, interning aggregate calls as it goes.
pub(crate) struct Lifter<'a> {
    schema: &'a Schema,
    registry: &'a FunctionRegistry,
    keys: &'a [Key],
    aggs: IndexSet<AggCall>,
}

impl<'a> Lifter<'a> {
    pub fn new(schema: &'a Schema, registry: &'a FunctionRegistry, keys: &'a [Key]) -> Self {
        Self {
            schema,
            registry,
            keys,
            aggs: IndexSet::new(),
        }
    }

    pub fn into_aggregates(self) -> IndexSet<AggCall> {
        self.aggs
    }

    fn key_of(&self, column: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.column == column)
    }

    fn intern(&mut self, func: AggregateFunc, args: &[Expr]) -> usize {
        let call = AggCall {
            func,
            arg: args.first().cloned(),
        };
        self.aggs.insert_full(call).0
    }

    /// Lift a resolved selector. Every column outside an aggregate must be
    /// a group key.
    pub fn lift_selector(&mut self, expr: &Expr) -> CompileResult<PostExpr> {
        self.lift(expr, &mut |lifter, name| match lifter.key_of(name) {
            Some(k) => Ok(PostExpr::Key(k)),
            None => Err(CompileError::UngroupedColumn {
                expr: expr.to_string(),
                column: name.to_string(),
            }),
        })
    }

    fn lift(
        &mut self,
        expr: &Expr,
        on_column: &mut impl FnMut(&mut Self, &str) -> CompileResult<PostExpr>,
    ) -> CompileResult<PostExpr> {
        Ok(match expr {
            Expr::Literal(lit) => PostExpr::Literal(lit.clone()),
            Expr::Column(name) => on_column(self, name)?,
            Expr::Macro(name) => return Err(CompileError::UnresolvedMacro(name.clone())),
            Expr::Call { name, args } => match self.registry.aggregate(name) {
                Some(func) => PostExpr::Agg(self.intern(func, args)),
                None => PostExpr::Call {
                    name: name.clone(),
                    args: args
                        .iter()
                        .map(|a| self.lift(a, on_column))
                        .collect::<CompileResult<_>>()?,
                },
            },
            Expr::Binary { op, left, right } => PostExpr::Binary {
                op: *op,
                left: Box::new(self.lift(left, on_column)?),
                right: Box::new(self.lift(right, on_column)?),
            },
            Expr::Unary { op, expr } => PostExpr::Unary {
                op: *op,
                expr: Box::new(self.lift(expr, on_column)?),
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => PostExpr::InList {
                expr: Box::new(self.lift(expr, on_column)?),
                list: list
                    .iter()
                    .map(|e| self.lift(e, on_column))
                    .collect::<CompileResult<_>>()?,
                negated: *negated,
            },
        })
    }

    /// Split a filter into conjuncts and classify each one.
    ///
    /// A bare name resolves to a stored column first, then to a selector
    /// output, then to a derived column.
    pub fn lift_filter(
        &mut self,
        filter: &Expr,
        resolver: &Resolver<'_>,
        outputs: &[Output],
    ) -> CompileResult<Vec<FilterLeaf>> {
        let mut leaves = Vec::new();
        for conjunct in filter.conjuncts() {
            let lifted = self.lift_filter_expr(conjunct, resolver, outputs)?;
            let level = lifted.level();
            let expr = if level > Level::Raw {
                self.keys_only(lifted, conjunct)?
            } else {
                lifted
            };
            leaves.push(FilterLeaf {
                expr,
                level,
                text: conjunct.to_string(),
            });
        }
        Ok(leaves)
    }

    fn lift_filter_expr(
        &mut self,
        expr: &Expr,
        resolver: &Resolver<'_>,
        outputs: &[Output],
    ) -> CompileResult<PostExpr> {
        match expr {
            Expr::Column(name) => {
                if self.schema.is_stored(name) {
                    return Ok(PostExpr::Column(name.clone()));
                }
                if let Some(i) = outputs.iter().position(|o| o.name == *name) {
                    let output = &outputs[i];
                    return Ok(match output.kind {
                        OutputKind::Post => PostExpr::Output(i),
                        _ => output.expr.clone(),
                    });
                }
                match self.schema.column(name) {
                    Some(ColumnKind::Derived(_)) => {
                        let inlined = resolver.resolve(expr.clone())?;
                        self.lift(&inlined, &mut |_, column| {
                            Ok(PostExpr::Column(column.to_string()))
                        })
                    }
                    _ => Err(CompileError::UnknownColumn(name.clone())),
                }
            }
            Expr::Call { name, .. } if self.registry.is_aggregate(name) => {
                let resolved = resolver.resolve(expr.clone())?;
                self.lift(&resolved, &mut |_, column| {
                    Ok(PostExpr::Column(column.to_string()))
                })
            }
            Expr::Call { name, args } => {
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
                Ok(PostExpr::Call {
                    name: name.clone(),
                    args: args
                        .iter()
                        .map(|a| self.lift_filter_expr(a, resolver, outputs))
                        .collect::<CompileResult<_>>()?,
                })
            }
            Expr::Macro(_) => {
                let resolved = resolver.resolve(expr.clone())?;
                self.lift_filter_expr(&resolved, resolver, outputs)
            }
            Expr::Literal(lit) => Ok(PostExpr::Literal(lit.clone())),
            Expr::Binary { op, left, right } => Ok(PostExpr::Binary {
                op: *op,
                left: Box::new(self.lift_filter_expr(left, resolver, outputs)?),
                right: Box::new(self.lift_filter_expr(right, resolver, outputs)?),
            }),
            Expr::Unary { op, expr } => Ok(PostExpr::Unary {
                op: *op,
                expr: Box::new(self.lift_filter_expr(expr, resolver, outputs)?),
            }),
            Expr::InList {
                expr,
                list,
                negated,
            } => Ok(PostExpr::InList {
                expr: Box::new(self.lift_filter_expr(expr, resolver, outputs)?),
                list: list
                    .iter()
                    .map(|e| self.lift_filter_expr(e, resolver, outputs))
                    .collect::<CompileResult<_>>()?,
                negated: *negated,
            }),
        }
    }

    /// Above the raw level, a row column is only visible as a group key.
    fn keys_only(&self, expr: PostExpr, conjunct: &Expr) -> CompileResult<PostExpr> {
        match expr {
            PostExpr::Column(name) => match self.key_of(&name) {
                Some(k) => Ok(PostExpr::Key(k)),
                None => Err(CompileError::MixedFilterLevels(conjunct.to_string())),
            },
            other => other.map_children(&mut |child| self.keys_only(child, conjunct)),
        }
    }
}
