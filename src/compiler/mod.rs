//! Metric query compiler.
//!
//! Compiles a [`MetricQuery`] against a [`Schema`] into a staged
//! [`QueryPlan`] and renders it for one SQL dialect:
//!
//! ```text
//! selectors, filter ──▶ resolve ──▶ lift ──▶ layout ──▶ fold ──▶ name ──▶ stages ──▶ SQL
//!                       (derived,   (keys,    (1-3      (shared   (_varN)
//!                        macros)     aggs)    stages)    exprs)
//! ```
//!
//! Each call to [`Compiler::compile`] owns its own naming state, so a
//! compiler can be shared across threads.

mod context;
mod error;
mod fold;
mod layout;
mod lift;
mod naming;
mod query;
mod render;
mod resolve;
mod types;

pub use error::{CompileError, CompileResult, ErrorKind};
pub use query::{Interval, Limit, MetricQuery, OrderBy, Selector};

use serde::Serialize;
use tracing::debug;

use crate::expr::{Expr, FunctionRegistry};
use crate::plan::QueryPlan;
use crate::schema::{ColumnKind, DataType, Schema};
use crate::sql::{self, LimitOffset, OrderByExpr, SqlDialect};
use context::CompileContext;
use fold::{fold_shared, Folded};
use layout::{Layout, StageBuilder, TimeRange};
use lift::{Key, Lifter, Output, OutputKind, PostExpr};
use naming::Naming;
use render::{AggSlot, Renderer};
use resolve::Resolver;
use types::TypeEnv;

/// Name of the time-bucket pseudo-dimension.
pub const TIMESTAMP_FIELD: &str = "_timestamp";

/// A column of the compiled result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    pub data_type: DataType,
}

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub columns: Vec<OutputColumn>,
    pub plan: QueryPlan,
}

/// Compiles metric queries for one schema and dialect.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    schema: &'a Schema,
    dialect: &'a dyn SqlDialect,
    registry: &'a FunctionRegistry,
    pretty: bool,
}

impl<'a> Compiler<'a> {
    pub fn new(
        schema: &'a Schema,
        dialect: &'a dyn SqlDialect,
        registry: &'a FunctionRegistry,
    ) -> Self {
        Self {
            schema,
            dialect,
            registry,
            pretty: true,
        }
    }

    /// Multi-line output (default) or a single line.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn compile(&self, query: &MetricQuery) -> CompileResult<CompiledQuery> {
        let (plan, columns) = self.analyze(query)?;
        let sql = plan.to_sql(self.dialect, self.pretty);
        debug!(
            dialect = self.dialect.name(),
            stages = plan.depth(),
            columns = columns.len(),
            "compiled metric query"
        );
        Ok(CompiledQuery { sql, columns, plan })
    }

    pub fn plan(&self, query: &MetricQuery) -> CompileResult<QueryPlan> {
        Ok(self.analyze(query)?.0)
    }

    fn analyze(&self, query: &MetricQuery) -> CompileResult<(QueryPlan, Vec<OutputColumn>)> {
        if query.selectors.is_empty() {
            return Err(CompileError::NoSelectors);
        }

        let time_column = query
            .interval
            .as_ref()
            .and_then(|i| i.time_column.as_deref())
            .unwrap_or(&self.schema.timestamp);
        if !self.schema.is_stored(time_column) {
            return Err(CompileError::UnknownColumn(time_column.to_string()));
        }
        let bucket_seconds = query
            .interval
            .as_ref()
            .map(Interval::bucket_seconds)
            .transpose()?;
        let time = query.interval.as_ref().map(|interval| TimeRange {
            start: interval.start,
            end: interval.end,
            column: time_column,
            step: interval.step.as_ref().and(bucket_seconds),
        });
        let bucketed = time.as_ref().is_some_and(|t| t.step.is_some());

        let resolver = Resolver::new(self.schema, self.registry, bucket_seconds);
        let mut selected = Vec::with_capacity(query.selectors.len());
        for selector in &query.selectors {
            let name = selector.output_name()?.to_string();
            let expr = resolver.resolve(selector.expr.clone())?;
            selected.push((name, resolver.apply_default_aggregators(expr)));
        }

        let keys = self.group_keys(&query.group_by, &selected)?;
        let mut lifter = Lifter::new(self.schema, self.registry, &keys);
        let mut outputs = Vec::with_capacity(selected.len());
        for (name, expr) in selected {
            let lifted = lifter.lift_selector(&expr)?;
            let kind = match lifted {
                PostExpr::Key(k) if keys[k].name == name => OutputKind::Key(k),
                PostExpr::Agg(i) => OutputKind::Direct(i),
                ref e if e.has_agg() => OutputKind::Post,
                _ => OutputKind::Scalar,
            };
            outputs.push(Output {
                name,
                expr: lifted,
                kind,
            });
        }
        let names = output_names(&keys, &outputs, bucketed)?;

        let leaves = match &query.filter {
            Some(filter) => lifter.lift_filter(filter, &resolver, &outputs)?,
            None => Vec::new(),
        };
        let mut aggs: Vec<AggSlot> = lifter
            .into_aggregates()
            .into_iter()
            .map(|call| {
                let window = call.func.is_window_capable()
                    && self.dialect.use_window_function_as_aggregator(call.func.name());
                AggSlot {
                    call,
                    window,
                    name: None,
                }
            })
            .collect();

        let has_window = aggs.iter().any(|a| a.window);
        let has_post = outputs.iter().any(|o| o.kind == OutputKind::Post);
        let selects_true_aggregate = outputs.iter().any(|o| {
            let (mut refs, mut folded) = (Vec::new(), Vec::new());
            o.expr.collect_refs(&mut refs, &mut folded);
            refs.iter().any(|i| !aggs[*i].window)
        });
        let layout = Layout::choose(has_window, has_post, selects_true_aggregate);
        debug!(
            ?layout,
            stages = layout.depth(),
            aggregates = aggs.len(),
            filters = leaves.len(),
            "chose stage layout"
        );

        let mut folded: Vec<Folded> = if layout.has_post_stage() {
            fold_shared(&mut outputs)
        } else {
            Vec::new()
        };
        let carried = if layout.is_window() {
            carried_columns(&keys, &aggs, time_column)?
        } else {
            Vec::new()
        };

        let mut ctx = CompileContext::new(self.schema.names());
        for name in &names {
            ctx.reserve(name);
        }
        Naming {
            layout,
            keys: &keys,
            outputs: &outputs,
            leaves: &leaves,
            carried: &carried,
        }
        .assign(&mut ctx, &mut aggs, &mut folded);

        let order_by = self.order_by(query, &names)?;

        let builder = StageBuilder {
            renderer: Renderer {
                dialect: self.dialect,
                keys: &keys,
                aggs: &aggs,
                folded: &folded,
                outputs: &outputs,
                time_column,
                bucket_seconds,
            },
            table: &self.schema.table,
            leaves: &leaves,
            time,
            carried: &carried,
        };
        let mut stages = builder.build(layout)?;
        if let Some(last) = stages.last_mut() {
            last.order_by = order_by;
            last.limit = query.limit.map(|l| LimitOffset {
                limit: Some(l.limit),
                offset: (l.offset > 0).then_some(l.offset),
            });
        }

        let calls: Vec<_> = aggs.iter().map(|a| a.call.clone()).collect();
        let folded_exprs: Vec<_> = folded.iter().map(|f| f.expr.clone()).collect();
        let env = TypeEnv {
            schema: self.schema,
            keys: &keys,
            aggs: &calls,
            folded: &folded_exprs,
        };
        let mut columns = Vec::with_capacity(names.len());
        if bucketed {
            columns.push(OutputColumn {
                name: TIMESTAMP_FIELD.to_string(),
                data_type: DataType::Int,
            });
        }
        for (k, key) in keys.iter().enumerate() {
            columns.push(OutputColumn {
                name: key.name.clone(),
                data_type: env.post_type(&PostExpr::Key(k)),
            });
        }
        for output in outputs
            .iter()
            .filter(|o| !matches!(o.kind, OutputKind::Key(_)))
        {
            columns.push(OutputColumn {
                name: output.name.clone(),
                data_type: env.post_type(&output.expr),
            });
        }

        Ok((QueryPlan { stages }, columns))
    }

    /// Explicit group-by dimensions, then dimensions selected bare.
    ///
    /// The first selector naming a grouped dimension decides the key's
    /// output name.
    fn group_keys(&self, group_by: &[String], selected: &[(String, Expr)]) -> CompileResult<Vec<Key>> {
        let mut keys: Vec<Key> = Vec::new();
        for name in group_by {
            match self.schema.column(name) {
                Some(ColumnKind::Dimension(_)) => {
                    if !keys.iter().any(|k| k.column == *name) {
                        keys.push(Key {
                            column: name.clone(),
                            name: name.clone(),
                        });
                    }
                }
                Some(_) => {
                    return Err(CompileError::unsupported(
                        name,
                        "only dimensions can be grouped by",
                    ))
                }
                None => return Err(CompileError::UnknownColumn(name.clone())),
            }
        }

        let mut named = vec![false; keys.len()];
        for (name, expr) in selected {
            let Expr::Column(column) = expr else { continue };
            if !matches!(self.schema.column(column), Some(ColumnKind::Dimension(_))) {
                continue;
            }
            match keys.iter().position(|k| k.column == *column) {
                Some(k) if !named[k] => {
                    keys[k].name = name.clone();
                    named[k] = true;
                }
                Some(_) => {}
                None => {
                    keys.push(Key {
                        column: column.clone(),
                        name: name.clone(),
                    });
                    named.push(true);
                }
            }
        }
        Ok(keys)
    }

    fn order_by(&self, query: &MetricQuery, names: &[String]) -> CompileResult<Vec<OrderByExpr>> {
        query
            .order_by
            .iter()
            .map(|order| {
                if !names.contains(&order.name) {
                    return Err(CompileError::UnknownOutput(order.name.clone()));
                }
                let column = sql::col(&order.name);
                Ok(if order.descending {
                    OrderByExpr::desc(column)
                } else {
                    OrderByExpr::asc(column)
                })
            })
            .collect()
    }
}

/// Final output names in order, rejecting duplicates.
fn output_names(keys: &[Key], outputs: &[Output], bucketed: bool) -> CompileResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    if bucketed {
        names.push(TIMESTAMP_FIELD.to_string());
    }
    let candidates = keys.iter().map(|k| &k.name).chain(
        outputs
            .iter()
            .filter(|o| !matches!(o.kind, OutputKind::Key(_)))
            .map(|o| &o.name),
    );
    for name in candidates {
        if names.contains(name) {
            return Err(CompileError::DuplicateOutputName(name.clone()));
        }
        names.push(name.clone());
    }
    Ok(names)
}

/// Raw columns read by aggregates computed after the window stage.
fn carried_columns(keys: &[Key], aggs: &[AggSlot], time_column: &str) -> CompileResult<Vec<String>> {
    let mut carried: Vec<String> = Vec::new();
    for slot in aggs.iter().filter(|s| !s.window) {
        let mut columns = slot.call.columns();
        if slot.call.func.is_window_capable() {
            columns.push(time_column);
        }
        for column in columns {
            if !carried.iter().any(|c| c == column) {
                carried.push(column.to_string());
            }
        }
    }
    carried.retain(|c| !keys.iter().any(|k| k.name == *c && k.column == *c));
    if let Some(key) = keys.iter().find(|k| carried.contains(&k.name)) {
        return Err(CompileError::unsupported(
            &key.name,
            "group key alias shadows a column read after the window stage",
        ));
    }
    Ok(carried)
}
