//! Turning analyzed selectors into 1-3 nested stages.

use chrono::{DateTime, Utc};

use super::error::{CompileError, CompileResult};
use super::lift::{FilterLeaf, Level, Output, OutputKind};
use super::render::{Renderer, Scope};
use super::TIMESTAMP_FIELD;
use crate::plan::{Field, Stage, StageSource};
use crate::sql::{self, BinaryOperator};

/// Nesting shape of a compiled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// One grouped SELECT.
    Flat,
    /// Aggregates, then arithmetic over them.
    PostAggregate,
    /// Window functions, then a regrouping stage.
    Window,
    /// Window functions, regrouping with true aggregates, then arithmetic.
    WindowPostAggregate,
}

impl Layout {
    pub fn choose(has_window: bool, has_post: bool, selects_true_aggregate: bool) -> Self {
        match (has_window, has_post || selects_true_aggregate) {
            (true, true) => Layout::WindowPostAggregate,
            (true, false) => Layout::Window,
            (false, _) if has_post => Layout::PostAggregate,
            (false, _) => Layout::Flat,
        }
    }

    pub fn has_post_stage(self) -> bool {
        matches!(self, Layout::PostAggregate | Layout::WindowPostAggregate)
    }

    pub fn is_window(self) -> bool {
        matches!(self, Layout::Window | Layout::WindowPostAggregate)
    }

    pub fn depth(self) -> usize {
        match self {
            Layout::Flat => 1,
            Layout::PostAggregate | Layout::Window => 2,
            Layout::WindowPostAggregate => 3,
        }
    }
}

/// `[start, end)` on the time column, with an optional bucket step.
#[derive(Debug, Clone)]
pub(crate) struct TimeRange<'a> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub column: &'a str,
    pub step: Option<i64>,
}

pub(crate) struct StageBuilder<'a> {
    pub renderer: Renderer<'a>,
    pub table: &'a str,
    pub leaves: &'a [FilterLeaf],
    pub time: Option<TimeRange<'a>>,
    /// Raw columns the window stage passes through for later aggregation.
    pub carried: &'a [String],
}

impl StageBuilder<'_> {
    pub fn build(&self, layout: Layout) -> CompileResult<Vec<Stage>> {
        if !layout.has_post_stage() {
            if let Some(leaf) = self.leaves.iter().find(|l| l.level == Level::Post) {
                return Err(CompileError::unsupported(
                    &leaf.text,
                    "filter needs a post-aggregation stage",
                ));
            }
        }
        let stages = match layout {
            Layout::Flat => vec![self.flat()?],
            Layout::PostAggregate => vec![self.aggregate_stage()?, self.post_stage()?],
            Layout::Window => vec![self.window_stage()?, self.regroup_stage(false)?],
            Layout::WindowPostAggregate => vec![
                self.window_stage()?,
                self.regroup_stage(true)?,
                self.post_stage()?,
            ],
        };
        self.check_alias_visibility(&stages)?;
        Ok(stages)
    }

    /// Where aliases are visible to the rest of their SELECT, an alias must
    /// not share its name with a column another expression of that SELECT
    /// reads. Pass-through fields (`"x" AS "x"`) and `_timestamp`, which
    /// GROUP BY names on purpose, are exempt.
    fn check_alias_visibility(&self, stages: &[Stage]) -> CompileResult<()> {
        let dialect = self.renderer.dialect;
        if !dialect.allows_alias_in_where() {
            return Ok(());
        }
        for stage in stages {
            for (i, field) in stage.fields.iter().enumerate() {
                let passthrough = matches!(
                    &field.expr,
                    sql::Expr::Column { table: None, column } if *column == field.name
                );
                if passthrough || field.name == TIMESTAMP_FIELD {
                    continue;
                }
                if stage.columns_read_besides(i).contains(&field.name.as_str()) {
                    return Err(CompileError::ShadowedColumn {
                        alias: field.name.clone(),
                        dialect: dialect.name(),
                    });
                }
            }
        }
        Ok(())
    }

    fn selected(&self) -> impl Iterator<Item = &Output> {
        self.renderer
            .outputs
            .iter()
            .filter(|o| !matches!(o.kind, OutputKind::Key(_)))
    }

    fn time_floor(&self) -> CompileResult<Option<sql::Expr>> {
        let Some(TimeRange {
            column,
            step: Some(step),
            ..
        }) = &self.time
        else {
            return Ok(None);
        };
        let dialect = self.renderer.dialect;
        dialect
            .time_floor(sql::col(column), *step)
            .map(Some)
            .ok_or_else(|| CompileError::DialectCapability {
                dialect: dialect.name(),
                construct: format!("time bucketing on `{column}`"),
            })
    }

    fn is_bucketed(&self) -> bool {
        matches!(&self.time, Some(TimeRange { step: Some(_), .. }))
    }

    /// `_timestamp` and the group keys, read from the base table.
    fn base_prefix(&self) -> CompileResult<Vec<Field>> {
        let mut fields = Vec::new();
        if let Some(floor) = self.time_floor()? {
            fields.push(Field::new(TIMESTAMP_FIELD, floor));
        }
        for key in self.renderer.keys {
            fields.push(Field::new(&key.name, sql::col(&key.column)));
        }
        Ok(fields)
    }

    /// `_timestamp` and the group keys, passed through from the previous stage.
    fn carried_prefix(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.is_bucketed() {
            fields.push(Field::new(TIMESTAMP_FIELD, sql::col(TIMESTAMP_FIELD)));
        }
        for key in self.renderer.keys {
            fields.push(Field::new(&key.name, sql::col(&key.name)));
        }
        fields
    }

    fn base_where(&self) -> CompileResult<Option<sql::Expr>> {
        let mut conditions = Vec::new();
        if let Some(time) = &self.time {
            let dialect = self.renderer.dialect;
            conditions.push(sql::binary(
                sql::col(time.column),
                BinaryOperator::Gte,
                dialect.format_timestamp(&time.start),
            ));
            conditions.push(sql::binary(
                sql::col(time.column),
                BinaryOperator::Lt,
                dialect.format_timestamp(&time.end),
            ));
        }
        for leaf in self.leaves.iter().filter(|l| l.level == Level::Raw) {
            conditions.push(self.renderer.post(&leaf.expr, Scope::Base)?);
        }
        Ok(sql::conjunction(conditions))
    }

    fn having(&self, scope: Scope) -> CompileResult<Option<sql::Expr>> {
        let conditions = self
            .leaves
            .iter()
            .filter(|l| l.level == Level::Agg)
            .map(|l| self.renderer.post(&l.expr, scope))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(sql::conjunction(conditions))
    }

    fn post_where(&self) -> CompileResult<Option<sql::Expr>> {
        let conditions = self
            .leaves
            .iter()
            .filter(|l| l.level == Level::Post)
            .map(|l| self.renderer.post(&l.expr, Scope::Post))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(sql::conjunction(conditions))
    }

    fn base_group_by(&self) -> Vec<sql::Expr> {
        let mut group_by: Vec<_> = self
            .renderer
            .keys
            .iter()
            .map(|k| sql::col(&k.column))
            .collect();
        if self.is_bucketed() {
            group_by.push(sql::col(TIMESTAMP_FIELD));
        }
        group_by
    }

    /// Named non-window aggregates as grouping-stage fields.
    fn aggregate_fields(&self) -> CompileResult<Vec<Field>> {
        let mut fields = Vec::new();
        for (i, slot) in self.renderer.aggs.iter().enumerate() {
            if let (Some(name), false) = (&slot.name, slot.window) {
                fields.push(Field::new(name, self.renderer.aggregate(i)?));
            }
        }
        Ok(fields)
    }

    fn folded_fields(&self, scope: Scope) -> CompileResult<Vec<Field>> {
        let mut fields = Vec::new();
        for (j, folded) in self.renderer.folded.iter().enumerate() {
            let name = self.renderer.folded_name(j)?;
            fields.push(Field::new(name, self.renderer.post(&folded.expr, scope)?));
        }
        Ok(fields)
    }

    fn flat(&self) -> CompileResult<Stage> {
        let mut stage = Stage::new(StageSource::Table(self.table.to_string()));
        stage.fields = self.base_prefix()?;
        for output in self.selected() {
            let expr = self.renderer.post(&output.expr, Scope::Base)?;
            stage.fields.push(Field::new(&output.name, expr));
        }
        stage.where_clause = self.base_where()?;
        stage.group_by = self.base_group_by();
        stage.having = self.having(Scope::Base)?;
        Ok(stage)
    }

    /// Innermost grouping stage of a post-aggregation plan.
    fn aggregate_stage(&self) -> CompileResult<Stage> {
        let mut stage = Stage::new(StageSource::Table(self.table.to_string()));
        stage.fields = self.base_prefix()?;
        stage.fields.extend(self.aggregate_fields()?);
        stage.fields.extend(self.folded_fields(Scope::Base)?);
        stage.where_clause = self.base_where()?;
        stage.group_by = self.base_group_by();
        stage.having = self.having(Scope::Base)?;
        Ok(stage)
    }

    /// Final arithmetic over named aggregate results.
    fn post_stage(&self) -> CompileResult<Stage> {
        let mut stage = Stage::new(StageSource::Previous);
        stage.fields = self.carried_prefix();
        for output in self.selected() {
            let expr = self.renderer.post(&output.expr, Scope::Post)?;
            stage.fields.push(Field::new(&output.name, expr));
        }
        stage.where_clause = self.post_where()?;
        Ok(stage)
    }

    /// Per-row window functions over the base table.
    fn window_stage(&self) -> CompileResult<Stage> {
        let floor = self.time_floor()?;
        let mut partition_by: Vec<_> = self
            .renderer
            .keys
            .iter()
            .map(|k| sql::col(&k.column))
            .collect();
        partition_by.extend(floor.clone());

        let mut stage = Stage::new(StageSource::Table(self.table.to_string()));
        stage.fields = self.base_prefix()?;
        for column in self.carried {
            stage.fields.push(Field::new(column, sql::col(column)));
        }
        for (i, slot) in self.renderer.aggs.iter().enumerate() {
            if slot.window {
                let name = self.renderer.agg_name(i)?;
                let expr = self.renderer.window(i, partition_by.clone())?;
                stage.fields.push(Field::new(name, expr));
            }
        }
        stage.where_clause = self.base_where()?;
        Ok(stage)
    }

    /// Collapses window rows back into groups.
    fn regroup_stage(&self, post: bool) -> CompileResult<Stage> {
        let mut stage = Stage::new(StageSource::Previous);
        stage.fields = self.carried_prefix();

        let mut group_by: Vec<_> = self
            .renderer
            .keys
            .iter()
            .map(|k| sql::col(&k.name))
            .collect();
        for (i, slot) in self.renderer.aggs.iter().enumerate() {
            if slot.window {
                let name = self.renderer.agg_name(i)?;
                group_by.push(sql::col(name));
                if post {
                    stage.fields.push(Field::new(name, sql::col(name)));
                }
            }
        }
        if self.is_bucketed() {
            group_by.push(sql::col(TIMESTAMP_FIELD));
        }

        if post {
            stage.fields.extend(self.aggregate_fields()?);
            stage.fields.extend(self.folded_fields(Scope::Regroup)?);
        } else {
            for output in self.selected() {
                let expr = self.renderer.post(&output.expr, Scope::Regroup)?;
                stage.fields.push(Field::new(&output.name, expr));
            }
        }
        stage.group_by = group_by;
        stage.having = self.having(Scope::Regroup)?;
        Ok(stage)
    }
}
