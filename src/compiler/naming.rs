//! Field names for interned aggregates and folded expressions.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::context::CompileContext;
use super::fold::Folded;
use super::layout::Layout;
use super::lift::{FilterLeaf, Key, Level, Output, OutputKind};
use super::render::AggSlot;
use super::TIMESTAMP_FIELD;

pub(crate) struct Naming<'a> {
    pub layout: Layout,
    pub keys: &'a [Key],
    pub outputs: &'a [Output],
    pub leaves: &'a [FilterLeaf],
    pub carried: &'a [String],
}

impl Naming<'_> {
    /// Name every aggregate that becomes a stage field, and every folded
    /// expression.
    ///
    /// An aggregate that is a whole selector takes the selector's name.
    /// Otherwise a bare-column aggregate reuses the column name when no
    /// other expression at its stage reads that column; everything else
    /// gets a `_varN` name.
    pub fn assign(&self, ctx: &mut CompileContext, aggs: &mut [AggSlot], folded: &mut [Folded]) {
        let needs = self.fields_needed(aggs);

        for output in self.outputs {
            if let OutputKind::Direct(i) = output.kind {
                if needs[i] && aggs[i].name.is_none() {
                    trace!(aggregate = i, name = %output.name, "aggregate named after selector");
                    aggs[i].name = Some(output.name.clone());
                }
            }
        }

        let mut used: HashSet<&str> = HashSet::new();
        used.insert(TIMESTAMP_FIELD);
        used.extend(self.keys.iter().map(|k| k.name.as_str()));
        used.extend(self.outputs.iter().map(|o| o.name.as_str()));
        used.extend(self.carried.iter().map(String::as_str));
        used.extend(folded.iter().filter_map(|f| f.name.as_deref()));

        let mut blocked: HashSet<&str> = self.keys.iter().map(|k| k.column.as_str()).collect();
        for leaf in self.leaves.iter().filter(|l| l.level == Level::Raw) {
            blocked.extend(leaf.expr.raw_columns());
        }

        let mut readers: HashMap<&str, usize> = HashMap::new();
        for slot in aggs.iter() {
            for column in slot.call.columns() {
                *readers.entry(column).or_default() += 1;
            }
        }

        let inline = self.inline_aggregates(folded);

        let mut names: Vec<Option<String>> = aggs.iter().map(|a| a.name.clone()).collect();
        for (i, slot) in aggs.iter().enumerate() {
            if !needs[i] || names[i].is_some() {
                continue;
            }
            let reused = slot.call.single_column().filter(|column| {
                readers.get(column).copied() == Some(1)
                    && !inline.contains(&i)
                    && !blocked.contains(column)
                    && !used.contains(column)
                    && !names.iter().flatten().any(|n| n.as_str() == *column)
            });
            let name = match reused {
                Some(column) => column.to_string(),
                None => ctx.next_var(),
            };
            trace!(aggregate = i, %name, "aggregate named");
            names[i] = Some(name);
        }
        for (slot, name) in aggs.iter_mut().zip(names) {
            slot.name = name;
        }

        // A window result must not shadow a column the window stage passes on.
        for slot in aggs.iter_mut().filter(|s| s.window) {
            if slot
                .name
                .as_ref()
                .is_some_and(|n| self.carried.contains(n))
            {
                let name = ctx.next_var();
                trace!(%name, "window field renamed");
                slot.name = Some(name);
            }
        }

        for f in folded.iter_mut().filter(|f| f.name.is_none()) {
            let name = ctx.next_var();
            trace!(%name, "folded expression named");
            f.name = Some(name);
        }
    }

    /// Which aggregates are read by name from a later stage.
    fn fields_needed(&self, aggs: &[AggSlot]) -> Vec<bool> {
        let mut needs: Vec<bool> = aggs.iter().map(|a| a.window).collect();
        if self.layout.has_post_stage() {
            let mut refs = Vec::new();
            let mut folded_refs = Vec::new();
            for output in self.outputs {
                output.expr.collect_refs(&mut refs, &mut folded_refs);
            }
            for leaf in self.leaves.iter().filter(|l| l.level == Level::Post) {
                leaf.expr.collect_refs(&mut refs, &mut folded_refs);
            }
            for i in refs {
                needs[i] = true;
            }
        }
        needs
    }

    /// Aggregates also rendered inline at their own stage, in HAVING or
    /// inside a folded expression.
    fn inline_aggregates(&self, folded: &[Folded]) -> HashSet<usize> {
        let mut refs = Vec::new();
        let mut folded_refs = Vec::new();
        for leaf in self.leaves.iter().filter(|l| l.level == Level::Agg) {
            leaf.expr.collect_refs(&mut refs, &mut folded_refs);
        }
        for f in folded {
            f.expr.collect_refs(&mut refs, &mut folded_refs);
        }
        refs.into_iter().collect()
    }
}
