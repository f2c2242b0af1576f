//! Sharing post-aggregation subexpressions between selectors.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::lift::{Output, OutputKind, PostExpr};

/// A compound expression over aggregates computed once at the grouping
/// stage and read by name afterwards.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Folded {
    pub expr: PostExpr,
    pub name: Option<String>,
}

/// Replace compound aggregate subexpressions shared by two or more
/// selectors with [`PostExpr::Folded`] references.
///
/// A folded expression identical to a whole selector takes that selector's
/// name; the rest are named later.
pub(crate) fn fold_shared(outputs: &mut [Output]) -> Vec<Folded> {
    let mut counts: HashMap<PostExpr, usize> = HashMap::new();
    for output in outputs.iter().filter(|o| o.kind == OutputKind::Post) {
        let mut seen = HashSet::new();
        collect_candidates(&output.expr, &mut seen);
        for candidate in seen {
            *counts.entry(candidate).or_default() += 1;
        }
    }

    let whole: Vec<(PostExpr, String)> = outputs
        .iter()
        .filter(|o| o.kind == OutputKind::Post)
        .map(|o| (o.expr.clone(), o.name.clone()))
        .collect();

    let mut folded: IndexMap<PostExpr, usize> = IndexMap::new();
    for output in outputs.iter_mut().filter(|o| o.kind == OutputKind::Post) {
        let expr = std::mem::replace(&mut output.expr, PostExpr::Literal(crate::expr::Literal::Null));
        output.expr = replace_shared(expr, &counts, &mut folded);
    }

    folded
        .into_keys()
        .map(|expr| {
            let name = whole
                .iter()
                .find(|(e, _)| *e == expr)
                .map(|(_, n)| n.clone());
            Folded { expr, name }
        })
        .collect()
}

fn collect_candidates(expr: &PostExpr, seen: &mut HashSet<PostExpr>) {
    if expr.is_compound() && expr.has_agg() {
        seen.insert(expr.clone());
    }
    for child in expr.children() {
        collect_candidates(child, seen);
    }
}

fn replace_shared(
    expr: PostExpr,
    counts: &HashMap<PostExpr, usize>,
    folded: &mut IndexMap<PostExpr, usize>,
) -> PostExpr {
    if counts.get(&expr).copied().unwrap_or(0) >= 2 {
        let len = folded.len();
        let index = *folded.entry(expr).or_insert(len);
        return PostExpr::Folded(index);
    }
    match expr.map_children(&mut |child| {
        Ok::<_, std::convert::Infallible>(replace_shared(child, counts, folded))
    }) {
        Ok(rebuilt) => rebuilt,
        Err(never) => match never {},
    }
}
