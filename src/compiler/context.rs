//! Per-compile mutable state.

use std::collections::HashSet;

/// Synthetic name allocation for a single compile call.
///
/// Never shared between compilations.
#[derive(Debug, Default)]
pub(crate) struct CompileContext {
    taken: HashSet<String>,
    next_var: usize,
}

impl CompileContext {
    pub fn new<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            taken: reserved.into_iter().map(str::to_string).collect(),
            next_var: 0,
        }
    }

    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Next unused `_varN` name.
    pub fn next_var(&mut self) -> String {
        loop {
            let name = format!("_var{}", self.next_var);
            self.next_var += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }
}
