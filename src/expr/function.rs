//! Function catalogue: aggregate kinds and the registry the compiler
//! resolves calls against.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregate functions understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggregateFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
    Cardinality,
    GroupConcat,
    Rate,
    First,
    Last,
}

/// Name table for [`AggregateFunc`]. Adding an aggregate means adding a
/// variant and a row here.
const AGGREGATES: &[(&str, AggregateFunc)] = &[
    ("sum", AggregateFunc::Sum),
    ("count", AggregateFunc::Count),
    ("avg", AggregateFunc::Avg),
    ("min", AggregateFunc::Min),
    ("max", AggregateFunc::Max),
    ("cardinality", AggregateFunc::Cardinality),
    ("groupConcat", AggregateFunc::GroupConcat),
    ("rate", AggregateFunc::Rate),
    ("first", AggregateFunc::First),
    ("last", AggregateFunc::Last),
];

impl AggregateFunc {
    /// Look up an aggregate by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        AGGREGATES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, f)| *f)
    }

    pub fn name(&self) -> &'static str {
        AGGREGATES
            .iter()
            .find(|(_, f)| f == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }

    pub fn all() -> impl Iterator<Item = AggregateFunc> {
        AGGREGATES.iter().map(|(_, f)| *f)
    }

    /// `first`/`last` pick a value by time order; some dialects can only
    /// express that with a window function.
    pub fn is_window_capable(&self) -> bool {
        matches!(self, AggregateFunc::First | AggregateFunc::Last)
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            AggregateFunc::Count => (0, 1),
            _ => (1, 1),
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for AggregateFunc {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AggregateFunc::from_name(&value).ok_or_else(|| format!("unknown aggregator `{value}`"))
    }
}

impl From<AggregateFunc> for String {
    fn from(value: AggregateFunc) -> Self {
        value.name().to_string()
    }
}

/// How a registered function behaves during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Row-level function, rendered by name at whatever stage it is used.
    Scalar,
    Aggregate(AggregateFunc),
}

/// A registered function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub kind: FunctionKind,
    pub min_args: usize,
    pub max_args: usize,
}

impl FunctionSpec {
    pub fn scalar(name: &str, min_args: usize, max_args: usize) -> Self {
        Self {
            name: name.into(),
            kind: FunctionKind::Scalar,
            min_args,
            max_args,
        }
    }

    pub fn aggregate(func: AggregateFunc) -> Self {
        let (min_args, max_args) = func.arity();
        Self {
            name: func.name().into(),
            kind: FunctionKind::Aggregate(func),
            min_args,
            max_args,
        }
    }

    pub fn accepts(&self, arg_count: usize) -> bool {
        arg_count >= self.min_args && arg_count <= self.max_args
    }

    pub fn aggregate_func(&self) -> Option<AggregateFunc> {
        match self.kind {
            FunctionKind::Aggregate(f) => Some(f),
            FunctionKind::Scalar => None,
        }
    }
}

/// Case-insensitive, immutable catalogue of functions.
///
/// Built once (usually with [`FunctionRegistry::builtin`]) and passed by
/// reference into the compiler.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    by_name: HashMap<String, FunctionSpec>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// All aggregates plus the built-in scalar functions.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for func in AggregateFunc::all() {
            registry = registry.with(FunctionSpec::aggregate(func));
        }
        registry
            .with(FunctionSpec::scalar("abs", 1, 1))
            .with(FunctionSpec::scalar("round", 1, 2))
            .with(FunctionSpec::scalar("floor", 1, 1))
            .with(FunctionSpec::scalar("ceil", 1, 1))
            .with(FunctionSpec::scalar("length", 1, 1))
            .with(FunctionSpec::scalar("lower", 1, 1))
            .with(FunctionSpec::scalar("upper", 1, 1))
    }

    /// Return a registry with `spec` added, replacing any function of the same name.
    pub fn with(mut self, spec: FunctionSpec) -> Self {
        self.by_name.insert(spec.name.to_ascii_lowercase(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.by_name.get(&name.to_ascii_lowercase())
    }

    pub fn aggregate(&self, name: &str) -> Option<AggregateFunc> {
        self.get(name).and_then(FunctionSpec::aggregate_func)
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregate(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.by_name.values().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}
