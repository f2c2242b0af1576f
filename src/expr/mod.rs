//! Expression tree for selectors and filters.
//!
//! A closed enum with exhaustive matching replaces a visitor class
//! hierarchy: read-only passes use [`Expr::visit`], rewriting passes use
//! [`Expr::try_rewrite`].

mod function;
mod lexer;
mod parser;

pub use function::{AggregateFunc, FunctionKind, FunctionRegistry, FunctionSpec};
pub use parser::{parse, ParseError, ParseResult};

use std::fmt;

use ordered_float::OrderedFloat;

use crate::value::{HumanDuration, HumanSize, Percentage};

// =============================================================================
// Expression AST
// =============================================================================

/// A selector or filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Literal),

    /// Reference to a schema column, derived column or output name.
    Column(String),

    /// `{name}` placeholder resolved from query context at compile time.
    Macro(String),

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Unary { op: UnaryOp, expr: Box<Expr> },

    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    /// Function call. Scalar vs aggregate is decided against a
    /// [`FunctionRegistry`] when the expression is compiled.
    Call { name: String, args: Vec<Expr> },
}

/// Literal values.
///
/// Equality is per variant: `2` and `2.0` are different literals, since
/// integer and float division differ in SQL. Human-readable literals
/// compare by resolved value within their own family, so `60s == 1m`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    Bool(bool),
    Null,
    Duration(HumanDuration),
    Size(HumanSize),
    Percentage(Percentage),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte
            | BinaryOp::Like
            | BinaryOp::NotLike => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Like => "like",
            BinaryOp::NotLike => "not like",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

// =============================================================================
// Traversal
// =============================================================================

impl Expr {
    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Column(_) | Expr::Macro(_) => vec![],
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Unary { expr, .. } => vec![expr.as_ref()],
            Expr::InList { expr, list, .. } => {
                let mut out = vec![expr.as_ref()];
                out.extend(list.iter());
                out
            }
            Expr::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Pre-order walk. Return `false` from `f` to skip a node's children.
    pub fn visit<'a, F: FnMut(&'a Expr) -> bool>(&'a self, f: &mut F) {
        if f(self) {
            for child in self.children() {
                child.visit(f);
            }
        }
    }

    /// Bottom-up rewrite: children are rewritten first, then `f` is applied
    /// to the rebuilt node.
    pub fn try_rewrite<E, F>(self, f: &mut F) -> Result<Expr, E>
    where
        F: FnMut(Expr) -> Result<Expr, E>,
    {
        let rebuilt = match self {
            Expr::Literal(_) | Expr::Column(_) | Expr::Macro(_) => self,
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: Box::new(left.try_rewrite(f)?),
                right: Box::new(right.try_rewrite(f)?),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op,
                expr: Box::new(expr.try_rewrite(f)?),
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: Box::new(expr.try_rewrite(f)?),
                list: list
                    .into_iter()
                    .map(|e| e.try_rewrite(f))
                    .collect::<Result<_, _>>()?,
                negated,
            },
            Expr::Call { name, args } => Expr::Call {
                name,
                args: args
                    .into_iter()
                    .map(|e| e.try_rewrite(f))
                    .collect::<Result<_, _>>()?,
            },
        };
        f(rebuilt)
    }

    /// Column names referenced anywhere in this expression, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Column(name) = e {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            true
        });
        out
    }

    /// Whether any call in this expression satisfies `pred`.
    pub fn contains_call<P: Fn(&str) -> bool>(&self, pred: P) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if let Expr::Call { name, .. } = e {
                if pred(name) {
                    found = true;
                }
            }
            !found
        });
        found
    }

    /// Split a conjunction into its operands. Non-`and` nodes yield themselves.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            other => vec![other],
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

pub fn col(name: &str) -> Expr {
    Expr::Column(name.into())
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(OrderedFloat(f)))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.into(),
        args,
    }
}

pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            // keeps the fraction, so `2.0` reads back as a float
            Literal::Float(v) => f.write_str(ryu::Buffer::new().format(v.0)),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Null => write!(f, "null"),
            Literal::Duration(d) => write!(f, "{d}"),
            Literal::Size(s) => write!(f, "{s}"),
            Literal::Percentage(p) => write!(f, "{p}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Column(name) => write!(f, "{name}"),
            Expr::Macro(name) => write!(f, "{{{name}}}"),
            Expr::Binary { op, left, right } => {
                write_operand(f, left, op.precedence(), false)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, op.precedence(), true)
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => {
                    write!(f, "not ")?;
                    write_operand(f, expr, 3, false)
                }
                UnaryOp::Neg => {
                    write!(f, "-")?;
                    write_operand(f, expr, 7, false)
                }
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write_operand(f, expr, 4, false)?;
                write!(f, "{} in (", if *negated { " not" } else { "" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    expr: &Expr,
    parent: u8,
    right_side: bool,
) -> fmt::Result {
    let needs_parens = match expr {
        Expr::Binary { op, .. } => {
            op.precedence() < parent || (right_side && op.precedence() == parent)
        }
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => parent > 3,
        _ => false,
    };
    if needs_parens {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}
