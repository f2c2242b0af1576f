//! SQL expression tree emitted by the compiler's render step.
//!
//! Expressions know nothing about metrics; they only know how to turn
//! themselves into [`TokenStream`]s with the minimum parentheses needed.

use super::dialect::SqlDialect;
use super::token::{Token, TokenStream};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `"table"."column"` or a bare `"column"`
    Column {
        table: Option<String>,
        column: String,
    },

    Literal(Literal),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// `name(args)`; the dialect may rename `name` when serializing.
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// `expr [NOT] IN (values)`
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// `expr IS [NOT] NULL`
    IsNull { expr: Box<Expr>, negated: bool },

    /// `*` or `"t".*`
    Star { table: Option<String> },

    /// `first_value("x") OVER (PARTITION BY "app" ORDER BY "timestamp")`
    WindowFunction {
        function: Box<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<WindowOrderBy>,
    },

    /// `INTERVAL <n> <unit>`
    Interval { value: i64, unit: &'static str },

    /// `TIMESTAMP '2024-01-01 00:00:00'`
    TypedString {
        data_type: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

impl From<&Literal> for Token {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Int(n) => Token::LitInt(*n),
            Literal::Float(f) => Token::LitFloat(*f),
            Literal::String(s) => Token::LitString(s.clone()),
            Literal::Bool(b) => Token::LitBool(*b),
            Literal::Null => Token::LitNull,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Like,
    NotLike,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
}

/// Binding strength of comparisons, `IN` and `IS NULL`.
const COMPARISON: u8 = 4;

impl BinaryOperator {
    /// Binding strength used to decide where parentheses are required.
    fn precedence(&self) -> u8 {
        use BinaryOperator::*;
        match self {
            Or => 1,
            And => 2,
            Eq | Ne | Lt | Gt | Lte | Gte | Like | NotLike => COMPARISON,
            Plus | Minus => 5,
            Mul | Div | Mod => 6,
        }
    }

    fn push_to(self, ts: &mut TokenStream) {
        use BinaryOperator::*;
        let token = match self {
            Eq => Token::Eq,
            Ne => Token::Ne,
            Lt => Token::Lt,
            Gt => Token::Gt,
            Lte => Token::Lte,
            Gte => Token::Gte,
            Like => Token::Like,
            NotLike => {
                ts.push(Token::Not).space();
                Token::Like
            }
            And => Token::And,
            Or => Token::Or,
            Plus => Token::Plus,
            Minus => Token::Minus,
            Mul => Token::Mul,
            Div => Token::Div,
            Mod => Token::Mod,
        };
        ts.push(token);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl From<SortDir> for Token {
    fn from(dir: SortDir) -> Self {
        match dir {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        }
    }
}

/// Sort key inside `OVER (...)`. Ascending keys carry no keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOrderBy {
    pub expr: Expr,
    pub dir: Option<SortDir>,
}

impl WindowOrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self { expr, dir: None }
    }

    pub fn desc(expr: Expr) -> Self {
        let dir = Some(SortDir::Desc);
        Self { expr, dir }
    }

    fn tokens(&self, dialect: &dyn SqlDialect) -> TokenStream {
        let mut ts = self.expr.tokens(dialect);
        if let Some(dir) = self.dir {
            ts.space().push(dir.into());
        }
        ts
    }
}

impl Expr {
    /// Token stream of this expression for `dialect`.
    pub fn tokens(&self, dialect: &dyn SqlDialect) -> TokenStream {
        let mut ts = TokenStream::new();
        let sub = |e: &Expr| e.tokens(dialect);

        match self {
            Expr::Column { table, column } => {
                push_qualified(&mut ts, table.as_deref(), Token::Ident(column.clone()));
            }
            Expr::Star { table } => push_qualified(&mut ts, table.as_deref(), Token::Star),
            Expr::Literal(lit) => {
                ts.push(lit.into());
            }

            Expr::BinaryOp { left, op, right } => {
                let prec = op.precedence();
                // left-associative: a right operand of equal strength keeps its parens
                push_operand(&mut ts, left, dialect, |p| p < prec);
                ts.space();
                op.push_to(&mut ts);
                ts.space();
                push_operand(&mut ts, right, dialect, |p| p <= prec);
            }
            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Not => ts.push(Token::Not).space(),
                    UnaryOperator::Minus => ts.push(Token::Minus),
                };
                push_operand(&mut ts, expr, dialect, |_| true);
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                ts.list(args, sub).rparen();
            }

            // "x IN ()" does not parse anywhere, so fold it to a constant
            Expr::In { values, negated, .. } if values.is_empty() => {
                ts.push(Token::LitBool(*negated));
            }
            Expr::In {
                expr,
                values,
                negated,
            } => {
                push_operand(&mut ts, expr, dialect, |p| p <= COMPARISON);
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                ts.list(values, sub).rparen();
            }
            Expr::IsNull { expr, negated } => {
                push_operand(&mut ts, expr, dialect, |p| p <= COMPARISON);
                let test = if *negated { Token::IsNotNull } else { Token::IsNull };
                ts.space().push(test);
            }

            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
            } => {
                ts.append(&function.tokens(dialect));
                ts.space().push(Token::Over).space().lparen();
                let mut over = TokenStream::new();
                if !partition_by.is_empty() {
                    over.push(Token::PartitionBy).space().list(partition_by, sub);
                }
                if !order_by.is_empty() {
                    if !over.is_empty() {
                        over.space();
                    }
                    over.push(Token::OrderBy)
                        .space()
                        .list(order_by, |o| o.tokens(dialect));
                }
                ts.append(&over).rparen();
            }

            Expr::Interval { value, unit } => {
                ts.push(Token::Interval).space().push(Token::LitInt(*value));
                ts.space().push(Token::Keyword(*unit));
            }
            Expr::TypedString { data_type, value } => {
                ts.push(Token::Keyword(*data_type));
                ts.space().push(Token::LitString(value.clone()));
            }
        }

        ts
    }

    /// Precedence of the outermost operator, if any.
    fn binding(&self) -> Option<u8> {
        match self {
            Expr::BinaryOp { op, .. } => Some(op.precedence()),
            Expr::In { values, .. } if !values.is_empty() => Some(COMPARISON),
            Expr::IsNull { .. } => Some(COMPARISON),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                ..
            } => Some(3),
            _ => None,
        }
    }
}

fn push_qualified(ts: &mut TokenStream, table: Option<&str>, last: Token) {
    if let Some(t) = table {
        ts.push(Token::Ident(t.to_string())).push(Token::Dot);
    }
    ts.push(last);
}

/// Push a child expression, wrapped in parentheses when `needs_parens`
/// says its operator binds too loosely for the parent position.
fn push_operand(
    ts: &mut TokenStream,
    expr: &Expr,
    dialect: &dyn SqlDialect,
    needs_parens: impl Fn(u8) -> bool,
) {
    let inner = expr.tokens(dialect);
    if expr.binding().is_some_and(needs_parens) {
        ts.lparen().append(&inner).rparen();
    } else {
        ts.append(&inner);
    }
}

/// Unqualified column reference.
pub fn col(name: &str) -> Expr {
    let column = name.to_string();
    Expr::Column { table: None, column }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn star() -> Expr {
    Expr::Star { table: None }
}

pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    call(name, args, false)
}

/// `name(DISTINCT arg)`
pub fn func_distinct(name: &str, arg: Expr) -> Expr {
    call(name, vec![arg], true)
}

fn call(name: &str, args: Vec<Expr>, distinct: bool) -> Expr {
    let name = name.to_string();
    Expr::Function {
        name,
        args,
        distinct,
    }
}

pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// AND all conditions together; `None` when empty.
pub fn conjunction(conditions: Vec<Expr>) -> Option<Expr> {
    conditions
        .into_iter()
        .reduce(|acc, c| binary(acc, BinaryOperator::And, c))
}
