//! Parser for selector and filter expressions.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons
//! (`= != < <= > >= like in is`), `+ -`, `* / %`, unary `-`.
//! Comparisons do not chain: `a < b < c` is an error.

use chumsky::input::{Input, ValueInput};
use chumsky::prelude::*;

use super::lexer::{lexer, typed_literals, Token};
use super::{binary, BinaryOp, Expr, Literal, UnaryOp};
use crate::value::ValueError;

/// Errors produced while parsing expression text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{message} at position {position}")]
    Syntax { message: String, position: usize },

    #[error("invalid literal at position {position}: {source}")]
    Literal {
        position: usize,
        #[source]
        source: ValueError,
    },
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        ParseError::Syntax {
            message: message.into(),
            position,
        }
    }

    pub fn position(&self) -> usize {
        match self {
            ParseError::Syntax { position, .. } | ParseError::Literal { position, .. } => {
                *position
            }
        }
    }
}

impl<T: std::fmt::Display> From<Rich<'_, T, SimpleSpan>> for ParseError {
    fn from(err: Rich<'_, T, SimpleSpan>) -> Self {
        ParseError::syntax(err.to_string(), err.span().start)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse expression text into an [`Expr`]. Positions in errors are byte
/// offsets into `src`.
pub fn parse(src: &str) -> ParseResult<Expr> {
    let (tokens, errs) = lexer().parse(src).into_output_errors();
    if let Some(err) = errs.into_iter().next() {
        return Err(err.into());
    }
    let tokens = typed_literals(tokens.unwrap_or_default())?;

    let len = src.len();
    let stream = tokens.as_slice().map(
        (len..len).into(),
        |(tok, span): &(Token<'_>, SimpleSpan)| (tok, span),
    );
    let (expr, errs) = parser().parse(stream).into_output_errors();
    match (expr, errs.into_iter().next()) {
        (Some(expr), None) => Ok(expr),
        (_, Some(err)) => Err(err.into()),
        (None, None) => Err(ParseError::syntax("expected an expression", 0)),
    }
}

/// Trailing part of a comparison.
enum Suffix {
    Compare(BinaryOp, Expr),
    In { negated: bool, list: Vec<Expr> },
    IsNull { negated: bool },
}

fn negate(operand: Expr) -> Expr {
    match operand {
        Expr::Literal(Literal::Int(n)) => Expr::Literal(Literal::Int(-n)),
        Expr::Literal(Literal::Float(f)) => Expr::Literal(Literal::Float(-f)),
        other => Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(other),
        },
    }
}

pub(crate) fn parser<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token<'src>, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    let expr = recursive(|expr| {
        let name = select! {
            Token::Ident(s) => s.to_string(),
            Token::QuotedIdent(s) => s,
        }
        .labelled("identifier");

        let literal = select! {
            Token::Value(lit) => lit,
            Token::Str(s) => Literal::String(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
        }
        .labelled("literal")
        .map(Expr::Literal);

        let macro_ref = select! {
            Token::Macro(name) => Expr::Macro(name.to_string()),
        }
        .labelled("macro");

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        // `count(*)` and `count()` both mean no arguments.
        let args = list.clone().or(just(Token::Star)
            .or_not()
            .to(Vec::new())
            .delimited_by(just(Token::LParen), just(Token::RParen)));

        let reference = name.then(args.or_not()).map(|(name, args)| match args {
            Some(args) => Expr::Call { name, args },
            None => Expr::Column(name),
        });

        let atom = choice((
            literal,
            macro_ref,
            reference,
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        let unary = just(Token::Minus).repeated().foldr(atom, |_, operand| negate(operand));

        let product = unary.clone().foldl(
            choice((
                just(Token::Star).to(BinaryOp::Mul),
                just(Token::Slash).to(BinaryOp::Div),
                just(Token::Percent).to(BinaryOp::Mod),
            ))
            .then(unary)
            .repeated(),
            |left, (op, right)| binary(left, op, right),
        );

        let sum = product.clone().foldl(
            choice((
                just(Token::Plus).to(BinaryOp::Add),
                just(Token::Minus).to(BinaryOp::Sub),
            ))
            .then(product)
            .repeated(),
            |left, (op, right)| binary(left, op, right),
        );

        let compare_op = choice((
            just(Token::Eq).to(BinaryOp::Eq),
            just(Token::Ne).to(BinaryOp::Ne),
            just(Token::Lte).to(BinaryOp::Lte),
            just(Token::Lt).to(BinaryOp::Lt),
            just(Token::Gte).to(BinaryOp::Gte),
            just(Token::Gt).to(BinaryOp::Gt),
            just(Token::Like).to(BinaryOp::Like),
            just(Token::Not).then(just(Token::Like)).to(BinaryOp::NotLike),
        ));

        let suffix = choice((
            compare_op
                .then(sum.clone())
                .map(|(op, right)| Suffix::Compare(op, right)),
            just(Token::Not)
                .or_not()
                .then_ignore(just(Token::In))
                .then(list)
                .map(|(not, list)| Suffix::In {
                    negated: not.is_some(),
                    list,
                }),
            just(Token::Is)
                .ignore_then(just(Token::Not).or_not())
                .then_ignore(just(Token::Null))
                .map(|not| Suffix::IsNull {
                    negated: not.is_some(),
                }),
        ));

        // `x is null` is kept as `x = null`; rendering turns it into a null test.
        let comparison = sum.then(suffix.or_not()).map(|(left, suffix)| match suffix {
            None => left,
            Some(Suffix::Compare(op, right)) => binary(left, op, right),
            Some(Suffix::In { negated, list }) => Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            },
            Some(Suffix::IsNull { negated }) => {
                let op = if negated { BinaryOp::Ne } else { BinaryOp::Eq };
                binary(left, op, Expr::Literal(Literal::Null))
            }
        });

        let not = just(Token::Not).repeated().foldr(comparison, |_, expr| Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        });

        let and = not.clone().foldl(
            just(Token::And).ignore_then(not).repeated(),
            |left, right| binary(left, BinaryOp::And, right),
        );

        and.clone().foldl(
            just(Token::Or).ignore_then(and).repeated(),
            |left, right| binary(left, BinaryOp::Or, right),
        )
    });

    expr.labelled("expression").then_ignore(end())
}
