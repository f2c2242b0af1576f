//! Tokenizer for the expression text syntax.

use std::fmt;

use chumsky::prelude::*;
use ordered_float::OrderedFloat;

use super::parser::{ParseError, ParseResult};
use super::Literal;
use crate::value::{HumanDuration, HumanSize, Percentage};

/// A token of selector or filter text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'src> {
    /// Bare name; may contain dots (`jvm.heap`).
    Ident(&'src str),
    /// `"..."` with `""` unescaped.
    QuotedIdent(String),
    /// `'...'` with `''` unescaped.
    Str(String),
    /// Plain numeric literal: `42`, `0.5`, `1e3`.
    Number(&'src str),
    /// Number glued to a unit: `1h`, `1MiB`, `50%`.
    Human(&'src str),
    /// A number or human literal after [`typed_literals`].
    Value(Literal),
    /// `{name}`, trimmed.
    Macro(&'src str),

    LParen,
    RParen,
    Comma,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,

    And,
    Or,
    Not,
    In,
    Is,
    Like,
    True,
    False,
    Null,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) | Token::Number(s) | Token::Human(s) => f.write_str(s),
            Token::QuotedIdent(s) => write!(f, "\"{s}\""),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Value(lit) => write!(f, "{lit}"),
            Token::Macro(s) => write!(f, "{{{s}}}"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Star => f.write_str("*"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Eq => f.write_str("="),
            Token::Ne => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Lte => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Gte => f.write_str(">="),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Not => f.write_str("not"),
            Token::In => f.write_str("in"),
            Token::Is => f.write_str("is"),
            Token::Like => f.write_str("like"),
            Token::True => f.write_str("true"),
            Token::False => f.write_str("false"),
            Token::Null => f.write_str("null"),
        }
    }
}

/// Keywords match case-insensitively.
fn keyword_or_ident(word: &str) -> Token<'_> {
    match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "is" => Token::Is,
        "like" => Token::Like,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => Token::Ident(word),
    }
}

/// Text between `quote` characters; a doubled quote stands for itself.
fn quoted<'src>(
    quote: char,
) -> impl Parser<'src, &'src str, String, extra::Err<Rich<'src, char>>> + Clone {
    let escaped = just(quote).then(just(quote)).to(quote);
    just(quote)
        .ignore_then(escaped.or(none_of(quote)).repeated().collect::<String>())
        .then_ignore(just(quote))
}

pub(crate) fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let ident = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
                .repeated(),
        )
        .to_slice()
        .map(keyword_or_ident);

    // An exponent needs digits; `2e` is a number glued to the unit `e`.
    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10));
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .then(exponent.or_not())
        .to_slice();

    // `%` ends a unit, so `50%` is one token but `a % 2` is modulo.
    let unit = just('%').ignored().or(any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .repeated()
        .at_least(1)
        .ignored());
    let human = number.clone().then(unit).to_slice().map(Token::Human);

    let macro_name = just('{')
        .ignore_then(none_of('}').repeated().to_slice())
        .then_ignore(just('}'))
        .try_map(|name: &'src str, span| match name.trim() {
            "" => Err(Rich::custom(span, "empty macro name")),
            name => Ok(Token::Macro(name)),
        });

    // Multi-char operators first.
    let symbol = choice((
        just("==").to(Token::Eq),
        just("!=").to(Token::Ne),
        just("<>").to(Token::Ne),
        just("<=").to(Token::Lte),
        just(">=").to(Token::Gte),
        just('=').to(Token::Eq),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('*').to(Token::Star),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let token = choice((
        human,
        number.map(Token::Number),
        ident,
        quoted('\'').map(Token::Str),
        quoted('"').map(Token::QuotedIdent),
        macro_name,
        symbol,
    ))
    .map_with(|tok, e| (tok, e.span()));

    token
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

/// Replace `Number` and `Human` tokens with typed [`Token::Value`]s.
///
/// Plain numbers are `i64` when they fit and a finite `f64` otherwise. A
/// `%` suffix makes a percentage, `s`/`m`/`h`/`d` a duration and any other
/// unit a size.
pub(crate) fn typed_literals(
    tokens: Vec<(Token<'_>, SimpleSpan)>,
) -> ParseResult<Vec<(Token<'_>, SimpleSpan)>> {
    tokens
        .into_iter()
        .map(|(tok, span)| -> ParseResult<_> {
            let tok = match tok {
                Token::Number(text) => Token::Value(number(text, span.start)?),
                Token::Human(text) => Token::Value(human(text).map_err(|source| {
                    ParseError::Literal {
                        position: span.start,
                        source,
                    }
                })?),
                other => other,
            };
            Ok((tok, span))
        })
        .collect()
}

fn number(text: &str, position: usize) -> ParseResult<Literal> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Literal::Int(n));
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Literal::Float(OrderedFloat(f))),
        _ => Err(ParseError::syntax(format!("invalid number `{text}`"), position)),
    }
}

fn human(text: &str) -> Result<Literal, crate::value::ValueError> {
    if text.ends_with('%') {
        Percentage::parse(text).map(Literal::Percentage)
    } else if text.ends_with(['s', 'm', 'h', 'd']) {
        HumanDuration::parse(text).map(Literal::Duration)
    } else {
        HumanSize::parse(text).map(Literal::Size)
    }
}
