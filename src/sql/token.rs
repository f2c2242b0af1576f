//! Lexical units of emitted SQL.
//!
//! Only identifiers, literals and function names consult the dialect;
//! everything else has fixed text. Layout tokens (newlines, indents) are
//! kept in pretty output and collapsed in compact output.

use super::dialect::SqlDialect;

/// One unit of SQL output.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    GroupBy,
    Having,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    In,
    Like,
    IsNull,
    IsNotNull,
    Distinct,
    Interval,

    // === Window Function Keywords ===
    Over,
    PartitionBy,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Integer literal
    LitInt(i64),
    /// Float literal
    LitFloat(f64),
    /// String literal
    LitString(String),
    /// Boolean literal
    LitBool(bool),
    /// NULL literal
    LitNull,

    /// Function name, rendered as given unless the dialect remaps it.
    FunctionName(String),

    /// Keyword or unit passed through verbatim (`SECOND`, `TIMESTAMP`).
    ///
    /// Never pass user input here; it is not escaped.
    Keyword(&'static str),
}

impl Token {
    /// Text of tokens that render the same in every dialect.
    fn fixed_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Select => "SELECT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::GroupBy => "GROUP BY",
            Token::Having => "HAVING",
            Token::OrderBy => "ORDER BY",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::As => "AS",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Distinct => "DISTINCT",
            Token::Over => "OVER",
            Token::PartitionBy => "PARTITION BY",
            Token::Interval => "INTERVAL",

            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::In => "IN",
            Token::Like => "LIKE",
            Token::IsNull => "IS NULL",
            Token::IsNotNull => "IS NOT NULL",

            Token::Eq => "=",
            Token::Ne => "<>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Lte => "<=",
            Token::Gte => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Mul | Token::Star => "*",
            Token::Div => "/",
            Token::Mod => "%",

            Token::Comma => ",",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Space => " ",
            Token::Newline => "\n",

            Token::Keyword(s) => *s,
            _ => return None,
        };
        Some(text)
    }

    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: &dyn SqlDialect) -> String {
        if let Some(text) = self.fixed_text() {
            return text.to_string();
        }
        match self {
            Token::Indent(n) => "  ".repeat(*n),
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::LitInt(n) => n.to_string(),
            // NaN and infinities have no SQL literal
            Token::LitFloat(f) if !f.is_finite() => dialect.format_null().to_string(),
            Token::LitFloat(f) => ryu::Buffer::new().format_finite(*f).to_string(),
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).to_string(),
            Token::LitNull => dialect.format_null().to_string(),
            Token::FunctionName(name) => dialect
                .remap_function(name)
                .map_or_else(|| name.clone(), str::to_string),
            _ => String::new(),
        }
    }

    fn is_whitespace(&self) -> bool {
        matches!(self, Token::Space | Token::Newline | Token::Indent(_))
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Serialize all tokens, keeping newlines and indentation.
    pub fn serialize(&self, dialect: &dyn SqlDialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    /// Serialize on a single line.
    ///
    /// Any run of whitespace tokens becomes one space, dropped at the
    /// start, after `(` and before `)`.
    pub fn serialize_compact(&self, dialect: &dyn SqlDialect) -> String {
        let mut out = String::new();
        let mut pending_space = false;
        let mut after_lparen = false;

        for token in &self.tokens {
            if token.is_whitespace() {
                pending_space = true;
                continue;
            }
            if pending_space && !out.is_empty() && !after_lparen && *token != Token::RParen {
                out.push(' ');
            }
            pending_space = false;
            after_lparen = *token == Token::LParen;
            out.push_str(&token.serialize(dialect));
        }

        out
    }

    /// Append `items` separated by `, `.
    pub fn list<T>(
        &mut self,
        items: &[T],
        mut render: impl FnMut(&T) -> TokenStream,
    ) -> &mut Self {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.comma().space();
            }
            let part = render(item);
            self.append(&part);
        }
        self
    }

    /// Append ` AS "alias"`.
    pub fn alias(&mut self, name: &str) -> &mut Self {
        self.space()
            .push(Token::As)
            .space()
            .push(Token::Ident(name.to_string()))
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        if n > 0 {
            self.push(Token::Indent(n));
        }
        self
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
