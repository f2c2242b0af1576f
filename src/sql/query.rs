//! SELECT statements, including a derived table in FROM for staged queries.

use super::dialect::SqlDialect;
use super::expr::{binary, BinaryOperator, Expr, SortDir};
use super::token::{Token, TokenStream};

/// One item of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(self, alias: &str) -> Self {
        let alias = Some(alias.to_string());
        Self { alias, ..self }
    }

    pub fn tokens(&self, dialect: &dyn SqlDialect) -> TokenStream {
        let mut ts = self.expr.tokens(dialect);
        if let Some(name) = self.alias.as_deref() {
            ts.alias(name);
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        Self::new(expr)
    }
}

/// A physical table, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        let table = table.to_string();
        Self { table, alias: None }
    }

    pub fn with_alias(self, alias: &str) -> Self {
        let alias = Some(alias.to_string());
        Self { alias, ..self }
    }
}

/// What a SELECT reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table(TableRef),
    /// `(SELECT ...) AS alias`
    Derived { query: Box<Query>, alias: String },
}

/// Sort key of the statement's ORDER BY.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self::sorted(expr, SortDir::Asc)
    }

    pub fn desc(expr: Expr) -> Self {
        Self::sorted(expr, SortDir::Desc)
    }

    fn sorted(expr: Expr, dir: SortDir) -> Self {
        Self {
            expr,
            dir: Some(dir),
        }
    }

    pub fn tokens(&self, dialect: &dyn SqlDialect) -> TokenStream {
        let mut ts = self.expr.tokens(dialect);
        if let Some(dir) = self.dir {
            ts.space().push(dir.into());
        }
        ts
    }
}

/// Row window; each dialect spells it its own way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// A SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub from: Option<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: Option<LimitOffset>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        let select = exprs.into_iter().map(Into::into).collect();
        Self { select, ..self }
    }

    pub fn from(self, table: TableRef) -> Self {
        let from = Some(FromItem::Table(table));
        Self { from, ..self }
    }

    /// Read from `(query) AS alias`.
    pub fn from_subquery(self, query: Query, alias: &str) -> Self {
        let from = Some(FromItem::Derived {
            query: Box::new(query),
            alias: alias.to_string(),
        });
        Self { from, ..self }
    }

    /// AND `condition` onto the WHERE clause.
    pub fn filter(mut self, condition: Expr) -> Self {
        let combined = match self.where_clause.take() {
            Some(existing) => binary(existing, BinaryOperator::And, condition),
            None => condition,
        };
        self.where_clause = Some(combined);
        self
    }

    pub fn group_by(self, group_by: Vec<Expr>) -> Self {
        Self { group_by, ..self }
    }

    pub fn having(self, condition: Expr) -> Self {
        let having = Some(condition);
        Self { having, ..self }
    }

    pub fn order_by(self, order_by: Vec<OrderByExpr>) -> Self {
        Self { order_by, ..self }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.window().limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.window().offset = Some(offset);
        self
    }

    fn window(&mut self) -> &mut LimitOffset {
        self.limit_offset.get_or_insert_with(LimitOffset::default)
    }

    pub fn tokens(&self, dialect: &dyn SqlDialect) -> TokenStream {
        self.tokens_at(dialect, 0)
    }

    /// One clause per line; every line of a nested query sits `depth` levels in.
    fn tokens_at(&self, dialect: &dyn SqlDialect, depth: usize) -> TokenStream {
        let mut ts = TokenStream::new();
        let sub = |e: &Expr| e.tokens(dialect);

        ts.push(Token::Select);
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline().indent(depth + 1).append(&item.tokens(dialect));
        }

        let clause = |ts: &mut TokenStream, keyword: Token| {
            ts.newline().indent(depth).push(keyword).space();
        };

        match &self.from {
            Some(FromItem::Table(TableRef { table, alias })) => {
                clause(&mut ts, Token::From);
                ts.push(Token::Ident(table.clone()));
                if let Some(name) = alias.as_deref() {
                    ts.alias(name);
                }
            }
            Some(FromItem::Derived { query, alias }) => {
                clause(&mut ts, Token::From);
                ts.lparen().newline().indent(depth + 1);
                ts.append(&query.tokens_at(dialect, depth + 1));
                ts.newline().indent(depth).rparen().alias(alias);
            }
            None => {}
        }

        if let Some(cond) = &self.where_clause {
            clause(&mut ts, Token::Where);
            ts.append(&cond.tokens(dialect));
        }
        if !self.group_by.is_empty() {
            clause(&mut ts, Token::GroupBy);
            ts.list(&self.group_by, sub);
        }
        if let Some(cond) = &self.having {
            clause(&mut ts, Token::Having);
            ts.append(&cond.tokens(dialect));
        }
        if !self.order_by.is_empty() {
            clause(&mut ts, Token::OrderBy);
            ts.list(&self.order_by, |o| o.tokens(dialect));
        }

        if let Some(LimitOffset { limit, offset }) = &self.limit_offset {
            let rows = dialect.emit_limit_offset(*limit, *offset);
            if !rows.is_empty() {
                ts.newline().indent(depth).append(&rows);
            }
        }

        ts
    }

    /// Multi-line SQL.
    pub fn to_sql(&self, dialect: &dyn SqlDialect) -> String {
        self.tokens(dialect).serialize(dialect)
    }

    /// The same statement on one line.
    pub fn to_compact_sql(&self, dialect: &dyn SqlDialect) -> String {
        self.tokens(dialect).serialize_compact(dialect)
    }
}
