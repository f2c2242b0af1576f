//! JSON query requests.
//!
//! ```json
//! {
//!   "selectors": [{ "expression": "sum(totalCount)", "alias": "t" }],
//!   "filter": "appName = 'bithon'",
//!   "groupBy": ["appName"],
//!   "interval": { "start": "2024-01-01T00:00:00Z", "end": "2024-01-01T01:00:00Z", "step": "1m" },
//!   "orderBy": [{ "name": "t", "order": "desc" }],
//!   "limit": { "limit": 10 }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compiler::{ErrorKind, Interval, Limit, MetricQuery, OrderBy, Selector};
use crate::expr::{self, Expr, ParseError};
use crate::value::HumanDuration;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid expression `{text}`: {source}")]
    Expression {
        text: String,
        #[source]
        source: ParseError,
    },
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Json(_) => ErrorKind::Syntax,
            RequestError::Expression {
                source: ParseError::Literal { .. },
                ..
            } => ErrorKind::Format,
            RequestError::Expression { .. } => ErrorKind::Syntax,
        }
    }
}

pub type RequestResult<T> = Result<T, RequestError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub selectors: Vec<SelectorRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<IntervalRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<LimitRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorRequest {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<HumanDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_column: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByRequest {
    pub name: String,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRequest {
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn parse_expression(text: &str) -> RequestResult<Expr> {
    expr::parse(text).map_err(|source| RequestError::Expression {
        text: text.to_string(),
        source,
    })
}

impl QueryRequest {
    pub fn from_json(json: &str) -> RequestResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse every expression and build the compiler input.
    pub fn into_query(self) -> RequestResult<MetricQuery> {
        let mut query = MetricQuery::new();
        for selector in self.selectors {
            let mut parsed = Selector::new(parse_expression(&selector.expression)?);
            parsed.alias = selector.alias;
            query = query.select(parsed);
        }
        if let Some(filter) = &self.filter {
            query = query.filter(parse_expression(filter)?);
        }
        query = query.group_by(self.group_by);
        if let Some(interval) = self.interval {
            query = query.interval(Interval {
                start: interval.start,
                end: interval.end,
                step: interval.step,
                time_column: interval.time_column,
            });
        }
        for order in self.order_by {
            query = query.order_by(match order.order {
                SortOrder::Asc => OrderBy::asc(order.name),
                SortOrder::Desc => OrderBy::desc(order.name),
            });
        }
        query.limit = self.limit.map(|l| Limit {
            limit: l.limit,
            offset: l.offset,
        });
        Ok(query)
    }
}
