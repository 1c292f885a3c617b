//! The clause map a parsed query is reduced to: each clause
//! holds postfix [`Token`] sequences rather than a nested expression tree,
//! matching the representation `ebq-rewrite` and `ebq-reassemble` walk.

use ebq_schema::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Vec<Token>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: String,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Vec<Token>,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClauseMap {
    pub select: Vec<SelectItem>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Vec<Token>>,
    pub group_by: Vec<Vec<Token>>,
    pub having: Option<Vec<Token>>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
}
