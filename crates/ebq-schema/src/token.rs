//! Token taxonomy shared by `ebq-sql`'s parser and `ebq-rewrite`/
//! `ebq-reassemble`'s postfix evaluators.
//!
//! A parsed expression is a flat postfix sequence of `Token`s. Each variant
//! knows how to print itself back out via [`Token::surface`], which the
//! rewriter uses to splice un-rewritable fragments back into the residual
//! client-side expression and `ebq-reassemble` uses for diagnostics.

use std::fmt;

/// A literal value as it appeared in the query text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

/// Binary and unary operators recognized by the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
    Like,
    In,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Number of operands this operator consumes off the postfix stack.
    pub fn arity(self) -> usize {
        match self {
            Operator::Not | Operator::IsNull | Operator::IsNotNull => 1,
            _ => 2,
        }
    }

    pub fn surface(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// The fixed set of scalar built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFn {
    Lower,
    Upper,
    Length,
    Concat,
    Coalesce,
}

impl BuiltinFn {
    /// `None` means variadic (`Concat`, `Coalesce`).
    pub fn fixed_arity(self) -> Option<usize> {
        match self {
            BuiltinFn::Lower | BuiltinFn::Upper | BuiltinFn::Length => Some(1),
            BuiltinFn::Concat | BuiltinFn::Coalesce => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinFn::Lower => "LOWER",
            BuiltinFn::Upper => "UPPER",
            BuiltinFn::Length => "LENGTH",
            BuiltinFn::Concat => "CONCAT",
            BuiltinFn::Coalesce => "COALESCE",
        }
    }
}

/// Aggregation functions, including the homomorphic-sum family collapsed
/// during rewrite into a `PAILLIER_SUM` server fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    GroupConcat,
    Top,
}

impl AggregationFn {
    pub fn name(self) -> &'static str {
        match self {
            AggregationFn::Count => "COUNT",
            AggregationFn::Sum => "SUM",
            AggregationFn::Avg => "AVG",
            AggregationFn::Min => "MIN",
            AggregationFn::Max => "MAX",
            AggregationFn::GroupConcat => "GROUP_CONCAT",
            AggregationFn::Top => "TOP",
        }
    }
}

/// One element of a flattened postfix expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(Literal),

    /// A reference to a plaintext (unencrypted) column.
    Field(String),

    /// A reference to a column that carries an `encrypt` mode on the
    /// extended schema; `wire_name` is its rewritten `DS_*`-prefixed name.
    EncryptedField { alias: String, wire_name: String },

    Operator(Operator),

    /// A scalar built-in function call over the `arg_count` values
    /// preceding it on the postfix stack.
    BuiltinFn { func: BuiltinFn, arg_count: usize },

    /// An aggregation function call, `distinct` tracking `SUM(DISTINCT x)`
    /// style modifiers and `within` tracking a `WITHIN RECORD` modifier
    /// over a repeated field.
    AggregationFn { func: AggregationFn, distinct: bool, within_record: bool },

    /// A fully self-contained sub-query result substituted in as a single
    /// opaque value (e.g. an aggregation used inside a HAVING clause).
    AggregationQuery(String),

    /// A fragment the rewriter could not lower to server SQL and must
    /// instead evaluate client-side against decrypted row values.
    UnencryptedQuery(String),

    /// `COUNT(*)`, kept distinct from `AggregationFn{Count,..}` over a
    /// named column because it never references a field.
    CountStar,
}

impl Token {
    /// Re-renders a single token back to SQL-ish surface syntax. Composing
    /// these left-to-right over a postfix sequence is only meaningful once
    /// the sequence has been reduced back to infix form by the caller;
    /// `surface` itself does not reorder operands.
    pub fn surface(&self) -> String {
        match self {
            Token::Literal(lit) => lit.to_string(),
            Token::Field(name) => name.clone(),
            Token::EncryptedField { alias, .. } => alias.clone(),
            Token::Operator(op) => op.surface().to_string(),
            Token::BuiltinFn { func, .. } => func.name().to_string(),
            Token::AggregationFn { func, distinct, .. } => {
                if *distinct { format!("{}(DISTINCT ...)", func.name()) } else { format!("{}(...)", func.name()) }
            }
            Token::AggregationQuery(label) => label.clone(),
            Token::UnencryptedQuery(fragment) => fragment.clone(),
            Token::CountStar => "COUNT(*)".to_string(),
        }
    }
}
