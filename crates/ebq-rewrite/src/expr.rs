//! A small expression tree, built from and flattened back to the postfix
//! [`Token`] sequences [`ebq_sql`] produces. The rewriter reasons about
//! AND/OR splitting far more easily over a tree than over a flat stack, but
//! `ebq-reassemble`'s residual evaluator wants postfix, so both directions
//! are needed.

use ebq_schema::{AggregationFn, BuiltinFn, EbqError, Literal, Operator, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Field(String),
    CountStar,
    Unary(Operator, Box<Expr>),
    Binary(Operator, Box<Expr>, Box<Expr>),
    Builtin(BuiltinFn, Vec<Expr>),
    Aggregation { func: AggregationFn, arg: Option<Box<Expr>>, distinct: bool, within_record: bool },
}

pub fn postfix_to_tree(tokens: &[Token]) -> Result<Expr, EbqError> {
    let mut stack: Vec<Expr> = Vec::new();
    for tok in tokens {
        match tok {
            Token::Literal(lit) => stack.push(Expr::Literal(lit.clone())),
            Token::Field(name) => stack.push(Expr::Field(name.clone())),
            Token::EncryptedField { alias, .. } => stack.push(Expr::Field(alias.clone())),
            Token::CountStar => stack.push(Expr::CountStar),
            Token::Operator(op) => {
                if op.arity() == 1 {
                    let a = pop(&mut stack)?;
                    stack.push(Expr::Unary(*op, Box::new(a)));
                } else {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(Expr::Binary(*op, Box::new(a), Box::new(b)));
                }
            }
            Token::BuiltinFn { func, arg_count } => {
                let mut args = Vec::with_capacity(*arg_count);
                for _ in 0..*arg_count {
                    args.push(pop(&mut stack)?);
                }
                args.reverse();
                stack.push(Expr::Builtin(*func, args));
            }
            Token::AggregationFn { func, distinct, within_record } => {
                let arg = Some(Box::new(pop(&mut stack)?));
                stack.push(Expr::Aggregation { func: *func, arg, distinct: *distinct, within_record: *within_record });
            }
            Token::AggregationQuery(_) | Token::UnencryptedQuery(_) => {
                return Err(EbqError::invalid_query("expression", "cannot rebuild a tree from an already-lowered fragment"));
            }
        }
    }
    pop(&mut stack)
}

fn pop(stack: &mut Vec<Expr>) -> Result<Expr, EbqError> {
    stack.pop().ok_or_else(|| EbqError::invalid_query("expression", "malformed postfix sequence"))
}

pub fn tree_to_postfix(expr: &Expr) -> Vec<Token> {
    let mut out = Vec::new();
    flatten(expr, &mut out);
    out
}

fn flatten(expr: &Expr, out: &mut Vec<Token>) {
    match expr {
        Expr::Literal(lit) => out.push(Token::Literal(lit.clone())),
        Expr::Field(name) => out.push(Token::Field(name.clone())),
        Expr::CountStar => out.push(Token::CountStar),
        Expr::Unary(op, a) => {
            flatten(a, out);
            out.push(Token::Operator(*op));
        }
        Expr::Binary(op, a, b) => {
            flatten(a, out);
            flatten(b, out);
            out.push(Token::Operator(*op));
        }
        Expr::Builtin(func, args) => {
            for a in args {
                flatten(a, out);
            }
            out.push(Token::BuiltinFn { func: *func, arg_count: args.len() });
        }
        Expr::Aggregation { func, arg, distinct, within_record } => {
            if let Some(a) = arg {
                flatten(a, out);
            }
            out.push(Token::AggregationFn { func: *func, distinct: *distinct, within_record: *within_record });
        }
    }
}

/// Every distinct field name referenced anywhere in `expr`.
pub fn referenced_fields(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Field(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Expr::Literal(_) | Expr::CountStar => {}
        Expr::Unary(_, a) => referenced_fields(a, out),
        Expr::Binary(_, a, b) => {
            referenced_fields(a, out);
            referenced_fields(b, out);
        }
        Expr::Builtin(_, args) => args.iter().for_each(|a| referenced_fields(a, out)),
        Expr::Aggregation { arg, .. } => {
            if let Some(a) = arg {
                referenced_fields(a, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postfix_roundtrips_through_tree() {
        let postfix = vec![Token::Field("Year".into()), Token::Literal(Literal::Integer(2015)), Token::Operator(Operator::Gt)];
        let tree = postfix_to_tree(&postfix).unwrap();
        assert_eq!(tree_to_postfix(&tree), postfix);
    }

    #[test]
    fn referenced_fields_collects_uniques() {
        let postfix = vec![
            Token::Field("Year".into()),
            Token::Literal(Literal::Integer(2015)),
            Token::Operator(Operator::Gt),
            Token::Field("Year".into()),
            Token::Literal(Literal::Integer(2020)),
            Token::Operator(Operator::Lt),
            Token::Operator(Operator::And),
        ];
        let tree = postfix_to_tree(&postfix).unwrap();
        let mut fields = Vec::new();
        referenced_fields(&tree, &mut fields);
        assert_eq!(fields, vec!["Year".to_string()]);
    }
}
