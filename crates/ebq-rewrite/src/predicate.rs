//! WHERE/HAVING lowering: an AND-chain of predicates splits into whatever
//! server SQL can be pushed down and whatever must be evaluated
//! client-side against decrypted row data.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ebq_schema::{ColumnDescriptor, EncryptMode, Literal, Operator};
use ebq_symcrypto::searchwords::{field_iv, hash_subsequence, keyed_hash};
use ebq_symcrypto::AesCbc;

use crate::context::RewriteContext;
use crate::expr::{referenced_fields, tree_to_postfix, Expr};

const ZERO_IV: [u8; 16] = [0u8; 16];

/// The outcome of lowering a single top-level AND-conjunct.
pub enum Lowered {
    /// Fully expressible as server SQL.
    Server(String),
    /// Cannot be pushed down; must be evaluated client-side against the
    /// decrypted values of every field it references.
    Residual { postfix: Vec<ebq_schema::Token>, fields: Vec<String> },
}

/// Splits `expr` on top-level `AND` and lowers each conjunct independently
/// (sound because AND distributes: pushing some conjuncts to the server
/// and evaluating the rest client-side is equivalent to evaluating the
/// whole AND client-side). `OR` and `NOT` must lower in one piece.
pub fn lower_predicate(expr: &Expr, ctx: &RewriteContext) -> Vec<Lowered> {
    let mut conjuncts = Vec::new();
    split_and(expr, &mut conjuncts);
    conjuncts.into_iter().map(|c| lower_conjunct(&c, ctx)).collect()
}

fn split_and<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    if let Expr::Binary(Operator::And, a, b) = expr {
        split_and(a, out);
        split_and(b, out);
    } else {
        out.push(expr);
    }
}

fn lower_conjunct(expr: &Expr, ctx: &RewriteContext) -> Lowered {
    match try_lower(expr, ctx) {
        Some(sql) => Lowered::Server(sql),
        None => {
            let mut fields = Vec::new();
            referenced_fields(expr, &mut fields);
            Lowered::Residual { postfix: tree_to_postfix(expr), fields }
        }
    }
}

fn try_lower(expr: &Expr, ctx: &RewriteContext) -> Option<String> {
    match expr {
        Expr::Binary(Operator::And, a, b) => Some(format!("({} AND {})", try_lower(a, ctx)?, try_lower(b, ctx)?)),
        Expr::Binary(Operator::Or, a, b) => Some(format!("({} OR {})", try_lower(a, ctx)?, try_lower(b, ctx)?)),
        Expr::Unary(Operator::Not, a) => Some(format!("NOT ({})", try_lower(a, ctx)?)),
        Expr::Unary(Operator::IsNull, a) => Some(format!("{} IS NULL", lower_operand(a, ctx)?)),
        Expr::Unary(Operator::IsNotNull, a) => Some(format!("{} IS NOT NULL", lower_operand(a, ctx)?)),
        Expr::Binary(op, a, b) => lower_comparison(*op, a, b, ctx),
        _ => None,
    }
}

/// A bare field reference in an `IS [NOT] NULL` check lowers to its wire
/// name regardless of encryption mode: NULL-ness survives encryption.
fn lower_operand(expr: &Expr, ctx: &RewriteContext) -> Option<String> {
    match expr {
        Expr::Field(name) => {
            let col = ctx.lookup(name).ok()?;
            Some(wire_name(col))
        }
        _ => None,
    }
}

fn lower_comparison(op: Operator, a: &Expr, b: &Expr, ctx: &RewriteContext) -> Option<String> {
    let (field, literal, op) = match (a, b) {
        (Expr::Field(name), Expr::Literal(lit)) => (name, lit, op),
        (Expr::Literal(lit), Expr::Field(name)) => (name, lit, flip(op)),
        _ => return None,
    };
    let col = ctx.lookup(field).ok()?;

    match col.encrypt {
        EncryptMode::None => Some(format!("{} {} {}", wire_name(col), sql_op(op), literal_sql(literal))),
        EncryptMode::Pseudonym if matches!(op, Operator::Eq | Operator::NotEq) => {
            let text = match literal {
                Literal::String(s) => s.as_bytes().to_vec(),
                Literal::Integer(n) => n.to_string().into_bytes(),
                Literal::Float(f) => f.to_string().into_bytes(),
                _ => return None,
            };
            let key = ctx.keys.pseudonym_key(col.related.as_deref());
            let cipher = AesCbc::new(key).ok()?;
            let ct = cipher.encrypt(&text, Some(ZERO_IV));
            Some(format!("{} {} '{}'", wire_name(col), sql_op(op), BASE64.encode(ct)))
        }
        EncryptMode::Searchwords | EncryptMode::ProbabilisticSearchwords if op == Operator::Like => {
            let Literal::String(pattern) = literal else { return None };
            let word = pattern.trim_matches('%');
            let iv = field_iv(&ctx.keys.stringhash, field);
            let keyed = keyed_hash(&ctx.keys.stringhash, field, &word.to_lowercase(), 16);
            let target = hash_subsequence(&iv, &keyed);
            let wire = format!("{}{}", ebq_schema::PREFIX_SEARCHWORDS, col.name);
            Some(format!("{wire} LIKE '%{}%'", BASE64.encode(target)))
        }
        _ => None,
    }
}

fn flip(op: Operator) -> Operator {
    match op {
        Operator::Lt => Operator::Gt,
        Operator::LtEq => Operator::GtEq,
        Operator::Gt => Operator::Lt,
        Operator::GtEq => Operator::LtEq,
        other => other,
    }
}

fn sql_op(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "=",
        Operator::NotEq => "!=",
        Operator::Lt => "<",
        Operator::LtEq => "<=",
        Operator::Gt => ">",
        Operator::GtEq => ">=",
        Operator::Like => "LIKE",
        other => other.surface(),
    }
}

fn literal_sql(lit: &Literal) -> String {
    lit.to_string()
}

pub fn wire_name(col: &ColumnDescriptor) -> String {
    ebq_schema::rewrite_schema(std::slice::from_ref(col))[0].name.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebq_schema::{ColumnType, MasterKey, Mode, Token};
    use ebq_load::TableKeys;

    fn leaf(name: &str, ty: ColumnType, encrypt: EncryptMode) -> ColumnDescriptor {
        ColumnDescriptor { name: name.to_string(), ty, mode: Mode::Required, encrypt, fields: None, related: None, searchwords_separator: None, max_word_sequence: 5 }
    }

    fn ctx<'a>(schema: &'a [ColumnDescriptor], keys: &'a TableKeys) -> RewriteContext<'a> {
        RewriteContext::new(schema, keys, "q-1")
    }

    #[test]
    fn plaintext_comparison_lowers_directly() {
        let schema = vec![leaf("Year", ColumnType::Integer, EncryptMode::None)];
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let expr = Expr::Binary(Operator::Gt, Box::new(Expr::Field("Year".into())), Box::new(Expr::Literal(Literal::Integer(2015))));
        let lowered = lower_predicate(&expr, &ctx(&schema, &keys));
        assert_eq!(lowered.len(), 1);
        assert!(matches!(&lowered[0], Lowered::Server(s) if s == "Year > 2015"));
    }

    #[test]
    fn and_splits_into_independent_conjuncts() {
        let schema = vec![leaf("Year", ColumnType::Integer, EncryptMode::None), leaf("Notes", ColumnType::String, EncryptMode::Probabilistic)];
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let lhs = Expr::Binary(Operator::Gt, Box::new(Expr::Field("Year".into())), Box::new(Expr::Literal(Literal::Integer(2015))));
        let rhs = Expr::Binary(Operator::Eq, Box::new(Expr::Field("Notes".into())), Box::new(Expr::Literal(Literal::String("x".into()))));
        let expr = Expr::Binary(Operator::And, Box::new(lhs), Box::new(rhs));
        let lowered = lower_predicate(&expr, &ctx(&schema, &keys));
        assert_eq!(lowered.len(), 2);
        assert!(matches!(&lowered[0], Lowered::Server(_)));
        assert!(matches!(&lowered[1], Lowered::Residual { .. }));
    }

    #[test]
    fn pseudonym_equality_encrypts_the_literal() {
        let schema = vec![leaf("Make", ColumnType::String, EncryptMode::Pseudonym)];
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let expr = Expr::Binary(Operator::Eq, Box::new(Expr::Field("Make".into())), Box::new(Expr::Literal(Literal::String("Ford".into()))));
        let lowered = lower_predicate(&expr, &ctx(&schema, &keys));
        match &lowered[0] {
            Lowered::Server(sql) => assert!(sql.starts_with("DS_PSEUDONYM_Make = '")),
            Lowered::Residual { .. } => panic!("expected server lowering"),
        }
    }

    #[test]
    fn or_over_mixed_lowerability_is_fully_residual() {
        let schema = vec![leaf("Year", ColumnType::Integer, EncryptMode::None), leaf("Price", ColumnType::Integer, EncryptMode::Homomorphic)];
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let lhs = Expr::Binary(Operator::Gt, Box::new(Expr::Field("Year".into())), Box::new(Expr::Literal(Literal::Integer(2015))));
        let rhs = Expr::Binary(Operator::Gt, Box::new(Expr::Field("Price".into())), Box::new(Expr::Literal(Literal::Integer(1000))));
        let expr = Expr::Binary(Operator::Or, Box::new(lhs), Box::new(rhs));
        let lowered = lower_predicate(&expr, &ctx(&schema, &keys));
        assert!(matches!(&lowered[0], Lowered::Residual { .. }));
    }

    #[test]
    fn searchwords_like_lowers_to_hash_containment() {
        let schema = vec![leaf("Description", ColumnType::String, EncryptMode::Searchwords)];
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let expr = Expr::Binary(Operator::Like, Box::new(Expr::Field("Description".into())), Box::new(Expr::Literal(Literal::String("%moon%".into()))));
        let lowered = lower_predicate(&expr, &ctx(&schema, &keys));
        match &lowered[0] {
            Lowered::Server(sql) => assert!(sql.starts_with("DS_SEARCHWORDS_Description LIKE '%")),
            Lowered::Residual { .. } => panic!("expected server lowering"),
        }
    }

    #[test]
    fn residual_carries_its_postfix_and_fields() {
        let schema = vec![leaf("Notes", ColumnType::String, EncryptMode::Probabilistic)];
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let expr = Expr::Binary(Operator::Eq, Box::new(Expr::Field("Notes".into())), Box::new(Expr::Literal(Literal::String("x".into()))));
        let lowered = lower_predicate(&expr, &ctx(&schema, &keys));
        match &lowered[0] {
            Lowered::Residual { postfix, fields } => {
                assert_eq!(fields, &vec!["Notes".to_string()]);
                assert_eq!(postfix.last(), Some(&Token::Operator(Operator::Eq)));
            }
            Lowered::Server(_) => panic!("expected residual"),
        }
    }
}
