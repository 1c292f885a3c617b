//! Turns a parsed client query into server-executable SQL plus whatever
//! residual work the caller must still do against decrypted rows.
//! [`rewrite_query`] is the crate's single entry point; the rest of the
//! modules are its building blocks.

pub mod context;
pub mod expr;
pub mod predicate;
pub mod select;

use ebq_manifest::Manifest;
use ebq_schema::{ColumnDescriptor, EbqError, EncryptMode, Token};
use ebq_sql::{ClauseMap, JoinKind, SortDirection};

pub use context::RewriteContext;
pub use expr::Expr;
pub use predicate::Lowered;
pub use select::Projection;

/// A field this query must still sort by once rows are decrypted, because
/// its encryption mode makes server-side ordering meaningless.
#[derive(Debug, Clone)]
pub struct ResidualOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// A column fetched solely so the reassembler can finish some residual
/// work on it (sorting or evaluating a predicate) even though it wasn't
/// named in the SELECT list.
#[derive(Debug, Clone)]
pub struct FieldFetch {
    pub field: String,
    pub alias: String,
    pub column: ColumnDescriptor,
}

/// A fully lowered query: the server SQL text, the alias manifest needed to
/// read the response back, the per-column projection plan, and whatever the
/// server's SQL couldn't express.
#[derive(Debug, Clone)]
pub struct RewrittenQuery {
    pub sql: String,
    pub manifest: Manifest,
    pub projections: Vec<Projection>,
    pub residual_predicates: Vec<ResidualPredicate>,
    pub residual_order: Vec<ResidualOrder>,
    pub order_key_fetch: Vec<FieldFetch>,
    pub predicate_fetch: Vec<FieldFetch>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResidualPredicate {
    pub postfix: Vec<Token>,
    pub fields: Vec<String>,
}

pub fn rewrite_query(sql: &str, ctx: &RewriteContext) -> Result<RewrittenQuery, EbqError> {
    let clauses = ebq_sql::parse(sql)?;
    let mut manifest = Manifest::new(ctx.query_uuid.clone());

    let from = clauses.from.clone().ok_or_else(|| EbqError::invalid_query(sql, "missing FROM clause"))?;

    let (select_sql, projections) = lower_select(&clauses, &mut manifest, ctx)?;

    let from_sql = lower_from(&from, ctx)?;

    let (where_sql, residual_predicates) = match &clauses.where_clause {
        Some(tokens) => lower_boolean_clause(tokens, ctx)?,
        None => (None, Vec::new()),
    };

    let group_by_sql = lower_group_by(&clauses.group_by, ctx)?;

    let (having_sql, having_residual) = match &clauses.having {
        Some(tokens) => lower_boolean_clause(tokens, ctx)?,
        None => (None, Vec::new()),
    };
    let mut residual_predicates = residual_predicates;
    residual_predicates.extend(having_residual);

    // ORDER BY is never emitted to the server - ciphertext byte order bears
    // no relation to plaintext order for any encryption mode this engine
    // uses, so every key is enforced by the reassembler on decrypted rows.
    let residual_order = order_by_keys(&clauses.order_by)?;
    let order_fields: Vec<String> = residual_order.iter().map(|k| k.field.clone()).collect();
    let (order_fetch_sql, order_key_fetch) = lower_field_fetch(&order_fields, "__order_", &projections, &mut manifest, ctx)?;

    // Residual WHERE/HAVING predicates reference plaintext column names
    // that may not appear anywhere in the SELECT list either - they need
    // their own fetch for the same reason an ORDER BY key does.
    let mut predicate_fields = Vec::new();
    for p in &residual_predicates {
        for f in &p.fields {
            if !predicate_fields.contains(f) {
                predicate_fields.push(f.clone());
            }
        }
    }
    let (predicate_fetch_sql, predicate_fetch) = lower_field_fetch(&predicate_fields, "__pred_", &projections, &mut manifest, ctx)?;

    let mut select_sql = select_sql;
    for extra in [&order_fetch_sql, &predicate_fetch_sql] {
        if !extra.is_empty() {
            select_sql.push_str(", ");
            select_sql.push_str(&extra.join(", "));
        }
    }

    let mut sql_parts = vec![format!("SELECT {select_sql}"), format!("FROM {from_sql}")];
    if let Some(w) = where_sql {
        sql_parts.push(format!("WHERE {w}"));
    }
    if !group_by_sql.is_empty() {
        sql_parts.push(format!("GROUP BY {}", group_by_sql.join(", ")));
    }
    if let Some(h) = having_sql {
        sql_parts.push(format!("HAVING {h}"));
    }
    // LIMIT is always pushed down even though filtering/sorting may still
    // happen client-side; a caller relying on exact row counts under a
    // residual WHERE or an ORDER BY should treat `limit` as advisory and
    // re-request with a larger bound if the reassembled set falls short.
    if let Some(limit) = clauses.limit {
        sql_parts.push(format!("LIMIT {limit}"));
    }

    Ok(RewrittenQuery {
        sql: sql_parts.join(" "),
        manifest,
        projections,
        residual_predicates,
        residual_order,
        order_key_fetch,
        predicate_fetch,
        limit: clauses.limit,
    })
}

/// Fetches whatever of `fields` the SELECT list doesn't already project,
/// for residual work (ORDER BY keys, WHERE/HAVING predicates) that needs a
/// plaintext column's decrypted value but never asked to see it in the
/// output. Reuses an existing projection's alias instead of fetching twice.
fn lower_field_fetch(
    fields: &[String],
    slot_prefix: &str,
    projections: &[Projection],
    manifest: &mut Manifest,
    ctx: &RewriteContext,
) -> Result<(Vec<String>, Vec<FieldFetch>), EbqError> {
    let mut fragments = Vec::new();
    let mut fetch = Vec::new();

    for field in fields {
        let already = projections.iter().find_map(|p| match p {
            Projection::Column { alias, column, .. } if &column.name == field => Some(alias.clone()),
            _ => None,
        });
        let col = ctx.lookup(field)?.clone();
        let alias = match already {
            Some(alias) => alias,
            None => {
                let wire = select::projectable_wire_name(&col)?;
                let alias = manifest.register(&format!("{slot_prefix}{field}"), &wire);
                fragments.push(format!("{wire} AS {alias}"));
                alias
            }
        };
        fetch.push(FieldFetch { field: field.clone(), alias, column: col });
    }

    Ok((fragments, fetch))
}

fn lower_select(clauses: &ClauseMap, manifest: &mut Manifest, ctx: &RewriteContext) -> Result<(String, Vec<Projection>), EbqError> {
    let mut fragments = Vec::new();
    let mut projections = Vec::new();

    for (i, item) in clauses.select.iter().enumerate() {
        let label = item.alias.clone().unwrap_or_else(|| format!("slot{i}"));

        if item.expr == [Token::Field("*".to_string())] {
            // A pure searchwords column has no projectable wire form;
            // `SELECT *` silently skips it rather than erroring, the same
            // way it would skip a write-only column in a relational store.
            for col in ctx.schema.iter().filter(|c| c.is_leaf() && c.encrypt != EncryptMode::Searchwords) {
                let (projection, fragment) = select::lower_select_item(&Expr::Field(col.name.clone()), &col.name, manifest, ctx)?;
                fragments.push(fragment);
                projections.push(projection);
            }
            continue;
        }

        let tree = expr::postfix_to_tree(&item.expr)?;
        let (projection, fragment) = select::lower_select_item(&tree, &label, manifest, ctx)?;
        fragments.push(fragment);
        projections.push(projection);
    }

    if fragments.is_empty() {
        return Err(EbqError::invalid_query("SELECT", "empty projection list"));
    }

    Ok((fragments.join(", "), projections))
}

fn lower_from(from: &ebq_sql::FromClause, ctx: &RewriteContext) -> Result<String, EbqError> {
    let mut sql = from.table.clone();
    for join in &from.joins {
        let kind = match join.kind {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        };
        let on_tree = expr::postfix_to_tree(&join.on)?;
        let lowered = predicate::lower_predicate(&on_tree, ctx);
        let mut on_sql = Vec::new();
        for l in lowered {
            match l {
                Lowered::Server(sql) => on_sql.push(sql),
                Lowered::Residual { .. } => {
                    return Err(EbqError::invalid_query(&join.table, "JOIN conditions cannot reference encrypted columns"));
                }
            }
        }
        sql.push_str(&format!(" {kind} {} ON {}", join.table, on_sql.join(" AND ")));
    }
    Ok(sql)
}

fn lower_boolean_clause(tokens: &[Token], ctx: &RewriteContext) -> Result<(Option<String>, Vec<ResidualPredicate>), EbqError> {
    let tree = expr::postfix_to_tree(tokens)?;
    let lowered = predicate::lower_predicate(&tree, ctx);

    let mut server_parts = Vec::new();
    let mut residual = Vec::new();
    for l in lowered {
        match l {
            Lowered::Server(sql) => server_parts.push(sql),
            Lowered::Residual { postfix, fields } => residual.push(ResidualPredicate { postfix, fields }),
        }
    }

    let sql = if server_parts.is_empty() { None } else { Some(server_parts.join(" AND ")) };
    Ok((sql, residual))
}

fn lower_group_by(group_by: &[Vec<Token>], ctx: &RewriteContext) -> Result<Vec<String>, EbqError> {
    let mut out = Vec::new();
    for tokens in group_by {
        let name = single_field_name(tokens)?;
        let col = ctx.lookup(&name)?;
        if col.encrypt != EncryptMode::None {
            return Err(EbqError::invalid_query(&name, "cannot GROUP BY an encrypted column"));
        }
        out.push(predicate::wire_name(col));
    }
    Ok(out)
}

fn order_by_keys(order_by: &[ebq_sql::OrderItem]) -> Result<Vec<ResidualOrder>, EbqError> {
    order_by
        .iter()
        .map(|item| Ok(ResidualOrder { field: single_field_name(&item.expr)?, direction: item.direction }))
        .collect()
}

fn single_field_name(tokens: &[Token]) -> Result<String, EbqError> {
    match tokens {
        [Token::Field(name)] => Ok(name.clone()),
        _ => Err(EbqError::invalid_query("expression", "only a bare column reference is supported here")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebq_load::TableKeys;
    use ebq_schema::{ColumnType, MasterKey, Mode};

    fn leaf(name: &str, ty: ColumnType, encrypt: EncryptMode) -> ColumnDescriptor {
        ColumnDescriptor { name: name.to_string(), ty, mode: Mode::Required, encrypt, fields: None, related: None, searchwords_separator: None, max_word_sequence: 5 }
    }

    fn schema() -> Vec<ColumnDescriptor> {
        vec![
            leaf("Year", ColumnType::Integer, EncryptMode::None),
            leaf("Make", ColumnType::String, EncryptMode::Pseudonym),
            leaf("Invoice_Price", ColumnType::Integer, EncryptMode::Homomorphic),
            leaf("Description", ColumnType::String, EncryptMode::Searchwords),
        ]
    }

    #[test]
    fn plain_query_lowers_entirely_to_server_sql() {
        let schema = schema();
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let ctx = RewriteContext::new(&schema, &keys, "q-1");
        let rewritten = rewrite_query("SELECT Year FROM cars WHERE Year > 2015 LIMIT 10", &ctx).unwrap();
        assert!(rewritten.sql.contains("FROM cars"));
        assert!(rewritten.sql.contains("WHERE Year > 2015"));
        assert!(rewritten.sql.contains("LIMIT 10"));
        assert!(rewritten.residual_predicates.is_empty());
    }

    #[test]
    fn query_with_encrypted_predicate_carries_residual_but_still_pushes_limit() {
        let schema = schema();
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let ctx = RewriteContext::new(&schema, &keys, "q-1");
        let rewritten = rewrite_query("SELECT Year FROM cars WHERE Invoice_Price > 1000 LIMIT 5", &ctx).unwrap();
        assert!(rewritten.sql.contains("LIMIT 5"));
        assert_eq!(rewritten.residual_predicates.len(), 1);
        assert_eq!(rewritten.limit, Some(5));
    }

    #[test]
    fn select_star_expands_to_every_leaf_column() {
        let schema = schema();
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let ctx = RewriteContext::new(&schema, &keys, "q-1");
        let rewritten = rewrite_query("SELECT * FROM cars", &ctx).unwrap();
        // "Description" (pure searchwords) has no projectable wire form and is skipped.
        assert_eq!(rewritten.projections.len(), schema.len() - 1);
    }

    #[test]
    fn order_by_encrypted_column_is_residual() {
        let schema = schema();
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let ctx = RewriteContext::new(&schema, &keys, "q-1");
        let rewritten = rewrite_query("SELECT Year FROM cars ORDER BY Make ASC", &ctx).unwrap();
        assert!(!rewritten.sql.contains("ORDER BY"));
        assert_eq!(rewritten.residual_order.len(), 1);
        assert_eq!(rewritten.residual_order[0].field, "Make");
        // Make isn't in the SELECT list, so it must still be fetched for the reassembler to sort by.
        assert_eq!(rewritten.order_key_fetch.len(), 1);
        assert_eq!(rewritten.order_key_fetch[0].field, "Make");
        assert!(rewritten.sql.contains(&rewritten.order_key_fetch[0].alias));
    }

    #[test]
    fn order_by_already_projected_column_reuses_its_alias() {
        let schema = schema();
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let ctx = RewriteContext::new(&schema, &keys, "q-1");
        let rewritten = rewrite_query("SELECT Year FROM cars ORDER BY Year ASC", &ctx).unwrap();
        assert_eq!(rewritten.order_key_fetch.len(), 1);
        let Projection::Column { alias: select_alias, .. } = &rewritten.projections[0] else {
            panic!("expected a plain column projection");
        };
        assert_eq!(&rewritten.order_key_fetch[0].alias, select_alias);
    }

    #[test]
    fn residual_predicate_field_not_in_select_list_is_still_fetched() {
        let schema = schema();
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let ctx = RewriteContext::new(&schema, &keys, "q-1");
        let rewritten = rewrite_query("SELECT Year FROM cars WHERE Invoice_Price > 1000", &ctx).unwrap();
        assert_eq!(rewritten.predicate_fetch.len(), 1);
        assert_eq!(rewritten.predicate_fetch[0].field, "Invoice_Price");
        assert!(rewritten.sql.contains(&rewritten.predicate_fetch[0].alias));
    }

    #[test]
    fn group_by_encrypted_column_errors() {
        let schema = schema();
        let mk = MasterKey::from_bytes(vec![1; 32]);
        let keys = TableKeys::derive(&mk, "cars_1");
        let ctx = RewriteContext::new(&schema, &keys, "q-1");
        assert!(rewrite_query("SELECT Year FROM cars GROUP BY Make", &ctx).is_err());
    }
}
