//! Projection-list lowering: each selected expression becomes
//! either a server-computed column or a client-finished one, recorded in a
//! [`Projection`] the reassembler can act on without re-parsing SQL.

use ebq_manifest::Manifest;
use ebq_schema::{AggregationFn, ColumnDescriptor, ColumnType, EbqError, EncryptMode};

use crate::context::RewriteContext;
use crate::expr::{tree_to_postfix, Expr};
use crate::predicate::wire_name;

/// How `ebq-reassemble` should produce the final value for one projected
/// column.
#[derive(Debug, Clone)]
pub enum Projection {
    /// Fetch `alias`, decode/decrypt it per `column`'s `encrypt` mode.
    Column { alias: String, column: ColumnDescriptor, label: String },
    /// `COUNT(*)`: the server's integer result needs no further decoding.
    CountStar { alias: String, label: String },
    /// An aggregation the server can compute directly and return as a
    /// plain scalar (plaintext SUM/AVG/MIN/MAX/COUNT/GROUP_CONCAT).
    ServerAggregation { alias: String, label: String },
    /// `SUM`/`TOP` over a homomorphic column, returned as an opaque
    /// ciphertext the caller must decrypt with the table's homomorphic key.
    /// `ty` picks the int64 or float plaintext codec.
    HomomorphicSum { alias: String, ty: ColumnType, label: String },
    /// `AVG` over a homomorphic column: the server returns the ciphertext
    /// sum and the row count separately; the caller decrypts the sum and
    /// divides.
    HomomorphicAvg { sum_alias: String, count_alias: String, ty: ColumnType, label: String },
    /// Anything else: fetch the raw wire columns `fetch` names and
    /// evaluate `postfix` against their decrypted values client-side.
    ClientComputed { fetch: Vec<(String, ColumnDescriptor)>, postfix: Vec<ebq_schema::Token>, label: String },
}

/// The wire column a projection should fetch to recover a plaintext value.
/// A pure `searchwords` column has no such column - its wire form is a
/// one-way hash list useful only for `LIKE` containment, never for
/// display - so selecting it directly is rejected. `probabilistic_searchwords`
/// columns fetch their probabilistic twin instead of the hash column.
pub(crate) fn projectable_wire_name(col: &ColumnDescriptor) -> Result<String, EbqError> {
    match col.encrypt {
        EncryptMode::Searchwords => Err(EbqError::invalid_query(&col.name, "searchwords columns cannot be selected, only searched")),
        EncryptMode::ProbabilisticSearchwords => Ok(format!("{}{}", ebq_schema::PREFIX_PROBABILISTIC, col.name)),
        _ => Ok(wire_name(col)),
    }
}

pub fn lower_select_item(expr: &Expr, label: &str, manifest: &mut Manifest, ctx: &RewriteContext) -> Result<(Projection, String), EbqError> {
    match expr {
        Expr::Field(name) if name == "*" => Err(EbqError::invalid_query("*", "must be expanded by the caller before lowering")),
        Expr::Field(name) => {
            let col = ctx.lookup(name).cloned()?;
            let wire = projectable_wire_name(&col)?;
            let alias = manifest.register(label, &wire);
            Ok((Projection::Column { alias: alias.clone(), column: col, label: label.to_string() }, format!("{wire} AS {alias}")))
        }
        Expr::CountStar => {
            let alias = manifest.register(label, "COUNT(*)");
            Ok((Projection::CountStar { alias: alias.clone(), label: label.to_string() }, format!("COUNT(*) AS {alias}")))
        }
        Expr::Aggregation { func, arg: Some(arg), distinct, within_record } => lower_aggregation(*func, arg, *distinct, *within_record, label, manifest, ctx),
        other => lower_client_computed(other, label, manifest, ctx),
    }
}

fn lower_aggregation(func: AggregationFn, arg: &Expr, distinct: bool, within_record: bool, label: &str, manifest: &mut Manifest, ctx: &RewriteContext) -> Result<(Projection, String), EbqError> {
    let Expr::Field(name) = arg else {
        return lower_client_computed(&Expr::Aggregation { func, arg: Some(Box::new(arg.clone())), distinct, within_record }, label, manifest, ctx);
    };
    let col = ctx.lookup(name).cloned()?;

    if col.encrypt == EncryptMode::Homomorphic {
        let wire = wire_name(&col);
        return match func {
            AggregationFn::Sum => {
                let alias = manifest.register(label, &wire);
                Ok((Projection::HomomorphicSum { alias: alias.clone(), ty: col.ty, label: label.to_string() }, format!("PAILLIER_SUM({wire}) AS {alias}")))
            }
            AggregationFn::Avg => {
                let sum_alias = manifest.register(&format!("{label}__sum"), &wire);
                let count_alias = manifest.register(&format!("{label}__count"), &wire);
                Ok((
                    Projection::HomomorphicAvg { sum_alias: sum_alias.clone(), count_alias: count_alias.clone(), ty: col.ty, label: label.to_string() },
                    format!("PAILLIER_SUM({wire}) AS {sum_alias}, COUNT({wire}) AS {count_alias}"),
                ))
            }
            _ => lower_client_computed(&Expr::Field(name.clone()), label, manifest, ctx),
        };
    }

    if col.encrypt != EncryptMode::None {
        return lower_client_computed(&Expr::Aggregation { func, arg: Some(Box::new(arg.clone())), distinct, within_record }, label, manifest, ctx);
    }

    let sql_fn = match func {
        AggregationFn::Count => "COUNT",
        AggregationFn::Sum => "SUM",
        AggregationFn::Avg => "AVG",
        AggregationFn::Min => "MIN",
        AggregationFn::Max => "MAX",
        AggregationFn::GroupConcat => "GROUP_CONCAT",
        // TOP has no server-side SQL equivalent; finish it client-side over the raw column.
        AggregationFn::Top => return lower_client_computed(&Expr::Aggregation { func, arg: Some(Box::new(arg.clone())), distinct, within_record }, label, manifest, ctx),
    };
    let wire = wire_name(&col);
    let alias = manifest.register(label, &wire);
    let distinct_kw = if distinct { "DISTINCT " } else { "" };
    Ok((Projection::ServerAggregation { alias: alias.clone(), label: label.to_string() }, format!("{sql_fn}({distinct_kw}{wire}) AS {alias}")))
}

fn lower_client_computed(expr: &Expr, label: &str, manifest: &mut Manifest, ctx: &RewriteContext) -> Result<(Projection, String), EbqError> {
    let mut field_names = Vec::new();
    crate::expr::referenced_fields(expr, &mut field_names);

    let mut fetch = Vec::new();
    let mut fragments = Vec::new();
    for name in &field_names {
        let col = ctx.lookup(name).cloned()?;
        let wire = projectable_wire_name(&col)?;
        let alias = manifest.register(&format!("{label}__{name}"), &wire);
        fragments.push(format!("{wire} AS {alias}"));
        fetch.push((alias, col));
    }
    if fetch.is_empty() {
        // A constant expression with no field references still needs a row to attach to.
        let alias = manifest.register(label, "1");
        fragments.push(format!("1 AS {alias}"));
    }

    Ok((Projection::ClientComputed { fetch, postfix: tree_to_postfix(expr), label: label.to_string() }, fragments.join(", ")))
}
