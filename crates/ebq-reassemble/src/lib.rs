//! Turns a table service's response rows back into the plaintext result a
//! caller's query asked for: decrypts every wire column,
//! filters by whatever `WHERE`/`HAVING` the rewriter couldn't push down,
//! sorts by `ORDER BY` (never pushed down at all), and finishes any
//! client-computed projection.

pub mod decode;
pub mod order;
pub mod residual;

use std::collections::HashMap;

use ebq_load::TableKeys;
use ebq_rewrite::{FieldFetch, Projection, ResidualPredicate, RewrittenQuery};
use ebq_schema::{AggregationFn, ColumnDescriptor, ColumnType, EbqError, Token};
use serde_json::{Map, Value};

use residual::Row;

/// Decodes and finishes one page of a table service's query response.
///
/// `rows` is the server's response, one JSON object per row keyed by the
/// manifest aliases `rewritten.sql` asked for. The returned rows are keyed
/// by each SELECT item's label (its `AS` alias, or `slot<i>` if it had
/// none) and are already filtered, decrypted, and sorted.
pub fn reassemble(rewritten: &RewrittenQuery, keys: &TableKeys, rows: &[Map<String, Value>]) -> Result<Vec<Map<String, Value>>, EbqError> {
    let decoded_rows = rows.iter().map(|raw| decode_row(rewritten, keys, raw)).collect::<Result<Vec<_>, _>>()?;

    let mut kept: Vec<(Map<String, Value>, Row)> = Vec::with_capacity(decoded_rows.len());
    for (raw, row) in rows.iter().zip(decoded_rows) {
        if passes_residual(&rewritten.residual_predicates, &row)? {
            kept.push((raw.clone(), row));
        }
    }

    order::sort_rows(&mut kept, &rewritten.residual_order, |(_, row), field| row.get(field).cloned().unwrap_or(Value::Null));

    // A client-computed bare aggregation (e.g. `MIN(Make)` over a pseudonym
    // column) reduces across every row this query matched, same as a SQL
    // aggregate with no GROUP BY collapses its whole input to one row.
    // Mixing one into a SELECT list whose other items are per-row is not
    // something a real GROUP BY would allow either; here the non-aggregate
    // items of that output row just take the first matched row's values.
    let aggregate_labels: Vec<&str> = rewritten
        .projections
        .iter()
        .filter_map(|p| match p {
            Projection::ClientComputed { postfix, fetch, label } if is_bare_aggregation(postfix, fetch) => Some(label.as_str()),
            _ => None,
        })
        .collect();

    if !aggregate_labels.is_empty() {
        let mut out_row = Map::new();
        for projection in &rewritten.projections {
            let label = projection_label(projection);
            if aggregate_labels.contains(&label) {
                let Projection::ClientComputed { postfix, fetch, .. } = projection else { unreachable!("filtered above") };
                let (func, distinct) = bare_aggregation(postfix).expect("checked by is_bare_aggregation");
                let (_, col) = &fetch[0];
                let values = kept.iter().map(|(_, row)| row.get(&col.name).cloned().unwrap_or(Value::Null)).collect();
                out_row.insert(label.to_string(), residual::reduce_aggregate(func, distinct, values)?);
            } else {
                let first = kept.first();
                out_row.insert(label.to_string(), project_one(projection, first.map(|(r, _)| r), first.map(|(_, row)| row), keys)?);
            }
        }
        return Ok(vec![out_row]);
    }

    kept.iter().map(|(raw, row)| project_row(&rewritten.projections, raw, row, keys)).collect()
}

fn decode_row(rewritten: &RewrittenQuery, keys: &TableKeys, raw: &Map<String, Value>) -> Result<Row, EbqError> {
    let mut row = Row::new();
    let mut insert = |alias: &str, col: &ColumnDescriptor| -> Result<(), EbqError> {
        let v = raw.get(alias).cloned().unwrap_or(Value::Null);
        row.insert(col.name.clone(), decode::decode_leaf(col, &v, keys)?);
        Ok(())
    };

    for projection in &rewritten.projections {
        match projection {
            Projection::Column { alias, column, .. } => insert(alias, column)?,
            Projection::ClientComputed { fetch, .. } => {
                for (alias, col) in fetch {
                    insert(alias, col)?;
                }
            }
            _ => {}
        }
    }
    for f in rewritten.order_key_fetch.iter().chain(&rewritten.predicate_fetch) {
        insert(&f.alias, &f.column)?;
    }
    Ok(row)
}

fn passes_residual(predicates: &[ResidualPredicate], row: &Row) -> Result<bool, EbqError> {
    for p in predicates {
        match residual::evaluate_row(&p.postfix, row)? {
            Value::Bool(true) => continue,
            Value::Bool(false) | Value::Null => return Ok(false),
            other => return Err(EbqError::Format(format!("{other}: WHERE/HAVING must evaluate to a boolean"))),
        }
    }
    Ok(true)
}

fn is_bare_aggregation(postfix: &[Token], fetch: &[(String, ColumnDescriptor)]) -> bool {
    fetch.len() == 1 && bare_aggregation(postfix).is_some()
}

fn bare_aggregation(postfix: &[Token]) -> Option<(AggregationFn, bool)> {
    match postfix {
        [Token::Field(_), Token::AggregationFn { func, distinct, .. }] => Some((*func, *distinct)),
        _ => None,
    }
}

fn projection_label(p: &Projection) -> &str {
    match p {
        Projection::Column { label, .. }
        | Projection::CountStar { label, .. }
        | Projection::ServerAggregation { label, .. }
        | Projection::HomomorphicSum { label, .. }
        | Projection::HomomorphicAvg { label, .. }
        | Projection::ClientComputed { label, .. } => label,
    }
}

fn project_row(projections: &[Projection], raw: &Map<String, Value>, row: &Row, keys: &TableKeys) -> Result<Map<String, Value>, EbqError> {
    let mut out = Map::new();
    for p in projections {
        out.insert(projection_label(p).to_string(), project_one(p, Some(raw), Some(row), keys)?);
    }
    Ok(out)
}

fn project_one(p: &Projection, raw: Option<&Map<String, Value>>, row: Option<&HashMap<String, Value>>, keys: &TableKeys) -> Result<Value, EbqError> {
    match p {
        Projection::Column { column, .. } => Ok(row.and_then(|r| r.get(&column.name)).cloned().unwrap_or(Value::Null)),
        Projection::CountStar { alias, .. } | Projection::ServerAggregation { alias, .. } => {
            Ok(raw.and_then(|r| r.get(alias)).cloned().unwrap_or(Value::Null))
        }
        Projection::HomomorphicSum { alias, ty, .. } => match raw.and_then(|r| r.get(alias)) {
            Some(v) if !v.is_null() => decode::decode_homomorphic(keys, *ty, v),
            _ => Ok(Value::Null),
        },
        Projection::HomomorphicAvg { sum_alias, count_alias, ty, .. } => {
            let sum = raw.and_then(|r| r.get(sum_alias));
            let count = raw.and_then(|r| r.get(count_alias)).and_then(|v| v.as_i64());
            match (sum, count) {
                (Some(sum), Some(count)) if !sum.is_null() && count > 0 => {
                    let sum = decode::decode_homomorphic(keys, *ty, sum)?;
                    let sum = sum.as_f64().ok_or_else(|| EbqError::Format(format!("{sum}: expected a numeric PAILLIER_SUM result")))?;
                    Ok(Value::from(sum / count as f64))
                }
                _ => Ok(Value::Null),
            }
        }
        Projection::ClientComputed { postfix, .. } => match row {
            Some(r) => residual::evaluate_row(postfix, r),
            None => Ok(Value::Null),
        },
    }
}
