//! Client-side sort over decoded rows: ORDER BY is never
//! pushed to the server, so every key is enforced here once every row's
//! values are decrypted. "Keys are applied in reverse priority" - a
//! stable sort on the last key, then a stable sort on the next-to-last,
//! and so on, leaves the first key as the dominant ordering.

use ebq_rewrite::ResidualOrder;
use ebq_sql::SortDirection;
use serde_json::Value;
use std::cmp::Ordering;

/// Sorts `rows` in place by `keys`, each resolved against a row through
/// `value_of`.
pub fn sort_rows<T>(rows: &mut [T], keys: &[ResidualOrder], value_of: impl Fn(&T, &str) -> Value) {
    for key in keys.iter().rev() {
        rows.sort_by(|a, b| {
            let ord = compare(&value_of(a, &key.field), &value_of(b, &key.field));
            match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
}

/// NULLs sort last regardless of direction's reversal, matching common SQL
/// `ORDER BY ... NULLS LAST` behavior without requiring an explicit clause.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_ascending_with_nulls_last() {
        let mut rows = vec![("a", Value::from(3)), ("b", Value::Null), ("c", Value::from(1))];
        let keys = vec![ResidualOrder { field: "v".into(), direction: SortDirection::Asc }];
        sort_rows(&mut rows, &keys, |r, _| r.1.clone());
        assert_eq!(rows.iter().map(|r| r.0).collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn reverse_priority_means_first_key_dominates() {
        let mut rows = vec![("a", 1, 2), ("b", 1, 1), ("c", 0, 9)];
        let keys = vec![
            ResidualOrder { field: "first".into(), direction: SortDirection::Asc },
            ResidualOrder { field: "second".into(), direction: SortDirection::Asc },
        ];
        sort_rows(&mut rows, &keys, |r, field| if field == "first" { Value::from(r.1) } else { Value::from(r.2) });
        assert_eq!(rows.iter().map(|r| r.0).collect::<Vec<_>>(), vec!["c", "b", "a"]);
    }
}
