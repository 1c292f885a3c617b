//! Wire-schema prefixes and `RewriteSchema`.
//!
//! The five leaf prefixes are load-bearing wire identifiers, not display
//! strings: once a table is created under one of these names the server's
//! column name is fixed, so the constants below must never change shape.

pub const PREFIX_PROBABILISTIC: &str = "DS_PROBABILISTIC_";
pub const PREFIX_PSEUDONYM: &str = "DS_PSEUDONYM_";
pub const PREFIX_SEARCHWORDS: &str = "DS_SEARCHWORDS_";
pub const PREFIX_HOMOMORPHIC_INT: &str = "DS_HOMOMORPHIC_INT_";
pub const PREFIX_HOMOMORPHIC_FLOAT: &str = "DS_HOMOMORPHIC_FLOAT_";

/// Substitutes `.` in nested identifiers when a manifest (`ebq-manifest`)
/// is not in use, so a dotted path survives services that rewrite bare
/// dots in column references.
pub const PERIOD_REPLACEMENT: &str = "_DOT_";

use crate::column::{ColumnDescriptor, ColumnType, EncryptMode};

/// Renames and retypes every leaf field of `schema` according to its
/// `encrypt` mode, producing the schema actually pushed to the table
/// service. `probabilistic_searchwords` leaves split into two columns.
pub fn rewrite_schema(columns: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
    let mut out = Vec::with_capacity(columns.len());
    for col in columns {
        rewrite_column(col, &mut out);
    }
    out
}

fn rewrite_column(col: &ColumnDescriptor, out: &mut Vec<ColumnDescriptor>) {
    if col.ty == ColumnType::Record {
        let fields = col.fields.as_ref().map(|f| rewrite_schema(f));
        out.push(ColumnDescriptor { fields, ..col.clone() });
        return;
    }

    match col.encrypt {
        EncryptMode::None => out.push(col.clone()),
        EncryptMode::Probabilistic => out.push(prefixed(col, PREFIX_PROBABILISTIC)),
        EncryptMode::Pseudonym => {
            let mut renamed = prefixed(col, PREFIX_PSEUDONYM);
            renamed.related = None;
            out.push(renamed);
        }
        EncryptMode::Searchwords => {
            let mut renamed = prefixed(col, PREFIX_SEARCHWORDS);
            renamed.searchwords_separator = None;
            renamed.max_word_sequence = crate::column::default_max_word_sequence();
            out.push(renamed);
        }
        EncryptMode::Homomorphic => {
            let prefix = if col.ty == ColumnType::Integer { PREFIX_HOMOMORPHIC_INT } else { PREFIX_HOMOMORPHIC_FLOAT };
            out.push(prefixed(col, prefix));
        }
        EncryptMode::ProbabilisticSearchwords => {
            let mut searchwords = prefixed(col, PREFIX_SEARCHWORDS);
            searchwords.searchwords_separator = None;
            searchwords.max_word_sequence = crate::column::default_max_word_sequence();
            out.push(searchwords);
            out.push(prefixed(col, PREFIX_PROBABILISTIC));
        }
    }
}

fn prefixed(col: &ColumnDescriptor, prefix: &str) -> ColumnDescriptor {
    ColumnDescriptor {
        name: format!("{prefix}{}", col.name),
        ty: ColumnType::String,
        mode: col.mode,
        encrypt: EncryptMode::None,
        fields: None,
        related: col.related.clone(),
        searchwords_separator: col.searchwords_separator.clone(),
        max_word_sequence: col.max_word_sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Mode;

    fn leaf(name: &str, ty: ColumnType, encrypt: EncryptMode) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            ty,
            mode: Mode::Required,
            encrypt,
            fields: None,
            related: None,
            searchwords_separator: None,
            max_word_sequence: 5,
        }
    }

    #[test]
    fn pseudonym_gets_h_prefix_and_string_type() {
        let rewritten = rewrite_schema(&[leaf("Make", ColumnType::String, EncryptMode::Pseudonym)]);
        assert_eq!(rewritten[0].name, "DS_PSEUDONYM_Make");
        assert_eq!(rewritten[0].ty, ColumnType::String);
    }

    #[test]
    fn homomorphic_int_vs_float_prefixes_differ() {
        let r = rewrite_schema(&[
            leaf("Invoice_Price", ColumnType::Integer, EncryptMode::Homomorphic),
            leaf("Holdback_Percentage", ColumnType::Float, EncryptMode::Homomorphic),
        ]);
        assert_eq!(r[0].name, "DS_HOMOMORPHIC_INT_Invoice_Price");
        assert_eq!(r[1].name, "DS_HOMOMORPHIC_FLOAT_Holdback_Percentage");
    }

    #[test]
    fn probabilistic_searchwords_splits_into_two_columns_searchwords_first() {
        let r = rewrite_schema(&[leaf("Description", ColumnType::String, EncryptMode::ProbabilisticSearchwords)]);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].name, "DS_SEARCHWORDS_Description");
        assert_eq!(r[1].name, "DS_PROBABILISTIC_Description");
    }

    #[test]
    fn rewrite_is_idempotent_on_its_own_output() {
        let once = rewrite_schema(&[leaf("Make", ColumnType::String, EncryptMode::Pseudonym)]);
        let twice = rewrite_schema(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn searchwords_rewrite_drops_separator_and_max_word_sequence() {
        let mut col = leaf("Description", ColumnType::String, EncryptMode::Searchwords);
        col.searchwords_separator = Some(",".to_string());
        col.max_word_sequence = 9;
        let r = rewrite_schema(&[col]);
        assert_eq!(r[0].searchwords_separator, None);
        assert_eq!(r[0].max_word_sequence, 5);
    }

    #[test]
    fn probabilistic_searchwords_rewrite_drops_separator_and_max_word_sequence() {
        let mut col = leaf("Description", ColumnType::String, EncryptMode::ProbabilisticSearchwords);
        col.searchwords_separator = Some(",".to_string());
        col.max_word_sequence = 9;
        let r = rewrite_schema(&[col]);
        assert_eq!(r[0].searchwords_separator, None);
        assert_eq!(r[0].max_word_sequence, 5);
    }

    #[test]
    fn unencrypted_columns_pass_through_unchanged() {
        let r = rewrite_schema(&[leaf("Year", ColumnType::Integer, EncryptMode::None)]);
        assert_eq!(r[0].name, "Year");
        assert_eq!(r[0].ty, ColumnType::Integer);
    }
}
