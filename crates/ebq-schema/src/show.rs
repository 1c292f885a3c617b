//! The `show` command's schema view.
//!
//! A table's stored extended schema carries the real type and encryption
//! mode of every column, but `show` is meant to describe what a caller sees
//! at query time, not the ingest-time configuration: any encrypted leaf
//! displays as an opaque `ciphertext` column under its plain name, the same
//! way the original tool swaps a wire-prefixed field name back to its bare
//! form and its type to `CIPHERTEXT`.

use serde::Serialize;

use crate::column::{ColumnDescriptor, ColumnType, EncryptMode, Mode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<ShowField>>,
}

/// Rewrites `columns` into the shape a `show` caller should see.
pub fn show_schema(columns: &[ColumnDescriptor]) -> Vec<ShowField> {
    columns.iter().map(show_field).collect()
}

fn show_field(col: &ColumnDescriptor) -> ShowField {
    if col.ty == ColumnType::Record {
        let fields = col.fields.as_ref().map(|f| show_schema(f));
        return ShowField { name: col.name.clone(), ty: "record".to_string(), mode: col.mode, fields };
    }
    let ty = if col.encrypt == EncryptMode::None { column_type_name(col.ty).to_string() } else { "ciphertext".to_string() };
    ShowField { name: col.name.clone(), ty, mode: col.mode, fields: None }
}

fn column_type_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Integer => "integer",
        ColumnType::Float => "float",
        ColumnType::String => "string",
        ColumnType::Timestamp => "timestamp",
        ColumnType::Record => "record",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, ty: ColumnType, encrypt: EncryptMode) -> ColumnDescriptor {
        ColumnDescriptor { name: name.to_string(), ty, mode: Mode::Required, encrypt, fields: None, related: None, searchwords_separator: None, max_word_sequence: 5 }
    }

    #[test]
    fn unencrypted_column_keeps_its_declared_type() {
        let shown = show_schema(&[leaf("Year", ColumnType::Integer, EncryptMode::None)]);
        assert_eq!(shown[0].name, "Year");
        assert_eq!(shown[0].ty, "integer");
    }

    #[test]
    fn encrypted_column_shows_as_ciphertext_under_its_plain_name() {
        let shown = show_schema(&[leaf("Make", ColumnType::String, EncryptMode::Pseudonym)]);
        assert_eq!(shown[0].name, "Make");
        assert_eq!(shown[0].ty, "ciphertext");
    }

    #[test]
    fn record_fields_recurse() {
        let inner = vec![leaf("City", ColumnType::String, EncryptMode::Probabilistic)];
        let record = ColumnDescriptor {
            name: "Address".into(),
            ty: ColumnType::Record,
            mode: Mode::Required,
            encrypt: EncryptMode::None,
            fields: Some(inner),
            related: None,
            searchwords_separator: None,
            max_word_sequence: 5,
        };
        let shown = show_schema(&[record]);
        let fields = shown[0].fields.as_ref().unwrap();
        assert_eq!(fields[0].ty, "ciphertext");
    }
}
