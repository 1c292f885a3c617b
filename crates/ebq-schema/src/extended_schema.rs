use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::column::{ColumnDescriptor, ColumnType, EncryptMode, Mode};
use crate::errors::EbqError;

/// An ordered sequence of column descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedSchema(pub Vec<ColumnDescriptor>);

impl ExtendedSchema {
    pub fn validate(&self) -> Result<(), EbqError> {
        let mut seen_leaf_names = HashSet::new();
        for col in &self.0 {
            validate_column(col, "", &mut seen_leaf_names)?;
        }
        Ok(())
    }
}

fn validate_column(col: &ColumnDescriptor, path_prefix: &str, seen_leaf_names: &mut HashSet<String>) -> Result<(), EbqError> {
    let qualified = if path_prefix.is_empty() { col.name.clone() } else { format!("{path_prefix}.{}", col.name) };

    if col.ty == ColumnType::Record {
        if col.encrypt != EncryptMode::None {
            return Err(EbqError::Schema(format!("{qualified}: record columns cannot carry an encrypt mode")));
        }
        let fields = col.fields.as_ref().ok_or_else(|| EbqError::Schema(format!("{qualified}: record type requires `fields`")))?;
        if fields.is_empty() {
            return Err(EbqError::Schema(format!("{qualified}: record `fields` must be non-empty")));
        }
        for child in fields {
            validate_column(child, &qualified, seen_leaf_names)?;
        }
        return Ok(());
    }

    if col.fields.is_some() {
        return Err(EbqError::Schema(format!("{qualified}: only record columns may carry `fields`")));
    }

    if col.ty == ColumnType::Timestamp && col.encrypt != EncryptMode::None {
        return Err(EbqError::Schema(format!("{qualified}: timestamp columns cannot be encrypted")));
    }

    let is_searchwords_like = matches!(col.encrypt, EncryptMode::Searchwords | EncryptMode::ProbabilisticSearchwords);
    if is_searchwords_like && col.ty != ColumnType::String {
        return Err(EbqError::Schema(format!("{qualified}: searchwords encryption requires type string")));
    }

    if col.encrypt == EncryptMode::Homomorphic && !matches!(col.ty, ColumnType::Integer | ColumnType::Float) {
        return Err(EbqError::Schema(format!("{qualified}: homomorphic encryption requires type integer or float")));
    }

    if col.related.is_some() && col.encrypt != EncryptMode::Pseudonym {
        return Err(EbqError::Schema(format!("{qualified}: `related` requires encrypt=pseudonym")));
    }

    if col.max_word_sequence == 0 {
        return Err(EbqError::Schema(format!("{qualified}: max_word_sequence must be positive")));
    }

    if !seen_leaf_names.insert(qualified.clone()) {
        return Err(EbqError::Schema(format!("{qualified}: duplicate leaf field name under the rewrite prefix rules")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDescriptor;

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
    fn accepts_a_well_formed_schema() {
        let schema = ExtendedSchema(vec![
            leaf("Make", ColumnType::String, EncryptMode::Pseudonym),
            leaf("Invoice_Price", ColumnType::Integer, EncryptMode::Homomorphic),
        ]);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn rejects_encrypted_timestamp() {
        let schema = ExtendedSchema(vec![leaf("CreatedAt", ColumnType::Timestamp, EncryptMode::Probabilistic)]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn rejects_searchwords_on_non_string() {
        let schema = ExtendedSchema(vec![leaf("Price", ColumnType::Integer, EncryptMode::Searchwords)]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn rejects_homomorphic_on_string() {
        let schema = ExtendedSchema(vec![leaf("Name", ColumnType::String, EncryptMode::Homomorphic)]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn rejects_related_without_pseudonym() {
        let mut col = leaf("Make", ColumnType::String, EncryptMode::Probabilistic);
        col.related = Some("cars_name".into());
        let schema = ExtendedSchema(vec![col]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn record_requires_fields_and_no_encryption() {
        let mut record = leaf("Address", ColumnType::Record, EncryptMode::None);
        record.fields = None;
        assert!(ExtendedSchema(vec![record.clone()]).validate().is_err());

        record.fields = Some(vec![leaf("City", ColumnType::String, EncryptMode::None)]);
        assert!(ExtendedSchema(vec![record]).validate().is_ok());

        let mut encrypted_record = leaf("Address", ColumnType::Record, EncryptMode::Probabilistic);
        encrypted_record.fields = Some(vec![leaf("City", ColumnType::String, EncryptMode::None)]);
        assert!(ExtendedSchema(vec![encrypted_record]).validate().is_err());
    }
}
