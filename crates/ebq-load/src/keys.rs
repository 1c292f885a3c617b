//! Table-scoped key bundle and the pre-write master-key/schema integrity
//! check.

use ebq_symcrypto::prf;
use zeroize::Zeroize;

use ebq_schema::{EbqError, ExtendedSchema, KeyRole, MasterKey};

const DERIVED_KEY_LEN: usize = 16;

pub struct TableKeys {
    pub probabilistic: Vec<u8>,
    pseudonym_default: Vec<u8>,
    pub homomorphic: Vec<u8>,
    pub stringhash: Vec<u8>,
    /// Kept only to derive `related`-group pseudonym keys on demand
    ///.
    master_key_bytes: Vec<u8>,
}

impl Drop for TableKeys {
    fn drop(&mut self) {
        self.probabilistic.zeroize();
        self.pseudonym_default.zeroize();
        self.homomorphic.zeroize();
        self.stringhash.zeroize();
        self.master_key_bytes.zeroize();
    }
}

impl TableKeys {
    pub fn derive(master_key: &MasterKey, table_id: &str) -> Self {
        TableKeys {
            probabilistic: master_key.derive_table_key(KeyRole::Probabilistic, table_id),
            pseudonym_default: master_key.derive_table_key(KeyRole::Pseudonym, table_id),
            homomorphic: master_key.derive_table_key(KeyRole::Homomorphic, table_id),
            stringhash: master_key.derive_table_key(KeyRole::Stringhash, table_id),
            master_key_bytes: master_key.as_bytes().to_vec(),
        }
    }

    /// The pseudonym key a leaf should encrypt under: the table-scoped key
    /// normally, or the shared `related`-group key when the column names
    /// one.
    pub fn pseudonym_key(&self, related: Option<&str>) -> Vec<u8> {
        match related {
            Some(r) => prf(&self.master_key_bytes, format!("pseudonym_{r}").as_bytes(), DERIVED_KEY_LEN),
            None => self.pseudonym_default.clone(),
        }
    }
}

/// The record stored alongside a table's wire schema so a later `load`
/// call can verify it's using the right master key against the right
/// extended schema before encrypting a single row.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableDescription {
    pub version: String,
    pub table_hash: String,
    pub created_ms: u64,
    pub schema: ExtendedSchema,
    /// The free-text `<user_description>` a caller attaches on `mk`/`update`
    ///; carried as a plain field rather than packed into the
    /// literal `||`-joined wire string, which belongs to the table
    /// service's own encoding.
    #[serde(default)]
    pub description: String,
}

impl TableDescription {
    pub const CURRENT_VERSION: &'static str = "1.0";

    pub fn new(master_key: &MasterKey, created_ms: u64, schema: ExtendedSchema, description: String) -> Self {
        TableDescription { version: Self::CURRENT_VERSION.to_string(), table_hash: master_key.table_hash(), created_ms, schema, description }
    }

    /// Fails with [`EbqError::KeyMismatch`] or [`EbqError::Version`] rather
    /// than silently encrypting against the wrong key, and with
    /// [`EbqError::Schema`] if the caller's extended schema has drifted
    /// from the one the table was created with.
    pub fn verify(&self, master_key: &MasterKey, expected_schema: &ExtendedSchema) -> Result<(), EbqError> {
        if self.version != Self::CURRENT_VERSION {
            return Err(EbqError::Version(self.version.clone()));
        }
        if self.table_hash != master_key.table_hash() {
            return Err(EbqError::KeyMismatch);
        }
        if &self.schema != expected_schema {
            return Err(EbqError::Schema("extended schema does not match the table's stored schema".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebq_schema::{ColumnDescriptor, ColumnType, EncryptMode, Mode};

    fn schema() -> ExtendedSchema {
        ExtendedSchema(vec![ColumnDescriptor {
            name: "Make".into(),
            ty: ColumnType::String,
            mode: Mode::Required,
            encrypt: EncryptMode::Pseudonym,
            fields: None,
            related: None,
            searchwords_separator: None,
            max_word_sequence: 5,
        }])
    }

    #[test]
    fn verify_passes_with_matching_key_and_schema() {
        let mk = MasterKey::from_bytes(vec![3; 32]);
        let desc = TableDescription::new(&mk, 1_700_000_000_000, schema(), String::new());
        assert!(desc.verify(&mk, &schema()).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_master_key() {
        let mk = MasterKey::from_bytes(vec![3; 32]);
        let desc = TableDescription::new(&mk, 1_700_000_000_000, schema(), String::new());
        let wrong = MasterKey::from_bytes(vec![4; 32]);
        assert!(matches!(desc.verify(&wrong, &schema()), Err(EbqError::KeyMismatch)));
    }

    #[test]
    fn verify_rejects_drifted_schema() {
        let mk = MasterKey::from_bytes(vec![3; 32]);
        let desc = TableDescription::new(&mk, 1_700_000_000_000, schema(), String::new());
        let ExtendedSchema(mut cols) = schema();
        cols[0].encrypt = EncryptMode::Probabilistic;
        assert!(matches!(desc.verify(&mk, &ExtendedSchema(cols)), Err(EbqError::Schema(_))));
    }
}
