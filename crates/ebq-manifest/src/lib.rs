//! Per-query column aliasing and response-statistics bookkeeping.
//!
//! Server-side table services generally tolerate dotted/prefixed column
//! names poorly in a `SELECT ... AS` clause, so the rewriter assigns every
//! projected column a short, collision-resistant alias derived from the
//! query's id and the column's wire name. `Manifest` is the map back from
//! those aliases to the plaintext names `ebq-reassemble` reports to the
//! caller.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("alias {0:?} is not registered in this manifest")]
    UnknownAlias(String),
}

/// `"HP" || hex(sha256(query_uuid || column_name))`.
pub fn make_alias(query_uuid: &str, column_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query_uuid.as_bytes());
    hasher.update(column_name.as_bytes());
    format!("HP{}", hex::encode(hasher.finalize()))
}

/// The alias table built while lowering a single query's projection list.
///
/// Aliases are single-valued (one alias names exactly one column), but a
/// column may be projected more than once under distinct expressions (e.g.
/// `SELECT Make, UPPER(Make)`); repeats of the *same* underlying column
/// name beyond the first registration are tracked in `extras` rather than
/// rejected, so reassembly can still locate the canonical decoder for them.
#[derive(Debug, Default, Clone)]
pub struct Manifest {
    query_uuid: String,
    alias_to_name: HashMap<String, String>,
    extras: HashMap<String, Vec<String>>,
}

impl Manifest {
    pub fn new(query_uuid: impl Into<String>) -> Self {
        Manifest { query_uuid: query_uuid.into(), alias_to_name: HashMap::new(), extras: HashMap::new() }
    }

    /// Registers `column_name` for projection, returning the alias the
    /// rewritten server SQL should `AS` it under. Safe to call more than
    /// once for the same column name; each call mints a fresh alias since
    /// the alias is scoped to the *expression slot*, not the column alone
    /// - callers pass a distinct `slot` per projected expression.
    pub fn register(&mut self, slot: &str, column_name: &str) -> String {
        let alias = make_alias(&self.query_uuid, slot);
        if let Some(existing) = self.alias_to_name.get(&alias) {
            if existing != column_name {
                self.extras.entry(alias.clone()).or_default().push(column_name.to_string());
            }
            return alias;
        }
        self.alias_to_name.insert(alias.clone(), column_name.to_string());
        alias
    }

    pub fn resolve(&self, alias: &str) -> Result<&str, ManifestError> {
        self.alias_to_name.get(alias).map(String::as_str).ok_or_else(|| ManifestError::UnknownAlias(alias.to_string()))
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.alias_to_name.iter().map(|(a, n)| (a.as_str(), n.as_str()))
    }

    pub fn extras_for(&self, alias: &str) -> &[String] {
        self.extras.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Statistics a table service reports back after a `load`/`update` call.
/// Field is `recordsWritten` on the wire (camelCase, matching the table
/// service's response body) but `records_written` in Rust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ResponseStats {
    #[serde(rename = "recordsWritten")]
    pub records_written: u64,
}
