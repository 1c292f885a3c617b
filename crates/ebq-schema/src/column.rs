use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Timestamp,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Required,
    Nullable,
    Repeated,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Required
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptMode {
    None,
    Probabilistic,
    Pseudonym,
    Searchwords,
    ProbabilisticSearchwords,
    Homomorphic,
}

impl Default for EncryptMode {
    fn default() -> Self {
        EncryptMode::None
    }
}

pub(crate) fn default_max_word_sequence() -> u32 {
    5
}

/// One entry of the extended schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub encrypt: EncryptMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<ColumnDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchwords_separator: Option<String>,
    #[serde(default = "default_max_word_sequence")]
    pub max_word_sequence: u32,
}

impl ColumnDescriptor {
    pub fn is_leaf(&self) -> bool {
        self.ty != ColumnType::Record
    }
}
