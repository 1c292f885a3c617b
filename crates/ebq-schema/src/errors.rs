use thiserror::Error;

/// The stable, client-surfaced error kinds shared across the
/// downstream crates (`ebq-load`, `ebq-sql`, `ebq-rewrite`,
/// `ebq-reassemble`, `ebq-cli`) so a caller can match on one taxonomy
/// regardless of which component raised the error.
#[derive(Debug, Error)]
pub enum EbqError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("master key hash does not match the table's stored hash")]
    KeyMismatch,

    #[error("unrecognized table description version: {0}")]
    Version(String),

    #[error("invalid query ({fragment}): {reason}")]
    InvalidQuery { fragment: String, reason: String },

    #[error("decrypt error: {0}")]
    Decrypt(String),

    #[error("overflow: {0}")]
    Overflow(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("io error: {0}")]
    Io(String),
}

impl EbqError {
    pub fn invalid_query(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        EbqError::InvalidQuery { fragment: fragment.into(), reason: reason.into() }
    }
}

impl From<std::io::Error> for EbqError {
    fn from(e: std::io::Error) -> Self {
        EbqError::Io(e.to_string())
    }
}
