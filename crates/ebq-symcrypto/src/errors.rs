use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("requested {0} random bytes, must be positive")]
    InvalidLength(i64),
    #[error("AES key must be 16, 24, or 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("ciphertext is shorter than the 16-byte IV it must carry")]
    Truncated,
    #[error("ciphertext padding is invalid")]
    InvalidPadding,
}
