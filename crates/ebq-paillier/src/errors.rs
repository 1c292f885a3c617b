use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaillierError {
    #[error("int64 plaintext overflowed its 96-bit sign-extended guard bits")]
    Int64Overflow,
    #[error("at most {limit} int64 values fit in a packed ciphertext, got {got}")]
    PackingLimitExceeded { limit: usize, got: usize },
    #[error("float plaintext exponent {0} exceeds the representable bound of 389")]
    FloatExponentOverflow(i32),
}
