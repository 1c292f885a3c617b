use rand_core::RngCore;

use crate::errors::CryptoError;

/// Draws `n` bytes from the OS CSPRNG. Fails for `n <= 0`.
pub fn get_rand_bytes(n: i64) -> Result<Vec<u8>, CryptoError> {
    if n <= 0 {
        return Err(CryptoError::InvalidLength(n));
    }
    let mut buf = vec![0u8; n as usize];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_lengths() {
        assert!(get_rand_bytes(0).is_err());
        assert!(get_rand_bytes(-1).is_err());
    }

    #[test]
    fn returns_requested_length() {
        assert_eq!(get_rand_bytes(32).unwrap().len(), 32);
    }
}
