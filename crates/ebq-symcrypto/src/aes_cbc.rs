use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use rand_core::RngCore;

use crate::errors::CryptoError;

const IV_LEN: usize = 16;

/// AES-CBC with PKCS#5 padding (PKCS#5 and PKCS#7 padding coincide at the
/// AES block size of 16 bytes). Key length selects AES-128/192/256.
pub struct AesCbc {
    key: Vec<u8>,
}

impl AesCbc {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let key = key.into();
        match key.len() {
            16 | 24 | 32 => Ok(Self { key }),
            other => Err(CryptoError::InvalidKeyLength(other)),
        }
    }

    /// Encrypts `plaintext`. If `iv` is `None` a fresh random IV is drawn
    /// and the return value is `iv || ciphertext`; if `iv` is supplied the
    /// return value is the ciphertext alone.
    pub fn encrypt(&self, plaintext: &[u8], iv: Option<[u8; IV_LEN]>) -> Vec<u8> {
        let (iv_bytes, prepend_iv) = match iv {
            Some(iv) => (iv, false),
            None => {
                let mut iv = [0u8; IV_LEN];
                rand::rngs::OsRng.fill_bytes(&mut iv);
                (iv, true)
            }
        };
        let ciphertext = self.encrypt_with_iv(plaintext, &iv_bytes);
        if prepend_iv {
            let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
            out.extend_from_slice(&iv_bytes);
            out.extend_from_slice(&ciphertext);
            out
        } else {
            ciphertext
        }
    }

    /// Decrypts `ciphertext`. If `iv` is `None`, the first 16 bytes of
    /// `ciphertext` are consumed as the IV.
    pub fn decrypt(&self, ciphertext: &[u8], iv: Option<[u8; IV_LEN]>) -> Result<Vec<u8>, CryptoError> {
        let (iv_bytes, body) = match iv {
            Some(iv) => (iv, ciphertext),
            None => {
                if ciphertext.len() < IV_LEN {
                    return Err(CryptoError::Truncated);
                }
                let mut iv = [0u8; IV_LEN];
                iv.copy_from_slice(&ciphertext[..IV_LEN]);
                (iv, &ciphertext[IV_LEN..])
            }
        };
        self.decrypt_with_iv(body, &iv_bytes)
    }

    fn encrypt_with_iv(&self, plaintext: &[u8], iv: &[u8; IV_LEN]) -> Vec<u8> {
        match self.key.len() {
            16 => cbc::Encryptor::<Aes128>::new_from_slices(&self.key, iv)
                .expect("validated key/iv length")
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            24 => cbc::Encryptor::<Aes192>::new_from_slices(&self.key, iv)
                .expect("validated key/iv length")
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            32 => cbc::Encryptor::<Aes256>::new_from_slices(&self.key, iv)
                .expect("validated key/iv length")
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            _ => unreachable!("key length validated in new()"),
        }
    }

    fn decrypt_with_iv(&self, ciphertext: &[u8], iv: &[u8; IV_LEN]) -> Result<Vec<u8>, CryptoError> {
        let result = match self.key.len() {
            16 => cbc::Decryptor::<Aes128>::new_from_slices(&self.key, iv)
                .expect("validated key/iv length")
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            24 => cbc::Decryptor::<Aes192>::new_from_slices(&self.key, iv)
                .expect("validated key/iv length")
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            32 => cbc::Decryptor::<Aes256>::new_from_slices(&self.key, iv)
                .expect("validated key/iv length")
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            _ => unreachable!("key length validated in new()"),
        };
        result.map_err(|_| CryptoError::InvalidPadding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_random_iv() {
        let cipher = AesCbc::new(vec![0u8; 16]).unwrap();
        let plaintext = b"the quick brown fox jumps over";
        let ciphertext = cipher.encrypt(plaintext, None);
        assert_eq!(cipher.decrypt(&ciphertext, None).unwrap(), plaintext);
    }

    #[test]
    fn zero_iv_is_deterministic() {
        let cipher = AesCbc::new(vec![1u8; 32]).unwrap();
        let zero_iv = [0u8; 16];
        let a = cipher.encrypt(b"Ford", Some(zero_iv));
        let b = cipher.encrypt(b"Ford", Some(zero_iv));
        assert_eq!(a, b);
    }

    #[test]
    fn random_iv_is_probabilistic() {
        let cipher = AesCbc::new(vec![2u8; 24]).unwrap();
        let a = cipher.encrypt(b"same plaintext", None);
        let b = cipher.encrypt(b"same plaintext", None);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(AesCbc::new(vec![0u8; 10]).is_err());
    }

    #[test]
    fn detects_corrupted_padding() {
        let cipher = AesCbc::new(vec![0u8; 16]).unwrap();
        let mut ciphertext = cipher.encrypt(b"abc", None);
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(cipher.decrypt(&ciphertext, None).is_err());
    }
}
