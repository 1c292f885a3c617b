//! Per-column decode: the inverse of `ebq-load`'s row encryption. Given a
//! single server response row (a flat JSON object keyed by manifest alias)
//! and a [`ColumnDescriptor`], recovers the plaintext `serde_json::Value`
//! a caller actually asked for.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{TimeZone, Utc};
use ebq_load::TableKeys;
use ebq_paillier::{keypair_from_seed, Cipher};
use ebq_schema::{ColumnDescriptor, ColumnType, EbqError, EncryptMode};
use ebq_symcrypto::AesCbc;
use num_bigint::BigUint;
use serde_json::Value;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Decodes one wire value for `col`, given the raw JSON the server
/// returned for its alias. `null` survives every encryption mode.
pub fn decode_leaf(col: &ColumnDescriptor, raw: &Value, keys: &TableKeys) -> Result<Value, EbqError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    match col.encrypt {
        EncryptMode::Searchwords => Err(EbqError::invalid_query(&col.name, "searchwords columns have no decryptable wire form")),
        EncryptMode::None => decode_plain(col.ty, raw),
        EncryptMode::Probabilistic | EncryptMode::ProbabilisticSearchwords => {
            let cipher = AesCbc::new(keys.probabilistic.clone()).map_err(|e| EbqError::Decrypt(e.to_string()))?;
            decode_encrypted_scalar(&cipher, None, col.ty, raw)
        }
        EncryptMode::Pseudonym => {
            let cipher = AesCbc::new(keys.pseudonym_key(col.related.as_deref())).map_err(|e| EbqError::Decrypt(e.to_string()))?;
            decode_encrypted_scalar(&cipher, Some(ZERO_IV), col.ty, raw)
        }
        EncryptMode::Homomorphic => decode_homomorphic(keys, col.ty, raw),
    }
}

fn decode_plain(ty: ColumnType, raw: &Value) -> Result<Value, EbqError> {
    match ty {
        ColumnType::Timestamp => {
            let ms = raw.as_i64().ok_or_else(|| EbqError::Format(format!("expected an integer timestamp, got {raw}")))?;
            Ok(Value::String(format_timestamp(ms)?))
        }
        _ => Ok(raw.clone()),
    }
}

/// Canonical form: `"YYYY-MM-DD HH:MM:SS UTC"`.
fn format_timestamp(epoch_ms: i64) -> Result<String, EbqError> {
    let dt = Utc.timestamp_millis_opt(epoch_ms).single().ok_or_else(|| EbqError::Format(format!("out-of-range timestamp: {epoch_ms}")))?;
    Ok(dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn decode_encrypted_scalar(cipher: &AesCbc, iv: Option<[u8; 16]>, ty: ColumnType, raw: &Value) -> Result<Value, EbqError> {
    let b64 = raw.as_str().ok_or_else(|| EbqError::Format(format!("expected a base64 string, got {raw}")))?;
    let ciphertext = BASE64.decode(b64).map_err(|e| EbqError::Decrypt(e.to_string()))?;
    let plaintext = cipher.decrypt(&ciphertext, iv).map_err(|e| EbqError::Decrypt(e.to_string()))?;
    scalar_from_bytes(ty, &plaintext)
}

fn scalar_from_bytes(ty: ColumnType, bytes: &[u8]) -> Result<Value, EbqError> {
    let s = std::str::from_utf8(bytes).map_err(|e| EbqError::Decrypt(e.to_string()))?;
    match ty {
        ColumnType::String => Ok(Value::String(s.to_string())),
        ColumnType::Integer => s.parse::<i64>().map(Value::from).map_err(|e| EbqError::Decrypt(e.to_string())),
        ColumnType::Float => s.parse::<f64>().map(Value::from).map_err(|e| EbqError::Decrypt(e.to_string())),
        ColumnType::Timestamp | ColumnType::Record => Err(EbqError::Schema(format!("{s}: not an encryptable scalar type"))),
    }
}

pub(crate) fn decode_homomorphic(keys: &TableKeys, ty: ColumnType, raw: &Value) -> Result<Value, EbqError> {
    let ciphertext = decode_ciphertext(raw)?;
    let cipher = Cipher::new(keypair_from_seed(&keys.homomorphic));
    match ty {
        ColumnType::Integer => cipher.decrypt_int64(&ciphertext).map(Value::from).map_err(|e| EbqError::Overflow(e.to_string())),
        ColumnType::Float => Ok(Value::from(cipher.decrypt_float(&ciphertext))),
        _ => Err(EbqError::Schema(format!("{ty:?}: homomorphic encryption requires an integer or float column"))),
    }
}

pub(crate) fn decode_ciphertext(raw: &Value) -> Result<BigUint, EbqError> {
    let b64 = raw.as_str().ok_or_else(|| EbqError::Format(format!("expected a base64 ciphertext, got {raw}")))?;
    let bytes = BASE64.decode(b64).map_err(|e| EbqError::Decrypt(e.to_string()))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebq_schema::{MasterKey, Mode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn leaf(name: &str, ty: ColumnType, encrypt: EncryptMode) -> ColumnDescriptor {
        ColumnDescriptor { name: name.to_string(), ty, mode: Mode::Required, encrypt, fields: None, related: None, searchwords_separator: None, max_word_sequence: 5 }
    }

    fn test_keys() -> TableKeys {
        let mk = MasterKey::from_bytes(vec![42; 32]);
        TableKeys::derive(&mk, "cars_1700000000000")
    }

    #[test]
    fn plain_timestamp_formats_canonically() {
        let col = leaf("Sold_At", ColumnType::Timestamp, EncryptMode::None);
        let decoded = decode_leaf(&col, &Value::from(1_700_000_000_000i64), &test_keys()).unwrap();
        assert_eq!(decoded, Value::String("2023-11-14 22:13:20 UTC".to_string()));
    }

    #[test]
    fn pseudonym_round_trips_through_encode_and_decode() {
        let col = leaf("Make", ColumnType::String, EncryptMode::Pseudonym);
        let keys = test_keys();
        let cipher = AesCbc::new(keys.pseudonym_key(None)).unwrap();
        let ct = cipher.encrypt(b"Ford", Some(ZERO_IV));
        let raw = Value::from(BASE64.encode(ct));
        assert_eq!(decode_leaf(&col, &raw, &keys).unwrap(), Value::String("Ford".to_string()));
    }

    #[test]
    fn homomorphic_int_round_trips() {
        let col = leaf("Invoice_Price", ColumnType::Integer, EncryptMode::Homomorphic);
        let keys = test_keys();
        let cipher = Cipher::new(keypair_from_seed(&keys.homomorphic));
        let mut rng = StdRng::seed_from_u64(1);
        let ct = cipher.encrypt_int64(4300, &mut rng);
        let raw = Value::from(BASE64.encode(ct.to_bytes_be()));
        assert_eq!(decode_leaf(&col, &raw, &keys).unwrap(), Value::from(4300));
    }

    #[test]
    fn searchwords_column_cannot_be_decoded() {
        let col = leaf("Description", ColumnType::String, EncryptMode::Searchwords);
        assert!(decode_leaf(&col, &Value::from("anything"), &test_keys()).is_err());
    }

    #[test]
    fn null_passes_through_every_mode() {
        let col = leaf("Make", ColumnType::String, EncryptMode::Pseudonym);
        assert_eq!(decode_leaf(&col, &Value::Null, &test_keys()).unwrap(), Value::Null);
    }
}
