//! Row encryption: walks an [`ExtendedSchema`]-shaped tree alongside an
//! already-decoded JSON row and produces the row a table service's `load`
//! endpoint actually receives, with every leaf renamed and encrypted per
//! its `encrypt` mode.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ebq_paillier::{keypair_from_seed, Cipher};
use ebq_schema::{rewrite_schema, ColumnDescriptor, ColumnType, EbqError, EncryptMode, Mode};
use ebq_symcrypto::{
    searchwords::{encode_cell, field_iv},
    AesCbc,
};
use rand_core::RngCore;
use serde_json::{Map, Value};

use crate::keys::TableKeys;
use crate::timestamp::parse_timestamp;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Encrypts one row (a flat JSON object keyed by the *plaintext* schema's
/// column names) into the row shape the table service stores.
pub fn encode_row(
    schema: &[ColumnDescriptor],
    row: &Map<String, Value>,
    keys: &TableKeys,
    rng: &mut dyn RngCore,
) -> Result<Map<String, Value>, EbqError> {
    let mut out = Map::new();
    for col in schema {
        let value = row.get(&col.name).cloned().unwrap_or(Value::Null);
        encode_column(col, &value, keys, rng, &mut out)?;
    }
    Ok(out)
}

fn encode_column(col: &ColumnDescriptor, value: &Value, keys: &TableKeys, rng: &mut dyn RngCore, out: &mut Map<String, Value>) -> Result<(), EbqError> {
    if col.mode == Mode::Repeated {
        let items = match value {
            Value::Array(a) => a.clone(),
            Value::Null => Vec::new(),
            other => return Err(EbqError::Format(format!("{}: repeated field must be a JSON array, got {other}", col.name))),
        };
        if col.ty == ColumnType::Record {
            let fields = col.fields.as_ref().expect("validated: record columns carry fields");
            let mut encoded = Vec::with_capacity(items.len());
            for item in &items {
                let obj = item.as_object().ok_or_else(|| EbqError::Format(format!("{}: repeated record element must be an object", col.name)))?;
                encoded.push(Value::Object(encode_row(fields, obj, keys, rng)?));
            }
            out.insert(col.name.clone(), Value::Array(encoded));
        } else {
            if matches!(col.encrypt, EncryptMode::ProbabilisticSearchwords) {
                return Err(EbqError::Format(format!("{}: probabilistic_searchwords is not supported on repeated fields", col.name)));
            }
            let wire_name = rewrite_schema(std::slice::from_ref(col))[0].name.clone();
            let mut encoded = Vec::with_capacity(items.len());
            for item in &items {
                let mut pairs = encode_leaf(col, item, keys, rng)?;
                encoded.push(pairs.remove(0).1);
            }
            out.insert(wire_name, Value::Array(encoded));
        }
        return Ok(());
    }

    if col.ty == ColumnType::Record {
        let fields = col.fields.as_ref().expect("validated: record columns carry fields");
        let obj = match value {
            Value::Object(o) => o.clone(),
            Value::Null if col.mode == Mode::Nullable => Map::new(),
            other => return Err(EbqError::Format(format!("{}: record field must be an object, got {other}", col.name))),
        };
        out.insert(col.name.clone(), Value::Object(encode_row(fields, &obj, keys, rng)?));
        return Ok(());
    }

    if value.is_null() {
        if col.mode == Mode::Required {
            return Err(EbqError::Format(format!("{}: required field is missing", col.name)));
        }
        for wire in rewrite_schema(std::slice::from_ref(col)) {
            out.insert(wire.name, Value::Null);
        }
        return Ok(());
    }

    for (name, encoded) in encode_leaf(col, value, keys, rng)? {
        out.insert(name, encoded);
    }
    Ok(())
}

pub(crate) fn encode_leaf(col: &ColumnDescriptor, value: &Value, keys: &TableKeys, rng: &mut dyn RngCore) -> Result<Vec<(String, Value)>, EbqError> {
    let wire = rewrite_schema(std::slice::from_ref(col));

    match col.encrypt {
        EncryptMode::None => {
            let v = if col.ty == ColumnType::Timestamp {
                match parse_timestamp(value)? {
                    Some(ms) => Value::from(ms),
                    None => Value::Null,
                }
            } else {
                value.clone()
            };
            Ok(vec![(wire[0].name.clone(), v)])
        }
        EncryptMode::Probabilistic => {
            let cipher = AesCbc::new(keys.probabilistic.clone()).map_err(|e| EbqError::Format(e.to_string()))?;
            let plaintext = scalar_bytes(col.ty, value)?;
            let ct = cipher.encrypt(&plaintext, None);
            Ok(vec![(wire[0].name.clone(), Value::from(BASE64.encode(ct)))])
        }
        EncryptMode::Pseudonym => {
            let cipher = AesCbc::new(keys.pseudonym_key(col.related.as_deref())).map_err(|e| EbqError::Format(e.to_string()))?;
            let plaintext = scalar_bytes(col.ty, value)?;
            let ct = cipher.encrypt(&plaintext, Some(ZERO_IV));
            Ok(vec![(wire[0].name.clone(), Value::from(BASE64.encode(ct)))])
        }
        EncryptMode::Searchwords => {
            let s = value.as_str().ok_or_else(|| EbqError::Format(format!("{}: searchwords field must be a string", col.name)))?;
            let iv = field_iv(&keys.stringhash, &col.name);
            let encoded = encode_cell(&keys.stringhash, &col.name, s, col.searchwords_separator.as_deref(), col.max_word_sequence as usize, iv, rng);
            Ok(vec![(wire[0].name.clone(), Value::from(encoded))])
        }
        EncryptMode::ProbabilisticSearchwords => {
            let s = value.as_str().ok_or_else(|| EbqError::Format(format!("{}: searchwords field must be a string", col.name)))?;
            let iv = field_iv(&keys.stringhash, &col.name);
            let searchwords = encode_cell(&keys.stringhash, &col.name, s, col.searchwords_separator.as_deref(), col.max_word_sequence as usize, iv, rng);
            let cipher = AesCbc::new(keys.probabilistic.clone()).map_err(|e| EbqError::Format(e.to_string()))?;
            let ct = cipher.encrypt(s.as_bytes(), None);
            Ok(vec![(wire[0].name.clone(), Value::from(searchwords)), (wire[1].name.clone(), Value::from(BASE64.encode(ct)))])
        }
        EncryptMode::Homomorphic => {
            let cipher = Cipher::new(keypair_from_seed(&keys.homomorphic));
            let ciphertext = match col.ty {
                ColumnType::Integer => {
                    let n = value.as_i64().ok_or_else(|| EbqError::Format(format!("{}: homomorphic integer field must be an integer", col.name)))?;
                    cipher.encrypt_int64(n, &mut OsRngFacade(rng))
                }
                ColumnType::Float => {
                    let f = value.as_f64().ok_or_else(|| EbqError::Format(format!("{}: homomorphic float field must be a number", col.name)))?;
                    cipher.encrypt_float(f, &mut OsRngFacade(rng)).map_err(|e| EbqError::Overflow(e.to_string()))?
                }
                _ => unreachable!("validated: homomorphic requires integer or float"),
            };
            Ok(vec![(wire[0].name.clone(), Value::from(BASE64.encode(ciphertext.to_bytes_be())))])
        }
    }
}

fn scalar_bytes(ty: ColumnType, value: &Value) -> Result<Vec<u8>, EbqError> {
    match ty {
        ColumnType::String => value.as_str().map(|s| s.as_bytes().to_vec()).ok_or_else(|| EbqError::Format("expected a string cell".to_string())),
        ColumnType::Integer => value.as_i64().map(|n| n.to_string().into_bytes()).ok_or_else(|| EbqError::Format("expected an integer cell".to_string())),
        ColumnType::Float => value.as_f64().map(|f| f.to_string().into_bytes()).ok_or_else(|| EbqError::Format("expected a numeric cell".to_string())),
        ColumnType::Timestamp | ColumnType::Record => unreachable!("validated: not an encryptable scalar type"),
    }
}

/// [`Cipher`]'s encrypt methods want `impl RngCore`, but callers of
/// `encode_row` only have a `&mut dyn RngCore`; this newtype bridges the
/// object-safety gap without threading a generic through the whole tree
/// walk.
struct OsRngFacade<'a>(&'a mut dyn RngCore);

impl RngCore for OsRngFacade<'_> {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.try_fill_bytes(dest)
    }
}
