//! Master-key file handling and per-table key derivation.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ebq_symcrypto::prf;
use sha1::{Digest, Sha1};
use zeroize::Zeroize;

use crate::errors::EbqError;

const MASTER_KEY_LEN: usize = 16;

/// Key derivation roles a table key is minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Probabilistic,
    Pseudonym,
    Homomorphic,
    Stringhash,
}

impl KeyRole {
    fn tag(self) -> &'static str {
        match self {
            KeyRole::Probabilistic => "probabilistic_",
            KeyRole::Pseudonym => "pseudonym_",
            KeyRole::Homomorphic => "homomorphic_",
            KeyRole::Stringhash => "stringhash_",
        }
    }
}

/// An in-memory master key. Zeroized on drop; never implements `Debug`.
pub struct MasterKey(Vec<u8>);

impl Zeroize for MasterKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl MasterKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Loads the master key from `path`, creating it (mode 0600, `O_EXCL`)
    /// with fresh random bytes if the file does not already exist.
    pub fn load_or_create(path: &Path) -> Result<Self, EbqError> {
        match OpenOptions::new().read(true).open(path) {
            Ok(mut f) => {
                let mut encoded = String::new();
                f.read_to_string(&mut encoded)?;
                let bytes = BASE64
                    .decode(encoded.trim())
                    .map_err(|e| EbqError::Format(format!("master key file is not valid base64: {e}")))?;
                if bytes.len() < MASTER_KEY_LEN {
                    return Err(EbqError::Format(format!("master key file is corrupt: decoded to {} bytes, need at least {MASTER_KEY_LEN}", bytes.len())));
                }
                Ok(MasterKey(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let bytes = ebq_symcrypto::get_rand_bytes(MASTER_KEY_LEN as i64)
                    .map_err(|e| EbqError::Format(format!("could not generate master key: {e}")))?;
                let mut opts = OpenOptions::new();
                opts.write(true).create_new(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    opts.mode(0o600);
                }
                let mut f = opts.open(path)?;
                f.write_all(BASE64.encode(&bytes).as_bytes())?;
                Ok(MasterKey(bytes))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        MasterKey(bytes)
    }

    /// `b64(sha1(master_key))`: the table-hash stored alongside a table's
    /// description so a caller with the wrong master key is rejected at
    /// load time rather than producing silently-wrong ciphertext.
    pub fn table_hash(&self) -> String {
        let digest = Sha1::digest(&self.0);
        BASE64.encode(digest)
    }

    /// `PRF(master_key, role || table_id)`.
    pub fn derive_table_key(&self, role: KeyRole, table_id: &str) -> Vec<u8> {
        let input = format!("{}{table_id}", role.tag());
        prf(&self.0, input.as_bytes(), MASTER_KEY_LEN)
    }

    /// The special-cased pseudonym key shared by a `related` field group:
    /// `PRF(master_key, "pseudonym_" || related)`, independent of any
    /// particular table so cross-table joins on the pseudonym agree.
    pub fn derive_related_pseudonym_key(&self, related: &str) -> Vec<u8> {
        let input = format!("pseudonym_{related}");
        prf(&self.0, input.as_bytes(), MASTER_KEY_LEN)
    }
}

/// `name || '_' || creation_ms`: the table id a table's keys are scoped to.
pub fn table_id(name: &str, creation_ms: u64) -> String {
    format!("{name}_{creation_ms}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn creates_then_reuses_the_same_key() {
        let dir = std::env::temp_dir().join(format!("ebq-mk-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("master.key");
        let _ = fs::remove_file(&path);

        let first = MasterKey::load_or_create(&path).unwrap().as_bytes().to_vec();
        assert_eq!(first.len(), MASTER_KEY_LEN);
        let second = MasterKey::load_or_create(&path).unwrap().as_bytes().to_vec();
        assert_eq!(first, second);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn short_decoded_key_is_rejected_as_corrupt() {
        let dir = std::env::temp_dir().join(format!("ebq-mk-short-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("master.key");
        let _ = fs::remove_file(&path);
        fs::write(&path, BASE64.encode([1u8; 8])).unwrap();

        assert!(MasterKey::load_or_create(&path).is_err());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn table_hash_is_deterministic_and_key_dependent() {
        let a = MasterKey::from_bytes(vec![1; 32]);
        let b = MasterKey::from_bytes(vec![2; 32]);
        assert_eq!(a.table_hash(), a.table_hash());
        assert_ne!(a.table_hash(), b.table_hash());
    }

    #[test]
    fn roles_and_table_ids_derive_distinct_keys() {
        let mk = MasterKey::from_bytes(vec![7; 32]);
        let id = table_id("cars", 1_700_000_000_000);
        let probabilistic = mk.derive_table_key(KeyRole::Probabilistic, &id);
        let pseudonym = mk.derive_table_key(KeyRole::Pseudonym, &id);
        assert_ne!(probabilistic, pseudonym);

        let other_table = mk.derive_table_key(KeyRole::Probabilistic, &table_id("trucks", 1_700_000_000_000));
        assert_ne!(probabilistic, other_table);
    }

    #[test]
    fn related_pseudonym_key_ignores_table_id() {
        let mk = MasterKey::from_bytes(vec![9; 32]);
        let via_cars = mk.derive_related_pseudonym_key("cars_name");
        let via_trucks = mk.derive_related_pseudonym_key("cars_name");
        assert_eq!(via_cars, via_trucks);
    }
}
