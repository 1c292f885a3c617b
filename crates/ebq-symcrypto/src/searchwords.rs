use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use ebq_helpers::format8;
use rand::seq::SliceRandom;
use rand_core::RngCore;
use sha1::{Digest, Sha1};
use unicode_segmentation::UnicodeSegmentation;

use crate::prf::prf;

const SUBHASH_OUT_LEN: usize = 8;

/// `keyed_hash(field_name, word_sequence) = PRF(stringhash_key, format8(len(field_name)) || field_name || data, out_len, sha1)`
pub fn keyed_hash(stringhash_key: &[u8], field_name: &str, word_sequence: &str, out_len: usize) -> Vec<u8> {
    let mut input = Vec::new();
    input.extend_from_slice(format8(field_name.len() as u64).as_bytes());
    input.extend_from_slice(field_name.as_bytes());
    input.extend_from_slice(word_sequence.as_bytes());
    prf(stringhash_key, &input, out_len)
}

/// The per-field salt mixed into every [`hash_subsequence`] of a given
/// column. Deterministic (table- and field-scoped, not per-row) so that a
/// `contains` query can recompute the same hash a loaded row carries
/// without seeing that row's plaintext first - a per-row random salt
/// would make containment unrecoverable from the query side alone.
pub fn field_iv(stringhash_key: &[u8], field_name: &str) -> [u8; 16] {
    let derived = prf(stringhash_key, format!("iv:{field_name}").as_bytes(), 16);
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&derived);
    iv
}

/// Lowercases, splits on `separator` (default: whitespace), and strips
/// Unicode punctuation when the default separator is used.
pub fn clean_words(value: &str, separator: Option<&str>) -> Vec<String> {
    let lowered = value.to_lowercase();
    match separator {
        Some(sep) if !sep.is_empty() => lowered.split(sep).map(|w| w.to_string()).filter(|w| !w.is_empty()).collect(),
        _ => lowered
            .unicode_words()
            .map(|w| w.to_string())
            .filter(|w| !w.is_empty())
            .collect(),
    }
}

/// All contiguous word subsequences of `words` up to length
/// `max_word_sequence`, joined with a single space.
pub fn word_subsequences(words: &[String], max_word_sequence: usize) -> Vec<String> {
    let mut out = Vec::new();
    for start in 0..words.len() {
        let max_len = max_word_sequence.min(words.len() - start);
        for len in 1..=max_len {
            out.push(words[start..start + len].join(" "));
        }
    }
    out
}

/// `sha1(iv || keyed_hash)[:8]`, base64 encoded — one hash in the per-cell
/// list, and also the form the WHERE/HAVING `contains` rewrite embeds.
pub fn hash_subsequence(iv: &[u8; 16], keyed: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(iv);
    hasher.update(keyed);
    hasher.finalize()[..SUBHASH_OUT_LEN].to_vec()
}

/// Builds the full per-cell searchwords ciphertext:
/// `b64(iv) || ' ' || join(' ', b64(hash_subsequence) for each subsequence, permuted)`.
pub fn encode_cell(
    stringhash_key: &[u8],
    field_name: &str,
    value: &str,
    separator: Option<&str>,
    max_word_sequence: usize,
    iv: [u8; 16],
    rng: &mut dyn RngCore,
) -> String {
    let words = clean_words(value, separator);
    let mut subseqs = word_subsequences(&words, max_word_sequence);
    subseqs.shuffle(rng);

    let mut parts = vec![B64.encode(iv)];
    for seq in subseqs {
        let keyed = keyed_hash(stringhash_key, field_name, &seq, 16);
        let sub = hash_subsequence(&iv, &keyed);
        parts.push(B64.encode(sub));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn field_iv_is_deterministic_and_field_scoped() {
        let key = b"0123456789abcdef";
        assert_eq!(field_iv(key, "Description"), field_iv(key, "Description"));
        assert_ne!(field_iv(key, "Description"), field_iv(key, "Make"));
    }

    #[test]
    fn clean_words_strips_punctuation_on_default_separator() {
        let words = clean_words("MUST SELL! air, moon roof, loaded", None);
        assert_eq!(words, vec!["must", "sell", "air", "moon", "roof", "loaded"]);
    }

    #[test]
    fn clean_words_honors_custom_separator() {
        let words = clean_words("a|b|c", Some("|"));
        assert_eq!(words, vec!["a", "b", "c"]);
    }

    #[test]
    fn word_subsequences_respects_max_length() {
        let words: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let subs = word_subsequences(&words, 2);
        assert_eq!(subs, vec!["a", "a b", "b", "b c", "c"]);
    }

    #[test]
    fn permutation_does_not_change_the_hash_set() {
        let key = b"0123456789abcdef";
        let iv = [5u8; 16];
        let words: Vec<String> = ["air", "moon", "roof"].iter().map(|s| s.to_string()).collect();
        let subs = word_subsequences(&words, 5);

        let hashes_in_order: std::collections::BTreeSet<_> = subs
            .iter()
            .map(|w| hash_subsequence(&iv, &keyed_hash(key, "Description", w, 16)))
            .collect();

        let mut shuffled = subs.clone();
        let mut rng = StdRng::seed_from_u64(1);
        shuffled.shuffle(&mut rng);
        let hashes_shuffled: std::collections::BTreeSet<_> = shuffled
            .iter()
            .map(|w| hash_subsequence(&iv, &keyed_hash(key, "Description", w, 16)))
            .collect();

        assert_eq!(hashes_in_order, hashes_shuffled);
    }

    #[test]
    fn encode_cell_contains_base64_iv_prefix() {
        let key = b"0123456789abcdef";
        let mut rng = StdRng::seed_from_u64(2);
        let iv = [9u8; 16];
        let encoded = encode_cell(key, "Description", "air, moon roof", None, 5, iv, &mut rng);
        let iv_b64 = B64.encode(iv);
        assert!(encoded.starts_with(&iv_b64));
    }
}
