use ebq_helpers::format8;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const HASH_OUTPUT_LEN: usize = 20;
const BLOCK_LEN: usize = 16;

/// Keyed word-sequence / general-purpose PRF: an HMAC-SHA1 chain truncated
/// to `out_len` bytes, 16 bytes per chain link.
///
/// `PRF(key, input, out_len) = concat_{i=0..ceil(out_len/16)-1}( HMAC(key, format8(i) || input)[:16] )`
pub fn prf(key: &[u8], input: &[u8], out_len: usize) -> Vec<u8> {
    let links = out_len.div_ceil(BLOCK_LEN).max(1);
    let mut out = Vec::with_capacity(links * BLOCK_LEN);
    for i in 0..links {
        let mut mac = <HmacSha1 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(format8(i as u64).as_bytes());
        mac.update(input);
        let digest = mac.finalize().into_bytes();
        debug_assert_eq!(digest.len(), HASH_OUTPUT_LEN);
        out.extend_from_slice(&digest[..BLOCK_LEN]);
    }
    out.truncate(out_len);
    out
}

/// `PRF` with the its default 16-byte output.
pub fn prf16(key: &[u8], input: &[u8]) -> Vec<u8> {
    prf(key, input, BLOCK_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let key = b"0123456789abcdef";
        assert_eq!(prf(key, b"role:table", 16), prf(key, b"role:table", 16));
    }

    #[test]
    fn differs_by_key_or_input() {
        let key = b"0123456789abcdef";
        assert_ne!(prf(key, b"a", 16), prf(key, b"b", 16));
        assert_ne!(prf(key, b"a", 16), prf(b"other-key-bytes!", b"a", 16));
    }

    #[test]
    fn out_len_is_honored_across_chain_links() {
        let key = b"0123456789abcdef";
        let short = prf(key, b"x", 16);
        let long = prf(key, b"x", 40);
        assert_eq!(long.len(), 40);
        assert_eq!(&long[..16], &short[..]);
    }
}
