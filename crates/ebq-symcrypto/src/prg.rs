use std::collections::VecDeque;

use crate::prf::prf16;

/// A pseudo-random byte stream keyed by a seed of at least 16 bytes.
///
/// Internally pages of 16 bytes are produced by `PRF(seed, str(k))` for an
/// increasing page counter `k`, and `next_bytes` slices that stream to
/// byte precision. The paging is deterministic and is part of the wire
/// contract: Paillier key material is derived straight from it, so any
/// two callers reading the same seed in the same order must see the same
/// bytes regardless of how they chunk their reads.
pub struct Prg {
    seed: Vec<u8>,
    next_page: u64,
    pending: VecDeque<u8>,
}

impl Prg {
    pub fn new(seed: impl Into<Vec<u8>>) -> Self {
        let seed = seed.into();
        assert!(seed.len() >= 16, "PRG seed must be at least 16 bytes");
        Self { seed, next_page: 0, pending: VecDeque::new() }
    }

    pub fn next_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if self.pending.is_empty() {
                let page = prf16(&self.seed, self.next_page.to_string().as_bytes());
                self.next_page += 1;
                self.pending.extend(page);
            }
            out.push(self.pending.pop_front().expect("just refilled"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic_for_a_fixed_seed() {
        let seed = vec![7u8; 16];
        let mut a = Prg::new(seed.clone());
        let mut b = Prg::new(seed);
        assert_eq!(a.next_bytes(50), b.next_bytes(50));
    }

    #[test]
    fn splitting_a_read_does_not_change_the_stream() {
        let seed = vec![3u8; 16];
        let mut whole = Prg::new(seed.clone());
        let combined = whole.next_bytes(37);

        let mut split = Prg::new(seed);
        let mut piecewise = split.next_bytes(10);
        piecewise.extend(split.next_bytes(27));

        assert_eq!(combined, piecewise);
    }

    #[test]
    fn arbitrary_split_points_agree() {
        let seed = vec![9u8; 20];
        for (k1, k2) in [(1, 1), (5, 11), (16, 16), (3, 29)] {
            let mut whole = Prg::new(seed.clone());
            let combined = whole.next_bytes(k1 + k2);

            let mut split = Prg::new(seed.clone());
            let mut piecewise = split.next_bytes(k1);
            piecewise.extend(split.next_bytes(k2));

            assert_eq!(combined, piecewise, "k1={k1} k2={k2}");
        }
    }
}
