use std::hash::BuildHasherDefault;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<ahash::AHasher>>;
pub type IndexSet<V> = indexmap::IndexSet<V, BuildHasherDefault<ahash::AHasher>>;

/// Small builder-style helper: `Thing::default().config(|t| t.field = x)`.
pub trait Config: Sized {
    fn config(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

impl<T> Config for T {}

/// Right-pads `n`'s decimal form to 8 characters, as used by `PRF`'s
/// counter framing.
pub fn format8(n: u64) -> String {
    assert!(n < 100_000_000, "counter {n} exceeds format8 range");
    format!("{n:0>8}")
}
