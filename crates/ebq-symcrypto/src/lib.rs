pub mod aes_cbc;
pub mod errors;
pub mod prf;
pub mod prg;
pub mod rand_bytes;
pub mod searchwords;

pub use aes_cbc::AesCbc;
pub use errors::CryptoError;
pub use prf::{prf, prf16};
pub use prg::Prg;
pub use rand_bytes::get_rand_bytes;
