//! Stream codecs and ciphers.
//!
//! - `filters`: the `FilterPipeline` that applies a stream's `/Filter` chain
//! - `flate`, `lzw`, `ascii85`, `asciihex`, `runlength`: individual filters
//! - `predictor`: PNG row predictors used with Flate and LZW
//! - `arcfour`, `aes`, `cipher`: symmetric ciphers for the security handler

#[cfg(feature = "aes")]
pub mod aes;
pub mod arcfour;
pub mod ascii85;
pub mod asciihex;
pub mod cipher;
pub mod filters;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

pub use arcfour::{Arcfour, rc4};
pub use ascii85::{ascii85decode, ascii85encode};
pub use asciihex::{asciihexdecode, asciihexencode};
pub use cipher::{IdentityCipher, Rc4Cipher, SymmetricCipher, aes_available};
pub use filters::{FilterPipeline, StreamFilter};
pub use flate::{flatedecode, flateencode};
pub use lzw::{lzwdecode, lzwencode};
pub use runlength::rldecode;
