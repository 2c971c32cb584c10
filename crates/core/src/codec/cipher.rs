//! Symmetric ciphers behind a common interface.
//!
//! RC4 is always available. AES is compiled in with the `aes` feature;
//! without it, asking for an AES cipher fails with `DependencyError` at the
//! point of use.

use super::arcfour::Arcfour;
use crate::error::{PdfError, Result};

/// A keyed cipher that encrypts and decrypts whole strings or streams.
pub trait SymmetricCipher: Send + Sync {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through used for the `/Identity` crypt filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCipher;

impl SymmetricCipher for IdentityCipher {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct Rc4Cipher {
    key: Vec<u8>,
}

impl Rc4Cipher {
    pub fn new(key: &[u8]) -> Result<Self> {
        // Validate the key once up front.
        Arcfour::new(key)?;
        Ok(Self { key: key.to_vec() })
    }
}

impl SymmetricCipher for Rc4Cipher {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(Arcfour::new(&self.key)?.process(data))
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.encrypt(data)
    }
}

/// AES-CBC with the PDF framing: a 16-byte IV in front of the ciphertext
/// and PKCS#7 padding on the plaintext.
#[cfg(feature = "aes")]
#[derive(Debug, Clone)]
pub struct AesCipher {
    key: Vec<u8>,
    iv: [u8; 16],
}

#[cfg(feature = "aes")]
impl AesCipher {
    /// `iv` is only used when encrypting; decryption reads it from the data.
    pub fn new(key: &[u8], iv: [u8; 16]) -> Result<Self> {
        if key.len() != 16 && key.len() != 32 {
            return Err(PdfError::EncryptionError(format!(
                "AES key must be 16 or 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Self {
            key: key.to_vec(),
            iv,
        })
    }
}

#[cfg(feature = "aes")]
impl SymmetricCipher for AesCipher {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        use super::aes::{aes_cbc_encrypt, pad_pkcs7};
        let body = aes_cbc_encrypt(&self.key, &self.iv, &pad_pkcs7(data))?;
        let mut out = Vec::with_capacity(16 + body.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        use super::aes::{aes_cbc_decrypt, unpad_aes};
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() < 16 {
            return Err(PdfError::EncryptionError(format!(
                "AES data of {} bytes is shorter than its IV",
                data.len()
            )));
        }
        let (iv, body) = data.split_at(16);
        let plain = aes_cbc_decrypt(&self.key, iv, body)?;
        Ok(unpad_aes(&plain).to_vec())
    }
}

/// Build an AES cipher, or report that AES support is not compiled in.
#[cfg(feature = "aes")]
pub fn aes_cipher(key: &[u8], iv: [u8; 16]) -> Result<Box<dyn SymmetricCipher>> {
    Ok(Box::new(AesCipher::new(key, iv)?))
}

/// Build an AES cipher, or report that AES support is not compiled in.
#[cfg(not(feature = "aes"))]
pub fn aes_cipher(_key: &[u8], _iv: [u8; 16]) -> Result<Box<dyn SymmetricCipher>> {
    Err(PdfError::DependencyError(
        "AES support requires the `aes` feature".into(),
    ))
}

pub fn aes_available() -> bool {
    cfg!(feature = "aes")
}

/// AES-256-CBC without framing, zero IV; decrypts `/UE` and `/OE`.
#[cfg(feature = "aes")]
pub fn aes256_unwrap_key(key: &[u8], wrapped: &[u8]) -> Result<Vec<u8>> {
    super::aes::aes_cbc_decrypt(key, &[0u8; 16], wrapped)
}

#[cfg(not(feature = "aes"))]
pub fn aes256_unwrap_key(_key: &[u8], _wrapped: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::DependencyError(
        "AES-256 key unwrapping requires the `aes` feature".into(),
    ))
}

/// AES-128-CBC over whole blocks; the hardening loop of revision 6.
#[cfg(feature = "aes")]
pub fn aes128_cbc_encrypt_raw(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    super::aes::aes_cbc_encrypt(key, iv, data)
}

#[cfg(not(feature = "aes"))]
pub fn aes128_cbc_encrypt_raw(_key: &[u8], _iv: &[u8], _data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::DependencyError(
        "revision 6 password hashing requires the `aes` feature".into(),
    ))
}

/// AES-256-ECB decryption of one block; checks `/Perms`.
#[cfg(feature = "aes")]
pub fn aes256_ecb_decrypt_block(key: &[u8], block: &[u8]) -> Result<[u8; 16]> {
    super::aes::aes_ecb_decrypt_block(key, block)
}

#[cfg(not(feature = "aes"))]
pub fn aes256_ecb_decrypt_block(_key: &[u8], _block: &[u8]) -> Result<[u8; 16]> {
    Err(PdfError::DependencyError(
        "Perms verification requires the `aes` feature".into(),
    ))
}
