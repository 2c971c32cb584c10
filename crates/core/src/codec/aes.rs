//! AES-CBC primitives used by the Standard Security Handler.
//!
//! All helpers work on whole blocks; framing (IV prefix, PKCS#7 padding)
//! is handled by `cipher::AesCipher`.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

use crate::error::{PdfError, Result};

type Aes128CbcDec = Decryptor<aes::Aes128>;
type Aes256CbcDec = Decryptor<aes::Aes256>;
type Aes128CbcEnc = Encryptor<aes::Aes128>;
type Aes256CbcEnc = Encryptor<aes::Aes256>;

pub const BLOCK_SIZE: usize = 16;

fn check_shape(key: &[u8], iv: &[u8], data: &[u8]) -> Result<()> {
    if key.len() != 16 && key.len() != 32 {
        return Err(PdfError::EncryptionError(format!(
            "AES key must be 16 or 32 bytes, got {}",
            key.len()
        )));
    }
    if iv.len() != BLOCK_SIZE {
        return Err(PdfError::EncryptionError(format!(
            "AES IV must be 16 bytes, got {}",
            iv.len()
        )));
    }
    if data.len() % BLOCK_SIZE != 0 {
        return Err(PdfError::EncryptionError(format!(
            "AES data length {} is not a multiple of the block size",
            data.len()
        )));
    }
    Ok(())
}

fn cipher_err<E: std::fmt::Debug>(e: E) -> PdfError {
    PdfError::EncryptionError(format!("AES: {e:?}"))
}

/// Decrypt whole blocks with AES-128 or AES-256 in CBC mode.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_shape(key, iv, data)?;
    let mut buf = data.to_vec();
    if key.len() == 16 {
        Aes128CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(cipher_err)?;
    } else {
        Aes256CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(cipher_err)?;
    }
    Ok(buf)
}

/// Encrypt whole blocks with AES-128 or AES-256 in CBC mode.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_shape(key, iv, data)?;
    let mut buf = data.to_vec();
    let len = buf.len();
    if key.len() == 16 {
        Aes128CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(cipher_err)?;
    } else {
        Aes256CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(cipher_err)?;
    }
    Ok(buf)
}

/// Decrypt a single block in ECB mode (CBC with a zero IV over one block).
pub fn aes_ecb_decrypt_block(key: &[u8], block: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
    if block.len() != BLOCK_SIZE {
        return Err(PdfError::EncryptionError(format!(
            "AES-ECB expects one 16-byte block, got {} bytes",
            block.len()
        )));
    }
    let plain = aes_cbc_decrypt(key, &[0u8; BLOCK_SIZE], block)?;
    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&plain);
    Ok(out)
}

/// Append PKCS#7 padding up to the next block boundary.
pub fn pad_pkcs7(data: &[u8]) -> Vec<u8> {
    let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

/// Remove PKCS#7 padding from AES-decrypted data.
///
/// Invalid padding leaves the data unchanged.
pub fn unpad_aes(data: &[u8]) -> &[u8] {
    let Some(&last) = data.last() else {
        return data;
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return data;
    }
    let start = data.len() - pad_len;
    if data[start..].iter().all(|&b| b == last) {
        &data[..start]
    } else {
        data
    }
}
