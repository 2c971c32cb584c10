//! Standard security handler: password checks, key derivation and
//! per-object decryption for revisions 2 through 6.
//!
//! The free functions are the individual algorithms of the standard handler
//! and are usable on their own (for example to produce `/O` and `/U` when
//! writing test files). [`EncryptionEngine`] ties them to an `/Encrypt`
//! dictionary.

use std::sync::Arc;

use sha2::{Digest, Sha256, Sha384, Sha512};

use super::saslprep::saslprep;
use crate::codec::arcfour::rc4;
use crate::codec::cipher::{
    IdentityCipher, Rc4Cipher, SymmetricCipher, aes_cipher, aes128_cbc_encrypt_raw,
    aes256_ecb_decrypt_block, aes256_unwrap_key,
};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::model::objects::{PDFDict, PDFObject, PDFStream, dict_get};
use crate::{PdfError, Result};

/// Password padding string (ISO 32000-1, 7.6.3.3).
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Revision 5 and 6 passwords are cut to this many bytes.
const MAX_PASSWORD_LEN: usize = 127;

/// Which password unlocked the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PasswordType {
    #[default]
    NotDecrypted = 0,
    User = 1,
    Owner = 2,
}

/// Crypt filter method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    Identity,
    /// RC4
    Rc4,
    /// AES-128
    AesV2,
    /// AES-256
    AesV3,
}

impl CryptMethod {
    fn from_cfm(cfm: &str) -> Result<Self> {
        match cfm {
            "V2" => Ok(Self::Rc4),
            "AESV2" => Ok(Self::AesV2),
            "AESV3" => Ok(Self::AesV3),
            "None" | "Identity" => Ok(Self::Identity),
            other => Err(PdfError::NotImplemented(format!(
                "crypt filter method /{other}"
            ))),
        }
    }
}

/// The numbers that feed the revision 2-4 key derivation.
#[derive(Debug, Clone, Copy)]
pub struct KeyParams<'a> {
    pub revision: i64,
    /// Key length in bytes.
    pub key_len: usize,
    pub o: &'a [u8],
    pub u: &'a [u8],
    pub p: i32,
    /// First element of the trailer `/ID`.
    pub id1: &'a [u8],
    pub encrypt_metadata: bool,
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PASSWORD_PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

/// Algorithm 2: file key from a user password (revisions 2 to 4).
pub fn compute_key_v4(params: &KeyParams<'_>, password: &[u8]) -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(pad_password(password));
    context.consume(params.o);
    context.consume(params.p.to_le_bytes());
    context.consume(params.id1);
    if params.revision >= 4 && !params.encrypt_metadata {
        context.consume([0xFF; 4]);
    }
    let mut digest = context.finalize().0;

    let n = params.key_len.min(16);
    if params.revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(&digest[..n]).0;
        }
    }
    digest[..n].to_vec()
}

/// RC4 key derived from the owner password (steps a-d of algorithm 3).
fn owner_rc4_key(owner_password: &[u8], revision: i64, key_len: usize) -> Vec<u8> {
    let mut digest = md5::compute(pad_password(owner_password)).0;
    if revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(digest).0;
        }
    }
    let n = if revision == 2 { 5 } else { key_len.min(16) };
    digest[..n].to_vec()
}

/// Algorithm 3: the `/O` value.
pub fn compute_o_value(
    owner_password: &[u8],
    user_password: &[u8],
    revision: i64,
    key_len: usize,
) -> Result<Vec<u8>> {
    let owner = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let key = owner_rc4_key(owner, revision, key_len);
    let mut value = rc4(&key, &pad_password(user_password))?;
    if revision >= 3 {
        for round in 1..20u8 {
            value = rc4(&xor_key(&key, round), &value)?;
        }
    }
    Ok(value)
}

/// Algorithms 4 and 5: the `/U` value for a file key.
///
/// From revision 3 on only the first 16 bytes are significant; the rest is
/// zero padding.
pub fn compute_u_value(key: &[u8], revision: i64, id1: &[u8]) -> Result<Vec<u8>> {
    if revision == 2 {
        return rc4(key, &PASSWORD_PADDING);
    }
    let mut context = md5::Context::new();
    context.consume(PASSWORD_PADDING);
    context.consume(id1);
    let mut value = rc4(key, &context.finalize().0)?;
    for round in 1..20u8 {
        value = rc4(&xor_key(key, round), &value)?;
    }
    value.resize(32, 0);
    Ok(value)
}

/// Algorithm 6: the file key if `password` is the user password.
pub fn verify_user_password(params: &KeyParams<'_>, password: &[u8]) -> Result<Option<Vec<u8>>> {
    let key = compute_key_v4(params, password);
    let computed = compute_u_value(&key, params.revision, params.id1)?;
    let matches = if params.revision == 2 {
        params.u.get(..32) == Some(&computed[..32])
    } else {
        params.u.get(..16) == Some(&computed[..16])
    };
    Ok(matches.then_some(key))
}

/// Algorithm 7: recover the user password from `/O`, then check it.
pub fn verify_owner_password(
    params: &KeyParams<'_>,
    password: &[u8],
) -> Result<Option<Vec<u8>>> {
    let key = owner_rc4_key(password, params.revision, params.key_len);
    let user_password = if params.revision == 2 {
        rc4(&key, params.o)?
    } else {
        let mut value = params.o.to_vec();
        for round in (0..20u8).rev() {
            value = rc4(&xor_key(&key, round), &value)?;
        }
        value
    };
    verify_user_password(params, &user_password)
}

/// Algorithm 2.A/2.B password hash. Revision 5 is a single SHA-256;
/// revision 6 runs the hardened loop. `udata` is the 48-byte `/U` prefix when
/// checking owner passwords and empty otherwise.
pub fn calculate_hash(revision: i64, password: &[u8], salt: &[u8], udata: &[u8]) -> Result<Vec<u8>> {
    let mut k: Vec<u8> = Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(udata)
        .finalize()
        .to_vec();
    if revision < 6 {
        return Ok(k);
    }

    let mut round: u32 = 0;
    loop {
        round += 1;
        let mut k1 = Vec::with_capacity((password.len() + k.len() + udata.len()) * 64);
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(udata);
        }
        let e = aes128_cbc_encrypt_raw(&k[..16], &k[16..32], &k1)?;
        // 256 is 1 mod 3, so summing the bytes gives the big-endian value mod 3
        k = match e[..16].iter().map(|&b| u32::from(b)).sum::<u32>() % 3 {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };
        let last = u32::from(e[e.len() - 1]);
        if round >= 64 && last + 32 <= round {
            break;
        }
    }
    k.truncate(32);
    Ok(k)
}

/// Algorithm 11: revision 5/6 user password; unwraps `/UE` on success.
pub fn verify_user_password_v5(
    revision: i64,
    password: &[u8],
    u: &[u8],
    ue: &[u8],
) -> Result<Option<Vec<u8>>> {
    require_len(u, "U", 48)?;
    require_len(ue, "UE", 32)?;
    let hash = calculate_hash(revision, password, &u[32..40], &[])?;
    if hash[..] != u[..32] {
        return Ok(None);
    }
    let key_hash = calculate_hash(revision, password, &u[40..48], &[])?;
    aes256_unwrap_key(&key_hash, &ue[..32]).map(Some)
}

/// Algorithm 12: revision 5/6 owner password; unwraps `/OE` on success.
pub fn verify_owner_password_v5(
    revision: i64,
    password: &[u8],
    o: &[u8],
    oe: &[u8],
    u: &[u8],
) -> Result<Option<Vec<u8>>> {
    require_len(o, "O", 48)?;
    require_len(oe, "OE", 32)?;
    require_len(u, "U", 48)?;
    let udata = &u[..48];
    let hash = calculate_hash(revision, password, &o[32..40], udata)?;
    if hash[..] != o[..32] {
        return Ok(None);
    }
    let key_hash = calculate_hash(revision, password, &o[40..48], udata)?;
    aes256_unwrap_key(&key_hash, &oe[..32]).map(Some)
}

/// Algorithm 13: check `/Perms` against `/P` and `/EncryptMetadata`.
pub fn verify_perms(key: &[u8], perms: &[u8], p: i32, encrypt_metadata: bool) -> Result<bool> {
    if perms.len() < 16 {
        return Ok(false);
    }
    let block = aes256_ecb_decrypt_block(key, &perms[..16])?;
    let metadata_flag = if encrypt_metadata { b'T' } else { b'F' };
    Ok(&block[9..12] == b"adb" && block[..4] == p.to_le_bytes() && block[8] == metadata_flag)
}

/// Algorithm 1: per-object key. AES-256 uses the file key unchanged.
pub fn object_key(file_key: &[u8], method: CryptMethod, objid: u32, genno: u16) -> Vec<u8> {
    if method == CryptMethod::AesV3 {
        return file_key.to_vec();
    }
    let mut context = md5::Context::new();
    context.consume(file_key);
    context.consume(&objid.to_le_bytes()[..3]);
    context.consume(genno.to_le_bytes());
    if method == CryptMethod::AesV2 {
        context.consume(b"sAlT");
    }
    let n = (file_key.len() + 5).min(16);
    context.finalize().0[..n].to_vec()
}

fn int_entry(dict: &PDFDict, key: &str) -> Option<i64> {
    dict_get(dict, key).and_then(|v| v.as_int().ok())
}

fn bytes_entry(dict: &PDFDict, key: &str) -> Result<Vec<u8>> {
    dict_get(dict, key)
        .ok_or_else(|| PdfError::EncryptionError(format!("/Encrypt has no /{key}")))?
        .as_string()
        .map(<[u8]>::to_vec)
}

fn require_len(value: &[u8], key: &str, min: usize) -> Result<()> {
    if value.len() < min {
        return Err(PdfError::EncryptionError(format!(
            "/{key} is {} bytes, expected at least {min}",
            value.len()
        )));
    }
    Ok(())
}

/// Decrypts the objects of one document once a password has been accepted.
pub struct EncryptionEngine {
    version: i64,
    revision: i64,
    key_len: usize,
    o: Vec<u8>,
    u: Vec<u8>,
    oe: Vec<u8>,
    ue: Vec<u8>,
    perms: Option<Vec<u8>>,
    p: i32,
    id1: Vec<u8>,
    encrypt_metadata: bool,
    stm_method: CryptMethod,
    str_method: CryptMethod,
    eff_method: CryptMethod,
    key: Option<Vec<u8>>,
    password_type: PasswordType,
    diagnostics: Option<Arc<Diagnostics>>,
}

impl std::fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionEngine")
            .field("version", &self.version)
            .field("revision", &self.revision)
            .field("key_len", &self.key_len)
            .field("stm_method", &self.stm_method)
            .field("str_method", &self.str_method)
            .field("password_type", &self.password_type)
            .finish_non_exhaustive()
    }
}

impl EncryptionEngine {
    /// Read the handler parameters from an `/Encrypt` dictionary.
    ///
    /// `id1` is the first element of the trailer `/ID`, or empty.
    pub fn from_trailer(encrypt: &PDFDict, id1: &[u8]) -> Result<Self> {
        let filter = dict_get(encrypt, "Filter")
            .and_then(|v| v.as_name().ok())
            .unwrap_or("");
        if filter != "Standard" {
            return Err(PdfError::NotImplemented(format!(
                "security handler /{filter}"
            )));
        }
        if let Some(sub) = dict_get(encrypt, "SubFilter") {
            return Err(PdfError::NotImplemented(format!(
                "security handler with /SubFilter {}",
                sub.as_name().unwrap_or("?")
            )));
        }

        let version = int_entry(encrypt, "V").unwrap_or(0);
        if !(1..=5).contains(&version) {
            return Err(PdfError::NotImplemented(format!(
                "encryption algorithm /V {version}"
            )));
        }
        let revision = int_entry(encrypt, "R")
            .ok_or_else(|| PdfError::EncryptionError("/Encrypt has no /R".into()))?;
        if !(2..=6).contains(&revision) || (revision >= 5) != (version == 5) {
            return Err(PdfError::NotImplemented(format!(
                "standard security handler /V {version} /R {revision}"
            )));
        }

        let key_len = match version {
            1 => 5,
            5 => 32,
            _ => {
                let default = if version == 4 { 128 } else { 40 };
                let bits = int_entry(encrypt, "Length").unwrap_or(default);
                if !(40..=128).contains(&bits) || bits % 8 != 0 {
                    return Err(PdfError::EncryptionError(format!(
                        "invalid key /Length {bits}"
                    )));
                }
                if revision == 2 { 5 } else { (bits / 8) as usize }
            }
        };

        let o = bytes_entry(encrypt, "O")?;
        let u = bytes_entry(encrypt, "U")?;
        let (oe, ue) = if revision >= 5 {
            require_len(&o, "O", 48)?;
            require_len(&u, "U", 48)?;
            let oe = bytes_entry(encrypt, "OE")?;
            let ue = bytes_entry(encrypt, "UE")?;
            require_len(&oe, "OE", 32)?;
            require_len(&ue, "UE", 32)?;
            (oe, ue)
        } else {
            require_len(&o, "O", 32)?;
            require_len(&u, "U", if revision == 2 { 32 } else { 16 })?;
            (Vec::new(), Vec::new())
        };

        // /P is a signed 32-bit field; some writers store it unsigned
        let p = int_entry(encrypt, "P")
            .ok_or_else(|| PdfError::EncryptionError("/Encrypt has no /P".into()))?
            as i32;
        let encrypt_metadata = dict_get(encrypt, "EncryptMetadata")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(true);
        let perms = dict_get(encrypt, "Perms")
            .and_then(|v| v.as_string().ok())
            .map(<[u8]>::to_vec);

        let (stm_method, str_method, eff_method) = if version >= 4 {
            let cf = dict_get(encrypt, "CF").and_then(|v| v.as_dict().ok());
            let stm = crypt_method(encrypt, cf, "StmF")?;
            let str_ = crypt_method(encrypt, cf, "StrF")?;
            let eff = if dict_get(encrypt, "EFF").is_some() {
                crypt_method(encrypt, cf, "EFF")?
            } else {
                stm
            };
            (stm, str_, eff)
        } else {
            (CryptMethod::Rc4, CryptMethod::Rc4, CryptMethod::Rc4)
        };

        Ok(Self {
            version,
            revision,
            key_len,
            o,
            u,
            oe,
            ue,
            perms,
            p,
            id1: id1.to_vec(),
            encrypt_metadata,
            stm_method,
            str_method,
            eff_method,
            key: None,
            password_type: PasswordType::NotDecrypted,
            diagnostics: None,
        })
    }

    /// Report a failed `/Perms` check here instead of only logging it.
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    fn key_params(&self) -> KeyParams<'_> {
        KeyParams {
            revision: self.revision,
            key_len: self.key_len,
            o: &self.o,
            u: &self.u,
            p: self.p,
            id1: &self.id1,
            encrypt_metadata: self.encrypt_metadata,
        }
    }

    /// Try `password` as owner password, then as user password.
    ///
    /// A wrong password gives `Ok(PasswordType::NotDecrypted)`. Once a
    /// password has been accepted the key is fixed and later calls return
    /// the type already established.
    pub fn verify(&mut self, password: &[u8]) -> Result<PasswordType> {
        if self.password_type != PasswordType::NotDecrypted {
            return Ok(self.password_type);
        }

        let found = if self.revision <= 4 {
            let params = self.key_params();
            if let Some(key) = verify_owner_password(&params, password)? {
                Some((key, PasswordType::Owner))
            } else {
                verify_user_password(&params, password)?.map(|key| (key, PasswordType::User))
            }
        } else {
            let password = self.prepare_password(password);
            if let Some(key) =
                verify_owner_password_v5(self.revision, &password, &self.o, &self.oe, &self.u)?
            {
                Some((key, PasswordType::Owner))
            } else {
                verify_user_password_v5(self.revision, &password, &self.u, &self.ue)?
                    .map(|key| (key, PasswordType::User))
            }
        };

        let Some((key, password_type)) = found else {
            return Ok(PasswordType::NotDecrypted);
        };
        if self.revision >= 5 {
            self.check_perms(&key)?;
        }
        tracing::debug!(
            domain = "pdf.crypt",
            revision = self.revision,
            "accepted {:?} password",
            password_type
        );
        self.key = Some(key);
        self.password_type = password_type;
        Ok(password_type)
    }

    /// SASLprep for revision 6 (raw bytes if that fails), then truncate.
    fn prepare_password(&self, password: &[u8]) -> Vec<u8> {
        let mut prepared = match std::str::from_utf8(password) {
            Ok(text) if self.revision == 6 => saslprep(text)
                .map(String::into_bytes)
                .unwrap_or_else(|_| password.to_vec()),
            _ => password.to_vec(),
        };
        prepared.truncate(MAX_PASSWORD_LEN);
        prepared
    }

    fn check_perms(&self, key: &[u8]) -> Result<()> {
        let ok = match &self.perms {
            Some(perms) => verify_perms(key, perms, self.p, self.encrypt_metadata)?,
            None => false,
        };
        if !ok {
            let message = "/Perms does not match /P; keeping the key";
            match &self.diagnostics {
                Some(diagnostics) => diagnostics.note(WarningKind::Perms, message),
                None => tracing::warn!(domain = "pdf.crypt", "{}", message),
            }
        }
        Ok(())
    }

    fn file_key(&self) -> Result<&[u8]> {
        self.key.as_deref().ok_or(PdfError::FileNotDecrypted)
    }

    fn cipher(
        &self,
        method: CryptMethod,
        objid: u32,
        genno: u16,
        iv: [u8; 16],
    ) -> Result<Box<dyn SymmetricCipher>> {
        let key = object_key(self.file_key()?, method, objid, genno);
        match method {
            CryptMethod::Identity => Ok(Box::new(IdentityCipher)),
            CryptMethod::Rc4 => Ok(Box::new(Rc4Cipher::new(&key)?)),
            CryptMethod::AesV2 | CryptMethod::AesV3 => aes_cipher(&key, iv),
        }
    }

    /// Decrypt one string or stream payload with an explicit method.
    pub fn decrypt_bytes(
        &self,
        data: &[u8],
        objid: u32,
        genno: u16,
        method: CryptMethod,
    ) -> Result<Vec<u8>> {
        self.cipher(method, objid, genno, [0; 16])?.decrypt(data)
    }

    /// Encrypt a stream payload. AES needs the caller's IV; RC4 ignores it.
    pub fn encrypt_bytes(
        &self,
        data: &[u8],
        objid: u32,
        genno: u16,
        iv: Option<[u8; 16]>,
    ) -> Result<Vec<u8>> {
        let method = self.stm_method;
        let iv = match (method, iv) {
            (CryptMethod::AesV2 | CryptMethod::AesV3, None) => {
                return Err(PdfError::EncryptionError(
                    "AES encryption needs an IV".into(),
                ));
            }
            (_, iv) => iv.unwrap_or_default(),
        };
        self.cipher(method, objid, genno, iv)?.encrypt(data)
    }

    /// Decrypt every string and stream inside `obj`, which was stored as
    /// object `objid genno`.
    pub fn decrypt_object(&self, obj: PDFObject, objid: u32, genno: u16) -> Result<PDFObject> {
        self.file_key()?;
        match obj {
            PDFObject::TextString(_) | PDFObject::ByteString(_) => {
                let raw = obj.as_string()?;
                let plain = self.decrypt_bytes(raw, objid, genno, self.str_method)?;
                Ok(PDFObject::string(plain))
            }
            PDFObject::Array(items) => items
                .into_iter()
                .map(|item| self.decrypt_object(item, objid, genno))
                .collect::<Result<Vec<_>>>()
                .map(PDFObject::Array),
            PDFObject::Dict(dict) => Ok(PDFObject::Dict(self.decrypt_dict(dict, objid, genno)?)),
            PDFObject::Stream(stream) => {
                Ok(PDFObject::Stream(Box::new(self.decrypt_stream(*stream, objid, genno)?)))
            }
            other => Ok(other),
        }
    }

    fn decrypt_dict(&self, dict: PDFDict, objid: u32, genno: u16) -> Result<PDFDict> {
        dict.into_iter()
            .map(|(k, v)| Ok((k, self.decrypt_object(v, objid, genno)?)))
            .collect()
    }

    fn decrypt_stream(&self, mut stream: PDFStream, objid: u32, genno: u16) -> Result<PDFStream> {
        let is_xref = matches!(stream.get("Type"), Some(PDFObject::Name(n)) if n == "XRef");
        let skip_data = is_xref || (!self.encrypt_metadata && stream.is_metadata());
        stream.attrs = self.decrypt_dict(std::mem::take(&mut stream.attrs), objid, genno)?;
        if !skip_data {
            let method = if matches!(stream.get("Type"), Some(PDFObject::Name(n)) if n == "EmbeddedFile") {
                self.eff_method
            } else {
                self.stm_method
            };
            let plain = self.decrypt_bytes(stream.get_rawdata(), objid, genno, method)?;
            stream.set_rawdata(plain);
        }
        Ok(stream)
    }

    pub const fn version(&self) -> i64 {
        self.version
    }

    pub const fn revision(&self) -> i64 {
        self.revision
    }

    /// Key length in bytes.
    pub const fn key_length(&self) -> usize {
        self.key_len
    }

    /// The file key, once a password has been accepted.
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub const fn password_type(&self) -> PasswordType {
        self.password_type
    }

    pub const fn is_decrypted(&self) -> bool {
        !matches!(self.password_type, PasswordType::NotDecrypted)
    }

    /// The `/P` permission bits.
    pub const fn permissions(&self) -> i32 {
        self.p
    }

    pub const fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    pub const fn stream_method(&self) -> CryptMethod {
        self.stm_method
    }

    pub const fn string_method(&self) -> CryptMethod {
        self.str_method
    }
}

/// Resolve `/StmF`, `/StrF` or `/EFF` through the `/CF` dictionary.
fn crypt_method(encrypt: &PDFDict, cf: Option<&PDFDict>, key: &str) -> Result<CryptMethod> {
    let name = dict_get(encrypt, key)
        .and_then(|v| v.as_name().ok())
        .unwrap_or("Identity");
    if name == "Identity" {
        return Ok(CryptMethod::Identity);
    }
    let filter = cf
        .and_then(|cf| dict_get(cf, name))
        .and_then(|v| v.as_dict().ok())
        .ok_or_else(|| PdfError::EncryptionError(format!("crypt filter /{name} not in /CF")))?;
    let cfm = dict_get(filter, "CFM")
        .and_then(|v| v.as_name().ok())
        .unwrap_or("None");
    CryptMethod::from_cfm(cfm)
}
