//! Tests for the standard security handler.
//!
//! The RC4 and revision 5 fixtures come from real encrypted files (user
//! password "baz", owner password "foo"). Revision 4 and 6 vectors were
//! generated independently of this crate.

mod common;

use common::hex;
use quire_core::document::security::{
    CryptMethod, KeyParams, calculate_hash, compute_key_v4, compute_o_value, compute_u_value,
    object_key, verify_perms,
};
use quire_core::{EncryptionEngine, PDFDict, PDFObject, PasswordType, PdfError};

const DOCID: [u8; 16] = [
    101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
];

// V 1, R 2, 40-bit key.
const RC4_40_O: [u8; 32] = [
    1, 169, 240, 206, 242, 141, 0, 248, 223, 176, 37, 143, 94, 240, 197, 92, 157, 247, 200, 22,
    149, 143, 54, 49, 0, 175, 119, 236, 2, 38, 36, 84,
];
const RC4_40_U: [u8; 32] = [
    105, 75, 157, 162, 248, 9, 199, 124, 114, 119, 140, 251, 202, 194, 4, 129, 178, 114, 5, 208,
    231, 211, 34, 98, 54, 130, 131, 100, 102, 106, 151, 8,
];
const RC4_40_KEY: [u8; 5] = [17, 94, 106, 253, 164];

// V 2, R 3, 128-bit key.
const RC4_128_O: [u8; 32] = [
    208, 72, 209, 82, 158, 83, 93, 24, 132, 205, 56, 86, 54, 123, 24, 75, 74, 144, 223, 1, 230, 55,
    209, 110, 202, 6, 91, 175, 78, 100, 144, 11,
];
const RC4_128_U: [u8; 32] = [
    9, 52, 18, 54, 59, 157, 50, 124, 122, 197, 1, 68, 199, 199, 85, 241, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0,
];
const RC4_128_KEY: &str = "c2a59ca0a50e5b4ccff13e4bcf0e3b18";

// V 4, R 4, AESV2. Passwords "user4" and "owner4".
const AES128_O: [u8; 32] = [
    79, 28, 152, 165, 184, 173, 105, 218, 142, 28, 20, 88, 5, 80, 148, 105, 67, 94, 158, 205, 73,
    100, 138, 81, 97, 72, 243, 138, 198, 230, 153, 224,
];
const AES128_U: [u8; 32] = [
    144, 188, 181, 119, 169, 24, 61, 233, 34, 85, 56, 136, 143, 113, 209, 233, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0,
];
const AES128_P: i64 = -1084;
const AES128_KEY: &str = "0a5ae35260d543567d956a34f0a4fe03";

// V 5, R 5.
const AES256_O: [u8; 48] = [
    197, 126, 60, 46, 218, 22, 190, 91, 132, 46, 198, 222, 145, 49, 111, 125, 24, 147, 223, 122, 6,
    21, 159, 78, 155, 195, 49, 220, 252, 161, 203, 182, 215, 56, 115, 236, 23, 247, 193, 14, 39,
    184, 210, 207, 56, 201, 114, 199,
];
const AES256_U: [u8; 48] = [
    179, 236, 138, 87, 238, 76, 63, 44, 188, 66, 38, 224, 89, 1, 136, 216, 233, 86, 206, 51, 43,
    103, 248, 173, 26, 183, 85, 55, 229, 239, 180, 149, 88, 136, 28, 124, 249, 186, 223, 59, 180,
    7, 178, 19, 84, 51, 249, 188,
];
const AES256_OE: [u8; 32] = [
    91, 206, 49, 194, 37, 90, 49, 81, 128, 220, 14, 148, 72, 121, 213, 222, 45, 98, 227, 35, 15,
    76, 191, 10, 54, 211, 184, 43, 81, 250, 80, 231,
];
const AES256_UE: [u8; 32] = [
    121, 209, 78, 72, 9, 195, 93, 96, 16, 97, 189, 216, 198, 84, 195, 205, 125, 73, 208, 81, 173,
    33, 196, 195, 9, 4, 57, 3, 226, 247, 31, 8,
];
const AES256_KEY: &str = "5250e6e3f7b07091b017f36f36312d5574f84b32f2de934a42c0f8068928d0aa";

// V 5, R 6. Passwords "user6" and "owner6"; the file key is bytes 0..32.
const R6_U: [u8; 48] = [
    79, 89, 14, 239, 162, 51, 213, 146, 236, 27, 196, 31, 134, 197, 182, 96, 248, 212, 28, 164,
    114, 133, 255, 53, 113, 221, 58, 137, 69, 156, 217, 178, 1, 2, 3, 4, 5, 6, 7, 8, 17, 18, 19,
    20, 21, 22, 23, 24,
];
const R6_UE: [u8; 32] = [
    83, 12, 245, 235, 221, 132, 104, 90, 221, 124, 250, 31, 191, 154, 78, 111, 212, 13, 131, 150,
    120, 8, 195, 83, 118, 171, 179, 182, 37, 57, 179, 105,
];
const R6_O: [u8; 48] = [
    0, 201, 215, 14, 198, 207, 55, 224, 146, 231, 21, 36, 32, 11, 92, 165, 144, 15, 245, 207, 69,
    58, 111, 118, 25, 251, 122, 218, 45, 182, 160, 217, 33, 34, 35, 36, 37, 38, 39, 40, 49, 50, 51,
    52, 53, 54, 55, 56,
];
const R6_OE: [u8; 32] = [
    153, 198, 31, 231, 99, 23, 188, 120, 202, 230, 51, 35, 128, 39, 129, 33, 188, 85, 135, 146, 40,
    134, 105, 88, 18, 124, 165, 7, 126, 123, 198, 73,
];
const R6_PERMS: [u8; 16] = [
    245, 249, 155, 72, 17, 167, 207, 171, 114, 178, 185, 199, 56, 30, 209, 63,
];
const R6_P: i64 = -1028;

const IV: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

fn bytes(data: &[u8]) -> PDFObject {
    PDFObject::ByteString(data.to_vec())
}

fn rc4_dict(v: i64, r: i64, length: i64, o: &[u8], u: &[u8]) -> PDFDict {
    let mut dict = PDFDict::new();
    dict.insert("Filter".into(), PDFObject::name("Standard"));
    dict.insert("V".into(), PDFObject::Int(v));
    dict.insert("R".into(), PDFObject::Int(r));
    dict.insert("Length".into(), PDFObject::Int(length));
    dict.insert("P".into(), PDFObject::Int(-4));
    dict.insert("O".into(), bytes(o));
    dict.insert("U".into(), bytes(u));
    dict
}

fn crypt_filters(cfm: &str, length: i64) -> PDFObject {
    let mut std_cf = PDFDict::new();
    std_cf.insert("CFM".into(), PDFObject::name(cfm));
    std_cf.insert("Length".into(), PDFObject::Int(length));
    std_cf.insert("AuthEvent".into(), PDFObject::name("DocOpen"));
    let mut cf = PDFDict::new();
    cf.insert("StdCF".into(), PDFObject::Dict(std_cf));
    PDFObject::Dict(cf)
}

fn aes128_dict() -> PDFDict {
    let mut dict = PDFDict::new();
    dict.insert("Filter".into(), PDFObject::name("Standard"));
    dict.insert("V".into(), PDFObject::Int(4));
    dict.insert("R".into(), PDFObject::Int(4));
    dict.insert("Length".into(), PDFObject::Int(128));
    dict.insert("P".into(), PDFObject::Int(AES128_P));
    dict.insert("O".into(), bytes(&AES128_O));
    dict.insert("U".into(), bytes(&AES128_U));
    dict.insert("CF".into(), crypt_filters("AESV2", 16));
    dict.insert("StmF".into(), PDFObject::name("StdCF"));
    dict.insert("StrF".into(), PDFObject::name("StdCF"));
    dict
}

fn aes256_dict(r: i64, p: i64, o: &[u8], u: &[u8], oe: &[u8], ue: &[u8]) -> PDFDict {
    let mut dict = PDFDict::new();
    dict.insert("Filter".into(), PDFObject::name("Standard"));
    dict.insert("V".into(), PDFObject::Int(5));
    dict.insert("R".into(), PDFObject::Int(r));
    dict.insert("Length".into(), PDFObject::Int(256));
    dict.insert("P".into(), PDFObject::Int(p));
    dict.insert("O".into(), bytes(o));
    dict.insert("U".into(), bytes(u));
    dict.insert("OE".into(), bytes(oe));
    dict.insert("UE".into(), bytes(ue));
    dict.insert("CF".into(), crypt_filters("AESV3", 32));
    dict.insert("StmF".into(), PDFObject::name("StdCF"));
    dict.insert("StrF".into(), PDFObject::name("StdCF"));
    dict
}

fn r6_dict() -> PDFDict {
    let mut dict = aes256_dict(6, R6_P, &R6_O, &R6_U, &R6_OE, &R6_UE);
    dict.insert("Perms".into(), bytes(&R6_PERMS));
    dict.insert("EncryptMetadata".into(), PDFObject::Bool(true));
    dict
}

// --- Revision 2 ---

#[test]
fn test_rc4_40_owner_password() {
    let mut engine =
        EncryptionEngine::from_trailer(&rc4_dict(1, 2, 40, &RC4_40_O, &RC4_40_U), &DOCID).unwrap();
    assert_eq!(engine.key_length(), 5);
    assert_eq!(engine.verify(b"foo").unwrap(), PasswordType::Owner);
    assert_eq!(engine.key(), Some(&RC4_40_KEY[..]));
}

#[test]
fn test_rc4_40_user_password() {
    let mut engine =
        EncryptionEngine::from_trailer(&rc4_dict(1, 2, 40, &RC4_40_O, &RC4_40_U), &DOCID).unwrap();
    assert_eq!(engine.verify(b"baz").unwrap(), PasswordType::User);
    assert_eq!(engine.key(), Some(&RC4_40_KEY[..]));
}

#[test]
fn test_rc4_40_wrong_and_empty_password() {
    let mut engine =
        EncryptionEngine::from_trailer(&rc4_dict(1, 2, 40, &RC4_40_O, &RC4_40_U), &DOCID).unwrap();
    assert_eq!(engine.verify(b"wrong").unwrap(), PasswordType::NotDecrypted);
    assert_eq!(engine.verify(b"").unwrap(), PasswordType::NotDecrypted);
    assert!(!engine.is_decrypted());
    assert!(engine.key().is_none());
}

#[test]
fn test_r2_u_value_is_padding_encrypted() {
    let u = compute_u_value(&RC4_40_KEY, 2, &DOCID).unwrap();
    assert_eq!(u, RC4_40_U);
}

// --- Revision 3 ---

#[test]
fn test_rc4_128_passwords_give_same_key() {
    let dict = rc4_dict(2, 3, 128, &RC4_128_O, &RC4_128_U);

    let mut owner = EncryptionEngine::from_trailer(&dict, &DOCID).unwrap();
    assert_eq!(owner.verify(b"foo").unwrap(), PasswordType::Owner);
    assert_eq!(owner.key().map(<[u8]>::to_vec), Some(hex(RC4_128_KEY)));

    let mut user = EncryptionEngine::from_trailer(&dict, &DOCID).unwrap();
    assert_eq!(user.verify(b"baz").unwrap(), PasswordType::User);
    assert_eq!(user.key().map(<[u8]>::to_vec), Some(hex(RC4_128_KEY)));
}

#[test]
fn test_r3_values_from_passwords() {
    let o = compute_o_value(b"foo", b"baz", 3, 16).unwrap();
    assert_eq!(o, RC4_128_O);

    let params = KeyParams {
        revision: 3,
        key_len: 16,
        o: &RC4_128_O,
        u: &RC4_128_U,
        p: -4,
        id1: &DOCID,
        encrypt_metadata: true,
    };
    let key = compute_key_v4(&params, b"baz");
    assert_eq!(key, hex(RC4_128_KEY));
    let u = compute_u_value(&key, 3, &DOCID).unwrap();
    assert_eq!(u[..16], RC4_128_U[..16]);
    assert_eq!(u.len(), 32);
}

#[test]
fn test_rc4_string_decryption() {
    let mut engine =
        EncryptionEngine::from_trailer(&rc4_dict(2, 3, 128, &RC4_128_O, &RC4_128_U), &DOCID)
            .unwrap();
    engine.verify(b"baz").unwrap();
    let ciphertext = hex("643f0bb6386f5e70da45d6");
    let plain = engine
        .decrypt_object(PDFObject::ByteString(ciphertext), 4, 0)
        .unwrap();
    assert_eq!(plain.as_text().unwrap(), "Secret text");
}

#[test]
fn test_object_keys_differ_per_object() {
    let key = hex(RC4_128_KEY);
    let a = object_key(&key, CryptMethod::Rc4, 1, 0);
    assert_ne!(a, object_key(&key, CryptMethod::Rc4, 2, 0));
    assert_ne!(a, object_key(&key, CryptMethod::Rc4, 1, 1));
    assert_ne!(a, object_key(&key, CryptMethod::AesV2, 1, 0));
    // Object numbers only contribute their low three bytes.
    assert_eq!(
        object_key(&key, CryptMethod::Rc4, 0x0100_0001, 0),
        object_key(&key, CryptMethod::Rc4, 1, 0)
    );
}

// --- Revision 4 ---

#[test]
fn test_aes128_user_and_owner() {
    let mut user = EncryptionEngine::from_trailer(&aes128_dict(), &DOCID).unwrap();
    assert_eq!(user.stream_method(), CryptMethod::AesV2);
    assert_eq!(user.string_method(), CryptMethod::AesV2);
    assert_eq!(user.verify(b"user4").unwrap(), PasswordType::User);
    assert_eq!(user.key().map(<[u8]>::to_vec), Some(hex(AES128_KEY)));

    let mut owner = EncryptionEngine::from_trailer(&aes128_dict(), &DOCID).unwrap();
    assert_eq!(owner.verify(b"owner4").unwrap(), PasswordType::Owner);
    assert_eq!(owner.key().map(<[u8]>::to_vec), Some(hex(AES128_KEY)));
}

#[test]
fn test_aes128_encrypt_with_fixed_iv() {
    let mut engine = EncryptionEngine::from_trailer(&aes128_dict(), &DOCID).unwrap();
    engine.verify(b"user4").unwrap();
    let expected = hex("000102030405060708090a0b0c0d0e0f72f830c7ef184f2c1ca1ed55a21c860d");

    let ciphertext = engine.encrypt_bytes(b"Hello AES", 12, 0, Some(IV)).unwrap();
    assert_eq!(ciphertext, expected);

    let plain = engine
        .decrypt_bytes(&expected, 12, 0, CryptMethod::AesV2)
        .unwrap();
    assert_eq!(plain, b"Hello AES");
}

#[test]
fn test_aes_encrypt_requires_iv() {
    let mut engine = EncryptionEngine::from_trailer(&aes128_dict(), &DOCID).unwrap();
    engine.verify(b"user4").unwrap();
    assert!(matches!(
        engine.encrypt_bytes(b"x", 1, 0, None),
        Err(PdfError::EncryptionError(_))
    ));
}

#[test]
fn test_metadata_flag_changes_key() {
    let base = KeyParams {
        revision: 4,
        key_len: 16,
        o: &AES128_O,
        u: &AES128_U,
        p: AES128_P as i32,
        id1: &DOCID,
        encrypt_metadata: true,
    };
    let clear_metadata = KeyParams {
        encrypt_metadata: false,
        ..base
    };
    assert_eq!(compute_key_v4(&base, b"user4"), hex(AES128_KEY));
    assert_ne!(
        compute_key_v4(&clear_metadata, b"user4"),
        compute_key_v4(&base, b"user4")
    );
}

// --- Revision 5 ---

#[test]
fn test_aes256_r5_owner_and_user() {
    let dict = aes256_dict(5, -4, &AES256_O, &AES256_U, &AES256_OE, &AES256_UE);

    let mut owner = EncryptionEngine::from_trailer(&dict, &[]).unwrap();
    assert_eq!(owner.key_length(), 32);
    assert_eq!(owner.verify(b"foo").unwrap(), PasswordType::Owner);
    assert_eq!(owner.key().map(<[u8]>::to_vec), Some(hex(AES256_KEY)));

    let mut user = EncryptionEngine::from_trailer(&dict, &[]).unwrap();
    assert_eq!(user.verify(b"baz").unwrap(), PasswordType::User);
    assert_eq!(user.key().map(<[u8]>::to_vec), Some(hex(AES256_KEY)));
}

#[test]
fn test_aes256_r5_wrong_password() {
    let dict = aes256_dict(5, -4, &AES256_O, &AES256_U, &AES256_OE, &AES256_UE);
    let mut engine = EncryptionEngine::from_trailer(&dict, &[]).unwrap();
    assert_eq!(engine.verify(b"wrong").unwrap(), PasswordType::NotDecrypted);
    assert_eq!(engine.verify(b"").unwrap(), PasswordType::NotDecrypted);
}

#[test]
fn test_r5_hash_is_one_sha256() {
    let hash = calculate_hash(5, b"baz", &AES256_U[32..40], &[]).unwrap();
    assert_eq!(hash[..], AES256_U[..32]);
}

// --- Revision 6 ---

#[test]
fn test_r6_hash_vector() {
    let hash = calculate_hash(6, b"user6", &[1, 2, 3, 4, 5, 6, 7, 8], &[]).unwrap();
    assert_eq!(
        hash,
        hex("4f590eefa233d592ec1bc41f86c5b660f8d41ca47285ff3571dd3a89459cd9b2")
    );
}

#[test]
fn test_r6_user_and_owner() {
    let file_key: Vec<u8> = (0..32).collect();

    let mut user = EncryptionEngine::from_trailer(&r6_dict(), &[]).unwrap();
    assert_eq!(user.verify(b"user6").unwrap(), PasswordType::User);
    assert_eq!(user.key(), Some(&file_key[..]));

    let mut owner = EncryptionEngine::from_trailer(&r6_dict(), &[]).unwrap();
    assert_eq!(owner.verify(b"owner6").unwrap(), PasswordType::Owner);
    assert_eq!(owner.key(), Some(&file_key[..]));
    assert_eq!(owner.permissions(), -1028);
}

#[test]
fn test_r6_perms_block() {
    let file_key: Vec<u8> = (0..32).collect();
    assert!(verify_perms(&file_key, &R6_PERMS, R6_P as i32, true).unwrap());
    assert!(!verify_perms(&file_key, &R6_PERMS, -4, true).unwrap());
    assert!(!verify_perms(&file_key, &R6_PERMS, R6_P as i32, false).unwrap());
    assert!(!verify_perms(&file_key, &R6_PERMS[..8], R6_P as i32, true).unwrap());
}

#[test]
fn test_r6_aesv3_decrypt() {
    let mut engine = EncryptionEngine::from_trailer(&r6_dict(), &[]).unwrap();
    engine.verify(b"user6").unwrap();
    let ciphertext = hex("000102030405060708090a0b0c0d0e0f614952b6ea7051e8751f5defc0a2b7c7");
    // AES-256 ignores the object number.
    for objid in [1, 99] {
        let plain = engine
            .decrypt_object(PDFObject::ByteString(ciphertext.clone()), objid, 0)
            .unwrap();
        assert_eq!(plain.as_string().unwrap(), b"Hello, AES-256");
    }
    assert_eq!(
        engine.encrypt_bytes(b"Hello, AES-256", 5, 0, Some(IV)).unwrap(),
        ciphertext
    );
}

#[test]
fn test_r6_password_is_normalized() {
    // U+00AD (soft hyphen) maps to nothing under SASLprep.
    let mut engine = EncryptionEngine::from_trailer(&r6_dict(), &[]).unwrap();
    assert_eq!(
        engine.verify("user\u{00AD}6".as_bytes()).unwrap(),
        PasswordType::User
    );
}

// --- Object decryption ---

#[test]
fn test_decrypt_before_verify_fails() {
    let engine =
        EncryptionEngine::from_trailer(&rc4_dict(2, 3, 128, &RC4_128_O, &RC4_128_U), &DOCID)
            .unwrap();
    assert!(matches!(
        engine.decrypt_object(PDFObject::ByteString(vec![1, 2, 3]), 1, 0),
        Err(PdfError::FileNotDecrypted)
    ));
    // Values without strings still need a key.
    assert!(matches!(
        engine.decrypt_object(PDFObject::Int(1), 1, 0),
        Err(PdfError::FileNotDecrypted)
    ));
}

#[test]
fn test_decrypt_object_walks_containers() {
    let mut engine =
        EncryptionEngine::from_trailer(&rc4_dict(2, 3, 128, &RC4_128_O, &RC4_128_U), &DOCID)
            .unwrap();
    engine.verify(b"foo").unwrap();
    let secret = engine.encrypt_bytes(b"inner", 7, 0, None).unwrap();

    let mut dict = PDFDict::new();
    dict.insert("S".into(), PDFObject::ByteString(secret.clone()));
    dict.insert("N".into(), PDFObject::Int(3));
    let obj = PDFObject::Array(vec![PDFObject::Dict(dict), PDFObject::ByteString(secret)]);

    let plain = engine.decrypt_object(obj, 7, 0).unwrap();
    let items = plain.as_array().unwrap();
    assert_eq!(items[0].get("S").unwrap().as_string().unwrap(), b"inner");
    assert_eq!(items[0].get("N"), Some(&PDFObject::Int(3)));
    assert_eq!(items[1].as_string().unwrap(), b"inner");
}

#[test]
fn test_xref_stream_payload_is_not_decrypted() {
    let mut engine =
        EncryptionEngine::from_trailer(&rc4_dict(2, 3, 128, &RC4_128_O, &RC4_128_U), &DOCID)
            .unwrap();
    engine.verify(b"foo").unwrap();

    let mut attrs = PDFDict::new();
    attrs.insert("Type".into(), PDFObject::name("XRef"));
    let stream = quire_core::PDFStream::from_data(attrs, b"\x01\x02\x03".to_vec());
    let out = engine.decrypt_object(PDFObject::from(stream), 9, 0).unwrap();
    assert_eq!(out.as_stream().unwrap().get_rawdata(), b"\x01\x02\x03");
}

// --- Dictionary validation ---

#[test]
fn test_unsupported_handlers() {
    let mut dict = rc4_dict(2, 3, 128, &RC4_128_O, &RC4_128_U);
    dict.insert("Filter".into(), PDFObject::name("Adobe.PubSec"));
    assert!(matches!(
        EncryptionEngine::from_trailer(&dict, &DOCID),
        Err(PdfError::NotImplemented(_))
    ));

    let mut dict = rc4_dict(2, 3, 128, &RC4_128_O, &RC4_128_U);
    dict.insert("SubFilter".into(), PDFObject::name("adbe.pkcs7.s3"));
    assert!(matches!(
        EncryptionEngine::from_trailer(&dict, &DOCID),
        Err(PdfError::NotImplemented(_))
    ));

    let dict = rc4_dict(99, 99, 128, &RC4_128_O, &RC4_128_U);
    assert!(matches!(
        EncryptionEngine::from_trailer(&dict, &DOCID),
        Err(PdfError::NotImplemented(_))
    ));

    // Revision 5 belongs to V 5 only.
    let dict = rc4_dict(2, 5, 128, &RC4_128_O, &RC4_128_U);
    assert!(matches!(
        EncryptionEngine::from_trailer(&dict, &DOCID),
        Err(PdfError::NotImplemented(_))
    ));
}

#[test]
fn test_bad_key_length() {
    let dict = rc4_dict(2, 3, 44, &RC4_128_O, &RC4_128_U);
    assert!(matches!(
        EncryptionEngine::from_trailer(&dict, &DOCID),
        Err(PdfError::EncryptionError(_))
    ));
}

#[test]
fn test_short_o_value() {
    let dict = rc4_dict(2, 3, 128, &RC4_128_O[..10], &RC4_128_U);
    assert!(matches!(
        EncryptionEngine::from_trailer(&dict, &DOCID),
        Err(PdfError::EncryptionError(_))
    ));
}

#[test]
fn test_unknown_crypt_method() {
    let mut dict = aes128_dict();
    dict.insert("CF".into(), crypt_filters("FancyCrypt", 16));
    assert!(matches!(
        EncryptionEngine::from_trailer(&dict, &DOCID),
        Err(PdfError::NotImplemented(_))
    ));
}

#[test]
fn test_engine_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EncryptionEngine>();
}
