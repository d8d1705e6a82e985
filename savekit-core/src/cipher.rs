//! AES-CBC encryption and decryption of save payloads
//!
//! Ciphertext is produced with PKCS#7 padding under an all-zero IV and is
//! carried as standard base64 text. The scheme is deterministic: the same key
//! and plaintext always give the same ciphertext, and there is no
//! authentication tag, so tampering is only caught when it breaks the padding.

use aes::{Aes128, Aes192, Aes256};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::error::CryptoError;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Fixed initialization vector used for every encrypt and decrypt
pub const IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(CryptoError::KeyLength(n)),
    }
}

/// Encrypts raw bytes; the key length selects AES-128/192/256
pub fn encrypt_bytes(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key(key)?;
    let bad_key = |_| CryptoError::KeyLength(key.len());

    let enc = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, &IV)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, &IV)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        _ => cbc::Encryptor::<Aes256>::new_from_slices(key, &IV)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
    };

    Ok(enc)
}

/// Decrypts raw bytes and strips the PKCS#7 padding
pub fn decrypt_bytes(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key(key)?;

    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::BlockLength(data.len()));
    }

    let bad_key = |_| CryptoError::KeyLength(key.len());
    let plain = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, &IV)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(data),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, &IV)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(data),
        _ => cbc::Decryptor::<Aes256>::new_from_slices(key, &IV)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(data),
    };

    plain.map_err(|_| CryptoError::Padding)
}

/// Encrypts UTF-8 text and returns the ciphertext as base64
pub fn encrypt(key: &[u8], plain_text: &str) -> Result<String, CryptoError> {
    let enc = encrypt_bytes(key, plain_text.as_bytes())?;
    Ok(STANDARD.encode(enc))
}

/// Decrypts base64 ciphertext back into UTF-8 text
pub fn decrypt(key: &[u8], cipher_text: &str) -> Result<String, CryptoError> {
    // Tolerate a trailing newline left by editors
    let raw = STANDARD.decode(cipher_text.trim())?;
    let plain = decrypt_bytes(key, &raw)?;
    Ok(String::from_utf8(plain)?)
}
