//! Codec (C1): the cipher wrapper the rest of the container format is built on.
//!
//! AES-256 in CBC mode with PKCS#7 padding. `encrypt` picks a fresh IV from
//! the OS RNG on every call; `decrypt` recovers the plaintext given the key,
//! the IV, and (when known) the exact plaintext length. Info records call
//! `decrypt` with no expected length and trust the PKCS#7 pad instead — their
//! true length lives inside the record's own serialized `count` field, not
//! the container header.
//!
//! This is deliberately not an AEAD: unlike the teacher's AES-256-GCM
//! (`crate::crypto` in the teacher crate), CBC has no authentication tag, so
//! a corrupted ciphertext surfaces as a padding failure or, worse, silently
//! wrong bytes if the corruption happens to leave valid padding. The format
//! accepts that trade-off — see DESIGN.md for why CBC was chosen over GCM.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::{ContainerError, Result};

/// Byte length of the symmetric key this codec expects.
pub const KEY_LEN: usize = 32;
/// Byte length of the IV this codec generates and consumes.
pub const IV_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt `plaintext` under `key` with a fresh random IV.
///
/// Returns `(iv, ciphertext)`. PKCS#7 pads the plaintext to the next 16-byte
/// boundary and always adds at least one byte of padding, so an empty
/// plaintext yields a 16-byte, non-empty ciphertext, and expansion never
/// exceeds one block (16 bytes), well inside the format's 32-byte bound.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> ([u8; IV_LEN], Vec<u8>) {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
        .expect("key and IV are fixed-size arrays, never the wrong length")
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    (iv, ciphertext)
}

/// Decrypt `ciphertext` under `key` and `iv`.
///
/// When `plaintext_len` is `Some`, the result is verified to have exactly
/// that length — this is how content blocks recover their plaintext size,
/// since CBC/PKCS#7 alone only guarantees the padding was well-formed, not
/// that the caller's expectation matches. When `None`, whatever length the
/// padding scheme yields is returned unchecked (used for info records, whose
/// length is self-describing once decrypted).
pub fn decrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
    plaintext_len: Option<usize>,
) -> Result<Vec<u8>> {
    #[cfg(test)]
    DECRYPT_CALLS.with(|c| c.set(c.get() + 1));

    let plaintext = Aes256CbcDec::new_from_slices(key, iv)
        .expect("key and IV are fixed-size arrays, never the wrong length")
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ContainerError::CryptoError("bad padding or corrupted ciphertext".into()))?;

    if let Some(expected) = plaintext_len {
        if plaintext.len() != expected {
            return Err(ContainerError::CryptoError(format!(
                "decrypted {} bytes, expected exactly {expected}",
                plaintext.len()
            )));
        }
    }

    Ok(plaintext)
}

/// Test-only instrumentation: counts `decrypt` calls made on the current
/// thread, so a test can assert a cache hit didn't fall through to a real
/// decrypt. Thread-local rather than a crate-global counter because cargo
/// runs tests in parallel on separate threads and a shared counter would pick
/// up unrelated tests' decrypt calls.
#[cfg(test)]
thread_local! {
    static DECRYPT_CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

#[cfg(test)]
pub(crate) fn decrypt_call_count() -> usize {
    DECRYPT_CALLS.with(|c| c.get())
}
