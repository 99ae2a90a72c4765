//! Shared error taxonomy for the container format, the codec, and the
//! decrypting stream.
//!
//! Unlike the teacher crate, which gives each module its own `thiserror`
//! enum (`SuperblockError`, `CryptoError`, `CodecError`, ...), this crate
//! has exactly one closed error taxonomy shared across every public
//! operation: the eight variants below are the whole surface, open/read/
//! seek/write all return the same `Result` alias.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    /// The first 8 bytes of the file are not the container magic.
    #[error("not an encrypted container")]
    NotEncrypted,

    /// The header parsed but failed a structural invariant (index size
    /// arithmetic, negative or misaligned region, etc.).
    #[error("container header is corrupt: {0}")]
    HeaderCorrupt(String),

    /// An info-record name exceeded the 1024-byte field width.
    #[error("info record name exceeds {limit} bytes", limit = crate::info::NAME_FIELD_LEN)]
    NameTooLong,

    /// An info-record payload exceeded the 3-byte length field's range.
    #[error("info record payload exceeds {limit} bytes", limit = (1u32 << 24) - 1)]
    DataTooLong,

    /// The external key store has no current key.
    #[error("no decryption key is available")]
    NoKey,

    /// The external key store's current key has expired.
    #[error("decryption key has expired")]
    KeyExpired,

    /// The underlying cipher rejected an IV, a padding, or a ciphertext.
    #[error("cryptographic operation failed: {0}")]
    CryptoError(String),

    /// Any I/O failure underneath the container.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ContainerError>;
