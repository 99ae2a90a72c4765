//! # evc — encrypted video container format
//!
//! Format guarantees:
//! - All multi-byte header fields are big-endian, including the non-native
//!   widths (5, 4, 3, and 2 byte integers) the header packs to stay compact
//! - The container is recognized by an 8-byte magic, `EV000001`; anything
//!   else is rejected as [`error::ContainerError::NotEncrypted`] rather than
//!   guessed at
//! - Content is split into independently AES-256-CBC-encrypted blocks, each
//!   with its own IV, so random access never needs more than one block
//!   decrypted to serve a read
//! - Info records (subtitles, chapter marks, arbitrary named blobs) are each
//!   encrypted independently too, and can be iterated lazily without
//!   decrypting the content blocks
//! - [`writer::write_encrypted`] is the only path that produces a container:
//!   it reserves header space, streams the encrypted body, and seeks back to
//!   patch the header once the real sizes are known
//! - [`stream::DecryptingStream`] is read-only and keeps one decrypted block
//!   cached; [`adapter::StreamRegistry`] wraps it behind opaque handles for
//!   host media engines that can't hold a Rust value across an FFI boundary

pub mod adapter;
pub mod codec;
pub mod error;
pub mod header;
pub mod info;
pub mod keystore;
pub mod stream;
pub mod writer;

pub use adapter::{parse_crypto_uri, HostEvent, StreamRegistry};
pub use codec::{IV_LEN, KEY_LEN};
pub use error::{ContainerError, Result};
pub use header::{ContentBlockIndex, Header, InfoRecordIndex, DEFAULT_BLOCK_SIZE, MAGIC};
pub use info::{InfoEntry, InfoRecord, PayloadSource};
pub use keystore::{KeyStatus, KeyStore, StaticKeyStore};
pub use stream::{DecryptingStream, InfoRecordReader};
pub use writer::write_encrypted;
