//! Host media engine adapter (C6).
//!
//! Media engines built around C callback tables (the pattern the teacher's
//! `plugin` module exposes for codecs) can't hold a Rust value across an FFI
//! boundary, so this hands out opaque `u64` handles instead, the same shape
//! as `crate::plugin`'s codec handles. [`StreamRegistry`] is the handle
//! table: `open` parses a crypto-scheme URI, resolves a key, and stores a
//! [`DecryptingStream`]; `read`/`seek`/`size`/`close` all take the handle the
//! engine was given back from `open`.
//!
//! Errors are NOT all treated the same at this boundary. The container
//! format's open callback must never fail on a missing or expired key — that
//! is the one guarantee host engines are built around, since a playback
//! engine that receives an error from `open` tends to tear down the whole
//! playback session rather than just skip a track. So:
//!
//! - Credential-tier errors ([`ContainerError::NoKey`], [`ContainerError::KeyExpired`])
//!   are swallowed: `open` still succeeds, the handle it returns maps to an
//!   empty, always-EOF [`StreamSlot::Empty`], and a [`HostEvent`] describing
//!   the degradation is pushed down the channel returned by
//!   [`StreamRegistry::new`] — this is the "no-key"/"timeout" event the host
//!   engine is expected to present, not just a log line.
//! - Structural (`NotEncrypted`, `HeaderCorrupt`) and runtime (`IoError`)
//!   errors are not credential problems and propagate normally — a missing
//!   file or a corrupt header is not something the engine can gracefully
//!   play around.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::codec::KEY_LEN;
use crate::error::{ContainerError, Result};
use crate::keystore::{KeyStatus, KeyStore};
use crate::stream::DecryptingStream;

/// What a registry slot holds: a live stream, or a credential-tier stand-in
/// that reports zero length and never yields any bytes.
enum StreamSlot {
    Active(DecryptingStream),
    Empty,
}

/// Out-of-band notification of what `open` did, delivered to the host over
/// the [`Receiver`] returned by [`StreamRegistry::new`]. A host media engine
/// polls or drains this channel on its own thread to decide whether to show
/// a "no key"/"timeout" indicator, independent of the `open` call itself
/// (which never fails for a credential-tier problem — see the module docs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Opened { handle: u64, uri: String },
    DegradedEmpty { uri: String, reason: &'static str },
}

/// Handle table bridging a host media engine's callback style to this
/// crate's owned, borrow-checked stream type.
pub struct StreamRegistry {
    streams: Mutex<HashMap<u64, StreamSlot>>,
    next_handle: AtomicU64,
    keystore: Arc<dyn KeyStore>,
    events: Sender<HostEvent>,
}

impl StreamRegistry {
    /// Build a registry and the receiving end of its [`HostEvent`] channel.
    /// The host is expected to drain the [`Receiver`] from its own thread;
    /// nothing inside this crate blocks on it filling up.
    pub fn new(keystore: Arc<dyn KeyStore>) -> (Self, Receiver<HostEvent>) {
        let (events, rx) = mpsc::channel();
        let registry = Self {
            streams: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            keystore,
            events,
        };
        (registry, rx)
    }

    /// Parse `uri`, resolve its key, and register a stream. Returns the
    /// handle to pass to every later call. See the module docs for which
    /// error tiers this swallows versus propagates.
    pub fn open(&self, uri: &str) -> Result<u64> {
        let (path, key_id) = parse_crypto_uri(uri)?;

        let slot = match self.keystore.lookup(key_id) {
            KeyStatus::Available(key) => match DecryptingStream::open(&path, key) {
                Ok(stream) => StreamSlot::Active(stream),
                Err(err @ ContainerError::NotEncrypted) | Err(err @ ContainerError::HeaderCorrupt(_)) => {
                    return Err(err)
                }
                Err(err @ ContainerError::IoError(_)) => return Err(err),
                Err(_) => {
                    self.emit(HostEvent::DegradedEmpty { uri: uri.to_string(), reason: "open failed credential-tier" });
                    StreamSlot::Empty
                }
            },
            KeyStatus::Expired => {
                log::warn!("crypto stream open for {uri}: key {key_id} expired, degrading to empty stream");
                self.emit(HostEvent::DegradedEmpty { uri: uri.to_string(), reason: "key expired" });
                StreamSlot::Empty
            }
            KeyStatus::Unknown => {
                log::warn!("crypto stream open for {uri}: no key {key_id}, degrading to empty stream");
                self.emit(HostEvent::DegradedEmpty { uri: uri.to_string(), reason: "no key" });
                StreamSlot::Empty
            }
        };

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        if let StreamSlot::Active(_) = slot {
            self.emit(HostEvent::Opened { handle, uri: uri.to_string() });
        }
        self.streams
            .lock()
            .expect("stream registry mutex poisoned")
            .insert(handle, slot);
        Ok(handle)
    }

    /// Push a [`HostEvent`] to the channel. The host may have dropped its
    /// `Receiver`; a full mailbox with no listener is not this crate's
    /// problem, so a failed send is silently ignored.
    fn emit(&self, event: HostEvent) {
        let _ = self.events.send(event);
    }

    pub fn read(&self, handle: u64, buf: &mut [u8]) -> Result<usize> {
        let mut streams = self.streams.lock().expect("stream registry mutex poisoned");
        match streams.get_mut(&handle) {
            Some(StreamSlot::Active(stream)) => stream.read(buf),
            Some(StreamSlot::Empty) => Ok(0),
            None => Err(unknown_handle(handle)),
        }
    }

    pub fn seek(&self, handle: u64, from: SeekFrom) -> Result<u64> {
        let mut streams = self.streams.lock().expect("stream registry mutex poisoned");
        match streams.get_mut(&handle) {
            Some(StreamSlot::Active(stream)) => stream.seek(from),
            Some(StreamSlot::Empty) => Ok(0),
            None => Err(unknown_handle(handle)),
        }
    }

    pub fn size(&self, handle: u64) -> Result<u64> {
        let streams = self.streams.lock().expect("stream registry mutex poisoned");
        match streams.get(&handle) {
            Some(StreamSlot::Active(stream)) => Ok(stream.size()),
            Some(StreamSlot::Empty) => Ok(0),
            None => Err(unknown_handle(handle)),
        }
    }

    /// Drop the slot for `handle`. Closing an unknown or already-closed
    /// handle is a no-op, matching the forgiving half of a C callback table
    /// where double-close is common under teardown races.
    pub fn close(&self, handle: u64) {
        if let Some(StreamSlot::Active(mut stream)) = self
            .streams
            .lock()
            .expect("stream registry mutex poisoned")
            .remove(&handle)
        {
            stream.close();
        }
    }
}

fn unknown_handle(handle: u64) -> ContainerError {
    ContainerError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no open stream for handle {handle}"),
    ))
}

/// Parse a crypto-scheme URI of the form `evcrypt://<path>?key=<id>` into a
/// filesystem path and a key identifier.
///
/// Windows paths carried in a URI authority/path component show up with a
/// leading slash before the drive letter (`evcrypt:///C:/movies/a.ev`); that
/// leading slash is stripped so the result is a path a local `File::open`
/// accepts directly, matching the original host integration's URI handling.
pub fn parse_crypto_uri(uri: &str) -> Result<(PathBuf, u64)> {
    let without_scheme = uri
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| bad_uri(uri, "missing scheme separator"))?;

    let (path_part, query) = without_scheme
        .split_once('?')
        .map(|(p, q)| (p, Some(q)))
        .unwrap_or((without_scheme, None));

    let key_id = query
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("key=")))
        .ok_or_else(|| bad_uri(uri, "missing key= query parameter"))?
        .parse::<u64>()
        .map_err(|_| bad_uri(uri, "key= query parameter is not an integer"))?;

    let decoded = percent_decode(path_part);
    let path = strip_windows_drive_slash(&decoded);

    Ok((PathBuf::from(path), key_id))
}

fn bad_uri(uri: &str, why: &str) -> ContainerError {
    ContainerError::IoError(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("malformed crypto stream URI {uri:?}: {why}"),
    ))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""), 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn strip_windows_drive_slash(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.first() == Some(&b'/') && bytes.len() > 2 && bytes[2] == b':' {
        &path[1..]
    } else {
        path
    }
}

/// Returns whether `path` looks like an encrypted container, for hosts that
/// need to decide whether to route a file through this adapter at all.
pub fn is_encrypted_container(path: impl AsRef<Path>) -> std::io::Result<bool> {
    crate::header::Header::is_encrypted_path(path)
}
