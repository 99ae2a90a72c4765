//! Info records (C3): small named auxiliary payloads (subtitles, chapter
//! marks, thumbnails) stored alongside the content blocks.
//!
//! An [`InfoRecord`] is a small map from name to payload. The container can
//! hold several of them side by side, each independently encrypted with its
//! own IV and described by its own [`crate::header::InfoRecordIndex`] slot —
//! this is what lets [`crate::stream::InfoRecordReader`] yield records
//! lazily, one ciphertext read and one decrypt per `next()` call, instead of
//! having to decrypt everything up front. A container that wants several
//! unrelated blobs encrypted under unrelated IVs uses several single-entry
//! `InfoRecord`s; one that wants a batch of related entries to share an IV
//! and a read groups them into one `InfoRecord` with multiple names.
//!
//! Plaintext layout of one `InfoRecord`, before encryption:
//!
//! ```text
//! count: u16 BE
//! count × { name: [u8; 1024] left-padded with NUL, len: u24 BE, data: [u8; len] }
//! ```
//!
//! A name shorter than 1024 bytes is left-padded with NUL bytes, not
//! right-padded, matching the original encoder. Decoding strips only a
//! *leading* run of NULs, not every NUL in the field: a name that
//! legitimately contains an embedded NUL byte (unlikely, but the field
//! format permits it) survives a round trip. The original implementation's
//! `unpad()` stripped NULs from both ends and warned if any remained in the
//! middle; this crate does not reproduce that over-eager stripping.
//!
//! Names are raw bytes, not `String`: the format places no UTF-8 constraint
//! on a name (only a length bound and "must not start with NUL"), so forcing
//! one through `String` would reject or mangle legitimate byte-name inputs
//! and silently break the round-trip property the format guarantees.

use crate::error::{ContainerError, Result};

/// Width in bytes of the fixed-size, NUL-padded name field.
pub const NAME_FIELD_LEN: usize = 1024;
/// Largest payload a single entry's 3-byte length field can describe.
pub const DATA_MAX_LEN: usize = (1 << 24) - 1;

/// Where an entry's bytes live until serialization forces them to be read.
/// Mirrors the writer's lazy-load behavior for content blocks: adding an
/// entry from a path does not read the file until `to_bytes` runs.
#[derive(Debug, Clone)]
pub enum PayloadSource {
    Owned(Vec<u8>),
    Path(std::path::PathBuf),
}

impl PayloadSource {
    fn materialize(&self) -> Result<Vec<u8>> {
        match self {
            PayloadSource::Owned(bytes) => Ok(bytes.clone()),
            PayloadSource::Path(path) => Ok(std::fs::read(path)?),
        }
    }
}

/// One named entry inside an [`InfoRecord`]. `name` is raw bytes (≤ 1024),
/// not text — the format imposes no encoding on it beyond the length bound.
#[derive(Debug, Clone)]
pub struct InfoEntry {
    pub name: Vec<u8>,
    pub source: PayloadSource,
}

/// A map from name to payload, serialized and encrypted as one unit. The
/// writer assigns each `InfoRecord` its own IV and its own
/// [`crate::header::InfoRecordIndex`] slot.
#[derive(Debug, Clone, Default)]
pub struct InfoRecord {
    entries: Vec<InfoEntry>,
}

impl InfoRecord {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Build a record holding a single named payload — the common case for
    /// a container that wants each attachment under its own IV.
    pub fn single(name: impl Into<Vec<u8>>, source: PayloadSource) -> Result<Self> {
        let mut record = Self::new();
        record.add(name, source)?;
        Ok(record)
    }

    /// Attach a named payload. Rejects names that would overflow the fixed
    /// 1024-byte field.
    pub fn add(&mut self, name: impl Into<Vec<u8>>, source: PayloadSource) -> Result<()> {
        let name = name.into();
        if name.len() > NAME_FIELD_LEN {
            return Err(ContainerError::NameTooLong);
        }
        self.entries.push(InfoEntry { name, source });
        Ok(())
    }

    /// Drop every entry whose name matches `name`. Returns the number removed.
    pub fn remove(&mut self, name: &[u8]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        before - self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[InfoEntry] {
        &self.entries
    }

    /// Serialize every entry in insertion order: `count` then each entry,
    /// reading lazy payload sources for the first time here.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in &self.entries {
            let data = entry.source.materialize()?;
            if data.len() > DATA_MAX_LEN {
                return Err(ContainerError::DataTooLong);
            }
            let name_bytes = &entry.name;
            let mut padded_name = vec![0u8; NAME_FIELD_LEN];
            padded_name[NAME_FIELD_LEN - name_bytes.len()..].copy_from_slice(name_bytes);
            buf.extend_from_slice(&padded_name);
            buf.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..4]);
            buf.extend_from_slice(&data);
        }
        Ok(buf)
    }

    /// Decode an already-decrypted plaintext blob back into entries. Each
    /// payload becomes [`PayloadSource::Owned`] since the decrypted bytes
    /// already live in memory by this point.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(ContainerError::HeaderCorrupt("info record shorter than its count field".into()));
        }
        let count = u16::from_be_bytes([data[0], data[1]]) as usize;
        let mut pos = 2;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            if data.len() < pos + NAME_FIELD_LEN + 3 {
                return Err(ContainerError::HeaderCorrupt("truncated info entry header".into()));
            }
            let name_field = &data[pos..pos + NAME_FIELD_LEN];
            pos += NAME_FIELD_LEN;
            let len = u32::from_be_bytes([0, data[pos], data[pos + 1], data[pos + 2]]) as usize;
            pos += 3;
            if data.len() < pos + len {
                return Err(ContainerError::HeaderCorrupt("truncated info entry payload".into()));
            }
            let payload = data[pos..pos + len].to_vec();
            pos += len;

            let first_non_nul = name_field.iter().position(|&b| b != 0).unwrap_or(name_field.len());
            let name = name_field[first_non_nul..].to_vec();

            entries.push(InfoEntry { name, source: PayloadSource::Owned(payload) });
        }
        Ok(Self { entries })
    }

    /// Consume the record, returning `(name, payload)` pairs with every
    /// payload materialized.
    pub fn into_entries(self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.entries
            .into_iter()
            .map(|e| e.source.materialize().map(|data| (e.name, data)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_multiple_entries_in_one_record() {
        let mut record = InfoRecord::new();
        record.add("subtitles.srt", PayloadSource::Owned(b"1\nhello\n".to_vec())).unwrap();
        record.add("chapters", PayloadSource::Owned(vec![])).unwrap();
        record.add("thumb.jpg", PayloadSource::Owned(vec![0xFF, 0xD8, 0xFF, 0xE0])).unwrap();

        let bytes = record.to_bytes().unwrap();
        let decoded = InfoRecord::from_bytes(&bytes).unwrap();
        let entries = decoded.into_entries().unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, b"subtitles.srt");
        assert_eq!(entries[1].1, Vec::<u8>::new());
        assert_eq!(entries[2].1, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn single_builds_a_one_entry_record() {
        let record = InfoRecord::single("title", PayloadSource::Owned(b"demo".to_vec())).unwrap();
        assert_eq!(record.len(), 1);
        let entries = record.into_entries().unwrap();
        assert_eq!(entries[0], (b"title".to_vec(), b"demo".to_vec()));
    }

    #[test]
    fn non_utf8_name_round_trips_byte_for_byte() {
        // Property #2 covers arbitrary byte-names, not just valid UTF-8 ones;
        // 0xFF and 0xFE are not valid UTF-8 lead bytes on their own.
        let name: Vec<u8> = vec![0xFF, 0x00, 0xFE, b'x'];
        let record = InfoRecord::single(name.clone(), PayloadSource::Owned(b"payload".to_vec())).unwrap();
        let bytes = record.to_bytes().unwrap();
        let decoded = InfoRecord::from_bytes(&bytes).unwrap().into_entries().unwrap();
        assert_eq!(decoded[0].0, name);
    }

    #[test]
    fn empty_record_serializes_to_just_a_zero_count() {
        let record = InfoRecord::new();
        let bytes = record.to_bytes().unwrap();
        assert_eq!(bytes, vec![0, 0]);
        assert!(InfoRecord::from_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn name_exactly_at_limit_is_accepted() {
        let name = "a".repeat(NAME_FIELD_LEN).into_bytes();
        let record = InfoRecord::single(name.clone(), PayloadSource::Owned(vec![1, 2, 3])).unwrap();
        let bytes = record.to_bytes().unwrap();
        let decoded = InfoRecord::from_bytes(&bytes).unwrap().into_entries().unwrap();
        assert_eq!(decoded[0].0, name);
    }

    #[test]
    fn name_over_limit_is_rejected() {
        let name = "a".repeat(NAME_FIELD_LEN + 1);
        let err = InfoRecord::single(name, PayloadSource::Owned(vec![])).unwrap_err();
        assert!(matches!(err, ContainerError::NameTooLong));
    }

    #[test]
    fn remove_drops_matching_entries() {
        let mut record = InfoRecord::new();
        record.add("a", PayloadSource::Owned(vec![1])).unwrap();
        record.add("b", PayloadSource::Owned(vec![2])).unwrap();
        record.add("a", PayloadSource::Owned(vec![3])).unwrap();
        assert_eq!(record.remove(b"a"), 2);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn leading_nuls_only_are_stripped_not_embedded_ones() {
        let record = InfoRecord::single("short", PayloadSource::Owned(vec![])).unwrap();
        let bytes = record.to_bytes().unwrap();
        let name_field = &bytes[2..2 + NAME_FIELD_LEN];
        assert_eq!(&name_field[NAME_FIELD_LEN - 5..], b"short");
        assert!(name_field[..NAME_FIELD_LEN - 5].iter().all(|&b| b == 0));
    }

    #[test]
    fn payload_materialized_from_path() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"from disk").unwrap();
        let record = InfoRecord::single("f", PayloadSource::Path(tmp.path().to_path_buf())).unwrap();
        let entries = record.into_entries().unwrap();
        assert_eq!(entries[0].1, b"from disk");
    }
}
