//! Header codec (C2) — the container preamble: magic, sizes, and the two
//! index tables.
//!
//! # On-disk layout (all fields big-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      8   magic              = "EV000001" (8 ASCII bytes)
//!    8      5   file_size          total container size (BE u40-in-u64)
//!   13      4   head_size          bytes in this header, incl. this field
//!   17      5   raw_file_size      plaintext length of the source
//!   22      5   info_index_size    = 20 * info_index_count
//!   27      2   info_index_count
//!   29    N×20  info_index[]       one InfoRecordIndex per info record
//!  29+N×20 M×32 block_index[]      one ContentBlockIndex per content block
//! ```
//!
//! `head_size` sits at a fixed offset (13) specifically so [`read_header_block`]
//! can materialise the whole header in one contiguous read after a single
//! seek: seek to 13, read 4 bytes, seek back to 0, read `head_size` bytes.
//!
//! Unlike the teacher's `Superblock`, `head_size`, `info_index_size`, and
//! `info_index_count` are not stored fields here — they are computed from
//! `info_index.len()` / `block_index.len()` on demand, so there is no
//! `update_head_size()` step that callers can forget to invoke before
//! serializing.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{ContainerError, Result};

pub const MAGIC: &[u8; 8] = b"EV000001";
pub const DEFAULT_BLOCK_SIZE: usize = 1_048_576;

const MAGIC_LEN: usize = 8;
const FILE_SIZE_LEN: usize = 5;
const HEAD_SIZE_LEN: usize = 4;
const RAW_FILE_SIZE_LEN: usize = 5;
const INFO_INDEX_SIZE_LEN: usize = 5;
const INFO_INDEX_COUNT_LEN: usize = 2;

/// Fixed prelude length: magic + file_size + head_size + raw_file_size +
/// info_index_size + info_index_count.
const PRELUDE_LEN: usize =
    MAGIC_LEN + FILE_SIZE_LEN + HEAD_SIZE_LEN + RAW_FILE_SIZE_LEN + INFO_INDEX_SIZE_LEN + INFO_INDEX_COUNT_LEN;

/// Offset of `head_size`: magic (8) + file_size (5).
const HEAD_SIZE_OFFSET: u64 = (MAGIC_LEN + FILE_SIZE_LEN) as u64;

pub const INFO_RECORD_INDEX_LEN: usize = 20;
pub const CONTENT_BLOCK_INDEX_LEN: usize = 32;

// ── ContentBlockIndex ────────────────────────────────────────────────────────

/// One entry per content block, 32 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentBlockIndex {
    /// IV used to encrypt this block.
    pub iv: [u8; 16],
    /// Absolute offset of the ciphertext block within the container file.
    pub start_pos: u64,
    /// Absolute offset of this block's first plaintext byte in the source.
    pub raw_start_pos: u64,
    /// Plaintext length of this block.
    pub data_size: u64,
    /// Ciphertext length of this block.
    pub block_size: u64,
}

impl ContentBlockIndex {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.iv);
        put_uint_be(buf, self.start_pos, 5);
        put_uint_be(buf, self.raw_start_pos, 5);
        put_uint_be(buf, self.data_size, 3);
        put_uint_be(buf, self.block_size, 3);
    }

    fn read(data: &[u8]) -> Self {
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&data[0..16]);
        Self {
            iv,
            start_pos: get_uint_be(&data[16..21]),
            raw_start_pos: get_uint_be(&data[21..26]),
            data_size: get_uint_be(&data[26..29]),
            block_size: get_uint_be(&data[29..32]),
        }
    }
}

// ── InfoRecordIndex ──────────────────────────────────────────────────────────

/// One entry per info record, 20 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfoRecordIndex {
    /// Ciphertext length of this info record.
    pub length: u32,
    /// IV used to encrypt this record.
    pub iv: [u8; 16],
}

impl InfoRecordIndex {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.extend_from_slice(&self.iv);
    }

    fn read(data: &[u8]) -> Self {
        let length = u32::from_be_bytes(data[0..4].try_into().unwrap());
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&data[4..20]);
        Self { length, iv }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// The container preamble. Immutable once written; the decrypting stream
/// holds one of these parsed straight from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Total on-disk container size, including this header.
    pub file_size: u64,
    /// Plaintext length of the original source file.
    pub raw_file_size: u64,
    pub info_index: Vec<InfoRecordIndex>,
    pub block_index: Vec<ContentBlockIndex>,
}

impl Header {
    /// An empty header with no blocks and no info records.
    pub fn new() -> Self {
        Self {
            file_size: 0,
            raw_file_size: 0,
            info_index: Vec::new(),
            block_index: Vec::new(),
        }
    }

    /// Total header size in bytes, including the magic and this field.
    pub fn head_size(&self) -> u32 {
        (PRELUDE_LEN
            + self.info_index.len() * INFO_RECORD_INDEX_LEN
            + self.block_index.len() * CONTENT_BLOCK_INDEX_LEN) as u32
    }

    /// Total bytes occupied by the info-index table.
    pub fn info_index_size(&self) -> u64 {
        self.info_index.len() as u64 * INFO_RECORD_INDEX_LEN as u64
    }

    /// Build a header from an on-disk source file: stats the path, computes
    /// `raw_file_size`, and pre-allocates one empty `ContentBlockIndex` per
    /// block the writer will need to fill in. The info index starts empty;
    /// the writer assigns it once it knows how many info records there are.
    pub fn from_raw_file(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let raw_file_size = fs::metadata(path.as_ref())?.len();
        let block_count = if raw_file_size == 0 {
            0
        } else {
            ((raw_file_size + block_size as u64 - 1) / block_size as u64) as usize
        };
        Ok(Self {
            file_size: 0,
            raw_file_size,
            info_index: Vec::new(),
            block_index: vec![ContentBlockIndex::default(); block_count],
        })
    }

    /// Emit the fixed prelude, then the info index, then the block index.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.head_size() as usize);
        buf.extend_from_slice(MAGIC);
        put_uint_be(&mut buf, self.file_size, FILE_SIZE_LEN);
        put_uint_be(&mut buf, self.head_size() as u64, HEAD_SIZE_LEN);
        put_uint_be(&mut buf, self.raw_file_size, RAW_FILE_SIZE_LEN);
        put_uint_be(&mut buf, self.info_index_size(), INFO_INDEX_SIZE_LEN);
        buf.extend_from_slice(&(self.info_index.len() as u16).to_be_bytes());
        for entry in &self.info_index {
            entry.write(&mut buf);
        }
        for entry in &self.block_index {
            entry.write(&mut buf);
        }
        buf
    }

    /// Inverse of [`Header::to_bytes`]. Validates the magic, the
    /// `info_index_size`/`info_index_count` relationship, and that the
    /// remaining block-index region is a non-negative multiple of 32 bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < PRELUDE_LEN {
            return Err(ContainerError::HeaderCorrupt(
                "header shorter than the fixed prelude".into(),
            ));
        }
        if &data[0..MAGIC_LEN] != MAGIC {
            return Err(ContainerError::NotEncrypted);
        }

        let mut pos = MAGIC_LEN;
        let file_size = get_uint_be(&data[pos..pos + FILE_SIZE_LEN]);
        pos += FILE_SIZE_LEN;
        let head_size = get_uint_be(&data[pos..pos + HEAD_SIZE_LEN]);
        pos += HEAD_SIZE_LEN;
        let raw_file_size = get_uint_be(&data[pos..pos + RAW_FILE_SIZE_LEN]);
        pos += RAW_FILE_SIZE_LEN;
        let info_index_size = get_uint_be(&data[pos..pos + INFO_INDEX_SIZE_LEN]);
        pos += INFO_INDEX_SIZE_LEN;
        let info_index_count =
            u16::from_be_bytes(data[pos..pos + INFO_INDEX_COUNT_LEN].try_into().unwrap()) as usize;
        pos += INFO_INDEX_COUNT_LEN;

        if info_index_size != info_index_count as u64 * INFO_RECORD_INDEX_LEN as u64 {
            return Err(ContainerError::HeaderCorrupt(format!(
                "info_index_size {info_index_size} does not match {info_index_count} entries"
            )));
        }

        let info_region_len = info_index_count * INFO_RECORD_INDEX_LEN;
        if data.len() < pos + info_region_len {
            return Err(ContainerError::HeaderCorrupt("truncated info index".into()));
        }
        let mut info_index = Vec::with_capacity(info_index_count);
        for i in 0..info_index_count {
            let start = pos + i * INFO_RECORD_INDEX_LEN;
            info_index.push(InfoRecordIndex::read(&data[start..start + INFO_RECORD_INDEX_LEN]));
        }
        pos += info_region_len;

        let fixed_prelude_and_info = PRELUDE_LEN as u64 + info_index_size;
        if head_size < fixed_prelude_and_info {
            return Err(ContainerError::HeaderCorrupt(
                "head_size smaller than the fixed prelude plus the info index".into(),
            ));
        }
        let block_region_len = head_size - fixed_prelude_and_info;
        if block_region_len % CONTENT_BLOCK_INDEX_LEN as u64 != 0 {
            return Err(ContainerError::HeaderCorrupt(format!(
                "block index region of {block_region_len} bytes is not a multiple of {CONTENT_BLOCK_INDEX_LEN}"
            )));
        }
        let block_count = (block_region_len / CONTENT_BLOCK_INDEX_LEN as u64) as usize;
        if data.len() < pos + block_count * CONTENT_BLOCK_INDEX_LEN {
            return Err(ContainerError::HeaderCorrupt("truncated block index".into()));
        }
        let mut block_index = Vec::with_capacity(block_count);
        for i in 0..block_count {
            let start = pos + i * CONTENT_BLOCK_INDEX_LEN;
            block_index.push(ContentBlockIndex::read(&data[start..start + CONTENT_BLOCK_INDEX_LEN]));
        }

        Ok(Self {
            file_size,
            raw_file_size,
            info_index,
            block_index,
        })
    }

    /// Peek the first 8 bytes of a seekable stream and compare to the magic,
    /// restoring the original read position regardless of outcome.
    pub fn is_encrypted_stream<S: Read + Seek>(stream: &mut S) -> io::Result<bool> {
        let start = stream.stream_position()?;
        let mut buf = [0u8; MAGIC_LEN];
        let matched = match stream.read_exact(&mut buf) {
            Ok(()) => &buf == MAGIC,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(e),
        };
        stream.seek(SeekFrom::Start(start))?;
        Ok(matched)
    }

    /// Convenience form of [`Header::is_encrypted_stream`] over a path.
    pub fn is_encrypted_path(path: impl AsRef<Path>) -> io::Result<bool> {
        Self::is_encrypted_stream(&mut fs::File::open(path)?)
    }

    /// Seek to offset 13 (magic + file_size), read 4 bytes to recover
    /// `head_size`, seek back to 0, and read exactly `head_size` bytes.
    pub fn read_header_block<S: Read + Seek>(stream: &mut S) -> io::Result<Vec<u8>> {
        stream.seek(SeekFrom::Start(HEAD_SIZE_OFFSET))?;
        let mut head_size_buf = [0u8; HEAD_SIZE_LEN];
        stream.read_exact(&mut head_size_buf)?;
        let head_size = get_uint_be(&head_size_buf) as usize;
        stream.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; head_size];
        stream.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

// ── Big-endian helpers for field widths narrower than a native integer ─────

fn put_uint_be(buf: &mut Vec<u8>, value: u64, width: usize) {
    let bytes = value.to_be_bytes();
    buf.extend_from_slice(&bytes[8 - width..]);
}

fn get_uint_be(field: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr[8 - field.len()..].copy_from_slice(field);
    u64::from_be_bytes(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            file_size: 12345,
            raw_file_size: 2560,
            info_index: vec![
                InfoRecordIndex { length: 48, iv: [1u8; 16] },
                InfoRecordIndex { length: 4112, iv: [2u8; 16] },
            ],
            block_index: vec![
                ContentBlockIndex { iv: [3u8; 16], start_pos: 100, raw_start_pos: 0, data_size: 1024, block_size: 1040 },
                ContentBlockIndex { iv: [4u8; 16], start_pos: 1140, raw_start_pos: 1024, data_size: 1024, block_size: 1040 },
                ContentBlockIndex { iv: [5u8; 16], start_pos: 2180, raw_start_pos: 2048, data_size: 512, block_size: 528 },
            ],
        }
    }

    #[test]
    fn round_trip() {
        let header = sample_header();
        let bytes = header.to_bytes();
        let decoded = Header::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn head_size_matches_invariant_2() {
        let header = sample_header();
        let expected = 29 + 20 * header.info_index.len() + 32 * header.block_index.len();
        assert_eq!(header.head_size() as usize, expected);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(Header::from_bytes(&bytes), Err(ContainerError::NotEncrypted)));
    }

    #[test]
    fn rejects_misaligned_block_region() {
        let header = sample_header();
        let mut bytes = header.to_bytes();
        // Shrink head_size by one byte without touching the tables —
        // the derived block-region length is no longer a multiple of 32.
        let head_size = header.head_size() - 1;
        bytes[13..17].copy_from_slice(&head_size.to_be_bytes());
        assert!(matches!(Header::from_bytes(&bytes), Err(ContainerError::HeaderCorrupt(_))));
    }

    #[test]
    fn from_raw_file_zero_length_has_no_blocks() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let header = Header::from_raw_file(tmp.path(), DEFAULT_BLOCK_SIZE).unwrap();
        assert_eq!(header.raw_file_size, 0);
        assert!(header.block_index.is_empty());
    }

    #[test]
    fn from_raw_file_splits_into_blocks() {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&vec![0u8; 2560]).unwrap();
        let header = Header::from_raw_file(tmp.path(), 1024).unwrap();
        assert_eq!(header.raw_file_size, 2560);
        assert_eq!(header.block_index.len(), 3);
    }

    #[test]
    fn read_header_block_recovers_exact_bytes() {
        let header = sample_header();
        let bytes = header.to_bytes();
        let mut cursor = io::Cursor::new(bytes.clone());
        let recovered = Header::read_header_block(&mut cursor).unwrap();
        assert_eq!(recovered, bytes);
    }

    #[test]
    fn is_encrypted_stream_restores_position() {
        let header = sample_header();
        let mut cursor = io::Cursor::new(header.to_bytes());
        cursor.seek(SeekFrom::Start(3)).unwrap();
        assert!(Header::is_encrypted_stream(&mut cursor).unwrap());
        assert_eq!(cursor.stream_position().unwrap(), 3);
    }

    #[test]
    fn is_encrypted_stream_false_for_random_bytes() {
        let mut cursor = io::Cursor::new(b"not a container at all".to_vec());
        assert!(!Header::is_encrypted_stream(&mut cursor).unwrap());
    }
}
