//! Decrypting stream (C5): random-access, read-only playback of a container's
//! plaintext, plus a lazy iterator over its info records.
//!
//! [`DecryptingStream`] moves through three states: freshly opened it has
//! read and validated the header (`HEADER_READY`), any `read`/`seek` call
//! moves it to `OPEN`, and [`DecryptingStream::close`] moves it to `CLOSED`
//! for good — every operation after that returns [`ContainerError::IoError`].
//! There is no reopen; callers construct a new stream instead.
//!
//! A single decrypted block is cached at a time. Sequential reads, the
//! dominant access pattern for playback, hit the cache on every call after
//! the first; random seeks pay one decrypt per landing block. This mirrors
//! the teacher's CAS read path, which also keeps exactly one decoded block
//! resident rather than memoizing the whole file.
//!
//! Block lookup is a binary search over `raw_start_pos` via
//! [`Vec::partition_point`], not the linear, off-by-one-prone scan the
//! original encoder's `seek()` used (see DESIGN.md).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::{ContainerError, Result};
use crate::header::Header;
use crate::info::InfoRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    HeaderReady,
    Open,
    Closed,
}

/// A decrypted, seekable view over one container's plaintext content.
pub struct DecryptingStream {
    file: File,
    path: PathBuf,
    header: Header,
    key: [u8; codec::KEY_LEN],
    pos: u64,
    cache: Option<(usize, Vec<u8>)>,
    state: StreamState,
}

impl DecryptingStream {
    /// Open `path`, read and validate its header, and position at offset 0.
    pub fn open(path: impl AsRef<Path>, key: [u8; codec::KEY_LEN]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let header_bytes = Header::read_header_block(&mut file)?;
        let header = Header::from_bytes(&header_bytes)?;
        Ok(Self {
            file,
            path,
            header,
            key,
            pos: 0,
            cache: None,
            state: StreamState::HeaderReady,
        })
    }

    /// Total plaintext length of the source this container holds.
    pub fn size(&self) -> u64 {
        self.header.raw_file_size
    }

    /// Current logical read position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Move the read position. Mirrors `std::io::Seek`'s `SeekFrom` offsets,
    /// clamped to `[0, size()]`.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64> {
        self.ensure_open()?;
        let size = self.size() as i64;
        let target = match from {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => size + delta,
        };
        if target < 0 {
            return Err(ContainerError::HeaderCorrupt("seek before the start of the stream".into()));
        }
        self.pos = (target as u64).min(self.size());
        self.state = StreamState::Open;
        Ok(self.pos)
    }

    /// Fill `buf` starting at the current position, advancing it by the
    /// number of bytes actually read. Returns `0` at end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        self.state = StreamState::Open;

        let mut written = 0;
        while written < buf.len() && self.pos < self.size() {
            let block_idx = match self.block_at(self.pos) {
                Some(idx) => idx,
                None => break,
            };
            let plaintext = self.decrypt_block(block_idx)?;
            let block = self.header.block_index[block_idx];
            let offset_in_block = (self.pos - block.raw_start_pos) as usize;
            let available = plaintext.len() - offset_in_block;
            let want = (buf.len() - written).min(available);

            buf[written..written + want].copy_from_slice(&plaintext[offset_in_block..offset_in_block + want]);
            written += want;
            self.pos += want as u64;
        }
        Ok(written)
    }

    /// Close the stream. Every later call returns an I/O error.
    pub fn close(&mut self) {
        self.state = StreamState::Closed;
        self.cache = None;
    }

    /// A fresh, independent iterator over this container's info records.
    pub fn info_records(&self) -> Result<InfoRecordReader> {
        self.ensure_open()?;
        InfoRecordReader::new(&self.path, self.key, &self.header)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(ContainerError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "stream is closed",
            )));
        }
        Ok(())
    }

    /// Binary search for the block whose `[raw_start_pos, raw_start_pos +
    /// data_size)` half-open interval contains `pos`.
    fn block_at(&self, pos: u64) -> Option<usize> {
        if pos >= self.size() {
            return None;
        }
        let idx = self.header.block_index.partition_point(|b| b.raw_start_pos <= pos);
        idx.checked_sub(1)
    }

    fn decrypt_block(&mut self, idx: usize) -> Result<Vec<u8>> {
        if let Some((cached_idx, plaintext)) = &self.cache {
            if *cached_idx == idx {
                return Ok(plaintext.clone());
            }
        }
        let block = self.header.block_index[idx];
        self.file.seek(SeekFrom::Start(block.start_pos))?;
        let mut ciphertext = vec![0u8; block.block_size as usize];
        self.file.read_exact(&mut ciphertext)?;
        let plaintext = codec::decrypt(&self.key, &block.iv, &ciphertext, Some(block.data_size as usize))?;
        self.cache = Some((idx, plaintext.clone()));
        Ok(plaintext)
    }
}

/// Lazy, forward-only iterator over a container's info records, yielding one
/// fully decoded [`InfoRecord`] per header [`crate::header::InfoRecordIndex`]
/// slot. Holds its own file handle, independent of any [`DecryptingStream`]
/// that spawned it, so a caller can iterate info records while a stream
/// reads content blocks.
pub struct InfoRecordReader {
    file: File,
    key: [u8; codec::KEY_LEN],
    index: Vec<crate::header::InfoRecordIndex>,
    next: usize,
    cursor: u64,
}

impl InfoRecordReader {
    fn new(path: &Path, key: [u8; codec::KEY_LEN], header: &Header) -> Result<Self> {
        let file = File::open(path)?;
        // The info section immediately follows the header; content blocks
        // come after it (see the writer's body layout).
        let cursor = header.head_size() as u64;
        Ok(Self {
            file,
            key,
            index: header.info_index.clone(),
            next: 0,
            cursor,
        })
    }
}

impl Iterator for InfoRecordReader {
    type Item = Result<InfoRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.index.len() {
            return None;
        }
        let slot = self.index[self.next];
        self.next += 1;

        let result = (|| {
            self.file.seek(SeekFrom::Start(self.cursor))?;
            let mut ciphertext = vec![0u8; slot.length as usize];
            self.file.read_exact(&mut ciphertext)?;
            let plaintext = codec::decrypt(&self.key, &slot.iv, &ciphertext, None)?;
            InfoRecord::from_bytes(&plaintext)
        })();

        self.cursor += slot.length as u64;
        Some(result)
    }
}
