//! Writer (C4): the only code path that produces a container file.
//!
//! The header's final shape (total file size, every block's position and
//! size, every info record's length and IV) is only known once the whole
//! body has been written, so this writes a zero-filled placeholder header
//! first to reserve its exact byte count, streams the encrypted body after
//! it, and then seeks back to offset 0 to patch in the real header. This
//! mirrors the teacher's `io_stream` writer, which reserves its block-table
//! trailer the same way before a final seek-back.
//!
//! On-disk body layout after the header: every info record's ciphertext, in
//! the order records were supplied, followed by every content block's
//! ciphertext, in source order. A content block's `start_pos` is therefore
//! `head_size + (sum of all info record ciphertext lengths)` for the first
//! block, not `head_size` alone.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::codec;
use crate::header::{ContentBlockIndex, Header, InfoRecordIndex, DEFAULT_BLOCK_SIZE};
use crate::info::InfoRecord;

/// Encrypt `source` into a new container at `dest`, splitting the plaintext
/// into `block_size`-byte content blocks and attaching `info_records` (if
/// any) as independently encrypted info records, each under its own IV.
///
/// `block_size` of `0` uses [`DEFAULT_BLOCK_SIZE`].
pub fn write_encrypted(
    source: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    key: &[u8; codec::KEY_LEN],
    block_size: usize,
    info_records: &[InfoRecord],
) -> crate::error::Result<()> {
    let block_size = if block_size == 0 { DEFAULT_BLOCK_SIZE } else { block_size };

    let mut header = Header::from_raw_file(source.as_ref(), block_size)?;
    header.info_index = vec![InfoRecordIndex::default(); info_records.len()];

    let mut out = File::create(dest.as_ref())?;
    out.write_all(&header.to_bytes())?;

    for (slot, record) in header.info_index.iter_mut().zip(info_records) {
        let plaintext = record.to_bytes()?;
        let (iv, ciphertext) = codec::encrypt(key, &plaintext);
        *slot = InfoRecordIndex {
            length: ciphertext.len() as u32,
            iv,
        };
        out.write_all(&ciphertext)?;
    }

    let mut src = File::open(source.as_ref())?;
    let mut raw_pos: u64 = 0;
    let mut read_buf = vec![0u8; block_size];
    for block in header.block_index.iter_mut() {
        let mut filled = 0usize;
        while filled < block_size {
            let n = src.read(&mut read_buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let plaintext = &read_buf[..filled];
        let (iv, ciphertext) = codec::encrypt(key, plaintext);

        *block = ContentBlockIndex {
            iv,
            start_pos: out.stream_position()?,
            raw_start_pos: raw_pos,
            data_size: plaintext.len() as u64,
            block_size: ciphertext.len() as u64,
        };
        out.write_all(&ciphertext)?;

        raw_pos += plaintext.len() as u64;
    }

    header.file_size = out.stream_position()?;
    out.seek(SeekFrom::Start(0))?;
    out.write_all(&header.to_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header as ContainerHeader;
    use crate::info::PayloadSource;
    use std::io::Read as _;

    const KEY: [u8; codec::KEY_LEN] = [0x11; codec::KEY_LEN];

    #[test]
    fn header_is_patched_with_real_file_size() {
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), vec![7u8; 3000]).unwrap();
        let dest = tempfile::NamedTempFile::new().unwrap();

        write_encrypted(src.path(), dest.path(), &KEY, 1024, &[]).unwrap();

        let mut file = File::open(dest.path()).unwrap();
        let actual_len = file.metadata().unwrap().len();
        let header_bytes = ContainerHeader::read_header_block(&mut file).unwrap();
        let header = ContainerHeader::from_bytes(&header_bytes).unwrap();

        assert_eq!(header.file_size, actual_len);
        assert_eq!(header.raw_file_size, 3000);
        assert_eq!(header.block_index.len(), 3);
    }

    #[test]
    fn blocks_are_contiguous_and_placed_right_after_header_with_no_info() {
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), vec![9u8; 2500]).unwrap();
        let dest = tempfile::NamedTempFile::new().unwrap();

        write_encrypted(src.path(), dest.path(), &KEY, 1000, &[]).unwrap();

        let mut file = File::open(dest.path()).unwrap();
        let header_bytes = ContainerHeader::read_header_block(&mut file).unwrap();
        let header = ContainerHeader::from_bytes(&header_bytes).unwrap();

        assert_eq!(header.block_index[0].start_pos, header.head_size() as u64);
        for pair in header.block_index.windows(2) {
            assert_eq!(pair[0].start_pos + pair[0].block_size, pair[1].start_pos);
        }
    }

    #[test]
    fn first_block_start_pos_follows_the_info_section() {
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), vec![9u8; 2500]).unwrap();
        let dest = tempfile::NamedTempFile::new().unwrap();

        let records = vec![
            InfoRecord::single("a", PayloadSource::Owned(b"hello".to_vec())).unwrap(),
            InfoRecord::single("b", PayloadSource::Owned(b"world!!".to_vec())).unwrap(),
        ];
        write_encrypted(src.path(), dest.path(), &KEY, 1000, &records).unwrap();

        let mut file = File::open(dest.path()).unwrap();
        let header_bytes = ContainerHeader::read_header_block(&mut file).unwrap();
        let header = ContainerHeader::from_bytes(&header_bytes).unwrap();

        let info_total: u64 = header.info_index.iter().map(|i| i.length as u64).sum();
        assert_eq!(header.block_index[0].start_pos, header.head_size() as u64 + info_total);
    }

    #[test]
    fn info_records_decrypt_to_original_payloads() {
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), vec![1u8; 10]).unwrap();
        let dest = tempfile::NamedTempFile::new().unwrap();

        let records = vec![
            InfoRecord::single("sub.srt", PayloadSource::Owned(b"hello".to_vec())).unwrap(),
            InfoRecord::single("empty", PayloadSource::Owned(vec![])).unwrap(),
        ];

        write_encrypted(src.path(), dest.path(), &KEY, 1024, &records).unwrap();

        let mut file = File::open(dest.path()).unwrap();
        let header_bytes = ContainerHeader::read_header_block(&mut file).unwrap();
        let header = ContainerHeader::from_bytes(&header_bytes).unwrap();
        assert_eq!(header.info_index.len(), 2);

        let mut pos = header.head_size() as u64;
        for (idx, slot) in header.info_index.iter().enumerate() {
            file.seek(SeekFrom::Start(pos)).unwrap();
            let mut ciphertext = vec![0u8; slot.length as usize];
            file.read_exact(&mut ciphertext).unwrap();
            let plaintext = codec::decrypt(&KEY, &slot.iv, &ciphertext, None).unwrap();
            let entries = crate::info::InfoRecord::from_bytes(&plaintext).unwrap().into_entries().unwrap();
            if idx == 0 {
                assert_eq!(entries[0], (b"sub.srt".to_vec(), b"hello".to_vec()));
            } else {
                assert_eq!(entries[0].0, b"empty");
                assert!(entries[0].1.is_empty());
            }
            pos += slot.length as u64;
        }
    }

    #[test]
    fn empty_source_yields_header_with_no_blocks() {
        let src = tempfile::NamedTempFile::new().unwrap();
        let dest = tempfile::NamedTempFile::new().unwrap();

        write_encrypted(src.path(), dest.path(), &KEY, 1024, &[]).unwrap();

        let mut file = File::open(dest.path()).unwrap();
        let header_bytes = ContainerHeader::read_header_block(&mut file).unwrap();
        let header = ContainerHeader::from_bytes(&header_bytes).unwrap();
        assert_eq!(header.raw_file_size, 0);
        assert!(header.block_index.is_empty());
    }
}
