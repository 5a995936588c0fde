//! Assembling a file's bytes from its resolved blocks.

use log::warn;

use crate::disk::block::{BlockDevice, DiskAddress, BLOCK_SIZE};
use crate::disk::entry::{FileEntry, DIRECTORY_LINK_SIZE};
use crate::disk::storage::StorageType;

/// An end-of-file of exactly one block is taken to mean "the whole raw
/// buffer", whatever its length.
pub const SENTINEL_EOF: usize = 512;

fn read_or_zero(blocks: &dyn BlockDevice, address: DiskAddress) -> Vec<u8> {
    if address.is_empty() {
        return vec![0u8; BLOCK_SIZE];
    }
    match blocks.read_block(address) {
        Ok(data) => data,
        Err(e) => {
            warn!("block {}: {}; substituting zeros", address, e);
            vec![0u8; BLOCK_SIZE]
        }
    }
}

/// Concatenate the data blocks of an entry.  Subdirectory blocks contribute
/// everything after their four-byte link header.  Unreadable blocks read as
/// zeros.
pub fn assemble_buffer(blocks: &dyn BlockDevice, entry: &FileEntry) -> Vec<u8> {
    match entry.storage_type() {
        StorageType::Subdirectory => {
            let mut buffer =
                Vec::with_capacity(entry.data_blocks.len() * (BLOCK_SIZE - DIRECTORY_LINK_SIZE));
            for address in &entry.data_blocks {
                buffer.extend_from_slice(&read_or_zero(blocks, *address)[DIRECTORY_LINK_SIZE..]);
            }
            buffer
        }
        StorageType::Seedling
        | StorageType::Sapling
        | StorageType::Tree
        | StorageType::GsosExtendedFile
        | StorageType::PascalOnProfile => {
            let mut buffer = Vec::with_capacity(entry.data_blocks.len() * BLOCK_SIZE);
            for address in &entry.data_blocks {
                buffer.extend_from_slice(&read_or_zero(blocks, *address));
            }
            buffer
        }
        other => {
            warn!("{}: no buffer for storage type {}", entry.name(), other);
            vec![0u8; BLOCK_SIZE]
        }
    }
}

/// Cut or pad a raw buffer to the declared end-of-file.
///
/// A buffer shorter than `eof` is zero padded.  A buffer of exactly `eof`
/// bytes, or any buffer when `eof` is [`SENTINEL_EOF`], is returned as is.
/// Anything else is truncated.
pub fn exact_buffer(mut buffer: Vec<u8>, eof: usize) -> Vec<u8> {
    if buffer.len() < eof {
        buffer.resize(eof, 0);
    } else if buffer.len() != eof && eof != SENTINEL_EOF {
        buffer.truncate(eof);
    }
    buffer
}

/// The raw and exact buffers of a file.
pub struct FileBuffers {
    pub raw: Vec<u8>,
    pub exact: Vec<u8>,
}

impl FileBuffers {
    pub fn read(blocks: &dyn BlockDevice, entry: &FileEntry) -> FileBuffers {
        let raw = assemble_buffer(blocks, entry);
        let exact = exact_buffer(raw.clone(), entry.eof as usize);
        FileBuffers { raw, exact }
    }

    /// The bytes between the end-of-file and the end of the last block.
    pub fn slack(&self) -> &[u8] {
        if self.exact.len() < self.raw.len() {
            &self.raw[self.exact.len()..]
        } else {
            &[]
        }
    }
}
