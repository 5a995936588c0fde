//! Random-access text files.
//!
//! A text file with a non-zero aux type holds fixed-length records, and
//! records that were never written leave holes in the storage tree.  Rather
//! than one padded buffer, such files are read as a list of runs of
//! contiguous blocks, each tagged with the logical block it starts at.

use log::warn;

use crate::disk::block::{BlockDevice, DiskAddress, BLOCK_SIZE};
use crate::disk::buffer;
use crate::disk::entry::FileEntry;
use crate::disk::storage::{StorageType, INDEX_ENTRIES, MASTER_INDEX_ENTRIES};
use crate::util;

/// One run of contiguous blocks of a random-access text file.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBuffer {
    pub buffer: Vec<u8>,
    pub record_length: usize,
    /// The logical block (within the file) of the first byte of `buffer`.
    pub first_block: usize,
}

impl TextBuffer {
    /// The record number of the first whole record in this run.
    pub fn first_record(&self) -> usize {
        if self.record_length == 0 {
            return 0;
        }
        (self.first_block * BLOCK_SIZE + self.record_length - 1) / self.record_length
    }

    /// Iterate over `(record number, bytes)` for each non-empty record that
    /// starts inside this run.
    pub fn records(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        let base = self.first_block * BLOCK_SIZE;
        let length = self.record_length.max(1);
        let first = self.first_record();
        (first..)
            .map(move |record| (record, record * length - base))
            .take_while(move |(_, offset)| *offset < self.buffer.len())
            .map(move |(record, offset)| {
                let end = (offset + length).min(self.buffer.len());
                (record, &self.buffer[offset..end])
            })
            .filter(|(_, bytes)| bytes.iter().any(|b| *b != 0))
    }
}

struct RunCollector<'a> {
    blocks: &'a dyn BlockDevice,
    record_length: usize,
    pending: Vec<DiskAddress>,
    logical_block: usize,
    runs: Vec<TextBuffer>,
}

impl<'a> RunCollector<'a> {
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let buffer = match self.blocks.read_blocks(&self.pending) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("random access run at block {}: {}", self.pending[0], e);
                vec![0u8; self.pending.len() * BLOCK_SIZE]
            }
        };
        self.runs.push(TextBuffer {
            buffer,
            record_length: self.record_length,
            first_block: self.logical_block - self.pending.len(),
        });
        self.pending.clear();
    }

    fn read_index(&mut self, index_block: u16) {
        let data = match self.blocks.read_block(DiskAddress(index_block)) {
            Ok(data) => data,
            Err(e) => {
                warn!("index block {}: {}", index_block, e);
                self.flush();
                self.logical_block += INDEX_ENTRIES;
                return;
            }
        };
        for i in 0..INDEX_ENTRIES {
            match util::split_pointer(&data, i) {
                0 => self.flush(),
                block => self.pending.push(DiskAddress(block)),
            }
            self.logical_block += 1;
        }
    }

    fn read_master_index(&mut self, master_block: u16) {
        let data = match self.blocks.read_block(DiskAddress(master_block)) {
            Ok(data) => data,
            Err(e) => {
                warn!("master index block {}: {}", master_block, e);
                return;
            }
        };
        for i in 0..MASTER_INDEX_ENTRIES {
            match util::split_pointer(&data, i) {
                0 => {
                    self.flush();
                    self.logical_block += INDEX_ENTRIES;
                }
                index_block => self.read_index(index_block),
            }
        }
    }
}

/// Read a random-access text file as runs of contiguous blocks.  A run
/// still open when the index ends is kept.
pub fn assemble_runs(blocks: &dyn BlockDevice, entry: &FileEntry) -> Vec<TextBuffer> {
    let record_length = entry.aux_type as usize;
    let mut collector = RunCollector {
        blocks,
        record_length,
        pending: vec![],
        logical_block: 0,
        runs: vec![],
    };
    match entry.storage_type() {
        StorageType::Tree => collector.read_master_index(entry.key_block),
        StorageType::Sapling => collector.read_index(entry.key_block),
        StorageType::Seedling => {
            let raw = buffer::assemble_buffer(blocks, entry);
            let mut data = raw.clone();
            if (entry.eof as usize) < raw.len() {
                data.truncate(entry.eof as usize);
            }
            return vec![TextBuffer {
                buffer: data,
                record_length,
                first_block: 0,
            }];
        }
        other => warn!("{}: random access text with storage type {}", entry.name(), other),
    }
    collector.flush();
    collector.runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::directory::Catalog;
    use crate::disk::fixture::{entry_bytes, index_block, VolumeBuilder, VOLUME_KEY};

    fn fill(builder: &mut VolumeBuilder, block: u16, byte: u8) {
        builder.write(block, &[byte; BLOCK_SIZE]);
    }

    #[test]
    fn test_sapling_runs() {
        let mut builder = VolumeBuilder::new("RAND", 64);
        let index = builder.allocate(1);
        let first = builder.allocate(8);
        for i in 0..8 {
            fill(&mut builder, first + i, 0xC0 + i as u8);
        }
        let (b5, b7, b8) = (first, first + 1, first + 2);
        builder.write(index, &index_block(&[b5, 0, 0, b7, b8]));
        builder.add_entry(
            VOLUME_KEY,
            &entry_bytes(2, "RECORDS", 0x04, index, 4, 5 * 512, 128),
        );
        let device = builder.finish();
        let catalog = Catalog::scan(&device).unwrap();
        let runs = assemble_runs(&device, catalog.find("RECORDS").unwrap());

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].first_block, 0);
        assert_eq!(runs[0].buffer.len(), BLOCK_SIZE);
        assert_eq!(runs[0].buffer[0], 0xC0);
        assert_eq!(runs[1].first_block, 3);
        assert_eq!(runs[1].buffer.len(), 2 * BLOCK_SIZE);
        assert_eq!(runs[1].buffer[BLOCK_SIZE], 0xC2);
        assert_eq!(runs[1].record_length, 128);
        assert_eq!(runs[1].first_record(), 12);
        assert_eq!(runs[1].records().count(), 8);
    }

    #[test]
    fn test_run_at_end_of_index_is_kept() {
        let mut builder = VolumeBuilder::new("FULL", 600);
        let index = builder.allocate(1);
        let first = builder.allocate(256);
        let pointers: Vec<u16> = (first..first + 256).collect();
        builder.write(index, &index_block(&pointers));
        builder.add_entry(
            VOLUME_KEY,
            &entry_bytes(2, "BIG", 0x04, index, 257, 256 * 512, 64),
        );
        let device = builder.finish();
        let catalog = Catalog::scan(&device).unwrap();
        let runs = assemble_runs(&device, catalog.find("BIG").unwrap());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].buffer.len(), 256 * BLOCK_SIZE);
    }

    #[test]
    fn test_tree_runs() {
        let mut builder = VolumeBuilder::new("TREE", 64);
        let master = builder.allocate(1);
        let index = builder.allocate(1);
        let data = builder.allocate(1);
        fill(&mut builder, data, 0x41);
        builder.write(index, &index_block(&[data]));
        // The first 256 logical blocks are missing entirely.
        builder.write(master, &index_block(&[0, index]));
        builder.add_entry(
            VOLUME_KEY,
            &entry_bytes(3, "SPARSE", 0x04, master, 3, 257 * 512, 32),
        );
        let device = builder.finish();
        let catalog = Catalog::scan(&device).unwrap();
        let runs = assemble_runs(&device, catalog.find("SPARSE").unwrap());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].first_block, 256);
        assert_eq!(runs[0].first_record(), 256 * 512 / 32);
    }

    #[test]
    fn test_seedling_is_one_run() {
        let mut builder = VolumeBuilder::new("SEED", 32);
        let id = builder.add_file(VOLUME_KEY, "SMALL", 0x04, 16, &[0xC1; 40]);
        let device = builder.finish();
        let catalog = Catalog::scan(&device).unwrap();
        let runs = assemble_runs(&device, catalog.entry(id).unwrap());
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].buffer.len(), 40);
        let records: Vec<usize> = runs[0].records().map(|(n, _)| n).collect();
        assert_eq!(records, vec![0, 1, 2]);
    }
}
