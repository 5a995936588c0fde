//! ProDOS storage trees.
//!
//! A ProDOS file's blocks are reached from its key block in one of several
//! ways, depending on the file's storage type:
//!
//! * A seedling file (up to 512 bytes) has a single data block, which is the
//!   key block itself.
//! * A sapling file (up to 128 KiB) has an index block listing up to 256 data
//!   blocks.
//! * A tree file (up to 16 MiB) has a master index block listing up to 128
//!   index blocks.
//! * A GS/OS extended file has an extended key block holding two mini
//!   entries, one for the data fork and one for the resource fork, each of
//!   which is a seedling, sapling or tree in its own right.
//!
//! Index blocks store each block pointer split in two: the low bytes occupy
//! offsets 0..256 and the high bytes offsets 256..512.  A zero pointer marks
//! a sparse region of the file.

use std::collections::HashSet;
use std::fmt;

use log::{debug, warn};

use crate::disk::block::{BlockDevice, DiskAddress, BLOCK_SIZE};
use crate::disk::directory::DirectoryChain;
use crate::disk::sector::{SectorRoles, SectorType};
use crate::util;

/// Entries per index block.
pub const INDEX_ENTRIES: usize = 256;
/// Entries per master index block.  The upper half of a master index block
/// is unused.
pub const MASTER_INDEX_ENTRIES: usize = 128;

const EXTENDED_FORK_SIZE: usize = 0x100;

/// The four-bit storage type found in the top nibble of every directory
/// entry's first byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageType {
    Deleted,
    Seedling,
    Sapling,
    Tree,
    PascalOnProfile,
    GsosExtendedFile,
    Subdirectory,
    SubdirHeader,
    VolumeHeader,
    Unknown(u8),
}

impl StorageType {
    pub fn from_nibble(nibble: u8) -> StorageType {
        match nibble & 0x0F {
            0x0 => StorageType::Deleted,
            0x1 => StorageType::Seedling,
            0x2 => StorageType::Sapling,
            0x3 => StorageType::Tree,
            0x4 => StorageType::PascalOnProfile,
            0x5 => StorageType::GsosExtendedFile,
            0xD => StorageType::Subdirectory,
            0xE => StorageType::SubdirHeader,
            0xF => StorageType::VolumeHeader,
            n => StorageType::Unknown(n),
        }
    }

    /// The largest number of data blocks this storage type can address.
    pub fn capacity(&self) -> usize {
        match self {
            StorageType::Seedling => 1,
            StorageType::Sapling => INDEX_ENTRIES,
            StorageType::Tree => MASTER_INDEX_ENTRIES * INDEX_ENTRIES,
            StorageType::GsosExtendedFile => 2 * MASTER_INDEX_ENTRIES * INDEX_ENTRIES,
            _ => usize::MAX,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageType::Deleted => f.write_str("deleted"),
            StorageType::Seedling => f.write_str("seedling"),
            StorageType::Sapling => f.write_str("sapling"),
            StorageType::Tree => f.write_str("tree"),
            StorageType::PascalOnProfile => f.write_str("pascal area"),
            StorageType::GsosExtendedFile => f.write_str("extended"),
            StorageType::Subdirectory => f.write_str("subdirectory"),
            StorageType::SubdirHeader => f.write_str("subdirectory header"),
            StorageType::VolumeHeader => f.write_str("volume header"),
            StorageType::Unknown(n) => write!(f, "unknown ({:X})", n),
        }
    }
}

/// The outcome of walking a file's storage tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    /// The master index block of a tree file.
    pub master_index: Option<DiskAddress>,
    /// Every index, master index and extended key block visited, each once.
    pub index_blocks: Vec<DiskAddress>,
    /// Data blocks in file order.  Sparse regions are `DiskAddress::EMPTY`.
    pub data_blocks: Vec<DiskAddress>,
}

/// Walks storage trees, reporting the role of every visited block.
pub struct StorageTree<'a> {
    blocks: &'a dyn BlockDevice,
    roles: &'a mut dyn SectorRoles,
    resolution: Resolution,
}

impl<'a> StorageTree<'a> {
    pub fn new(blocks: &'a dyn BlockDevice, roles: &'a mut dyn SectorRoles) -> StorageTree<'a> {
        StorageTree {
            blocks,
            roles,
            resolution: Resolution::default(),
        }
    }

    /// Resolve the data blocks of a file.  Structural problems are logged
    /// and the walk continues with whatever could be read.
    pub fn resolve(
        mut self,
        storage_type: StorageType,
        key_block: u16,
        blocks_used: u16,
    ) -> Resolution {
        match storage_type {
            StorageType::Seedling | StorageType::Sapling | StorageType::Tree => {
                self.add_data_blocks(storage_type, key_block)
            }
            StorageType::GsosExtendedFile => self.read_forks(key_block),
            StorageType::Subdirectory => self.read_directory_chain(key_block),
            StorageType::PascalOnProfile => {
                debug!("pascal area at block {} ({} blocks)", key_block, blocks_used);
                // The area is contiguous, starting at the key block.
                for block in 0..blocks_used {
                    self.add_data_block(key_block.wrapping_add(block));
                }
            }
            other => warn!("cannot resolve storage type {}", other),
        }
        self.resolution
    }

    fn read_block(&self, block: u16) -> Option<Vec<u8>> {
        match self.blocks.read_block(DiskAddress(block)) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("cannot read block {}: {}", block, e);
                None
            }
        }
    }

    fn record_index_block(&mut self, block: u16, role: SectorType) {
        let address = DiskAddress(block);
        if self.blocks.is_valid_address(address) {
            self.roles.mark(address, role);
        }
        if !self.resolution.index_blocks.contains(&address) {
            self.resolution.index_blocks.push(address);
        }
    }

    fn add_data_block(&mut self, block: u16) {
        if block == 0 {
            self.resolution.data_blocks.push(DiskAddress::EMPTY);
            return;
        }
        let address = DiskAddress(block);
        if self.blocks.is_valid_address(address) {
            self.roles.mark(address, SectorType::Data);
        } else {
            warn!("data block {} is beyond the end of the volume", block);
        }
        self.resolution.data_blocks.push(address);
    }

    fn add_data_blocks(&mut self, storage_type: StorageType, key_block: u16) {
        let mut blocks: Vec<u16> = match storage_type {
            StorageType::Seedling => vec![key_block],
            StorageType::Sapling => self.read_index(key_block),
            StorageType::Tree => self
                .read_master_index(key_block)
                .into_iter()
                .flat_map(|index_block| self.read_index(index_block))
                .collect(),
            other => {
                warn!("fork has unexpected storage type {}", other);
                vec![]
            }
        };

        // Only the trailing run of sparse blocks is dropped; holes inside the
        // file stay as placeholders.
        while blocks.last() == Some(&0) {
            blocks.pop();
        }

        for block in blocks {
            self.add_data_block(block);
        }
    }

    /// Read the 256 block pointers of an index block.  A zero pointer (as
    /// found in a master index with a sparse region) yields 256 sparse
    /// entries without touching the disk.
    pub fn read_index(&mut self, block: u16) -> Vec<u16> {
        if block == 0 {
            return vec![0; INDEX_ENTRIES];
        }
        self.record_index_block(block, SectorType::Index);
        match self.read_block(block) {
            Some(buffer) => (0..INDEX_ENTRIES)
                .map(|i| util::split_pointer(&buffer, i))
                .collect(),
            None => vec![0; INDEX_ENTRIES],
        }
    }

    /// Read the index block pointers of a master index block, up to and
    /// including the highest populated slot.
    pub fn read_master_index(&mut self, block: u16) -> Vec<u16> {
        self.record_index_block(block, SectorType::MasterIndex);
        self.resolution.master_index = Some(DiskAddress(block));
        let buffer = match self.read_block(block) {
            Some(buffer) => buffer,
            None => return vec![],
        };

        let highest = (0..MASTER_INDEX_ENTRIES)
            .rev()
            .find(|&i| buffer[i] != 0 || buffer[i + 0x100] != 0);
        match highest {
            Some(highest) => (0..=highest)
                .map(|i| util::split_pointer(&buffer, i))
                .collect(),
            None => vec![],
        }
    }

    /// A GS/OS extended key block holds a mini entry for the data fork at
    /// offset 0 and one for the resource fork at offset 256.  Both forks'
    /// blocks are listed, data fork first.
    fn read_forks(&mut self, key_block: u16) {
        self.record_index_block(key_block, SectorType::ExtendedKey);
        let buffer = match self.read_block(key_block) {
            Some(buffer) => buffer,
            None => return,
        };
        for fork in (0..BLOCK_SIZE).step_by(EXTENDED_FORK_SIZE) {
            let storage_type = StorageType::from_nibble(buffer[fork]);
            let key = util::unsigned_short(&buffer, fork + 1);
            self.add_data_blocks(storage_type, key);
        }
    }

    fn read_directory_chain(&mut self, key_block: u16) {
        let chain = DirectoryChain::new(self.blocks, DiskAddress(key_block));
        for link in chain {
            match link {
                Ok(block) => self.resolution.data_blocks.push(block.address),
                Err(e) => {
                    warn!("subdirectory at block {}: {}", key_block, e);
                    break;
                }
            }
        }
    }
}

/// Convenience wrapper around `StorageTree::resolve`.
pub fn resolve_data_blocks(
    blocks: &dyn BlockDevice,
    roles: &mut dyn SectorRoles,
    storage_type: StorageType,
    key_block: u16,
    blocks_used: u16,
) -> Resolution {
    StorageTree::new(blocks, roles).resolve(storage_type, key_block, blocks_used)
}

/// True if the block list has no duplicates apart from sparse placeholders.
pub fn is_consistent(data_blocks: &[DiskAddress]) -> bool {
    let mut seen = HashSet::new();
    data_blocks
        .iter()
        .filter(|a| !a.is_empty())
        .all(|a| seen.insert(*a))
}
