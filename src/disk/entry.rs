//! ProDOS directory entries.

use std::fmt;

use chrono::NaiveDateTime;
use log::debug;

use crate::disk::block::{BlockDevice, DiskAddress};
use crate::disk::filetype;
use crate::disk::sector::SectorRoles;
use crate::disk::storage::{self, StorageType};
use crate::util;

/// Every directory entry, header entries included, is this long on all
/// volumes written by ProDOS 8 and GS/OS.
pub const ENTRY_LENGTH: usize = 0x27;
pub const ENTRIES_PER_BLOCK: usize = 0x0D;
/// Directory blocks start with the previous and next block pointers.
pub const DIRECTORY_LINK_SIZE: usize = 4;

const STORAGE_TYPE_OFFSET: usize = 0x00;
const NAME_OFFSET: usize = 0x01;
const NAME_LENGTH: usize = 15;
const FILE_TYPE_OFFSET: usize = 0x10;
const KEY_POINTER_OFFSET: usize = 0x11;
const BLOCKS_USED_OFFSET: usize = 0x13;
const EOF_OFFSET: usize = 0x15;
const CREATED_OFFSET: usize = 0x18;
const VERSION_OFFSET: usize = 0x1C;
const MIN_VERSION_OFFSET: usize = 0x1D;
const ACCESS_OFFSET: usize = 0x1E;
const AUX_TYPE_OFFSET: usize = 0x1F;
const MODIFIED_OFFSET: usize = 0x21;
const HEADER_POINTER_OFFSET: usize = 0x25;

const HEADER_ENTRY_LENGTH_OFFSET: usize = 0x1F;
const HEADER_ENTRIES_PER_BLOCK_OFFSET: usize = 0x20;
const HEADER_FILE_COUNT_OFFSET: usize = 0x21;
const HEADER_POINTER_A_OFFSET: usize = 0x23;
const HEADER_POINTER_B_OFFSET: usize = 0x25;
const HEADER_PARENT_ENTRY_LENGTH_OFFSET: usize = 0x26;

/// Identifies a directory by the block number of its key block.  Entries
/// refer to their directory through this identifier rather than holding a
/// reference to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectoryId(pub DiskAddress);

impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "dir@{}", self.0)
    }
}

/// Identifies an entry by the directory block it lives in and its slot
/// within that block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId {
    pub block: DiskAddress,
    pub slot: u8,
}

impl EntryId {
    pub fn new(block: DiskAddress, slot: u8) -> EntryId {
        EntryId { block, slot }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{:02}", self.block, self.slot)
    }
}

/// The access byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access(pub u8);

impl Access {
    const DESTROY: u8 = 0x80;
    const RENAME: u8 = 0x40;
    const BACKUP: u8 = 0x20;
    const WRITE: u8 = 0x02;
    const READ: u8 = 0x01;

    pub fn can_destroy(&self) -> bool {
        self.0 & Self::DESTROY != 0
    }

    pub fn can_rename(&self) -> bool {
        self.0 & Self::RENAME != 0
    }

    pub fn needs_backup(&self) -> bool {
        self.0 & Self::BACKUP != 0
    }

    pub fn can_write(&self) -> bool {
        self.0 & Self::WRITE != 0
    }

    pub fn can_read(&self) -> bool {
        self.0 & Self::READ != 0
    }

    /// Catalog listings show a file as locked when it can be neither
    /// written, renamed nor destroyed.
    pub fn is_locked(&self) -> bool {
        self.0 & (Self::DESTROY | Self::RENAME | Self::WRITE) == 0
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}{}",
            flag(self.can_destroy(), 'D'),
            flag(self.can_rename(), 'N'),
            flag(self.needs_backup(), 'B'),
            flag(self.can_write(), 'W'),
            flag(self.can_read(), 'R'),
        )
    }
}

/// Fields shared by file entries and directory headers.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub id: EntryId,
    pub storage_type: StorageType,
    pub name: String,
    pub access: Access,
    pub created: Option<NaiveDateTime>,
    pub version: u8,
    pub min_version: u8,
    /// The directory this entry was listed in.
    pub parent: DirectoryId,
}

impl CatalogEntry {
    fn parse(bytes: &[u8], id: EntryId, parent: DirectoryId) -> CatalogEntry {
        let name_length = (bytes[STORAGE_TYPE_OFFSET] & 0x0F) as usize;
        let name = &bytes[NAME_OFFSET..NAME_OFFSET + name_length.min(NAME_LENGTH)];
        CatalogEntry {
            id,
            storage_type: StorageType::from_nibble(bytes[STORAGE_TYPE_OFFSET] >> 4),
            name: name.iter().map(|b| (b & 0x7F) as char).collect(),
            access: Access(bytes[ACCESS_OFFSET]),
            created: util::prodos_date(bytes, CREATED_OFFSET),
            version: bytes[VERSION_OFFSET],
            min_version: bytes[MIN_VERSION_OFFSET],
            parent,
        }
    }
}

/// Read the storage type of the entry in `bytes` without parsing the rest.
pub fn storage_type_of(bytes: &[u8]) -> StorageType {
    StorageType::from_nibble(bytes[STORAGE_TYPE_OFFSET] >> 4)
}

/// A file (or subdirectory) entry, with its storage tree already resolved.
#[derive(Clone, Debug)]
pub struct FileEntry {
    pub common: CatalogEntry,
    pub file_type: u8,
    pub key_block: u16,
    pub blocks_used: u16,
    pub eof: u32,
    pub aux_type: u16,
    pub modified: Option<NaiveDateTime>,
    pub header_pointer: u16,
    /// The directory block holding this entry.
    pub catalog_block: DiskAddress,
    pub master_index: Option<DiskAddress>,
    pub index_blocks: Vec<DiskAddress>,
    pub data_blocks: Vec<DiskAddress>,
    /// The other half of a double hi-res pair.
    pub link: Option<EntryId>,
}

impl FileEntry {
    /// Parse a directory entry and resolve its storage tree, reporting the
    /// role of each visited block to `roles`.
    pub fn parse(
        bytes: &[u8],
        id: EntryId,
        parent: DirectoryId,
        blocks: &dyn BlockDevice,
        roles: &mut dyn SectorRoles,
    ) -> FileEntry {
        let common = CatalogEntry::parse(bytes, id, parent);
        let file_type = bytes[FILE_TYPE_OFFSET];
        let key_block = util::unsigned_short(bytes, KEY_POINTER_OFFSET);
        let blocks_used = util::unsigned_short(bytes, BLOCKS_USED_OFFSET);

        if filetype::is_geos(file_type) {
            debug!("{}: GEOS file type ${:02X}", common.name, file_type);
        }

        let resolution =
            storage::resolve_data_blocks(blocks, roles, common.storage_type, key_block, blocks_used);

        FileEntry {
            common,
            file_type,
            key_block,
            blocks_used,
            eof: util::unsigned_triple(bytes, EOF_OFFSET),
            aux_type: util::unsigned_short(bytes, AUX_TYPE_OFFSET),
            modified: util::prodos_date(bytes, MODIFIED_OFFSET),
            header_pointer: util::unsigned_short(bytes, HEADER_POINTER_OFFSET),
            catalog_block: id.block,
            master_index: resolution.master_index,
            index_blocks: resolution.index_blocks,
            data_blocks: resolution.data_blocks,
            link: None,
        }
    }

    #[inline]
    pub fn id(&self) -> EntryId {
        self.common.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.common.name
    }

    #[inline]
    pub fn storage_type(&self) -> StorageType {
        self.common.storage_type
    }

    pub fn is_directory(&self) -> bool {
        self.common.storage_type == StorageType::Subdirectory
    }

    pub fn type_name(&self) -> String {
        filetype::type_name(self.file_type)
    }

    /// Every block this entry occupies: the catalog block, the master index
    /// (if any), the index blocks and the allocated data blocks.
    pub fn sectors(&self) -> Vec<DiskAddress> {
        let mut sectors = vec![self.catalog_block];
        if let Some(master) = self.master_index {
            sectors.push(master);
        }
        sectors.extend(
            self.index_blocks
                .iter()
                .filter(|a| Some(**a) != self.master_index),
        );
        sectors.extend(self.data_blocks.iter().filter(|a| !a.is_empty()));
        sectors
    }

    /// True if the block is one of this file's index or data blocks.
    pub fn contains(&self, address: DiskAddress) -> bool {
        if address.is_empty() {
            return false;
        }
        self.master_index == Some(address)
            || self.index_blocks.contains(&address)
            || self.data_blocks.contains(&address)
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let locked = if self.common.access.is_locked() {
            '*'
        } else {
            ' '
        };
        write!(
            f,
            "{}{:<15} {} {:>5}",
            locked,
            self.common.name,
            self.type_name(),
            self.blocks_used
        )?;
        if f.alternate() {
            let date = |d: &Option<NaiveDateTime>| match d {
                Some(d) => d.format("%d-%b-%y %H:%M").to_string(),
                None => "<NO DATE>".to_string(),
            };
            write!(
                f,
                " {:>15} {:>15} {:>8} ${:04X} {} @{}",
                date(&self.modified),
                date(&self.common.created),
                self.eof,
                self.aux_type,
                self.common.storage_type,
                self.key_block
            )?;
        }
        Ok(())
    }
}

/// The header-specific fields of a volume or subdirectory header.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderKind {
    Volume {
        bitmap_pointer: u16,
        total_blocks: u16,
    },
    Subdirectory {
        parent_pointer: u16,
        parent_entry: u8,
        parent_entry_length: u8,
    },
}

/// The first entry of a directory's key block.
#[derive(Clone, Debug)]
pub struct DirectoryHeader {
    pub common: CatalogEntry,
    pub entry_length: u8,
    pub entries_per_block: u8,
    pub file_count: u16,
    pub kind: HeaderKind,
}

impl DirectoryHeader {
    pub fn parse(bytes: &[u8], id: EntryId, parent: DirectoryId) -> DirectoryHeader {
        let common = CatalogEntry::parse(bytes, id, parent);
        let kind = match common.storage_type {
            StorageType::VolumeHeader => HeaderKind::Volume {
                bitmap_pointer: util::unsigned_short(bytes, HEADER_POINTER_A_OFFSET),
                total_blocks: util::unsigned_short(bytes, HEADER_POINTER_B_OFFSET),
            },
            _ => HeaderKind::Subdirectory {
                parent_pointer: util::unsigned_short(bytes, HEADER_POINTER_A_OFFSET),
                parent_entry: bytes[HEADER_POINTER_B_OFFSET],
                parent_entry_length: bytes[HEADER_PARENT_ENTRY_LENGTH_OFFSET],
            },
        };
        DirectoryHeader {
            common,
            entry_length: bytes[HEADER_ENTRY_LENGTH_OFFSET],
            entries_per_block: bytes[HEADER_ENTRIES_PER_BLOCK_OFFSET],
            file_count: util::unsigned_short(bytes, HEADER_FILE_COUNT_OFFSET),
            kind,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.common.name
    }

    pub fn is_volume(&self) -> bool {
        matches!(self.kind, HeaderKind::Volume { .. })
    }

    /// The entry geometry ProDOS itself writes.
    pub fn has_standard_geometry(&self) -> bool {
        self.entry_length as usize == ENTRY_LENGTH
            && self.entries_per_block as usize == ENTRIES_PER_BLOCK
    }
}

impl fmt::Display for DirectoryHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            HeaderKind::Volume { total_blocks, .. } => write!(
                f,
                "/{} ({} files, {} blocks)",
                self.common.name, self.file_count, total_blocks
            ),
            HeaderKind::Subdirectory { parent_pointer, .. } => write!(
                f,
                "{} ({} files, parent @{})",
                self.common.name, self.file_count, parent_pointer
            ),
        }
    }
}

/// One populated slot of a directory.
#[derive(Clone, Debug)]
pub enum CatalogItem {
    Header(DirectoryHeader),
    File(FileEntry),
}

impl CatalogItem {
    pub fn common(&self) -> &CatalogEntry {
        match self {
            CatalogItem::Header(h) => &h.common,
            CatalogItem::File(f) => &f.common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::block::{BlockOrder, ImageBlockDevice, BLOCK_SIZE};
    use crate::disk::fixture::entry_bytes;
    use crate::disk::image::Image;
    use crate::disk::sector::SectorMap;

    #[test]
    fn test_parse_file_entry() {
        let device = ImageBlockDevice::new(
            Image::open_memory(16 * BLOCK_SIZE).unwrap(),
            BlockOrder::Prodos,
        )
        .unwrap();
        let mut bytes = entry_bytes(1, "HELLO", 0xFC, 9, 1, 0x123, 0x0801);
        // 2-Mar-95 10:30
        let date: u16 = (95 << 9) | (3 << 5) | 2;
        bytes[MODIFIED_OFFSET] = (date & 0xFF) as u8;
        bytes[MODIFIED_OFFSET + 1] = (date >> 8) as u8;
        bytes[MODIFIED_OFFSET + 2] = 30;
        bytes[MODIFIED_OFFSET + 3] = 10;
        let id = EntryId::new(DiskAddress(2), 3);
        let mut roles = SectorMap::new();
        let entry = FileEntry::parse(&bytes, id, DirectoryId(DiskAddress(2)), &device, &mut roles);

        assert_eq!(entry.name(), "HELLO");
        assert_eq!(entry.storage_type(), StorageType::Seedling);
        assert_eq!(entry.type_name(), "BAS");
        assert_eq!(entry.eof, 0x123);
        assert_eq!(entry.aux_type, 0x0801);
        assert_eq!(entry.data_blocks, vec![DiskAddress(9)]);
        assert_eq!(entry.sectors(), vec![DiskAddress(2), DiskAddress(9)]);
        assert!(entry.contains(DiskAddress(9)));
        assert!(!entry.contains(DiskAddress(2)));
        assert!(!entry.common.access.is_locked());
        assert_eq!(
            entry.modified.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "1995-03-02 10:30"
        );
        assert!(entry.common.created.is_none());
        assert_eq!(format!("{}", entry), " HELLO           BAS     1");
    }

    #[test]
    fn test_parse_volume_header() {
        let mut bytes = vec![0u8; ENTRY_LENGTH];
        bytes[0] = 0xF0 | 4;
        bytes[1..5].copy_from_slice(b"DEMO");
        bytes[HEADER_ENTRY_LENGTH_OFFSET] = ENTRY_LENGTH as u8;
        bytes[HEADER_ENTRIES_PER_BLOCK_OFFSET] = ENTRIES_PER_BLOCK as u8;
        bytes[HEADER_FILE_COUNT_OFFSET] = 5;
        bytes[HEADER_POINTER_A_OFFSET] = 6;
        bytes[HEADER_POINTER_B_OFFSET] = 0x18;
        bytes[HEADER_POINTER_B_OFFSET + 1] = 0x01;
        let root = DirectoryId(DiskAddress(2));
        let header = DirectoryHeader::parse(&bytes, EntryId::new(DiskAddress(2), 0), root);
        assert!(header.is_volume());
        assert!(header.has_standard_geometry());
        assert_eq!(header.name(), "DEMO");
        assert_eq!(
            header.kind,
            HeaderKind::Volume {
                bitmap_pointer: 6,
                total_blocks: 280
            }
        );
        assert_eq!(format!("{}", header), "/DEMO (5 files, 280 blocks)");
    }

    #[test]
    fn test_access() {
        assert!(Access(0x01).is_locked());
        assert!(!Access(0xC3).is_locked());
        assert_eq!(Access(0xC3).to_string(), "DN-WR");
    }
}
