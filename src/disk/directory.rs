//! ProDOS directories
//!
//! A directory is a doubly linked chain of 512-byte blocks.  Each block
//! starts with the previous and next block pointers, followed by thirteen
//! 39-byte entry slots.  The first slot of a directory's key block holds
//! the volume or subdirectory header.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;

use log::{debug, info, warn};

use crate::disk::block::{BlockDevice, DiskAddress, BLOCK_SIZE};
use crate::disk::entry::{
    self, CatalogItem, DirectoryHeader, DirectoryId, EntryId, FileEntry, HeaderKind,
    DIRECTORY_LINK_SIZE, ENTRIES_PER_BLOCK, ENTRY_LENGTH,
};
use crate::disk::error::DiskError;
use crate::disk::sector::{SectorMap, SectorRoles, SectorType};
use crate::disk::storage::StorageType;
use crate::util;

/// The volume directory always starts here.
pub const VOLUME_DIRECTORY_BLOCK: u16 = 2;
const NEXT_BLOCK_OFFSET: usize = 2;
const BITS_PER_BITMAP_BLOCK: usize = BLOCK_SIZE * 8;

/// One block of a directory chain.
pub struct DirectoryBlock {
    pub address: DiskAddress,
    pub data: Vec<u8>,
}

impl DirectoryBlock {
    /// The raw bytes of each entry slot.
    pub fn slots(&self) -> impl Iterator<Item = &[u8]> {
        self.data[DIRECTORY_LINK_SIZE..]
            .chunks_exact(ENTRY_LENGTH)
            .take(ENTRIES_PER_BLOCK)
    }
}

/// Follows the next-block pointers of a directory, stopping at a zero
/// pointer.  A chain that revisits a block ends with `DiskError::DirectoryLoop`.
pub struct DirectoryChain<'a> {
    blocks: &'a dyn BlockDevice,
    next_block: Option<DiskAddress>,
    visited_blocks: HashSet<DiskAddress>,
}

impl<'a> DirectoryChain<'a> {
    pub fn new(blocks: &'a dyn BlockDevice, key_block: DiskAddress) -> DirectoryChain<'a> {
        DirectoryChain {
            blocks,
            next_block: Some(key_block),
            visited_blocks: HashSet::new(),
        }
    }

    /// Read the entire chain and return the list of block addresses.
    pub fn addresses(self) -> io::Result<Vec<DiskAddress>> {
        self.map(|r| r.map(|b| b.address)).collect()
    }
}

impl<'a> Iterator for DirectoryChain<'a> {
    type Item = io::Result<DirectoryBlock>;

    fn next(&mut self) -> Option<io::Result<DirectoryBlock>> {
        let address = self.next_block.take()?;

        if !self.visited_blocks.insert(address) {
            return Some(Err(DiskError::DirectoryLoop.into()));
        }

        let data = match self.blocks.read_block(address) {
            Ok(data) => data,
            Err(e) => return Some(Err(e)),
        };
        let next = util::unsigned_short(&data, NEXT_BLOCK_OFFSET);
        if next != 0 {
            self.next_block = Some(DiskAddress(next));
        }
        Some(Ok(DirectoryBlock { address, data }))
    }
}

/// The blocks and populated slots of one directory.
pub struct Listing {
    pub blocks: Vec<DiskAddress>,
    pub items: Vec<CatalogItem>,
}

/// Read every populated slot of the directory whose key block is given.
/// Deleted slots are skipped.  Directory blocks are tagged as catalog
/// blocks, and each file entry's storage tree is resolved as it is read.
/// A broken chain ends the listing early rather than failing it.
pub fn read_directory(
    blocks: &dyn BlockDevice,
    roles: &mut dyn SectorRoles,
    key_block: DiskAddress,
) -> Listing {
    let parent = DirectoryId(key_block);
    let mut listing = Listing {
        blocks: vec![],
        items: vec![],
    };

    for link in DirectoryChain::new(blocks, key_block) {
        let block = match link {
            Ok(block) => block,
            Err(e) => {
                warn!("directory at block {}: {}", key_block, e);
                break;
            }
        };
        roles.mark(block.address, SectorType::Catalog);
        listing.blocks.push(block.address);

        for (slot, bytes) in block.slots().enumerate() {
            let id = EntryId::new(block.address, slot as u8);
            let item = match entry::storage_type_of(bytes) {
                StorageType::Deleted => continue,
                StorageType::VolumeHeader | StorageType::SubdirHeader => {
                    if id != EntryId::new(key_block, 0) {
                        warn!("stray directory header at {}", id);
                    }
                    CatalogItem::Header(DirectoryHeader::parse(bytes, id, parent))
                }
                StorageType::Unknown(n) => {
                    warn!("entry {}: unknown storage type {:X}", id, n);
                    continue;
                }
                _ => CatalogItem::File(FileEntry::parse(bytes, id, parent, blocks, roles)),
            };
            listing.items.push(item);
        }
    }
    listing
}

/// List the entries of a directory.
pub fn list_entries(
    blocks: &dyn BlockDevice,
    roles: &mut dyn SectorRoles,
    key_block: DiskAddress,
) -> Vec<CatalogItem> {
    read_directory(blocks, roles, key_block).items
}

/// Pair each `X.AUX` entry with a sibling named `X`, in both directions.
pub fn link_companions(entries: &mut [FileEntry]) {
    let mut pairs = vec![];
    for (aux, entry) in entries.iter().enumerate() {
        let name = entry.name();
        if name.len() <= 4 || !name.to_uppercase().ends_with(".AUX") {
            continue;
        }
        let base = &name[..name.len() - 4];
        if let Some(main) = entries
            .iter()
            .position(|e| e.name().eq_ignore_ascii_case(base))
        {
            pairs.push((aux, main));
        }
    }
    for (aux, main) in pairs {
        entries[aux].link = Some(entries[main].id());
        entries[main].link = Some(entries[aux].id());
    }
}

/// A fully read directory.
pub struct Directory {
    pub id: DirectoryId,
    pub header: DirectoryHeader,
    pub entries: Vec<FileEntry>,
    pub blocks: Vec<DiskAddress>,
    /// The entry describing this directory in its parent.  The volume
    /// directory has none.
    pub entry: Option<EntryId>,
}

impl Directory {
    pub fn name(&self) -> &str {
        self.header.name()
    }

    pub fn find(&self, name: &str) -> Option<&FileEntry> {
        self.entries
            .iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
    }
}

/// The whole catalog of a volume, read in one pass.
pub struct Catalog {
    root: DirectoryId,
    directories: BTreeMap<DirectoryId, Directory>,
    index: HashMap<EntryId, (DirectoryId, usize)>,
    sector_map: SectorMap,
    total_blocks: usize,
    free_blocks: usize,
}

impl Catalog {
    /// Walk the volume directory and every subdirectory beneath it.  Only a
    /// missing volume header is fatal; every other inconsistency is logged
    /// and skipped.
    pub fn scan(blocks: &dyn BlockDevice) -> io::Result<Catalog> {
        let root_block = DiskAddress(VOLUME_DIRECTORY_BLOCK);
        let key = blocks.read_block(root_block)?;
        let header_bytes = &key[DIRECTORY_LINK_SIZE..DIRECTORY_LINK_SIZE + ENTRY_LENGTH];
        if entry::storage_type_of(header_bytes) != StorageType::VolumeHeader {
            return Err(DiskError::InvalidVolumeHeader.into());
        }

        let mut catalog = Catalog {
            root: DirectoryId(root_block),
            directories: BTreeMap::new(),
            index: HashMap::new(),
            sector_map: SectorMap::new(),
            total_blocks: blocks.total_blocks(),
            free_blocks: 0,
        };
        catalog.sector_map.mark(DiskAddress(0), SectorType::Boot);
        catalog.sector_map.mark(DiskAddress(1), SectorType::Boot);

        let mut visited = HashSet::new();
        catalog.scan_directory(blocks, root_block, None, &mut visited);
        let header = match catalog.directories.get(&catalog.root) {
            Some(root) => root.header.clone(),
            None => return Err(DiskError::InvalidVolumeHeader.into()),
        };
        if let HeaderKind::Volume {
            bitmap_pointer,
            total_blocks,
        } = header.kind
        {
            if total_blocks as usize != blocks.total_blocks() {
                info!(
                    "volume header claims {} blocks, image holds {}",
                    total_blocks,
                    blocks.total_blocks()
                );
            }
            catalog.total_blocks = (total_blocks as usize).min(blocks.total_blocks());
            catalog.read_bitmap(blocks, bitmap_pointer);
        }
        Ok(catalog)
    }

    fn scan_directory(
        &mut self,
        blocks: &dyn BlockDevice,
        key_block: DiskAddress,
        entry: Option<EntryId>,
        visited: &mut HashSet<DiskAddress>,
    ) {
        if !visited.insert(key_block) {
            warn!("directory at block {} is reachable twice", key_block);
            return;
        }
        let id = DirectoryId(key_block);
        let listing = read_directory(blocks, &mut self.sector_map, key_block);

        let mut header = None;
        let mut files = vec![];
        for item in listing.items {
            match item {
                CatalogItem::Header(h) => {
                    if header.is_none() && h.common.id.block == key_block {
                        header = Some(h);
                    }
                }
                CatalogItem::File(f) => files.push(f),
            }
        }
        let header = match header {
            Some(header) => header,
            None => {
                warn!("directory at block {}: {}", key_block, DiskError::InvalidDirectoryHeader);
                return;
            }
        };
        if !header.has_standard_geometry() {
            warn!(
                "directory {}: entry length {:02X}, {} entries per block",
                header.name(),
                header.entry_length,
                header.entries_per_block
            );
        }
        if let (Some(entry), HeaderKind::Subdirectory { parent_pointer, .. }) =
            (entry, &header.kind)
        {
            if *parent_pointer != entry.block.0 {
                warn!(
                    "directory {}: parent pointer {} but listed in block {}",
                    header.name(),
                    parent_pointer,
                    entry.block
                );
            }
        }
        debug!("directory {} at {} ({} entries)", header.name(), key_block, files.len());

        link_companions(&mut files);
        let subdirectories: Vec<(DiskAddress, EntryId)> = files
            .iter()
            .filter(|f| f.is_directory())
            .map(|f| (DiskAddress(f.key_block), f.id()))
            .collect();
        for (i, file) in files.iter().enumerate() {
            self.index.insert(file.id(), (id, i));
        }
        self.directories.insert(
            id,
            Directory {
                id,
                header,
                entries: files,
                blocks: listing.blocks,
                entry,
            },
        );

        for (key, entry) in subdirectories {
            self.scan_directory(blocks, key, Some(entry), visited);
        }
    }

    /// Count free blocks (a set bit means free) and tag the bitmap blocks.
    fn read_bitmap(&mut self, blocks: &dyn BlockDevice, bitmap_pointer: u16) {
        let bitmap_blocks = (self.total_blocks + BITS_PER_BITMAP_BLOCK - 1) / BITS_PER_BITMAP_BLOCK;
        let mut free = 0;
        for i in 0..bitmap_blocks {
            let address = DiskAddress(bitmap_pointer.wrapping_add(i as u16));
            let data = match blocks.read_block(address) {
                Ok(data) => data,
                Err(e) => {
                    warn!("volume bitmap block {}: {}", address, e);
                    break;
                }
            };
            self.sector_map.mark(address, SectorType::VolumeMap);
            let first = i * BITS_PER_BITMAP_BLOCK;
            let last = (first + BITS_PER_BITMAP_BLOCK).min(self.total_blocks);
            free += (first..last)
                .filter(|block| {
                    let bit = block - first;
                    data[bit / 8] & (0x80 >> (bit % 8)) != 0
                })
                .count();
        }
        self.free_blocks = free;
    }

    pub fn volume(&self) -> &DirectoryHeader {
        &self.root().header
    }

    pub fn root(&self) -> &Directory {
        // scan() refuses to build a catalog without a root directory.
        &self.directories[&self.root]
    }

    pub fn directory(&self, id: DirectoryId) -> Option<&Directory> {
        self.directories.get(&id)
    }

    pub fn directories(&self) -> impl Iterator<Item = &Directory> {
        self.directories.values()
    }

    pub fn entry(&self, id: EntryId) -> Option<&FileEntry> {
        let (directory, position) = self.index.get(&id)?;
        self.directories.get(directory)?.entries.get(*position)
    }

    /// The companion of a double hi-res half, if it has one.
    pub fn link(&self, entry: &FileEntry) -> Option<&FileEntry> {
        entry.link.and_then(|id| self.entry(id))
    }

    /// The directory a subdirectory entry describes.
    pub fn subdirectory(&self, entry: &FileEntry) -> Option<&Directory> {
        if !entry.is_directory() {
            return None;
        }
        self.directory(DirectoryId(DiskAddress(entry.key_block)))
    }

    /// Look up a `/`-separated path from the volume root.  Names compare
    /// without regard to case, and a leading volume name is accepted.
    pub fn find(&self, path: &str) -> io::Result<&FileEntry> {
        let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        if components.len() > 1 && components[0].eq_ignore_ascii_case(self.volume().name()) {
            components.remove(0);
        }
        let mut directory = self.root();
        let mut found = None;
        for component in components {
            if let Some(entry) = found {
                directory = self
                    .subdirectory(entry)
                    .ok_or_else(|| DiskError::NotADirectory.to_io_error())?;
            }
            found = Some(directory.find(component).ok_or(DiskError::NotFound)?);
        }
        found.ok_or_else(|| DiskError::NotFound.into())
    }

    /// The path of an entry from the volume root, built by following parent
    /// references.
    pub fn path_of(&self, entry: &FileEntry) -> String {
        let mut names = vec![entry.name().to_string()];
        let mut parent = entry.common.parent;
        let mut hops = 0;
        while let Some(directory) = self.directory(parent) {
            let owner = match directory.entry.and_then(|id| self.entry(id)) {
                Some(owner) => owner,
                None => break,
            };
            names.push(owner.name().to_string());
            parent = owner.common.parent;
            hops += 1;
            if hops > self.directories.len() {
                break;
            }
        }
        names.reverse();
        names.join("/")
    }

    /// Every file entry, depth first, with its path.
    pub fn walk(&self) -> Vec<(String, &FileEntry)> {
        let mut out = vec![];
        self.walk_directory(self.root(), "", &mut out, 0);
        out
    }

    fn walk_directory<'a>(
        &'a self,
        directory: &'a Directory,
        prefix: &str,
        out: &mut Vec<(String, &'a FileEntry)>,
        depth: usize,
    ) {
        for entry in directory.entries.iter() {
            let path = format!("{}{}", prefix, entry.name());
            out.push((path.clone(), entry));
            if depth < self.directories.len() {
                if let Some(subdirectory) = self.subdirectory(entry) {
                    self.walk_directory(subdirectory, &format!("{}/", path), out, depth + 1);
                }
            }
        }
    }

    /// The entry whose storage includes this block.
    pub fn owner(&self, address: DiskAddress) -> Option<&FileEntry> {
        self.directories
            .values()
            .flat_map(|d| d.entries.iter())
            .find(|e| e.contains(address))
    }

    pub fn sector_map(&self) -> &SectorMap {
        &self.sector_map
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn free_blocks(&self) -> usize {
        self.free_blocks
    }

    pub fn used_blocks(&self) -> usize {
        self.total_blocks - self.free_blocks
    }
}
