//! Traits, structs, and functions relating to ProDOS disk images.

mod error;

pub mod block;
pub mod buffer;
pub mod cache;
pub mod directory;
pub mod entry;
pub mod filetype;
pub mod image;
pub mod random_access;
pub mod sector;
pub mod storage;

#[cfg(test)]
mod fixture;

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use log::info;

use crate::applefile::dispatch::{self, DecodeRequest};
use crate::applefile::{DecodedFile, RenderOptions, VolumeSummary};
use crate::disk::block::{BlockDevice, BlockOrder, ImageBlockDevice};
use crate::disk::buffer::FileBuffers;
use crate::disk::cache::DecodeCache;
use crate::disk::directory::Catalog;
use crate::disk::entry::FileEntry;
use crate::disk::image::Image;
use crate::disk::random_access::TextBuffer;
use crate::disk::sector::SectorMap;
use crate::disk::storage::StorageType;

pub use self::error::DiskError;

/// A ProDOS volume, with its catalog read and its decode results cached.
pub struct ProdosDisk {
    blocks: ImageBlockDevice,
    catalog: Catalog,
    cache: RefCell<DecodeCache>,
}

/// Open a disk image.  The block order comes from the filename extension;
/// without a recognized extension, ProDOS order is tried first and then DOS
/// 3.3 order.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<ProdosDisk> {
    let path = path.as_ref();
    if let Some(order) = BlockOrder::from_extension(path) {
        return ProdosDisk::from_image(Image::open_read_only(path)?, order);
    }

    #[inline]
    fn is_volume_error(error: &io::Error) -> bool {
        matches!(
            DiskError::from_io_error(error),
            Some(DiskError::InvalidVolumeHeader) | Some(DiskError::InvalidLayout)
        )
    }
    match ProdosDisk::from_image(Image::open_read_only(path)?, BlockOrder::Prodos) {
        Err(ref e) if is_volume_error(e) => {
            info!("{}: no ProDOS volume in ProDOS order, trying DOS order", path.display());
            ProdosDisk::from_image(Image::open_read_only(path)?, BlockOrder::Dos)
        }
        result => result,
    }
}

impl ProdosDisk {
    pub fn from_image(image: Image, order: BlockOrder) -> io::Result<ProdosDisk> {
        ProdosDisk::from_device(ImageBlockDevice::new(image, order)?)
    }

    pub fn from_device(blocks: ImageBlockDevice) -> io::Result<ProdosDisk> {
        let catalog = Catalog::scan(&blocks)?;
        Ok(ProdosDisk {
            blocks,
            catalog,
            cache: RefCell::new(DecodeCache::new()),
        })
    }

    pub fn blocks(&self) -> &dyn BlockDevice {
        &self.blocks
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn name(&self) -> &str {
        self.catalog.volume().name()
    }

    /// Look up a `/`-separated path from the volume root.
    pub fn find(&self, path: &str) -> io::Result<&FileEntry> {
        self.catalog.find(path)
    }

    pub fn buffers(&self, entry: &FileEntry) -> FileBuffers {
        FileBuffers::read(&self.blocks, entry)
    }

    /// The block runs of a random-access text file.
    pub fn text_runs(&self, entry: &FileEntry) -> Vec<TextBuffer> {
        random_access::assemble_runs(&self.blocks, entry)
    }

    pub fn volume_summary(&self) -> VolumeSummary {
        VolumeSummary::new(self.catalog.total_blocks(), self.catalog.free_blocks())
    }

    pub fn sector_map(&self) -> &SectorMap {
        self.catalog.sector_map()
    }

    fn has_records(entry: &FileEntry) -> bool {
        entry.file_type == filetype::TEXT
            && entry.aux_type > 0
            && matches!(
                entry.storage_type(),
                StorageType::Seedling | StorageType::Sapling | StorageType::Tree
            )
    }

    /// Decode an entry without consulting the cache.
    pub fn decode(&self, entry: &FileEntry, options: RenderOptions) -> DecodedFile {
        let buffers = self.buffers(entry);
        let link = self.catalog.link(entry).map(|companion| self.buffers(companion).raw);
        let runs = if ProdosDisk::has_records(entry) {
            Some(self.text_runs(entry))
        } else {
            None
        };

        let mut request = DecodeRequest::new(
            entry.name(),
            entry.file_type,
            entry.aux_type,
            entry.eof as usize,
            &buffers.exact,
            &buffers.raw,
        )
        .with_volume(self.volume_summary());
        if let Some(link) = &link {
            request = request.with_link(link);
        }
        if let Some(runs) = &runs {
            request = request.with_runs(runs);
        }
        dispatch::decode(&request, options)
    }

    /// Decode an entry, reusing an earlier result when it is still valid
    /// for `options`.
    pub fn decode_cached(&self, entry: &FileEntry, options: RenderOptions) -> Rc<DecodedFile> {
        self.cache
            .borrow_mut()
            .get_or_decode(entry.id(), options, || self.decode(entry, options))
    }

    /// Drop the cached result for an entry.
    pub fn invalidate(&self, entry: &FileEntry) {
        self.cache.borrow_mut().invalidate(entry.id());
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Hex-dump every block of the image.
    pub fn dump(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.blocks.dump(writer)
    }
}

impl fmt::Display for ProdosDisk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.catalog.volume())
    }
}

impl fmt::Debug for ProdosDisk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ProdosDisk {{ name: {:?}, blocks: {}, order: {:?} }}",
            self.name(),
            self.blocks.total_blocks(),
            self.blocks.order()
        )
    }
}
