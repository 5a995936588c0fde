use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use crate::disk::error::DiskError;
use crate::disk::image::Image;
use crate::util;

pub const BLOCK_SIZE: usize = 512;
const SECTOR_SIZE: usize = 256;
const SECTORS_PER_TRACK: usize = 16;

/// Where the nth 256-byte half-block of a track lives in a DOS 3.3 ordered
/// image.  ProDOS block `b` occupies ProDOS sectors `2*(b%8)` and
/// `2*(b%8)+1` of track `b/8`.
static PRODOS_TO_DOS_SECTOR: [usize; SECTORS_PER_TRACK] =
    [0x0, 0xE, 0xD, 0xC, 0xB, 0xA, 0x9, 0x8, 0x7, 0x6, 0x5, 0x4, 0x3, 0x2, 0x1, 0xF];

/// A `DiskAddress` identifies one 512-byte block.  Block 0 is never part of
/// a file, so it doubles as the placeholder for an unallocated (sparse)
/// block slot.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord, Default)]
pub struct DiskAddress(pub u16);

impl DiskAddress {
    pub const EMPTY: DiskAddress = DiskAddress(0);

    #[inline]
    pub fn new(block: u16) -> DiskAddress {
        DiskAddress(block)
    }

    #[inline]
    pub fn block(&self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn format_addresses(addresses: &[DiskAddress]) -> String {
        addresses
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<u16> for DiskAddress {
    fn from(block: u16) -> DiskAddress {
        DiskAddress(block)
    }
}

impl fmt::Display for DiskAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// The order in which the sectors of a 5.25" image were written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOrder {
    /// Blocks are stored consecutively (.po, .hdv, most .2mg images).
    Prodos,
    /// Tracks of sixteen 256-byte sectors in DOS 3.3 logical order (.do,
    /// .dsk).
    Dos,
}

impl BlockOrder {
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Option<BlockOrder> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("po") | Some("hdv") | Some("2mg") | Some("2img") => Some(BlockOrder::Prodos),
            Some("do") | Some("dsk") => Some(BlockOrder::Dos),
            _ => None,
        }
    }
}

pub trait BlockDevice {
    fn total_blocks(&self) -> usize;
    fn read_block(&self, address: DiskAddress) -> io::Result<Vec<u8>>;

    /// Read the listed blocks and concatenate them.  Sparse placeholders
    /// read as a block of zeros.
    fn read_blocks(&self, addresses: &[DiskAddress]) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(addresses.len() * BLOCK_SIZE);
        for address in addresses {
            if address.is_empty() {
                buffer.extend_from_slice(&[0u8; BLOCK_SIZE]);
            } else {
                buffer.extend_from_slice(&self.read_block(*address)?);
            }
        }
        Ok(buffer)
    }

    fn is_valid_address(&self, address: DiskAddress) -> bool {
        (address.0 as usize) < self.total_blocks()
    }

    fn dump(&self, writer: &mut dyn Write) -> io::Result<()> {
        for block in 0..self.total_blocks() {
            let address = DiskAddress(block as u16);
            writeln!(writer)?;
            writeln!(writer, "block {}", address)?;
            writeln!(writer, "{}", util::hex(&self.read_block(address)?))?;
        }
        Ok(())
    }
}

/// 2IMG images carry a small header describing where the disk data lives.
struct TwoImgHeader {
    order: BlockOrder,
    data_offset: usize,
    data_length: usize,
}

impl TwoImgHeader {
    const MAGIC: &'static [u8] = b"2IMG";
    const HEADER_SIZE: usize = 64;
    const FORMAT_OFFSET: usize = 0x0C;
    const DATA_OFFSET_OFFSET: usize = 0x18;
    const DATA_LENGTH_OFFSET: usize = 0x1C;

    fn parse(image: &Image) -> io::Result<Option<TwoImgHeader>> {
        if image.len() < Self::HEADER_SIZE {
            return Ok(None);
        }
        let header = image.slice(0, Self::HEADER_SIZE)?;
        if &header[0..4] != Self::MAGIC {
            return Ok(None);
        }
        let read_u32 = |offset: usize| {
            (util::unsigned_short(header, offset) as usize)
                | ((util::unsigned_short(header, offset + 2) as usize) << 16)
        };
        let order = match read_u32(Self::FORMAT_OFFSET) {
            0 => BlockOrder::Dos,
            1 => BlockOrder::Prodos,
            _ => return Err(DiskError::InvalidImageHeader.into()),
        };
        let data_offset = read_u32(Self::DATA_OFFSET_OFFSET);
        let mut data_length = read_u32(Self::DATA_LENGTH_OFFSET);
        if data_length == 0 {
            // Some writers leave the length blank for ProDOS-ordered data.
            data_length = image.len().saturating_sub(data_offset);
        }
        if data_offset + data_length > image.len() {
            return Err(DiskError::InvalidImageHeader.into());
        }
        Ok(Some(TwoImgHeader {
            order,
            data_offset,
            data_length,
        }))
    }
}

pub struct ImageBlockDevice {
    image: Image,
    order: BlockOrder,
    data_offset: usize,
    total_blocks: usize,
}

impl ImageBlockDevice {
    /// Wrap an image.  A 2IMG header, if present, overrides the requested
    /// block order.
    pub fn new(image: Image, order: BlockOrder) -> io::Result<ImageBlockDevice> {
        let (order, data_offset, data_length) = match TwoImgHeader::parse(&image)? {
            Some(header) => (header.order, header.data_offset, header.data_length),
            None => (order, 0, image.len()),
        };
        if data_length % BLOCK_SIZE != 0 || data_length == 0 {
            return Err(DiskError::InvalidLayout.into());
        }
        if order == BlockOrder::Dos && data_length % (SECTOR_SIZE * SECTORS_PER_TRACK) != 0 {
            return Err(DiskError::InvalidLayout.into());
        }
        Ok(ImageBlockDevice {
            image,
            order,
            data_offset,
            total_blocks: data_length / BLOCK_SIZE,
        })
    }

    pub fn order(&self) -> BlockOrder {
        self.order
    }

    /// Return the image offsets of the two halves of a block.
    fn get_offsets(&self, address: DiskAddress) -> io::Result<[usize; 2]> {
        let block = address.0 as usize;
        if block >= self.total_blocks {
            return Err(DiskError::BlockOutOfRange.into());
        }
        Ok(match self.order {
            BlockOrder::Prodos => {
                let offset = self.data_offset + block * BLOCK_SIZE;
                [offset, offset + SECTOR_SIZE]
            }
            BlockOrder::Dos => {
                let track = block / 8;
                let first = (block % 8) * 2;
                let track_offset = self.data_offset + track * SECTORS_PER_TRACK * SECTOR_SIZE;
                [
                    track_offset + PRODOS_TO_DOS_SECTOR[first] * SECTOR_SIZE,
                    track_offset + PRODOS_TO_DOS_SECTOR[first + 1] * SECTOR_SIZE,
                ]
            }
        })
    }

    /// Mutable access to a block, used only to assemble in-memory images.
    pub fn write_block(&mut self, address: DiskAddress, data: &[u8]) -> io::Result<()> {
        if data.len() != BLOCK_SIZE {
            return Err(DiskError::InvalidOffset.into());
        }
        let offsets = self.get_offsets(address)?;
        for (half, offset) in offsets.iter().enumerate() {
            self.image
                .slice_mut(*offset, SECTOR_SIZE)?
                .copy_from_slice(&data[half * SECTOR_SIZE..(half + 1) * SECTOR_SIZE]);
        }
        Ok(())
    }
}

impl BlockDevice for ImageBlockDevice {
    #[inline]
    fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    fn read_block(&self, address: DiskAddress) -> io::Result<Vec<u8>> {
        let offsets = self.get_offsets(address)?;
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        for offset in offsets.iter() {
            block.extend_from_slice(self.image.slice(*offset, SECTOR_SIZE)?);
        }
        Ok(block)
    }
}
