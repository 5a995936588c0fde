//! In-memory ProDOS volumes for unit tests.

use std::collections::HashMap;

use crate::disk::block::{BlockDevice, BlockOrder, DiskAddress, ImageBlockDevice, BLOCK_SIZE};
use crate::disk::entry::{EntryId, DIRECTORY_LINK_SIZE, ENTRIES_PER_BLOCK, ENTRY_LENGTH};
use crate::disk::image::Image;

pub const VOLUME_KEY: u16 = 2;
const VOLUME_BLOCKS: [u16; 4] = [2, 3, 4, 5];
const BITMAP_BLOCK: u16 = 6;

fn put_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset] = (value & 0xFF) as u8;
    buffer[offset + 1] = (value >> 8) as u8;
}

pub fn index_block(pointers: &[u16]) -> Vec<u8> {
    let mut block = vec![0u8; BLOCK_SIZE];
    for (i, p) in pointers.iter().enumerate() {
        block[i] = (*p & 0xFF) as u8;
        block[i + 0x100] = (*p >> 8) as u8;
    }
    block
}

pub fn entry_bytes(
    storage_type: u8,
    name: &str,
    file_type: u8,
    key_block: u16,
    blocks_used: u16,
    eof: u32,
    aux_type: u16,
) -> Vec<u8> {
    let mut bytes = vec![0u8; ENTRY_LENGTH];
    bytes[0] = (storage_type << 4) | name.len() as u8;
    bytes[1..1 + name.len()].copy_from_slice(name.as_bytes());
    bytes[0x10] = file_type;
    put_u16(&mut bytes, 0x11, key_block);
    put_u16(&mut bytes, 0x13, blocks_used);
    put_u16(&mut bytes, 0x15, (eof & 0xFFFF) as u16);
    bytes[0x17] = (eof >> 16) as u8;
    bytes[0x1E] = 0xE3;
    put_u16(&mut bytes, 0x1F, aux_type);
    bytes
}

/// Builds a volume with a four block volume directory at block 2 and the
/// bitmap at block 6.  Blocks are handed out sequentially after that.
pub struct VolumeBuilder {
    device: ImageBlockDevice,
    next_free: u16,
    directories: HashMap<u16, Vec<u16>>,
    next_slot: HashMap<u16, usize>,
}

impl VolumeBuilder {
    pub fn new(name: &str, total_blocks: u16) -> VolumeBuilder {
        let image = Image::open_memory(total_blocks as usize * BLOCK_SIZE).unwrap();
        let device = ImageBlockDevice::new(image, BlockOrder::Prodos).unwrap();
        let mut builder = VolumeBuilder {
            device,
            next_free: BITMAP_BLOCK + 1,
            directories: HashMap::new(),
            next_slot: HashMap::new(),
        };

        for (i, block) in VOLUME_BLOCKS.iter().enumerate() {
            let mut data = vec![0u8; BLOCK_SIZE];
            if i > 0 {
                put_u16(&mut data, 0, VOLUME_BLOCKS[i - 1]);
            }
            if i + 1 < VOLUME_BLOCKS.len() {
                put_u16(&mut data, 2, VOLUME_BLOCKS[i + 1]);
            }
            builder.write(*block, &data);
        }
        let mut header = vec![0u8; ENTRY_LENGTH];
        header[0] = 0xF0 | name.len() as u8;
        header[1..1 + name.len()].copy_from_slice(name.as_bytes());
        header[0x1E] = 0xC3;
        header[0x1F] = ENTRY_LENGTH as u8;
        header[0x20] = ENTRIES_PER_BLOCK as u8;
        put_u16(&mut header, 0x23, BITMAP_BLOCK);
        put_u16(&mut header, 0x25, total_blocks);
        builder.patch(VOLUME_KEY, DIRECTORY_LINK_SIZE, &header);
        builder.directories.insert(VOLUME_KEY, VOLUME_BLOCKS.to_vec());
        builder.next_slot.insert(VOLUME_KEY, 1);
        builder
    }

    pub fn allocate(&mut self, count: u16) -> u16 {
        let first = self.next_free;
        self.next_free += count;
        first
    }

    pub fn write(&mut self, block: u16, data: &[u8]) {
        let mut full = data.to_vec();
        full.resize(BLOCK_SIZE, 0);
        self.device.write_block(DiskAddress(block), &full).unwrap();
    }

    pub fn patch(&mut self, block: u16, offset: usize, bytes: &[u8]) {
        let mut data = self.device.read_block(DiskAddress(block)).unwrap();
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.write(block, &data);
    }

    /// Place a raw entry in the next free slot of a directory.
    pub fn add_entry(&mut self, directory: u16, bytes: &[u8]) -> EntryId {
        let slot = self.next_slot[&directory];
        let chain_index = slot / ENTRIES_PER_BLOCK;
        while self.directories[&directory].len() <= chain_index {
            let new_block = self.allocate(1);
            let chain = self.directories.get_mut(&directory).unwrap();
            let last = *chain.last().unwrap();
            chain.push(new_block);
            let mut data = vec![0u8; BLOCK_SIZE];
            put_u16(&mut data, 0, last);
            self.write(new_block, &data);
            let mut link = [0u8; 2];
            put_u16(&mut link, 0, new_block);
            self.patch(last, 2, &link);
        }
        let block = self.directories[&directory][chain_index];
        let slot_in_block = slot % ENTRIES_PER_BLOCK;
        self.patch(
            block,
            DIRECTORY_LINK_SIZE + slot_in_block * ENTRY_LENGTH,
            bytes,
        );
        self.next_slot.insert(directory, slot + 1);
        self.bump_file_count(directory, 1);
        EntryId::new(DiskAddress(block), slot_in_block as u8)
    }

    fn bump_file_count(&mut self, directory: u16, delta: u16) {
        let data = self.device.read_block(DiskAddress(directory)).unwrap();
        let offset = DIRECTORY_LINK_SIZE + 0x21;
        let count = data[offset] as u16 | ((data[offset + 1] as u16) << 8);
        let mut bytes = [0u8; 2];
        put_u16(&mut bytes, 0, count + delta);
        self.patch(directory, offset, &bytes);
    }

    /// Overwrite the end-of-file field of an entry.
    pub fn set_eof(&mut self, id: EntryId, eof: u32) {
        let offset = DIRECTORY_LINK_SIZE + id.slot as usize * ENTRY_LENGTH + 0x15;
        let bytes = [eof as u8, (eof >> 8) as u8, (eof >> 16) as u8];
        self.patch(id.block.0, offset, &bytes);
    }

    /// Store a file as a seedling, sapling or tree, whichever fits.
    pub fn add_file(
        &mut self,
        directory: u16,
        name: &str,
        file_type: u8,
        aux_type: u16,
        data: &[u8],
    ) -> EntryId {
        let data_count = ((data.len() + BLOCK_SIZE - 1) / BLOCK_SIZE).max(1);
        let first = self.allocate(data_count as u16);
        for (i, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
            self.write(first + i as u16, chunk);
        }
        let pointers: Vec<u16> = (0..data_count as u16).map(|i| first + i).collect();
        let (storage_type, key, used) = if data_count == 1 {
            (1, first, 1)
        } else if data_count <= 256 {
            let index = self.allocate(1);
            self.write(index, &index_block(&pointers));
            (2, index, data_count as u16 + 1)
        } else {
            let master = self.allocate(1);
            let mut index_pointers = vec![];
            for chunk in pointers.chunks(256) {
                let index = self.allocate(1);
                self.write(index, &index_block(chunk));
                index_pointers.push(index);
            }
            self.write(master, &index_block(&index_pointers));
            (
                3,
                master,
                (data_count + index_pointers.len() + 1) as u16,
            )
        };
        let entry = entry_bytes(
            storage_type,
            name,
            file_type,
            key,
            used,
            data.len() as u32,
            aux_type,
        );
        self.add_entry(directory, &entry)
    }

    /// Create a one-block subdirectory and return its key block.
    pub fn add_directory(&mut self, parent: u16, name: &str) -> u16 {
        let key = self.allocate(1);
        self.write(key, &[]);
        let id = self.add_entry(parent, &entry_bytes(0xD, name, 0x0F, key, 1, 512, 0));

        let mut header = vec![0u8; ENTRY_LENGTH];
        header[0] = 0xE0 | name.len() as u8;
        header[1..1 + name.len()].copy_from_slice(name.as_bytes());
        header[0x10] = 0x75;
        header[0x1E] = 0xC3;
        header[0x1F] = ENTRY_LENGTH as u8;
        header[0x20] = ENTRIES_PER_BLOCK as u8;
        put_u16(&mut header, 0x23, id.block.0);
        header[0x25] = id.slot + 1;
        header[0x26] = ENTRY_LENGTH as u8;
        self.patch(key, DIRECTORY_LINK_SIZE, &header);
        self.directories.insert(key, vec![key]);
        self.next_slot.insert(key, 1);
        key
    }

    /// Mark every block up to the last allocated one as used.
    pub fn finish(mut self) -> ImageBlockDevice {
        let total = self.device.total_blocks();
        let mut bitmap = vec![0u8; BLOCK_SIZE];
        for block in self.next_free as usize..total.min(BLOCK_SIZE * 8) {
            bitmap[block / 8] |= 0x80 >> (block % 8);
        }
        self.write(BITMAP_BLOCK, &bitmap);
        self.device
    }
}
