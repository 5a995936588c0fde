use std::collections::HashSet;
use std::fmt;
use std::fs;

use prodos::applefile::{DataSource, DecodedFile, RenderOptions};
use prodos::disk::block::{BlockDevice, BlockOrder, DiskAddress, ImageBlockDevice, BLOCK_SIZE};
use prodos::disk::filetype;
use prodos::disk::image::Image;
use prodos::disk::sector::SectorType;
use prodos::disk::storage::StorageType;
use prodos::disk::{self, DiskError, ProdosDisk};
use rand::{Rng, XorShiftRng};

const ITERATIONS: usize = 10;
const VOLUME_BLOCKS: u16 = 8192;
const FILES_PER_VOLUME: usize = 20;
const MIN_FILE_SIZE: usize = 0;
const MAX_FILE_SIZE: usize = 160 * 1024;
const RNG_SEED: [u8; 16] = [
    0x04, 0xC1, 0x1D, 0xB7, 0x1E, 0xDC, 0x6F, 0x41, 0x74, 0x1B, 0x8C, 0xD7, 0x32, 0x58, 0x34, 0x99,
];

const VOLUME_KEY: u16 = 2;
const DIRECTORY_BLOCKS: [u16; 4] = [2, 3, 4, 5];
const BITMAP_BLOCK: u16 = 6;
const ENTRY_LENGTH: usize = 0x27;
const ENTRIES_PER_BLOCK: usize = 13;

static FILE_TYPES: &[u8] = &[
    filetype::BINARY,
    filetype::SYSTEM,
    filetype::TEXT,
    filetype::APPLESOFT,
    filetype::VARIABLES,
    filetype::AWP,
    0x5A,
];

fn deterministic_rng() -> XorShiftRng {
    rand::SeedableRng::from_seed(RNG_SEED)
}

fn put_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset] = (value & 0xFF) as u8;
    buffer[offset + 1] = (value >> 8) as u8;
}

fn index_block(pointers: &[u16]) -> Vec<u8> {
    let mut block = vec![0u8; BLOCK_SIZE];
    for (i, p) in pointers.iter().enumerate() {
        block[i] = (*p & 0xFF) as u8;
        block[i + 0x100] = (*p >> 8) as u8;
    }
    block
}

/// Lays out a volume the way ProDOS does: boot blocks, a four block volume
/// directory at block 2, the bitmap, then files allocated in order.
struct VolumeWriter {
    device: ImageBlockDevice,
    next_free: u16,
    next_slot: usize,
}

impl VolumeWriter {
    fn new(name: &str, total_blocks: u16, order: BlockOrder) -> VolumeWriter {
        let image = Image::open_memory(total_blocks as usize * BLOCK_SIZE).unwrap();
        let device = ImageBlockDevice::new(image, order).unwrap();
        let bitmap_blocks = (total_blocks as usize + BLOCK_SIZE * 8 - 1) / (BLOCK_SIZE * 8);
        let mut writer = VolumeWriter {
            device,
            next_free: BITMAP_BLOCK + bitmap_blocks as u16,
            next_slot: 1,
        };
        for (i, block) in DIRECTORY_BLOCKS.iter().enumerate() {
            let mut data = vec![0u8; BLOCK_SIZE];
            if i > 0 {
                put_u16(&mut data, 0, DIRECTORY_BLOCKS[i - 1]);
            }
            if i + 1 < DIRECTORY_BLOCKS.len() {
                put_u16(&mut data, 2, DIRECTORY_BLOCKS[i + 1]);
            }
            writer.write(*block, &data);
        }
        let mut header = vec![0u8; ENTRY_LENGTH];
        header[0] = 0xF0 | name.len() as u8;
        header[1..1 + name.len()].copy_from_slice(name.as_bytes());
        header[0x1E] = 0xC3;
        header[0x1F] = ENTRY_LENGTH as u8;
        header[0x20] = ENTRIES_PER_BLOCK as u8;
        put_u16(&mut header, 0x23, BITMAP_BLOCK);
        put_u16(&mut header, 0x25, total_blocks);
        writer.patch(VOLUME_KEY, 4, &header);
        writer
    }

    fn write(&mut self, block: u16, data: &[u8]) {
        let mut full = data.to_vec();
        full.resize(BLOCK_SIZE, 0);
        self.device.write_block(DiskAddress(block), &full).unwrap();
    }

    fn patch(&mut self, block: u16, offset: usize, bytes: &[u8]) {
        let mut data = self.device.read_block(DiskAddress(block)).unwrap();
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.write(block, &data);
    }

    fn allocate(&mut self, count: usize) -> u16 {
        let first = self.next_free;
        self.next_free += count as u16;
        first
    }

    fn add_entry(&mut self, storage_type: u8, file: &RandomFile, key: u16, used: usize) {
        let mut entry = vec![0u8; ENTRY_LENGTH];
        entry[0] = (storage_type << 4) | file.name.len() as u8;
        entry[1..1 + file.name.len()].copy_from_slice(file.name.as_bytes());
        entry[0x10] = file.file_type;
        put_u16(&mut entry, 0x11, key);
        put_u16(&mut entry, 0x13, used as u16);
        put_u16(&mut entry, 0x15, (file.eof() & 0xFFFF) as u16);
        entry[0x17] = (file.eof() >> 16) as u8;
        entry[0x1E] = 0xE3;
        put_u16(&mut entry, 0x1F, file.aux_type);
        put_u16(&mut entry, 0x25, VOLUME_KEY);

        let block = DIRECTORY_BLOCKS[self.next_slot / ENTRIES_PER_BLOCK];
        let offset = 4 + (self.next_slot % ENTRIES_PER_BLOCK) * ENTRY_LENGTH;
        self.patch(block, offset, &entry);
        self.next_slot += 1;
    }

    /// Store a file as a seedling, sapling or tree, whichever fits.  Zero
    /// blocks listed in `holes` are left unallocated.
    fn add_file(&mut self, file: &RandomFile, holes: &[usize]) {
        let data_count = file.data_blocks();
        let mut pointers = vec![];
        for (i, chunk) in file.contents.chunks(BLOCK_SIZE).enumerate() {
            if holes.contains(&i) {
                pointers.push(0);
                continue;
            }
            let block = self.allocate(1);
            self.write(block, chunk);
            pointers.push(block);
        }
        if pointers.is_empty() {
            pointers.push(self.allocate(1));
        }
        let allocated = pointers.iter().filter(|p| **p != 0).count();

        if data_count == 1 {
            self.add_entry(1, file, pointers[0], 1);
        } else if data_count <= 256 {
            let index = self.allocate(1);
            self.write(index, &index_block(&pointers));
            self.add_entry(2, file, index, allocated + 1);
        } else {
            let master = self.allocate(1);
            let mut index_pointers = vec![];
            for chunk in pointers.chunks(256) {
                let index = self.allocate(1);
                self.write(index, &index_block(chunk));
                index_pointers.push(index);
            }
            self.write(master, &index_block(&index_pointers));
            self.add_entry(3, file, master, allocated + index_pointers.len() + 1);
        }
    }

    /// Write the bitmap, with every block after the last allocated one free,
    /// and the file count.
    fn finish(mut self) -> ImageBlockDevice {
        let total = self.device.total_blocks();
        let bitmap_blocks = (total + BLOCK_SIZE * 8 - 1) / (BLOCK_SIZE * 8);
        let mut bitmap = vec![0u8; bitmap_blocks * BLOCK_SIZE];
        for block in self.next_free as usize..total {
            bitmap[block / 8] |= 0x80 >> (block % 8);
        }
        for (i, chunk) in bitmap.chunks(BLOCK_SIZE).enumerate() {
            self.write(BITMAP_BLOCK + i as u16, chunk);
        }
        let mut count = [0u8; 2];
        put_u16(&mut count, 0, (self.next_slot - 1) as u16);
        self.patch(VOLUME_KEY, 4 + 0x21, &count);
        self.device
    }
}

struct RandomFile {
    name: String,
    file_type: u8,
    aux_type: u16,
    contents: Vec<u8>,
}

impl RandomFile {
    fn new(rng: &mut XorShiftRng, used_names: &mut HashSet<String>) -> RandomFile {
        let name = random_name(rng, used_names);
        let size = rng.gen_range(MIN_FILE_SIZE, MAX_FILE_SIZE);
        let file_type = FILE_TYPES[rng.gen_range(0, FILE_TYPES.len())];
        let aux_type = match file_type {
            filetype::BINARY | filetype::SYSTEM => 0x0800,
            filetype::APPLESOFT => 0x0801,
            _ => 0,
        };
        let mut contents = vec![0u8; size];
        rng.fill(&mut contents[..]);
        RandomFile {
            name,
            file_type,
            aux_type,
            contents,
        }
    }

    fn eof(&self) -> u32 {
        self.contents.len() as u32
    }

    fn data_blocks(&self) -> usize {
        ((self.contents.len() + BLOCK_SIZE - 1) / BLOCK_SIZE).max(1)
    }

    fn storage_type(&self) -> StorageType {
        match self.data_blocks() {
            1 => StorageType::Seedling,
            2..=256 => StorageType::Sapling,
            _ => StorageType::Tree,
        }
    }

    fn verify(&self, disk: &ProdosDisk) {
        let entry = disk.find(&self.name).unwrap();
        assert_eq!(entry.file_type, self.file_type);
        assert_eq!(entry.eof, self.eof());
        assert_eq!(entry.storage_type(), self.storage_type());
        assert_eq!(entry.data_blocks.len(), self.data_blocks());

        let buffers = disk.buffers(entry);
        assert_eq!(buffers.raw.len(), self.data_blocks() * BLOCK_SIZE);
        if self.contents.len() == BLOCK_SIZE || self.contents.len() == buffers.raw.len() {
            assert_eq!(buffers.exact, buffers.raw);
        }
        assert_eq!(&buffers.exact[..], &self.contents[..]);

        match self.storage_type() {
            StorageType::Sapling => assert_eq!(
                disk.sector_map().role(DiskAddress(entry.key_block)),
                Some(SectorType::Index)
            ),
            StorageType::Tree => assert_eq!(
                disk.sector_map().role(DiskAddress(entry.key_block)),
                Some(SectorType::MasterIndex)
            ),
            _ => {}
        }

        // Decoding never fails outright, whatever the contents.
        let decoded = disk.decode(entry, RenderOptions::default());
        assert_eq!(decoded.name(), self.name);
        let _ = decoded.text();
    }
}

impl fmt::Debug for RandomFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RandomFile {{ name: {:?}, size: {}, file_type: ${:02X} }}",
            self.name,
            self.contents.len(),
            self.file_type
        )
    }
}

/// Letters and digits only, starting with a letter, so that no name picks
/// up a suffix the decoders look for.
fn random_name(rng: &mut impl Rng, used_names: &mut HashSet<String>) -> String {
    const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const CHARACTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    loop {
        let length = rng.gen_range(1, 16);
        let mut name = String::new();
        name.push(LETTERS[rng.gen_range(0, LETTERS.len())] as char);
        for _ in 1..length {
            name.push(CHARACTERS[rng.gen_range(0, CHARACTERS.len())] as char);
        }
        if used_names.insert(name.clone()) {
            return name;
        }
    }
}

#[test]
fn integration_test() {
    let mut rng = deterministic_rng();

    for i in 0..ITERATIONS {
        let order = if i % 2 == 0 {
            BlockOrder::Prodos
        } else {
            BlockOrder::Dos
        };
        println!("Iteration: {} order: {:?}", i, order);

        let mut writer = VolumeWriter::new("RANDOM", VOLUME_BLOCKS, order);
        let mut used_names = HashSet::new();
        let mut files = vec![];
        for _ in 0..FILES_PER_VOLUME {
            let file = RandomFile::new(&mut rng, &mut used_names);
            writer.add_file(&file, &[]);
            files.push(file);
        }
        let used = writer.next_free as usize;
        let disk = ProdosDisk::from_device(writer.finish()).unwrap();

        assert_eq!(disk.name(), "RANDOM");
        assert_eq!(disk.catalog().root().entries.len(), FILES_PER_VOLUME);
        let summary = disk.volume_summary();
        assert_eq!(summary.total, VOLUME_BLOCKS as usize);
        assert_eq!(summary.free, VOLUME_BLOCKS as usize - used);

        for file in &files {
            file.verify(&disk);
        }
    }
}

#[test]
fn sparse_file() {
    let mut rng = deterministic_rng();
    let mut contents = vec![0u8; 6 * BLOCK_SIZE];
    rng.fill(&mut contents[..]);
    for byte in &mut contents[BLOCK_SIZE..3 * BLOCK_SIZE] {
        *byte = 0;
    }
    let file = RandomFile {
        name: "SPARSE".to_string(),
        file_type: filetype::BINARY,
        aux_type: 0x4000,
        contents,
    };
    let mut writer = VolumeWriter::new("HOLES", 280, BlockOrder::Prodos);
    writer.add_file(&file, &[1, 2]);
    let disk = ProdosDisk::from_device(writer.finish()).unwrap();

    let entry = disk.find("SPARSE").unwrap();
    assert_eq!(entry.data_blocks.len(), 6);
    assert!(entry.data_blocks[1].is_empty());
    assert!(entry.data_blocks[2].is_empty());
    assert_eq!(entry.blocks_used, 5);
    assert_eq!(disk.buffers(entry).exact, file.contents);
}

#[test]
fn random_access_text() {
    // Records of 128 bytes in a sapling whose second and third blocks were
    // never written.
    let mut contents = vec![0u8; 5 * BLOCK_SIZE];
    contents[..5].copy_from_slice(b"FIRST");
    contents[3 * BLOCK_SIZE..3 * BLOCK_SIZE + 5].copy_from_slice(b"THIRD");
    contents[4 * BLOCK_SIZE + 128..4 * BLOCK_SIZE + 133].copy_from_slice(b"FIFTH");
    let file = RandomFile {
        name: "RECORDS".to_string(),
        file_type: filetype::TEXT,
        aux_type: 128,
        contents,
    };
    let mut writer = VolumeWriter::new("TEXTS", 280, BlockOrder::Prodos);
    writer.add_file(&file, &[1, 2]);
    let disk = ProdosDisk::from_device(writer.finish()).unwrap();

    let entry = disk.find("RECORDS").unwrap();
    let runs = disk.text_runs(entry);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].first_block, 0);
    assert_eq!(runs[1].first_block, 3);

    let decoded = disk.decode(entry, RenderOptions::default());
    let text = match decoded {
        DecodedFile::Text(ref text) => text,
        ref other => panic!("decoded as {}", other.kind()),
    };
    let records: Vec<(usize, String)> = text.records();
    assert_eq!(
        records,
        vec![
            (0, "FIRST".to_string()),
            (12, "THIRD".to_string()),
            (17, "FIFTH".to_string()),
        ]
    );
}

#[test]
fn hires_pair_and_quirks() {
    let mut rng = deterministic_rng();
    let mut main = vec![0u8; 0x2000];
    rng.fill(&mut main[..]);
    let mut aux = vec![0u8; 0x2000];
    rng.fill(&mut aux[..]);
    let mut picture = vec![0u8; 0x2000];
    rng.fill(&mut picture[..]);
    // Keep the random screens from passing for shape tables.
    main[1] = 1;
    picture[1] = 1;

    let mut writer = VolumeWriter::new("PICTURES", 280, BlockOrder::Prodos);
    for (name, contents) in &[("DHR", main), ("DHR.AUX", aux), ("SCREEN", picture)] {
        let file = RandomFile {
            name: name.to_string(),
            file_type: filetype::BINARY,
            aux_type: 0x2000,
            contents: contents.clone(),
        };
        writer.add_file(&file, &[]);
    }
    let disk = ProdosDisk::from_device(writer.finish()).unwrap();

    let dhr = disk.find("DHR").unwrap();
    let decoded = disk.decode(dhr, RenderOptions::default());
    assert_eq!(decoded.kind(), "double hi-res image");
    let image = decoded.image().unwrap();
    assert_eq!((image.width, image.height), (560, 192));

    let screen = disk.find("SCREEN").unwrap();
    let plain = disk.decode_cached(screen, RenderOptions::default());
    assert_eq!(plain.kind(), "hi-res image");
    let again = disk.decode_cached(screen, RenderOptions::default());
    assert!(std::rc::Rc::ptr_eq(&plain, &again));
    let quirks = disk.decode_cached(screen, RenderOptions::new(true, false));
    assert!(!std::rc::Rc::ptr_eq(&plain, &quirks));
    assert_ne!(
        plain.image().unwrap().pixels(),
        quirks.image().unwrap().pixels()
    );
}

#[test]
fn open_image_file() {
    let mut writer = VolumeWriter::new("ONDISK", 280, BlockOrder::Prodos);
    let file = RandomFile {
        name: "HELLO".to_string(),
        file_type: filetype::TEXT,
        aux_type: 0,
        contents: b"HELLO, WORLD\r".to_vec(),
    };
    writer.add_file(&file, &[]);
    let device = writer.finish();
    let mut bytes = vec![];
    for block in 0..device.total_blocks() {
        bytes.extend(device.read_block(DiskAddress(block as u16)).unwrap());
    }

    let path = std::env::temp_dir().join(format!("prodos-test-{}.po", std::process::id()));
    fs::write(&path, &bytes).unwrap();
    {
        let disk = disk::open(&path).unwrap();
        assert_eq!(disk.name(), "ONDISK");
        let entry = disk.find("/ONDISK/HELLO").unwrap();
        let decoded = disk.decode(entry, RenderOptions::default());
        assert_eq!(decoded.text(), "HELLO, WORLD\n");
        assert!(disk.find("GOODBYE").unwrap_err() == DiskError::NotFound);
    }
    fs::remove_file(&path).unwrap();
}

#[test]
fn not_a_volume() {
    let image = Image::open_memory(280 * BLOCK_SIZE).unwrap();
    let error = ProdosDisk::from_image(image, BlockOrder::Prodos).unwrap_err();
    assert!(error == DiskError::InvalidVolumeHeader);
}
