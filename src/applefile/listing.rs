use std::fmt::Write;

use crate::applefile::DataSource;
use crate::disk::block::BLOCK_SIZE;
use crate::disk::entry::{
    storage_type_of, Access, DIRECTORY_LINK_SIZE, ENTRIES_PER_BLOCK, ENTRY_LENGTH,
};
use crate::disk::filetype;
use crate::disk::storage::StorageType;
use crate::util;

/// Block counts for the volume a directory lives on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VolumeSummary {
    pub total: usize,
    pub free: usize,
    pub used: usize,
}

impl VolumeSummary {
    pub fn new(total: usize, free: usize) -> VolumeSummary {
        VolumeSummary {
            total,
            free,
            used: total.saturating_sub(free),
        }
    }
}

fn date_text(entry: &[u8], offset: usize) -> String {
    match util::prodos_date(entry, offset) {
        Some(date) => date.format("%d-%b-%y %H:%M").to_string().to_uppercase(),
        None => "<NO DATE>".to_string(),
    }
}

/// A subdirectory file shown the way `CATALOG` shows it.  The buffer is the
/// directory's blocks with their link words removed.
pub struct DirectoryListing {
    name: String,
    buffer: Vec<u8>,
    volume: VolumeSummary,
}

impl DirectoryListing {
    pub fn new(name: &str, buffer: &[u8], volume: VolumeSummary) -> DirectoryListing {
        DirectoryListing {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            volume,
        }
    }

    /// Every entry slot in the buffer, header included.
    fn slots(&self) -> impl Iterator<Item = &[u8]> {
        self.buffer
            .chunks(BLOCK_SIZE - DIRECTORY_LINK_SIZE)
            .flat_map(|block| block.chunks_exact(ENTRY_LENGTH).take(ENTRIES_PER_BLOCK))
    }
}

impl DataSource for DirectoryListing {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "/{}\n", self.name);
        let _ = writeln!(
            text,
            " NAME            TYPE  BLOCKS  MODIFIED         CREATED          ENDFILE SUBTYPE\n"
        );
        let mut files = 0;
        for slot in self.slots() {
            let storage_type = storage_type_of(slot);
            match storage_type {
                StorageType::Deleted
                | StorageType::SubdirHeader
                | StorageType::VolumeHeader
                | StorageType::Unknown(_) => continue,
                _ => {}
            }
            let length = (slot[0] & 0x0F) as usize;
            let name = util::apple_text(&slot[1..1 + length]);
            let locked = if Access(slot[0x1E]).is_locked() { '*' } else { ' ' };
            let aux = util::unsigned_short(slot, 0x1F);
            let _ = writeln!(
                text,
                "{}{:<15} {:<4} {:>7}  {:<16} {:<16} {:>7} ${:04X}",
                locked,
                name,
                filetype::type_name(slot[0x10]),
                util::unsigned_short(slot, 0x13),
                date_text(slot, 0x21),
                date_text(slot, 0x18),
                util::unsigned_triple(slot, 0x15),
                aux
            );
            files += 1;
        }
        let _ = writeln!(
            text,
            "\n{} FILES   BLOCKS FREE: {}   BLOCKS USED: {}   TOTAL BLOCKS: {}",
            files, self.volume.free, self.volume.used, self.volume.total
        );
        text
    }
}
