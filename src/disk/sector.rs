//! Classification of blocks by the role they play on the volume.

use std::collections::BTreeMap;
use std::fmt;

use crate::disk::block::DiskAddress;

/// The role a block plays, as discovered while walking the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SectorType {
    Boot,
    Catalog,
    VolumeMap,
    Data,
    Index,
    MasterIndex,
    ExtendedKey,
}

impl SectorType {
    /// A single character used by sector maps.
    pub fn symbol(&self) -> char {
        match self {
            SectorType::Boot => 'B',
            SectorType::Catalog => 'C',
            SectorType::VolumeMap => 'V',
            SectorType::Data => 'D',
            SectorType::Index => 'I',
            SectorType::MasterIndex => 'M',
            SectorType::ExtendedKey => 'X',
        }
    }
}

impl fmt::Display for SectorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SectorType::Boot => "boot",
            SectorType::Catalog => "catalog",
            SectorType::VolumeMap => "volume map",
            SectorType::Data => "data",
            SectorType::Index => "index",
            SectorType::MasterIndex => "master index",
            SectorType::ExtendedKey => "extended key",
        })
    }
}

/// Anything that wants to hear about the role of each visited block.
/// Marking is last-write-wins and marking a block twice with the same role
/// has no further effect.
pub trait SectorRoles {
    fn mark(&mut self, address: DiskAddress, role: SectorType);
}

/// The default role collector: an ordered map from block to role.
#[derive(Clone, Debug, Default)]
pub struct SectorMap {
    roles: BTreeMap<DiskAddress, SectorType>,
}

impl SectorMap {
    pub fn new() -> SectorMap {
        SectorMap::default()
    }

    pub fn role(&self, address: DiskAddress) -> Option<SectorType> {
        self.roles.get(&address).copied()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DiskAddress, SectorType)> + '_ {
        self.roles.iter().map(|(a, r)| (*a, *r))
    }

    /// Count the blocks carrying each role.
    pub fn counts(&self) -> Vec<(SectorType, usize)> {
        let mut counts: Vec<(SectorType, usize)> = vec![];
        for role in self.roles.values() {
            match counts.iter_mut().find(|(r, _)| r == role) {
                Some((_, n)) => *n += 1,
                None => counts.push((*role, 1)),
            }
        }
        counts
    }

    /// Render a map of `total_blocks` blocks, 64 per line, with `.` for
    /// blocks that no walk has touched.
    pub fn render(&self, total_blocks: usize) -> String {
        const COLUMNS: usize = 64;
        let mut text = String::new();
        for row in (0..total_blocks).step_by(COLUMNS) {
            text.push_str(&format!("{:04X} ", row));
            for block in row..(row + COLUMNS).min(total_blocks) {
                text.push(
                    self.role(DiskAddress(block as u16))
                        .map(|r| r.symbol())
                        .unwrap_or('.'),
                );
            }
            text.push('\n');
        }
        text
    }
}

impl SectorRoles for SectorMap {
    fn mark(&mut self, address: DiskAddress, role: SectorType) {
        self.roles.insert(address, role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_idempotent() {
        let mut map = SectorMap::new();
        map.mark(DiskAddress(7), SectorType::Index);
        map.mark(DiskAddress(7), SectorType::Index);
        map.mark(DiskAddress(9), SectorType::Data);
        assert_eq!(map.len(), 2);
        assert_eq!(map.role(DiskAddress(7)), Some(SectorType::Index));

        // Last write wins.
        map.mark(DiskAddress(9), SectorType::Catalog);
        assert_eq!(map.role(DiskAddress(9)), Some(SectorType::Catalog));
        assert_eq!(map.role(DiskAddress(8)), None);
    }

    #[test]
    fn test_render() {
        let mut map = SectorMap::new();
        map.mark(DiskAddress(0), SectorType::Boot);
        map.mark(DiskAddress(2), SectorType::Catalog);
        assert_eq!(map.render(4), "0000 B.C.\n");
        assert_eq!(map.counts().len(), 2);
    }
}
