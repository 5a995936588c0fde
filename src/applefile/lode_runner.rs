use std::fmt::Write;

use crate::applefile::DataSource;

pub const LEVEL_FILE_SIZE: usize = 38400;
pub const LEVEL_PREFIX: &str = "LVL.";
const LEVELS: usize = 150;
const LEVEL_SIZE: usize = 256;
const COLUMNS: usize = 28;
const ROWS: usize = 16;

/// One tile per nibble value: blank, brick, solid, ladder, rope, trap door,
/// escape ladder, gold, enemy and player.
static TILES: [char; 10] = [' ', '=', '#', 'H', '-', 'X', 'S', '$', '0', '&'];

/// A Lode Runner level disk file: 150 levels of 28 by 16 tiles packed two
/// to a byte, low nibble first, in 256 byte records.
pub struct LodeRunnerLevels {
    name: String,
    buffer: Vec<u8>,
}

pub fn is_level_file(name: &str, eof: usize) -> bool {
    eof == LEVEL_FILE_SIZE && name.starts_with(LEVEL_PREFIX)
}

impl LodeRunnerLevels {
    pub fn new(name: &str, buffer: &[u8]) -> LodeRunnerLevels {
        LodeRunnerLevels {
            name: name.to_string(),
            buffer: buffer.to_vec(),
        }
    }

    /// The tiles of `level`, counting from zero, one string per row.
    pub fn level(&self, level: usize) -> Vec<String> {
        let record = self
            .buffer
            .get(level * LEVEL_SIZE..(level + 1) * LEVEL_SIZE)
            .unwrap_or(&[]);
        (0..ROWS)
            .map(|row| {
                (0..COLUMNS)
                    .map(|column| {
                        let tile = row * COLUMNS + column;
                        let byte = record.get(tile / 2).copied().unwrap_or(0);
                        let nibble = if tile % 2 == 0 { byte & 0x0F } else { byte >> 4 };
                        TILES.get(nibble as usize).copied().unwrap_or('?')
                    })
                    .collect()
            })
            .collect()
    }

    pub fn levels(&self) -> usize {
        (self.buffer.len() / LEVEL_SIZE).min(LEVELS)
    }
}

impl DataSource for LodeRunnerLevels {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Lode Runner levels: {}", self.name);
        for level in 0..self.levels() {
            let _ = writeln!(text, "\nLevel {}", level + 1);
            for row in self.level(level) {
                let _ = writeln!(text, "|{}|", row);
            }
        }
        text
    }
}
