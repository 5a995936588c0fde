use std::fmt::Write;
use std::io;

use crate::applefile::error::FormatError;
use crate::applefile::pixels::{PixelGrid, PixelKind, GRAY_ON};
use crate::applefile::DataSource;
use crate::util;

const GLYPH_WIDTH: usize = 7;
const GLYPH_HEIGHT: usize = 8;
const GLYPHS_PER_ROW: usize = 16;

/// A hi-res screen font: eight bytes per character, one per row, with the
/// leftmost dot in bit 0.  Files hold either the 96 printable characters
/// or all 128.
pub struct FontFile {
    name: String,
    buffer: Vec<u8>,
    image: PixelGrid,
}

pub fn is_font(buffer: &[u8]) -> bool {
    buffer.len() == 96 * GLYPH_HEIGHT || buffer.len() == 128 * GLYPH_HEIGHT
}

impl FontFile {
    pub fn new(name: &str, buffer: &[u8]) -> io::Result<FontFile> {
        if !is_font(buffer) {
            return Err(FormatError::InvalidSignature.into());
        }
        let glyphs = buffer.len() / GLYPH_HEIGHT;
        let rows = glyphs / GLYPHS_PER_ROW;
        let cell_width = GLYPH_WIDTH + 1;
        let cell_height = GLYPH_HEIGHT + 1;
        let mut image = PixelGrid::new(GLYPHS_PER_ROW * cell_width, rows * cell_height, PixelKind::Gray);
        for (n, glyph) in buffer.chunks_exact(GLYPH_HEIGHT).enumerate() {
            let left = (n % GLYPHS_PER_ROW) * cell_width;
            let top = (n / GLYPHS_PER_ROW) * cell_height;
            for (y, row) in glyph.iter().enumerate() {
                for x in 0..GLYPH_WIDTH {
                    if row & (1 << x) != 0 {
                        image.set(left + x, top + y, GRAY_ON);
                    }
                }
            }
        }
        Ok(FontFile {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            image,
        })
    }

    /// The first character code in the file.
    pub fn first_char(&self) -> u8 {
        if self.buffer.len() == 96 * GLYPH_HEIGHT {
            0x20
        } else {
            0x00
        }
    }
}

impl DataSource for FontFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let glyphs = self.buffer.len() / GLYPH_HEIGHT;
        let mut text = String::new();
        let _ = writeln!(text, "Font       : {}", self.name);
        let _ = writeln!(
            text,
            "Characters : {} (${:02X}-${:02X})",
            glyphs,
            self.first_char(),
            self.first_char() as usize + glyphs - 1
        );
        let _ = writeln!(text, "Glyph size : {}x{}\n", GLYPH_WIDTH, GLYPH_HEIGHT);
        text.push_str(&self.image.to_unicode());
        text
    }

    fn image(&self) -> Option<&PixelGrid> {
        Some(&self.image)
    }
}

/// The fixed part of a Macintosh-style font record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontRecord {
    pub font_type: u16,
    pub first_char: u16,
    pub last_char: u16,
    pub wid_max: u16,
    pub kern_max: i16,
    pub n_descent: i16,
    pub f_rect_width: u16,
    pub f_rect_height: u16,
    pub ow_t_loc: u16,
    pub ascent: u16,
    pub descent: u16,
    pub leading: u16,
    pub row_words: u16,
}

const FONT_RECORD_SIZE: usize = 26;

/// An Apple IIgs QuickDraw II font: a Pascal string family name, a IIgs
/// header and a Macintosh font record whose strike is rendered as an image.
pub struct QuickDrawFont {
    name: String,
    buffer: Vec<u8>,
    family_name: String,
    family: u16,
    style: u16,
    size: u16,
    version: u16,
    extent: u16,
    record: FontRecord,
    strike: PixelGrid,
}

impl QuickDrawFont {
    pub fn new(name: &str, buffer: &[u8]) -> io::Result<QuickDrawFont> {
        let name_length = *buffer.first().ok_or(FormatError::Truncated)? as usize;
        let header = 1 + name_length;
        if buffer.len() < header + 12 {
            return Err(FormatError::Truncated.into());
        }
        let family_name = util::apple_text(&buffer[1..header]);
        let word = |offset: usize| util::unsigned_short(buffer, offset);

        let record_start = header + word(header) as usize * 2;
        if buffer.len() < record_start + FONT_RECORD_SIZE {
            return Err(FormatError::InvalidOffset.into());
        }
        let r = |i: usize| word(record_start + i * 2);
        let record = FontRecord {
            font_type: r(0),
            first_char: r(1),
            last_char: r(2),
            wid_max: r(3),
            kern_max: r(4) as i16,
            n_descent: r(5) as i16,
            f_rect_width: r(6),
            f_rect_height: r(7),
            ow_t_loc: r(8),
            ascent: r(9),
            descent: r(10),
            leading: r(11),
            row_words: r(12),
        };

        let strike_start = record_start + FONT_RECORD_SIZE;
        let row_bytes = record.row_words as usize * 2;
        let strike_size = row_bytes * record.f_rect_height as usize;
        if buffer.len() < strike_start + strike_size {
            return Err(FormatError::Truncated.into());
        }
        let mut strike = PixelGrid::new(row_bytes * 8, record.f_rect_height as usize, PixelKind::Gray);
        for y in 0..record.f_rect_height as usize {
            let row = &buffer[strike_start + y * row_bytes..strike_start + (y + 1) * row_bytes];
            for (i, byte) in row.iter().enumerate() {
                for bit in 0..8 {
                    if byte & (0x80 >> bit) != 0 {
                        strike.set(i * 8 + bit, y, GRAY_ON);
                    }
                }
            }
        }

        Ok(QuickDrawFont {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            family_name,
            family: word(header + 2),
            style: word(header + 4),
            size: word(header + 6),
            version: word(header + 8),
            extent: word(header + 10),
            record,
            strike,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn record(&self) -> &FontRecord {
        &self.record
    }
}

impl DataSource for QuickDrawFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let r = &self.record;
        let mut text = String::new();
        let _ = writeln!(text, "Name        : {}", self.name);
        let _ = writeln!(text, "Family name : {}", self.family_name);
        let _ = writeln!(text, "Family      : ${:04X}", self.family);
        let _ = writeln!(text, "Style       : ${:04X}", self.style);
        let _ = writeln!(text, "Point size  : {}", self.size);
        let _ = writeln!(text, "Version     : {}.{}", self.version >> 8, self.version & 0xFF);
        let _ = writeln!(text, "Extent      : {}", self.extent);
        let _ = writeln!(text, "Font type   : ${:04X}", r.font_type);
        let _ = writeln!(text, "Characters  : ${:02X}-${:02X}", r.first_char, r.last_char);
        let _ = writeln!(text, "Max width   : {}", r.wid_max);
        let _ = writeln!(text, "Max kern    : {}", r.kern_max);
        let _ = writeln!(text, "Rectangle   : {}x{}", r.f_rect_width, r.f_rect_height);
        let _ = writeln!(text, "Ascent      : {}", r.ascent);
        let _ = writeln!(text, "Descent     : {}", r.descent);
        let _ = writeln!(text, "Leading     : {}", r.leading);
        let _ = write!(text, "Strike      : {} words per row", r.row_words);
        text
    }

    fn image(&self) -> Option<&PixelGrid> {
        Some(&self.strike)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_file() {
        let mut buffer = vec![0u8; 768];
        // Character $21 is a vertical bar in the leftmost column.
        for row in &mut buffer[8..16] {
            *row = 0x01;
        }
        let font = FontFile::new("SMALL.FNT", &buffer).unwrap();
        let grid = font.image().unwrap();
        assert_eq!((grid.width, grid.height), (128, 54));
        assert_eq!(grid.get(8, 0), GRAY_ON);
        assert_eq!(grid.get(9, 0), 0);
        assert!(font.text().contains("Characters : 96 ($20-$7F)"));
        assert!(FontFile::new("X.FNT", &[0; 100]).is_err());
    }

    fn quickdraw_font() -> Vec<u8> {
        let mut buffer = vec![4];
        buffer.extend_from_slice(b"TEST");
        // IIgs header: record offset 6 words, family, style, size, version,
        // extent.
        for word in &[6u16, 0x0FFE, 0, 8, 0x0101, 8] {
            buffer.extend_from_slice(&word.to_le_bytes());
        }
        for word in &[0x9000u16, 0x20, 0x7F, 8, 0, 0xFFFE, 8, 2, 0, 6, 2, 1, 1] {
            buffer.extend_from_slice(&word.to_le_bytes());
        }
        buffer.extend_from_slice(&[0x80, 0x01, 0xFF, 0x00]);
        buffer
    }

    #[test]
    fn test_quickdraw_font() {
        let font = QuickDrawFont::new("TEST.FONT", &quickdraw_font()).unwrap();
        assert_eq!(font.family_name(), "TEST");
        assert_eq!(font.record().last_char, 0x7F);
        assert_eq!(font.record().n_descent, -2);
        let strike = font.image().unwrap();
        assert_eq!((strike.width, strike.height), (16, 2));
        assert_eq!(strike.get(0, 0), GRAY_ON);
        assert_eq!(strike.get(15, 0), GRAY_ON);
        assert_eq!(strike.get(7, 1), GRAY_ON);
        assert_eq!(strike.get(8, 1), 0);
        assert!(font.text().contains("Point size  : 8"));
    }

    #[test]
    fn test_quickdraw_truncated() {
        let mut font = quickdraw_font();
        font.truncate(font.len() - 1);
        assert!(QuickDrawFont::new("TEST.FONT", &font).is_err());
        assert!(QuickDrawFont::new("TEST.FONT", &[]).is_err());
    }
}
