pub const BLACK: u32 = 0x000000;
pub const WHITE: u32 = 0xFFFFFF;
/// Monochrome pixel values.
pub const GRAY_ON: u32 = 255;
pub const GRAY_OFF: u32 = 0;

/// Gray level of a `0xRRGGBB` colour.
pub fn luminance(rgb: u32) -> u32 {
    let r = (rgb >> 16) & 0xFF;
    let g = (rgb >> 8) & 0xFF;
    let b = rgb & 0xFF;
    (r * 299 + g * 587 + b * 114) / 1000
}

/// How to read the values in a `PixelGrid`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelKind {
    /// `0xRRGGBB`
    Rgb,
    /// 0..=255
    Gray,
}

/// A decoded picture, stored row by row.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelGrid {
    pub width: usize,
    pub height: usize,
    pub kind: PixelKind,
    pixels: Vec<u32>,
}

/// These codepoints are block element glyphs that can represent any
/// combination of a 2x2 pixel bitmap.  The most significant two bits are the
/// upper pixels, and the least significant bits are the lower pixels.
#[rustfmt::skip]
static UNICODE_BLOCK_ELEMENTS: [char; 16] = [
    ' ', '\u{2597}', '\u{2596}', '\u{2584}',
    '\u{259D}', '\u{2590}', '\u{259E}', '\u{259F}',
    '\u{2598}', '\u{259A}', '\u{258C}', '\u{2599}',
    '\u{2580}', '\u{259C}', '\u{259B}', '\u{2588}',
];

impl PixelGrid {
    pub fn new(width: usize, height: usize, kind: PixelKind) -> PixelGrid {
        PixelGrid {
            width,
            height,
            kind,
            pixels: vec![0; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u32) {
        self.pixels[y * self.width + x] = value;
    }

    pub fn row(&self, y: usize) -> &[u32] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Render the grid as Unicode block elements, two pixels square per
    /// character.  Any non-black pixel counts as lit.
    pub fn to_unicode(&self) -> String {
        let rows = (self.height + 1) / 2;
        let columns = (self.width + 1) / 2;
        let lit = |x: usize, y: usize| -> u8 {
            if x < self.width && y < self.height && self.get(x, y) != 0 {
                1
            } else {
                0
            }
        };
        let mut string = String::with_capacity(3 * rows * (columns + 1));
        for row in 0..rows {
            let y = row * 2;
            for column in 0..columns {
                let x = column * 2;
                let glyph = (lit(x, y) << 3) | (lit(x + 1, y) << 2) | (lit(x, y + 1) << 1) | lit(x + 1, y + 1);
                string.push(UNICODE_BLOCK_ELEMENTS[glyph as usize]);
            }
            string.push('\n');
        }
        string
    }
}
