//! Apple II hi-res graphics.
//!
//! The hi-res screen is 8 KiB holding 192 rows of 40 bytes, stored in the
//! interleaved order the video hardware scans them: the screen is split in
//! thirds of 64 rows, each third in eight groups of eight rows.  Each byte
//! contributes seven pixels, least significant bit leftmost, and its high
//! bit shifts those pixels half a dot, which selects the second colour pair.

use std::fmt::Write;

use crate::applefile::options::RenderOptions;
use crate::applefile::pixels::{PixelGrid, PixelKind, BLACK, GRAY_OFF, GRAY_ON, WHITE};
use crate::applefile::DataSource;

pub const WIDTH: usize = 280;
pub const ROWS_PER_SCREEN: usize = 192;
pub const SCREEN_SIZE: usize = 0x2000;
const BYTES_PER_ROW: usize = 40;
const PIXELS_PER_BYTE: usize = 7;

pub const RED: u32 = 0xFF0000;
pub const GREEN: u32 = 0x00FF00;
pub const BLUE: u32 = 0x0000FF;
pub const VIOLET: u32 = 0xBB66FF;

/// Indexed by the high bit of the byte, then by the parity of the pixel's
/// column.
static COLOURS: [[u32; 2]; 2] = [[VIOLET, GREEN], [BLUE, RED]];

/// Images stored by a screen compressor, recognised by name alone.
static SCRUNCHED_NAMES: [&str; 2] = ["FLY LOGO", "BIGBAT.PAC"];

/// The buffer offset of the first byte of `row` within one screen.
#[inline]
pub fn row_offset(row: usize) -> usize {
    let third = row / 64;
    let group = (row / 8) % 8;
    let line = row % 8;
    third * 0x28 + group * 0x80 + line * 0x400
}

pub fn is_scrunched(name: &str) -> bool {
    SCRUNCHED_NAMES.contains(&name)
}

/// Expand a screen stored with the repeat-count compressor.  A byte of
/// 0x80 or 0xFF is followed by a count, and stands for that many copies of
/// itself with the high bit cleared.  Every other byte is a literal.  The
/// result is always exactly one screen; missing input reads as zeros.
pub fn unscrunch(source: &[u8]) -> Vec<u8> {
    let mut screen = Vec::with_capacity(SCREEN_SIZE);
    let mut bytes = source.iter();
    while screen.len() < SCREEN_SIZE {
        let b = match bytes.next() {
            Some(b) => *b,
            None => break,
        };
        if b == 0x80 || b == 0xFF {
            let count = bytes.next().copied().unwrap_or(0) as usize;
            let count = count.min(SCREEN_SIZE - screen.len());
            screen.extend(std::iter::repeat(b & 0x7F).take(count));
        } else {
            screen.push(b);
        }
    }
    screen.resize(SCREEN_SIZE, 0);
    screen
}

#[inline]
fn is_coloured(pixel: u32) -> bool {
    pixel != BLACK && pixel != WHITE
}

/// Any two horizontally adjacent lit pixels both become white.
pub fn merge_colours(line: &mut [u32]) {
    for x in 0..line.len().saturating_sub(1) {
        if line[x] != BLACK && line[x + 1] != BLACK {
            line[x] = WHITE;
            line[x + 1] = WHITE;
        }
    }
}

/// Fill black gaps the way a real monitor smears colour across them.  Each
/// four pixel window is examined once, left to right, and at most one of
/// its two middle pixels is rewritten.  `C` and `D` below are coloured
/// pixels (neither black nor white) and `D` differs from `C`.
///
/// ```text
/// C B C B  ->  C C C B        B C B C  ->  B C C C
/// C B W W  ->  C C W W        W W B C  ->  W W C C
/// C B C W  ->  C C C W        W C B C  ->  W C C C
/// C B D B  ->  C C D B        B D B C  ->  B D C C
/// ```
pub fn apply_quirks(line: &mut [u32]) {
    for x in 0..line.len().saturating_sub(3) {
        let (px0, px1, px2, px3) = (line[x], line[x + 1], line[x + 2], line[x + 3]);

        if px1 == BLACK {
            if !is_coloured(px0) {
                continue;
            }
            let fill = (px2 == px0 && px3 == BLACK)
                || (px2 == WHITE && px3 == WHITE)
                || (px2 == px0 && px3 == WHITE)
                || (is_coloured(px2) && px2 != px0 && px3 == BLACK);
            if fill {
                line[x + 1] = px0;
            }
        } else if px2 == BLACK {
            if !is_coloured(px3) {
                continue;
            }
            let fill = (px0 == BLACK && px1 == px3)
                || (px0 == WHITE && px1 == WHITE)
                || (px0 == WHITE && px1 == px3)
                || (px0 == BLACK && is_coloured(px1) && px1 != px3);
            if fill {
                line[x + 2] = px3;
            }
        }
    }
}

/// Render one screen row into `line`.  Bytes beyond the end of the buffer
/// render as black.
fn colour_line(buffer: &[u8], base: usize, line: &mut [u32]) {
    for (column, pixel) in line.iter_mut().enumerate() {
        let ptr = base + column / PIXELS_PER_BYTE;
        let byte = buffer.get(ptr).copied().unwrap_or(0);
        let bit = (byte >> (column % PIXELS_PER_BYTE)) & 0x01;
        *pixel = if bit == 0 {
            BLACK
        } else {
            COLOURS[(byte >> 7) as usize][column % 2]
        };
    }
}

fn monochrome_line(buffer: &[u8], base: usize, line: &mut [u32]) {
    for (column, pixel) in line.iter_mut().enumerate() {
        let byte = buffer
            .get(base + column / PIXELS_PER_BYTE)
            .copied()
            .unwrap_or(0);
        *pixel = if (byte >> (column % PIXELS_PER_BYTE)) & 0x01 != 0 {
            GRAY_ON
        } else {
            GRAY_OFF
        };
    }
}

/// Render a hi-res buffer.  Buffers of one screen or less give 192 rows;
/// anything longer is taken as two screens, one above the other.
pub fn render(buffer: &[u8], options: RenderOptions) -> PixelGrid {
    let screens = if buffer.len() <= SCREEN_SIZE { 1 } else { 2 };
    render_screens(buffer, screens, options)
}

/// The number of screens a picture with this aux type holds.  The screen
/// load addresses name one screen and `$4000` names two; other aux types
/// fall back to the buffer length.
pub fn screens_for(aux_type: u16, length: usize) -> usize {
    match aux_type {
        0x1FFF | 0x2000 => 1,
        0x4000 => 2,
        _ if length <= SCREEN_SIZE => 1,
        _ => 2,
    }
}

/// Render `screens` stacked screens from `buffer`.
pub fn render_screens(buffer: &[u8], screens: usize, options: RenderOptions) -> PixelGrid {
    let height = screens * ROWS_PER_SCREEN;
    let kind = if options.monochrome {
        PixelKind::Gray
    } else {
        PixelKind::Rgb
    };
    let mut grid = PixelGrid::new(WIDTH, height, kind);
    for y in 0..height {
        let base = (y / ROWS_PER_SCREEN) * SCREEN_SIZE + row_offset(y % ROWS_PER_SCREEN);
        let line = grid.row_mut(y);
        if options.monochrome {
            monochrome_line(buffer, base, line);
        } else {
            colour_line(buffer, base, line);
            merge_colours(line);
            if options.colour_quirks {
                apply_quirks(line);
            }
        }
    }
    grid
}

/// A single or double height hi-res picture.
pub struct HiResImage {
    name: String,
    buffer: Vec<u8>,
    file_type: u8,
    aux_type: u16,
    unscrunched: bool,
    options: RenderOptions,
    image: PixelGrid,
}

impl HiResImage {
    pub fn new(
        name: &str,
        buffer: &[u8],
        file_type: u8,
        aux_type: u16,
        options: RenderOptions,
    ) -> HiResImage {
        let unscrunched = is_scrunched(name);
        let buffer = if unscrunched {
            unscrunch(buffer)
        } else {
            buffer.to_vec()
        };
        let image = render_screens(&buffer, screens_for(aux_type, buffer.len()), options);
        HiResImage {
            name: name.to_string(),
            buffer,
            file_type,
            aux_type,
            unscrunched,
            options,
            image,
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }
}

impl DataSource for HiResImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Image File : {}", self.name);
        let _ = writeln!(text, "File type  : ${:02X}", self.file_type);
        let aux_text = match (self.file_type, self.aux_type) {
            (0x08, aux) if aux < 0x4000 => "Graphics File",
            (0x08, 0x4000) => "Packed Hi-Res File",
            (0x08, 0x4001) => "Packed Double Hi-Res File",
            (_, 0x2000) | (_, 0x1FFF) => "Hi-Res Screen",
            (_, 0x4000) => "Double Height Hi-Res Screen",
            _ => "",
        };
        if !aux_text.is_empty() {
            let _ = writeln!(text, "Aux type   : ${:04X}  {}", self.aux_type, aux_text);
        }
        let _ = writeln!(text, "File size  : {}", self.buffer.len());
        if self.unscrunched {
            let _ = writeln!(text, "Unpacked   : {}", self.buffer.len());
        }
        let _ = write!(
            text,
            "Rendering  : {}x{} {}",
            self.image.width,
            self.image.height,
            if self.options.monochrome {
                "monochrome"
            } else if self.options.colour_quirks {
                "colour with quirks"
            } else {
                "colour"
            }
        );
        text
    }

    fn image(&self) -> Option<&PixelGrid> {
        Some(&self.image)
    }
}
