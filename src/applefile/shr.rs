//! Apple IIgs super hi-res screens.
//!
//! A screen image is 32 KiB: 200 lines of 160 pixel bytes, then one
//! scan-line control byte per line, 56 unused bytes, and sixteen palettes
//! of sixteen colours.  Each control byte picks the line's palette in its
//! low nibble and switches the line to 640 dot mode with bit 7.

use std::fmt::Write;
use std::io;

use crate::applefile::error::FormatError;
use crate::applefile::options::RenderOptions;
use crate::applefile::packed::unpack_bytes;
use crate::applefile::pixels::{luminance, PixelGrid, PixelKind};
use crate::applefile::DataSource;
use crate::disk::filetype;

const LINES: usize = 200;
const BYTES_PER_LINE: usize = 160;
const PIXEL_DATA_SIZE: usize = LINES * BYTES_PER_LINE;
const SCB_OFFSET: usize = 32000;
const PALETTE_OFFSET: usize = 32256;
const PALETTE_SIZE: usize = 32;
pub const SCREEN_SIZE: usize = 32768;

const SCB_640: u8 = 0x80;

/// In 640 mode the four dots of a byte, leftmost first, draw from these
/// quarters of the palette.
static QUARTERS_640: [usize; 4] = [8, 12, 0, 4];

/// Convert a palette entry to `0xRRGGBB`.
fn colour_word(low: u8, high: u8) -> u32 {
    let expand = |nibble: u8| (nibble & 0x0F) as u32 * 17;
    let red = expand(high);
    let green = expand(low >> 4);
    let blue = expand(low);
    (red << 16) | (green << 8) | blue
}

/// A decoded screen, or a summary of a variant that is not rendered.
pub struct SuperHiResImage {
    name: String,
    buffer: Vec<u8>,
    file_type: u8,
    aux_type: u16,
    packed_size: Option<usize>,
    image: Option<PixelGrid>,
}

fn palettes(screen: &[u8]) -> Vec<[u32; 16]> {
    (0..16)
        .map(|p| {
            let mut palette = [0u32; 16];
            let base = PALETTE_OFFSET + p * PALETTE_SIZE;
            for (i, colour) in palette.iter_mut().enumerate() {
                *colour = colour_word(screen[base + i * 2], screen[base + i * 2 + 1]);
            }
            palette
        })
        .collect()
}

fn render(screen: &[u8], options: RenderOptions) -> PixelGrid {
    let control = &screen[SCB_OFFSET..SCB_OFFSET + LINES];
    let wide = control.iter().any(|scb| scb & SCB_640 != 0);
    let width = if wide { 640 } else { 320 };
    let kind = if options.monochrome {
        PixelKind::Gray
    } else {
        PixelKind::Rgb
    };
    let palettes = palettes(screen);
    let mut grid = PixelGrid::new(width, LINES, kind);

    for (y, scb) in control.iter().enumerate() {
        let palette = &palettes[(scb & 0x0F) as usize];
        let pixels = &screen[y * BYTES_PER_LINE..(y + 1) * BYTES_PER_LINE];
        let mut colours = Vec::with_capacity(width);
        if scb & SCB_640 != 0 {
            for byte in pixels {
                for (dot, quarter) in QUARTERS_640.iter().enumerate() {
                    let value = (byte >> (6 - dot * 2)) & 0x03;
                    colours.push(palette[quarter + value as usize]);
                }
            }
        } else {
            let repeat = width / 320;
            for byte in pixels {
                for nibble in &[byte >> 4, byte & 0x0F] {
                    for _ in 0..repeat {
                        colours.push(palette[*nibble as usize]);
                    }
                }
            }
        }
        let line = grid.row_mut(y);
        for (pixel, colour) in line.iter_mut().zip(colours) {
            *pixel = if options.monochrome {
                luminance(colour)
            } else {
                colour
            };
        }
    }
    grid
}

impl SuperHiResImage {
    pub fn new(
        name: &str,
        buffer: &[u8],
        file_type: u8,
        aux_type: u16,
        options: RenderOptions,
    ) -> io::Result<SuperHiResImage> {
        let (screen, packed_size) = match (file_type, aux_type) {
            (filetype::PNT, 0x0001) => (Some(unpack_bytes(buffer)), Some(buffer.len())),
            (filetype::PIC, 0x0000) => (Some(buffer.to_vec()), None),
            _ => (None, None),
        };

        let (buffer, image) = match screen {
            Some(mut screen) => {
                if screen.len() < PIXEL_DATA_SIZE {
                    return Err(FormatError::Truncated.into());
                }
                screen.resize(SCREEN_SIZE.max(screen.len()), 0);
                let image = render(&screen, options);
                (screen, Some(image))
            }
            None => (buffer.to_vec(), None),
        };

        Ok(SuperHiResImage {
            name: name.to_string(),
            buffer,
            file_type,
            aux_type,
            packed_size,
            image,
        })
    }

    pub fn description(&self) -> &'static str {
        match (self.file_type, self.aux_type) {
            (filetype::PNT, 0x0001) => "Packed Super Hi-Res Image",
            (filetype::PNT, 0x0002) => "Super Hi-Res Image",
            (filetype::PNT, 0x0003) => "Packed QuickDraw II PICT File",
            (filetype::PIC, 0x0000) => "Super Hi-res Screen Image",
            (filetype::PIC, 0x0001) => "QuickDraw PICT File",
            (filetype::PIC, 0x0002) => "Super Hi-Res 3200 color image",
            _ => "Super Hi-Res",
        }
    }
}

impl DataSource for SuperHiResImage {
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
        let _ = writeln!(
            text,
            "Aux type   : ${:04X}  {}",
            self.aux_type,
            self.description()
        );
        if let Some(packed) = self.packed_size {
            let _ = writeln!(text, "Packed     : {}", packed);
            let _ = writeln!(text, "Unpacked   : {}", self.buffer.len());
        } else {
            let _ = writeln!(text, "File size  : {}", self.buffer.len());
        }
        match &self.image {
            Some(image) => {
                let wide = self.buffer[SCB_OFFSET..SCB_OFFSET + LINES]
                    .iter()
                    .filter(|scb| **scb & SCB_640 != 0)
                    .count();
                let _ = write!(
                    text,
                    "Rendering  : {}x{}, {} lines in 640 mode",
                    image.width, image.height, wide
                );
            }
            None => {
                let _ = write!(text, "Rendering  : not decoded");
            }
        }
        text
    }

    fn image(&self) -> Option<&PixelGrid> {
        self.image.as_ref()
    }
}
