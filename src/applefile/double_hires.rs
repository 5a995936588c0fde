//! Double hi-res pictures: two 8 KiB screens, one from auxiliary memory and
//! one from main memory, whose bytes alternate across each 560 dot line.

use std::fmt::Write;
use std::io;

use crate::applefile::error::FormatError;
use crate::applefile::hires::{row_offset, ROWS_PER_SCREEN, SCREEN_SIZE};
use crate::applefile::options::RenderOptions;
use crate::applefile::packed::unpack_bytes;
use crate::applefile::pixels::{PixelGrid, PixelKind, GRAY_OFF, GRAY_ON};
use crate::applefile::DataSource;

pub const WIDTH: usize = 560;
const BYTES_PER_ROW: usize = 40;

/// The sixteen lo-res colours, shared by double hi-res.
#[rustfmt::skip]
pub static LORES_PALETTE: [u32; 16] = [
    0x000000, 0xDD0033, 0x000099, 0xDD22DD,
    0x007722, 0x555555, 0x2222FF, 0x66AAFF,
    0x885500, 0xFF6600, 0xAAAAAA, 0xFF9988,
    0x11DD00, 0xFFFF00, 0x44FF99, 0xFFFFFF,
];

/// Where a double hi-res picture came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Two linked files.
    Pair,
    /// One file holding both screens, aux first.
    Combined,
    /// One file holding both screens, PackBytes compressed.
    Packed,
}

pub struct DoubleHiResImage {
    name: String,
    buffer: Vec<u8>,
    origin: Origin,
    options: RenderOptions,
    image: PixelGrid,
}

/// Expand one line into its 560 dots, aux byte first in each column.
fn line_bits(aux: &[u8], main: &[u8], base: usize) -> Vec<bool> {
    let mut bits = Vec::with_capacity(WIDTH);
    for column in 0..BYTES_PER_ROW {
        for half in &[aux, main] {
            let byte = half.get(base + column).copied().unwrap_or(0);
            for bit in 0..7 {
                bits.push((byte >> bit) & 0x01 != 0);
            }
        }
    }
    bits
}

fn render(aux: &[u8], main: &[u8], options: RenderOptions) -> PixelGrid {
    let kind = if options.monochrome {
        PixelKind::Gray
    } else {
        PixelKind::Rgb
    };
    let mut grid = PixelGrid::new(WIDTH, ROWS_PER_SCREEN, kind);
    for y in 0..ROWS_PER_SCREEN {
        let bits = line_bits(aux, main, row_offset(y));
        let line = grid.row_mut(y);
        if options.monochrome {
            for (pixel, bit) in line.iter_mut().zip(bits) {
                *pixel = if bit { GRAY_ON } else { GRAY_OFF };
            }
        } else {
            // The first dot of each group of four is the high bit of the
            // palette index.
            for (group, dots) in bits.chunks(4).enumerate() {
                let index = dots
                    .iter()
                    .fold(0usize, |acc, bit| (acc << 1) | *bit as usize);
                let colour = LORES_PALETTE[index];
                for pixel in &mut line[group * 4..group * 4 + dots.len()] {
                    *pixel = colour;
                }
            }
        }
    }
    grid
}

impl DoubleHiResImage {
    /// Combine two linked halves.
    pub fn new(
        name: &str,
        aux: &[u8],
        main: &[u8],
        options: RenderOptions,
    ) -> io::Result<DoubleHiResImage> {
        if aux.is_empty() || main.is_empty() {
            return Err(FormatError::Truncated.into());
        }
        if (aux.len() > SCREEN_SIZE) != (main.len() > SCREEN_SIZE) {
            return Err(FormatError::MismatchedHalves.into());
        }
        let mut buffer = Vec::with_capacity(aux.len() + main.len());
        buffer.extend_from_slice(aux);
        buffer.extend_from_slice(main);
        Ok(DoubleHiResImage {
            name: name.to_string(),
            buffer,
            origin: Origin::Pair,
            options,
            image: render(aux, main, options),
        })
    }

    /// A self-contained picture (`.PAC`, `.A2FC`).  Files of at least
    /// 16 KiB hold the two screens as they are; shorter files are packed.
    pub fn from_single(
        name: &str,
        buffer: &[u8],
        options: RenderOptions,
    ) -> io::Result<DoubleHiResImage> {
        let (screens, origin) = if buffer.len() >= 2 * SCREEN_SIZE {
            (buffer.to_vec(), Origin::Combined)
        } else {
            (unpack_bytes(buffer), Origin::Packed)
        };
        if screens.len() < 2 * SCREEN_SIZE {
            return Err(FormatError::Truncated.into());
        }
        let image = render(
            &screens[..SCREEN_SIZE],
            &screens[SCREEN_SIZE..2 * SCREEN_SIZE],
            options,
        );
        Ok(DoubleHiResImage {
            name: name.to_string(),
            buffer: screens,
            origin,
            options,
            image,
        })
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

impl DataSource for DoubleHiResImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Image File : {}", self.name);
        let _ = writeln!(
            text,
            "Source     : {}",
            match self.origin {
                Origin::Pair => "aux and main files",
                Origin::Combined => "single file",
                Origin::Packed => "single packed file",
            }
        );
        let _ = writeln!(text, "Size       : {}", self.buffer.len());
        let _ = write!(
            text,
            "Rendering  : {}x{} {}",
            self.image.width,
            self.image.height,
            if self.options.monochrome {
                "monochrome"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave() {
        let mut aux = vec![0u8; SCREEN_SIZE];
        let mut main = vec![0u8; SCREEN_SIZE];
        aux[0] = 0x01;
        main[0] = 0x40;
        let image =
            DoubleHiResImage::new("PIC", &aux, &main, RenderOptions::new(false, true)).unwrap();
        let grid = image.image().unwrap();
        assert_eq!(grid.width, WIDTH);
        assert_eq!(grid.height, 192);
        assert_eq!(grid.get(0, 0), GRAY_ON);
        assert_eq!(grid.get(13, 0), GRAY_ON);
        assert_eq!(grid.row(0).iter().filter(|p| **p == GRAY_ON).count(), 2);
    }

    #[test]
    fn test_colour_groups() {
        let mut aux = vec![0u8; SCREEN_SIZE];
        let main = vec![0u8; SCREEN_SIZE];
        // Dots 0..4 are 1,0,0,0: index 8. Dots 4..8 are 1,1,1,0 via bits 4-6
        // of aux and bit 0 of main, which is clear: index 14.
        aux[0] = 0x71;
        let image = DoubleHiResImage::new("PIC", &aux, &main, RenderOptions::default()).unwrap();
        let grid = image.image().unwrap();
        assert_eq!(&grid.row(0)[..4], &[LORES_PALETTE[8]; 4]);
        assert_eq!(&grid.row(0)[4..8], &[LORES_PALETTE[14]; 4]);
        assert_eq!(grid.get(8, 0), LORES_PALETTE[0]);
    }

    #[test]
    fn test_mismatched_halves() {
        let error = DoubleHiResImage::new(
            "PIC",
            &[0; SCREEN_SIZE],
            &[0; 2 * SCREEN_SIZE],
            RenderOptions::default(),
        )
        .err()
        .unwrap();
        assert_eq!(error, FormatError::MismatchedHalves);
        let error = DoubleHiResImage::new("PIC", &[], &[1], RenderOptions::default())
            .err()
            .unwrap();
        assert_eq!(error, FormatError::Truncated);
    }

    #[test]
    fn test_single_file() {
        let mut buffer = vec![0u8; 2 * SCREEN_SIZE];
        buffer[SCREEN_SIZE] = 0x01;
        let image =
            DoubleHiResImage::from_single("PIC.A2FC", &buffer, RenderOptions::new(false, true))
                .unwrap();
        assert_eq!(image.origin(), Origin::Combined);
        assert_eq!(image.image().unwrap().get(7, 0), GRAY_ON);

        // 16 KiB of zeros as 64 runs of 256.
        let packed = vec![0xFF, 0x00].repeat(64);
        let image =
            DoubleHiResImage::from_single("PIC.PAC", &packed, RenderOptions::default()).unwrap();
        assert_eq!(image.origin(), Origin::Packed);
        assert_eq!(image.buffer().len(), 2 * SCREEN_SIZE);

        let error = DoubleHiResImage::from_single("PIC.PAC", &[0x00, 0x01], RenderOptions::default())
            .err()
            .unwrap();
        assert_eq!(error, FormatError::Truncated);
    }
}
