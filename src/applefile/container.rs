use std::fmt::Write;

use image::{DynamicImage, ImageFormat};
use log::debug;

use crate::applefile::error::FormatError;
use crate::applefile::options::RenderOptions;
use crate::applefile::pixels::{luminance, PixelGrid, PixelKind};
use crate::applefile::DataSource;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// The container formats recognised by signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    Gif,
    Png,
    Bmp,
}

impl ContainerFormat {
    /// Identify a GIF or PNG file by its magic bytes.  BMP files are only
    /// recognised together with a `.BMP` suffix, since two bytes of
    /// signature are too weak on their own.
    pub fn detect(name: &str, buffer: &[u8]) -> Option<ContainerFormat> {
        if buffer.starts_with(b"GIF87a") || buffer.starts_with(b"GIF89a") {
            Some(ContainerFormat::Gif)
        } else if buffer.starts_with(&PNG_SIGNATURE) {
            Some(ContainerFormat::Png)
        } else if name.to_ascii_uppercase().ends_with(".BMP") && buffer.starts_with(b"BM") {
            Some(ContainerFormat::Bmp)
        } else {
            None
        }
    }

    fn label(self) -> &'static str {
        match self {
            ContainerFormat::Gif => "GIF",
            ContainerFormat::Png => "PNG",
            ContainerFormat::Bmp => "BMP",
        }
    }

    /// Shortest buffer that holds the format's header.
    fn header_size(self) -> usize {
        match self {
            ContainerFormat::Gif => 10,
            ContainerFormat::Png => 24,
            ContainerFormat::Bmp => 26,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ContainerFormat::Gif => ImageFormat::Gif,
            ContainerFormat::Png => ImageFormat::Png,
            ContainerFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

/// An image in a standard container format stored on the disk, decoded
/// into a pixel grid.
pub struct ContainerImage {
    name: String,
    buffer: Vec<u8>,
    format: ContainerFormat,
    aux_type: u16,
    image: PixelGrid,
}

impl ContainerImage {
    pub fn new(
        name: &str,
        buffer: &[u8],
        aux_type: u16,
        options: RenderOptions,
    ) -> Result<ContainerImage, FormatError> {
        let format = ContainerFormat::detect(name, buffer).ok_or(FormatError::InvalidSignature)?;
        if buffer.len() < format.header_size() {
            return Err(FormatError::Truncated);
        }
        let decoded = image::load_from_memory_with_format(buffer, format.image_format())
            .map_err(|e| {
                debug!("{}: {} decode failed: {}", name, format.label(), e);
                FormatError::CorruptData
            })?;
        let image = to_grid(&decoded, options);
        Ok(ContainerImage {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            format,
            aux_type,
            image,
        })
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.image.width, self.image.height)
    }
}

fn to_grid(decoded: &DynamicImage, options: RenderOptions) -> PixelGrid {
    let rgb = decoded.to_rgb8();
    let kind = if options.monochrome {
        PixelKind::Gray
    } else {
        PixelKind::Rgb
    };
    let mut grid = PixelGrid::new(rgb.width() as usize, rgb.height() as usize, kind);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let colour = (r as u32) << 16 | (g as u32) << 8 | b as u32;
        let value = if options.monochrome {
            luminance(colour)
        } else {
            colour
        };
        grid.set(x as usize, y as usize, value);
    }
    grid
}

impl DataSource for ContainerImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Image File : {}", self.name);
        let _ = writeln!(text, "Format     : {}", self.format.label());
        let _ = writeln!(text, "Dimensions : {}x{}", self.image.width, self.image.height);
        let _ = writeln!(text, "Aux type   : ${:04X}", self.aux_type);
        let _ = write!(text, "File size  : {}", self.buffer.len());
        text
    }

    fn image(&self) -> Option<&PixelGrid> {
        Some(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applefile::pixels::{BLACK, WHITE};

    const RED: u32 = 0xFF0000;
    const GREEN: u32 = 0x00FF00;
    const BLUE: u32 = 0x0000FF;

    /// One red pixel, from a two colour global palette.
    #[rustfmt::skip]
    const GIF: [u8; 34] = [
        b'G', b'I', b'F', b'8', b'9', b'a', 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00,
        0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF,
        0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00,
        0x02, 0x02, 0x44, 0x01, 0x00,
    ];

    /// A red pixel then a blue one.
    #[rustfmt::skip]
    const PNG: [u8; 70] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
        0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01,
        0x08, 0x02, 0x00, 0x00, 0x00, 0x7B, 0x40, 0xE8, 0xDD, 0x00, 0x00, 0x00,
        0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8, 0xCF, 0x00, 0x04,
        0xFF, 0x01, 0x07, 0x00, 0x01, 0xFF, 0xE2, 0x23, 0x9E, 0x59, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    fn gif() -> Vec<u8> {
        let mut gif = GIF.to_vec();
        gif.push(0x3B);
        gif
    }

    /// 2x2, 24 bits per pixel, stored bottom row first.
    fn bmp() -> Vec<u8> {
        let pixels: [u8; 16] = [
            0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, // blue, green
            0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, // red, white
        ];
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&(54 + pixels.len() as u32).to_le_bytes());
        bmp.extend_from_slice(&[0; 4]);
        bmp.extend_from_slice(&54u32.to_le_bytes());
        bmp.extend_from_slice(&40u32.to_le_bytes());
        bmp.extend_from_slice(&2i32.to_le_bytes());
        bmp.extend_from_slice(&2i32.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&24u16.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        bmp.extend_from_slice(&(pixels.len() as u32).to_le_bytes());
        bmp.extend_from_slice(&2835i32.to_le_bytes());
        bmp.extend_from_slice(&2835i32.to_le_bytes());
        bmp.extend_from_slice(&[0; 8]);
        bmp.extend_from_slice(&pixels);
        bmp
    }

    #[test]
    fn test_gif() {
        let image = ContainerImage::new("LOGO", &gif(), 0x2000, RenderOptions::default()).unwrap();
        assert_eq!(image.format(), ContainerFormat::Gif);
        assert_eq!(image.dimensions(), (1, 1));
        assert!(image.text().contains("1x1"));
        let grid = image.image().unwrap();
        assert_eq!(grid.kind, PixelKind::Rgb);
        assert_eq!(grid.get(0, 0), RED);
    }

    #[test]
    fn test_png() {
        let image = ContainerImage::new("SHOT", &PNG, 0, RenderOptions::default()).unwrap();
        assert_eq!(image.format(), ContainerFormat::Png);
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.image().unwrap().row(0), &[RED, BLUE]);
    }

    #[test]
    fn test_bmp_requires_suffix() {
        let bmp = bmp();
        assert_eq!(ContainerFormat::detect("PIC", &bmp), None);
        let image = ContainerImage::new("pic.bmp", &bmp, 0, RenderOptions::default()).unwrap();
        let grid = image.image().unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(grid.row(0), &[RED, WHITE]);
        assert_eq!(grid.row(1), &[BLUE, GREEN]);
        assert_ne!(grid.get(0, 0), BLACK);
    }

    #[test]
    fn test_monochrome() {
        let options = RenderOptions::new(false, true);
        let image = ContainerImage::new("pic.bmp", &bmp(), 0, options).unwrap();
        let grid = image.image().unwrap();
        assert_eq!(grid.kind, PixelKind::Gray);
        assert_eq!(grid.get(1, 0), 255);
        assert_eq!(grid.get(0, 0), luminance(RED));
    }

    #[test]
    fn test_rejects() {
        let options = RenderOptions::default();
        assert_eq!(
            ContainerImage::new("X", b"GIF87a", 0, options).err(),
            Some(FormatError::Truncated)
        );
        assert_eq!(
            ContainerImage::new("X", b"JFIF", 0, options).err(),
            Some(FormatError::InvalidSignature)
        );
        // A header with no image data behind it.
        assert_eq!(
            ContainerImage::new("X", &PNG[..33], 0, options).err(),
            Some(FormatError::CorruptData)
        );
    }
}
