//! Applesoft shape tables.
//!
//! A table starts with a shape count and an unused byte, followed by one
//! 16-bit offset per shape.  Each shape is a run of bytes, terminated by
//! zero, packing up to three plot vectors: section A in bits 0-2, B in bits
//! 3-5 and C in bits 6-7.  Bit 2 of a section asks for a dot to be plotted
//! before moving; the low two bits give the direction of the move.  C has
//! no plot bit.

use std::fmt::Write;

use crate::applefile::pixels::{PixelGrid, PixelKind, GRAY_ON};
use crate::applefile::DataSource;
use crate::util;

const SHAPES_PER_ROW: usize = 8;

/// A single decoded shape: the dots it plots relative to its start point.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub index: usize,
    pub offset: usize,
    dots: Vec<(i32, i32)>,
    min: (i32, i32),
    max: (i32, i32),
}

impl Shape {
    fn decode(index: usize, buffer: &[u8], offset: usize) -> Shape {
        let mut shape = Shape {
            index,
            offset,
            dots: Vec::new(),
            min: (0, 0),
            max: (0, 0),
        };
        let mut position = (0i32, 0i32);
        for byte in buffer[offset..].iter().take_while(|b| **b != 0) {
            let a = byte & 0x07;
            let b = (byte >> 3) & 0x07;
            let c = byte >> 6;

            shape.vector(&mut position, a);
            if b == 0 && c == 0 {
                continue;
            }
            shape.vector(&mut position, b);
            if c != 0 {
                shape.vector(&mut position, c);
            }
        }
        shape
    }

    fn vector(&mut self, position: &mut (i32, i32), section: u8) {
        if section & 0x04 != 0 {
            self.plot(*position);
        }
        match section & 0x03 {
            0 => position.1 -= 1,
            1 => position.0 += 1,
            2 => position.1 += 1,
            _ => position.0 -= 1,
        }
    }

    fn plot(&mut self, dot: (i32, i32)) {
        if self.dots.is_empty() {
            self.min = dot;
            self.max = dot;
        } else {
            self.min = (self.min.0.min(dot.0), self.min.1.min(dot.1));
            self.max = (self.max.0.max(dot.0), self.max.1.max(dot.1));
        }
        self.dots.push(dot);
    }

    pub fn width(&self) -> usize {
        if self.dots.is_empty() {
            0
        } else {
            (self.max.0 - self.min.0 + 1) as usize
        }
    }

    pub fn height(&self) -> usize {
        if self.dots.is_empty() {
            0
        } else {
            (self.max.1 - self.min.1 + 1) as usize
        }
    }

    /// Dots in shape coordinates, with the top-left plotted dot at 0,0.
    pub fn dots(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.dots
            .iter()
            .map(move |(x, y)| ((x - self.min.0) as usize, (y - self.min.1) as usize))
    }

    fn to_ascii(&self) -> String {
        let mut rows = vec![vec!['.'; self.width()]; self.height()];
        for (x, y) in self.dots() {
            rows[y][x] = '#';
        }
        let mut text = String::new();
        for row in rows {
            text.extend(row);
            text.push('\n');
        }
        text
    }
}

/// Check the table header and every shape offset.
pub fn is_shape_table(buffer: &[u8]) -> bool {
    if buffer.len() < 2 {
        return false;
    }
    let count = buffer[0] as usize;
    if count == 0 || buffer[1] != 0 {
        return false;
    }
    let first_shape = 2 + 2 * count;
    if buffer.len() < first_shape {
        return false;
    }
    let mut previous = first_shape;
    for i in 0..count {
        let offset = util::unsigned_short(buffer, 2 + 2 * i) as usize;
        if offset < previous || offset >= buffer.len() {
            return false;
        }
        if !buffer[offset..].contains(&0) {
            return false;
        }
        previous = offset;
    }
    true
}

pub struct ShapeTable {
    name: String,
    buffer: Vec<u8>,
    shapes: Vec<Shape>,
    image: PixelGrid,
}

impl ShapeTable {
    /// Decode a buffer that has passed `is_shape_table`.
    pub fn new(name: &str, buffer: &[u8]) -> ShapeTable {
        let count = buffer.first().copied().unwrap_or(0) as usize;
        let shapes: Vec<Shape> = (0..count)
            .filter_map(|i| {
                let offset = util::unsigned_short(buffer, 2 + 2 * i) as usize;
                if offset < buffer.len() {
                    Some(Shape::decode(i + 1, buffer, offset))
                } else {
                    None
                }
            })
            .collect();
        let image = ShapeTable::render(&shapes);
        ShapeTable {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            shapes,
            image,
        }
    }

    /// Lay the shapes out in a grid of equal cells with a one dot border.
    fn render(shapes: &[Shape]) -> PixelGrid {
        let cell_width = shapes.iter().map(Shape::width).max().unwrap_or(0) + 2;
        let cell_height = shapes.iter().map(Shape::height).max().unwrap_or(0) + 2;
        let columns = shapes.len().clamp(1, SHAPES_PER_ROW);
        let rows = (shapes.len() + SHAPES_PER_ROW - 1) / SHAPES_PER_ROW;
        let mut grid = PixelGrid::new(columns * cell_width, rows.max(1) * cell_height, PixelKind::Gray);
        for (n, shape) in shapes.iter().enumerate() {
            let left = (n % SHAPES_PER_ROW) * cell_width + 1;
            let top = (n / SHAPES_PER_ROW) * cell_height + 1;
            for (x, y) in shape.dots() {
                grid.set(left + x, top + y, GRAY_ON);
            }
        }
        grid
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }
}

impl DataSource for ShapeTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Shape table: {}", self.name);
        let _ = writeln!(text, "Shapes     : {}", self.shapes.len());
        for shape in &self.shapes {
            let _ = writeln!(
                text,
                "\nShape #{} at ${:04X}, {}x{}",
                shape.index,
                shape.offset,
                shape.width(),
                shape.height()
            );
            text.push_str(&shape.to_ascii());
        }
        text
    }

    fn image(&self) -> Option<&PixelGrid> {
        Some(&self.image)
    }
}
