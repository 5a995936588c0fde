use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// Write a hexdump of the provided byte slice.  Offsets are printed relative
/// to `origin`, which lets callers show load addresses instead of file
/// offsets.
pub fn hexdump(
    f: &mut fmt::Formatter,
    prefix: &str,
    origin: usize,
    buffer: &[u8],
) -> std::result::Result<(), std::fmt::Error> {
    const COLUMNS: usize = 16;
    let mut offset: usize = 0;
    if buffer.is_empty() {
        // For a zero-length buffer, at least print an offset instead of
        // nothing.
        write!(f, "{}{:04x}: ", prefix, origin)?;
    }
    while offset < buffer.len() {
        write!(f, "{}{:04x}: ", prefix, origin + offset)?;

        // Determine row byte range
        let next_offset = offset + COLUMNS;
        let (row_size, padding) = if next_offset <= buffer.len() {
            (COLUMNS, 0)
        } else {
            (buffer.len() - offset, next_offset - buffer.len())
        };
        let row = &buffer[offset..offset + row_size];

        // Print hex representation
        for b in row {
            write!(f, "{:02x} ", b)?;
        }
        for _ in 0..padding {
            write!(f, "   ")?;
        }

        // Print ASCII representation.  Apple II text usually has the high
        // bit set, so it is masked off first.
        for b in row {
            write!(
                f,
                "{}",
                match *b & 0x7F {
                    c @ 0x20..=0x7E => c as char,
                    _ => '.',
                }
            )?;
        }

        offset += COLUMNS;
        if offset < buffer.len() {
            writeln!(f)?;
        }
    }
    Ok(())
}

pub struct Hex<'a>(pub &'a [u8], pub usize);
impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        hexdump(f, "", self.1, self.0)
    }
}

pub fn hex(bytes: &[u8]) -> Hex {
    Hex(bytes, 0)
}

pub fn hex_at(bytes: &[u8], origin: usize) -> Hex {
    Hex(bytes, origin)
}

/// Read a little-endian 16-bit value.  Bytes beyond the end of the buffer
/// read as zero.
#[inline]
pub fn unsigned_short(buffer: &[u8], offset: usize) -> u16 {
    let lo = buffer.get(offset).copied().unwrap_or(0) as u16;
    let hi = buffer.get(offset + 1).copied().unwrap_or(0) as u16;
    lo | (hi << 8)
}

/// Read a little-endian 24-bit value, as used by the ProDOS EOF field.
#[inline]
pub fn unsigned_triple(buffer: &[u8], offset: usize) -> u32 {
    let lo = unsigned_short(buffer, offset) as u32;
    let hi = buffer.get(offset + 2).copied().unwrap_or(0) as u32;
    lo | (hi << 16)
}

/// Combine the two halves of a split index-block pointer.
#[inline]
pub fn split_pointer(buffer: &[u8], index: usize) -> u16 {
    (buffer[index] as u16) | ((buffer[index + 0x100] as u16) << 8)
}

/// Decode a ProDOS date/time quadruple: a date word laid out as
/// `yyyyyyym mmmddddd`, then the minute and hour bytes.
pub fn prodos_date(buffer: &[u8], offset: usize) -> Option<NaiveDateTime> {
    if buffer.len() < offset + 4 {
        return None;
    }
    let date = unsigned_short(buffer, offset);
    if date == 0 {
        return None;
    }
    let year = (date >> 9) as i32;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;
    let minute = (buffer[offset + 2] & 0x3F) as u32;
    let hour = (buffer[offset + 3] & 0x1F) as u32;

    // ProDOS 2.x technical note: years below 40 belong to the 2000s.
    let year = if year < 40 { 2000 + year } else { 1900 + year };
    NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(hour, minute, 0))
}

/// Convert Apple II text (high bit usually set) into a Rust string, with
/// carriage returns translated to newlines.
pub fn apple_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for b in bytes {
        match b & 0x7F {
            0x0D => text.push('\n'),
            0x09 => text.push('\t'),
            c @ 0x20..=0x7E => text.push(c as char),
            _ => text.push('.'),
        }
    }
    text
}
