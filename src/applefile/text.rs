//! Text files: plain sequential text, random-access record files, HTML-like
//! and word-processor text, and Merlin assembler source.

use std::fmt::Write;

use crate::applefile::DataSource;
use crate::disk::random_access::TextBuffer;
use crate::util;

/// True for buffers that open with an HTML tag or doctype, after any
/// leading whitespace.
pub fn is_html(buffer: &[u8]) -> bool {
    let start = buffer
        .iter()
        .position(|b| !(b & 0x7F).is_ascii_whitespace())
        .unwrap_or(buffer.len());
    let head: Vec<u8> = buffer[start..]
        .iter()
        .take(9)
        .map(|b| (b & 0x7F).to_ascii_uppercase())
        .collect();
    head.starts_with(b"<HTML") || head.starts_with(b"<!DOCTYPE")
}

/// Text with no structure beyond its line breaks.
pub struct SimpleText {
    name: String,
    buffer: Vec<u8>,
}

impl SimpleText {
    pub fn new(name: &str, buffer: &[u8]) -> SimpleText {
        SimpleText {
            name: name.to_string(),
            buffer: buffer.to_vec(),
        }
    }
}

impl DataSource for SimpleText {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        // Line ends may be CR, LF or CR LF.
        let mut lines = Vec::with_capacity(self.buffer.len());
        let mut previous = 0u8;
        for b in &self.buffer {
            let c = b & 0x7F;
            match c {
                0x0A if previous == 0x0D => {}
                0x0A => lines.push(0x0D),
                _ => lines.push(c),
            }
            previous = c;
        }
        util::apple_text(&lines)
    }
}

enum TextLayout {
    Sequential,
    Runs(Vec<TextBuffer>),
}

/// A ProDOS `TXT` file.  Files with a record length in their aux type are
/// listed record by record.
pub struct TextFile {
    name: String,
    buffer: Vec<u8>,
    record_length: usize,
    layout: TextLayout,
}

impl TextFile {
    pub fn new(name: &str, buffer: &[u8], record_length: u16) -> TextFile {
        TextFile {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            record_length: record_length as usize,
            layout: TextLayout::Sequential,
        }
    }

    /// A random-access file read as runs of contiguous blocks.
    pub fn from_runs(name: &str, runs: &[TextBuffer], record_length: u16) -> TextFile {
        let buffer = runs.iter().flat_map(|run| run.buffer.iter().copied()).collect();
        TextFile {
            name: name.to_string(),
            buffer,
            record_length: record_length as usize,
            layout: TextLayout::Runs(runs.to_vec()),
        }
    }

    pub fn record_length(&self) -> usize {
        self.record_length
    }

    /// Every non-empty record as `(record number, text)`.
    pub fn records(&self) -> Vec<(usize, String)> {
        let to_text = |bytes: &[u8]| {
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            util::apple_text(&bytes[..end]).trim_end().to_string()
        };
        match &self.layout {
            TextLayout::Runs(runs) => runs
                .iter()
                .flat_map(|run| run.records())
                .map(|(n, bytes)| (n, to_text(bytes)))
                .collect(),
            TextLayout::Sequential if self.record_length > 0 => self
                .buffer
                .chunks(self.record_length)
                .enumerate()
                .filter(|(_, bytes)| bytes.iter().any(|b| *b != 0))
                .map(|(n, bytes)| (n, to_text(bytes)))
                .collect(),
            TextLayout::Sequential => Vec::new(),
        }
    }
}

impl DataSource for TextFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        if self.record_length == 0 {
            let end = self
                .buffer
                .iter()
                .position(|b| *b == 0)
                .unwrap_or(self.buffer.len());
            return util::apple_text(&self.buffer[..end]);
        }
        let mut text = String::new();
        let _ = writeln!(text, "Name          : {}", self.name);
        let _ = writeln!(text, "Record length : {}", self.record_length);
        if let TextLayout::Runs(runs) = &self.layout {
            let _ = writeln!(text, "Block runs    : {}", runs.len());
        }
        text.push('\n');
        for (record, contents) in self.records() {
            let _ = writeln!(text, "{:5}  {}", record, contents);
        }
        text
    }
}

const LABEL_WIDTH: usize = 10;
const OPCODE_WIDTH: usize = 6;
const OPERAND_WIDTH: usize = 16;

/// Source text from the Merlin assembler.  Lines end in `$8D` and fields are
/// separated by a high-bit space.
pub struct MerlinSource {
    name: String,
    buffer: Vec<u8>,
}

fn pad_column(line: &mut String, field: &str, width: usize) {
    line.push_str(field);
    let used = field.chars().count();
    if used < width {
        line.extend(std::iter::repeat(' ').take(width - used));
    } else if !field.is_empty() {
        line.push(' ');
    }
}

impl MerlinSource {
    pub fn new(name: &str, buffer: &[u8]) -> MerlinSource {
        MerlinSource {
            name: name.to_string(),
            buffer: buffer.to_vec(),
        }
    }

    fn format_line(source: &[u8]) -> String {
        if source.first().map(|b| b & 0x7F) == Some(b'*') {
            return util::apple_text(source);
        }
        let mut columns: Vec<String> = Vec::new();
        let mut comment: Option<String> = None;
        for field in source.split(|b| *b == 0xA0) {
            let field = util::apple_text(field);
            if let Some(text) = comment.as_mut() {
                text.push(' ');
                text.push_str(&field);
            } else if field.starts_with(';') {
                comment = Some(field);
            } else if columns.len() == 3 {
                columns[2].push(' ');
                columns[2].push_str(&field);
            } else {
                columns.push(field);
            }
        }
        columns.resize(3, String::new());

        let mut line = String::new();
        pad_column(&mut line, &columns[0], LABEL_WIDTH);
        pad_column(&mut line, &columns[1], OPCODE_WIDTH);
        pad_column(&mut line, &columns[2], OPERAND_WIDTH);
        if let Some(comment) = comment {
            line.push_str(&comment);
        }
        line.trim_end().to_string()
    }
}

impl DataSource for MerlinSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let end = self
            .buffer
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.buffer.len());
        let mut text = String::new();
        for line in self.buffer[..end].split(|b| *b == 0x8D) {
            text.push_str(&MerlinSource::format_line(line));
            text.push('\n');
        }
        while text.ends_with("\n\n") {
            text.pop();
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn high(text: &str) -> Vec<u8> {
        text.bytes().map(|b| b | 0x80).collect()
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(b"  \n<html><body>"));
        assert!(is_html(b"<!doctype html>"));
        assert!(is_html(&high("<HTML>")));
        assert!(!is_html(b"hello <html>"));
        assert!(!is_html(b""));
    }

    #[test]
    fn test_sequential_text() {
        let mut buffer = high("HELLO\rWORLD\r");
        buffer.extend_from_slice(&[0, 0, 0]);
        let file = TextFile::new("README", &buffer, 0);
        assert_eq!(file.text(), "HELLO\nWORLD\n");
    }

    #[test]
    fn test_records_in_one_buffer() {
        let mut buffer = vec![0u8; 40];
        buffer[..3].copy_from_slice(&high("ONE"));
        buffer[20..23].copy_from_slice(&high("TWO"));
        let file = TextFile::new("DATA", &buffer, 10);
        assert_eq!(
            file.records(),
            vec![(0, "ONE".to_string()), (2, "TWO".to_string())]
        );
        assert!(file.text().contains("    2  TWO"));
    }

    #[test]
    fn test_records_from_runs() {
        let mut first = vec![0u8; 512];
        first[..1].copy_from_slice(&high("A"));
        let mut later = vec![0u8; 512];
        // Logical block 3 begins at byte 1536, which is record 12 of 128.
        later[..1].copy_from_slice(&high("B"));
        let runs = vec![
            TextBuffer {
                buffer: first,
                record_length: 128,
                first_block: 0,
            },
            TextBuffer {
                buffer: later,
                record_length: 128,
                first_block: 3,
            },
        ];
        let file = TextFile::from_runs("DATA", &runs, 128);
        assert_eq!(file.buffer().len(), 1024);
        assert_eq!(
            file.records(),
            vec![(0, "A".to_string()), (12, "B".to_string())]
        );
        assert!(file.text().contains("Block runs    : 2"));
    }

    #[test]
    fn test_merlin() {
        let mut source = Vec::new();
        source.extend(high("* HEADER"));
        source.push(0x8D);
        source.extend(high("START"));
        source.push(0xA0);
        source.extend(high("LDA"));
        source.push(0xA0);
        source.extend(high("#$00"));
        source.push(0xA0);
        source.extend(high(";clear"));
        source.push(0x8D);
        source.push(0xA0);
        source.extend(high("RTS"));
        source.push(0x8D);
        let text = MerlinSource::new("PROG.S", &source).text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "* HEADER");
        assert_eq!(lines[1], "START     LDA   #$00            ;clear");
        assert_eq!(lines[2], "          RTS");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_simple_text() {
        let text = SimpleText::new("PAGE", b"<HTML>\r\n<P>Hi\r\n");
        assert_eq!(text.text(), "<HTML>\n<P>Hi\n");
    }
}
