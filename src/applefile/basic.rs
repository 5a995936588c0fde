//! Tokenised BASIC programs: Applesoft and Integer BASIC.

use std::fmt::Write;

use log::warn;

use crate::applefile::DataSource;
use crate::util;

/// Applesoft keywords, tokens 0x80 to 0xEA.
#[rustfmt::skip]
static APPLESOFT_TOKENS: [&str; 107] = [
    "END", "FOR", "NEXT", "DATA", "INPUT", "DEL", "DIM", "READ",
    "GR", "TEXT", "PR#", "IN#", "CALL", "PLOT", "HLIN", "VLIN",
    "HGR2", "HGR", "HCOLOR=", "HPLOT", "DRAW", "XDRAW", "HTAB", "HOME",
    "ROT=", "SCALE=", "SHLOAD", "TRACE", "NOTRACE", "NORMAL", "INVERSE", "FLASH",
    "COLOR=", "POP", "VTAB", "HIMEM:", "LOMEM:", "ONERR", "RESUME", "RECALL",
    "STORE", "SPEED=", "LET", "GOTO", "RUN", "IF", "RESTORE", "&",
    "GOSUB", "RETURN", "REM", "STOP", "ON", "WAIT", "LOAD", "SAVE",
    "DEF", "POKE", "PRINT", "CONT", "LIST", "CLEAR", "GET", "NEW",
    "TAB(", "TO", "FN", "SPC(", "THEN", "AT", "NOT", "STEP",
    "+", "-", "*", "/", "^", "AND", "OR", ">",
    "=", "<", "SGN", "INT", "ABS", "USR", "FRE", "SCRN(",
    "PDL", "POS", "SQR", "RND", "LOG", "EXP", "COS", "SIN",
    "TAN", "ATN", "PEEK", "LEN", "STR$", "VAL", "ASC", "CHR$",
    "LEFT$", "RIGHT$", "MID$",
];

const APPLESOFT_FIRST_TOKEN: u8 = 0x80;
const APPLESOFT_REM: u8 = 0xB2;

/// Integer BASIC tokens.  Many keywords and punctuation marks have more
/// than one token, distinguished by the syntax context they appear in.
#[rustfmt::skip]
static INTEGER_TOKENS: [&str; 128] = [
    "HIMEM:", "", "_ ", ":", "LOAD ", "SAVE ", "CON ", "RUN ",
    "RUN ", "DEL ", ",", "NEW ", "CLR ", "AUTO ", ",", "MAN ",
    "HIMEM:", "LOMEM:", "+", "-", "*", "/", "=", "#",
    ">=", ">", "<=", "<>", "<", " AND ", " OR ", " MOD ",
    "^", "+", "(", ",", " THEN ", " THEN ", ",", ",",
    "\"", "\"", "(", "!", "!", "(", "PEEK", "RND",
    "SGN", "ABS", "PDL", "RNDX", "(", "+", "-", "NOT ",
    "(", "=", "#", "LEN(", "ASC(", "SCRN(", ",", "(",
    "$", "$", "(", ",", ",", ";", ";", ";",
    ",", ",", ",", "TEXT ", "GR ", "CALL ", "DIM ", "DIM ",
    "TAB ", "END ", "INPUT ", "INPUT ", "INPUT ", "FOR ", "=", " TO ",
    " STEP ", "NEXT ", ",", "RETURN ", "GOSUB ", "REM ", "LET ", "GOTO ",
    "IF ", "PRINT ", "PRINT ", "PRINT ", "POKE ", ",", "COLOR=", "PLOT ",
    ",", "HLIN ", ",", " AT ", "VLIN ", ",", " AT ", "VTAB ",
    "=", "=", ")", ")", "LIST ", ",", "LIST ", "POP ",
    "NODSP ", "DSP ", "NOTRACE ", "DSP ", "DSP ", "TRACE ", "PR#", "IN#",
];

const INTEGER_END_OF_LINE: u8 = 0x01;
const INTEGER_STRING_START: u8 = 0x28;
const INTEGER_STRING_END: u8 = 0x29;
const INTEGER_REM: u8 = 0x5D;

/// One listed program line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicLine {
    pub number: u16,
    pub text: String,
}

fn listing(name: &str, lines: &[BasicLine], trailing: usize) -> String {
    let mut text = String::new();
    for line in lines {
        let _ = writeln!(text, "{} {}", line.number, line.text);
    }
    if trailing > 0 {
        let _ = writeln!(text, "\n{} bytes follow the end of {}", trailing, name);
    }
    text
}

fn push_literal(text: &mut String, byte: u8) {
    let c = byte & 0x7F;
    if (0x20..0x7F).contains(&c) {
        text.push(c as char);
    } else {
        // Control characters embedded in strings.
        text.push('^');
        text.push((c ^ 0x40) as char);
    }
}

/// An Applesoft program as saved by `SAVE`.  Each line is a link word, a
/// line number, the tokenised statement and a zero byte; a zero link ends
/// the program.
pub struct ApplesoftProgram {
    name: String,
    buffer: Vec<u8>,
    lines: Vec<BasicLine>,
    trailing: usize,
}

impl ApplesoftProgram {
    pub fn new(name: &str, buffer: &[u8]) -> ApplesoftProgram {
        let mut lines = Vec::new();
        let mut ptr = 0;
        while ptr + 2 <= buffer.len() {
            let link = util::unsigned_short(buffer, ptr);
            if link == 0 {
                ptr += 2;
                break;
            }
            if ptr + 4 > buffer.len() {
                warn!("{}: program truncated at offset {}", name, ptr);
                ptr = buffer.len();
                break;
            }
            let number = util::unsigned_short(buffer, ptr + 2);
            let start = ptr + 4;
            let end = buffer[start..]
                .iter()
                .position(|b| *b == 0)
                .map(|p| start + p)
                .unwrap_or(buffer.len());
            lines.push(BasicLine {
                number,
                text: ApplesoftProgram::detokenise(&buffer[start..end]),
            });
            ptr = end + 1;
        }
        ApplesoftProgram {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            lines,
            trailing: buffer.len().saturating_sub(ptr),
        }
    }

    fn detokenise(tokens: &[u8]) -> String {
        let mut text = String::new();
        let mut in_string = false;
        let mut in_remark = false;
        for &byte in tokens {
            if in_remark {
                push_literal(&mut text, byte);
                continue;
            }
            if byte == APPLESOFT_REM && !in_string {
                if !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
                text.push_str("REM");
                in_remark = true;
                continue;
            }
            if byte >= APPLESOFT_FIRST_TOKEN && !in_string {
                let index = (byte - APPLESOFT_FIRST_TOKEN) as usize;
                let word = APPLESOFT_TOKENS.get(index).copied().unwrap_or("?");
                let is_word = word.starts_with(|c: char| c.is_ascii_alphabetic());
                if is_word {
                    if !text.is_empty() && !text.ends_with(' ') && !text.ends_with('(') {
                        text.push(' ');
                    }
                    text.push_str(word);
                    if !word.ends_with(|c: char| c == '(' || c == '=' || c == '$') {
                        text.push(' ');
                    }
                } else {
                    text.push_str(word);
                }
            } else {
                if byte == b'"' {
                    in_string = !in_string;
                }
                if byte == b' ' && !in_string && text.ends_with(' ') {
                    continue;
                }
                push_literal(&mut text, byte);
            }
        }
        text.trim_end().to_string()
    }

    pub fn lines(&self) -> &[BasicLine] {
        &self.lines
    }
}

impl DataSource for ApplesoftProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        listing(&self.name, &self.lines, self.trailing)
    }
}

/// An Integer BASIC program.  Each line is a length byte, a line number and
/// tokens ending in 0x01.
pub struct IntegerBasicProgram {
    name: String,
    buffer: Vec<u8>,
    lines: Vec<BasicLine>,
    trailing: usize,
}

impl IntegerBasicProgram {
    pub fn new(name: &str, buffer: &[u8]) -> IntegerBasicProgram {
        let mut lines = Vec::new();
        let mut ptr = 0;
        while ptr < buffer.len() {
            let length = buffer[ptr] as usize;
            if length < 4 {
                break;
            }
            if ptr + length > buffer.len() {
                warn!("{}: line at offset {} runs past the end of the file", name, ptr);
                break;
            }
            let number = util::unsigned_short(buffer, ptr + 1);
            lines.push(BasicLine {
                number,
                text: IntegerBasicProgram::detokenise(&buffer[ptr + 3..ptr + length]),
            });
            ptr += length;
        }
        IntegerBasicProgram {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            lines,
            trailing: buffer.len().saturating_sub(ptr),
        }
    }

    fn detokenise(tokens: &[u8]) -> String {
        let mut text = String::new();
        let mut ptr = 0;
        let mut in_name = false;
        while ptr < tokens.len() {
            let byte = tokens[ptr];
            ptr += 1;
            match byte {
                INTEGER_END_OF_LINE => break,
                INTEGER_REM => {
                    text.push_str(INTEGER_TOKENS[byte as usize]);
                    while ptr < tokens.len() && tokens[ptr] != INTEGER_END_OF_LINE {
                        push_literal(&mut text, tokens[ptr]);
                        ptr += 1;
                    }
                }
                INTEGER_STRING_START => {
                    text.push('"');
                    while ptr < tokens.len() && tokens[ptr] != INTEGER_STRING_END {
                        push_literal(&mut text, tokens[ptr]);
                        ptr += 1;
                    }
                    if ptr < tokens.len() {
                        text.push('"');
                        ptr += 1;
                    }
                }
                0xB0..=0xB9 if !in_name => {
                    let value = util::unsigned_short(tokens, ptr);
                    ptr += 2;
                    let _ = write!(text, "{}", value);
                }
                0xC1..=0xDA | 0xB0..=0xB9 => {
                    text.push((byte & 0x7F) as char);
                    in_name = true;
                    continue;
                }
                0x00..=0x7F => text.push_str(INTEGER_TOKENS[byte as usize]),
                _ => push_literal(&mut text, byte),
            }
            in_name = false;
        }
        text.trim_end().to_string()
    }

    pub fn lines(&self) -> &[BasicLine] {
        &self.lines
    }
}

impl DataSource for IntegerBasicProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        listing(&self.name, &self.lines, self.trailing)
    }
}
