//! Applesoft variables saved with `STORE`.
//!
//! The file starts with the total length and the length of the simple
//! variable area, then a spare byte.  Simple variables follow in seven byte
//! entries: a two byte name, whose high bits give the variable's kind, and
//! five bytes of value.  String contents are stored at the end of the file,
//! last allocated first.

use std::fmt;
use std::fmt::Write;

use crate::applefile::DataSource;
use crate::util;

const HEADER_SIZE: usize = 5;
const ENTRY_SIZE: usize = 7;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Real(f64),
    Integer(i16),
    Str(String),
    Function,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: Value,
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            Value::Real(v) => write!(f, "{} = {}", self.name, *v as f32),
            Value::Integer(v) => write!(f, "{}% = {}", self.name, v),
            Value::Str(s) => write!(f, "{}$ = \"{}\"", self.name, s),
            Value::Function => write!(f, "FN {}", self.name),
        }
    }
}

/// Decode the five byte Applesoft floating point format: a biased
/// exponent, then a normalised mantissa whose top bit holds the sign.
pub fn applesoft_real(bytes: &[u8]) -> f64 {
    let exponent = bytes.first().copied().unwrap_or(0);
    if exponent == 0 {
        return 0.0;
    }
    let byte = |i: usize| bytes.get(i).copied().unwrap_or(0) as u32;
    let negative = byte(1) & 0x80 != 0;
    let mantissa = ((byte(1) | 0x80) << 24) | (byte(2) << 16) | (byte(3) << 8) | byte(4);
    let value = mantissa as f64 / 4_294_967_296.0 * 2f64.powi(exponent as i32 - 128);
    if negative {
        -value
    } else {
        value
    }
}

pub struct StoredVariables {
    name: String,
    buffer: Vec<u8>,
    variables: Vec<Variable>,
    array_bytes: usize,
}

impl StoredVariables {
    pub fn new(name: &str, buffer: &[u8]) -> StoredVariables {
        let total = util::unsigned_short(buffer, 0) as usize;
        let start = HEADER_SIZE.min(buffer.len());
        let simple = (util::unsigned_short(buffer, 2) as usize).min(buffer.len() - start);
        let mut variables = Vec::new();
        let mut string_end = buffer.len();

        for entry in buffer[start..start + simple].chunks_exact(ENTRY_SIZE) {
            let (n1, n2) = (entry[0], entry[1]);
            let mut var_name = String::new();
            var_name.push((n1 & 0x7F) as char);
            if n2 & 0x7F != 0 {
                var_name.push((n2 & 0x7F) as char);
            }
            let value = match (n1 & 0x80 != 0, n2 & 0x80 != 0) {
                (false, false) => Value::Real(applesoft_real(&entry[2..])),
                (true, true) => Value::Integer(i16::from_be_bytes([entry[2], entry[3]])),
                (false, true) => {
                    let length = (entry[2] as usize).min(string_end);
                    let from = string_end - length;
                    let text = util::apple_text(&buffer[from..string_end]);
                    string_end = from;
                    Value::Str(text)
                }
                (true, false) => Value::Function,
            };
            variables.push(Variable {
                name: var_name,
                value,
            });
        }

        StoredVariables {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            variables,
            array_bytes: total.saturating_sub(simple),
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

impl DataSource for StoredVariables {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        for variable in &self.variables {
            let _ = writeln!(text, "{}", variable);
        }
        if self.array_bytes > 0 {
            let _ = writeln!(text, "\n{} bytes of arrays not listed", self.array_bytes);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reals() {
        assert_eq!(applesoft_real(&[0x00, 0x12, 0x34, 0x56, 0x78]), 0.0);
        assert_eq!(applesoft_real(&[0x81, 0x00, 0x00, 0x00, 0x00]), 1.0);
        assert_eq!(applesoft_real(&[0x81, 0x80, 0x00, 0x00, 0x00]), -1.0);
        assert_eq!(applesoft_real(&[0x80, 0x00, 0x00, 0x00, 0x00]), 0.5);
        assert_eq!(applesoft_real(&[0x84, 0x20, 0x00, 0x00, 0x00]), 10.0);
    }

    #[test]
    fn test_simple_variables() {
        let mut buffer = vec![0u8; HEADER_SIZE];
        let entries: [[u8; 7]; 4] = [
            [b'X', 0, 0x84, 0x20, 0, 0, 0],
            [b'N' | 0x80, 0x80, 0xFF, 0xFE, 0, 0, 0],
            [b'A', b'B' | 0x80, 2, 0, 0, 0, 0],
            [b'F' | 0x80, b'N', 0, 0, 0, 0, 0],
        ];
        for entry in &entries {
            buffer.extend_from_slice(entry);
        }
        buffer.extend_from_slice(b"HI");
        let simple = (entries.len() * ENTRY_SIZE) as u16;
        buffer[0..2].copy_from_slice(&simple.to_le_bytes());
        buffer[2..4].copy_from_slice(&simple.to_le_bytes());

        let vars = StoredVariables::new("VARS", &buffer);
        let list: Vec<String> = vars.variables().iter().map(|v| v.to_string()).collect();
        assert_eq!(list, vec!["X = 10", "N% = -2", "AB$ = \"HI\"", "FN FN"]);
        assert!(!vars.text().contains("arrays"));
    }
}
