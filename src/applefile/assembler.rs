//! 6502 machine code.

use std::fmt;
use std::fmt::Write;

use crate::applefile::DataSource;
use crate::util;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

use self::Mode::*;

impl Mode {
    /// Bytes of operand following the opcode.
    fn operand_size(self) -> usize {
        match self {
            Implied | Accumulator => 0,
            Absolute | AbsoluteX | AbsoluteY | Indirect => 2,
            _ => 1,
        }
    }
}

macro_rules! op {
    ($mnemonic:expr, $mode:expr) => {
        Some(($mnemonic, $mode))
    };
}

const UNKNOWN: Option<(&str, Mode)> = None;

/// The documented NMOS 6502 instruction set, indexed by opcode.
#[rustfmt::skip]
static OPCODES: [Option<(&str, Mode)>; 256] = [
    op!("BRK", Implied), op!("ORA", IndirectX), UNKNOWN, UNKNOWN, UNKNOWN, op!("ORA", ZeroPage), op!("ASL", ZeroPage), UNKNOWN,
    op!("PHP", Implied), op!("ORA", Immediate), op!("ASL", Accumulator), UNKNOWN, UNKNOWN, op!("ORA", Absolute), op!("ASL", Absolute), UNKNOWN,
    op!("BPL", Relative), op!("ORA", IndirectY), UNKNOWN, UNKNOWN, UNKNOWN, op!("ORA", ZeroPageX), op!("ASL", ZeroPageX), UNKNOWN,
    op!("CLC", Implied), op!("ORA", AbsoluteY), UNKNOWN, UNKNOWN, UNKNOWN, op!("ORA", AbsoluteX), op!("ASL", AbsoluteX), UNKNOWN,
    op!("JSR", Absolute), op!("AND", IndirectX), UNKNOWN, UNKNOWN, op!("BIT", ZeroPage), op!("AND", ZeroPage), op!("ROL", ZeroPage), UNKNOWN,
    op!("PLP", Implied), op!("AND", Immediate), op!("ROL", Accumulator), UNKNOWN, op!("BIT", Absolute), op!("AND", Absolute), op!("ROL", Absolute), UNKNOWN,
    op!("BMI", Relative), op!("AND", IndirectY), UNKNOWN, UNKNOWN, UNKNOWN, op!("AND", ZeroPageX), op!("ROL", ZeroPageX), UNKNOWN,
    op!("SEC", Implied), op!("AND", AbsoluteY), UNKNOWN, UNKNOWN, UNKNOWN, op!("AND", AbsoluteX), op!("ROL", AbsoluteX), UNKNOWN,
    op!("RTI", Implied), op!("EOR", IndirectX), UNKNOWN, UNKNOWN, UNKNOWN, op!("EOR", ZeroPage), op!("LSR", ZeroPage), UNKNOWN,
    op!("PHA", Implied), op!("EOR", Immediate), op!("LSR", Accumulator), UNKNOWN, op!("JMP", Absolute), op!("EOR", Absolute), op!("LSR", Absolute), UNKNOWN,
    op!("BVC", Relative), op!("EOR", IndirectY), UNKNOWN, UNKNOWN, UNKNOWN, op!("EOR", ZeroPageX), op!("LSR", ZeroPageX), UNKNOWN,
    op!("CLI", Implied), op!("EOR", AbsoluteY), UNKNOWN, UNKNOWN, UNKNOWN, op!("EOR", AbsoluteX), op!("LSR", AbsoluteX), UNKNOWN,
    op!("RTS", Implied), op!("ADC", IndirectX), UNKNOWN, UNKNOWN, UNKNOWN, op!("ADC", ZeroPage), op!("ROR", ZeroPage), UNKNOWN,
    op!("PLA", Implied), op!("ADC", Immediate), op!("ROR", Accumulator), UNKNOWN, op!("JMP", Indirect), op!("ADC", Absolute), op!("ROR", Absolute), UNKNOWN,
    op!("BVS", Relative), op!("ADC", IndirectY), UNKNOWN, UNKNOWN, UNKNOWN, op!("ADC", ZeroPageX), op!("ROR", ZeroPageX), UNKNOWN,
    op!("SEI", Implied), op!("ADC", AbsoluteY), UNKNOWN, UNKNOWN, UNKNOWN, op!("ADC", AbsoluteX), op!("ROR", AbsoluteX), UNKNOWN,
    UNKNOWN, op!("STA", IndirectX), UNKNOWN, UNKNOWN, op!("STY", ZeroPage), op!("STA", ZeroPage), op!("STX", ZeroPage), UNKNOWN,
    op!("DEY", Implied), UNKNOWN, op!("TXA", Implied), UNKNOWN, op!("STY", Absolute), op!("STA", Absolute), op!("STX", Absolute), UNKNOWN,
    op!("BCC", Relative), op!("STA", IndirectY), UNKNOWN, UNKNOWN, op!("STY", ZeroPageX), op!("STA", ZeroPageX), op!("STX", ZeroPageY), UNKNOWN,
    op!("TYA", Implied), op!("STA", AbsoluteY), op!("TXS", Implied), UNKNOWN, UNKNOWN, op!("STA", AbsoluteX), UNKNOWN, UNKNOWN,
    op!("LDY", Immediate), op!("LDA", IndirectX), op!("LDX", Immediate), UNKNOWN, op!("LDY", ZeroPage), op!("LDA", ZeroPage), op!("LDX", ZeroPage), UNKNOWN,
    op!("TAY", Implied), op!("LDA", Immediate), op!("TAX", Implied), UNKNOWN, op!("LDY", Absolute), op!("LDA", Absolute), op!("LDX", Absolute), UNKNOWN,
    op!("BCS", Relative), op!("LDA", IndirectY), UNKNOWN, UNKNOWN, op!("LDY", ZeroPageX), op!("LDA", ZeroPageX), op!("LDX", ZeroPageY), UNKNOWN,
    op!("CLV", Implied), op!("LDA", AbsoluteY), op!("TSX", Implied), UNKNOWN, op!("LDY", AbsoluteX), op!("LDA", AbsoluteX), op!("LDX", AbsoluteY), UNKNOWN,
    op!("CPY", Immediate), op!("CMP", IndirectX), UNKNOWN, UNKNOWN, op!("CPY", ZeroPage), op!("CMP", ZeroPage), op!("DEC", ZeroPage), UNKNOWN,
    op!("INY", Implied), op!("CMP", Immediate), op!("DEX", Implied), UNKNOWN, op!("CPY", Absolute), op!("CMP", Absolute), op!("DEC", Absolute), UNKNOWN,
    op!("BNE", Relative), op!("CMP", IndirectY), UNKNOWN, UNKNOWN, UNKNOWN, op!("CMP", ZeroPageX), op!("DEC", ZeroPageX), UNKNOWN,
    op!("CLD", Implied), op!("CMP", AbsoluteY), UNKNOWN, UNKNOWN, UNKNOWN, op!("CMP", AbsoluteX), op!("DEC", AbsoluteX), UNKNOWN,
    op!("CPX", Immediate), op!("SBC", IndirectX), UNKNOWN, UNKNOWN, op!("CPX", ZeroPage), op!("SBC", ZeroPage), op!("INC", ZeroPage), UNKNOWN,
    op!("INX", Implied), op!("SBC", Immediate), op!("NOP", Implied), UNKNOWN, op!("CPX", Absolute), op!("SBC", Absolute), op!("INC", Absolute), UNKNOWN,
    op!("BEQ", Relative), op!("SBC", IndirectY), UNKNOWN, UNKNOWN, UNKNOWN, op!("SBC", ZeroPageX), op!("INC", ZeroPageX), UNKNOWN,
    op!("SED", Implied), op!("SBC", AbsoluteY), UNKNOWN, UNKNOWN, UNKNOWN, op!("SBC", AbsoluteX), op!("INC", AbsoluteX), UNKNOWN,
];

/// One disassembled instruction, or a `.BYTE` for data that does not
/// decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub address: u16,
    pub bytes: Vec<u8>,
    pub mnemonic: &'static str,
    pub operand: String,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes: Vec<String> = self.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        let line = format!(
            "{:04X}:  {:<9} {} {}",
            self.address,
            bytes.join(" "),
            self.mnemonic,
            self.operand
        );
        write!(f, "{}", line.trim_end())
    }
}

fn operand(mode: Mode, address: u16, bytes: &[u8]) -> String {
    let byte = bytes.get(1).copied().unwrap_or(0);
    let word = util::unsigned_short(bytes, 1);
    match mode {
        Implied | Accumulator => String::new(),
        Immediate => format!("#${:02X}", byte),
        ZeroPage => format!("${:02X}", byte),
        ZeroPageX => format!("${:02X},X", byte),
        ZeroPageY => format!("${:02X},Y", byte),
        Absolute => format!("${:04X}", word),
        AbsoluteX => format!("${:04X},X", word),
        AbsoluteY => format!("${:04X},Y", word),
        Indirect => format!("(${:04X})", word),
        IndirectX => format!("(${:02X},X)", byte),
        IndirectY => format!("(${:02X}),Y", byte),
        Relative => {
            let target = address.wrapping_add(2).wrapping_add(byte as i8 as u16);
            format!("${:04X}", target)
        }
    }
}

/// Disassemble `buffer` as if loaded at `origin`.
pub fn disassemble(buffer: &[u8], origin: u16) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut ptr = 0;
    while ptr < buffer.len() {
        let address = origin.wrapping_add(ptr as u16);
        let opcode = buffer[ptr];
        let decoded = OPCODES[opcode as usize]
            .filter(|(_, mode)| ptr + 1 + mode.operand_size() <= buffer.len());
        let instruction = match decoded {
            Some((mnemonic, mode)) => {
                let bytes = buffer[ptr..ptr + 1 + mode.operand_size()].to_vec();
                Instruction {
                    address,
                    operand: operand(mode, address, &bytes),
                    bytes,
                    mnemonic,
                }
            }
            None => Instruction {
                address,
                bytes: vec![opcode],
                mnemonic: ".BYTE",
                operand: format!("${:02X}", opcode),
            },
        };
        ptr += instruction.bytes.len();
        instructions.push(instruction);
    }
    instructions
}

/// A binary file listed as machine code.  Bytes stored past the file's
/// logical end can be kept as `extra` and are shown as a hex dump.
pub struct AssemblerProgram {
    name: String,
    buffer: Vec<u8>,
    load_address: u16,
    extra: Option<Vec<u8>>,
}

impl AssemblerProgram {
    pub fn new(name: &str, buffer: &[u8], load_address: u16) -> AssemblerProgram {
        AssemblerProgram {
            name: name.to_string(),
            buffer: buffer.to_vec(),
            load_address,
            extra: None,
        }
    }

    pub fn with_extra(name: &str, buffer: &[u8], load_address: u16, extra: &[u8]) -> AssemblerProgram {
        AssemblerProgram {
            extra: Some(extra.to_vec()),
            ..AssemblerProgram::new(name, buffer, load_address)
        }
    }

    pub fn load_address(&self) -> u16 {
        self.load_address
    }

    pub fn extra(&self) -> Option<&[u8]> {
        self.extra.as_deref()
    }
}

impl DataSource for AssemblerProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Name         : {}", self.name);
        let _ = writeln!(text, "Load address : ${:04X}", self.load_address);
        let _ = writeln!(text, "Length       : ${:04X}\n", self.buffer.len());
        for instruction in disassemble(&self.buffer, self.load_address) {
            let _ = writeln!(text, "{}", instruction);
        }
        if let Some(extra) = &self.extra {
            let origin = self.load_address as usize + self.buffer.len();
            let _ = writeln!(text, "\nExtra data, {} bytes:", extra.len());
            let _ = writeln!(text, "{}", util::hex_at(extra, origin));
        }
        text
    }
}
