use std::{fmt, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::{
    assembler::{codegen::opcode::OpcodeTable, CpuArgs},
    ir::{AddressingMode, Expr, Instruction, Mode},
};

/// Human readable rendering of disassembled code.
pub mod listing;

/// What a run of bytes decoded to.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Instruction(Instruction),
    /// A byte that is not the start of a complete instruction
    Byte(u8),
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoded::Instruction(instruction) => write!(f, "{}", instruction),
            Decoded::Byte(byte) => write!(f, ".byte ${:02X}", byte),
        }
    }
}

/// A decoded item together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub address: usize,
    pub bytes: Vec<u8>,
    pub decoded: Decoded,
}

/// Operand of an instruction starting at `address`. Branch displacements become target
/// addresses.
fn decode_operand(operand: &[u8], mode: AddressingMode, address: usize) -> Option<Expr> {
    let value = match operand {
        [] => return None,
        [byte] if mode == AddressingMode::Relative => {
            let target = address as i64 + 2 + *byte as i8 as i64;
            target & 0xffff
        }
        [byte] => *byte as i64,
        [low, high] if mode == AddressingMode::RelativeWord => {
            let target = address as i64 + 2 + i16::from_le_bytes([*low, *high]) as i64;
            target & 0xffff
        }
        [low, high, ..] => ((*high as i64) << 8) | *low as i64,
    };
    Some(Expr::constant(value))
}

#[tracing::instrument(level = "trace", skip(input, table))]
fn decode_line(input: &[u8], ix: usize, origin: usize, table: &OpcodeTable) -> Line {
    let address = origin + ix;
    let opcode = input[ix];
    match table.find_instruction(opcode) {
        Some((mnemonic, mode)) if ix + mode.operand_size() < input.len() => {
            let end = ix + 1 + mode.operand_size();
            let operand = decode_operand(&input[ix + 1..end], mode, address);
            Line {
                address,
                bytes: input[ix..end].to_vec(),
                decoded: Decoded::Instruction(Instruction::new(
                    mnemonic,
                    Mode::Resolved(mode),
                    operand,
                )),
            }
        }
        _ => Line {
            address,
            bytes: vec![opcode],
            decoded: Decoded::Byte(opcode),
        },
    }
}

/// Decodes a binary image loaded at `origin`.
///
/// Unknown opcodes and instructions cut short by the end of the input come out as single data
/// bytes.
pub fn disassemble_code(input: &[u8], origin: u16, table: &OpcodeTable) -> Vec<Line> {
    let mut code = vec![];
    let mut ix = 0;

    while ix < input.len() {
        let line = decode_line(input, ix, origin as usize, table);
        ix += line.bytes.len();
        code.push(line);
    }

    code
}

/// Accepts `$8000`, `0x8000` or `32768`.
fn parse_address(s: &str) -> Result<u16, String> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix('$') {
        (hex, 16)
    } else if let Some(hex) = s.strip_prefix("0x") {
        (hex, 16)
    } else {
        (s, 10)
    };
    u16::from_str_radix(digits, radix).map_err(|e| format!("Invalid address '{}': {}", s, e))
}

#[derive(Args, Debug)]
pub struct DisassemblyArgs {
    #[clap(help = "Binary file to disassemble")]
    file: PathBuf,
    #[clap(long, default_value = "$8000", value_parser = parse_address)]
    #[clap(help = "Address the first byte is loaded at")]
    origin: u16,
    #[command(flatten)]
    cpu: CpuArgs,
}

#[tracing::instrument]
pub fn disassemble(args: &DisassemblyArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Unable to read {}", args.file.display()))?;
    let table = OpcodeTable::for_cpu(args.cpu.cpu());
    let code = disassemble_code(&bytes, args.origin, table);
    println!("{}", listing::generate(&code));

    Ok(())
}
