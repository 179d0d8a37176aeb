use std::fmt;

use thiserror::Error;

use crate::{
    assembler::passes::{Context, Pass},
    ir::{AddressingMode, Endian, Expr, Instruction, Ir, Location, Mnemonic, Mode, NodeId, NodeKind, Width},
};

/// Mapping from instruction definitions to opcodes.
pub mod opcode;

/// One past the highest address the CPU can reach.
pub const ADDRESS_SPACE_END: i64 = 0x10000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeGenError {
    #[error("{mnemonic} does not have mode \"{mode}\"")]
    NoSuchMode {
        mnemonic: Mnemonic,
        mode: AddressingMode,
    },
    #[error("Internal error: addressing mode of {0} was never resolved")]
    UnresolvedMode(Mnemonic),
    #[error("Branch target out of bounds")]
    BranchOutOfRange,
    #[error("{width} constant {expr} out of range")]
    ValueOutOfRange { width: Width, expr: String },
    #[error("Attempt to write to data segment")]
    WriteToDataSegment,
    #[error(".checkpc assertion failed: ${pc:x} > ${target:x}")]
    CheckPcFailed { pc: i64, target: i64 },
    #[error("Attempted to .advance backwards: ${pc:x} to ${target:x}")]
    AdvanceBackwards { pc: i64, target: i64 },
    #[error("Attempted to .advance past the end of memory: ${0:x}")]
    AdvancePastEnd(i64),
    #[error("Negative offset in .incbin")]
    NegativeOffset,
    #[error("Offset extends past end of file")]
    OffsetPastEnd,
    #[error("Negative length")]
    NegativeLength,
    #[error("File too small for .incbin subrange")]
    FileTooSmall,
}

/// Byte counts by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Opcodes and their operands
    pub code: usize,
    /// `.byte`, `.word` and friends, and included binaries
    pub data: usize,
    /// Padding written by `.advance`
    pub filler: usize,
}

impl Stats {
    pub fn total(&self) -> usize {
        self.code + self.data + self.filler
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes output ({} code, {} data, {} filler)",
            self.total(),
            self.code,
            self.data,
            self.filler
        )
    }
}

/// Converts a fully resolved program into bytes.
///
/// Every addressing mode must be decided before this pass runs. Out of range values are
/// reported and replaced with 0 so that the output keeps its layout.
#[derive(Debug, Default)]
pub struct Assembler {
    output: Vec<u8>,
    stats: Stats,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output
    }

    fn write(&mut self, cx: &mut Context, location: &Location, bytes: &[u8]) -> bool {
        if !cx.env.write_allowed() {
            cx.error(location, CodeGenError::WriteToDataSegment);
            return false;
        }
        self.output.extend_from_slice(bytes);
        true
    }

    /// Writes a value of the given width, range checked.
    fn emit(
        &mut self,
        cx: &mut Context,
        location: &Location,
        expr: &Expr,
        width: Width,
        endian: Endian,
    ) {
        let mut value = cx.value_of(expr, location);
        if !(0..=width.max_value()).contains(&value) {
            cx.error(
                location,
                CodeGenError::ValueOutOfRange {
                    width,
                    expr: expr.to_string(),
                },
            );
            value = 0;
        }
        let mut bytes = (value as u32).to_le_bytes()[..width.bytes()].to_vec();
        if endian == Endian::Big {
            bytes.reverse();
        }
        self.write(cx, location, &bytes);
    }

    fn instruction(&mut self, cx: &mut Context, location: &Location, instruction: &Instruction) {
        let Mode::Resolved(mode) = instruction.mode else {
            cx.error(location, CodeGenError::UnresolvedMode(instruction.mnemonic));
            return;
        };
        let Some(opcode) = cx.opcodes.find_opcode(instruction.mnemonic, mode) else {
            cx.error(
                location,
                CodeGenError::NoSuchMode {
                    mnemonic: instruction.mnemonic,
                    mode,
                },
            );
            return;
        };
        self.write(cx, location, &[opcode]);

        let size = mode.operand_size();
        if let Some(operand) = &instruction.operand {
            if mode == AddressingMode::Relative {
                let target = cx.value_of(operand, location);
                let mut offset = target.saturating_sub(cx.env.pc().saturating_add(2));
                if !(-128..=127).contains(&offset) {
                    cx.error(location, CodeGenError::BranchOutOfRange);
                    offset = 0;
                }
                self.write(cx, location, &[offset as i8 as u8]);
            } else if mode == AddressingMode::RelativeWord {
                let target = cx.value_of(operand, location);
                let mut offset = target.saturating_sub(cx.env.pc().saturating_add(2));
                if !(-0x8000..=0x7fff).contains(&offset) {
                    cx.error(location, CodeGenError::BranchOutOfRange);
                    offset = 0;
                }
                self.write(cx, location, &(offset as i16).to_le_bytes());
            } else if size == 1 {
                self.emit(cx, location, operand, Width::Byte, Endian::Little);
            } else if size == 2 {
                self.emit(cx, location, operand, Width::Word, Endian::Little);
            }
        }

        cx.env.advance_pc(1 + size as i64);
        self.stats.code += 1 + size;
    }

    fn byte_range(
        &mut self,
        cx: &mut Context,
        location: &Location,
        (offset, length, bytes): (&Expr, &Expr, &[u8]),
    ) {
        let offset = cx.value_of(offset, location);
        let length = cx.value_of(length, location);
        let range = match (usize::try_from(offset), usize::try_from(length)) {
            (Err(_), _) => Err(CodeGenError::NegativeOffset),
            (Ok(start), _) if start > bytes.len() => Err(CodeGenError::OffsetPastEnd),
            (_, Err(_)) => Err(CodeGenError::NegativeLength),
            (Ok(start), Ok(count)) => start
                .checked_add(count)
                .filter(|&end| end <= bytes.len())
                .map(|end| start..end)
                .ok_or(CodeGenError::FileTooSmall),
        };
        match range {
            Ok(range) => {
                self.write(cx, location, &bytes[range.clone()]);
                cx.env.advance_pc(length);
                self.stats.data += range.len();
            }
            Err(error) => cx.error(location, error),
        }
    }

    fn advance(&mut self, cx: &mut Context, location: &Location, target: &Expr, fill: &Expr) {
        let pc = cx.env.pc();
        let target = cx.value_of(target, location);
        if pc > target {
            cx.error(location, CodeGenError::AdvanceBackwards { pc, target });
        } else if target > ADDRESS_SPACE_END {
            cx.error(location, CodeGenError::AdvancePastEnd(target));
            return;
        } else if pc < target {
            let count = (target - pc) as usize;
            let mut value = cx.value_of(fill, location);
            if !(0..=0xff).contains(&value) {
                cx.error(
                    location,
                    CodeGenError::ValueOutOfRange {
                        width: Width::Byte,
                        expr: fill.to_string(),
                    },
                );
                value = 0;
            }
            self.write(cx, location, &vec![value as u8; count]);
            self.stats.filler += count;
        }
        cx.env.set_pc(target);
    }
}

impl Pass for Assembler {
    fn name(&self) -> &'static str {
        "assembler"
    }

    fn pre_pass(&mut self, _cx: &mut Context) {
        self.output.clear();
        self.stats = Stats::default();
    }

    fn post_pass(&mut self, cx: &mut Context) {
        if !cx.has_errors() {
            tracing::info!("Assembly complete: {}", self.stats);
        }
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        let location = &node.location;
        match &node.kind {
            NodeKind::Instruction(instruction) => self.instruction(cx, location, instruction),
            NodeKind::Data {
                width,
                endian,
                values,
            } => {
                for value in values {
                    self.emit(cx, location, value, *width, *endian);
                }
                let size = width.bytes() * values.len();
                cx.env.advance_pc(size as i64);
                self.stats.data += size;
            }
            NodeKind::ByteRange {
                offset,
                length,
                bytes,
            } => self.byte_range(cx, location, (offset, length, bytes)),
            NodeKind::Label { .. } => {}
            NodeKind::SetPc(target) => {
                let pc = cx.value_of(target, location);
                cx.env.set_pc(pc);
            }
            NodeKind::CheckPc(target) => {
                let pc = cx.env.pc();
                let target = cx.value_of(target, location);
                if pc > target {
                    cx.error(location, CodeGenError::CheckPcFailed { pc, target });
                }
            }
            NodeKind::Advance { target, fill } => self.advance(cx, location, target, fill),
            _ => self.visit_structure(ir, id, cx),
        }
    }
}
