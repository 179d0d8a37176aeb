pub mod addressing_mode;
pub mod mnemonic;

use std::fmt;

pub use addressing_mode::AddressingMode;
pub use mnemonic::Mnemonic;

use super::expr::{Expr, ExprKind};

/// Operand syntax whose final addressing mode depends on the operand's value.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum GenericMode {
    /// `e`
    Memory,
    /// `e,x`
    MemoryX,
    /// `e,y`
    MemoryY,
    /// `(e)`
    Pointer,
    /// `(e,x)`
    PointerX,
    /// `(e),y`
    PointerY,
}

impl GenericMode {
    /// Mode used when the operand fits in the zero page.
    pub fn zero_page(self) -> AddressingMode {
        match self {
            GenericMode::Memory => AddressingMode::ZeroPage,
            GenericMode::MemoryX => AddressingMode::ZeroPageX,
            GenericMode::MemoryY => AddressingMode::ZeroPageY,
            GenericMode::Pointer => AddressingMode::ZeroPageIndirect,
            GenericMode::PointerX => AddressingMode::IndirectIndexedX,
            GenericMode::PointerY => AddressingMode::IndirectIndexedY,
        }
    }

    /// Mode used otherwise.
    pub fn absolute(self) -> AddressingMode {
        match self {
            GenericMode::Memory => AddressingMode::Absolute,
            GenericMode::MemoryX => AddressingMode::AbsoluteX,
            GenericMode::MemoryY => AddressingMode::AbsoluteY,
            GenericMode::Pointer => AddressingMode::Indirect,
            GenericMode::PointerX => AddressingMode::AbsoluteIndexedIndirectX,
            GenericMode::PointerY => AddressingMode::AbsoluteIndirectIndexedY,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Mode {
    /// Not yet decided, sized as the widest encoding.
    Pending(GenericMode),
    Resolved(AddressingMode),
}

/// A CPU instruction with an optional operand and the addressing mode which tells the CPU how
/// to interpret the operand.
#[derive(Debug, PartialEq, Clone)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
    pub operand: Option<Expr>,
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic, mode: Mode, operand: Option<Expr>) -> Self {
        Self {
            mnemonic,
            mode,
            operand,
        }
    }

    pub fn implied(mnemonic: Mnemonic) -> Self {
        Self::new(mnemonic, Mode::Resolved(AddressingMode::Implied), None)
    }

    pub fn resolved(mnemonic: Mnemonic, mode: AddressingMode, operand: Expr) -> Self {
        Self::new(mnemonic, Mode::Resolved(mode), Some(operand))
    }

    pub fn pending(mnemonic: Mnemonic, mode: GenericMode, operand: Expr) -> Self {
        Self::new(mnemonic, Mode::Pending(mode), Some(operand))
    }

    /// Size of instruction opcode + operand in bytes
    pub fn size(&self) -> i64 {
        match self.mode {
            Mode::Pending(_) => 3,
            Mode::Resolved(mode) => 1 + mode.operand_size() as i64,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(operand) = &self.operand else {
            return write!(f, "{}", self.mnemonic);
        };
        let mode = match self.mode {
            Mode::Resolved(mode) => mode,
            Mode::Pending(generic) => generic.absolute(),
        };
        let operand = match operand.kind() {
            ExprKind::Constant(value) if mode.operand_size() == 1 && mode != AddressingMode::Relative => {
                format!("${:02X}", value)
            }
            ExprKind::Constant(value) => format!("${:04X}", value),
            _ => operand.to_string(),
        };
        match mode {
            AddressingMode::Implied => write!(f, "{}", self.mnemonic),
            AddressingMode::Immediate | AddressingMode::ImmediateWord => {
                write!(f, "{} #{}", self.mnemonic, operand)
            }
            AddressingMode::ZeroPage
            | AddressingMode::Absolute
            | AddressingMode::Relative
            | AddressingMode::RelativeWord => {
                write!(f, "{} {}", self.mnemonic, operand)
            }
            AddressingMode::ZeroPageX | AddressingMode::AbsoluteX => {
                write!(f, "{} {},X", self.mnemonic, operand)
            }
            AddressingMode::ZeroPageY | AddressingMode::AbsoluteY => {
                write!(f, "{} {},Y", self.mnemonic, operand)
            }
            AddressingMode::Indirect | AddressingMode::ZeroPageIndirect => {
                write!(f, "{} ({})", self.mnemonic, operand)
            }
            AddressingMode::AbsoluteIndexedIndirectX | AddressingMode::IndirectIndexedX => {
                write!(f, "{} ({},X)", self.mnemonic, operand)
            }
            AddressingMode::AbsoluteIndirectIndexedY | AddressingMode::IndirectIndexedY => {
                write!(f, "{} ({}),Y", self.mnemonic, operand)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_size() {
        let tests = vec![
            (Instruction::implied(Mnemonic::RTS), 1),
            (
                Instruction::resolved(Mnemonic::LDA, AddressingMode::Immediate, Expr::constant(1)),
                2,
            ),
            (
                Instruction::resolved(Mnemonic::BNE, AddressingMode::Relative, Expr::label("loop")),
                2,
            ),
            (
                Instruction::resolved(Mnemonic::LDA, AddressingMode::ZeroPageX, Expr::constant(1)),
                2,
            ),
            (
                Instruction::resolved(Mnemonic::JMP, AddressingMode::Indirect, Expr::constant(1)),
                3,
            ),
            (
                Instruction::pending(Mnemonic::LDA, GenericMode::Memory, Expr::constant(1)),
                3,
            ),
            (
                Instruction::pending(Mnemonic::LDA, GenericMode::PointerY, Expr::constant(1)),
                3,
            ),
        ];
        for (instruction, expected) in tests {
            assert_eq!(instruction.size(), expected, "{}", instruction);
        }
    }

    #[test]
    fn test_display() {
        let tests = vec![
            (Instruction::implied(Mnemonic::ASL), "ASL"),
            (
                Instruction::resolved(Mnemonic::LDA, AddressingMode::Immediate, Expr::constant(1)),
                "LDA #$01",
            ),
            (
                Instruction::resolved(Mnemonic::JSR, AddressingMode::Absolute, Expr::constant(0x8006)),
                "JSR $8006",
            ),
            (
                Instruction::resolved(Mnemonic::LDA, AddressingMode::AbsoluteX, Expr::constant(0x200)),
                "LDA $0200,X",
            ),
            (
                Instruction::resolved(Mnemonic::STA, AddressingMode::IndirectIndexedY, Expr::constant(0xfb)),
                "STA ($FB),Y",
            ),
            (
                Instruction::resolved(Mnemonic::BNE, AddressingMode::Relative, Expr::constant(0x8000)),
                "BNE $8000",
            ),
            (
                Instruction::resolved(Mnemonic::PHW, AddressingMode::ImmediateWord, Expr::constant(0x12)),
                "PHW #$0012",
            ),
            (
                Instruction::resolved(Mnemonic::BSR, AddressingMode::RelativeWord, Expr::constant(0x9000)),
                "BSR $9000",
            ),
            (
                Instruction::pending(Mnemonic::LDA, GenericMode::MemoryY, Expr::label("table")),
                "LDA table,Y",
            ),
        ];
        for (instruction, expected) in tests {
            assert_eq!(instruction.to_string(), expected);
        }
    }
}
