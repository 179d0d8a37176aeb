use std::fmt;

/// Addressing mode of an instruction.
///
/// This represents the way the instruction uses the operand. Accumulator forms such as `ASL` are
/// [`Implied`](AddressingMode::Implied).
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy)]
pub enum AddressingMode {
    Implied,
    /// `#v`
    Immediate,
    /// `#vvvv`, a 16 bit immediate
    ImmediateWord,
    /// `zp`
    ZeroPage,
    /// `zp,x`
    ZeroPageX,
    /// `zp,y`
    ZeroPageY,
    /// `a`
    Absolute,
    /// `a,x`
    AbsoluteX,
    /// `a,y`
    AbsoluteY,
    /// `(a)`
    Indirect,
    /// `(a,x)`
    AbsoluteIndexedIndirectX,
    /// `(a),y`
    AbsoluteIndirectIndexedY,
    /// `(zp)`
    ZeroPageIndirect,
    /// `(zp,x)`
    IndirectIndexedX,
    /// `(zp),y`
    IndirectIndexedY,
    /// `r` for branch instructions, encoded as a signed displacement.
    Relative,
    /// `r` with a 16 bit displacement
    RelativeWord,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub fn operand_size(&self) -> usize {
        match self {
            AddressingMode::Implied => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::ZeroPageIndirect
            | AddressingMode::IndirectIndexedX
            | AddressingMode::IndirectIndexedY
            | AddressingMode::Relative => 1,
            AddressingMode::ImmediateWord
            | AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect
            | AddressingMode::AbsoluteIndexedIndirectX
            | AddressingMode::AbsoluteIndirectIndexedY
            | AddressingMode::RelativeWord => 2,
        }
    }

    /// The absolute counterpart of a zero page mode.
    pub fn widened(&self) -> Option<AddressingMode> {
        match self {
            AddressingMode::ZeroPage => Some(AddressingMode::Absolute),
            AddressingMode::ZeroPageX => Some(AddressingMode::AbsoluteX),
            AddressingMode::ZeroPageY => Some(AddressingMode::AbsoluteY),
            _ => None,
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressingMode::Implied => "Implied",
            AddressingMode::Immediate => "Immediate",
            AddressingMode::ImmediateWord => "Immediate Word",
            AddressingMode::ZeroPage => "Zero Page",
            AddressingMode::ZeroPageX => "Zero Page, X",
            AddressingMode::ZeroPageY => "Zero Page, Y",
            AddressingMode::Absolute => "Absolute",
            AddressingMode::AbsoluteX => "Absolute, X",
            AddressingMode::AbsoluteY => "Absolute, Y",
            AddressingMode::Indirect => "(Absolute)",
            AddressingMode::AbsoluteIndexedIndirectX => "(Absolute, X)",
            AddressingMode::AbsoluteIndirectIndexedY => "(Absolute), Y",
            AddressingMode::ZeroPageIndirect => "(Zero Page)",
            AddressingMode::IndirectIndexedX => "(Zero Page, X)",
            AddressingMode::IndirectIndexedY => "(Zero Page), Y",
            AddressingMode::Relative => "Relative",
            AddressingMode::RelativeWord => "Relative Word",
        };
        write!(f, "{}", name)
    }
}
