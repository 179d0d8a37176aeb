use std::fmt;

/// Mnemonic of an instruction.
///
/// This represents the operation that is performed by the instruction. Which mnemonics are
/// available depends on the selected CPU, see [`Cpu`](crate::assembler::codegen::opcode::Cpu).
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, strum_macros::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Mnemonic {
    // NMOS 6502
    ADC,
    AND,
    ASL,
    BCC,
    BCS,
    BEQ,
    BIT,
    BMI,
    BNE,
    BPL,
    BRK,
    BVC,
    BVS,
    CLC,
    CLD,
    CLI,
    CLV,
    CMP,
    CPX,
    CPY,
    DEC,
    DEX,
    DEY,
    EOR,
    INC,
    INX,
    INY,
    JMP,
    JSR,
    LDA,
    LDX,
    LDY,
    LSR,
    NOP,
    ORA,
    PHA,
    PHP,
    PLA,
    PLP,
    ROL,
    ROR,
    RTI,
    RTS,
    SBC,
    SEC,
    SED,
    SEI,
    STA,
    STX,
    STY,
    TAX,
    TAY,
    TSX,
    TXA,
    TXS,
    TYA,

    // Undocumented NMOS opcodes
    ANC,
    ANE,
    ARR,
    /// Also `ASR` accumulator shift on the 4502
    ASR,
    DCP,
    ISB,
    JAM,
    LAS,
    LAX,
    LXA,
    RLA,
    RRA,
    SAX,
    SBX,
    SHA,
    SHS,
    SHX,
    SHY,
    SLO,
    SRE,

    // 65C02
    BRA,
    PHX,
    PHY,
    PLX,
    PLY,
    STZ,
    TRB,
    TSB,
    RMB0,
    RMB1,
    RMB2,
    RMB3,
    RMB4,
    RMB5,
    RMB6,
    RMB7,
    SMB0,
    SMB1,
    SMB2,
    SMB3,
    SMB4,
    SMB5,
    SMB6,
    SMB7,

    // 4502
    ASW,
    BSR,
    CLE,
    CPZ,
    DEW,
    DEZ,
    INW,
    INZ,
    LDZ,
    MAP,
    NEG,
    PHW,
    PHZ,
    PLZ,
    ROW,
    SEE,
    TAB,
    TAZ,
    TBA,
    TSY,
    TYS,
    TZA,
}

impl Mnemonic {
    pub fn is_jumping_instruction(&self) -> bool {
        matches!(self, Mnemonic::JMP | Mnemonic::JSR)
    }

    /// The branch taken on the opposite condition.
    ///
    /// `BRA` has no inverse since it is always taken.
    pub fn inverted_branch(&self) -> Option<Mnemonic> {
        match self {
            Mnemonic::BCC => Some(Mnemonic::BCS),
            Mnemonic::BCS => Some(Mnemonic::BCC),
            Mnemonic::BEQ => Some(Mnemonic::BNE),
            Mnemonic::BNE => Some(Mnemonic::BEQ),
            Mnemonic::BMI => Some(Mnemonic::BPL),
            Mnemonic::BPL => Some(Mnemonic::BMI),
            Mnemonic::BVC => Some(Mnemonic::BVS),
            Mnemonic::BVS => Some(Mnemonic::BVC),
            _ => None,
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
