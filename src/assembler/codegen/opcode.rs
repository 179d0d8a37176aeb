use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

use crate::ir::{AddressingMode, Mnemonic};

/// Instruction set to assemble for.
///
/// Every variant is the documented NMOS 6502 set plus at most one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cpu {
    #[default]
    Mos6502,
    /// NMOS 6502 including the undocumented opcodes
    Undocumented,
    Wdc65C02,
    /// The 65C02 set plus the 4502 extensions
    Csg4502,
}

/// A mapper between instruction definitions and opcodes for one CPU.
#[derive(Debug)]
pub struct OpcodeTable {
    cpu: Cpu,
    forward_map: HashMap<(Mnemonic, AddressingMode), u8>,
    reverse_map: HashMap<u8, (Mnemonic, AddressingMode)>,
    mnemonics: HashSet<Mnemonic>,
}

impl OpcodeTable {
    /// The shared table of `cpu`.
    pub fn for_cpu(cpu: Cpu) -> &'static OpcodeTable {
        match cpu {
            Cpu::Mos6502 => &MOS6502,
            Cpu::Undocumented => &UNDOCUMENTED,
            Cpu::Wdc65C02 => &WDC65C02,
            Cpu::Csg4502 => &CSG4502,
        }
    }

    pub fn cpu(&self) -> Cpu {
        self.cpu
    }

    /// Find the opcode corresponding to the given instruction.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn find_opcode(&self, mnemonic: Mnemonic, mode: AddressingMode) -> Option<u8> {
        self.forward_map.get(&(mnemonic, mode)).copied()
    }

    /// Find the instruction corresponding to the given opcode.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn find_instruction(&self, opcode: u8) -> Option<(Mnemonic, AddressingMode)> {
        self.reverse_map.get(&opcode).copied()
    }

    pub fn has_mode(&self, mnemonic: Mnemonic, mode: AddressingMode) -> bool {
        self.forward_map.contains_key(&(mnemonic, mode))
    }

    /// True if the mnemonic exists on this CPU in any addressing mode.
    pub fn has_mnemonic(&self, mnemonic: Mnemonic) -> bool {
        self.mnemonics.contains(&mnemonic)
    }

    fn new(cpu: Cpu, sets: &[Vec<(Mnemonic, AddressingMode, u8)>]) -> Self {
        let mut forward_map = HashMap::new();
        let mut reverse_map = HashMap::new();
        let mut mnemonics = HashSet::new();

        for &(mnemonic, mode, opcode) in sets.iter().flatten() {
            forward_map.insert((mnemonic, mode), opcode);
            reverse_map.insert(opcode, (mnemonic, mode));
            mnemonics.insert(mnemonic);
        }

        OpcodeTable {
            cpu,
            forward_map,
            reverse_map,
            mnemonics,
        }
    }
}

lazy_static! {
    static ref MOS6502: OpcodeTable = OpcodeTable::new(Cpu::Mos6502, &[documented()]);
    static ref UNDOCUMENTED: OpcodeTable =
        OpcodeTable::new(Cpu::Undocumented, &[documented(), undocumented()]);
    static ref WDC65C02: OpcodeTable =
        OpcodeTable::new(Cpu::Wdc65C02, &[documented(), wdc65c02()]);
    static ref CSG4502: OpcodeTable =
        OpcodeTable::new(Cpu::Csg4502, &[documented(), wdc65c02(), csg4502()]);
}

fn documented() -> Vec<(Mnemonic, AddressingMode, u8)> {
    use AddressingMode::*;
    use Mnemonic::*;

    vec![
        (ADC, Immediate, 0x69),
        (ADC, ZeroPage, 0x65),
        (ADC, ZeroPageX, 0x75),
        (ADC, Absolute, 0x6D),
        (ADC, AbsoluteX, 0x7D),
        (ADC, AbsoluteY, 0x79),
        (ADC, IndirectIndexedX, 0x61),
        (ADC, IndirectIndexedY, 0x71),
        (AND, Immediate, 0x29),
        (AND, ZeroPage, 0x25),
        (AND, ZeroPageX, 0x35),
        (AND, Absolute, 0x2D),
        (AND, AbsoluteX, 0x3D),
        (AND, AbsoluteY, 0x39),
        (AND, IndirectIndexedX, 0x21),
        (AND, IndirectIndexedY, 0x31),
        (ASL, Implied, 0x0A),
        (ASL, ZeroPage, 0x06),
        (ASL, ZeroPageX, 0x16),
        (ASL, Absolute, 0x0E),
        (ASL, AbsoluteX, 0x1E),
        (BCC, Relative, 0x90),
        (BCS, Relative, 0xB0),
        (BEQ, Relative, 0xF0),
        (BIT, ZeroPage, 0x24),
        (BIT, Absolute, 0x2C),
        (BMI, Relative, 0x30),
        (BNE, Relative, 0xD0),
        (BPL, Relative, 0x10),
        (BRK, Implied, 0x00),
        (BVC, Relative, 0x50),
        (BVS, Relative, 0x70),
        (CLC, Implied, 0x18),
        (CLD, Implied, 0xD8),
        (CLI, Implied, 0x58),
        (CLV, Implied, 0xB8),
        (CMP, Immediate, 0xC9),
        (CMP, ZeroPage, 0xC5),
        (CMP, ZeroPageX, 0xD5),
        (CMP, Absolute, 0xCD),
        (CMP, AbsoluteX, 0xDD),
        (CMP, AbsoluteY, 0xD9),
        (CMP, IndirectIndexedX, 0xC1),
        (CMP, IndirectIndexedY, 0xD1),
        (CPX, Immediate, 0xE0),
        (CPX, ZeroPage, 0xE4),
        (CPX, Absolute, 0xEC),
        (CPY, Immediate, 0xC0),
        (CPY, ZeroPage, 0xC4),
        (CPY, Absolute, 0xCC),
        (DEC, ZeroPage, 0xC6),
        (DEC, ZeroPageX, 0xD6),
        (DEC, Absolute, 0xCE),
        (DEC, AbsoluteX, 0xDE),
        (DEX, Implied, 0xCA),
        (DEY, Implied, 0x88),
        (EOR, Immediate, 0x49),
        (EOR, ZeroPage, 0x45),
        (EOR, ZeroPageX, 0x55),
        (EOR, Absolute, 0x4D),
        (EOR, AbsoluteX, 0x5D),
        (EOR, AbsoluteY, 0x59),
        (EOR, IndirectIndexedX, 0x41),
        (EOR, IndirectIndexedY, 0x51),
        (INC, ZeroPage, 0xE6),
        (INC, ZeroPageX, 0xF6),
        (INC, Absolute, 0xEE),
        (INC, AbsoluteX, 0xFE),
        (INX, Implied, 0xE8),
        (INY, Implied, 0xC8),
        (JMP, Absolute, 0x4C),
        (JMP, Indirect, 0x6C),
        (JSR, Absolute, 0x20),
        (LDA, Immediate, 0xA9),
        (LDA, ZeroPage, 0xA5),
        (LDA, ZeroPageX, 0xB5),
        (LDA, Absolute, 0xAD),
        (LDA, AbsoluteX, 0xBD),
        (LDA, AbsoluteY, 0xB9),
        (LDA, IndirectIndexedX, 0xA1),
        (LDA, IndirectIndexedY, 0xB1),
        (LDX, Immediate, 0xA2),
        (LDX, ZeroPage, 0xA6),
        (LDX, ZeroPageY, 0xB6),
        (LDX, Absolute, 0xAE),
        (LDX, AbsoluteY, 0xBE),
        (LDY, Immediate, 0xA0),
        (LDY, ZeroPage, 0xA4),
        (LDY, ZeroPageX, 0xB4),
        (LDY, Absolute, 0xAC),
        (LDY, AbsoluteX, 0xBC),
        (LSR, Implied, 0x4A),
        (LSR, ZeroPage, 0x46),
        (LSR, ZeroPageX, 0x56),
        (LSR, Absolute, 0x4E),
        (LSR, AbsoluteX, 0x5E),
        (NOP, Implied, 0xEA),
        (ORA, Immediate, 0x09),
        (ORA, ZeroPage, 0x05),
        (ORA, ZeroPageX, 0x15),
        (ORA, Absolute, 0x0D),
        (ORA, AbsoluteX, 0x1D),
        (ORA, AbsoluteY, 0x19),
        (ORA, IndirectIndexedX, 0x01),
        (ORA, IndirectIndexedY, 0x11),
        (PHA, Implied, 0x48),
        (PHP, Implied, 0x08),
        (PLA, Implied, 0x68),
        (PLP, Implied, 0x28),
        (ROL, Implied, 0x2A),
        (ROL, ZeroPage, 0x26),
        (ROL, ZeroPageX, 0x36),
        (ROL, Absolute, 0x2E),
        (ROL, AbsoluteX, 0x3E),
        (ROR, Implied, 0x6A),
        (ROR, ZeroPage, 0x66),
        (ROR, ZeroPageX, 0x76),
        (ROR, Absolute, 0x6E),
        (ROR, AbsoluteX, 0x7E),
        (RTI, Implied, 0x40),
        (RTS, Implied, 0x60),
        (SBC, Immediate, 0xE9),
        (SBC, ZeroPage, 0xE5),
        (SBC, ZeroPageX, 0xF5),
        (SBC, Absolute, 0xED),
        (SBC, AbsoluteX, 0xFD),
        (SBC, AbsoluteY, 0xF9),
        (SBC, IndirectIndexedX, 0xE1),
        (SBC, IndirectIndexedY, 0xF1),
        (SEC, Implied, 0x38),
        (SED, Implied, 0xF8),
        (SEI, Implied, 0x78),
        (STA, ZeroPage, 0x85),
        (STA, ZeroPageX, 0x95),
        (STA, Absolute, 0x8D),
        (STA, AbsoluteX, 0x9D),
        (STA, AbsoluteY, 0x99),
        (STA, IndirectIndexedX, 0x81),
        (STA, IndirectIndexedY, 0x91),
        (STX, ZeroPage, 0x86),
        (STX, ZeroPageY, 0x96),
        (STX, Absolute, 0x8E),
        (STY, ZeroPage, 0x84),
        (STY, ZeroPageX, 0x94),
        (STY, Absolute, 0x8C),
        (TAX, Implied, 0xAA),
        (TAY, Implied, 0xA8),
        (TSX, Implied, 0xBA),
        (TXA, Implied, 0x8A),
        (TXS, Implied, 0x9A),
        (TYA, Implied, 0x98),
    ]
}

fn undocumented() -> Vec<(Mnemonic, AddressingMode, u8)> {
    use AddressingMode::*;
    use Mnemonic::*;

    let mut opcodes = vec![
        (ANC, Immediate, 0x0B),
        (ANE, Immediate, 0x8B),
        (ARR, Immediate, 0x6B),
        (ASR, Immediate, 0x4B),
        (JAM, Implied, 0x02),
        (LAS, AbsoluteY, 0xBB),
        (LAX, ZeroPage, 0xA7),
        (LAX, ZeroPageY, 0xB7),
        (LAX, Absolute, 0xAF),
        (LAX, AbsoluteY, 0xBF),
        (LAX, IndirectIndexedX, 0xA3),
        (LAX, IndirectIndexedY, 0xB3),
        (LXA, Immediate, 0xAB),
        (SAX, ZeroPage, 0x87),
        (SAX, ZeroPageY, 0x97),
        (SAX, Absolute, 0x8F),
        (SAX, IndirectIndexedX, 0x83),
        (SBX, Immediate, 0xCB),
        (SHA, AbsoluteY, 0x9F),
        (SHA, IndirectIndexedY, 0x93),
        (SHS, AbsoluteY, 0x9B),
        (SHX, AbsoluteY, 0x9E),
        (SHY, AbsoluteX, 0x9C),
    ];

    // The read-modify-write combinations share one layout, offset by a base opcode
    let layout = [
        (ZeroPage, 0x07),
        (ZeroPageX, 0x17),
        (Absolute, 0x0F),
        (AbsoluteX, 0x1F),
        (AbsoluteY, 0x1B),
        (IndirectIndexedX, 0x03),
        (IndirectIndexedY, 0x13),
    ];
    for (mnemonic, base) in [
        (SLO, 0x00),
        (RLA, 0x20),
        (SRE, 0x40),
        (RRA, 0x60),
        (DCP, 0xC0),
        (ISB, 0xE0),
    ] {
        opcodes.extend(
            layout
                .iter()
                .map(|&(mode, offset)| (mnemonic, mode, base + offset)),
        );
    }

    opcodes
}

fn wdc65c02() -> Vec<(Mnemonic, AddressingMode, u8)> {
    use AddressingMode::*;
    use Mnemonic::*;

    let mut opcodes = vec![
        (ADC, ZeroPageIndirect, 0x72),
        (AND, ZeroPageIndirect, 0x32),
        (BIT, Immediate, 0x89),
        (BIT, ZeroPageX, 0x34),
        (BIT, AbsoluteX, 0x3C),
        (BRA, Relative, 0x80),
        (CMP, ZeroPageIndirect, 0xD2),
        (DEC, Implied, 0x3A),
        (EOR, ZeroPageIndirect, 0x52),
        (INC, Implied, 0x1A),
        (JMP, AbsoluteIndexedIndirectX, 0x7C),
        (LDA, ZeroPageIndirect, 0xB2),
        (ORA, ZeroPageIndirect, 0x12),
        (PHX, Implied, 0xDA),
        (PHY, Implied, 0x5A),
        (PLX, Implied, 0xFA),
        (PLY, Implied, 0x7A),
        (SBC, ZeroPageIndirect, 0xF2),
        (STA, ZeroPageIndirect, 0x92),
        (STZ, ZeroPage, 0x64),
        (STZ, ZeroPageX, 0x74),
        (STZ, Absolute, 0x9C),
        (STZ, AbsoluteX, 0x9E),
        (TRB, ZeroPage, 0x14),
        (TRB, Absolute, 0x1C),
        (TSB, ZeroPage, 0x04),
        (TSB, Absolute, 0x0C),
    ];

    let resets = [RMB0, RMB1, RMB2, RMB3, RMB4, RMB5, RMB6, RMB7];
    let sets = [SMB0, SMB1, SMB2, SMB3, SMB4, SMB5, SMB6, SMB7];
    for (bit, (reset, set)) in resets.into_iter().zip(sets).enumerate() {
        let column = (bit as u8) << 4;
        opcodes.push((reset, ZeroPage, column | 0x07));
        opcodes.push((set, ZeroPage, column | 0x87));
    }

    opcodes
}

fn csg4502() -> Vec<(Mnemonic, AddressingMode, u8)> {
    use AddressingMode::*;
    use Mnemonic::*;

    vec![
        (ASR, Implied, 0x43),
        (ASR, ZeroPage, 0x44),
        (ASR, ZeroPageX, 0x54),
        (ASW, Absolute, 0xCB),
        (BSR, RelativeWord, 0x63),
        (CLE, Implied, 0x02),
        (CPZ, Immediate, 0xC2),
        (CPZ, ZeroPage, 0xD4),
        (CPZ, Absolute, 0xDC),
        (DEW, ZeroPage, 0xC3),
        (DEZ, Implied, 0x3B),
        (INW, ZeroPage, 0xE3),
        (INZ, Implied, 0x1B),
        (JSR, Indirect, 0x22),
        (JSR, AbsoluteIndexedIndirectX, 0x23),
        (LDZ, Immediate, 0xA3),
        (LDZ, Absolute, 0xAB),
        (LDZ, AbsoluteX, 0xBB),
        (MAP, Implied, 0x5C),
        (NEG, Implied, 0x42),
        (PHW, ImmediateWord, 0xF4),
        (PHW, Absolute, 0xFC),
        (PHZ, Implied, 0xDB),
        (PLZ, Implied, 0xFB),
        (ROW, Absolute, 0xEB),
        (SEE, Implied, 0x03),
        (STX, AbsoluteY, 0x9B),
        (STY, AbsoluteX, 0x8B),
        (TAB, Implied, 0x5B),
        (TAZ, Implied, 0x4B),
        (TBA, Implied, 0x7B),
        (TSY, Implied, 0x0B),
        (TYS, Implied, 0x2B),
        (TZA, Implied, 0x6B),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const ALL: [Cpu; 4] = [Cpu::Mos6502, Cpu::Undocumented, Cpu::Wdc65C02, Cpu::Csg4502];

    #[test]
    fn test_find_opcode() {
        let tests = vec![
            (Cpu::Mos6502, Mnemonic::LDA, AddressingMode::Immediate, Some(0xA9)),
            (Cpu::Mos6502, Mnemonic::ASL, AddressingMode::Implied, Some(0x0A)),
            (Cpu::Mos6502, Mnemonic::JMP, AddressingMode::Indirect, Some(0x6C)),
            (Cpu::Mos6502, Mnemonic::LDA, AddressingMode::ZeroPageIndirect, None),
            (Cpu::Mos6502, Mnemonic::BRA, AddressingMode::Relative, None),
            (Cpu::Undocumented, Mnemonic::LAX, AddressingMode::ZeroPage, Some(0xA7)),
            (Cpu::Undocumented, Mnemonic::DCP, AddressingMode::AbsoluteY, Some(0xDB)),
            (Cpu::Undocumented, Mnemonic::ISB, AddressingMode::IndirectIndexedY, Some(0xF3)),
            (Cpu::Undocumented, Mnemonic::BRA, AddressingMode::Relative, None),
            (Cpu::Wdc65C02, Mnemonic::BRA, AddressingMode::Relative, Some(0x80)),
            (Cpu::Wdc65C02, Mnemonic::LDA, AddressingMode::ZeroPageIndirect, Some(0xB2)),
            (Cpu::Wdc65C02, Mnemonic::RMB3, AddressingMode::ZeroPage, Some(0x37)),
            (Cpu::Wdc65C02, Mnemonic::SMB7, AddressingMode::ZeroPage, Some(0xF7)),
            (Cpu::Wdc65C02, Mnemonic::LAX, AddressingMode::ZeroPage, None),
            (Cpu::Csg4502, Mnemonic::BRA, AddressingMode::Relative, Some(0x80)),
            (Cpu::Csg4502, Mnemonic::LDZ, AddressingMode::Immediate, Some(0xA3)),
            (Cpu::Csg4502, Mnemonic::ASR, AddressingMode::Implied, Some(0x43)),
            (Cpu::Csg4502, Mnemonic::ASR, AddressingMode::Immediate, None),
            (Cpu::Csg4502, Mnemonic::PHW, AddressingMode::ImmediateWord, Some(0xF4)),
            (Cpu::Csg4502, Mnemonic::BSR, AddressingMode::RelativeWord, Some(0x63)),
            (Cpu::Wdc65C02, Mnemonic::BSR, AddressingMode::RelativeWord, None),
        ];
        for (cpu, mnemonic, mode, expected) in tests {
            assert_eq!(
                OpcodeTable::for_cpu(cpu).find_opcode(mnemonic, mode),
                expected,
                "{:?} {} {}",
                cpu,
                mnemonic,
                mode
            );
        }
    }

    #[test]
    fn test_opcodes_are_unique() {
        for cpu in ALL {
            let table = OpcodeTable::for_cpu(cpu);
            assert_eq!(table.cpu(), cpu);
            assert_eq!(table.forward_map.len(), table.reverse_map.len(), "{:?}", cpu);
            for (&(mnemonic, mode), &opcode) in &table.forward_map {
                assert_eq!(table.find_instruction(opcode), Some((mnemonic, mode)));
            }
        }
    }

    #[test]
    fn test_extensions_are_exclusive() {
        let base = OpcodeTable::for_cpu(Cpu::Mos6502);
        assert_eq!(base.forward_map.len(), 151);
        for cpu in ALL {
            let table = OpcodeTable::for_cpu(cpu);
            assert!(table.has_mnemonic(Mnemonic::LDA));
            assert_eq!(table.has_mnemonic(Mnemonic::SLO), cpu == Cpu::Undocumented);
            assert_eq!(table.has_mnemonic(Mnemonic::TAZ), cpu == Cpu::Csg4502);
            assert_eq!(
                table.has_mnemonic(Mnemonic::STZ),
                matches!(cpu, Cpu::Wdc65C02 | Cpu::Csg4502)
            );
        }
    }
}
