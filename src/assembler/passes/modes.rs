use crate::{
    assembler::{
        codegen::opcode::OpcodeTable,
        passes::{track_pc, Context, Pass},
    },
    ir::{AddressingMode, GenericMode, Instruction, Ir, Location, Mode, Node, NodeId, NodeKind},
};

/// Narrows a pending instruction to its zero page mode when the operand fits and the mode exists.
fn collapse(instruction: &mut Instruction, value: i64, opcodes: &OpcodeTable) -> bool {
    let Mode::Pending(generic) = instruction.mode else {
        return false;
    };
    let zero_page = generic.zero_page();
    if value < 0x100 && opcodes.has_mode(instruction.mnemonic, zero_page) {
        instruction.mode = Mode::Resolved(zero_page);
        return true;
    }
    false
}

fn operand_value(instruction: &Instruction, location: &Location, cx: &mut Context) -> i64 {
    match &instruction.operand {
        Some(operand) => cx.value_of(operand, location),
        None => 0,
    }
}

/// Settles the addressing modes that do not depend on label values.
///
/// Branches become relative and instructions whose operand is a plain number are collapsed to
/// the zero page or fixed at their absolute form.
#[derive(Debug)]
pub struct EasyModes;

impl Pass for EasyModes {
    fn name(&self) -> &'static str {
        "easy addressing modes"
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        if !matches!(ir[id].kind, NodeKind::Instruction(_)) {
            return self.visit_structure(ir, id, cx);
        }
        let Node { location, kind } = &mut ir[id];
        let NodeKind::Instruction(instruction) = kind else {
            return;
        };
        let Mode::Pending(generic) = instruction.mode else {
            return;
        };

        let mnemonic = instruction.mnemonic;
        let relative = match generic {
            GenericMode::Memory => [AddressingMode::Relative, AddressingMode::RelativeWord]
                .into_iter()
                .find(|&mode| cx.opcodes.has_mode(mnemonic, mode)),
            _ => None,
        };
        if let Some(mode) = relative {
            instruction.mode = Mode::Resolved(mode);
        } else if instruction
            .operand
            .as_ref()
            .is_some_and(|operand| operand.is_hardcoded())
        {
            let value = operand_value(instruction, location, cx);
            if !collapse(instruction, value, cx.opcodes) {
                instruction.mode = Mode::Resolved(generic.absolute());
            }
        }
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}
}

/// Picks the smallest encoding for every instruction given the current label values.
///
/// Pending instructions are collapsed to the zero page where possible. Zero page instructions
/// whose operand has grown past `$FF`, which branch extension can cause, are widened again.
#[derive(Debug, Default)]
pub struct Collapse {
    changed: bool,
}

impl Collapse {
    fn resize(instruction: &mut Instruction, location: &Location, cx: &mut Context) -> bool {
        match instruction.mode {
            Mode::Pending(_) => {
                let value = operand_value(instruction, location, cx);
                collapse(instruction, value, cx.opcodes)
            }
            Mode::Resolved(mode) => {
                let Some(wide) = mode.widened() else {
                    return false;
                };
                let value = operand_value(instruction, location, cx);
                if value >= 0x100 && cx.opcodes.has_mode(instruction.mnemonic, wide) {
                    instruction.mode = Mode::Resolved(wide);
                    return true;
                }
                false
            }
        }
    }
}

impl Pass for Collapse {
    fn name(&self) -> &'static str {
        "instruction collapse"
    }

    fn pre_pass(&mut self, _cx: &mut Context) {
        self.changed = false;
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let Node { location, kind } = &mut ir[id];
        if let NodeKind::Instruction(instruction) = kind {
            if Self::resize(instruction, location, cx) {
                tracing::trace!("Resized {}", instruction);
                self.changed = true;
            }
        }
        if !track_pc(ir, id, cx) {
            self.visit_structure(ir, id, cx);
        }
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Gives every instruction still undecided its absolute mode.
#[derive(Debug)]
pub struct NormalizeModes;

impl Pass for NormalizeModes {
    fn name(&self) -> &'static str {
        "mode normalization"
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        match &mut ir[id].kind {
            NodeKind::Instruction(instruction) => {
                if let Mode::Pending(generic) = instruction.mode {
                    instruction.mode = Mode::Resolved(generic.absolute());
                }
            }
            _ => self.visit_structure(ir, id, cx),
        }
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembler::{
            codegen::opcode::Cpu,
            diagnostics::Diagnostics,
            passes::{Stage, UpdateLabels},
        },
        ir::{Expr, Mnemonic, Symbol},
    };

    use pretty_assertions::assert_eq;

    fn context(cpu: Cpu) -> Context {
        Context::new(OpcodeTable::for_cpu(cpu), Diagnostics::new())
    }

    fn modes(ir: &Ir) -> Vec<Mode> {
        ir.leaves()
            .into_iter()
            .filter_map(|id| match &ir[id].kind {
                NodeKind::Instruction(instruction) => Some(instruction.mode),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_easy_modes() {
        let tests = vec![
            (
                Instruction::pending(Mnemonic::BNE, GenericMode::Memory, Expr::label("loop")),
                Mode::Resolved(AddressingMode::Relative),
            ),
            (
                Instruction::pending(Mnemonic::LDA, GenericMode::Memory, Expr::constant(0x10)),
                Mode::Resolved(AddressingMode::ZeroPage),
            ),
            (
                Instruction::pending(Mnemonic::LDA, GenericMode::MemoryY, Expr::constant(0x10)),
                Mode::Resolved(AddressingMode::AbsoluteY),
            ),
            (
                Instruction::pending(Mnemonic::JMP, GenericMode::Memory, Expr::constant(0x10)),
                Mode::Resolved(AddressingMode::Absolute),
            ),
            (
                Instruction::pending(Mnemonic::STA, GenericMode::Memory, Expr::constant(0x1234)),
                Mode::Resolved(AddressingMode::Absolute),
            ),
            (
                Instruction::pending(Mnemonic::LDA, GenericMode::PointerY, Expr::constant(0xFB)),
                Mode::Resolved(AddressingMode::IndirectIndexedY),
            ),
            (
                Instruction::pending(Mnemonic::LDA, GenericMode::Memory, Expr::label("later")),
                Mode::Pending(GenericMode::Memory),
            ),
        ];

        for (instruction, expected) in tests {
            let mut ir = Ir::from_nodes(vec![instruction.into()]);
            let mut cx = context(Cpu::Mos6502);
            EasyModes.go(&mut ir, &mut cx);
            assert_eq!(modes(&ir), vec![expected]);
        }

        let mut ir = Ir::from_nodes(vec![Instruction::pending(
            Mnemonic::BSR,
            GenericMode::Memory,
            Expr::label("routine"),
        )
        .into()]);
        EasyModes.go(&mut ir, &mut context(Cpu::Csg4502));
        assert_eq!(modes(&ir), vec![Mode::Resolved(AddressingMode::RelativeWord)]);
    }

    #[test]
    fn test_collapse_follows_labels() {
        let mut ir = Ir::from_nodes(vec![
            Instruction::pending(Mnemonic::LDA, GenericMode::Memory, Expr::label("zp")).into(),
            Instruction::pending(Mnemonic::STA, GenericMode::MemoryX, Expr::label("far")).into(),
            NodeKind::Label {
                symbol: Symbol::parse("zp"),
                value: Expr::constant(0x80),
            }
            .into(),
            NodeKind::Label {
                symbol: Symbol::parse("far"),
                value: Expr::constant(0x0400),
            }
            .into(),
        ]);
        let mut cx = context(Cpu::Mos6502);
        UpdateLabels::default().go(&mut ir, &mut cx);

        let mut collapse = Collapse::default();
        assert!(collapse.go(&mut ir, &mut cx));
        assert!(!collapse.go(&mut ir, &mut cx));
        assert_eq!(
            modes(&ir),
            vec![
                Mode::Resolved(AddressingMode::ZeroPage),
                Mode::Pending(GenericMode::MemoryX),
            ]
        );

        NormalizeModes.go(&mut ir, &mut cx);
        assert_eq!(
            modes(&ir),
            vec![
                Mode::Resolved(AddressingMode::ZeroPage),
                Mode::Resolved(AddressingMode::AbsoluteX),
            ]
        );
    }

    #[test]
    fn test_collapse_widens_grown_operands() {
        let mut ir = Ir::from_nodes(vec![Instruction::resolved(
            Mnemonic::LDA,
            AddressingMode::ZeroPage,
            Expr::label("moved"),
        )
        .into()]);
        let mut cx = context(Cpu::Mos6502);
        cx.env.bind(&Symbol::parse("moved"), 0x0100);

        let mut collapse = Collapse::default();
        assert!(collapse.go(&mut ir, &mut cx));
        assert_eq!(modes(&ir), vec![Mode::Resolved(AddressingMode::Absolute)]);
    }

    #[test]
    fn test_zero_page_indirect_depends_on_cpu() {
        let tests = vec![
            (Cpu::Mos6502, Mode::Resolved(AddressingMode::Indirect)),
            (Cpu::Wdc65C02, Mode::Resolved(AddressingMode::ZeroPageIndirect)),
        ];
        for (cpu, expected) in tests {
            let mut ir = Ir::from_nodes(vec![Instruction::pending(
                Mnemonic::LDA,
                GenericMode::Pointer,
                Expr::constant(0x20),
            )
            .into()]);
            let mut cx = context(cpu);
            EasyModes.go(&mut ir, &mut cx);
            assert_eq!(modes(&ir), vec![expected]);
        }
    }
}
