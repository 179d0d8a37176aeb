use crate::{
    assembler::{
        diagnostics::Warning,
        passes::{track_pc, walk, Context, Pass},
    },
    ir::{AddressingMode, Expr, Instruction, Ir, Mnemonic, Mode, Node, NodeId, NodeKind, Operator},
};

/// Rewrites branches whose target is more than a signed byte away.
///
/// `BRA` becomes `JMP`. Any other branch becomes its inverse skipping over a `JMP` to the
/// original target. The rewritten node is walked again so the program counter stays correct.
#[derive(Debug, Default)]
pub struct ExtendBranches {
    changed: bool,
}

impl Pass for ExtendBranches {
    fn name(&self) -> &'static str {
        "branch extension"
    }

    fn pre_pass(&mut self, _cx: &mut Context) {
        self.changed = false;
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let branch = match &ir[id].kind {
            NodeKind::Instruction(instruction)
                if instruction.mode == Mode::Resolved(AddressingMode::Relative) =>
            {
                Some(instruction.clone())
            }
            _ => None,
        };
        let Some(Instruction {
            mnemonic,
            operand: Some(target),
            ..
        }) = branch
        else {
            if !track_pc(ir, id, cx) {
                self.visit_structure(ir, id, cx);
            }
            return;
        };

        let location = ir[id].location.clone();
        let offset = cx
            .value_of(&target, &location)
            .saturating_sub(cx.env.pc().saturating_add(2));
        if (-128..=127).contains(&offset) {
            cx.env.advance_pc(2);
            return;
        }

        let kind = if mnemonic == Mnemonic::BRA {
            cx.warn(&location, Warning::BranchReplacedWithJump(mnemonic));
            NodeKind::Instruction(Instruction::resolved(
                Mnemonic::JMP,
                AddressingMode::Absolute,
                target,
            ))
        } else if let Some(inverse) = mnemonic.inverted_branch() {
            cx.warn(
                &location,
                Warning::BranchExtended {
                    branch: mnemonic,
                    inverse,
                },
            );
            let skip = Expr::chain(
                Expr::program_counter(),
                vec![(Operator::Add, Expr::constant(5))],
            );
            let expansion = vec![
                Instruction::resolved(inverse, AddressingMode::Relative, skip),
                Instruction::resolved(Mnemonic::JMP, AddressingMode::Absolute, target),
            ];
            let children = expansion
                .into_iter()
                .map(|instruction| ir.push(Node::instruction(location.clone(), instruction)))
                .collect();
            NodeKind::Sequence(children)
        } else {
            // Reported by the assembler as out of range
            cx.env.advance_pc(2);
            return;
        };

        tracing::debug!(%location, %mnemonic, offset, "extending branch");
        ir[id].kind = kind;
        self.changed = true;
        walk(self, ir, id, cx);
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}

    fn changed(&self) -> bool {
        self.changed
    }
}
