use crate::{
    assembler::{
        macros::MacroError,
        passes::{Context, Pass},
    },
    ir::{Ir, NodeId, NodeKind},
};

/// Moves macro bodies out of the program and into the macro table.
#[derive(Debug, Default)]
pub struct DefineMacros {
    nested_error: bool,
}

impl Pass for DefineMacros {
    fn name(&self) -> &'static str {
        "macro definition"
    }

    fn post_pass(&mut self, cx: &mut Context) {
        if let Err(error) = cx.macros.abandon() {
            cx.error(&crate::ir::Location::TopLevel, error);
        }
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &mut ir[id];
        let handled = match &node.kind {
            NodeKind::MacroBegin(name) => {
                if cx.macros.is_defining() {
                    cx.error(&node.location, MacroError::NestedDefinition);
                    self.nested_error = true;
                } else {
                    if let Err(error) = cx.macros.define(name) {
                        cx.error(&node.location, error);
                    }
                    node.kind = NodeKind::None;
                }
                true
            }
            NodeKind::MacroEnd => {
                if cx.macros.is_defining() {
                    if let Err(error) = cx.macros.end_define() {
                        cx.error(&node.location, error);
                    }
                    node.kind = NodeKind::None;
                } else if !self.nested_error {
                    cx.error(&node.location, MacroError::UnmatchedMacroEnd);
                }
                true
            }
            _ if cx.macros.is_defining() => {
                if let Err(error) = cx.macros.capture(node) {
                    cx.error(&node.location, error);
                }
                node.kind = NodeKind::None;
                true
            }
            _ => false,
        };
        if !handled {
            self.visit_structure(ir, id, cx);
        }
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}
}

/// Replaces each macro invocation with a fresh expansion of the macro's body.
///
/// Expansions may themselves contain invocations, which the next round picks up.
#[derive(Debug, Default)]
pub struct ExpandMacros {
    changed: bool,
}

impl Pass for ExpandMacros {
    fn name(&self) -> &'static str {
        "macro expansion"
    }

    fn pre_pass(&mut self, _cx: &mut Context) {
        self.changed = false;
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        let expansion = match &node.kind {
            NodeKind::MacroInvoke { name, args } => {
                Some(cx.macros.invoke(&node.location, name, args))
            }
            _ => None,
        };
        let kind = match expansion {
            None => return self.visit_structure(ir, id, cx),
            Some(Ok(expansion)) => {
                let children = expansion.into_iter().map(|node| ir.push(node)).collect();
                NodeKind::Sequence(children)
            }
            Some(Err(error)) => {
                let location = ir[id].location.clone();
                cx.error(&location, error);
                NodeKind::None
            }
        };
        ir[id].kind = kind;
        self.changed = true;
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}

    fn changed(&self) -> bool {
        self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembler::{
            codegen::opcode::{Cpu, OpcodeTable},
            diagnostics::{Diagnostics, Error},
            passes::{FixPoint, Stage},
        },
        ir::{AddressingMode, Expr, Instruction, Mnemonic, Node},
    };

    use pretty_assertions::assert_eq;

    fn context() -> Context {
        Context::new(OpcodeTable::for_cpu(Cpu::Mos6502), Diagnostics::new())
    }

    fn load(expr: Expr) -> Node {
        Instruction::resolved(Mnemonic::LDA, AddressingMode::Immediate, expr).into()
    }

    fn invoke(name: &str, args: Vec<Expr>) -> Node {
        NodeKind::MacroInvoke {
            name: name.to_owned(),
            args,
        }
        .into()
    }

    fn instructions(ir: &Ir) -> Vec<Mnemonic> {
        ir.leaves()
            .into_iter()
            .filter_map(|id| match &ir[id].kind {
                NodeKind::Instruction(instruction) => Some(instruction.mnemonic),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_definition_is_removed() {
        let mut ir = Ir::from_nodes(vec![
            NodeKind::MacroBegin("load".to_owned()).into(),
            load(Expr::label("_1")),
            NodeKind::MacroEnd.into(),
            Instruction::implied(Mnemonic::RTS).into(),
        ]);
        let mut cx = context();
        DefineMacros::default().go(&mut ir, &mut cx);

        assert!(!cx.has_errors());
        assert_eq!(instructions(&ir), vec![Mnemonic::RTS]);
        assert_eq!(cx.macros.get("load").map(|m| m.body.len()), Some(1));
    }

    #[test]
    fn test_nested_expansion() {
        let mut ir = Ir::from_nodes(vec![
            NodeKind::MacroBegin("inner".to_owned()).into(),
            Instruction::implied(Mnemonic::INX).into(),
            NodeKind::MacroEnd.into(),
            NodeKind::MacroBegin("outer".to_owned()).into(),
            invoke("inner", vec![]),
            invoke("inner", vec![]),
            NodeKind::MacroEnd.into(),
            invoke("outer", vec![]),
        ]);
        let mut cx = context();
        DefineMacros::default().go(&mut ir, &mut cx);
        FixPoint::new("macro expansion", vec![Box::new(ExpandMacros::default())])
            .go(&mut ir, &mut cx);

        assert!(!cx.has_errors());
        assert_eq!(instructions(&ir), vec![Mnemonic::INX, Mnemonic::INX]);
    }

    #[test]
    fn test_undefined_macro() {
        let mut ir = Ir::from_nodes(vec![invoke("missing", vec![Expr::constant(1)])]);
        let mut cx = context();
        ExpandMacros::default().go(&mut ir, &mut cx);
        assert_eq!(
            cx.diagnostics.errors()[0].kind,
            Error::Macro(MacroError::Undefined("missing".to_owned()))
        );
    }

    #[test]
    fn test_recursive_macro_does_not_converge() {
        let mut ir = Ir::from_nodes(vec![
            NodeKind::MacroBegin("forever".to_owned()).into(),
            invoke("forever", vec![]),
            NodeKind::MacroEnd.into(),
            invoke("forever", vec![]),
        ]);
        let mut cx = context();
        DefineMacros::default().go(&mut ir, &mut cx);
        FixPoint::new("macro expansion", vec![Box::new(ExpandMacros::default())])
            .go(&mut ir, &mut cx);
        assert_eq!(cx.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_unmatched_markers() {
        let tests = vec![
            (
                vec![NodeKind::MacroEnd.into()],
                MacroError::UnmatchedMacroEnd,
            ),
            (
                vec![
                    NodeKind::MacroBegin("open".to_owned()).into(),
                    Instruction::implied(Mnemonic::NOP).into(),
                ],
                MacroError::UnmatchedMacro,
            ),
            (
                vec![
                    NodeKind::MacroBegin("a".to_owned()).into(),
                    NodeKind::MacroBegin("b".to_owned()).into(),
                    NodeKind::MacroEnd.into(),
                ],
                MacroError::NestedDefinition,
            ),
        ];
        for (nodes, expected) in tests {
            let mut ir = Ir::from_nodes(nodes);
            let mut cx = context();
            DefineMacros::default().go(&mut ir, &mut cx);
            assert_eq!(cx.diagnostics.errors()[0].kind, Error::Macro(expected));
        }
    }
}
