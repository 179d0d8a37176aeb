use crate::{
    assembler::{
        environment::SymbolError,
        passes::{Context, Pass},
    },
    ir::{Expr, Ir, Location, NodeId, NodeKind},
};

/// Reports labels and program counter changes that can never be resolved.
///
/// Runs once after label initialization. Anything still unbound at this point is either
/// undefined or depends on itself.
#[derive(Debug, Default)]
pub struct CircularityCheck {
    pc_known: bool,
}

impl CircularityCheck {
    fn move_pc(
        &mut self,
        target: &Expr,
        location: &Location,
        what: &'static str,
        cx: &mut Context,
    ) {
        self.pc_known = target.is_valid(&cx.env, self.pc_known);
        if !self.pc_known {
            cx.error(location, SymbolError::CircularReference(what));
        }
    }
}

impl Pass for CircularityCheck {
    fn name(&self) -> &'static str {
        "circularity check"
    }

    fn pre_pass(&mut self, _cx: &mut Context) {
        self.pc_known = true;
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        match &node.kind {
            NodeKind::SetPc(target) => {
                self.move_pc(target, &node.location, "program counter set", cx)
            }
            NodeKind::Advance { target, .. } => {
                self.move_pc(target, &node.location, ".advance", cx)
            }
            NodeKind::CheckPc(target) => {
                if !target.is_valid(&cx.env, self.pc_known) {
                    cx.error(
                        &node.location,
                        SymbolError::CircularReference("program counter check"),
                    );
                }
            }
            NodeKind::Label { symbol, value } => {
                if !value.is_valid(&cx.env, self.pc_known) {
                    cx.error(&node.location, SymbolError::CircularLabel(symbol.clone()));
                }
            }
            _ => self.visit_structure(ir, id, cx),
        }
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}
}

/// Evaluates every expression once so that unknown labels and bad arithmetic are reported
/// before any addressing mode is chosen.
#[derive(Debug)]
pub struct CheckExprs;

impl Pass for CheckExprs {
    fn name(&self) -> &'static str {
        "expression check"
    }

    fn visit_unknown(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        for expr in node.kind.expressions() {
            if let Err(error) = expr.evaluate(&cx.env) {
                cx.error(&node.location, error);
            }
        }
    }
}
