use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use crate::{
    assembler::{
        diagnostics::Warning,
        environment::{ScopeId, SymbolError},
        passes::{track_pc, Context, Pass},
    },
    ir::{Ir, Mnemonic, NodeId, NodeKind, Symbol},
};

const REGISTER_NAMES: [&str; 3] = ["a", "x", "y"];

/// Finds every label that can be given a value and binds it to a placeholder.
///
/// Run to a fixed point: a label whose value depends on another label becomes bindable once the
/// other one is. Also reports labels defined more than once.
#[derive(Debug, Default)]
pub struct InitLabels {
    definitions: HashMap<(Option<ScopeId>, String), NodeId>,
    reported: HashSet<NodeId>,
    rounds: usize,
    pc_known: bool,
    changed: bool,
}

impl InitLabels {
    fn check_name(&self, symbol: &Symbol, id: NodeId, ir: &Ir, cx: &mut Context) {
        let Symbol::Global(name) = symbol else {
            return;
        };
        let location = &ir[id].location;
        if REGISTER_NAMES.contains(&name.to_lowercase().as_str()) {
            cx.warn(location, Warning::RegisterNameAsLabel(name.clone()));
        } else if Mnemonic::from_str(name).is_ok_and(|mnemonic| cx.opcodes.has_mnemonic(mnemonic))
        {
            cx.warn(location, Warning::OpcodeNameAsLabel(name.clone()));
        }
    }
}

impl Pass for InitLabels {
    fn name(&self) -> &'static str {
        "label initialization"
    }

    fn pre_pass(&mut self, _cx: &mut Context) {
        self.changed = false;
        self.pc_known = true;
        self.rounds += 1;
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        match &node.kind {
            NodeKind::SetPc(target) | NodeKind::Advance { target, .. } => {
                self.pc_known = target.is_valid(&cx.env, self.pc_known);
            }
            NodeKind::Label { symbol, value } => {
                let key = match symbol {
                    Symbol::Global(name) => (None, name.clone()),
                    Symbol::Local(name) => (Some(cx.env.innermost_scope()), name.clone()),
                };
                match self.definitions.get(&key) {
                    Some(&first) if first != id => {
                        if self.reported.insert(id) {
                            cx.error(&node.location, SymbolError::DuplicateLabel(symbol.clone()));
                        }
                    }
                    Some(_) => {}
                    None => {
                        self.definitions.insert(key, id);
                    }
                }

                if value.is_valid(&cx.env, self.pc_known) && !cx.env.contains(symbol) {
                    cx.env.bind(symbol, 0);
                    self.changed = true;
                }

                if self.rounds == 1 {
                    self.check_name(symbol, id, ir, cx);
                }
            }
            _ => self.visit_structure(ir, id, cx),
        }
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}

    fn changed(&self) -> bool {
        self.changed
    }
}

/// Recomputes every label from the current instruction sizes.
#[derive(Debug, Default)]
pub struct UpdateLabels {
    changed: bool,
}

impl Pass for UpdateLabels {
    fn name(&self) -> &'static str {
        "label update"
    }

    fn pre_pass(&mut self, _cx: &mut Context) {
        self.changed = false;
    }

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        if let NodeKind::Label { symbol, value } = &node.kind {
            let value = cx.value_of(value, &node.location);
            if cx.env.lookup(symbol) != Some(value) {
                self.changed = true;
            }
            cx.env.bind(symbol, value);
        } else if !track_pc(ir, id, cx) {
            self.visit_structure(ir, id, cx);
        }
    }

    fn visit_unknown(&mut self, _ir: &mut Ir, _id: NodeId, _cx: &mut Context) {}

    fn changed(&self) -> bool {
        self.changed
    }
}
