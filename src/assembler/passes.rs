use thiserror::Error;

use crate::{
    assembler::{
        codegen::opcode::OpcodeTable,
        diagnostics::{Diagnostics, Error, Warning},
        environment::Environment,
        macros::MacroTable,
    },
    ir::{Expr, Ir, Location, NodeId, NodeKind},
};

pub use branches::ExtendBranches;
pub use checks::{CheckExprs, CircularityCheck};
pub use labels::{InitLabels, UpdateLabels};
pub use macros::{DefineMacros, ExpandMacros};
pub use modes::{Collapse, EasyModes, NormalizeModes};

/// Long branch rewriting.
pub mod branches;

/// Whole-program consistency checks run once labels are known.
pub mod checks;

/// Label discovery and address assignment.
pub mod labels;

/// Macro extraction and expansion.
pub mod macros;

/// Addressing mode selection.
pub mod modes;

/// Upper bound on the rounds of a [`FixPoint`].
pub const MAX_ROUNDS: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    #[error("Internal error: {pass} cannot handle node '{node}'")]
    UnhandledNode { pass: &'static str, node: String },
    #[error("Can't make {0} converge! Maybe there's a recursive dependency somewhere?")]
    NoConvergence(&'static str),
}

/// State shared by every pass of one assembly run.
#[derive(Debug)]
pub struct Context {
    pub env: Environment,
    pub diagnostics: Diagnostics,
    pub macros: MacroTable,
    pub opcodes: &'static OpcodeTable,
}

impl Context {
    pub fn new(opcodes: &'static OpcodeTable, diagnostics: Diagnostics) -> Self {
        Self {
            env: Environment::new(),
            diagnostics,
            macros: MacroTable::new(),
            opcodes,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn error(&mut self, location: &Location, error: impl Into<Error>) {
        self.diagnostics.error(location, error);
    }

    pub fn warn(&mut self, location: &Location, warning: Warning) {
        self.diagnostics.warn(location, warning);
    }

    /// Evaluates `expr`, reporting failures and substituting 0.
    pub fn value_of(&mut self, expr: &Expr, location: &Location) -> i64 {
        match expr.evaluate(&self.env) {
            Ok(value) => value,
            Err(error) => {
                self.error(location, error);
                0
            }
        }
    }

    fn reset_environment(&mut self) {
        if let Err(error) = self.env.reset() {
            self.error(&Location::TopLevel, error);
        }
    }
}

/// A single traversal of the program.
///
/// [`walk`] hands every non-sequence node to [`visit`](Pass::visit). Passes match the node kinds
/// they care about and pass everything else on to [`visit_structure`](Pass::visit_structure).
pub trait Pass {
    fn name(&self) -> &'static str;

    fn pre_pass(&mut self, _cx: &mut Context) {}

    fn post_pass(&mut self, _cx: &mut Context) {}

    fn visit(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        self.visit_structure(ir, id, cx);
    }

    /// Handles the nodes every pass treats the same way: segments and scopes.
    fn visit_structure(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        let handled = match &node.kind {
            NodeKind::None | NodeKind::Sequence(_) => true,
            NodeKind::TextSegment(name) => {
                cx.env.switch_segment(name, true);
                true
            }
            NodeKind::DataSegment(name) => {
                cx.env.switch_segment(name, false);
                true
            }
            NodeKind::ScopeBegin => {
                cx.env.enter_scope();
                true
            }
            NodeKind::ScopeEnd => {
                if let Err(error) = cx.env.exit_scope() {
                    cx.error(&node.location, error);
                }
                true
            }
            _ => false,
        };
        if !handled {
            self.visit_unknown(ir, id, cx);
        }
    }

    /// Called for nodes the pass does not know about. Permissive passes override this.
    fn visit_unknown(&mut self, ir: &mut Ir, id: NodeId, cx: &mut Context) {
        let node = &ir[id];
        cx.error(
            &node.location,
            PassError::UnhandledNode {
                pass: self.name(),
                node: node.kind.to_string(),
            },
        );
    }

    /// Whether the last run modified the program or its labels.
    fn changed(&self) -> bool {
        false
    }
}

/// Visits `id` and, for sequences, every descendant in order.
pub fn walk<P: Pass + ?Sized>(pass: &mut P, ir: &mut Ir, id: NodeId, cx: &mut Context) {
    let children = match &ir[id].kind {
        NodeKind::Sequence(children) => Some(children.clone()),
        _ => None,
    };
    match children {
        Some(children) => {
            for child in children {
                walk(pass, ir, child, cx);
            }
        }
        None => pass.visit(ir, id, cx),
    }
}

/// Moves the program counter over `id` the way the final encoding will.
///
/// Returns false for nodes that do not affect the program counter.
pub fn track_pc(ir: &Ir, id: NodeId, cx: &mut Context) -> bool {
    let node = &ir[id];
    match &node.kind {
        NodeKind::Instruction(instruction) => cx.env.advance_pc(instruction.size()),
        NodeKind::Data { width, values, .. } => {
            cx.env.advance_pc((width.bytes() * values.len()) as i64)
        }
        NodeKind::ByteRange { length, .. } => {
            if let Ok(length) = length.evaluate(&cx.env) {
                cx.env.advance_pc(length);
            }
        }
        NodeKind::SetPc(target) | NodeKind::Advance { target, .. } => {
            let pc = cx.value_of(target, &node.location);
            cx.env.set_pc(pc);
        }
        NodeKind::CheckPc(_) | NodeKind::Label { .. } => {}
        _ => return false,
    }
    true
}

/// Something the pipeline can run: a single pass or a [`FixPoint`] of stages.
pub trait Stage {
    /// Runs the stage and reports whether anything changed.
    fn go(&mut self, ir: &mut Ir, cx: &mut Context) -> bool;
}

impl<P: Pass> Stage for P {
    fn go(&mut self, ir: &mut Ir, cx: &mut Context) -> bool {
        if cx.has_errors() {
            return false;
        }
        let name = self.name();
        let _span = tracing::debug_span!("pass", name).entered();
        tracing::debug!("Running pass {}", name);

        cx.reset_environment();
        self.pre_pass(cx);
        let root = ir.root();
        walk(self, ir, root, cx);
        self.post_pass(cx);
        cx.reset_environment();

        tracing::trace!("Labels after {}:\n{}", name, cx.env);
        tracing::trace!("Program after {}:\n{}", name, ir.dump());
        self.changed()
    }
}

/// Repeats its stages until the last one stops changing the program.
///
/// Gives up after [`MAX_ROUNDS`] rounds, reporting [`PassError::NoConvergence`]. Stops early as
/// soon as an error has been reported.
pub struct FixPoint {
    name: &'static str,
    stages: Vec<Box<dyn Stage>>,
}

impl FixPoint {
    pub fn new(name: &'static str, stages: Vec<Box<dyn Stage>>) -> Self {
        Self { name, stages }
    }
}

impl Stage for FixPoint {
    fn go(&mut self, ir: &mut Ir, cx: &mut Context) -> bool {
        let mut changed = false;
        for round in 1..=MAX_ROUNDS {
            if cx.has_errors() {
                return changed;
            }
            let mut last_changed = false;
            for stage in self.stages.iter_mut() {
                last_changed = stage.go(ir, cx);
            }
            if cx.has_errors() || !last_changed {
                tracing::debug!("Fixpoint {} finished after {} rounds", self.name, round);
                return changed;
            }
            changed = true;
            tracing::debug!("Fixpoint {} failed, looping back", self.name);
        }
        cx.error(&Location::TopLevel, PassError::NoConvergence(self.name));
        changed
    }
}

/// Every stage up to, but not including, the final encoding.
pub fn pipeline(branch_extend: bool) -> Vec<Box<dyn Stage>> {
    let label_update = FixPoint::new("label update", vec![Box::new(UpdateLabels::default())]);
    let selection = FixPoint::new(
        "instruction selection 1",
        vec![Box::new(label_update), Box::new(Collapse::default())],
    );
    let selection: Box<dyn Stage> = if branch_extend {
        Box::new(FixPoint::new(
            "instruction selection 2",
            vec![Box::new(selection), Box::new(ExtendBranches::default())],
        ))
    } else {
        Box::new(selection)
    };

    vec![
        Box::new(DefineMacros::default()),
        Box::new(FixPoint::new(
            "macro expansion",
            vec![Box::new(ExpandMacros::default())],
        )),
        Box::new(FixPoint::new(
            "label initialization",
            vec![Box::new(InitLabels::default())],
        )),
        Box::new(CircularityCheck::default()),
        Box::new(CheckExprs),
        Box::new(EasyModes),
        selection,
        Box::new(NormalizeModes),
        Box::new(UpdateLabels::default()),
    ]
}
