use std::{
    fmt,
    ops::{Index, IndexMut},
};

pub use expr::{EvalError, Expr, ExprKind, Operator, Symbol, SymbolLookup};
pub use instruction::{AddressingMode, GenericMode, Instruction, Mnemonic, Mode};
pub use location::{Location, SourcePosition};

/// Arithmetic expressions over constants, labels and the program counter.
pub mod expr;

/// CPU instructions, mnemonics and addressing modes.
pub mod instruction;

/// Source locations attached to nodes.
pub mod location;

/// Index of a node in an [`Ir`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Dword,
}

impl Width {
    pub fn bytes(&self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Dword => 4,
        }
    }

    /// Largest unsigned value representable in this width.
    pub fn max_value(&self) -> i64 {
        (1 << (8 * self.bytes())) - 1
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Byte => write!(f, "Byte"),
            Width::Word => write!(f, "Word"),
            Width::Dword => write!(f, "Dword"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// The operation a node performs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    None,
    Sequence(Vec<NodeId>),
    Instruction(Instruction),
    Data {
        width: Width,
        endian: Endian,
        values: Vec<Expr>,
    },
    /// A slice of an included binary file whose bounds are only known after evaluation.
    ByteRange {
        offset: Expr,
        length: Expr,
        bytes: Vec<u8>,
    },
    Label {
        symbol: Symbol,
        value: Expr,
    },
    SetPc(Expr),
    Advance {
        target: Expr,
        fill: Expr,
    },
    CheckPc(Expr),
    TextSegment(String),
    DataSegment(String),
    ScopeBegin,
    ScopeEnd,
    MacroBegin(String),
    MacroEnd,
    MacroInvoke {
        name: String,
        args: Vec<Expr>,
    },
}

impl NodeKind {
    /// Every expression attached directly to this node.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            NodeKind::Instruction(instruction) => instruction.operand.iter().collect(),
            NodeKind::Data { values, .. } => values.iter().collect(),
            NodeKind::ByteRange { offset, length, .. } => vec![offset, length],
            NodeKind::Label { value, .. } => vec![value],
            NodeKind::SetPc(target) | NodeKind::CheckPc(target) => vec![target],
            NodeKind::Advance { target, fill } => vec![target, fill],
            NodeKind::MacroInvoke { args, .. } => args.iter().collect(),
            NodeKind::None
            | NodeKind::Sequence(_)
            | NodeKind::TextSegment(_)
            | NodeKind::DataSegment(_)
            | NodeKind::ScopeBegin
            | NodeKind::ScopeEnd
            | NodeKind::MacroBegin(_)
            | NodeKind::MacroEnd => vec![],
        }
    }
}

fn join(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::None => write!(f, "None"),
            NodeKind::Sequence(children) => write!(f, "Sequence ({} nodes)", children.len()),
            NodeKind::Instruction(instruction) => write!(f, "{}", instruction),
            NodeKind::Data {
                width,
                endian,
                values,
            } => {
                let suffix = if *endian == Endian::Big { "BE" } else { "" };
                write!(f, "{}{} {}", width, suffix, join(values))
            }
            NodeKind::ByteRange {
                offset,
                length,
                bytes,
            } => write!(f, "ByteRange {}, {} of {} bytes", offset, length, bytes.len()),
            NodeKind::Label { symbol, value } => write!(f, "Label {} = {}", symbol, value),
            NodeKind::SetPc(target) => write!(f, "SetPC {}", target),
            NodeKind::Advance { target, fill } => write!(f, "Advance {}, {}", target, fill),
            NodeKind::CheckPc(target) => write!(f, "CheckPC {}", target),
            NodeKind::TextSegment(name) => write!(f, "TextSegment {}", name),
            NodeKind::DataSegment(name) => write!(f, "DataSegment {}", name),
            NodeKind::ScopeBegin => write!(f, "ScopeBegin"),
            NodeKind::ScopeEnd => write!(f, "ScopeEnd"),
            NodeKind::MacroBegin(name) => write!(f, "MacroBegin {}", name),
            NodeKind::MacroEnd => write!(f, "MacroEnd"),
            NodeKind::MacroInvoke { name, args } => write!(f, "MacroInvoke {} {}", name, join(args)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub location: Location,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(location: Location, kind: NodeKind) -> Self {
        Self { location, kind }
    }

    pub fn instruction(location: Location, instruction: Instruction) -> Self {
        Self::new(location, NodeKind::Instruction(instruction))
    }
}

impl From<NodeKind> for Node {
    fn from(kind: NodeKind) -> Self {
        Self::new(Location::TopLevel, kind)
    }
}

impl From<Instruction> for Node {
    fn from(instruction: Instruction) -> Self {
        Self::new(Location::TopLevel, NodeKind::Instruction(instruction))
    }
}

/// Arena holding the program tree. The root is always the first node.
///
/// Passes rewrite nodes in place through [`IndexMut`], a node keeps its [`NodeId`] for the
/// lifetime of the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Ir {
    nodes: Vec<Node>,
}

impl Default for Ir {
    fn default() -> Self {
        Self::new()
    }
}

impl Ir {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(Location::TopLevel, NodeKind::Sequence(vec![]))],
        }
    }

    /// Builds an arena whose root is a sequence of the given nodes.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut ir = Self::new();
        let children = nodes.into_iter().map(|node| ir.push(node)).collect();
        let root = ir.root();
        ir[root].kind = NodeKind::Sequence(children);
        ir
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaf nodes reachable from the root, in program order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = vec![];
        self.collect_leaves(self.root(), &mut leaves);
        leaves
    }

    fn collect_leaves(&self, id: NodeId, leaves: &mut Vec<NodeId>) {
        match &self[id].kind {
            NodeKind::Sequence(children) => {
                for &child in children {
                    self.collect_leaves(child, leaves);
                }
            }
            _ => leaves.push(id),
        }
    }

    /// Indented rendering of the tree for debug output.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root(), 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self[id];
        out.push_str(&format!(
            "{:indent$}{}: {}\n",
            "",
            node.location,
            node.kind,
            indent = depth * 2
        ));
        if let NodeKind::Sequence(children) = &node.kind {
            for &child in children {
                self.dump_node(child, depth + 1, out);
            }
        }
    }
}

impl Index<NodeId> for Ir {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Ir {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_leaves_in_program_order() {
        let mut ir = Ir::from_nodes(vec![
            Instruction::implied(Mnemonic::CLC).into(),
            NodeKind::None.into(),
            Instruction::implied(Mnemonic::RTS).into(),
        ]);
        let leaves = ir.leaves();
        assert_eq!(leaves.len(), 3);

        // Replace the middle node with a nested sequence
        let inner = vec![
            ir.push(Instruction::implied(Mnemonic::INX).into()),
            ir.push(Instruction::implied(Mnemonic::INY).into()),
        ];
        ir[leaves[1]].kind = NodeKind::Sequence(inner);

        let mnemonics: Vec<Mnemonic> = ir
            .leaves()
            .into_iter()
            .filter_map(|id| match &ir[id].kind {
                NodeKind::Instruction(instruction) => Some(instruction.mnemonic),
                _ => None,
            })
            .collect();
        assert_eq!(
            mnemonics,
            vec![Mnemonic::CLC, Mnemonic::INX, Mnemonic::INY, Mnemonic::RTS]
        );
    }

    #[test]
    fn test_expressions() {
        let kind = NodeKind::Advance {
            target: Expr::constant(0x100),
            fill: Expr::constant(0xea),
        };
        assert_eq!(kind.expressions().len(), 2);
        assert!(NodeKind::ScopeBegin.expressions().is_empty());
        assert!(NodeKind::Instruction(Instruction::implied(Mnemonic::NOP))
            .expressions()
            .is_empty());
    }

    #[test]
    fn test_width() {
        let tests = vec![
            (Width::Byte, 1, 0xff),
            (Width::Word, 2, 0xffff),
            (Width::Dword, 4, 0xffff_ffff),
        ];
        for (width, bytes, max) in tests {
            assert_eq!(width.bytes(), bytes);
            assert_eq!(width.max_value(), max);
        }
    }
}
