use std::collections::HashMap;

use thiserror::Error;

use crate::ir::{Expr, Location, Node, NodeKind, Symbol};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacroError {
    #[error("Undefined macro '{0}'")]
    Undefined(String),
    #[error("Duplicate macro definition '{0}'")]
    Duplicate(String),
    #[error("Nested macro definition")]
    NestedDefinition,
    #[error("No macro definition in progress")]
    NotDefining,
    #[error("Unmatched .macro")]
    UnmatchedMacro,
    #[error("Unmatched .macend")]
    UnmatchedMacroEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub body: Vec<Node>,
}

#[derive(Debug)]
struct Definition {
    name: String,
    body: Vec<Node>,
    duplicate: bool,
}

/// Macros by name, plus the definition currently being captured.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Macro>,
    open: Option<Definition>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn is_defining(&self) -> bool {
        self.open.is_some()
    }

    /// Starts capturing a macro body.
    ///
    /// Redefining a macro is an error, the body is still captured so that it can be discarded
    /// and the first definition stays in effect.
    pub fn define(&mut self, name: &str) -> Result<(), MacroError> {
        if self.open.is_some() {
            return Err(MacroError::NestedDefinition);
        }
        let duplicate = self.macros.contains_key(name);
        self.open = Some(Definition {
            name: name.to_owned(),
            body: vec![],
            duplicate,
        });
        if duplicate {
            Err(MacroError::Duplicate(name.to_owned()))
        } else {
            Ok(())
        }
    }

    pub fn capture(&mut self, node: &Node) -> Result<(), MacroError> {
        if matches!(node.kind, NodeKind::MacroBegin(_)) {
            return Err(MacroError::NestedDefinition);
        }
        match &mut self.open {
            Some(definition) => {
                definition.body.push(node.clone());
                Ok(())
            }
            None => Err(MacroError::NotDefining),
        }
    }

    pub fn end_define(&mut self) -> Result<(), MacroError> {
        let definition = self.open.take().ok_or(MacroError::UnmatchedMacroEnd)?;
        tracing::debug!(
            name = definition.name,
            nodes = definition.body.len(),
            "macro defined"
        );
        if !definition.duplicate {
            self.macros.insert(
                definition.name.clone(),
                Macro {
                    name: definition.name,
                    body: definition.body,
                },
            );
        }
        Ok(())
    }

    /// Drops a definition that was never closed.
    pub fn abandon(&mut self) -> Result<(), MacroError> {
        match self.open.take() {
            Some(_) => Err(MacroError::UnmatchedMacro),
            None => Ok(()),
        }
    }

    /// A fresh copy of the macro's body with its arguments bound.
    ///
    /// Argument `n` is bound as `_n` inside two new scopes. The outer scope holds the values
    /// evaluated at the call site under hidden names so that an argument may refer to a label of
    /// the same name as a parameter.
    pub fn invoke(
        &self,
        location: &Location,
        name: &str,
        args: &[Expr],
    ) -> Result<Vec<Node>, MacroError> {
        let definition = self
            .macros
            .get(name)
            .ok_or_else(|| MacroError::Undefined(name.to_owned()))?;

        let at_call = |kind| Node::new(location.clone(), kind);
        let mut nodes = vec![at_call(NodeKind::ScopeBegin)];
        for (i, arg) in args.iter().enumerate() {
            nodes.push(at_call(NodeKind::Label {
                symbol: Symbol::Local(format!("*{}", i + 1)),
                value: arg.clone(),
            }));
        }
        nodes.push(at_call(NodeKind::ScopeBegin));
        for i in 1..=args.len() {
            nodes.push(at_call(NodeKind::Label {
                symbol: Symbol::Local(i.to_string()),
                value: Expr::symbol(Symbol::Local(format!("*{}", i))),
            }));
        }
        nodes.extend(definition.body.iter().map(|node| {
            Node::new(
                Location::expansion(location, &node.location),
                node.kind.clone(),
            )
        }));
        nodes.push(at_call(NodeKind::ScopeEnd));
        nodes.push(at_call(NodeKind::ScopeEnd));

        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AddressingMode, Instruction, Mnemonic};

    use pretty_assertions::assert_eq;

    fn load_arg() -> Node {
        Instruction::resolved(Mnemonic::LDA, AddressingMode::Immediate, Expr::label("_1")).into()
    }

    #[test]
    fn test_define_and_invoke() -> Result<(), MacroError> {
        let mut macros = MacroTable::new();
        macros.define("load")?;
        assert!(macros.is_defining());
        macros.capture(&load_arg())?;
        macros.end_define()?;
        assert!(!macros.is_defining());

        let nodes = macros.invoke(&Location::TopLevel, "load", &[Expr::constant(7)])?;
        let kinds: Vec<NodeKind> = nodes.into_iter().map(|node| node.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::ScopeBegin,
                NodeKind::Label {
                    symbol: Symbol::Local("*1".to_owned()),
                    value: Expr::constant(7),
                },
                NodeKind::ScopeBegin,
                NodeKind::Label {
                    symbol: Symbol::Local("1".to_owned()),
                    value: Expr::symbol(Symbol::Local("*1".to_owned())),
                },
                load_arg().kind,
                NodeKind::ScopeEnd,
                NodeKind::ScopeEnd,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_expansion_location() -> Result<(), MacroError> {
        let mut macros = MacroTable::new();
        macros.define("nop")?;
        macros.capture(&Instruction::implied(Mnemonic::NOP).into())?;
        macros.end_define()?;

        let nodes = macros.invoke(&Location::TopLevel, "nop", &[])?;
        assert_eq!(nodes.len(), 5);
        assert_eq!(
            nodes[2].location,
            Location::expansion(&Location::TopLevel, &Location::TopLevel)
        );
        Ok(())
    }

    #[test]
    fn test_undefined() {
        let macros = MacroTable::new();
        assert_eq!(
            macros.invoke(&Location::TopLevel, "missing", &[]),
            Err(MacroError::Undefined("missing".to_owned()))
        );
    }

    #[test]
    fn test_duplicate_keeps_first() -> Result<(), MacroError> {
        let mut macros = MacroTable::new();
        macros.define("m")?;
        macros.capture(&Instruction::implied(Mnemonic::INX).into())?;
        macros.end_define()?;

        assert_eq!(macros.define("m"), Err(MacroError::Duplicate("m".to_owned())));
        macros.capture(&Instruction::implied(Mnemonic::DEX).into())?;
        macros.end_define()?;

        let body = &macros.get("m").map(|m| m.body.clone()).unwrap_or_default();
        assert_eq!(body, &vec![Node::from(Instruction::implied(Mnemonic::INX))]);
        Ok(())
    }

    #[test]
    fn test_nested_and_unmatched() -> Result<(), MacroError> {
        let mut macros = MacroTable::new();
        assert_eq!(macros.end_define(), Err(MacroError::UnmatchedMacroEnd));
        assert_eq!(
            macros.capture(&NodeKind::ScopeBegin.into()),
            Err(MacroError::NotDefining)
        );

        macros.define("outer")?;
        assert_eq!(macros.define("inner"), Err(MacroError::NestedDefinition));
        assert_eq!(
            macros.capture(&NodeKind::MacroBegin("inner".to_owned()).into()),
            Err(MacroError::NestedDefinition)
        );
        assert_eq!(macros.abandon(), Err(MacroError::UnmatchedMacro));
        assert_eq!(macros.abandon(), Ok(()));
        Ok(())
    }
}
