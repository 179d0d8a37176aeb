use std::{collections::HashMap, fmt};

use thiserror::Error;

use crate::ir::{Symbol, SymbolLookup};

/// Segment selected at the start of every pass.
pub const DEFAULT_TEXT_SEGMENT: &str = "*text-default*";
pub const DEFAULT_DATA_SEGMENT: &str = "*data-default*";

pub type ScopeId = usize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Duplicate label definition '{0}'")]
    DuplicateLabel(Symbol),
    #[error("Undefined or circular dependency for label '{0}'")]
    CircularLabel(Symbol),
    #[error("Undefined or circular reference on {0}")]
    CircularReference(&'static str),
    #[error("Unmatched .scope")]
    UnmatchedScope,
    #[error("Unmatched .scend")]
    UnmatchedScopeEnd,
}

/// Symbol table with nested scopes and a program counter per segment.
///
/// Bindings survive [`reset`](Environment::reset) so that later passes see the values computed
/// by earlier ones. Scope ids restart from zero on every reset, a scope therefore gets the same
/// id in every pass as long as the program's structure does not change.
#[derive(Debug, Clone)]
pub struct Environment {
    globals: HashMap<String, i64>,
    locals: HashMap<ScopeId, HashMap<String, i64>>,
    /// Innermost scope last
    stack: Vec<ScopeId>,
    scope_count: ScopeId,
    pc: i64,
    segments: HashMap<String, i64>,
    segment: String,
    write_allowed: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            globals: HashMap::new(),
            locals: HashMap::new(),
            stack: vec![0],
            scope_count: 0,
            pc: 0,
            segments: HashMap::new(),
            segment: DEFAULT_TEXT_SEGMENT.to_owned(),
            write_allowed: true,
        }
    }

    /// Value of `symbol`, locals are searched from the innermost scope outwards.
    pub fn lookup(&self, symbol: &Symbol) -> Option<i64> {
        match symbol {
            Symbol::Global(name) => self.globals.get(name).copied(),
            Symbol::Local(name) => self
                .stack
                .iter()
                .rev()
                .find_map(|scope| self.locals.get(scope).and_then(|map| map.get(name)))
                .copied(),
        }
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.lookup(symbol).is_some()
    }

    /// Binds a global, or a local in the innermost scope.
    pub fn bind(&mut self, symbol: &Symbol, value: i64) {
        match symbol {
            Symbol::Global(name) => {
                self.globals.insert(name.clone(), value);
            }
            Symbol::Local(name) => {
                let scope = self.innermost_scope();
                self.locals
                    .entry(scope)
                    .or_default()
                    .insert(name.clone(), value);
            }
        }
    }

    pub fn innermost_scope(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(0)
    }

    pub fn pc(&self) -> i64 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: i64) {
        self.pc = pc;
    }

    pub fn advance_pc(&mut self, amount: i64) {
        self.pc = self.pc.saturating_add(amount);
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn write_allowed(&self) -> bool {
        self.write_allowed
    }

    /// Stores the current PC for the outgoing segment and restores the incoming one's.
    pub fn switch_segment(&mut self, name: &str, writable: bool) {
        self.segments.insert(self.segment.clone(), self.pc);
        self.segment = name.to_owned();
        self.pc = self.segments.get(name).copied().unwrap_or(0);
        self.write_allowed = writable;
    }

    /// Opens a scope with a fresh id. Its symbol map is created on first binding.
    pub fn enter_scope(&mut self) -> ScopeId {
        self.scope_count += 1;
        self.stack.push(self.scope_count);
        self.scope_count
    }

    pub fn exit_scope(&mut self) -> Result<(), SymbolError> {
        if self.stack.len() <= 1 {
            return Err(SymbolError::UnmatchedScopeEnd);
        }
        self.stack.pop();
        Ok(())
    }

    /// Prepares for another pass over the program, keeping all bindings.
    pub fn reset(&mut self) -> Result<(), SymbolError> {
        let unmatched = self.stack.len() > 1;
        self.stack.truncate(1);
        self.scope_count = 0;
        self.pc = 0;
        self.segments.clear();
        self.segment = DEFAULT_TEXT_SEGMENT.to_owned();
        self.write_allowed = true;
        if unmatched {
            Err(SymbolError::UnmatchedScope)
        } else {
            Ok(())
        }
    }

    /// All bound globals, sorted by name.
    pub fn globals(&self) -> Vec<(&str, i64)> {
        let mut globals: Vec<(&str, i64)> = self
            .globals
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        globals.sort();
        globals
    }
}

impl SymbolLookup for Environment {
    fn lookup(&self, symbol: &Symbol) -> Option<i64> {
        Environment::lookup(self, symbol)
    }

    fn pc(&self) -> i64 {
        Environment::pc(self)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Global labels:")?;
        for (name, value) in self.globals() {
            writeln!(f, "  {} = ${:04X} ({})", name, value, value)?;
        }
        let mut scopes: Vec<&ScopeId> = self.locals.keys().collect();
        scopes.sort();
        for scope in scopes {
            writeln!(f, "Scope {}:", scope)?;
            let mut locals: Vec<(&String, &i64)> = self.locals[scope].iter().collect();
            locals.sort();
            for (name, value) in locals {
                writeln!(f, "  _{} = ${:04X} ({})", name, value, value)?;
            }
        }
        write!(f, "Program counter: ${:04X}", self.pc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_global_binding() {
        let mut env = Environment::new();
        let symbol = Symbol::parse("screen");
        assert_eq!(env.lookup(&symbol), None);
        env.bind(&symbol, 0x0400);
        assert!(env.contains(&symbol));

        env.enter_scope();
        assert_eq!(env.lookup(&symbol), Some(0x0400));
    }

    #[test]
    fn test_local_scoping() -> Result<(), SymbolError> {
        let mut env = Environment::new();
        let local = Symbol::parse("_loop");

        env.bind(&local, 1);
        let outer = env.enter_scope();
        assert_eq!(env.lookup(&local), Some(1));

        env.bind(&local, 2);
        let inner = env.enter_scope();
        assert_ne!(outer, inner);
        assert_eq!(env.lookup(&local), Some(2));

        env.exit_scope()?;
        env.exit_scope()?;
        assert_eq!(env.lookup(&local), Some(1));

        // A sibling scope gets a fresh id and does not see the earlier scope's locals
        env.enter_scope();
        env.bind(&Symbol::parse("_other"), 3);
        env.exit_scope()?;
        assert_eq!(env.lookup(&Symbol::parse("_other")), None);
        Ok(())
    }

    #[test]
    fn test_scope_ids_repeat_after_reset() -> Result<(), SymbolError> {
        let mut env = Environment::new();
        let first = env.enter_scope();
        env.bind(&Symbol::parse("_x"), 5);
        env.exit_scope()?;
        env.reset()?;

        assert_eq!(env.enter_scope(), first);
        assert_eq!(env.lookup(&Symbol::parse("_x")), Some(5));
        Ok(())
    }

    #[test]
    fn test_unmatched_scopes() {
        let mut env = Environment::new();
        assert_eq!(env.exit_scope(), Err(SymbolError::UnmatchedScopeEnd));

        env.enter_scope();
        assert_eq!(env.reset(), Err(SymbolError::UnmatchedScope));
        assert_eq!(env.reset(), Ok(()));
    }

    #[test]
    fn test_segments() {
        let mut env = Environment::new();
        env.set_pc(0x8000);
        env.advance_pc(3);

        env.switch_segment(DEFAULT_DATA_SEGMENT, false);
        assert_eq!(env.pc(), 0);
        assert!(!env.write_allowed());
        env.set_pc(0x0200);

        env.switch_segment(DEFAULT_TEXT_SEGMENT, true);
        assert_eq!(env.pc(), 0x8003);
        assert!(env.write_allowed());

        env.switch_segment(DEFAULT_DATA_SEGMENT, false);
        assert_eq!(env.pc(), 0x0200);
        assert_eq!(env.segment(), DEFAULT_DATA_SEGMENT);
    }

    #[test]
    fn test_reset_keeps_bindings() -> Result<(), SymbolError> {
        let mut env = Environment::new();
        env.bind(&Symbol::parse("start"), 0x1000);
        env.set_pc(0x1234);
        env.switch_segment("zp", false);
        env.reset()?;

        assert_eq!(env.pc(), 0);
        assert_eq!(env.segment(), DEFAULT_TEXT_SEGMENT);
        assert!(env.write_allowed());
        assert_eq!(env.globals(), vec![("start", 0x1000)]);
        Ok(())
    }
}
