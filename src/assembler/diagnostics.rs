use std::fmt;

use thiserror::Error;

use crate::{
    assembler::{
        codegen::CodeGenError, environment::SymbolError, macros::MacroError, parser::ParseError,
        passes::PassError,
    },
    ir::{EvalError, Location, Mnemonic},
};

/// Any error found while assembling a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error(transparent)]
    Macro(#[from] MacroError),
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error(transparent)]
    CodeGen(#[from] CodeGenError),
}

/// Advisory messages that do not stop assembly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("Using register name as label: '{0}'")]
    RegisterNameAsLabel(String),
    #[error("Using opcode name as label: '{0}'")]
    OpcodeNameAsLabel(String),
    #[error("{0} out of range, replacing with JMP")]
    BranchReplacedWithJump(Mnemonic),
    #[error("{branch} out of range, replacing with {inverse}/JMP combination")]
    BranchExtended { branch: Mnemonic, inverse: Mnemonic },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic<T> {
    pub location: Location,
    pub kind: T,
}

impl<T: fmt::Display> fmt::Display for Diagnostic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.kind)
    }
}

/// Collects errors and warnings in the order they are found.
///
/// Nothing here is fatal. Passes check [`has_errors`](Diagnostics::has_errors) before running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<Diagnostic<Error>>,
    warnings: Vec<Diagnostic<Warning>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, location: &Location, error: impl Into<Error>) {
        let diagnostic = Diagnostic {
            location: location.clone(),
            kind: error.into(),
        };
        tracing::debug!(%diagnostic, "error");
        self.errors.push(diagnostic);
    }

    pub fn warn(&mut self, location: &Location, warning: Warning) {
        let diagnostic = Diagnostic {
            location: location.clone(),
            kind: warning,
        };
        tracing::debug!(%diagnostic, "warning");
        self.warnings.push(diagnostic);
    }

    pub fn errors(&self) -> &[Diagnostic<Error>] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic<Warning>] {
        &self.warnings
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Appends everything found by another stage, such as the parser.
    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// `No errors`, `1 error` or `N errors`.
    pub fn report(&self) -> String {
        match self.error_count() {
            0 => "No errors".to_owned(),
            1 => "1 error".to_owned(),
            n => format!("{} errors", n),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{}", error)?;
        }
        write!(f, "{}", self.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Symbol;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_report() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(diagnostics.report(), "No errors");

        diagnostics.error(&Location::TopLevel, EvalError::DivisionByZero);
        assert_eq!(diagnostics.report(), "1 error");

        diagnostics.error(
            &Location::TopLevel,
            SymbolError::DuplicateLabel(Symbol::parse("start")),
        );
        assert_eq!(diagnostics.report(), "2 errors");
        assert_eq!(
            diagnostics.to_string(),
            "<Top Level>: Division by zero
<Top Level>: Duplicate label definition 'start'
2 errors"
        );
    }

    #[test]
    fn test_warnings_are_not_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(
            &Location::TopLevel,
            Warning::RegisterNameAsLabel("x".to_owned()),
        );
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.warnings().len(), 1);
    }
}
