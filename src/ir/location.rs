use std::{fmt, sync::Arc};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn increment_column(&mut self) {
        self.column += 1;
    }

    pub fn increment_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Where a node came from, used only when reporting diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Location {
    /// Synthesized by the assembler itself, or reported about the program as a whole.
    #[default]
    TopLevel,
    /// A line in a source file.
    Source {
        file: Arc<str>,
        position: SourcePosition,
    },
    /// A node copied out of a macro body. Reported as `call->definition`.
    Expansion {
        call: Box<Location>,
        definition: Box<Location>,
    },
}

impl Location {
    pub fn source(file: &Arc<str>, position: SourcePosition) -> Self {
        Self::Source {
            file: Arc::clone(file),
            position,
        }
    }

    pub fn expansion(call: &Location, definition: &Location) -> Self {
        Self::Expansion {
            call: Box::new(call.clone()),
            definition: Box::new(definition.clone()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::TopLevel => write!(f, "<Top Level>"),
            Location::Source { file, position } => write!(f, "{}:{}", file, position.line),
            Location::Expansion { call, definition } => write!(f, "{}->{}", call, definition),
        }
    }
}
