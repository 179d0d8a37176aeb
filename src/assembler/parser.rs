use std::{
    collections::HashSet,
    fs,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use thiserror::Error;

use crate::{
    assembler::{
        codegen::opcode::OpcodeTable,
        diagnostics::Diagnostics,
        environment::Environment,
        lexer::{Lexer, LexerError, Token, TokenType},
    },
    ir::{
        AddressingMode, EvalError, Expr, GenericMode, Instruction, Ir, Location, Mnemonic, Node,
        NodeId, NodeKind, Operator, Symbol,
    },
};

/// Directive handling.
mod pragmas;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("Expected: {expected}, found '{found}'")]
    Expected {
        expected: &'static str,
        found: String,
    },
    #[error("Expected: expression, found '{0}'")]
    ExpectedExpression(String),
    #[error("Unknown opcode '{0}'")]
    UnknownOpcode(String),
    #[error("Unknown pragma {0}")]
    UnknownPragma(String),
    #[error("Invalid {kind} constant: {literal}")]
    InvalidNumber { kind: &'static str, literal: String },
    #[error("Identifiers may not begin with a number: {0}")]
    IdentifierStartsWithDigit(String),
    #[error("Invalid character constant '{0}'")]
    InvalidCharacter(String),
    #[error("Expression must be constant: {0}")]
    NotConstant(String),
    #[error("Could not read {path}: {message}")]
    Io { path: String, message: String },
    #[error("Charmap replacement out of range")]
    CharmapOutOfRange,
    #[error("Illegal character in .charmap directive")]
    IllegalCharmapValue,
    #[error("Character map {0} not 256 bytes long")]
    CharmapSize(String),
    #[error("Offset may not be negative")]
    NegativeOffset,
    #[error("Offset runs past end of file")]
    OffsetPastEnd,
    #[error("Length may not be negative")]
    NegativeLength,
    #[error(".incbin length too long")]
    LengthTooLong,
    #[error("{0} includes itself")]
    RecursiveInclude(String),
}

impl ParseError {
    fn io(path: &Path, error: std::io::Error) -> Self {
        ParseError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

/// Everything the front end produced.
#[derive(Debug)]
pub struct Program {
    pub ir: Ir,
    pub diagnostics: Diagnostics,
    /// Output file named by `.outfile`
    pub outfile: Option<String>,
}

/// State shared by every file of one program: the node arena, anonymous label numbering, the
/// character map and the set of files already read.
#[derive(Debug)]
pub struct Frontend {
    ir: Ir,
    diagnostics: Diagnostics,
    opcodes: &'static OpcodeTable,
    anonymous_labels: usize,
    charmap: Vec<u8>,
    loaded: HashSet<PathBuf>,
    /// Files currently being parsed, outermost first
    including: Vec<PathBuf>,
    outfile: Option<String>,
    files: Vec<NodeId>,
}

impl Frontend {
    pub fn new(opcodes: &'static OpcodeTable) -> Self {
        Self {
            ir: Ir::new(),
            diagnostics: Diagnostics::new(),
            opcodes,
            anonymous_labels: 0,
            charmap: identity_charmap(),
            loaded: HashSet::new(),
            including: vec![],
            outfile: None,
            files: vec![],
        }
    }

    /// Parses in-memory source. Included files are looked up relative to `directory`.
    pub fn add_source(&mut self, name: &str, source: &str, directory: &Path) {
        let id = self.parse_text(name, source, directory, &Location::TopLevel);
        self.files.push(id);
    }

    /// Parses a file, `-` reads standard input.
    pub fn add_file(&mut self, path: &Path) {
        let filename = path.to_string_lossy();
        if let Some(id) = self.load(&Location::TopLevel, Path::new(""), &filename, false) {
            self.files.push(id);
        }
    }

    pub fn finish(mut self) -> Program {
        let root = self.ir.root();
        self.ir[root].kind = NodeKind::Sequence(self.files);
        Program {
            ir: self.ir,
            diagnostics: self.diagnostics,
            outfile: self.outfile,
        }
    }

    /// Reads and parses a source file, returning the sequence holding its contents.
    ///
    /// With `once` set a file that was already read is skipped.
    fn load(
        &mut self,
        location: &Location,
        directory: &Path,
        filename: &str,
        once: bool,
    ) -> Option<NodeId> {
        let result = if filename == "-" {
            tracing::info!("Loading from standard input");
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .map(|_| (filename.to_owned(), source, PathBuf::new(), None))
                .map_err(|error| ParseError::io(Path::new(filename), error))
        } else {
            let path = directory.join(filename);
            let key = path.canonicalize().unwrap_or_else(|_| path.clone());
            if once && self.loaded.contains(&key) {
                tracing::info!("Skipping {}", path.display());
                return None;
            }
            if self.including.contains(&key) {
                self.diagnostics.error(
                    location,
                    ParseError::RecursiveInclude(path.display().to_string()),
                );
                return None;
            }
            self.loaded.insert(key.clone());
            tracing::info!("Loading {}", path.display());
            let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
            fs::read_to_string(&path)
                .map(|source| (path.display().to_string(), source, parent, Some(key)))
                .map_err(|error| ParseError::io(&path, error))
        };

        match result {
            Ok((name, source, directory, key)) => {
                let nested = key.is_some();
                self.including.extend(key);
                let id = self.parse_text(&name, &source, &directory, location);
                if nested {
                    self.including.pop();
                }
                Some(id)
            }
            Err(error) => {
                self.diagnostics.error(location, error);
                None
            }
        }
    }

    fn parse_text(
        &mut self,
        name: &str,
        source: &str,
        directory: &Path,
        location: &Location,
    ) -> NodeId {
        let mut parser = Parser::new(self, name, source, directory);
        let children = parser.parse_program();
        self.ir
            .push(Node::new(location.clone(), NodeKind::Sequence(children)))
    }
}

fn identity_charmap() -> Vec<u8> {
    (0..=255).collect()
}

/// Parses source in memory into a program.
pub fn parse_source(name: &str, source: &str, opcodes: &'static OpcodeTable) -> Program {
    let mut frontend = Frontend::new(opcodes);
    frontend.add_source(name, source, Path::new(""));
    frontend.finish()
}

/// Turns the tokens of one file into nodes.
///
/// The grammar is line oriented. A line holds any number of labels (`name:` or `*`) followed by
/// at most one pragma, macro invocation or instruction. An error discards the rest of its line
/// and parsing continues on the next one.
pub struct Parser<'a> {
    frontend: &'a mut Frontend,
    lexer: Lexer,
    current_token: Token,
    peek_token: Token,
    file: Arc<str>,
    directory: PathBuf,
    /// Set once the current line's terminator has been consumed
    line_ended: bool,
}

impl<'a> Parser<'a> {
    pub fn new(frontend: &'a mut Frontend, name: &str, source: &str, directory: &Path) -> Self {
        // Feed the lexer so its tokens are ready to be consumed
        let mut s = Self {
            frontend,
            lexer: Lexer::new(source),
            current_token: Token::default(),
            peek_token: Token::default(),
            file: Arc::from(name),
            directory: directory.to_path_buf(),
            line_ended: false,
        };

        s.next_token();
        s.next_token();

        s
    }

    fn next_token(&mut self) {
        self.current_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
    }

    fn current_token_is(&self, token_type: TokenType) -> bool {
        self.current_token.token == token_type
    }

    fn peek_token_is(&self, token_type: TokenType) -> bool {
        self.peek_token.token == token_type
    }

    fn location(&self, token: &Token) -> Location {
        Location::source(&self.file, token.position)
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::Expected {
            expected,
            found: self.current_token.literal_str(),
        }
    }

    fn expect(&mut self, token_type: TokenType, expected: &'static str) -> Result<Token, ParseError> {
        if !self.current_token_is(token_type) {
            return Err(self.unexpected(expected));
        }
        let token = self.current_token.clone();
        self.next_token();
        Ok(token)
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        Ok(self.expect(TokenType::Identifier, "label")?.literal)
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        Ok(self.expect(TokenType::String, "string")?.literal)
    }

    fn expect_register(&mut self, register: &'static str) -> Result<(), ParseError> {
        if self.current_token_is(TokenType::Identifier) && self.current_token.literal == register {
            self.next_token();
            Ok(())
        } else {
            Err(self.unexpected(register))
        }
    }

    fn expect_eol(&mut self) -> Result<(), ParseError> {
        match self.current_token.token {
            TokenType::Eol => {
                self.next_token();
                self.line_ended = true;
                Ok(())
            }
            TokenType::Eof => {
                self.line_ended = true;
                Ok(())
            }
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn skip_line(&mut self) {
        while !self.current_token.token.is_line_end() {
            self.next_token();
        }
        if self.current_token_is(TokenType::Eol) {
            self.next_token();
        }
    }

    fn push(&mut self, nodes: &mut Vec<NodeId>, location: &Location, kind: NodeKind) {
        nodes.push(self.frontend.ir.push(Node::new(location.clone(), kind)));
    }

    fn report_lexer_errors(&mut self) {
        for (position, error) in self.lexer.take_errors() {
            let location = Location::source(&self.file, position);
            self.frontend.diagnostics.error(&location, ParseError::from(error));
        }
    }

    /// Parse the entire file into a list of nodes
    pub fn parse_program(&mut self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        while !self.current_token_is(TokenType::Eof) {
            let location = self.location(&self.current_token);
            let line_start = nodes.len();
            self.line_ended = false;
            if let Err(error) = self.parse_line(&location, &mut nodes) {
                tracing::debug!(%location, %error, "discarding line");
                self.frontend.diagnostics.error(&location, error);
                nodes.truncate(line_start);
                // Directives may fail after reading their whole line
                if !self.line_ended {
                    self.skip_line();
                }
            }
            self.report_lexer_errors();
        }
        self.report_lexer_errors();
        nodes
    }

    fn parse_line(&mut self, location: &Location, nodes: &mut Vec<NodeId>) -> Result<(), ParseError> {
        loop {
            match self.current_token.token {
                TokenType::Eol | TokenType::Eof => return self.expect_eol(),
                TokenType::Identifier if self.peek_token_is(TokenType::Colon) => {
                    let symbol = Symbol::parse(&self.current_token.literal);
                    self.next_token();
                    self.next_token();
                    self.push(
                        nodes,
                        location,
                        NodeKind::Label {
                            symbol,
                            value: Expr::program_counter(),
                        },
                    );
                }
                TokenType::Star => {
                    self.frontend.anonymous_labels += 1;
                    let symbol = Symbol::Global(format!("*{}", self.frontend.anonymous_labels));
                    self.next_token();
                    self.push(
                        nodes,
                        location,
                        NodeKind::Label {
                            symbol,
                            value: Expr::program_counter(),
                        },
                    );
                }
                TokenType::Dot => {
                    self.next_token();
                    let pragma = self.expect_identifier()?;
                    return self.parse_pragma(&pragma, location, nodes);
                }
                TokenType::Backtick => {
                    self.next_token();
                    return self.parse_invoke(location, nodes);
                }
                _ => {
                    let instruction = self.parse_instruction()?;
                    self.push(nodes, location, NodeKind::Instruction(instruction));
                    return Ok(());
                }
            }
        }
    }

    fn parse_mnemonic(&mut self) -> Result<Mnemonic, ParseError> {
        let literal = self.expect(TokenType::Identifier, "opcode")?.literal;
        Mnemonic::from_str(&literal)
            .ok()
            .filter(|mnemonic| self.frontend.opcodes.has_mnemonic(*mnemonic))
            .ok_or(ParseError::UnknownOpcode(literal))
    }

    fn parse_instruction(&mut self) -> Result<Instruction, ParseError> {
        let mnemonic = self.parse_mnemonic()?;

        let instruction = match self.current_token.token {
            TokenType::Eol | TokenType::Eof => Instruction::implied(mnemonic),
            TokenType::Hash => {
                self.next_token();
                let operand = self.parse_expr()?;
                let opcodes = self.frontend.opcodes;
                let mode = if !opcodes.has_mode(mnemonic, AddressingMode::Immediate)
                    && opcodes.has_mode(mnemonic, AddressingMode::ImmediateWord)
                {
                    AddressingMode::ImmediateWord
                } else {
                    AddressingMode::Immediate
                };
                Instruction::resolved(mnemonic, mode, operand)
            }
            TokenType::ParenLeft => {
                self.next_token();
                let operand = self.parse_expr()?;
                let mode = if self.current_token_is(TokenType::Comma) {
                    self.next_token();
                    self.expect_register("x")?;
                    self.expect(TokenType::ParenRight, ")")?;
                    GenericMode::PointerX
                } else {
                    self.expect(TokenType::ParenRight, ")")?;
                    if self.current_token_is(TokenType::Comma) {
                        self.next_token();
                        self.expect_register("y")?;
                        GenericMode::PointerY
                    } else {
                        GenericMode::Pointer
                    }
                };
                Instruction::pending(mnemonic, mode, operand)
            }
            _ => {
                let operand = self.parse_expr()?;
                let mode = if self.current_token_is(TokenType::Comma) {
                    self.next_token();
                    let mode = match (self.current_token.token, self.current_token.literal.as_str()) {
                        (TokenType::Identifier, "x") => GenericMode::MemoryX,
                        (TokenType::Identifier, "y") => GenericMode::MemoryY,
                        _ => return Err(self.unexpected("x or y")),
                    };
                    self.next_token();
                    mode
                } else {
                    GenericMode::Memory
                };
                Instruction::pending(mnemonic, mode, operand)
            }
        };

        self.expect_eol()?;
        Ok(instruction)
    }

    fn parse_number(token: &Token) -> Result<i64, ParseError> {
        let (radix, kind) = match token.token {
            TokenType::Hex => (16, "hexadecimal"),
            TokenType::Binary => (2, "binary"),
            TokenType::Octal => (8, "octal"),
            TokenType::Character => {
                let mut chars = token.literal.chars();
                return match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(ch as i64),
                    _ => Err(ParseError::InvalidCharacter(token.literal.clone())),
                };
            }
            _ => {
                if !token.literal.chars().all(|ch| ch.is_ascii_digit()) {
                    return Err(ParseError::IdentifierStartsWithDigit(
                        token.literal.clone(),
                    ));
                }
                (10, "decimal")
            }
        };
        i64::from_str_radix(&token.literal, radix).map_err(|_| ParseError::InvalidNumber {
            kind,
            literal: token.literal.clone(),
        })
    }

    /// Evaluates an expression that may not refer to labels or the program counter.
    fn constant(expr: &Expr) -> Result<i64, ParseError> {
        if !expr.is_hardcoded() {
            return Err(ParseError::NotConstant(expr.to_string()));
        }
        Ok(expr.evaluate(&Environment::new())?)
    }

    fn anonymous_label(&self, offset: i64) -> Expr {
        let index = self.frontend.anonymous_labels as i64 + offset;
        Expr::symbol(Symbol::Global(format!("*{}", index)))
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let token = self.current_token.token;
        if token.is_number() {
            let value = Self::parse_number(&self.current_token)?;
            self.next_token();
            return Ok(Expr::constant(value));
        }

        match token {
            TokenType::Identifier => {
                let symbol = Symbol::parse(&self.current_token.literal);
                self.next_token();
                Ok(Expr::symbol(symbol))
            }
            TokenType::Caret => {
                self.next_token();
                Ok(Expr::program_counter())
            }
            TokenType::BracketLeft => {
                self.next_token();
                let expr = self.parse_expr()?;
                self.expect(TokenType::BracketRight, "]")?;
                Ok(expr)
            }
            // `+` is the next anonymous label, `++` the one after it
            TokenType::Plus => {
                let mut offset = 0;
                while self.current_token_is(TokenType::Plus) {
                    offset += 1;
                    self.next_token();
                }
                Ok(self.anonymous_label(offset))
            }
            // `-` is the previous anonymous label, `--` the one before it
            TokenType::Minus => {
                let mut offset = 1;
                while self.current_token_is(TokenType::Minus) {
                    offset -= 1;
                    self.next_token();
                }
                Ok(self.anonymous_label(offset))
            }
            TokenType::GreaterThan => {
                self.next_token();
                Ok(Expr::high_byte(self.parse_atom()?))
            }
            TokenType::LessThan => {
                self.next_token();
                Ok(Expr::low_byte(self.parse_atom()?))
            }
            _ => Err(ParseError::ExpectedExpression(
                self.current_token.literal_str(),
            )),
        }
    }

    /// One precedence level: operands read by `reader` joined by `operators`.
    fn parse_level(
        &mut self,
        reader: fn(&mut Self) -> Result<Expr, ParseError>,
        operators: &[(TokenType, Operator)],
    ) -> Result<Expr, ParseError> {
        let first = reader(self)?;
        let mut rest = vec![];
        while let Some(&(_, operator)) = operators
            .iter()
            .find(|(token, _)| self.current_token_is(*token))
        {
            self.next_token();
            rest.push((operator, reader(self)?));
        }
        Ok(Expr::chain(first, rest))
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(
            Self::parse_atom,
            &[
                (TokenType::Star, Operator::Multiply),
                (TokenType::Slash, Operator::Divide),
            ],
        )
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(
            Self::parse_term,
            &[
                (TokenType::Plus, Operator::Add),
                (TokenType::Minus, Operator::Subtract),
            ],
        )
    }

    /// Parses an expression.
    ///
    /// From loosest to tightest binding: `& | ^`, then `+ -`, then `* /`. Operators of one level
    /// associate to the left. Square brackets group.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(
            Self::parse_arith,
            &[
                (TokenType::Ampersand, Operator::And),
                (TokenType::Pipe, Operator::Or),
                (TokenType::Caret, Operator::Xor),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembler::{codegen::opcode::Cpu, diagnostics::Error},
        ir::Width,
    };

    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        parse_source("test.oph", source, OpcodeTable::for_cpu(Cpu::Mos6502))
    }

    fn kinds(program: &Program) -> Vec<NodeKind> {
        program
            .ir
            .leaves()
            .into_iter()
            .map(|id| program.ir[id].kind.clone())
            .collect()
    }

    fn errors(program: &Program) -> Vec<Error> {
        program
            .diagnostics
            .errors()
            .iter()
            .map(|error| error.kind.clone())
            .collect()
    }

    fn expr(source: &str) -> Result<Expr, ParseError> {
        let mut frontend = Frontend::new(OpcodeTable::for_cpu(Cpu::Mos6502));
        let mut parser = Parser::new(&mut frontend, "expr", source, Path::new(""));
        parser.parse_expr()
    }

    fn label(name: &str) -> NodeKind {
        NodeKind::Label {
            symbol: Symbol::parse(name),
            value: Expr::program_counter(),
        }
    }

    #[test]
    fn test_instruction() {
        let tests = vec![
            ("rts", Instruction::implied(Mnemonic::RTS)),
            (
                "LDA #$01",
                Instruction::resolved(Mnemonic::LDA, AddressingMode::Immediate, Expr::constant(1)),
            ),
            (
                "lda $C8",
                Instruction::pending(Mnemonic::LDA, GenericMode::Memory, Expr::constant(0xC8)),
            ),
            (
                "sta $0200,X",
                Instruction::pending(Mnemonic::STA, GenericMode::MemoryX, Expr::constant(0x200)),
            ),
            (
                "ldx table,y",
                Instruction::pending(Mnemonic::LDX, GenericMode::MemoryY, Expr::label("table")),
            ),
            (
                "jmp ($FFFC)",
                Instruction::pending(Mnemonic::JMP, GenericMode::Pointer, Expr::constant(0xFFFC)),
            ),
            (
                "lda ($D2,x)",
                Instruction::pending(Mnemonic::LDA, GenericMode::PointerX, Expr::constant(0xD2)),
            ),
            (
                "sta (ptr),y",
                Instruction::pending(Mnemonic::STA, GenericMode::PointerY, Expr::label("ptr")),
            ),
        ];

        for (input, expected) in tests {
            let program = parse(input);
            assert_eq!(errors(&program), vec![]);
            assert_eq!(kinds(&program), vec![NodeKind::Instruction(expected)]);
        }
    }

    #[test]
    fn test_expressions() -> Result<(), ParseError> {
        let tests = vec![
            ("0", Expr::constant(0)),
            ("%101 + 017", Expr::chain(
                Expr::constant(5),
                vec![(Operator::Add, Expr::constant(15))],
            )),
            ("'A", Expr::constant(65)),
            (
                "a + b * 2",
                Expr::chain(
                    Expr::label("a"),
                    vec![(
                        Operator::Add,
                        Expr::chain(Expr::label("b"), vec![(Operator::Multiply, Expr::constant(2))]),
                    )],
                ),
            ),
            (
                "[a + b] * 2",
                Expr::chain(
                    Expr::chain(Expr::label("a"), vec![(Operator::Add, Expr::label("b"))]),
                    vec![(Operator::Multiply, Expr::constant(2))],
                ),
            ),
            (
                "1 | 2 & 3 ^ 4",
                Expr::chain(
                    Expr::constant(1),
                    vec![
                        (Operator::Or, Expr::constant(2)),
                        (Operator::And, Expr::constant(3)),
                        (Operator::Xor, Expr::constant(4)),
                    ],
                ),
            ),
            (
                ">table+1",
                Expr::chain(
                    Expr::high_byte(Expr::label("table")),
                    vec![(Operator::Add, Expr::constant(1))],
                ),
            ),
            ("<^", Expr::low_byte(Expr::program_counter())),
            ("_local", Expr::symbol(Symbol::Local("local".to_owned()))),
        ];

        for (input, expected) in tests {
            assert_eq!(expr(input)?, expected, "{}", input);
        }
        Ok(())
    }

    #[test]
    fn test_labels() {
        let program = parse("start: loop: dex\n_inner: * bne -\n  jmp +\n*");
        assert_eq!(errors(&program), vec![]);
        assert_eq!(
            kinds(&program),
            vec![
                label("start"),
                label("loop"),
                NodeKind::Instruction(Instruction::implied(Mnemonic::DEX)),
                label("_inner"),
                label("*1"),
                NodeKind::Instruction(Instruction::pending(
                    Mnemonic::BNE,
                    GenericMode::Memory,
                    Expr::label("*1"),
                )),
                NodeKind::Instruction(Instruction::pending(
                    Mnemonic::JMP,
                    GenericMode::Memory,
                    Expr::label("*2"),
                )),
                label("*2"),
            ]
        );
    }

    #[test]
    fn test_data_pragmas() {
        let program = parse(
            ".org $0800\n.byte 1, \"AB\"\n.wordbe $1234\n.alias screen $0400\n.space buf 16",
        );
        assert_eq!(errors(&program), vec![]);
        assert_eq!(
            kinds(&program),
            vec![
                NodeKind::SetPc(Expr::constant(0x0800)),
                NodeKind::Data {
                    width: Width::Byte,
                    endian: crate::ir::Endian::Little,
                    values: vec![Expr::constant(1), Expr::constant(65), Expr::constant(66)],
                },
                NodeKind::Data {
                    width: Width::Word,
                    endian: crate::ir::Endian::Big,
                    values: vec![Expr::constant(0x1234)],
                },
                NodeKind::Label {
                    symbol: Symbol::parse("screen"),
                    value: Expr::constant(0x0400),
                },
                label("buf"),
                NodeKind::SetPc(Expr::chain(
                    Expr::program_counter(),
                    vec![(Operator::Add, Expr::constant(16))],
                )),
            ]
        );
    }

    #[test]
    fn test_charmap() {
        let program = parse(".charmap 'a, \"ABC\"\n.byte \"cab\"\n.charmap\n.byte \"a\"");
        assert_eq!(errors(&program), vec![]);
        let bytes: Vec<Vec<Expr>> = kinds(&program)
            .into_iter()
            .filter_map(|kind| match kind {
                NodeKind::Data { values, .. } => Some(values),
                _ => None,
            })
            .collect();
        assert_eq!(
            bytes,
            vec![
                vec![Expr::constant(67), Expr::constant(65), Expr::constant(66)],
                vec![Expr::constant(97)],
            ]
        );
    }

    #[test]
    fn test_structure_pragmas() {
        let program = parse(
            ".data\n.text code\n.scope\n.scend\n.macro inc16\n.macend\n.invoke inc16 ptr\n`inc16 1, 2",
        );
        assert_eq!(errors(&program), vec![]);
        assert_eq!(
            kinds(&program),
            vec![
                NodeKind::DataSegment("*data-default*".to_owned()),
                NodeKind::TextSegment("code".to_owned()),
                NodeKind::ScopeBegin,
                NodeKind::ScopeEnd,
                NodeKind::MacroBegin("inc16".to_owned()),
                NodeKind::MacroEnd,
                NodeKind::MacroInvoke {
                    name: "inc16".to_owned(),
                    args: vec![Expr::label("ptr")],
                },
                NodeKind::MacroInvoke {
                    name: "inc16".to_owned(),
                    args: vec![Expr::constant(1), Expr::constant(2)],
                },
            ]
        );
    }

    #[test]
    fn test_errors_skip_the_line() {
        let program = parse("lda #$zz\nfoo\n.bogus\nlda (1),x\n.byte \"open\nnop");
        assert_eq!(
            errors(&program),
            vec![
                Error::Parse(ParseError::InvalidNumber {
                    kind: "hexadecimal",
                    literal: "zz".to_owned()
                }),
                Error::Parse(ParseError::UnknownOpcode("foo".to_owned())),
                Error::Parse(ParseError::UnknownPragma("bogus".to_owned())),
                Error::Parse(ParseError::Expected {
                    expected: "y",
                    found: "x".to_owned()
                }),
                Error::Parse(ParseError::Lexer(LexerError::UnterminatedString)),
            ]
        );
        assert_eq!(
            kinds(&program),
            vec![
                NodeKind::Data {
                    width: Width::Byte,
                    endian: crate::ir::Endian::Little,
                    values: vec![
                        Expr::constant(111),
                        Expr::constant(112),
                        Expr::constant(101),
                        Expr::constant(110)
                    ],
                },
                NodeKind::Instruction(Instruction::implied(Mnemonic::NOP)),
            ]
        );
        assert_eq!(
            program.diagnostics.errors()[1].location.to_string(),
            "test.oph:2"
        );
    }

    #[test]
    fn test_failed_directive_keeps_next_line() {
        let program = parse(".charmap 'a, 300\nlda #\n.incbin \"missing.bin\"\nnext: nop");
        let errors = errors(&program);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], Error::Parse(ParseError::IllegalCharmapValue));
        assert!(matches!(
            errors[1],
            Error::Parse(ParseError::ExpectedExpression(_))
        ));
        assert!(matches!(errors[2], Error::Parse(ParseError::Io { .. })));
        assert_eq!(
            kinds(&program),
            vec![
                label("next"),
                NodeKind::Instruction(Instruction::implied(Mnemonic::NOP)),
            ]
        );
    }

    #[test]
    fn test_opcodes_depend_on_cpu() {
        let program = parse_source(
            "test.oph",
            "bra loop",
            OpcodeTable::for_cpu(Cpu::Wdc65C02),
        );
        assert_eq!(errors(&program), vec![]);
        assert_eq!(
            errors(&parse("bra loop")),
            vec![Error::Parse(ParseError::UnknownOpcode("bra".to_owned()))]
        );
    }

    #[test]
    fn test_outfile() {
        let program = parse(".outfile \"first.prg\"\n.outfile \"second.prg\"");
        assert_eq!(program.outfile, Some("first.prg".to_owned()));
    }
}
