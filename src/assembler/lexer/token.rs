use std::fmt;

use crate::ir::SourcePosition;

/// TokenType definies the types of tokens that are found in source code.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum TokenType {
    /// `$` Hex prefix including hex number
    Hex,
    /// `%` Binary prefix including binary number
    Binary,
    /// Number with a leading `0`
    Octal,
    /// Decimal number
    Decimal,
    /// `'c` Character constant
    Character,
    /// `"..."` String literal, without the quotes
    String,
    /// Mnemonic, label, pragma name or index register.
    ///
    /// Basically anything that is not a number or punctuation.
    Identifier,
    /// `#`
    Hash,
    /// `,`
    Comma,
    /// `` ` `` Macro invocation prefix
    Backtick,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `(`
    ParenLeft,
    /// `)`
    ParenRight,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `[`
    BracketLeft,
    /// `]`
    BracketRight,
    /// End of a source line
    Eol,
    /// Eof marks the end of file
    #[default]
    Eof,
}

impl TokenType {
    pub fn from_punctuation(c: char) -> Option<Self> {
        let token = match c {
            '#' => TokenType::Hash,
            ',' => TokenType::Comma,
            '`' => TokenType::Backtick,
            '<' => TokenType::LessThan,
            '>' => TokenType::GreaterThan,
            '(' => TokenType::ParenLeft,
            ')' => TokenType::ParenRight,
            ':' => TokenType::Colon,
            '.' => TokenType::Dot,
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '&' => TokenType::Ampersand,
            '|' => TokenType::Pipe,
            '^' => TokenType::Caret,
            '[' => TokenType::BracketLeft,
            ']' => TokenType::BracketRight,
            _ => return None,
        };
        Some(token)
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            TokenType::Hex
                | TokenType::Binary
                | TokenType::Octal
                | TokenType::Decimal
                | TokenType::Character
        )
    }

    /// True for the tokens that terminate a statement.
    pub fn is_line_end(&self) -> bool {
        matches!(self, TokenType::Eol | TokenType::Eof)
    }
}

/// Token is a lexical unit of source code.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Token {
    /// Type of Token
    pub token: TokenType,
    /// Literal string of token, e.g. `"lda"`, `"00"`, `":"` etc.
    pub literal: String,
    /// Where in the file the token starts
    pub position: SourcePosition,
}

impl Token {
    pub fn new(token: TokenType, literal: &str, position: SourcePosition) -> Self {
        Self {
            token,
            literal: literal.to_owned(),
            position,
        }
    }

    /// The token as it would appear in source.
    pub fn literal_str(&self) -> String {
        match self.token {
            TokenType::Hex => "$".to_string() + &self.literal,
            TokenType::Binary => "%".to_string() + &self.literal,
            TokenType::Octal => "0".to_string() + &self.literal,
            TokenType::Character => "'".to_string() + &self.literal,
            TokenType::String => format!("\"{}\"", self.literal),
            TokenType::Eol => "<eol>".to_owned(),
            TokenType::Eof => "<eof>".to_owned(),
            _ => self.literal.to_owned(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:?} '{}'",
            self.position,
            self.token,
            self.literal_str()
        )
    }
}
