use thiserror::Error;

pub use token::{Token, TokenType};

use crate::ir::SourcePosition;

/// Lexical units of source code.
pub mod token;

// Example code:
//
//   .org $0800
// loop:
//   lda table,x      ; comments run to the end of the line
//   sta $0400,x
//   inx
//   bne loop
//   .byte "hi", 0
// table:
//   .word loop+1

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexerError {
    #[error("Unterminated string constant")]
    UnterminatedString,
    #[error("Backslashed newline")]
    BackslashedNewline,
}

/// Splits source text into tokens.
///
/// Lexing never stops: problems are recorded and collected with
/// [`take_errors`](Lexer::take_errors) while a best-effort token is still returned.
pub struct Lexer {
    chars: Vec<char>,
    position: usize,      // Current position in input (points to current char)
    read_position: usize, // Current reading position in input (after current char)
    ch: Option<char>,     // Current char under examination
    location: SourcePosition,
    errors: Vec<(SourcePosition, LexerError)>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let mut lexer = Self {
            chars: input.chars().collect(),
            position: 0,
            read_position: 0,
            ch: None,
            location: SourcePosition::default(),
            errors: vec![],
        };
        lexer.read_char();
        lexer
    }

    /// Problems found since the last call.
    pub fn take_errors(&mut self) -> Vec<(SourcePosition, LexerError)> {
        std::mem::take(&mut self.errors)
    }

    fn read_char(&mut self) {
        match self.ch {
            Some('\n') => self.location.increment_line(),
            Some(_) => self.location.increment_column(),
            None => {}
        }
        self.ch = self.chars.get(self.read_position).copied();
        self.position = self.read_position;
        self.read_position += 1;
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.read_position).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.ch, Some(ch) if ch.is_whitespace() && ch != '\n') {
            self.read_char();
        }
    }

    fn skip_comment(&mut self) {
        while matches!(self.ch, Some(ch) if ch != '\n') {
            self.read_char();
        }
    }

    fn is_word_char(ch: char) -> bool {
        !ch.is_whitespace()
            && ch != ';'
            && ch != '"'
            && (ch == '.' || TokenType::from_punctuation(ch).is_none())
    }

    /// Number, mnemonic, label or pragma name
    fn read_word(&mut self) -> String {
        let position = self.position;
        while matches!(self.ch, Some(ch) if Self::is_word_char(ch)) {
            self.read_char();
        }
        self.chars[position..self.position].iter().collect()
    }

    fn read_string(&mut self) -> String {
        let mut value = String::new();
        self.read_char(); // Opening quote
        loop {
            match self.ch {
                None | Some('\n') => {
                    self.errors
                        .push((self.location, LexerError::UnterminatedString));
                    break;
                }
                Some('"') => {
                    self.read_char();
                    break;
                }
                Some('\\') => {
                    match self.peek_char() {
                        None | Some('\n') => {
                            self.errors
                                .push((self.location, LexerError::BackslashedNewline));
                            self.read_char();
                            continue;
                        }
                        Some(escaped) => value.push(escaped),
                    }
                    self.read_char();
                    self.read_char();
                }
                Some(ch) => {
                    value.push(ch);
                    self.read_char();
                }
            }
        }
        value
    }

    fn classify(word: &str) -> (TokenType, String) {
        let mut chars = word.chars();
        let first = chars.next();
        let rest = chars.as_str().to_owned();
        match first {
            _ if word == "0" => (TokenType::Decimal, word.to_owned()),
            Some('$') => (TokenType::Hex, rest),
            Some('%') => (TokenType::Binary, rest),
            Some('0') => (TokenType::Octal, rest),
            Some(ch) if ch.is_ascii_digit() => (TokenType::Decimal, word.to_owned()),
            Some('\'') => (TokenType::Character, rest),
            _ => (TokenType::Identifier, word.to_lowercase()),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let position = self.location;
        match self.ch {
            None => Token::new(TokenType::Eof, "", position),
            Some(';') => {
                self.skip_comment();
                self.next_token()
            }
            Some('\n') => {
                self.read_char();
                Token::new(TokenType::Eol, "", position)
            }
            Some('"') => {
                let value = self.read_string();
                Token::new(TokenType::String, &value, position)
            }
            Some(ch) => match TokenType::from_punctuation(ch) {
                Some(token) => {
                    self.read_char();
                    Token::new(token, &ch.to_string(), position)
                }
                None => {
                    let word = self.read_word();
                    let (token, literal) = Self::classify(&word);
                    Token::new(token, &literal, position)
                }
            },
        }
    }
}
