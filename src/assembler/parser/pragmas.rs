use std::fs;

use super::{identity_charmap, ParseError, Parser};
use crate::{
    assembler::{
        environment::{DEFAULT_DATA_SEGMENT, DEFAULT_TEXT_SEGMENT},
        lexer::TokenType,
    },
    ir::{Endian, Expr, Location, NodeId, NodeKind, Operator, Symbol, Width},
};

impl Parser<'_> {
    pub(super) fn parse_pragma(
        &mut self,
        name: &str,
        location: &Location,
        nodes: &mut Vec<NodeId>,
    ) -> Result<(), ParseError> {
        let kind = match name {
            "outfile" => return self.parse_outfile(),
            "include" => return self.parse_include(location, nodes, false),
            "require" => return self.parse_include(location, nodes, true),
            "incbin" => self.parse_incbin()?,
            "charmap" => return self.parse_charmap(),
            "charmapbin" => return self.parse_charmapbin(),
            "invoke" => return self.parse_invoke(location, nodes),
            "org" => NodeKind::SetPc(self.parse_single()?),
            "checkpc" => NodeKind::CheckPc(self.parse_single()?),
            "advance" => {
                let target = self.parse_expr()?;
                let fill = if self.current_token_is(TokenType::Comma) {
                    self.next_token();
                    self.parse_expr()?
                } else {
                    Expr::constant(0)
                };
                self.expect_eol()?;
                NodeKind::Advance { target, fill }
            }
            "alias" => {
                let symbol = Symbol::parse(&self.expect_identifier()?);
                let value = self.parse_single()?;
                NodeKind::Label { symbol, value }
            }
            "space" => return self.parse_space(location, nodes),
            "text" => NodeKind::TextSegment(self.parse_segment_name(DEFAULT_TEXT_SEGMENT)?),
            "data" => NodeKind::DataSegment(self.parse_segment_name(DEFAULT_DATA_SEGMENT)?),
            "byte" => self.parse_data(Width::Byte, Endian::Little)?,
            "word" => self.parse_data(Width::Word, Endian::Little)?,
            "dword" => self.parse_data(Width::Dword, Endian::Little)?,
            "wordbe" => self.parse_data(Width::Word, Endian::Big)?,
            "dwordbe" => self.parse_data(Width::Dword, Endian::Big)?,
            "scope" => {
                self.expect_eol()?;
                NodeKind::ScopeBegin
            }
            "scend" => {
                self.expect_eol()?;
                NodeKind::ScopeEnd
            }
            "macro" => {
                let name = self.expect_identifier()?;
                self.expect_eol()?;
                NodeKind::MacroBegin(name)
            }
            "macend" => {
                self.expect_eol()?;
                NodeKind::MacroEnd
            }
            _ => return Err(ParseError::UnknownPragma(name.to_owned())),
        };
        self.push(nodes, location, kind);
        Ok(())
    }

    /// An expression alone on the rest of the line.
    fn parse_single(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.expect_eol()?;
        Ok(expr)
    }

    /// Comma separated expressions and strings up to the end of the line.
    ///
    /// Strings become one value per byte, passed through the character map when `translate` is
    /// set.
    fn parse_values(&mut self, translate: bool) -> Result<Vec<Expr>, ParseError> {
        let mut values = vec![];
        loop {
            if self.current_token_is(TokenType::String) {
                let charmap = &self.frontend.charmap;
                values.extend(self.current_token.literal.bytes().map(|byte| {
                    let byte = if translate {
                        charmap[byte as usize]
                    } else {
                        byte
                    };
                    Expr::constant(byte as i64)
                }));
                self.next_token();
            } else {
                values.push(self.parse_expr()?);
            }

            if !self.current_token_is(TokenType::Comma) {
                break;
            }
            self.next_token();
        }
        self.expect_eol()?;
        Ok(values)
    }

    fn parse_data(&mut self, width: Width, endian: Endian) -> Result<NodeKind, ParseError> {
        Ok(NodeKind::Data {
            width,
            endian,
            values: self.parse_values(true)?,
        })
    }

    pub(super) fn parse_invoke(
        &mut self,
        location: &Location,
        nodes: &mut Vec<NodeId>,
    ) -> Result<(), ParseError> {
        let name = self.expect_identifier()?;
        let args = if self.current_token.token.is_line_end() {
            self.expect_eol()?;
            vec![]
        } else {
            self.parse_values(true)?
        };
        self.push(nodes, location, NodeKind::MacroInvoke { name, args });
        Ok(())
    }

    fn parse_segment_name(&mut self, default: &str) -> Result<String, ParseError> {
        let name = if self.current_token_is(TokenType::Identifier) {
            self.expect_identifier()?
        } else {
            default.to_owned()
        };
        self.expect_eol()?;
        Ok(name)
    }

    /// `.space name size` reserves `size` bytes at the current address.
    fn parse_space(&mut self, location: &Location, nodes: &mut Vec<NodeId>) -> Result<(), ParseError> {
        let symbol = Symbol::parse(&self.expect_identifier()?);
        if !self.current_token.token.is_number() {
            return Err(self.unexpected("number"));
        }
        let size = Self::parse_number(&self.current_token)?;
        self.next_token();
        self.expect_eol()?;

        self.push(
            nodes,
            location,
            NodeKind::Label {
                symbol,
                value: Expr::program_counter(),
            },
        );
        self.push(
            nodes,
            location,
            NodeKind::SetPc(Expr::chain(
                Expr::program_counter(),
                vec![(Operator::Add, Expr::constant(size))],
            )),
        );
        Ok(())
    }

    fn parse_outfile(&mut self) -> Result<(), ParseError> {
        let filename = self.expect_string()?;
        self.expect_eol()?;
        match &self.frontend.outfile {
            Some(existing) => tracing::warn!("Ignoring .outfile {}, already {}", filename, existing),
            None => self.frontend.outfile = Some(filename),
        }
        Ok(())
    }

    fn parse_include(
        &mut self,
        location: &Location,
        nodes: &mut Vec<NodeId>,
        once: bool,
    ) -> Result<(), ParseError> {
        let filename = self.expect_string()?;
        self.expect_eol()?;
        if let Some(id) = self
            .frontend
            .load(location, &self.directory, &filename, once)
        {
            nodes.push(id);
        }
        Ok(())
    }

    /// `.incbin "file"[, offset[, length]]`
    ///
    /// Constant bounds are checked here and the slice becomes plain byte data. Otherwise the
    /// whole file is kept and sliced once the bounds can be evaluated.
    fn parse_incbin(&mut self) -> Result<NodeKind, ParseError> {
        let filename = self.expect_string()?;
        let mut offset = Expr::constant(0);
        let mut length = None;
        if self.current_token_is(TokenType::Comma) {
            self.next_token();
            offset = self.parse_expr()?;
            if self.current_token_is(TokenType::Comma) {
                self.next_token();
                length = Some(self.parse_expr()?);
            }
        }
        self.expect_eol()?;

        let path = self.directory.join(&filename);
        tracing::info!("Including binary {}", path.display());
        let bytes = fs::read(&path).map_err(|error| ParseError::io(&path, error))?;

        let constant_length = length.as_ref().map_or(true, Expr::is_hardcoded);
        if offset.is_hardcoded() && constant_length {
            let start = usize::try_from(Self::constant(&offset)?)
                .map_err(|_| ParseError::NegativeOffset)?;
            if start > bytes.len() {
                return Err(ParseError::OffsetPastEnd);
            }
            let end = match &length {
                Some(length) => {
                    let length = usize::try_from(Self::constant(length)?)
                        .map_err(|_| ParseError::NegativeLength)?;
                    start
                        .checked_add(length)
                        .filter(|&end| end <= bytes.len())
                        .ok_or(ParseError::LengthTooLong)?
                }
                None => bytes.len(),
            };
            let values = bytes[start..end]
                .iter()
                .map(|&byte| Expr::constant(byte as i64))
                .collect();
            return Ok(NodeKind::Data {
                width: Width::Byte,
                endian: Endian::Little,
                values,
            });
        }

        let length = length.unwrap_or_else(|| {
            Expr::chain(
                Expr::constant(bytes.len() as i64),
                vec![(Operator::Subtract, offset.clone())],
            )
        });
        Ok(NodeKind::ByteRange {
            offset,
            length,
            bytes,
        })
    }

    /// `.charmap` resets the character map. `.charmap base, values...` replaces the entries
    /// starting at `base`. The replacement string itself is not translated.
    fn parse_charmap(&mut self) -> Result<(), ParseError> {
        if self.current_token.token.is_line_end() {
            self.expect_eol()?;
            self.frontend.charmap = identity_charmap();
            return Ok(());
        }

        let values = self
            .parse_values(false)?
            .iter()
            .map(Self::constant)
            .collect::<Result<Vec<i64>, ParseError>>()?;
        let Some((&base, replacements)) = values.split_first() else {
            return Err(ParseError::CharmapOutOfRange);
        };
        if replacements.iter().any(|value| !(0..=255).contains(value)) {
            return Err(ParseError::IllegalCharmapValue);
        }
        if base < 0 || base as usize + replacements.len() > 256 {
            return Err(ParseError::CharmapOutOfRange);
        }
        for (entry, &value) in self.frontend.charmap[base as usize..]
            .iter_mut()
            .zip(replacements)
        {
            *entry = value as u8;
        }
        Ok(())
    }

    fn parse_charmapbin(&mut self) -> Result<(), ParseError> {
        let filename = self.expect_string()?;
        self.expect_eol()?;
        let path = self.directory.join(&filename);
        let bytes = fs::read(&path).map_err(|error| ParseError::io(&path, error))?;
        if bytes.len() != 256 {
            return Err(ParseError::CharmapSize(path.display().to_string()));
        }
        self.frontend.charmap = bytes;
        Ok(())
    }
}
