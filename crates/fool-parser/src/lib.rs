//! LALRPOP-based parser for FOOL
//!
//! Uses the LALRPOP parser generator fed by the logos lexer.

#![allow(unused_imports)]
#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

use fool_ast::{FoolError, Program, SourceMap, Span};
use fool_lexer::{Lexer, SpannedToken, Token};
use lalrpop_util::ParseError;

// Include the generated LALRPOP parser
lalrpop_util::lalrpop_mod!(pub fool);

/// Errors raised from grammar actions
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("'let' must introduce at least one declaration")]
    EmptyLet { offset: usize },
}

pub struct Parser {
    input: String,
    source_map: SourceMap,
    filename: String,
    tokens: Vec<SpannedToken>,
}

impl Parser {
    /// Create a new parser for the given input
    ///
    /// # Errors
    ///
    /// Returns `FoolError` if there are lexical errors in the input
    pub fn new(input: &str) -> Result<Self, FoolError> {
        Self::new_with_filename(input, "<input>")
    }

    /// Create a new parser for the given input with a filename
    ///
    /// # Errors
    ///
    /// Returns `FoolError` if there are lexical errors in the input
    pub fn new_with_filename(input: &str, filename: &str) -> Result<Self, FoolError> {
        let source_map = SourceMap::new(input);

        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize();

        // Check for lexer errors
        if let Some(token) = tokens.iter().find(|t| t.token == Token::Error) {
            return Err(FoolError::lexical(
                token.text.clone(),
                token.span,
                &source_map,
                filename,
            ));
        }

        tracing::trace!(count = tokens.len(), "tokenized {filename}");

        Ok(Self {
            input: input.to_string(),
            source_map,
            filename: filename.to_string(),
            tokens,
        })
    }

    /// Parse the input into a program AST
    ///
    /// # Errors
    ///
    /// Returns `FoolError` if there are syntax errors during parsing
    pub fn parse(&self) -> Result<Program, FoolError> {
        let lalrpop_tokens = self
            .tokens
            .iter()
            .filter(|token| token.token != Token::Eof)
            .map(|token| (token.span.start, token.token.clone(), token.span.end));

        let parser = fool::ProgramParser::new();
        parser
            .parse(&self.source_map, lalrpop_tokens)
            .map_err(|err| self.syntax_error(err))
    }

    fn syntax_error(&self, err: ParseError<usize, Token, GrammarError>) -> FoolError {
        let end = self.input.len();
        let (message, span) = match err {
            ParseError::InvalidToken { location } => {
                ("Invalid token".to_string(), Span::new(location, location))
            }
            ParseError::UnrecognizedEof { location, expected } => (
                format!("Unexpected end of input, expected {}", expected.join(", ")),
                Span::new(location.min(end), end),
            ),
            ParseError::UnrecognizedToken {
                token: (start, token, stop),
                expected,
            } => (
                format!("Unexpected {token}, expected {}", expected.join(", ")),
                Span::new(start, stop),
            ),
            ParseError::ExtraToken {
                token: (start, token, stop),
            } => (format!("Extra token {token}"), Span::new(start, stop)),
            ParseError::User { error } => {
                let GrammarError::EmptyLet { offset } = error;
                (error.to_string(), Span::new(offset, offset))
            }
        };
        FoolError::syntax(message, span, &self.source_map, &self.filename)
    }

    /// Get access to the source map for error reporting
    #[must_use]
    pub const fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Get access to the filename
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Get access to the original input
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Get access to the tokens (useful for debugging)
    #[must_use]
    pub fn tokens(&self) -> &[SpannedToken] {
        &self.tokens
    }
}
