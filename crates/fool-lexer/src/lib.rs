//! Lexical analysis for FOOL
//!
//! Tokenizes FOOL source using logos. Comments and whitespace are skipped.

use fool_ast::Span;
use logos::Logos;
use std::fmt;

/// FOOL tokens
#[derive(Logos, Debug, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    /// Block comment, consumed by its callback and never produced
    #[token("/*", skip_block_comment)]
    BlockComment,

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Times,

    #[token("/")]
    Div,

    #[token("==")]
    Eq,

    #[token(">=")]
    Ge,

    #[token("<=")]
    Le,

    #[token("!")]
    Not,

    #[token("&&")]
    And,

    #[token("||")]
    Or,

    // Punctuation
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    /// Assignment in variable declarations (:=)
    #[token(":=")]
    Assign,

    // Reserved words
    #[token("let")]
    Let,

    #[token("in")]
    In,

    #[token("var")]
    Var,

    #[token("fun")]
    Fun,

    #[token("class")]
    Class,

    #[token("extends")]
    Extends,

    #[token("new")]
    New,

    #[token("null")]
    Null,

    #[token("if")]
    If,

    #[token("then")]
    Then,

    #[token("else")]
    Else,

    #[token("print")]
    Print,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("int")]
    Int,

    #[token("bool")]
    Bool,

    /// Integer literal; literals that overflow i32 are lexical errors
    #[regex(r"0|[1-9][0-9]*", |lex| lex.slice().parse::<i32>().ok())]
    Num(i32),

    /// Identifier
    #[regex(r"[a-zA-Z][a-zA-Z0-9]*", |lex| lex.slice().to_string())]
    Id(String),

    /// End of input
    Eof,

    /// Lexer error
    Error,
}

/// Skips past the closing `*/`; an unterminated comment is an error
fn skip_block_comment(lex: &mut logos::Lexer<Token>) -> logos::FilterResult<(), ()> {
    if let Some(end) = lex.remainder().find("*/") {
        lex.bump(end + 2);
        logos::FilterResult::Skip
    } else {
        lex.bump(lex.remainder().len());
        logos::FilterResult::Error(())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spelling = match self {
            Self::Num(n) => return write!(f, "{n}"),
            Self::Id(id) => return write!(f, "{id}"),
            Self::Eof => return f.write_str("end of input"),
            Self::Error => return f.write_str("invalid token"),
            Self::BlockComment => "/*",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Not => "!",
            Self::And => "&&",
            Self::Or => "||",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Semicolon => ";",
            Self::Colon => ":",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Assign => ":=",
            Self::Let => "let",
            Self::In => "in",
            Self::Var => "var",
            Self::Fun => "fun",
            Self::Class => "class",
            Self::Extends => "extends",
            Self::New => "new",
            Self::Null => "null",
            Self::If => "if",
            Self::Then => "then",
            Self::Else => "else",
            Self::Print => "print",
            Self::True => "true",
            Self::False => "false",
            Self::Int => "int",
            Self::Bool => "bool",
        };
        write!(f, "\"{spelling}\"")
    }
}

/// Token with location information
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
    pub text: String,
}

/// Lexer that produces tokens with spans
pub struct Lexer<'input> {
    lexer: logos::Lexer<'input, Token>,
    input: &'input str,
}

impl<'input> Lexer<'input> {
    #[must_use]
    pub fn new(input: &'input str) -> Self {
        Self {
            lexer: Token::lexer(input),
            input,
        }
    }

    /// Get the next token with span information
    pub fn next_token(&mut self) -> SpannedToken {
        match self.lexer.next() {
            Some(result) => {
                let span = self.lexer.span();
                let text = self.input[span.clone()].to_string();
                SpannedToken {
                    token: result.unwrap_or(Token::Error),
                    span: Span::new(span.start, span.end),
                    text,
                }
            }
            None => SpannedToken {
                token: Token::Eof,
                span: Span::new(self.input.len(), self.input.len()),
                text: String::new(),
            },
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Vec<SpannedToken> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.token == Token::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
