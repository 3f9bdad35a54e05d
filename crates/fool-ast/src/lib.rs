//! Abstract Syntax Tree definitions for FOOL
//!
//! Every AST node records the source line it starts on. Identifier uses are
//! enriched in place by the symbol table pass, turning the tree into an
//! enriched AST (EAST).

pub mod types;

pub use types::{ArrowType, ClassType, SymbolEntry, Type};

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Line and column position in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Convert byte offsets to line/column positions
#[derive(Debug, Clone)]
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (pos, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(pos + 1);
            }
        }
        Self { line_starts }
    }

    #[must_use]
    pub fn position(&self, byte_offset: usize) -> Position {
        match self.line_starts.binary_search(&byte_offset) {
            Ok(line) => Position::new(line + 1, 1),
            Err(line) => {
                let line_start = self.line_starts[line - 1];
                Position::new(line, byte_offset - line_start + 1)
            }
        }
    }

    /// 1-based line containing `byte_offset`
    #[must_use]
    pub fn line(&self, byte_offset: usize) -> usize {
        self.position(byte_offset).line
    }
}

/// Top-level program
#[derive(Debug, Clone)]
pub enum Program {
    /// `let <declarations> in <body>;`
    LetIn {
        declarations: Vec<Declaration>,
        body: Expr,
    },
    /// `<body>;`
    Expression(Expr),
}

impl Program {
    #[must_use]
    pub fn body(&self) -> &Expr {
        match self {
            Self::LetIn { body, .. } | Self::Expression(body) => body,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Class(ClassDec),
    Var(VarDec),
    Fun(FunDec),
}

impl Declaration {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Class(class) => &class.id,
            Self::Var(var) => &var.id,
            Self::Fun(fun) => &fun.id,
        }
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Class(class) => class.line,
            Self::Var(var) => var.line,
            Self::Fun(fun) => fun.line,
        }
    }
}

/// `var id: ty := value;`
#[derive(Debug, Clone)]
pub struct VarDec {
    pub id: String,
    pub ty: Type,
    pub value: Expr,
    pub line: usize,
}

/// `fun id: ret (params) let declarations in body;`
#[derive(Debug, Clone)]
pub struct FunDec {
    pub id: String,
    pub ret: Type,
    pub params: Vec<Param>,
    pub declarations: Vec<Declaration>,
    pub body: Expr,
    pub line: usize,
}

impl FunDec {
    #[must_use]
    pub fn arrow_type(&self) -> ArrowType {
        ArrowType::new(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.ret.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub id: String,
    pub ty: Type,
    pub line: usize,
}

/// `class id extends super_id (fields) { methods }`
#[derive(Debug, Clone)]
pub struct ClassDec {
    pub id: String,
    pub super_id: Option<String>,
    pub fields: Vec<FieldDec>,
    pub methods: Vec<MethodDec>,
    pub line: usize,
    /// Complete layout, filled in by the symbol table pass
    pub class_type: Option<ClassType>,
    /// Entry of the superclass, filled in by the symbol table pass
    pub super_entry: Option<SymbolEntry>,
}

#[derive(Debug, Clone)]
pub struct FieldDec {
    pub id: String,
    pub ty: Type,
    pub line: usize,
    /// Offset from the object pointer (negative)
    pub offset: i32,
}

#[derive(Debug, Clone)]
pub struct MethodDec {
    pub id: String,
    pub ret: Type,
    pub params: Vec<Param>,
    pub declarations: Vec<Declaration>,
    pub body: Expr,
    pub line: usize,
    /// Dispatch-table offset
    pub offset: i32,
}

impl MethodDec {
    #[must_use]
    pub fn arrow_type(&self) -> ArrowType {
        ArrowType::new(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.ret.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

impl Expr {
    #[must_use]
    pub const fn new(kind: ExprKind, line: usize) -> Self {
        Self { kind, line }
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self, line: usize) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Div,
    Equal,
    GreaterEqual,
    LessEqual,
    And,
    Or,
}

impl BinaryOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Div => "/",
            Self::Equal => "==",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Use of an identifier, resolved by the symbol table pass
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: String,
    pub entry: Option<SymbolEntry>,
    /// Nesting level of the use site
    pub nesting_level: usize,
}

impl Reference {
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self {
            id,
            entry: None,
            nesting_level: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i32),
    Bool(bool),
    Null,
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Print(Box<Expr>),
    Id(Reference),
    Call {
        callee: Reference,
        args: Vec<Expr>,
    },
    /// `object.method(args)`
    MethodCall {
        object: Reference,
        method: String,
        method_entry: Option<SymbolEntry>,
        args: Vec<Expr>,
    },
    /// `new class_id(args)`
    New {
        class_id: String,
        entry: Option<SymbolEntry>,
        args: Vec<Expr>,
    },
}

/// Lexical and syntax errors with location information
#[derive(thiserror::Error, Debug)]
pub enum FoolError {
    #[error("{filename}:{line}:{column}: ERR_LEXICAL: invalid character {text:?}")]
    Lexical {
        text: String,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("{filename}:{line}:{column}: ERR_SYNTAX: {message}")]
    Syntax {
        message: String,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },
}

impl FoolError {
    #[must_use]
    pub fn lexical(text: String, span: Span, source_map: &SourceMap, filename: &str) -> Self {
        let pos = source_map.position(span.start);
        Self::Lexical {
            text,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub fn syntax(message: String, span: Span, source_map: &SourceMap, filename: &str) -> Self {
        let pos = source_map.position(span.start);
        Self::Syntax {
            message,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Lexical { span, .. } | Self::Syntax { span, .. } => *span,
        }
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Lexical { line, .. } | Self::Syntax { line, .. } => *line,
        }
    }
}
