//! FOOL types and symbol-table entries.

use std::fmt;

/// Type of a FOOL expression or declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    /// Reference to an instance of the named class
    Ref(String),
    /// Type of `null`
    Empty,
    /// Function type
    Arrow(ArrowType),
    /// Method type, only found in class virtual tables
    Method(ArrowType),
    /// Type of a class identifier
    Class(ClassType),
}

/// `(T1, ..., Tn) -> T`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrowType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

impl ArrowType {
    #[must_use]
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self {
            params,
            ret: Box::new(ret),
        }
    }
}

/// Layout of a class, inherited members included.
///
/// `all_fields[i]` is the field stored at offset `-i - 1` from the object
/// pointer; `all_methods[j]` is the method at dispatch-table offset `j`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassType {
    pub all_fields: Vec<Type>,
    pub all_methods: Vec<ArrowType>,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::Ref(id) => write!(f, "{id}"),
            Self::Empty => write!(f, "null"),
            Self::Arrow(arrow) => write!(f, "{arrow}"),
            Self::Method(arrow) => write!(f, "method {arrow}"),
            Self::Class(class) => {
                write!(f, "class(")?;
                write_list(f, &class.all_fields)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for ArrowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_list(f, &self.params)?;
        write!(f, ") -> {}", self.ret)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

/// Symbol table entry attached to resolved identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Nesting level of the declaration
    pub nesting_level: usize,
    pub ty: Type,
    /// Offset from the frame pointer, object pointer or dispatch pointer
    pub offset: i32,
}

impl SymbolEntry {
    #[must_use]
    pub const fn new(nesting_level: usize, ty: Type, offset: i32) -> Self {
        Self {
            nesting_level,
            ty,
            offset,
        }
    }
}
