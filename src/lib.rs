//! FOOL: a small object-oriented language compiled to a stack virtual machine
//!
//! The pipeline lives in the workspace crates; this crate re-exports them
//! under one roof.
//!
//! ```no_run
//! let mut out = Vec::new();
//! fool::Compiler::new().run("print(1 + 2);", "inline.fool", &mut out)?;
//! assert_eq!(out, b"3\n");
//! # Ok::<(), fool::CompileError>(())
//! ```

pub use fool_ast as ast;
pub use fool_compiler as compiler;
pub use fool_lexer as lexer;
pub use fool_parser as parser;
pub use fool_svm as svm;

pub use fool_compiler::{CompileError, Compilation, Compiler, CompilerOptions, execute};
