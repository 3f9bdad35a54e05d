//! FOOL compiler
//!
//! Runs the front end (parsing, symbol table pass, type checking) and
//! generates SVM assembly. Front-end errors are collected across passes
//! and reported together; no code is generated if there are any.

pub mod codegen;
pub mod print;
pub mod symbol_table;
pub mod type_check;
pub mod type_rels;

pub use codegen::{CodeGenerator, CodegenError};
pub use symbol_table::{Analysis, SymbolError, SymbolTable};
pub use type_check::{TypeChecker, TypeError};
pub use type_rels::TypeRels;

use fool_ast::{FoolError, Program, Type};
use fool_parser::Parser;
use fool_svm::{AsmError, Vm, VmConfig, VmError, assemble};
use std::io::Write;

/// Error found by the symbol table pass or the type checker
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] FoolError),

    #[error("{} front-end error(s)", .errors.len())]
    FrontEnd { errors: Vec<Diagnostic> },

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("generated code does not assemble: {0}")]
    Assemble(#[from] AsmError),

    #[error("runtime error: {0}")]
    Runtime(#[from] VmError),
}

/// Settings shared by code generation and execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompilerOptions {
    pub vm: VmConfig,
}

/// Output of a successful compilation
#[derive(Debug)]
pub struct Compilation {
    /// The enriched AST
    pub program: Program,
    /// Type of the main expression
    pub program_type: Type,
    pub assembly: String,
}

#[derive(Debug, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> CompilerOptions {
        self.options
    }

    /// Compile FOOL source to SVM assembly
    ///
    /// # Errors
    ///
    /// Returns `CompileError::Parse` on the first lexical or syntax error and
    /// `CompileError::FrontEnd` with every symbol and type error otherwise
    pub fn compile(&self, source: &str, filename: &str) -> Result<Compilation, CompileError> {
        let mut program = Parser::new_with_filename(source, filename)?.parse()?;
        tracing::debug!(filename, "parsed");

        let analysis = SymbolTable::new().enrich(&mut program);
        for err in &analysis.errors {
            tracing::warn!("{err}");
        }

        let mut checker = TypeChecker::new(&analysis);
        let checked = checker.check(&program);

        let mut errors: Vec<Diagnostic> =
            analysis.errors.into_iter().map(Diagnostic::from).collect();
        errors.extend(checker.errors().iter().cloned().map(Diagnostic::from));
        let program_type = match checked {
            Ok(ty) => Some(ty),
            Err(TypeError::Incomplete) if !errors.is_empty() => None,
            Err(err) => {
                tracing::warn!("{err}");
                errors.push(err.into());
                None
            }
        };

        let Some(program_type) = program_type.filter(|_| errors.is_empty()) else {
            return Err(CompileError::FrontEnd { errors });
        };
        tracing::debug!(%program_type, "front end succeeded");

        let assembly = CodeGenerator::new(self.options.vm.memory_size).generate(&program)?;
        Ok(Compilation {
            program,
            program_type,
            assembly,
        })
    }

    /// Compile and execute, writing printed values to `out`
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if compilation fails or execution faults
    pub fn run<W: Write>(
        &self,
        source: &str,
        filename: &str,
        out: &mut W,
    ) -> Result<Compilation, CompileError> {
        let compilation = self.compile(source, filename)?;
        execute(&compilation.assembly, self.options.vm, out)?;
        Ok(compilation)
    }
}

/// Assemble and run SVM assembly, returning the halted machine
///
/// # Errors
///
/// Returns `CompileError::Assemble` or `CompileError::Runtime`
pub fn execute<W: Write>(assembly: &str, config: VmConfig, out: &mut W) -> Result<Vm, CompileError> {
    let code = assemble(assembly, config.code_size)?;
    let mut vm = Vm::new(code, config)?;
    vm.run(out)?;
    tracing::debug!(steps = vm.steps(), "execution finished");
    Ok(vm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> String {
        let mut out = Vec::new();
        Compiler::new().run(source, "test.fool", &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_compile_reports_program_type() {
        let compilation = Compiler::new().compile("1 <= 2;", "test.fool").unwrap();
        assert_eq!(compilation.program_type, Type::Bool);
        assert!(compilation.assembly.ends_with("halt\n"));
    }

    #[test]
    fn test_run_prints() {
        assert_eq!(run("print(6 * 7);"), "42\n");
    }

    #[test]
    fn test_syntax_error_fails_fast() {
        let err = Compiler::new().compile("1 +;", "bad.fool").unwrap_err();
        assert!(matches!(err, CompileError::Parse(FoolError::Syntax { .. })));
        assert!(err.to_string().starts_with("bad.fool:1:"));
    }

    #[test]
    fn test_front_end_errors_are_collected() {
        let err = Compiler::new()
            .compile(
                "let
                   var a: int := true && 1;
                   var b: bool := c;
                 in d;",
                "test.fool",
            )
            .unwrap_err();

        let CompileError::FrontEnd { errors } = err else {
            panic!("Expected front-end errors");
        };
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], Diagnostic::Symbol(_)));
        assert!(matches!(errors[1], Diagnostic::Symbol(_)));
        assert_eq!(
            errors[2].to_string(),
            "Non boolean values in and at line 2"
        );
    }

    #[test]
    fn test_main_expression_type_error() {
        let err = Compiler::new().compile("if 1 then { 1 } else { 2 };", "t.fool").unwrap_err();
        let CompileError::FrontEnd { errors } = err else {
            panic!("Expected front-end errors");
        };
        assert_eq!(errors, vec![Diagnostic::Type(TypeError::Mismatch {
            message: "Non boolean condition in if".to_string(),
            line: 1
        })]);
    }

    #[test]
    fn test_runtime_error() {
        let err = Compiler::new()
            .run("print(1 / 0);", "t.fool", &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::Runtime(VmError::DivisionByZero { .. })));
    }

    #[test]
    fn test_null_method_call_is_a_runtime_error() {
        let source = "let
               class A () { fun m: int () 1; }
               var a: A := null;
             in print(a.m());";
        let err = Compiler::new().run(source, "t.fool", &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CompileError::Runtime(VmError::InvalidAddress { .. })));
    }

    #[test]
    fn test_small_memory_runs_out() {
        let options = CompilerOptions {
            vm: VmConfig {
                memory_size: 64,
                code_size: fool_svm::CODESIZE,
            },
        };
        let source = "let fun loop: int (n: int) loop(n + 1); in loop(0);";
        let err = Compiler::with_options(options)
            .run(source, "t.fool", &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::Runtime(VmError::OutOfMemory { .. })));
    }
}
