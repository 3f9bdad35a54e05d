//! Error reporting across the front end and the virtual machine

use fool::ast::FoolError;
use fool::compiler::{Diagnostic, SymbolError, TypeError};
use fool::svm::VmError;
use fool::{CompileError, Compiler};

fn front_end_errors(source: &str) -> Vec<String> {
    match Compiler::new().compile(source, "bad.fool") {
        Err(CompileError::FrontEnd { errors }) => errors.iter().map(ToString::to_string).collect(),
        other => panic!("Expected front-end errors, got {other:?}"),
    }
}

#[test]
fn test_lexical_error_reports_position() {
    let err = Compiler::new().compile("let\n  var x: int := 1 $ 2;\nin x;", "lex.fool").unwrap_err();
    let CompileError::Parse(FoolError::Lexical { line, column, .. }) = &err else {
        panic!("Expected lexical error, got {err:?}");
    };
    assert_eq!((*line, *column), (2, 19));
    assert!(err.to_string().starts_with("lex.fool:2:19: ERR_LEXICAL"));
}

#[test]
fn test_empty_let_is_a_syntax_error() {
    let err = Compiler::new().compile("let in 1;", "empty.fool").unwrap_err();
    assert!(matches!(err, CompileError::Parse(FoolError::Syntax { .. })));
}

#[test]
fn test_all_symbol_errors_reported() {
    let errors = front_end_errors(
        "let
           var x: int := 1;
           var x: int := 2;
           fun f: int () g();
         in h;",
    );
    assert_eq!(
        errors,
        vec![
            "Var id x at line 3 already declared",
            "Fun id g at line 4 not declared",
            "Var or Par id h at line 5 not declared",
        ]
    );
}

#[test]
fn test_symbol_and_type_errors_together() {
    let result = Compiler::new().compile(
        "let
           class A () {}
           class A () {}
           var b: bool := 1;
         in 0;",
        "bad.fool",
    );
    let Err(CompileError::FrontEnd { errors }) = result else {
        panic!("Expected front-end errors");
    };
    assert_eq!(
        errors,
        vec![
            Diagnostic::Symbol(SymbolError::AlreadyDeclared {
                kind: "Class",
                id: "A".to_string(),
                line: 3
            }),
            Diagnostic::Type(TypeError::Mismatch {
                message: "Incompatible value for variable b".to_string(),
                line: 4
            }),
        ]
    );
}

#[test]
fn test_methods_are_type_checked_in_subclasses() {
    let errors = front_end_errors(
        "let
           class A () { fun m: int () 1; }
           class B extends A () { fun n: bool () 5; }
         in 0;",
    );
    assert_eq!(errors, vec!["Wrong return type for method n at line 3"]);
}

#[test]
fn test_superclass_not_assignable_to_subclass() {
    let errors = front_end_errors(
        "let
           class A () {}
           class B extends A () {}
           var b: B := new A();
         in 0;",
    );
    assert_eq!(errors, vec!["Incompatible value for variable b at line 4"]);
}

#[test]
fn test_unrelated_branches() {
    let errors = front_end_errors(
        "let
           class A () {}
           class B () {}
         in if true then { new A() } else { new B() };",
    );
    assert_eq!(errors, vec!["Incompatible types in then-else branches at line 4"]);
}

#[test]
fn test_division_by_zero_at_runtime() {
    let err = Compiler::new()
        .run("print(5 / (2 - 2));", "div.fool", &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, CompileError::Runtime(VmError::DivisionByZero { .. })));
}

#[test]
fn test_infinite_recursion_runs_out_of_memory() {
    let err = Compiler::new()
        .run(
            "let fun f: int (n: int) f(n); in f(1);",
            "loop.fool",
            &mut Vec::new(),
        )
        .unwrap_err();
    assert!(matches!(err, CompileError::Runtime(VmError::OutOfMemory { .. })));
}
