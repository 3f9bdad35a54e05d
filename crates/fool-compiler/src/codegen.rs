//! Code generation for the stack virtual machine
//!
//! Produces assembly text for a fully resolved and type-checked program.
//! Function and method bodies are collected as they are generated and
//! appended after the final `halt`.

use fool_ast::{BinaryOp, ClassDec, Declaration, Expr, ExprKind, Program, Reference, SymbolEntry, Type};
use std::collections::HashMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("identifier {id} at line {line} was never resolved")]
    Unresolved { id: String, line: usize },

    #[error("class {id} has no dispatch table")]
    MissingDispatchTable { id: String },
}

type Code = Vec<String>;

fn emit(code: &mut Code, lines: &[&str]) {
    code.extend(lines.iter().map(ToString::to_string));
}

fn unresolved(reference: &Reference, line: usize) -> CodegenError {
    CodegenError::Unresolved {
        id: reference.id.clone(),
        line,
    }
}

pub struct CodeGenerator {
    /// Address one past the top of memory, where the global frame starts
    memory_size: usize,
    labels: usize,
    functions: usize,
    function_code: Code,
    /// Method labels of every class generated so far, by dispatch offset
    dispatch_tables: HashMap<String, Vec<String>>,
}

impl CodeGenerator {
    #[must_use]
    pub fn new(memory_size: usize) -> Self {
        Self {
            memory_size,
            labels: 0,
            functions: 0,
            function_code: Vec::new(),
            dispatch_tables: HashMap::new(),
        }
    }

    /// Generate assembly for `program`, one instruction or label per line
    ///
    /// # Errors
    ///
    /// Returns `CodegenError` if the program still contains unresolved
    /// identifiers
    pub fn generate(mut self, program: &Program) -> Result<String, CodegenError> {
        let mut code = Code::new();
        match program {
            Program::LetIn { declarations, body } => {
                emit(&mut code, &["push 0"]);
                for dec in declarations {
                    self.declaration(dec, &mut code)?;
                }
                self.expr(body, &mut code)?;
            }
            Program::Expression(body) => self.expr(body, &mut code)?,
        }
        emit(&mut code, &["halt"]);
        code.append(&mut self.function_code);

        tracing::debug!(
            lines = code.len(),
            functions = self.functions,
            "generated code"
        );
        let mut text = code.join("\n");
        text.push('\n');
        Ok(text)
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("label{}", self.labels);
        self.labels += 1;
        label
    }

    fn fresh_function_label(&mut self) -> String {
        let label = format!("function{}", self.functions);
        self.functions += 1;
        label
    }

    fn declaration(&mut self, dec: &Declaration, code: &mut Code) -> Result<(), CodegenError> {
        match dec {
            Declaration::Var(var) => self.expr(&var.value, code),
            Declaration::Fun(fun) => {
                let label = self.routine(fun.params.len(), &fun.declarations, &fun.body)?;
                code.push(format!("push {label}"));
                Ok(())
            }
            Declaration::Class(class) => self.class(class, code),
        }
    }

    /// Emits the body of a function or method; returns its entry label
    fn routine(
        &mut self,
        params: usize,
        declarations: &[Declaration],
        body: &Expr,
    ) -> Result<String, CodegenError> {
        let label = self.fresh_function_label();
        let mut code = vec![format!("{label}:")];
        emit(&mut code, &["cfp", "lra"]);
        for dec in declarations {
            self.declaration(dec, &mut code)?;
        }
        self.expr(body, &mut code)?;
        emit(&mut code, &["stm"]);
        code.extend(std::iter::repeat_n("pop".to_string(), declarations.len()));
        // return address, then access link
        emit(&mut code, &["sra", "pop"]);
        code.extend(std::iter::repeat_n("pop".to_string(), params));
        emit(&mut code, &["sfp", "ltm", "lra", "js"]);

        self.function_code.append(&mut code);
        Ok(label)
    }

    fn class(&mut self, class: &ClassDec, code: &mut Code) -> Result<(), CodegenError> {
        tracing::trace!(id = %class.id, "class");
        let mut table = match &class.super_id {
            Some(super_id) => self
                .dispatch_tables
                .get(super_id)
                .cloned()
                .ok_or_else(|| CodegenError::MissingDispatchTable {
                    id: super_id.clone(),
                })?,
            None => Vec::new(),
        };

        for method in &class.methods {
            let label = self.routine(method.params.len(), &method.declarations, &method.body)?;
            match usize::try_from(method.offset)
                .ok()
                .and_then(|position| table.get_mut(position))
            {
                Some(slot) => *slot = label,
                None => table.push(label),
            }
        }

        // The class value is the address of its dispatch table
        emit(code, &["lhp"]);
        for label in &table {
            code.push(format!("push {label}"));
            emit(code, &["lhp", "sw", "lhp", "push 1", "add", "shp"]);
        }
        self.dispatch_tables.insert(class.id.clone(), table);
        Ok(())
    }

    /// `lfp` followed by enough `lw` to reach the frame declaring `entry`
    fn frame_of(code: &mut Code, reference: &Reference, entry: &SymbolEntry) {
        emit(code, &["lfp"]);
        let hops = reference.nesting_level.saturating_sub(entry.nesting_level);
        code.extend(std::iter::repeat_n("lw".to_string(), hops));
    }

    fn expr(&mut self, expr: &Expr, code: &mut Code) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::Int(n) => code.push(format!("push {n}")),
            ExprKind::Bool(b) => code.push(format!("push {}", i32::from(*b))),
            ExprKind::Null => emit(code, &["push -1"]),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, code)?,
            ExprKind::Not(arg) => {
                let is_true = self.fresh_label();
                let end = self.fresh_label();
                self.expr(arg, code)?;
                emit(code, &["push 1"]);
                code.push(format!("beq {is_true}"));
                emit(code, &["push 1"]);
                code.push(format!("b {end}"));
                code.push(format!("{is_true}:"));
                emit(code, &["push 0"]);
                code.push(format!("{end}:"));
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let then_label = self.fresh_label();
                let end = self.fresh_label();
                self.expr(cond, code)?;
                emit(code, &["push 1"]);
                code.push(format!("beq {then_label}"));
                self.expr(else_branch, code)?;
                code.push(format!("b {end}"));
                code.push(format!("{then_label}:"));
                self.expr(then_branch, code)?;
                code.push(format!("{end}:"));
            }
            ExprKind::Print(arg) => {
                self.expr(arg, code)?;
                emit(code, &["print"]);
            }
            ExprKind::Id(reference) => {
                let entry = reference
                    .entry
                    .as_ref()
                    .ok_or_else(|| unresolved(reference, expr.line))?;
                Self::frame_of(code, reference, entry);
                code.push(format!("push {}", entry.offset));
                emit(code, &["add", "lw"]);
            }
            ExprKind::Call { callee, args } => {
                let entry = callee
                    .entry
                    .as_ref()
                    .ok_or_else(|| unresolved(callee, expr.line))?;
                emit(code, &["lfp"]);
                for arg in args.iter().rev() {
                    self.expr(arg, code)?;
                }
                Self::frame_of(code, callee, entry);
                emit(code, &["stm", "ltm", "ltm"]);
                if matches!(entry.ty, Type::Method(_)) {
                    // the access link is the object pointer, which points at the dispatch table
                    emit(code, &["lw"]);
                }
                code.push(format!("push {}", entry.offset));
                emit(code, &["add", "lw", "js"]);
            }
            ExprKind::MethodCall {
                object,
                method_entry,
                args,
                ..
            } => {
                let object_entry = object
                    .entry
                    .as_ref()
                    .ok_or_else(|| unresolved(object, expr.line))?;
                let method_entry = method_entry
                    .as_ref()
                    .ok_or_else(|| unresolved(object, expr.line))?;
                emit(code, &["lfp"]);
                for arg in args.iter().rev() {
                    self.expr(arg, code)?;
                }
                Self::frame_of(code, object, object_entry);
                code.push(format!("push {}", object_entry.offset));
                emit(code, &["add", "lw", "stm", "ltm", "ltm", "lw"]);
                code.push(format!("push {}", method_entry.offset));
                emit(code, &["add", "lw", "js"]);
            }
            ExprKind::New {
                class_id,
                entry,
                args,
            } => {
                let entry = entry.as_ref().ok_or_else(|| CodegenError::Unresolved {
                    id: class_id.clone(),
                    line: expr.line,
                })?;
                for arg in args {
                    self.expr(arg, code)?;
                }
                // last argument ends up lowest, so field i sits at object pointer - i
                for _ in args {
                    emit(code, &["lhp", "sw", "lhp", "push 1", "add", "shp"]);
                }
                code.push(format!("push {}", self.memory_size));
                code.push(format!("push {}", entry.offset));
                emit(
                    code,
                    &["add", "lw", "lhp", "sw", "lhp", "lhp", "push 1", "add", "shp"],
                );
            }
        }
        Ok(())
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        code: &mut Code,
    ) -> Result<(), CodegenError> {
        match op {
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Times | BinaryOp::Div => {
                self.expr(left, code)?;
                self.expr(right, code)?;
                let instruction = match op {
                    BinaryOp::Plus => "add",
                    BinaryOp::Minus => "sub",
                    BinaryOp::Times => "mult",
                    _ => "div",
                };
                emit(code, &[instruction]);
            }
            BinaryOp::Equal | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
                let holds = self.fresh_label();
                let end = self.fresh_label();
                // x >= y is checked as y <= x
                let (first, second, branch) = match op {
                    BinaryOp::Equal => (left, right, "beq"),
                    BinaryOp::LessEqual => (left, right, "bleq"),
                    _ => (right, left, "bleq"),
                };
                self.expr(first, code)?;
                self.expr(second, code)?;
                code.push(format!("{branch} {holds}"));
                emit(code, &["push 0"]);
                code.push(format!("b {end}"));
                code.push(format!("{holds}:"));
                emit(code, &["push 1"]);
                code.push(format!("{end}:"));
            }
            BinaryOp::And | BinaryOp::Or => {
                // And stops at the first 0, Or at the first 1
                let (stop, result) = if op == BinaryOp::And {
                    ("push 0", "push 1")
                } else {
                    ("push 1", "push 0")
                };
                let short = self.fresh_label();
                let end = self.fresh_label();
                for operand in [left, right] {
                    self.expr(operand, code)?;
                    emit(code, &[stop]);
                    code.push(format!("beq {short}"));
                }
                emit(code, &[result]);
                code.push(format!("b {end}"));
                code.push(format!("{short}:"));
                emit(code, &[stop]);
                code.push(format!("{end}:"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_table::SymbolTable;
    use fool_parser::Parser;
    use fool_svm::{Vm, VmConfig, assemble};

    fn generate(source: &str) -> String {
        let mut program = Parser::new(source).unwrap().parse().unwrap();
        let analysis = SymbolTable::new().enrich(&mut program);
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        CodeGenerator::new(fool_svm::MEMSIZE)
            .generate(&program)
            .unwrap()
    }

    fn run(source: &str) -> String {
        let code = assemble(&generate(source), fool_svm::CODESIZE).unwrap();
        let mut vm = Vm::new(code, VmConfig::default()).unwrap();
        let mut out = Vec::new();
        vm.run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_simple_expression_layout() {
        assert_eq!(generate("print(1 + 2);"), "push 1\npush 2\nadd\nprint\nhalt\n");
    }

    #[test]
    fn test_let_in_reserves_return_slot() {
        let code = generate("let var x: int := 5; in print(x);");
        let lines: Vec<&str> = code.lines().collect();
        assert_eq!(
            lines,
            vec![
                "push 0", "push 5", "lfp", "push -2", "add", "lw", "print", "halt"
            ]
        );
    }

    #[test]
    fn test_function_code_follows_halt() {
        let code = generate("let fun f: int (a: int) a; in f(3);");
        let halt = code.lines().position(|line| line == "halt").unwrap();
        let entry = code.lines().position(|line| line == "function0:").unwrap();
        assert!(entry > halt);
        assert!(code.contains("push function0\n"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("print(3 >= 2);"), "1\n");
        assert_eq!(run("print(2 >= 3);"), "0\n");
        assert_eq!(run("print(2 <= 2);"), "1\n");
        assert_eq!(run("print(4 == 5);"), "0\n");
    }

    #[test]
    fn test_boolean_operators() {
        assert_eq!(run("print(true && false);"), "0\n");
        assert_eq!(run("print(true && true);"), "1\n");
        assert_eq!(run("print(false || true);"), "1\n");
        assert_eq!(run("print(false || false);"), "0\n");
        assert_eq!(run("print(!false);"), "1\n");
    }

    #[test]
    fn test_short_circuit() {
        // the right operand would divide by zero
        assert_eq!(run("print(false && 1 / 0 == 1);"), "0\n");
        assert_eq!(run("print(true || 1 / 0 == 1);"), "1\n");
    }

    #[test]
    fn test_if() {
        assert_eq!(run("print(if 1 == 1 then { 10 } else { 20 });"), "10\n");
        assert_eq!(run("print(if 1 == 2 then { 10 } else { 20 });"), "20\n");
    }

    #[test]
    fn test_recursion() {
        let source = "let
               fun fact: int (n: int)
                 if n <= 1 then { 1 } else { n * fact(n - 1) };
             in print(fact(5));";
        assert_eq!(run(source), "120\n");
    }

    #[test]
    fn test_nested_function_reads_enclosing_frames() {
        let source = "let
               var base: int := 100;
               fun outer: int (x: int)
                 let
                   var y: int := x * 2;
                   fun inner: int (z: int) base + y + z;
                 in inner(1);
             in print(outer(5));";
        assert_eq!(run(source), "111\n");
    }

    #[test]
    fn test_objects_and_dispatch() {
        let source = "let
               class Account (balance: int) {
                 fun get: int () balance;
                 fun doubled: int () get() * 2;
               }
               class Savings extends Account (balance: int, rate: int) {
                 fun get: int () balance + rate;
               }
               var a: Account := new Account(10);
               var s: Account := new Savings(10, 5);
             in print(a.doubled() + s.doubled());";
        // 20 + 30
        assert_eq!(run(source), "50\n");
    }

    #[test]
    fn test_fields_in_constructor_order() {
        let source = "let
               class Pair (first: int, second: int) {
                 fun diff: int () first - second;
               }
               var p: Pair := new Pair(9, 4);
             in print(p.diff());";
        assert_eq!(run(source), "5\n");
    }

    #[test]
    fn test_null_comparison() {
        let source = "let
               class A () {}
               var a: A := null;
             in print(a == null);";
        assert_eq!(run(source), "1\n");
    }
}
