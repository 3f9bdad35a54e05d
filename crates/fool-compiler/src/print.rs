//! Indented dump of the enriched AST

use fool_ast::{ClassDec, Declaration, Expr, ExprKind, Param, Program, Reference, SymbolEntry};

/// Render `program` one node per line, children indented by two spaces.
/// Resolved identifiers show their symbol table entry.
#[must_use]
pub fn render(program: &Program) -> String {
    let mut printer = Printer::default();
    match program {
        Program::LetIn { declarations, body } => {
            printer.line("ProgLetIn");
            printer.nested(|p| {
                for dec in declarations {
                    p.declaration(dec);
                }
                p.expr(body);
            });
        }
        Program::Expression(body) => {
            printer.line("Prog");
            printer.nested(|p| p.expr(body));
        }
    }
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn entry(&mut self, entry: Option<&SymbolEntry>) {
        match entry {
            Some(entry) => self.line(&format!(
                "STentry: nestlev {} type {} offset {}",
                entry.nesting_level, entry.ty, entry.offset
            )),
            None => self.line("STentry: unresolved"),
        }
    }

    fn params(&mut self, params: &[Param]) {
        for param in params {
            self.line(&format!("Par: {} {}", param.id, param.ty));
        }
    }

    fn declaration(&mut self, dec: &Declaration) {
        match dec {
            Declaration::Var(var) => {
                self.line(&format!("Var: {} {}", var.id, var.ty));
                self.nested(|p| p.expr(&var.value));
            }
            Declaration::Fun(fun) => {
                self.line(&format!("Fun: {} {}", fun.id, fun.arrow_type()));
                self.nested(|p| {
                    p.params(&fun.params);
                    for dec in &fun.declarations {
                        p.declaration(dec);
                    }
                    p.expr(&fun.body);
                });
            }
            Declaration::Class(class) => self.class(class),
        }
    }

    fn class(&mut self, class: &ClassDec) {
        match &class.super_id {
            Some(super_id) => self.line(&format!("Class: {} extends {super_id}", class.id)),
            None => self.line(&format!("Class: {}", class.id)),
        }
        self.nested(|p| {
            for field in &class.fields {
                p.line(&format!("Field: {} {} offset {}", field.id, field.ty, field.offset));
            }
            for method in &class.methods {
                p.line(&format!(
                    "Method: {} {} offset {}",
                    method.id,
                    method.arrow_type(),
                    method.offset
                ));
                p.nested(|p| {
                    p.params(&method.params);
                    for dec in &method.declarations {
                        p.declaration(dec);
                    }
                    p.expr(&method.body);
                });
            }
        });
    }

    fn reference(&mut self, label: &str, reference: &Reference) {
        self.line(&format!("{label}: {} at nestlev {}", reference.id, reference.nesting_level));
        self.nested(|p| p.entry(reference.entry.as_ref()));
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(n) => self.line(&format!("Int: {n}")),
            ExprKind::Bool(b) => self.line(&format!("Bool: {b}")),
            ExprKind::Null => self.line("Empty"),
            ExprKind::Binary { op, left, right } => {
                self.line(&format!("Binary: {}", op.symbol()));
                self.nested(|p| {
                    p.expr(left);
                    p.expr(right);
                });
            }
            ExprKind::Not(arg) => {
                self.line("Not");
                self.nested(|p| p.expr(arg));
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.line("If");
                self.nested(|p| {
                    p.expr(cond);
                    p.expr(then_branch);
                    p.expr(else_branch);
                });
            }
            ExprKind::Print(arg) => {
                self.line("Print");
                self.nested(|p| p.expr(arg));
            }
            ExprKind::Id(reference) => self.reference("Id", reference),
            ExprKind::Call { callee, args } => {
                self.reference("Call", callee);
                self.nested(|p| {
                    for arg in args {
                        p.expr(arg);
                    }
                });
            }
            ExprKind::MethodCall {
                object,
                method,
                method_entry,
                args,
            } => {
                self.reference("ClassCall", object);
                self.nested(|p| {
                    p.line(&format!("Method: {method}"));
                    p.nested(|p| p.entry(method_entry.as_ref()));
                    for arg in args {
                        p.expr(arg);
                    }
                });
            }
            ExprKind::New {
                class_id,
                entry,
                args,
            } => {
                self.line(&format!("New: {class_id}"));
                self.nested(|p| {
                    p.entry(entry.as_ref());
                    for arg in args {
                        p.expr(arg);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_table::SymbolTable;
    use fool_parser::Parser;

    fn enriched(source: &str) -> Program {
        let mut program = Parser::new(source).unwrap().parse().unwrap();
        SymbolTable::new().enrich(&mut program);
        program
    }

    #[test]
    fn test_render_expression() {
        let program = Parser::new("print(1 + !true);").unwrap().parse().unwrap();
        assert_eq!(
            render(&program),
            "Prog\n  Print\n    Binary: +\n      Int: 1\n      Not\n        Bool: true\n"
        );
    }

    #[test]
    fn test_render_shows_entries() {
        let program = enriched("let var x: int := 1; in x;");
        assert_eq!(
            render(&program),
            "ProgLetIn\n  Var: x int\n    Int: 1\n  Id: x at nestlev 0\n    STentry: nestlev 0 type int offset -2\n"
        );
    }

    #[test]
    fn test_render_unresolved() {
        let program = enriched("let var x: int := 1; in y;");
        assert!(render(&program).contains("Id: y at nestlev 0\n    STentry: unresolved\n"));
    }

    #[test]
    fn test_render_class() {
        let program = enriched(
            "let
               class A (v: int) { fun get: int () v; }
               var a: A := new A(1);
             in a.get();",
        );
        let text = render(&program);
        assert!(text.contains("  Class: A\n    Field: v int offset -1\n"));
        assert!(text.contains("    Method: get () -> int offset 0\n"));
        assert!(text.contains("  ClassCall: a at nestlev 0\n"));
        assert!(text.contains("      STentry: nestlev 1 type method () -> int offset 0\n"));
    }
}
