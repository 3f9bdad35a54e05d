//! Whole programs compiled and executed on the virtual machine

use fool::ast::Type;
use fool::svm::VmConfig;
use fool::{Compiler, CompilerOptions};

fn run(source: &str) -> String {
    let mut out = Vec::new();
    Compiler::new()
        .run(source, "program.fool", &mut out)
        .unwrap_or_else(|err| panic!("{err}"));
    String::from_utf8(out).unwrap()
}

#[test]
fn test_print_returns_its_argument() {
    assert_eq!(run("print(print(3) + 1);"), "3\n4\n");
}

#[test]
fn test_booleans_print_as_integers() {
    assert_eq!(run("print(true);"), "1\n");
    assert_eq!(run("print(!(2 >= 3) && (1 == 1 || false));"), "1\n");
}

#[test]
fn test_integer_arithmetic() {
    assert_eq!(run("print(7 / 2 - -3 * 2);"), "9\n");
    assert_eq!(run("print(10 - 3 - 2);"), "5\n");
}

#[test]
fn test_globals_and_functions() {
    let source = "let
           var base: int := 3;
           fun scale: int (x: int, factor: int) x * factor + base;
           var result: int := scale(4, 5);
         in print(result);";
    assert_eq!(run(source), "23\n");
}

#[test]
fn test_function_locals() {
    let source = "let
           fun hyp2: int (a: int, b: int)
             let
               var a2: int := a * a;
               var b2: int := b * b;
             in a2 + b2;
         in print(hyp2(3, 4));";
    assert_eq!(run(source), "25\n");
}

#[test]
fn test_deep_static_chain() {
    let source = "let
           var g: int := 1;
           fun a: int (x: int)
             let
               fun b: int (y: int)
                 let
                   fun c: int (z: int) g + x + y + z;
                 in c(100);
             in b(10);
         in print(a(1000));";
    assert_eq!(run(source), "1111\n");
}

#[test]
fn test_recursive_gcd() {
    let source = "let
           fun mod: int (a: int, b: int) a - (a / b) * b;
           fun gcd: int (a: int, b: int)
             if b == 0 then { a } else { gcd(b, mod(a, b)) };
         in print(gcd(84, 36));";
    assert_eq!(run(source), "12\n");
}

#[test]
fn test_linked_list() {
    let source = "let
           class List (f: int, r: List) {
             fun first: int () f;
             fun rest: List () r;
           }
           fun sum: int (l: List)
             if l == null then { 0 } else { l.first() + sum(l.rest()) };
           fun length: int (l: List)
             if l == null then { 0 } else { 1 + length(l.rest()) };
           var l: List := new List(1, new List(2, new List(3, null)));
         in print(sum(l) * 10 + length(l));";
    assert_eq!(run(source), "63\n");
}

#[test]
fn test_dynamic_dispatch_through_superclass() {
    let source = "let
           class Shape (side: int) {
             fun area: int () side * side;
             fun describe: int () area() + 1000;
           }
           class Rect extends Shape (side: int, other: int) {
             fun area: int () side * other;
           }
           fun report: int (s: Shape) print(s.describe());
           var square: Shape := new Shape(3);
           var rect: Shape := new Rect(3, 5);
         in report(square) + report(rect);";
    assert_eq!(run(source), "1009\n1015\n");
}

#[test]
fn test_method_locals_and_fields() {
    let source = "let
           class Counter (start: int, step: int) {
             fun after: int (n: int)
               let
                 var total: int := n * step;
               in start + total;
           }
           var c: Counter := new Counter(10, 3);
         in print(c.after(4));";
    assert_eq!(run(source), "22\n");
}

#[test]
fn test_objects_held_in_fields() {
    let source = "let
           class Box (v: int) { fun get: int () v; }
           class Holder (b: Box) { fun unwrap: int () b.get(); }
           var h: Holder := new Holder(new Box(41));
         in print(h.unwrap() + 1);";
    assert_eq!(run(source), "42\n");
}

#[test]
fn test_if_joins_subclasses() {
    let source = "let
           class A () { fun id: int () 1; }
           class B extends A () { fun id: int () 2; }
           class C extends A () { fun id: int () 3; }
           fun pick: A (b: bool) if b then { new B() } else { new C() };
           var x: A := pick(false);
         in print(x.id());";
    assert_eq!(run(source), "3\n");
}

#[test]
fn test_program_type() {
    let compilation = Compiler::new()
        .compile("let class A () {} in new A();", "program.fool")
        .unwrap();
    assert_eq!(compilation.program_type, Type::Ref("A".to_string()));
}

#[test]
fn test_custom_memory_size() {
    let options = CompilerOptions {
        vm: VmConfig {
            memory_size: 500,
            ..VmConfig::default()
        },
    };
    let source = "let
           class P (x: int) { fun get: int () x; }
           var p: P := new P(8);
         in print(p.get());";
    let mut out = Vec::new();
    Compiler::with_options(options)
        .run(source, "program.fool", &mut out)
        .unwrap();
    assert_eq!(out, b"8\n");
}
