use lge_ast::ast::{Expr, FunctionDef};
use lge_parse::parse_str;

fn body(src: &str) -> Expr {
    let out = parse_str("<mem>", &format!("let x: int = (f: func) -> {src}"));
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    out.program.functions[0].body.clone()
}

#[test]
fn call_binds_tighter_than_infix() {
    // (f(1)) + 2
    match body("f(1) + 2") {
        Expr::Binary { lhs, .. } => assert!(matches!(*lhs, Expr::Call { .. })),
        other => panic!("lhs should be a call, got {other:?}"),
    }
    // f((1 + 2))
    match body("f(1 + 2)") {
        Expr::Call { args, .. } => assert!(matches!(args[0], Expr::Binary { .. })),
        other => panic!("should be a call, got {other:?}"),
    }
}

#[test]
fn nested_calls() {
    match body("f(g(1), h(2, 3))") {
        Expr::Call { callee, args, .. } => {
            assert_eq!(callee, "f");
            assert!(matches!(&args[0], Expr::Call { callee, .. } if callee == "g"));
            assert!(matches!(&args[1], Expr::Call { args, .. } if args.len() == 2));
        }
        other => panic!("expected top-level call, got {other:?}"),
    }
}

#[test]
fn empty_argument_list() {
    assert!(matches!(body("f()"), Expr::Call { args, .. } if args.is_empty()));
}

#[test]
fn arguments_are_full_expressions() {
    match body("f(if a then 1 else 2, 3)") {
        Expr::Call { args, .. } => {
            assert!(matches!(args[0], Expr::Conditional { .. }));
            assert!(matches!(args[1], Expr::IntLiteral { value: 3, .. }));
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn bare_identifier_is_not_a_call() {
    assert!(matches!(body("f"), Expr::Identifier { name, .. } if name == "f"));
}

#[test]
fn parameters_are_ordered() {
    let out = parse_str("<mem>", "let g: float = (a: int, b: float, c: str, d: char, e: func) -> b");
    let FunctionDef { params, .. } = &out.program.functions[0];
    let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c", "d", "e"]);
}
