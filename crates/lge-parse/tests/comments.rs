use lge_ast::ast::Expr;
use lge_parse::parse_str;

#[test]
fn comments_and_newlines_are_ignored_by_the_grammar() {
    let src = r#"
# leading comment
let a: int = () -> 1 # inline
let b: int = (x: int) -> ( # split
  x
) * 3
# tail
"#;
    let out = parse_str("<mem>", src);
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    let f = &out.program.functions;
    assert_eq!(f.len(), 2);
    assert!(matches!(f[0].body, Expr::IntLiteral { value: 1, .. }));
    assert!(matches!(f[1].body, Expr::Binary { .. }));
}

#[test]
fn backslash_continuation_is_trivia() {
    let out = parse_str("<mem>", "let a: int = (x: int) -> x \\\n + 1");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    assert!(matches!(out.program.functions[0].body, Expr::Binary { .. }));
}

#[test]
fn comment_only_source_is_empty_program() {
    let out = parse_str("<mem>", "# nothing here\n# still nothing");
    assert!(out.diagnostics.is_empty());
    assert!(out.program.functions.is_empty());
}
