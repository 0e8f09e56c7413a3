//! Execute generated IR with the reference interpreter.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use lge_cli::eval::{Interpreter, Value};
use lge_cli::host::Runtime;
use lge_codegen::{generate, Module};

fn build(src: &str) -> Module {
    let out = lge_parse::parse_str("<test>", src);
    assert!(!out.has_errors(), "parse failed: {:?}", out.diagnostics);
    let mut diags = Vec::new();
    let module = generate(&out.program, &mut diags);
    assert!(diags.is_empty(), "codegen failed: {:?}", diags);
    module
}

#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn interp<'m>(module: &'m Module, stdin: &str, stdout: &Captured) -> Interpreter<'m> {
    let rt = Runtime::new(
        Box::new(std::io::Cursor::new(stdin.as_bytes().to_vec())),
        Box::new(stdout.clone()),
    );
    Interpreter::with_runtime(module, rt)
}

fn call_ints(module: &Module, name: &str, args: &[i64]) -> Value {
    let out = Captured::default();
    let args: Vec<_> = args.iter().map(|n| Value::Int(*n)).collect();
    interp(module, "", &out).call(name, &args).expect("call failed")
}

#[test]
fn max_takes_else_branch_on_ties() {
    let m = build("let max: int = (a: int, b: int) -> if a > b then a else b");
    assert_eq!(call_ints(&m, "max", &[3, 5]), Value::Int(5));
    assert_eq!(call_ints(&m, "max", &[5, 3]), Value::Int(5));
    assert_eq!(call_ints(&m, "max", &[4, 4]), Value::Int(4));
}

#[test]
fn add_returns_sum() {
    let m = build("let add: int = (a: int, b: int) -> a + b");
    for (a, b) in [(0, 0), (2, 3), (-7, 4), (1000, -1000)] {
        assert_eq!(call_ints(&m, "add", &[a, b]), Value::Int(a + b));
    }
    // i32 wraps
    assert_eq!(
        call_ints(&m, "add", &[i64::from(i32::MAX), 1]),
        Value::Int(i64::from(i32::MIN))
    );
}

#[test]
fn precedence_shows_in_results() {
    let m = build("let f: int = (a: int, b: int, c: int) -> a + b * c - -a / 2");
    // 3 + 4*5 - (-3/2) = 3 + 20 - (-1) = 24
    assert_eq!(call_ints(&m, "f", &[3, 4, 5]), Value::Int(24));
}

#[test]
fn nested_conditionals_pick_the_right_arm() {
    let m = build(
        "let sign: int = (x: int) -> if x < 0 then -1 else if x == 0 then 0 else 1",
    );
    assert_eq!(call_ints(&m, "sign", &[-9]), Value::Int(-1));
    assert_eq!(call_ints(&m, "sign", &[0]), Value::Int(0));
    assert_eq!(call_ints(&m, "sign", &[9]), Value::Int(1));
}

#[test]
fn float_functions() {
    let m = build("let avg: float = (a: float, b: float) -> (a + b) / 2.0");
    let out = Captured::default();
    let v = interp(&m, "", &out)
        .call("avg", &[Value::Float(1.0), Value::Float(2.0)])
        .unwrap();
    assert_eq!(v, Value::Float(1.5));
}

#[test]
fn calls_between_functions_and_through_func_params() {
    let m = build(
        "let inc: int = (x: int) -> x + 1\n\
         let twice: int = (f: func, x: int) -> f(f(x))\n\
         let main: int = () -> twice(inc, 40)",
    );
    assert_eq!(call_ints(&m, "main", &[]), Value::Int(42));
}

#[test]
fn indirect_call_with_wrong_signature_is_an_error() {
    let m = build(
        "let half: float = (x: float) -> x / 2.0\n\
         let apply: int = (f: func, x: float) -> f(x)\n\
         let main: int = () -> apply(half, 1.0)",
    );
    let out = Captured::default();
    let err = interp(&m, "", &out).call("main", &[]).unwrap_err();
    assert!(format!("{err:#}").contains("indirect call to half"), "{err:#}");
}

#[test]
fn division_by_zero_is_reported() {
    let m = build("let f: int = (a: int) -> 10 / a");
    let out = Captured::default();
    let err = interp(&m, "", &out).call("f", &[Value::Int(0)]).unwrap_err();
    assert!(format!("{err:#}").contains("division by zero"));
}

#[test]
fn string_primitives_write_to_stdout() {
    let m = build(
        "let greet: int = (name: str) -> str_print(\"hi \") + str_print(name) + str_len(name)",
    );
    let out = Captured::default();
    let mut it = interp(&m, "", &out);
    let name = it.parse_arg(lge_ast::ast::TypeKind::Str, "bob").unwrap();
    assert_eq!(it.call("greet", &[name]).unwrap(), Value::Int(3));
    assert_eq!(out.0.borrow().as_slice(), b"hi bob");
}

#[test]
fn scratch_buffer_is_shared_between_results() {
    // both conversions land in the same buffer before the compare runs
    let m = build("let same: int = (a: int, b: int) -> str_cmp(int_to_str(a), int_to_str(b))");
    assert_eq!(call_ints(&m, "same", &[1, 2]), Value::Int(1));
}

#[test]
fn echo_reads_stdin() {
    let m = build("let echo: int = () -> str_print(str_read(100))");
    let out = Captured::default();
    let v = interp(&m, "typed line\nrest", &out).call("echo", &[]).unwrap();
    assert_eq!(v, Value::Int(0));
    assert_eq!(out.0.borrow().as_slice(), b"typed line");
}

#[test]
fn char_results_render_as_chars() {
    let m = build("let first: char = (s: str) -> str_at(s, 0)");
    let out = Captured::default();
    let mut it = interp(&m, "", &out);
    let s = it.parse_arg(lge_ast::ast::TypeKind::Str, "xyz").unwrap();
    let v = it.call("first", &[s]).unwrap();
    assert_eq!(v, Value::Int(i64::from(b'x')));
    assert_eq!(it.render(&v, lge_ast::ast::TypeKind::Char), "'x'");
}

#[test]
fn string_results_render_quoted() {
    let m = build("let show: str = (n: int) -> int_to_str(n * 2)");
    let out = Captured::default();
    let mut it = interp(&m, "", &out);
    let v = it.call("show", &[Value::Int(21)]).unwrap();
    assert_eq!(it.render(&v, lge_ast::ast::TypeKind::Str), "\"42\"");
}
