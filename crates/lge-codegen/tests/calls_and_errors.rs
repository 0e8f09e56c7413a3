use lge_codegen::ir::{Callee, InstKind, IrType};
use lge_codegen::{generate, CodegenError, Diagnostic, Module};
use lge_parse::parse_str;
use pretty_assertions::assert_eq;

fn compile(src: &str) -> (Module, Vec<Diagnostic>) {
    let out = parse_str("t.lge", src);
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    let mut diags = Vec::new();
    let module = generate(&out.program, &mut diags);
    (module, diags)
}

fn user_functions(m: &Module) -> Vec<&str> {
    m.functions
        .iter()
        .filter(|f| !f.is_declaration())
        .map(|f| f.name.as_str())
        .collect()
}

fn codegen_error(d: &Diagnostic) -> &CodegenError {
    match d {
        Diagnostic::Codegen(e) => e,
        other => panic!("expected a codegen error, got {other}"),
    }
}

#[test]
fn empty_program_has_only_runtime_declarations() {
    let (m, diags) = compile("# nothing here\n");
    assert!(diags.is_empty());
    assert!(user_functions(&m).is_empty());
    assert!(m.globals.is_empty());
    assert_eq!(m.source_filename, "LGE Module");
    assert!(m.to_string().contains("source_filename = \"LGE Module\""));
}

#[test]
fn call_to_earlier_function_is_direct() {
    let (m, diags) = compile(
        "let sq: int = (x: int) -> x * x\nlet f: int = (y: int) -> sq(y) + 1",
    );
    assert!(diags.is_empty(), "{diags:?}");
    let f = m.get_function("f").unwrap();
    let sq = m.function_id("sq").unwrap();
    assert!(f.insts.iter().any(|i| matches!(
        &i.kind,
        InstKind::Call { callee: Callee::Direct(id), .. } if *id == sq
    )));
    assert!(m.to_string().contains("%calltmp = call i32 @sq(i32 %y)"));
}

#[test]
fn forward_reference_is_undefined() {
    let (m, diags) = compile("let f: int = () -> g()\nlet g: int = () -> 1");
    assert_eq!(user_functions(&m), ["g"]);
    assert_eq!(diags.len(), 1);
    let e = codegen_error(&diags[0]);
    assert!(matches!(e, CodegenError::UndefinedFunction { name, .. } if name == "g"));
    assert_eq!(
        e.to_string(),
        "Code generation error at t.lge:1:20: Undefined function: g"
    );
}

#[test]
fn self_reference_is_undefined() {
    let (m, diags) = compile("let loop: int = (n: int) -> loop(n)");
    assert!(user_functions(&m).is_empty());
    assert!(matches!(
        codegen_error(&diags[0]),
        CodegenError::UndefinedFunction { .. }
    ));
}

#[test]
fn undefined_variable_drops_only_that_function() {
    let (m, diags) = compile(
        "let a: int = () -> 1\nlet b: int = (x: int) -> y\nlet c: int = () -> a()",
    );
    assert_eq!(user_functions(&m), ["a", "c"]);
    assert_eq!(diags.len(), 1);
    assert_eq!(
        codegen_error(&diags[0]).message(),
        "Undefined variable: y"
    );
}

#[test]
fn arity_mismatch_is_reported() {
    let (m, diags) = compile("let f: int = (a: int) -> a\nlet g: int = () -> f(1, 2)");
    assert_eq!(user_functions(&m), ["f"]);
    match codegen_error(&diags[0]) {
        CodegenError::ArityMismatch {
            name,
            expected,
            found,
            ..
        } => {
            assert_eq!(name, "f");
            assert_eq!((*expected, *found), (1, 2));
        }
        other => panic!("{other:?}"),
    }
    assert!(diags[0]
        .to_string()
        .contains("Incorrect number of arguments for function: f"));
}

#[test]
fn runtime_call_arity_is_checked_too() {
    let (_, diags) = compile("let f: int = () -> str_len()");
    assert!(matches!(
        codegen_error(&diags[0]),
        CodegenError::ArityMismatch { expected: 1, found: 0, .. }
    ));
}

#[test]
fn argument_type_mismatch_is_reported() {
    let (_, diags) = compile("let f: int = () -> str_len(3)");
    match codegen_error(&diags[0]) {
        CodegenError::ArgumentTypeMismatch {
            index,
            expected,
            found,
            ..
        } => {
            assert_eq!(*index, 0);
            assert_eq!((*expected, *found), (IrType::Ptr, IrType::I32));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn failed_function_leaves_no_string_globals() {
    let (m, diags) = compile(
        "let ok: int = () -> str_print(\"kept\")\nlet bad: int = () -> str_print(\"gone\") + nope",
    );
    assert_eq!(diags.len(), 1);
    assert_eq!(user_functions(&m), ["ok"]);
    assert_eq!(m.globals.len(), 1);
    assert_eq!(m.globals[0].bytes, b"kept\0");
}

#[test]
fn duplicate_definition_is_rejected() {
    let (m, diags) = compile("let f: int = () -> 1\nlet f: int = () -> 2");
    assert_eq!(user_functions(&m), ["f"]);
    assert_eq!(
        codegen_error(&diags[0]).message(),
        "Function already defined: f"
    );
}

#[test]
fn defining_a_runtime_name_is_rejected() {
    let (_, diags) = compile("let str_len: int = (s: str) -> 0");
    assert!(matches!(
        codegen_error(&diags[0]),
        CodegenError::DuplicateFunction { .. }
    ));
}

#[test]
fn func_parameter_call_is_indirect_with_synthesized_signature() {
    let (m, diags) = compile("let apply: int = (f: func, x: int, c: char) -> f(x, c)");
    assert!(diags.is_empty(), "{diags:?}");
    let apply = m.get_function("apply").unwrap();
    let call = apply
        .insts
        .iter()
        .find_map(|i| match &i.kind {
            InstKind::Call { callee, sig, .. } => Some((*callee, sig.clone())),
            _ => None,
        })
        .unwrap();
    assert!(matches!(call.0, Callee::Indirect(_)));
    assert_eq!(call.1.ret, IrType::I32);
    assert_eq!(call.1.params, vec![IrType::I32, IrType::I8]);
    assert!(m
        .to_string()
        .contains("%calltmp = call i32 %f(i32 %x, i8 %c)"));
}

#[test]
fn earlier_function_can_be_passed_as_value() {
    let (m, diags) = compile(
        "let inc: int = (x: int) -> x + 1\n\
         let apply: int = (f: func, x: int) -> f(x)\n\
         let main: int = () -> apply(inc, 41)",
    );
    assert!(diags.is_empty(), "{diags:?}");
    assert!(m
        .to_string()
        .contains("%calltmp = call i32 @apply(ptr @inc, i32 41)"));
}

#[test]
fn runtime_name_is_not_a_value() {
    let (_, diags) = compile("let f: int = (g: func) -> 0\nlet h: int = () -> f(str_len)");
    assert_eq!(
        codegen_error(&diags[0]).message(),
        "Undefined variable: str_len"
    );
}

#[test]
fn calling_a_non_pointer_parameter_is_rejected() {
    let (_, diags) = compile("let f: int = (n: int) -> n(1)");
    assert!(matches!(
        codegen_error(&diags[0]),
        CodegenError::NotCallable { .. }
    ));
}

#[test]
fn parameter_shadows_function_of_same_name() {
    let (m, diags) = compile("let g: int = () -> 1\nlet f: int = (g: func) -> g()");
    assert!(diags.is_empty());
    assert!(m.to_string().contains("%calltmp = call i32 %g()"));
}

#[test]
fn generated_module_verifies() {
    let src = "let fact3: int = (n: int) -> n * (n - 1) * (n - 2)\n\
               let pick: float = (x: float, y: float) -> if x >= y then x / y else y - x\n\
               let len: int = (s: str) -> str_len(s) + str_find(s, \"a\")";
    let (m, diags) = compile(src);
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(lge_codegen::verify::verify_module(&m), vec![]);
}
