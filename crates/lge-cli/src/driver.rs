//! The compile pipeline behind the `lge` binary: lex, optional dumps, parse,
//! generate.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use lge_ast::ast::Program;
use lge_codegen::{CodeGenerator, DiagnosticSink, Module};
use lge_parse::{parse, tokenize, ParseError, Tok};
use serde::Serialize;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Pretty,
    Json,
}

/// What to print besides the IR.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub dump_tokens: bool,
    pub dump_ast: bool,
    pub format: Format,
}

#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    pub parse_errors: Vec<ParseError>,
    /// `None` when parsing failed; code generation is skipped then.
    pub module: Option<Module>,
}

/// Run the pipeline on `src`. Dumps go to `out`, code generation
/// diagnostics to `sink`. Only I/O on `out` makes this fail.
pub fn compile(
    file: &str,
    src: &str,
    opts: &CompileOptions,
    out: &mut dyn Write,
    sink: &mut dyn DiagnosticSink,
) -> Result<Compilation> {
    let toks = tokenize(file, src);
    if opts.dump_tokens {
        write_tokens(out, file, &toks, opts.format)?;
    }

    let parsed = parse(toks);
    if parsed.has_errors() {
        return Ok(Compilation {
            program: parsed.program,
            parse_errors: parsed.diagnostics,
            module: None,
        });
    }
    if opts.dump_ast {
        write_ast(out, &parsed.program, opts.format)?;
    }

    let mut gen = CodeGenerator::new(file);
    gen.generate(&parsed.program, sink);
    let module = gen.finish();
    Ok(Compilation {
        program: parsed.program,
        parse_errors: Vec::new(),
        module: Some(module),
    })
}

#[derive(Serialize)]
struct TokenDump<'a> {
    file: &'a str,
    tokens: &'a [Tok],
    total: usize,
}

pub fn write_tokens(out: &mut dyn Write, file: &str, toks: &[Tok], format: Format) -> Result<()> {
    match format {
        Format::Pretty => {
            writeln!(out, "Tokens:")?;
            writeln!(out, "Tokens for file: {}", file)?;
            for t in toks {
                writeln!(
                    out,
                    "{:>4}:{:<4} {:<15} '{}'",
                    t.location.line,
                    t.location.column,
                    t.kind.name(),
                    t.text.escape_debug()
                )?;
            }
            writeln!(out, "Total tokens: {}", toks.len())?;
            writeln!(out, "END Tokens")?;
        }
        Format::Json => {
            let dump = TokenDump {
                file,
                tokens: toks,
                total: toks.len(),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&dump)?)?;
        }
    }
    Ok(())
}

pub fn write_ast(out: &mut dyn Write, program: &Program, format: Format) -> Result<()> {
    match format {
        Format::Pretty => {
            writeln!(out, "AST:")?;
            write!(out, "{}", program)?;
            writeln!(out, "END AST")?;
        }
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(program)?)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lge_codegen::Diagnostic;

    fn run(src: &str, opts: &CompileOptions) -> (Compilation, String, Vec<Diagnostic>) {
        let mut out = Vec::new();
        let mut diags = Vec::new();
        let c = compile("d.lge", src, opts, &mut out, &mut diags).unwrap();
        (c, String::from_utf8(out).unwrap(), diags)
    }

    #[test]
    fn parse_errors_skip_codegen_and_ast_dump() {
        let opts = CompileOptions {
            dump_ast: true,
            ..Default::default()
        };
        let (c, out, _) = run("let bad: int = (a: int) a", &opts);
        assert!(c.module.is_none());
        assert_eq!(c.parse_errors.len(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn pretty_token_dump_lists_every_token() {
        let opts = CompileOptions {
            dump_tokens: true,
            ..Default::default()
        };
        let (_, out, _) = run("let f: int = () -> 1", &opts);
        assert!(out.starts_with("Tokens:\nTokens for file: d.lge\n"), "{out}");
        assert!(out.contains("   1:1    LET             'let'"), "{out}");
        assert!(out.contains("Total tokens: 10\nEND Tokens\n"), "{out}");
    }

    #[test]
    fn json_ast_dump_is_valid_json() {
        let opts = CompileOptions {
            dump_ast: true,
            format: Format::Json,
            ..Default::default()
        };
        let (c, out, diags) = run("let f: int = (x: int) -> x", &opts);
        assert!(c.module.is_some());
        assert!(diags.is_empty());
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["functions"][0]["name"], "f");
    }

    #[test]
    fn module_names_the_source_file_even_when_empty() {
        let (c, _, _) = run("# nothing here\n", &CompileOptions::default());
        let ir = c.module.unwrap().to_string();
        assert!(ir.contains("source_filename = \"d.lge\""), "{ir}");
    }

    #[test]
    fn codegen_errors_reach_the_sink() {
        let (c, _, diags) = run("let f: int = () -> y", &CompileOptions::default());
        let m = c.module.unwrap();
        assert!(m.get_function("f").is_none());
        assert_eq!(diags.len(), 1);
    }
}
