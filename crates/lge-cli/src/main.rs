use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use lge_cli::driver::{compile, CompileOptions, Format};
use lge_cli::eval::Interpreter;
use lge_codegen::StderrSink;

/// Maximum source file size in bytes (1MB)
const MAX_SOURCE_SIZE: usize = 1_000_000;

#[derive(Parser, Debug)]
#[command(name = "lge")]
#[command(about = "LGE: compile single-expression functions to LLVM IR")]
struct Cli {
    /// Path to .lge source file
    file: PathBuf,

    /// Dump lexer tokens to stdout
    #[arg(long)]
    dump_tokens: bool,

    /// Dump AST to stdout
    #[arg(long)]
    dump_ast: bool,

    /// Output format for dumps
    #[arg(long, value_enum, default_value_t = Format::Pretty)]
    format: Format,

    /// Write the IR to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Execute this function with the reference interpreter
    #[arg(long, value_name = "FUNC")]
    run: Option<String>,

    /// Argument for --run, once per parameter
    #[arg(long = "arg", value_name = "VALUE", requires = "run")]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if !cli.file.is_file() {
        bail!("file does not exist: {}", cli.file.display());
    }
    let path = cli.file.to_string_lossy().into_owned();
    let src = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("failed to read '{}'", path))?;

    if src.len() > MAX_SOURCE_SIZE {
        eprintln!(
            "Error: source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
        return Ok(ExitCode::FAILURE);
    }

    let opts = CompileOptions {
        dump_tokens: cli.dump_tokens,
        dump_ast: cli.dump_ast,
        format: cli.format,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let compilation = compile(&path, &src, &opts, &mut out, &mut StderrSink)?;

    let Some(module) = compilation.module else {
        eprintln!("Parse errors occurred:");
        for e in &compilation.parse_errors {
            eprintln!("{}", e);
        }
        return Ok(ExitCode::FAILURE);
    };

    if let Some(output) = &cli.output {
        std::fs::write(output, module.to_string())
            .with_context(|| format!("failed to write '{}'", output.display()))?;
    }

    match &cli.run {
        Some(name) => {
            let def = compilation
                .program
                .functions
                .iter()
                .find(|f| f.name == *name)
                .ok_or_else(|| anyhow!("no function named '{}' in {}", name, path))?;
            if !module
                .get_function(name)
                .is_some_and(|f| !f.is_declaration())
            {
                bail!("function '{}' failed to compile", name);
            }
            if cli.args.len() != def.params.len() {
                bail!(
                    "{} takes {} arguments, {} given",
                    name,
                    def.params.len(),
                    cli.args.len()
                );
            }
            // release stdout so the program's own output can interleave
            drop(out);
            let mut interp = Interpreter::new(&module);
            let mut args = Vec::with_capacity(cli.args.len());
            for (p, text) in def.params.iter().zip(&cli.args) {
                args.push(interp.parse_arg(p.ty.kind, text)?);
            }
            let result = interp.call(name, &args)?;
            println!(
                "{}({}) = {}",
                name,
                cli.args.join(", "),
                interp.render(&result, def.return_type.kind)
            );
        }
        None if cli.output.is_none() => {
            write!(out, "{}", module)?;
        }
        None => {}
    }

    Ok(ExitCode::SUCCESS)
}
