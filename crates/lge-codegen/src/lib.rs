#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

mod codegen;
pub mod diag;
pub mod ir;
mod print;
pub mod runtime;
pub mod verify;

pub use codegen::{generate, ir_type, CodeGenerator, CodegenError, MODULE_NAME};
pub use diag::{Diagnostic, DiagnosticSink, StderrSink};
pub use ir::Module;
