//! Where code generation reports problems. Generation itself never aborts.

use std::fmt;

use crate::codegen::CodegenError;
use crate::verify::VerifyError;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The function was dropped from the module.
    Codegen(CodegenError),
    /// The IR was kept but failed verification.
    Verify(VerifyError),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Codegen(e) => write!(f, "{}", e),
            Diagnostic::Verify(e) => write!(f, "{}", e),
        }
    }
}

pub trait DiagnosticSink {
    fn report(&mut self, diag: Diagnostic);
}

/// Collects diagnostics for later inspection.
impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diag: Diagnostic) {
        self.push(diag);
    }
}

/// Prints each diagnostic on its own stderr line as it arrives.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diag: Diagnostic) {
        eprintln!("{}", diag);
    }
}
