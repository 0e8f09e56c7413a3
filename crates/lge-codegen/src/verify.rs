//! Structural checks over generated IR. Failures are reported, not fatal.

use std::collections::HashSet;
use std::fmt;

use crate::ir::{
    BlockId, Callee, Function, InstKind, IrType, Module, Terminator, Value, ValueKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    /// Function the problem was found in, `None` for module-level problems.
    pub function: Option<String>,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "Function verification failed for {}: {}", name, self.message),
            None => write!(f, "Module verification failed: {}", self.message),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Checks symbol uniqueness, then every function body.
pub fn verify_module(m: &Module) -> Vec<VerifyError> {
    let mut errors = verify_symbols(m);
    for f in &m.functions {
        errors.extend(verify_function(m, f));
    }
    errors
}

/// Module-scope checks only: function and global names must be unique.
pub fn verify_symbols(m: &Module) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let names = m
        .functions
        .iter()
        .map(|f| &f.name)
        .chain(m.globals.iter().map(|g| &g.name));
    for name in names {
        if !seen.insert(name.as_str()) {
            errors.push(VerifyError {
                function: None,
                message: format!("symbol '@{}' is defined more than once", name),
            });
        }
    }
    errors
}

pub fn verify_function(m: &Module, f: &Function) -> Vec<VerifyError> {
    let mut v = FnVerifier {
        m,
        f,
        errors: Vec::new(),
    };
    if !f.is_declaration() {
        v.run();
    }
    v.errors
}

struct FnVerifier<'a> {
    m: &'a Module,
    f: &'a Function,
    errors: Vec<VerifyError>,
}

impl FnVerifier<'_> {
    fn err(&mut self, message: String) {
        self.errors.push(VerifyError {
            function: Some(self.f.name.clone()),
            message,
        });
    }

    fn run(&mut self) {
        let f = self.f;
        if f.param_names.len() != f.sig.params.len() {
            self.err("parameter names do not match the signature".to_string());
        }
        let mut placed = vec![false; f.insts.len()];
        for block in &f.blocks {
            for id in &block.insts {
                let i = id.0 as usize;
                if i >= placed.len() {
                    self.err(format!("block '{}' lists a missing instruction", block.label));
                } else if placed[i] {
                    self.err(format!("instruction %{} appears twice", f.insts[i].name));
                } else {
                    placed[i] = true;
                }
            }
        }
        for (bi, block) in f.blocks.iter().enumerate() {
            let mut seen_non_phi = false;
            for id in &block.insts {
                let Some(inst) = f.insts.get(id.0 as usize) else {
                    continue;
                };
                if let InstKind::Phi { incoming } = &inst.kind {
                    if seen_non_phi {
                        self.err(format!("phi %{} is not at the start of '{}'", inst.name, block.label));
                    }
                    self.check_phi(bi, &inst.name, inst.ty, incoming);
                } else {
                    seen_non_phi = true;
                    self.check_inst(&inst.name, inst.ty, &inst.kind);
                }
            }
            match &block.term {
                None => self.err(format!("block '{}' has no terminator", block.label)),
                Some(t) => self.check_term(&block.label, t),
            }
        }
    }

    fn check_value(&mut self, v: &Value) {
        let f = self.f;
        let found = match v.kind {
            ValueKind::ConstInt(_) => {
                if !v.ty.is_int() {
                    self.err(format!("integer constant typed {}", v.ty));
                }
                return;
            }
            ValueKind::ConstFloat(_) => {
                if !v.ty.is_float() {
                    self.err(format!("float constant typed {}", v.ty));
                }
                return;
            }
            ValueKind::Param(i) => f.sig.params.get(i as usize).copied(),
            ValueKind::Inst(id) => f.insts.get(id.0 as usize).map(|i| i.ty),
            ValueKind::Global(id) => ((id.0 as usize) < self.m.globals.len()).then_some(IrType::Ptr),
            ValueKind::Function(id) => {
                ((id.0 as usize) < self.m.functions.len()).then_some(IrType::Ptr)
            }
        };
        match found {
            None => self.err(format!("operand {:?} does not exist", v.kind)),
            Some(ty) if ty != v.ty => {
                self.err(format!("operand {:?} used as {} but has type {}", v.kind, v.ty, ty))
            }
            Some(_) => {}
        }
    }

    fn check_inst(&mut self, name: &str, ty: IrType, kind: &InstKind) {
        match kind {
            InstKind::Binary { op, lhs, rhs } => {
                self.check_value(lhs);
                self.check_value(rhs);
                if lhs.ty != rhs.ty || lhs.ty != ty {
                    self.err(format!("%{}: operand types differ ({}, {})", name, lhs.ty, rhs.ty));
                }
                let ok = if op.is_float() { ty.is_float() } else { ty.is_int() };
                if !ok {
                    self.err(format!("%{}: '{}' does not apply to {}", name, op.mnemonic(), ty));
                }
            }
            InstKind::Neg(v) | InstKind::FNeg(v) => {
                self.check_value(v);
                let want_float = matches!(kind, InstKind::FNeg(_));
                if v.ty != ty || v.ty.is_float() != want_float || v.ty == IrType::Ptr {
                    self.err(format!("%{}: negation of {}", name, v.ty));
                }
            }
            InstKind::ICmp { lhs, rhs, .. } | InstKind::FCmp { lhs, rhs, .. } => {
                self.check_value(lhs);
                self.check_value(rhs);
                let want_float = matches!(kind, InstKind::FCmp { .. });
                let ok = lhs.ty == rhs.ty
                    && if want_float { lhs.ty.is_float() } else { lhs.ty.is_int() };
                if !ok || ty != IrType::I1 {
                    self.err(format!("%{}: cannot compare {} with {}", name, lhs.ty, rhs.ty));
                }
            }
            InstKind::Call { callee, sig, args } => {
                match callee {
                    Callee::Direct(id) => match self.m.functions.get(id.0 as usize) {
                        Some(target) if target.sig != *sig => self.err(format!(
                            "%{}: call to @{} uses type {} but it is {}",
                            name, target.name, sig, target.sig
                        )),
                        Some(_) => {}
                        None => self.err(format!("%{}: call to a missing function", name)),
                    },
                    Callee::Indirect(v) => {
                        self.check_value(v);
                        if v.ty != IrType::Ptr {
                            self.err(format!("%{}: called value is not a pointer", name));
                        }
                    }
                }
                if args.len() != sig.params.len() {
                    self.err(format!(
                        "%{}: {} arguments for {} parameters",
                        name,
                        args.len(),
                        sig.params.len()
                    ));
                }
                for (a, p) in args.iter().zip(&sig.params) {
                    self.check_value(a);
                    if a.ty != *p {
                        self.err(format!("%{}: argument of type {} passed as {}", name, a.ty, p));
                    }
                }
                if ty != sig.ret {
                    self.err(format!("%{}: result typed {} but call returns {}", name, ty, sig.ret));
                }
            }
            InstKind::Phi { .. } => {}
        }
    }

    fn check_phi(&mut self, block: usize, name: &str, ty: IrType, incoming: &[(Value, BlockId)]) {
        let mut preds = self.f.predecessors(BlockId(block as u32));
        let mut from: Vec<_> = incoming.iter().map(|(_, b)| *b).collect();
        preds.sort_by_key(|b| b.0);
        from.sort_by_key(|b| b.0);
        if preds != from {
            self.err(format!("phi %{}: incoming blocks do not match predecessors", name));
        }
        for (v, _) in incoming {
            self.check_value(v);
            if v.ty != ty {
                self.err(format!("phi %{}: incoming {} for a {} phi", name, v.ty, ty));
            }
        }
    }

    fn check_term(&mut self, label: &str, t: &Terminator) {
        let n = self.f.blocks.len();
        for s in t.successors() {
            if s.0 as usize >= n {
                self.err(format!("block '{}' branches to a missing block", label));
            }
        }
        match t {
            Terminator::Ret(v) => {
                self.check_value(v);
                if v.ty != self.f.sig.ret {
                    self.err(format!(
                        "returns {} from a function returning {}",
                        v.ty, self.f.sig.ret
                    ));
                }
            }
            Terminator::CondBr { cond, .. } => {
                self.check_value(cond);
                if cond.ty != IrType::I1 {
                    self.err(format!("branch condition in '{}' is {}, not i1", label, cond.ty));
                }
            }
            Terminator::Br(_) => {}
        }
    }
}
