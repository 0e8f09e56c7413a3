//! LLVM textual form of the IR, opaque-pointer dialect.

use std::fmt::{self, Write};

use crate::ir::{Callee, Function, Inst, InstKind, IrType, Module, Terminator, Value, ValueKind};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", escape_bytes(self.source_filename.as_bytes()))?;
        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for g in &self.globals {
            writeln!(
                f,
                "@{} = private unnamed_addr constant [{} x i8] c\"{}\", align 1",
                g.name,
                g.bytes.len(),
                escape_bytes(&g.bytes)
            )?;
        }
        for func in &self.functions {
            writeln!(f)?;
            write_function(f, self, func)?;
        }
        Ok(())
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, m: &Module, func: &Function) -> fmt::Result {
    if func.is_declaration() {
        let params: Vec<String> = func.sig.params.iter().map(|t| t.to_string()).collect();
        return writeln!(f, "declare {} @{}({})", func.sig.ret, func.name, params.join(", "));
    }
    let params: Vec<String> = func
        .sig
        .params
        .iter()
        .zip(&func.param_names)
        .map(|(t, n)| format!("{} %{}", t, n))
        .collect();
    writeln!(f, "define {} @{}({}) {{", func.sig.ret, func.name, params.join(", "))?;
    for (i, block) in func.blocks.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        writeln!(f, "{}:", block.label)?;
        for id in &block.insts {
            writeln!(f, "  {}", inst_text(m, func, func.inst(*id)))?;
        }
        match &block.term {
            Some(t) => writeln!(f, "  {}", term_text(m, func, t))?,
            None => writeln!(f, "  ; missing terminator")?,
        }
    }
    writeln!(f, "}}")
}

fn operand(m: &Module, func: &Function, v: &Value) -> String {
    match v.kind {
        ValueKind::ConstInt(n) if v.ty == IrType::I1 => (n & 1 == 1).to_string(),
        ValueKind::ConstInt(n) => n.to_string(),
        // exact for every f32, which decimal text is not
        ValueKind::ConstFloat(x) => format!("0x{:016X}", f64::from(x).to_bits()),
        ValueKind::Param(i) => format!("%{}", func.param_names[i as usize]),
        ValueKind::Inst(id) => format!("%{}", func.inst(id).name),
        ValueKind::Global(id) => format!("@{}", m.global(id).name),
        ValueKind::Function(id) => format!("@{}", m.function(id).name),
    }
}

fn typed(m: &Module, func: &Function, v: &Value) -> String {
    format!("{} {}", v.ty, operand(m, func, v))
}

fn inst_text(m: &Module, func: &Function, inst: &Inst) -> String {
    let op = |v: &Value| operand(m, func, v);
    let body = match &inst.kind {
        InstKind::Binary { op: code, lhs, rhs } => {
            format!("{} {} {}, {}", code.mnemonic(), lhs.ty, op(lhs), op(rhs))
        }
        InstKind::Neg(v) => format!("sub {} 0, {}", v.ty, op(v)),
        InstKind::FNeg(v) => format!("fneg {} {}", v.ty, op(v)),
        InstKind::ICmp { pred, lhs, rhs } => {
            format!("icmp {} {} {}, {}", pred.mnemonic(), lhs.ty, op(lhs), op(rhs))
        }
        InstKind::FCmp { pred, lhs, rhs } => {
            format!("fcmp {} {} {}, {}", pred.mnemonic(), lhs.ty, op(lhs), op(rhs))
        }
        InstKind::Call { callee, sig, args } => {
            let target = match callee {
                Callee::Direct(id) => format!("@{}", m.function(*id).name),
                Callee::Indirect(v) => op(v),
            };
            let args: Vec<String> = args.iter().map(|a| typed(m, func, a)).collect();
            format!("call {} {}({})", sig.ret, target, args.join(", "))
        }
        InstKind::Phi { incoming } => {
            let mut s = format!("phi {} ", inst.ty);
            for (i, (v, b)) in incoming.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                let _ = write!(s, "[ {}, %{} ]", op(v), func.block(*b).label);
            }
            s
        }
    };
    format!("%{} = {}", inst.name, body)
}

fn term_text(m: &Module, func: &Function, t: &Terminator) -> String {
    match t {
        Terminator::Ret(v) => format!("ret {}", typed(m, func, v)),
        Terminator::Br(b) => format!("br label %{}", func.block(*b).label),
        Terminator::CondBr {
            cond,
            then_dest,
            else_dest,
        } => format!(
            "br {}, label %{}, label %{}",
            typed(m, func, cond),
            func.block(*then_dest).label,
            func.block(*else_dest).label
        ),
    }
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
            out.push(b as char);
        } else {
            let _ = write!(out, "\\{:02X}", b);
        }
    }
    out
}
