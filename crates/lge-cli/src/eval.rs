//! Reference interpreter for generated IR.
//!
//! Walks blocks of a `Function`, choosing phi inputs by the block control
//! came from. Calls to declarations dispatch to the host runtime.

use anyhow::{anyhow, bail, Context, Result};
use lge_ast::ast::TypeKind;
use lge_codegen::ir::{
    BinaryOpcode, BlockId, Callee, FloatPredicate, FuncId, Function, GlobalId, InstKind,
    IntPredicate, IrType, Module, Terminator, Value as IrValue, ValueKind,
};

use crate::host::Runtime;

/// Maximum call depth to prevent stack overflow from deep call chains
const MAX_CALL_DEPTH: u32 = 1000;

/// Runtime values. Integers of every width are kept sign-extended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f32),
    Ptr(Pointer),
}

/// What a pointer value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pointer {
    /// A string constant of the module
    Global(GlobalId),
    /// The runtime's shared result buffer
    Scratch,
    /// A string handed in by the host, e.g. a command-line argument
    Host(usize),
    Func(FuncId),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Ptr(Pointer::Global(id)) => write!(f, "<ptr:global#{}>", id.0),
            Value::Ptr(Pointer::Scratch) => write!(f, "<ptr:scratch>"),
            Value::Ptr(Pointer::Host(i)) => write!(f, "<ptr:host#{i}>"),
            Value::Ptr(Pointer::Func(id)) => write!(f, "<fn#{}>", id.0),
        }
    }
}

/// Sign-extend the low bits of `v` to the width of `ty`.
fn wrap(ty: IrType, v: i64) -> i64 {
    match ty {
        IrType::I1 => -(v & 1),
        IrType::I8 => i64::from(v as i8),
        _ => i64::from(v as i32),
    }
}

pub struct Interpreter<'m> {
    module: &'m Module,
    runtime: Runtime,
    depth: u32,
}

impl<'m> Interpreter<'m> {
    /// Interpreter whose runtime uses the process's stdin and stdout.
    pub fn new(module: &'m Module) -> Self {
        Self::with_runtime(module, Runtime::stdio())
    }

    pub fn with_runtime(module: &'m Module, runtime: Runtime) -> Self {
        Self {
            module,
            runtime,
            depth: 0,
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Call a module function by name.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let Some(id) = self.module.function_id(name) else {
            bail!("no function named '{}' in the module", name);
        };
        let result = self.call_id(id, args);
        self.runtime.flush()?;
        result
    }

    /// Turn command-line text into an argument of source type `kind`.
    pub fn parse_arg(&mut self, kind: TypeKind, text: &str) -> Result<Value> {
        let v = match kind {
            TypeKind::Int => Value::Int(i64::from(
                text.parse::<i32>()
                    .with_context(|| format!("invalid int argument '{}'", text))?,
            )),
            TypeKind::Float => Value::Float(
                text.parse::<f32>()
                    .with_context(|| format!("invalid float argument '{}'", text))?,
            ),
            TypeKind::Char => match text.as_bytes() {
                [b] => Value::Int(i64::from(*b as i8)),
                _ => {
                    let n = text
                        .parse::<i8>()
                        .with_context(|| format!("invalid char argument '{}'", text))?;
                    Value::Int(i64::from(n))
                }
            },
            TypeKind::Str => Value::Ptr(self.runtime.intern(text)),
            TypeKind::Func => match self.module.function_id(text) {
                Some(id) if !self.module.function(id).is_declaration() => {
                    Value::Ptr(Pointer::Func(id))
                }
                _ => bail!("'{}' is not a function defined in the module", text),
            },
        };
        Ok(v)
    }

    /// Human-readable rendering of a result of source type `kind`.
    pub fn render(&self, v: &Value, kind: TypeKind) -> String {
        match (v, kind) {
            (Value::Int(n), TypeKind::Char) => {
                let c = *n as u8;
                format!("'{}'", c.escape_ascii())
            }
            (Value::Ptr(Pointer::Func(id)), _) => {
                match self.module.functions.get(id.0 as usize) {
                    Some(f) => format!("<fn {}>", f.name),
                    None => v.to_string(),
                }
            }
            (Value::Ptr(p), TypeKind::Str) => match self.runtime.c_str(self.module, *p) {
                Ok(bytes) => format!("{:?}", String::from_utf8_lossy(&bytes)),
                Err(_) => v.to_string(),
            },
            _ => v.to_string(),
        }
    }

    fn call_id(&mut self, id: FuncId, args: &[Value]) -> Result<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            bail!(
                "maximum call depth exceeded (limit: {} calls)",
                MAX_CALL_DEPTH
            );
        }
        self.depth += 1;
        let result = self.call_inner(id, args);
        self.depth -= 1;
        result
    }

    fn call_inner(&mut self, id: FuncId, args: &[Value]) -> Result<Value> {
        let module = self.module;
        let f = module.function(id);
        if args.len() != f.sig.params.len() {
            bail!(
                "{} expects {} arguments, got {}",
                f.name,
                f.sig.params.len(),
                args.len()
            );
        }
        if f.is_declaration() {
            return Ok(self.runtime.call(module, &f.name, args)?);
        }
        self.exec(f, args)
            .with_context(|| format!("in function {}", f.name))
    }

    fn exec(&mut self, f: &'m Function, args: &[Value]) -> Result<Value> {
        let mut vals: Vec<Option<Value>> = vec![None; f.insts.len()];
        let mut cur = BlockId(0);
        let mut prev: Option<BlockId> = None;
        loop {
            let block = f.block(cur);
            for &id in &block.insts {
                let inst = f.inst(id);
                let op = |v: &IrValue| operand(f, args, &vals, v);
                let v = match &inst.kind {
                    InstKind::Phi { incoming } => {
                        let from =
                            prev.ok_or_else(|| anyhow!("phi %{} in entry block", inst.name))?;
                        let (v, _) = incoming.iter().find(|(_, b)| *b == from).ok_or_else(|| {
                            anyhow!("phi %{} has no input from '{}'", inst.name, f.block(from).label)
                        })?;
                        op(v)?
                    }
                    InstKind::Binary { op: code, lhs, rhs } => {
                        binary(*code, inst.ty, op(lhs)?, op(rhs)?)?
                    }
                    InstKind::Neg(v) => match op(v)? {
                        Value::Int(n) => Value::Int(wrap(inst.ty, n.wrapping_neg())),
                        other => bail!("neg of {}", other),
                    },
                    InstKind::FNeg(v) => match op(v)? {
                        Value::Float(x) => Value::Float(-x),
                        other => bail!("fneg of {}", other),
                    },
                    InstKind::ICmp { pred, lhs, rhs } => {
                        let (Value::Int(a), Value::Int(b)) = (op(lhs)?, op(rhs)?) else {
                            bail!("icmp on non-integer operands");
                        };
                        Value::Int(wrap(IrType::I1, i64::from(icmp(*pred, a, b))))
                    }
                    InstKind::FCmp { pred, lhs, rhs } => {
                        let (Value::Float(a), Value::Float(b)) = (op(lhs)?, op(rhs)?) else {
                            bail!("fcmp on non-float operands");
                        };
                        Value::Int(wrap(IrType::I1, i64::from(fcmp(*pred, a, b))))
                    }
                    InstKind::Call {
                        callee,
                        sig,
                        args: call_args,
                    } => {
                        let argv = call_args.iter().map(op).collect::<Result<Vec<_>>>()?;
                        let target = match callee {
                            Callee::Direct(id) => *id,
                            Callee::Indirect(v) => match op(v)? {
                                Value::Ptr(Pointer::Func(id)) => {
                                    let target = self.module.function(id);
                                    if target.sig != *sig {
                                        bail!(
                                            "indirect call to {} as {} but it is {}",
                                            target.name,
                                            sig,
                                            target.sig
                                        );
                                    }
                                    id
                                }
                                other => bail!("call through non-function value {}", other),
                            },
                        };
                        self.call_id(target, &argv)?
                    }
                };
                vals[id.0 as usize] = Some(v);
            }
            match &block.term {
                Some(Terminator::Ret(v)) => return operand(f, args, &vals, v),
                Some(Terminator::Br(dest)) => {
                    prev = Some(cur);
                    cur = *dest;
                }
                Some(Terminator::CondBr {
                    cond,
                    then_dest,
                    else_dest,
                }) => {
                    let Value::Int(c) = operand(f, args, &vals, cond)? else {
                        bail!("branch on a non-integer condition");
                    };
                    prev = Some(cur);
                    cur = if c != 0 { *then_dest } else { *else_dest };
                }
                None => bail!("block '{}' has no terminator", block.label),
            }
        }
    }
}

fn operand(
    f: &Function,
    args: &[Value],
    vals: &[Option<Value>],
    v: &IrValue,
) -> Result<Value> {
    let out = match v.kind {
        ValueKind::ConstInt(n) => Value::Int(wrap(v.ty, n)),
        ValueKind::ConstFloat(x) => Value::Float(x),
        ValueKind::Param(i) => *args
            .get(i as usize)
            .ok_or_else(|| anyhow!("missing argument {}", i))?,
        ValueKind::Inst(id) => vals
            .get(id.0 as usize)
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("%{} used before it is defined", f.inst(id).name))?,
        ValueKind::Global(id) => Value::Ptr(Pointer::Global(id)),
        ValueKind::Function(id) => Value::Ptr(Pointer::Func(id)),
    };
    Ok(out)
}

fn binary(op: BinaryOpcode, ty: IrType, l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) if !op.is_float() => {
            let v = match op {
                BinaryOpcode::Add => a.wrapping_add(b),
                BinaryOpcode::Sub => a.wrapping_sub(b),
                BinaryOpcode::Mul => a.wrapping_mul(b),
                BinaryOpcode::SDiv => {
                    if b == 0 {
                        bail!("integer division by zero");
                    }
                    let q = a / b;
                    if wrap(ty, q) != q {
                        bail!("integer overflow in division");
                    }
                    q
                }
                _ => bail!("'{}' applied to integers", op.mnemonic()),
            };
            Ok(Value::Int(wrap(ty, v)))
        }
        (Value::Float(a), Value::Float(b)) if op.is_float() => {
            let v = match op {
                BinaryOpcode::FAdd => a + b,
                BinaryOpcode::FSub => a - b,
                BinaryOpcode::FMul => a * b,
                BinaryOpcode::FDiv => a / b,
                _ => bail!("'{}' applied to floats", op.mnemonic()),
            };
            Ok(Value::Float(v))
        }
        (l, r) => bail!("'{}' applied to {} and {}", op.mnemonic(), l, r),
    }
}

fn icmp(pred: IntPredicate, a: i64, b: i64) -> bool {
    match pred {
        IntPredicate::Eq => a == b,
        IntPredicate::Ne => a != b,
        IntPredicate::Slt => a < b,
        IntPredicate::Sgt => a > b,
        IntPredicate::Sle => a <= b,
        IntPredicate::Sge => a >= b,
    }
}

fn fcmp(pred: FloatPredicate, a: f32, b: f32) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    match pred {
        FloatPredicate::Oeq => a == b,
        FloatPredicate::One => a != b,
        FloatPredicate::Olt => a < b,
        FloatPredicate::Ogt => a > b,
        FloatPredicate::Ole => a <= b,
        FloatPredicate::Oge => a >= b,
    }
}
