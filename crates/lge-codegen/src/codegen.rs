//! Lowers a parsed program to IR, one function at a time, in source order.

use std::collections::HashMap;

use lge_ast::ast::{BinOp, Expr, FunctionDef, Program, TypeKind, UnOp};
use lge_ast::location::Location;

use crate::diag::{Diagnostic, DiagnosticSink};
use crate::ir::{
    BinaryOpcode, Callee, FloatPredicate, FnSig, Function, FunctionBuilder, IntPredicate, IrType,
    Module, Value, ValueKind,
};
use crate::runtime::RUNTIME_FUNCTIONS;
use crate::verify::{verify_function, verify_symbols};

pub const MODULE_NAME: &str = "LGE Module";

/// A problem that makes the current function impossible to generate.
#[derive(Debug, Clone, PartialEq)]
pub enum CodegenError {
    UndefinedVariable {
        name: String,
        location: Location,
    },
    UndefinedFunction {
        name: String,
        location: Location,
    },
    /// Wrong argument count in a direct call
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        location: Location,
    },
    ArgumentTypeMismatch {
        name: String,
        index: usize,
        expected: IrType,
        found: IrType,
        location: Location,
    },
    /// Call through a parameter that does not hold a function pointer
    NotCallable {
        name: String,
        location: Location,
    },
    UnsupportedBinaryOperation {
        op: BinOp,
        lhs: IrType,
        rhs: IrType,
        location: Location,
    },
    UnsupportedUnaryOperation {
        operand: IrType,
        location: Location,
    },
    InvalidCondition {
        found: IrType,
        location: Location,
    },
    BranchTypeMismatch {
        then_ty: IrType,
        else_ty: IrType,
        location: Location,
    },
    DuplicateFunction {
        name: String,
        location: Location,
    },
}

impl CodegenError {
    pub fn location(&self) -> &Location {
        match self {
            CodegenError::UndefinedVariable { location, .. }
            | CodegenError::UndefinedFunction { location, .. }
            | CodegenError::ArityMismatch { location, .. }
            | CodegenError::ArgumentTypeMismatch { location, .. }
            | CodegenError::NotCallable { location, .. }
            | CodegenError::UnsupportedBinaryOperation { location, .. }
            | CodegenError::UnsupportedUnaryOperation { location, .. }
            | CodegenError::InvalidCondition { location, .. }
            | CodegenError::BranchTypeMismatch { location, .. }
            | CodegenError::DuplicateFunction { location, .. } => location,
        }
    }

    /// The message without the location prefix.
    pub fn message(&self) -> String {
        match self {
            CodegenError::UndefinedVariable { name, .. } => format!("Undefined variable: {}", name),
            CodegenError::UndefinedFunction { name, .. } => format!("Undefined function: {}", name),
            CodegenError::ArityMismatch {
                name,
                expected,
                found,
                ..
            } => format!(
                "Incorrect number of arguments for function: {} (expected {}, found {})",
                name, expected, found
            ),
            CodegenError::ArgumentTypeMismatch {
                name,
                index,
                expected,
                found,
                ..
            } => format!(
                "Argument type mismatch in call to {}: argument {} is {}, expected {}",
                name,
                index + 1,
                found,
                expected
            ),
            CodegenError::NotCallable { name, .. } => {
                format!("Cannot call non-function value: {}", name)
            }
            CodegenError::UnsupportedBinaryOperation { op, lhs, rhs, .. } => format!(
                "Unsupported binary operation: {} {} {}",
                lhs,
                op.symbol(),
                rhs
            ),
            CodegenError::UnsupportedUnaryOperation { operand, .. } => {
                format!("Unsupported unary operation: -{}", operand)
            }
            CodegenError::InvalidCondition { found, .. } => {
                format!("Invalid condition type for if expression: {}", found)
            }
            CodegenError::BranchTypeMismatch {
                then_ty, else_ty, ..
            } => format!(
                "Conditional branches have different types: {} and {}",
                then_ty, else_ty
            ),
            CodegenError::DuplicateFunction { name, .. } => {
                format!("Function already defined: {}", name)
            }
        }
    }
}

impl std::fmt::Display for CodegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Code generation error at {}: {}",
            self.location(),
            self.message()
        )
    }
}

impl std::error::Error for CodegenError {}

/// Storage representation of a source type.
pub fn ir_type(kind: TypeKind) -> IrType {
    match kind {
        TypeKind::Int => IrType::I32,
        TypeKind::Float => IrType::F32,
        TypeKind::Char => IrType::I8,
        TypeKind::Str | TypeKind::Func => IrType::Ptr,
    }
}

fn signature(ret: TypeKind, params: impl IntoIterator<Item = TypeKind>) -> FnSig {
    FnSig {
        ret: ir_type(ret),
        params: params.into_iter().map(ir_type).collect(),
    }
}

/// Lower `program` into a fresh module. Functions that fail are reported to
/// `sink` and left out; the rest of the program is still generated.
pub fn generate(program: &Program, sink: &mut dyn DiagnosticSink) -> Module {
    let file = program
        .functions
        .first()
        .map(|f| f.location.file.as_str())
        .unwrap_or(MODULE_NAME);
    let mut gen = CodeGenerator::new(file);
    gen.generate(program, sink);
    gen.finish()
}

pub struct CodeGenerator {
    module: Module,
}

impl CodeGenerator {
    /// A module holding only the runtime declarations.
    pub fn new(source_filename: &str) -> Self {
        let mut module = Module::new(MODULE_NAME, source_filename);
        for rt in RUNTIME_FUNCTIONS {
            let sig = signature(rt.ret, rt.params.iter().copied());
            module.add_function(Function::declaration(rt.name, sig));
        }
        Self { module }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    pub fn generate(&mut self, program: &Program, sink: &mut dyn DiagnosticSink) {
        for def in &program.functions {
            if let Err(e) = self.generate_function(def, sink) {
                sink.report(Diagnostic::Codegen(e));
            }
        }
        for e in verify_symbols(&self.module) {
            sink.report(Diagnostic::Verify(e));
        }
    }

    /// Generate one definition. On error, nothing it created stays behind.
    pub fn generate_function(
        &mut self,
        def: &FunctionDef,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), CodegenError> {
        if self.module.function_id(&def.name).is_some() {
            return Err(CodegenError::DuplicateFunction {
                name: def.name.clone(),
                location: def.location.clone(),
            });
        }
        let sig = signature(def.return_type.kind, def.params.iter().map(|p| p.ty.kind));
        let names = def.params.iter().map(|p| p.name.clone()).collect();
        let mut b = FunctionBuilder::new(&def.name, sig, names);
        let entry = b.append_block("entry");
        b.position_at_end(entry);

        // later parameters shadow earlier ones of the same name
        let mut vars = HashMap::new();
        for (i, p) in def.params.iter().enumerate() {
            vars.insert(p.name.as_str(), b.param(i));
        }

        let globals_before = self.module.globals.len();
        let body = {
            let mut fg = FnGen {
                module: &mut self.module,
                vars: &vars,
                b: &mut b,
            };
            fg.expr(&def.body)
        };
        let ret = match body {
            Ok(v) => v,
            Err(e) => {
                self.module.globals.truncate(globals_before);
                return Err(e);
            }
        };
        b.build_ret(ret);
        let func = b.finish();
        for e in verify_function(&self.module, &func) {
            sink.report(Diagnostic::Verify(e));
        }
        self.module.add_function(func);
        Ok(())
    }
}

/// State for lowering a single function body.
struct FnGen<'a> {
    module: &'a mut Module,
    vars: &'a HashMap<&'a str, Value>,
    b: &'a mut FunctionBuilder,
}

impl FnGen<'_> {
    fn expr(&mut self, e: &Expr) -> Result<Value, CodegenError> {
        match e {
            Expr::IntLiteral { value, .. } => Ok(Value::const_i32(*value)),
            Expr::FloatLiteral { value, .. } => Ok(Value::const_f32(*value)),
            Expr::StringLiteral { value, .. } => Ok(self.module.add_global_string(value)),
            Expr::Identifier { name, location } => self.identifier(name, location),
            Expr::Unary {
                op: UnOp::Neg,
                operand,
                location,
            } => {
                let v = self.expr(operand)?;
                if v.ty.is_int() {
                    Ok(self.b.build_neg(v, "negtmp"))
                } else if v.ty.is_float() {
                    Ok(self.b.build_fneg(v, "fnegtmp"))
                } else {
                    Err(CodegenError::UnsupportedUnaryOperation {
                        operand: v.ty,
                        location: location.clone(),
                    })
                }
            }
            Expr::Binary {
                op,
                lhs,
                rhs,
                location,
            } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                self.binary(*op, l, r, location)
            }
            Expr::Call {
                callee,
                args,
                location,
            } => self.call(callee, args, location),
            Expr::Conditional {
                cond,
                then_,
                else_,
                location,
            } => self.conditional(cond, then_, else_, location),
        }
    }

    fn identifier(&self, name: &str, location: &Location) -> Result<Value, CodegenError> {
        if let Some(v) = self.vars.get(name) {
            return Ok(*v);
        }
        // only functions already generated from source, not runtime declarations
        match self.module.function_id(name) {
            Some(id) if !self.module.function(id).is_declaration() => Ok(Value {
                kind: ValueKind::Function(id),
                ty: IrType::Ptr,
            }),
            _ => Err(CodegenError::UndefinedVariable {
                name: name.to_string(),
                location: location.clone(),
            }),
        }
    }

    fn binary(
        &mut self,
        op: BinOp,
        l: Value,
        r: Value,
        location: &Location,
    ) -> Result<Value, CodegenError> {
        let unsupported = || CodegenError::UnsupportedBinaryOperation {
            op,
            lhs: l.ty,
            rhs: r.ty,
            location: location.clone(),
        };
        if l.ty != r.ty {
            return Err(unsupported());
        }
        if l.ty.is_int() {
            let v = match op {
                BinOp::Add => self.b.build_binary(BinaryOpcode::Add, l, r, "addtmp"),
                BinOp::Sub => self.b.build_binary(BinaryOpcode::Sub, l, r, "subtmp"),
                BinOp::Mul => self.b.build_binary(BinaryOpcode::Mul, l, r, "multmp"),
                BinOp::Div => self.b.build_binary(BinaryOpcode::SDiv, l, r, "divtmp"),
                BinOp::Lt => self.b.build_icmp(IntPredicate::Slt, l, r, "cmptmp"),
                BinOp::Gt => self.b.build_icmp(IntPredicate::Sgt, l, r, "cmptmp"),
                BinOp::Le => self.b.build_icmp(IntPredicate::Sle, l, r, "cmptmp"),
                BinOp::Ge => self.b.build_icmp(IntPredicate::Sge, l, r, "cmptmp"),
                BinOp::Eq => self.b.build_icmp(IntPredicate::Eq, l, r, "cmptmp"),
                BinOp::Ne => self.b.build_icmp(IntPredicate::Ne, l, r, "cmptmp"),
            };
            Ok(v)
        } else if l.ty.is_float() {
            let v = match op {
                BinOp::Add => self.b.build_binary(BinaryOpcode::FAdd, l, r, "faddtmp"),
                BinOp::Sub => self.b.build_binary(BinaryOpcode::FSub, l, r, "fsubtmp"),
                BinOp::Mul => self.b.build_binary(BinaryOpcode::FMul, l, r, "fmultmp"),
                BinOp::Div => self.b.build_binary(BinaryOpcode::FDiv, l, r, "fdivtmp"),
                BinOp::Lt => self.b.build_fcmp(FloatPredicate::Olt, l, r, "cmptmp"),
                BinOp::Gt => self.b.build_fcmp(FloatPredicate::Ogt, l, r, "cmptmp"),
                BinOp::Le => self.b.build_fcmp(FloatPredicate::Ole, l, r, "cmptmp"),
                BinOp::Ge => self.b.build_fcmp(FloatPredicate::Oge, l, r, "cmptmp"),
                BinOp::Eq => self.b.build_fcmp(FloatPredicate::Oeq, l, r, "cmptmp"),
                BinOp::Ne => self.b.build_fcmp(FloatPredicate::One, l, r, "cmptmp"),
            };
            Ok(v)
        } else {
            Err(unsupported())
        }
    }

    fn call(&mut self, callee: &str, args: &[Expr], location: &Location) -> Result<Value, CodegenError> {
        // a parameter of that name wins over any function
        if let Some(target) = self.vars.get(callee).copied() {
            if target.ty != IrType::Ptr {
                return Err(CodegenError::NotCallable {
                    name: callee.to_string(),
                    location: location.clone(),
                });
            }
            let args = self.args(args)?;
            // no signature travels with `func`; assume i32 result
            let sig = FnSig {
                ret: IrType::I32,
                params: args.iter().map(|a| a.ty).collect(),
            };
            return Ok(self.b.build_call(Callee::Indirect(target), sig, args, "calltmp"));
        }

        let Some(id) = self.module.function_id(callee) else {
            return Err(CodegenError::UndefinedFunction {
                name: callee.to_string(),
                location: location.clone(),
            });
        };
        let sig = self.module.function(id).sig.clone();
        if sig.params.len() != args.len() {
            return Err(CodegenError::ArityMismatch {
                name: callee.to_string(),
                expected: sig.params.len(),
                found: args.len(),
                location: location.clone(),
            });
        }
        let args = self.args(args)?;
        for (i, (a, p)) in args.iter().zip(&sig.params).enumerate() {
            if a.ty != *p {
                return Err(CodegenError::ArgumentTypeMismatch {
                    name: callee.to_string(),
                    index: i,
                    expected: *p,
                    found: a.ty,
                    location: location.clone(),
                });
            }
        }
        Ok(self.b.build_call(Callee::Direct(id), sig, args, "calltmp"))
    }

    fn args(&mut self, args: &[Expr]) -> Result<Vec<Value>, CodegenError> {
        args.iter().map(|a| self.expr(a)).collect()
    }

    fn conditional(
        &mut self,
        cond: &Expr,
        then_: &Expr,
        else_: &Expr,
        location: &Location,
    ) -> Result<Value, CodegenError> {
        let c = self.expr(cond)?;
        let test = if c.ty.is_int() {
            let zero = Value::const_int(c.ty, 0);
            self.b.build_icmp(IntPredicate::Ne, c, zero, "ifcond")
        } else if c.ty.is_float() {
            self.b.build_fcmp(FloatPredicate::One, c, Value::const_f32(0.0), "ifcond")
        } else {
            return Err(CodegenError::InvalidCondition {
                found: c.ty,
                location: cond.location().clone(),
            });
        };

        let then_bb = self.b.append_block("then");
        let else_bb = self.b.append_block("else");
        let merge_bb = self.b.append_block("ifcont");
        self.b.build_cond_br(test, then_bb, else_bb);

        self.b.position_at_end(then_bb);
        let then_v = self.expr(then_)?;
        self.b.build_br(merge_bb);
        // nested conditionals move the insertion point
        let then_end = self.b.current_block();

        self.b.position_at_end(else_bb);
        let else_v = self.expr(else_)?;
        self.b.build_br(merge_bb);
        let else_end = self.b.current_block();

        if then_v.ty != else_v.ty {
            return Err(CodegenError::BranchTypeMismatch {
                then_ty: then_v.ty,
                else_ty: else_v.ty,
                location: location.clone(),
            });
        }
        self.b.position_at_end(merge_bb);
        Ok(self
            .b
            .build_phi(then_v.ty, vec![(then_v, then_end), (else_v, else_end)], "iftmp"))
    }
}
