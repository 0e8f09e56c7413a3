//! In-memory IR: modules of functions made of basic blocks, SSA values and
//! phi merges. Printed as LLVM-style text by `print`.

use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    /// Comparison results and branch conditions.
    I1,
    I8,
    I32,
    F32,
    /// Opaque pointer. Strings point at NUL-terminated `i8` buffers; `func`
    /// values point at a function with no recorded signature.
    Ptr,
}

impl IrType {
    pub fn is_int(self) -> bool {
        matches!(self, IrType::I1 | IrType::I8 | IrType::I32)
    }

    pub fn is_float(self) -> bool {
        self == IrType::F32
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrType::I1 => "i1",
            IrType::I8 => "i8",
            IrType::I32 => "i32",
            IrType::F32 => "float",
            IrType::Ptr => "ptr",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FnSig {
    pub ret: IrType,
    pub params: Vec<IrType>,
}

impl fmt::Display for FnSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueKind {
    ConstInt(i64),
    ConstFloat(f32),
    /// Formal parameter of the enclosing function, by position.
    Param(u32),
    Inst(InstId),
    /// Address of a module global.
    Global(GlobalId),
    /// Address of a module function.
    Function(FuncId),
}

/// A typed operand. Cheap to copy; instructions own their operands by value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: IrType,
}

impl Value {
    pub fn const_int(ty: IrType, v: i64) -> Self {
        Self {
            kind: ValueKind::ConstInt(v),
            ty,
        }
    }

    pub fn const_i32(v: i32) -> Self {
        Self::const_int(IrType::I32, i64::from(v))
    }

    pub fn const_f32(v: f32) -> Self {
        Self {
            kind: ValueKind::ConstFloat(v),
            ty: IrType::F32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOpcode {
    Add,
    Sub,
    Mul,
    SDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinaryOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOpcode::Add => "add",
            BinaryOpcode::Sub => "sub",
            BinaryOpcode::Mul => "mul",
            BinaryOpcode::SDiv => "sdiv",
            BinaryOpcode::FAdd => "fadd",
            BinaryOpcode::FSub => "fsub",
            BinaryOpcode::FMul => "fmul",
            BinaryOpcode::FDiv => "fdiv",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOpcode::FAdd | BinaryOpcode::FSub | BinaryOpcode::FMul | BinaryOpcode::FDiv
        )
    }
}

/// Signed integer comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sgt,
    Sle,
    Sge,
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sge => "sge",
        }
    }
}

/// Ordered float comparison: false whenever either side is NaN.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ogt,
    Ole,
    Oge,
}

impl FloatPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Oge => "oge",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Callee {
    Direct(FuncId),
    /// Call through a pointer value, typed by the call's own signature.
    Indirect(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum InstKind {
    Binary {
        op: BinaryOpcode,
        lhs: Value,
        rhs: Value,
    },
    Neg(Value),
    FNeg(Value),
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    Call {
        callee: Callee,
        sig: FnSig,
        args: Vec<Value>,
    },
    Phi {
        incoming: Vec<(Value, BlockId)>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Inst {
    pub name: String,
    pub ty: IrType,
    pub kind: InstKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    Ret(Value),
    Br(BlockId),
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Ret(_) => Vec::new(),
            Terminator::Br(b) => vec![*b],
            Terminator::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub label: String,
    pub insts: Vec<InstId>,
    pub term: Option<Terminator>,
}

/// A function definition, or an external declaration when it has no blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub sig: FnSig,
    pub param_names: Vec<String>,
    pub blocks: Vec<Block>,
    pub insts: Vec<Inst>,
}

impl Function {
    pub fn declaration(name: impl Into<String>, sig: FnSig) -> Self {
        Self {
            name: name.into(),
            sig,
            param_names: Vec::new(),
            blocks: Vec::new(),
            insts: Vec::new(),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.0 as usize]
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                b.term
                    .as_ref()
                    .is_some_and(|t| t.successors().contains(&id))
            })
            .map(|(i, _)| BlockId(i as u32))
            .collect()
    }
}

/// Private, read-only byte buffer (string literal storage).
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: String,
    /// Includes the trailing NUL.
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub source_filename: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>, source_filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_filename: source_filename.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_id(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FuncId(i as u32))
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.function_id(name).map(|id| self.function(id))
    }

    pub fn add_function(&mut self, f: Function) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(f);
        id
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0 as usize]
    }

    /// Store `s` as a NUL-terminated global and return a pointer to it.
    pub fn add_global_string(&mut self, s: &str) -> Value {
        let id = GlobalId(self.globals.len() as u32);
        let name = if id.0 == 0 {
            "str".to_string()
        } else {
            format!("str.{}", id.0)
        };
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.globals.push(Global { name, bytes });
        Value {
            kind: ValueKind::Global(id),
            ty: IrType::Ptr,
        }
    }
}

/// Builds one function block by block, handing out unique value names.
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    cur: BlockId,
    names: HashMap<String, u32>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, sig: FnSig, param_names: Vec<String>) -> Self {
        let mut b = Self {
            func: Function {
                name: name.into(),
                sig,
                param_names: Vec::new(),
                blocks: Vec::new(),
                insts: Vec::new(),
            },
            cur: BlockId(0),
            names: HashMap::new(),
        };
        let params = param_names.iter().map(|n| b.unique_name(n)).collect();
        b.func.param_names = params;
        b
    }

    fn unique_name(&mut self, hint: &str) -> String {
        let n = self.names.entry(hint.to_string()).or_insert(0);
        let name = if *n == 0 {
            hint.to_string()
        } else {
            format!("{}{}", hint, n)
        };
        *n += 1;
        // a generated name may itself collide with a literal hint
        if name != hint && self.names.contains_key(&name) {
            return self.unique_name(hint);
        }
        self.names.entry(name.clone()).or_insert(1);
        name
    }

    pub fn param(&self, index: usize) -> Value {
        Value {
            kind: ValueKind::Param(index as u32),
            ty: self.func.sig.params[index],
        }
    }

    pub fn append_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        let label = self.unique_name(label);
        self.func.blocks.push(Block {
            label,
            insts: Vec::new(),
            term: None,
        });
        id
    }

    pub fn position_at_end(&mut self, b: BlockId) {
        self.cur = b;
    }

    /// The block new instructions go into. Blocks must be appended first.
    pub fn current_block(&self) -> BlockId {
        self.cur
    }

    fn push(&mut self, hint: &str, ty: IrType, kind: InstKind) -> Value {
        let block = self.current_block();
        let id = InstId(self.func.insts.len() as u32);
        let name = self.unique_name(hint);
        self.func.insts.push(Inst { name, ty, kind });
        self.func.blocks[block.0 as usize].insts.push(id);
        Value {
            kind: ValueKind::Inst(id),
            ty,
        }
    }

    fn terminate(&mut self, term: Terminator) {
        let block = self.current_block();
        self.func.blocks[block.0 as usize].term = Some(term);
    }

    pub fn build_binary(&mut self, op: BinaryOpcode, lhs: Value, rhs: Value, name: &str) -> Value {
        self.push(name, lhs.ty, InstKind::Binary { op, lhs, rhs })
    }

    pub fn build_neg(&mut self, v: Value, name: &str) -> Value {
        self.push(name, v.ty, InstKind::Neg(v))
    }

    pub fn build_fneg(&mut self, v: Value, name: &str) -> Value {
        self.push(name, v.ty, InstKind::FNeg(v))
    }

    pub fn build_icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value, name: &str) -> Value {
        self.push(name, IrType::I1, InstKind::ICmp { pred, lhs, rhs })
    }

    pub fn build_fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value, name: &str) -> Value {
        self.push(name, IrType::I1, InstKind::FCmp { pred, lhs, rhs })
    }

    pub fn build_call(&mut self, callee: Callee, sig: FnSig, args: Vec<Value>, name: &str) -> Value {
        let ty = sig.ret;
        self.push(name, ty, InstKind::Call { callee, sig, args })
    }

    pub fn build_phi(&mut self, ty: IrType, incoming: Vec<(Value, BlockId)>, name: &str) -> Value {
        self.push(name, ty, InstKind::Phi { incoming })
    }

    pub fn build_ret(&mut self, v: Value) {
        self.terminate(Terminator::Ret(v));
    }

    pub fn build_br(&mut self, dest: BlockId) {
        self.terminate(Terminator::Br(dest));
    }

    pub fn build_cond_br(&mut self, cond: Value, then_dest: BlockId, else_dest: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_dest,
            else_dest,
        });
    }

    pub fn finish(self) -> Function {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: Vec<IrType>) -> FnSig {
        FnSig {
            ret: IrType::I32,
            params,
        }
    }

    #[test]
    fn value_names_are_unique() {
        let mut b = FunctionBuilder::new("f", sig(vec![IrType::I32]), vec!["addtmp".into()]);
        let entry = b.append_block("entry");
        b.position_at_end(entry);
        let p = b.param(0);
        let x = b.build_binary(BinaryOpcode::Add, p, p, "addtmp");
        let y = b.build_binary(BinaryOpcode::Add, x, p, "addtmp");
        b.build_ret(y);
        let f = b.finish();
        let names: Vec<_> = f.insts.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(f.param_names, ["addtmp"]);
        assert_eq!(names, ["addtmp1", "addtmp2"]);
    }

    #[test]
    fn predecessors_follow_terminators() {
        let mut b = FunctionBuilder::new("f", sig(vec![]), vec![]);
        let entry = b.append_block("entry");
        let a = b.append_block("a");
        let c = b.append_block("c");
        b.position_at_end(entry);
        let t = Value::const_int(IrType::I1, 1);
        b.build_cond_br(t, a, c);
        b.position_at_end(a);
        b.build_br(c);
        b.position_at_end(c);
        b.build_ret(Value::const_i32(0));
        let f = b.finish();
        assert_eq!(f.predecessors(c), vec![entry, a]);
        assert_eq!(f.predecessors(entry), vec![]);
    }

    #[test]
    fn string_globals_get_llvm_style_names() {
        let mut m = Module::new("m", "");
        m.add_global_string("a");
        m.add_global_string("b");
        assert_eq!(m.globals[0].name, "str");
        assert_eq!(m.globals[1].name, "str.1");
        assert_eq!(m.globals[1].bytes, b"b\0");
    }
}
