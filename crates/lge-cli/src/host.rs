//! Host implementations of the runtime primitives, for the interpreter.
//!
//! String results are written to one scratch buffer per `Runtime`, so two
//! results alias exactly as they do when linked against the native runtime.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use lge_codegen::ir::Module;

use crate::eval::{Pointer, Value};

/// Scratch buffer capacity, including the terminating NUL.
pub const BUFFER_SIZE: usize = 255;

/// Errors from host function execution.
#[derive(Debug)]
pub enum HostError {
    /// No host implementation for a declared function
    UnknownFunction(String),
    /// Argument of the wrong kind or count
    TypeError(String),
    /// Pointer that does not refer to a string
    InvalidPointer(String),
    /// I/O error from stdin/stdout
    IoError(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::UnknownFunction(name) => write!(f, "unknown host function: {}", name),
            HostError::TypeError(msg) => write!(f, "type error: {}", msg),
            HostError::InvalidPointer(msg) => write!(f, "invalid pointer: {}", msg),
            HostError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

/// Type alias for host function signatures.
pub type HostFnImpl = fn(&mut Runtime, &Module, &[Value]) -> Result<Value, HostError>;

/// Registry mapping runtime primitive names to Rust implementations.
pub struct HostRegistry {
    functions: HashMap<&'static str, HostFnImpl>,
}

impl std::fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("HostRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRegistry {
    /// Registry with every runtime primitive.
    pub fn new() -> Self {
        let mut functions: HashMap<&'static str, HostFnImpl> = HashMap::new();
        functions.insert("str_print", host_str_print);
        functions.insert("str_read", host_str_read);
        functions.insert("str_len", host_str_len);
        functions.insert("str_at", host_str_at);
        functions.insert("str_sub", host_str_sub);
        functions.insert("str_find", host_str_find);
        functions.insert("int_to_str", host_int_to_str);
        functions.insert("str_to_int", host_str_to_int);
        functions.insert("float_to_str", host_float_to_str);
        functions.insert("str_to_float", host_str_to_float);
        functions.insert("str_cmp", host_str_cmp);
        Self { functions }
    }

    pub fn get(&self, name: &str) -> Option<HostFnImpl> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

/// Per-execution runtime state: standard streams, the scratch buffer and
/// strings supplied from outside the program.
pub struct Runtime {
    registry: HostRegistry,
    scratch: [u8; BUFFER_SIZE],
    strings: Vec<Vec<u8>>,
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("strings", &self.strings.len())
            .finish()
    }
}

impl Runtime {
    pub fn new(input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Self {
            registry: HostRegistry::new(),
            scratch: [0; BUFFER_SIZE],
            strings: Vec::new(),
            input,
            output,
        }
    }

    /// Runtime wired to the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(
            Box::new(std::io::BufReader::new(std::io::stdin())),
            Box::new(std::io::stdout()),
        )
    }

    /// Make `s` addressable as a program string.
    pub fn intern(&mut self, s: &str) -> Pointer {
        self.strings.push(s.as_bytes().to_vec());
        Pointer::Host(self.strings.len() - 1)
    }

    pub fn call(&mut self, module: &Module, name: &str, args: &[Value]) -> Result<Value, HostError> {
        let Some(f) = self.registry.get(name) else {
            return Err(HostError::UnknownFunction(name.to_string()));
        };
        f(self, module, args)
    }

    pub fn flush(&mut self) -> Result<(), HostError> {
        self.output
            .flush()
            .map_err(|e| HostError::IoError(e.to_string()))
    }

    /// Bytes of the NUL-terminated string `p` points at, without the NUL.
    pub fn c_str(&self, module: &Module, p: Pointer) -> Result<Vec<u8>, HostError> {
        let bytes: &[u8] = match p {
            Pointer::Global(id) => match module.globals.get(id.0 as usize) {
                Some(g) => &g.bytes,
                None => return Err(HostError::InvalidPointer(format!("global #{}", id.0))),
            },
            Pointer::Scratch => &self.scratch,
            Pointer::Host(i) => match self.strings.get(i) {
                Some(s) => s,
                None => return Err(HostError::InvalidPointer(format!("host string #{}", i))),
            },
            Pointer::Func(id) => {
                let name = module
                    .functions
                    .get(id.0 as usize)
                    .map(|f| f.name.as_str())
                    .unwrap_or("?");
                return Err(HostError::InvalidPointer(format!(
                    "function @{} used as a string",
                    name
                )));
            }
        };
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(bytes[..end].to_vec())
    }

    /// Overwrite the scratch buffer; output longer than it is cut short.
    fn set_scratch(&mut self, bytes: &[u8]) -> Value {
        let n = bytes.len().min(BUFFER_SIZE - 1);
        self.scratch[..n].copy_from_slice(&bytes[..n]);
        self.scratch[n] = 0;
        Value::Ptr(Pointer::Scratch)
    }

    /// At most `limit` bytes, stopping after a newline, like `fgets`.
    fn read_line(&mut self, limit: usize) -> Result<Vec<u8>, HostError> {
        let mut line = Vec::new();
        while line.len() < limit {
            let buf = self
                .input
                .fill_buf()
                .map_err(|e| HostError::IoError(e.to_string()))?;
            let Some(&b) = buf.first() else {
                break;
            };
            self.input.consume(1);
            line.push(b);
            if b == b'\n' {
                break;
            }
        }
        Ok(line)
    }
}

fn expect_args(name: &str, args: &[Value], n: usize) -> Result<(), HostError> {
    if args.len() != n {
        return Err(HostError::TypeError(format!(
            "{} expects {} arguments, got {}",
            name,
            n,
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, args: &[Value], i: usize) -> Result<i32, HostError> {
    match args.get(i) {
        Some(Value::Int(n)) => Ok(*n as i32),
        other => Err(HostError::TypeError(format!(
            "{} expects an int as argument {}, got {:?}",
            name,
            i + 1,
            other
        ))),
    }
}

fn float_arg(name: &str, args: &[Value], i: usize) -> Result<f32, HostError> {
    match args.get(i) {
        Some(Value::Float(x)) => Ok(*x),
        other => Err(HostError::TypeError(format!(
            "{} expects a float as argument {}, got {:?}",
            name,
            i + 1,
            other
        ))),
    }
}

fn str_arg(
    rt: &Runtime,
    module: &Module,
    name: &str,
    args: &[Value],
    i: usize,
) -> Result<Vec<u8>, HostError> {
    match args.get(i) {
        Some(Value::Ptr(p)) => rt.c_str(module, *p),
        other => Err(HostError::TypeError(format!(
            "{} expects a string as argument {}, got {:?}",
            name,
            i + 1,
            other
        ))),
    }
}

fn host_str_print(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_print", args, 1)?;
    let s = str_arg(rt, module, "str_print", args, 0)?;
    rt.output
        .write_all(&s)
        .map_err(|e| HostError::IoError(e.to_string()))?;
    Ok(Value::Int(0))
}

fn host_str_read(rt: &mut Runtime, _module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_read", args, 1)?;
    let n = int_arg("str_read", args, 0)?;
    // room for n characters plus the NUL, capped by the buffer
    let size = (BUFFER_SIZE as i64).min(i64::from(n) + 1);
    rt.scratch[0] = 0;
    if size >= 2 {
        let mut line = rt.read_line(size as usize - 1)?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        return Ok(rt.set_scratch(&line));
    }
    Ok(Value::Ptr(Pointer::Scratch))
}

fn host_str_len(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_len", args, 1)?;
    let s = str_arg(rt, module, "str_len", args, 0)?;
    Ok(Value::Int(i64::from(s.len() as i32)))
}

fn host_str_at(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_at", args, 2)?;
    let s = str_arg(rt, module, "str_at", args, 0)?;
    let i = int_arg("str_at", args, 1)?;
    let c = usize::try_from(i)
        .ok()
        .and_then(|i| s.get(i).copied())
        .unwrap_or(0);
    Ok(Value::Int(i64::from(c as i8)))
}

fn host_str_sub(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_sub", args, 3)?;
    let s = str_arg(rt, module, "str_sub", args, 0)?;
    let start = int_arg("str_sub", args, 1)?;
    let end = int_arg("str_sub", args, 2)?;
    let len = s.len() as i64;
    let (start, end) = (i64::from(start), i64::from(end));
    if start < 0 || end < start || start >= len {
        return Ok(rt.set_scratch(b""));
    }
    let end = end.min(len);
    Ok(rt.set_scratch(&s[start as usize..end as usize]))
}

fn host_str_find(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_find", args, 2)?;
    let haystack = str_arg(rt, module, "str_find", args, 0)?;
    let needle = str_arg(rt, module, "str_find", args, 1)?;
    let found = if needle.is_empty() {
        Some(0)
    } else {
        haystack.windows(needle.len()).position(|w| w == needle.as_slice())
    };
    Ok(Value::Int(found.map_or(-1, |i| i as i64)))
}

fn host_int_to_str(rt: &mut Runtime, _module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("int_to_str", args, 1)?;
    let n = int_arg("int_to_str", args, 0)?;
    Ok(rt.set_scratch(n.to_string().as_bytes()))
}

fn host_str_to_int(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_to_int", args, 1)?;
    let s = str_arg(rt, module, "str_to_int", args, 0)?;
    Ok(Value::Int(i64::from(atoi(&s))))
}

fn host_float_to_str(rt: &mut Runtime, _module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("float_to_str", args, 1)?;
    let x = float_arg("float_to_str", args, 0)?;
    let text = if x.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.6}", x)
    };
    Ok(rt.set_scratch(text.as_bytes()))
}

fn host_str_to_float(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_to_float", args, 1)?;
    let s = str_arg(rt, module, "str_to_float", args, 0)?;
    Ok(Value::Float(atof(&s)))
}

fn host_str_cmp(rt: &mut Runtime, module: &Module, args: &[Value]) -> Result<Value, HostError> {
    expect_args("str_cmp", args, 2)?;
    let a = str_arg(rt, module, "str_cmp", args, 0)?;
    let b = str_arg(rt, module, "str_cmp", args, 1)?;
    Ok(Value::Int(i64::from(a == b)))
}

fn skip_space(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .unwrap_or(s.len());
    &s[start..]
}

/// Leading whitespace, optional sign, then digits; anything else ends the number.
fn atoi(s: &[u8]) -> i32 {
    let s = skip_space(s);
    let (neg, digits) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut n: i64 = 0;
    for d in digits.iter().take_while(|d| d.is_ascii_digit()) {
        n = n.saturating_mul(10).saturating_add(i64::from(d - b'0'));
    }
    (if neg { -n } else { n }) as i32
}

/// Longest decimal prefix, as `atof` reads it; 0.0 when there is none.
fn atof(s: &[u8]) -> f32 {
    let s = skip_space(s);
    let mut end = 0;
    if matches!(s.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let lower: Vec<u8> = s[end..].iter().take(8).map(|b| b.to_ascii_lowercase()).collect();
    for word in [&b"infinity"[..], b"inf", b"nan"] {
        if lower.starts_with(word) {
            let text = String::from_utf8_lossy(&s[..end + word.len()]).into_owned();
            return text.parse().unwrap_or(0.0);
        }
    }
    let int_digits = s[end..].iter().take_while(|b| b.is_ascii_digit()).count();
    end += int_digits;
    let mut frac_digits = 0;
    if s.get(end) == Some(&b'.') {
        frac_digits = s[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return 0.0;
    }
    if matches!(s.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(s.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = s[exp_end.min(s.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }
    let text = String::from_utf8_lossy(&s[..end]).into_owned();
    text.parse::<f64>().map(|x| x as f32).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lge_codegen::runtime::RUNTIME_FUNCTIONS;

    fn runtime(input: &str) -> Runtime {
        Runtime::new(
            Box::new(std::io::Cursor::new(input.as_bytes().to_vec())),
            Box::new(std::io::sink()),
        )
    }

    fn text(rt: &Runtime, m: &Module, v: Value) -> String {
        match v {
            Value::Ptr(p) => String::from_utf8(rt.c_str(m, p).unwrap()).unwrap(),
            other => panic!("expected pointer, got {other}"),
        }
    }

    #[test]
    fn registry_covers_every_declared_primitive() {
        let reg = HostRegistry::new();
        for f in RUNTIME_FUNCTIONS {
            assert!(reg.contains(f.name), "missing host impl for {}", f.name);
        }
    }

    #[test]
    fn scratch_results_alias() {
        let m = Module::new("m", "");
        let mut rt = runtime("");
        let a = rt.call(&m, "int_to_str", &[Value::Int(12)]).unwrap();
        let b = rt.call(&m, "int_to_str", &[Value::Int(345)]).unwrap();
        assert_eq!(a, b);
        assert_eq!(text(&rt, &m, a), "345");
    }

    #[test]
    fn str_at_out_of_range_is_nul() {
        let m = Module::new("m", "");
        let mut rt = runtime("");
        let s = Value::Ptr(rt.intern("abc"));
        assert_eq!(rt.call(&m, "str_at", &[s, Value::Int(1)]).unwrap(), Value::Int(98));
        assert_eq!(rt.call(&m, "str_at", &[s, Value::Int(3)]).unwrap(), Value::Int(0));
        assert_eq!(rt.call(&m, "str_at", &[s, Value::Int(-1)]).unwrap(), Value::Int(0));
    }

    #[test]
    fn str_sub_clamps_end_and_rejects_bad_start() {
        let m = Module::new("m", "");
        let mut rt = runtime("");
        let s = Value::Ptr(rt.intern("hello"));
        let v = rt.call(&m, "str_sub", &[s, Value::Int(1), Value::Int(99)]).unwrap();
        assert_eq!(text(&rt, &m, v), "ello");
        let v = rt.call(&m, "str_sub", &[s, Value::Int(3), Value::Int(2)]).unwrap();
        assert_eq!(text(&rt, &m, v), "");
        let v = rt.call(&m, "str_sub", &[s, Value::Int(5), Value::Int(6)]).unwrap();
        assert_eq!(text(&rt, &m, v), "");
    }

    #[test]
    fn str_find_and_cmp() {
        let m = Module::new("m", "");
        let mut rt = runtime("");
        let hay = Value::Ptr(rt.intern("banana"));
        let nan = Value::Ptr(rt.intern("nan"));
        let x = Value::Ptr(rt.intern("x"));
        assert_eq!(rt.call(&m, "str_find", &[hay, nan]).unwrap(), Value::Int(2));
        assert_eq!(rt.call(&m, "str_find", &[hay, x]).unwrap(), Value::Int(-1));
        assert_eq!(rt.call(&m, "str_cmp", &[hay, hay]).unwrap(), Value::Int(1));
        assert_eq!(rt.call(&m, "str_cmp", &[hay, x]).unwrap(), Value::Int(0));
    }

    #[test]
    fn str_read_strips_newline_and_respects_limit() {
        let m = Module::new("m", "");
        let mut rt = runtime("hello world\nnext\n");
        let v = rt.call(&m, "str_read", &[Value::Int(5)]).unwrap();
        assert_eq!(text(&rt, &m, v), "hello");
        // the rest of the line stays in the stream
        let v = rt.call(&m, "str_read", &[Value::Int(100)]).unwrap();
        assert_eq!(text(&rt, &m, v), " world");
        let v = rt.call(&m, "str_read", &[Value::Int(100)]).unwrap();
        assert_eq!(text(&rt, &m, v), "next");
        let v = rt.call(&m, "str_read", &[Value::Int(100)]).unwrap();
        assert_eq!(text(&rt, &m, v), "");
    }

    #[test]
    fn number_conversions_follow_c_library() {
        assert_eq!(atoi(b"  -42abc"), -42);
        assert_eq!(atoi(b"x1"), 0);
        assert_eq!(atof(b"3.5e2kg"), 350.0);
        assert_eq!(atof(b".5"), 0.5);
        assert_eq!(atof(b"1e"), 1.0);
        assert_eq!(atof(b"-"), 0.0);

        let m = Module::new("m", "");
        let mut rt = runtime("");
        let v = rt.call(&m, "float_to_str", &[Value::Float(1.5)]).unwrap();
        assert_eq!(text(&rt, &m, v), "1.500000");
    }

    #[test]
    fn wrong_argument_kind_is_type_error() {
        let m = Module::new("m", "");
        let mut rt = runtime("");
        let err = rt.call(&m, "str_len", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, HostError::TypeError(_)));
        let err = rt.call(&m, "printf", &[]).unwrap_err();
        assert_eq!(err.to_string(), "unknown host function: printf");
    }
}
