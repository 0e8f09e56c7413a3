pub mod location {
    use serde::Serialize;
    use std::fmt;

    /// 1-based source position plus the name of the unit it came from.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub struct Location {
        pub line: u32,
        pub column: u32,
        pub file: String,
    }

    impl Location {
        pub fn new(line: u32, column: u32, file: impl Into<String>) -> Self {
            Self {
                line,
                column,
                file: file.into(),
            }
        }
    }

    impl fmt::Display for Location {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

pub mod ast {
    use super::location::Location;
    use serde::Serialize;
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Program {
        pub functions: Vec<FunctionDef>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct FunctionDef {
        pub name: String,
        pub return_type: Type,
        pub params: Vec<Param>,
        pub body: Expr, // exactly one body expression, no statements
        pub location: Location,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Param {
        pub name: String,
        pub ty: Type,
        pub location: Location,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum TypeKind {
        Int,
        Float,
        Char,
        Str,
        Func,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Type {
        pub kind: TypeKind,
        /// Only meaningful for `func`; the parser leaves it empty.
        pub params: Vec<Type>,
        /// Only meaningful for `func`; the parser leaves it unset.
        pub ret: Option<Box<Type>>,
        pub location: Location,
    }

    impl Type {
        pub fn new(kind: TypeKind, location: Location) -> Self {
            Self {
                kind,
                params: Vec::new(),
                ret: None,
                location,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Expr {
        StringLiteral {
            value: String,
            location: Location,
        },
        IntLiteral {
            value: i32,
            location: Location,
        },
        FloatLiteral {
            value: f32,
            location: Location,
        },
        Identifier {
            name: String,
            location: Location,
        },
        Unary {
            op: UnOp,
            operand: Box<Expr>,
            location: Location,
        },
        Binary {
            op: BinOp,
            lhs: Box<Expr>,
            rhs: Box<Expr>,
            location: Location,
        },
        Call {
            callee: String,
            args: Vec<Expr>,
            location: Location,
        },
        Conditional {
            cond: Box<Expr>,
            then_: Box<Expr>,
            else_: Box<Expr>,
            location: Location,
        },
    }

    impl Expr {
        pub fn location(&self) -> &Location {
            match self {
                Expr::StringLiteral { location, .. }
                | Expr::IntLiteral { location, .. }
                | Expr::FloatLiteral { location, .. }
                | Expr::Identifier { location, .. }
                | Expr::Unary { location, .. }
                | Expr::Binary { location, .. }
                | Expr::Call { location, .. }
                | Expr::Conditional { location, .. } => location,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum UnOp {
        Neg,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        // arithmetic
        Add,
        Sub,
        Mul,
        Div,
        // relational
        Lt,
        Gt,
        Le,
        Ge,
        // equality
        Eq,
        Ne,
    }

    impl BinOp {
        pub fn symbol(self) -> &'static str {
            match self {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Lt => "<",
                BinOp::Gt => ">",
                BinOp::Le => "<=",
                BinOp::Ge => ">=",
                BinOp::Eq => "==",
                BinOp::Ne => "!=",
            }
        }

        pub fn is_comparison(self) -> bool {
            !matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
        }
    }

    // ======= tree dump =======

    impl fmt::Display for TypeKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = match self {
                TypeKind::Int => "int",
                TypeKind::Float => "float",
                TypeKind::Char => "char",
                TypeKind::Str => "str",
                TypeKind::Func => "func",
            };
            f.write_str(s)
        }
    }

    impl fmt::Display for Type {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if self.kind != TypeKind::Func || (self.params.is_empty() && self.ret.is_none()) {
                return write!(f, "{}", self.kind);
            }
            write!(f, "(")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", p)?;
            }
            match &self.ret {
                Some(ret) => write!(f, ") -> {}", ret),
                None => write!(f, ") -> void"),
            }
        }
    }

    /// Indented tree rendering used by `--dump-ast`.
    impl fmt::Display for Program {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "Program:")?;
            for func in &self.functions {
                write_function(f, func, 1)?;
            }
            Ok(())
        }
    }

    fn pad(f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{:width$}", "", width = indent * 2)
    }

    fn write_function(f: &mut fmt::Formatter<'_>, func: &FunctionDef, indent: usize) -> fmt::Result {
        pad(f, indent)?;
        writeln!(f, "FunctionDef: {}", func.name)?;
        pad(f, indent + 1)?;
        writeln!(f, "ReturnType: {}", func.return_type)?;
        if !func.params.is_empty() {
            pad(f, indent + 1)?;
            writeln!(f, "Parameters:")?;
            for p in &func.params {
                pad(f, indent + 2)?;
                writeln!(f, "{}: {}", p.name, p.ty)?;
            }
        }
        pad(f, indent + 1)?;
        writeln!(f, "Body:")?;
        write_expr(f, &func.body, indent + 2)
    }

    fn write_expr(f: &mut fmt::Formatter<'_>, e: &Expr, indent: usize) -> fmt::Result {
        pad(f, indent)?;
        match e {
            Expr::StringLiteral { value, .. } => writeln!(f, "StringLiteral: {:?}", value),
            Expr::IntLiteral { value, .. } => writeln!(f, "IntLiteral: {}", value),
            Expr::FloatLiteral { value, .. } => writeln!(f, "FloatLiteral: {}", value),
            Expr::Identifier { name, .. } => writeln!(f, "Identifier: {}", name),
            Expr::Unary {
                op: UnOp::Neg,
                operand,
                ..
            } => {
                writeln!(f, "UnaryOp: -")?;
                write_expr(f, operand, indent + 1)
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                writeln!(f, "BinaryOp: {}", op.symbol())?;
                write_expr(f, lhs, indent + 1)?;
                write_expr(f, rhs, indent + 1)
            }
            Expr::Call { callee, args, .. } => {
                writeln!(f, "FunctionCall: {}", callee)?;
                for arg in args {
                    write_expr(f, arg, indent + 1)?;
                }
                Ok(())
            }
            Expr::Conditional {
                cond, then_, else_, ..
            } => {
                writeln!(f, "ConditionalExpression:")?;
                pad(f, indent + 1)?;
                writeln!(f, "Condition:")?;
                write_expr(f, cond, indent + 2)?;
                pad(f, indent + 1)?;
                writeln!(f, "Then:")?;
                write_expr(f, then_, indent + 2)?;
                pad(f, indent + 1)?;
                writeln!(f, "Else:")?;
                write_expr(f, else_, indent + 2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ast::*;
    use super::location::Location;

    fn loc() -> Location {
        Location::new(1, 1, "<test>")
    }

    #[test]
    fn program_dump_is_indented_tree() {
        let program = Program {
            functions: vec![FunctionDef {
                name: "neg".into(),
                return_type: Type::new(TypeKind::Int, loc()),
                params: vec![Param {
                    name: "x".into(),
                    ty: Type::new(TypeKind::Int, loc()),
                    location: loc(),
                }],
                body: Expr::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(Expr::Identifier {
                        name: "x".into(),
                        location: loc(),
                    }),
                    location: loc(),
                },
                location: loc(),
            }],
        };
        let dump = program.to_string();
        assert_eq!(
            dump,
            "Program:\n  FunctionDef: neg\n    ReturnType: int\n    Parameters:\n      x: int\n    Body:\n      UnaryOp: -\n        Identifier: x\n"
        );
    }

    #[test]
    fn func_type_without_signature_prints_keyword() {
        assert_eq!(Type::new(TypeKind::Func, loc()).to_string(), "func");
        let mut t = Type::new(TypeKind::Func, loc());
        t.params.push(Type::new(TypeKind::Int, loc()));
        assert_eq!(t.to_string(), "(int) -> void");
    }

    #[test]
    fn location_displays_file_line_column() {
        assert_eq!(Location::new(3, 7, "a.lge").to_string(), "a.lge:3:7");
    }
}
