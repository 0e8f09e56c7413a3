use crate::lexer::tokenize;
use crate::token::{Tok, TokKind};
use lge_ast::ast::{BinOp, Expr, FunctionDef, Param, Program, Type, TypeKind, UnOp};
use lge_ast::location::Location;
use std::fmt;

/// A grammar violation, located at the token that broke the rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub location: Location,
    /// Text of the offending token; `None` when it was the end of input.
    pub near: Option<String>,
}

impl ParseError {
    fn at(tok: &Tok, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: tok.location.clone(),
            near: (!tok.is_eof()).then(|| tok.text.clone()),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.near {
            Some(text) => write!(
                f,
                "Error at {} near '{}': {}",
                self.location, text, self.message
            ),
            None => write!(f, "Error at end of file: {}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Every function that parsed cleanly, plus one diagnostic per discarded definition.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub program: Program,
    pub diagnostics: Vec<ParseError>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

pub fn parse_str(file: &str, src: &str) -> ParseOutput {
    parse(tokenize(file, src))
}

pub fn parse(toks: Vec<Tok>) -> ParseOutput {
    let mut p = Parser::new(toks);
    p.parse_program()
}

type PResult<T> = Result<T, ParseError>;

struct Parser {
    toks: Vec<Tok>,
    /// Raw cursor; may rest on trivia.
    pos: usize,
}

impl Parser {
    fn new(mut toks: Vec<Tok>) -> Self {
        if !toks.last().is_some_and(Tok::is_eof) {
            let location = toks
                .last()
                .map(|t| t.location.clone())
                .unwrap_or_else(|| Location::new(1, 1, ""));
            toks.push(Tok {
                kind: TokKind::Eof,
                text: String::new(),
                location,
            });
        }
        Self { toks, pos: 0 }
    }

    /// Index of the first significant token at or after the cursor.
    fn cur_idx(&self) -> usize {
        let mut i = self.pos;
        while self.toks[i].kind.is_trivia() {
            i += 1;
        }
        i
    }

    fn cur(&self) -> &Tok {
        &self.toks[self.cur_idx()]
    }

    fn at(&self, k: TokKind) -> bool {
        self.cur().kind == k
    }

    fn bump(&mut self) -> Tok {
        let i = self.cur_idx();
        let t = self.toks[i].clone();
        if !t.is_eof() {
            self.pos = i + 1;
        }
        t
    }

    fn eat(&mut self, k: TokKind) -> bool {
        if self.at(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, k: TokKind, msg: &str) -> PResult<Tok> {
        if self.at(k) {
            Ok(self.bump())
        } else {
            Err(self.error(msg))
        }
    }

    fn error(&self, msg: &str) -> ParseError {
        ParseError::at(self.cur(), msg)
    }

    // ======= program / functions =======

    fn parse_program(&mut self) -> ParseOutput {
        let mut functions = Vec::new();
        let mut diagnostics = Vec::new();
        let mut recovering = false;
        while !self.at(TokKind::Eof) {
            // continuation lines of a rejected definition are dropped silently
            if recovering && !self.at(TokKind::Let) {
                self.skip_to_let();
                continue;
            }
            recovering = false;
            match self.parse_function() {
                Ok(f) => functions.push(f),
                Err(e) => {
                    diagnostics.push(e);
                    self.synchronize();
                    recovering = true;
                }
            }
        }
        ParseOutput {
            program: Program { functions },
            diagnostics,
        }
    }

    /// Skip to the next definition boundary: just past a newline, or up to a `let`.
    fn synchronize(&mut self) {
        if !self.at(TokKind::Let) {
            self.bump();
        }
        while let Some(t) = self.toks.get(self.pos) {
            match t.kind {
                TokKind::Eof | TokKind::Let => return,
                TokKind::Newline => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_to_let(&mut self) {
        while !self.at(TokKind::Let) && !self.at(TokKind::Eof) {
            self.bump();
        }
    }

    // let NAME : Type = ( Params? ) -> Expression
    fn parse_function(&mut self) -> PResult<FunctionDef> {
        self.expect(TokKind::Let, "Expected 'let' at start of function definition")?;
        let name = self.expect(TokKind::Identifier, "Expected function name after 'let'")?;
        self.expect(TokKind::Colon, "Expected ':' after function name")?;
        let return_type = self.parse_type()?;
        self.expect(TokKind::Equals, "Expected '=' after return type")?;
        self.expect(TokKind::LParen, "Expected '(' for function parameters")?;
        let params = self.parse_params()?;
        self.expect(TokKind::RParen, "Expected ')' after function parameters")?;
        self.expect(TokKind::Arrow, "Expected '->' after parameters")?;
        let body = self.parse_expr()?;

        Ok(FunctionDef {
            name: name.text,
            return_type,
            params,
            body,
            location: name.location,
        })
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let kind = match self.cur().kind {
            TokKind::TypeInt => TypeKind::Int,
            TokKind::TypeFloat => TypeKind::Float,
            TokKind::TypeChar => TypeKind::Char,
            TokKind::TypeStr => TypeKind::Str,
            // no nested signature: `func` is an opaque value kind
            TokKind::TypeFunc => TypeKind::Func,
            _ => return Err(self.error("Expected type identifier")),
        };
        let tok = self.bump();
        Ok(Type::new(kind, tok.location))
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.at(TokKind::RParen) {
            return Ok(params);
        }
        loop {
            let name = self.expect(TokKind::Identifier, "Expected parameter name")?;
            self.expect(TokKind::Colon, "Expected ':' after parameter name")?;
            let ty = self.parse_type()?;
            params.push(Param {
                name: name.text,
                ty,
                location: name.location,
            });
            if !self.eat(TokKind::Comma) {
                return Ok(params);
            }
        }
    }

    // ======= expressions (precedence climbing) =======
    //
    // Lowest to highest:
    //   if-then-else      (only where a full Expression is expected)
    //   < > <= >= == !=
    //   + -
    //   * /
    //   unary -
    // Operands of binary operators never recurse into parse_expr, so a
    // conditional can't appear as `1 + if ...`.

    fn parse_expr(&mut self) -> PResult<Expr> {
        if self.eat(TokKind::If) {
            return self.parse_conditional();
        }
        self.parse_comparison()
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let cond = self.parse_comparison()?;
        self.expect(TokKind::Then, "Expected 'then' after if condition")?;
        let then_ = self.parse_expr()?;
        self.expect(TokKind::Else, "Expected 'else' after then expression")?;
        let else_ = self.parse_expr()?;
        let location = cond.location().clone();
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then_: Box::new(then_),
            else_: Box::new(else_),
            location,
        })
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_addition()?;
        loop {
            let op = match self.cur().kind {
                TokKind::LessThan => BinOp::Lt,
                TokKind::GreaterThan => BinOp::Gt,
                TokKind::LessEqual => BinOp::Le,
                TokKind::GreaterEqual => BinOp::Ge,
                TokKind::EqualEqual => BinOp::Eq,
                TokKind::NotEqual => BinOp::Ne,
                _ => return Ok(lhs),
            };
            let op_tok = self.bump();
            let rhs = self.parse_addition()?;
            lhs = binary(op, lhs, rhs, op_tok.location);
        }
    }

    fn parse_addition(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplication()?;
        loop {
            let op = match self.cur().kind {
                TokKind::Plus => BinOp::Add,
                TokKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let op_tok = self.bump();
            let rhs = self.parse_multiplication()?;
            lhs = binary(op, lhs, rhs, op_tok.location);
        }
    }

    fn parse_multiplication(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.cur().kind {
                TokKind::Multiply => BinOp::Mul,
                TokKind::Divide => BinOp::Div,
                _ => return Ok(lhs),
            };
            let op_tok = self.bump();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs, op_tok.location);
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.at(TokKind::Minus) {
            let op_tok = self.bump();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Neg,
                operand: Box::new(operand),
                location: op_tok.location,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.cur().kind {
            TokKind::StringLiteral => {
                let t = self.bump();
                Ok(Expr::StringLiteral {
                    value: t.text,
                    location: t.location,
                })
            }
            TokKind::IntLiteral => {
                let value = self
                    .cur()
                    .text
                    .parse::<i32>()
                    .map_err(|_| self.error("Integer literal out of range"))?;
                let t = self.bump();
                Ok(Expr::IntLiteral {
                    value,
                    location: t.location,
                })
            }
            TokKind::FloatLiteral => {
                let value = self
                    .cur()
                    .text
                    .parse::<f32>()
                    .map_err(|_| self.error("Invalid float literal"))?;
                let t = self.bump();
                Ok(Expr::FloatLiteral {
                    value,
                    location: t.location,
                })
            }
            TokKind::Identifier => {
                let t = self.bump();
                if self.at(TokKind::LParen) {
                    let args = self.parse_call_args()?;
                    return Ok(Expr::Call {
                        callee: t.text,
                        args,
                        location: t.location,
                    });
                }
                Ok(Expr::Identifier {
                    name: t.text,
                    location: t.location,
                })
            }
            TokKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokKind::RParen, "Expected ')' after expression")?;
                Ok(inner)
            }
            _ => Err(self.error("Expected expression")),
        }
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokKind::LParen, "Expected '(' after function name")?;
        let mut args = Vec::new();
        if !self.at(TokKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(TokKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokKind::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, location: Location) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        location,
    }
}
