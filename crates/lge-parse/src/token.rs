use lge_ast::location::Location;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokKind {
    // trivia / eof / error
    Eof,
    /// Unrecognized input; the token text carries the message
    Unknown,
    Newline,
    Backslash, // \ line continuation
    Comment,   // # through end of line
    // literals
    Identifier,
    StringLiteral,
    IntLiteral,
    FloatLiteral,
    // keywords
    Let,
    If,
    Then,
    Else,
    // type keywords
    TypeInt,
    TypeFloat,
    TypeChar,
    TypeStr,
    TypeFunc,
    // operators
    Arrow, // ->
    Plus,
    Minus,
    Multiply,
    Divide,
    Equals,
    // comparison
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    // delimiters
    LParen,
    RParen,
    Colon,
    Comma,
}

impl TokKind {
    /// Stable upper-case name used by token dumps.
    pub fn name(self) -> &'static str {
        match self {
            TokKind::Eof => "EOF",
            TokKind::Unknown => "UNKNOWN",
            TokKind::Newline => "NEWLINE",
            TokKind::Backslash => "BACKSLASH",
            TokKind::Comment => "COMMENT",
            TokKind::Identifier => "IDENTIFIER",
            TokKind::StringLiteral => "STRING_LITERAL",
            TokKind::IntLiteral => "INT_LITERAL",
            TokKind::FloatLiteral => "FLOAT_LITERAL",
            TokKind::Let => "LET",
            TokKind::If => "IF",
            TokKind::Then => "THEN",
            TokKind::Else => "ELSE",
            TokKind::TypeInt => "TYPE_INT",
            TokKind::TypeFloat => "TYPE_FLOAT",
            TokKind::TypeChar => "TYPE_CHAR",
            TokKind::TypeStr => "TYPE_STR",
            TokKind::TypeFunc => "TYPE_FUNC",
            TokKind::Arrow => "ARROW",
            TokKind::Plus => "PLUS",
            TokKind::Minus => "MINUS",
            TokKind::Multiply => "MULTIPLY",
            TokKind::Divide => "DIVIDE",
            TokKind::Equals => "EQUALS",
            TokKind::LessThan => "LESS_THAN",
            TokKind::GreaterThan => "GREATER_THAN",
            TokKind::LessEqual => "LESS_EQUAL",
            TokKind::GreaterEqual => "GREATER_EQUAL",
            TokKind::EqualEqual => "EQUAL_EQUAL",
            TokKind::NotEqual => "NOT_EQUAL",
            TokKind::LParen => "LPAREN",
            TokKind::RParen => "RPAREN",
            TokKind::Colon => "COLON",
            TokKind::Comma => "COMMA",
        }
    }

    /// Tokens the grammar never looks at. They still matter for recovery.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokKind::Newline | TokKind::Comment | TokKind::Backslash)
    }
}

/// Keyword table. A `match` keeps lookup independent of any hashing order.
pub fn keyword(text: &str) -> Option<TokKind> {
    let kind = match text {
        "let" => TokKind::Let,
        "if" => TokKind::If,
        "then" => TokKind::Then,
        "else" => TokKind::Else,
        "int" => TokKind::TypeInt,
        "float" => TokKind::TypeFloat,
        "char" => TokKind::TypeChar,
        "str" => TokKind::TypeStr,
        "func" => TokKind::TypeFunc,
        _ => return None,
    };
    Some(kind)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tok {
    pub kind: TokKind,
    /// Source text, the unescaped string value, or the message of an `Unknown` token.
    pub text: String,
    pub location: Location,
}

impl Tok {
    pub fn is_eof(&self) -> bool {
        self.kind == TokKind::Eof
    }
}
