//! Tokens del lenguaje de condiciones (lexer con `logos`).
//!
//! Acepta la forma envuelta `${ ... }` y la forma desnuda. Los operadores
//! tienen alias en palabra (`and`, `or`, `not`, `eq`, `ne`, `lt`, `le`, `gt`,
//! `ge`).
use std::fmt;
use std::ops::Range;

use logos::Logos;

use super::ExpressionError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("${")]
    OpenTemplate,
    #[token("}")]
    CloseBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token("||")]
    #[token("or")]
    Or,
    #[token("&&")]
    #[token("and")]
    And,
    #[token("!")]
    #[token("not")]
    Not,
    #[token("==")]
    #[token("eq")]
    EqEq,
    #[token("!=")]
    #[token("ne")]
    BangEq,
    #[token("<=")]
    #[token("le")]
    LtEq,
    #[token(">=")]
    #[token("ge")]
    GtEq,
    #[token("<")]
    #[token("lt")]
    Lt,
    #[token(">")]
    #[token("gt")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unescape(lex.slice()))]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::OpenTemplate => f.write_str("'${'"),
            Token::CloseBrace => f.write_str("'}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Or => f.write_str("'||'"),
            Token::And => f.write_str("'&&'"),
            Token::Not => f.write_str("'!'"),
            Token::EqEq => f.write_str("'=='"),
            Token::BangEq => f.write_str("'!='"),
            Token::LtEq => f.write_str("'<='"),
            Token::GtEq => f.write_str("'>='"),
            Token::Lt => f.write_str("'<'"),
            Token::Gt => f.write_str("'>'"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::True => f.write_str("true"),
            Token::False => f.write_str("false"),
            Token::Null => f.write_str("null"),
            Token::Float(v) => write!(f, "number {v}"),
            Token::Int(v) => write!(f, "number {v}"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::Ident(s) => write!(f, "identifier '{s}'"),
        }
    }
}

/// Quita comillas y resuelve escapes simples (`\\`, `\"`, `\'`, `\n`, `\t`).
fn unescape(quoted: &str) -> Option<String> {
    let inner = quoted.get(1..quoted.len().checked_sub(1)?)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            other => out.push(other),
        }
    }
    Some(out)
}

/// Tokeniza la fuente completa, con el rango de bytes de cada token.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, ExpressionError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(ExpressionError::Lex { start: span.start,
                                                  end: span.end })
            }
        }
    }
    Ok(tokens)
}
