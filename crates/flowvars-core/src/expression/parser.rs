//! Parser Pratt (precedence climbing) sobre los tokens de `lexer`.
use std::ops::Range;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::lexer::{tokenize, Token};
use super::ExpressionError;

/// (precedencia, operador); mayor precedencia liga más fuerte. Todos los
/// operadores binarios asocian a la izquierda.
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::Or => Some((10, BinaryOp::Or)),
        Token::And => Some((20, BinaryOp::And)),
        Token::EqEq => Some((30, BinaryOp::Eq)),
        Token::BangEq => Some((30, BinaryOp::Ne)),
        Token::Lt => Some((35, BinaryOp::Lt)),
        Token::LtEq => Some((35, BinaryOp::Le)),
        Token::Gt => Some((35, BinaryOp::Gt)),
        Token::GtEq => Some((35, BinaryOp::Ge)),
        Token::Plus => Some((40, BinaryOp::Add)),
        Token::Minus => Some((40, BinaryOp::Sub)),
        Token::Star => Some((50, BinaryOp::Mul)),
        Token::Slash => Some((50, BinaryOp::Div)),
        Token::Percent => Some((50, BinaryOp::Mod)),
        _ => None,
    }
}

/// Profundidad máxima de anidamiento (paréntesis, prefijos unarios y
/// encadenamiento de operadores binarios). Acota la recursión del parser y
/// del evaluador.
pub const MAX_NESTING: usize = 256;

struct TokenStream {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    source_len: usize,
    depth: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source_len)
    }

    fn unexpected(&self, expected: &str) -> ExpressionError {
        match self.peek() {
            Some(found) => ExpressionError::UnexpectedToken { found: found.to_string(),
                                                              expected: expected.to_string(),
                                                              offset: self.offset() },
            None => ExpressionError::UnexpectedEnd { expected: expected.to_string() },
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ExpressionError::TooDeep { max: MAX_NESTING,
                                                  offset: self.offset() });
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), ExpressionError> {
        if self.peek() == Some(&token) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }
}

/// Parsea `${ expr }` o `expr`. La entrada debe consumirse completa.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut stream = TokenStream { tokens,
                                   pos: 0,
                                   source_len: source.len(),
                                   depth: 0 };

    let templated = stream.peek() == Some(&Token::OpenTemplate);
    if templated {
        stream.advance();
        if stream.peek() == Some(&Token::CloseBrace) {
            return Err(ExpressionError::Empty);
        }
    }
    let expr = parse_pratt(&mut stream, 0)?;
    if templated {
        stream.expect(Token::CloseBrace, "'}'")?;
    }
    if stream.peek().is_some() {
        return Err(stream.unexpected("end of expression"));
    }
    Ok(expr)
}

fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ExpressionError> {
    let mut left = parse_prefix(stream)?;
    // cada operador encadenado profundiza el árbol por la izquierda
    let mut chained = 0;

    while let Some((prec, op)) = stream.peek().and_then(binary_op_info) {
        if prec < min_prec {
            break;
        }
        stream.advance();
        stream.enter()?;
        chained += 1;
        let right = parse_pratt(stream, prec + 1)?;
        left = Expr::Binary { op,
                              left: Box::new(left),
                              right: Box::new(right) };
    }

    stream.leave(chained);
    Ok(left)
}

fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ExpressionError> {
    let op = match stream.peek() {
        Some(Token::Not) => UnaryOp::Not,
        Some(Token::Minus) => UnaryOp::Neg,
        _ => return parse_atom(stream),
    };
    stream.advance();
    stream.enter()?;
    let operand = parse_prefix(stream)?;
    stream.leave(1);
    Ok(Expr::Unary { op,
                     operand: Box::new(operand) })
}

fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ExpressionError> {
    let expr = match stream.peek() {
        Some(Token::LParen) => {
            stream.advance();
            stream.enter()?;
            let inner = parse_pratt(stream, 0)?;
            stream.expect(Token::RParen, "')'")?;
            stream.leave(1);
            return Ok(inner);
        }
        Some(Token::True) => Expr::Literal(Literal::Bool(true)),
        Some(Token::False) => Expr::Literal(Literal::Bool(false)),
        Some(Token::Null) => Expr::Literal(Literal::Null),
        Some(Token::Int(v)) => Expr::Literal(Literal::Int(*v)),
        Some(Token::Float(v)) => Expr::Literal(Literal::Float(*v)),
        Some(Token::Str(s)) => Expr::Literal(Literal::Str(s.clone())),
        Some(Token::Ident(name)) => Expr::Ident(name.clone()),
        _ => return Err(stream.unexpected("operand")),
    };
    stream.advance();
    Ok(expr)
}
