use crate::Span;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::types::{Number, Value};
use std::iter::Peekable;
use std::vec::IntoIter;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input, expected ')' or an expression")]
    UnexpectedEof,
    #[error("Unexpected ')' at {0}")]
    UnexpectedCloseParen(Span),
    #[error("Unexpected input after the expression at {0}")]
    TrailingTokens(Span),
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    /// True once every token has been consumed.
    pub fn is_exhausted(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    /// Reads one expression from the front of the token stream, leaving the
    /// rest for the caller.
    pub fn parse_expr(&mut self) -> ParseResult<Value> {
        match self.tokens.next() {
            None => Err(ParseError::UnexpectedEof),
            Some(Token {
                kind: TokenKind::LParen,
                ..
            }) => self.parse_list(),
            Some(Token {
                kind: TokenKind::RParen,
                span,
            }) => Err(ParseError::UnexpectedCloseParen(span)),
            Some(Token {
                kind: TokenKind::Atom(text),
                ..
            }) => Ok(parse_atom(&text)),
        }
    }

    // Called just after an opening paren has been consumed.
    fn parse_list(&mut self) -> ParseResult<Value> {
        let mut elements = Vec::new();
        loop {
            match self.tokens.peek() {
                None => return Err(ParseError::UnexpectedEof),
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => {
                    self.tokens.next();
                    return Ok(Value::list(elements));
                }
                Some(_) => elements.push(self.parse_expr()?),
            }
        }
    }

    fn next_span(&mut self) -> Option<Span> {
        self.tokens.peek().map(|token| token.span)
    }
}

/// Integer first, then float, otherwise the token is a symbol as written.
pub fn parse_atom(token: &str) -> Value {
    if let Ok(i) = token.parse::<i64>() {
        Value::Number(Number::Int(i))
    } else if let Ok(f) = token.parse::<f64>() {
        Value::Number(Number::Float(f))
    } else {
        Value::Symbol(token.to_string())
    }
}

/// Parses exactly one expression; anything left over is an error.
pub fn parse_str(input: &str) -> ParseResult<Value> {
    let mut parser = Parser::new(tokenize(input));
    let expr = parser.parse_expr()?;
    match parser.next_span() {
        Some(span) => Err(ParseError::TrailingTokens(span)),
        None => Ok(expr),
    }
}

/// Parses every top-level expression in `input`, in order.
pub fn parse_all(input: &str) -> ParseResult<Vec<Value>> {
    let mut parser = Parser::new(tokenize(input));
    let mut exprs = Vec::new();
    while !parser.is_exhausted() {
        exprs.push(parser.parse_expr()?);
    }
    Ok(exprs)
}
