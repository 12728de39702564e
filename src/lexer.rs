use logos::Logos;
use std::fmt;

use crate::Span;

/// Parentheses always stand alone; any other run of non-whitespace is one atom.
/// Quotes, semicolons and backslashes get no special treatment, so every
/// input tokenizes.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[^\s()]+", |lex| lex.slice().to_string())]
    Atom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Atom(s) => write!(f, "{}", s),
        }
    }
}

/// Splits `input` into paren and atom tokens, each tagged with its byte span.
pub fn tokenize(input: &str) -> Vec<Token> {
    // Whitespace, parens and atoms partition every character, so the lexer
    // never reports an error
    TokenKind::lexer(input)
        .spanned()
        .filter_map(|(result, range)| {
            result.ok().map(|kind| Token {
                kind,
                span: range.into(),
            })
        })
        .collect()
}
