pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

pub use environment::{EnvError, EnvRef, Environment};
pub use evaluator::{EvalError, EvalResult, apply, evaluate};
pub use interpreter::{Error, Interpreter};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_all, parse_str};
pub use source::Span;
pub use types::{Builtin, Lambda, Number, Value};
