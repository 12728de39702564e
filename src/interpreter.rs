use crate::environment::{EnvRef, Environment};
use crate::evaluator::{EvalError, evaluate};
use crate::parser::{ParseError, parse_all, parse_str};
use crate::primitives::standard_builtins;
use crate::types::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// One interpreter session. Owns the global environment that every
/// expression evaluated through it shares; sessions share nothing with
/// each other.
pub struct Interpreter {
    global: EnvRef,
}

impl Interpreter {
    /// A session with the standard builtin table.
    pub fn new() -> Self {
        Interpreter::with_builtins(standard_builtins())
    }

    /// A session whose global environment starts with exactly `builtins`.
    pub fn with_builtins<I, S>(builtins: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Interpreter {
            global: Environment::new_global(builtins),
        }
    }

    pub fn global(&self) -> &EnvRef {
        &self.global
    }

    /// Parses exactly one expression from `input` and evaluates it.
    pub fn eval_str(&self, input: &str) -> Result<Value, Error> {
        let expr = parse_str(input)?;
        Ok(evaluate(&expr, &self.global)?)
    }

    /// Evaluates every expression in `input` in order and returns the last
    /// result, stopping at the first error.
    pub fn eval_all(&self, input: &str) -> Result<Value, Error> {
        let mut last = Value::Unspecified;
        for expr in parse_all(input)? {
            last = evaluate(&expr, &self.global)?;
        }
        Ok(last)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}
