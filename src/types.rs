use crate::environment::EnvRef;
use crate::evaluator::EvalResult;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            // Debug keeps a ".0" or an exponent, so the text reads back as a float
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// A value is both the result of evaluation and the syntax tree the parser
/// produces: `(+ 1 2)` is read as a `List` of a `Symbol` and two `Number`s.
#[derive(Clone)]
pub enum Value {
    Number(Number),
    Symbol(String),
    /// The empty list doubles as nil and as the false value.
    List(Rc<[Value]>),
    Procedure(Rc<Lambda>),
    Builtin(Builtin),
    /// Result of `define` and `set!`; the REPL prints nothing for it.
    Unspecified,
}

impl Value {
    pub fn int(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }

    pub fn float(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }

    pub fn symbol(name: &str) -> Self {
        Value::Symbol(name.to_string())
    }

    pub fn list(elements: Vec<Value>) -> Self {
        Value::List(elements.into())
    }

    pub fn nil() -> Self {
        Value::List(Rc::from([]))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(elements) if elements.is_empty())
    }

    /// Everything is true except `()`, numeric zero and the unspecified value.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::List(elements) => !elements.is_empty(),
            Value::Number(n) => !n.is_zero(),
            Value::Unspecified => false,
            Value::Symbol(_) | Value::Procedure(_) | Value::Builtin(_) => true,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(Number::Int(_)) => "integer",
            Value::Number(Number::Float(_)) => "float",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Procedure(_) => "procedure",
            Value::Builtin(_) => "builtin",
            Value::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, ")")
            }
            Value::Procedure(lambda) => write!(f, "#<procedure ({})>", lambda.params.join(" ")),
            Value::Builtin(builtin) => write!(f, "#<builtin:{}>", builtin.name),
            Value::Unspecified => Ok(()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({:?})", n),
            Value::Symbol(s) => write!(f, "Symbol({})", s),
            Value::List(elements) => f.debug_list().entries(elements.iter()).finish(),
            Value::Procedure(lambda) => write!(f, "{:?}", lambda),
            Value::Builtin(builtin) => write!(f, "{:?}", builtin),
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

// Procedures compare by identity, builtins by name; everything else structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Unspecified, Value::Unspecified) => true,
            _ => false,
        }
    }
}

/// A user procedure created by `lambda`.
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Value,
    /// Frame active when the lambda was evaluated, not the caller's.
    pub env: EnvRef,
}

impl fmt::Debug for Lambda {
    // The captured environment may contain this very lambda
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lambda({:?} -> {})", self.params, self.body)
    }
}

pub type BuiltinFunc = fn(&[Value]) -> EvalResult;

#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    func: BuiltinFunc,
}

impl Builtin {
    pub fn new(name: &'static str, func: BuiltinFunc) -> Self {
        Builtin { name, func }
    }

    pub fn call(&self, args: &[Value]) -> EvalResult {
        (self.func)(args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}
