use crate::environment::{EnvError, EnvRef, Environment};
use crate::types::{Lambda, Value};
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError),
    #[error("Malformed special form: {0}")]
    MalformedSpecialForm(String),
    #[error("Expected a procedure, but got: {0}")]
    NotAProcedure(Value),
    #[error("Type mismatch: expected {expected}, found {}", .found.type_name())]
    TypeMismatch { expected: &'static str, found: Value },
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Division by zero")]
    DivisionByZero,
}

pub type EvalResult<T = Value> = Result<T, EvalError>;

const SPECIAL_FORMS: [&str; 5] = ["quote", "if", "define", "set!", "lambda"];

/// Keywords handled by the evaluator itself rather than by the environment.
pub fn special_form_identifiers() -> HashSet<String> {
    SPECIAL_FORMS.iter().map(|s| s.to_string()).collect()
}

/// Evaluates `expr` in `env`.
///
/// Plain recursion with no tail-call elimination: very deep recursion in the
/// evaluated program overflows the native stack.
pub fn evaluate(expr: &Value, env: &EnvRef) -> EvalResult {
    match expr {
        Value::Symbol(name) => Ok(Environment::lookup(env, name)?),
        Value::Number(_) | Value::Procedure(_) | Value::Builtin(_) | Value::Unspecified => {
            Ok(expr.clone())
        }
        Value::List(elements) => match &elements[..] {
            // () is nil and evaluates to itself
            [] => Ok(expr.clone()),
            [first, rest @ ..] => match first {
                Value::Symbol(keyword) if keyword == "quote" => evaluate_quote(rest),
                Value::Symbol(keyword) if keyword == "if" => evaluate_if(rest, env),
                Value::Symbol(keyword) if keyword == "define" => evaluate_define(rest, env),
                Value::Symbol(keyword) if keyword == "set!" => evaluate_set(rest, env),
                Value::Symbol(keyword) if keyword == "lambda" => evaluate_lambda(rest, env),
                _ => evaluate_procedure(first, rest, env),
            },
        },
    }
}

/// Invokes a procedure or builtin on already-evaluated arguments.
pub fn apply(procedure: &Value, args: Vec<Value>) -> EvalResult {
    match procedure {
        Value::Builtin(builtin) => {
            trace!(name = builtin.name, argc = args.len(), "calling builtin");
            builtin.call(&args)
        }
        Value::Procedure(lambda) => {
            trace!(params = ?lambda.params, argc = args.len(), "calling procedure");
            // The new frame hangs off the defining environment, not the caller's
            let frame = Environment::bind(&lambda.params, args, Rc::clone(&lambda.env))?;
            evaluate(&lambda.body, &frame)
        }
        other => Err(EvalError::NotAProcedure(other.clone())),
    }
}

fn evaluate_procedure(operator: &Value, operands: &[Value], env: &EnvRef) -> EvalResult {
    let procedure = evaluate(operator, env)?;
    if !matches!(procedure, Value::Procedure(_) | Value::Builtin(_)) {
        return Err(EvalError::NotAProcedure(procedure));
    }

    let args = operands
        .iter()
        .map(|operand| evaluate(operand, env))
        .collect::<EvalResult<Vec<_>>>()?;

    apply(&procedure, args)
}

fn evaluate_quote(operands: &[Value]) -> EvalResult {
    match operands {
        [datum] => Ok(datum.clone()),
        _ => Err(EvalError::MalformedSpecialForm(
            "quote expects exactly one operand".to_string(),
        )),
    }
}

fn evaluate_if(operands: &[Value], env: &EnvRef) -> EvalResult {
    match operands {
        [test, consequent, alternative] => {
            if evaluate(test, env)?.is_truthy() {
                evaluate(consequent, env)
            } else {
                evaluate(alternative, env)
            }
        }
        _ => Err(EvalError::MalformedSpecialForm(
            "if expects a test, a consequent and an alternative".to_string(),
        )),
    }
}

fn evaluate_define(operands: &[Value], env: &EnvRef) -> EvalResult {
    match operands {
        [Value::Symbol(name), value_expr] => {
            let value = evaluate(value_expr, env)?;
            debug!(%name, %value, "define");
            Environment::define(env, name, value);
            Ok(Value::Unspecified)
        }
        _ => Err(EvalError::MalformedSpecialForm(
            "define expects a symbol and an expression".to_string(),
        )),
    }
}

fn evaluate_set(operands: &[Value], env: &EnvRef) -> EvalResult {
    match operands {
        [Value::Symbol(name), value_expr] => {
            let value = evaluate(value_expr, env)?;
            debug!(%name, %value, "set!");
            Environment::assign(env, name, value)?;
            Ok(Value::Unspecified)
        }
        _ => Err(EvalError::MalformedSpecialForm(
            "set! expects a symbol and an expression".to_string(),
        )),
    }
}

fn evaluate_lambda(operands: &[Value], env: &EnvRef) -> EvalResult {
    let [Value::List(param_list), body] = operands else {
        return Err(EvalError::MalformedSpecialForm(
            "lambda expects a parameter list and a single body expression".to_string(),
        ));
    };
    let params = param_list
        .iter()
        .map(|param| {
            param.as_symbol().map(str::to_string).ok_or_else(|| {
                EvalError::MalformedSpecialForm(format!(
                    "lambda parameter must be a symbol, got {}",
                    param
                ))
            })
        })
        .collect::<EvalResult<Vec<String>>>()?;

    Ok(Value::Procedure(Rc::new(Lambda {
        params,
        body: body.clone(),
        env: Rc::clone(env),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::primitives::standard_builtins;
    use crate::types::Number;

    fn global() -> EnvRef {
        Environment::new_global(standard_builtins())
    }

    fn eval_in(input: &str, env: &EnvRef) -> EvalResult {
        match parse_str(input) {
            Ok(expr) => evaluate(&expr, env),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    fn assert_eval(input: &str, expected: Value, env: Option<&EnvRef>) {
        let fresh = global();
        let env = env.unwrap_or(&fresh);
        match eval_in(input, env) {
            Ok(value) => assert_eq!(value, expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Compares only the error variant, not its payload
    fn assert_eval_error(input: &str, expected_error_variant: &EvalError, env: Option<&EnvRef>) {
        let fresh = global();
        let env = env.unwrap_or(&fresh);
        match eval_in(input, env) {
            Ok(value) => panic!(
                "Expected evaluation to fail for input '{}', but got: {}",
                input, value
            ),
            Err(e) => assert_eq!(
                std::mem::discriminant(&e),
                std::mem::discriminant(expected_error_variant),
                "Input: '{}', expected error like {:?}, got: {:?}",
                input,
                expected_error_variant,
                e
            ),
        }
    }

    fn unbound() -> EvalError {
        EvalError::EnvError(EnvError::UnboundVariable(String::new()))
    }

    fn malformed() -> EvalError {
        EvalError::MalformedSpecialForm(String::new())
    }

    #[test]
    fn test_eval_self_evaluating() {
        assert_eval("123", Value::int(123), None);
        assert_eval("-4.5", Value::float(-4.5), None);
        assert_eval("()", Value::nil(), None);
    }

    #[test]
    fn test_eval_symbol_lookup() {
        let env = Environment::new_global([("x", Value::int(100))]);
        assert_eval("x", Value::int(100), Some(&env));
        assert_eval_error("y", &unbound(), Some(&env));
    }

    #[test]
    fn test_eval_quote() {
        assert_eval(
            "(quote (1 2 3))",
            Value::list(vec![Value::int(1), Value::int(2), Value::int(3)]),
            None,
        );
        assert_eval("(quote a)", Value::symbol("a"), None);
        // The quoted list is not evaluated, so the unbound head is fine
        assert_eval(
            "(quote (undefined-fn x))",
            Value::list(vec![Value::symbol("undefined-fn"), Value::symbol("x")]),
            None,
        );
        assert_eval_error("(quote)", &malformed(), None);
        assert_eval_error("(quote a b)", &malformed(), None);
    }

    #[test]
    fn test_eval_if() {
        assert_eval("(if (> 3 2) 1 2)", Value::int(1), None);
        assert_eval("(if (> 2 3) 1 2)", Value::int(2), None);
        assert_eval("(if 0 1 2)", Value::int(2), None);
        assert_eval("(if 0.0 1 2)", Value::int(2), None);
        assert_eval("(if (quote ()) 1 2)", Value::int(2), None);
        assert_eval("(if (quote x) 1 2)", Value::int(1), None);
        assert_eval("(if -1 1 2)", Value::int(1), None);
    }

    #[test]
    fn test_eval_if_does_not_evaluate_unused_branch() {
        assert_eval("(if 1 (quote good) unbound-variable)", Value::symbol("good"), None);
        assert_eval("(if 0 unbound-variable (quote good))", Value::symbol("good"), None);
    }

    #[test]
    fn test_eval_if_errors() {
        assert_eval_error("(if)", &malformed(), None);
        assert_eval_error("(if 1 2)", &malformed(), None);
        assert_eval_error("(if 1 2 3 4)", &malformed(), None);
        assert_eval_error("(if unbound 1 2)", &unbound(), None);
    }

    #[test]
    fn test_eval_define() {
        let env = global();
        assert_eval("(define x 5)", Value::Unspecified, Some(&env));
        assert_eval("x", Value::int(5), Some(&env));
        assert_eval("(define x (+ x 1))", Value::Unspecified, Some(&env));
        assert_eval("x", Value::int(6), Some(&env));
        assert_eval_error("(define 5 x)", &malformed(), Some(&env));
        assert_eval_error("(define x)", &malformed(), Some(&env));
        assert_eval_error("(define x 1 2)", &malformed(), Some(&env));
    }

    #[test]
    fn test_define_in_call_frame_shadows() {
        let env = global();
        eval_in("(define x 5)", &env).unwrap();
        eval_in("(define f (lambda () (begin (define x 99) x)))", &env).unwrap();
        assert_eval("(f)", Value::int(99), Some(&env));
        assert_eval("x", Value::int(5), Some(&env));
    }

    #[test]
    fn test_eval_set() {
        let env = global();
        eval_in("(define counter 0)", &env).unwrap();
        assert_eval("(set! counter (+ counter 10))", Value::Unspecified, Some(&env));
        assert_eval("counter", Value::int(10), Some(&env));
        assert_eval_error("(set! missing 1)", &unbound(), Some(&env));
        assert_eval_error("(set! counter)", &malformed(), Some(&env));
        assert_eval_error("(set! (quote counter) 1)", &malformed(), Some(&env));
    }

    #[test]
    fn test_set_reaches_enclosing_frame() {
        let env = global();
        eval_in(
            "(define make-counter (lambda () ((lambda (n) (lambda () (begin (set! n (+ n 1)) n))) 0)))",
            &env,
        )
        .unwrap();
        eval_in("(define c (make-counter))", &env).unwrap();
        assert_eval("(c)", Value::int(1), Some(&env));
        assert_eval("(c)", Value::int(2), Some(&env));
        assert_eval("(c)", Value::int(3), Some(&env));
        // A second counter has its own frame
        eval_in("(define d (make-counter))", &env).unwrap();
        assert_eval("(d)", Value::int(1), Some(&env));
        assert_eval("(c)", Value::int(4), Some(&env));
    }

    #[test]
    fn test_eval_lambda() {
        let env = global();
        let value = eval_in("(lambda (a b) (+ a b))", &env).unwrap();
        match value {
            Value::Procedure(lambda) => {
                assert_eq!(lambda.params, vec!["a".to_string(), "b".to_string()]);
                assert!(Rc::ptr_eq(&lambda.env, &env));
            }
            other => panic!("Expected a procedure, got {:?}", other),
        }
        assert_eval("((lambda (a b) (+ a b)) 2 3)", Value::int(5), None);
        assert_eval("((lambda () 42))", Value::int(42), None);
        assert_eval_error("(lambda (x))", &malformed(), None);
        assert_eval_error("(lambda x x)", &malformed(), None);
        assert_eval_error("(lambda (x 1) x)", &malformed(), None);
        assert_eval_error("(lambda (x) x x)", &malformed(), None);
    }

    #[test]
    fn test_closures_capture_defining_environment() {
        assert_eval("(((lambda (x) (lambda (y) (+ x y))) 3) 4)", Value::int(7), None);
    }

    #[test]
    fn test_lexical_not_dynamic_scope() {
        let env = global();
        eval_in("(define x 1)", &env).unwrap();
        eval_in("(define get-x (lambda () x))", &env).unwrap();
        assert_eval("((lambda (x) (get-x)) 2)", Value::int(1), Some(&env));
    }

    #[test]
    fn test_recursion() {
        let env = global();
        eval_in(
            "(define fact (lambda (n) (if (<= n 1) 1 (* n (fact (- n 1))))))",
            &env,
        )
        .unwrap();
        assert_eval("(fact 10)", Value::int(3628800), Some(&env));
    }

    #[test]
    fn test_arity_error() {
        let arity = EvalError::EnvError(EnvError::Arity {
            expected: 0,
            found: 0,
        });
        assert_eval_error("((lambda (x y) x) 1)", &arity, None);
        assert_eval_error("((lambda (x) x) 1 2)", &arity, None);
        assert!(matches!(
            eval_in("((lambda (x y) x) 1)", &global()),
            Err(EvalError::EnvError(EnvError::Arity { expected: 2, found: 1 }))
        ));
    }

    #[test]
    fn test_not_a_procedure() {
        let not_proc = EvalError::NotAProcedure(Value::nil());
        assert_eval_error("(1 2 3)", &not_proc, None);
        assert_eval_error("((quote (1 2)) 3)", &not_proc, None);
        assert_eval_error("(undefined-fn 1)", &unbound(), None);
    }

    #[test]
    fn test_arguments_evaluated_left_to_right() {
        let env = global();
        eval_in("(define trace (quote ()))", &env).unwrap();
        eval_in(
            "(define note (lambda (x) (begin (set! trace (cons x trace)) x)))",
            &env,
        )
        .unwrap();
        assert_eval("(+ (note 1) (note 2) (note 3))", Value::int(6), Some(&env));
        assert_eval(
            "trace",
            Value::list(vec![Value::int(3), Value::int(2), Value::int(1)]),
            Some(&env),
        );
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eval("(+ 1 2)", Value::Number(Number::Int(3)), None);
        assert_eval("(+ 1 2.0)", Value::Number(Number::Float(3.0)), None);
    }

    #[test]
    fn test_apply_directly() {
        let env = global();
        let add = Environment::lookup(&env, "+").unwrap();
        assert_eq!(apply(&add, vec![Value::int(1), Value::int(2)]), Ok(Value::int(3)));
        assert!(matches!(
            apply(&Value::int(1), vec![]),
            Err(EvalError::NotAProcedure(_))
        ));
    }

    #[test]
    fn test_special_form_identifiers() {
        let ids = special_form_identifiers();
        for keyword in ["quote", "if", "define", "set!", "lambda"] {
            assert!(ids.contains(keyword));
        }
        assert!(!ids.contains("begin"));
    }
}
