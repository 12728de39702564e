use std::cmp::Ordering;
use std::f64::consts;
use std::rc::Rc;

use crate::evaluator::{self, EvalError, EvalResult};
use crate::types::{Builtin, BuiltinFunc, Number, Value};

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, min $expected:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err(EvalError::InvalidArguments(format!(
                "'{}' expects at least {} argument(s), got {}",
                $name,
                $expected,
                $args.len()
            )));
        }
    };
    ($args:expr, $expected:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::InvalidArguments(format!(
                "'{}' expects exactly {} argument(s), got {}",
                $name,
                $expected,
                $args.len()
            )));
        }
    };
    ($args:expr, $min:expr, $max:expr, $name:expr) => {
        if !($min..=$max).contains(&$args.len()) {
            return Err(EvalError::InvalidArguments(format!(
                "'{}' expects between {} and {} arguments, got {}",
                $name,
                $min,
                $max,
                $args.len()
            )));
        }
    };
}

/// The standard builtin table, ready to be injected into a global environment.
pub fn standard_builtins() -> Vec<(&'static str, Value)> {
    const PROCEDURES: &[(&str, BuiltinFunc)] = &[
        ("+", prim_add),
        ("-", prim_sub),
        ("*", prim_mul),
        ("/", prim_div),
        ("=", prim_equals),
        ("<", prim_less_than),
        ("<=", prim_less_than_or_equals),
        (">", prim_greater_than),
        (">=", prim_greater_than_or_equals),
        ("car", prim_car),
        ("cdr", prim_cdr),
        ("cddr", prim_cddr),
        ("cons", prim_cons),
        ("append", prim_append),
        ("list", prim_list),
        ("length", prim_length),
        ("null?", prim_is_null),
        ("list?", prim_is_list),
        ("number?", prim_is_number),
        ("symbol?", prim_is_symbol),
        ("procedure?", prim_is_procedure),
        ("eq?", prim_is_eq),
        ("equal?", prim_is_equal),
        ("not", prim_not),
        ("abs", prim_abs),
        ("expt", prim_expt),
        ("max", prim_max),
        ("min", prim_min),
        ("round", prim_round),
        ("begin", prim_begin),
        ("apply", prim_apply),
        ("map", prim_map),
        ("print", prim_print),
        ("sqrt", math_sqrt),
        ("exp", math_exp),
        ("log", math_log),
        ("log10", math_log10),
        ("log2", math_log2),
        ("sin", math_sin),
        ("cos", math_cos),
        ("tan", math_tan),
        ("asin", math_asin),
        ("acos", math_acos),
        ("atan", math_atan),
        ("atan2", math_atan2),
        ("sinh", math_sinh),
        ("cosh", math_cosh),
        ("tanh", math_tanh),
        ("degrees", math_degrees),
        ("radians", math_radians),
        ("fabs", math_fabs),
        ("pow", math_pow),
        ("hypot", math_hypot),
        ("floor", math_floor),
        ("ceil", math_ceil),
        ("trunc", math_trunc),
    ];

    let mut table: Vec<(&'static str, Value)> = PROCEDURES
        .iter()
        .map(|&(name, func)| (name, Value::Builtin(Builtin::new(name, func))))
        .collect();
    table.extend([
        ("pi", Value::float(consts::PI)),
        ("e", Value::float(consts::E)),
        ("tau", Value::float(consts::TAU)),
        ("inf", Value::float(f64::INFINITY)),
        ("nan", Value::float(f64::NAN)),
        ("#t", boolean(true)),
        ("#f", boolean(false)),
    ]);
    table
}

// Predicates answer with the symbol #t or the empty list
fn boolean(b: bool) -> Value {
    if b { Value::symbol("#t") } else { Value::nil() }
}

fn expect_number(value: &Value) -> EvalResult<Number> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch {
            expected: "number",
            found: other.clone(),
        }),
    }
}

fn expect_float(value: &Value) -> EvalResult<f64> {
    expect_number(value).map(Number::as_f64)
}

fn expect_list(value: &Value) -> EvalResult<&[Value]> {
    value.as_list().ok_or_else(|| EvalError::TypeMismatch {
        expected: "list",
        found: value.clone(),
    })
}

fn overflow(name: &str) -> EvalError {
    EvalError::InvalidArguments(format!("integer overflow in '{}'", name))
}

/// Integer op when both sides are integers, float op otherwise.
fn arithmetic(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    name: &str,
) -> EvalResult<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(x, y).map(Number::Int).ok_or_else(|| overflow(name)),
        _ => Ok(Number::Float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn fold_numbers(
    args: &[Value],
    start: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    name: &str,
) -> EvalResult {
    args.iter()
        .try_fold(start, |acc, arg| {
            arithmetic(acc, expect_number(arg)?, int_op, float_op, name)
        })
        .map(Value::Number)
}

fn compare(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

// Chained: (< 1 2 3) holds when every adjacent pair does
fn compare_numbers(args: &[Value], holds: fn(Ordering) -> bool, name: &str) -> EvalResult {
    check_arity!(args, min 2, name);
    let numbers = args.iter().map(expect_number).collect::<EvalResult<Vec<_>>>()?;
    Ok(boolean(
        numbers
            .windows(2)
            .all(|pair| compare(pair[0], pair[1]).is_some_and(holds)),
    ))
}

pub fn prim_add(args: &[Value]) -> EvalResult {
    // (+) -> 0
    fold_numbers(args, Number::Int(0), i64::checked_add, |a, b| a + b, "+")
}

pub fn prim_mul(args: &[Value]) -> EvalResult {
    // (*) -> 1
    fold_numbers(args, Number::Int(1), i64::checked_mul, |a, b| a * b, "*")
}

pub fn prim_sub(args: &[Value]) -> EvalResult {
    // (- x) -> -x
    check_arity!(args, min 1, "-");
    let first = expect_number(&args[0])?;
    if args.len() == 1 {
        return arithmetic(Number::Int(0), first, i64::checked_sub, |a, b| a - b, "-")
            .map(Value::Number);
    }
    fold_numbers(&args[1..], first, i64::checked_sub, |a, b| a - b, "-")
}

pub fn prim_div(args: &[Value]) -> EvalResult {
    // Always a float: (/ 6 3) -> 2.0, (/ 4) -> 0.25
    check_arity!(args, min 1, "/");
    let first = expect_float(&args[0])?;
    let (mut result, divisors) = if args.len() == 1 {
        (1.0, args)
    } else {
        (first, &args[1..])
    };
    for divisor in divisors {
        let divisor = expect_float(divisor)?;
        if divisor == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        result /= divisor;
    }
    Ok(Value::float(result))
}

pub fn prim_equals(args: &[Value]) -> EvalResult {
    compare_numbers(args, Ordering::is_eq, "=")
}

pub fn prim_less_than(args: &[Value]) -> EvalResult {
    compare_numbers(args, Ordering::is_lt, "<")
}

pub fn prim_less_than_or_equals(args: &[Value]) -> EvalResult {
    compare_numbers(args, Ordering::is_le, "<=")
}

pub fn prim_greater_than(args: &[Value]) -> EvalResult {
    compare_numbers(args, Ordering::is_gt, ">")
}

pub fn prim_greater_than_or_equals(args: &[Value]) -> EvalResult {
    compare_numbers(args, Ordering::is_ge, ">=")
}

pub fn prim_car(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "car");
    expect_list(&args[0])?
        .first()
        .cloned()
        .ok_or_else(|| EvalError::InvalidArguments("'car' of an empty list".to_string()))
}

// The tail of an empty list is empty
fn drop_front(args: &[Value], count: usize, name: &str) -> EvalResult {
    check_arity!(args, 1, name);
    let list = expect_list(&args[0])?;
    Ok(Value::list(list.iter().skip(count).cloned().collect()))
}

pub fn prim_cdr(args: &[Value]) -> EvalResult {
    drop_front(args, 1, "cdr")
}

pub fn prim_cddr(args: &[Value]) -> EvalResult {
    drop_front(args, 2, "cddr")
}

pub fn prim_cons(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "cons");
    let tail = expect_list(&args[1])?;
    let mut list = Vec::with_capacity(tail.len() + 1);
    list.push(args[0].clone());
    list.extend_from_slice(tail);
    Ok(Value::list(list))
}

pub fn prim_append(args: &[Value]) -> EvalResult {
    let mut list = Vec::new();
    for arg in args {
        list.extend_from_slice(expect_list(arg)?);
    }
    Ok(Value::list(list))
}

pub fn prim_list(args: &[Value]) -> EvalResult {
    Ok(Value::list(args.to_vec()))
}

pub fn prim_length(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "length");
    let len = expect_list(&args[0])?.len();
    i64::try_from(len).map(Value::int).map_err(|_| overflow("length"))
}

pub fn prim_is_null(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "null?");
    Ok(boolean(args[0].is_nil()))
}

pub fn prim_is_list(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "list?");
    Ok(boolean(matches!(args[0], Value::List(_))))
}

pub fn prim_is_number(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "number?");
    Ok(boolean(matches!(args[0], Value::Number(_))))
}

pub fn prim_is_symbol(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "symbol?");
    Ok(boolean(matches!(args[0], Value::Symbol(_))))
}

pub fn prim_is_procedure(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "procedure?");
    Ok(boolean(matches!(
        args[0],
        Value::Procedure(_) | Value::Builtin(_)
    )))
}

/// Identity: lists and procedures must be the same object; the empty list is unique.
fn is_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y) || (x.is_empty() && y.is_empty()),
        _ => a == b,
    }
}

/// Structural equality, with 1 and 1.0 considered equal.
fn is_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare(*x, *y) == Some(Ordering::Equal),
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| is_equal(l, r))
        }
        _ => a == b,
    }
}

pub fn prim_is_eq(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "eq?");
    Ok(boolean(is_eq(&args[0], &args[1])))
}

pub fn prim_is_equal(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "equal?");
    Ok(boolean(is_equal(&args[0], &args[1])))
}

pub fn prim_not(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "not");
    Ok(boolean(!args[0].is_truthy()))
}

pub fn prim_abs(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "abs");
    match expect_number(&args[0])? {
        Number::Int(i) => i.checked_abs().map(Value::int).ok_or_else(|| overflow("abs")),
        Number::Float(f) => Ok(Value::float(f.abs())),
    }
}

pub fn prim_expt(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "expt");
    let base = expect_number(&args[0])?;
    let exponent = expect_number(&args[1])?;
    match (base, exponent) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| overflow("expt"))?;
            b.checked_pow(e).map(Value::int).ok_or_else(|| overflow("expt"))
        }
        _ if base.is_zero() && exponent.as_f64() < 0.0 => Err(EvalError::DivisionByZero),
        _ => Ok(Value::float(base.as_f64().powf(exponent.as_f64()))),
    }
}

fn extremum(args: &[Value], keep: Ordering, name: &str) -> EvalResult {
    check_arity!(args, min 1, name);
    let mut best = expect_number(&args[0])?;
    for arg in &args[1..] {
        let n = expect_number(arg)?;
        if compare(n, best) == Some(keep) {
            best = n;
        }
    }
    Ok(Value::Number(best))
}

pub fn prim_max(args: &[Value]) -> EvalResult {
    extremum(args, Ordering::Greater, "max")
}

pub fn prim_min(args: &[Value]) -> EvalResult {
    extremum(args, Ordering::Less, "min")
}

fn float_to_int(f: f64, name: &str) -> EvalResult {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(Value::int(f as i64))
    } else {
        Err(EvalError::InvalidArguments(format!(
            "'{}' cannot convert {} to an integer",
            name, f
        )))
    }
}

// Rounds to a multiple of 10^-digits; ties go to the even multiple
fn round_int(i: i64, digits: i32) -> EvalResult {
    if digits >= 0 {
        return Ok(Value::int(i));
    }
    // Every i64 is below 10^19 in magnitude, so coarser factors always give zero
    if digits.unsigned_abs() > 19 {
        return Ok(Value::int(0));
    }
    let factor = 10i128.pow(digits.unsigned_abs());
    let i = i128::from(i);
    let (quotient, remainder) = (i.div_euclid(factor), i.rem_euclid(factor));
    let quotient = if 2 * remainder > factor || (2 * remainder == factor && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    };
    i64::try_from(quotient * factor)
        .map(Value::int)
        .map_err(|_| overflow("round"))
}

/// (round x) -> nearest integer, ties to even; (round x n) -> n decimals,
/// staying an integer when x is one.
pub fn prim_round(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, 2, "round");
    let x = expect_number(&args[0])?;
    match args.get(1) {
        None => match x {
            Number::Int(i) => Ok(Value::int(i)),
            Number::Float(f) => float_to_int(f.round_ties_even(), "round"),
        },
        Some(digits) => {
            let digits = match expect_number(digits)? {
                Number::Int(d) => i32::try_from(d).map_err(|_| overflow("round"))?,
                Number::Float(_) => {
                    return Err(EvalError::TypeMismatch {
                        expected: "integer",
                        found: digits.clone(),
                    });
                }
            };
            match x {
                Number::Int(i) => round_int(i, digits),
                Number::Float(f) => {
                    let scale = 10f64.powi(digits);
                    Ok(Value::float((f * scale).round_ties_even() / scale))
                }
            }
        }
    }
}

/// Arguments are already evaluated in order, so this just returns the last one.
pub fn prim_begin(args: &[Value]) -> EvalResult {
    check_arity!(args, min 1, "begin");
    Ok(args[args.len() - 1].clone())
}

pub fn prim_apply(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "apply");
    evaluator::apply(&args[0], expect_list(&args[1])?.to_vec())
}

/// (map f l1 l2 ...) stops at the shortest list.
pub fn prim_map(args: &[Value]) -> EvalResult {
    check_arity!(args, min 2, "map");
    let procedure = &args[0];
    let lists = args[1..]
        .iter()
        .map(expect_list)
        .collect::<EvalResult<Vec<_>>>()?;
    let len = lists.iter().map(|list| list.len()).min().unwrap_or(0);
    let results = (0..len)
        .map(|i| evaluator::apply(procedure, lists.iter().map(|list| list[i].clone()).collect()))
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(Value::list(results))
}

pub fn prim_print(args: &[Value]) -> EvalResult {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(Value::Unspecified)
}

// A NaN out of a non-NaN input means the argument was outside the domain
fn float_fn(args: &[Value], name: &str, f: fn(f64) -> f64) -> EvalResult {
    check_arity!(args, 1, name);
    let x = expect_float(&args[0])?;
    let result = f(x);
    if result.is_nan() && !x.is_nan() {
        return Err(EvalError::InvalidArguments(format!(
            "math domain error in '{}'",
            name
        )));
    }
    Ok(Value::float(result))
}

fn float_fn2(args: &[Value], name: &str, f: fn(f64, f64) -> f64) -> EvalResult {
    check_arity!(args, 2, name);
    let (x, y) = (expect_float(&args[0])?, expect_float(&args[1])?);
    let result = f(x, y);
    if result.is_nan() && !x.is_nan() && !y.is_nan() {
        return Err(EvalError::InvalidArguments(format!(
            "math domain error in '{}'",
            name
        )));
    }
    Ok(Value::float(result))
}

fn rounding_fn(args: &[Value], name: &str, f: fn(f64) -> f64) -> EvalResult {
    check_arity!(args, 1, name);
    match expect_number(&args[0])? {
        Number::Int(i) => Ok(Value::int(i)),
        Number::Float(x) => float_to_int(f(x), name),
    }
}

pub fn math_sqrt(args: &[Value]) -> EvalResult {
    float_fn(args, "sqrt", f64::sqrt)
}

pub fn math_exp(args: &[Value]) -> EvalResult {
    float_fn(args, "exp", f64::exp)
}

/// (log x) is the natural log; (log x base) uses the given base.
pub fn math_log(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, 2, "log");
    let x = expect_float(&args[0])?;
    let base = args.get(1).map(expect_float).transpose()?;
    if x <= 0.0 || base.is_some_and(|b| b <= 0.0) {
        return Err(EvalError::InvalidArguments(
            "math domain error in 'log'".to_string(),
        ));
    }
    match base {
        // ln(1) is the divisor
        Some(b) if b == 1.0 => Err(EvalError::DivisionByZero),
        Some(_) => float_fn2(args, "log", f64::log),
        None => float_fn(args, "log", f64::ln),
    }
}

pub fn math_log10(args: &[Value]) -> EvalResult {
    float_fn(args, "log10", f64::log10)
}

pub fn math_log2(args: &[Value]) -> EvalResult {
    float_fn(args, "log2", f64::log2)
}

pub fn math_sin(args: &[Value]) -> EvalResult {
    float_fn(args, "sin", f64::sin)
}

pub fn math_cos(args: &[Value]) -> EvalResult {
    float_fn(args, "cos", f64::cos)
}

pub fn math_tan(args: &[Value]) -> EvalResult {
    float_fn(args, "tan", f64::tan)
}

pub fn math_asin(args: &[Value]) -> EvalResult {
    float_fn(args, "asin", f64::asin)
}

pub fn math_acos(args: &[Value]) -> EvalResult {
    float_fn(args, "acos", f64::acos)
}

pub fn math_atan(args: &[Value]) -> EvalResult {
    float_fn(args, "atan", f64::atan)
}

pub fn math_atan2(args: &[Value]) -> EvalResult {
    float_fn2(args, "atan2", f64::atan2)
}

pub fn math_sinh(args: &[Value]) -> EvalResult {
    float_fn(args, "sinh", f64::sinh)
}

pub fn math_cosh(args: &[Value]) -> EvalResult {
    float_fn(args, "cosh", f64::cosh)
}

pub fn math_tanh(args: &[Value]) -> EvalResult {
    float_fn(args, "tanh", f64::tanh)
}

pub fn math_degrees(args: &[Value]) -> EvalResult {
    float_fn(args, "degrees", f64::to_degrees)
}

pub fn math_radians(args: &[Value]) -> EvalResult {
    float_fn(args, "radians", f64::to_radians)
}

pub fn math_fabs(args: &[Value]) -> EvalResult {
    float_fn(args, "fabs", f64::abs)
}

pub fn math_pow(args: &[Value]) -> EvalResult {
    float_fn2(args, "pow", f64::powf)
}

pub fn math_hypot(args: &[Value]) -> EvalResult {
    float_fn2(args, "hypot", f64::hypot)
}

pub fn math_floor(args: &[Value]) -> EvalResult {
    rounding_fn(args, "floor", f64::floor)
}

pub fn math_ceil(args: &[Value]) -> EvalResult {
    rounding_fn(args, "ceil", f64::ceil)
}

pub fn math_trunc(args: &[Value]) -> EvalResult {
    rounding_fn(args, "trunc", f64::trunc)
}
