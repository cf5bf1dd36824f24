//! Native intrinsic functions available in every assembly.
//!
//! Two families live here. The plain numeric/string helpers (`round`,
//! `strlen`, ...) quietly produce "no value" (void) when called with the
//! wrong argument types. The `fp_*` fixed-point family, whose results feed
//! data statements directly, reports argument errors and fails the
//! evaluation instead; each takes an optional trailing argument giving the
//! number of fraction bits of the result.

use std::rc::Rc;

use crate::{
    env::Env,
    value::{Number, Value, DEFAULT_FRACTION_BITS},
};


/// Declares every intrinsic (and the boolean constants) into the root scope.
pub fn install(env: &Env) {
    env.declare_variable("true", Value::number(1.0), true);
    env.declare_variable("false", Value::number(0.0), true);

    let natives: &[(&str, crate::value::NativeFn)] = &[
        ("round", round),
        ("ceil", ceil),
        ("floor", floor),
        ("int", integral),
        ("frac", fractional),
        ("fmod", fmod),
        ("pow", pow),
        ("log", log),
        ("sin", sine),
        ("cos", cosine),
        ("tan", tangent),
        ("strlen", str_length),
        ("strcmp", str_compare),
        ("fp_int", fp_int),
        ("fp_frac", fp_frac),
        ("fp_add", fp_add),
        ("fp_sub", fp_sub),
        ("fp_mul", fp_mul),
        ("fp_div", fp_div),
        ("fp_fmod", fp_fmod),
        ("fp_pow", fp_pow),
        ("fp_log", fp_log),
        ("fp_sin", fp_sin),
        ("fp_cos", fp_cos),
        ("fp_tan", fp_tan),
        ("fp_asin", fp_asin),
        ("fp_acos", fp_acos),
        ("fp_atan", fp_atan),
    ];

    for (name, native) in natives {
        env.declare_variable(name, Rc::new(Value::Native(*native)), true);
    }
}

// ===== Argument helpers ====================================================

/// A numeric argument for the lenient family: `None` marks a type error.
fn number_arg(env: &Env, index: u64) -> Option<f64> {
    match env.arg(index).as_deref() {
        Some(Value::Number(n)) => Some(n.value()),
        _ => None,
    }
}

fn string_arg(env: &Env, index: u64) -> Option<String> {
    match env.arg(index).as_deref() {
        Some(Value::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

/// A required numeric argument for the strict `fp_*` family.
fn expect_number(env: &Env, index: u64, name: &str) -> Option<f64> {
    match env.arg(index).as_deref() {
        Some(Value::Number(n)) => Some(n.value()),
        Some(other) => {
            eprintln!(
                "[{}] Expected argument #{} to function call to be of type 'number'; got '{}'.",
                name, index + 1, other.type_name(),
            );
            None
        }
        None => {
            eprintln!("[{}] Missing argument #{} to function call.", name, index + 1);
            None
        }
    }
}

/// The optional fraction-bits argument of an `fp_*` intrinsic.
fn fraction_bits_arg(env: &Env, index: u64, name: &str) -> Option<u8> {
    match env.arg(index).as_deref() {
        Some(Value::Number(n)) => Some(n.integer() as u8),
        Some(other) => {
            eprintln!(
                "[{}] Expected argument #{} to function call to be of type 'number'; got '{}'.",
                name, index + 1, other.type_name(),
            );
            None
        }
        None => Some(DEFAULT_FRACTION_BITS),
    }
}

fn fixed(value: f64, bits: u8) -> Option<Rc<Value>> {
    Some(Rc::new(Value::Number(Number::fixed(value, bits))))
}

// ===== Plain numeric and string intrinsics =================================

fn round(env: &Env) -> Option<Rc<Value>> {
    match number_arg(env, 0) {
        Some(n) => Some(Value::number(n.round())),
        None => Some(Value::void()),
    }
}

fn ceil(env: &Env) -> Option<Rc<Value>> {
    match number_arg(env, 0) {
        Some(n) => Some(Value::number(n.ceil())),
        None => Some(Value::void()),
    }
}

fn floor(env: &Env) -> Option<Rc<Value>> {
    match number_arg(env, 0) {
        Some(n) => Some(Value::number(n.floor())),
        None => Some(Value::void()),
    }
}

fn integral(env: &Env) -> Option<Rc<Value>> {
    match number_arg(env, 0) {
        Some(n) => Some(Value::number(n.trunc())),
        None => Some(Value::void()),
    }
}

/// The fractional digits of the argument, read off its decimal rendering:
/// `frac(1.25)` is 25.
fn fractional(env: &Env) -> Option<Rc<Value>> {
    let n = match number_arg(env, 0) {
        Some(n) => n,
        None => return Some(Value::void()),
    };

    let mut rendered = format!("{:.6}", n.fract());
    while rendered.ends_with('0') && !rendered.ends_with(".0") {
        rendered.pop();
    }

    match rendered.find('.') {
        Some(period) => {
            let digits = rendered[period + 1..].parse::<u64>().unwrap_or(0);
            Some(Value::number(digits as f64))
        }
        None => Some(Value::number(n.fract())),
    }
}

fn fmod(env: &Env) -> Option<Rc<Value>> {
    match (number_arg(env, 0), number_arg(env, 1)) {
        (Some(a), Some(b)) => Some(Value::number(a % b)),
        _ => Some(Value::void()),
    }
}

fn pow(env: &Env) -> Option<Rc<Value>> {
    match (number_arg(env, 0), number_arg(env, 1)) {
        (Some(a), Some(b)) => Some(Value::number(a.powf(b))),
        _ => Some(Value::void()),
    }
}

fn log(env: &Env) -> Option<Rc<Value>> {
    match (number_arg(env, 0), number_arg(env, 1)) {
        (Some(operand), Some(base)) => {
            if base <= 0.0 || operand <= 0.0 {
                Some(Value::void())
            } else {
                Some(Value::number(operand.ln() / base.ln()))
            }
        }
        _ => Some(Value::void()),
    }
}

// The trigonometric intrinsics take turns, not radians: sin(0.25) is the
// sine of a quarter turn.

fn sine(env: &Env) -> Option<Rc<Value>> {
    match number_arg(env, 0) {
        Some(turns) => Some(Value::number((turns * std::f64::consts::TAU).sin())),
        None => Some(Value::void()),
    }
}

fn cosine(env: &Env) -> Option<Rc<Value>> {
    match number_arg(env, 0) {
        Some(turns) => Some(Value::number((turns * std::f64::consts::TAU).cos())),
        None => Some(Value::void()),
    }
}

fn tangent(env: &Env) -> Option<Rc<Value>> {
    match number_arg(env, 0) {
        Some(turns) => Some(Value::number((turns * std::f64::consts::TAU).tan())),
        None => Some(Value::void()),
    }
}

fn str_length(env: &Env) -> Option<Rc<Value>> {
    match string_arg(env, 0) {
        Some(s) => Some(Value::number(s.len() as f64)),
        None => Some(Value::void()),
    }
}

fn str_compare(env: &Env) -> Option<Rc<Value>> {
    match (string_arg(env, 0), string_arg(env, 1)) {
        (Some(a), Some(b)) => {
            let result = match a.cmp(&b) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            };
            Some(Value::number(result))
        }
        _ => Some(Value::void()),
    }
}

// ===== Fixed-point intrinsics ==============================================

fn fp_int(env: &Env) -> Option<Rc<Value>> {
    match env.arg(0).as_deref() {
        Some(Value::Number(n)) => Some(Value::number(n.integer() as f64)),
        _ => {
            eprintln!("[fp_int] Expected argument #1 to function call to be of type 'number'.");
            None
        }
    }
}

fn fp_frac(env: &Env) -> Option<Rc<Value>> {
    match env.arg(0).as_deref() {
        Some(Value::Number(n)) => Some(Value::number(n.fractional() as f64)),
        _ => {
            eprintln!("[fp_frac] Expected argument #1 to function call to be of type 'number'.");
            None
        }
    }
}

fn fp_add(env: &Env) -> Option<Rc<Value>> {
    let a = expect_number(env, 0, "fp_add")?;
    let b = expect_number(env, 1, "fp_add")?;
    let bits = fraction_bits_arg(env, 2, "fp_add")?;
    fixed(a + b, bits)
}

fn fp_sub(env: &Env) -> Option<Rc<Value>> {
    let a = expect_number(env, 0, "fp_sub")?;
    let b = expect_number(env, 1, "fp_sub")?;
    let bits = fraction_bits_arg(env, 2, "fp_sub")?;
    fixed(a - b, bits)
}

fn fp_mul(env: &Env) -> Option<Rc<Value>> {
    let a = expect_number(env, 0, "fp_mul")?;
    let b = expect_number(env, 1, "fp_mul")?;
    let bits = fraction_bits_arg(env, 2, "fp_mul")?;
    fixed(a * b, bits)
}

fn fp_div(env: &Env) -> Option<Rc<Value>> {
    let a = expect_number(env, 0, "fp_div")?;
    let b = expect_number(env, 1, "fp_div")?;
    let bits = fraction_bits_arg(env, 2, "fp_div")?;

    if b == 0.0 {
        eprintln!("[fp_div] Attempted division by zero encountered.");
        return None;
    }

    fixed(a / b, bits)
}

fn fp_fmod(env: &Env) -> Option<Rc<Value>> {
    let a = expect_number(env, 0, "fp_fmod")?;
    let b = expect_number(env, 1, "fp_fmod")?;
    let bits = fraction_bits_arg(env, 2, "fp_fmod")?;

    if b == 0.0 {
        eprintln!("[fp_fmod] Modulo with attempted division by zero encountered.");
        return None;
    }

    fixed(a % b, bits)
}

fn fp_pow(env: &Env) -> Option<Rc<Value>> {
    let a = expect_number(env, 0, "fp_pow")?;
    let b = expect_number(env, 1, "fp_pow")?;
    let bits = fraction_bits_arg(env, 2, "fp_pow")?;
    fixed(a.powf(b), bits)
}

fn fp_log(env: &Env) -> Option<Rc<Value>> {
    let operand = expect_number(env, 0, "fp_log")?;
    let base = expect_number(env, 1, "fp_log")?;
    let bits = fraction_bits_arg(env, 2, "fp_log")?;

    if operand <= 0.0 || base <= 0.0 {
        eprintln!("[fp_log] Logarithm base and operand must be greater than zero.");
        return None;
    }

    fixed(operand.ln() / base.ln(), bits)
}

fn fp_sin(env: &Env) -> Option<Rc<Value>> {
    let turns = expect_number(env, 0, "fp_sin")?;
    let bits = fraction_bits_arg(env, 1, "fp_sin")?;
    fixed((turns * std::f64::consts::TAU).sin(), bits)
}

fn fp_cos(env: &Env) -> Option<Rc<Value>> {
    let turns = expect_number(env, 0, "fp_cos")?;
    let bits = fraction_bits_arg(env, 1, "fp_cos")?;
    fixed((turns * std::f64::consts::TAU).cos(), bits)
}

fn fp_tan(env: &Env) -> Option<Rc<Value>> {
    let turns = expect_number(env, 0, "fp_tan")?;
    let bits = fraction_bits_arg(env, 1, "fp_tan")?;
    fixed((turns * std::f64::consts::TAU).tan(), bits)
}

fn fp_asin(env: &Env) -> Option<Rc<Value>> {
    let turns = expect_number(env, 0, "fp_asin")?;
    let bits = fraction_bits_arg(env, 1, "fp_asin")?;
    fixed((turns * std::f64::consts::TAU).asin(), bits)
}

fn fp_acos(env: &Env) -> Option<Rc<Value>> {
    let turns = expect_number(env, 0, "fp_acos")?;
    let bits = fraction_bits_arg(env, 1, "fp_acos")?;
    fixed((turns * std::f64::consts::TAU).acos(), bits)
}

fn fp_atan(env: &Env) -> Option<Rc<Value>> {
    let turns = expect_number(env, 0, "fp_atan")?;
    let bits = fraction_bits_arg(env, 1, "fp_atan")?;
    fixed((turns * std::f64::consts::TAU).atan(), bits)
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::env::Scope;


    fn call(native: crate::value::NativeFn, args: &[Rc<Value>]) -> Option<Rc<Value>> {
        let global = Env::global();
        let scope = Env::child(&global, Scope::Function);
        for (i, arg) in args.iter().enumerate() {
            scope.declare_variable(&format!("_{}", i), Rc::clone(arg), false);
        }
        scope.declare_variable("_count", Value::number(args.len() as f64), false);
        native(&scope)
    }

    fn value_of(result: Option<Rc<Value>>) -> f64 {
        match result.as_deref() {
            Some(Value::Number(n)) => n.value(),
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_rounding_family() {
        assert_eq!(value_of(call(round, &[Value::number(1.5)])), 2.0);
        assert_eq!(value_of(call(ceil, &[Value::number(1.1)])), 2.0);
        assert_eq!(value_of(call(floor, &[Value::number(1.9)])), 1.0);
        assert_eq!(value_of(call(integral, &[Value::number(2.75)])), 2.0);
        assert_eq!(value_of(call(fractional, &[Value::number(1.25)])), 25.0);
    }

    #[test]
    fn test_wrong_types_yield_void() {
        let result = call(round, &[Rc::new(Value::Str("x".into()))]);
        assert!(matches!(result.as_deref(), Some(Value::Void)));
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            value_of(call(str_length, &[Rc::new(Value::Str("hello".into()))])),
            5.0,
        );
        assert_eq!(
            value_of(call(str_compare, &[
                Rc::new(Value::Str("a".into())),
                Rc::new(Value::Str("b".into())),
            ])),
            -1.0,
        );
    }

    #[test]
    fn test_fixed_point_format() {
        let result = call(fp_div, &[
            Value::number(1.0),
            Value::number(2.0),
            Value::number(8.0),
        ]);
        match result.as_deref() {
            Some(Value::Number(n)) => {
                assert_eq!(n.fraction_bits(), 8);
                assert_eq!(n.fractional(), 128);
                assert_eq!(n.integer(), 0);
            }
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_fp_division_by_zero_fails() {
        assert!(call(fp_div, &[Value::number(1.0), Value::number(0.0)]).is_none());
        assert!(call(fp_fmod, &[Value::number(1.0), Value::number(0.0)]).is_none());
        assert!(call(fp_log, &[Value::number(-1.0), Value::number(2.0)]).is_none());
    }

    #[test]
    fn test_trig_uses_turns() {
        let sin_quarter = value_of(call(sine, &[Value::number(0.25)]));
        assert!((sin_quarter - 1.0).abs() < 1e-9);
    }
}
