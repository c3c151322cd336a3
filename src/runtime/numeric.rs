//! Checked arithmetic on integer and fixed-point values.

use crate::{
    language::ast::{BinaryOp, ExprKind},
    runtime::{
        error::{RuntimeError, RuntimeResult},
        value::Value,
    },
    sema::ty::{parse_fixed_point, PrimitiveType, Type, FIXED_POINT_FACTOR},
};
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};
use std::cmp::Ordering;

/// Fits `value` into `ty`: word types wrap, every other bounded type
/// reports overflow or underflow.
pub fn fit_integer(ty: PrimitiveType, value: BigInt) -> RuntimeResult<Value> {
    if ty.is_word() {
        let bits = ty.integer_bits().unwrap_or(64);
        let modulus = BigInt::one() << bits;
        let wrapped = ((value % &modulus) + &modulus) % &modulus;
        return Ok(Value::Integer { ty, value: wrapped });
    }
    if let Some((min, max)) = ty.integer_range() {
        if min.as_ref().is_some_and(|min| &value < min) {
            return Err(RuntimeError::Underflow { ty: Type::Primitive(ty) });
        }
        if max.as_ref().is_some_and(|max| &value > max) {
            return Err(RuntimeError::Overflow { ty: Type::Primitive(ty) });
        }
    }
    Ok(Value::Integer { ty, value })
}

pub fn fit_fixed(ty: PrimitiveType, value: BigInt) -> RuntimeResult<Value> {
    let (min, max) = ty.fixed_point_range().unwrap_or((i64::MIN as i128, i64::MAX as i128));
    if value < BigInt::from(min) {
        return Err(RuntimeError::Underflow { ty: Type::Primitive(ty) });
    }
    if value > BigInt::from(max) {
        return Err(RuntimeError::Overflow { ty: Type::Primitive(ty) });
    }
    let value = value
        .to_i128()
        .ok_or_else(|| RuntimeError::Overflow { ty: Type::Primitive(ty) })?;
    Ok(Value::Fixed { ty, value })
}

/// Value of an integer or fixed-point literal, given the type the checker
/// assigned to it.
pub fn literal(kind: &ExprKind, negated: bool, ty: Option<&Type>) -> RuntimeResult<Value> {
    let primitive = ty.and_then(Type::primitive);
    match kind {
        ExprKind::Integer(value) => {
            let value = if negated { -value } else { value.clone() };
            let ty = primitive
                .filter(|primitive| primitive.is_signed_integer() || primitive.is_unsigned_integer())
                .unwrap_or(PrimitiveType::Int);
            fit_integer(ty, value)
        }
        ExprKind::FixedPoint(text) => {
            let text = if negated { format!("-{text}") } else { text.clone() };
            let value = parse_fixed_point(&text).ok_or_else(|| {
                RuntimeError::unreachable(format!("malformed fixed-point literal `{text}`"))
            })?;
            let ty = primitive
                .filter(|primitive| primitive.is_concrete_fixed_point())
                .unwrap_or(if value < 0 { PrimitiveType::Fix64 } else { PrimitiveType::UFix64 });
            fit_fixed(ty, BigInt::from(value))
        }
        _ => Err(RuntimeError::unreachable("numeric literal expected")),
    }
}

fn mismatch(left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: left.dynamic_type(),
        actual: right.dynamic_type(),
    }
}

pub fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Integer { ty, value: a }, Value::Integer { value: b, .. }) => {
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide | BinaryOp::Modulo if b.is_zero() => {
                    return Err(RuntimeError::DivisionByZero)
                }
                BinaryOp::Divide => a / b,
                BinaryOp::Modulo => a % b,
                _ => return Err(RuntimeError::unreachable(format!("`{}` is not arithmetic", op.symbol()))),
            };
            fit_integer(*ty, result)
        }
        (Value::Fixed { ty, value: a }, Value::Fixed { value: b, .. }) => {
            let (a, b) = (BigInt::from(*a), BigInt::from(*b));
            let factor = BigInt::from(FIXED_POINT_FACTOR);
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b / factor,
                BinaryOp::Divide | BinaryOp::Modulo if b.is_zero() => {
                    return Err(RuntimeError::DivisionByZero)
                }
                BinaryOp::Divide => a * factor / b,
                BinaryOp::Modulo => a % b,
                _ => return Err(RuntimeError::unreachable(format!("`{}` is not arithmetic", op.symbol()))),
            };
            fit_fixed(*ty, result)
        }
        _ => Err(mismatch(left, right)),
    }
}

pub fn compare(op: BinaryOp, left: &Value, right: &Value) -> RuntimeResult<bool> {
    let ordering = match (left, right) {
        (Value::Integer { value: a, .. }, Value::Integer { value: b, .. }) => a.cmp(b),
        (Value::Fixed { value: a, .. }, Value::Fixed { value: b, .. }) => a.cmp(b),
        _ => return Err(mismatch(left, right)),
    };
    Ok(match op {
        BinaryOp::Less => ordering == Ordering::Less,
        BinaryOp::LessEqual => ordering != Ordering::Greater,
        BinaryOp::Greater => ordering == Ordering::Greater,
        BinaryOp::GreaterEqual => ordering != Ordering::Less,
        _ => return Err(RuntimeError::unreachable(format!("`{}` is not a comparison", op.symbol()))),
    })
}

pub fn negate(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Integer { ty, value } => fit_integer(*ty, -value),
        Value::Fixed { ty, value } => fit_fixed(*ty, -BigInt::from(*value)),
        other => Err(RuntimeError::TypeMismatch {
            expected: Type::Primitive(PrimitiveType::SignedNumber),
            actual: other.dynamic_type(),
        }),
    }
}

/// `UInt8(x)` and friends. Fixed-point to integer truncates toward zero.
pub fn convert(target: PrimitiveType, value: &Value) -> RuntimeResult<Value> {
    let number = match value {
        Value::Some(inner) => return convert(target, inner),
        Value::Integer { value, .. } => (value.clone(), false),
        Value::Fixed { value, .. } => (BigInt::from(*value), true),
        other => {
            return Err(RuntimeError::TypeMismatch {
                expected: Type::Primitive(PrimitiveType::Number),
                actual: other.dynamic_type(),
            })
        }
    };
    let factor = BigInt::from(FIXED_POINT_FACTOR);
    match number {
        (integer, false) if target.is_concrete_fixed_point() => fit_fixed(target, integer * factor),
        (scaled, true) if target.is_concrete_fixed_point() => fit_fixed(target, scaled),
        (integer, false) => fit_integer(target, integer),
        (scaled, true) => fit_integer(target, scaled / factor),
    }
}
