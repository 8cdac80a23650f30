//! Dtype-faithful scalar arithmetic for the host emulator.
//!
//! Values travel as [`ConstValue`] in the representation [`ConstValue::cast`]
//! produces: `Int` for signed, `UInt` for unsigned and `Float` for floating
//! types. Every result is cast back to its dtype, so integers wrap at their
//! width and `Float32` results are rounded to single precision.

use std::cmp::Ordering;

use reductor_codegen::UnsupportedDTypeSnafu;
use reductor_device::error::{CodegenSnafu, OutOfBoundsSnafu, RuntimeSnafu};
use reductor_device::Result;
use reductor_dtype::{DeviceSpec, HasDType, ScalarDType};
use reductor_ir::{BinaryOp, ConstValue, ReduceOp, UnaryOp};
use snafu::{IntoError, ensure};

fn unsupported(dtype: ScalarDType) -> reductor_device::Error {
    CodegenSnafu.into_error(UnsupportedDTypeSnafu { dtype, device: DeviceSpec::Host }.build())
}

fn element<'a>(bytes: &'a [u8], dtype: ScalarDType, index: usize, what: &str) -> Result<&'a [u8]> {
    let width = dtype.bytes();
    let len = bytes.len() / width;
    ensure!(index < len, OutOfBoundsSnafu { what, index, len });
    Ok(&bytes[index * width..(index + 1) * width])
}

/// Read element `index` of a little-endian array of `dtype`.
pub fn load(bytes: &[u8], dtype: ScalarDType, index: usize, what: &str) -> Result<ConstValue> {
    use ScalarDType::*;
    let raw = element(bytes, dtype, index, what)?;
    Ok(match dtype {
        Int8 => ConstValue::Int(i8::read_le(raw) as i64),
        Int16 => ConstValue::Int(i16::read_le(raw) as i64),
        Int32 => ConstValue::Int(i32::read_le(raw) as i64),
        Int64 => ConstValue::Int(i64::read_le(raw)),
        UInt8 => ConstValue::UInt(u8::read_le(raw) as u64),
        UInt16 => ConstValue::UInt(u16::read_le(raw) as u64),
        UInt32 => ConstValue::UInt(u32::read_le(raw) as u64),
        UInt64 => ConstValue::UInt(u64::read_le(raw)),
        Float32 => ConstValue::Float(f32::read_le(raw) as f64),
        Float64 => ConstValue::Float(f64::read_le(raw)),
        Float16 => return Err(unsupported(dtype)),
    })
}

/// Write `value`, cast to `dtype`, as element `index`.
pub fn store(bytes: &mut [u8], dtype: ScalarDType, index: usize, value: ConstValue, what: &str) -> Result<()> {
    use ScalarDType::*;
    let width = dtype.bytes();
    let len = bytes.len() / width;
    ensure!(index < len, OutOfBoundsSnafu { what, index, len });

    let mut out = Vec::with_capacity(width);
    match value.cast(dtype) {
        ConstValue::Int(v) => match dtype {
            Int8 => (v as i8).write_le(&mut out),
            Int16 => (v as i16).write_le(&mut out),
            Int32 => (v as i32).write_le(&mut out),
            _ => v.write_le(&mut out),
        },
        ConstValue::UInt(v) => match dtype {
            UInt8 => (v as u8).write_le(&mut out),
            UInt16 => (v as u16).write_le(&mut out),
            UInt32 => (v as u32).write_le(&mut out),
            _ => v.write_le(&mut out),
        },
        ConstValue::Float(v) => match dtype {
            Float32 => (v as f32).write_le(&mut out),
            Float64 => v.write_le(&mut out),
            _ => return Err(unsupported(dtype)),
        },
    }
    bytes[index * width..(index + 1) * width].copy_from_slice(&out);
    Ok(())
}

fn compare(a: ConstValue, b: ConstValue) -> Option<Ordering> {
    match (a, b) {
        (ConstValue::Int(a), ConstValue::Int(b)) => Some(a.cmp(&b)),
        (ConstValue::UInt(a), ConstValue::UInt(b)) => Some(a.cmp(&b)),
        // NaN compares false both ways, as in C.
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

fn max(a: ConstValue, b: ConstValue) -> ConstValue {
    match (a, b) {
        (ConstValue::Float(x), ConstValue::Float(y)) => ConstValue::Float(x.max(y)),
        _ if compare(b, a) == Some(Ordering::Greater) => b,
        _ => a,
    }
}

fn min(a: ConstValue, b: ConstValue) -> ConstValue {
    match (a, b) {
        (ConstValue::Float(x), ConstValue::Float(y)) => ConstValue::Float(x.min(y)),
        _ if compare(b, a) == Some(Ordering::Less) => b,
        _ => a,
    }
}

pub fn unary(op: UnaryOp, value: ConstValue, dtype: ScalarDType) -> Result<ConstValue> {
    let result = match (op, value) {
        (UnaryOp::Neg, ConstValue::Int(v)) => ConstValue::Int(v.wrapping_neg()),
        (UnaryOp::Neg, ConstValue::UInt(v)) => ConstValue::UInt(v.wrapping_neg()),
        (UnaryOp::Neg, ConstValue::Float(v)) => ConstValue::Float(-v),
        (UnaryOp::Abs, ConstValue::Int(v)) => ConstValue::Int(v.wrapping_abs()),
        (UnaryOp::Abs, ConstValue::UInt(v)) => ConstValue::UInt(v),
        (UnaryOp::Abs, ConstValue::Float(v)) => ConstValue::Float(v.abs()),
        (UnaryOp::Sqrt, ConstValue::Float(v)) => ConstValue::Float(v.sqrt()),
        (UnaryOp::Exp, ConstValue::Float(v)) => ConstValue::Float(v.exp()),
        (UnaryOp::Log, ConstValue::Float(v)) => ConstValue::Float(v.ln()),
        (op, _) => return RuntimeSnafu { message: format!("{op:?} on {dtype} value") }.fail(),
    };
    Ok(result.cast(dtype))
}

pub fn binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue, dtype: ScalarDType) -> Result<ConstValue> {
    use ConstValue::*;
    let result = match op {
        BinaryOp::Max => max(lhs, rhs),
        BinaryOp::Min => min(lhs, rhs),
        _ => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                _ => {
                    ensure!(b != 0, RuntimeSnafu { message: "integer division by zero" });
                    a.wrapping_div(b)
                }
            }),
            (UInt(a), UInt(b)) => UInt(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                _ => {
                    ensure!(b != 0, RuntimeSnafu { message: "integer division by zero" });
                    a / b
                }
            }),
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                Float(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    _ => a / b,
                })
            }
        },
    };
    Ok(result.cast(dtype))
}

/// Value-part combine of two partials of a reduction.
pub fn combine(op: ReduceOp, a: ConstValue, b: ConstValue, dtype: ScalarDType) -> Result<ConstValue> {
    match op {
        ReduceOp::Add => binary(BinaryOp::Add, a, b, dtype),
        ReduceOp::Mul => binary(BinaryOp::Mul, a, b, dtype),
        ReduceOp::Max | ReduceOp::ArgMax => Ok(max(a, b)),
        ReduceOp::Min | ReduceOp::ArgMin => Ok(min(a, b)),
    }
}

/// Strict comparison: the incumbent keeps ties.
pub fn displaces(op: ReduceOp, candidate: ConstValue, incumbent: ConstValue) -> bool {
    let wanted = match op {
        ReduceOp::Min | ReduceOp::ArgMin => Ordering::Less,
        _ => Ordering::Greater,
    };
    compare(candidate, incumbent) == Some(wanted)
}
