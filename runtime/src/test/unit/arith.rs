use reductor_dtype::ScalarDType;
use reductor_ir::{BinaryOp, ConstValue, ReduceOp, UnaryOp};
use test_case::test_case;

use crate::devices::host::arith::{binary, combine, displaces, load, store, unary};

#[test_case(ScalarDType::Int8, ConstValue::Int(-5))]
#[test_case(ScalarDType::UInt16, ConstValue::UInt(65535))]
#[test_case(ScalarDType::Int64, ConstValue::Int(i64::MIN))]
#[test_case(ScalarDType::Float32, ConstValue::Float(0.5))]
#[test_case(ScalarDType::Float64, ConstValue::Float(-1e300))]
fn test_store_then_load(dtype: ScalarDType, value: ConstValue) {
    let mut bytes = vec![0u8; dtype.bytes() * 3];
    store(&mut bytes, dtype, 2, value, "buf").unwrap();
    assert_eq!(load(&bytes, dtype, 2, "buf").unwrap(), value);
    assert_eq!(load(&bytes, dtype, 0, "buf").unwrap(), ConstValue::zero(dtype));
}

#[test]
fn test_access_past_end_is_out_of_bounds() {
    let mut bytes = vec![0u8; 8];
    let err = load(&bytes, ScalarDType::Int32, 2, "x").unwrap_err();
    assert!(matches!(err, reductor_device::Error::OutOfBounds { index: 2, len: 2, .. }), "{err}");
    assert!(store(&mut bytes, ScalarDType::Float64, 1, ConstValue::Float(1.0), "x").is_err());
}

#[test]
fn test_half_is_not_emulated() {
    let err = load(&[0u8; 4], ScalarDType::Float16, 0, "x").unwrap_err();
    assert!(matches!(err, reductor_device::Error::Codegen { .. }), "{err}");
}

#[test_case(BinaryOp::Add, ScalarDType::UInt8, ConstValue::UInt(250), ConstValue::UInt(10), ConstValue::UInt(4))]
#[test_case(BinaryOp::Sub, ScalarDType::UInt32, ConstValue::UInt(0), ConstValue::UInt(1), ConstValue::UInt(0xffff_ffff))]
#[test_case(BinaryOp::Mul, ScalarDType::Int16, ConstValue::Int(300), ConstValue::Int(300), ConstValue::Int(24464))]
#[test_case(BinaryOp::Div, ScalarDType::Int32, ConstValue::Int(-7), ConstValue::Int(2), ConstValue::Int(-3))]
#[test_case(BinaryOp::Max, ScalarDType::Int8, ConstValue::Int(-1), ConstValue::Int(-9), ConstValue::Int(-1))]
#[test_case(BinaryOp::Min, ScalarDType::UInt64, ConstValue::UInt(3), ConstValue::UInt(u64::MAX), ConstValue::UInt(3))]
fn test_integer_binary_wraps(op: BinaryOp, dtype: ScalarDType, lhs: ConstValue, rhs: ConstValue, expected: ConstValue) {
    assert_eq!(binary(op, lhs, rhs, dtype).unwrap(), expected);
}

#[test]
fn test_integer_division_by_zero_fails() {
    assert!(binary(BinaryOp::Div, ConstValue::Int(1), ConstValue::Int(0), ScalarDType::Int32).is_err());
    let inf = binary(BinaryOp::Div, ConstValue::Float(1.0), ConstValue::Float(0.0), ScalarDType::Float64).unwrap();
    assert_eq!(inf, ConstValue::Float(f64::INFINITY));
}

#[test]
fn test_float32_results_are_rounded() {
    let big = ConstValue::Float(16777216.0);
    let sum = binary(BinaryOp::Add, big, ConstValue::Float(1.0), ScalarDType::Float32).unwrap();
    assert_eq!(sum, ConstValue::Float(16777216.0));

    let third = binary(BinaryOp::Div, ConstValue::Float(1.0), ConstValue::Float(3.0), ScalarDType::Float32).unwrap();
    assert_eq!(third, ConstValue::Float((1.0f32 / 3.0) as f64));
}

#[test]
fn test_unary_ops() {
    assert_eq!(unary(UnaryOp::Neg, ConstValue::Int(i8::MIN as i64), ScalarDType::Int8).unwrap(), ConstValue::Int(-128));
    assert_eq!(unary(UnaryOp::Abs, ConstValue::Float(-2.5), ScalarDType::Float64).unwrap(), ConstValue::Float(2.5));
    assert_eq!(unary(UnaryOp::Sqrt, ConstValue::Float(9.0), ScalarDType::Float32).unwrap(), ConstValue::Float(3.0));
    assert!(unary(UnaryOp::Sqrt, ConstValue::Int(9), ScalarDType::Int32).is_err());
}

#[test_case(ReduceOp::Add, ConstValue::Int(2), ConstValue::Int(3), ConstValue::Int(5))]
#[test_case(ReduceOp::Mul, ConstValue::Int(2), ConstValue::Int(3), ConstValue::Int(6))]
#[test_case(ReduceOp::Max, ConstValue::Int(2), ConstValue::Int(3), ConstValue::Int(3))]
#[test_case(ReduceOp::ArgMin, ConstValue::Int(2), ConstValue::Int(3), ConstValue::Int(2))]
fn test_combine(op: ReduceOp, a: ConstValue, b: ConstValue, expected: ConstValue) {
    assert_eq!(combine(op, a, b, ScalarDType::Int32).unwrap(), expected);
}

#[test]
fn test_displacement_is_strict() {
    let (one, two) = (ConstValue::Float(1.0), ConstValue::Float(2.0));
    assert!(displaces(ReduceOp::ArgMax, two, one));
    assert!(!displaces(ReduceOp::ArgMax, one, one));
    assert!(displaces(ReduceOp::ArgMin, one, two));
    assert!(!displaces(ReduceOp::ArgMin, two, two));
    assert!(!displaces(ReduceOp::ArgMax, ConstValue::Float(f64::NAN), one));
    assert!(!displaces(ReduceOp::ArgMax, one, ConstValue::Float(f64::NAN)));
}
