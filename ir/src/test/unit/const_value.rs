use proptest::prelude::*;
use reductor_dtype::ScalarDType;
use reductor_dtype::test::proptests::generators::int_dtype;
use test_case::test_case;

use crate::types::{ConstValue, ReduceOp};

// =============================================================================
// Casts
// =============================================================================

#[test_case(ConstValue::Int(42), ScalarDType::Int64, ConstValue::Int(42); "int64_identity")]
#[test_case(ConstValue::Int(300), ScalarDType::Int8, ConstValue::Int(44); "int_wraps_to_int8")]
#[test_case(ConstValue::Int(-1), ScalarDType::UInt16, ConstValue::UInt(65535); "negative_to_uint16")]
#[test_case(ConstValue::UInt(u64::MAX), ScalarDType::Int32, ConstValue::Int(-1); "uint_max_to_int32")]
#[test_case(ConstValue::Float(3.9), ScalarDType::Int32, ConstValue::Int(3); "float_truncates")]
#[test_case(ConstValue::Float(-3.9), ScalarDType::Int32, ConstValue::Int(-3); "float_truncates_toward_zero")]
#[test_case(ConstValue::Int(7), ScalarDType::Float64, ConstValue::Float(7.0); "int_to_float64")]
fn test_cast(input: ConstValue, dtype: ScalarDType, expected: ConstValue) {
    assert_eq!(input.cast(dtype), expected);
}

#[test]
fn test_cast_float32_rounds() {
    let ConstValue::Float(v) = ConstValue::Float(0.1).cast(ScalarDType::Float32) else { panic!("expected float") };
    assert_eq!(v, 0.1f32 as f64);
    assert_ne!(v, 0.1);
}

// =============================================================================
// Identities
// =============================================================================

#[test_case(ReduceOp::Add, ScalarDType::Float32, ConstValue::Float(0.0); "sum_float")]
#[test_case(ReduceOp::Mul, ScalarDType::Int32, ConstValue::Int(1); "prod_int")]
#[test_case(ReduceOp::Max, ScalarDType::Float64, ConstValue::Float(f64::NEG_INFINITY); "max_float")]
#[test_case(ReduceOp::Max, ScalarDType::Int16, ConstValue::Int(i16::MIN as i64); "max_int16")]
#[test_case(ReduceOp::Max, ScalarDType::UInt32, ConstValue::UInt(0); "max_uint")]
#[test_case(ReduceOp::Min, ScalarDType::UInt8, ConstValue::UInt(255); "min_uint8")]
#[test_case(ReduceOp::ArgMax, ScalarDType::Int32, ConstValue::Int(i32::MIN as i64); "argmax_int32")]
#[test_case(ReduceOp::ArgMin, ScalarDType::Float32, ConstValue::Float(f64::INFINITY); "argmin_float")]
fn test_identity(op: ReduceOp, dtype: ScalarDType, expected: ConstValue) {
    assert_eq!(op.identity(dtype), expected);
}

#[test]
fn test_is_indexing() {
    assert!(ReduceOp::ArgMax.is_indexing());
    assert!(ReduceOp::ArgMin.is_indexing());
    assert!(!ReduceOp::Add.is_indexing());
    assert!(!ReduceOp::Max.is_indexing());
}

proptest! {
    #[test]
    fn lowest_and_highest_survive_cast(dtype in int_dtype()) {
        prop_assert_eq!(ConstValue::lowest(dtype).cast(dtype), ConstValue::lowest(dtype));
        prop_assert_eq!(ConstValue::highest(dtype).cast(dtype), ConstValue::highest(dtype));
    }

    #[test]
    fn cast_is_idempotent(v in any::<i64>(), dtype in int_dtype()) {
        let once = ConstValue::Int(v).cast(dtype);
        prop_assert_eq!(once.cast(dtype), once);
    }
}
