//! By-value kernel scalars for backends that push typed arguments.

use reductor_device::Result;
use reductor_device::error::ArgumentMismatchSnafu;
use reductor_dtype::ScalarDType;
use reductor_ir::ConstValue;

/// By-value kernel parameter in its device representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ScalarParam {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl ScalarParam {
    /// Convert argument `index` to `dtype`. Half scalars have no host representation here.
    pub(crate) fn new(index: usize, value: ConstValue, dtype: ScalarDType) -> Result<Self> {
        let value = value.cast(dtype);
        let int = |v: &ConstValue| match *v {
            ConstValue::Int(v) => v,
            ConstValue::UInt(v) => v as i64,
            ConstValue::Float(v) => v as i64,
        };
        let uint = |v: &ConstValue| match *v {
            ConstValue::Int(v) => v as u64,
            ConstValue::UInt(v) => v,
            ConstValue::Float(v) => v as u64,
        };
        Ok(match dtype {
            ScalarDType::Int8 => Self::I8(int(&value) as i8),
            ScalarDType::UInt8 => Self::U8(uint(&value) as u8),
            ScalarDType::Int16 => Self::I16(int(&value) as i16),
            ScalarDType::UInt16 => Self::U16(uint(&value) as u16),
            ScalarDType::Int32 => Self::I32(int(&value) as i32),
            ScalarDType::UInt32 => Self::U32(uint(&value) as u32),
            ScalarDType::Int64 => Self::I64(int(&value)),
            ScalarDType::UInt64 => Self::U64(uint(&value)),
            ScalarDType::Float32 => Self::F32(value.as_f64() as f32),
            ScalarDType::Float64 => Self::F64(value.as_f64()),
            ScalarDType::Float16 => {
                return ArgumentMismatchSnafu { index, reason: "half scalars cannot be passed by value" }.fail();
            }
        })
    }
}
