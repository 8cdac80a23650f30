//! Operation and constant types used by expression tree nodes.

use reductor_dtype::ScalarDType;

/// Constant value carried by `Const` nodes and scalar kernel arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
}

/// Helper macro to cast to target width and back to storage type (for proper truncation/extension).
macro_rules! cast_via {
    ($v:expr, $target:ty, $storage:ty) => {
        ($v as $target) as $storage
    };
}

#[inline]
fn cast_int(v: i64, to: ScalarDType) -> ConstValue {
    use ScalarDType::*;
    match to {
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v as u64),
        Float16 | Float64 => ConstValue::Float(v as f64),
        Float32 => ConstValue::Float(v as f32 as f64),
    }
}

#[inline]
fn cast_uint(v: u64, to: ScalarDType) -> ConstValue {
    use ScalarDType::*;
    match to {
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v as i64),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v),
        Float16 | Float64 => ConstValue::Float(v as f64),
        Float32 => ConstValue::Float(v as f32 as f64),
    }
}

#[inline]
fn cast_float(v: f64, to: ScalarDType) -> ConstValue {
    use ScalarDType::*;
    match to {
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v as i64),
        // Float-to-unsigned goes through i64 first, like a C cast chain.
        UInt8 => ConstValue::UInt(cast_via!(v as i64, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v as i64, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v as i64, u32, u64)),
        UInt64 => ConstValue::UInt((v as i64) as u64),
        Float16 | Float64 => ConstValue::Float(v),
        Float32 => ConstValue::Float(v as f32 as f64),
    }
}

impl ConstValue {
    pub const fn zero(dtype: ScalarDType) -> Self {
        if dtype.is_float() {
            Self::Float(0.0)
        } else if dtype.is_signed() {
            Self::Int(0)
        } else {
            Self::UInt(0)
        }
    }

    pub const fn one(dtype: ScalarDType) -> Self {
        if dtype.is_float() {
            Self::Float(1.0)
        } else if dtype.is_signed() {
            Self::Int(1)
        } else {
            Self::UInt(1)
        }
    }

    /// Smallest value of `dtype` (negative infinity for floats).
    pub const fn lowest(dtype: ScalarDType) -> Self {
        use ScalarDType::*;
        match dtype {
            Int8 => Self::Int(i8::MIN as i64),
            Int16 => Self::Int(i16::MIN as i64),
            Int32 => Self::Int(i32::MIN as i64),
            Int64 => Self::Int(i64::MIN),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float16 | Float32 | Float64 => Self::Float(f64::NEG_INFINITY),
        }
    }

    /// Largest value of `dtype` (positive infinity for floats).
    pub const fn highest(dtype: ScalarDType) -> Self {
        use ScalarDType::*;
        match dtype {
            Int8 => Self::Int(i8::MAX as i64),
            Int16 => Self::Int(i16::MAX as i64),
            Int32 => Self::Int(i32::MAX as i64),
            Int64 => Self::Int(i64::MAX),
            UInt8 => Self::UInt(u8::MAX as u64),
            UInt16 => Self::UInt(u16::MAX as u64),
            UInt32 => Self::UInt(u32::MAX as u64),
            UInt64 => Self::UInt(u64::MAX),
            Float16 | Float32 | Float64 => Self::Float(f64::INFINITY),
        }
    }

    /// Cast this constant to `dtype` with C conversion semantics.
    ///
    /// Integers truncate/wrap to the target width, float-to-int truncates toward
    /// zero, and `Float32` targets are rounded to single precision.
    pub fn cast(&self, dtype: ScalarDType) -> Self {
        match *self {
            ConstValue::Int(v) => cast_int(v, dtype),
            ConstValue::UInt(v) => cast_uint(v, dtype),
            ConstValue::Float(v) => cast_float(v, dtype),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            ConstValue::Int(v) => v as f64,
            ConstValue::UInt(v) => v as f64,
            ConstValue::Float(v) => v,
        }
    }
}

/// Reduction operator families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::VariantArray, strum::IntoStaticStr)]
pub enum ReduceOp {
    /// Sum reduction (a + b).
    Add,
    /// Product reduction (a * b).
    Mul,
    /// Maximum reduction (max(a, b)).
    Max,
    /// Minimum reduction (min(a, b)).
    Min,
    /// Position of the maximum value.
    ArgMax,
    /// Position of the minimum value.
    ArgMin,
}

impl ReduceOp {
    /// True for reductions that report a position in addition to a value.
    pub const fn is_indexing(&self) -> bool {
        matches!(self, Self::ArgMax | Self::ArgMin)
    }

    /// Neutral element of the value part of the reduction.
    pub const fn identity(&self, dtype: ScalarDType) -> ConstValue {
        match self {
            Self::Add => ConstValue::zero(dtype),
            Self::Mul => ConstValue::one(dtype),
            Self::Max | Self::ArgMax => ConstValue::lowest(dtype),
            Self::Min | Self::ArgMin => ConstValue::highest(dtype),
        }
    }
}

/// Unary operation types. All preserve the operand dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Negation: -x
    Neg,
    /// Absolute value: |x|
    Abs,
    /// Square root (float only)
    Sqrt,
    /// Natural exponential (float only)
    Exp,
    /// Natural logarithm (float only)
    Log,
}

impl UnaryOp {
    pub const fn requires_float(&self) -> bool {
        matches!(self, Self::Sqrt | Self::Exp | Self::Log)
    }
}

/// Binary operation types. Operands must share a dtype, which the result keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition: a + b
    Add,
    /// Subtraction: a - b
    Sub,
    /// Multiplication: a * b
    Mul,
    /// Division: a / b (truncating for integers)
    Div,
    /// Maximum: max(a, b)
    Max,
    /// Minimum: min(a, b)
    Min,
}
