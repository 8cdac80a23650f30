use reductor_dtype::ScalarDType;
use reductor_ir::{ConstValue, UnaryOp};
use smallvec::{SmallVec, smallvec};

use super::{Dialect, WorkItem, float_digits, int_abs, int_literal};

/// CUDA C++ as accepted by NVRTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct CudaDialect;

impl CudaDialect {
    fn vector_base(dtype: ScalarDType) -> &'static str {
        match dtype {
            ScalarDType::Int8 => "char",
            ScalarDType::UInt8 => "uchar",
            ScalarDType::Int16 => "short",
            ScalarDType::UInt16 => "ushort",
            ScalarDType::Int32 => "int",
            ScalarDType::UInt32 => "uint",
            ScalarDType::Int64 => "longlong",
            ScalarDType::UInt64 => "ulonglong",
            ScalarDType::Float16 => "half",
            ScalarDType::Float32 => "float",
            ScalarDType::Float64 => "double",
        }
    }

    fn math(dtype: ScalarDType, f32_name: &str, f64_name: &str, f16_name: &str, x: &str) -> String {
        match dtype {
            ScalarDType::Float64 => format!("{f64_name}({x})"),
            ScalarDType::Float16 => format!("{f16_name}({x})"),
            _ => format!("{f32_name}({x})"),
        }
    }
}

impl Dialect for CudaDialect {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn prologue(&self, dtype: ScalarDType) -> SmallVec<[&'static str; 2]> {
        let mut lines: SmallVec<[&'static str; 2]> = smallvec!["#include <vector_types.h>"];
        if dtype == ScalarDType::Float16 {
            lines.push("#include <cuda_fp16.h>");
        }
        lines
    }

    fn kernel_attribute(&self, _group_size: usize) -> Option<String> {
        None
    }

    fn kernel_qualifier(&self) -> &'static str {
        "extern \"C\" __global__ void"
    }

    fn global_ptr(&self, ty: &str) -> String {
        format!("{ty}*")
    }

    fn local_array(&self, ty: &str, name: &str, len: usize) -> String {
        format!("__shared__ {ty} {name}[{len}];")
    }

    fn barrier(&self) -> &'static str {
        "__syncthreads();"
    }

    fn work_item(&self, item: WorkItem) -> &'static str {
        match item {
            WorkItem::LocalId => "threadIdx.x",
            WorkItem::GlobalId => "blockIdx.x * blockDim.x + threadIdx.x",
            WorkItem::GroupId => "blockIdx.x",
            WorkItem::GlobalSize => "blockDim.x * gridDim.x",
            WorkItem::LocalSize => "blockDim.x",
        }
    }

    fn scalar_type(&self, dtype: ScalarDType) -> &'static str {
        match dtype {
            ScalarDType::Int8 => "signed char",
            ScalarDType::UInt8 => "unsigned char",
            ScalarDType::Int16 => "short",
            ScalarDType::UInt16 => "unsigned short",
            ScalarDType::Int32 => "int",
            ScalarDType::UInt32 => "unsigned int",
            ScalarDType::Int64 => "long long",
            ScalarDType::UInt64 => "unsigned long long",
            ScalarDType::Float16 => "__half",
            ScalarDType::Float32 => "float",
            ScalarDType::Float64 => "double",
        }
    }

    fn vector_widths(&self, dtype: ScalarDType) -> &'static [usize] {
        match dtype {
            ScalarDType::Float16 => &[1, 2],
            _ => &[1, 2, 4],
        }
    }

    fn vector_type(&self, dtype: ScalarDType, width: usize) -> String {
        match (dtype, width) {
            (_, 1) => self.scalar_type(dtype).to_string(),
            // Only the paired half type exists.
            (ScalarDType::Float16, _) => "__half2".to_string(),
            _ => format!("{}{width}", Self::vector_base(dtype)),
        }
    }

    fn vector_load(&self, dtype: ScalarDType, width: usize, ptr: &str, index: &str) -> String {
        format!("reinterpret_cast<const {}*>({ptr})[{index}]", self.vector_type(dtype, width))
    }

    fn vector_lane(&self, var: &str, lane: usize) -> String {
        const LANES: [&str; 4] = ["x", "y", "z", "w"];
        format!("{var}.{}", LANES[lane % LANES.len()])
    }

    fn literal(&self, value: ConstValue, dtype: ScalarDType) -> String {
        if !dtype.is_float() {
            return int_literal(value, dtype, "LL", "ULL");
        }
        let v = value.cast(dtype).as_f64();
        let neg = v.is_sign_negative();
        match dtype {
            ScalarDType::Float64 if v.is_nan() => "__longlong_as_double(0x7ff8000000000000LL)".to_string(),
            ScalarDType::Float64 if v.is_infinite() && neg => {
                "__longlong_as_double((long long)0xfff0000000000000ULL)".to_string()
            }
            ScalarDType::Float64 if v.is_infinite() => "__longlong_as_double(0x7ff0000000000000LL)".to_string(),
            ScalarDType::Float64 => float_digits(v, dtype),
            ScalarDType::Float16 if v.is_nan() => "__ushort_as_half((unsigned short)0x7e00U)".to_string(),
            ScalarDType::Float16 if v.is_infinite() && neg => "__ushort_as_half((unsigned short)0xfc00U)".to_string(),
            ScalarDType::Float16 if v.is_infinite() => "__ushort_as_half((unsigned short)0x7c00U)".to_string(),
            ScalarDType::Float16 => format!("__float2half({}f)", float_digits(v, dtype)),
            _ if v.is_nan() => "__int_as_float(0x7fffffff)".to_string(),
            _ if v.is_infinite() && neg => "__int_as_float(0xff800000)".to_string(),
            _ if v.is_infinite() => "__int_as_float(0x7f800000)".to_string(),
            _ => format!("{}f", float_digits(v, dtype)),
        }
    }

    fn max(&self, dtype: ScalarDType, a: &str, b: &str) -> String {
        match dtype {
            ScalarDType::Float16 => format!("__hmax({a}, {b})"),
            ScalarDType::Float32 => format!("fmaxf({a}, {b})"),
            ScalarDType::Float64 => format!("fmax({a}, {b})"),
            _ => format!("max({a}, {b})"),
        }
    }

    fn min(&self, dtype: ScalarDType, a: &str, b: &str) -> String {
        match dtype {
            ScalarDType::Float16 => format!("__hmin({a}, {b})"),
            ScalarDType::Float32 => format!("fminf({a}, {b})"),
            ScalarDType::Float64 => format!("fmin({a}, {b})"),
            _ => format!("min({a}, {b})"),
        }
    }

    fn unary(&self, op: UnaryOp, dtype: ScalarDType, x: &str) -> String {
        match op {
            UnaryOp::Neg => format!("(-{x})"),
            UnaryOp::Abs if dtype.is_float() => Self::math(dtype, "fabsf", "fabs", "__habs", x),
            UnaryOp::Abs => int_abs(dtype, x),
            UnaryOp::Sqrt => Self::math(dtype, "sqrtf", "sqrt", "hsqrt", x),
            UnaryOp::Exp => Self::math(dtype, "expf", "exp", "hexp", x),
            UnaryOp::Log => Self::math(dtype, "logf", "log", "hlog", x),
        }
    }
}
