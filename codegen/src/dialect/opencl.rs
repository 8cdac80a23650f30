use reductor_dtype::ScalarDType;
use reductor_ir::{ConstValue, UnaryOp};
use smallvec::{SmallVec, smallvec};

use super::{Dialect, WorkItem, float_digits, int_abs, int_literal};

/// OpenCL C 1.2.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenClDialect;

impl Dialect for OpenClDialect {
    fn name(&self) -> &'static str {
        "opencl"
    }

    fn prologue(&self, dtype: ScalarDType) -> SmallVec<[&'static str; 2]> {
        match dtype {
            ScalarDType::Float16 => smallvec!["#pragma OPENCL EXTENSION cl_khr_fp16 : enable"],
            ScalarDType::Float64 => smallvec!["#pragma OPENCL EXTENSION cl_khr_fp64 : enable"],
            _ => SmallVec::new(),
        }
    }

    fn kernel_attribute(&self, group_size: usize) -> Option<String> {
        Some(format!("__attribute__((reqd_work_group_size({group_size},1,1)))"))
    }

    fn kernel_qualifier(&self) -> &'static str {
        "__kernel void"
    }

    fn global_ptr(&self, ty: &str) -> String {
        format!("__global {ty}*")
    }

    fn local_array(&self, ty: &str, name: &str, len: usize) -> String {
        format!("__local {ty} {name}[{len}];")
    }

    fn barrier(&self) -> &'static str {
        "barrier(CLK_LOCAL_MEM_FENCE);"
    }

    fn work_item(&self, item: WorkItem) -> &'static str {
        match item {
            WorkItem::LocalId => "get_local_id(0)",
            WorkItem::GlobalId => "get_global_id(0)",
            WorkItem::GroupId => "get_group_id(0)",
            WorkItem::GlobalSize => "get_global_size(0)",
            WorkItem::LocalSize => "get_local_size(0)",
        }
    }

    fn scalar_type(&self, dtype: ScalarDType) -> &'static str {
        match dtype {
            ScalarDType::Int8 => "char",
            ScalarDType::UInt8 => "uchar",
            ScalarDType::Int16 => "short",
            ScalarDType::UInt16 => "ushort",
            ScalarDType::Int32 => "int",
            ScalarDType::UInt32 => "uint",
            ScalarDType::Int64 => "long",
            ScalarDType::UInt64 => "ulong",
            ScalarDType::Float16 => "half",
            ScalarDType::Float32 => "float",
            ScalarDType::Float64 => "double",
        }
    }

    fn vector_widths(&self, _dtype: ScalarDType) -> &'static [usize] {
        &[1, 2, 4, 8, 16]
    }

    fn vector_type(&self, dtype: ScalarDType, width: usize) -> String {
        match width {
            1 => self.scalar_type(dtype).to_string(),
            _ => format!("{}{width}", self.scalar_type(dtype)),
        }
    }

    fn vector_load(&self, _dtype: ScalarDType, width: usize, ptr: &str, index: &str) -> String {
        format!("vload{width}({index}, {ptr})")
    }

    fn vector_lane(&self, var: &str, lane: usize) -> String {
        format!("{var}.s{lane:x}")
    }

    fn literal(&self, value: ConstValue, dtype: ScalarDType) -> String {
        if !dtype.is_float() {
            return int_literal(value, dtype, "L", "UL");
        }
        let v = value.cast(dtype).as_f64();
        let text = if v.is_nan() {
            "NAN".to_string()
        } else if v.is_infinite() {
            if v < 0.0 { "-INFINITY".to_string() } else { "INFINITY".to_string() }
        } else {
            match dtype {
                ScalarDType::Float64 => float_digits(v, dtype),
                _ => format!("{}f", float_digits(v, dtype)),
            }
        };
        match dtype {
            ScalarDType::Float16 => format!("(half){text}"),
            _ => text,
        }
    }

    fn max(&self, dtype: ScalarDType, a: &str, b: &str) -> String {
        if dtype.is_float() { format!("fmax({a}, {b})") } else { format!("max({a}, {b})") }
    }

    fn min(&self, dtype: ScalarDType, a: &str, b: &str) -> String {
        if dtype.is_float() { format!("fmin({a}, {b})") } else { format!("min({a}, {b})") }
    }

    fn unary(&self, op: UnaryOp, dtype: ScalarDType, x: &str) -> String {
        match op {
            UnaryOp::Neg => format!("(-{x})"),
            UnaryOp::Abs if dtype.is_float() => format!("fabs({x})"),
            UnaryOp::Abs => int_abs(dtype, x),
            UnaryOp::Sqrt => format!("sqrt({x})"),
            UnaryOp::Exp => format!("exp({x})"),
            UnaryOp::Log => format!("log({x})"),
        }
    }
}
