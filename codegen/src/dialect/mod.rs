//! Backend emission strategies.
//!
//! A [`Dialect`] supplies every piece of backend-specific text the reduction
//! emitters need: prologue, kernel attributes, address-space qualifiers,
//! barriers, work-item ids, type names, vector loads, literals and math
//! function spellings. Emitters never branch on the backend themselves.

pub mod cuda;
pub mod opencl;

use reductor_dtype::{DeviceSpec, ScalarDType};
use reductor_ir::{ConstValue, UnaryOp};
use smallvec::SmallVec;

use crate::{Result, UnsupportedBackendSnafu};

pub use cuda::CudaDialect;
pub use opencl::OpenClDialect;

/// Work-item query, rendered per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkItem {
    /// Lane within the group.
    LocalId,
    GlobalId,
    GroupId,
    /// Total launched threads.
    GlobalSize,
    /// Threads per group.
    LocalSize,
}

pub trait Dialect: std::fmt::Debug + Send + Sync {
    /// Backend name (e.g. "opencl", "cuda").
    fn name(&self) -> &'static str;

    /// File-level lines emitted once before the first kernel.
    fn prologue(&self, dtype: ScalarDType) -> SmallVec<[&'static str; 2]>;

    /// Per-kernel attribute line pinning the group size, if the backend needs one.
    fn kernel_attribute(&self, group_size: usize) -> Option<String>;

    /// Return type and qualifier preceding the entry name.
    fn kernel_qualifier(&self) -> &'static str;

    /// Pointer type into global memory.
    fn global_ptr(&self, ty: &str) -> String;

    /// Declaration of a group-shared array.
    fn local_array(&self, ty: &str, name: &str, len: usize) -> String;

    /// Group-wide barrier statement.
    fn barrier(&self) -> &'static str;

    fn work_item(&self, item: WorkItem) -> &'static str;

    fn scalar_type(&self, dtype: ScalarDType) -> &'static str;

    /// Supported vector widths for `dtype`, always including 1.
    fn vector_widths(&self, dtype: ScalarDType) -> &'static [usize];

    fn supports_vector_width(&self, dtype: ScalarDType, width: usize) -> bool {
        self.vector_widths(dtype).contains(&width)
    }

    fn vector_type(&self, dtype: ScalarDType, width: usize) -> String;

    /// Load the `index`-th `width`-wide chunk of `ptr`.
    fn vector_load(&self, dtype: ScalarDType, width: usize, ptr: &str, index: &str) -> String;

    /// Access one lane of a vector value.
    fn vector_lane(&self, var: &str, lane: usize) -> String;

    /// Literal of `value` converted to `dtype`.
    fn literal(&self, value: ConstValue, dtype: ScalarDType) -> String;

    fn max(&self, dtype: ScalarDType, a: &str, b: &str) -> String;

    fn min(&self, dtype: ScalarDType, a: &str, b: &str) -> String;

    fn unary(&self, op: UnaryOp, dtype: ScalarDType, x: &str) -> String;
}

static OPENCL: OpenClDialect = OpenClDialect;
static CUDA: CudaDialect = CudaDialect;

/// Emission strategy for a device.
///
/// The host reference device renders OpenCL text; its kernels are executed
/// from the typed plan, so the text only serves inspection and caching.
pub fn dialect_for(device: &DeviceSpec) -> Result<&'static dyn Dialect> {
    match device {
        DeviceSpec::Host | DeviceSpec::OpenCl { .. } => Ok(&OPENCL),
        DeviceSpec::Cuda { .. } => Ok(&CUDA),
        DeviceSpec::Metal { .. } => UnsupportedBackendSnafu { device: device.clone() }.fail(),
    }
}

/// Shortest decimal spelling of a float that round-trips at `dtype` precision.
pub(crate) fn float_digits(v: f64, dtype: ScalarDType) -> String {
    match dtype {
        ScalarDType::Float64 => format!("{v:?}"),
        _ => format!("{:?}", v as f32),
    }
}

/// Integer literal with the given 64-bit suffixes.
///
/// The most negative value of a signed type is written as a subtraction,
/// since C parses `-2147483648` as negation of an out-of-range literal.
pub(crate) fn int_literal(value: ConstValue, dtype: ScalarDType, long: &str, ulong: &str) -> String {
    let value = value.cast(dtype);
    match (value, dtype) {
        (ConstValue::Int(v), ScalarDType::Int64) if v == i64::MIN => format!("(-9223372036854775807{long} - 1)"),
        (ConstValue::Int(v), ScalarDType::Int64) => format!("{v}{long}"),
        (ConstValue::Int(v), ScalarDType::Int32) if v == i32::MIN as i64 => "(-2147483647 - 1)".to_string(),
        (ConstValue::UInt(v), ScalarDType::UInt64) => format!("{v}{ulong}"),
        (ConstValue::UInt(v), ScalarDType::UInt32) => format!("{v}U"),
        (ConstValue::Int(v), _) => v.to_string(),
        (ConstValue::UInt(v), _) => v.to_string(),
        (ConstValue::Float(v), _) => format!("{}", v as i64),
    }
}

/// Absolute value of an integer expression without library calls.
pub(crate) fn int_abs(dtype: ScalarDType, x: &str) -> String {
    if dtype.is_unsigned() { x.to_string() } else { format!("(({x}) < 0 ? -({x}) : ({x}))") }
}
