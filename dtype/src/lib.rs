//! Element types and device specifications shared by every reductor crate.
//!
//! Kernels generated by reductor operate on a single scalar element type per
//! expression tree. This crate describes those element types (sizes, signedness,
//! C spelling) and the devices kernels can be generated for.

pub mod ext;


pub use ext::HasDType;

/// Scalar element types supported by the reduction kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::IntoStaticStr)]
pub enum ScalarDType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float16,
    Float32,
    Float64,
}

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Number of value bits for integer types (0 for floats).
    pub const fn int_bits(&self) -> u32 {
        if self.is_int() { (self.bytes() * 8) as u32 } else { 0 }
    }

    /// Generic C spelling, used for diagnostics and labels.
    pub const fn c_style(&self) -> &'static str {
        match self {
            Self::Int8 => "signed char",
            Self::UInt8 => "unsigned char",
            Self::Int16 => "short",
            Self::UInt16 => "unsigned short",
            Self::Int32 => "int",
            Self::UInt32 => "unsigned int",
            Self::Int64 => "long long",
            Self::UInt64 => "unsigned long long",
            Self::Float16 => "half",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }
}

impl std::fmt::Display for ScalarDType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

/// Type of the position slots written by indexing reductions (argmax/argmin).
pub const INDEX_DTYPE: ScalarDType = ScalarDType::UInt32;

/// Device specification.
///
/// Identifies the execution target a kernel is generated for. The backend
/// dialect of the generated source follows from the variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceSpec {
    /// In-process reference device that emulates work-groups on the host.
    Host,
    /// OpenCL device.
    OpenCl { device_id: usize },
    /// CUDA device.
    Cuda { device_id: usize },
    /// Metal device. Listed so it can be parsed and reported; no kernel dialect exists for it.
    Metal { device_id: usize },
}

impl DeviceSpec {
    /// Canonical device string (e.g. `HOST`, `CUDA:0`).
    pub fn canonicalize(&self) -> String {
        match self {
            Self::Host => "HOST".to_string(),
            Self::OpenCl { device_id } => format!("OPENCL:{device_id}"),
            Self::Cuda { device_id } => format!("CUDA:{device_id}"),
            Self::Metal { device_id } => format!("METAL:{device_id}"),
        }
    }

    /// Device key without the ordinal, shared by all devices of one backend.
    pub fn base_key(&self) -> &'static str {
        match self {
            Self::Host => "HOST",
            Self::OpenCl { .. } => "OPENCL",
            Self::Cuda { .. } => "CUDA",
            Self::Metal { .. } => "METAL",
        }
    }
}

impl std::fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonicalize())
    }
}
