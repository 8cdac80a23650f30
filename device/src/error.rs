use reductor_dtype::{DeviceSpec, ScalarDType};
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("size mismatch: expected {expected}, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// Element access past the end of a buffer.
    #[snafu(display("{what}: index {index} out of bounds for length {len}"))]
    OutOfBounds { what: String, index: usize, len: usize },

    #[snafu(display("dtype mismatch: buffer holds {actual}, requested {expected}"))]
    DTypeMismatch { expected: ScalarDType, actual: ScalarDType },

    /// A kernel was launched with an unset argument slot.
    #[snafu(display("kernel argument {index} is not set"))]
    MissingArgument { index: usize },

    /// Bound argument does not match the kernel signature.
    #[snafu(display("kernel argument {index}: {reason}"))]
    ArgumentMismatch { index: usize, reason: String },

    #[snafu(display("kernel '{name}' not found in program"))]
    KernelNotFound { name: String },

    /// Launch geometry differs from what the kernel was generated for.
    #[snafu(display("kernel '{kernel}' launched with {global}/{local} threads, expected {expected_global}/{expected_local}"))]
    LaunchGeometry { kernel: String, global: usize, local: usize, expected_global: usize, expected_local: usize },

    /// Buffer memory is not addressable from the host.
    #[snafu(display("buffer on {device} is not host accessible"))]
    NotHostAccessible { device: DeviceSpec },

    #[snafu(display("failed to compile '{name}': {reason}"))]
    Compilation { name: String, reason: String },

    #[snafu(display("runtime error: {message}"))]
    Runtime { message: String },

    #[snafu(display("codegen error: {source}"))]
    Codegen { source: reductor_codegen::Error },

    /// Invalid device specification.
    #[snafu(display("invalid device: {device}"))]
    InvalidDevice { device: String },

    /// Recognised device without an allocator in this build.
    #[snafu(display("device {device} is not supported by this build"))]
    UnsupportedDevice { device: DeviceSpec },

    #[cfg(feature = "cuda")]
    /// CUDA-specific errors.
    #[snafu(display("CUDA error: {source}"))]
    CudaError { source: cudarc::driver::DriverError },

    #[cfg(feature = "opencl")]
    /// OpenCL runtime errors, carried as text.
    #[snafu(display("OpenCL error: {message}"))]
    OpenCl { message: String },
}
