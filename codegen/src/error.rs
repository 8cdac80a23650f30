//! Error types for code generation.

use reductor_dtype::{DeviceSpec, ScalarDType};
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur during code generation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No kernel dialect exists for the device.
    #[snafu(display("Unsupported backend: {device}"))]
    UnsupportedBackend { device: DeviceSpec },

    /// Invalid tuning parameters.
    #[snafu(display("Invalid configuration: {reason}"))]
    InvalidConfig { reason: String },

    /// The backend has no vector type of this width for the element type.
    #[snafu(display("{backend} does not support {dtype} vectors of width {width}"))]
    UnsupportedVectorWidth { backend: &'static str, width: usize, dtype: ScalarDType },

    /// The element type cannot be executed on the target device.
    #[snafu(display("{dtype} is not supported on {device}"))]
    UnsupportedDType { dtype: ScalarDType, device: DeviceSpec },

    /// Missing required information.
    #[snafu(display("Missing {what}"))]
    Missing { what: String },

    /// Error from IR layer.
    #[snafu(display("IR error: {source}"))]
    Ir {
        #[snafu(source)]
        source: reductor_ir::Error,
    },
}
