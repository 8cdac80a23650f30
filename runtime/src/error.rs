//! Error types for launch orchestration.

use snafu::Snafu;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("device error: {source}"))]
    Device { source: reductor_device::Error },

    #[snafu(display("codegen error: {source}"))]
    Codegen { source: reductor_codegen::Error },

    #[snafu(display("expression tree error: {source}"))]
    Ir { source: reductor_ir::Error },

    /// A kernel argument of the tree has no bound value.
    #[snafu(display("no binding for argument '{name}'"))]
    MissingBinding { name: String },

    /// The input extent would wrap the kernels' 32-bit loop counters.
    #[snafu(display("input extent {extent} exceeds {max}, the largest extent these tuning parameters can scan"))]
    ExtentOverflow { extent: usize, max: usize },

    #[snafu(display("compilation of '{name}' failed: {source}"))]
    Compilation { name: String, source: reductor_device::Error },

    /// No device factory is registered for this device kind.
    #[snafu(display("unsupported device: {device}"))]
    UnsupportedDevice { device: String },
}
