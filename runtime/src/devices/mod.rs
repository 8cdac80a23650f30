//! Device implementations for different backends.

#[cfg(feature = "cuda")]
pub mod cuda;
pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;
#[cfg(any(feature = "cuda", feature = "opencl"))]
mod scalar;

#[cfg(feature = "cuda")]
pub use cuda::{CudaCompiler, CudaQueue, create_cuda_device};
pub use host::{HostCompiler, HostQueue, create_host_device};
#[cfg(feature = "opencl")]
pub use opencl::{OpenClCompiler, OpenClQueue, create_opencl_device};
