//! Driver abstraction for generated reduction kernels.
//!
//! - [`allocator`] - raw device memory, host/CUDA/OpenCL allocators and the LRU cache
//! - [`buffer`] - typed buffers with host upload/download
//! - [`workspace`] - per-call scratch allocations
//! - [`kernel`] - entry points and argument binding
//! - [`queue`] - launch geometry and the in-order queue trait
//! - [`device`] - program/compiler traits and the device bundle
//! - [`registry`] - device string parsing and the allocator registry
//! - `cl` (feature `opencl`) - per-device OpenCL context and in-order queue

pub mod allocator;
pub mod buffer;
#[cfg(feature = "opencl")]
pub mod cl;
pub mod device;
pub mod error;
pub mod kernel;
pub mod queue;
pub mod registry;
pub mod workspace;

#[cfg(test)]
pub mod test;

#[cfg(feature = "cuda")]
pub use allocator::CudaAllocator;
#[cfg(feature = "opencl")]
pub use allocator::OpenClAllocator;
pub use allocator::{Allocator, BufferOptions, HostAllocator, LruAllocator, RawBuffer};
pub use buffer::Buffer;
pub use device::{Compiler, Device, Program, ProgramSpec, QueueFactory};
pub use error::{Error, Result};
pub use kernel::{Kernel, KernelArg, KernelEntry};
pub use queue::{CommandQueue, ExecParams, Launch};
#[cfg(feature = "cuda")]
pub use registry::cuda;
#[cfg(feature = "opencl")]
pub use registry::opencl;
pub use registry::{DEVICE_ENV, DeviceRegistry, DeviceSpec, DeviceSpecExt, get_device, host, registry};
pub use workspace::{Workspace, WorkspacePool};
