//! Runtime execution for reductor kernels.
//!
//! Turns an expression tree into a finished reduction on a device:
//! generate the partial/final source, compile it once per device through the
//! global [`kernel_cache`], bind `N`, the scratch workspace and the tree's
//! arguments, then launch both kernels on one in-order queue.
//!
//! # Devices
//!
//! - `HOST`: reference device that emulates work-groups on the calling thread
//! - `CUDA:n` (feature `cuda`): NVRTC-compiled kernels on the default stream
//! - `OPENCL:n` (feature `opencl`): OpenCL C programs on one in-order queue
//!
//! # Usage
//!
//! ```ignore
//! let device = DEVICE_FACTORIES.device(&DeviceSpec::Host, reductor_device::registry())?;
//! let session = Reduce1dSession::builder().device(device).params(params).build()?;
//! session.run(&tree, &Bindings::new().with(input, &x).with(out, &y))?;
//! ```

pub mod device_registry;
pub mod devices;
pub mod error;
pub mod kernel_cache;
pub mod reduce_1d;
pub mod session;

#[cfg(test)]
pub mod test;

pub use device_registry::{DEVICE_FACTORIES, DeviceFactory, DeviceFactoryRegistry, default_device};
#[cfg(feature = "cuda")]
pub use devices::create_cuda_device;
pub use devices::{HostCompiler, HostQueue, create_host_device};
#[cfg(feature = "opencl")]
pub use devices::create_opencl_device;
pub use error::*;
pub use kernel_cache::{CachedProgram, get_or_compile, source_hash};
pub use reduce_1d::{Bindings, Reduce1dKernels, enqueue};
pub use session::{Reduce1dSession, run_reduce_1d};
