//! Kernel source generation for fused 1-D reductions.
//!
//! # Architecture
//!
//! - **Traits**: the [`Template`] interface (source, workspace size, shared memory)
//! - **Dialects**: one emission strategy per backend (OpenCL, CUDA)
//! - **reduce_1d**: descriptor set, tuning parameters, scratch layout, typed
//!   plan and the emitter for the partial/final kernel pair
//!
//! # Usage
//!
//! ```ignore
//! use reductor_codegen::{Reduce1d, Template, TuningParams};
//!
//! let template = Reduce1d::new(TuningParams::builder().group_size(128).build())?;
//! let source = template.generate("_0", &tree, &DeviceSpec::Cuda { device_id: 0 })?;
//! ```

pub mod dialect;
pub mod error;
pub mod expr;
pub mod reduce_1d;
pub mod stream;
pub mod traits;
pub mod types;


pub use dialect::{Dialect, dialect_for};
pub use error::*;
pub use reduce_1d::{Reduce1d, ReducePlan, TuningParams};
pub use stream::KernelStream;
pub use traits::*;
pub use types::*;
