//! In-order command queue abstraction.
//!
//! Launches submitted to one queue execute in submission order, and a kernel
//! observes every write made by the kernels submitted before it. That is the
//! only ordering guarantee the reduction launch protocol relies on; an
//! out-of-order backend would need an explicit fence between dependent
//! launches.

use std::sync::Arc;

use reductor_dtype::DeviceSpec;

use crate::error::Result;
use crate::kernel::{Kernel, KernelArg, KernelEntry};

/// Kernel execution parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecParams {
    /// Global work size (total number of work items per dimension).
    pub global_size: [usize; 3],
    /// Local work size (work group size per dimension).
    pub local_size: [usize; 3],
}

impl ExecParams {
    /// Create 1D execution parameters.
    pub fn new_1d(global: usize, local: usize) -> Self {
        Self { global_size: [global, 1, 1], local_size: [local, 1, 1] }
    }

    /// True when the launch is one-dimensional.
    pub fn is_1d(&self) -> bool {
        self.global_size[1..] == [1, 1] && self.local_size[1..] == [1, 1]
    }

    /// Number of groups along the first dimension.
    pub fn groups(&self) -> usize {
        self.global_size[0].checked_div(self.local_size[0]).unwrap_or(0)
    }
}

impl Default for ExecParams {
    fn default() -> Self {
        Self { global_size: [1, 1, 1], local_size: [1, 1, 1] }
    }
}

/// A kernel launch captured with its bound arguments.
#[derive(Debug, Clone)]
pub struct Launch {
    pub entry: Arc<dyn KernelEntry>,
    pub args: Vec<KernelArg>,
    pub params: ExecParams,
}

impl Launch {
    /// Capture `kernel` as currently bound. Fails if a slot is unset.
    pub fn capture(kernel: &Kernel, params: &ExecParams) -> Result<Self> {
        Ok(Self { entry: kernel.entry().clone(), args: kernel.bound_args()?, params: params.clone() })
    }

    pub fn run(&self) -> Result<()> {
        self.entry.launch(&self.args, &self.params)
    }
}

/// In-order execution stream of one device.
pub trait CommandQueue: std::fmt::Debug {
    fn device(&self) -> &DeviceSpec;

    /// Submit `kernel` with its current bindings. Later rebinding does not
    /// affect an already-enqueued launch.
    fn enqueue(&mut self, kernel: &Kernel, params: &ExecParams) -> Result<()>;

    /// Block until every submitted launch has completed.
    fn synchronize(&mut self) -> Result<()>;

    /// Launches submitted but not yet known to be complete.
    fn pending(&self) -> usize {
        0
    }
}
