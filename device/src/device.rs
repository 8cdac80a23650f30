//! Device abstraction.
//!
//! A [`Device`] bundles everything needed to run generated kernels on one
//! backend:
//! - **Compiler**: turns a [`ProgramSpec`] into an executable [`Program`]
//! - **Allocator**: device memory for buffers and per-call workspaces
//! - **Queue factory**: creates in-order [`CommandQueue`]s
//!
//! Programs are `Send + Sync` so the runtime can share them through a
//! process-wide cache.

use std::sync::Arc;

use reductor_codegen::{GeneratedSource, ReducePlan};
use reductor_dtype::DeviceSpec;

use crate::allocator::Allocator;
use crate::error::Result;
use crate::kernel::{Kernel, KernelEntry};
use crate::queue::CommandQueue;
use crate::workspace::WorkspacePool;

/// Source handed to a backend compiler.
///
/// Carries the typed plan alongside the text so devices that interpret the
/// plan (the host reference device) need not parse the source.
#[derive(Debug, Clone)]
pub struct ProgramSpec {
    /// Program name (for debugging/profiling).
    pub name: String,

    pub src: String,

    pub device: DeviceSpec,

    /// Entry point names defined by `src`.
    pub entries: Vec<String>,

    pub plan: Arc<ReducePlan>,
}

impl ProgramSpec {
    /// Spec for both kernels of a generated reduction.
    pub fn from_generated(name: impl Into<String>, source: &GeneratedSource, device: DeviceSpec) -> Self {
        Self {
            name: name.into(),
            src: source.code.clone(),
            device,
            entries: vec![source.partial.name.clone(), source.final_.name.clone()],
            plan: source.plan.clone(),
        }
    }
}

/// A compiled, executable program exposing named kernel entries.
pub trait Program: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn device(&self) -> &DeviceSpec;

    /// Look up an entry point. Fails with `KernelNotFound` for unknown names.
    fn entry(&self, name: &str) -> Result<Arc<dyn KernelEntry>>;

    /// Fresh kernel with unset argument slots.
    fn kernel(&self, name: &str) -> Result<Kernel> {
        Ok(Kernel::new(self.entry(name)?))
    }
}

/// A compiler that transforms source into an executable [`Program`].
pub trait Compiler: Send + Sync {
    fn compile(&self, spec: &ProgramSpec) -> Result<Arc<dyn Program>>;

    /// Optional cache key for this compiler configuration.
    ///
    /// Used to differentiate compiled artifacts when the same device type
    /// can have multiple compiler configurations.
    fn cache_key(&self) -> Option<&str> {
        None
    }
}

/// Creates command queues for a device.
pub type QueueFactory = Arc<dyn Fn() -> Result<Box<dyn CommandQueue>> + Send + Sync>;

/// A device that owns compiler, allocator and queue factory.
pub struct Device {
    pub spec: DeviceSpec,

    pub allocator: Arc<dyn Allocator>,

    pub compiler: Arc<dyn Compiler>,

    pub queue_factory: QueueFactory,
}

impl Device {
    pub fn new(
        spec: DeviceSpec,
        allocator: Arc<dyn Allocator>,
        compiler: Arc<dyn Compiler>,
        queue_factory: QueueFactory,
    ) -> Self {
        Self { spec, allocator, compiler, queue_factory }
    }

    /// A new in-order queue.
    pub fn queue(&self) -> Result<Box<dyn CommandQueue>> {
        (self.queue_factory)()
    }

    /// Scratch pool drawing from this device's allocator.
    pub fn workspace_pool(&self) -> WorkspacePool {
        WorkspacePool::new(self.allocator.clone())
    }

    /// Get the base device key (strips device ID).
    ///
    /// Used for compiled program cache sharing across device instances.
    pub fn base_device_key(&self) -> &'static str {
        self.spec.base_key()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("spec", &self.spec)
            .field("allocator", &self.allocator.name())
            .field("compiler", &self.compiler.cache_key())
            .finish()
    }
}
