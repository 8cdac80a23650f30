//! Per-call scratch allocations.
//!
//! Every reduction call acquires its own [`Workspace`]; two calls never share
//! one, so kernels enqueued by concurrent calls on one stream cannot alias
//! each other's partials. The memory goes back to the allocator when the last
//! handle (including copies bound as kernel arguments) is dropped.

use std::ops::Deref;
use std::sync::Arc;

use reductor_dtype::ScalarDType;

use crate::allocator::{Allocator, BufferOptions};
use crate::buffer::Buffer;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct WorkspacePool {
    allocator: Arc<dyn Allocator>,
}

impl WorkspacePool {
    pub fn new(allocator: Arc<dyn Allocator>) -> Self {
        Self { allocator }
    }

    /// Exclusive scratch of `bytes` bytes. Contents are unspecified.
    pub fn acquire(&self, bytes: usize) -> Result<Workspace> {
        let buffer =
            Buffer::allocate_with(self.allocator.clone(), ScalarDType::UInt8, bytes, &BufferOptions::default())?;
        tracing::trace!(workspace.bytes = bytes, allocator = self.allocator.name(), "acquired workspace");
        Ok(Workspace { buffer })
    }
}

/// Scratch owned by one reduction call. Deliberately not `Clone`.
#[derive(Debug)]
pub struct Workspace {
    buffer: Buffer,
}

impl Workspace {
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn bytes(&self) -> usize {
        self.buffer.size()
    }
}

impl Deref for Workspace {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        &self.buffer
    }
}
