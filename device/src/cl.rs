//! Shared OpenCL handles.
//!
//! Buffers and programs of one device must belong to the same context, and
//! the reduction launch protocol needs a single in-order queue that also
//! carries buffer transfers. Both are created once per device ordinal and
//! handed to the allocator and the runtime alike.

use std::collections::HashMap;
use std::sync::Arc;

use ocl::{Context, Device, Platform, Queue};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reductor_dtype::DeviceSpec;

use crate::error::{OpenClSnafu, Result, UnsupportedDeviceSnafu};

/// Context, device and in-order queue of one OpenCL device.
#[derive(Debug, Clone)]
pub struct OpenClContext {
    pub device_id: usize,
    pub device: Device,
    pub context: Context,
    pub queue: Queue,
}

// SAFETY: OpenCL objects are reference-counted handles that the OpenCL
// runtime allows to be shared between threads; commands are serialised by
// the in-order queue.
unsafe impl Send for OpenClContext {}
unsafe impl Sync for OpenClContext {}

impl OpenClContext {
    fn open(device_id: usize) -> Result<Self> {
        let unsupported = || UnsupportedDeviceSnafu { device: DeviceSpec::OpenCl { device_id } }.build();
        let platform = Platform::list().into_iter().next().ok_or_else(unsupported)?;
        let device = Device::list_all(platform).map_err(ocl_error)?.get(device_id).cloned().ok_or_else(unsupported)?;

        let context = Context::builder().platform(platform).devices(device).build().map_err(ocl_error)?;
        let queue = Queue::new(&context, device, None).map_err(ocl_error)?;
        tracing::debug!(device_id, device.name = %device.name().unwrap_or_default(), "opened OpenCL device");
        Ok(Self { device_id, device, context, queue })
    }

    pub fn spec(&self) -> DeviceSpec {
        DeviceSpec::OpenCl { device_id: self.device_id }
    }
}

static CONTEXTS: Lazy<Mutex<HashMap<usize, Arc<OpenClContext>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Handles for device `device_id` of the first platform, opened on first use.
pub fn context(device_id: usize) -> Result<Arc<OpenClContext>> {
    let mut contexts = CONTEXTS.lock();
    if let Some(ctx) = contexts.get(&device_id) {
        return Ok(Arc::clone(ctx));
    }
    let ctx = Arc::new(OpenClContext::open(device_id)?);
    contexts.insert(device_id, Arc::clone(&ctx));
    Ok(ctx)
}

/// True when an OpenCL platform is visible to this process.
pub fn is_available() -> bool {
    !Platform::list().is_empty()
}

pub fn ocl_error(err: impl std::fmt::Display) -> crate::Error {
    OpenClSnafu { message: err.to_string() }.build()
}
