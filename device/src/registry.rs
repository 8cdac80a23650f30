use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

pub use reductor_dtype::DeviceSpec;

use crate::allocator::{Allocator, HostAllocator, LruAllocator};
use crate::error::{InvalidDeviceSnafu, Result, UnsupportedDeviceSnafu};

/// Environment variable naming the default device.
pub const DEVICE_ENV: &str = "REDUCTOR_DEVICE";

/// Extension trait for DeviceSpec to add parsing functionality.
///
/// This is in the device crate because parsing reports device errors.
pub trait DeviceSpecExt {
    /// Parse a device string into a DeviceSpec.
    ///
    /// Examples:
    /// - "HOST" -> DeviceSpec::Host
    /// - "CUDA:0" -> DeviceSpec::Cuda { device_id: 0 }
    /// - "opencl" -> DeviceSpec::OpenCl { device_id: 0 } (default to device 0)
    fn parse(s: &str) -> Result<DeviceSpec>;

    /// Device named by `REDUCTOR_DEVICE`, or the host device when unset.
    fn from_env() -> Result<DeviceSpec>;
}

impl DeviceSpecExt for DeviceSpec {
    fn parse(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        let (kind, ordinal) = match upper.split_once(':') {
            Some((kind, ordinal)) => (kind, Some(ordinal)),
            None => (upper.as_str(), None),
        };
        let device_id = match ordinal {
            Some(ordinal) => ordinal.parse().map_err(|_| InvalidDeviceSnafu { device: s }.build())?,
            None => 0,
        };

        match kind {
            "HOST" | "CPU" if ordinal.is_none() => Ok(DeviceSpec::Host),
            "OPENCL" | "CL" => Ok(DeviceSpec::OpenCl { device_id }),
            "CUDA" | "GPU" => Ok(DeviceSpec::Cuda { device_id }),
            "METAL" => Ok(DeviceSpec::Metal { device_id }),
            _ => InvalidDeviceSnafu { device: s }.fail(),
        }
    }

    fn from_env() -> Result<Self> {
        match std::env::var(DEVICE_ENV) {
            Ok(device) => <DeviceSpec as DeviceSpecExt>::parse(&device),
            Err(_) => Ok(DeviceSpec::Host),
        }
    }
}

/// Per-device allocators, created on first use and cached for the process.
pub struct DeviceRegistry {
    devices: RwLock<HashMap<DeviceSpec, Arc<dyn Allocator>>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self { devices: RwLock::new(HashMap::new()) }
    }

    /// Get or create a device allocator.
    pub fn get(&self, spec: &DeviceSpec) -> Result<Arc<dyn Allocator>> {
        // Fast path: read lock
        {
            let devices = self.devices.read();
            if let Some(allocator) = devices.get(spec) {
                return Ok(Arc::clone(allocator));
            }
        }

        // Slow path: write lock to create
        let mut devices = self.devices.write();

        // Double-check after acquiring write lock
        if let Some(allocator) = devices.get(spec) {
            return Ok(Arc::clone(allocator));
        }

        let allocator = self.create_allocator(spec)?;
        tracing::debug!(device = %spec, allocator = allocator.name(), "created allocator");
        devices.insert(spec.clone(), Arc::clone(&allocator));
        Ok(allocator)
    }

    /// Get a device by parsing a device string.
    pub fn get_device(&self, device: &str) -> Result<Arc<dyn Allocator>> {
        let spec = <DeviceSpec as DeviceSpecExt>::parse(device)?;
        self.get(&spec)
    }

    fn create_allocator(&self, spec: &DeviceSpec) -> Result<Arc<dyn Allocator>> {
        let base: Box<dyn Allocator> = match spec {
            DeviceSpec::Host => Box::new(HostAllocator),
            #[cfg(feature = "cuda")]
            DeviceSpec::Cuda { device_id } => Box::new(crate::allocator::CudaAllocator::new(*device_id)?),
            #[cfg(feature = "opencl")]
            DeviceSpec::OpenCl { device_id } => Box::new(crate::allocator::OpenClAllocator::new(*device_id)?),
            _ => return UnsupportedDeviceSnafu { device: spec.clone() }.fail(),
        };

        // Wrap with LRU cache (already thread-safe via Mutex)
        Ok(Arc::new(LruAllocator::new(base)))
    }
}

/// Global device registry instance.
static REGISTRY: Lazy<DeviceRegistry> = Lazy::new(DeviceRegistry::new);

/// Get the global device registry.
pub fn registry() -> &'static DeviceRegistry {
    &REGISTRY
}

/// Convenience function to get a device allocator by string.
pub fn get_device(device: &str) -> Result<Arc<dyn Allocator>> {
    registry().get_device(device)
}

/// Convenience function to get the host allocator.
pub fn host() -> Result<Arc<dyn Allocator>> {
    registry().get(&DeviceSpec::Host)
}

/// Convenience function to get CUDA allocator.
#[cfg(feature = "cuda")]
pub fn cuda(device_id: usize) -> Result<Arc<dyn Allocator>> {
    registry().get(&DeviceSpec::Cuda { device_id })
}

/// Convenience function to get an OpenCL allocator.
#[cfg(feature = "opencl")]
pub fn opencl(device_id: usize) -> Result<Arc<dyn Allocator>> {
    registry().get(&DeviceSpec::OpenCl { device_id })
}
