//! Device factory registry for runtime device creation and caching.
//!
//! Full [`Device`] bundles (compiler + queue factory + allocator) live here,
//! separate from `reductor_device::registry::DeviceRegistry` which only
//! manages allocators, so the device crate never depends on backends.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use reductor_device::Result as DeviceResult;
use reductor_device::device::Device;
use reductor_device::registry::{DeviceRegistry, DeviceSpecExt};
use reductor_dtype::DeviceSpec;
use snafu::ResultExt;

use crate::error::{DeviceSnafu, Result, UnsupportedDeviceSnafu};

/// Factory function that creates a Device for a given DeviceSpec.
///
/// The factory receives the allocator registry so it can obtain the cached
/// allocator for the device.
pub type DeviceFactory = Arc<dyn Fn(&DeviceSpec, &DeviceRegistry) -> DeviceResult<Device> + Send + Sync>;

/// Registry for full Device objects with caching and factory registration.
///
/// Lookups take a read lock; creation re-checks the cache under the write
/// lock so each device is built once.
///
/// # Example
///
/// ```ignore
/// let device = DEVICE_FACTORIES.device(&DeviceSpec::Host, reductor_device::registry())?;
///
/// DEVICE_FACTORIES.register_factory("METAL", Arc::new(|_spec, reg| create_host_device(reg)));
/// ```
pub struct DeviceFactoryRegistry {
    devices: RwLock<HashMap<DeviceSpec, Arc<Device>>>,
    /// Device type string ("HOST", "CUDA", "OPENCL") -> factory.
    factories: RwLock<HashMap<String, DeviceFactory>>,
}

impl DeviceFactoryRegistry {
    /// Create a new registry with built-in device factories registered.
    pub fn new() -> Self {
        let registry = Self { devices: RwLock::new(HashMap::new()), factories: RwLock::new(HashMap::new()) };

        registry.register_factory(
            "HOST",
            Arc::new(|_spec, alloc_reg| crate::devices::host::create_host_device(alloc_reg)),
        );

        #[cfg(feature = "cuda")]
        registry.register_factory(
            "CUDA",
            Arc::new(|spec, alloc_reg| crate::devices::cuda::create_cuda_device(spec, alloc_reg)),
        );

        #[cfg(feature = "opencl")]
        registry.register_factory(
            "OPENCL",
            Arc::new(|spec, alloc_reg| crate::devices::opencl::create_opencl_device(spec, alloc_reg)),
        );

        registry
    }

    /// Register a device factory for a device type.
    ///
    /// The device type string is case-insensitive (converted to uppercase).
    pub fn register_factory(&self, device_type: &str, factory: DeviceFactory) {
        self.factories.write().insert(device_type.to_uppercase(), factory);
    }

    /// Get or create a Device for the given specification.
    pub fn device(&self, spec: &DeviceSpec, alloc_registry: &DeviceRegistry) -> Result<Arc<Device>> {
        if let Some(dev) = self.devices.read().get(spec) {
            return Ok(Arc::clone(dev));
        }

        let mut devices = self.devices.write();

        // Another thread may have created it while we waited.
        if let Some(dev) = devices.get(spec) {
            return Ok(Arc::clone(dev));
        }

        let device_type = spec.base_key();
        let factory = self
            .factories
            .read()
            .get(device_type)
            .cloned()
            .ok_or_else(|| UnsupportedDeviceSnafu { device: spec.canonicalize() }.build())?;

        let device = Arc::new(factory(spec, alloc_registry).context(DeviceSnafu)?);
        tracing::debug!(device = %spec, "created device");
        devices.insert(spec.clone(), Arc::clone(&device));
        Ok(device)
    }

    /// Parse a device string (`"HOST"`, `"CUDA:1"`) and get or create it.
    pub fn device_by_name(&self, name: &str, alloc_registry: &DeviceRegistry) -> Result<Arc<Device>> {
        let spec = DeviceSpec::parse(name).context(DeviceSnafu)?;
        self.device(&spec, alloc_registry)
    }

    /// Device types with a registered factory, sorted.
    pub fn device_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.factories.read().keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for DeviceFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global device factory registry, built-in factories registered on first access.
pub static DEVICE_FACTORIES: Lazy<DeviceFactoryRegistry> = Lazy::new(DeviceFactoryRegistry::new);

/// Device named by `REDUCTOR_DEVICE`, or the host device when unset.
pub fn default_device() -> Result<Arc<Device>> {
    let spec = DeviceSpec::from_env().context(DeviceSnafu)?;
    DEVICE_FACTORIES.device(&spec, reductor_device::registry())
}
