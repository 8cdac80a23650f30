use std::cell::RefCell;
use std::collections::HashMap;
#[cfg(any(feature = "cuda", feature = "opencl"))]
use std::sync::Arc;

#[cfg(feature = "cuda")]
use cudarc::driver::{CudaContext, CudaSlice, CudaStream};
use parking_lot::Mutex;
use reductor_dtype::DeviceSpec;
#[cfg(feature = "cuda")]
use snafu::ResultExt;

#[cfg(feature = "cuda")]
use crate::error::CudaSnafu;
use crate::error::Result;
#[cfg(feature = "opencl")]
use crate::cl::{OpenClContext, ocl_error};

/// Opaque handle to device memory.
///
/// Uses `RefCell` for interior mutability with runtime borrow checking.
/// Safe for single-threaded use (Buffer is !Send + !Sync).
#[derive(Debug)]
pub enum RawBuffer {
    Host {
        data: RefCell<Box<[u8]>>,
    },
    #[cfg(feature = "cuda")]
    Cuda {
        data: RefCell<CudaSlice<u8>>,
        stream: Arc<CudaStream>,
    },
    /// Bound to the device's in-order queue, which carries its transfers.
    #[cfg(feature = "opencl")]
    OpenCl {
        data: ocl::Buffer<u8>,
    },
}

impl RawBuffer {
    /// Get the size of the buffer in bytes.
    pub fn size(&self) -> usize {
        match self {
            RawBuffer::Host { data } => data.borrow().len(),
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, .. } => data.borrow().len(),
            #[cfg(feature = "opencl")]
            RawBuffer::OpenCl { data } => data.len(),
        }
    }

    /// Overwrite the whole allocation with zeros.
    pub fn zero(&self) -> Result<()> {
        match self {
            RawBuffer::Host { data } => {
                data.borrow_mut().fill(0);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, stream } => stream.memset_zeros(&mut *data.borrow_mut()).context(CudaSnafu),
            #[cfg(feature = "opencl")]
            RawBuffer::OpenCl { data } => {
                let zeros = vec![0u8; data.len()];
                data.write(&zeros[..]).enq().map_err(ocl_error)
            }
        }
    }
}

/// Options for buffer allocation.
#[derive(Debug, Clone, Default)]
pub struct BufferOptions {
    /// Whether to zero-initialize the buffer.
    pub zero_init: bool,
}

impl BufferOptions {
    pub fn zeroed() -> Self {
        Self { zero_init: true }
    }
}

pub trait Allocator: Send + Sync + std::fmt::Debug {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer>;
    fn free(&self, _buffer: RawBuffer) {}
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &str;
    /// Device the memory lives on.
    fn device(&self) -> DeviceSpec;
}

/// Host allocator using system memory. Always zero-initialises.
#[derive(Debug, Clone)]
pub struct HostAllocator;

impl Allocator for HostAllocator {
    fn alloc(&self, size: usize, _options: &BufferOptions) -> Result<RawBuffer> {
        let data = vec![0u8; size].into_boxed_slice();
        Ok(RawBuffer::Host { data: RefCell::new(data) })
    }

    fn name(&self) -> &str {
        "HOST"
    }

    fn device(&self) -> DeviceSpec {
        DeviceSpec::Host
    }
}

/// CUDA allocator using GPU memory.
#[cfg(feature = "cuda")]
#[derive(Debug, Clone)]
pub struct CudaAllocator {
    context: Arc<CudaContext>,
    device_id: usize,
}

#[cfg(feature = "cuda")]
impl CudaAllocator {
    pub fn new(device_id: usize) -> Result<Self> {
        let context = CudaContext::new(device_id).context(CudaSnafu)?;
        Ok(Self { context, device_id })
    }

    pub fn device_id(&self) -> usize {
        self.device_id
    }

    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }
}

#[cfg(feature = "cuda")]
impl Allocator for CudaAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        let stream = self.context.default_stream();
        // Zero-length device allocations are rejected by the driver.
        let size = size.max(1);
        let data = if options.zero_init { stream.alloc_zeros::<u8>(size) } else { unsafe { stream.alloc::<u8>(size) } }
            .context(CudaSnafu)?;

        Ok(RawBuffer::Cuda { data: RefCell::new(data), stream })
    }

    fn synchronize(&self) -> Result<()> {
        self.context.default_stream().synchronize().context(CudaSnafu)
    }

    fn name(&self) -> &str {
        "CUDA"
    }

    fn device(&self) -> DeviceSpec {
        DeviceSpec::Cuda { device_id: self.device_id }
    }
}

/// OpenCL allocator drawing from the device's shared context.
#[cfg(feature = "opencl")]
#[derive(Debug, Clone)]
pub struct OpenClAllocator {
    ctx: Arc<OpenClContext>,
}

#[cfg(feature = "opencl")]
impl OpenClAllocator {
    pub fn new(device_id: usize) -> Result<Self> {
        Ok(Self { ctx: crate::cl::context(device_id)? })
    }

    pub fn context(&self) -> &Arc<OpenClContext> {
        &self.ctx
    }
}

#[cfg(feature = "opencl")]
impl Allocator for OpenClAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        // Zero-sized memory objects are invalid in OpenCL.
        let mut builder = ocl::Buffer::<u8>::builder().queue(self.ctx.queue.clone()).len(size.max(1));
        if options.zero_init {
            builder = builder.fill_val(0u8);
        }
        let data = builder.build().map_err(ocl_error)?;
        Ok(RawBuffer::OpenCl { data })
    }

    fn synchronize(&self) -> Result<()> {
        self.ctx.queue.finish().map_err(ocl_error)
    }

    fn name(&self) -> &str {
        "OPENCL"
    }

    fn device(&self) -> DeviceSpec {
        self.ctx.spec()
    }
}

/// LRU allocator that caches freed buffers for reuse.
///
/// Freed buffers are keyed by size only; a cached buffer handed out for a
/// zero-initialised request is cleared first.
#[derive(Debug)]
pub struct LruAllocator {
    inner: Box<dyn Allocator>,
    cache: Mutex<HashMap<usize, Vec<RawBuffer>>>,
    max_buffers_per_size: usize,
    name: String,
}

impl LruAllocator {
    pub fn new(inner: Box<dyn Allocator>) -> Self {
        Self::with_capacity(inner, 32)
    }

    pub fn with_capacity(inner: Box<dyn Allocator>, max_buffers_per_size: usize) -> Self {
        let name = inner.name().to_string();
        Self { inner, cache: Mutex::new(HashMap::new()), max_buffers_per_size, name }
    }

    /// Number of buffers currently held for reuse.
    pub fn cached(&self) -> usize {
        self.cache.lock().values().map(Vec::len).sum()
    }

    fn take_cached(&self, size: usize) -> Option<RawBuffer> {
        let mut cache = self.cache.lock();
        let buffers = cache.get_mut(&size)?;
        let buffer = buffers.pop();
        if buffers.is_empty() {
            cache.remove(&size);
        }
        buffer
    }
}

impl Allocator for LruAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        if let Some(buffer) = self.take_cached(size) {
            if options.zero_init {
                buffer.zero()?;
            }
            tracing::trace!(allocator = %self.name, size, "reused cached buffer");
            return Ok(buffer);
        }

        match self.inner.alloc(size, options) {
            Ok(buffer) => Ok(buffer),
            Err(e) => {
                // On allocation failure, clear cache and retry
                self.cache.lock().clear();
                self.inner.alloc(size, options).map_err(|_| e)
            }
        }
    }

    fn free(&self, buffer: RawBuffer) {
        let mut cache = self.cache.lock();
        let buffers = cache.entry(buffer.size()).or_default();
        if buffers.len() < self.max_buffers_per_size {
            buffers.push(buffer);
        }
    }

    fn synchronize(&self) -> Result<()> {
        self.inner.synchronize()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> DeviceSpec {
        self.inner.device()
    }
}
