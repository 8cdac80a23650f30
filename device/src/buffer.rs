use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use reductor_dtype::ext::{from_bytes, to_bytes};
use reductor_dtype::{DeviceSpec, HasDType, ScalarDType};
#[cfg(feature = "cuda")]
use snafu::ResultExt;
use snafu::ensure;

use crate::allocator::{Allocator, BufferOptions, RawBuffer};
#[cfg(feature = "opencl")]
use crate::cl::ocl_error;
#[cfg(feature = "cuda")]
use crate::error::CudaSnafu;
#[cfg(any(feature = "cuda", feature = "opencl"))]
use crate::error::NotHostAccessibleSnafu;
use crate::error::{DTypeMismatchSnafu, Result, RuntimeSnafu, SizeMismatchSnafu};

/// Allocation shared by every clone of a [`Buffer`]; returned to its allocator on drop.
#[derive(Debug)]
struct BufferData {
    raw: Option<RawBuffer>,
    allocator: Arc<dyn Allocator>,
}

impl BufferData {
    fn raw(&self) -> Result<&RawBuffer> {
        self.raw.as_ref().ok_or_else(|| RuntimeSnafu { message: "buffer already released" }.build())
    }
}

impl Drop for BufferData {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.allocator.free(raw);
        }
    }
}

/// Typed device allocation of `len` elements.
///
/// Clones share the allocation. This type is `!Send + !Sync`: buffers are
/// bound, launched and read back on the thread that owns the queue.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Rc<BufferData>,
    dtype: ScalarDType,
    len: usize,
    _not_send_sync: PhantomData<Rc<()>>,
}

impl Buffer {
    /// Allocate a zero-initialised buffer.
    pub fn allocate(allocator: Arc<dyn Allocator>, dtype: ScalarDType, len: usize) -> Result<Self> {
        Self::allocate_with(allocator, dtype, len, &BufferOptions::zeroed())
    }

    pub fn allocate_with(
        allocator: Arc<dyn Allocator>,
        dtype: ScalarDType,
        len: usize,
        options: &BufferOptions,
    ) -> Result<Self> {
        let raw = allocator.alloc(dtype.bytes() * len, options)?;
        Ok(Self {
            data: Rc::new(BufferData { raw: Some(raw), allocator }),
            dtype,
            len,
            _not_send_sync: PhantomData,
        })
    }

    /// Allocate and upload a host slice.
    pub fn from_slice<T: HasDType>(allocator: Arc<dyn Allocator>, values: &[T]) -> Result<Self> {
        let buffer = Self::allocate_with(allocator, T::DTYPE, values.len(), &BufferOptions::default())?;
        buffer.copyin(&to_bytes(values))?;
        Ok(buffer)
    }

    /// Download the contents as host values.
    pub fn to_vec<T: HasDType>(&self) -> Result<Vec<T>> {
        ensure!(T::DTYPE == self.dtype, DTypeMismatchSnafu { expected: T::DTYPE, actual: self.dtype });
        let mut bytes = vec![0u8; self.size()];
        self.copyout(&mut bytes)?;
        Ok(from_bytes(&bytes))
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.len * self.dtype.bytes()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dtype(&self) -> ScalarDType {
        self.dtype
    }

    pub fn device(&self) -> DeviceSpec {
        self.data.allocator.device()
    }

    pub fn allocator(&self) -> &dyn Allocator {
        &*self.data.allocator
    }

    /// True when both handles refer to the same allocation.
    pub fn same_allocation(&self, other: &Buffer) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Copy data from host memory into this buffer.
    pub fn copyin(&self, src: &[u8]) -> Result<()> {
        let expected = self.size();
        let actual = src.len();
        ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        match self.data.raw()? {
            RawBuffer::Host { data } => {
                let mut data = data.try_borrow_mut().map_err(|_| busy())?;
                data[..expected].copy_from_slice(src);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, stream } => {
                let mut data = data.try_borrow_mut().map_err(|_| busy())?;
                let mut view = data.slice_mut(0..expected);
                stream.memcpy_htod(src, &mut view).context(CudaSnafu)
            }
            #[cfg(feature = "opencl")]
            RawBuffer::OpenCl { data } => {
                if expected > 0 {
                    data.write(src).enq().map_err(ocl_error)?;
                }
                Ok(())
            }
        }
    }

    /// Copy data from this buffer to host memory.
    pub fn copyout(&self, dst: &mut [u8]) -> Result<()> {
        let expected = self.size();
        let actual = dst.len();
        ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        match self.data.raw()? {
            RawBuffer::Host { data } => {
                let data = data.try_borrow().map_err(|_| busy())?;
                dst.copy_from_slice(&data[..expected]);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, stream } => {
                stream.synchronize().context(CudaSnafu)?;
                let data = data.try_borrow().map_err(|_| busy())?;
                let view = data.slice(0..expected);
                stream.memcpy_dtoh(&view, dst).context(CudaSnafu)
            }
            // Blocking read on the device queue, so earlier launches have finished.
            #[cfg(feature = "opencl")]
            RawBuffer::OpenCl { data } => {
                if expected > 0 {
                    data.read(dst).enq().map_err(ocl_error)?;
                }
                Ok(())
            }
        }
    }

    /// Run `f` over the host bytes of this buffer.
    pub fn with_host<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        match self.data.raw()? {
            RawBuffer::Host { data } => {
                let data = data.try_borrow().map_err(|_| busy())?;
                Ok(f(&data[..self.size()]))
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { .. } => NotHostAccessibleSnafu { device: self.device() }.fail(),
            #[cfg(feature = "opencl")]
            RawBuffer::OpenCl { .. } => NotHostAccessibleSnafu { device: self.device() }.fail(),
        }
    }

    /// Run `f` over the mutable host bytes of this buffer.
    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        match self.data.raw()? {
            RawBuffer::Host { data } => {
                let mut data = data.try_borrow_mut().map_err(|_| busy())?;
                let size = self.size();
                Ok(f(&mut data[..size]))
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { .. } => NotHostAccessibleSnafu { device: self.device() }.fail(),
            #[cfg(feature = "opencl")]
            RawBuffer::OpenCl { .. } => NotHostAccessibleSnafu { device: self.device() }.fail(),
        }
    }

    /// Device address for kernel launches.
    #[cfg(feature = "cuda")]
    pub fn device_ptr(&self) -> Result<u64> {
        use cudarc::driver::DevicePtr;

        match self.data.raw()? {
            RawBuffer::Cuda { data, stream } => {
                let data = data.try_borrow().map_err(|_| busy())?;
                let (ptr, _sync) = data.device_ptr(stream);
                Ok(ptr)
            }
            RawBuffer::Host { .. } => RuntimeSnafu { message: "host buffer has no device address" }.fail(),
            #[cfg(feature = "opencl")]
            RawBuffer::OpenCl { .. } => RuntimeSnafu { message: "OpenCL buffer has no CUDA address" }.fail(),
        }
    }

    /// Memory object for OpenCL kernel arguments.
    #[cfg(feature = "opencl")]
    pub fn ocl_buffer(&self) -> Result<ocl::Buffer<u8>> {
        match self.data.raw()? {
            RawBuffer::OpenCl { data } => Ok(data.clone()),
            _ => RuntimeSnafu { message: format!("buffer on {} is not an OpenCL memory object", self.device()) }.fail(),
        }
    }
}

fn busy() -> crate::Error {
    RuntimeSnafu { message: "buffer is already borrowed" }.build()
}
