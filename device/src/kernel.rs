//! Kernel entry points and argument binding.

use std::sync::Arc;

use reductor_dtype::ScalarDType;
use reductor_ir::ConstValue;
use smallvec::SmallVec;

use crate::buffer::Buffer;
use crate::error::{ArgumentMismatchSnafu, Error, Result};
use crate::queue::ExecParams;

/// Value bound to one kernel parameter.
#[derive(Debug, Clone)]
pub enum KernelArg {
    /// `unsigned int` parameter, used for the input extent.
    Size(u32),
    /// Global pointer parameter.
    Buffer(Buffer),
    /// By-value scalar parameter, already cast to its dtype.
    Scalar(ConstValue, ScalarDType),
}

impl KernelArg {
    /// Scalar argument with `value` cast to `dtype`.
    pub fn scalar(value: ConstValue, dtype: ScalarDType) -> Self {
        Self::Scalar(value.cast(dtype), dtype)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Size(_) => "size",
            Self::Buffer(_) => "buffer",
            Self::Scalar(..) => "scalar",
        }
    }

    pub fn as_size(&self) -> Option<u32> {
        match self {
            Self::Size(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Self::Buffer(b) => Some(b),
            _ => None,
        }
    }
}

impl From<Buffer> for KernelArg {
    fn from(buffer: Buffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<&Buffer> for KernelArg {
    fn from(buffer: &Buffer) -> Self {
        Self::Buffer(buffer.clone())
    }
}

/// One launchable function of a compiled program.
pub trait KernelEntry: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Parameter count of the function signature.
    fn arity(&self) -> usize;

    /// Submit one launch. Backends may complete it asynchronously; callers
    /// order launches through a [`CommandQueue`](crate::queue::CommandQueue).
    fn launch(&self, args: &[KernelArg], params: &ExecParams) -> Result<()>;
}

/// A kernel entry with its argument slots.
#[derive(Debug, Clone)]
pub struct Kernel {
    entry: Arc<dyn KernelEntry>,
    args: SmallVec<[Option<KernelArg>; 8]>,
}

impl Kernel {
    pub fn new(entry: Arc<dyn KernelEntry>) -> Self {
        let args = std::iter::repeat_with(|| None).take(entry.arity()).collect();
        Self { entry, args }
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn entry(&self) -> &Arc<dyn KernelEntry> {
        &self.entry
    }

    pub fn set_arg(&mut self, index: usize, arg: impl Into<KernelArg>) -> Result<&mut Self> {
        let arity = self.args.len();
        let slot = self.args.get_mut(index).ok_or_else(|| {
            ArgumentMismatchSnafu { index, reason: format!("'{}' takes {arity} arguments", self.entry.name()) }.build()
        })?;
        *slot = Some(arg.into());
        Ok(self)
    }

    pub fn set_size_arg(&mut self, index: usize, value: u32) -> Result<&mut Self> {
        self.set_arg(index, KernelArg::Size(value))
    }

    /// All slots, in order. Fails on the first unset one.
    pub fn bound_args(&self) -> Result<Vec<KernelArg>> {
        self.args
            .iter()
            .enumerate()
            .map(|(index, arg)| arg.clone().ok_or(Error::MissingArgument { index }))
            .collect()
    }

    /// Launch directly, bypassing any queue.
    pub fn launch(&self, params: &ExecParams) -> Result<()> {
        let args = self.bound_args()?;
        self.entry.launch(&args, params)
    }
}
