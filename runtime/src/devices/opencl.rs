//! OpenCL device: programs built for the shared context and launches on its
//! single in-order queue.

use std::sync::Arc;

use ocl::{Buffer as OclBuffer, Kernel as OclKernel, Program as OclProgram};
use reductor_device::error::{ArgumentMismatchSnafu, CompilationSnafu, KernelNotFoundSnafu, UnsupportedDeviceSnafu};
use reductor_device::cl::{OpenClContext, ocl_error};
use reductor_device::registry::DeviceRegistry;
use reductor_device::{
    CommandQueue, Compiler, Device, ExecParams, Kernel, KernelArg, KernelEntry, Program, ProgramSpec, QueueFactory,
    Result,
};
use reductor_dtype::DeviceSpec;
use snafu::ensure;

use super::scalar::ScalarParam;

#[derive(Debug, Clone)]
enum Param {
    Size(u32),
    Memory(OclBuffer<u8>),
    Scalar(ScalarParam),
}

#[derive(Debug)]
pub struct OpenClEntry {
    name: String,
    arity: usize,
    program: OclProgram,
    ctx: Arc<OpenClContext>,
}

impl KernelEntry for OpenClEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn launch(&self, args: &[KernelArg], params: &ExecParams) -> Result<()> {
        ensure!(
            args.len() == self.arity,
            ArgumentMismatchSnafu {
                index: args.len(),
                reason: format!("expected {} arguments, got {}", self.arity, args.len()),
            }
        );

        let values = args
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                Ok(match arg {
                    KernelArg::Size(n) => Param::Size(*n),
                    KernelArg::Buffer(buffer) => Param::Memory(buffer.ocl_buffer()?),
                    KernelArg::Scalar(value, dtype) => Param::Scalar(ScalarParam::new(index, *value, *dtype)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = OclKernel::builder();
        builder
            .program(&self.program)
            .name(&self.name)
            .queue(self.ctx.queue.clone())
            .global_work_size(params.global_size[0])
            .local_work_size(params.local_size[0]);
        // SAFETY: buffers are untyped byte allocations; the element type of
        // each pointer parameter is fixed by the generated signature.
        unsafe {
            builder.disable_arg_type_check();
        }
        for value in &values {
            match value {
                Param::Size(n) => builder.arg(*n),
                Param::Memory(buffer) => builder.arg(buffer),
                Param::Scalar(ScalarParam::I8(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::U8(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::I16(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::U16(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::I32(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::U32(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::I64(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::U64(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::F32(v)) => builder.arg(*v),
                Param::Scalar(ScalarParam::F64(v)) => builder.arg(*v),
            };
        }
        let kernel = builder.build().map_err(ocl_error)?;

        tracing::trace!(
            kernel.name = %self.name,
            global = params.global_size[0],
            local = params.local_size[0],
            "opencl launch"
        );
        // SAFETY: argument count and kinds match the generated signature
        // (checked by Kernel binding and the arity above).
        unsafe { kernel.enq() }.map_err(ocl_error)
    }
}

#[derive(Debug)]
pub struct OpenClProgram {
    name: String,
    device: DeviceSpec,
    entries: Vec<Arc<OpenClEntry>>,
}

impl Program for OpenClProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &DeviceSpec {
        &self.device
    }

    fn entry(&self, name: &str) -> Result<Arc<dyn KernelEntry>> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| Arc::clone(entry) as Arc<dyn KernelEntry>)
            .ok_or_else(|| KernelNotFoundSnafu { name }.build())
    }
}

/// OpenCL C compiler bound to one device context.
#[derive(Debug)]
pub struct OpenClCompiler {
    ctx: Arc<OpenClContext>,
}

impl OpenClCompiler {
    pub fn new(ctx: Arc<OpenClContext>) -> Self {
        Self { ctx }
    }
}

impl Compiler for OpenClCompiler {
    #[tracing::instrument(skip_all, fields(kernel.name = %spec.name, device = %spec.device))]
    fn compile(&self, spec: &ProgramSpec) -> Result<Arc<dyn Program>> {
        let program = OclProgram::builder()
            .src(spec.src.as_str())
            .devices(self.ctx.device)
            .build(&self.ctx.context)
            .map_err(|e| CompilationSnafu { name: spec.name.as_str(), reason: e.to_string() }.build())?;

        let arity = 2 + spec.plan.arguments.len();
        let entries = spec
            .entries
            .iter()
            .map(|name| {
                // Kernel objects are rebuilt per launch; creating one here fails
                // early on a missing entry.
                ocl::core::create_kernel(program.as_core(), name)
                    .map_err(|_| KernelNotFoundSnafu { name: name.as_str() }.build())?;
                Ok(Arc::new(OpenClEntry { name: name.clone(), arity, program: program.clone(), ctx: self.ctx.clone() }))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(entries = entries.len(), "compiled opencl program");
        Ok(Arc::new(OpenClProgram { name: spec.name.clone(), device: self.ctx.spec(), entries }))
    }

    fn cache_key(&self) -> Option<&str> {
        Some("opencl")
    }
}

/// Queue over the shared in-order queue; launches are issued at enqueue time.
#[derive(Debug)]
pub struct OpenClQueue {
    ctx: Arc<OpenClContext>,
    device: DeviceSpec,
    pending: usize,
}

impl CommandQueue for OpenClQueue {
    fn device(&self) -> &DeviceSpec {
        &self.device
    }

    fn enqueue(&mut self, kernel: &Kernel, params: &ExecParams) -> Result<()> {
        kernel.launch(params)?;
        self.pending += 1;
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        self.pending = 0;
        self.ctx.queue.finish().map_err(ocl_error)
    }

    fn pending(&self) -> usize {
        self.pending
    }
}

pub fn create_opencl_device(spec: &DeviceSpec, registry: &DeviceRegistry) -> Result<Device> {
    let DeviceSpec::OpenCl { device_id } = *spec else {
        return UnsupportedDeviceSnafu { device: spec.clone() }.fail();
    };
    let allocator = registry.get(spec)?;
    let ctx = reductor_device::cl::context(device_id)?;

    let queue_ctx = ctx.clone();
    let queue_factory: QueueFactory = Arc::new(move || {
        Ok(Box::new(OpenClQueue { ctx: queue_ctx.clone(), device: DeviceSpec::OpenCl { device_id }, pending: 0 })
            as Box<dyn CommandQueue>)
    });
    Ok(Device::new(spec.clone(), allocator, Arc::new(OpenClCompiler::new(ctx)), queue_factory))
}
