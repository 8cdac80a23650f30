//! CUDA device: NVRTC compilation, module loading and launches on the
//! context's default stream.

use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaFunction, CudaModule, LaunchConfig, PushKernelArg};
use cudarc::nvrtc::{CompileOptions, compile_ptx_with_opts};
use reductor_device::error::{ArgumentMismatchSnafu, CompilationSnafu, CudaSnafu, KernelNotFoundSnafu};
use reductor_device::registry::DeviceRegistry;
use reductor_device::{
    CommandQueue, Compiler, Device, ExecParams, Kernel, KernelArg, KernelEntry, Program, ProgramSpec, QueueFactory,
    Result,
};
use reductor_dtype::DeviceSpec;
use snafu::{ResultExt, ensure};

use super::scalar::ScalarParam;

/// Kernel parameter ready to be pushed onto a launch builder.
#[derive(Debug, Clone, Copy)]
enum Param {
    Size(u32),
    Pointer(u64),
    Scalar(ScalarParam),
}

#[derive(Debug)]
pub struct CudaEntry {
    name: String,
    arity: usize,
    context: Arc<CudaContext>,
    function: CudaFunction,
}

// SAFETY: a CudaFunction is a handle into a module kept alive by the
// owning program; launches go through the context's stream.
unsafe impl Send for CudaEntry {}
unsafe impl Sync for CudaEntry {}

impl KernelEntry for CudaEntry {
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
                    KernelArg::Buffer(buffer) => Param::Pointer(buffer.device_ptr()?),
                    KernelArg::Scalar(value, dtype) => Param::Scalar(ScalarParam::new(index, *value, *dtype)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let groups = params.groups() as u32;
        let config = LaunchConfig {
            grid_dim: (groups, 1, 1),
            block_dim: (params.local_size[0] as u32, 1, 1),
            shared_mem_bytes: 0,
        };

        let stream = self.context.default_stream();
        let mut builder = stream.launch_builder(&self.function);
        for value in &values {
            match value {
                Param::Size(n) => builder.arg(n),
                Param::Pointer(ptr) => builder.arg(ptr),
                Param::Scalar(ScalarParam::I8(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::U8(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::I16(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::U16(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::I32(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::U32(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::I64(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::U64(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::F32(v)) => builder.arg(v),
                Param::Scalar(ScalarParam::F64(v)) => builder.arg(v),
            };
        }

        tracing::trace!(kernel.name = %self.name, grid = groups, block = params.local_size[0], "cuda launch");
        // SAFETY: argument count and kinds match the generated signature
        // (checked by Kernel binding and the arity above).
        unsafe { builder.launch(config) }.context(CudaSnafu)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct CudaProgram {
    name: String,
    device: DeviceSpec,
    _module: Arc<CudaModule>,
    entries: Vec<Arc<CudaEntry>>,
}

impl Program for CudaProgram {
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

const DEFAULT_TOOLKIT_ROOT: &str = "/usr/local/cuda";

fn toolkit_root() -> Option<String> {
    std::env::var("CUDA_PATH").or_else(|_| std::env::var("CUDA_HOME")).ok().filter(|root| !root.is_empty())
}

/// NVRTC header search path under the toolkit `root`, or the default install.
pub(crate) fn include_paths(root: Option<String>) -> Vec<String> {
    let root = root.unwrap_or_else(|| DEFAULT_TOOLKIT_ROOT.to_string());
    vec![format!("{}/include", root.trim_end_matches('/'))]
}

/// NVRTC compiler bound to one device context.
#[derive(Debug)]
pub struct CudaCompiler {
    context: Arc<CudaContext>,
    device_id: usize,
}

impl CudaCompiler {
    pub fn new(context: Arc<CudaContext>, device_id: usize) -> Self {
        Self { context, device_id }
    }
}

impl Compiler for CudaCompiler {
    #[tracing::instrument(skip_all, fields(kernel.name = %spec.name, device = %spec.device))]
    fn compile(&self, spec: &ProgramSpec) -> Result<Arc<dyn Program>> {
        let options = CompileOptions {
            include_paths: include_paths(toolkit_root()),
            use_fast_math: Some(false),
            ..Default::default()
        };
        let ptx = compile_ptx_with_opts(&spec.src, options)
            .map_err(|e| CompilationSnafu { name: spec.name.as_str(), reason: e.to_string() }.build())?;
        let module = self.context.load_module(ptx).context(CudaSnafu)?;

        let arity = 2 + spec.plan.arguments.len();
        let entries = spec
            .entries
            .iter()
            .map(|name| {
                let function = module
                    .load_function(name)
                    .map_err(|_| KernelNotFoundSnafu { name: name.as_str() }.build())?;
                Ok(Arc::new(CudaEntry { name: name.clone(), arity, context: self.context.clone(), function }))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(entries = entries.len(), "compiled cuda program");
        Ok(Arc::new(CudaProgram {
            name: spec.name.clone(),
            device: DeviceSpec::Cuda { device_id: self.device_id },
            _module: module,
            entries,
        }))
    }

    fn cache_key(&self) -> Option<&str> {
        Some("nvrtc")
    }
}

/// Queue over the default stream; launches are issued at enqueue time.
#[derive(Debug)]
pub struct CudaQueue {
    context: Arc<CudaContext>,
    device: DeviceSpec,
    pending: usize,
}

impl CommandQueue for CudaQueue {
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
        self.context.default_stream().synchronize().context(CudaSnafu)
    }

    fn pending(&self) -> usize {
        self.pending
    }
}

pub fn create_cuda_device(spec: &DeviceSpec, registry: &DeviceRegistry) -> Result<Device> {
    let DeviceSpec::Cuda { device_id } = *spec else {
        return reductor_device::error::UnsupportedDeviceSnafu { device: spec.clone() }.fail();
    };
    let allocator = registry.get(spec)?;
    let context = CudaContext::new(device_id).context(CudaSnafu)?;

    let queue_context = context.clone();
    let queue_factory: QueueFactory = Arc::new(move || {
        Ok(Box::new(CudaQueue { context: queue_context.clone(), device: DeviceSpec::Cuda { device_id }, pending: 0 })
            as Box<dyn CommandQueue>)
    });
    Ok(Device::new(spec.clone(), allocator, Arc::new(CudaCompiler::new(context, device_id)), queue_factory))
}
