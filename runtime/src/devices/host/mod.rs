//! Host reference device.
//!
//! Instead of compiling the generated text, the host device interprets the
//! typed plan carried by [`ProgramSpec`] with a work-group emulator. Launch
//! order, argument binding, geometry and scratch traffic follow the same
//! protocol a GPU backend sees, so the orchestration path can be exercised
//! without hardware.

pub mod arith;
pub mod emulator;

use std::sync::Arc;

use reductor_codegen::reduce_1d::{KernelBody, ReducePlan};
use reductor_codegen::UnsupportedDTypeSnafu;
use reductor_device::error::{CodegenSnafu, KernelNotFoundSnafu};
use reductor_device::registry::DeviceRegistry;
use reductor_device::{
    CommandQueue, Compiler, Device, ExecParams, Kernel, KernelArg, KernelEntry, Launch, Program, ProgramSpec,
    QueueFactory, Result,
};
use reductor_dtype::{DeviceSpec, ScalarDType};
use snafu::IntoError;

/// One kernel of a host program.
#[derive(Debug)]
pub struct HostEntry {
    plan: Arc<ReducePlan>,
    body: KernelBody,
}

impl KernelEntry for HostEntry {
    fn name(&self) -> &str {
        &self.body.name
    }

    fn arity(&self) -> usize {
        2 + self.plan.arguments.len()
    }

    fn launch(&self, args: &[KernelArg], params: &ExecParams) -> Result<()> {
        tracing::trace!(
            kernel.name = %self.body.name,
            global = params.global_size[0],
            local = params.local_size[0],
            "host launch"
        );
        emulator::execute(&self.plan, &self.body, args, params)
    }
}

#[derive(Debug)]
pub struct HostProgram {
    name: String,
    device: DeviceSpec,
    entries: Vec<Arc<HostEntry>>,
}

impl Program for HostProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &DeviceSpec {
        &self.device
    }

    fn entry(&self, name: &str) -> Result<Arc<dyn KernelEntry>> {
        self.entries
            .iter()
            .find(|entry| entry.body.name == name)
            .map(|entry| Arc::clone(entry) as Arc<dyn KernelEntry>)
            .ok_or_else(|| KernelNotFoundSnafu { name }.build())
    }
}

/// Builds [`HostProgram`]s from the plan of a [`ProgramSpec`].
#[derive(Debug, Default)]
pub struct HostCompiler;

impl Compiler for HostCompiler {
    fn compile(&self, spec: &ProgramSpec) -> Result<Arc<dyn Program>> {
        let plan = &spec.plan;
        if plan.dtype == ScalarDType::Float16 {
            let source = UnsupportedDTypeSnafu { dtype: plan.dtype, device: DeviceSpec::Host }.build();
            return Err(CodegenSnafu.into_error(source));
        }

        let entries = spec
            .entries
            .iter()
            .map(|name| {
                let body = [&plan.partial, &plan.final_]
                    .into_iter()
                    .find(|body| &body.name == name)
                    .ok_or_else(|| KernelNotFoundSnafu { name: name.as_str() }.build())?;
                Ok(Arc::new(HostEntry { plan: plan.clone(), body: body.clone() }))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            kernel.name = %spec.name,
            device = %spec.device,
            entries = entries.len(),
            "compiled host program"
        );
        Ok(Arc::new(HostProgram { name: spec.name.clone(), device: DeviceSpec::Host, entries }))
    }

    fn cache_key(&self) -> Option<&str> {
        Some("host-emulator")
    }
}

/// In-order queue that records launches and runs them at `synchronize`.
#[derive(Debug)]
pub struct HostQueue {
    pending: Vec<Launch>,
    device: DeviceSpec,
}

impl HostQueue {
    pub fn new() -> Self {
        Self { pending: Vec::new(), device: DeviceSpec::Host }
    }
}

impl Default for HostQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue for HostQueue {
    fn device(&self) -> &DeviceSpec {
        &self.device
    }

    fn enqueue(&mut self, kernel: &Kernel, params: &ExecParams) -> Result<()> {
        self.pending.push(Launch::capture(kernel, params)?);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        // A failed launch discards everything submitted after it.
        for launch in std::mem::take(&mut self.pending) {
            launch.run()?;
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Create the host device with the registry's host allocator.
pub fn create_host_device(registry: &DeviceRegistry) -> Result<Device> {
    let spec = DeviceSpec::Host;
    let allocator = registry.get(&spec)?;
    let queue_factory: QueueFactory = Arc::new(|| Ok(Box::new(HostQueue::new()) as Box<dyn CommandQueue>));
    Ok(Device::new(spec, allocator, Arc::new(HostCompiler), queue_factory))
}
