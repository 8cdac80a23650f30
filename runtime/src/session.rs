//! Generate, compile and run reductions on one device.

use std::sync::Arc;

use bon::bon;
use reductor_codegen::{Reduce1d, Template, TuningParams};
use reductor_device::{Device, ProgramSpec};
use reductor_ir::ExpressionTree;
use snafu::ResultExt;

use crate::error::{CodegenSnafu, CompilationSnafu, DeviceSnafu, Result};
use crate::kernel_cache;
use crate::reduce_1d::{self, Bindings, Reduce1dKernels};

/// A device plus tuning parameters.
///
/// Compiled programs go through the global [`kernel_cache`], so sessions
/// are cheap and several of them may target the same device.
#[derive(Debug, Clone)]
pub struct Reduce1dSession {
    device: Arc<Device>,
    template: Reduce1d,
    suffix: String,
}

#[bon]
impl Reduce1dSession {
    /// Fails if the tuning parameters are invalid.
    #[builder]
    pub fn builder(
        device: Arc<Device>,
        #[builder(default)] params: TuningParams,
        #[builder(into, default)] suffix: String,
    ) -> Result<Self> {
        let template = Reduce1d::new(params).context(CodegenSnafu)?;
        Ok(Self { device, template, suffix })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn params(&self) -> &TuningParams {
        self.template.params()
    }

    /// Generate source for `tree` and get both entry points, compiling on a cache miss.
    pub fn prepare(&self, tree: &Arc<ExpressionTree>) -> Result<Reduce1dKernels> {
        let spec = &self.device.spec;
        let source = self.template.generate(&self.suffix, tree, spec).context(CodegenSnafu)?;
        let program = ProgramSpec::from_generated(format!("reduce_1d{}", self.suffix), &source, spec.clone());

        let hash = kernel_cache::source_hash(&program.src, self.device.compiler.cache_key());
        let cached = kernel_cache::get_or_compile(hash, &spec.canonicalize(), || {
            self.device.compiler.compile(&program).context(CompilationSnafu { name: program.name.clone() })
        })?;

        Ok(Reduce1dKernels {
            partial: cached.program.entry(&source.partial.name).context(DeviceSnafu)?,
            final_: cached.program.entry(&source.final_.name).context(DeviceSnafu)?,
            plan: source.plan,
        })
    }

    /// Prepare and run `tree` on a fresh queue, blocking until it completes.
    pub fn run(&self, tree: &Arc<ExpressionTree>, bindings: &Bindings) -> Result<()> {
        let kernels = self.prepare(tree)?;
        let mut queue = self.device.queue().context(DeviceSnafu)?;
        let pool = self.device.workspace_pool();
        reduce_1d::enqueue(queue.as_mut(), &pool, &kernels, bindings)
    }
}

/// One-shot reduction: build a session for `device` and run `tree`.
pub fn run_reduce_1d(
    device: Arc<Device>,
    params: TuningParams,
    tree: &Arc<ExpressionTree>,
    bindings: &Bindings,
) -> Result<()> {
    Reduce1dSession::builder().device(device).params(params).build()?.run(tree, bindings)
}
