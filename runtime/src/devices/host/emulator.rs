//! Work-group emulator for reduction kernel plans.
//!
//! Executes one [`KernelBody`] the way the generated source does: every lane
//! of every group scans its strided share of the data into private
//! accumulators, publishes them to a group-local array, the group runs the
//! halving tree reduction, and lane 0 writes the group result. Lanes run one
//! after another; the barrier in the tree reducer becomes the step boundary.

use std::collections::HashMap;

use reductor_codegen::reduce_1d::{ArgumentKind, DataSource, KernelBody, KernelRole, OutputAction, ReducePlan};
use reductor_device::error::{ArgumentMismatchSnafu, LaunchGeometrySnafu, RuntimeSnafu};
use reductor_device::{Buffer, ExecParams, KernelArg, Result};
use reductor_dtype::{INDEX_DTYPE, ScalarDType};
use reductor_ir::{ConstValue, Node, NodeId};
use smallvec::SmallVec;
use snafu::ensure;

use super::arith;

/// Private (value, position) accumulator of one reduction.
#[derive(Debug, Clone, Copy)]
struct Accum {
    value: ConstValue,
    index: u32,
}

type Lane = SmallVec<[Accum; 4]>;

enum Bound<'a> {
    Array { buffer: &'a Buffer, dtype: ScalarDType, name: &'a str },
    Scalar(ConstValue),
}

/// Arguments of one launch, checked against the plan.
struct Frame<'a> {
    plan: &'a ReducePlan,
    body: &'a KernelBody,
    n: usize,
    scratch: &'a Buffer,
    bound: HashMap<NodeId, Bound<'a>>,
}

impl<'a> Frame<'a> {
    fn bind(plan: &'a ReducePlan, body: &'a KernelBody, args: &'a [KernelArg]) -> Result<Self> {
        let arity = 2 + plan.arguments.len();
        ensure!(
            args.len() == arity,
            ArgumentMismatchSnafu {
                index: args.len().min(arity),
                reason: format!("'{}' takes {arity} arguments, got {}", body.name, args.len()),
            }
        );

        let n = match &args[0] {
            KernelArg::Size(n) => *n as usize,
            other => return mismatch(0, format!("expected extent, got {}", other.kind())),
        };
        // Device loop counters are 32-bit; an extent they cannot walk would hang there.
        if matches!(body.source, DataSource::Input { .. }) && n > plan.params.max_extent() {
            return mismatch(0, format!("extent {n} wraps the 32-bit scan counter (max {})", plan.params.max_extent()));
        }

        let scratch = match &args[1] {
            KernelArg::Buffer(buffer) => buffer,
            other => return mismatch(1, format!("expected scratch buffer, got {}", other.kind())),
        };
        let needed = body.layout.total_bytes();
        ensure!(
            scratch.size() >= needed,
            ArgumentMismatchSnafu {
                index: 1usize,
                reason: format!("scratch holds {} bytes, layout needs {needed}", scratch.size()),
            }
        );

        let mut bound = HashMap::with_capacity(plan.arguments.len());
        for (i, (param, arg)) in plan.arguments.iter().zip(&args[2..]).enumerate() {
            let index = i + 2;
            let value = match (param.kind, arg) {
                (ArgumentKind::Array, KernelArg::Buffer(buffer)) => {
                    ensure!(
                        buffer.dtype() == param.dtype,
                        ArgumentMismatchSnafu {
                            index,
                            reason: format!("{} expects {} elements, got {}", param.name, param.dtype, buffer.dtype()),
                        }
                    );
                    Bound::Array { buffer, dtype: param.dtype, name: &param.name }
                }
                (ArgumentKind::Scalar, KernelArg::Scalar(value, dtype)) => {
                    ensure!(
                        *dtype == param.dtype,
                        ArgumentMismatchSnafu {
                            index,
                            reason: format!("{} expects a {} scalar, got {dtype}", param.name, param.dtype),
                        }
                    );
                    Bound::Scalar(*value)
                }
                (kind, other) => {
                    return mismatch(index, format!("{} expects {kind:?}, got {}", param.name, other.kind()));
                }
            };
            bound.insert(param.node, value);
        }

        Ok(Self { plan, body, n, scratch, bound })
    }

    fn read_array(&self, id: NodeId, index: usize) -> Result<ConstValue> {
        match self.bound.get(&id) {
            Some(Bound::Array { buffer, dtype, name }) => {
                buffer.with_host(|bytes| arith::load(bytes, *dtype, index, name))?
            }
            _ => RuntimeSnafu { message: format!("array {id} is not bound") }.fail(),
        }
    }

    fn scalar(&self, id: NodeId) -> Result<ConstValue> {
        match self.bound.get(&id) {
            Some(Bound::Scalar(value)) => Ok(*value),
            _ => RuntimeSnafu { message: format!("scalar {id} is not bound") }.fail(),
        }
    }

    /// Evaluate a subtree. `leaf` supplies arrays and reductions.
    fn eval(&self, id: NodeId, leaf: &dyn Fn(NodeId, &Node) -> Option<Result<ConstValue>>) -> Result<ConstValue> {
        let tree = &self.plan.tree;
        let node = tree.node(id).map_err(ir)?;
        if let Some(result) = leaf(id, node) {
            return result;
        }
        match node {
            Node::Const { value, .. } => Ok(*value),
            Node::Scalar { .. } => self.scalar(id),
            Node::Unary { op, operand } => {
                let dtype = tree.node_dtype(*operand).map_err(ir)?;
                arith::unary(*op, self.eval(*operand, leaf)?, dtype)
            }
            Node::Binary { op, lhs, rhs } => {
                let dtype = tree.node_dtype(*lhs).map_err(ir)?;
                arith::binary(*op, self.eval(*lhs, leaf)?, self.eval(*rhs, leaf)?, dtype)
            }
            Node::Array { .. } | Node::Reduce { .. } | Node::Assign { .. } => {
                RuntimeSnafu { message: format!("node {id} cannot be evaluated here") }.fail()
            }
        }
    }

    fn scratch_load(&self, offset: usize, dtype: ScalarDType, slot: usize) -> Result<ConstValue> {
        self.scratch.with_host(|bytes| arith::load(&bytes[offset.min(bytes.len())..], dtype, slot, "scratch"))?
    }

    fn scratch_store(&self, offset: usize, dtype: ScalarDType, slot: usize, value: ConstValue) -> Result<()> {
        self.scratch.with_host_mut(|bytes| {
            let start = offset.min(bytes.len());
            arith::store(&mut bytes[start..], dtype, slot, value, "scratch")
        })?
    }
}

fn mismatch<T>(index: usize, reason: String) -> Result<T> {
    ArgumentMismatchSnafu { index, reason }.fail()
}

fn ir(source: reductor_ir::Error) -> reductor_device::Error {
    RuntimeSnafu { message: source.to_string() }.build()
}

/// Run one launch of `body`.
pub fn execute(plan: &ReducePlan, body: &KernelBody, args: &[KernelArg], params: &ExecParams) -> Result<()> {
    let frame = Frame::bind(plan, body, args)?;

    let group_size = body.group_size;
    let expected_global = match body.role {
        KernelRole::Partial => plan.params.partial_threads(),
        KernelRole::Final => group_size,
    };
    let (global, local) = (params.global_size[0], params.local_size[0]);
    ensure!(
        params.is_1d() && global == expected_global && local == group_size,
        LaunchGeometrySnafu {
            kernel: body.name.clone(),
            global,
            local,
            expected_global,
            expected_local: group_size,
        }
    );

    for group in 0..global / group_size {
        run_group(&frame, group, global)?;
    }
    Ok(())
}

fn run_group(frame: &Frame<'_>, group: usize, global: usize) -> Result<()> {
    let plan = frame.plan;
    let group_size = frame.body.group_size;

    let mut local: Vec<Lane> = Vec::with_capacity(group_size);
    for lid in 0..group_size {
        let mut lane: Lane = plan
            .descriptors
            .iter()
            .map(|rd| Accum { value: rd.params.op.identity(rd.params.dtype), index: 0 })
            .collect();
        match frame.body.source {
            DataSource::Input { vector_width } => {
                scan(frame, &mut lane, group * group_size + lid, global, vector_width)?
            }
            DataSource::Scratch { count } => fold_scratch(frame, &mut lane, lid, group_size, count)?,
        }
        local.push(lane);
    }

    tree_reduce(frame, &mut local)?;
    tracing::trace!(kernel.name = %frame.body.name, group, "group reduced");

    let Some(result) = local.first() else { return Ok(()) };
    match frame.body.output {
        OutputAction::Scratch => store_partials(frame, result, group),
        OutputAction::Assignments => write_assignments(frame, result),
    }
}

fn fold(frame: &Frame<'_>, lane: &mut Lane, slot: usize, value: ConstValue, index: u32) -> Result<()> {
    let p = &frame.plan.descriptors[slot].params;
    let acc = &mut lane[slot];
    if p.is_indexing() {
        if arith::displaces(p.op, value, acc.value) {
            *acc = Accum { value, index };
        }
    } else {
        acc.value = arith::combine(p.op, acc.value, value, p.dtype)?;
    }
    Ok(())
}

fn fold_element(frame: &Frame<'_>, lane: &mut Lane, index: usize) -> Result<()> {
    let element = |id: NodeId, node: &Node| match node {
        Node::Array { .. } => Some(frame.read_array(id, index)),
        _ => None,
    };
    for (slot, rd) in frame.plan.descriptors.iter().enumerate() {
        let value = frame.eval(rd.params.operand, &element)?;
        fold(frame, lane, slot, value, index as u32)?;
    }
    Ok(())
}

/// Grid-stride scan: whole V-wide chunks first, lanes in ascending order, then the remainder.
fn scan(frame: &Frame<'_>, lane: &mut Lane, gid: usize, gsize: usize, vector_width: usize) -> Result<()> {
    let n = frame.n;
    let remainder_start = if vector_width > 1 {
        for chunk in (gid..n / vector_width).step_by(gsize) {
            for slot in 0..frame.plan.descriptors.len() {
                for offset in 0..vector_width {
                    let index = chunk * vector_width + offset;
                    let element = |id: NodeId, node: &Node| match node {
                        Node::Array { .. } => Some(frame.read_array(id, index)),
                        _ => None,
                    };
                    let value = frame.eval(frame.plan.descriptors[slot].params.operand, &element)?;
                    fold(frame, lane, slot, value, index as u32)?;
                }
            }
        }
        n / vector_width * vector_width + gid
    } else {
        gid
    };

    for index in (remainder_start..n).step_by(gsize) {
        fold_element(frame, lane, index)?;
    }
    Ok(())
}

/// Fold the per-group partials left by the partial kernel, `lsize` apart.
fn fold_scratch(frame: &Frame<'_>, lane: &mut Lane, lid: usize, lsize: usize, count: usize) -> Result<()> {
    for slot_index in (lid..count).step_by(lsize) {
        for (slot, (rd, region)) in frame.plan.descriptors.iter().zip(frame.body.layout.regions()).enumerate() {
            let value = frame.scratch_load(region.value_offset, rd.params.dtype, slot_index)?;
            match region.index_offset {
                Some(offset) if rd.is_indexing() => {
                    let index = frame.scratch_load(offset, INDEX_DTYPE, slot_index)?;
                    let index = match index {
                        ConstValue::UInt(i) => i as u32,
                        other => other.as_f64() as u32,
                    };
                    fold(frame, lane, slot, value, index)?;
                }
                _ => fold(frame, lane, slot, value, slot_index as u32)?,
            }
        }
    }
    Ok(())
}

/// Halving tree reduction over the group-local array. Slot 0 ends with the result.
fn tree_reduce(frame: &Frame<'_>, local: &mut [Lane]) -> Result<()> {
    let mut stride = local.len() / 2;
    while stride > 0 {
        // Lanes below `stride` only read slots at or above it, so one pass per step is exact.
        for lid in 0..stride {
            for (slot, rd) in frame.plan.descriptors.iter().enumerate() {
                let p = &rd.params;
                let other = local[lid + stride][slot];
                let mine = &mut local[lid][slot];
                if p.is_indexing() {
                    if arith::displaces(p.op, other.value, mine.value) {
                        *mine = other;
                    }
                } else {
                    mine.value = arith::combine(p.op, mine.value, other.value, p.dtype)?;
                }
            }
        }
        stride /= 2;
    }
    Ok(())
}

fn store_partials(frame: &Frame<'_>, result: &Lane, group: usize) -> Result<()> {
    for ((rd, region), acc) in frame.plan.descriptors.iter().zip(frame.body.layout.regions()).zip(result) {
        if let Some(offset) = region.index_offset {
            frame.scratch_store(offset, INDEX_DTYPE, group, ConstValue::UInt(acc.index as u64))?;
        }
        frame.scratch_store(region.value_offset, rd.params.dtype, group, acc.value)?;
    }
    Ok(())
}

fn write_assignments(frame: &Frame<'_>, result: &Lane) -> Result<()> {
    let plan = frame.plan;
    let reduced = |id: NodeId, node: &Node| match node {
        Node::Reduce { .. } => {
            let slot = plan.descriptors.iter().position(|rd| rd.node == id)?;
            let acc = result[slot];
            Some(Ok(if plan.descriptors[slot].is_indexing() { ConstValue::UInt(acc.index as u64) } else { acc.value }))
        }
        Node::Array { .. } => Some(frame.read_array(id, 0)),
        _ => None,
    };

    for &stmt in &plan.assignments {
        let Node::Assign { target, value: rhs } = *plan.tree.node(stmt).map_err(ir)? else {
            return RuntimeSnafu { message: format!("statement {stmt} is not an assignment") }.fail();
        };
        let result = frame.eval(rhs, &reduced)?;
        match frame.bound.get(&target) {
            Some(Bound::Array { buffer, dtype, name }) => {
                buffer.with_host_mut(|bytes| arith::store(bytes, *dtype, 0, result, name))??;
            }
            _ => return RuntimeSnafu { message: format!("assignment target {target} is not bound") }.fail(),
        }
    }
    Ok(())
}
