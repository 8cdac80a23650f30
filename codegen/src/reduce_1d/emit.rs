//! Kernel text emission.
//!
//! Both kernels come out of [`emit_kernel`]: declare scratch pointers and
//! accumulators, fold the data source into private accumulators, publish them
//! to group-shared memory, tree-reduce, and let lane 0 write the result.

use std::collections::HashSet;

use reductor_dtype::INDEX_DTYPE;
use reductor_ir::{Node, NodeId};
use snafu::ResultExt;

use super::descriptor::ReductionDescriptor;
use super::layout::ScratchLayout;
use super::plan::{ArgumentKind, DataSource, KernelBody, KernelRole, OutputAction, ReducePlan};
use crate::dialect::{Dialect, WorkItem};
use crate::expr::ExprRenderer;
use crate::stream::KernelStream;
use crate::{IrSnafu, MissingSnafu, Result};

/// Prologue once, then the partial and final kernels.
pub fn emit_source(dialect: &dyn Dialect, plan: &ReducePlan) -> Result<String> {
    let mut stream = KernelStream::new();
    for line in dialect.prologue(plan.dtype) {
        stream.line(line);
    }
    emit_kernel(&mut stream, dialect, plan, &plan.partial)?;
    emit_kernel(&mut stream, dialect, plan, &plan.final_)?;
    Ok(stream.into_string())
}

/// Parameter list shared by both kernels: `N`, scratch pointer, canonical arguments.
pub fn signature(dialect: &dyn Dialect, plan: &ReducePlan) -> Vec<String> {
    let mut params = vec!["unsigned int N".to_string(), format!("{} tmp", dialect.global_ptr("char"))];
    for arg in &plan.arguments {
        let ty = dialect.scalar_type(arg.dtype);
        params.push(match arg.kind {
            ArgumentKind::Array => format!("{} {}", dialect.global_ptr(ty), arg.name),
            ArgumentKind::Scalar => format!("{ty} {}", arg.name),
        });
    }
    params
}

pub fn emit_kernel(
    stream: &mut KernelStream,
    dialect: &dyn Dialect,
    plan: &ReducePlan,
    body: &KernelBody,
) -> Result<()> {
    tracing::trace!(kernel.name = %body.name, role = ?body.role, "emitting kernel");

    if let Some(attribute) = dialect.kernel_attribute(body.group_size) {
        stream.line(attribute);
    }
    stream.line(format!("{} {}({})", dialect.kernel_qualifier(), body.name, signature(dialect, plan).join(", ")));
    stream.block(|s| {
        emit_scratch_pointers(s, dialect, plan, &body.layout);

        s.line(format!("unsigned int lid = {};", dialect.work_item(WorkItem::LocalId)));
        match body.role {
            KernelRole::Partial => {
                s.line(format!("unsigned int gid = {};", dialect.work_item(WorkItem::GlobalId)));
                s.line(format!("unsigned int gpid = {};", dialect.work_item(WorkItem::GroupId)));
                s.line(format!("unsigned int gsize = {};", dialect.work_item(WorkItem::GlobalSize)));
            }
            KernelRole::Final => s.line(format!("unsigned int lsize = {};", dialect.work_item(WorkItem::LocalSize))),
        }

        emit_accumulators(s, dialect, &plan.descriptors, body.group_size);

        match body.source {
            DataSource::Input { vector_width } => emit_scan(s, dialect, plan, vector_width)?,
            DataSource::Scratch { count } => emit_scratch_fold(s, dialect, &plan.descriptors, count),
        }

        for rd in &plan.descriptors {
            let p = &rd.params;
            if p.is_indexing() {
                s.line(format!("{}[lid] = {};", p.buf_value(), p.acc_value()));
            }
            s.line(format!("{}[lid] = {};", p.buf(), p.acc()));
        }

        emit_tree_reduce(s, dialect, &plan.descriptors, body.group_size);

        s.line("if (lid == 0)");
        s.block(|s| match body.output {
            OutputAction::Scratch => {
                for rd in &plan.descriptors {
                    let p = &rd.params;
                    if p.is_indexing() {
                        s.line(format!("{}[gpid] = {}[0];", p.temp_value(), p.buf_value()));
                    }
                    s.line(format!("{}[gpid] = {}[0];", p.temp(), p.buf()));
                }
                Ok(())
            }
            OutputAction::Assignments => emit_assignments(s, dialect, plan),
        })
    })
}

fn emit_scratch_pointers(s: &mut KernelStream, dialect: &dyn Dialect, plan: &ReducePlan, layout: &ScratchLayout) {
    let index_ptr = dialect.global_ptr(dialect.scalar_type(INDEX_DTYPE));
    for (rd, region) in plan.descriptors.iter().zip(layout.regions()) {
        let p = &rd.params;
        if let Some(offset) = region.index_offset {
            s.line(format!("{index_ptr} {} = ({index_ptr})(tmp + {offset});", p.temp()));
        }
        let value_ptr = dialect.global_ptr(dialect.scalar_type(p.dtype));
        let name = if p.is_indexing() { p.temp_value() } else { p.temp() };
        s.line(format!("{value_ptr} {name} = ({value_ptr})(tmp + {});", region.value_offset));
    }
}

fn emit_accumulators(
    s: &mut KernelStream,
    dialect: &dyn Dialect,
    descriptors: &[ReductionDescriptor],
    group_size: usize,
) {
    let index_ty = dialect.scalar_type(INDEX_DTYPE);
    for rd in descriptors {
        let p = &rd.params;
        let ty = dialect.scalar_type(p.dtype);
        if p.is_indexing() {
            s.line(dialect.local_array(ty, &p.buf_value(), group_size));
            s.line(format!("{ty} {} = {};", p.acc_value(), p.neutral(dialect)));
            s.line(dialect.local_array(index_ty, &p.buf(), group_size));
            s.line(format!("{index_ty} {} = 0;", p.acc()));
        } else {
            s.line(dialect.local_array(ty, &p.buf(), group_size));
            s.line(format!("{ty} {} = {};", p.acc(), p.neutral(dialect)));
        }
    }
}

/// Fold `value` at position `index` into a private accumulator.
fn emit_fold(s: &mut KernelStream, dialect: &dyn Dialect, rd: &ReductionDescriptor, value: &str, index: &str) {
    let p = &rd.params;
    if p.is_indexing() {
        s.line(format!("if ({})", p.displaces(value, &p.acc_value())));
        s.scope(|s| {
            s.line(format!("{} = {value};", p.acc_value()));
            s.line(format!("{} = {index};", p.acc()));
        });
    } else {
        s.line(format!("{} = {};", p.acc(), p.combine(dialect, &p.acc(), value)));
    }
}

/// Strided scan over the input, vectorised when `vector_width > 1`.
///
/// Lanes of one chunk fold in ascending order. Elements past the last whole
/// chunk are picked up by a scalar remainder loop, so every access is checked
/// against `N`.
fn emit_scan(s: &mut KernelStream, dialect: &dyn Dialect, plan: &ReducePlan, vector_width: usize) -> Result<()> {
    let renderer = ExprRenderer::new(&plan.tree, &plan.symbols, dialect);
    let symbols = &plan.symbols;

    let remainder_start = if vector_width > 1 {
        let v = vector_width;
        s.line(format!("for (unsigned int i = gid; i < N/{v}; i += gsize)"));
        s.block(|s| {
            let mut fetched = HashSet::new();
            for rd in &plan.descriptors {
                for leaf in plan.tree.leaves(rd.params.operand) {
                    let Some(name) = symbols.name(leaf) else {
                        return MissingSnafu { what: format!("symbol for leaf {leaf}") }.fail();
                    };
                    if fetched.insert(leaf) {
                        let dtype = plan.tree.node_dtype(leaf).context(IrSnafu)?;
                        s.line(format!(
                            "{} {name}_v = {};",
                            dialect.vector_type(dtype, v),
                            dialect.vector_load(dtype, v, name, "i")
                        ));
                    }
                }
            }
            for rd in &plan.descriptors {
                for lane in 0..v {
                    let access = |id: NodeId, node: &Node| match node {
                        Node::Array { .. } => symbols.name(id).map(|n| dialect.vector_lane(&format!("{n}_v"), lane)),
                        _ => None,
                    };
                    let value = renderer.render(rd.params.operand, &access)?;
                    emit_fold(s, dialect, rd, &value, &format!("i*{v} + {lane}"));
                }
            }
            Ok(())
        })?;
        format!("N/{v}*{v} + gid")
    } else {
        "gid".to_string()
    };

    s.line(format!("for (unsigned int i = {remainder_start}; i < N; i += gsize)"));
    s.block(|s| {
        let access = |id: NodeId, node: &Node| match node {
            Node::Array { .. } => symbols.name(id).map(|n| format!("{n}[i]")),
            _ => None,
        };
        for rd in &plan.descriptors {
            let value = renderer.render(rd.params.operand, &access)?;
            emit_fold(s, dialect, rd, &value, "i");
        }
        Ok(())
    })
}

/// Fold the `count` per-group partials, `lsize` apart per lane.
///
/// Emitted even for a single group so the launch protocol stays uniform.
fn emit_scratch_fold(s: &mut KernelStream, dialect: &dyn Dialect, descriptors: &[ReductionDescriptor], count: usize) {
    s.line(format!("for (unsigned int i = lid; i < {count}; i += lsize)"));
    s.scope(|s| {
        for rd in descriptors {
            let p = &rd.params;
            if p.is_indexing() {
                let value = format!("{}[i]", p.temp_value());
                s.line(format!("if ({})", p.displaces(&value, &p.acc_value())));
                s.scope(|s| {
                    s.line(format!("{} = {value};", p.acc_value()));
                    s.line(format!("{} = {}[i];", p.acc(), p.temp()));
                });
            } else {
                emit_fold(s, dialect, rd, &format!("{}[i]", p.temp()), "i");
            }
        }
    });
}

/// Local-memory tree reducer.
///
/// Halves the active lane count each step, with one barrier per step executed
/// unconditionally by every lane. `group_size` must be a power of two; slot 0
/// ends up holding the balanced-tree combine of all lanes.
pub fn emit_tree_reduce(
    s: &mut KernelStream,
    dialect: &dyn Dialect,
    descriptors: &[ReductionDescriptor],
    group_size: usize,
) {
    s.line("#pragma unroll");
    s.line(format!("for (unsigned int stride = {}; stride > 0; stride /= 2)", group_size / 2));
    s.scope(|s| {
        s.line(dialect.barrier());
        s.line("if (lid < stride)");
        s.scope(|s| {
            for rd in descriptors {
                let p = &rd.params;
                let (buf, buf_value) = (p.buf(), p.buf_value());
                if p.is_indexing() {
                    let other = format!("{buf_value}[lid + stride]");
                    s.line(format!("if ({})", p.displaces(&other, &format!("{buf_value}[lid]"))));
                    s.scope(|s| {
                        s.line(format!("{buf_value}[lid] = {other};"));
                        s.line(format!("{buf}[lid] = {buf}[lid + stride];"));
                    });
                } else {
                    let combined = p.combine(dialect, &format!("{buf}[lid]"), &format!("{buf}[lid + stride]"));
                    s.line(format!("{buf}[lid] = {combined};"));
                }
            }
        });
    });
}

/// Lane-0 write-out: `target[0] = value` with reductions read from slot 0.
fn emit_assignments(s: &mut KernelStream, dialect: &dyn Dialect, plan: &ReducePlan) -> Result<()> {
    let renderer = ExprRenderer::new(&plan.tree, &plan.symbols, dialect);
    let symbols = &plan.symbols;
    let access = |id: NodeId, node: &Node| match node {
        Node::Reduce { .. } => symbols.name(id).map(|n| format!("{n}_buf[0]")),
        Node::Array { .. } => symbols.name(id).map(|n| format!("{n}[0]")),
        _ => None,
    };

    for &stmt in &plan.assignments {
        let node = plan.tree.node(stmt).context(IrSnafu)?;
        let Node::Assign { target, value } = *node else {
            return MissingSnafu { what: format!("assignment at {stmt}") }.fail();
        };
        let lhs = renderer.render(target, &access)?;
        let rhs = renderer.render(value, &access)?;
        s.line(format!("{lhs} = {rhs};"));
    }
    Ok(())
}
