//! Argument binding, launch protocol and the host launch checks.

use std::sync::Arc;

use reductor_device::{Buffer, CommandQueue, ExecParams, Kernel, KernelArg};
use reductor_dtype::ScalarDType;
use reductor_ir::{ConstValue, ExpressionTree, NodeId};
use test_case::test_case;

use crate::test::{host, output, params, upload};
use crate::{Bindings, Error, HostQueue, Reduce1dKernels, Reduce1dSession, enqueue};

struct Fixture {
    session: Reduce1dSession,
    kernels: Reduce1dKernels,
    x: NodeId,
    out: NodeId,
}

fn sum_fixture(n: usize) -> Fixture {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[n]);
    let out = b.array("out", ScalarDType::Float32, &[1]);
    let sum = b.sum(x);
    b.assign(out, sum);
    let tree = Arc::new(b.build().unwrap());

    let session = Reduce1dSession::builder().device(host()).params(params(1, 4, 2)).build().unwrap();
    let kernels = session.prepare(&tree).unwrap();
    Fixture { session, kernels, x, out }
}

/// Kernel with N, scratch and both arguments bound.
fn bound_kernel(fixture: &Fixture, partial: bool, x: &Buffer, out: &Buffer, scratch: &Buffer) -> Kernel {
    let entry = if partial { &fixture.kernels.partial } else { &fixture.kernels.final_ };
    let mut kernel = Kernel::new(entry.clone());
    kernel.set_size_arg(0, 8).unwrap();
    kernel.set_arg(1, scratch).unwrap();
    // Canonical order: the assignment target comes before the reduced array.
    kernel.set_arg(2, out).unwrap();
    kernel.set_arg(3, x).unwrap();
    kernel
}

fn scratch(fixture: &Fixture) -> Buffer {
    let device = fixture.session.device();
    Buffer::allocate(device.allocator.clone(), ScalarDType::UInt8, fixture.kernels.plan.workspace_size()).unwrap()
}

#[test]
fn test_entries_share_signature() {
    let fixture = sum_fixture(8);
    assert_eq!(fixture.kernels.partial.arity(), 4);
    assert_eq!(fixture.kernels.final_.arity(), 4);
    assert_ne!(fixture.kernels.partial.name(), fixture.kernels.final_.name());
}

#[test]
fn test_missing_binding_names_the_leaf() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let xb = upload(device, &[1.0f32; 8]);

    let err = fixture.session.run(&fixture.kernels.plan.tree, &Bindings::new().with(fixture.x, &xb)).unwrap_err();
    assert!(matches!(&err, Error::MissingBinding { name } if name == "out"), "unexpected error: {err}");
}

#[test]
fn test_manual_launch_matches_orchestrator() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let xb = upload(device, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    let ob = output::<f32>(device);
    let sb = scratch(&fixture);

    let plan = &fixture.kernels.plan;
    let (p, f) = (plan.partial_entry(), plan.final_entry());
    let mut queue = HostQueue::new();
    let (partial, final_) = (bound_kernel(&fixture, true, &xb, &ob, &sb), bound_kernel(&fixture, false, &xb, &ob, &sb));
    queue.enqueue(&partial, &ExecParams::new_1d(p.global_size, p.local_size)).unwrap();
    queue.enqueue(&final_, &ExecParams::new_1d(f.global_size, f.local_size)).unwrap();
    assert_eq!(queue.pending(), 2);

    queue.synchronize().unwrap();
    assert_eq!(queue.pending(), 0);
    assert_eq!(ob.to_vec::<f32>().unwrap(), vec![36.0]);
}

#[test]
fn test_rebinding_after_enqueue_does_not_affect_launch() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (xb, other) = (upload(device, &[1.0f32; 8]), upload(device, &[100.0f32; 8]));
    let ob = output::<f32>(device);
    let sb = scratch(&fixture);

    let p = fixture.kernels.plan.partial_entry();
    let mut queue = HostQueue::new();
    let mut partial = bound_kernel(&fixture, true, &xb, &ob, &sb);
    queue.enqueue(&partial, &ExecParams::new_1d(p.global_size, p.local_size)).unwrap();
    partial.set_arg(3, &other).unwrap();

    let f = fixture.kernels.plan.final_entry();
    let final_ = bound_kernel(&fixture, false, &xb, &ob, &sb);
    queue.enqueue(&final_, &ExecParams::new_1d(f.global_size, f.local_size)).unwrap();
    queue.synchronize().unwrap();

    assert_eq!(ob.to_vec::<f32>().unwrap(), vec![8.0]);
}

#[test]
fn test_unset_slot_rejected_at_enqueue() {
    let fixture = sum_fixture(8);
    let mut kernel = Kernel::new(fixture.kernels.partial.clone());
    kernel.set_size_arg(0, 8).unwrap();

    let err = HostQueue::new().enqueue(&kernel, &ExecParams::new_1d(8, 4)).unwrap_err();
    assert!(matches!(err, reductor_device::Error::MissingArgument { index: 1 }), "unexpected error: {err}");
}

#[test]
fn test_wrong_argument_count_rejected() {
    let fixture = sum_fixture(8);
    let sb = scratch(&fixture);

    let args = [KernelArg::Size(8), KernelArg::from(&sb)];
    let err = fixture.kernels.partial.launch(&args, &ExecParams::new_1d(8, 4)).unwrap_err();
    assert!(matches!(err, reductor_device::Error::ArgumentMismatch { .. }), "unexpected error: {err}");
}

#[test_case(true, 4, 4 ; "partial with one group")]
#[test_case(true, 8, 8 ; "partial with wide groups")]
#[test_case(false, 8, 4 ; "final with two groups")]
#[test_case(false, 2, 2 ; "final with narrow group")]
fn test_wrong_geometry_rejected(partial: bool, global: usize, local: usize) {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (xb, ob, sb) = (upload(device, &[1.0f32; 8]), output::<f32>(device), scratch(&fixture));

    let kernel = bound_kernel(&fixture, partial, &xb, &ob, &sb);
    let err = kernel.launch(&ExecParams::new_1d(global, local)).unwrap_err();
    assert!(matches!(err, reductor_device::Error::LaunchGeometry { .. }), "unexpected error: {err}");
}

#[test]
fn test_failed_launch_discards_later_work() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (xb, ob, sb) = (upload(device, &[1.0f32; 8]), output::<f32>(device), scratch(&fixture));

    let mut queue = HostQueue::new();
    queue.enqueue(&bound_kernel(&fixture, true, &xb, &ob, &sb), &ExecParams::new_1d(4, 4)).unwrap();
    let f = fixture.kernels.plan.final_entry();
    let final_ = bound_kernel(&fixture, false, &xb, &ob, &sb);
    queue.enqueue(&final_, &ExecParams::new_1d(f.global_size, f.local_size)).unwrap();

    assert!(queue.synchronize().is_err());
    assert_eq!(queue.pending(), 0);
    assert_eq!(ob.to_vec::<f32>().unwrap(), vec![0.0]);
}

#[test]
fn test_wrong_buffer_dtype_rejected() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let ints = upload(device, &[1i32; 8]);
    let (ob, sb) = (output::<f32>(device), scratch(&fixture));

    let p = fixture.kernels.plan.partial_entry();
    let kernel = bound_kernel(&fixture, true, &ints, &ob, &sb);
    let err = kernel.launch(&ExecParams::new_1d(p.global_size, p.local_size)).unwrap_err();
    assert!(matches!(err, reductor_device::Error::ArgumentMismatch { index: 3, .. }), "unexpected error: {err}");
}

#[test]
fn test_scalar_in_array_slot_rejected() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (xb, ob, sb) = (upload(device, &[1.0f32; 8]), output::<f32>(device), scratch(&fixture));

    let p = fixture.kernels.plan.partial_entry();
    let mut kernel = bound_kernel(&fixture, true, &xb, &ob, &sb);
    kernel.set_arg(2, KernelArg::scalar(ConstValue::Float(1.0), ScalarDType::Float32)).unwrap();
    let err = kernel.launch(&ExecParams::new_1d(p.global_size, p.local_size)).unwrap_err();
    assert!(matches!(err, reductor_device::Error::ArgumentMismatch { index: 2, .. }), "unexpected error: {err}");
}

#[test]
fn test_undersized_scratch_rejected() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (xb, ob) = (upload(device, &[1.0f32; 8]), output::<f32>(device));
    let small = Buffer::allocate(device.allocator.clone(), ScalarDType::UInt8, 1).unwrap();

    let p = fixture.kernels.plan.partial_entry();
    let kernel = bound_kernel(&fixture, true, &xb, &ob, &small);
    let err = kernel.launch(&ExecParams::new_1d(p.global_size, p.local_size)).unwrap_err();
    assert!(matches!(err, reductor_device::Error::ArgumentMismatch { index: 1, .. }), "unexpected error: {err}");
}

#[test]
fn test_short_input_is_out_of_bounds() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (short, ob) = (upload(device, &[1.0f32; 5]), output::<f32>(device));

    let bindings = Bindings::new().with(fixture.x, &short).with(fixture.out, &ob);
    let err = fixture.session.run(&fixture.kernels.plan.tree, &bindings).unwrap_err();
    assert!(
        matches!(err, Error::Device { source: reductor_device::Error::OutOfBounds { .. } }),
        "unexpected error: {err}"
    );
}

#[test]
fn test_enqueue_uses_a_fresh_workspace_per_call() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (xb, ob) = (upload(device, &[2.0f32; 8]), output::<f32>(device));
    let bindings = Bindings::new().with(fixture.x, &xb).with(fixture.out, &ob);

    let pool = device.workspace_pool();
    for _ in 0..3 {
        let mut queue = device.queue().unwrap();
        enqueue(queue.as_mut(), &pool, &fixture.kernels, &bindings).unwrap();
        assert_eq!(ob.to_vec::<f32>().unwrap(), vec![16.0]);
    }
}

#[test]
fn test_invalid_group_size_rejected_by_session() {
    let err = Reduce1dSession::builder().device(host()).params(params(1, 3, 2)).build().unwrap_err();
    assert!(matches!(err, Error::Codegen { .. }), "unexpected error: {err}");
}

/// Sum over an unbound input of `n` elements with G=256, K=64.
fn wide_sum(n: usize) -> (Reduce1dSession, Arc<ExpressionTree>) {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[n]);
    let out = b.array("out", ScalarDType::Float32, &[1]);
    let sum = b.sum(x);
    b.assign(out, sum);
    let tree = Arc::new(b.build().unwrap());
    let session = Reduce1dSession::builder().device(host()).params(params(1, 256, 64)).build().unwrap();
    (session, tree)
}

#[test]
fn test_extent_that_wraps_loop_counter_rejected() {
    let max = params(1, 256, 64).max_extent();
    assert_eq!(max, u32::MAX as usize - 16383);

    for n in [max + 1, u32::MAX as usize, u32::MAX as usize + 1] {
        let (session, tree) = wide_sum(n);
        let err = session.run(&tree, &Bindings::new()).unwrap_err();
        assert!(matches!(err, Error::ExtentOverflow { extent, max: m } if extent == n && m == max), "{err}");
    }
}

#[test]
fn test_largest_walkable_extent_accepted() {
    let (session, tree) = wide_sum(params(1, 256, 64).max_extent());

    // Passes the extent check and stops at the first unbound argument.
    let err = session.run(&tree, &Bindings::new()).unwrap_err();
    assert!(matches!(&err, Error::MissingBinding { name } if name == "out"), "{err}");
}

#[test]
fn test_host_launch_rejects_wrapping_extent() {
    let fixture = sum_fixture(8);
    let device = fixture.session.device();
    let (xb, ob, sb) = (upload(device, &[1.0f32; 8]), output::<f32>(device), scratch(&fixture));

    let p = fixture.kernels.plan.partial_entry();
    let mut kernel = bound_kernel(&fixture, true, &xb, &ob, &sb);
    kernel.set_size_arg(0, u32::MAX).unwrap();
    let err = kernel.launch(&ExecParams::new_1d(p.global_size, p.local_size)).unwrap_err();
    assert!(matches!(err, reductor_device::Error::ArgumentMismatch { index: 0, .. }), "unexpected error: {err}");
}
