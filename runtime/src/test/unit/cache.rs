use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reductor_dtype::ScalarDType;
use reductor_ir::ExpressionTree;

use crate::kernel_cache::{self, source_hash};
use crate::test::{host, params};
use crate::{Error, HostCompiler, Reduce1dSession};

fn max_tree(n: usize) -> Arc<ExpressionTree> {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Int16, &[n]);
    let out = b.array("out", ScalarDType::Int16, &[1]);
    let max = b.max(x);
    b.assign(out, max);
    Arc::new(b.build().unwrap())
}

#[test]
fn test_compiler_key_changes_hash() {
    let src = "__kernel void k() {}";
    assert_eq!(source_hash(src, None), source_hash(src, None));
    assert_ne!(source_hash(src, None), source_hash(src, Some("host-emulator")));
    assert_ne!(source_hash(src, Some("host-emulator")), source_hash(src, Some("nvrtc")));
}

#[test]
fn test_get_or_compile_runs_compiler_once_per_key() {
    let session =
        Reduce1dSession::builder().device(host()).params(params(1, 2, 2)).suffix("_cache_once").build().unwrap();
    let kernels = session.prepare(&max_tree(4)).unwrap();
    let program_spec = reductor_device::ProgramSpec {
        name: "cache_once".into(),
        src: format!("// {}", kernels.partial.name()),
        device: reductor_dtype::DeviceSpec::Host,
        entries: vec![kernels.partial.name().to_string(), kernels.final_.name().to_string()],
        plan: kernels.plan.clone(),
    };

    let calls = AtomicUsize::new(0);
    let hash = source_hash(&program_spec.src, Some("cache-once-test"));
    let compile = || {
        calls.fetch_add(1, Ordering::SeqCst);
        reductor_device::Compiler::compile(&HostCompiler, &program_spec)
    };

    let first = kernel_cache::get_or_compile(hash, "HOST", compile).unwrap();
    let second = kernel_cache::get_or_compile(hash, "HOST", compile).unwrap();
    let other_device = kernel_cache::get_or_compile(hash, "HOST:other", compile).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first, &other_device));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(kernel_cache::len() >= 2);
}

#[test]
fn test_compile_error_is_not_cached() {
    let hash = source_hash("never compiles", Some("cache-error-test"));
    let fail = || -> crate::Result<Arc<dyn reductor_device::Program>> {
        crate::error::UnsupportedDeviceSnafu { device: "NOWHERE" }.fail()
    };

    assert!(matches!(kernel_cache::get_or_compile(hash, "HOST", fail), Err(Error::UnsupportedDevice { .. })));
    assert!(matches!(kernel_cache::get_or_compile(hash, "HOST", fail), Err(Error::UnsupportedDevice { .. })));
}

#[test]
fn test_same_tree_reuses_program() {
    let session = Reduce1dSession::builder().device(host()).params(params(2, 4, 2)).build().unwrap();
    let first = session.prepare(&max_tree(16)).unwrap();
    let second = session.prepare(&max_tree(16)).unwrap();

    assert!(Arc::ptr_eq(&first.partial, &second.partial));
    assert!(Arc::ptr_eq(&first.final_, &second.final_));
}

#[test]
fn test_extent_is_not_part_of_the_key() {
    let session = Reduce1dSession::builder().device(host()).params(params(2, 4, 2)).build().unwrap();
    let small = session.prepare(&max_tree(3)).unwrap();
    let large = session.prepare(&max_tree(3000)).unwrap();

    assert!(Arc::ptr_eq(&small.partial, &large.partial));
    assert_eq!(large.plan.tree.input_extent().unwrap(), 3000);
}

#[test]
fn test_suffix_selects_distinct_entries() {
    let tree = max_tree(8);
    let a = Reduce1dSession::builder().device(host()).params(params(1, 4, 2)).suffix("_a").build().unwrap();
    let b = Reduce1dSession::builder().device(host()).params(params(1, 4, 2)).suffix("_b").build().unwrap();

    let (ka, kb) = (a.prepare(&tree).unwrap(), b.prepare(&tree).unwrap());
    assert_eq!(ka.partial.name(), "reduce_1d_partial_a");
    assert_eq!(kb.final_.name(), "reduce_1d_final_b");
    assert!(!Arc::ptr_eq(&ka.partial, &kb.partial));
}
