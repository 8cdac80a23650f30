use std::sync::Arc;

use parking_lot::Mutex;
use reductor_dtype::ScalarDType;
use reductor_ir::ConstValue;
use test_case::test_case;

use crate::{Buffer, Error, ExecParams, HostAllocator, Kernel, KernelArg, KernelEntry, Launch};

/// Entry that records the argument kinds of every launch.
#[derive(Debug, Default)]
struct Recorder {
    arity: usize,
    launches: Mutex<Vec<Vec<&'static str>>>,
}

impl KernelEntry for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn launch(&self, args: &[KernelArg], _params: &ExecParams) -> crate::Result<()> {
        self.launches.lock().push(args.iter().map(KernelArg::kind).collect());
        Ok(())
    }
}

fn recorder(arity: usize) -> Arc<Recorder> {
    Arc::new(Recorder { arity, ..Default::default() })
}

#[test]
fn test_launch_with_all_slots() {
    let entry = recorder(3);
    let buffer = Buffer::allocate(Arc::new(HostAllocator), ScalarDType::Float32, 4).unwrap();

    let mut kernel = Kernel::new(entry.clone());
    kernel.set_size_arg(0, 4).unwrap();
    kernel.set_arg(1, &buffer).unwrap();
    kernel.set_arg(2, KernelArg::scalar(ConstValue::Float(2.5), ScalarDType::Float32)).unwrap();
    kernel.launch(&ExecParams::new_1d(8, 4)).unwrap();

    assert_eq!(*entry.launches.lock(), vec![vec!["size", "buffer", "scalar"]]);
}

#[test_case(&[1, 2] ; "first slot unset")]
#[test_case(&[0, 2] ; "middle slot unset")]
#[test_case(&[0, 1] ; "last slot unset")]
fn test_unset_slot_is_missing_argument(bound: &[usize]) {
    let mut kernel = Kernel::new(recorder(3));
    for &index in bound {
        kernel.set_size_arg(index, 1).unwrap();
    }
    let missing = (0..3).find(|i| !bound.contains(i)).unwrap();

    let err = kernel.launch(&ExecParams::new_1d(1, 1)).unwrap_err();
    assert!(matches!(err, Error::MissingArgument { index } if index == missing));
}

#[test]
fn test_set_arg_past_arity() {
    let mut kernel = Kernel::new(recorder(2));
    let err = kernel.set_size_arg(2, 0).unwrap_err();
    assert!(matches!(err, Error::ArgumentMismatch { index: 2, .. }));
}

#[test]
fn test_capture_snapshots_bindings() {
    let entry = recorder(1);
    let mut kernel = Kernel::new(entry.clone());
    kernel.set_size_arg(0, 7).unwrap();
    let launch = Launch::capture(&kernel, &ExecParams::new_1d(4, 4)).unwrap();

    kernel.set_arg(0, KernelArg::scalar(ConstValue::Int(1), ScalarDType::Int8)).unwrap();
    assert_eq!(launch.args[0].as_size(), Some(7));

    launch.run().unwrap();
    assert_eq!(*entry.launches.lock(), vec![vec!["size"]]);
}

#[test]
fn test_scalar_arg_is_cast() {
    let KernelArg::Scalar(value, dtype) = KernelArg::scalar(ConstValue::Int(300), ScalarDType::UInt8) else {
        panic!("expected scalar");
    };
    assert_eq!(dtype, ScalarDType::UInt8);
    assert_eq!(value, ConstValue::UInt(44));
}

#[test]
fn test_exec_params() {
    let params = ExecParams::new_1d(512, 128);
    assert!(params.is_1d());
    assert_eq!(params.groups(), 4);
    assert_eq!(ExecParams::new_1d(8, 0).groups(), 0);
}
