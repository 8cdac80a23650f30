use std::sync::Arc;

use crate::{Allocator, Buffer, Error, HostAllocator, LruAllocator};
use reductor_dtype::ScalarDType;

fn allocator() -> Arc<dyn Allocator> {
    Arc::new(LruAllocator::new(Box::new(HostAllocator)))
}

#[test]
fn test_from_slice_to_vec() {
    let buffer = Buffer::from_slice(allocator(), &[3i32, -1, 4]).unwrap();
    assert_eq!(buffer.dtype(), ScalarDType::Int32);
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.size(), 12);
    assert_eq!(buffer.to_vec::<i32>().unwrap(), vec![3, -1, 4]);
}

#[test]
fn test_allocate_is_zeroed() {
    let buffer = Buffer::allocate(allocator(), ScalarDType::Float64, 5).unwrap();
    assert_eq!(buffer.to_vec::<f64>().unwrap(), vec![0.0; 5]);
}

#[test]
fn test_to_vec_wrong_dtype() {
    let buffer = Buffer::from_slice(allocator(), &[1.0f32, 2.0]).unwrap();
    let err = buffer.to_vec::<u32>().unwrap_err();
    assert!(matches!(err, Error::DTypeMismatch { expected: ScalarDType::UInt32, actual: ScalarDType::Float32 }));
}

#[test]
fn test_copyin_size_mismatch() {
    let buffer = Buffer::allocate(allocator(), ScalarDType::UInt16, 4).unwrap();
    let err = buffer.copyin(&[0u8; 7]).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { expected: 8, actual: 7 }));
}

#[test]
fn test_clones_share_allocation() {
    let a = Buffer::from_slice(allocator(), &[1u8, 2, 3]).unwrap();
    let b = a.clone();
    assert!(a.same_allocation(&b));

    b.copyin(&[9, 8, 7]).unwrap();
    assert_eq!(a.to_vec::<u8>().unwrap(), vec![9, 8, 7]);

    let c = Buffer::from_slice(allocator(), &[9u8, 8, 7]).unwrap();
    assert!(!a.same_allocation(&c));
}

#[test]
fn test_host_access() {
    let buffer = Buffer::from_slice(allocator(), &[1u32, 2]).unwrap();
    let sum: u32 = buffer.with_host(|bytes| bytes.iter().map(|&b| b as u32).sum()).unwrap();
    assert_eq!(sum, 3);

    buffer.with_host_mut(|bytes| bytes[0] = 5).unwrap();
    assert_eq!(buffer.to_vec::<u32>().unwrap(), vec![5, 2]);
}

#[test]
fn test_nested_mutable_access_is_an_error() {
    let buffer = Buffer::from_slice(allocator(), &[1u8]).unwrap();
    let inner = buffer.with_host(|_| buffer.copyin(&[2])).unwrap();
    assert!(matches!(inner, Err(Error::Runtime { .. })));
}

#[test]
fn test_drop_returns_memory_to_allocator() {
    let lru = Arc::new(LruAllocator::new(Box::new(HostAllocator)));
    let buffer = Buffer::from_slice(lru.clone(), &[0f32; 16]).unwrap();
    let clone = buffer.clone();
    drop(buffer);
    assert_eq!(lru.cached(), 0);
    drop(clone);
    assert_eq!(lru.cached(), 1);
}

#[test]
fn test_empty_buffer() {
    let buffer = Buffer::from_slice::<f32>(allocator(), &[]).unwrap();
    assert!(buffer.is_empty());
    assert_eq!(buffer.to_vec::<f32>().unwrap(), Vec::<f32>::new());
}
