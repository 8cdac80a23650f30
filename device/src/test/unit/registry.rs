use test_case::test_case;

use crate::{DeviceRegistry, DeviceSpec, DeviceSpecExt, Error};

#[test_case("HOST", DeviceSpec::Host ; "host")]
#[test_case("cpu", DeviceSpec::Host ; "cpu alias")]
#[test_case("CUDA:0", DeviceSpec::Cuda { device_id: 0 } ; "cuda ordinal")]
#[test_case("cuda", DeviceSpec::Cuda { device_id: 0 } ; "cuda default ordinal")]
#[test_case("GPU:2", DeviceSpec::Cuda { device_id: 2 } ; "gpu alias")]
#[test_case("opencl:1", DeviceSpec::OpenCl { device_id: 1 } ; "opencl")]
#[test_case("Metal", DeviceSpec::Metal { device_id: 0 } ; "metal")]
fn test_parse(input: &str, expected: DeviceSpec) {
    assert_eq!(<DeviceSpec as DeviceSpecExt>::parse(input).unwrap(), expected);
}

#[test_case("TPU" ; "unknown kind")]
#[test_case("CUDA:x" ; "bad ordinal")]
#[test_case("HOST:1" ; "host with ordinal")]
fn test_parse_invalid(input: &str) {
    let err = <DeviceSpec as DeviceSpecExt>::parse(input).unwrap_err();
    assert!(matches!(err, Error::InvalidDevice { .. }));
}

#[test]
fn test_parse_roundtrips_canonical_form() {
    for spec in [DeviceSpec::Host, DeviceSpec::Cuda { device_id: 3 }, DeviceSpec::OpenCl { device_id: 0 }] {
        assert_eq!(<DeviceSpec as DeviceSpecExt>::parse(&spec.canonicalize()).unwrap(), spec);
    }
}

#[test]
fn test_registry_host() {
    let allocator = crate::host().unwrap();
    assert_eq!(allocator.name(), "HOST");
    assert_eq!(allocator.device(), DeviceSpec::Host);
}

#[test]
fn test_registry_caches_allocator() {
    let registry = DeviceRegistry::default();
    let a = registry.get(&DeviceSpec::Host).unwrap();
    let b = registry.get_device("host").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

#[test]
fn test_registry_rejects_unbacked_device() {
    let registry = DeviceRegistry::default();
    let err = registry.get(&DeviceSpec::Metal { device_id: 0 }).unwrap_err();
    assert!(matches!(err, Error::UnsupportedDevice { .. }));
}
