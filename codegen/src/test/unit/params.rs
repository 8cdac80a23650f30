use test_case::test_case;

use crate::{Error, Reduce1d, TuningParams};

#[test]
fn test_builder_defaults() {
    let params = TuningParams::builder().build();
    assert_eq!(params, TuningParams::default());
    assert_eq!(params, TuningParams { vector_width: 1, group_size: 256, group_count: 64 });
}

#[test]
fn test_builder_overrides() {
    let params = TuningParams::builder().vector_width(4).group_size(128).group_count(8).build();
    assert_eq!(params.partial_threads(), 1024);
    assert!(params.validate().is_ok());
}

#[test_case(1, 6, 2 ; "group_size_not_power_of_two")]
#[test_case(1, 0, 2 ; "group_size_zero")]
#[test_case(1, 4, 0 ; "group_count_zero")]
#[test_case(0, 4, 2 ; "vector_width_zero")]
fn test_invalid_params_rejected(vector_width: usize, group_size: usize, group_count: usize) {
    let params = TuningParams { vector_width, group_size, group_count };
    assert!(matches!(params.validate(), Err(Error::InvalidConfig { .. })));
    assert!(matches!(Reduce1d::new(params), Err(Error::InvalidConfig { .. })));
}

#[test_case(1 ; "single_lane")]
#[test_case(2 ; "two")]
#[test_case(1024 ; "large")]
fn test_power_of_two_group_sizes_accepted(group_size: usize) {
    let params = TuningParams::builder().group_size(group_size).build();
    assert!(params.validate().is_ok());
}

#[test]
fn test_default_max_extent() {
    assert_eq!(TuningParams::default().max_extent(), u32::MAX as usize - 16383);
    assert!(TuningParams::default().max_extent() < u32::MAX as usize);
}

#[test_case(1, 1 ; "single_thread")]
#[test_case(4, 2 ; "small")]
#[test_case(256, 64 ; "default_geometry")]
#[test_case(1024, 1024 ; "wide")]
fn test_max_extent_keeps_scan_counters_in_range(group_size: usize, group_count: usize) {
    let params = TuningParams::builder().group_size(group_size).group_count(group_count).build();
    let (threads, max) = (params.partial_threads() as u64, params.max_extent() as u64);

    // The thread owning the last element steps past it without leaving 32 bits.
    assert!(max - 1 + threads <= u64::from(u32::MAX));
    // One element more and that step wraps below N.
    assert!(max + threads > u64::from(u32::MAX));
}
