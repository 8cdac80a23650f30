
use std::sync::Arc;

use reductor_codegen::TuningParams;
use reductor_device::{Buffer, Device};
use reductor_dtype::{DeviceSpec, HasDType};

use crate::DEVICE_FACTORIES;

pub(crate) fn host() -> Arc<Device> {
    DEVICE_FACTORIES.device(&DeviceSpec::Host, reductor_device::registry()).unwrap()
}

pub(crate) fn params(vector_width: usize, group_size: usize, group_count: usize) -> TuningParams {
    TuningParams::builder().vector_width(vector_width).group_size(group_size).group_count(group_count).build()
}

pub(crate) fn upload<T: HasDType>(device: &Device, values: &[T]) -> Buffer {
    Buffer::from_slice(device.allocator.clone(), values).unwrap()
}

pub(crate) fn output<T: HasDType>(device: &Device) -> Buffer {
    Buffer::allocate(device.allocator.clone(), T::DTYPE, 1).unwrap()
}
