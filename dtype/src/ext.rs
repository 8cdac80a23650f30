use super::*;

/// Host element type with a fixed device representation.
///
/// Used to move host slices in and out of device buffers. Values are stored
/// little-endian, matching every supported device.
pub trait HasDType: Copy + Sized {
    const DTYPE: ScalarDType;

    fn write_le(self, out: &mut Vec<u8>);

    /// Decode one element. `bytes` must hold exactly `DTYPE.bytes()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_dtype_ext {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(impl HasDType for $ty {
            const DTYPE: ScalarDType = $dtype;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        })*
    };
}

impl_dtype_ext! {
    i8 => ScalarDType::Int8, i16 => ScalarDType::Int16, i32 => ScalarDType::Int32, i64 => ScalarDType::Int64,
    u8 => ScalarDType::UInt8, u16 => ScalarDType::UInt16, u32 => ScalarDType::UInt32, u64 => ScalarDType::UInt64,
    f32 => ScalarDType::Float32, f64 => ScalarDType::Float64,
}

/// Encode a host slice into device bytes.
pub fn to_bytes<T: HasDType>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DTYPE.bytes());
    for value in values {
        value.write_le(&mut out);
    }
    out
}

/// Decode device bytes into host values. Trailing bytes that do not form a whole element are ignored.
pub fn from_bytes<T: HasDType>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::DTYPE.bytes()).map(T::read_le).collect()
}
