//! Fixed-size values copied to and from the buffer as little-endian bytes.

use crate::error::{BitError, BitResult};

/// A value with a fixed little-endian byte representation.
pub trait Blittable: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Byte array produced by [`Blittable::encode_le`].
    type Bytes: AsRef<[u8]>;

    /// Returns the little-endian encoding of the value.
    fn encode_le(self) -> Self::Bytes;

    /// Decodes a value from exactly [`Blittable::SIZE`] bytes.
    fn decode_le(bytes: &[u8]) -> BitResult<Self>;
}

macro_rules! impl_blittable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Blittable for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn encode_le(self) -> Self::Bytes {
                    self.to_le_bytes()
                }

                fn decode_le(bytes: &[u8]) -> BitResult<Self> {
                    let array = bytes.try_into().map_err(|_| BitError::EndOfBuffer {
                        requested: Self::SIZE,
                        available: bytes.len(),
                    })?;
                    Ok(<$ty>::from_le_bytes(array))
                }
            }
        )*
    };
}

impl_blittable!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl Blittable for bool {
    const SIZE: usize = 1;
    type Bytes = [u8; 1];

    fn encode_le(self) -> Self::Bytes {
        [u8::from(self)]
    }

    fn decode_le(bytes: &[u8]) -> BitResult<Self> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            [value] => Err(BitError::InvalidBool { value: *value }),
            _ => Err(BitError::EndOfBuffer {
                requested: 1,
                available: bytes.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        assert_eq!(0x1234u16.encode_le(), [0x34, 0x12]);
        assert_eq!(u32::decode_le(&[1, 0, 0, 0]).unwrap(), 1);
    }

    #[test]
    fn short_slice_is_end_of_buffer() {
        let err = u64::decode_le(&[0; 3]).unwrap_err();
        assert_eq!(
            err,
            BitError::EndOfBuffer {
                requested: 8,
                available: 3
            }
        );
    }

    #[test]
    fn bool_rejects_other_bytes() {
        assert!(bool::decode_le(&[1]).unwrap());
        assert!(!bool::decode_le(&[0]).unwrap());
        assert_eq!(
            bool::decode_le(&[2]).unwrap_err(),
            BitError::InvalidBool { value: 2 }
        );
    }

    #[test]
    fn floats_keep_bit_pattern() {
        let nan = f32::from_bits(0x7fc0_0001);
        let decoded = f32::decode_le(&nan.encode_le()).unwrap();
        assert_eq!(decoded.to_bits(), nan.to_bits());
    }
}
