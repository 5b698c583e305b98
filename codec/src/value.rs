//! The `NetworkValue` trait and its scalar implementations.

use bitstream::{BufferReader, BufferWriter};
use schema::ValueKind;

use crate::context::DecodeContext;
use crate::error::{CodecError, CodecResult};

/// A type that can be replicated: full and delta encodings plus the equality
/// and copy semantics the dirty tracker relies on.
///
/// Scalars only need `write`/`read`; the delta methods default to a full
/// write. Containers override the delta methods and decode in place.
pub trait NetworkValue: Clone + PartialEq + 'static {
    /// Returns the encoding shape, used for layout hashing.
    fn kind() -> ValueKind;

    /// Writes the full value.
    fn write(&self, writer: &mut BufferWriter) -> CodecResult<()>;

    /// Reads a full value.
    fn read(reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Self>;

    /// Reads a full value into existing storage.
    fn read_in_place(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        *self = Self::read(reader, ctx)?;
        Ok(())
    }

    /// Writes only what changed since `previous`.
    fn write_delta(&self, previous: &Self, writer: &mut BufferWriter) -> CodecResult<()> {
        let _ = previous;
        self.write(writer)
    }

    /// Applies a delta produced by [`NetworkValue::write_delta`].
    fn read_delta(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        self.read_in_place(reader, ctx)
    }

    /// Replication equality. Floats compare bit patterns.
    fn are_equal(&self, other: &Self) -> bool {
        self == other
    }

    /// Returns a storage-independent copy.
    fn duplicate(&self) -> Self {
        self.clone()
    }
}

macro_rules! impl_network_int {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl NetworkValue for $ty {
                fn kind() -> ValueKind {
                    $kind
                }

                fn write(&self, writer: &mut BufferWriter) -> CodecResult<()> {
                    writer.write_value(*self)?;
                    Ok(())
                }

                fn read(reader: &mut BufferReader<'_>, _ctx: &mut DecodeContext) -> CodecResult<Self> {
                    Ok(reader.read_value()?)
                }
            }
        )*
    };
}

impl_network_int!(
    u8 => ValueKind::uint(8),
    u16 => ValueKind::uint(16),
    u32 => ValueKind::uint(32),
    u64 => ValueKind::uint(64),
    u128 => ValueKind::uint(128),
    i8 => ValueKind::sint(8),
    i16 => ValueKind::sint(16),
    i32 => ValueKind::sint(32),
    i64 => ValueKind::sint(64),
    i128 => ValueKind::sint(128),
    bool => ValueKind::Bool,
);

macro_rules! impl_network_float {
    ($($ty:ty => $bits:expr),* $(,)?) => {
        $(
            impl NetworkValue for $ty {
                fn kind() -> ValueKind {
                    ValueKind::Float { bits: $bits }
                }

                fn write(&self, writer: &mut BufferWriter) -> CodecResult<()> {
                    writer.write_value(*self)?;
                    Ok(())
                }

                fn read(reader: &mut BufferReader<'_>, _ctx: &mut DecodeContext) -> CodecResult<Self> {
                    Ok(reader.read_value()?)
                }

                fn are_equal(&self, other: &Self) -> bool {
                    self.to_bits() == other.to_bits()
                }
            }
        )*
    };
}

impl_network_float!(f32 => 32, f64 => 64);

const ABSENT: u8 = 0;
const PRESENT: u8 = 1;

impl<T: NetworkValue> NetworkValue for Option<T> {
    fn kind() -> ValueKind {
        ValueKind::Option(Box::new(T::kind()))
    }

    fn write(&self, writer: &mut BufferWriter) -> CodecResult<()> {
        match self {
            None => writer.write_byte(ABSENT)?,
            Some(value) => {
                writer.write_byte(PRESENT)?;
                value.write(writer)?;
            }
        }
        Ok(())
    }

    fn read(reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Self> {
        match reader.read_byte()? {
            ABSENT => Ok(None),
            PRESENT => Ok(Some(T::read(reader, ctx)?)),
            value => Err(CodecError::InvalidPresence { value }),
        }
    }

    fn read_in_place(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        match reader.read_byte()? {
            ABSENT => *self = None,
            PRESENT => match self {
                Some(inner) => inner.read_in_place(reader, ctx)?,
                None => *self = Some(T::read(reader, ctx)?),
            },
            value => return Err(CodecError::InvalidPresence { value }),
        }
        Ok(())
    }

    fn are_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.are_equal(b),
            _ => false,
        }
    }

    fn duplicate(&self) -> Self {
        self.as_ref().map(T::duplicate)
    }
}

/// Writes the output of `encode` preceded by its byte length, so a receiver
/// can skip the payload without decoding it.
pub(crate) fn write_prefixed(
    writer: &mut BufferWriter,
    encode: impl FnOnce(&mut BufferWriter) -> CodecResult<()>,
) -> CodecResult<()> {
    let mut scratch = BufferWriter::with_max_capacity(32, writer.max_capacity());
    encode(&mut scratch)?;
    writer.write_len(scratch.len())?;
    writer.write_bytes(scratch.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: NetworkValue + std::fmt::Debug>(value: &T) -> T {
        let mut writer = BufferWriter::new(64);
        value.write(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = BufferReader::new(&bytes);
        let decoded = T::read(&mut reader, &mut DecodeContext::default()).unwrap();
        assert!(reader.is_at_end());
        decoded
    }

    #[test]
    fn integer_boundaries_roundtrip() {
        assert_eq!(roundtrip(&u8::MAX), u8::MAX);
        assert_eq!(roundtrip(&i16::MIN), i16::MIN);
        assert_eq!(roundtrip(&u32::MAX), u32::MAX);
        assert_eq!(roundtrip(&i64::MIN), i64::MIN);
        assert_eq!(roundtrip(&u128::MAX), u128::MAX);
        assert_eq!(roundtrip(&i128::MIN), i128::MIN);
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert!(f32::NAN.are_equal(&f32::NAN));
        assert!(!0.0f64.are_equal(&-0.0f64));
        assert_eq!(roundtrip(&f64::MAX).to_bits(), f64::MAX.to_bits());
    }

    #[test]
    fn option_roundtrip_and_presence() {
        assert_eq!(roundtrip(&Some(7u16)), Some(7));
        assert_eq!(roundtrip(&None::<u16>), None);

        let bytes = [2u8];
        let mut reader = BufferReader::new(&bytes);
        let err = Option::<u8>::read(&mut reader, &mut DecodeContext::default()).unwrap_err();
        assert_eq!(err, CodecError::InvalidPresence { value: 2 });
    }

    #[test]
    fn option_read_in_place_reuses_inner() {
        let mut value = Some(vec![1u8, 2, 3]);
        let mut writer = BufferWriter::new(64);
        Some(vec![9u8]).write(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = BufferReader::new(&bytes);
        value
            .read_in_place(&mut reader, &mut DecodeContext::default())
            .unwrap();
        assert_eq!(value, Some(vec![9]));
    }

    #[test]
    fn scalar_delta_is_full_value() {
        let mut writer = BufferWriter::new(8);
        5u32.write_delta(&4, &mut writer).unwrap();
        assert_eq!(writer.as_slice(), &[5, 0, 0, 0]);
    }

    #[test]
    fn prefixed_payload_can_be_skipped() {
        let mut writer = BufferWriter::new(32);
        write_prefixed(&mut writer, |w| 0xDEAD_BEEFu32.write(w)).unwrap();
        writer.write_byte(0x42).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = BufferReader::new(&bytes);
        let skipped = crate::context::read_prefixed(&mut reader).unwrap();
        assert_eq!(skipped.len(), 4);
        assert_eq!(reader.read_byte().unwrap(), 0x42);
    }

    #[test]
    fn kinds() {
        assert_eq!(u16::kind(), ValueKind::uint(16));
        assert_eq!(bool::kind(), ValueKind::Bool);
        assert_eq!(
            Option::<f32>::kind(),
            ValueKind::Option(Box::new(ValueKind::Float { bits: 32 }))
        );
    }
}
