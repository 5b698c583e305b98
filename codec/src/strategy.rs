//! Codec handles used by replicated variables.
//!
//! A variable holds one [`ValueCodec`] for its value type. Built-in types use
//! [`DefaultCodec`]; types without a [`NetworkValue`] implementation use a
//! [`UserCodec`] assembled from function pointers.

use std::any::type_name;
use std::fmt;

use bitstream::{BufferReader, BufferWriter};
use schema::ValueKind;

use crate::context::DecodeContext;
use crate::error::{CodecError, CodecResult};
use crate::value::NetworkValue;

/// Per-type encoding strategy.
pub trait ValueCodec<T> {
    fn kind(&self) -> ValueKind;
    fn write(&self, value: &T, writer: &mut BufferWriter) -> CodecResult<()>;
    fn read(&self, reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<T>;
    fn read_in_place(
        &self,
        value: &mut T,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()>;
    fn write_delta(&self, value: &T, previous: &T, writer: &mut BufferWriter) -> CodecResult<()>;
    fn read_delta(
        &self,
        value: &mut T,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()>;
    fn are_equal(&self, a: &T, b: &T) -> bool;
    fn duplicate(&self, value: &T) -> T;
}

/// Dispatches to the type's own [`NetworkValue`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec;

impl<T: NetworkValue> ValueCodec<T> for DefaultCodec {
    fn kind(&self) -> ValueKind {
        T::kind()
    }

    fn write(&self, value: &T, writer: &mut BufferWriter) -> CodecResult<()> {
        value.write(writer)
    }

    fn read(&self, reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<T> {
        T::read(reader, ctx)
    }

    fn read_in_place(
        &self,
        value: &mut T,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        value.read_in_place(reader, ctx)
    }

    fn write_delta(&self, value: &T, previous: &T, writer: &mut BufferWriter) -> CodecResult<()> {
        value.write_delta(previous, writer)
    }

    fn read_delta(
        &self,
        value: &mut T,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        value.read_delta(reader, ctx)
    }

    fn are_equal(&self, a: &T, b: &T) -> bool {
        a.are_equal(b)
    }

    fn duplicate(&self, value: &T) -> T {
        value.duplicate()
    }
}

/// Application-supplied write function.
pub type WriteFn<T> = fn(&T, &mut BufferWriter) -> CodecResult<()>;

/// Application-supplied read function.
pub type ReadFn<T> = fn(&mut BufferReader<'_>) -> CodecResult<T>;

/// Application-supplied delta write function.
pub type WriteDeltaFn<T> = fn(&T, &T, &mut BufferWriter) -> CodecResult<()>;

/// Application-supplied delta read function.
pub type ReadDeltaFn<T> = fn(&mut T, &mut BufferReader<'_>) -> CodecResult<()>;

/// A codec built from function pointers.
///
/// Created with [`UserCodec::unregistered`], every read and write fails with
/// [`CodecError::UnsupportedType`]. Delta functions are optional and default
/// to full encodings.
pub struct UserCodec<T> {
    write: Option<WriteFn<T>>,
    read: Option<ReadFn<T>>,
    write_delta: Option<WriteDeltaFn<T>>,
    read_delta: Option<ReadDeltaFn<T>>,
}

impl<T> UserCodec<T> {
    /// Creates a codec with no functions registered.
    #[must_use]
    pub const fn unregistered() -> Self {
        Self {
            write: None,
            read: None,
            write_delta: None,
            read_delta: None,
        }
    }

    /// Creates a codec from full write and read functions.
    #[must_use]
    pub const fn new(write: WriteFn<T>, read: ReadFn<T>) -> Self {
        Self {
            write: Some(write),
            read: Some(read),
            write_delta: None,
            read_delta: None,
        }
    }

    /// Registers delta functions.
    #[must_use]
    pub const fn with_delta(mut self, write: WriteDeltaFn<T>, read: ReadDeltaFn<T>) -> Self {
        self.write_delta = Some(write);
        self.read_delta = Some(read);
        self
    }

    /// Returns `true` if full write and read functions are registered.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.write.is_some() && self.read.is_some()
    }

    fn unsupported() -> CodecError {
        CodecError::UnsupportedType {
            type_name: type_name::<T>(),
        }
    }
}

impl<T> Clone for UserCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UserCodec<T> {}

impl<T> fmt::Debug for UserCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCodec")
            .field("type", &type_name::<T>())
            .field("registered", &self.is_registered())
            .field("delta", &self.write_delta.is_some())
            .finish()
    }
}

impl<T: Clone + PartialEq> ValueCodec<T> for UserCodec<T> {
    fn kind(&self) -> ValueKind {
        ValueKind::Custom {
            name: type_name::<T>().to_owned(),
        }
    }

    fn write(&self, value: &T, writer: &mut BufferWriter) -> CodecResult<()> {
        let write = self.write.ok_or_else(Self::unsupported)?;
        write(value, writer)
    }

    fn read(&self, reader: &mut BufferReader<'_>, _ctx: &mut DecodeContext) -> CodecResult<T> {
        let read = self.read.ok_or_else(Self::unsupported)?;
        read(reader)
    }

    fn read_in_place(
        &self,
        value: &mut T,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        *value = self.read(reader, ctx)?;
        Ok(())
    }

    fn write_delta(&self, value: &T, previous: &T, writer: &mut BufferWriter) -> CodecResult<()> {
        match self.write_delta {
            Some(write_delta) => write_delta(value, previous, writer),
            None => self.write(value, writer),
        }
    }

    fn read_delta(
        &self,
        value: &mut T,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        match self.read_delta {
            Some(read_delta) => read_delta(value, reader),
            None => self.read_in_place(value, reader, ctx),
        }
    }

    fn are_equal(&self, a: &T, b: &T) -> bool {
        a == b
    }

    fn duplicate(&self, value: &T) -> T {
        value.clone()
    }
}

/// A registered codec for `String`: varint byte length + UTF-8 bytes.
#[must_use]
pub fn utf8_string_codec() -> UserCodec<String> {
    #[allow(clippy::ptr_arg)]
    fn write(value: &String, writer: &mut BufferWriter) -> CodecResult<()> {
        writer.write_len(value.len())?;
        writer.write_bytes(value.as_bytes())?;
        Ok(())
    }

    fn read(reader: &mut BufferReader<'_>) -> CodecResult<String> {
        let len = reader.read_len()?;
        let bytes = reader.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    UserCodec::new(write, read)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codec_dispatches() {
        let codec = DefaultCodec;
        let mut writer = BufferWriter::new(16);
        codec.write(&0x0102u16, &mut writer).unwrap();
        let bytes = writer.into_bytes();
        let value: u16 = codec
            .read(&mut BufferReader::new(&bytes), &mut DecodeContext::default())
            .unwrap();
        assert_eq!(value, 0x0102);
        assert_eq!(ValueCodec::<u16>::kind(&codec), ValueKind::uint(16));
    }

    #[test]
    fn unregistered_codec_fails_on_write_and_read() {
        let codec = UserCodec::<String>::unregistered();
        let mut writer = BufferWriter::new(16);
        let err = codec.write(&"hello".to_owned(), &mut writer).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { type_name } if type_name.contains("String")));
        assert!(writer.is_empty());

        let bytes = [5u8, b'h', b'e', b'l', b'l', b'o'];
        let err = codec
            .read(&mut BufferReader::new(&bytes), &mut DecodeContext::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { .. }));
    }

    #[test]
    fn registered_string_codec_roundtrip() {
        let codec = utf8_string_codec();
        assert!(codec.is_registered());
        let mut writer = BufferWriter::new(32);
        codec.write(&"héllo".to_owned(), &mut writer).unwrap();
        codec
            .write_delta(&"bye".to_owned(), &"héllo".to_owned(), &mut writer)
            .unwrap();
        let bytes = writer.into_bytes();

        let mut reader = BufferReader::new(&bytes);
        let mut ctx = DecodeContext::default();
        let mut value = codec.read(&mut reader, &mut ctx).unwrap();
        assert_eq!(value, "héllo");
        codec.read_delta(&mut value, &mut reader, &mut ctx).unwrap();
        assert_eq!(value, "bye");
    }

    #[test]
    fn custom_delta_functions_are_used() {
        fn write(value: &u32, writer: &mut BufferWriter) -> CodecResult<()> {
            writer.write_value(*value)?;
            Ok(())
        }
        fn read(reader: &mut BufferReader<'_>) -> CodecResult<u32> {
            Ok(reader.read_value()?)
        }
        fn write_delta(value: &u32, previous: &u32, writer: &mut BufferWriter) -> CodecResult<()> {
            writer.write_vars64(i64::from(*value) - i64::from(*previous))?;
            Ok(())
        }
        fn read_delta(value: &mut u32, reader: &mut BufferReader<'_>) -> CodecResult<()> {
            let diff = reader.read_vars64()?;
            *value = u32::try_from(i64::from(*value) + diff).unwrap_or(0);
            Ok(())
        }

        let codec = UserCodec::new(write, read).with_delta(write_delta, read_delta);
        let mut writer = BufferWriter::new(16);
        codec.write_delta(&1003, &1000, &mut writer).unwrap();
        assert_eq!(writer.len(), 1);

        let bytes = writer.into_bytes();
        let mut value = 1000u32;
        codec
            .read_delta(
                &mut value,
                &mut BufferReader::new(&bytes),
                &mut DecodeContext::default(),
            )
            .unwrap();
        assert_eq!(value, 1003);
    }
}
