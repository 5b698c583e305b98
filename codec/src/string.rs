//! Inline fixed-capacity UTF-8 strings.

use std::fmt;

use bitstream::{BufferReader, BufferWriter};
use schema::ValueKind;

use crate::context::DecodeContext;
use crate::error::{CodecError, CodecResult};
use crate::value::NetworkValue;

/// A UTF-8 string stored inline with a byte capacity of `N`.
///
/// Bytes past `len` are always zero, so derived equality and hashing only
/// see the string contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedString<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> FixedString<N> {
    /// Creates a string, failing if `value` needs more than `N` bytes.
    pub fn new(value: &str) -> CodecResult<Self> {
        Self::from_bytes(value.as_bytes())
    }

    fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        if data.len() > N {
            return Err(CodecError::StringTooLong {
                len: data.len(),
                capacity: N,
            });
        }
        std::str::from_utf8(data).map_err(|_| CodecError::InvalidUtf8)?;
        let mut bytes = [0u8; N];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self {
            bytes,
            len: data.len(),
        })
    }

    /// Returns the string contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Contents are validated on construction.
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    /// Returns the length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for the empty string.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the byte capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = CodecError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const N: usize> NetworkValue for FixedString<N> {
    fn kind() -> ValueKind {
        ValueKind::FixedString {
            capacity: u16::try_from(N).unwrap_or(u16::MAX),
        }
    }

    fn write(&self, writer: &mut BufferWriter) -> CodecResult<()> {
        writer.write_len(self.len)?;
        writer.write_bytes(&self.bytes[..self.len])?;
        Ok(())
    }

    fn read(reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Self> {
        let len = reader.read_len()?;
        ctx.check_string_len(len)?;
        if len > N {
            return Err(CodecError::StringTooLong { len, capacity: N });
        }
        Self::from_bytes(reader.read_bytes(len)?)
    }
}
