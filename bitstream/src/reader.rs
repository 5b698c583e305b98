//! Bounds-checked byte reader with a scoped bit-unpacking mode.

use crate::blittable::Blittable;
use crate::error::{BitError, BitResult};

/// A byte-aligned reader over a borrowed buffer.
///
/// Every read validates the remaining length first; decoding malformed input
/// returns an error and never panics.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BufferReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Returns the cursor position in bytes.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the total buffer length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying buffer is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Returns `true` if every byte has been consumed.
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Validates that `count` bytes can be read at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::EndOfBuffer`] if fewer bytes remain.
    pub const fn try_begin_read(&self, count: usize) -> BitResult<()> {
        let available = self.remaining();
        if count > available {
            return Err(BitError::EndOfBuffer {
                requested: count,
                available,
            });
        }
        Ok(())
    }

    /// Moves the cursor to an absolute position.
    pub fn seek(&mut self, position: usize) -> BitResult<()> {
        if position > self.data.len() {
            return Err(BitError::SeekOutOfRange {
                position,
                len: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Advances the cursor by `count` bytes.
    pub fn skip(&mut self, count: usize) -> BitResult<()> {
        self.try_begin_read(count)?;
        self.position += count;
        Ok(())
    }

    /// Reads a single byte.
    pub fn read_byte(&mut self) -> BitResult<u8> {
        self.try_begin_read(1)?;
        let byte = self.data[self.position];
        self.position += 1;
        Ok(byte)
    }

    /// Reads `count` bytes as a borrowed slice.
    pub fn read_bytes(&mut self, count: usize) -> BitResult<&'a [u8]> {
        self.try_begin_read(count)?;
        let data = self.data;
        let slice = &data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    /// Reads a blittable value in little-endian order.
    pub fn read_value<T: Blittable>(&mut self) -> BitResult<T> {
        let bytes = self.read_bytes(T::SIZE)?;
        T::decode_le(bytes)
    }

    /// Reads an unsigned LEB128 varint (max 5 bytes).
    pub fn read_varu32(&mut self) -> BitResult<u32> {
        let value = self.read_varint(5)?;
        u32::try_from(value).map_err(|_| BitError::InvalidVarint { max_bytes: 5 })
    }

    /// Reads a zigzag-encoded signed varint.
    pub fn read_vars32(&mut self) -> BitResult<i32> {
        let raw = self.read_varu32()?;
        Ok(((raw >> 1) as i32) ^ (-((raw & 1) as i32)))
    }

    /// Reads an unsigned LEB128 varint (max 10 bytes).
    pub fn read_varu64(&mut self) -> BitResult<u64> {
        self.read_varint(10)
    }

    /// Reads a zigzag-encoded signed 64-bit varint.
    pub fn read_vars64(&mut self) -> BitResult<i64> {
        let raw = self.read_varu64()?;
        Ok(((raw >> 1) as i64) ^ (-((raw & 1) as i64)))
    }

    /// Reads a collection length or count written by `write_len`.
    pub fn read_len(&mut self) -> BitResult<usize> {
        let value = self.read_varu64()?;
        usize::try_from(value).map_err(|_| BitError::LengthOverflow { value })
    }

    /// Enters bit-unpacking mode.
    ///
    /// Bytes are consumed as soon as their first bit is read, so dropping the
    /// guard leaves the cursor on the next byte boundary.
    pub fn enter_bitwise(&mut self) -> BitReader<'_, 'a> {
        BitReader {
            reader: self,
            current_byte: 0,
            bits_left: 0,
        }
    }

    fn read_varint(&mut self, max_bytes: usize) -> BitResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for _ in 0..max_bytes {
            let byte = self.read_byte()?;
            // The tenth byte holds only bit 63.
            if shift == 63 && byte > 1 {
                return Err(BitError::InvalidVarint { max_bytes });
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(BitError::InvalidVarint { max_bytes })
    }
}

/// Scoped bit-unpacking context over a [`BufferReader`].
#[derive(Debug)]
pub struct BitReader<'r, 'a> {
    reader: &'r mut BufferReader<'a>,
    current_byte: u8,
    /// Unread bits remaining in `current_byte` (0-8).
    bits_left: u8,
}

impl BitReader<'_, '_> {
    /// Reads a single bit.
    pub fn read_bit(&mut self) -> BitResult<bool> {
        if self.bits_left == 0 {
            self.current_byte = self.reader.read_byte()?;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok((self.current_byte >> self.bits_left) & 1 == 1)
    }

    /// Reads up to 64 bits as an unsigned integer (MSB-first).
    pub fn read_bits(&mut self, bits: u8) -> BitResult<u64> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }
}
