//! Capacity-bounded byte writer with a scoped bit-packing mode.

use crate::blittable::Blittable;
use crate::error::{BitError, BitResult};
use crate::limits::BufferConfig;

/// A byte-aligned writer with a logical capacity.
///
/// The writer is either fixed-size or elastic up to an explicit maximum.
/// Writes past the maximum fail with [`BitError::BufferOverflow`] and leave
/// the buffer untouched.
#[derive(Debug, Clone)]
pub struct BufferWriter {
    /// Written bytes up to the high-water mark.
    bytes: Vec<u8>,
    /// Cursor for the next write.
    position: usize,
    capacity: usize,
    max_capacity: usize,
}

impl BufferWriter {
    /// Creates a fixed-size writer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_max_capacity(capacity, capacity)
    }

    /// Creates a writer that grows from `capacity` up to `max_capacity`.
    #[must_use]
    pub fn with_max_capacity(capacity: usize, max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(capacity);
        Self {
            bytes: Vec::with_capacity(capacity.min(64 * 1024)),
            position: 0,
            capacity,
            max_capacity,
        }
    }

    /// Creates a writer from a [`BufferConfig`].
    #[must_use]
    pub fn from_config(config: &BufferConfig) -> Self {
        Self::with_max_capacity(config.initial_capacity, config.max_capacity)
    }

    /// Returns the cursor position in bytes.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes written (high-water mark).
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the current capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the maximum capacity in bytes.
    #[must_use]
    pub const fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Returns the written bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the writer and returns the written bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Discards all written data and rewinds the cursor.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.position = 0;
    }

    /// Ensures `count` bytes can be written at the cursor, growing if elastic.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::BufferOverflow`] if the write would pass the
    /// maximum capacity.
    pub fn try_begin_write(&mut self, count: usize) -> BitResult<()> {
        let needed = self
            .position
            .checked_add(count)
            .ok_or(BitError::BufferOverflow {
                needed: usize::MAX,
                capacity: self.max_capacity,
            })?;
        if needed <= self.capacity {
            return Ok(());
        }
        if needed > self.max_capacity {
            return Err(BitError::BufferOverflow {
                needed,
                capacity: self.max_capacity,
            });
        }
        let doubled = self.capacity.saturating_mul(2).max(needed);
        self.capacity = doubled.min(self.max_capacity);
        Ok(())
    }

    /// Moves the cursor, clamped to the current capacity.
    ///
    /// Seeking past the written length extends it with zeros so that a
    /// later backward seek never loses data.
    pub fn seek(&mut self, position: usize) {
        let position = position.min(self.capacity);
        if position > self.bytes.len() {
            self.bytes.resize(position, 0);
        }
        self.position = position;
    }

    /// Drops everything written past `len` and clamps the cursor.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
        self.position = self.position.min(self.bytes.len());
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, value: u8) -> BitResult<()> {
        self.try_begin_write(1)?;
        self.put(&[value]);
        Ok(())
    }

    /// Writes a byte slice verbatim.
    pub fn write_bytes(&mut self, data: &[u8]) -> BitResult<()> {
        self.try_begin_write(data.len())?;
        self.put(data);
        Ok(())
    }

    /// Writes a blittable value in little-endian order.
    pub fn write_value<T: Blittable>(&mut self, value: T) -> BitResult<()> {
        self.try_begin_write(T::SIZE)?;
        self.put(value.encode_le().as_ref());
        Ok(())
    }

    /// Writes an unsigned LEB128 varint (max 5 bytes).
    pub fn write_varu32(&mut self, value: u32) -> BitResult<()> {
        self.write_varu64(u64::from(value))
    }

    /// Writes a zigzag-encoded signed varint.
    pub fn write_vars32(&mut self, value: i32) -> BitResult<()> {
        let zigzag = ((value << 1) ^ (value >> 31)) as u32;
        self.write_varu32(zigzag)
    }

    /// Writes an unsigned LEB128 varint (max 10 bytes).
    pub fn write_varu64(&mut self, mut value: u64) -> BitResult<()> {
        let mut scratch = [0u8; 10];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            scratch[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.write_bytes(&scratch[..len])
    }

    /// Writes a zigzag-encoded signed 64-bit varint.
    pub fn write_vars64(&mut self, value: i64) -> BitResult<()> {
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        self.write_varu64(zigzag)
    }

    /// Writes a collection length or count.
    pub fn write_len(&mut self, len: usize) -> BitResult<()> {
        self.write_varu64(len as u64)
    }

    /// Enters bit-packing mode.
    ///
    /// The returned guard borrows the writer mutably, so byte-aligned writes
    /// are unavailable until it is dropped. Dropping it flushes the partial
    /// byte (zero padded) and advances the byte cursor.
    pub fn enter_bitwise(&mut self) -> BitWriter<'_> {
        BitWriter {
            writer: self,
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// Copies `data` at the cursor. Capacity must already be reserved.
    fn put(&mut self, data: &[u8]) {
        let end = self.position + data.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[self.position..end].copy_from_slice(data);
        self.position = end;
    }
}

/// Scoped bit-packing context over a [`BufferWriter`].
///
/// Bits are packed MSB-first. Each started byte is reserved before the first
/// bit lands in it, so the flush on drop cannot fail.
#[derive(Debug)]
pub struct BitWriter<'a> {
    writer: &'a mut BufferWriter,
    /// Current byte being written (not yet flushed).
    current_byte: u8,
    /// Number of bits written to `current_byte` (0-7).
    bit_count: u8,
}

impl BitWriter<'_> {
    /// Writes a single bit.
    pub fn write_bit(&mut self, value: bool) -> BitResult<()> {
        if self.bit_count == 0 {
            self.writer.try_begin_write(1)?;
        }
        self.current_byte = (self.current_byte << 1) | u8::from(value);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.writer.put(&[self.current_byte]);
            self.current_byte = 0;
            self.bit_count = 0;
        }
        Ok(())
    }

    /// Writes up to 64 bits from an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 64`.
    /// Returns [`BitError::ValueOutOfRange`] if `value` doesn't fit in `bits`.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        if bits == 0 {
            return Ok(());
        }
        if bits < 64 && value >= (1u64 << bits) {
            return Err(BitError::ValueOutOfRange { value, bits });
        }
        for i in (0..bits).rev() {
            self.write_bit((value >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// Returns the number of bits pending in the partial byte.
    #[must_use]
    pub const fn pending_bits(&self) -> u8 {
        self.bit_count
    }
}

impl Drop for BitWriter<'_> {
    fn drop(&mut self) {
        if self.bit_count > 0 {
            let padded = self.current_byte << (8 - self.bit_count);
            self.writer.put(&[padded]);
        }
    }
}
