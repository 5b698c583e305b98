//! Byte buffer primitives for replicated variable payloads.
//!
//! This crate provides [`BufferWriter`] and [`BufferReader`]: byte-aligned
//! cursors for blittable values and packed integers, each with a scoped
//! bit-packing mode ([`BitWriter`] / [`BitReader`]) for sub-byte fields.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads/writes are bounds-checked against an explicit capacity.
//! - **Scoped bit mode** - The bit guard borrows the buffer, so byte writes cannot interleave.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BufferReader, BufferWriter};
//!
//! let mut writer = BufferWriter::new(32);
//! {
//!     let mut bits = writer.enter_bitwise();
//!     bits.write_bit(true).unwrap();
//! }
//! writer.write_value(42u16).unwrap();
//!
//! let bytes = writer.into_bytes();
//!
//! let mut reader = BufferReader::new(&bytes);
//! assert!(reader.enter_bitwise().read_bit().unwrap());
//! assert_eq!(reader.read_value::<u16>().unwrap(), 42);
//! ```

mod blittable;
mod error;
mod limits;
mod reader;
mod writer;

pub use blittable::Blittable;
pub use error::{BitError, BitResult};
pub use limits::BufferConfig;
pub use reader::{BitReader, BufferReader};
pub use writer::{BitWriter, BufferWriter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = BufferConfig::default();
        let _ = BufferWriter::new(0);
        let _ = BufferReader::new(&[]);
        let _: BitResult<()> = Ok(());
    }

    #[test]
    fn empty_roundtrip() {
        let writer = BufferWriter::new(8);
        let bytes = writer.into_bytes();
        assert!(bytes.is_empty());

        let reader = BufferReader::new(&bytes);
        assert!(reader.is_empty());
    }

    #[test]
    fn mixed_roundtrip() {
        let mut writer = BufferWriter::from_config(&BufferConfig::default());
        writer.write_value(true).unwrap();
        {
            let mut bits = writer.enter_bitwise();
            bits.write_bits(0b1010, 4).unwrap();
            bits.write_bit(false).unwrap();
        }
        writer.write_value(-7i64).unwrap();
        writer.write_varu32(1_000_000).unwrap();
        writer.write_value(1.5f32).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = BufferReader::new(&bytes);
        assert!(reader.read_value::<bool>().unwrap());
        {
            let mut bits = reader.enter_bitwise();
            assert_eq!(bits.read_bits(4).unwrap(), 0b1010);
            assert!(!bits.read_bit().unwrap());
        }
        assert_eq!(reader.read_value::<i64>().unwrap(), -7);
        assert_eq!(reader.read_varu32().unwrap(), 1_000_000);
        assert!((reader.read_value::<f32>().unwrap() - 1.5).abs() < f32::EPSILON);
        assert!(reader.is_at_end());
    }

    #[test]
    fn full_range_boundaries_roundtrip() {
        let mut writer = BufferWriter::new(128);
        writer.write_value(u64::MAX).unwrap();
        writer.write_value(i64::MIN).unwrap();
        writer.write_value(u128::MAX).unwrap();
        writer.write_value(i8::MIN).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = BufferReader::new(&bytes);
        assert_eq!(reader.read_value::<u64>().unwrap(), u64::MAX);
        assert_eq!(reader.read_value::<i64>().unwrap(), i64::MIN);
        assert_eq!(reader.read_value::<u128>().unwrap(), u128::MAX);
        assert_eq!(reader.read_value::<i8>().unwrap(), i8::MIN);
    }
}
