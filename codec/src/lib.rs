//! Full and delta encodings for replicated values.
//!
//! Every replicable type implements [`NetworkValue`]: a full encoding, a
//! delta encoding against a previous value, in-place decoding, and the
//! equality/copy semantics used for dirty tracking. Lists, dictionaries and
//! sets encode element-level deltas and fall back to a full encoding when
//! most of the collection changed.
//!
//! # Features
//!
//! - Scalars, [`FixedString`], `Option<T>`, `Vec<T>`, hash and B-tree maps and sets
//! - Arbitrarily nested collections with per-entry delta rejection
//! - [`impl_network_enum!`] and [`impl_network_struct!`] for application types
//! - [`UserCodec`] for types registered through function pointers
//!
//! # Design Principles
//!
//! - **Deltas degrade, never corrupt** - Entries that do not match the
//!   receiver's collection are skipped and reported on the [`DecodeContext`].
//! - **Bounded decoding** - Lengths and nesting depth are checked against
//!   [`CodecLimits`] before allocation.
//! - **In-place updates** - Decoding into an existing container reuses its storage.
//!
//! # Example
//!
//! ```
//! use codec::{BufferReader, BufferWriter, DecodeContext, NetworkValue};
//!
//! let previous: Vec<u32> = (0..16).collect();
//! let mut current = previous.clone();
//! current[3] = 300;
//!
//! let mut writer = BufferWriter::new(256);
//! current.write_delta(&previous, &mut writer).unwrap();
//! let bytes = writer.into_bytes();
//!
//! let mut receiver = previous.clone();
//! let mut ctx = DecodeContext::default();
//! receiver
//!     .read_delta(&mut BufferReader::new(&bytes), &mut ctx)
//!     .unwrap();
//! assert_eq!(receiver, current);
//! ```

mod collections;
mod context;
mod error;
mod limits;
mod macros;
mod strategy;
mod string;
mod value;

pub use bitstream::{BufferReader, BufferWriter};
pub use collections::{
    classify_list, classify_map, classify_set, Change, CollectionDelta, MapView, SetView,
    DELTA_MARKER, FULL_MARKER,
};
pub use context::{DecodeContext, DeltaSection, RejectReason, RejectedEntry};
pub use error::{CodecError, CodecResult, LimitKind};
pub use limits::CodecLimits;
pub use schema::ValueKind;
pub use strategy::{
    utf8_string_codec, DefaultCodec, ReadDeltaFn, ReadFn, UserCodec, ValueCodec, WriteDeltaFn,
    WriteFn,
};
pub use string::FixedString;
pub use value::NetworkValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = CodecLimits::default();
        let _ = DecodeContext::default();
        let _ = DefaultCodec;
        let _ = UserCodec::<String>::unregistered();
        let _: CodecResult<()> = Ok(());
        assert_ne!(DELTA_MARKER, FULL_MARKER);
    }

    #[test]
    fn option_of_list_delta() {
        let previous: Option<Vec<u16>> = Some((0..12).collect());
        let mut current = previous.clone();
        if let Some(list) = current.as_mut() {
            list[4] = 4000;
        }

        let mut writer = BufferWriter::new(128);
        current.write_delta(&previous, &mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut receiver = previous;
        receiver
            .read_delta(&mut BufferReader::new(&bytes), &mut DecodeContext::default())
            .unwrap();
        assert_eq!(receiver, current);
    }
}
