//! Delta message framing for netvar.
//!
//! One message carries the replicated variables of one object: a fixed
//! header followed by one section per variable. This crate knows nothing
//! about the values inside a section, only how sections are framed.
//!
//! # Design Principles
//!
//! - **Versioned layout** - Magic and version are checked before anything else.
//! - **Bounded decoding** - All length fields are validated against [`Limits`] before slicing.
//! - **Skippable sections** - Every body is length-prefixed so a receiver can drop one variable and keep the rest.

mod error;
mod header;
mod limits;
mod message;

pub use error::{DecodeError, EncodeError, EncodeResult, LimitKind, WireResult};
pub use header::{MessageFlags, MessageHeader, HEADER_SIZE, MAGIC, VERSION};
pub use limits::Limits;
pub use message::{
    decode_header, decode_message, decode_sections, encode_control, Message, MessageEncoder,
    Section,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn public_api_exports() {
        let _ = MAGIC;
        let _ = VERSION;
        let _ = MessageFlags::spawn();
        let _ = MessageHeader::new(MessageFlags::delta(), 0, 0, 0, 0, 0);
        let _ = Limits::default();
        let _: WireResult<()> = Ok(());
        let _: EncodeResult<()> = Ok(());
    }

    #[test]
    fn header_size_constant_correct() {
        assert_eq!(
            HEADER_SIZE,
            size_of::<u32>() // magic
                + size_of::<u16>() // version
                + size_of::<u16>() // flags
                + size_of::<u64>() // layout_hash
                + size_of::<u64>() // object_id
                + size_of::<u64>() // owner
                + size_of::<u32>() // tick
                + size_of::<u32>() // epoch
                + size_of::<u32>() // payload_len
        );
    }
}
