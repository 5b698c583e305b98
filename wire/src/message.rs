//! Message encoding and section framing.
//!
//! Layout: `[header][section]*` where each section is
//! `[varint variable index][varint body length][body]` and indices are
//! strictly increasing. Body lengths let a receiver skip a variable it has to
//! reject without understanding its encoding.

use bitstream::{BufferReader, BufferWriter};

use crate::error::{DecodeError, EncodeError, EncodeResult, LimitKind, WireResult};
use crate::header::{MessageFlags, MessageHeader, HEADER_SIZE, MAGIC, PAYLOAD_LEN_OFFSET, VERSION};
use crate::limits::Limits;

/// One variable's body within a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    /// Dense wire index of the variable in the object's layout.
    pub index: u32,
    pub body: &'a [u8],
}

/// A decoded message borrowing its section bodies from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<'a> {
    pub header: MessageHeader,
    pub sections: Vec<Section<'a>>,
}

/// Decodes and validates a message header.
///
/// Checks size, magic, version, flags and the payload length against `buf`.
pub fn decode_header(buf: &[u8], limits: &Limits) -> WireResult<MessageHeader> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::MessageTooSmall {
            actual: buf.len(),
            required: HEADER_SIZE,
        });
    }
    if buf.len() > limits.max_message_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::MessageBytes,
            limit: limits.max_message_bytes,
            actual: buf.len(),
        });
    }

    let mut reader = BufferReader::new(buf);
    let magic: u32 = reader.read_value()?;
    if magic != MAGIC {
        return Err(DecodeError::InvalidMagic { found: magic });
    }
    let version: u16 = reader.read_value()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }
    let raw_flags: u16 = reader.read_value()?;
    let flags = MessageFlags::from_raw(raw_flags);
    if !flags.is_valid() {
        return Err(DecodeError::InvalidFlags { flags: raw_flags });
    }

    let header = MessageHeader {
        version,
        flags,
        layout_hash: reader.read_value()?,
        object_id: reader.read_value()?,
        owner: reader.read_value()?,
        tick: reader.read_value()?,
        epoch: reader.read_value()?,
        payload_len: reader.read_value()?,
    };

    let actual_len = buf.len() - HEADER_SIZE;
    if header.payload_len as usize != actual_len {
        return Err(DecodeError::PayloadLengthMismatch {
            header_len: header.payload_len,
            actual_len,
        });
    }
    if flags.is_control() && actual_len != 0 {
        return Err(DecodeError::UnexpectedPayload {
            flags: raw_flags,
            len: actual_len,
        });
    }
    Ok(header)
}

/// Decodes a message into its header and borrowed section slices.
pub fn decode_message<'a>(buf: &'a [u8], limits: &Limits) -> WireResult<Message<'a>> {
    let header = decode_header(buf, limits)?;
    let sections = decode_sections(&buf[HEADER_SIZE..], limits)?;
    Ok(Message { header, sections })
}

/// Decodes sections from a payload (no header).
pub fn decode_sections<'a>(payload: &'a [u8], limits: &Limits) -> WireResult<Vec<Section<'a>>> {
    let mut reader = BufferReader::new(payload);
    let mut sections: Vec<Section<'a>> = Vec::new();

    while !reader.is_at_end() {
        if sections.len() >= limits.max_sections {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionCount,
                limit: limits.max_sections,
                actual: sections.len() + 1,
            });
        }

        let index = reader.read_varu32()?;
        if let Some(previous) = sections.last().map(|s| s.index) {
            if index <= previous {
                return Err(DecodeError::SectionOrder { previous, index });
            }
        }

        let len = reader.read_len()?;
        if len > limits.max_section_len {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionLength,
                limit: limits.max_section_len,
                actual: len,
            });
        }
        if len > reader.remaining() {
            return Err(DecodeError::Truncated {
                needed: reader.position() + len,
                available: payload.len(),
            });
        }
        let body = reader.read_bytes(len)?;
        sections.push(Section { index, body });
    }

    Ok(sections)
}

/// Builds one message in a bounded buffer.
///
/// The header is written up front with a zero payload length that
/// [`MessageEncoder::finish`] patches in place.
#[derive(Debug)]
pub struct MessageEncoder {
    writer: BufferWriter,
    flags: MessageFlags,
    last_index: Option<u32>,
    sections: usize,
    limits: Limits,
}

impl MessageEncoder {
    /// Starts a message with the given header.
    pub fn new(header: &MessageHeader, limits: &Limits) -> EncodeResult<Self> {
        let max = limits.max_message_bytes.max(HEADER_SIZE);
        let mut writer = BufferWriter::with_max_capacity(HEADER_SIZE.max(256).min(max), max);
        writer.write_value(MAGIC)?;
        writer.write_value(header.version)?;
        writer.write_value(header.flags.raw())?;
        writer.write_value(header.layout_hash)?;
        writer.write_value(header.object_id)?;
        writer.write_value(header.owner)?;
        writer.write_value(header.tick)?;
        writer.write_value(header.epoch)?;
        writer.write_value(0u32)?;
        Ok(Self {
            writer,
            flags: header.flags,
            last_index: None,
            sections: 0,
            limits: limits.clone(),
        })
    }

    /// Appends a variable section. Indices must be strictly increasing.
    pub fn push_section(&mut self, index: u32, body: &[u8]) -> EncodeResult<()> {
        if self.flags.is_control() {
            return Err(EncodeError::SectionsOnControl {
                flags: self.flags.raw(),
            });
        }
        if let Some(previous) = self.last_index {
            if index <= previous {
                return Err(EncodeError::SectionOrder { previous, index });
            }
        }
        if self.sections >= self.limits.max_sections {
            return Err(EncodeError::LimitsExceeded {
                kind: LimitKind::SectionCount,
                limit: self.limits.max_sections,
                actual: self.sections + 1,
            });
        }
        if body.len() > self.limits.max_section_len {
            return Err(EncodeError::LimitsExceeded {
                kind: LimitKind::SectionLength,
                limit: self.limits.max_section_len,
                actual: body.len(),
            });
        }

        let mark = self.writer.len();
        let written = self
            .writer
            .write_varu32(index)
            .and_then(|()| self.writer.write_len(body.len()))
            .and_then(|()| self.writer.write_bytes(body));
        if let Err(err) = written {
            self.writer.truncate(mark);
            return Err(err.into());
        }
        self.last_index = Some(index);
        self.sections += 1;
        Ok(())
    }

    /// Number of sections written so far.
    #[must_use]
    pub const fn section_count(&self) -> usize {
        self.sections
    }

    /// Bytes written so far, header included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    /// Returns `true` if only the header has been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sections == 0
    }

    /// Patches the payload length and returns the encoded message.
    pub fn finish(mut self) -> EncodeResult<Vec<u8>> {
        let end = self.writer.len();
        let payload = end - HEADER_SIZE;
        let payload_len =
            u32::try_from(payload).map_err(|_| EncodeError::LengthOverflow { length: payload })?;
        self.writer.seek(PAYLOAD_LEN_OFFSET);
        self.writer.write_value(payload_len)?;
        self.writer.seek(end);
        Ok(self.writer.into_bytes())
    }
}

/// Encodes a message that carries no sections (ownership, despawn).
pub fn encode_control(header: &MessageHeader, limits: &Limits) -> EncodeResult<Vec<u8>> {
    MessageEncoder::new(header, limits)?.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_header() -> MessageHeader {
        MessageHeader::new(MessageFlags::delta(), 0xFEED, 42, 3, 100, 2)
    }

    fn encode(sections: &[(u32, &[u8])]) -> Vec<u8> {
        let mut encoder = MessageEncoder::new(&delta_header(), &Limits::default()).unwrap();
        for (index, body) in sections {
            encoder.push_section(*index, body).unwrap();
        }
        encoder.finish().unwrap()
    }

    #[test]
    fn roundtrip_header_and_sections() {
        let bytes = encode(&[(0, &[1, 2, 3][..]), (4, &[][..]), (300, &[9; 200][..])]);
        let message = decode_message(&bytes, &Limits::default()).unwrap();

        let mut expected = delta_header();
        expected.payload_len = (bytes.len() - HEADER_SIZE) as u32;
        assert_eq!(message.header, expected);
        assert_eq!(message.sections.len(), 3);
        assert_eq!(message.sections[0], Section { index: 0, body: &[1, 2, 3] });
        assert!(message.sections[1].body.is_empty());
        assert_eq!(message.sections[2].index, 300);
        assert_eq!(message.sections[2].body.len(), 200);
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = encode(&[]);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..6], &VERSION.to_le_bytes());
        assert_eq!(&bytes[6..8], &MessageFlags::DELTA.to_le_bytes());
        assert_eq!(&bytes[8..16], &0xFEEDu64.to_le_bytes());
        assert_eq!(&bytes[16..24], &42u64.to_le_bytes());
        assert_eq!(&bytes[40..44], &0u32.to_le_bytes());
    }

    #[test]
    fn encoder_rejects_out_of_order_sections() {
        let mut encoder = MessageEncoder::new(&delta_header(), &Limits::default()).unwrap();
        encoder.push_section(5, &[1]).unwrap();
        let err = encoder.push_section(5, &[2]).unwrap_err();
        assert_eq!(err, EncodeError::SectionOrder { previous: 5, index: 5 });
        assert_eq!(encoder.section_count(), 1);
    }

    #[test]
    fn encoder_overflow_leaves_message_intact() {
        let limits = Limits {
            max_message_bytes: HEADER_SIZE + 8,
            ..Limits::default()
        };
        let mut encoder = MessageEncoder::new(&delta_header(), &limits).unwrap();
        encoder.push_section(0, &[7; 4]).unwrap();
        assert!(matches!(
            encoder.push_section(1, &[7; 4]),
            Err(EncodeError::Bitstream(_))
        ));
        let bytes = encoder.finish().unwrap();
        let message = decode_message(&bytes, &Limits::default()).unwrap();
        assert_eq!(message.sections.len(), 1);
    }

    #[test]
    fn control_messages_have_no_sections() {
        let header = MessageHeader::new(MessageFlags::ownership(), 0xFEED, 42, 7, 10, 3);
        let mut encoder = MessageEncoder::new(&header, &Limits::default()).unwrap();
        assert!(matches!(
            encoder.push_section(0, &[1]),
            Err(EncodeError::SectionsOnControl { .. })
        ));

        let bytes = encode_control(&header, &Limits::default()).unwrap();
        let message = decode_message(&bytes, &Limits::default()).unwrap();
        assert!(message.header.flags.is_ownership());
        assert_eq!(message.header.owner, 7);
        assert_eq!(message.header.epoch, 3);
        assert!(message.sections.is_empty());
    }

    #[test]
    fn decode_rejects_small_message() {
        let err = decode_message(&[0; 10], &Limits::default()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MessageTooSmall {
                actual: 10,
                required: HEADER_SIZE
            }
        );
    }

    #[test]
    fn decode_rejects_bad_magic_version_and_flags() {
        let good = encode(&[(1, &[0][..])]);

        let mut bad = good.clone();
        bad[0] ^= 0xFF;
        assert!(matches!(
            decode_message(&bad, &Limits::default()),
            Err(DecodeError::InvalidMagic { .. })
        ));

        let mut bad = good.clone();
        bad[4] = 9;
        assert_eq!(
            decode_message(&bad, &Limits::default()).unwrap_err(),
            DecodeError::UnsupportedVersion { found: 9 }
        );

        let mut bad = good;
        bad[6] = 0b11;
        assert_eq!(
            decode_message(&bad, &Limits::default()).unwrap_err(),
            DecodeError::InvalidFlags { flags: 0b11 }
        );
    }

    #[test]
    fn decode_rejects_payload_mismatch() {
        let mut bytes = encode(&[(1, &[0, 0][..])]);
        bytes.push(0);
        assert!(matches!(
            decode_message(&bytes, &Limits::default()),
            Err(DecodeError::PayloadLengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_payload_on_control() {
        let header = MessageHeader::new(MessageFlags::despawn(), 0, 1, 0, 0, 0);
        let mut bytes = encode_control(&header, &Limits::default()).unwrap();
        bytes.extend_from_slice(&[0, 0]);
        bytes[PAYLOAD_LEN_OFFSET..HEADER_SIZE].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            decode_message(&bytes, &Limits::default()),
            Err(DecodeError::UnexpectedPayload { len: 2, .. })
        ));
    }

    #[test]
    fn decode_sections_rejects_order_violation() {
        // index 3, len 0, index 2, len 0
        let payload = [3, 0, 2, 0];
        assert_eq!(
            decode_sections(&payload, &Limits::default()).unwrap_err(),
            DecodeError::SectionOrder {
                previous: 3,
                index: 2
            }
        );
    }

    #[test]
    fn decode_sections_rejects_truncated_body() {
        let payload = [0, 5, 1, 2];
        assert_eq!(
            decode_sections(&payload, &Limits::default()).unwrap_err(),
            DecodeError::Truncated {
                needed: 7,
                available: 4
            }
        );
    }

    #[test]
    fn decode_sections_enforces_limits() {
        let limits = Limits::for_testing();
        let payload: Vec<u8> = (0..9).flat_map(|i| [i, 0]).collect();
        assert!(matches!(
            decode_sections(&payload, &limits),
            Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionCount,
                ..
            })
        ));

        // len = 2000 as varint
        let payload = [0, 0xD0, 0x0F];
        assert!(matches!(
            decode_sections(&payload, &limits),
            Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionLength,
                actual: 2000,
                ..
            })
        ));
    }

    #[test]
    fn decode_rejects_oversized_message() {
        let bytes = encode(&[(0, &[0; 600][..]), (1, &[0; 600][..]), (2, &[0; 600][..])]);
        assert!(bytes.len() > 1024);
        let limits = Limits {
            max_message_bytes: 1024,
            ..Limits::default()
        };
        assert!(matches!(
            decode_message(&bytes, &limits),
            Err(DecodeError::LimitsExceeded {
                kind: LimitKind::MessageBytes,
                ..
            })
        ));
    }
}
