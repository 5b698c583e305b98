//! Introspection and debugging tools for netvar replication messages.
//!
//! - [`inspect_message`] summarizes a captured message: header fields and the
//!   size of every section.
//! - [`decode_message_hex`] renders the header and every section body as hex.
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not afterthoughts.
//! - **Human-readable output** - Make it easy to see what the engine put on the wire.

use std::fmt::Write as _;

use schema::{ClientId, ObjectId};
use serde::Serialize;
use thiserror::Error;
use wire::{decode_message, DecodeError, Limits, Message};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Header fields of one message, ready for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderReport {
    pub version: u16,
    pub kind: &'static str,
    pub flags: u16,
    pub layout_hash: String,
    pub object: String,
    pub owner: String,
    pub tick: u32,
    pub epoch: u32,
    pub payload_len: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub index: u32,
    pub body_len: usize,
}

/// Structure and size of one captured message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub total_bytes: usize,
    pub header: HeaderReport,
    pub sections: Vec<SectionReport>,
    /// Bytes spent on section indices and lengths.
    pub framing_bytes: usize,
}

fn header_report(message: &Message<'_>) -> HeaderReport {
    let header = message.header;
    HeaderReport {
        version: header.version,
        kind: header.flags.kind_name(),
        flags: header.flags.raw(),
        layout_hash: format!("0x{:016x}", header.layout_hash),
        object: ObjectId::new(header.object_id).to_string(),
        owner: ClientId::new(header.owner).to_string(),
        tick: header.tick,
        epoch: header.epoch,
        payload_len: header.payload_len,
    }
}

/// Decodes `bytes` and reports header fields and per-section sizes.
pub fn inspect_message(bytes: &[u8], limits: &Limits) -> Result<InspectReport, ToolError> {
    let message = decode_message(bytes, limits)?;
    let sections: Vec<SectionReport> = message
        .sections
        .iter()
        .map(|section| SectionReport {
            index: section.index,
            body_len: section.body.len(),
        })
        .collect();
    let body_bytes: usize = sections.iter().map(|s| s.body_len).sum();
    Ok(InspectReport {
        total_bytes: bytes.len(),
        framing_bytes: bytes.len() - wire::HEADER_SIZE - body_bytes,
        header: header_report(&message),
        sections,
    })
}

/// Renders `bytes` as space-separated hex, 16 bytes per line.
#[must_use]
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (line, chunk) in bytes.chunks(16).enumerate() {
        if line > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:06x}:", line * 16);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
    }
    out
}

/// Renders the header fields and every section body of a message.
pub fn decode_message_hex(bytes: &[u8], limits: &Limits) -> Result<String, ToolError> {
    let message = decode_message(bytes, limits)?;
    let header = header_report(&message);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} v{} {} owner {} tick {} epoch {} layout {}",
        header.kind,
        header.version,
        header.object,
        header.owner,
        header.tick,
        header.epoch,
        header.layout_hash
    );
    let _ = writeln!(out, "header:");
    let _ = writeln!(out, "{}", hex_dump(&bytes[..wire::HEADER_SIZE]));
    for section in &message.sections {
        let _ = writeln!(out, "section {} ({} bytes):", section.index, section.body.len());
        if !section.body.is_empty() {
            let _ = writeln!(out, "{}", hex_dump(section.body));
        }
    }
    Ok(out)
}
