//! Decode-time state: limits, nesting depth and rejected delta entries.

use bitstream::BufferReader;
use tracing::warn;

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;

/// Part of a collection delta an entry belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaSection {
    Added,
    Removed,
    Changed,
}

/// Why a delta entry could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The entry referenced a key the receiver does not hold.
    MissingKey,
    /// An added key was already present.
    DuplicateKey,
    /// A changed list index lies past the receiver's length.
    MissingElement { index: usize },
    /// An appended element would leave a gap in the list.
    IndexGap { index: usize, len: usize },
    /// The sender's previous length disagrees with the receiver's.
    LengthMismatch { expected: usize, actual: usize },
    /// Applying the entry would grow the collection past the length limit.
    CapacityExceeded { limit: usize },
}

/// A single delta entry rejected while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedEntry {
    pub section: DeltaSection,
    pub reason: RejectReason,
}

/// Mutable state threaded through one decode pass.
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    limits: CodecLimits,
    depth: usize,
    rejected: Vec<RejectedEntry>,
}

impl DecodeContext {
    /// Creates a context enforcing `limits`.
    #[must_use]
    pub fn new(limits: CodecLimits) -> Self {
        Self {
            limits,
            depth: 0,
            rejected: Vec::new(),
        }
    }

    /// Returns the active limits.
    #[must_use]
    pub const fn limits(&self) -> &CodecLimits {
        &self.limits
    }

    /// Returns the entries rejected so far.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    /// Removes and returns the rejected entries.
    pub fn take_rejected(&mut self) -> Vec<RejectedEntry> {
        std::mem::take(&mut self.rejected)
    }

    /// Records a rejected entry and keeps decoding.
    pub fn reject(&mut self, section: DeltaSection, reason: RejectReason) {
        warn!(?section, ?reason, "rejected collection delta entry");
        self.rejected.push(RejectedEntry { section, reason });
    }

    /// Validates a decoded collection length.
    pub fn check_collection_len(&self, len: usize) -> CodecResult<()> {
        if len > self.limits.max_collection_len {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::CollectionLength,
                limit: self.limits.max_collection_len,
                actual: len,
            });
        }
        Ok(())
    }

    /// Returns `true` if a collection holding `len` entries may take one more.
    #[must_use]
    pub const fn can_grow(&self, len: usize) -> bool {
        len < self.limits.max_collection_len
    }

    /// Validates a decoded string length.
    pub fn check_string_len(&self, len: usize) -> CodecResult<()> {
        if len > self.limits.max_string_bytes {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::StringBytes,
                limit: self.limits.max_string_bytes,
                actual: len,
            });
        }
        Ok(())
    }

    /// Runs `f` one container level deeper, restoring the depth afterwards.
    pub fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> CodecResult<T>) -> CodecResult<T> {
        if self.depth >= self.limits.max_depth {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::Depth,
                limit: self.limits.max_depth,
                actual: self.depth + 1,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

/// Reads a length prefix and returns a reader over exactly that many bytes.
pub(crate) fn read_prefixed<'a>(reader: &mut BufferReader<'a>) -> CodecResult<BufferReader<'a>> {
    let len = reader.read_len()?;
    let bytes = reader.read_bytes(len)?;
    Ok(BufferReader::new(bytes))
}
