//! Sweep output and receive reports.

use codec::RejectedEntry;
use schema::{ClientId, ObjectId, VariableKey};
use variable::{PermissionError, VariableError};
use wire::MessageFlags;

use crate::error::ReplicationError;

/// One encoded message and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipient: ClientId,
    pub object: ObjectId,
    pub flags: MessageFlags,
    pub bytes: Vec<u8>,
}

/// A local write rejected during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionIssue {
    pub object: ObjectId,
    pub key: VariableKey,
    pub error: PermissionError,
}

/// An object left out of a sweep. Its variables stay dirty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub object: ObjectId,
    pub error: ReplicationError,
}

/// Everything one sweep produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Messages in send order.
    pub messages: Vec<OutgoingMessage>,
    /// Denied local changes found and reverted by this sweep.
    pub permission_errors: Vec<PermissionIssue>,
    /// Variables committed by this sweep.
    pub committed: usize,
    /// Objects whose messages failed to encode.
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    /// Messages addressed to `recipient`, in send order.
    pub fn messages_for(&self, recipient: ClientId) -> impl Iterator<Item = &OutgoingMessage> {
        self.messages
            .iter()
            .filter(move |message| message.recipient == recipient)
    }

    /// Total encoded bytes.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.messages.iter().map(|m| m.bytes.len()).sum()
    }
}

/// Why a received section was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionRejection {
    /// The index does not address a variable of the layout.
    UnknownIndex { index: u32 },
    /// The sender may not write this variable.
    WriteDenied { key: VariableKey, sender: ClientId },
    /// The body failed to decode; the variable kept its previous value.
    Malformed { key: VariableKey, error: VariableError },
}

/// Outcome of applying one received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub object: ObjectId,
    pub flags: MessageFlags,
    /// Variables whose section was applied, in wire order.
    pub applied: Vec<VariableKey>,
    /// Sections skipped by length.
    pub rejected: Vec<SectionRejection>,
    /// Collection entries rejected inside applied sections.
    pub rejected_entries: Vec<(VariableKey, RejectedEntry)>,
    /// The message predates the current ownership epoch and was dropped.
    pub stale: bool,
    /// The sender gets full values at the next sweep.
    pub resync: bool,
}

impl ApplyReport {
    pub(crate) const fn new(object: ObjectId, flags: MessageFlags) -> Self {
        Self {
            object,
            flags,
            applied: Vec::new(),
            rejected: Vec::new(),
            rejected_entries: Vec::new(),
            stale: false,
            resync: false,
        }
    }

    /// Returns `true` if every section applied cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.stale && self.rejected.is_empty() && self.rejected_entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_report_filters_by_recipient() {
        let message = |recipient: u64, len: usize| OutgoingMessage {
            recipient: ClientId::new(recipient),
            object: ObjectId::new(1),
            flags: MessageFlags::delta(),
            bytes: vec![0; len],
        };
        let report = SweepReport {
            messages: vec![message(1, 10), message(2, 20), message(1, 5)],
            ..SweepReport::default()
        };
        assert_eq!(report.messages_for(ClientId::new(1)).count(), 2);
        assert_eq!(report.byte_count(), 35);
    }

    #[test]
    fn apply_report_cleanliness() {
        let mut report = ApplyReport::new(ObjectId::new(1), MessageFlags::delta());
        assert!(report.is_clean());
        report.rejected.push(SectionRejection::UnknownIndex { index: 9 });
        assert!(!report.is_clean());
    }
}
