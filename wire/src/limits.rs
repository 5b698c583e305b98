//! Configurable limits for bounded decoding.

/// Wire-level limits for message decoding.
///
/// Enforced before any section is sliced so a hostile length field never
/// drives allocation. Limits on the bodies themselves belong to the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum message size in bytes, header included.
    pub max_message_bytes: usize,

    /// Maximum number of variable sections in a message.
    pub max_sections: usize,

    /// Maximum length of a single section body in bytes.
    pub max_section_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_bytes: 64 * 1024,
            // One section per variable; matches the schema's addressable range.
            max_sections: u16::MAX as usize,
            max_section_len: 32 * 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_message_bytes: 4096,
            max_sections: 8,
            max_section_len: 1024,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_message_bytes: usize::MAX,
            max_sections: usize::MAX,
            max_section_len: usize::MAX,
        }
    }
}
