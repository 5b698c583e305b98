//! Limits for value decoding.

/// Codec limits enforced while decoding values received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecLimits {
    /// Maximum element count of any list, dictionary or set.
    pub max_collection_len: usize,
    /// Maximum byte length of a decoded string.
    pub max_string_bytes: usize,
    /// Maximum container nesting depth.
    pub max_depth: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_collection_len: 16 * 1024,
            max_string_bytes: 4096,
            max_depth: 16,
        }
    }
}

impl CodecLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_collection_len: 256,
            max_string_bytes: 128,
            max_depth: 4,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_collection_len: usize::MAX,
            max_string_bytes: usize::MAX,
            max_depth: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_reasonable() {
        let limits = CodecLimits::default();
        assert!(limits.max_collection_len >= 1024);
        assert!(limits.max_depth >= 4);
    }

    #[test]
    fn testing_limits_smaller() {
        let test_limits = CodecLimits::for_testing();
        let default_limits = CodecLimits::default();
        assert!(test_limits.max_collection_len < default_limits.max_collection_len);
        assert!(test_limits.max_string_bytes < default_limits.max_string_bytes);
    }

    #[test]
    fn unlimited_limits() {
        let limits = CodecLimits::unlimited();
        assert_eq!(limits.max_collection_len, usize::MAX);
        assert_eq!(limits.max_depth, usize::MAX);
    }
}
