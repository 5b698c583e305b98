//! Capacity configuration for writers.

/// Initial and maximum capacity for a [`crate::BufferWriter`].
///
/// A writer whose `initial_capacity` equals `max_capacity` is fixed-size;
/// otherwise it doubles on demand until `max_capacity` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Capacity available before the first growth.
    pub initial_capacity: usize,
    /// Hard ceiling; writes past it fail with `BufferOverflow`.
    pub max_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            // Matches the largest message the wire layer accepts by default.
            max_capacity: 64 * 1024,
        }
    }
}

impl BufferConfig {
    /// Creates a small fixed-size configuration for tests.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            initial_capacity: 64,
            max_capacity: 64,
        }
    }

    /// Creates a configuration that can grow without bound (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            initial_capacity: 1024,
            max_capacity: usize::MAX,
        }
    }

    /// Returns `true` if the writer may grow past its initial capacity.
    #[must_use]
    pub const fn is_elastic(&self) -> bool {
        self.max_capacity > self.initial_capacity
    }
}
