//! Value kinds describing how a variable is encoded.

/// The encoding shape of a replicated value (representation only).
///
/// Codecs report their kind so that two peers can verify, via the layout
/// hash, that they agree on every variable's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    /// Boolean (one byte on the wire, one bit inside bitmasks).
    Bool,

    /// Unsigned integer of a fixed width.
    UInt { bits: u8 },

    /// Signed integer of a fixed width.
    SInt { bits: u8 },

    /// IEEE-754 float (32 or 64 bits).
    Float { bits: u8 },

    /// Field-less enum over an integer representation.
    Enum { bits: u8 },

    /// Inline UTF-8 string with a fixed byte capacity.
    FixedString { capacity: u16 },

    /// Value encoded by an application-supplied codec.
    Custom { name: String },

    /// Nullable value (presence byte + value).
    Option(Box<ValueKind>),

    /// Ordered list.
    List(Box<ValueKind>),

    /// Key/value map.
    Dictionary(Box<ValueKind>, Box<ValueKind>),

    /// Unordered set.
    HashSet(Box<ValueKind>),

    /// Plain struct encoded field by field.
    Struct(Vec<ValueKind>),
}

impl ValueKind {
    /// Creates an unsigned integer kind.
    #[must_use]
    pub const fn uint(bits: u8) -> Self {
        Self::UInt { bits }
    }

    /// Creates a signed integer kind.
    #[must_use]
    pub const fn sint(bits: u8) -> Self {
        Self::SInt { bits }
    }

    /// Creates a list kind.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Creates a dictionary kind.
    #[must_use]
    pub fn dictionary(key: Self, value: Self) -> Self {
        Self::Dictionary(Box::new(key), Box::new(value))
    }

    /// Creates a set kind.
    #[must_use]
    pub fn hash_set(element: Self) -> Self {
        Self::HashSet(Box::new(element))
    }

    /// Returns `true` for container kinds that encode deltas structurally.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Dictionary(..) | Self::HashSet(_))
    }

    /// Returns the nesting depth (scalars are depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Bool
            | Self::UInt { .. }
            | Self::SInt { .. }
            | Self::Float { .. }
            | Self::Enum { .. }
            | Self::FixedString { .. }
            | Self::Custom { .. } => 0,
            Self::Option(inner) | Self::List(inner) | Self::HashSet(inner) => 1 + inner.depth(),
            Self::Dictionary(key, value) => 1 + key.depth().max(value.depth()),
            Self::Struct(fields) => 1 + fields.iter().map(Self::depth).max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_kinds() {
        assert!(ValueKind::list(ValueKind::Bool).is_collection());
        assert!(ValueKind::hash_set(ValueKind::uint(8)).is_collection());
        assert!(!ValueKind::Option(Box::new(ValueKind::Bool)).is_collection());
    }

    #[test]
    fn nested_depth() {
        let nested = ValueKind::dictionary(
            ValueKind::uint(32),
            ValueKind::list(ValueKind::list(ValueKind::sint(16))),
        );
        assert_eq!(nested.depth(), 3);
        assert_eq!(ValueKind::Struct(Vec::new()).depth(), 1);
    }
}
