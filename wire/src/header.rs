//! Message header types and constants.

/// Magic number identifying netvar delta messages.
///
/// This value is fixed and must never change across versions.
pub const MAGIC: u32 = 0x4E56_4152; // "NVAR" in ASCII

/// Current wire format version.
pub const VERSION: u16 = 1;

/// Header size in bytes (44 total).
pub const HEADER_SIZE: usize = 4 + 2 + 2 + 8 + 8 + 8 + 4 + 4 + 4;

/// Byte offset of the payload length field.
pub(crate) const PAYLOAD_LEN_OFFSET: usize = HEADER_SIZE - 4;

/// Message kind flags. Exactly one kind bit is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageFlags(u16);

impl MessageFlags {
    /// Initial replication: every readable variable in full.
    pub const SPAWN: u16 = 1 << 0;

    /// Dirty variables as deltas against the last sweep.
    pub const DELTA: u16 = 1 << 1;

    /// Ownership changed; header carries the new owner and epoch.
    pub const OWNERSHIP: u16 = 1 << 2;

    /// The object left the observer's scope.
    pub const DESPAWN: u16 = 1 << 3;

    const RESERVED_MASK: u16 = !0b1111;

    /// Creates flags from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn spawn() -> Self {
        Self(Self::SPAWN)
    }

    #[must_use]
    pub const fn delta() -> Self {
        Self(Self::DELTA)
    }

    #[must_use]
    pub const fn ownership() -> Self {
        Self(Self::OWNERSHIP)
    }

    #[must_use]
    pub const fn despawn() -> Self {
        Self(Self::DESPAWN)
    }

    #[must_use]
    pub const fn is_spawn(self) -> bool {
        self.0 & Self::SPAWN != 0
    }

    #[must_use]
    pub const fn is_delta(self) -> bool {
        self.0 & Self::DELTA != 0
    }

    #[must_use]
    pub const fn is_ownership(self) -> bool {
        self.0 & Self::OWNERSHIP != 0
    }

    #[must_use]
    pub const fn is_despawn(self) -> bool {
        self.0 & Self::DESPAWN != 0
    }

    /// Returns `true` for kinds that never carry sections.
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.is_ownership() || self.is_despawn()
    }

    /// Returns `true` if exactly one kind bit is set and no reserved bit is.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 & Self::RESERVED_MASK == 0 && self.0.count_ones() == 1
    }

    /// Short lowercase name of the message kind.
    #[must_use]
    pub const fn kind_name(self) -> &'static str {
        match self.0 {
            Self::SPAWN => "spawn",
            Self::DELTA => "delta",
            Self::OWNERSHIP => "ownership",
            Self::DESPAWN => "despawn",
            _ => "invalid",
        }
    }
}

/// Delta message header.
///
/// The magic number is validated during decoding and is not stored here.
/// `payload_len` is filled in by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u16,
    pub flags: MessageFlags,
    /// Hash of the object's variable table; receivers reject mismatches.
    pub layout_hash: u64,
    pub object_id: u64,
    /// Owner known to the sender when the message was built.
    pub owner: u64,
    pub tick: u32,
    /// Ownership epoch; bumped on every ownership change.
    pub epoch: u32,
    pub payload_len: u32,
}

impl MessageHeader {
    /// Creates a header of the given kind with an empty payload.
    #[must_use]
    pub const fn new(
        flags: MessageFlags,
        layout_hash: u64,
        object_id: u64,
        owner: u64,
        tick: u32,
        epoch: u32,
    ) -> Self {
        Self {
            version: VERSION,
            flags,
            layout_hash,
            object_id,
            owner,
            tick,
            epoch,
            payload_len: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_is_nvar_ascii() {
        assert_eq!(&MAGIC.to_be_bytes(), b"NVAR");
    }

    #[test]
    fn header_size_is_correct() {
        // magic + version + flags + hash + object + owner + tick + epoch + payload_len
        assert_eq!(HEADER_SIZE, 44);
        assert_eq!(PAYLOAD_LEN_OFFSET, 40);
    }

    #[test]
    fn each_kind_is_valid_alone() {
        for flags in [
            MessageFlags::spawn(),
            MessageFlags::delta(),
            MessageFlags::ownership(),
            MessageFlags::despawn(),
        ] {
            assert!(flags.is_valid(), "{flags:?}");
        }
        assert_eq!(MessageFlags::delta().kind_name(), "delta");
    }

    #[test]
    fn flags_invalid_combinations() {
        assert!(!MessageFlags::default().is_valid());
        assert!(!MessageFlags::from_raw(MessageFlags::SPAWN | MessageFlags::DELTA).is_valid());
        assert!(!MessageFlags::from_raw(0x0010).is_valid());
        assert!(!MessageFlags::from_raw(0x8001).is_valid());
        assert_eq!(MessageFlags::from_raw(0b11).kind_name(), "invalid");
    }

    #[test]
    fn control_kinds() {
        assert!(MessageFlags::ownership().is_control());
        assert!(MessageFlags::despawn().is_control());
        assert!(!MessageFlags::spawn().is_control());
        assert!(!MessageFlags::delta().is_control());
    }

    #[test]
    fn header_const_constructible() {
        const HEADER: MessageHeader = MessageHeader::new(MessageFlags::spawn(), 0xAB, 7, 0, 3, 1);
        assert_eq!(HEADER.version, VERSION);
        assert_eq!(HEADER.payload_len, 0);
        assert!(HEADER.flags.is_spawn());
    }
}
