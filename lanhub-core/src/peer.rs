//! Peer identifiers.

use std::fmt;

/// Identifier of a session slot.
///
/// The value doubles as the index into the hub's session table. Slot 0 is the
/// hub itself; negative values are reserved sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(i16);

impl PeerId {
    /// The hub's own id.
    pub const HUB: PeerId = PeerId(0);
    /// No id has been assigned yet.
    pub const UNASSIGNED: PeerId = PeerId(-1);
    /// Destination meaning "every peer".
    pub const BROADCAST: PeerId = PeerId(-2);

    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: i16) -> Self {
        Self(raw)
    }

    /// Returns the raw wire value.
    #[must_use]
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Builds the id for a session table index.
    ///
    /// Returns `None` if the index does not fit the wire type.
    #[must_use]
    pub fn from_slot(slot: usize) -> Option<Self> {
        i16::try_from(slot).ok().map(Self)
    }

    /// Returns the session table index for this id, or `None` for sentinels.
    #[must_use]
    pub fn slot(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// Returns true for the broadcast sentinel.
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// Returns true when this id names a concrete slot.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BROADCAST => write!(f, "#broadcast"),
            Self::UNASSIGNED => write!(f, "#unassigned"),
            Self(id) => write!(f, "#{id}"),
        }
    }
}
