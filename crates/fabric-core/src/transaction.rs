//! System-bus transaction and response types.

use std::fmt;

use crate::BusFault;

/// Identifier of an initiator port, issued in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InitiatorId(usize);

impl InitiatorId {
    /// Creates an identifier for the initiator at `index` in rotation order.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the rotation-order index of this initiator.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InitiatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// Target returns data to the initiator.
    Read,
    /// Initiator sends data to the target.
    Write,
}

/// Width of one transaction in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessWidth {
    /// 8-bit access.
    Byte = 1,
    /// 16-bit access.
    Half = 2,
    /// 32-bit access.
    Word = 4,
}

impl AccessWidth {
    /// Number of bytes moved by this width.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        self as u8
    }

    /// Number of bits moved by this width.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.bytes() * 8
    }

    /// Mask selecting the low `bits()` bits of a word.
    #[must_use]
    pub const fn value_mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Half => 0xFFFF,
            Self::Word => u32::MAX,
        }
    }

    /// Converts a byte count into a width.
    #[must_use]
    pub const fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Half),
            4 => Some(Self::Word),
            _ => None,
        }
    }
}

/// Byte-lane select for a transaction; bit `i` enables byte `i` (least significant first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ByteLanes(u8);

impl ByteLanes {
    /// Enables every lane covered by `width`.
    #[must_use]
    pub const fn full(width: AccessWidth) -> Self {
        Self((1 << width.bytes()) - 1)
    }

    /// Builds a lane mask from raw bits; only the low four bits are kept.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0F)
    }

    /// Raw lane bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when byte lane `lane` is enabled.
    #[must_use]
    pub const fn is_enabled(self, lane: u8) -> bool {
        lane < 8 && self.0 & (1 << lane) != 0
    }
}

/// One system-bus request. At most one is in flight per initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Transaction {
    /// Issuing initiator.
    pub initiator: InitiatorId,
    /// Target address; a local offset once the decoder forwards it.
    pub address: u32,
    /// Read or write.
    pub direction: Direction,
    /// Transfer width.
    pub width: AccessWidth,
    /// Write data, least significant byte first. Ignored for reads.
    pub data: u32,
    /// Valid byte lanes for sub-word writes.
    pub byte_lanes: ByteLanes,
}

impl Transaction {
    /// Creates a full-lane read.
    #[must_use]
    pub const fn read(initiator: InitiatorId, address: u32, width: AccessWidth) -> Self {
        Self {
            initiator,
            address,
            direction: Direction::Read,
            width,
            data: 0,
            byte_lanes: ByteLanes::full(width),
        }
    }

    /// Creates a full-lane write.
    #[must_use]
    pub const fn write(initiator: InitiatorId, address: u32, width: AccessWidth, data: u32) -> Self {
        Self {
            initiator,
            address,
            direction: Direction::Write,
            width,
            data: data & width.value_mask(),
            byte_lanes: ByteLanes::full(width),
        }
    }

    /// Restricts the transaction to `lanes`, clipped to its width.
    #[must_use]
    pub const fn with_byte_lanes(mut self, lanes: ByteLanes) -> Self {
        self.byte_lanes = ByteLanes::from_bits(lanes.bits() & ByteLanes::full(self.width).bits());
        self
    }

    /// Returns a copy addressed at `offset` instead of the system address.
    #[must_use]
    pub const fn at_offset(mut self, offset: u32) -> Self {
        self.address = offset;
        self
    }
}

/// Completion of one transaction: exactly one of `ack` or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Response {
    /// Transaction completed; `data` is valid for reads and zero for writes.
    Ack {
        /// Read data, least significant byte first.
        data: u32,
    },
    /// Target reported a fault.
    Error(BusFault),
}

impl Response {
    /// Returns `true` for an acknowledged transaction.
    #[must_use]
    pub const fn is_ack(self) -> bool {
        matches!(self, Self::Ack { .. })
    }

    /// Acknowledged data, if any.
    #[must_use]
    pub const fn data(self) -> Option<u32> {
        match self {
            Self::Ack { data } => Some(data),
            Self::Error(_) => None,
        }
    }

    /// Reported fault, if any.
    #[must_use]
    pub const fn fault(self) -> Option<BusFault> {
        match self {
            Self::Ack { .. } => None,
            Self::Error(fault) => Some(fault),
        }
    }
}
