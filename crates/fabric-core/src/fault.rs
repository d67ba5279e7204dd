//! Fault and error taxonomy for build-time configuration and run-time bus responses.

use thiserror::Error;

use crate::InitiatorId;

/// Run-time fault carried by an `error` bus response.
///
/// Faults are recoverable by the initiator: the fabric never retries and never
/// substitutes a default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum BusFault {
    /// No target range covers the requested address.
    #[error("access to unmapped address")]
    Unmapped = 0x01,
    /// Address is not naturally aligned to the access width.
    #[error("access is not aligned to its width")]
    Misaligned = 0x02,
    /// Access starts inside a target but runs past the end of its range.
    #[error("access crosses the end of its target range")]
    BoundaryCrossing = 0x03,
    /// Write issued to a read-only memory target.
    #[error("write to read-only target")]
    WriteProtected = 0x04,
}

impl BusFault {
    /// Returns the stable one-byte code for this fault.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a stable one-byte code back into a fault.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Unmapped),
            0x02 => Some(Self::Misaligned),
            0x03 => Some(Self::BoundaryCrossing),
            0x04 => Some(Self::WriteProtected),
            _ => None,
        }
    }
}

/// Fatal configuration error. A fabric that fails validation is never built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A target or register was given a zero-sized range.
    #[error("`{name}` has an empty address range")]
    EmptyRange {
        /// Name of the offending target.
        name: String,
    },
    /// A range extends past the end of the 32-bit address space.
    #[error("`{name}` at {base:#010x} with size {size:#x} runs past the end of the address space")]
    RangeOverflow {
        /// Name of the offending target.
        name: String,
        /// Range base address.
        base: u32,
        /// Range size in bytes.
        size: u32,
    },
    /// Two ranges registered in the same decoder intersect.
    #[error("`{first}` {first_range} overlaps `{second}` {second_range}")]
    OverlappingRanges {
        /// Name of the lower target.
        first: String,
        /// Rendered range of the lower target.
        first_range: String,
        /// Name of the upper target.
        second: String,
        /// Rendered range of the upper target.
        second_range: String,
    },
    /// Two fields of one register occupy the same bit.
    #[error("fields `{first}` and `{second}` of register `{register}` overlap")]
    OverlappingFields {
        /// Register name.
        register: String,
        /// First declared field.
        first: String,
        /// Later declared field.
        second: String,
    },
    /// A field extends past the register width.
    #[error("field `{field}` of register `{register}` (bits {bit_offset}+{bit_width}) exceeds {register_bits} bits")]
    FieldOutOfRange {
        /// Register name.
        register: String,
        /// Field name.
        field: String,
        /// Field bit offset.
        bit_offset: u8,
        /// Field bit width.
        bit_width: u8,
        /// Register width in bits.
        register_bits: u8,
    },
    /// A field was declared with zero bits.
    #[error("field `{field}` of register `{register}` has zero width")]
    EmptyField {
        /// Register name.
        register: String,
        /// Field name.
        field: String,
    },
    /// A register does not fit inside its register file window.
    #[error("register `{register}` does not fit in the {window:#x}-byte window of `{file}`")]
    RegisterOutsideWindow {
        /// Register file name.
        file: String,
        /// Register name.
        register: String,
        /// Window size in bytes.
        window: u32,
    },
    /// Peripherals were added without a CSR window to bridge them.
    #[error("peripheral `{name}` requires a CSR window")]
    MissingCsrWindow {
        /// First peripheral that needed the window.
        name: String,
    },
    /// A peripheral's registers fall outside the CSR window.
    #[error("peripheral `{name}` at {base:#010x} lies outside the CSR window {window}")]
    PeripheralOutsideCsrWindow {
        /// Peripheral name.
        name: String,
        /// Absolute base address of the peripheral.
        base: u32,
        /// Rendered CSR window range.
        window: String,
    },
    /// Two initiators share a name.
    #[error("initiator `{name}` is declared twice")]
    DuplicateInitiator {
        /// Duplicated name.
        name: String,
    },
    /// A fabric needs at least one initiator.
    #[error("fabric has no initiators")]
    NoInitiators,
    /// Delta-sigma modulator width outside `1..=16`.
    #[error("modulator bit width {bitwidth} is outside 1..=16")]
    InvalidBitwidth {
        /// Requested width.
        bitwidth: u8,
    },
    /// GPIO bank width outside `1..=8`.
    #[error("gpio width {width} is outside 1..=8")]
    InvalidPinCount {
        /// Requested pin count.
        width: u8,
    },
    /// Memory image does not fit inside its memory.
    #[error("image of {image_len} bytes does not fit in `{name}` ({size} bytes)")]
    ImageTooLarge {
        /// Memory name.
        name: String,
        /// Image length in bytes.
        image_len: usize,
        /// Memory size in bytes.
        size: u32,
    },
}

/// Host misuse of an initiator port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SubmitError {
    /// The initiator id was not issued by this fabric.
    #[error("unknown initiator {0}")]
    UnknownInitiator(InitiatorId),
    /// The initiator already has a transaction in flight.
    #[error("initiator {0} already has a transaction in flight")]
    InitiatorBusy(InitiatorId),
    /// A reset tick dropped the transaction before it completed.
    #[error("transaction from initiator {0} was dropped by reset")]
    DroppedByReset(InitiatorId),
}
