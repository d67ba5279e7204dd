//! Access legality checks applied by the decoder before a target is reached.

use crate::{AccessWidth, AddressRange, BusFault};

/// Validates natural alignment of a system-bus access.
///
/// # Errors
///
/// Returns [`BusFault::Misaligned`] when `address` is not a multiple of the width.
pub const fn validate_alignment(address: u32, width: AccessWidth) -> Result<(), BusFault> {
    if address % width.bytes() as u32 == 0 {
        Ok(())
    } else {
        Err(BusFault::Misaligned)
    }
}

/// Validates that an access starting at local `offset` stays inside `range`.
///
/// # Errors
///
/// Returns [`BusFault::BoundaryCrossing`] when the last byte lies past the range end.
pub const fn validate_extent(
    range: AddressRange,
    offset: u32,
    width: AccessWidth,
) -> Result<(), BusFault> {
    if offset as u64 + width.bytes() as u64 <= range.size() as u64 {
        Ok(())
    } else {
        Err(BusFault::BoundaryCrossing)
    }
}
