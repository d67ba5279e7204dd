//! Address ranges, access checks, and the word-protocol memory targets.

/// Access legality checks applied before a target is reached.
pub mod access;
/// Disjoint address ranges and validated address maps.
pub mod map;
/// RAM and flash word targets.
pub mod store;

pub use access::{validate_alignment, validate_extent};
pub use map::{AddressMap, AddressRange, MapBuilder, Protocol, TargetDescriptor, TargetId};
pub use store::{Flash, Ram};
