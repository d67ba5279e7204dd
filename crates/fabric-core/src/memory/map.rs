//! Disjoint address ranges and the validated maps built from them.
//!
//! The same two-phase map backs the system decoder, the CSR sub-decoder and every
//! register file: a [`MapBuilder`] only appends, and [`MapBuilder::finish`] either
//! yields an immutable [`AddressMap`] whose half-open ranges never intersect or
//! rejects the configuration.

use std::fmt;

use crate::ConfigError;

/// Half-open interval `[base, base + size)` of a 32-bit address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressRange {
    base: u32,
    size: u32,
}

impl AddressRange {
    /// Creates an unvalidated range; maps reject empty or overflowing ranges.
    #[must_use]
    pub const fn new(base: u32, size: u32) -> Self {
        Self { base, size }
    }

    /// Inclusive start address.
    #[must_use]
    pub const fn base(self) -> u32 {
        self.base
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(self) -> u32 {
        self.size
    }

    /// Exclusive end address; may equal `2^32`.
    #[must_use]
    pub const fn end(self) -> u64 {
        self.base as u64 + self.size as u64
    }

    /// Returns `true` when `addr` falls inside the range.
    #[must_use]
    pub const fn contains(self, addr: u32) -> bool {
        addr >= self.base && (addr as u64) < self.end()
    }

    /// Returns `true` when the two ranges share at least one address.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        (self.base as u64) < other.end() && (other.base as u64) < self.end()
    }

    /// Returns the local offset of `addr`, when it falls inside the range.
    #[must_use]
    pub const fn offset_of(self, addr: u32) -> Option<u32> {
        if self.contains(addr) {
            Some(addr - self.base)
        } else {
            None
        }
    }

    /// Checks that the range is non-empty and fits the 32-bit address space.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyRange`] or [`ConfigError::RangeOverflow`].
    pub fn validate(self, name: &str) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::EmptyRange {
                name: name.to_string(),
            });
        }
        if self.end() > 1 << 32 {
            return Err(ConfigError::RangeOverflow {
                name: name.to_string(),
                base: self.base,
                size: self.size,
            });
        }
        Ok(())
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x})", self.base, self.end())
    }
}

/// Bus protocol spoken behind a mapped range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Protocol {
    /// Word-wide system-bus target.
    Word,
    /// Byte-wide CSR target.
    Byte,
}

/// Identifier of a mapped target, issued in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// Registration-order index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Static description of one mapped target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    /// Registration-order identifier.
    pub id: TargetId,
    /// Human-readable name used in logs and errors.
    pub name: String,
    /// Claimed address range.
    pub range: AddressRange,
    /// Protocol spoken behind the range.
    pub protocol: Protocol,
}

#[derive(Debug)]
struct MapEntry<T> {
    descriptor: TargetDescriptor,
    target: T,
}

/// Append-only collector of mapped targets.
#[derive(Debug)]
pub struct MapBuilder<T> {
    entries: Vec<MapEntry<T>>,
}

impl<T> Default for MapBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MapBuilder<T> {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a target; validation is deferred to [`Self::finish`].
    pub fn add(
        &mut self,
        name: impl Into<String>,
        range: AddressRange,
        protocol: Protocol,
        target: T,
    ) -> TargetId {
        let id = TargetId(self.entries.len());
        self.entries.push(MapEntry {
            descriptor: TargetDescriptor {
                id,
                name: name.into(),
                range,
                protocol,
            },
            target,
        });
        id
    }

    /// Number of appended targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates every range and freezes the map.
    ///
    /// # Errors
    ///
    /// Returns the first invalid range, or [`ConfigError::OverlappingRanges`] naming
    /// the lowest pair of intersecting targets.
    pub fn finish(mut self) -> Result<AddressMap<T>, ConfigError> {
        for entry in &self.entries {
            entry.descriptor.range.validate(&entry.descriptor.name)?;
        }

        self.entries.sort_by_key(|entry| entry.descriptor.range.base());

        // Sorted by base, any intersecting pair implies an intersecting neighbour pair.
        for pair in self.entries.windows(2) {
            let (lower, upper) = (&pair[0].descriptor, &pair[1].descriptor);
            if lower.range.overlaps(upper.range) {
                return Err(ConfigError::OverlappingRanges {
                    first: lower.name.clone(),
                    first_range: lower.range.to_string(),
                    second: upper.name.clone(),
                    second_range: upper.range.to_string(),
                });
            }
        }

        let mut slots = vec![0; self.entries.len()];
        for (slot, entry) in self.entries.iter().enumerate() {
            slots[entry.descriptor.id.index()] = slot;
        }

        Ok(AddressMap {
            entries: self.entries,
            slots,
        })
    }
}

/// Immutable, validated map from address to target.
#[derive(Debug)]
pub struct AddressMap<T> {
    entries: Vec<MapEntry<T>>,
    slots: Vec<usize>,
}

impl<T> AddressMap<T> {
    /// Number of mapped targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no targets are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the target whose range contains `addr` and the local offset within it.
    #[must_use]
    pub fn resolve(&self, addr: u32) -> Option<(TargetId, u32)> {
        let slot = self.slot_of(addr)?;
        let descriptor = &self.entries[slot].descriptor;
        descriptor
            .range
            .offset_of(addr)
            .map(|offset| (descriptor.id, offset))
    }

    /// Descriptor of a mapped target.
    #[must_use]
    pub fn descriptor(&self, id: TargetId) -> Option<&TargetDescriptor> {
        let slot = *self.slots.get(id.index())?;
        Some(&self.entries[slot].descriptor)
    }

    /// Shared access to a mapped target.
    #[must_use]
    pub fn get(&self, id: TargetId) -> Option<&T> {
        let slot = *self.slots.get(id.index())?;
        Some(&self.entries[slot].target)
    }

    /// Exclusive access to a mapped target.
    #[must_use]
    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut T> {
        let slot = *self.slots.get(id.index())?;
        Some(&mut self.entries[slot].target)
    }

    /// Descriptors in ascending address order.
    pub fn descriptors(&self) -> impl Iterator<Item = &TargetDescriptor> + '_ {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    /// Descriptor and target pairs in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (&TargetDescriptor, &T)> + '_ {
        self.entries
            .iter()
            .map(|entry| (&entry.descriptor, &entry.target))
    }

    /// Exclusive access to every target in ascending address order.
    pub fn targets_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.entries.iter_mut().map(|entry| &mut entry.target)
    }

    fn slot_of(&self, addr: u32) -> Option<usize> {
        let upper = self
            .entries
            .partition_point(|entry| entry.descriptor.range.base() <= addr);
        upper.checked_sub(1)
    }
}
