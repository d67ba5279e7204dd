//! Byte-granular sub-decoder routing CSR accesses to peripheral register files.

use tracing::trace;

use crate::{
    AddressMap, AddressRange, BusFault, ConfigError, Direction, MapBuilder, Peripheral, Protocol,
    TargetDescriptor, Tick,
};

/// Append-only builder for a [`CsrDecoder`].
#[derive(Debug, Default)]
pub struct CsrDecoderBuilder {
    map: MapBuilder<Box<dyn Peripheral>>,
}

impl CsrDecoderBuilder {
    /// Maps `peripheral`'s register file window at CSR offset `base`.
    pub fn add(&mut self, name: impl Into<String>, base: u32, peripheral: Box<dyn Peripheral>) {
        let range = AddressRange::new(base, peripheral.registers().window());
        self.map.add(name, range, Protocol::Byte, peripheral);
    }

    /// Validates the windows and freezes the sub-decoder.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for empty, overflowing or overlapping windows.
    pub fn build(self) -> Result<CsrDecoder, ConfigError> {
        Ok(CsrDecoder {
            map: self.map.finish()?,
        })
    }
}

/// Routes byte accesses on the CSR bus to the peripheral whose window contains them.
///
/// Completion is implicit: every byte finishes in the cycle it is strobed. A
/// multi-byte access is closed with [`Self::end_access`], which commits the written
/// registers and releases read latches.
#[derive(Debug)]
pub struct CsrDecoder {
    map: AddressMap<Box<dyn Peripheral>>,
}

impl CsrDecoder {
    /// Starts building a sub-decoder.
    #[must_use]
    pub fn builder() -> CsrDecoderBuilder {
        CsrDecoderBuilder::default()
    }

    /// Peripheral windows in ascending address order.
    pub fn windows(&self) -> impl Iterator<Item = &TargetDescriptor> + '_ {
        self.map.descriptors()
    }

    /// Shared access to a peripheral by name.
    #[must_use]
    pub fn peripheral(&self, name: &str) -> Option<&dyn Peripheral> {
        self.map
            .iter()
            .find(|(descriptor, _)| descriptor.name == name)
            .map(|(_, peripheral)| &**peripheral)
    }

    /// Exclusive access to a peripheral by name.
    #[must_use]
    pub fn peripheral_mut(&mut self, name: &str) -> Option<&mut dyn Peripheral> {
        let id = self
            .map
            .descriptors()
            .find(|descriptor| descriptor.name == name)?
            .id;
        Some(&mut **self.map.get_mut(id)?)
    }

    /// Performs one byte access. Reads yield the byte; writes yield zero.
    ///
    /// # Errors
    ///
    /// Returns [`BusFault::Unmapped`] when no peripheral window contains `address`.
    pub fn route_byte(
        &mut self,
        address: u32,
        direction: Direction,
        data: u8,
    ) -> Result<u8, BusFault> {
        match direction {
            Direction::Read => self.read_byte(address),
            Direction::Write => self.write_byte(address, data).map(|()| 0),
        }
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`BusFault::Unmapped`] when no peripheral window contains `address`.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, BusFault> {
        let (id, offset) = self.map.resolve(address).ok_or(BusFault::Unmapped)?;
        let peripheral = self.map.get_mut(id).ok_or(BusFault::Unmapped)?;
        let data = peripheral.registers_mut().read(offset);
        trace!(address, offset, data, "csr read");
        Ok(data)
    }

    /// Writes one byte and forwards committed side-effecting fields to the peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`BusFault::Unmapped`] when no peripheral window contains `address`.
    pub fn write_byte(&mut self, address: u32, data: u8) -> Result<(), BusFault> {
        let (id, offset) = self.map.resolve(address).ok_or(BusFault::Unmapped)?;
        let peripheral = self.map.get_mut(id).ok_or(BusFault::Unmapped)?;
        trace!(address, offset, data, "csr write");
        for write in peripheral.registers_mut().write(offset, data) {
            peripheral.on_field_write(&write);
        }
        Ok(())
    }

    /// Closes the current access in every register file and forwards the committed
    /// side-effecting fields to their peripherals.
    pub fn end_access(&mut self) {
        for peripheral in self.map.targets_mut() {
            for write in peripheral.registers_mut().end_access() {
                peripheral.on_field_write(&write);
            }
        }
    }

    /// Advances every peripheral by one cycle.
    pub fn tick(&mut self, tick: Tick) {
        for peripheral in self.map.targets_mut() {
            peripheral.tick(tick);
        }
    }

    /// Resets every peripheral.
    pub fn reset(&mut self) {
        for peripheral in self.map.targets_mut() {
            peripheral.reset();
        }
    }
}
