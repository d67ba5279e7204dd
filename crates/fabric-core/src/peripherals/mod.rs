//! Register-mapped peripherals attached behind the CSR sub-decoder.

use std::fmt;

use crate::{FieldWrite, RegisterFile, Tick};

/// Delta-sigma (PDM) output modulator.
pub mod delta_sigma;
/// General-purpose I/O bank.
pub mod gpio;
/// Read-only SoC identification block.
pub mod soc_id;

pub use delta_sigma::{DeltaSigma, DeltaSigmaCore, MAX_BITWIDTH};
pub use gpio::{Gpio, MAX_PINS};
pub use soc_id::{SocId, REFERENCE_TYPE_ID};

/// Pad-facing outputs of a peripheral; bit `i` is pin `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PinState {
    /// Driven output levels.
    pub output: u32,
    /// Output-enable mask.
    pub output_enable: u32,
}

/// Register-bus contract of a peripheral.
///
/// The CSR sub-decoder owns the register file accesses; a peripheral only reacts
/// to side-effecting field writes and advances its own hardware once per tick.
pub trait Peripheral: fmt::Debug {
    /// Stable class name published in peripheral descriptors.
    fn class(&self) -> &'static str;

    /// The peripheral's register file.
    fn registers(&self) -> &RegisterFile;

    /// Exclusive access to the register file.
    fn registers_mut(&mut self) -> &mut RegisterFile;

    /// Called once per side-effecting field of a committed register write.
    fn on_field_write(&mut self, _write: &FieldWrite) {}

    /// Advances hardware state by one cycle.
    fn tick(&mut self, _tick: Tick) {}

    /// Returns registers and hardware state to reset.
    fn reset(&mut self) {
        self.registers_mut().reset();
    }

    /// Current pad outputs.
    fn pins(&self) -> PinState {
        PinState::default()
    }

    /// Samples pad inputs; bit `i` is pin `i`.
    fn drive_inputs(&mut self, _levels: u32) {}
}
