//! First-order delta-sigma output modulator.
//!
//! Register map (8-byte window):
//!
//! ```text
//! 0x0  outval  2 bytes  RW  val[W-1:0]  code driving the modulator
//! 0x4  conf    1 byte   RW  en[0]       output enable (side-effecting)
//! ```

use tracing::debug;

use crate::{
    Access, AccessWidth, ConfigError, Field, FieldWrite, Peripheral, PinState, Register,
    RegisterFile, RegisterId, Tick,
};

/// Widest supported accumulator.
pub const MAX_BITWIDTH: u8 = 16;

/// Register-file window of one modulator.
pub const WINDOW_BYTES: u32 = 8;

/// Error-feedback accumulator of width `W`.
///
/// Each step compares `code` against the accumulator: `code >= acc` emits `1` and
/// moves the accumulator to `acc + (2^W - 1) - code`, otherwise it emits `0` and
/// moves to `acc - code`, both modulo `2^W`. Over any `2^W` consecutive steps the
/// density of ones approaches `code / (2^W - 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaSigmaCore {
    bitwidth: u8,
    mask: u32,
    accumulator: u32,
}

impl DeltaSigmaCore {
    /// Creates a zeroed accumulator of `bitwidth` bits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBitwidth`] outside `1..=16`.
    pub fn new(bitwidth: u8) -> Result<Self, ConfigError> {
        if bitwidth == 0 || bitwidth > MAX_BITWIDTH {
            return Err(ConfigError::InvalidBitwidth { bitwidth });
        }
        Ok(Self {
            bitwidth,
            mask: (1 << bitwidth) - 1,
            accumulator: 0,
        })
    }

    /// Accumulator width in bits.
    #[must_use]
    pub const fn bitwidth(&self) -> u8 {
        self.bitwidth
    }

    /// Largest code, `2^W - 1`.
    #[must_use]
    pub const fn max_code(&self) -> u32 {
        self.mask
    }

    /// Current accumulator value.
    #[must_use]
    pub const fn accumulator(&self) -> u32 {
        self.accumulator
    }

    /// Advances one cycle for `code` (truncated to `W` bits) and returns the output bit.
    pub fn step(&mut self, code: u32) -> bool {
        let code = code & self.mask;
        if code >= self.accumulator {
            self.accumulator = (self.accumulator + self.mask - code) & self.mask;
            true
        } else {
            self.accumulator = (self.accumulator - code) & self.mask;
            false
        }
    }

    /// Clears the accumulator.
    pub fn reset(&mut self) {
        self.accumulator = 0;
    }
}

/// Delta-sigma peripheral: the modulator core behind an `outval`/`conf` register file.
///
/// The accumulator runs every cycle; `en` only gates the pin.
#[derive(Debug)]
pub struct DeltaSigma {
    registers: RegisterFile,
    outval: RegisterId,
    core: DeltaSigmaCore,
    enabled: bool,
    output: bool,
}

impl DeltaSigma {
    /// Creates a modulator with a `bitwidth`-bit code register.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBitwidth`] outside `1..=16`.
    pub fn new(bitwidth: u8) -> Result<Self, ConfigError> {
        let core = DeltaSigmaCore::new(bitwidth)?;
        let mut builder = RegisterFile::builder("pdm", WINDOW_BYTES);
        let outval = builder.add(
            Register::new("outval", 0x0, AccessWidth::Half, Access::ReadWrite)
                .field(Field::plain("val", 0, bitwidth)),
        );
        builder.add(
            Register::new("conf", 0x4, AccessWidth::Byte, Access::ReadWrite)
                .field(Field::side_effecting("en", 0, 1)),
        );
        Ok(Self {
            registers: builder.build()?,
            outval,
            core,
            enabled: false,
            output: false,
        })
    }

    /// Modulator core.
    #[must_use]
    pub const fn core(&self) -> &DeltaSigmaCore {
        &self.core
    }

    /// Whether the output is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Output bit of the most recent cycle.
    #[must_use]
    pub const fn output(&self) -> bool {
        self.output
    }

    fn code(&self) -> u32 {
        self.registers.value(self.outval).unwrap_or(0) & self.core.max_code()
    }
}

impl Peripheral for DeltaSigma {
    fn class(&self) -> &'static str {
        "pdm"
    }

    fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    fn on_field_write(&mut self, write: &FieldWrite) {
        if write.field == "en" {
            self.enabled = write.value != 0;
            debug!(enabled = self.enabled, "delta-sigma enable changed");
        }
    }

    fn tick(&mut self, _tick: Tick) {
        let code = self.code();
        let bit = self.core.step(code);
        self.output = bit && self.enabled;
    }

    fn reset(&mut self) {
        self.registers.reset();
        self.core.reset();
        self.enabled = false;
        self.output = false;
    }

    fn pins(&self) -> PinState {
        PinState {
            output: u32::from(self.output),
            output_enable: 1,
        }
    }
}
