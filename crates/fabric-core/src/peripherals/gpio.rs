//! General-purpose I/O bank of up to eight pins.
//!
//! ```text
//! 0x0  out  RW  pins[W-1:0]  output levels
//! 0x4  oe   RW  pins[W-1:0]  output enables
//! 0x8  in   RO  pins[W-1:0]  sampled input levels
//! ```

use crate::{
    Access, AccessWidth, ConfigError, Field, Peripheral, PinState, Register, RegisterFile,
    RegisterId, Tick,
};

/// Widest supported bank.
pub const MAX_PINS: u8 = 8;

/// GPIO bank. Input levels driven by the host are sampled into `in` on each tick.
#[derive(Debug)]
pub struct Gpio {
    registers: RegisterFile,
    out: RegisterId,
    oe: RegisterId,
    input: RegisterId,
    mask: u32,
    levels: u32,
}

impl Gpio {
    /// Creates a bank of `width` pins.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPinCount`] outside `1..=8`.
    pub fn new(width: u8) -> Result<Self, ConfigError> {
        if width == 0 || width > MAX_PINS {
            return Err(ConfigError::InvalidPinCount { width });
        }
        let mut builder = RegisterFile::builder("gpio", 0x10);
        let out = builder.add(
            Register::new("out", 0x0, AccessWidth::Byte, Access::ReadWrite)
                .field(Field::plain("pins", 0, width)),
        );
        let oe = builder.add(
            Register::new("oe", 0x4, AccessWidth::Byte, Access::ReadWrite)
                .field(Field::plain("pins", 0, width)),
        );
        let input = builder.add(
            Register::new("in", 0x8, AccessWidth::Byte, Access::ReadOnly)
                .field(Field::plain("pins", 0, width)),
        );
        Ok(Self {
            registers: builder.build()?,
            out,
            oe,
            input,
            mask: (1 << width) - 1,
            levels: 0,
        })
    }
}

impl Peripheral for Gpio {
    fn class(&self) -> &'static str {
        "gpio"
    }

    fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    fn tick(&mut self, _tick: Tick) {
        self.registers.set_value(self.input, self.levels);
    }

    fn reset(&mut self) {
        self.registers.reset();
        self.levels = 0;
    }

    fn pins(&self) -> PinState {
        PinState {
            output: self.registers.value(self.out).unwrap_or(0) & self.mask,
            output_enable: self.registers.value(self.oe).unwrap_or(0) & self.mask,
        }
    }

    fn drive_inputs(&mut self, levels: u32) {
        self.levels = levels & self.mask;
    }
}
