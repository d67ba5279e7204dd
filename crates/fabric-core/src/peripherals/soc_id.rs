//! Read-only identification block.

use crate::{Access, AccessWidth, ConfigError, Field, Peripheral, Register, RegisterFile};

/// Type identifier published by the reference SoC.
pub const REFERENCE_TYPE_ID: u32 = 0xCA7F_100F;

/// Exposes a hard-wired SoC type and version at `0x0` and `0x4`.
#[derive(Debug)]
pub struct SocId {
    registers: RegisterFile,
}

impl SocId {
    /// Creates the block.
    ///
    /// # Errors
    ///
    /// Never fails for the fixed register layout; the `Result` mirrors the other
    /// peripheral constructors.
    pub fn new(type_id: u32, version: u32) -> Result<Self, ConfigError> {
        let mut builder = RegisterFile::builder("soc_id", 8);
        builder.add(
            Register::new("type", 0x0, AccessWidth::Word, Access::ReadOnly)
                .field(Field::plain("type", 0, 32))
                .with_reset(type_id),
        );
        builder.add(
            Register::new("version", 0x4, AccessWidth::Word, Access::ReadOnly)
                .field(Field::plain("version", 0, 32))
                .with_reset(version),
        );
        Ok(Self {
            registers: builder.build()?,
        })
    }
}

impl Peripheral for SocId {
    fn class(&self) -> &'static str {
        "soc_id"
    }

    fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }
}
