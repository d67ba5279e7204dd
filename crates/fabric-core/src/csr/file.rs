//! Byte-addressed register file with read latching and write shadowing.

use crate::{AddressMap, ConfigError, FieldEffect, FieldWrite, MapBuilder, Protocol};

use super::register::{Register, RegisterId};

/// Append-only builder for a [`RegisterFile`].
#[derive(Debug)]
pub struct RegisterFileBuilder {
    name: String,
    window: u32,
    registers: Vec<Register>,
}

impl RegisterFileBuilder {
    /// Appends a register; validation is deferred to [`Self::build`].
    pub fn add(&mut self, register: Register) -> RegisterId {
        self.registers.push(register);
        RegisterId(self.registers.len() - 1)
    }

    /// Validates every register and freezes the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for invalid fields, registers outside the window, or
    /// overlapping registers.
    pub fn build(self) -> Result<RegisterFile, ConfigError> {
        let mut map = MapBuilder::new();
        for register in &self.registers {
            register.validate()?;
            if register.range().end() > u64::from(self.window) {
                return Err(ConfigError::RegisterOutsideWindow {
                    file: self.name.clone(),
                    register: register.name.to_string(),
                    window: self.window,
                });
            }
            map.add(register.name, register.range(), Protocol::Byte, ());
        }
        let map = map.finish()?;

        let values: Vec<u32> = self.registers.iter().map(|r| r.reset_value).collect();
        Ok(RegisterFile {
            name: self.name,
            window: self.window,
            map,
            read_shadow: vec![0; values.len()],
            write_shadow: values.clone(),
            values,
            registers: self.registers,
            read_latch: None,
            write_open: None,
        })
    }
}

/// Offset-addressed registers of one peripheral instance, accessed a byte at a time.
///
/// A multi-byte register never tears. The first byte read from a register during an
/// access latches its whole value, and every later byte of that access is served
/// from the latch. Written bytes collect in a shadow seeded from the current value
/// on the first written byte, and the shadow commits as one update when the access
/// ends (see [`Self::end_access`]) or moves on to another register. Bytes the
/// access never touched keep their committed value.
///
/// Offsets inside the window that no register claims read as zero and ignore writes.
#[derive(Debug)]
pub struct RegisterFile {
    name: String,
    window: u32,
    map: AddressMap<()>,
    registers: Vec<Register>,
    values: Vec<u32>,
    read_shadow: Vec<u32>,
    write_shadow: Vec<u32>,
    read_latch: Option<RegisterId>,
    write_open: Option<RegisterId>,
}

impl RegisterFile {
    /// Starts building a file named `name` that decodes `window` bytes.
    #[must_use]
    pub fn builder(name: impl Into<String>, window: u32) -> RegisterFileBuilder {
        RegisterFileBuilder {
            name: name.into(),
            window,
            registers: Vec::new(),
        }
    }

    /// File name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded window size in bytes.
    #[must_use]
    pub const fn window(&self) -> u32 {
        self.window
    }

    /// Registers in declaration order.
    #[must_use]
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// Looks up a register by name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<RegisterId> {
        self.registers
            .iter()
            .position(|register| register.name == name)
            .map(RegisterId)
    }

    /// Committed value of a register.
    #[must_use]
    pub fn value(&self, id: RegisterId) -> Option<u32> {
        self.values.get(id.index()).copied()
    }

    /// Committed value of `field` in `register`, right-aligned.
    #[must_use]
    pub fn field_value(&self, register: &str, field: &str) -> Option<u32> {
        let id = self.id_of(register)?;
        let field = self.registers[id.index()].find_field(field)?;
        Some(field.extract(self.values[id.index()]))
    }

    /// Overwrites a register from the hardware side, bypassing the access policy.
    pub fn set_value(&mut self, id: RegisterId, value: u32) {
        if let (Some(register), Some(slot)) =
            (self.registers.get(id.index()), self.values.get_mut(id.index()))
        {
            *slot = value & register.width.value_mask();
        }
    }

    /// Reads the byte at `offset`.
    pub fn read(&mut self, offset: u32) -> u8 {
        let Some((id, lane)) = self.locate(offset) else {
            return 0;
        };
        if self.read_latch != Some(id) {
            self.read_shadow[id.index()] = if self.registers[id.index()].access.is_readable() {
                self.values[id.index()]
            } else {
                0
            };
            self.read_latch = Some(id);
        }
        byte_of(self.read_shadow[id.index()], lane)
    }

    /// Writes the byte at `offset`.
    ///
    /// Returns the side-effecting field updates of a register whose open write was
    /// committed because this byte targets a different register; usually empty.
    pub fn write(&mut self, offset: u32, data: u8) -> Vec<FieldWrite> {
        let Some((id, lane)) = self.locate(offset) else {
            return Vec::new();
        };
        if !self.registers[id.index()].access.is_writable() {
            return Vec::new();
        }
        let mut committed = Vec::new();
        if self.write_open != Some(id) {
            committed = self.commit();
            self.write_shadow[id.index()] = self.values[id.index()];
            self.write_open = Some(id);
        }
        let shadow = &mut self.write_shadow[id.index()];
        *shadow = (*shadow & !(0xFF << (8 * lane))) | u32::from(data) << (8 * lane);
        committed
    }

    /// Closes the current access: drops the read latch and commits the open write.
    ///
    /// Returns the side-effecting field updates of the committed register.
    pub fn end_access(&mut self) -> Vec<FieldWrite> {
        self.read_latch = None;
        self.commit()
    }

    fn commit(&mut self) -> Vec<FieldWrite> {
        let Some(id) = self.write_open.take() else {
            return Vec::new();
        };
        let register = &self.registers[id.index()];
        let committed = self.write_shadow[id.index()] & register.width.value_mask();
        self.values[id.index()] = committed;
        register
            .fields
            .iter()
            .filter(|field| field.effect == FieldEffect::SideEffecting)
            .map(|field| FieldWrite {
                register: id,
                register_name: register.name,
                field: field.name,
                value: field.extract(committed),
            })
            .collect()
    }

    /// Restores reset values and abandons any partial access.
    pub fn reset(&mut self) {
        for (slot, register) in self.values.iter_mut().zip(&self.registers) {
            *slot = register.reset_value;
        }
        self.read_shadow.fill(0);
        self.write_shadow.clone_from(&self.values);
        self.read_latch = None;
        self.write_open = None;
    }

    fn locate(&self, offset: u32) -> Option<(RegisterId, u32)> {
        let (target, lane) = self.map.resolve(offset)?;
        Some((RegisterId(target.index()), lane))
    }
}

const fn byte_of(value: u32, lane: u32) -> u8 {
    (value >> (8 * lane)).to_le_bytes()[0]
}

#[cfg(test)]
mod tests {
    use super::RegisterFile;
    use crate::{Access, AccessWidth, ConfigError, Field, FieldWrite, Register};

    fn pdm_like() -> RegisterFile {
        let mut builder = RegisterFile::builder("pdm", 8);
        builder.add(
            Register::new("outval", 0x0, AccessWidth::Half, Access::ReadWrite)
                .field(Field::plain("val", 0, 10)),
        );
        builder.add(
            Register::new("conf", 0x4, AccessWidth::Byte, Access::ReadWrite)
                .field(Field::side_effecting("en", 0, 1)),
        );
        builder.build().expect("valid file")
    }

    #[test]
    fn byte_register_round_trips_and_notifies() {
        let mut file = pdm_like();
        assert!(file.write(0x4, 0x01).is_empty());
        let writes = file.end_access();
        assert_eq!(writes.len(), 1);
        assert!(matches!(
            writes[0],
            FieldWrite {
                register_name: "conf",
                field: "en",
                value: 1,
                ..
            }
        ));
        assert_eq!(file.read(0x4), 0x01);
        assert_eq!(file.field_value("conf", "en"), Some(1));
    }

    #[test]
    fn multi_byte_write_commits_when_the_access_ends() {
        let mut file = pdm_like();
        let outval = file.id_of("outval").expect("outval");
        assert!(file.write(0x0, 0xFF).is_empty());
        assert!(file.write(0x1, 0x03).is_empty());
        assert_eq!(file.value(outval), Some(0));
        assert!(file.end_access().is_empty());
        assert_eq!(file.value(outval), Some(0x03FF));
    }

    #[test]
    fn partial_write_keeps_untouched_bytes() {
        let mut file = pdm_like();
        let outval = file.id_of("outval").expect("outval");
        file.set_value(outval, 0x0155);
        file.write(0x0, 0xAA);
        file.end_access();
        assert_eq!(file.value(outval), Some(0x01AA));

        file.write(0x1, 0x02);
        file.end_access();
        assert_eq!(file.value(outval), Some(0x02AA));
    }

    #[test]
    fn moving_to_another_register_commits_the_open_write() {
        let mut file = pdm_like();
        let outval = file.id_of("outval").expect("outval");
        file.write(0x0, 0x34);
        let writes = file.write(0x4, 0x01);
        assert!(writes.is_empty());
        assert_eq!(file.value(outval), Some(0x34));
        assert_eq!(file.end_access().len(), 1);
    }

    #[test]
    fn multi_byte_read_is_served_from_the_latch() {
        let mut file = pdm_like();
        let outval = file.id_of("outval").expect("outval");
        file.set_value(outval, 0x0102);
        assert_eq!(file.read(0x0), 0x02);
        file.set_value(outval, 0x0304);
        assert_eq!(file.read(0x1), 0x01);
        file.end_access();
        assert_eq!(file.read(0x1), 0x03);
    }

    #[test]
    fn partial_read_latch_does_not_outlive_the_access() {
        let mut file = pdm_like();
        let outval = file.id_of("outval").expect("outval");
        file.set_value(outval, 0x0102);
        assert_eq!(file.read(0x0), 0x02);
        file.end_access();

        file.write(0x0, 0x04);
        file.write(0x1, 0x03);
        file.end_access();
        assert_eq!(file.read(0x1), 0x03);
    }

    #[test]
    fn holes_read_zero_and_ignore_writes() {
        let mut file = pdm_like();
        assert!(file.write(0x6, 0xAA).is_empty());
        assert_eq!(file.read(0x6), 0);
        assert_eq!(file.read(0x40), 0);
    }

    #[test]
    fn access_policy_is_enforced_silently() {
        let mut builder = RegisterFile::builder("policy", 4);
        let ro = builder
            .add(Register::new("status", 0, AccessWidth::Byte, Access::ReadOnly).with_reset(0x5A));
        builder.add(Register::new("kick", 1, AccessWidth::Byte, Access::WriteOnly));
        let mut file = builder.build().expect("valid file");

        file.write(0, 0xFF);
        file.end_access();
        assert_eq!(file.value(ro), Some(0x5A));
        assert_eq!(file.read(0), 0x5A);

        file.write(1, 0x77);
        file.end_access();
        assert_eq!(file.read(1), 0);
    }

    #[test]
    fn reset_restores_reset_values() {
        let mut file = pdm_like();
        file.write(0x4, 0x01);
        file.write(0x0, 0x12);
        file.reset();
        assert_eq!(file.field_value("conf", "en"), Some(0));
        file.write(0x1, 0x00);
        assert_eq!(file.read(0x0), 0x00);
    }

    #[test]
    fn overlapping_registers_are_rejected() {
        let mut builder = RegisterFile::builder("bad", 8);
        builder.add(Register::new("wide", 0, AccessWidth::Word, Access::ReadWrite));
        builder.add(Register::new("inner", 2, AccessWidth::Byte, Access::ReadWrite));
        assert!(matches!(
            builder.build(),
            Err(ConfigError::OverlappingRanges { .. })
        ));
    }

    #[test]
    fn registers_must_fit_the_window() {
        let mut builder = RegisterFile::builder("small", 4);
        builder.add(Register::new("wide", 2, AccessWidth::Word, Access::ReadWrite));
        assert!(matches!(
            builder.build(),
            Err(ConfigError::RegisterOutsideWindow { window: 4, .. })
        ));
    }
}
