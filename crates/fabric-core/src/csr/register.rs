//! Register and bit-field descriptions.

use crate::{AccessWidth, AddressRange, ConfigError};

/// Software access policy of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Access {
    /// Readable and writable.
    ReadWrite,
    /// Writes are accepted and discarded.
    ReadOnly,
    /// Reads return zero.
    WriteOnly,
}

impl Access {
    /// Returns `true` when reads observe the stored value.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::WriteOnly)
    }

    /// Returns `true` when writes update the stored value.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// What a committed write does to a field besides storing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FieldEffect {
    /// Store only.
    Plain,
    /// Store and notify the owning peripheral.
    SideEffecting,
}

/// Named bit range of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    /// Field name, unique within its register.
    pub name: &'static str,
    /// Least significant bit.
    pub bit_offset: u8,
    /// Number of bits.
    pub bit_width: u8,
    /// Write effect.
    pub effect: FieldEffect,
}

impl Field {
    /// A store-only field.
    #[must_use]
    pub const fn plain(name: &'static str, bit_offset: u8, bit_width: u8) -> Self {
        Self {
            name,
            bit_offset,
            bit_width,
            effect: FieldEffect::Plain,
        }
    }

    /// A field whose writes notify the owning peripheral.
    #[must_use]
    pub const fn side_effecting(name: &'static str, bit_offset: u8, bit_width: u8) -> Self {
        Self {
            name,
            bit_offset,
            bit_width,
            effect: FieldEffect::SideEffecting,
        }
    }

    /// Register bits covered by this field. Empty for out-of-range fields.
    #[must_use]
    pub const fn mask(self) -> u32 {
        let end = self.bit_offset as u32 + self.bit_width as u32;
        if self.bit_width == 0 || end > 32 {
            return 0;
        }
        let low = if self.bit_width == 32 {
            u32::MAX
        } else {
            (1 << self.bit_width) - 1
        };
        low << self.bit_offset
    }

    /// Extracts this field, right-aligned, from a register value.
    #[must_use]
    pub const fn extract(self, register_value: u32) -> u32 {
        (register_value & self.mask()) >> (self.bit_offset % 32)
    }
}

/// Identifier of a register inside its [`RegisterFile`](crate::RegisterFile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(pub(crate) usize);

impl RegisterId {
    /// Declaration-order index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Register of 1, 2 or 4 bytes at a fixed offset of its file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Register {
    /// Register name, unique within its file.
    pub name: &'static str,
    /// Byte offset within the register file window.
    pub offset: u32,
    /// Register width.
    pub width: AccessWidth,
    /// Software access policy.
    pub access: Access,
    /// Bit fields in declaration order.
    pub fields: Vec<Field>,
    /// Value after reset.
    pub reset_value: u32,
}

impl Register {
    /// Creates a register with no fields and a zero reset value.
    #[must_use]
    pub const fn new(name: &'static str, offset: u32, width: AccessWidth, access: Access) -> Self {
        Self {
            name,
            offset,
            width,
            access,
            fields: Vec::new(),
            reset_value: 0,
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the reset value, truncated to the register width.
    #[must_use]
    pub fn with_reset(mut self, value: u32) -> Self {
        self.reset_value = value & self.width.value_mask();
        self
    }

    /// Byte range claimed inside the file window.
    #[must_use]
    pub const fn range(&self) -> AddressRange {
        AddressRange::new(self.offset, self.width.bytes() as u32)
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Checks that fields are non-empty, in range and pairwise disjoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyField`], [`ConfigError::FieldOutOfRange`] or
    /// [`ConfigError::OverlappingFields`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let register_bits = self.width.bits();
        let mut claimed = 0u32;
        for field in &self.fields {
            if field.bit_width == 0 {
                return Err(ConfigError::EmptyField {
                    register: self.name.to_string(),
                    field: field.name.to_string(),
                });
            }
            if u16::from(field.bit_offset) + u16::from(field.bit_width) > u16::from(register_bits)
            {
                return Err(ConfigError::FieldOutOfRange {
                    register: self.name.to_string(),
                    field: field.name.to_string(),
                    bit_offset: field.bit_offset,
                    bit_width: field.bit_width,
                    register_bits,
                });
            }
            if claimed & field.mask() != 0 {
                let first = self
                    .fields
                    .iter()
                    .find(|earlier| earlier.mask() & field.mask() != 0)
                    .map_or("", |earlier| earlier.name);
                return Err(ConfigError::OverlappingFields {
                    register: self.name.to_string(),
                    first: first.to_string(),
                    second: field.name.to_string(),
                });
            }
            claimed |= field.mask();
        }
        Ok(())
    }
}

/// Side-effecting field update delivered to a peripheral when a write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldWrite {
    /// Register that committed.
    pub register: RegisterId,
    /// Name of that register.
    pub register_name: &'static str,
    /// Name of the written field.
    pub field: &'static str,
    /// New field value, right-aligned.
    pub value: u32,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Access, Field, Register};
    use crate::{AccessWidth, ConfigError};

    #[rstest]
    #[case(Field::plain("val", 0, 10), 0x0000_03FF)]
    #[case(Field::plain("en", 0, 1), 0x0000_0001)]
    #[case(Field::plain("hi", 24, 8), 0xFF00_0000)]
    #[case(Field::plain("all", 0, 32), u32::MAX)]
    #[case(Field::plain("past", 30, 4), 0)]
    fn mask_covers_declared_bits(#[case] field: Field, #[case] expected: u32) {
        assert_eq!(field.mask(), expected);
    }

    #[test]
    fn extract_right_aligns() {
        let field = Field::plain("mid", 4, 4);
        assert_eq!(field.extract(0xABCD), 0xC);
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let register = Register::new("conf", 0x4, AccessWidth::Byte, Access::ReadWrite)
            .field(Field::plain("mode", 0, 3))
            .field(Field::side_effecting("en", 2, 1));
        assert_eq!(
            register.validate(),
            Err(ConfigError::OverlappingFields {
                register: "conf".to_string(),
                first: "mode".to_string(),
                second: "en".to_string(),
            })
        );
    }

    #[test]
    fn fields_past_the_register_width_are_rejected() {
        let register = Register::new("outval", 0x0, AccessWidth::Byte, Access::ReadWrite)
            .field(Field::plain("val", 0, 10));
        assert!(matches!(
            register.validate(),
            Err(ConfigError::FieldOutOfRange { register_bits: 8, .. })
        ));
    }

    #[test]
    fn zero_width_fields_are_rejected() {
        let register = Register::new("conf", 0x4, AccessWidth::Byte, Access::ReadWrite)
            .field(Field::plain("none", 0, 0));
        assert!(matches!(register.validate(), Err(ConfigError::EmptyField { .. })));
    }

    #[test]
    fn reset_value_is_truncated_to_width() {
        let register =
            Register::new("id", 0, AccessWidth::Half, Access::ReadOnly).with_reset(0xCA7F_100F);
        assert_eq!(register.reset_value, 0x100F);
    }
}
