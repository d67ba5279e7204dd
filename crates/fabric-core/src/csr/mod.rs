//! Byte-wide control/status register side of the fabric.

/// Byte-granular sub-decoder over peripheral windows.
pub mod decoder;
/// Offset-addressed register storage with latching.
pub mod file;
/// Register, field and access-policy descriptions.
pub mod register;

pub use decoder::{CsrDecoder, CsrDecoderBuilder};
pub use file::{RegisterFile, RegisterFileBuilder};
pub use register::{Access, Field, FieldEffect, FieldWrite, Register, RegisterId};
