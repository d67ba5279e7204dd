//! Cycle-stepped on-chip interconnect fabric.
//!
//! Initiators reach RAM, flash and a cluster of byte-wide register files through a
//! round-robin [`Arbiter`], a system [`Decoder`], and a word-to-byte [`Bridge`] in
//! front of the [`CsrDecoder`]. Everything advances one [`Tick`] at a time.

/// Fault and configuration error taxonomy.
pub mod fault;
pub use fault::{BusFault, ConfigError, SubmitError};

/// System-bus transaction and response types.
pub mod transaction;
pub use transaction::{AccessWidth, ByteLanes, Direction, InitiatorId, Response, Transaction};

/// Host-facing stepping and trace contracts.
pub mod api;
pub use api::{Clock, NoTrace, Tick, TraceEvent, TraceSink};

/// Fixed cycle-cost table of the bus timing model.
pub mod timing;
pub use timing::{
    bridged_transaction_cycles, cycle_cost, CycleCostKind, BRIDGE_OVERHEAD_CYCLES,
    CSR_STROBE_CYCLES, CYCLE_COST_TABLE, FAULT_RESPONSE_CYCLES, WORD_ACCESS_CYCLES,
};

/// Address ranges, validated maps, and memory targets.
pub mod memory;
pub use memory::{
    validate_alignment, validate_extent, AddressMap, AddressRange, Flash, MapBuilder, Protocol,
    Ram, TargetDescriptor, TargetId,
};

/// Round-robin initiator arbitration.
pub mod arbiter;
pub use arbiter::{Arbiter, GrantToken};

/// System address decoder and the word-target contract.
pub mod decoder;
pub use decoder::{Decoder, DecoderBuilder, WordTarget};

/// Register files and the CSR sub-decoder.
pub mod csr;
pub use csr::{
    Access, CsrDecoder, CsrDecoderBuilder, Field, FieldEffect, FieldWrite, Register, RegisterFile,
    RegisterFileBuilder, RegisterId,
};

/// Word-to-byte protocol bridge.
pub mod bridge;
pub use bridge::Bridge;

/// Peripherals behind the CSR bus.
pub mod peripherals;
pub use peripherals::{
    DeltaSigma, DeltaSigmaCore, Gpio, Peripheral, PinState, SocId, MAX_BITWIDTH, MAX_PINS,
    REFERENCE_TYPE_ID,
};

/// Assembled fabric and its builder.
pub mod fabric;
pub use fabric::{Completion, Fabric, FabricBuilder, PeripheralDescriptor, SystemTarget};

/// Plain-data fabric descriptions.
pub mod config;
pub use config::{CsrWindowConfig, FabricConfig, MemoryConfig, MemoryKind, PeripheralConfig};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
