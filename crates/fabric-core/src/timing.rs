//! Fixed cycle costs of the bus timing model.

use crate::AccessWidth;

/// Cycles for a word target (RAM, flash) to answer one transaction.
pub const WORD_ACCESS_CYCLES: u64 = 1;
/// Cycles to answer a transaction the decoder faults without reaching a target.
pub const FAULT_RESPONSE_CYCLES: u64 = 1;
/// Cycles per byte strobe on the CSR bus.
pub const CSR_STROBE_CYCLES: u64 = 1;
/// Fixed bridge cycles on top of the byte strobes.
pub const BRIDGE_OVERHEAD_CYCLES: u64 = 1;

/// Timed operations of the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCostKind {
    /// Word-protocol target access.
    WordAccess,
    /// Decoder-level fault (unmapped, misaligned, boundary crossing).
    FaultResponse,
    /// One CSR byte strobe.
    CsrStrobe,
    /// Bridge response cycle after the last strobe.
    BridgeOverhead,
}

/// Single source-of-truth cycle-cost table.
pub const CYCLE_COST_TABLE: &[(CycleCostKind, u64)] = &[
    (CycleCostKind::WordAccess, WORD_ACCESS_CYCLES),
    (CycleCostKind::FaultResponse, FAULT_RESPONSE_CYCLES),
    (CycleCostKind::CsrStrobe, CSR_STROBE_CYCLES),
    (CycleCostKind::BridgeOverhead, BRIDGE_OVERHEAD_CYCLES),
];

/// Looks up the cycle cost for a cycle-cost kind.
#[must_use]
pub fn cycle_cost(kind: CycleCostKind) -> Option<u64> {
    CYCLE_COST_TABLE
        .iter()
        .find_map(|(entry_kind, cycles)| (*entry_kind == kind).then_some(*cycles))
}

/// Total cycles of one bridged transaction of `width` bytes.
#[must_use]
pub const fn bridged_transaction_cycles(width: AccessWidth) -> u64 {
    width.bytes() as u64 * CSR_STROBE_CYCLES + BRIDGE_OVERHEAD_CYCLES
}
