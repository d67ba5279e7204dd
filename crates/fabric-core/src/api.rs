//! Host-facing stepping and trace contracts shared by every fabric component.
//!
//! Time is a single discrete base. Each component advances by exactly one step per
//! [`Tick`], and the tick (with its synchronous reset line) is passed explicitly into
//! every step function rather than read from ambient state.

use crate::{Direction, InitiatorId, Response};

/// One step of the global time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tick {
    /// Cycle index of this step.
    pub cycle: u64,
    /// Synchronous reset asserted for this cycle.
    pub reset: bool,
}

impl Tick {
    /// Creates a tick for `cycle` with reset deasserted.
    #[must_use]
    pub const fn new(cycle: u64) -> Self {
        Self {
            cycle,
            reset: false,
        }
    }

    /// Returns the same tick with reset asserted.
    #[must_use]
    pub const fn with_reset(self) -> Self {
        Self {
            cycle: self.cycle,
            reset: true,
        }
    }
}

/// Produces successive [`Tick`]s and owns the pending reset request.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    next_cycle: u64,
    reset_pending: bool,
}

impl Clock {
    /// Creates a clock whose first tick is cycle zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_cycle: 0,
            reset_pending: false,
        }
    }

    /// Number of ticks produced so far.
    #[must_use]
    pub const fn elapsed(&self) -> u64 {
        self.next_cycle
    }

    /// Requests reset for the next tick only.
    pub fn assert_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Produces the next tick.
    pub fn advance(&mut self) -> Tick {
        let tick = Tick {
            cycle: self.next_cycle,
            reset: self.reset_pending,
        };
        self.reset_pending = false;
        self.next_cycle = self.next_cycle.wrapping_add(1);
        tick
    }
}

/// Deterministic bus-monitor events emitted in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// The arbiter granted the system bus.
    Granted {
        /// Cycle of the grant.
        cycle: u64,
        /// Granted initiator.
        initiator: InitiatorId,
        /// System address of the granted transaction.
        address: u32,
    },
    /// The bridge strobed one byte on the CSR bus.
    ByteStrobe {
        /// Cycle of the strobe.
        cycle: u64,
        /// CSR bus address.
        address: u32,
        /// Strobe direction.
        direction: Direction,
        /// Byte written, or byte returned by a read.
        data: u8,
    },
    /// A transaction's response was delivered to its initiator.
    Completed {
        /// Cycle of completion.
        cycle: u64,
        /// Receiving initiator.
        initiator: InitiatorId,
        /// System address of the transaction.
        address: u32,
        /// Delivered response.
        response: Response,
    },
}

/// Sink for deterministic trace events.
pub trait TraceSink {
    /// Records an event in emission order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn on_event(&mut self, _event: TraceEvent) {}
}
