//! Word-to-byte protocol bridge in front of the CSR sub-decoder.

use tracing::trace;

use crate::{
    BusFault, CsrDecoder, Direction, Response, Tick, TraceEvent, TraceSink, Transaction,
    WordTarget,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Idle,
    Sequencing {
        request: Transaction,
        index: u8,
        data: u32,
        fault: Option<BusFault>,
    },
    Done(Response),
}

/// Splits each word transaction into `width` byte strobes, least significant first.
///
/// One strobe is issued per cycle, followed by one cycle to return the response, so
/// a transaction of `width` bytes completes on its `width + 1`th step. Write lanes
/// cleared in the byte-lane mask are skipped but still take their cycle. The access
/// is closed on the CSR bus after the last strobe, which commits written registers
/// and drops read latches. A faulting byte does not stop the sequence and the first
/// fault is reported.
#[derive(Debug)]
pub struct Bridge {
    csr: CsrDecoder,
    state: BridgeState,
}

impl Bridge {
    /// Places `csr` behind a bridge.
    #[must_use]
    pub const fn new(csr: CsrDecoder) -> Self {
        Self {
            csr,
            state: BridgeState::Idle,
        }
    }

    /// The CSR sub-decoder behind the bridge.
    #[must_use]
    pub const fn csr(&self) -> &CsrDecoder {
        &self.csr
    }

    /// Exclusive access to the CSR sub-decoder.
    pub fn csr_mut(&mut self) -> &mut CsrDecoder {
        &mut self.csr
    }

    /// Returns `true` while a transaction is being sequenced.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        !matches!(self.state, BridgeState::Idle)
    }

    fn strobe(
        &mut self,
        request: &Transaction,
        index: u8,
        tick: Tick,
        trace: &mut dyn TraceSink,
    ) -> Result<Option<u8>, BusFault> {
        let address = request.address.wrapping_add(u32::from(index));
        let byte = match request.direction {
            Direction::Read => self.csr.read_byte(address)?,
            Direction::Write => {
                if !request.byte_lanes.is_enabled(index) {
                    return Ok(None);
                }
                let byte = request.data.to_le_bytes()[usize::from(index)];
                self.csr.write_byte(address, byte)?;
                byte
            }
        };
        trace!(cycle = tick.cycle, address, byte, "bridge strobe");
        trace.on_event(TraceEvent::ByteStrobe {
            cycle: tick.cycle,
            address,
            direction: request.direction,
            data: byte,
        });
        Ok(Some(byte))
    }
}

impl WordTarget for Bridge {
    fn start(&mut self, request: Transaction) {
        self.state = BridgeState::Sequencing {
            request,
            index: 0,
            data: 0,
            fault: None,
        };
    }

    fn step(&mut self, tick: Tick, trace: &mut dyn TraceSink) -> Option<Response> {
        match self.state {
            BridgeState::Idle => None,
            BridgeState::Done(response) => {
                self.state = BridgeState::Idle;
                Some(response)
            }
            BridgeState::Sequencing {
                request,
                index,
                mut data,
                mut fault,
            } => {
                match self.strobe(&request, index, tick, trace) {
                    Ok(Some(byte)) if request.direction == Direction::Read => {
                        data |= u32::from(byte) << (8 * index);
                    }
                    Ok(_) => {}
                    Err(error) => {
                        fault.get_or_insert(error);
                    }
                }
                let index = index + 1;
                self.state = if index < request.width.bytes() {
                    BridgeState::Sequencing {
                        request,
                        index,
                        data,
                        fault,
                    }
                } else {
                    self.csr.end_access();
                    BridgeState::Done(fault.map_or(Response::Ack { data }, Response::Error))
                };
                None
            }
        }
    }

    fn tick(&mut self, tick: Tick) {
        self.csr.tick(tick);
    }

    fn reset(&mut self) {
        self.state = BridgeState::Idle;
        self.csr.reset();
    }
}
