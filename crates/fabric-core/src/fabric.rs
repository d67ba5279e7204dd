//! The assembled fabric: initiator ports, arbiter, decoder and the bridged CSR cluster.

use tracing::{debug, info, warn};

use crate::{
    AddressRange, Arbiter, Bridge, Clock, ConfigError, CsrDecoder, Decoder, DecoderBuilder, Flash,
    GrantToken, InitiatorId, Peripheral, Protocol, Ram, Response, SubmitError, TargetDescriptor,
    TargetId, Tick, TraceEvent, TraceSink, Transaction, WordTarget,
};

/// Static description of one peripheral, published unmodified for header generators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PeripheralDescriptor {
    /// Instance name, e.g. `PDM0`.
    pub name: String,
    /// Peripheral class, e.g. `pdm`.
    pub class: String,
    /// Absolute system-bus base address.
    pub base_address: u32,
}

/// Word-protocol target mapped by the fabric's system decoder.
#[derive(Debug)]
pub enum SystemTarget {
    /// Read/write memory.
    Ram(Ram),
    /// Read-only memory.
    Flash(Flash),
    /// Bridge to the CSR cluster.
    Bridge(Bridge),
}

impl WordTarget for SystemTarget {
    fn start(&mut self, request: Transaction) {
        match self {
            Self::Ram(ram) => ram.start(request),
            Self::Flash(flash) => flash.start(request),
            Self::Bridge(bridge) => bridge.start(request),
        }
    }

    fn step(&mut self, tick: Tick, trace: &mut dyn TraceSink) -> Option<Response> {
        match self {
            Self::Ram(ram) => ram.step(tick, trace),
            Self::Flash(flash) => flash.step(tick, trace),
            Self::Bridge(bridge) => bridge.step(tick, trace),
        }
    }

    fn tick(&mut self, tick: Tick) {
        if let Self::Bridge(bridge) = self {
            bridge.tick(tick);
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Ram(ram) => ram.reset(),
            Self::Flash(flash) => flash.reset(),
            Self::Bridge(bridge) => bridge.reset(),
        }
    }
}

/// Outcome of one transaction, collected with [`Fabric::take_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Completion {
    /// The transaction as submitted.
    pub transaction: Transaction,
    /// Delivered response.
    pub response: Response,
    /// Cycle on which the arbiter granted the bus.
    pub granted_at: u64,
    /// Cycle on which the response was delivered.
    pub completed_at: u64,
}

impl Completion {
    /// Cycles the transaction held the bus, grant and completion cycles included.
    #[must_use]
    pub const fn bus_cycles(&self) -> u64 {
        self.completed_at - self.granted_at + 1
    }
}

#[derive(Debug)]
struct Port {
    name: String,
    pending: Option<Transaction>,
    completion: Option<Completion>,
}

#[derive(Debug)]
struct Active {
    token: GrantToken,
    transaction: Transaction,
    granted_at: u64,
}

struct PendingPeripheral {
    name: String,
    base: u32,
    peripheral: Box<dyn Peripheral>,
}

/// Two-phase builder: append initiators, memories and peripherals, then [`Self::build`].
#[derive(Default)]
pub struct FabricBuilder {
    initiators: Vec<String>,
    memories: DecoderBuilder<SystemTarget>,
    csr_window: Option<(String, AddressRange)>,
    peripherals: Vec<PendingPeripheral>,
}

impl FabricBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an initiator port; ports rotate in the order they are added.
    pub fn initiator(&mut self, name: impl Into<String>) -> InitiatorId {
        self.initiators.push(name.into());
        InitiatorId::new(self.initiators.len() - 1)
    }

    /// Maps zeroed RAM of `size` bytes at `base`.
    pub fn ram(&mut self, name: impl Into<String>, base: u32, size: u32) -> &mut Self {
        self.memories.add(
            name,
            AddressRange::new(base, size),
            Protocol::Word,
            SystemTarget::Ram(Ram::new(size)),
        );
        self
    }

    /// Maps `flash` at `base`.
    pub fn flash(&mut self, name: impl Into<String>, base: u32, flash: Flash) -> &mut Self {
        let range = AddressRange::new(base, flash.size());
        self.memories
            .add(name, range, Protocol::Word, SystemTarget::Flash(flash));
        self
    }

    /// Claims `[base, base + size)` for the bridged CSR cluster.
    pub fn csr_window(&mut self, name: impl Into<String>, base: u32, size: u32) -> &mut Self {
        self.csr_window = Some((name.into(), AddressRange::new(base, size)));
        self
    }

    /// Attaches a peripheral whose register window starts at absolute address `base`.
    pub fn peripheral(
        &mut self,
        name: impl Into<String>,
        base: u32,
        peripheral: Box<dyn Peripheral>,
    ) -> &mut Self {
        self.peripherals.push(PendingPeripheral {
            name: name.into(),
            base,
            peripheral,
        });
        self
    }

    /// Validates the whole configuration and freezes the fabric.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when there are no initiators or duplicate ones, when a
    /// peripheral has no CSR window or falls outside it, and for any invalid or
    /// overlapping range in the system decoder or the CSR sub-decoder.
    pub fn build(self) -> Result<Fabric, ConfigError> {
        if self.initiators.is_empty() {
            return Err(ConfigError::NoInitiators);
        }
        for (index, name) in self.initiators.iter().enumerate() {
            if self.initiators[..index].contains(name) {
                return Err(ConfigError::DuplicateInitiator { name: name.clone() });
            }
        }

        let mut decoder = self.memories;
        let mut descriptors = Vec::with_capacity(self.peripherals.len());
        match self.csr_window {
            Some((window_name, window)) => {
                window.validate(&window_name)?;
                let mut csr = CsrDecoder::builder();
                for pending in self.peripherals {
                    let size = pending.peripheral.registers().window();
                    let local = window
                        .offset_of(pending.base)
                        .filter(|offset| {
                            u64::from(*offset) + u64::from(size) <= u64::from(window.size())
                        })
                        .ok_or_else(|| ConfigError::PeripheralOutsideCsrWindow {
                            name: pending.name.clone(),
                            base: pending.base,
                            window: window.to_string(),
                        })?;
                    descriptors.push(PeripheralDescriptor {
                        name: pending.name.clone(),
                        class: pending.peripheral.class().to_string(),
                        base_address: pending.base,
                    });
                    csr.add(pending.name, local, pending.peripheral);
                }
                decoder.add(
                    window_name,
                    window,
                    Protocol::Byte,
                    SystemTarget::Bridge(Bridge::new(csr.build()?)),
                );
            }
            None => {
                if let Some(first) = self.peripherals.first() {
                    return Err(ConfigError::MissingCsrWindow {
                        name: first.name.clone(),
                    });
                }
            }
        }

        let decoder = decoder.build()?;
        for target in decoder.targets() {
            info!(
                name = %target.name,
                range = %target.range,
                protocol = ?target.protocol,
                "mapped target"
            );
        }
        for descriptor in &descriptors {
            info!(
                name = %descriptor.name,
                class = %descriptor.class,
                base = format_args!("{:#010x}", descriptor.base_address),
                "mapped peripheral"
            );
        }

        let bridge = decoder
            .targets()
            .find(|target| target.protocol == Protocol::Byte)
            .map(|target| target.id);
        Ok(Fabric {
            arbiter: Arbiter::new(self.initiators.len()),
            ports: self
                .initiators
                .into_iter()
                .map(|name| Port {
                    name,
                    pending: None,
                    completion: None,
                })
                .collect(),
            decoder,
            descriptors,
            bridge,
            active: None,
        })
    }
}

/// Immutable, validated interconnect stepped one cycle at a time.
///
/// Each cycle: if the bus is idle the arbiter grants the next requesting initiator
/// and the decoder starts its transaction; the active transaction advances by one
/// cycle; then every target ticks. A transaction granted on cycle `g` that takes `n`
/// cycles completes on cycle `g + n - 1` and the next grant happens on the cycle
/// after.
#[derive(Debug)]
pub struct Fabric {
    ports: Vec<Port>,
    arbiter: Arbiter,
    decoder: Decoder<SystemTarget>,
    descriptors: Vec<PeripheralDescriptor>,
    bridge: Option<TargetId>,
    active: Option<Active>,
}

impl Fabric {
    /// Starts building a fabric.
    #[must_use]
    pub fn builder() -> FabricBuilder {
        FabricBuilder::new()
    }

    /// Looks up an initiator port by name.
    #[must_use]
    pub fn initiator(&self, name: &str) -> Option<InitiatorId> {
        self.ports
            .iter()
            .position(|port| port.name == name)
            .map(InitiatorId::new)
    }

    /// Initiator port names in rotation order.
    pub fn initiator_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.ports.iter().map(|port| port.name.as_str())
    }

    /// System-bus targets in ascending address order.
    pub fn targets(&self) -> impl Iterator<Item = &TargetDescriptor> + '_ {
        self.decoder.targets()
    }

    /// Peripheral descriptors in declaration order.
    #[must_use]
    pub fn peripheral_descriptors(&self) -> &[PeripheralDescriptor] {
        &self.descriptors
    }

    /// Shared access to a peripheral by name.
    #[must_use]
    pub fn peripheral(&self, name: &str) -> Option<&dyn Peripheral> {
        match self.decoder.target(self.bridge?)? {
            SystemTarget::Bridge(bridge) => bridge.csr().peripheral(name),
            _ => None,
        }
    }

    /// Exclusive access to a peripheral by name, for host-side pin stimulus.
    #[must_use]
    pub fn peripheral_mut(&mut self, name: &str) -> Option<&mut dyn Peripheral> {
        match self.decoder.target_mut(self.bridge?)? {
            SystemTarget::Bridge(bridge) => bridge.csr_mut().peripheral_mut(name),
            _ => None,
        }
    }

    /// Contents of a RAM or flash target by name.
    #[must_use]
    pub fn memory(&self, name: &str) -> Option<&[u8]> {
        let id = self.decoder.targets().find(|target| target.name == name)?.id;
        match self.decoder.target(id)? {
            SystemTarget::Ram(ram) => Some(ram.as_bytes()),
            SystemTarget::Flash(flash) => Some(flash.as_bytes()),
            SystemTarget::Bridge(_) => None,
        }
    }

    /// Returns `true` when no transaction is active or waiting for a grant.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.ports.iter().all(|port| port.pending.is_none())
    }

    /// Queues `transaction` on `initiator`'s port and raises its request line.
    ///
    /// The transaction's `initiator` field is overwritten with `initiator`.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::UnknownInitiator`] for a port this fabric does not have,
    /// or [`SubmitError::InitiatorBusy`] while the port has a transaction in flight or
    /// an uncollected completion.
    pub fn submit(
        &mut self,
        initiator: InitiatorId,
        transaction: Transaction,
    ) -> Result<(), SubmitError> {
        let port = self
            .ports
            .get_mut(initiator.index())
            .ok_or(SubmitError::UnknownInitiator(initiator))?;
        if port.pending.is_some() || port.completion.is_some() {
            return Err(SubmitError::InitiatorBusy(initiator));
        }
        self.arbiter.request(initiator)?;
        port.pending = Some(Transaction {
            initiator,
            ..transaction
        });
        Ok(())
    }

    /// Advances the fabric by one cycle.
    pub fn step(&mut self, tick: Tick, trace: &mut dyn TraceSink) {
        if tick.reset {
            self.reset();
            return;
        }

        if self.active.is_none() {
            self.grant(tick, trace);
        }

        let response = if self.active.is_some() {
            self.decoder.step(tick, trace)
        } else {
            None
        };
        if let Some(response) = response {
            self.complete(tick, response, trace);
        }

        self.decoder.tick(tick);
    }

    /// Collects the completion waiting on `initiator`'s port.
    pub fn take_completion(&mut self, initiator: InitiatorId) -> Option<Completion> {
        self.ports.get_mut(initiator.index())?.completion.take()
    }

    /// Submits `transaction` and steps `clock` until its response is delivered.
    ///
    /// Other initiators keep competing for the bus while this runs.
    ///
    /// # Errors
    ///
    /// Returns the [`SubmitError`] from [`Self::submit`], or
    /// [`SubmitError::DroppedByReset`] when the clock asserts reset first.
    pub fn execute(
        &mut self,
        initiator: InitiatorId,
        transaction: Transaction,
        clock: &mut Clock,
        trace: &mut dyn TraceSink,
    ) -> Result<Completion, SubmitError> {
        self.submit(initiator, transaction)?;
        loop {
            let tick = clock.advance();
            self.step(tick, trace);
            if tick.reset {
                return Err(SubmitError::DroppedByReset(initiator));
            }
            if let Some(completion) = self.take_completion(initiator) {
                return Ok(completion);
            }
        }
    }

    /// Steps `cycles` idle-or-busy cycles from `clock`.
    pub fn run(&mut self, cycles: u64, clock: &mut Clock, trace: &mut dyn TraceSink) {
        for _ in 0..cycles {
            let tick = clock.advance();
            self.step(tick, trace);
        }
    }

    /// Returns every component to reset state and drops pending work.
    pub fn reset(&mut self) {
        debug!("fabric reset");
        self.active = None;
        self.arbiter.reset();
        self.decoder.reset();
        for port in &mut self.ports {
            port.pending = None;
            port.completion = None;
        }
    }

    fn grant(&mut self, tick: Tick, trace: &mut dyn TraceSink) {
        let Some(token) = self.arbiter.grant() else {
            return;
        };
        let initiator = token.initiator();
        let Some(transaction) = self
            .ports
            .get(initiator.index())
            .and_then(|port| port.pending)
        else {
            self.arbiter.release(token);
            return;
        };
        debug!(cycle = tick.cycle, %initiator, address = transaction.address, "grant");
        trace.on_event(TraceEvent::Granted {
            cycle: tick.cycle,
            initiator,
            address: transaction.address,
        });
        self.decoder.start(transaction);
        self.active = Some(Active {
            token,
            transaction,
            granted_at: tick.cycle,
        });
    }

    fn complete(&mut self, tick: Tick, response: Response, trace: &mut dyn TraceSink) {
        let Some(active) = self.active.take() else {
            return;
        };
        let transaction = active.transaction;
        let initiator = active.token.initiator();
        self.arbiter.release(active.token);

        match response {
            Response::Error(fault) => warn!(
                cycle = tick.cycle,
                %initiator,
                address = format_args!("{:#010x}", transaction.address),
                %fault,
                "bus fault"
            ),
            Response::Ack { data } => {
                debug!(
                    cycle = tick.cycle,
                    %initiator,
                    address = transaction.address,
                    data,
                    "complete"
                );
            }
        }
        trace.on_event(TraceEvent::Completed {
            cycle: tick.cycle,
            initiator,
            address: transaction.address,
            response,
        });
        if let Some(port) = self.ports.get_mut(initiator.index()) {
            port.pending = None;
            port.completion = Some(Completion {
                transaction,
                response,
                granted_at: active.granted_at,
                completed_at: tick.cycle,
            });
        }
    }
}
