//! System-bus address decoder and the word-protocol target contract.

use tracing::debug;

use crate::{
    validate_alignment, validate_extent, AddressMap, AddressRange, BusFault, Clock, ConfigError,
    MapBuilder, Protocol, Response, TargetDescriptor, TargetId, Tick, TraceSink, Transaction,
};

/// Word-protocol target attached to a [`Decoder`].
///
/// A target serves one transaction at a time: [`WordTarget::start`] hands it a
/// transaction whose address is already the local offset, and [`WordTarget::step`]
/// is called once per cycle until it yields the response. Free-running hardware
/// state advances in [`WordTarget::tick`], which runs every cycle whether or not a
/// transaction is active.
pub trait WordTarget {
    /// Accepts a transaction restricted to the target's local offset.
    fn start(&mut self, request: Transaction);

    /// Advances the active transaction by one cycle.
    ///
    /// Returns `Some` exactly once per started transaction, on the cycle it completes.
    fn step(&mut self, tick: Tick, trace: &mut dyn TraceSink) -> Option<Response>;

    /// Advances free-running state by one cycle.
    fn tick(&mut self, _tick: Tick) {}

    /// Returns to reset state, abandoning any active transaction.
    fn reset(&mut self) {}
}

impl<T: WordTarget + ?Sized> WordTarget for Box<T> {
    fn start(&mut self, request: Transaction) {
        (**self).start(request);
    }

    fn step(&mut self, tick: Tick, trace: &mut dyn TraceSink) -> Option<Response> {
        (**self).step(tick, trace)
    }

    fn tick(&mut self, tick: Tick) {
        (**self).tick(tick);
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Append-only builder for a [`Decoder`].
#[derive(Debug)]
pub struct DecoderBuilder<T> {
    map: MapBuilder<T>,
}

impl<T: WordTarget> Default for DecoderBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WordTarget> DecoderBuilder<T> {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            map: MapBuilder::new(),
        }
    }

    /// Appends a target claiming `range`.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        range: AddressRange,
        protocol: Protocol,
        target: T,
    ) -> TargetId {
        self.map.add(name, range, protocol, target)
    }

    /// Validates the ranges and freezes the decoder.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for empty, overflowing or overlapping ranges.
    pub fn build(self) -> Result<Decoder<T>, ConfigError> {
        Ok(Decoder {
            map: self.map.finish()?,
            active: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Target(TargetId),
    Fault(BusFault),
}

/// Routes system-bus transactions to disjoint target ranges.
///
/// Addresses outside every range are answered with [`BusFault::Unmapped`] one cycle
/// after the request, without touching any target.
#[derive(Debug)]
pub struct Decoder<T = Box<dyn WordTarget>> {
    map: AddressMap<T>,
    active: Option<Route>,
}

impl<T: WordTarget> Decoder<T> {
    /// Starts building a decoder.
    #[must_use]
    pub const fn builder() -> DecoderBuilder<T> {
        DecoderBuilder::new()
    }

    /// Mapped targets in ascending address order.
    pub fn targets(&self) -> impl Iterator<Item = &TargetDescriptor> + '_ {
        self.map.descriptors()
    }

    /// Shared access to a mapped target.
    #[must_use]
    pub fn target(&self, id: TargetId) -> Option<&T> {
        self.map.get(id)
    }

    /// Exclusive access to a mapped target.
    #[must_use]
    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut T> {
        self.map.get_mut(id)
    }

    /// Returns `true` while a transaction is being served.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Serves `request` to completion, drawing one tick per cycle from `clock`.
    ///
    /// Every target is ticked on every cycle consumed. A reset tick restarts the
    /// request from the reset state.
    pub fn route(
        &mut self,
        request: Transaction,
        clock: &mut Clock,
        trace: &mut dyn TraceSink,
    ) -> Response {
        self.start(request);
        loop {
            let tick = clock.advance();
            if tick.reset {
                self.reset();
                self.start(request);
                continue;
            }
            let response = self.step(tick, trace);
            self.tick(tick);
            if let Some(response) = response {
                return response;
            }
        }
    }

    fn resolve(&self, request: &Transaction) -> Result<(TargetId, u32), BusFault> {
        let (id, offset) = self
            .map
            .resolve(request.address)
            .ok_or(BusFault::Unmapped)?;
        let range = self.map.descriptor(id).ok_or(BusFault::Unmapped)?.range;
        validate_alignment(request.address, request.width)?;
        validate_extent(range, offset, request.width)?;
        Ok((id, offset))
    }
}

impl<T: WordTarget> WordTarget for Decoder<T> {
    fn start(&mut self, request: Transaction) {
        let route = match self.resolve(&request) {
            Ok((id, offset)) => {
                if let Some(target) = self.map.get_mut(id) {
                    target.start(request.at_offset(offset));
                }
                Route::Target(id)
            }
            Err(fault) => {
                debug!(address = request.address, %fault, "decoder rejected transaction");
                Route::Fault(fault)
            }
        };
        self.active = Some(route);
    }

    fn step(&mut self, tick: Tick, trace: &mut dyn TraceSink) -> Option<Response> {
        let response = match self.active? {
            Route::Fault(fault) => Some(Response::Error(fault)),
            Route::Target(id) => self.map.get_mut(id)?.step(tick, trace),
        };
        if response.is_some() {
            self.active = None;
        }
        response
    }

    fn tick(&mut self, tick: Tick) {
        for target in self.map.targets_mut() {
            target.tick(tick);
        }
    }

    fn reset(&mut self) {
        self.active = None;
        for target in self.map.targets_mut() {
            target.reset();
        }
    }
}
