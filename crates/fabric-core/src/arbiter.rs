//! Round-robin initiator arbiter for the shared system bus.

use tracing::trace;

use crate::{InitiatorId, SubmitError};

/// Proof of bus ownership, returned by [`Arbiter::grant`] and consumed by
/// [`Arbiter::release`].
///
/// Not `Clone`: exactly one holder may own the bus at a time.
#[derive(Debug, PartialEq, Eq)]
pub struct GrantToken {
    initiator: InitiatorId,
}

impl GrantToken {
    /// Initiator that owns the bus.
    #[must_use]
    pub const fn initiator(&self) -> InitiatorId {
        self.initiator
    }
}

/// Grants the bus to one requesting initiator at a time in rotation order.
///
/// The rotation pointer only moves on [`Arbiter::release`], to the position after
/// the initiator that just completed, so N continuously requesting initiators are
/// granted in strict rotation.
#[derive(Debug, Clone)]
pub struct Arbiter {
    requesting: Vec<bool>,
    pointer: usize,
    owner: Option<InitiatorId>,
}

impl Arbiter {
    /// Creates an arbiter over `initiators` ports with the pointer at port 0.
    #[must_use]
    pub fn new(initiators: usize) -> Self {
        Self {
            requesting: vec![false; initiators],
            pointer: 0,
            owner: None,
        }
    }

    /// Number of initiator ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requesting.len()
    }

    /// Returns `true` when the arbiter has no ports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requesting.is_empty()
    }

    /// Current rotation pointer.
    #[must_use]
    pub const fn pointer(&self) -> usize {
        self.pointer
    }

    /// Initiator currently holding the bus.
    #[must_use]
    pub const fn owner(&self) -> Option<InitiatorId> {
        self.owner
    }

    /// Returns `true` while `initiator` asserts a request that has not been granted.
    #[must_use]
    pub fn is_requesting(&self, initiator: InitiatorId) -> bool {
        self.requesting
            .get(initiator.index())
            .copied()
            .unwrap_or(false)
    }

    /// Asserts a request line. The request stays asserted until granted.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::UnknownInitiator`] for a port this arbiter does not have,
    /// or [`SubmitError::InitiatorBusy`] when the port is already requesting or owns
    /// the bus.
    pub fn request(&mut self, initiator: InitiatorId) -> Result<(), SubmitError> {
        let owns_bus = self.owner == Some(initiator);
        let line = self
            .requesting
            .get_mut(initiator.index())
            .ok_or(SubmitError::UnknownInitiator(initiator))?;
        if *line || owns_bus {
            return Err(SubmitError::InitiatorBusy(initiator));
        }
        *line = true;
        Ok(())
    }

    /// Grants the bus to the first requesting port at or after the pointer.
    ///
    /// Returns `None` while the bus is owned or nobody is requesting.
    pub fn grant(&mut self) -> Option<GrantToken> {
        if self.owner.is_some() {
            return None;
        }
        let count = self.requesting.len();
        let index = (0..count)
            .map(|step| (self.pointer + step) % count)
            .find(|&index| self.requesting[index])?;
        self.requesting[index] = false;
        let initiator = InitiatorId::new(index);
        self.owner = Some(initiator);
        trace!(%initiator, pointer = self.pointer, "bus granted");
        Some(GrantToken { initiator })
    }

    /// Ends the granted transaction and rotates the pointer past its owner.
    pub fn release(&mut self, token: GrantToken) {
        debug_assert_eq!(self.owner, Some(token.initiator));
        self.owner = None;
        self.pointer = (token.initiator.index() + 1) % self.requesting.len();
    }

    /// Drops every request and the current grant; the pointer returns to port 0.
    pub fn reset(&mut self) {
        self.requesting.fill(false);
        self.pointer = 0;
        self.owner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::Arbiter;
    use crate::{InitiatorId, SubmitError};

    fn id(index: usize) -> InitiatorId {
        InitiatorId::new(index)
    }

    #[test]
    fn continuous_requests_rotate_strictly() {
        let mut arbiter = Arbiter::new(3);
        let mut order = Vec::new();
        for _ in 0..9 {
            for index in 0..3 {
                if !arbiter.is_requesting(id(index)) {
                    arbiter.request(id(index)).expect("idle port");
                }
            }
            let token = arbiter.grant().expect("someone requests");
            order.push(token.initiator().index());
            arbiter.release(token);
        }
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn grant_skips_idle_ports_and_wraps() {
        let mut arbiter = Arbiter::new(4);
        arbiter.request(id(3)).expect("request");
        let token = arbiter.grant().expect("grant");
        assert_eq!(token.initiator(), id(3));
        arbiter.release(token);
        assert_eq!(arbiter.pointer(), 0);

        arbiter.request(id(1)).expect("request");
        arbiter.request(id(2)).expect("request");
        let token = arbiter.grant().expect("grant");
        assert_eq!(token.initiator(), id(1));
    }

    #[test]
    fn bus_is_held_until_release() {
        let mut arbiter = Arbiter::new(2);
        arbiter.request(id(0)).expect("request");
        arbiter.request(id(1)).expect("request");
        let token = arbiter.grant().expect("grant");
        assert!(arbiter.grant().is_none());
        assert_eq!(arbiter.owner(), Some(id(0)));
        arbiter.release(token);
        assert_eq!(arbiter.grant().map(|t| t.initiator()), Some(id(1)));
    }

    #[test]
    fn misuse_is_reported() {
        let mut arbiter = Arbiter::new(2);
        assert_eq!(
            arbiter.request(id(5)),
            Err(SubmitError::UnknownInitiator(id(5)))
        );
        arbiter.request(id(0)).expect("request");
        assert_eq!(arbiter.request(id(0)), Err(SubmitError::InitiatorBusy(id(0))));
        let _token = arbiter.grant().expect("grant");
        assert_eq!(arbiter.request(id(0)), Err(SubmitError::InitiatorBusy(id(0))));
    }

    #[test]
    fn reset_clears_requests_and_pointer() {
        let mut arbiter = Arbiter::new(2);
        arbiter.request(id(0)).expect("request");
        let token = arbiter.grant().expect("grant");
        arbiter.release(token);
        arbiter.request(id(0)).expect("request");
        arbiter.reset();
        assert_eq!(arbiter.pointer(), 0);
        assert!(!arbiter.is_requesting(id(0)));
        assert!(arbiter.grant().is_none());
    }
}
