//! Bootstrap state machine for roomsync.
//!
//! A peer that joins without state asks the room for it; any peer holding
//! state may answer. There is no elected host:
//!
//! ```text
//! NoState --Subscribed--> AwaitingState --first valid offer--> HasState
//!    \                                                            ^
//!     `------------- local init / local mutation ----------------'
//! ```
//!
//! Responders wait a random delay before answering so that a room full of
//! holders does not answer one request all at once. The requester loads the
//! first offer that decodes and loads; everything after that is ignored.
//!
//! This module performs no I/O. The provider executes the returned
//! [`BootstrapAction`]s and feeds load results back as events.

use roomsync_types::PeerId;
use std::time::Duration;

/// Default upper bound of the responder delay.
pub const DEFAULT_MAX_OFFER_JITTER: Duration = Duration::from_millis(200);

/// Where a provider stands in obtaining state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// No state and no request sent yet.
    NoState,
    /// Request sent, waiting for the first usable offer.
    AwaitingState,
    /// State obtained. Terminal.
    HasState,
}

/// Inputs to the bootstrap state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapEvent {
    /// The room channel subscription succeeded.
    Subscribed,
    /// State was produced locally (initialization or a local mutation).
    LocalStateReady,
    /// A peer broadcast `state-request`.
    StateRequested {
        /// The requester.
        from: PeerId,
    },
    /// A peer joined the room.
    PeerJoined {
        /// The joiner.
        peer: PeerId,
    },
    /// A state offer arrived.
    OfferReceived {
        /// Addressee; `None` for an undirected `fullState` broadcast.
        to: Option<PeerId>,
        /// The offering peer.
        from: PeerId,
    },
    /// The offer from `from` was decoded and loaded by the engine.
    LoadSucceeded {
        /// The offering peer.
        from: PeerId,
    },
    /// The offer from `from` could not be decoded or was rejected.
    LoadFailed {
        /// The offering peer.
        from: PeerId,
        /// Why loading failed.
        error: String,
    },
}

/// Instructions for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapAction {
    /// Broadcast `state-request` from the local peer.
    SendStateRequest,
    /// After `delay`, send a directed `state-sync` to `to`.
    ScheduleOffer {
        /// The peer to serve.
        to: PeerId,
        /// Random responder delay.
        delay: Duration,
    },
    /// Decode the pending offer and hand it to the engine.
    LoadOffer {
        /// The offering peer.
        from: PeerId,
    },
    /// Tell the application that state arrived.
    EmitStateLoaded {
        /// The peer whose state was loaded.
        from: PeerId,
    },
}

/// Per-provider bootstrap state.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    local: PeerId,
    phase: BootstrapPhase,
    max_jitter: Duration,
}

impl Bootstrap {
    /// Start without state.
    pub fn new(local: PeerId, max_jitter: Duration) -> Self {
        Self {
            local,
            phase: BootstrapPhase::NoState,
            max_jitter,
        }
    }

    /// Start with pre-seeded state.
    pub fn seeded(local: PeerId, max_jitter: Duration) -> Self {
        Self {
            local,
            phase: BootstrapPhase::HasState,
            max_jitter,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    /// The bootstrap flag. Once `true`, it stays `true`.
    pub fn has_received_state(&self) -> bool {
        self.phase == BootstrapPhase::HasState
    }

    /// Process an event and return the actions to execute.
    pub fn on_event(&mut self, event: BootstrapEvent) -> Vec<BootstrapAction> {
        use BootstrapPhase::*;

        let (phase, actions) = match (self.phase, event) {
            (NoState | AwaitingState, BootstrapEvent::Subscribed) => {
                (AwaitingState, vec![BootstrapAction::SendStateRequest])
            }

            (NoState | AwaitingState, BootstrapEvent::LocalStateReady) => (HasState, vec![]),

            (NoState | AwaitingState, BootstrapEvent::OfferReceived { to, from }) => {
                let for_me = to.as_ref().map_or(true, |to| *to == self.local);
                if for_me && from != self.local {
                    (self.phase, vec![BootstrapAction::LoadOffer { from }])
                } else {
                    (self.phase, vec![])
                }
            }

            (NoState | AwaitingState, BootstrapEvent::LoadSucceeded { from }) => {
                (HasState, vec![BootstrapAction::EmitStateLoaded { from }])
            }

            (HasState, BootstrapEvent::StateRequested { from })
            | (HasState, BootstrapEvent::PeerJoined { peer: from })
                if from != self.local =>
            {
                let delay = random_jitter(self.max_jitter);
                (
                    HasState,
                    vec![BootstrapAction::ScheduleOffer { to: from, delay }],
                )
            }

            // Late offers, failed loads, requests we cannot serve
            (phase, _) => (phase, vec![]),
        };

        self.phase = phase;
        actions
    }
}

/// Random delay in `[0, max]`.
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (max_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> PeerId {
        PeerId::new("me")
    }

    fn other() -> PeerId {
        PeerId::new("other")
    }

    fn fresh() -> Bootstrap {
        Bootstrap::new(me(), DEFAULT_MAX_OFFER_JITTER)
    }

    fn holder() -> Bootstrap {
        Bootstrap::seeded(me(), DEFAULT_MAX_OFFER_JITTER)
    }

    #[test]
    fn starts_without_state() {
        let boot = fresh();
        assert_eq!(boot.phase(), BootstrapPhase::NoState);
        assert!(!boot.has_received_state());
    }

    #[test]
    fn subscription_sends_request() {
        let mut boot = fresh();
        let actions = boot.on_event(BootstrapEvent::Subscribed);

        assert_eq!(actions, vec![BootstrapAction::SendStateRequest]);
        assert_eq!(boot.phase(), BootstrapPhase::AwaitingState);
    }

    #[test]
    fn seeded_provider_does_not_request() {
        let mut boot = holder();
        assert!(boot.on_event(BootstrapEvent::Subscribed).is_empty());
        assert!(boot.has_received_state());
    }

    #[test]
    fn offer_for_me_is_loaded() {
        let mut boot = fresh();
        boot.on_event(BootstrapEvent::Subscribed);

        let actions = boot.on_event(BootstrapEvent::OfferReceived {
            to: Some(me()),
            from: other(),
        });
        assert_eq!(actions, vec![BootstrapAction::LoadOffer { from: other() }]);

        let actions = boot.on_event(BootstrapEvent::LoadSucceeded { from: other() });
        assert_eq!(
            actions,
            vec![BootstrapAction::EmitStateLoaded { from: other() }]
        );
        assert!(boot.has_received_state());
    }

    #[test]
    fn offer_for_someone_else_is_ignored() {
        let mut boot = fresh();
        boot.on_event(BootstrapEvent::Subscribed);

        let actions = boot.on_event(BootstrapEvent::OfferReceived {
            to: Some(PeerId::new("third")),
            from: other(),
        });
        assert!(actions.is_empty());
        assert_eq!(boot.phase(), BootstrapPhase::AwaitingState);
    }

    #[test]
    fn undirected_offer_accepted_while_waiting() {
        let mut boot = fresh();
        let actions = boot.on_event(BootstrapEvent::OfferReceived {
            to: None,
            from: other(),
        });
        assert_eq!(actions, vec![BootstrapAction::LoadOffer { from: other() }]);
    }

    #[test]
    fn offers_after_state_are_ignored() {
        let mut boot = fresh();
        boot.on_event(BootstrapEvent::Subscribed);
        boot.on_event(BootstrapEvent::OfferReceived {
            to: Some(me()),
            from: other(),
        });
        boot.on_event(BootstrapEvent::LoadSucceeded { from: other() });

        let late = boot.on_event(BootstrapEvent::OfferReceived {
            to: Some(me()),
            from: PeerId::new("slow"),
        });
        assert!(late.is_empty());

        let unsolicited = boot.on_event(BootstrapEvent::OfferReceived {
            to: None,
            from: PeerId::new("slow"),
        });
        assert!(unsolicited.is_empty());
    }

    #[test]
    fn failed_load_keeps_waiting() {
        let mut boot = fresh();
        boot.on_event(BootstrapEvent::Subscribed);
        boot.on_event(BootstrapEvent::LoadFailed {
            from: other(),
            error: "bad blob".into(),
        });

        assert_eq!(boot.phase(), BootstrapPhase::AwaitingState);

        // A later offer can still be accepted
        let actions = boot.on_event(BootstrapEvent::OfferReceived {
            to: Some(me()),
            from: PeerId::new("second"),
        });
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn flag_never_resets() {
        let mut boot = holder();
        boot.on_event(BootstrapEvent::LoadFailed {
            from: other(),
            error: "x".into(),
        });
        boot.on_event(BootstrapEvent::Subscribed);
        assert!(boot.has_received_state());
    }

    #[test]
    fn local_state_ends_bootstrap() {
        let mut boot = fresh();
        boot.on_event(BootstrapEvent::Subscribed);
        boot.on_event(BootstrapEvent::LocalStateReady);
        assert!(boot.has_received_state());
    }

    #[test]
    fn holder_schedules_jittered_offer_for_request() {
        let mut boot = holder();
        let actions = boot.on_event(BootstrapEvent::StateRequested { from: other() });

        match actions.as_slice() {
            [BootstrapAction::ScheduleOffer { to, delay }] => {
                assert_eq!(*to, other());
                assert!(*delay <= DEFAULT_MAX_OFFER_JITTER);
            }
            other => panic!("Expected one ScheduleOffer, got {:?}", other),
        }
    }

    #[test]
    fn holder_offers_to_joiner() {
        let mut boot = holder();
        let actions = boot.on_event(BootstrapEvent::PeerJoined { peer: other() });
        assert!(matches!(
            actions.as_slice(),
            [BootstrapAction::ScheduleOffer { .. }]
        ));
    }

    #[test]
    fn own_request_is_not_answered() {
        let mut boot = holder();
        assert!(boot
            .on_event(BootstrapEvent::StateRequested { from: me() })
            .is_empty());
    }

    #[test]
    fn requests_without_state_are_not_answered() {
        let mut boot = fresh();
        boot.on_event(BootstrapEvent::Subscribed);
        assert!(boot
            .on_event(BootstrapEvent::StateRequested { from: other() })
            .is_empty());
    }

    #[test]
    fn jitter_stays_in_bounds_and_varies() {
        let max = Duration::from_millis(200);
        let samples: Vec<Duration> = (0..50).map(|_| random_jitter(max)).collect();

        assert!(samples.iter().all(|d| *d <= max));
        let min = samples.iter().min().unwrap();
        let top = samples.iter().max().unwrap();
        assert!(top > min, "expected variance in jitter samples");
    }

    #[test]
    fn zero_jitter_bound_gives_zero_delay() {
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }
}
