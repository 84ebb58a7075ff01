//! SyncProvider - the room provider for roomsync.
//!
//! This module provides [`SyncProvider`], which joins a room channel and
//! keeps the local engine in step with every other peer in the room.
//!
//! # Architecture
//!
//! The provider owns the pure state machines from roomsync-core and
//! interprets their actions to perform actual I/O via the [`Channel`] trait.
//! Everything runs on one task: commands from [`ProviderHandle`]s, inbound
//! channel events and the three timers (batch flush, jittered state offers,
//! reconciliation) are multiplexed with `tokio::select!`, so no state is
//! shared and nothing is locked.
//!
//! ```text
//! ProviderHandle ─┐
//!                 ├→ SyncProvider task → Channel → room
//! Channel events ─┘        ↓
//!            roomsync-core (membership, bootstrap, batching, applier)
//!                          ↓
//!                    MutationEngine
//! ```
//!
//! # Example
//!
//! ```ignore
//! use roomsync_client::{MemoryHub, ProviderConfig, SyncProvider};
//!
//! let hub = MemoryHub::new();
//! let config = ProviderConfig::new("city-42").with_display_name("Alice");
//! let (provider, mut events) = SyncProvider::new(config, hub.channel("city-42"), engine)?;
//! let handle = provider.spawn();
//!
//! handle.dispatch(Action::Place(Placement::new(3, 4, "road")))?;
//! ```

use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use roomsync_core::{
    ApplyOutcome, Bootstrap, BootstrapAction, BootstrapEvent, ConnectionState, DuplicateFilter,
    Event, MembershipAction, MutationEngine, PlacementBatcher, PresenceChange, RemoteApplier,
    RoomMembership,
};
use roomsync_types::{
    Action, ActionMessage, Peer, PeerId, PresenceRecord, StateBlob, StateRequest, StateSync,
    SyncError, WireEvent,
};

use crate::config::{ConfigError, ProviderConfig};
use crate::handle::{Command, ProviderHandle};
use crate::transport::{Channel, ChannelEvent, ChannelEvents, SubscriptionStatus, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encoding or decoding error.
    #[error("encoding error: {0}")]
    Encoding(#[from] SyncError),

    /// The engine refused a state snapshot.
    #[error("engine rejected state snapshot")]
    StateRejected,

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The provider has been torn down.
    #[error("provider destroyed")]
    Destroyed,
}

/// Notifications for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Room membership changed. Oldest join first.
    MembersChanged(Vec<Peer>),
    /// Connection status or peer count changed.
    ConnectionStatus {
        /// Channel lifecycle state.
        status: ConnectionState,
        /// Peers in the room, including the local one.
        peer_count: usize,
    },
    /// State from another peer was loaded into the engine.
    StateLoaded {
        /// The peer whose snapshot was loaded.
        from: PeerId,
    },
}

/// Receiving end of a provider's notifications.
pub type ProviderEvents = mpsc::UnboundedReceiver<ProviderEvent>;

#[derive(Debug)]
struct PendingOffer {
    due: Instant,
    to: PeerId,
}

/// Room provider.
///
/// Build one with [`SyncProvider::new`], then [`spawn`](SyncProvider::spawn)
/// it and talk to it through the returned [`ProviderHandle`].
pub struct SyncProvider<C, E> {
    config: ProviderConfig,
    channel: C,
    engine: E,
    state: ConnectionState,
    membership: RoomMembership,
    bootstrap: Bootstrap,
    applier: RemoteApplier,
    batcher: PlacementBatcher,
    dedup: DuplicateFilter,
    pending_offers: Vec<PendingOffer>,
    /// Snapshot under consideration while bootstrap decides on an offer.
    offer: Option<String>,
    inbound: Option<ChannelEvents>,
    events: mpsc::UnboundedSender<ProviderEvent>,
}

impl<C, E> SyncProvider<C, E>
where
    C: Channel + 'static,
    E: MutationEngine + Send + 'static,
{
    /// Create a provider for `config.room_id` over `channel`.
    ///
    /// A configured initial state is loaded into `engine` right away and
    /// makes this peer a state holder.
    pub fn new(
        config: ProviderConfig,
        channel: C,
        mut engine: E,
    ) -> Result<(Self, ProviderEvents), ClientError> {
        config.validate()?;

        let id = PeerId::random();
        let color = config
            .color_tag
            .clone()
            .unwrap_or_else(|| id.color_tag().to_string());
        let local = Peer::with_id(id.clone(), &config.display_name).with_color(&color);

        let seeded = match &config.initial_state {
            Some(state) if engine.load_state(state) => true,
            Some(_) => {
                tracing::warn!("Engine rejected the initial state; joining without state");
                false
            }
            None => false,
        };
        let bootstrap = if seeded {
            Bootstrap::seeded(id.clone(), config.max_offer_jitter)
        } else {
            Bootstrap::new(id.clone(), config.max_offer_jitter)
        };

        let (events, events_rx) = mpsc::unbounded_channel();
        let provider = Self {
            membership: RoomMembership::new(local),
            applier: RemoteApplier::new(id),
            batcher: PlacementBatcher::new(config.max_batch),
            dedup: DuplicateFilter::new(config.dedup_window),
            bootstrap,
            config,
            channel,
            engine,
            state: ConnectionState::new(),
            pending_offers: Vec::new(),
            offer: None,
            inbound: None,
            events,
        };
        Ok((provider, events_rx))
    }

    /// The local peer.
    pub fn local_peer(&self) -> &Peer {
        self.membership.local()
    }

    /// Start the provider on the current tokio runtime.
    pub fn spawn(self) -> ProviderHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let handle = ProviderHandle::new(commands, self.local_peer().clone());
        tokio::spawn(self.run(commands_rx));
        handle
    }

    /// Run the event loop until destroyed or every handle is dropped.
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(
            "Joining room {} as {} ({})",
            self.config.room_id,
            self.config.display_name,
            self.local_id()
        );
        self.on_lifecycle(Event::ConnectRequested).await;

        let period = self.config.reconcile_interval;
        let mut reconcile = tokio::time::interval_at(Instant::now() + period, period);
        reconcile.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.state.is_destroyed() {
            let flush_at = self
                .batcher
                .deadline(self.config.flush_interval)
                .map(Instant::from_std);
            let offer_at = self.pending_offers.iter().map(|o| o.due).min();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        tracing::debug!("All provider handles dropped");
                        self.on_lifecycle(Event::DestroyRequested).await;
                    }
                },
                event = next_inbound(&mut self.inbound) => match event {
                    Some(event) => self.on_channel_event(event).await,
                    None => {
                        self.inbound = None;
                        self.on_lifecycle(Event::ChannelLost {
                            reason: "channel closed".into(),
                        })
                        .await;
                    }
                },
                _ = wait_until(flush_at) => self.flush().await,
                _ = wait_until(offer_at) => self.send_due_offers().await,
                _ = reconcile.tick() => self.reconcile().await,
            }
        }

        tracing::debug!("Provider for room {} stopped", self.config.room_id);
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Dispatch(action) => self.dispatch(action).await,
            Command::Flush => self.flush().await,
            Command::MarkStateReady => {
                self.run_bootstrap(BootstrapEvent::LocalStateReady).await;
            }
            Command::Reconnect => self.on_lifecycle(Event::ConnectRequested).await,
            Command::Members(reply) => {
                let _ = reply.send(self.membership.peers());
            }
            Command::HasReceivedState(reply) => {
                let _ = reply.send(self.bootstrap.has_received_state());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.state.clone());
            }
            Command::Destroy(reply) => {
                self.on_lifecycle(Event::DestroyRequested).await;
                let _ = reply.send(());
            }
        }
    }

    // ===========================================
    // Outgoing actions
    // ===========================================

    async fn dispatch(&mut self, action: Action) {
        let now = now();
        let key = match action.dedup_key() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("Dropping unencodable {} action: {}", action.kind(), e);
                return;
            }
        };
        if !self.dedup.admit(key, now) {
            tracing::trace!("Dropping duplicate {} action", action.kind());
            return;
        }

        // A local mutation means this peer now holds state
        if !matches!(action, Action::Tick { .. }) {
            self.run_bootstrap(BootstrapEvent::LocalStateReady).await;
        }

        match action {
            Action::Place(placement) => {
                if let Some(full) = self.batcher.push(placement, now) {
                    self.broadcast(full).await;
                }
            }
            Action::PlaceBatch { placements } => {
                for full in self.batcher.extend(placements, now) {
                    self.broadcast(full).await;
                }
            }
            other => {
                self.flush().await;
                self.broadcast(other).await;
            }
        }
    }

    async fn flush(&mut self) {
        if let Some(action) = self.batcher.take() {
            tracing::trace!("Flushing {} action", action.kind());
            self.broadcast(action).await;
        }
    }

    async fn broadcast(&mut self, action: Action) {
        let message = ActionMessage::stamp(action, self.local_id().clone());
        self.send_wire(WireEvent::Action(message)).await;
    }

    async fn send_wire(&mut self, event: WireEvent) {
        if self.state.is_destroyed() {
            return;
        }
        match event.to_payload() {
            Ok(payload) => self.channel.send(event.event_name(), payload).await,
            Err(e) => tracing::warn!("Failed to encode {} event: {}", event.event_name(), e),
        }
    }

    // ===========================================
    // Inbound events
    // ===========================================

    async fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Status(SubscriptionStatus::Subscribed) => {
                let was_connected = self.state.is_connected();
                self.on_lifecycle(Event::Subscribed).await;
                if !was_connected && self.state.is_connected() {
                    self.run_bootstrap(BootstrapEvent::Subscribed).await;
                }
            }
            ChannelEvent::Status(SubscriptionStatus::ChannelError(reason)) => {
                self.on_lifecycle(Event::ChannelLost { reason }).await;
            }
            ChannelEvent::Status(SubscriptionStatus::TimedOut) => {
                self.on_lifecycle(Event::ChannelLost {
                    reason: "subscription timed out".into(),
                })
                .await;
            }
            ChannelEvent::Status(SubscriptionStatus::Closed) => {
                self.on_lifecycle(Event::ChannelLost {
                    reason: "channel closed".into(),
                })
                .await;
            }
            ChannelEvent::Presence(change) => self.on_presence(change).await,
            ChannelEvent::Broadcast { event, payload } => {
                match WireEvent::from_payload(&event, &payload) {
                    Ok(wire) => self.on_wire(wire).await,
                    Err(e) => tracing::warn!("Discarding undecodable {} event: {}", event, e),
                }
            }
        }
    }

    async fn on_presence(&mut self, change: PresenceChange) {
        let holds_state = self.bootstrap.has_received_state();
        for action in self.membership.on_presence(change, holds_state) {
            match action {
                MembershipAction::MembersChanged(peers) => {
                    self.emit(ProviderEvent::MembersChanged(peers));
                }
                MembershipAction::StatusChanged { peer_count } => {
                    self.emit(ProviderEvent::ConnectionStatus {
                        status: self.state.clone(),
                        peer_count,
                    });
                }
                MembershipAction::OfferState { to } => {
                    self.run_bootstrap(BootstrapEvent::PeerJoined { peer: to })
                        .await;
                }
            }
        }
    }

    async fn on_wire(&mut self, wire: WireEvent) {
        match wire {
            WireEvent::Action(message) => {
                let kind = message.action.kind();
                match self.applier.apply(&mut self.engine, &message) {
                    ApplyOutcome::Applied => {
                        tracing::trace!("Applied {} from {}", kind, message.origin_peer_id);
                    }
                    ApplyOutcome::SelfEcho => tracing::trace!("Skipped own {} echo", kind),
                    ApplyOutcome::Ignored => {}
                    ApplyOutcome::StateOffer { compressed } => {
                        self.consider_offer(None, message.origin_peer_id, compressed)
                            .await;
                    }
                }
            }
            WireEvent::StateRequest(request) => {
                self.run_bootstrap(BootstrapEvent::StateRequested { from: request.from })
                    .await;
            }
            WireEvent::StateSync(sync) => {
                self.consider_offer(Some(sync.to), sync.from, sync.compressed)
                    .await;
            }
        }
    }

    // ===========================================
    // Bootstrap
    // ===========================================

    async fn consider_offer(&mut self, to: Option<PeerId>, from: PeerId, compressed: String) {
        self.offer = Some(compressed);
        self.run_bootstrap(BootstrapEvent::OfferReceived { to, from })
            .await;
        self.offer = None;
    }

    async fn run_bootstrap(&mut self, event: BootstrapEvent) {
        let mut queue: VecDeque<BootstrapAction> = self.bootstrap.on_event(event).into();

        while let Some(action) = queue.pop_front() {
            match action {
                BootstrapAction::SendStateRequest => {
                    tracing::info!("Requesting state in room {}", self.config.room_id);
                    let request = StateRequest {
                        from: self.local_id().clone(),
                    };
                    self.send_wire(WireEvent::StateRequest(request)).await;
                }
                BootstrapAction::ScheduleOffer { to, delay } => {
                    if self.pending_offers.iter().any(|o| o.to == to) {
                        continue;
                    }
                    tracing::debug!("Offering state to {} in {:?}", to, delay);
                    self.pending_offers.push(PendingOffer {
                        due: Instant::now() + delay,
                        to,
                    });
                }
                BootstrapAction::LoadOffer { from } => {
                    let outcome = match self.load_offer() {
                        Ok(()) => BootstrapEvent::LoadSucceeded { from },
                        Err(e) => {
                            tracing::warn!("Rejected state from {}: {}", from, e);
                            BootstrapEvent::LoadFailed {
                                from,
                                error: e.to_string(),
                            }
                        }
                    };
                    queue.extend(self.bootstrap.on_event(outcome));
                }
                BootstrapAction::EmitStateLoaded { from } => {
                    tracing::info!("Loaded room state from {}", from);
                    self.emit(ProviderEvent::StateLoaded { from });
                }
            }
        }
    }

    fn load_offer(&mut self) -> Result<(), ClientError> {
        let compressed = self
            .offer
            .take()
            .ok_or_else(|| ClientError::Protocol("no state offer pending".into()))?;
        let blob = StateBlob::decode(&compressed)?;
        if self.engine.load_state(&blob.into_payload()) {
            Ok(())
        } else {
            Err(ClientError::StateRejected)
        }
    }

    async fn send_due_offers(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<PendingOffer>, Vec<PendingOffer>) =
            std::mem::take(&mut self.pending_offers)
                .into_iter()
                .partition(|offer| offer.due <= now);
        self.pending_offers = later;
        if due.is_empty() {
            return;
        }

        let compressed = match self.snapshot() {
            Ok(compressed) => compressed,
            Err(e) => {
                tracing::warn!("Failed to encode state offer: {}", e);
                return;
            }
        };
        for offer in due {
            tracing::debug!("Sending state to {}", offer.to);
            let sync = StateSync {
                compressed: compressed.clone(),
                to: offer.to,
                from: self.local_id().clone(),
            };
            self.send_wire(WireEvent::StateSync(sync)).await;
        }
    }

    // ===========================================
    // Reconciliation
    // ===========================================

    async fn reconcile(&mut self) {
        if !self.state.is_connected()
            || !self.bootstrap.has_received_state()
            || self.membership.remote_count() == 0
        {
            return;
        }
        match self.snapshot() {
            Ok(compressed) => {
                tracing::trace!("Re-broadcasting full state");
                self.broadcast(Action::FullState { compressed }).await;
            }
            Err(e) => tracing::warn!("Failed to encode full state: {}", e),
        }
    }

    fn snapshot(&self) -> Result<String, SyncError> {
        StateBlob::new(self.engine.serialize_state()).encode()
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    async fn on_lifecycle(&mut self, event: Event) {
        let mut next = Some(event);

        while let Some(event) = next.take() {
            let (state, actions) = std::mem::take(&mut self.state).on_event(event);
            self.state = state;

            for action in actions {
                match action {
                    roomsync_core::Action::Subscribe => match self.channel.connect().await {
                        Ok(inbound) => self.inbound = Some(inbound),
                        Err(e) => {
                            tracing::warn!(
                                "Failed to join room {}: {}",
                                self.config.room_id,
                                e
                            );
                            next = Some(Event::ConnectFailed {
                                error: e.to_string(),
                            });
                        }
                    },
                    roomsync_core::Action::TrackPresence => {
                        let record = PresenceRecord::new(self.local_peer().clone());
                        self.channel.track(record).await;
                    }
                    roomsync_core::Action::CancelTimers => {
                        self.batcher.clear();
                        self.pending_offers.clear();
                        self.dedup.reset();
                        self.offer = None;
                    }
                    roomsync_core::Action::Unsubscribe => {
                        self.channel.unsubscribe().await;
                        self.inbound = None;
                    }
                    roomsync_core::Action::EmitStatus(status) => {
                        tracing::info!("Room {} {}", self.config.room_id, status);
                        self.emit(ProviderEvent::ConnectionStatus {
                            status,
                            peer_count: self.membership.peer_count(),
                        });
                    }
                }
            }
        }
    }

    fn emit(&self, event: ProviderEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn local_id(&self) -> &PeerId {
        &self.membership.local().id
    }
}

/// Current time on the tokio clock, as the core's `Instant`.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_inbound(inbound: &mut Option<ChannelEvents>) -> Option<ChannelEvent> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
