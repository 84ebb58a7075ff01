//! In-process room channels.
//!
//! [`MemoryHub`] plays the role of the hosted realtime service: it keeps
//! one member table per room, fans broadcasts out to every other member and
//! maintains presence. Each [`MemoryChannel`] is one subscription handle.
//! Used by the simulator and by multi-peer tests.

use super::{Channel, ChannelEvent, ChannelEvents, SubscriptionStatus, TransportError};
use async_trait::async_trait;
use roomsync_core::PresenceChange;
use roomsync_types::PresenceRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Shared in-process pub/sub hub.
///
/// Cloning the hub shares its rooms.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

#[derive(Debug, Default)]
struct HubInner {
    rooms: HashMap<String, HashMap<u64, Member>>,
    next_conn: u64,
    fail_next_connect: Option<String>,
}

#[derive(Debug)]
struct Member {
    tx: mpsc::UnboundedSender<ChannelEvent>,
    presence: Option<PresenceRecord>,
}

impl HubInner {
    fn presence_snapshot(&self, room: &str) -> Vec<PresenceRecord> {
        let mut records: Vec<PresenceRecord> = self
            .rooms
            .get(room)
            .into_iter()
            .flat_map(|members| members.values())
            .filter_map(|m| m.presence.clone())
            .collect();
        records.sort_by(|a, b| a.player.id.cmp(&b.player.id));
        records
    }

    fn notify_all(&self, room: &str, event: &ChannelEvent) {
        if let Some(members) = self.rooms.get(room) {
            for member in members.values() {
                // A dropped receiver is a member that is going away
                let _ = member.tx.send(event.clone());
            }
        }
    }

    fn detach(&mut self, room: &str, conn: u64) {
        let Some(members) = self.rooms.get_mut(room) else {
            return;
        };
        let removed = members.remove(&conn);
        if members.is_empty() {
            self.rooms.remove(room);
        }

        if let Some(record) = removed.and_then(|m| m.presence) {
            let leave = ChannelEvent::Presence(PresenceChange::Leave(vec![record.player.id]));
            self.notify_all(room, &leave);
            let sync = ChannelEvent::Presence(PresenceChange::Sync(self.presence_snapshot(room)));
            self.notify_all(room, &sync);
        }
    }
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a subscription handle for `room_id`. Nothing happens until
    /// the handle connects.
    pub fn channel(&self, room_id: impl Into<String>) -> MemoryChannel {
        MemoryChannel {
            hub: self.clone(),
            room: room_id.into(),
            conn: Mutex::new(None),
        }
    }

    /// Cause the next connect() on any channel of this hub to fail.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    /// Report a channel error to every member of `room_id`.
    pub fn interrupt(&self, room_id: &str, reason: &str) {
        let event = ChannelEvent::Status(SubscriptionStatus::ChannelError(reason.to_string()));
        self.lock().notify_all(room_id, &event);
    }

    /// Number of live subscriptions in `room_id`.
    pub fn member_count(&self, room_id: &str) -> usize {
        self.lock().rooms.get(room_id).map_or(0, HashMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One subscription to a [`MemoryHub`] room.
#[derive(Debug)]
pub struct MemoryChannel {
    hub: MemoryHub,
    room: String,
    conn: Mutex<Option<u64>>,
}

impl MemoryChannel {
    /// The room this channel is scoped to.
    pub fn room(&self) -> &str {
        &self.room
    }

    fn conn(&self) -> MutexGuard<'_, Option<u64>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn connect(&self) -> Result<ChannelEvents, TransportError> {
        let mut conn = self.conn();
        let mut hub = self.hub.lock();

        if let Some(error) = hub.fail_next_connect.take() {
            tracing::warn!("Subscription to room {} refused: {}", self.room, error);
            return Err(TransportError::ConnectionFailed(error));
        }

        // Reconnecting replaces the previous subscription
        if let Some(old) = conn.take() {
            hub.detach(&self.room, old);
        }

        let id = hub.next_conn;
        hub.next_conn += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = hub.presence_snapshot(&self.room);
        let _ = tx.send(ChannelEvent::Status(SubscriptionStatus::Subscribed));
        let _ = tx.send(ChannelEvent::Presence(PresenceChange::Sync(snapshot)));

        hub.rooms
            .entry(self.room.clone())
            .or_default()
            .insert(id, Member { tx, presence: None });
        *conn = Some(id);

        tracing::debug!("Connection {} subscribed to room {}", id, self.room);
        Ok(rx)
    }

    async fn send(&self, event: &str, payload: Vec<u8>) {
        let Some(id) = *self.conn() else {
            tracing::trace!("Dropping {} sent on closed channel", event);
            return;
        };

        let hub = self.hub.lock();
        if let Some(members) = hub.rooms.get(&self.room) {
            for (_, member) in members.iter().filter(|(conn, _)| **conn != id) {
                let _ = member.tx.send(ChannelEvent::Broadcast {
                    event: event.to_string(),
                    payload: payload.clone(),
                });
            }
        }
    }

    async fn track(&self, presence: PresenceRecord) {
        let Some(id) = *self.conn() else {
            return;
        };

        let mut hub = self.hub.lock();
        let Some(member) = hub
            .rooms
            .get_mut(&self.room)
            .and_then(|members| members.get_mut(&id))
        else {
            return;
        };
        member.presence = Some(presence.clone());

        let sync = ChannelEvent::Presence(PresenceChange::Sync(hub.presence_snapshot(&self.room)));
        hub.notify_all(&self.room, &sync);
        let join = ChannelEvent::Presence(PresenceChange::Join(vec![presence]));
        hub.notify_all(&self.room, &join);
    }

    async fn unsubscribe(&self) {
        let Some(id) = self.conn().take() else {
            return;
        };
        self.hub.lock().detach(&self.room, id);
        tracing::debug!("Connection {} left room {}", id, self.room);
    }

    fn is_subscribed(&self) -> bool {
        self.conn().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_types::{Peer, PeerId};

    fn record(id: &str) -> PresenceRecord {
        PresenceRecord::new(Peer::with_id(PeerId::new(id), id))
    }

    /// Drain everything currently queued on a receiver.
    fn drain(rx: &mut ChannelEvents) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn broadcasts(events: &[ChannelEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::Broadcast { event, .. } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn connect_reports_subscribed_then_presence() {
        let hub = MemoryHub::new();
        let channel = hub.channel("room");

        let mut rx = channel.connect().await.unwrap();
        let events = drain(&mut rx);

        assert_eq!(
            events[0],
            ChannelEvent::Status(SubscriptionStatus::Subscribed)
        );
        assert_eq!(
            events[1],
            ChannelEvent::Presence(PresenceChange::Sync(vec![]))
        );
        assert!(channel.is_subscribed());
        assert_eq!(hub.member_count("room"), 1);
    }

    #[tokio::test]
    async fn broadcast_skips_sender() {
        let hub = MemoryHub::new();
        let a = hub.channel("room");
        let b = hub.channel("room");
        let mut rx_a = a.connect().await.unwrap();
        let mut rx_b = b.connect().await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        a.send("action", b"{}".to_vec()).await;

        assert!(broadcasts(&drain(&mut rx_a)).is_empty());
        assert_eq!(broadcasts(&drain(&mut rx_b)), vec!["action"]);
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = MemoryHub::new();
        let a = hub.channel("one");
        let b = hub.channel("two");
        let _rx_a = a.connect().await.unwrap();
        let mut rx_b = b.connect().await.unwrap();
        drain(&mut rx_b);

        a.send("action", vec![]).await;
        a.track(record("a")).await;

        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn track_announces_sync_and_join_to_everyone() {
        let hub = MemoryHub::new();
        let a = hub.channel("room");
        let b = hub.channel("room");
        let mut rx_a = a.connect().await.unwrap();
        let mut rx_b = b.connect().await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        a.track(record("a")).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            assert_eq!(
                events,
                vec![
                    ChannelEvent::Presence(PresenceChange::Sync(vec![record("a")])),
                    ChannelEvent::Presence(PresenceChange::Join(vec![record("a")])),
                ]
            );
        }
    }

    #[tokio::test]
    async fn late_subscriber_sees_existing_presence() {
        let hub = MemoryHub::new();
        let a = hub.channel("room");
        let _rx_a = a.connect().await.unwrap();
        a.track(record("a")).await;

        let b = hub.channel("room");
        let mut rx_b = b.connect().await.unwrap();
        let events = drain(&mut rx_b);

        assert_eq!(
            events[1],
            ChannelEvent::Presence(PresenceChange::Sync(vec![record("a")]))
        );
    }

    #[tokio::test]
    async fn unsubscribe_announces_leave() {
        let hub = MemoryHub::new();
        let a = hub.channel("room");
        let b = hub.channel("room");
        let _rx_a = a.connect().await.unwrap();
        let mut rx_b = b.connect().await.unwrap();
        a.track(record("a")).await;
        drain(&mut rx_b);

        a.unsubscribe().await;

        let events = drain(&mut rx_b);
        assert_eq!(
            events[0],
            ChannelEvent::Presence(PresenceChange::Leave(vec![PeerId::new("a")]))
        );
        assert_eq!(hub.member_count("room"), 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_silences_channel() {
        let hub = MemoryHub::new();
        let a = hub.channel("room");
        let b = hub.channel("room");
        let _rx_a = a.connect().await.unwrap();
        let mut rx_b = b.connect().await.unwrap();
        drain(&mut rx_b);

        a.unsubscribe().await;
        a.unsubscribe().await;
        a.send("action", vec![]).await;
        a.track(record("a")).await;

        assert!(!a.is_subscribed());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn forced_connect_failure() {
        let hub = MemoryHub::new();
        hub.fail_next_connect("service unavailable");
        let channel = hub.channel("room");

        let result = channel.connect().await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!channel.is_subscribed());

        // Next connect works
        channel.connect().await.unwrap();
        assert!(channel.is_subscribed());
    }

    #[tokio::test]
    async fn interrupt_reaches_members() {
        let hub = MemoryHub::new();
        let a = hub.channel("room");
        let mut rx = a.connect().await.unwrap();
        drain(&mut rx);

        hub.interrupt("room", "socket reset");

        assert_eq!(
            drain(&mut rx),
            vec![ChannelEvent::Status(SubscriptionStatus::ChannelError(
                "socket reset".into()
            ))]
        );
    }
}
