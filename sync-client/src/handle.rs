//! Handle for talking to a running provider.

use roomsync_core::ConnectionState;
use roomsync_types::{Action, Peer, Placement};
use tokio::sync::{mpsc, oneshot};

use crate::provider::ClientError;

/// Requests from handles to the provider task.
#[derive(Debug)]
pub(crate) enum Command {
    Dispatch(Action),
    Flush,
    MarkStateReady,
    Reconnect,
    Members(oneshot::Sender<Vec<Peer>>),
    HasReceivedState(oneshot::Sender<bool>),
    Status(oneshot::Sender<ConnectionState>),
    Destroy(oneshot::Sender<()>),
}

/// Cloneable handle to a spawned [`SyncProvider`](crate::SyncProvider).
///
/// Every call returns [`ClientError::Destroyed`] once the provider has been
/// torn down, except [`destroy`](Self::destroy), which is idempotent.
#[derive(Debug, Clone)]
pub struct ProviderHandle {
    commands: mpsc::UnboundedSender<Command>,
    local: Peer,
}

impl ProviderHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, local: Peer) -> Self {
        Self { commands, local }
    }

    /// The local peer as announced to the room.
    pub fn local_peer(&self) -> &Peer {
        &self.local
    }

    /// Broadcast a locally applied action.
    ///
    /// The caller has already applied `action` to its own engine. Placements
    /// are batched, repeats within the dedup window are dropped.
    pub fn dispatch(&self, action: Action) -> Result<(), ClientError> {
        self.send(Command::Dispatch(action))
    }

    /// Shorthand for dispatching a single placement.
    pub fn place(&self, x: u32, y: u32, tool: &str) -> Result<(), ClientError> {
        self.dispatch(Action::Place(Placement::new(x, y, tool)))
    }

    /// Send buffered placements now instead of at the next deadline.
    pub fn flush(&self) -> Result<(), ClientError> {
        self.send(Command::Flush)
    }

    /// Declare that the local engine holds authoritative state.
    ///
    /// Use this when the host loaded a save or generated a fresh map.
    pub fn mark_state_ready(&self) -> Result<(), ClientError> {
        self.send(Command::MarkStateReady)
    }

    /// Rejoin the room after a failure. No-op while connecting or connected.
    pub fn reconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Reconnect)
    }

    /// Current room members, oldest join first.
    pub async fn members(&self) -> Result<Vec<Peer>, ClientError> {
        self.query(Command::Members).await
    }

    /// Whether the local engine holds room state.
    pub async fn has_received_state(&self) -> Result<bool, ClientError> {
        self.query(Command::HasReceivedState).await
    }

    /// Current connection state.
    pub async fn status(&self) -> Result<ConnectionState, ClientError> {
        self.query(Command::Status).await
    }

    /// Leave the room and stop the provider.
    ///
    /// Pending placements are dropped, not sent.
    pub async fn destroy(&self) -> Result<(), ClientError> {
        match self.query(Command::Destroy).await {
            Ok(()) | Err(ClientError::Destroyed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Check whether the provider task has stopped.
    pub fn is_destroyed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::Destroyed)
    }

    async fn query<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| ClientError::Destroyed)
    }
}
