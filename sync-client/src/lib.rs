//! # roomsync-client
//!
//! Client library for roomsync host-less room state sync.
//!
//! This is the library a game embeds to share one simulation across peers.
//!
//! ## Features
//!
//! - **No host**: any peer holding state serves late joiners
//! - **Placement batching**: bursts of placements travel as one message
//! - **Transport abstraction**: pluggable room channel (in-memory hub, mock)
//! - **Pure state machines**: uses roomsync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use roomsync_client::{MemoryHub, ProviderConfig, ProviderEvent, SyncProvider};
//!
//! let hub = MemoryHub::new();
//! let config = ProviderConfig::new("city-42").with_display_name("Alice");
//! let (provider, mut events) = SyncProvider::new(config, hub.channel("city-42"), engine)?;
//! let handle = provider.spawn();
//!
//! // Apply locally, then share
//! handle.place(3, 4, "road")?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ProviderEvent::StateLoaded { from } = event {
//!         println!("caught up from {}", from);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod handle;
pub mod provider;
pub mod transport;

pub use config::{ConfigError, ProviderConfig, DEFAULT_RECONCILE_INTERVAL};
pub use handle::ProviderHandle;
pub use provider::{ClientError, ProviderEvent, ProviderEvents, SyncProvider};
pub use transport::{
    Channel, ChannelEvent, ChannelEvents, MemoryChannel, MemoryHub, MockChannel,
    SubscriptionStatus, TransportError,
};
