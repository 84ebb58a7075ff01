//! Contract with the external mutation engine.
//!
//! roomsync never touches world state directly. Everything it does to the
//! simulation goes through this trait, implemented by the host application.

use roomsync_types::{Placement, Tool};

/// Operations roomsync needs from the simulation engine.
///
/// The `is_remote` flag tells the engine the mutation was originated by
/// another peer, so it can skip local UI echo and must not hand the
/// mutation back to the synchronization layer for re-broadcast.
pub trait MutationEngine {
    /// Place one tile with `tool` at `(x, y)`.
    fn apply_placement(&mut self, x: u32, y: u32, tool: &Tool, is_remote: bool);

    /// Place an ordered run of tiles. Entries must be applied in order.
    fn apply_batch(&mut self, entries: &[Placement], is_remote: bool);

    /// Clear the tile at `(x, y)`.
    fn apply_bulldoze(&mut self, x: u32, y: u32, is_remote: bool);

    /// Set the tax rate.
    fn set_tax_rate(&mut self, rate: u8);

    /// Set funding for one budget line.
    fn set_budget_funding(&mut self, key: &str, amount: u8);

    /// Set simulation speed.
    fn set_speed(&mut self, level: u8);

    /// Enable or disable disasters.
    fn set_disasters_enabled(&mut self, enabled: bool);

    /// Serialize the full engine state.
    fn serialize_state(&self) -> Vec<u8>;

    /// Replace the engine state. Returns `false` if the bytes were rejected.
    fn load_state(&mut self, blob: &[u8]) -> bool;

    /// Currently selected tool of the local user.
    fn selected_tool(&self) -> Tool;

    /// Change the selected tool.
    fn set_selected_tool(&mut self, tool: Tool);
}
