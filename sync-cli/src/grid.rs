//! Toy tile-grid engine used by the simulator.

use roomsync_core::MutationEngine;
use roomsync_types::{Placement, Tool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Tool selected when the grid is created.
pub const DEFAULT_TOOL: &str = "query";

/// Grid contents. Everything here is part of the shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Grid {
    width: u32,
    height: u32,
    tiles: BTreeMap<String, String>,
    tax_rate: u8,
    budget: BTreeMap<String, u8>,
    speed: u8,
    disasters: bool,
}

#[derive(Debug)]
struct GridInner {
    grid: Grid,
    /// Local UI state, never shared.
    tool: Tool,
}

/// A square grid of named tiles.
///
/// Clones share state, so the simulator can inspect an engine that a
/// provider owns.
#[derive(Debug, Clone)]
pub struct GridEngine {
    inner: Arc<Mutex<GridInner>>,
}

impl GridEngine {
    /// Create an empty grid.
    pub fn new(width: u32, height: u32) -> Self {
        let grid = Grid {
            width,
            height,
            tiles: BTreeMap::new(),
            tax_rate: 7,
            budget: BTreeMap::new(),
            speed: 1,
            disasters: false,
        };
        Self {
            inner: Arc::new(Mutex::new(GridInner {
                grid,
                tool: Tool::new(DEFAULT_TOOL),
            })),
        }
    }

    /// Apply a placement made by the local user.
    pub fn place(&self, x: u32, y: u32, tool: &str) {
        self.lock().grid.set(x, y, tool);
    }

    /// Clear a tile as the local user.
    pub fn bulldoze(&self, x: u32, y: u32) {
        self.lock().grid.clear(x, y);
    }

    /// Number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.lock().grid.tiles.len()
    }

    /// Tool at a tile, if any.
    pub fn tile(&self, x: u32, y: u32) -> Option<String> {
        self.lock().grid.tiles.get(&key(x, y)).cloned()
    }

    /// Currently selected tool.
    pub fn tool(&self) -> Tool {
        self.lock().tool.clone()
    }

    fn lock(&self) -> MutexGuard<'_, GridInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Grid {
    fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    fn set(&mut self, x: u32, y: u32, tool: &str) {
        if self.contains(x, y) {
            self.tiles.insert(key(x, y), tool.to_string());
        }
    }

    fn clear(&mut self, x: u32, y: u32) {
        self.tiles.remove(&key(x, y));
    }
}

fn key(x: u32, y: u32) -> String {
    format!("{},{}", x, y)
}

impl MutationEngine for GridEngine {
    fn apply_placement(&mut self, x: u32, y: u32, tool: &Tool, _is_remote: bool) {
        self.lock().grid.set(x, y, tool.as_str());
    }

    fn apply_batch(&mut self, entries: &[Placement], _is_remote: bool) {
        let mut inner = self.lock();
        for entry in entries {
            inner.grid.set(entry.x, entry.y, entry.tool.as_str());
        }
    }

    fn apply_bulldoze(&mut self, x: u32, y: u32, _is_remote: bool) {
        self.lock().grid.clear(x, y);
    }

    fn set_tax_rate(&mut self, rate: u8) {
        self.lock().grid.tax_rate = rate;
    }

    fn set_budget_funding(&mut self, key: &str, amount: u8) {
        self.lock().grid.budget.insert(key.to_string(), amount);
    }

    fn set_speed(&mut self, level: u8) {
        self.lock().grid.speed = level;
    }

    fn set_disasters_enabled(&mut self, enabled: bool) {
        self.lock().grid.disasters = enabled;
    }

    fn serialize_state(&self) -> Vec<u8> {
        // A map of strings and integers always serializes
        serde_json::to_vec(&self.lock().grid).unwrap_or_default()
    }

    fn load_state(&mut self, blob: &[u8]) -> bool {
        match serde_json::from_slice::<Grid>(blob) {
            Ok(grid) => {
                self.lock().grid = grid;
                true
            }
            Err(e) => {
                tracing::warn!("Rejected grid snapshot: {}", e);
                false
            }
        }
    }

    fn selected_tool(&self) -> Tool {
        self.lock().tool.clone()
    }

    fn set_selected_tool(&mut self, tool: Tool) {
        self.lock().tool = tool;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placements_outside_the_grid_are_ignored() {
        let grid = GridEngine::new(4, 4);
        grid.place(3, 3, "road");
        grid.place(4, 0, "road");
        assert_eq!(grid.tile_count(), 1);
    }

    #[test]
    fn snapshot_restores_shared_state_only() {
        let mut source = GridEngine::new(8, 8);
        source.place(1, 2, "road");
        source.set_tax_rate(12);
        source.set_selected_tool(Tool::new("power_line"));

        let mut target = GridEngine::new(8, 8);
        assert!(target.load_state(&source.serialize_state()));

        assert_eq!(target.tile(1, 2).as_deref(), Some("road"));
        assert_eq!(target.serialize_state(), source.serialize_state());
        assert_eq!(target.tool().as_str(), DEFAULT_TOOL);
    }

    #[test]
    fn garbage_snapshot_is_rejected() {
        let mut grid = GridEngine::new(8, 8);
        grid.place(0, 0, "road");
        assert!(!grid.load_state(b"not json"));
        assert_eq!(grid.tile_count(), 1);
    }

    #[test]
    fn clones_share_state() {
        let grid = GridEngine::new(8, 8);
        let mut shared = grid.clone();
        shared.apply_batch(
            &[Placement::new(0, 0, "road"), Placement::new(1, 0, "road")],
            true,
        );
        shared.apply_bulldoze(0, 0, true);
        assert_eq!(grid.tile_count(), 1);
    }
}
