//! Run several providers in one process and check that they converge.

use anyhow::{Context, Result};
use roomsync_client::{
    MemoryHub, ProviderConfig, ProviderEvent, ProviderEvents, ProviderHandle, SyncProvider,
};
use roomsync_core::MutationEngine;
use roomsync_types::Action;
use std::time::Duration;

use crate::grid::GridEngine;

/// Grid side length.
pub const GRID_SIZE: u32 = 32;

const TOOLS: [&str; 3] = ["road", "zone_residential", "power_line"];

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Peers present from the start.
    pub peers: usize,
    /// Placements made by the first peer.
    pub placements: usize,
    /// Add one more peer after the edits.
    pub late_joiner: bool,
}

/// Per-peer outcome.
#[derive(Debug, Clone)]
pub struct PeerReport {
    /// Display name.
    pub name: String,
    /// Occupied tiles in the peer's engine.
    pub tiles: usize,
    /// Whether the provider reports holding state.
    pub has_state: bool,
    /// Engine state equals the first peer's.
    pub matches: bool,
}

/// Simulation outcome.
#[derive(Debug, Clone)]
pub struct Report {
    /// One entry per peer, first peer first.
    pub peers: Vec<PeerReport>,
}

impl Report {
    /// Whether every engine ended with the same state.
    pub fn converged(&self) -> bool {
        self.peers.iter().all(|p| p.matches && p.has_state)
    }
}

struct SimPeer {
    name: String,
    handle: ProviderHandle,
    events: ProviderEvents,
    engine: GridEngine,
}

/// Run the simulate command.
pub async fn run(config: ProviderConfig, options: SimulateOptions) -> Result<()> {
    println!(
        "Simulating {} peer(s) in room {}...",
        options.peers, config.room_id
    );
    let report = simulate(config, &options).await?;

    println!();
    for peer in &report.peers {
        println!(
            "  {:<12} tiles: {:>4}  state: {:<5}  {}",
            peer.name,
            peer.tiles,
            peer.has_state,
            if peer.matches { "in sync" } else { "DIVERGED" }
        );
    }
    println!();

    if !report.converged() {
        anyhow::bail!("Peers did not converge");
    }
    println!("All {} peers converged.", report.peers.len());
    Ok(())
}

/// Drive the simulation and collect the report.
pub async fn simulate(config: ProviderConfig, options: &SimulateOptions) -> Result<Report> {
    if options.peers == 0 {
        anyhow::bail!("Need at least one peer");
    }

    let hub = MemoryHub::new();
    let settle = config.max_offer_jitter + Duration::from_millis(300);
    let flush_wait = config.flush_interval + Duration::from_millis(200);

    // The first peer owns the initial map
    let seed = GridEngine::new(GRID_SIZE, GRID_SIZE).serialize_state();
    let mut peers = vec![join(&hub, &config, 0, Some(seed))?];
    for index in 1..options.peers {
        peers.push(join(&hub, &config, index, None)?);
    }
    tokio::time::sleep(settle).await;

    let host = &peers[0];
    for i in 0..options.placements {
        let x = i as u32 % GRID_SIZE;
        let y = (i as u32 / GRID_SIZE) % GRID_SIZE;
        let tool = TOOLS[i % TOOLS.len()];
        host.engine.place(x, y, tool);
        host.handle.place(x, y, tool)?;
    }
    if options.placements > 0 {
        host.engine.bulldoze(0, 0);
        host.handle.dispatch(Action::Bulldoze { x: 0, y: 0 })?;
    }
    tokio::time::sleep(flush_wait).await;

    if options.late_joiner {
        tracing::info!("Adding late joiner");
        peers.push(join(&hub, &config, options.peers, None)?);
        tokio::time::sleep(settle).await;
    }

    let reference = peers[0].engine.serialize_state();
    let mut reports = Vec::with_capacity(peers.len());
    for peer in &mut peers {
        while let Ok(event) = peer.events.try_recv() {
            if let ProviderEvent::StateLoaded { from } = event {
                tracing::debug!("{} loaded state from {}", peer.name, from);
            }
        }
        reports.push(PeerReport {
            name: peer.name.clone(),
            tiles: peer.engine.tile_count(),
            has_state: peer.handle.has_received_state().await?,
            matches: peer.engine.serialize_state() == reference,
        });
    }

    for peer in &peers {
        peer.handle.destroy().await?;
    }

    Ok(Report { peers: reports })
}

fn join(
    hub: &MemoryHub,
    config: &ProviderConfig,
    index: usize,
    seed: Option<Vec<u8>>,
) -> Result<SimPeer> {
    let name = format!("{}-{}", config.display_name, index);
    let mut peer_config = config.clone().with_display_name(&name);
    if let Some(seed) = seed {
        peer_config = peer_config.with_initial_state(seed);
    }

    let engine = GridEngine::new(GRID_SIZE, GRID_SIZE);
    let (provider, events) =
        SyncProvider::new(peer_config, hub.channel(&config.room_id), engine.clone())
            .with_context(|| format!("Failed to start {}", name))?;
    let handle = provider.spawn();

    Ok(SimPeer {
        name,
        handle,
        events,
        engine,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(peers: usize, placements: usize, late_joiner: bool) -> SimulateOptions {
        SimulateOptions {
            peers,
            placements,
            late_joiner,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn peers_converge() {
        let report = simulate(ProviderConfig::new("sim"), &options(3, 40, false))
            .await
            .unwrap();

        assert_eq!(report.peers.len(), 3);
        assert!(report.converged());
        // 40 placements minus the bulldozed origin
        assert!(report.peers.iter().all(|p| p.tiles == 39));
    }

    #[tokio::test(start_paused = true)]
    async fn late_joiner_catches_up() {
        let report = simulate(ProviderConfig::new("sim"), &options(2, 250, true))
            .await
            .unwrap();

        assert_eq!(report.peers.len(), 3);
        assert_eq!(report.peers[2].name, "Player-2");
        assert!(report.converged());
    }

    #[tokio::test(start_paused = true)]
    async fn single_peer_is_trivially_converged() {
        let report = simulate(ProviderConfig::new("sim"), &options(1, 0, false))
            .await
            .unwrap();
        assert!(report.converged());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_peers_is_an_error() {
        assert!(simulate(ProviderConfig::new("sim"), &options(0, 1, false))
            .await
            .is_err());
    }
}
