//! Application of remotely originated actions.
//!
//! [`RemoteApplier`] is a dispatch table from [`Action`] variants to
//! [`MutationEngine`] calls. Every call carries the remote-origin flag
//! where the engine contract has one. Placements temporarily switch the
//! engine's selected tool and always restore the local user's selection.

use roomsync_types::{Action, ActionMessage, PeerId, Placement};

use crate::engine::MutationEngine;

/// What happened to a received action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The engine was mutated.
    Applied,
    /// The action came from the local peer and was skipped.
    SelfEcho,
    /// A full snapshot; it must go through the bootstrap guard instead.
    StateOffer {
        /// Encoded state blob.
        compressed: String,
    },
    /// Nothing to apply (heartbeat, empty batch).
    Ignored,
}

/// Applies actions received from other peers.
#[derive(Debug, Clone)]
pub struct RemoteApplier {
    local: PeerId,
}

impl RemoteApplier {
    /// Create an applier for the given local peer.
    pub fn new(local: PeerId) -> Self {
        Self { local }
    }

    /// Apply one received action to `engine`.
    ///
    /// Actions stamped with the local peer id are never applied, whether or
    /// not the transport suppressed self-delivery.
    pub fn apply<E>(&self, engine: &mut E, message: &ActionMessage) -> ApplyOutcome
    where
        E: MutationEngine + ?Sized,
    {
        if message.origin_peer_id == self.local {
            return ApplyOutcome::SelfEcho;
        }

        match &message.action {
            Action::Place(placement) => {
                apply_placements(engine, std::slice::from_ref(placement));
                ApplyOutcome::Applied
            }
            Action::PlaceBatch { placements } if placements.is_empty() => ApplyOutcome::Ignored,
            Action::PlaceBatch { placements } => {
                apply_placements(engine, placements);
                ApplyOutcome::Applied
            }
            Action::Bulldoze { x, y } => {
                engine.apply_bulldoze(*x, *y, true);
                ApplyOutcome::Applied
            }
            Action::SetTaxRate { rate } => {
                engine.set_tax_rate(*rate);
                ApplyOutcome::Applied
            }
            Action::SetBudget { key, amount } => {
                engine.set_budget_funding(key, *amount);
                ApplyOutcome::Applied
            }
            Action::SetSpeed { level } => {
                engine.set_speed(*level);
                ApplyOutcome::Applied
            }
            Action::SetDisasters { enabled } => {
                engine.set_disasters_enabled(*enabled);
                ApplyOutcome::Applied
            }
            Action::FullState { compressed } => ApplyOutcome::StateOffer {
                compressed: compressed.clone(),
            },
            Action::Tick { .. } => ApplyOutcome::Ignored,
        }
    }
}

/// Apply placements in order, switching tools per same-tool run.
fn apply_placements<E>(engine: &mut E, placements: &[Placement])
where
    E: MutationEngine + ?Sized,
{
    let saved = engine.selected_tool();

    let mut start = 0;
    while start < placements.len() {
        let tool = &placements[start].tool;
        let mut end = start + 1;
        while end < placements.len() && placements[end].tool == *tool {
            end += 1;
        }

        engine.set_selected_tool(tool.clone());
        let run = &placements[start..end];
        if let [single] = run {
            engine.apply_placement(single.x, single.y, &single.tool, true);
        } else {
            engine.apply_batch(run, true);
        }
        start = end;
    }

    engine.set_selected_tool(saved);
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_types::Tool;

    /// Engine double that logs every call in order.
    #[derive(Debug)]
    struct CallLog {
        tool: Tool,
        calls: Vec<String>,
    }

    impl CallLog {
        fn new(tool: &str) -> Self {
            Self {
                tool: Tool::new(tool),
                calls: Vec::new(),
            }
        }
    }

    impl MutationEngine for CallLog {
        fn apply_placement(&mut self, x: u32, y: u32, tool: &Tool, is_remote: bool) {
            self.calls
                .push(format!("place {x},{y} {tool} remote={is_remote}"));
        }

        fn apply_batch(&mut self, entries: &[Placement], is_remote: bool) {
            let xs: Vec<String> = entries.iter().map(|p| p.x.to_string()).collect();
            self.calls
                .push(format!("batch [{}] remote={is_remote}", xs.join(",")));
        }

        fn apply_bulldoze(&mut self, x: u32, y: u32, is_remote: bool) {
            self.calls.push(format!("bulldoze {x},{y} remote={is_remote}"));
        }

        fn set_tax_rate(&mut self, rate: u8) {
            self.calls.push(format!("tax {rate}"));
        }

        fn set_budget_funding(&mut self, key: &str, amount: u8) {
            self.calls.push(format!("budget {key} {amount}"));
        }

        fn set_speed(&mut self, level: u8) {
            self.calls.push(format!("speed {level}"));
        }

        fn set_disasters_enabled(&mut self, enabled: bool) {
            self.calls.push(format!("disasters {enabled}"));
        }

        fn serialize_state(&self) -> Vec<u8> {
            Vec::new()
        }

        fn load_state(&mut self, _blob: &[u8]) -> bool {
            self.calls.push("load".into());
            true
        }

        fn selected_tool(&self) -> Tool {
            self.tool.clone()
        }

        fn set_selected_tool(&mut self, tool: Tool) {
            self.calls.push(format!("tool {tool}"));
            self.tool = tool;
        }
    }

    fn from_peer(action: Action) -> ActionMessage {
        ActionMessage {
            action,
            timestamp: 0,
            origin_peer_id: PeerId::new("remote"),
        }
    }

    fn applier() -> RemoteApplier {
        RemoteApplier::new(PeerId::new("local"))
    }

    #[test]
    fn place_switches_and_restores_tool() {
        let mut engine = CallLog::new("query");
        let outcome = applier().apply(
            &mut engine,
            &from_peer(Action::Place(Placement::new(1, 2, "road"))),
        );

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(
            engine.calls,
            vec!["tool road", "place 1,2 road remote=true", "tool query"]
        );
        assert_eq!(engine.tool, Tool::new("query"));
    }

    #[test]
    fn mixed_tool_batch_keeps_order_and_restores() {
        let mut engine = CallLog::new("query");
        let batch = Action::PlaceBatch {
            placements: vec![
                Placement::new(1, 0, "road"),
                Placement::new(2, 0, "road"),
                Placement::new(3, 0, "power_line"),
                Placement::new(4, 0, "road"),
            ],
        };

        applier().apply(&mut engine, &from_peer(batch));

        assert_eq!(
            engine.calls,
            vec![
                "tool road",
                "batch [1,2] remote=true",
                "tool power_line",
                "place 3,0 power_line remote=true",
                "tool road",
                "place 4,0 road remote=true",
                "tool query",
            ]
        );
    }

    #[test]
    fn self_echo_is_never_applied() {
        let mut engine = CallLog::new("query");
        let echo = ActionMessage {
            action: Action::Bulldoze { x: 1, y: 1 },
            timestamp: 0,
            origin_peer_id: PeerId::new("local"),
        };

        assert_eq!(applier().apply(&mut engine, &echo), ApplyOutcome::SelfEcho);
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn policy_actions_reach_engine() {
        let mut engine = CallLog::new("query");
        let applier = applier();
        for action in [
            Action::Bulldoze { x: 7, y: 8 },
            Action::SetTaxRate { rate: 12 },
            Action::SetBudget {
                key: "fire".into(),
                amount: 50,
            },
            Action::SetSpeed { level: 3 },
            Action::SetDisasters { enabled: true },
        ] {
            applier.apply(&mut engine, &from_peer(action));
        }

        assert_eq!(
            engine.calls,
            vec![
                "bulldoze 7,8 remote=true",
                "tax 12",
                "budget fire 50",
                "speed 3",
                "disasters true",
            ]
        );
    }

    #[test]
    fn full_state_is_handed_back_not_loaded() {
        let mut engine = CallLog::new("query");
        let outcome = applier().apply(
            &mut engine,
            &from_peer(Action::FullState {
                compressed: "abc".into(),
            }),
        );

        assert_eq!(
            outcome,
            ApplyOutcome::StateOffer {
                compressed: "abc".into()
            }
        );
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn tick_and_empty_batch_are_ignored() {
        let mut engine = CallLog::new("query");
        let applier = applier();

        assert_eq!(
            applier.apply(&mut engine, &from_peer(Action::Tick { tick: 9 })),
            ApplyOutcome::Ignored
        );
        assert_eq!(
            applier.apply(
                &mut engine,
                &from_peer(Action::PlaceBatch { placements: vec![] })
            ),
            ApplyOutcome::Ignored
        );
        assert!(engine.calls.is_empty());
    }
}
