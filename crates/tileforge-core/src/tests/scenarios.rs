//! End-to-end scenarios through the scheduler and engine.

use std::sync::Arc;

use serde_json::json;
use tilegrid::Position;

use crate::action::{Action, ActionMetadata};
use crate::engine::{ResolutionEngine, NPC_LAST_EVENT_KEY};
use crate::ids::{InstanceId, NpcId, PlayerId};
use crate::placement::IssueCode;
use crate::resolution::{
    Effect, ErrorCode, RejectionDetails, RejectionReason, Resolution, TilePlacementEffect,
};
use crate::rules::{Adjacency, PlacementRules, StaticRuleSets};
use crate::scheduler::TickScheduler;
use crate::session::{PlayerStatus, SessionStatus};

use super::helpers::{
    assert_rejected, at_tick, default_engine, engine, in_instance, init_tracing, npc_event,
    placement, resolved_ids, scripted_event, session, INSTANCE,
};

fn placement_effect(resolution: &Resolution) -> &TilePlacementEffect {
    let applied = resolution.as_applied().expect("applied");
    match &applied.effects[..] {
        [Effect::TilePlacement(effect)] => effect,
        other => panic!("expected one placement effect, got {other:?}"),
    }
}

fn issue_codes(resolution: &Resolution) -> Vec<IssueCode> {
    match &resolution.as_rejected().expect("rejected").details {
        Some(RejectionDetails::Issues { issues }) => issues.iter().map(|i| i.code).collect(),
        other => panic!("expected issue details, got {other:?}"),
    }
}

// =============================================================================
// Contention on one board
// =============================================================================

mod contention {
    use super::*;

    #[test]
    fn same_cell_same_tick_goes_to_higher_initiative() {
        init_tracing();
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 10), ("b", 5)]);
        let mut scheduler = TickScheduler::new();

        // Lower initiative arrives first; order must not depend on that.
        scheduler.submit(placement("b", 5, (2, 2), 2, 1));
        scheduler.submit(placement("a", 10, (2, 2), 1, 1));
        let resolutions = scheduler.run_all(&engine, &mut session);

        assert_eq!(resolved_ids(&resolutions), vec!["a@1", "b@1"]);

        let effect = placement_effect(&resolutions[0]);
        assert_eq!(effect.previous_tile_type, None);
        assert_eq!(effect.tick, 1);

        assert_rejected(&resolutions[1], RejectionReason::Conflict);
        let rejected = resolutions[1].as_rejected().unwrap();
        assert_eq!(rejected.error.code, ErrorCode::PrecedenceConflict);
        assert!(rejected.error.retryable);
        assert_eq!(
            rejected.details,
            Some(RejectionDetails::Conflict {
                position: Position::new(2, 2),
                occupant_player_id: Some(PlayerId::new("a")),
                occupant_tick: Some(1),
            })
        );

        let cell = session.board.get_cell(Position::new(2, 2)).unwrap();
        assert_eq!(cell.tile_type, 1);
        assert_eq!(cell.last_updated_by, Some(PlayerId::new("a")));
    }

    #[test]
    fn neighbor_of_occupied_cell_applies() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 10), ("b", 5)]);

        assert!(engine
            .handle(&placement("a", 10, (2, 2), 1, 1), &mut session)
            .is_applied());
        let resolution = engine.handle(&placement("b", 5, (3, 2), 2, 2), &mut session);

        assert!(resolution.is_applied());
        assert_eq!(session.tick, 2);
        assert_eq!(session.board.occupied_count(), 2);
        let player = &session.players[&PlayerId::new("b")];
        assert_eq!(player.last_action_tick, Some(2));
        assert_eq!(player.last_placement, Some(Position::new(3, 2)));
    }

    #[test]
    fn isolated_cell_fails_adjacency() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 10), ("c", 1)]);

        engine.handle(&placement("a", 10, (2, 2), 1, 1), &mut session);
        let before = session.state_hash();
        let resolution = engine.handle(&placement("c", 1, (0, 0), 3, 2), &mut session);

        assert_rejected(&resolution, RejectionReason::Validation);
        assert_eq!(
            resolution.as_rejected().unwrap().error.code,
            ErrorCode::InvalidTilePlacement
        );
        assert_eq!(issue_codes(&resolution), vec![IssueCode::AdjacencyRequired]);
        assert_eq!(session.state_hash(), before);
    }

    #[test]
    fn exactly_one_of_many_claims_wins() {
        let engine = default_engine();
        let players = [("p1", 1), ("p2", 2), ("p3", 3), ("p4", 4)];
        let mut session = session(5, 5, &players);
        let mut scheduler = TickScheduler::new();
        for (id, initiative) in players {
            scheduler.submit(placement(id, initiative, (1, 1), 1, 9));
        }

        let resolutions = scheduler.run_all(&engine, &mut session);
        let applied: Vec<_> = resolutions.iter().filter(|r| r.is_applied()).collect();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].action().id().as_str(), "p4@9");
        for rejected in resolutions.iter().filter_map(Resolution::as_rejected) {
            assert_eq!(rejected.reason, RejectionReason::Conflict);
            assert!(matches!(
                &rejected.details,
                Some(RejectionDetails::Conflict { occupant_player_id: Some(p), .. })
                    if p.as_str() == "p4"
            ));
        }
    }

    #[test]
    fn conflict_serializes_with_occupant() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 10), ("b", 5)]);
        engine.handle(&placement("a", 10, (2, 2), 1, 1), &mut session);
        let resolution = engine.handle(&placement("b", 5, (2, 2), 2, 1), &mut session);

        let wire = serde_json::to_value(&resolution).unwrap();
        assert_eq!(wire["status"], "rejected");
        assert_eq!(wire["reason"], "conflict");
        assert_eq!(wire["error"]["code"], "PRECEDENCE_CONFLICT");
        assert_eq!(wire["error"]["numericCode"], 3009);
        assert_eq!(wire["details"]["kind"], "conflict");
        assert_eq!(wire["details"]["occupantPlayerId"], "a");
        assert_eq!(wire["action"]["type"], "tile_placement");
        assert_eq!(wire["instanceId"], INSTANCE);
    }
}

// =============================================================================
// Ordering across categories and ticks
// =============================================================================

mod ordering {
    use super::*;

    #[test]
    fn npc_event_precedes_high_initiative_placement() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 99)]);
        let mut scheduler = TickScheduler::new();

        scheduler.submit(placement("a", 99, (0, 0), 1, 100));
        scheduler.submit(npc_event("guard", 3, 100));
        let resolutions = scheduler.run_all(&engine, &mut session);

        assert_eq!(resolved_ids(&resolutions), vec!["guard@100", "a@100"]);
        assert!(resolutions.iter().all(Resolution::is_applied));
    }

    #[test]
    fn events_precede_placements_whatever_the_tier() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);
        let mut scheduler = TickScheduler::new();

        scheduler.submit(placement("a", 1, (0, 0), 1, 5));
        scheduler.submit(scripted_event("storm", u32::MAX, 5));
        scheduler.submit(npc_event("guard", 5, 5));
        let resolutions = scheduler.run_all(&engine, &mut session);

        assert_eq!(resolved_ids(&resolutions), vec!["guard@5", "storm@5", "a@5"]);
    }

    #[test]
    fn same_player_same_tick_second_is_stale() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 7)]);

        let first = engine.handle(&placement("a", 7, (2, 2), 1, 4), &mut session);
        let second = engine.handle(&placement("a", 7, (3, 2), 1, 4), &mut session);

        assert!(first.is_applied());
        assert_rejected(&second, RejectionReason::Validation);
        assert_eq!(second.as_rejected().unwrap().error.code, ErrorCode::StaleAction);
        assert_eq!(issue_codes(&second), vec![IssueCode::StaleTick]);
        assert_eq!(session.board.occupied_count(), 1);
    }

    #[test]
    fn tick_never_regresses_for_late_actions() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);

        engine.handle(&npc_event("guard", 0, 10), &mut session);
        assert_eq!(session.tick, 10);

        let late = engine.handle(&placement("a", 1, (0, 0), 1, 3), &mut session);
        assert!(late.is_applied());
        assert_eq!(session.tick, 10);
        assert_eq!(placement_effect(&late).tick, 3);
    }

    #[test]
    fn run_through_stops_at_tick() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);
        let mut scheduler = TickScheduler::new();

        scheduler.submit(npc_event("guard", 0, 1));
        scheduler.submit(npc_event("guard", 0, 2));
        scheduler.submit(at_tick(npc_event("guard", 0, 3), 8));

        let resolutions = scheduler.run_through(2, &engine, &mut session);
        assert_eq!(resolutions.len(), 2);
        assert_eq!(session.tick, 2);
        assert_eq!(scheduler.pending_ticks(), vec![8]);

        scheduler.run_all(&engine, &mut session);
        assert_eq!(session.tick, 8);
        assert!(scheduler.is_empty());
    }
}

// =============================================================================
// Session and player state
// =============================================================================

mod state_checks {
    use super::*;

    #[test]
    fn foreign_instance_rejected_for_every_variant() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);
        let before = session.state_hash();

        for action in [
            placement("a", 1, (0, 0), 1, 1),
            npc_event("guard", 0, 1),
            scripted_event("storm", 0, 1),
            // Would be invalid anyway: out of bounds.
            placement("a", 1, (99, 99), 1, 1),
        ] {
            let resolution = engine.handle(&in_instance(action, "room-2"), &mut session);
            assert_rejected(&resolution, RejectionReason::State);
            let rejected = resolution.as_rejected().unwrap();
            assert_eq!(rejected.error.code, ErrorCode::CrossInstanceAction);
            assert!(!rejected.error.retryable);
            assert_eq!(
                rejected.details,
                Some(RejectionDetails::InstanceMismatch {
                    expected: InstanceId::new(INSTANCE),
                    received: InstanceId::new("room-2"),
                })
            );
        }
        assert_eq!(session.state_hash(), before);
    }

    #[test]
    fn inactive_session_rejects() {
        let engine = default_engine();
        for status in [
            SessionStatus::Pending,
            SessionStatus::Paused,
            SessionStatus::Terminated,
        ] {
            let mut session = session(5, 5, &[("a", 1)]);
            session.status = status;
            let resolution = engine.handle(&npc_event("guard", 0, 1), &mut session);
            assert_rejected(&resolution, RejectionReason::State);
            assert_eq!(
                resolution.as_rejected().unwrap().details,
                Some(RejectionDetails::SessionStatus { status })
            );
            assert!(session.npcs.is_empty());
        }
    }

    #[test]
    fn unknown_player_is_validation() {
        let engine = default_engine();
        let mut session = session(5, 5, &[]);
        let resolution = engine.handle(&placement("ghost", 1, (0, 0), 1, 1), &mut session);
        assert_rejected(&resolution, RejectionReason::Validation);
        assert_eq!(
            resolution.as_rejected().unwrap().error.code,
            ErrorCode::PlayerNotFound
        );
    }

    #[test]
    fn inactive_player_is_state() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);
        session
            .players
            .get_mut(&PlayerId::new("a"))
            .unwrap()
            .status = PlayerStatus::Disconnected;

        let resolution = engine.handle(&placement("a", 1, (0, 0), 1, 1), &mut session);
        assert_rejected(&resolution, RejectionReason::State);
        let rejected = resolution.as_rejected().unwrap();
        assert_eq!(rejected.error.code, ErrorCode::PlayerInactive);
        assert_eq!(
            rejected.details,
            Some(RejectionDetails::PlayerStatus {
                status: PlayerStatus::Disconnected
            })
        );
    }

    #[test]
    fn out_of_bounds_is_validation() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);
        let resolution = engine.handle(&placement("a", 1, (5, 0), 1, 1), &mut session);
        assert_rejected(&resolution, RejectionReason::Validation);
        assert_eq!(issue_codes(&resolution), vec![IssueCode::OutOfBounds]);
    }

    #[test]
    fn missing_rule_set_is_unknown_and_batch_continues() {
        init_tracing();
        let engine = ResolutionEngine::new(Arc::new(StaticRuleSets::new()));
        let mut session = session(5, 5, &[("a", 1)]);
        let mut scheduler = TickScheduler::new();
        scheduler.submit(placement("a", 1, (0, 0), 1, 1));
        scheduler.submit(npc_event("guard", 0, 2));

        let resolutions = scheduler.run_all(&engine, &mut session);

        assert_rejected(&resolutions[0], RejectionReason::Unknown);
        let rejected = resolutions[0].as_rejected().unwrap();
        assert_eq!(rejected.error.code, ErrorCode::RuleSetUnavailable);
        assert!(rejected.error.retryable);
        assert!(resolutions[1].is_applied());
        assert_eq!(session.board.occupied_count(), 0);
    }
}

// =============================================================================
// Events
// =============================================================================

mod events {
    use super::*;

    #[test]
    fn npc_created_on_first_event_and_updated_after() {
        let engine = default_engine();
        let mut session = session(5, 5, &[]);

        let mut first = npc_event("guard", 4, 1);
        if let Action::NpcEvent(e) = &mut first {
            e.event_type = "patrol".to_string();
            e.data = Some(json!({"route": ["a", "b"], "speed": 2, "alert": false}));
        }
        let resolution = engine.handle(&first, &mut session);
        assert!(resolution.is_applied());

        let npc = &session.npcs[&NpcId::new("guard")];
        assert_eq!(npc.priority_tier, 4);
        assert_eq!(npc.current_tick, 1);
        assert_eq!(npc.metadata["route"], r#"["a","b"]"#);
        assert_eq!(npc.metadata["speed"], "2");
        assert_eq!(npc.metadata["alert"], "false");
        assert_eq!(npc.metadata[NPC_LAST_EVENT_KEY], "patrol");

        engine.handle(&npc_event("guard", 1, 6), &mut session);
        let npc = &session.npcs[&NpcId::new("guard")];
        assert_eq!(npc.priority_tier, 1);
        assert_eq!(npc.current_tick, 6);
        assert_eq!(npc.metadata["speed"], "2");
        assert_eq!(npc.metadata[NPC_LAST_EVENT_KEY], "move");
        assert_eq!(session.tick, 6);
    }

    #[test]
    fn scripted_event_only_moves_tick() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);
        let board_before = session.board.clone();

        let mut event = scripted_event("storm", 2, 12);
        if let Action::ScriptedEvent(e) = &mut event {
            e.data = Some(json!({"intensity": 3}));
        }
        let resolution = engine.handle(&event, &mut session);

        let applied = resolution.as_applied().unwrap();
        match &applied.effects[..] {
            [Effect::ScriptedEvent(effect)] => {
                assert_eq!(effect.script_id.as_str(), "storm");
                assert_eq!(effect.trigger_id.as_str(), "on-enter");
                assert_eq!(effect.data, Some(json!({"intensity": 3})));
                assert_eq!(effect.tick, 12);
            }
            other => panic!("unexpected effects {other:?}"),
        }
        assert_eq!(session.tick, 12);
        assert_eq!(session.board, board_before);
        assert!(session.npcs.is_empty());
    }
}

// =============================================================================
// Rules and request ids
// =============================================================================

mod rules {
    use super::*;

    #[test]
    fn bootstrap_then_adjacency_enforced() {
        let engine = default_engine();
        let mut session = session(6, 6, &[("a", 2), ("b", 1)]);

        assert!(engine
            .handle(&placement("a", 2, (5, 5), 1, 1), &mut session)
            .is_applied());
        let second = engine.handle(&placement("b", 1, (0, 0), 1, 1), &mut session);
        assert_rejected(&second, RejectionReason::Validation);
        assert_eq!(issue_codes(&second), vec![IssueCode::AdjacencyRequired]);
    }

    #[test]
    fn bootstrap_disabled_blocks_first_placement() {
        let engine = engine(PlacementRules {
            adjacency: Adjacency::Orthogonal,
            allow_first_placement_anywhere: false,
        });
        let mut session = session(5, 5, &[("a", 1)]);
        let resolution = engine.handle(&placement("a", 1, (2, 2), 1, 1), &mut session);
        assert_rejected(&resolution, RejectionReason::Validation);
    }

    #[test]
    fn any_mode_allows_isolated_cells() {
        let engine = engine(PlacementRules {
            adjacency: Adjacency::Any,
            allow_first_placement_anywhere: false,
        });
        let mut session = session(5, 5, &[("a", 1)]);
        assert!(engine
            .handle(&placement("a", 1, (0, 0), 1, 1), &mut session)
            .is_applied());
        assert!(engine
            .handle(&placement("a", 1, (4, 4), 1, 2), &mut session)
            .is_applied());
    }

    #[test]
    fn none_mode_grows_from_own_last_placement() {
        let engine = engine(PlacementRules {
            adjacency: Adjacency::None,
            allow_first_placement_anywhere: true,
        });
        let mut session = session(5, 5, &[("a", 2), ("b", 1)]);

        assert!(engine
            .handle(&placement("a", 2, (0, 0), 1, 1), &mut session)
            .is_applied());
        // Anywhere: b has no placement of its own yet.
        assert!(engine
            .handle(&placement("b", 1, (4, 4), 1, 1), &mut session)
            .is_applied());
        // Diagonal from a's last placement.
        let diagonal = engine.handle(&placement("a", 2, (1, 1), 1, 2), &mut session);
        assert_rejected(&diagonal, RejectionReason::Validation);
        assert!(engine
            .handle(&placement("a", 2, (1, 0), 1, 3), &mut session)
            .is_applied());
        assert!(engine
            .handle(&placement("a", 2, (1, 1), 1, 4), &mut session)
            .is_applied());
    }

    #[test]
    fn rules_fetched_once_per_version() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);
        for x in 0..5u32 {
            engine.handle(&placement("a", 1, (x, 0), 1, u64::from(x) + 1), &mut session);
        }
        assert_eq!(engine.rule_cache().fetch_count(), 1);
        assert_eq!(engine.rule_cache().cached_versions(), vec!["v1".to_string()]);
    }

    #[test]
    fn request_id_prefers_metadata_key() {
        let engine = default_engine();
        let mut session = session(5, 5, &[("a", 1)]);

        let mut with_client_key = placement("a", 1, (0, 0), 1, 1);
        if let Action::TilePlacement(p) = &mut with_client_key {
            p.client_request_id = Some("client-1".to_string());
        }
        let resolution = engine.handle(&with_client_key, &mut session);
        assert_eq!(resolution.request_id(), Some("client-1"));

        let mut with_both = placement("a", 1, (1, 0), 1, 2);
        if let Action::TilePlacement(p) = &mut with_both {
            p.client_request_id = Some("client-2".to_string());
            p.metadata = Some(ActionMetadata {
                request_id: Some("dedupe-2".to_string()),
                ..ActionMetadata::default()
            });
        }
        let resolution = engine.handle(&with_both, &mut session);
        assert_eq!(resolution.request_id(), Some("dedupe-2"));

        let resolution = engine.handle(&npc_event("guard", 0, 3), &mut session);
        assert_eq!(resolution.request_id(), None);
    }
}
