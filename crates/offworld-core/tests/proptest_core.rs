//! Property-based tests for the mission/transporter core.
//!
//! Uses proptest to generate random operation sequences, then verify the
//! structural invariants hold at every observable point: the capacity
//! bound, exactly-one-owner, and snapshot round-trip fidelity.

use offworld_core::command::{Command, DispatchMode};
use offworld_core::droid::Order;
use offworld_core::engine::{Engine, GameMode};
use offworld_core::id::{DroidId, Player};
use offworld_core::test_utils::*;
use offworld_core::transporter::TRANSPORTER_CAPACITY;
use offworld_core::validation::{ConsistencyError, audit};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// Operations a UI or script might throw at a transporter.
#[derive(Debug, Clone)]
enum Op {
    Load(usize),
    Unload(usize),
    Launch,
    Step,
    LandingZone(u8, u8),
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (0..16usize).prop_map(Op::Load),
            (0..16usize).prop_map(Op::Unload),
            Just(Op::Launch),
            Just(Op::Step),
            (2..24u8, 2..24u8).prop_map(|(x, y)| Op::LandingZone(x, y)),
        ],
        1..=max_ops,
    )
}

fn build_engine(n_droids: usize) -> (Engine, DroidId, Vec<DroidId>) {
    let mut engine = engine_with_home();
    let transporter = spawn_transporter(&mut engine, Player(0));
    let droids: Vec<DroidId> = (0..n_droids)
        .map(|i| spawn_soldier(&mut engine, Player(0), &format!("P{i}")))
        .collect();
    (engine, transporter, droids)
}

/// Cargo space currently used aboard a transporter.
fn capacity_used(engine: &Engine, transporter: DroidId) -> u32 {
    engine
        .passengers(transporter)
        .iter()
        .map(|&p| engine.transporter_space_required(p))
        .sum()
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Capacity invariant: no sequence of load/unload/launch/step calls can
    /// push the cargo sum past TRANSPORTER_CAPACITY, and a rejected load
    /// leaves the passenger set unchanged.
    #[test]
    fn capacity_never_exceeded(ops in arb_ops(40), n in 1..16usize) {
        let (mut engine, transporter, droids) = build_engine(n);
        for op in ops {
            match op {
                Op::Load(i) => {
                    let droid = droids[i % droids.len()];
                    let before = engine.passengers(transporter);
                    let fits = engine.check_capacity(transporter, droid);
                    let result = engine.load_droid(transporter, droid);
                    if !fits {
                        prop_assert!(result.is_err());
                        prop_assert_eq!(engine.passengers(transporter), before);
                    }
                }
                Op::Unload(i) => {
                    let droid = droids[i % droids.len()];
                    let _ = engine.unload_droid(transporter, droid, 640, 640);
                }
                Op::Launch => {
                    let _ = engine.launch_transporter(transporter);
                }
                Op::Step => {
                    engine.step();
                }
                Op::LandingZone(x, y) => {
                    engine.landing_zones.set(0, x, y, x + 2, y + 2);
                }
            }
            prop_assert!(capacity_used(&engine, transporter) <= TRANSPORTER_CAPACITY);
        }
    }

    /// Exactly-one-owner: after any operation sequence, every droid in the
    /// arena is owned by exactly one collection.
    #[test]
    fn exactly_one_owner(ops in arb_ops(40), n in 1..12usize) {
        let (mut engine, transporter, droids) = build_engine(n);
        for op in ops {
            match op {
                Op::Load(i) => {
                    let _ = engine.load_droid(transporter, droids[i % droids.len()]);
                }
                Op::Unload(i) => {
                    let _ = engine.unload_droid(transporter, droids[i % droids.len()], 640, 640);
                }
                Op::Launch => {
                    let _ = engine.launch_transporter(transporter);
                }
                Op::Step => {
                    engine.step();
                }
                Op::LandingZone(x, y) => {
                    engine.landing_zones.set(0, x, y, x + 2, y + 2);
                }
            }
            let ownership_errors: Vec<ConsistencyError> = audit(&engine)
                .into_iter()
                .filter(|e| {
                    matches!(
                        e,
                        ConsistencyError::Unowned { .. }
                            | ConsistencyError::MultipleOwners { .. }
                            | ConsistencyError::StaleListEntry { .. }
                    )
                })
                .collect();
            prop_assert!(ownership_errors.is_empty(), "ownership violated: {ownership_errors:?}");
        }
    }

    /// Snapshot round trip: serialize-then-deserialize preserves every
    /// subsystem hash, for arbitrary mid-sequence states.
    #[test]
    fn snapshot_round_trip(ops in arb_ops(20), n in 1..8usize) {
        let (mut engine, transporter, droids) = build_engine(n);
        for op in ops {
            match op {
                Op::Load(i) => {
                    let _ = engine.load_droid(transporter, droids[i % droids.len()]);
                }
                Op::Unload(i) => {
                    let _ = engine.unload_droid(transporter, droids[i % droids.len()], 640, 640);
                }
                Op::Launch => {
                    let _ = engine.launch_transporter(transporter);
                }
                Op::Step => {
                    engine.step();
                }
                Op::LandingZone(x, y) => {
                    engine.landing_zones.set(0, x, y, x + 2, y + 2);
                }
            }
        }
        let bytes = engine.save_snapshot().unwrap();
        let restored = Engine::load_snapshot(&bytes).unwrap();
        prop_assert_eq!(engine.subsystem_hashes(), restored.subsystem_hashes());
        prop_assert_eq!(engine.compute_state_hash(), restored.compute_state_hash());
    }

    /// Queued commands drain fully and in order every step.
    #[test]
    fn command_queue_drains(moves in proptest::collection::vec((1..30u32, 1..30u32), 1..20)) {
        let (mut engine, _, droids) = build_engine(4);
        for &(x, y) in &moves {
            engine
                .submit(
                    Command::OrderDroid {
                        droid: droids[0],
                        order: Order::Move {
                            x: x * 128,
                            y: y * 128,
                        },
                    },
                    DispatchMode::Queued,
                )
                .unwrap();
        }
        let result = engine.step();
        prop_assert_eq!(result.commands_applied, moves.len());
        let (lx, ly) = *moves.last().unwrap();
        prop_assert_eq!(
            engine.droids[droids[0]].order,
            Order::Move { x: lx * 128, y: ly * 128 }
        );
    }
}
