//! Consistency audits and determinism checking.
//!
//! The audit walks every ownership relation and reports violations of the
//! structural invariants: a droid is owned by exactly one of {live world
//! list, stashed world list, limbo list, cargo group}; no transporter sits
//! in limbo; no cargo hold exceeds capacity; the stash occupancy flag
//! matches the mission type. Debug builds assert on these at mutation
//! sites; the audit catches anything that slips through and is cheap
//! enough to run in tests after every scenario.

use crate::droid::DroidKind;
use crate::engine::Engine;
use crate::group::GroupKind;
use crate::id::DroidId;
use crate::serialize::DeserializeError;
use crate::transporter::TRANSPORTER_CAPACITY;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Audit findings
// ---------------------------------------------------------------------------

/// A structural invariant violation found by [`audit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A droid exists in the arena but no collection owns it.
    Unowned { droid: DroidId },
    /// A droid is owned by more than one collection.
    MultipleOwners { droid: DroidId, owners: usize },
    /// An ownership list references a droid that is not in the arena.
    StaleListEntry { droid: DroidId },
    /// A transporter is sitting in a limbo list.
    TransporterInLimbo { droid: DroidId },
    /// A cargo hold sums to more than the carrier can take.
    CapacityExceeded { transporter: DroidId, used: u32 },
    /// A group member's back-reference does not point at that group.
    GroupBackrefMismatch { droid: DroidId },
    /// The stash occupancy flag contradicts the mission type.
    StashMismatch { stash_in_use: bool, offworld: bool },
}

/// Walk the engine and report every structural violation found.
pub fn audit(engine: &Engine) -> Vec<ConsistencyError> {
    let mut errors = Vec::new();
    let mut owners: HashMap<DroidId, usize> = HashMap::new();

    let mut count = |list: &[DroidId], errors: &mut Vec<ConsistencyError>| {
        for &id in list {
            if engine.droids.get(id).is_none() {
                errors.push(ConsistencyError::StaleListEntry { droid: id });
                continue;
            }
            *owners.entry(id).or_insert(0) += 1;
        }
    };

    for (_, list) in engine.world.droids.iter() {
        count(list, &mut errors);
    }
    for (_, list) in engine.mission.stash.droids.iter() {
        count(list, &mut errors);
    }
    for (_, list) in engine.mission.limbo.iter() {
        count(list, &mut errors);
        for &id in list {
            if engine.droids.get(id).is_some_and(|d| d.is_transporter()) {
                errors.push(ConsistencyError::TransporterInLimbo { droid: id });
            }
        }
    }
    for (gid, group) in engine.groups.iter() {
        if let GroupKind::Cargo { .. } = group.kind {
            count(group.members(), &mut errors);
            for &member in group.members() {
                if engine
                    .droids
                    .get(member)
                    .is_some_and(|d| d.group != Some(gid))
                {
                    errors.push(ConsistencyError::GroupBackrefMismatch { droid: member });
                }
            }
        }
    }

    for (id, _) in engine.droids.iter() {
        match owners.get(&id).copied().unwrap_or(0) {
            1 => {}
            0 => errors.push(ConsistencyError::Unowned { droid: id }),
            n => errors.push(ConsistencyError::MultipleOwners { droid: id, owners: n }),
        }
    }

    for (id, droid) in engine.droids.iter() {
        if !droid.is_transporter() {
            continue;
        }
        let used: u32 = engine
            .passengers(id)
            .iter()
            .map(|&p| engine.transporter_space_required(p))
            .sum();
        if used > TRANSPORTER_CAPACITY {
            errors.push(ConsistencyError::CapacityExceeded {
                transporter: id,
                used,
            });
        }
    }

    let offworld = engine.is_mission_offworld();
    if offworld && !engine.mission.stash_in_use {
        errors.push(ConsistencyError::StashMismatch {
            stash_in_use: false,
            offworld: true,
        });
    }

    errors
}

// ---------------------------------------------------------------------------
// Quick compare (subsystem-level)
// ---------------------------------------------------------------------------

/// Per-subsystem match results between two engines.
#[derive(Debug, Clone)]
pub struct SubsystemDiff {
    pub droids_match: bool,
    pub structures_match: bool,
    pub world_matches: bool,
    pub mission_matches: bool,
    pub landing_zones_match: bool,
    pub sim_state_matches: bool,
}

impl SubsystemDiff {
    pub fn is_identical(&self) -> bool {
        self.droids_match
            && self.structures_match
            && self.world_matches
            && self.mission_matches
            && self.landing_zones_match
            && self.sim_state_matches
    }
}

/// Quick subsystem-level comparison using hashes.
pub fn quick_compare(a: &Engine, b: &Engine) -> SubsystemDiff {
    let ha = a.subsystem_hashes();
    let hb = b.subsystem_hashes();
    SubsystemDiff {
        droids_match: ha.droids == hb.droids,
        structures_match: ha.structures == hb.structures,
        world_matches: ha.world == hb.world,
        mission_matches: ha.mission == hb.mission,
        landing_zones_match: ha.landing_zones == hb.landing_zones,
        sim_state_matches: ha.sim_state == hb.sim_state,
    }
}

// ---------------------------------------------------------------------------
// Determinism validation
// ---------------------------------------------------------------------------

/// Result of a determinism validation run.
#[derive(Debug)]
pub struct DeterminismResult {
    /// Whether the two replicas produced identical results.
    pub is_deterministic: bool,
    /// Tick at which divergence was first detected (if any).
    pub divergence_tick: Option<u64>,
    /// Hash log: (tick, hash_run1, hash_run2) for each tick.
    pub hash_log: Vec<(u64, u64, u64)>,
}

/// Load two replicas from the same snapshot, step both in lockstep, and
/// compare state hashes every tick — the check a networked session runs
/// when hunting a desync.
pub fn validate_determinism(
    snapshot: &[u8],
    ticks: u64,
) -> Result<DeterminismResult, DeserializeError> {
    let mut a = Engine::load_snapshot(snapshot)?;
    let mut b = Engine::load_snapshot(snapshot)?;

    let mut hash_log = Vec::with_capacity(ticks as usize);
    let mut divergence_tick = None;
    for _ in 0..ticks {
        a.step();
        b.step();
        let (ha, hb) = (a.last_state_hash(), b.last_state_hash());
        hash_log.push((a.sim_state.tick, ha, hb));
        if ha != hb && divergence_tick.is_none() {
            divergence_tick = Some(a.sim_state.tick);
        }
    }
    Ok(DeterminismResult {
        is_deterministic: divergence_tick.is_none(),
        divergence_tick,
        hash_log,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::droid::Droid;
    use crate::engine::GameMode;
    use crate::id::Player;
    use crate::level::{LevelData, ObjectPolicy};

    fn engine() -> Engine {
        let mut e = Engine::new(GameMode::Campaign);
        e.apply_level(&LevelData::flat("v", 16, 16), ObjectPolicy::ClearObjects);
        e
    }

    #[test]
    fn clean_engine_audits_clean() {
        let mut e = engine();
        let t = e.create_droid(Droid::new(Player(0), DroidKind::Transporter, "Carrier"));
        let d = e.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        e.load_droid(t, d).unwrap();
        assert!(audit(&e).is_empty());
    }

    #[test]
    fn audit_detects_double_ownership() {
        let mut e = engine();
        let d = e.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        // Corrupt: same droid in live and limbo lists.
        e.mission.limbo[Player(0)].push(d);
        let errors = audit(&e);
        assert!(errors
            .iter()
            .any(|err| matches!(err, ConsistencyError::MultipleOwners { droid, .. } if *droid == d)));
    }

    #[test]
    fn audit_detects_unowned_droid() {
        let mut e = engine();
        let d = e.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        e.world.remove_droid(Player(0), d);
        let errors = audit(&e);
        assert!(errors
            .iter()
            .any(|err| matches!(err, ConsistencyError::Unowned { droid } if *droid == d)));
    }

    #[test]
    fn audit_detects_transporter_in_limbo() {
        let mut e = engine();
        let t = e.create_droid(Droid::new(Player(0), DroidKind::Transporter, "Carrier"));
        e.world.remove_droid(Player(0), t);
        e.mission.limbo[Player(0)].push(t);
        let errors = audit(&e);
        assert!(errors
            .iter()
            .any(|err| matches!(err, ConsistencyError::TransporterInLimbo { droid } if *droid == t)));
    }

    #[test]
    fn quick_compare_matches_identical_engines() {
        let e = engine();
        let bytes = e.save_snapshot().unwrap();
        let restored = Engine::load_snapshot(&bytes).unwrap();
        assert!(quick_compare(&e, &restored).is_identical());
    }

    #[test]
    fn determinism_holds_over_replay() {
        let mut e = engine();
        let t = e.create_droid(Droid::new(Player(0), DroidKind::Transporter, "Carrier"));
        let d = e.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        e.load_droid(t, d).unwrap();
        e.launch_transporter(t).unwrap();

        let bytes = e.save_snapshot().unwrap();
        let result = validate_determinism(&bytes, 400).unwrap();
        assert!(result.is_deterministic, "diverged at {:?}", result.divergence_tick);
        assert_eq!(result.hash_log.len(), 400);
    }
}
