//! Read-only query snapshots for UI and scripting collaborators.
//!
//! Everything here is derived state: nothing holds a reference into the
//! engine, so a snapshot can outlive the tick that produced it.

use crate::droid::FlightAction;
use crate::engine::Engine;
use crate::id::{DroidId, Player};
use crate::mission::ReinforcementTime;
use crate::sim::{GAME_TICKS_PER_SEC, Ticks};
use crate::transporter::TRANSPORTER_CAPACITY;

// ---------------------------------------------------------------------------
// Timer displays
// ---------------------------------------------------------------------------

/// What a countdown widget should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDisplay {
    /// No timer on this mission.
    Hidden,
    /// A schedule exists but its value is masked (compromised LZ).
    Masked,
    /// Ticks remaining.
    Remaining(Ticks),
}

/// Render a timer display as `MM:SS`, or `--:--` when masked.
pub fn format_timer(display: TimerDisplay) -> String {
    match display {
        TimerDisplay::Hidden => String::new(),
        TimerDisplay::Masked => "--:--".to_string(),
        TimerDisplay::Remaining(ticks) => {
            let secs = ticks / GAME_TICKS_PER_SEC;
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
    }
}

// ---------------------------------------------------------------------------
// Transporter snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of one transporter's cargo and flight state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransporterSnapshot {
    pub transporter: DroidId,
    pub player: Player,
    pub passengers: Vec<DroidId>,
    pub capacity_used: u32,
    pub capacity_remaining: u32,
    pub flight: FlightAction,
    pub flying: bool,
}

impl Engine {
    /// The mission countdown as a widget would show it.
    pub fn mission_timer_display(&self) -> TimerDisplay {
        match self.mission_time_remaining() {
            Some(remaining) => TimerDisplay::Remaining(remaining),
            None => TimerDisplay::Hidden,
        }
    }

    /// The reinforcement ETA as a widget would show it.
    pub fn reinforcement_timer_display(&self) -> TimerDisplay {
        match self.mission.eta {
            ReinforcementTime::Never => TimerDisplay::Hidden,
            ReinforcementTime::Compromised => TimerDisplay::Masked,
            ReinforcementTime::At(_) => match self.reinforcement_time_remaining() {
                Some(remaining) => TimerDisplay::Remaining(remaining),
                None => TimerDisplay::Hidden,
            },
        }
    }

    /// Snapshot a transporter's cargo state. `None` if the droid does not
    /// exist or is not a transporter.
    pub fn transporter_snapshot(&self, transporter: DroidId) -> Option<TransporterSnapshot> {
        let d = self.droids.get(transporter)?;
        if !d.is_transporter() {
            return None;
        }
        let passengers = self.passengers(transporter);
        let capacity_used: u32 = passengers
            .iter()
            .map(|&p| self.transporter_space_required(p))
            .sum();
        Some(TransporterSnapshot {
            transporter,
            player: d.player,
            passengers,
            capacity_used,
            capacity_remaining: TRANSPORTER_CAPACITY.saturating_sub(capacity_used),
            flight: d.flight,
            flying: self.transporter_is_flying(transporter),
        })
    }

    /// The first transporter a player's transport interface would show:
    /// live-list first, then the held home list.
    pub fn first_transporter(&self, player: Player) -> Option<DroidId> {
        self.world.droids[player]
            .iter()
            .chain(self.mission.stash.droids[player].iter())
            .copied()
            .find(|&id| self.droids.get(id).is_some_and(|d| d.is_transporter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::droid::{Droid, DroidKind};
    use crate::engine::GameMode;
    use crate::level::{LevelData, ObjectPolicy};
    use crate::sim::ONE_MINUTE;

    fn engine() -> Engine {
        let mut e = Engine::new(GameMode::Campaign);
        e.apply_level(&LevelData::flat("q", 16, 16), ObjectPolicy::ClearObjects);
        e
    }

    #[test]
    fn timer_formatting() {
        assert_eq!(format_timer(TimerDisplay::Masked), "--:--");
        assert_eq!(format_timer(TimerDisplay::Remaining(2 * ONE_MINUTE)), "02:00");
        assert_eq!(
            format_timer(TimerDisplay::Remaining(90 * GAME_TICKS_PER_SEC)),
            "01:30"
        );
        assert_eq!(format_timer(TimerDisplay::Hidden), "");
    }

    #[test]
    fn transporter_snapshot_reports_capacity() {
        let mut e = engine();
        let t = e.create_droid(Droid::new(Player(0), DroidKind::Transporter, "Carrier"));
        let d = e.create_droid(Droid::new(Player(0), DroidKind::Weapon, "Scout"));
        e.load_droid(t, d).unwrap();

        let snap = e.transporter_snapshot(t).unwrap();
        assert_eq!(snap.capacity_used, 1);
        assert_eq!(snap.capacity_remaining, TRANSPORTER_CAPACITY - 1);
        assert_eq!(snap.passengers, vec![d]);
        assert!(!snap.flying);

        assert!(e.transporter_snapshot(d).is_none(), "not a transporter");
    }

    #[test]
    fn first_transporter_prefers_live_list() {
        let mut e = engine();
        assert_eq!(e.first_transporter(Player(0)), None);
        let held = e.create_droid(Droid::new(Player(0), DroidKind::Transporter, "Held"));
        e.move_droid_to_stash_list(held);
        assert_eq!(e.first_transporter(Player(0)), Some(held));
        let live = e.create_droid(Droid::new(Player(0), DroidKind::Transporter, "Live"));
        assert_eq!(e.first_transporter(Player(0)), Some(live));
    }
}
