use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

/// Number of player slots in a game session.
pub const MAX_PLAYERS: usize = 8;

new_key_type! {
    /// Identifies a droid in the droid arena, wherever it is owned.
    pub struct DroidId;

    /// Identifies a structure in the structure arena.
    pub struct StructureId;

    /// Identifies a map feature (scenery, oil patches) in the feature arena.
    pub struct FeatureId;

    /// Identifies a droid group (commander unit or transporter cargo hold).
    pub struct GroupId;
}

/// A player slot index. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Player(pub u8);

impl Player {
    /// Convert to usize for per-player array indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is a valid player slot.
    pub fn is_valid(self) -> bool {
        (self.0 as usize) < MAX_PLAYERS
    }

    /// Iterate over every player slot.
    pub fn all() -> impl Iterator<Item = Player> {
        (0..MAX_PLAYERS as u8).map(Player)
    }
}

/// A fixed-size per-player table. Indexable by [`Player`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerPlayer<T>([T; MAX_PLAYERS]);

impl<T: Default> Default for PerPlayer<T> {
    fn default() -> Self {
        Self(std::array::from_fn(|_| T::default()))
    }
}

impl<T> PerPlayer<T> {
    /// Iterate over `(player, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Player, &T)> {
        self.0.iter().enumerate().map(|(i, v)| (Player(i as u8), v))
    }

    /// Iterate mutably over `(player, value)` pairs in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Player, &mut T)> {
        self.0
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (Player(i as u8), v))
    }
}

impl<T> std::ops::Index<Player> for PerPlayer<T> {
    type Output = T;

    fn index(&self, player: Player) -> &T {
        &self.0[player.index()]
    }
}

impl<T> std::ops::IndexMut<Player> for PerPlayer<T> {
    fn index_mut(&mut self, player: Player) -> &mut T {
        &mut self.0[player.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_index_round_trip() {
        let p = Player(3);
        assert_eq!(p.index(), 3);
        assert!(p.is_valid());
        assert!(!Player(MAX_PLAYERS as u8).is_valid());
    }

    #[test]
    fn per_player_indexing() {
        let mut table: PerPlayer<Vec<u32>> = PerPlayer::default();
        table[Player(2)].push(7);
        assert_eq!(table[Player(2)], vec![7]);
        assert!(table[Player(0)].is_empty());
    }

    #[test]
    fn per_player_iter_order() {
        let mut table: PerPlayer<u32> = PerPlayer::default();
        for (i, p) in Player::all().enumerate() {
            table[p] = i as u32;
        }
        let collected: Vec<_> = table.iter().map(|(p, v)| (p.index(), *v)).collect();
        assert_eq!(collected.len(), MAX_PLAYERS);
        assert_eq!(collected[5], (5, 5));
    }
}
