//! Droid groups: exclusive ownership of a member list.
//!
//! Two kinds exist: a commander's command group and a transporter's cargo
//! hold. A droid belongs to at most one group at a time, and removing a
//! droid from a group is always paired (by the engine-level transfer
//! helpers) with either destruction or insertion into exactly one other
//! collection. The group itself never reaches into the droid arena; it only
//! tracks membership.

use crate::id::DroidId;
use serde::{Deserialize, Serialize};

/// What a group is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// A commander and the units assigned to it.
    Command { leader: DroidId },
    /// A transporter's cargo hold. The transporter itself is not a member;
    /// members are passengers only.
    Cargo { transporter: DroidId },
}

/// An exclusively-owned member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub kind: GroupKind,
    members: Vec<DroidId>,
}

impl Group {
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            members: Vec::new(),
        }
    }

    /// Append a member. Membership is unique; re-adding is refused.
    pub fn add(&mut self, droid: DroidId) -> bool {
        if self.members.contains(&droid) {
            return false;
        }
        self.members.push(droid);
        true
    }

    /// Remove a member. Returns whether it was present.
    pub fn remove(&mut self, droid: DroidId) -> bool {
        match self.members.iter().position(|&m| m == droid) {
            Some(i) => {
                self.members.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, droid: DroidId) -> bool {
        self.members.contains(&droid)
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[DroidId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Take the whole member list, leaving the group empty. Callers must
    /// re-home every returned droid.
    pub fn take_members(&mut self) -> Vec<DroidId> {
        std::mem::take(&mut self.members)
    }
}
