//! Roster data model: members, deltas, immutable snapshots, connection mode.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use folio_common::RoomId;
use serde::{Deserialize, Serialize};

/// One occupant of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMember {
    pub id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    /// Privileged participant entitled to an ephemeral conversation.
    pub is_author: bool,
}

impl PresenceMember {
    pub fn reader(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_ref: None,
            is_author: false,
        }
    }

    pub fn author(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            is_author: true,
            ..Self::reader(id, display_name)
        }
    }
}

/// A membership change produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterDelta {
    /// Add a member or replace the existing entry with the same id.
    Upsert(PresenceMember),
    Remove(String),
    /// Replace the whole roster (full state sync or poll result).
    Reset(Vec<PresenceMember>),
    /// Several changes that must land in one snapshot.
    Batch(Vec<RosterDelta>),
}

fn merge(map: &mut HashMap<String, PresenceMember>, delta: &RosterDelta) {
    match delta {
        RosterDelta::Upsert(member) => {
            map.insert(member.id.clone(), member.clone());
        }
        RosterDelta::Remove(id) => {
            map.remove(id);
        }
        RosterDelta::Reset(members) => {
            map.clear();
            map.extend(members.iter().map(|m| (m.id.clone(), m.clone())));
        }
        RosterDelta::Batch(deltas) => {
            for delta in deltas {
                merge(map, delta);
            }
        }
    }
}

/// Immutable id → member mapping. Applying a delta yields a new snapshot;
/// holders of an older snapshot never observe the change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    members: Arc<HashMap<String, PresenceMember>>,
}

impl RosterSnapshot {
    pub fn from_members(members: impl IntoIterator<Item = PresenceMember>) -> Self {
        let map = members.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            members: Arc::new(map),
        }
    }

    /// Merge a delta by member id, last write wins. A batch yields a single
    /// new snapshot, so no intermediate state is ever observable.
    pub fn apply(&self, delta: &RosterDelta) -> Self {
        match delta {
            RosterDelta::Reset(members) => Self::from_members(members.iter().cloned()),
            RosterDelta::Remove(id) if !self.members.contains_key(id) => self.clone(),
            _ => {
                let mut map = (*self.members).clone();
                merge(&mut map, delta);
                Self {
                    members: Arc::new(map),
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PresenceMember> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PresenceMember> {
        self.members.values()
    }

    /// The present author, if any. Several flagged members resolve to the
    /// lowest id so the choice is stable across snapshots.
    pub fn author(&self) -> Option<&PresenceMember> {
        self.members
            .values()
            .filter(|m| m.is_author)
            .min_by(|a, b| a.id.cmp(&b.id))
    }
}

/// How the roster is currently being kept fresh.
///
/// Defaults to the first rung of the ladder: a freshly enabled room is
/// attempting push and has not failed anything yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    #[default]
    Realtime,
    Polling,
    Offline,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionMode::Realtime => "realtime",
            ConnectionMode::Polling => "polling",
            ConnectionMode::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// What the coordinator publishes: roster and mode, read together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    pub room_id: Option<RoomId>,
    pub roster: RosterSnapshot,
    pub mode: ConnectionMode,
}
