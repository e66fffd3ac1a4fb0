//! Pure view derivations over roster snapshots. No RPCs, no timers.

use std::cmp::Ordering;

use crate::roster::{ConnectionMode, PresenceMember, RosterSnapshot};

/// Display-ordered, capped view of a roster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RosterView {
    pub visible: Vec<PresenceMember>,
    /// Members left out because of the cap.
    pub overflow: usize,
}

impl RosterView {
    pub fn total(&self) -> usize {
        self.visible.len() + self.overflow
    }
}

fn display_order(a: &PresenceMember, b: &PresenceMember) -> Ordering {
    b.is_author
        .cmp(&a.is_author)
        .then_with(|| a.display_name.cmp(&b.display_name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Authors first, then by display name. The order is total, so the same
/// roster always renders the same way.
pub fn present_roster(roster: &RosterSnapshot, max_visible: usize) -> RosterView {
    let mut members: Vec<PresenceMember> = roster.iter().cloned().collect();
    members.sort_by(display_order);

    let overflow = members.len().saturating_sub(max_visible);
    members.truncate(max_visible);
    RosterView {
        visible: members,
        overflow,
    }
}

/// The privileged participant signal: id of the author in the room, if any.
pub fn author_of(roster: &RosterSnapshot) -> Option<String> {
    roster.author().map(|m| m.id.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorTone {
    Live,
    Warning,
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionIndicator {
    pub label: &'static str,
    pub tone: IndicatorTone,
}

/// Badge shown next to the roster. Offline is muted, never an error.
pub fn connection_indicator(mode: ConnectionMode) -> ConnectionIndicator {
    match mode {
        ConnectionMode::Realtime => ConnectionIndicator {
            label: "Live",
            tone: IndicatorTone::Live,
        },
        ConnectionMode::Polling => ConnectionIndicator {
            label: "Reconnecting",
            tone: IndicatorTone::Warning,
        },
        ConnectionMode::Offline => ConnectionIndicator {
            label: "Offline",
            tone: IndicatorTone::Muted,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(view: &RosterView) -> Vec<&str> {
        view.visible.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn author_is_pinned_even_when_capped() {
        let roster = RosterSnapshot::from_members([
            PresenceMember::reader("A", "Ada"),
            PresenceMember::author("B", "Bea"),
        ]);
        let view = present_roster(&roster, 1);
        assert_eq!(ids(&view), vec!["B"]);
        assert_eq!(view.overflow, 1);
        assert_eq!(view.total(), 2);
    }

    #[test]
    fn no_overflow_under_cap() {
        let roster = RosterSnapshot::from_members([
            PresenceMember::reader("c", "Cy"),
            PresenceMember::reader("a", "Ada"),
        ]);
        let view = present_roster(&roster, 5);
        assert_eq!(ids(&view), vec!["a", "c"]);
        assert_eq!(view.overflow, 0);
    }

    #[test]
    fn order_is_stable_across_calls() {
        let roster = RosterSnapshot::from_members([
            PresenceMember::reader("3", "Sam"),
            PresenceMember::reader("1", "Sam"),
            PresenceMember::reader("2", "Ada"),
            PresenceMember::author("9", "Zed"),
        ]);
        let first = present_roster(&roster, 3);
        let second = present_roster(&roster, 3);
        assert_eq!(first, second);
        assert_eq!(ids(&first), vec!["9", "2", "1"]);
        assert_eq!(first.overflow, 1);
    }

    #[test]
    fn empty_roster_and_zero_cap() {
        let view = present_roster(&RosterSnapshot::default(), 3);
        assert!(view.visible.is_empty());
        assert_eq!(view.overflow, 0);

        let roster = RosterSnapshot::from_members([PresenceMember::reader("a", "Ada")]);
        let view = present_roster(&roster, 0);
        assert!(view.visible.is_empty());
        assert_eq!(view.overflow, 1);
    }

    #[test]
    fn author_signal_follows_roster() {
        let roster = RosterSnapshot::from_members([PresenceMember::reader("a", "Ada")]);
        assert_eq!(author_of(&roster), None);

        let roster = roster.apply(&crate::roster::RosterDelta::Upsert(PresenceMember::author(
            "b", "Bea",
        )));
        assert_eq!(author_of(&roster).as_deref(), Some("b"));
    }

    #[test]
    fn offline_indicator_is_muted() {
        assert_eq!(connection_indicator(ConnectionMode::Realtime).tone, IndicatorTone::Live);
        assert_eq!(connection_indicator(ConnectionMode::Polling).tone, IndicatorTone::Warning);
        let offline = connection_indicator(ConnectionMode::Offline);
        assert_eq!(offline.tone, IndicatorTone::Muted);
        assert_eq!(offline.label, "Offline");
    }
}
