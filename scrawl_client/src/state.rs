//! Session-side client state: who we are, who else is in the room, and the
//! pen style each peer currently draws with.

use std::collections::HashMap;

use scrawl_common::proto::ParticipantInfo;

/// A peer's pen, kept current through `participant_joined` and
/// `color_change` messages.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerStyle {
    pub name: String,
    pub color: String,
    pub alpha: f64,
}

#[derive(Debug, Default)]
pub struct PartyState {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub participants: HashMap<String, PeerStyle>,
    pub connected: bool,
}

impl PartyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the roster wholesale from a `session_created` or
    /// `session_joined` snapshot.
    pub fn apply_roster(&mut self, roster: &[ParticipantInfo]) {
        self.participants = roster
            .iter()
            .map(|p| {
                (
                    p.user_id.clone(),
                    PeerStyle {
                        name: p.name.clone(),
                        color: p.color.clone(),
                        alpha: p.alpha,
                    },
                )
            })
            .collect();
    }

    pub fn add_participant(&mut self, user_id: String, name: String, color: String) {
        self.participants.insert(
            user_id,
            PeerStyle {
                name,
                color,
                alpha: 1.0,
            },
        );
    }

    pub fn remove_participant(&mut self, user_id: &str) {
        self.participants.remove(user_id);
    }

    /// Updates an existing peer's pen without duplicating the entry; unknown
    /// peers are ignored.
    pub fn update_style(&mut self, user_id: &str, color: String, alpha: f64) {
        if let Some(style) = self.participants.get_mut(user_id) {
            style.color = color;
            style.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn style(&self, user_id: &str) -> Option<&PeerStyle> {
        self.participants.get(user_id)
    }

    pub fn is_self(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(user_id: &str, name: &str) -> ParticipantInfo {
        ParticipantInfo {
            user_id: user_id.into(),
            name: name.into(),
            color: "#FFB6C1".into(),
            alpha: 1.0,
        }
    }

    #[test]
    fn roster_snapshot_replaces_previous_state() {
        let mut state = PartyState::new();
        state.add_participant("stale".into(), "old".into(), "#000000".into());

        state.apply_roster(&[info("u1", "ada"), info("u2", "grace")]);

        assert_eq!(state.participants.len(), 2);
        assert!(state.style("stale").is_none());
        assert_eq!(state.style("u1").unwrap().name, "ada");
    }

    #[test]
    fn style_updates_mutate_in_place() {
        let mut state = PartyState::new();
        state.apply_roster(&[info("u1", "ada")]);

        state.update_style("u1", "#336699".into(), 2.0);

        assert_eq!(state.participants.len(), 1);
        let style = state.style("u1").unwrap();
        assert_eq!(style.color, "#336699");
        assert_eq!(style.alpha, 1.0); // clamped

        // A change for an unknown peer never creates a phantom entry.
        state.update_style("ghost", "#000000".into(), 0.5);
        assert_eq!(state.participants.len(), 1);
    }
}
