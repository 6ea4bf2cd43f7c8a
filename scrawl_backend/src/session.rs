//! Session and participant bookkeeping held by the registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nanoid::nanoid;
use scrawl_common::proto::{DEFAULT_COLOR, ParticipantInfo};
use tracing::warn;

/// Session codes are short and human-typable: uppercase letters and digits.
const CODE_ALPHABET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

const CODE_LENGTH: usize = 6;
const CODE_MAX_RETRIES: usize = 10;

/// Generates a fresh 6-character session code, collision-checked against the
/// live session map. Returns `None` after too many collisions (practically
/// unreachable with a 36^6 space).
pub fn generate_session_code(sessions: &HashMap<String, Session>) -> Option<String> {
    for _ in 0..CODE_MAX_RETRIES {
        let code = nanoid!(CODE_LENGTH, &CODE_ALPHABET);
        if !sessions.contains_key(&code) {
            return Some(code);
        }
    }
    warn!("session code generation exhausted {} retries", CODE_MAX_RETRIES);
    None
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub alpha: f64,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            user_id: nanoid!(),
            name: name.into(),
            color: DEFAULT_COLOR.to_string(),
            alpha: 1.0,
            joined_at: Utc::now(),
        }
    }

    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            alpha: self.alpha,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    pub creator_id: String,
    pub participants: HashMap<String, Participant>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

impl Session {
    pub fn new(session_id: String, creator: Participant) -> Self {
        let now = Utc::now();
        let creator_id = creator.user_id.clone();
        let mut participants = HashMap::new();
        participants.insert(creator_id.clone(), creator);
        Self {
            session_id,
            creator_id,
            participants,
            created_at: now,
            last_activity: now,
            is_active: true,
        }
    }

    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.insert(participant.user_id.clone(), participant);
        self.touch();
    }

    pub fn remove_participant(&mut self, user_id: &str) -> Option<Participant> {
        let removed = self.participants.remove(user_id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.participants.contains_key(user_id)
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Full roster snapshot, as sent to late joiners for state sync.
    pub fn roster(&self) -> Vec<ParticipantInfo> {
        self.participants.values().map(Participant::info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_uppercase_alphanumerics() {
        let sessions = HashMap::new();
        let code = generate_session_code(&sessions).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn roster_contains_every_participant() {
        let creator = Participant::new("ada");
        let creator_id = creator.user_id.clone();
        let mut session = Session::new("AB12CD".into(), creator);
        session.add_participant(Participant::new("grace"));

        let roster = session.roster();
        assert_eq!(roster.len(), 2);
        assert!(roster.iter().any(|p| p.user_id == creator_id));
        assert!(roster.iter().any(|p| p.name == "grace"));
        assert!(roster.iter().all(|p| p.color == DEFAULT_COLOR && p.alpha == 1.0));
    }

    #[test]
    fn removing_the_last_participant_leaves_an_empty_roster() {
        let creator = Participant::new("ada");
        let creator_id = creator.user_id.clone();
        let mut session = Session::new("AB12CD".into(), creator);

        let removed = session.remove_participant(&creator_id).unwrap();
        assert_eq!(removed.name, "ada");
        assert!(session.roster().is_empty());
        assert!(session.remove_participant(&creator_id).is_none());
    }
}
