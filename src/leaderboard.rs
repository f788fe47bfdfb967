//! Leaderboard and participant list views

use crate::types::{LeaderboardEntry, Participant};

/// Shown while the participant list is empty
pub const PARTICIPANTS_PLACEHOLDER: &str = "Loading...";

/// Shown while nobody has a mined block
pub const LEADERBOARD_PLACEHOLDER: &str = "Nobody has mined yet.";

/// Ranked miners, in the order the authority sent them
#[derive(Debug, Clone, Default)]
pub struct LeaderboardView {
    entries: Vec<LeaderboardEntry>,
}

impl LeaderboardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached ranking
    pub fn apply(&mut self, entries: Vec<LeaderboardEntry>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    /// Display lines; a single placeholder line when empty
    pub fn lines(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return vec![LEADERBOARD_PLACEHOLDER.to_string()];
        }
        self.entries
            .iter()
            .enumerate()
            .map(|(rank, entry)| {
                format!(
                    "{}. {} — {}  {} block(s)",
                    rank + 1,
                    entry.name,
                    entry.school,
                    entry.wins
                )
            })
            .collect()
    }
}

/// Registered participants
#[derive(Debug, Clone, Default)]
pub struct ParticipantsView {
    participants: Vec<Participant>,
}

impl ParticipantsView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached list
    pub fn apply(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Display lines; a single placeholder line when empty
    pub fn lines(&self) -> Vec<String> {
        if self.participants.is_empty() {
            return vec![PARTICIPANTS_PLACEHOLDER.to_string()];
        }
        self.participants
            .iter()
            .map(|p| match &p.group {
                Some(group) if !group.is_empty() => {
                    format!("{} — {} [{}]", p.name, p.school, group)
                }
                _ => format!("{} — {}", p.name, p.school),
            })
            .collect()
    }
}
