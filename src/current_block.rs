//! Open-block tracking
//!
//! Decides what a fresh `/api/block/current` response means for the puzzle
//! engine. A new block id replaces the puzzle; the same id leaves the
//! participant's progress alone; anything the client cannot solve blocks
//! submission until a solvable block shows up.

use crate::types::{BlockId, CurrentBlockResponse, OpenPuzzle};
use tracing::{debug, info, warn};

/// How a response was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveMode {
    /// Periodic poll; only an id change reloads
    Poll,
    /// One-shot load at startup or after a mined block; always reloads
    Load,
}

/// What the engine should do with an observed open block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockChange {
    /// Load this puzzle, discarding any progress
    Reload(OpenPuzzle),
    /// Keep the current puzzle
    Unchanged,
    /// The block cannot be solved by this client
    Unrecognized { reason: String },
}

/// Tracks the identity of the open block across polls
#[derive(Debug, Default)]
pub struct CurrentBlockPoller {
    last_seen: Option<BlockId>,
    blocked: bool,
}

impl CurrentBlockPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the block whose puzzle is loaded
    pub fn last_seen(&self) -> Option<BlockId> {
        self.last_seen
    }

    /// Whether the latest observation was unsolvable
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Forget the tracked block so the next solvable observation reloads,
    /// whatever its id
    pub fn forget(&mut self) {
        self.last_seen = None;
    }

    /// Fold a response into the tracked state
    pub fn observe(&mut self, response: CurrentBlockResponse, mode: ObserveMode) -> BlockChange {
        let puzzle = match response.into_open_puzzle() {
            Ok(puzzle) => puzzle,
            Err(e) => {
                if !self.blocked {
                    warn!("Open block is not solvable: {}", e);
                }
                self.blocked = true;
                return BlockChange::Unrecognized {
                    reason: e.to_string(),
                };
            }
        };

        let id_changed = self.last_seen != Some(puzzle.block_id);
        if mode == ObserveMode::Load || id_changed {
            info!(
                "Loading {}x{} puzzle for block {}",
                puzzle.task.size, puzzle.task.size, puzzle.block_id
            );
            self.last_seen = Some(puzzle.block_id);
            self.blocked = false;
            return BlockChange::Reload(puzzle);
        }

        if self.blocked {
            debug!("Block {} is solvable again", puzzle.block_id);
            self.blocked = false;
        }
        BlockChange::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn response(json: &str) -> CurrentBlockResponse {
        serde_json::from_str(json).unwrap()
    }

    fn schulte(id: u64) -> CurrentBlockResponse {
        response(&format!(
            r#"{{"id": {}, "type": "schulte", "task": {{"size": 2, "grid": [[1, 2], [3, 4]]}}}}"#,
            id
        ))
    }

    #[test]
    fn test_first_observation_reloads() {
        let mut poller = CurrentBlockPoller::new();
        assert_matches!(
            poller.observe(schulte(5), ObserveMode::Poll),
            BlockChange::Reload(puzzle) if puzzle.block_id == BlockId::new(5)
        );
        assert_eq!(poller.last_seen(), Some(BlockId::new(5)));
    }

    #[test]
    fn test_forget_reloads_next_observation() {
        let mut poller = CurrentBlockPoller::new();
        poller.observe(schulte(5), ObserveMode::Poll);
        poller.forget();
        assert_eq!(poller.last_seen(), None);
        assert_matches!(poller.observe(schulte(5), ObserveMode::Poll), BlockChange::Reload(_));
    }

    #[test]
    fn test_same_id_poll_is_idempotent() {
        let mut poller = CurrentBlockPoller::new();
        poller.observe(schulte(5), ObserveMode::Poll);
        assert_eq!(poller.observe(schulte(5), ObserveMode::Poll), BlockChange::Unchanged);
        assert_eq!(poller.observe(schulte(5), ObserveMode::Poll), BlockChange::Unchanged);
        assert_matches!(poller.observe(schulte(6), ObserveMode::Poll), BlockChange::Reload(_));
    }

    #[test]
    fn test_load_mode_always_reloads() {
        let mut poller = CurrentBlockPoller::new();
        poller.observe(schulte(5), ObserveMode::Poll);
        assert_matches!(poller.observe(schulte(5), ObserveMode::Load), BlockChange::Reload(_));
    }

    #[test]
    fn test_unrecognized_blocks_until_solvable() {
        let mut poller = CurrentBlockPoller::new();
        poller.observe(schulte(5), ObserveMode::Poll);

        let change = poller.observe(
            response(r#"{"id": 6, "type": "maze", "task": {}}"#),
            ObserveMode::Poll,
        );
        assert_matches!(change, BlockChange::Unrecognized { .. });
        assert!(poller.is_blocked());
        assert_eq!(poller.last_seen(), Some(BlockId::new(5)));

        // Same puzzle as before comes back: nothing to reload, but unblocked
        assert_eq!(poller.observe(schulte(5), ObserveMode::Poll), BlockChange::Unchanged);
        assert!(!poller.is_blocked());
    }

    #[test]
    fn test_absent_kind_is_unrecognized() {
        let mut poller = CurrentBlockPoller::new();
        assert_matches!(
            poller.observe(response(r#"{"id": 1}"#), ObserveMode::Load),
            BlockChange::Unrecognized { .. }
        );
        assert_eq!(poller.last_seen(), None);
    }
}
