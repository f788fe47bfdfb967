//! One-at-a-time submission guard
//!
//! A submission goes through three steps: [`SubmissionController::begin`]
//! checks the local preconditions and builds the payload,
//! [`SubmissionVerdict::from_result`] interprets what came back, and
//! [`SubmissionController::finish`] releases the guard. Precondition failures
//! never reach the network.

use crate::puzzle::PuzzleEngine;
use crate::types::{Miner, ProofOfWork, SubmitRequest, SubmitResponse};
use crate::Result;
use std::fmt;
use tracing::debug;

/// Hash characters shown after a block is mined
pub const HASH_PREFIX_LEN: usize = 24;

/// Why a submit request was refused locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRefusal {
    /// An earlier attempt has not settled yet
    InFlight,
    /// No puzzle has been loaded
    NoPuzzle,
    /// The open block could not be turned into a puzzle
    Blocked,
    /// Values still missing from the sequence
    Incomplete { remaining: usize },
}

impl fmt::Display for SubmitRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitRefusal::InFlight => write!(f, "⛏ Still validating the previous attempt…"),
            SubmitRefusal::NoPuzzle => write!(f, "✖ No puzzle loaded yet."),
            SubmitRefusal::Blocked => write!(f, "✖ The open block has no solvable puzzle."),
            SubmitRefusal::Incomplete { remaining } => {
                write!(f, "✖ Still {} numbers to go.", remaining)
            }
        }
    }
}

/// Interpreted outcome of one submission round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionVerdict {
    /// The authority accepted the block
    Accepted {
        pow: Option<ProofOfWork>,
        winner: Option<Miner>,
    },
    /// The authority answered `ok: false`
    Rejected { reason: Option<String> },
    /// Transport, status or decode failure
    Failed { message: String },
}

impl SubmissionVerdict {
    /// Interpret a submission result
    pub fn from_result(result: Result<SubmitResponse>) -> Self {
        match result {
            Ok(response) if response.ok => SubmissionVerdict::Accepted {
                pow: response.pow,
                winner: response.winner,
            },
            Ok(response) => SubmissionVerdict::Rejected {
                reason: response.reason.filter(|reason| !reason.trim().is_empty()),
            },
            Err(e) => SubmissionVerdict::Failed {
                message: e.to_string(),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionVerdict::Accepted { .. })
    }

    /// Status line shown to the participant
    pub fn status_message(&self) -> String {
        match self {
            SubmissionVerdict::Accepted { pow, winner } => {
                let mut message = match pow {
                    Some(pow) => format!(
                        "✔ Block mined! nonce={} hash={}…",
                        pow.nonce,
                        pow.hash_prefix(HASH_PREFIX_LEN)
                    ),
                    None => "✔ Block mined!".to_string(),
                };
                if let Some(winner) = winner {
                    message.push_str(&format!(" Winner: {}", winner));
                }
                message
            }
            SubmissionVerdict::Rejected { reason: Some(reason) } => format!("✖ {}", reason),
            SubmissionVerdict::Rejected { reason: None } => "✖ incorrect sequence".to_string(),
            SubmissionVerdict::Failed { message } => {
                format!("✖ error validating transaction: {}", message)
            }
        }
    }
}

/// Debounce guard around the submission write
#[derive(Debug, Default)]
pub struct SubmissionController {
    in_flight: bool,
    attempts: u64,
}

impl SubmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an attempt is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Attempts started since launch
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Check the preconditions without changing anything
    pub fn check(&self, engine: &PuzzleEngine, blocked: bool) -> std::result::Result<(), SubmitRefusal> {
        if self.in_flight {
            return Err(SubmitRefusal::InFlight);
        }
        if blocked {
            return Err(SubmitRefusal::Blocked);
        }
        if !engine.is_loaded() {
            return Err(SubmitRefusal::NoPuzzle);
        }
        if !engine.is_complete() {
            return Err(SubmitRefusal::Incomplete {
                remaining: engine.remaining(),
            });
        }
        Ok(())
    }

    /// Whether the submit action is currently available
    pub fn can_submit(&self, engine: &PuzzleEngine, blocked: bool) -> bool {
        self.check(engine, blocked).is_ok()
    }

    /// Take the guard and build the payload from the picks in click order
    pub fn begin(
        &mut self,
        engine: &PuzzleEngine,
        blocked: bool,
    ) -> std::result::Result<SubmitRequest, SubmitRefusal> {
        self.check(engine, blocked)?;
        self.in_flight = true;
        self.attempts += 1;
        debug!("Submission attempt {} started", self.attempts);
        Ok(SubmitRequest {
            positions: engine.picks().to_vec(),
        })
    }

    /// Release the guard
    pub fn finish(&mut self) {
        if self.in_flight {
            debug!("Submission attempt {} settled", self.attempts);
        }
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockId, Position, PuzzleTask};
    use crate::Error;
    use assert_matches::assert_matches;

    fn solved_engine() -> PuzzleEngine {
        let mut engine = PuzzleEngine::new();
        engine.load(BlockId::new(4), &PuzzleTask::new(vec![vec![2, 1], vec![4, 3]]).unwrap());
        for (r, c) in [(0, 1), (0, 0), (1, 1), (1, 0)] {
            engine.attempt_click(Position::new(r, c));
        }
        engine
    }

    #[test]
    fn test_refusals_in_order() {
        let mut controller = SubmissionController::new();
        let empty = PuzzleEngine::new();
        assert_eq!(controller.check(&empty, false), Err(SubmitRefusal::NoPuzzle));

        let mut partial = PuzzleEngine::new();
        partial.load(BlockId::new(1), &PuzzleTask::new(vec![vec![2, 1], vec![4, 3]]).unwrap());
        partial.attempt_click(Position::new(0, 1));
        assert_eq!(
            controller.check(&partial, false),
            Err(SubmitRefusal::Incomplete { remaining: 3 })
        );
        assert!(SubmitRefusal::Incomplete { remaining: 3 }
            .to_string()
            .contains("3 numbers"));

        let solved = solved_engine();
        assert_eq!(controller.check(&solved, true), Err(SubmitRefusal::Blocked));

        controller.begin(&solved, false).unwrap();
        assert_eq!(controller.begin(&solved, false), Err(SubmitRefusal::InFlight));
        assert_eq!(controller.attempts(), 1);
    }

    #[test]
    fn test_payload_follows_click_order() {
        let mut controller = SubmissionController::new();
        let request = controller.begin(&solved_engine(), false).unwrap();
        assert_eq!(
            request.positions,
            vec![
                Position::new(0, 1),
                Position::new(0, 0),
                Position::new(1, 1),
                Position::new(1, 0)
            ]
        );
        assert!(controller.is_in_flight());
        controller.finish();
        assert!(!controller.is_in_flight());
    }

    #[test]
    fn test_verdicts() {
        let rejected = SubmissionVerdict::from_result(Ok(SubmitResponse {
            ok: false,
            reason: Some("bloco já foi minerado".into()),
            pow: None,
            winner: None,
        }));
        assert_eq!(rejected.status_message(), "✖ bloco já foi minerado");

        let bare = SubmissionVerdict::from_result(Ok(SubmitResponse {
            ok: false,
            reason: Some("  ".into()),
            pow: None,
            winner: None,
        }));
        assert_eq!(bare.status_message(), "✖ incorrect sequence");

        let failed = SubmissionVerdict::from_result(Err(Error::api(400, "join first")));
        assert_eq!(failed.status_message(), "✖ error validating transaction: join first");

        let accepted = SubmissionVerdict::from_result(Ok(SubmitResponse {
            ok: true,
            reason: None,
            pow: Some(ProofOfWork {
                nonce: 991,
                hash: "0000abcdef0123456789abcdef0123456789".into(),
            }),
            winner: Some(Miner {
                name: "Ana".into(),
                school: "EE".into(),
            }),
        }));
        assert_matches!(accepted, SubmissionVerdict::Accepted { .. });
        assert_eq!(
            accepted.status_message(),
            "✔ Block mined! nonce=991 hash=0000abcdef0123456789abcd… Winner: Ana (EE)"
        );
    }
}
