//! Wire contracts for the pool authority
//!
//! Every response the authority sends is decoded into one of the types below
//! and validated on receipt. Nothing downstream works on untyped JSON.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// Stable identifier of a block in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl BlockId {
    /// Create a new block id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grid cell position, encoded on the wire as `[row, col]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    /// Create a new position
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl Serialize for Position {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [self.row, self.col].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [row, col] = <[usize; 2]>::deserialize(deserializer)?;
        Ok(Self { row, col })
    }
}

/// Puzzle kinds the client knows how to solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleKind {
    /// N×N ordering puzzle
    Schulte,
    /// Anything else the authority may hand out
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PuzzleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PuzzleKind::Schulte => write!(f, "schulte"),
            PuzzleKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Server-issued description of one Schulte puzzle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleTask {
    /// Grid dimension N
    pub size: usize,
    /// N×N permutation of 1..=N², row-major
    pub grid: Vec<Vec<u32>>,
}

impl PuzzleTask {
    /// Create a task and validate its shape
    pub fn new(grid: Vec<Vec<u32>>) -> Result<Self> {
        let task = Self {
            size: grid.len(),
            grid,
        };
        task.validate()?;
        Ok(task)
    }

    /// Number of cells, N²
    pub fn total(&self) -> usize {
        self.size * self.size
    }

    /// Value at a position, if the position lies inside the grid
    pub fn value_at(&self, position: Position) -> Option<u32> {
        self.grid
            .get(position.row)
            .and_then(|row| row.get(position.col))
            .copied()
    }

    /// Check that the grid is N×N and holds each of 1..=N² exactly once
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::protocol("puzzle size must be at least 1"));
        }
        if self.grid.len() != self.size {
            return Err(Error::protocol(format!(
                "puzzle grid has {} rows, expected {}",
                self.grid.len(),
                self.size
            )));
        }

        let total = self.total() as u32;
        let mut seen = HashSet::with_capacity(self.total());
        for (r, row) in self.grid.iter().enumerate() {
            if row.len() != self.size {
                return Err(Error::protocol(format!(
                    "puzzle row {} has {} cells, expected {}",
                    r,
                    row.len(),
                    self.size
                )));
            }
            for &value in row {
                if value == 0 || value > total {
                    return Err(Error::protocol(format!(
                        "puzzle value {} outside 1..={}",
                        value, total
                    )));
                }
                if !seen.insert(value) {
                    return Err(Error::protocol(format!("puzzle value {} repeated", value)));
                }
            }
        }
        Ok(())
    }
}

/// Raw `/api/block/current` response
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentBlockResponse {
    pub id: Option<BlockId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<PuzzleKind>,
    #[serde(default)]
    pub difficulty: Option<u32>,
    /// Kept untyped until the kind is known, so a malformed task fails closed
    /// instead of failing the whole poll
    #[serde(default)]
    pub task: Option<serde_json::Value>,
}

/// Validated open block carrying a solvable puzzle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPuzzle {
    pub block_id: BlockId,
    pub difficulty: Option<u32>,
    pub task: PuzzleTask,
}

impl CurrentBlockResponse {
    /// Validate the response into a puzzle the engine can load
    pub fn into_open_puzzle(self) -> Result<OpenPuzzle> {
        match self.kind {
            Some(PuzzleKind::Schulte) => {}
            Some(PuzzleKind::Unknown) => {
                return Err(Error::protocol("unrecognized puzzle kind"));
            }
            None => return Err(Error::protocol("no puzzle kind in open block")),
        }

        let block_id = self
            .id
            .ok_or_else(|| Error::protocol("open block has no id"))?;
        let raw_task = self
            .task
            .ok_or_else(|| Error::protocol("open block has no task"))?;
        let task: PuzzleTask = serde_json::from_value(raw_task)
            .map_err(|e| Error::protocol(format!("malformed puzzle task: {}", e)))?;
        task.validate()?;

        Ok(OpenPuzzle {
            block_id,
            difficulty: self.difficulty,
            task,
        })
    }
}

/// Attribution of a mined block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Miner {
    pub name: String,
    pub school: String,
}

impl fmt::Display for Miner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.school)
    }
}

/// Mining fields of a block, present together or not at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mining {
    pub mined_at: String,
    pub nonce: u64,
    pub hash: String,
    /// Absent when the miner's participant row is gone
    pub miner: Option<Miner>,
}

/// Block row exactly as the authority sends it, before validation
#[derive(Debug, Deserialize)]
pub struct RawBlock {
    pub id: BlockId,
    pub difficulty: u32,
    pub created_at: String,
    #[serde(default)]
    pub mined_at: Option<String>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub prev_hash: Option<String>,
    #[serde(default)]
    pub miner_name: Option<String>,
    #[serde(default)]
    pub miner_school: Option<String>,
}

/// One entry of the append-only chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawBlock")]
pub struct Block {
    pub id: BlockId,
    pub difficulty: u32,
    pub created_at: String,
    pub prev_hash: Option<String>,
    /// `None` while the block is open
    pub mining: Option<Mining>,
}

impl Block {
    /// Whether the block still accepts submissions
    pub fn is_open(&self) -> bool {
        self.mining.is_none()
    }
}

impl TryFrom<RawBlock> for Block {
    type Error = Error;

    fn try_from(raw: RawBlock) -> Result<Self> {
        let mining = match raw.mined_at {
            None => None,
            Some(mined_at) => {
                let nonce = raw.nonce.ok_or_else(|| {
                    Error::protocol(format!("mined block {} has no nonce", raw.id))
                })?;
                let hash = raw.hash.ok_or_else(|| {
                    Error::protocol(format!("mined block {} has no hash", raw.id))
                })?;
                let miner = match (raw.miner_name, raw.miner_school) {
                    (Some(name), school) => Some(Miner {
                        name,
                        school: school.unwrap_or_default(),
                    }),
                    (None, _) => None,
                };
                Some(Mining {
                    mined_at,
                    nonce,
                    hash,
                    miner,
                })
            }
        };

        Ok(Self {
            id: raw.id,
            difficulty: raw.difficulty,
            created_at: raw.created_at,
            prev_hash: raw.prev_hash,
            mining,
        })
    }
}

/// Registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub school: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub joined_at: Option<String>,
}

/// Leaderboard row, already ranked by the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub school: String,
    pub wins: u64,
}

/// `{items: [...]}` envelope used by every list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Items<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Claimed solution, positions in click order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitRequest {
    pub positions: Vec<Position>,
}

/// Proof returned for an accepted block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    pub nonce: u64,
    pub hash: String,
}

impl ProofOfWork {
    /// Leading characters of the hash for display
    pub fn hash_prefix(&self, len: usize) -> &str {
        match self.hash.char_indices().nth(len) {
            Some((idx, _)) => &self.hash[..idx],
            None => &self.hash,
        }
    }
}

/// `/api/block/submit` response body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitResponse {
    pub ok: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub pow: Option<ProofOfWork>,
    #[serde(default)]
    pub winner: Option<Miner>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_wire_format() {
        let request = SubmitRequest {
            positions: vec![Position::new(0, 1), Position::new(2, 0)],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"positions":[[0,1],[2,0]]}"#);

        let parsed: Position = serde_json::from_str("[3,4]").unwrap();
        assert_eq!(parsed, Position::new(3, 4));
    }

    #[test]
    fn test_task_validation() {
        assert!(PuzzleTask::new(vec![vec![3, 1, 2], vec![6, 4, 5], vec![9, 7, 8]]).is_ok());
        assert!(PuzzleTask::new(vec![vec![1]]).is_ok());
        assert!(PuzzleTask::new(vec![]).is_err());
        assert!(PuzzleTask::new(vec![vec![1, 2], vec![3]]).is_err());
        assert!(PuzzleTask::new(vec![vec![1, 2], vec![2, 4]]).is_err());
        assert!(PuzzleTask::new(vec![vec![1, 2], vec![3, 5]]).is_err());

        let lying = PuzzleTask {
            size: 3,
            grid: vec![vec![1, 2], vec![3, 4]],
        };
        assert!(lying.validate().is_err());
    }

    #[test]
    fn test_current_block_validation() {
        let json = r#"{
            "id": 12,
            "created_at": "2025-09-01T10:00:00Z",
            "type": "schulte",
            "difficulty": 5,
            "task": {"type": "schulte", "size": 2, "grid": [[2, 1], [4, 3]]}
        }"#;
        let response: CurrentBlockResponse = serde_json::from_str(json).unwrap();
        let puzzle = response.into_open_puzzle().unwrap();
        assert_eq!(puzzle.block_id, BlockId::new(12));
        assert_eq!(puzzle.task.size, 2);
        assert_eq!(puzzle.task.value_at(Position::new(1, 0)), Some(4));
        assert_eq!(puzzle.task.value_at(Position::new(2, 0)), None);
    }

    #[test]
    fn test_current_block_fails_closed() {
        let unknown: CurrentBlockResponse =
            serde_json::from_str(r#"{"id": 3, "type": "sudoku", "task": {}}"#).unwrap();
        assert_eq!(unknown.kind, Some(PuzzleKind::Unknown));
        assert!(unknown.into_open_puzzle().is_err());

        let absent: CurrentBlockResponse = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert!(absent.into_open_puzzle().is_err());

        let malformed: CurrentBlockResponse = serde_json::from_str(
            r#"{"id": 3, "type": "schulte", "task": {"size": 2, "grid": "nope"}}"#,
        )
        .unwrap();
        assert!(matches!(
            malformed.into_open_puzzle(),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_block_decoding() {
        let json = r#"{"items": [
            {"id": 1, "difficulty": 5, "created_at": "2025-09-01T10:00:00Z",
             "mined_at": "2025-09-01T10:02:00Z", "nonce": 4242, "hash": "00abc",
             "prev_hash": "0000", "miner_name": "Ana", "miner_school": "EE Central",
             "width": 5, "task_json": null},
            {"id": 2, "difficulty": 5, "created_at": "2025-09-01T10:02:00Z",
             "mined_at": null, "nonce": null, "hash": null}
        ]}"#;
        let blocks: Items<Block> = serde_json::from_str(json).unwrap();
        assert_eq!(blocks.items.len(), 2);

        let mined = &blocks.items[0];
        let mining = mined.mining.as_ref().unwrap();
        assert_eq!(mining.nonce, 4242);
        assert_eq!(mining.miner.as_ref().unwrap().to_string(), "Ana (EE Central)");
        assert!(blocks.items[1].is_open());
    }

    #[test]
    fn test_mined_block_without_hash_is_rejected() {
        let json = r#"{"id": 1, "difficulty": 5, "created_at": "x", "mined_at": "y", "nonce": 1}"#;
        assert!(serde_json::from_str::<Block>(json).is_err());
    }

    #[test]
    fn test_missing_items_defaults_to_empty() {
        let items: Items<LeaderboardEntry> = serde_json::from_str("{}").unwrap();
        assert!(items.items.is_empty());
    }

    #[test]
    fn test_submit_response_and_hash_prefix() {
        let ok: SubmitResponse = serde_json::from_str(
            r#"{"ok": true, "winner": {"name": "Ana", "school": "EE"},
                "pow": {"nonce": 77, "hash": "00000123456789abcdef0123456789abcdef"}}"#,
        )
        .unwrap();
        let pow = ok.pow.unwrap();
        assert_eq!(pow.hash_prefix(24), "00000123456789abcdef0123");
        assert_eq!(pow.hash_prefix(100), pow.hash);

        let rejected: SubmitResponse =
            serde_json::from_str(r#"{"ok": false, "reason": "bloco já minerado"}"#).unwrap();
        assert!(!rejected.ok);
        assert_eq!(rejected.reason.as_deref(), Some("bloco já minerado"));

        assert!(serde_json::from_str::<SubmitResponse>(r#"{"reason": "x"}"#).is_err());
    }
}
