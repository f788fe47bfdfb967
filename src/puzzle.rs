//! Schulte puzzle engine
//!
//! Owns one in-progress puzzle: the grid, the state of every cell and the
//! picks confirmed so far. All mutation goes through [`PuzzleEngine::load`],
//! [`PuzzleEngine::attempt_click`] and [`PuzzleEngine::clear_wrong_flag`].
//!
//! The expected next value is derived from the pick count, so
//! `next == picks.len() + 1` holds by construction.

use crate::types::{BlockId, Position, PuzzleTask};
use tracing::debug;

/// Visual state of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Clickable, not yet picked
    Pending,
    /// Clickable, flagged after a wrong click until the flag expires
    Wrong { token: u64 },
    /// Picked in order; permanently disabled
    Cleared,
}

/// One grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub position: Position,
    pub value: u32,
    pub state: CellState,
}

impl Cell {
    /// Whether the cell still reacts to clicks
    pub fn is_interactive(&self) -> bool {
        !matches!(self.state, CellState::Cleared)
    }
}

/// Handle for expiring a wrong-click flag later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongFlag {
    /// Puzzle instance the flag belongs to
    pub instance: u64,
    pub position: Position,
    /// Distinguishes repeated wrong clicks on the same cell
    pub token: u64,
}

/// Result of a click transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// No puzzle loaded, position outside the grid, or cell already cleared
    Ignored,
    /// Value did not match; nothing but the cell flag changed
    Rejected {
        expected: u32,
        got: u32,
        flag: WrongFlag,
    },
    /// Value matched and the puzzle continues
    Accepted { next: u32, remaining: usize },
    /// Value matched and every cell is now cleared
    Completed,
}

impl ClickOutcome {
    /// Status line for the outcome, if it warrants one
    pub fn status_message(&self) -> Option<String> {
        match self {
            ClickOutcome::Rejected { expected, got, .. } => Some(format!(
                "✖ Wrong cell: expected {}, got {}.",
                expected, got
            )),
            ClickOutcome::Completed => {
                Some("✔ Sequence complete. Ready to validate.".to_string())
            }
            ClickOutcome::Ignored | ClickOutcome::Accepted { .. } => None,
        }
    }
}

/// State of one loaded puzzle instance
#[derive(Debug, Clone)]
struct PuzzleState {
    block_id: BlockId,
    size: usize,
    /// Row-major
    cells: Vec<Cell>,
    picks: Vec<Position>,
    total: usize,
}

impl PuzzleState {
    fn next(&self) -> u32 {
        self.picks.len() as u32 + 1
    }

    fn cell_index(&self, position: Position) -> Option<usize> {
        (position.row < self.size && position.col < self.size)
            .then(|| position.row * self.size + position.col)
    }
}

/// Puzzle engine for the currently open block
#[derive(Debug, Default)]
pub struct PuzzleEngine {
    state: Option<PuzzleState>,
    instance: u64,
    flag_tokens: u64,
}

impl PuzzleEngine {
    /// Create an engine with no puzzle loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any existing puzzle with a fresh instance of `task`.
    ///
    /// The task must already be validated; see [`PuzzleTask::validate`].
    pub fn load(&mut self, block_id: BlockId, task: &PuzzleTask) {
        let size = task.size;
        let mut cells = Vec::with_capacity(task.total());
        for (row, values) in task.grid.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                cells.push(Cell {
                    position: Position::new(row, col),
                    value,
                    state: CellState::Pending,
                });
            }
        }

        self.instance += 1;
        self.state = Some(PuzzleState {
            block_id,
            size,
            cells,
            picks: Vec::new(),
            total: task.total(),
        });

        debug!(
            "Loaded {}x{} puzzle for block {} (instance {})",
            size, size, block_id, self.instance
        );
    }

    /// Drop the loaded puzzle once its block has been mined. Pending
    /// wrong-click flags from it no longer match any instance.
    pub fn retire(&mut self) {
        if let Some(state) = self.state.take() {
            self.instance += 1;
            debug!("Retired puzzle for block {}", state.block_id);
        }
    }

    /// Try to pick the cell at `position`
    pub fn attempt_click(&mut self, position: Position) -> ClickOutcome {
        let instance = self.instance;
        let Some(state) = self.state.as_mut() else {
            return ClickOutcome::Ignored;
        };
        let Some(index) = state.cell_index(position) else {
            return ClickOutcome::Ignored;
        };
        if !state.cells[index].is_interactive() {
            return ClickOutcome::Ignored;
        }

        let expected = state.next();
        let got = state.cells[index].value;

        if got != expected {
            self.flag_tokens += 1;
            let token = self.flag_tokens;
            state.cells[index].state = CellState::Wrong { token };
            debug!("Rejected click at {}: expected {}, got {}", position, expected, got);
            return ClickOutcome::Rejected {
                expected,
                got,
                flag: WrongFlag {
                    instance,
                    position,
                    token,
                },
            };
        }

        state.cells[index].state = CellState::Cleared;
        state.picks.push(position);

        if state.picks.len() == state.total {
            debug!("Puzzle for block {} complete", state.block_id);
            ClickOutcome::Completed
        } else {
            ClickOutcome::Accepted {
                next: state.next(),
                remaining: state.total - state.picks.len(),
            }
        }
    }

    /// Expire a wrong-click flag. Flags from an older instance, or superseded
    /// by a later wrong click on the same cell, are ignored.
    pub fn clear_wrong_flag(&mut self, flag: WrongFlag) -> bool {
        if flag.instance != self.instance {
            return false;
        }
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let Some(index) = state.cell_index(flag.position) else {
            return false;
        };
        let cell = &mut state.cells[index];
        if cell.state == (CellState::Wrong { token: flag.token }) {
            cell.state = CellState::Pending;
            true
        } else {
            false
        }
    }

    /// Whether a puzzle is loaded
    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Whether every value has been picked in order
    pub fn is_complete(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.picks.len() == state.total)
    }

    /// Block the loaded puzzle belongs to
    pub fn block_id(&self) -> Option<BlockId> {
        self.state.as_ref().map(|state| state.block_id)
    }

    /// Grid dimension, 0 when nothing is loaded
    pub fn size(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.size)
    }

    /// Number of cells, 0 when nothing is loaded
    pub fn total(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.total)
    }

    /// Next expected value
    pub fn next(&self) -> u32 {
        self.state.as_ref().map_or(1, PuzzleState::next)
    }

    /// Values still to pick
    pub fn remaining(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.total - state.picks.len())
    }

    /// Confirmed picks in click order
    pub fn picks(&self) -> &[Position] {
        match &self.state {
            Some(state) => &state.picks,
            None => &[],
        }
    }

    /// All cells, row-major
    pub fn cells(&self) -> &[Cell] {
        match &self.state {
            Some(state) => &state.cells,
            None => &[],
        }
    }

    /// Position of the cell holding `value`
    pub fn position_of(&self, value: u32) -> Option<Position> {
        self.cells()
            .iter()
            .find(|cell| cell.value == value)
            .map(|cell| cell.position)
    }

    /// Hint line shown above the grid
    pub fn hint(&self) -> String {
        match &self.state {
            None => "Waiting for the open block…".to_string(),
            Some(_) if self.is_complete() => {
                "Done! Submit to validate the transaction.".to_string()
            }
            Some(state) => format!(
                "Click the numbers in order: 1, 2, 3… (next: {} • {} remaining)",
                state.next(),
                state.total - state.picks.len()
            ),
        }
    }
}
