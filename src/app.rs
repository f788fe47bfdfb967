//! Game state machine
//!
//! [`App`] owns every piece of client state and changes only in
//! [`App::handle`]. Each event produces a list of [`Effect`]s that the
//! runtime carries out; their results come back as further events. Nothing
//! in here performs I/O or awaits.

use crate::chain_view::{BlockRow, ChainToggle, ChainView};
use crate::current_block::{BlockChange, CurrentBlockPoller, ObserveMode};
use crate::input::{UserCommand, HELP};
use crate::leaderboard::{LeaderboardView, ParticipantsView};
use crate::poll::{PollStream, RequestSequencer, Ticket};
use crate::puzzle::{CellState, ClickOutcome, PuzzleEngine, WrongFlag};
use crate::submission::{SubmissionController, SubmissionVerdict, SubmitRefusal};
use crate::types::{
    Block, CurrentBlockResponse, LeaderboardEntry, Participant, Position, SubmitRequest,
    SubmitResponse,
};
use crate::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hint shown while the open block cannot be solved
pub const LOAD_ERROR_HINT: &str = "Error loading puzzle.";

/// Placeholder for an empty chain window
pub const CHAIN_PLACEHOLDER: &str = "Loading...";

/// Tunables the state machine needs from the configuration
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub chain_fetch_limit: usize,
    pub chain_display_threshold: usize,
    pub participants_limit: usize,
    pub wrong_flag: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            chain_fetch_limit: 40,
            chain_display_threshold: 6,
            participants_limit: 500,
            wrong_flag: Duration::from_millis(500),
        }
    }
}

/// Inputs to the state machine
#[derive(Debug)]
pub enum Event {
    /// Issue the startup fetches
    Start,
    /// A periodic timer fired
    Tick(PollStream),
    /// The participant typed a command
    Command(UserCommand),
    Participants(Ticket, Result<Vec<Participant>>),
    Leaderboard(Ticket, Result<Vec<LeaderboardEntry>>),
    Chain(Ticket, Result<Vec<Block>>),
    CurrentBlock(Ticket, ObserveMode, Result<CurrentBlockResponse>),
    /// The submission write returned
    Submitted(Result<SubmitResponse>),
    /// Every refresh following an accepted submission has been delivered
    SubmissionSettled,
    /// A wrong-cell flag reached its expiry
    WrongFlagExpired(WrongFlag),
}

/// Work the runtime performs on behalf of the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch the stream named in the ticket; the open block is observed as a poll
    Fetch(Ticket),
    /// Fetch the open block and load it unconditionally
    LoadCurrent(Ticket),
    /// Send the solution, exactly once
    Submit(SubmitRequest),
    /// Refresh chain and leaderboard together, then load the open block,
    /// then report [`Event::SubmissionSettled`]
    PostSubmitRefresh {
        chain: Ticket,
        leaderboard: Ticket,
        current: Ticket,
    },
    /// Deliver [`Event::WrongFlagExpired`] after a delay
    ExpireWrongFlag { flag: WrongFlag, after: Duration },
    /// Present a fresh [`Screen`]
    Render,
    /// Stop timers and leave
    Shutdown,
}

/// How one cell is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellView {
    Pending(u32),
    Wrong(u32),
    Cleared,
}

/// Everything a frontend needs to draw one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    /// e.g. `(schulte 3×3)`, empty when nothing is loaded
    pub puzzle_label: String,
    pub hint: String,
    /// Row-major; empty when no puzzle can be shown
    pub board: Vec<Vec<CellView>>,
    pub status: String,
    pub can_submit: bool,
    pub submitting: bool,
    pub chain_rows: Vec<BlockRow>,
    pub chain_toggle: Option<ChainToggle>,
    pub chain_placeholder: Option<String>,
    pub leaderboard: Vec<String>,
    pub participants: Vec<String>,
}

/// Client state and its transitions
pub struct App {
    settings: AppSettings,
    engine: PuzzleEngine,
    submission: SubmissionController,
    poller: CurrentBlockPoller,
    chain: ChainView,
    leaderboard: LeaderboardView,
    participants: ParticipantsView,
    sequencer: RequestSequencer,
    status: String,
    /// Keep `status` across puzzle reloads until the next command
    keep_status: bool,
    running: bool,
}

impl App {
    pub fn new(settings: AppSettings) -> Self {
        let chain = ChainView::new(settings.chain_display_threshold);
        Self {
            settings,
            engine: PuzzleEngine::new(),
            submission: SubmissionController::new(),
            poller: CurrentBlockPoller::new(),
            chain,
            leaderboard: LeaderboardView::new(),
            participants: ParticipantsView::new(),
            sequencer: RequestSequencer::new(),
            status: String::new(),
            keep_status: false,
            running: true,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn engine(&self) -> &PuzzleEngine {
        &self.engine
    }

    pub fn submission(&self) -> &SubmissionController {
        &self.submission
    }

    pub fn poller(&self) -> &CurrentBlockPoller {
        &self.poller
    }

    pub fn chain(&self) -> &ChainView {
        &self.chain
    }

    pub fn leaderboard(&self) -> &LeaderboardView {
        &self.leaderboard
    }

    pub fn participants(&self) -> &ParticipantsView {
        &self.participants
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Apply one event
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if !self.running {
            return Vec::new();
        }

        match event {
            Event::Start => {
                let mut effects: Vec<Effect> = [
                    PollStream::Participants,
                    PollStream::Leaderboard,
                    PollStream::Chain,
                ]
                .into_iter()
                .map(|stream| Effect::Fetch(self.sequencer.issue(stream)))
                .collect();
                effects.push(Effect::LoadCurrent(
                    self.sequencer.issue(PollStream::CurrentBlock),
                ));
                effects.push(Effect::Render);
                effects
            }
            Event::Tick(stream) => match self.sequencer.poll(stream) {
                Some(ticket) => vec![Effect::Fetch(ticket)],
                None => {
                    debug!("Skipping {} poll, previous request outstanding", stream);
                    Vec::new()
                }
            },
            Event::Command(command) => self.on_command(command),
            Event::Participants(ticket, result) => {
                if let Some(items) = self.accept(ticket, result) {
                    self.participants.apply(items);
                }
                vec![Effect::Render]
            }
            Event::Leaderboard(ticket, result) => {
                if let Some(items) = self.accept(ticket, result) {
                    self.leaderboard.apply(items);
                }
                vec![Effect::Render]
            }
            Event::Chain(ticket, result) => {
                if let Some(blocks) = self.accept(ticket, result) {
                    self.chain.apply(blocks);
                }
                vec![Effect::Render]
            }
            Event::CurrentBlock(ticket, mode, result) => {
                if let Some(response) = self.accept(ticket, result) {
                    self.on_current_block(response, mode);
                }
                vec![Effect::Render]
            }
            Event::Submitted(result) => self.on_submitted(result),
            Event::SubmissionSettled => {
                self.submission.finish();
                vec![Effect::Render]
            }
            Event::WrongFlagExpired(flag) => {
                if self.engine.clear_wrong_flag(flag) {
                    vec![Effect::Render]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Unwrap a fetch result if it is the latest for its stream and succeeded
    fn accept<T>(&mut self, ticket: Ticket, result: Result<T>) -> Option<T> {
        if !self.sequencer.settle(ticket) {
            debug!(
                "Discarding stale {} response (latest is {})",
                ticket,
                self.sequencer.latest(ticket.stream)
            );
            return None;
        }
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    category = e.category(),
                    "Failed to refresh {}: {}", ticket.stream, e
                );
                None
            }
        }
    }

    fn on_command(&mut self, command: UserCommand) -> Vec<Effect> {
        self.keep_status = false;
        match command {
            UserCommand::Click(_) | UserCommand::Pick(_) if self.poller.is_blocked() => {
                self.status = SubmitRefusal::Blocked.to_string();
                vec![Effect::Render]
            }
            UserCommand::Click(position) => self.on_click(position),
            UserCommand::Pick(value) => match self.engine.position_of(value) {
                Some(position) => self.on_click(position),
                None if !self.engine.is_loaded() => {
                    self.status = "✖ No puzzle loaded yet.".to_string();
                    vec![Effect::Render]
                }
                None => {
                    self.status = format!("✖ No cell holds {}.", value);
                    vec![Effect::Render]
                }
            },
            UserCommand::Submit => self.on_submit(),
            UserCommand::ToggleShowAll => {
                self.chain.toggle_show_all();
                vec![Effect::Render]
            }
            UserCommand::ToggleDetails(id) => {
                if !self.chain.toggle_expanded(id) {
                    self.status = format!("✖ Block #{} is not in the chain view.", id);
                }
                vec![Effect::Render]
            }
            UserCommand::Help => {
                self.status = HELP.to_string();
                vec![Effect::Render]
            }
            UserCommand::Quit => {
                self.running = false;
                vec![Effect::Shutdown]
            }
        }
    }

    fn on_click(&mut self, position: Position) -> Vec<Effect> {
        if !self.engine.is_loaded() {
            self.status = "✖ No puzzle loaded yet.".to_string();
            return vec![Effect::Render];
        }
        let size = self.engine.size();
        if position.row >= size || position.col >= size {
            self.status = format!("✖ No cell at {} in a {}×{} grid.", position, size, size);
            return vec![Effect::Render];
        }

        let outcome = self.engine.attempt_click(position);
        if let Some(message) = outcome.status_message() {
            self.status = message;
        }

        match outcome {
            ClickOutcome::Rejected { flag, .. } => vec![
                Effect::ExpireWrongFlag {
                    flag,
                    after: self.settings.wrong_flag,
                },
                Effect::Render,
            ],
            ClickOutcome::Ignored => Vec::new(),
            ClickOutcome::Accepted { .. } | ClickOutcome::Completed => vec![Effect::Render],
        }
    }

    fn on_submit(&mut self) -> Vec<Effect> {
        match self.submission.begin(&self.engine, self.poller.is_blocked()) {
            Ok(request) => {
                debug!("Submitting {} positions", request.positions.len());
                self.status = "⛏ validating…".to_string();
                vec![Effect::Submit(request), Effect::Render]
            }
            Err(refusal) => {
                debug!("Submit refused: {:?}", refusal);
                self.status = refusal.to_string();
                vec![Effect::Render]
            }
        }
    }

    fn on_submitted(&mut self, result: Result<SubmitResponse>) -> Vec<Effect> {
        if let Err(e) = &result {
            warn!(category = e.category(), "Submission failed: {}", e);
        }
        let verdict = SubmissionVerdict::from_result(result);
        self.status = verdict.status_message();

        if !verdict.is_accepted() {
            self.submission.finish();
            return vec![Effect::Render];
        }

        info!("{}", self.status);
        self.keep_status = true;
        // The solved puzzle is spent; whatever block is observed next loads fresh
        self.engine.retire();
        self.poller.forget();
        let effect = Effect::PostSubmitRefresh {
            chain: self.sequencer.issue(PollStream::Chain),
            leaderboard: self.sequencer.issue(PollStream::Leaderboard),
            current: self.sequencer.issue(PollStream::CurrentBlock),
        };
        vec![effect, Effect::Render]
    }

    fn on_current_block(&mut self, response: CurrentBlockResponse, mode: ObserveMode) {
        match self.poller.observe(response, mode) {
            BlockChange::Reload(puzzle) => {
                self.engine.load(puzzle.block_id, &puzzle.task);
                if !self.keep_status {
                    self.status.clear();
                }
            }
            BlockChange::Unchanged => {}
            BlockChange::Unrecognized { reason } => {
                debug!("Submission disabled: {}", reason);
            }
        }
    }

    /// View model for the current state
    pub fn screen(&self) -> Screen {
        let blocked = self.poller.is_blocked();

        let (puzzle_label, hint, board) = if blocked {
            (String::new(), LOAD_ERROR_HINT.to_string(), Vec::new())
        } else if self.engine.is_loaded() {
            let size = self.engine.size();
            let board = self
                .engine
                .cells()
                .chunks(size)
                .map(|row| {
                    row.iter()
                        .map(|cell| match cell.state {
                            CellState::Pending => CellView::Pending(cell.value),
                            CellState::Wrong { .. } => CellView::Wrong(cell.value),
                            CellState::Cleared => CellView::Cleared,
                        })
                        .collect()
                })
                .collect();
            (format!("(schulte {}×{})", size, size), self.engine.hint(), board)
        } else {
            (String::new(), self.engine.hint(), Vec::new())
        };

        Screen {
            puzzle_label,
            hint,
            board,
            status: self.status.clone(),
            can_submit: self.submission.can_submit(&self.engine, blocked),
            submitting: self.submission.is_in_flight(),
            chain_rows: self.chain.rows(),
            chain_toggle: self.chain.toggle(),
            chain_placeholder: self
                .chain
                .is_empty()
                .then(|| CHAIN_PLACEHOLDER.to_string()),
            leaderboard: self.leaderboard.lines(),
            participants: self.participants.lines(),
        }
    }
}
