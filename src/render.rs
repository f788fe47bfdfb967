//! Plain-text terminal frontend

use crate::app::{CellView, Screen};
use crate::chain_view::BlockRow;
use crate::runtime::Frontend;
use crate::utils::format_date;
use std::fmt::Write as _;
use std::io::Write;
use tracing::warn;

/// Draw `screen` as a block of text
pub fn render_screen(screen: &Screen) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "== Puzzle {} ==", screen.puzzle_label);
    let _ = writeln!(out, "{}", screen.hint);
    if !screen.board.is_empty() {
        render_board(&mut out, &screen.board);
    }
    if !screen.status.is_empty() {
        let _ = writeln!(out, "{}", screen.status);
    }
    if screen.submitting {
        let _ = writeln!(out, "[validating…]");
    } else if screen.can_submit {
        let _ = writeln!(out, "[submit available: type 'submit']");
    }

    let _ = writeln!(out, "\n== Chain ==");
    match &screen.chain_placeholder {
        Some(placeholder) => {
            let _ = writeln!(out, "{}", placeholder);
        }
        None => {
            for row in &screen.chain_rows {
                render_block(&mut out, row);
            }
        }
    }
    if let Some(toggle) = screen.chain_toggle {
        let _ = writeln!(out, "[{}: type 'all']", toggle);
    }

    let _ = writeln!(out, "\n== Leaderboard ==");
    for line in &screen.leaderboard {
        let _ = writeln!(out, "{}", line);
    }

    let _ = writeln!(out, "\n== Pool ==");
    for line in &screen.participants {
        let _ = writeln!(out, "{}", line);
    }

    out
}

fn render_board(out: &mut String, board: &[Vec<CellView>]) {
    let width = board
        .iter()
        .flatten()
        .map(|cell| match cell {
            CellView::Pending(value) | CellView::Wrong(value) => value.to_string().len(),
            CellView::Cleared => 1,
        })
        .max()
        .unwrap_or(1);

    let _ = write!(out, "{:>4}", "");
    for col in 0..board.first().map_or(0, Vec::len) {
        let _ = write!(out, " {:>w$} ", col, w = width);
    }
    let _ = writeln!(out);

    for (row, cells) in board.iter().enumerate() {
        let _ = write!(out, "{:>3} ", row);
        for cell in cells {
            let _ = match cell {
                CellView::Pending(value) => write!(out, " {:>w$} ", value, w = width),
                CellView::Wrong(value) => write!(out, "[{:>w$}]", value, w = width),
                CellView::Cleared => write!(out, " {:>w$} ", "·", w = width),
            };
        }
        let _ = writeln!(out);
    }
}

fn render_block(out: &mut String, row: &BlockRow) {
    let marker = if row.open { "⏳" } else { "⛏" };
    let _ = writeln!(
        out,
        "Block #{:<4} {} {:<28} {}  difficulty {}",
        row.id.value(),
        marker,
        row.miner,
        format_date(&row.timestamp),
        row.difficulty
    );
    if let Some(details) = &row.details {
        for line in details {
            let _ = writeln!(out, "      {}", line);
        }
    }
}

/// Frontend that redraws on a terminal writer, skipping identical frames
pub struct TerminalFrontend<W: Write> {
    writer: W,
    last: Option<Screen>,
}

impl<W: Write> TerminalFrontend<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, last: None }
    }

    /// Consume the frontend, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Frontend for TerminalFrontend<W> {
    fn render(&mut self, screen: &Screen) {
        if self.last.as_ref() == Some(screen) {
            return;
        }
        let frame = render_screen(screen);
        let result = writeln!(self.writer, "\n{}> ", frame).and_then(|_| self.writer.flush());
        if let Err(e) = result {
            warn!("Failed to draw screen: {}", e);
        }
        self.last = Some(screen.clone());
    }

    fn shutdown(&mut self) {
        let _ = writeln!(self.writer, "bye");
        let _ = self.writer.flush();
    }
}
