//! Request sequencing for the polled streams
//!
//! Each stream hands out monotonically increasing sequence numbers. Only the
//! response carrying the latest issued number for its stream is applied, so
//! a slow response that lands after a newer request was sent is dropped.
//!
//! Timer polls go through [`RequestSequencer::poll`], which issues nothing
//! while the stream's latest request is still unanswered. A slow authority
//! therefore delays a stream instead of starving it.

use std::fmt;

/// Independently polled server state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollStream {
    Participants,
    Leaderboard,
    Chain,
    CurrentBlock,
}

impl PollStream {
    /// Every stream, in startup fetch order
    pub const ALL: [PollStream; 4] = [
        PollStream::Participants,
        PollStream::Leaderboard,
        PollStream::Chain,
        PollStream::CurrentBlock,
    ];

    /// Short name used in logs and timer names
    pub fn name(self) -> &'static str {
        match self {
            PollStream::Participants => "participants",
            PollStream::Leaderboard => "leaderboard",
            PollStream::Chain => "chain",
            PollStream::CurrentBlock => "current-block",
        }
    }

    fn index(self) -> usize {
        match self {
            PollStream::Participants => 0,
            PollStream::Leaderboard => 1,
            PollStream::Chain => 2,
            PollStream::CurrentBlock => 3,
        }
    }
}

impl fmt::Display for PollStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub stream: PollStream,
    pub seq: u64,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.stream, self.seq)
    }
}

/// Per-stream sequence counters
#[derive(Debug, Default, Clone)]
pub struct RequestSequencer {
    latest: [u64; 4],
    /// Highest sequence number whose response has come back
    settled: [u64; 4],
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket for `stream`, superseding all earlier ones
    pub fn issue(&mut self, stream: PollStream) -> Ticket {
        let slot = &mut self.latest[stream.index()];
        *slot += 1;
        Ticket { stream, seq: *slot }
    }

    /// Issue a ticket for a timer poll, unless the latest request for
    /// `stream` is still outstanding
    pub fn poll(&mut self, stream: PollStream) -> Option<Ticket> {
        if self.is_outstanding(stream) {
            return None;
        }
        Some(self.issue(stream))
    }

    /// Record that the response for `ticket` arrived, successful or not.
    /// Returns whether it should be applied.
    pub fn settle(&mut self, ticket: Ticket) -> bool {
        let slot = &mut self.settled[ticket.stream.index()];
        *slot = (*slot).max(ticket.seq);
        self.is_current(ticket)
    }

    /// Whether `ticket` is still the latest issued for its stream
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest[ticket.stream.index()] == ticket.seq
    }

    /// Whether the latest request for `stream` has not been answered yet
    pub fn is_outstanding(&self, stream: PollStream) -> bool {
        self.latest[stream.index()] > self.settled[stream.index()]
    }

    /// Latest sequence number issued for `stream`, 0 if none
    pub fn latest(&self, stream: PollStream) -> u64 {
        self.latest[stream.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_are_independent() {
        let mut sequencer = RequestSequencer::new();
        let chain = sequencer.issue(PollStream::Chain);
        let board = sequencer.issue(PollStream::Leaderboard);
        assert_eq!(chain.seq, 1);
        assert_eq!(board.seq, 1);
        assert!(sequencer.is_current(chain));
        assert!(sequencer.is_current(board));
    }

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let mut sequencer = RequestSequencer::new();
        let first = sequencer.issue(PollStream::CurrentBlock);
        let second = sequencer.issue(PollStream::CurrentBlock);
        assert!(!sequencer.is_current(first));
        assert!(sequencer.is_current(second));
        assert_eq!(sequencer.latest(PollStream::CurrentBlock), 2);
        assert_eq!(sequencer.latest(PollStream::Participants), 0);
    }

    #[test]
    fn test_poll_skips_while_outstanding() {
        let mut sequencer = RequestSequencer::new();
        let first = sequencer.poll(PollStream::Chain).unwrap();
        assert_eq!(sequencer.poll(PollStream::Chain), None);
        assert!(sequencer.is_outstanding(PollStream::Chain));

        assert!(sequencer.settle(first));
        assert!(!sequencer.is_outstanding(PollStream::Chain));
        assert_eq!(sequencer.poll(PollStream::Chain).map(|t| t.seq), Some(2));
    }

    #[test]
    fn test_forced_issue_supersedes_outstanding_poll() {
        let mut sequencer = RequestSequencer::new();
        let polled = sequencer.poll(PollStream::CurrentBlock).unwrap();
        let forced = sequencer.issue(PollStream::CurrentBlock);

        assert!(!sequencer.settle(polled));
        assert!(sequencer.is_outstanding(PollStream::CurrentBlock));
        assert!(sequencer.settle(forced));
        assert!(!sequencer.is_outstanding(PollStream::CurrentBlock));
    }

    #[test]
    fn test_ticket_display() {
        let ticket = Ticket {
            stream: PollStream::CurrentBlock,
            seq: 7,
        };
        assert_eq!(ticket.to_string(), "current-block#7");
    }
}
