//! Async driver for the state machine
//!
//! One loop owns the [`App`] and receives every [`Event`] over a single
//! channel, so transitions happen strictly one at a time in arrival order.
//! Requests run in spawned tasks that do nothing but call the authority and
//! send the result back as an event.

use crate::app::{App, AppSettings, Effect, Event, Screen};
use crate::client::PoolApi;
use crate::current_block::ObserveMode;
use crate::poll::{PollStream, Ticket};
use crate::scheduler::Scheduler;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Something that can show a [`Screen`]
pub trait Frontend {
    /// Draw one frame
    fn render(&mut self, screen: &Screen);

    /// Called once after the loop has stopped
    fn shutdown(&mut self) {}
}

/// Polling periods per stream
#[derive(Debug, Clone)]
pub struct Intervals {
    pub participants: Duration,
    pub leaderboard: Duration,
    pub chain: Duration,
    pub current_block: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            participants: Duration::from_millis(5000),
            leaderboard: Duration::from_millis(5000),
            chain: Duration::from_millis(5000),
            current_block: Duration::from_millis(4000),
        }
    }
}

impl Intervals {
    fn period(&self, stream: PollStream) -> Duration {
        match stream {
            PollStream::Participants => self.participants,
            PollStream::Leaderboard => self.leaderboard,
            PollStream::Chain => self.chain,
            PollStream::CurrentBlock => self.current_block,
        }
    }
}

/// Channel handle for feeding events into a running loop
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Event loop around one [`App`]
pub struct Runtime<F: Frontend> {
    api: Arc<dyn PoolApi>,
    frontend: F,
    settings: AppSettings,
    intervals: Intervals,
    scheduler: Scheduler,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl<F: Frontend> Runtime<F> {
    pub fn new(
        api: Arc<dyn PoolApi>,
        frontend: F,
        settings: AppSettings,
        intervals: Intervals,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            frontend,
            settings,
            intervals,
            scheduler: Scheduler::new(),
            events_tx,
            events_rx,
        }
    }

    /// Sender for user commands or other external events
    pub fn sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Token that stops the loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.scheduler.token()
    }

    /// Run until quit or shutdown; returns the final state and the frontend
    pub async fn run(mut self) -> Result<(App, F)> {
        let mut app = App::new(self.settings.clone());
        let token = self.scheduler.token();

        for stream in PollStream::ALL {
            let tx = self.events_tx.clone();
            self.scheduler.every(
                stream.name(),
                self.intervals.period(stream),
                move || tx.send(Event::Tick(stream)).is_ok(),
            );
        }

        info!("Event loop started");
        let mut running = self.dispatch(&mut app, Event::Start);

        while running {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Shutdown requested");
                    break;
                }
                event = self.events_rx.recv() => match event {
                    Some(event) => running = self.dispatch(&mut app, event),
                    None => break,
                },
            }
        }

        self.scheduler.shutdown().await;
        self.frontend.shutdown();
        info!("Event loop stopped");
        Ok((app, self.frontend))
    }

    /// Apply one event and carry out its effects. Returns false on shutdown.
    fn dispatch(&mut self, app: &mut App, event: Event) -> bool {
        let mut render = false;

        for effect in app.handle(event) {
            match effect {
                Effect::Fetch(ticket) => self.fetch(ticket, ObserveMode::Poll),
                Effect::LoadCurrent(ticket) => self.fetch(ticket, ObserveMode::Load),
                Effect::Submit(request) => {
                    let api = self.api.clone();
                    let tx = self.events_tx.clone();
                    self.scheduler.spawn(async move {
                        let result = api.submit(&request).await;
                        let _ = tx.send(Event::Submitted(result));
                    });
                }
                Effect::PostSubmitRefresh {
                    chain,
                    leaderboard,
                    current,
                } => self.post_submit_refresh(chain, leaderboard, current),
                Effect::ExpireWrongFlag { flag, after } => {
                    let tx = self.events_tx.clone();
                    self.scheduler.after(after, move || {
                        let _ = tx.send(Event::WrongFlagExpired(flag));
                    });
                }
                Effect::Render => render = true,
                Effect::Shutdown => return false,
            }
        }

        if render {
            self.frontend.render(&app.screen());
        }
        true
    }

    fn fetch(&self, ticket: Ticket, mode: ObserveMode) {
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let chain_limit = self.settings.chain_fetch_limit;
        let participants_limit = self.settings.participants_limit;

        self.scheduler.spawn(async move {
            let event = match ticket.stream {
                PollStream::Participants => {
                    Event::Participants(ticket, api.participants(participants_limit).await)
                }
                PollStream::Leaderboard => Event::Leaderboard(ticket, api.leaderboard().await),
                PollStream::Chain => Event::Chain(ticket, api.blocks(chain_limit).await),
                PollStream::CurrentBlock => {
                    Event::CurrentBlock(ticket, mode, api.current_block().await)
                }
            };
            let _ = tx.send(event);
        });
    }

    /// Chain and leaderboard concurrently, then the open block, then settle.
    ///
    /// Results are sent in that order over the one channel, so both lists are
    /// applied before the new puzzle loads.
    fn post_submit_refresh(&self, chain: Ticket, leaderboard: Ticket, current: Ticket) {
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let chain_limit = self.settings.chain_fetch_limit;

        self.scheduler.spawn(async move {
            let (blocks, ranking) = tokio::join!(api.blocks(chain_limit), api.leaderboard());
            let _ = tx.send(Event::Chain(chain, blocks));
            let _ = tx.send(Event::Leaderboard(leaderboard, ranking));

            let open = api.current_block().await;
            let _ = tx.send(Event::CurrentBlock(current, ObserveMode::Load, open));
            let _ = tx.send(Event::SubmissionSettled);
        });
    }
}
