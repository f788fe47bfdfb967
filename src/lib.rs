//! Schulte Mining Client
//!
//! Terminal client for the Schulte pool, a classroom game that imitates a
//! proof-of-work chain: participants "mine" the open block by clicking the
//! numbers of an N×N Schulte table in order, and the authority records the
//! winner on an append-only chain.
//!
//! - Puzzle engine with client-side sequence checking
//! - Debounced, exactly-once submission
//! - Independently polled participants, leaderboard, chain and open block
//! - Chain view whose expand state is keyed by block id

pub mod app;
pub mod chain_view;
pub mod client;
pub mod config;
pub mod current_block;
pub mod error;
pub mod input;
pub mod leaderboard;
pub mod poll;
pub mod puzzle;
pub mod render;
pub mod runtime;
pub mod scheduler;
pub mod submission;
pub mod types;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Application information
pub const APP_NAME: &str = "schulte-mining-client";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
