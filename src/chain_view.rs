//! Chain view reconciler
//!
//! Caches the last fetched block window and derives what the chain panel
//! shows from it: compact or full listing, and which blocks have their
//! details panel open. Expand state is keyed by [`BlockId`] so it follows
//! the block across refreshes, whatever its position in the window.

use crate::types::{Block, BlockId};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Characters of `prev_hash` quoted in the transaction line
const PREV_HASH_SHORT: usize = 8;

/// Toggle shown when the window exceeds the display threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainToggle {
    /// Compact mode; offers the full listing
    ShowAll { total: usize },
    /// Full mode; offers to go back to the tail
    ShowLast { threshold: usize },
}

impl fmt::Display for ChainToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainToggle::ShowAll { total } => write!(f, "show all ({})", total),
            ChainToggle::ShowLast { threshold } => write!(f, "show last {}", threshold),
        }
    }
}

/// One row of the chain panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub id: BlockId,
    /// `name (school)`, or "awaiting miner" for the open block
    pub miner: String,
    /// `mined_at` for mined blocks, `created_at` otherwise
    pub timestamp: String,
    pub difficulty: u32,
    pub open: bool,
    /// Present only while the row is expanded
    pub details: Option<Vec<String>>,
}

/// Client-side state of the chain panel
#[derive(Debug, Clone)]
pub struct ChainView {
    blocks: Vec<Block>,
    show_all: bool,
    expanded: HashSet<BlockId>,
    threshold: usize,
}

impl ChainView {
    /// Create an empty view that shows `threshold` blocks in compact mode
    pub fn new(threshold: usize) -> Self {
        Self {
            blocks: Vec::new(),
            show_all: false,
            expanded: HashSet::new(),
            threshold: threshold.max(1),
        }
    }

    /// Replace the cached window with a fresh fetch.
    ///
    /// Expanded ids that are no longer in the window are forgotten.
    pub fn apply(&mut self, mut blocks: Vec<Block>) {
        blocks.sort_by_key(|block| block.id);
        blocks.dedup_by_key(|block| block.id);

        let present: HashSet<BlockId> = blocks.iter().map(|block| block.id).collect();
        let before = self.expanded.len();
        self.expanded.retain(|id| present.contains(id));
        if self.expanded.len() != before {
            debug!(
                "Dropped {} expanded block(s) no longer in the window",
                before - self.expanded.len()
            );
        }

        self.blocks = blocks;
    }

    /// Flip between compact and full listing. Never triggers a fetch.
    pub fn toggle_show_all(&mut self) {
        self.show_all = !self.show_all;
    }

    /// Flip the details panel of block `id`. Returns false if the block is
    /// not in the cached window.
    pub fn toggle_expanded(&mut self, id: BlockId) -> bool {
        if !self.blocks.iter().any(|block| block.id == id) {
            return false;
        }
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
        true
    }

    pub fn is_expanded(&self, id: BlockId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Cached window, oldest first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks currently listed, oldest first
    pub fn visible(&self) -> &[Block] {
        if self.show_all || self.blocks.len() <= self.threshold {
            &self.blocks
        } else {
            &self.blocks[self.blocks.len() - self.threshold..]
        }
    }

    /// Toggle to offer, if the window exceeds the threshold
    pub fn toggle(&self) -> Option<ChainToggle> {
        if self.blocks.len() <= self.threshold {
            None
        } else if self.show_all {
            Some(ChainToggle::ShowLast {
                threshold: self.threshold,
            })
        } else {
            Some(ChainToggle::ShowAll {
                total: self.blocks.len(),
            })
        }
    }

    /// Rows for the visible blocks
    pub fn rows(&self) -> Vec<BlockRow> {
        self.visible()
            .iter()
            .map(|block| BlockRow {
                id: block.id,
                miner: miner_label(block),
                timestamp: match &block.mining {
                    Some(mining) => mining.mined_at.clone(),
                    None => block.created_at.clone(),
                },
                difficulty: block.difficulty,
                open: block.is_open(),
                details: self.is_expanded(block.id).then(|| detail_lines(block)),
            })
            .collect()
    }
}

fn miner_label(block: &Block) -> String {
    match &block.mining {
        None => "awaiting miner".to_string(),
        Some(mining) => match &mining.miner {
            Some(miner) => miner.to_string(),
            None => "— ()".to_string(),
        },
    }
}

/// Lines of the details panel for `block`
pub fn detail_lines(block: &Block) -> Vec<String> {
    let prev = block
        .prev_hash
        .as_deref()
        .map(|hash| hash.chars().take(PREV_HASH_SHORT).collect::<String>())
        .unwrap_or_else(|| "genesis".to_string());

    match &block.mining {
        Some(mining) => {
            let beneficiary = mining
                .miner
                .as_ref()
                .map_or("unknown miner", |miner| miner.name.as_str());
            vec![
                format!("nonce: {}", mining.nonce),
                format!("hash: {}", mining.hash),
                format!(
                    "tx: coinbase → {} (block #{}, prev {})",
                    beneficiary, block.id, prev
                ),
            ]
        }
        None => vec![
            "nonce: —".to_string(),
            "hash: —".to_string(),
            format!("tx: pending (block #{}, prev {})", block.id, prev),
        ],
    }
}
