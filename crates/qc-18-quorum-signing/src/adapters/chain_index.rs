//! In-memory chain index

use crate::domain::{sha256d, Hash};
use crate::ports::ChainIndex;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Chain {
    /// Block hash per height
    hashes: Vec<Hash>,
    heights: HashMap<Hash, u64>,
}

/// A linear chain of synthetic block hashes. Clones share the chain.
#[derive(Clone, Default)]
pub struct InMemoryChainIndex {
    chain: Arc<RwLock<Chain>>,
}

impl InMemoryChainIndex {
    /// A chain holding only the genesis block.
    pub fn new() -> Self {
        let index = Self::default();
        index.mine(1);
        index
    }

    /// Hash of the block at `height` on every synthetic chain.
    pub fn block_hash(height: u64) -> Hash {
        sha256d(&[b"block", &height.to_le_bytes()])
    }

    /// Append `count` blocks; returns the new tip height.
    pub fn mine(&self, count: u64) -> u64 {
        let mut chain = self.chain.write();
        for _ in 0..count {
            let height = chain.hashes.len() as u64;
            let hash = Self::block_hash(height);
            chain.hashes.push(hash);
            chain.heights.insert(hash, height);
        }
        chain.hashes.len().saturating_sub(1) as u64
    }

    /// Mine until the tip reaches `height`.
    pub fn mine_to(&self, height: u64) -> u64 {
        let tip = self.tip_height();
        if height > tip {
            self.mine(height - tip)
        } else {
            tip
        }
    }
}

impl ChainIndex for InMemoryChainIndex {
    fn tip_height(&self) -> u64 {
        self.chain.read().hashes.len().saturating_sub(1) as u64
    }

    fn height_of(&self, block_hash: &Hash) -> Option<u64> {
        self.chain.read().heights.get(block_hash).copied()
    }

    fn hash_of(&self, height: u64) -> Option<Hash> {
        self.chain.read().hashes.get(height as usize).copied()
    }
}
