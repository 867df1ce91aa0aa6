use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::{StoreLogFilter, StoredLog};

/// Persistent store of settled event logs.
///
/// The reorg version is an optimistic-concurrency token: any change between
/// two reads means the store rewrote part of its history in between.
#[async_trait]
pub trait PersistentLogStore: Send + Sync {
    async fn reorg_version(&self) -> Result<u64>;

    /// Highest block with complete, reorg-settled logs. `None` while the
    /// store holds no data.
    async fn max_epoch(&self) -> Result<Option<u64>>;

    /// Logs matching `filter`, in ascending (block, log index) order.
    async fn query_logs(&self, filter: &StoreLogFilter) -> Result<Vec<StoredLog>>;
}

#[derive(Default)]
struct MemoryState {
    blocks: BTreeMap<u64, Vec<StoredLog>>,
    reorg_version: u64,
}

/// In-memory [`PersistentLogStore`].
///
/// Blocks are persisted contiguously, so the highest stored block is also
/// the settled boundary. A reorg drops every block from the fork point
/// onwards and bumps the reorg version.
#[derive(Default)]
pub struct MemoryLogStore {
    state: RwLock<MemoryState>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist the logs of `block_number`, replacing anything stored for it.
    ///
    /// The first block may start anywhere. After that a block must be at or
    /// below the next expected height; leaving a gap is an error.
    pub fn persist_block(&self, block_number: u64, mut logs: Vec<StoredLog>) -> Result<()> {
        logs.sort_by_key(|log| log.log_index);
        let mut state = self.state.write();

        if let Some(&max) = state.blocks.keys().next_back() {
            if block_number > max + 1 {
                return Err(Error::store(format!(
                    "block {} would leave a gap after {}",
                    block_number, max
                )));
            }
        }

        state.blocks.insert(block_number, logs);
        tracing::trace!(block_number, "Persisted block logs");
        Ok(())
    }

    /// Drop blocks `>= from_block` and record a reorg.
    pub fn apply_reorg(&self, from_block: u64) -> u64 {
        let mut state = self.state.write();
        let dropped = state.blocks.split_off(&from_block);
        state.reorg_version += 1;

        tracing::info!(
            from_block,
            dropped_blocks = dropped.len(),
            reorg_version = state.reorg_version,
            "Applied reorg to log store"
        );
        state.reorg_version
    }

    pub fn block_count(&self) -> usize {
        self.state.read().blocks.len()
    }
}

#[async_trait]
impl PersistentLogStore for MemoryLogStore {
    async fn reorg_version(&self) -> Result<u64> {
        Ok(self.state.read().reorg_version)
    }

    async fn max_epoch(&self) -> Result<Option<u64>> {
        Ok(self.state.read().blocks.keys().next_back().copied())
    }

    async fn query_logs(&self, filter: &StoreLogFilter) -> Result<Vec<StoredLog>> {
        if filter.block_from > filter.block_to {
            return Ok(Vec::new());
        }

        let state = self.state.read();
        let logs = state
            .blocks
            .range(filter.block_from..=filter.block_to)
            .flat_map(|(_, logs)| logs.iter())
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        Ok(logs)
    }
}
