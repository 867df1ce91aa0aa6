// ABOUTME: Reorg-guarded get-logs: splits a filter between the log store and a full node
// ABOUTME: Retries the whole query while the store's reorg version changes, until a deadline

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::fullnode::FullNodeClient;
use crate::metrics::METRICS;
use crate::split::{split_by_block_number, split_by_block_range, FilterSplit};
use crate::store::PersistentLogStore;
use crate::types::{BlockSelection, Log, LogFilter};

/// Logs returned by a query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogsResult {
    /// Store-derived logs first, then node-derived logs: ascending block order.
    pub logs: Vec<Log>,
    /// Whether any part of the filter was answered by the store.
    pub hit_store: bool,
}

/// Answers get-logs queries from the persistent store and a live full node.
///
/// Each attempt snapshots the store's reorg version, splits and runs the
/// query, and re-reads the version. A changed version means the store's
/// boundary may have moved between the two sub-queries, so the attempt is
/// thrown away and repeated. Every store and node call is bounded by the
/// query deadline.
pub struct ReorgGuardedLogQuery {
    store: Arc<dyn PersistentLogStore>,
    timeout: Duration,
}

impl ReorgGuardedLogQuery {
    pub fn new(store: Arc<dyn PersistentLogStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `filter` with the configured timeout.
    pub async fn get_logs(&self, node: &dyn FullNodeClient, filter: &LogFilter) -> Result<LogsResult> {
        self.get_logs_until(node, filter, Instant::now() + self.timeout)
            .await
    }

    /// Run `filter`, giving up at `deadline`.
    pub async fn get_logs_until(
        &self,
        node: &dyn FullNodeClient,
        filter: &LogFilter,
        deadline: Instant,
    ) -> Result<LogsResult> {
        METRICS.inc_get_logs();

        let result = self.run(node, filter, deadline).await;
        match &result {
            Ok(res) if res.hit_store => METRICS.inc_store_hit(),
            Err(e) if e.is_timeout() => METRICS.inc_timeout(),
            _ => {}
        }
        result
    }

    async fn run(
        &self,
        node: &dyn FullNodeClient,
        filter: &LogFilter,
        deadline: Instant,
    ) -> Result<LogsResult> {
        let mut last_version = within(deadline, self.store.reorg_version()).await?;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let result = within(deadline, self.attempt(node, filter))
                .await
                .map_err(|e| cut_by_reorgs(e, attempts))?;
            let version = within(deadline, self.store.reorg_version())
                .await
                .map_err(|e| cut_by_reorgs(e, attempts))?;

            if version == last_version {
                tracing::debug!(
                    attempts,
                    logs = result.logs.len(),
                    hit_store = result.hit_store,
                    "Get logs completed"
                );
                return Ok(result);
            }

            METRICS.inc_reorg_retry();

            if Instant::now() >= deadline {
                tracing::warn!(
                    attempts,
                    last_version,
                    version,
                    "Get logs timed out while reorgs kept landing"
                );
                return Err(Error::ReorgTimeout);
            }

            tracing::debug!(attempts, last_version, version, "Reorg during get logs, retrying");
            last_version = version;
        }
    }

    /// One split-and-query pass. Any store or node error aborts the attempt.
    async fn attempt(&self, node: &dyn FullNodeClient, filter: &LogFilter) -> Result<LogsResult> {
        let split = self.split(node, filter).await?;
        let mut logs = Vec::new();

        if let Some(store_filter) = &split.store {
            let stored = self.store.query_logs(store_filter).await?;
            logs.extend(stored.into_iter().map(|log| log.into_log()));
        }

        if let Some(node_filter) = &split.node {
            logs.extend(node.logs(node_filter).await?);
        }

        Ok(LogsResult {
            logs,
            hit_store: split.hits_store(),
        })
    }

    async fn split(&self, node: &dyn FullNodeClient, filter: &LogFilter) -> Result<FilterSplit> {
        let Some(max_persisted) = self.store.max_epoch().await? else {
            return Ok(FilterSplit::node_only(filter));
        };

        match &filter.selection {
            BlockSelection::Hash(hash) => {
                let block = node
                    .block_by_hash(*hash)
                    .await?
                    .ok_or(Error::UnknownBlock(*hash))?;
                Ok(split_by_block_number(filter, block.number, max_persisted))
            }
            BlockSelection::Range { .. } => Ok(split_by_block_range(filter, max_persisted)),
        }
    }
}

/// A deadline that lands during a retry ends the query as a reorg timeout:
/// the first attempt already saw the version move, so the reorgs are what
/// used up the time.
fn cut_by_reorgs(err: Error, attempts: u32) -> Error {
    match err {
        Error::DeadlineExceeded if attempts > 1 => {
            tracing::warn!(attempts, "Get logs deadline passed during a reorg retry");
            Error::ReorgTimeout
        }
        other => other,
    }
}

/// Run `fut` unless `deadline` passes first. A future that is already
/// complete wins over an expired deadline.
async fn within<T>(deadline: Instant, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        res = fut => res,
        _ = tokio::time::sleep_until(deadline) => Err(Error::DeadlineExceeded),
    }
}
