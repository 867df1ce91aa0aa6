//! Reorg-guarded event log queries for a full node RPC gateway.
//!
//! A get-logs filter is split at the persistent store's settled boundary:
//! blocks up to that boundary are read from the store, newer blocks from a
//! live full node. If the store processes a reorg while the two halves run,
//! the whole query is retried until it completes against one consistent
//! view of history or the deadline passes.
//!
//! # Example
//!
//! ```rust,ignore
//! use gateway_core::{GatewayConfig, HttpFullNodeClient, LogFilter, ReorgGuardedLogQuery};
//! use cluster_hashring::Router;
//!
//! let config = GatewayConfig::from_env()?;
//! let cluster = config.cluster_manager();
//! let query = ReorgGuardedLogQuery::new(store, config.get_logs_timeout);
//!
//! let url = cluster.route(client_ip.as_bytes());
//! let node = HttpFullNodeClient::new(&url)?;
//! let result = query.get_logs(&node, &LogFilter::range(100u64, 200u64)).await?;
//! ```

pub mod config;
pub mod error;
pub mod fullnode;
pub mod metrics;
pub mod query;
pub mod split;
pub mod store;
pub mod types;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use fullnode::{FullNodeClient, HttpFullNodeClient};
pub use metrics::METRICS;
pub use query::{LogsResult, ReorgGuardedLogQuery};
pub use split::FilterSplit;
pub use store::{MemoryLogStore, PersistentLogStore};
pub use types::{BlockNumber, BlockSelection, BlockSummary, Log, LogFilter, StoreLogFilter, StoredLog};
