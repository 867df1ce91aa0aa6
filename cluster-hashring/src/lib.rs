//! Full node cluster membership with consistent hashing.
//!
//! This crate provides:
//! - Consistent hashing over a virtual-node ring (bounded key remapping on membership change)
//! - A pluggable repartition resolver that pins hashed keys to named nodes
//! - A [`ClusterManager`] that keeps the node map and the ring in sync under one lock
//! - Per-node epoch tracking with a cluster-wide median epoch
//!
//! Node health is not measured here. An external monitor is expected to call
//! [`ClusterManager::add`] / [`ClusterManager::remove`] as nodes become healthy or
//! unhealthy, and [`ClusterManager::report_epoch`] as it observes sync progress.
//!
//! # Example
//!
//! ```rust,ignore
//! use cluster_hashring::{ClusterManager, Router};
//!
//! let manager = ClusterManager::new([
//!     "http://fullnode-0:8545",
//!     "http://fullnode-1:8545",
//! ]);
//!
//! // Pick a backend for a request key (e.g. the client's remote address)
//! let url = manager.route(b"10.0.0.7");
//! assert!(!url.is_empty());
//!
//! // Health monitor reports a dead node
//! manager.remove("http://fullnode-1:8545");
//! ```
//!
//! # Routing
//!
//! A key is hashed with xxh3. If the resolver already holds a node name for
//! that hash it wins, even when the ring would now pick a different node.
//! Otherwise the ring resolves the key and the result is offered to the
//! resolver for later calls. An empty cluster routes to nothing; callers must
//! treat `None` / `""` as "no node available".

mod config;
mod manager;
mod node;
mod resolver;
mod ring;

pub use config::RingConfig;
pub use manager::{ClusterManager, Router};
pub use node::{node_name, Node};
pub use resolver::{
    hash_key, CachingRepartitionResolver, NoopRepartitionResolver, RepartitionResolver,
};
pub use ring::{HashRing, Member};
