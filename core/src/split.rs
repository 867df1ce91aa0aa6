//! Splitting a log filter between the persistent store and a full node.
//!
//! The store holds settled logs up to `max_persisted`; anything newer lives
//! only on the node. A split produces at most one sub-filter per side. When
//! both are present the store range is `[from, max_persisted]` and the node
//! range is `[max_persisted + 1, to]`, so the two never overlap and the store
//! part always comes first in block order.

use crate::types::{BlockNumber, BlockSelection, LogFilter, StoreLogFilter};

/// Result of splitting a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSplit {
    pub store: Option<StoreLogFilter>,
    pub node: Option<LogFilter>,
}

impl FilterSplit {
    pub fn node_only(filter: &LogFilter) -> Self {
        Self {
            store: None,
            node: Some(filter.clone()),
        }
    }

    pub fn store_only(filter: StoreLogFilter) -> Self {
        Self {
            store: Some(filter),
            node: None,
        }
    }

    pub fn hits_store(&self) -> bool {
        self.store.is_some()
    }
}

/// Split a single-block query whose block hash resolved to `block_number`.
/// A single block is never split.
pub fn split_by_block_number(filter: &LogFilter, block_number: u64, max_persisted: u64) -> FilterSplit {
    if block_number > max_persisted {
        return FilterSplit::node_only(filter);
    }

    FilterSplit::store_only(StoreLogFilter::from_filter(block_number, block_number, filter))
}

/// Split a range query at the store boundary.
///
/// Only concrete numeric bounds are split. Symbolic or missing bounds send
/// the whole filter to the node. A block hash filter is also sent to the
/// node unchanged; resolve it first and use [`split_by_block_number`].
pub fn split_by_block_range(filter: &LogFilter, max_persisted: u64) -> FilterSplit {
    let (from, to) = match &filter.selection {
        BlockSelection::Range { from, to } => (
            from.as_ref().and_then(BlockNumber::as_number),
            to.as_ref().and_then(BlockNumber::as_number),
        ),
        BlockSelection::Hash(_) => return FilterSplit::node_only(filter),
    };

    let (Some(from), Some(to)) = (from, to) else {
        return FilterSplit::node_only(filter);
    };

    // no data in store
    if from > max_persisted {
        return FilterSplit::node_only(filter);
    }

    // all data in store
    if to <= max_persisted {
        return FilterSplit::store_only(StoreLogFilter::from_filter(from, to, filter));
    }

    FilterSplit {
        store: Some(StoreLogFilter::from_filter(from, max_persisted, filter)),
        node: Some(filter.with_range(
            BlockNumber::Number(max_persisted + 1),
            Some(BlockNumber::Number(to)),
        )),
    }
}
