use std::fmt;

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hex-encoded quantities (`"0x1b4"`) as used on the JSON-RPC wire.
pub(crate) mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<u64, String> {
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or_else(|| format!("quantity {:?} is missing 0x prefix", raw))?;
        u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {:?}: {}", raw, e))
    }
}

/// Block selector in a range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockNumber {
    Number(u64),
    Earliest,
    Latest,
    Safe,
    Finalized,
    Pending,
}

impl BlockNumber {
    /// Concrete block number, `None` for symbolic tags.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{:#x}", n),
            Self::Earliest => f.write_str("earliest"),
            Self::Latest => f.write_str("latest"),
            Self::Safe => f.write_str("safe"),
            Self::Finalized => f.write_str("finalized"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            "safe" => Ok(Self::Safe),
            "finalized" => Ok(Self::Finalized),
            "pending" => Ok(Self::Pending),
            other => quantity::parse(other)
                .map(Self::Number)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Which blocks a log filter covers. Exactly one form is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSelection {
    /// A single block by hash.
    Hash(B256),
    /// An inclusive block range. Missing bounds mean "let the node decide".
    Range {
        from: Option<BlockNumber>,
        to: Option<BlockNumber>,
    },
}

/// An `eth_getLogs` filter.
///
/// `topics` is positional: entry `i` constrains topic `i`, `None` matches
/// anything, and a list matches any of its hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub selection: BlockSelection,
    pub addresses: Vec<Address>,
    pub topics: Vec<Option<Vec<B256>>>,
}

impl LogFilter {
    pub fn block_hash(hash: B256) -> Self {
        Self {
            selection: BlockSelection::Hash(hash),
            addresses: Vec::new(),
            topics: Vec::new(),
        }
    }

    pub fn range(from: impl Into<BlockNumber>, to: impl Into<BlockNumber>) -> Self {
        Self {
            selection: BlockSelection::Range {
                from: Some(from.into()),
                to: Some(to.into()),
            },
            addresses: Vec::new(),
            topics: Vec::new(),
        }
    }

    pub fn with_addresses(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    pub fn with_topics(mut self, topics: Vec<Option<Vec<B256>>>) -> Self {
        self.topics = topics;
        self
    }

    /// Same address and topic criteria over a different block range.
    pub fn with_range(&self, from: BlockNumber, to: Option<BlockNumber>) -> Self {
        Self {
            selection: BlockSelection::Range {
                from: Some(from),
                to,
            },
            addresses: self.addresses.clone(),
            topics: self.topics.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogFilterWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    block_hash: Option<&'a B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_block: Option<&'a BlockNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_block: Option<&'a BlockNumber>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    address: &'a Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    topics: &'a Vec<Option<Vec<B256>>>,
}

impl Serialize for LogFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (block_hash, from_block, to_block) = match &self.selection {
            BlockSelection::Hash(hash) => (Some(hash), None, None),
            BlockSelection::Range { from, to } => (None, from.as_ref(), to.as_ref()),
        };

        LogFilterWire {
            block_hash,
            from_block,
            to_block,
            address: &self.addresses,
            topics: &self.topics,
        }
        .serialize(serializer)
    }
}

/// An event log in its common (RPC) representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_hash: B256,
    #[serde(with = "quantity")]
    pub block_number: u64,
    pub transaction_hash: B256,
    #[serde(with = "quantity")]
    pub transaction_index: u64,
    #[serde(with = "quantity")]
    pub log_index: u64,
    #[serde(default)]
    pub removed: bool,
}

/// Just enough of a block to place a block hash on the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub hash: B256,
    #[serde(with = "quantity")]
    pub number: u64,
    pub parent_hash: B256,
}

/// Sub-filter executed against the persistent store: a concrete inclusive
/// block range plus the original address and topic criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLogFilter {
    pub block_from: u64,
    pub block_to: u64,
    pub addresses: Vec<Address>,
    pub topics: Vec<Option<Vec<B256>>>,
}

impl StoreLogFilter {
    pub fn from_filter(block_from: u64, block_to: u64, filter: &LogFilter) -> Self {
        Self {
            block_from,
            block_to,
            addresses: filter.addresses.clone(),
            topics: filter.topics.clone(),
        }
    }

    pub fn matches(&self, log: &StoredLog) -> bool {
        log.block_number >= self.block_from
            && log.block_number <= self.block_to
            && (self.addresses.is_empty() || self.addresses.contains(&log.address))
            && topics_match(&self.topics, &log.topics())
    }
}

/// Positional topic matching with `None` as wildcard.
pub fn topics_match(criteria: &[Option<Vec<B256>>], topics: &[B256]) -> bool {
    criteria.iter().enumerate().all(|(i, wanted)| match wanted {
        None => true,
        Some(alternatives) if alternatives.is_empty() => true,
        Some(alternatives) => topics
            .get(i)
            .is_some_and(|topic| alternatives.contains(topic)),
    })
}

/// A log as persisted by the store, one column per topic slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLog {
    pub block_number: u64,
    pub block_hash: B256,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub log_index: u64,
    pub address: Address,
    pub topic0: Option<B256>,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
    pub topic3: Option<B256>,
    pub data: Bytes,
}

impl StoredLog {
    /// Flatten a common log into its persisted shape. Topics past the
    /// fourth are dropped, as the EVM never emits more than four.
    pub fn from_log(log: &Log) -> Self {
        let topic = |i: usize| log.topics.get(i).copied();
        Self {
            block_number: log.block_number,
            block_hash: log.block_hash,
            transaction_hash: log.transaction_hash,
            transaction_index: log.transaction_index,
            log_index: log.log_index,
            address: log.address,
            topic0: topic(0),
            topic1: topic(1),
            topic2: topic(2),
            topic3: topic(3),
            data: log.data.clone(),
        }
    }

    pub fn topics(&self) -> Vec<B256> {
        [self.topic0, self.topic1, self.topic2, self.topic3]
            .into_iter()
            .map_while(|t| t)
            .collect()
    }

    pub fn into_log(self) -> Log {
        let topics = self.topics();
        Log {
            address: self.address,
            topics,
            data: self.data,
            block_hash: self.block_hash,
            block_number: self.block_number,
            transaction_hash: self.transaction_hash,
            transaction_index: self.transaction_index,
            log_index: self.log_index,
            removed: false,
        }
    }
}
