use std::env;

const DEFAULT_VIRTUAL_NODES: usize = 160;

/// Hash ring tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Points placed on the ring per member. More points give a more even
    /// spread at the cost of memory and slower membership changes.
    pub virtual_nodes: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
        }
    }
}

impl RingConfig {
    /// Read `HASH_RING_VIRTUAL_NODES`, falling back to the default when unset
    /// or not a positive integer.
    pub fn from_env() -> Self {
        let virtual_nodes = match env::var("HASH_RING_VIRTUAL_NODES") {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(value = %raw, "Invalid HASH_RING_VIRTUAL_NODES, using default");
                    DEFAULT_VIRTUAL_NODES
                }
            },
            Err(_) => DEFAULT_VIRTUAL_NODES,
        };

        Self { virtual_nodes }
    }
}
