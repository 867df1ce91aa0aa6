use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::ring::Member;

/// Derive a node name from its URL.
///
/// Scheme and host are case-insensitive and lowercased; the path keeps its
/// case. Surrounding whitespace and trailing slashes are dropped. Distinct
/// URLs keep distinct names (the scheme is part of the name), equal URLs
/// always map to the same name.
pub fn node_name(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, url),
    };

    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    let mut name = String::with_capacity(url.len());
    if let Some(scheme) = scheme {
        name.push_str(&scheme.to_ascii_lowercase());
        name.push_str("://");
    }
    name.push_str(&authority.to_ascii_lowercase());
    name.push_str(path);
    name
}

/// A full node backend.
///
/// Immutable after construction. Background work bound to the node (health
/// probes, client pools) should watch [`Node::cancellation_token`]; it fires
/// when the node is removed from the cluster.
pub struct Node {
    name: String,
    url: String,
    cancel_token: CancellationToken,
}

impl Node {
    pub fn new(url: &str) -> Self {
        Self {
            name: node_name(url),
            url: url.trim().to_string(),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Release resources held on behalf of this node.
    pub fn close(&self) {
        if !self.cancel_token.is_cancelled() {
            tracing::debug!(node = %self.name, "Closing node");
            self.cancel_token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Member for Node {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
