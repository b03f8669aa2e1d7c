//! Transient key derivation.
//!
//! A key is `{prefix}_{sha256(operation ":" json(params))}` in lowercase hex. The full
//! digest is kept so distinct parameter sets never share an entry.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Operation name for merged post lists.
pub const OP_GET_POSTS: &str = "get_posts";
/// Operation name for enriched blog lists.
pub const OP_GET_BLOGS: &str = "get_blogs";

pub const DEFAULT_KEY_PREFIX: &str = "crossblog";

/// Derives transient keys for one key namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientKeys {
    prefix: String,
}

impl TransientKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key for `operation` applied to the serialized `params`.
    pub fn derive<P: Serialize>(
        &self,
        operation: &str,
        params: &P,
    ) -> Result<String, serde_json::Error> {
        let encoded = serde_json::to_vec(params)?;

        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        hasher.update(b":");
        hasher.update(&encoded);

        Ok(format!("{}_{}", self.prefix, hex::encode(hasher.finalize())))
    }
}

impl Default for TransientKeys {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}
