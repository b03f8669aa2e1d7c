//! Transient cache configuration.
//!
//! Controls which backend stores merged results and how large the in-memory store may grow.

use std::num::NonZeroUsize;

use super::keys::DEFAULT_KEY_PREFIX;

const DEFAULT_MEMORY_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransientBackend {
    /// Process-local LRU store; entries vanish with the process.
    #[default]
    Memory,
    /// `crossblog_transients` table in the network database.
    Postgres,
}

#[derive(Debug, Clone)]
pub struct TransientConfig {
    pub backend: TransientBackend,
    /// Maximum entries kept by the memory backend.
    pub memory_capacity: usize,
    pub key_prefix: String,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            backend: TransientBackend::default(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl From<&crate::config::TransientSettings> for TransientConfig {
    fn from(settings: &crate::config::TransientSettings) -> Self {
        Self {
            backend: settings.backend,
            memory_capacity: settings.memory_capacity,
            key_prefix: settings.key_prefix.clone(),
        }
    }
}

impl TransientConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = TransientConfig::default();
        assert_eq!(config.backend, TransientBackend::Memory);
        assert_eq!(config.memory_capacity, 256);
        assert_eq!(config.key_prefix, "crossblog");
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = TransientConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
