//! Transient cache for aggregated results.
//!
//! Merged post lists and enriched blog lists are stored as JSON values under keys
//! derived from the operation name and the full parameter set. Backends:
//!
//! - **memory**: bounded LRU with per-entry expiry, process-local
//! - **postgres**: `crossblog_transients` table (see `infra::db::transients`)
//!
//! ```toml
//! [transients]
//! backend = "memory"
//! memory_capacity = 256
//! key_prefix = "crossblog"
//! ```

mod config;
mod keys;
pub(crate) mod lock;
mod store;

pub use config::{TransientBackend, TransientConfig};
pub use keys::{DEFAULT_KEY_PREFIX, OP_GET_BLOGS, OP_GET_POSTS, TransientKeys};
pub use store::{MAX_TRANSIENT_TTL, MemoryTransientStore, TransientError, TransientStore};

pub const METRIC_TRANSIENT_HIT: &str = "crossblog_transient_hit_total";
pub const METRIC_TRANSIENT_MISS: &str = "crossblog_transient_miss_total";
pub const METRIC_TRANSIENT_INVALIDATED: &str = "crossblog_transient_invalidated_total";
