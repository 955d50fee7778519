pub mod allow_set;
pub mod deny_set;
pub mod local_db;

use std::sync::Arc;

use crate::store::KvStore;

pub const MODULE: &str = "Authoritative";

/// Shared state every authoritative filter embeds by value: the key-value
/// store handle and the module-wide TTL fallback.
pub struct AuthoritativeBase {
    pub store: Arc<dyn KvStore>,
    pub default_ttl: u32,
}
