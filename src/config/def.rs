use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// The fully-resolved, process-wide configuration snapshot. Built once in
/// `main` from the process environment and handed down as `Arc<Settings>`;
/// never mutated or re-read after construction.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    pub local_ip: Ipv4Addr,
    pub local_port: u16,
    pub upstream_ip: Ipv4Addr,
    pub upstream_port: u16,
    #[serde(with = "humantime_serde")]
    pub upstream_timeout: Duration,
    #[validate(custom(function = "validate_plugin_ids"))]
    pub plugins: Vec<String>,
    pub redis_uri: Option<String>,
    /// Keyed by plugin id (`<module>.<class>`); each value is the merged
    /// (class-over-module) option object ready for `serde_json::from_value`
    /// into that plugin's typed config struct.
    pub plugin_config: HashMap<String, serde_json::Value>,
}

/// Each declared active plugin must look like `Module.Class`.
fn validate_plugin_ids(plugins: &[String]) -> Result<(), ValidationError> {
    for id in plugins {
        if id.split_once('.').map(|(m, c)| !m.is_empty() && !c.is_empty()) != Some(true) {
            let mut err = ValidationError::new("plugin_id_format");
            err.message = Some(format!("`{id}` is not a `Module.Class` plugin id").into());
            return Err(err);
        }
    }
    Ok(())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            local_ip: Ipv4Addr::new(127, 0, 0, 1),
            local_port: 5053,
            upstream_ip: Ipv4Addr::new(8, 8, 8, 8),
            upstream_port: 53,
            upstream_timeout: Duration::from_secs(5),
            plugins: Vec::new(),
            redis_uri: None,
            plugin_config: HashMap::new(),
        }
    }
}
