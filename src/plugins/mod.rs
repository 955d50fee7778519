use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

use crate::config::option_spec::OptionSpec;
use crate::core::Filter;
use crate::store::KvStore;

pub mod authoritative;
pub mod errors;
pub mod probe;
pub mod query_log;

use errors::*;

pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Every plugin factory is a plain function, not a closure: each factory
/// receives the merged option object computed for it, a read-only slice of
/// already-constructed peers (so later plugins can bind to earlier ones,
/// see `probe::ActiveProbe`), and the shared key-value store handle if one
/// was configured.
pub type PluginFactory = fn(
    config: &serde_json::Value,
    peers: &[Box<dyn Filter>],
    store: Option<&Arc<dyn KvStore>>,
) -> PluginResult<Box<dyn Filter>>;

pub struct PluginDescriptor {
    pub module: &'static str,
    pub class: &'static str,
    pub options: &'static [OptionSpec],
    pub factory: PluginFactory,
}

/// Compile-time registry of every known plugin class, keyed by `<module>.<class>`.
/// Rust has no runtime module reflection, so discovery here is this table,
/// populated by hand at startup.
static PLUGIN_REGISTRY: Lazy<Vec<PluginDescriptor>> = Lazy::new(|| {
    vec![
        PluginDescriptor {
            module: authoritative::MODULE,
            class: authoritative::local_db::CLASS,
            options: authoritative::local_db::OPTIONS,
            factory: authoritative::local_db::create,
        },
        PluginDescriptor {
            module: authoritative::MODULE,
            class: authoritative::deny_set::CLASS,
            options: authoritative::deny_set::OPTIONS,
            factory: authoritative::deny_set::create,
        },
        PluginDescriptor {
            module: authoritative::MODULE,
            class: authoritative::allow_set::CLASS,
            options: authoritative::allow_set::OPTIONS,
            factory: authoritative::allow_set::create,
        },
        PluginDescriptor {
            module: query_log::MODULE,
            class: query_log::CLASS,
            options: query_log::OPTIONS,
            factory: query_log::create,
        },
        PluginDescriptor {
            module: probe::MODULE,
            class: probe::CLASS,
            options: probe::OPTIONS,
            factory: probe::create,
        },
    ]
});

fn find(module: &str, class: &str) -> Option<&'static PluginDescriptor> {
    PLUGIN_REGISTRY
        .iter()
        .find(|d| d.module == module && d.class == class)
}

/// Every registered plugin's `(module, class, declared options)`, used by
/// the config registry both to resolve active plugins' settings and to
/// answer `--list-env` for the full discoverable schema.
pub fn descriptors() -> Vec<(&'static str, &'static str, &'static [OptionSpec])> {
    PLUGIN_REGISTRY
        .iter()
        .map(|d| (d.module, d.class, d.options))
        .collect()
}

/// Instantiates plugin `id` (`<module>.<class>`). Returns `Ok(None)` when the
/// id names no registered class — the caller logs a warning and skips it
/// (`PluginNotFound` is non-fatal); any other error is a construction
/// failure and is fatal at startup.
pub fn create_plugin(
    id: &str,
    config: &serde_json::Value,
    peers: &[Box<dyn Filter>],
    store: Option<&Arc<dyn KvStore>>,
) -> PluginResult<Option<Box<dyn Filter>>> {
    let Some((module, class)) = id.split_once('.') else {
        return Ok(None);
    };
    match find(module, class) {
        Some(descriptor) => (descriptor.factory)(config, peers, store).map(Some),
        None => Ok(None),
    }
}

/// Reads and deserializes field `name` out of a plugin's merged option
/// object, with plugin-id-qualified error context.
pub fn field<T: DeserializeOwned>(
    config: &serde_json::Value,
    name: &str,
    plugin_id: &str,
) -> PluginResult<T> {
    let value = config.get(name).cloned().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).context(ConfigErrSnafu {
        name: format!("{plugin_id}.{name}"),
    })
}
