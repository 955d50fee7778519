use std::sync::Arc;

use snafu::ResultExt;

use crate::config::def::Settings;
use crate::core::Filter;
use crate::plugins::create_plugin;
use crate::store::KvStore;

pub mod errors;
use errors::*;

pub type BuilderResult<T> = Result<T, BuilderError>;

/// Instantiates every plugin listed in `settings.plugins`, in declared
/// order, passing each constructor the slice of already-constructed peers.
/// A plugin id that names no registered class is logged as a warning and
/// skipped without aborting startup; construction failures are fatal.
pub fn build_plugin_list(
    settings: &Settings,
    store: Option<&Arc<dyn KvStore>>,
) -> BuilderResult<Vec<Box<dyn Filter>>> {
    let mut plugins: Vec<Box<dyn Filter>> = Vec::new();
    for id in &settings.plugins {
        let config = settings
            .plugin_config
            .get(id)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        match create_plugin(id, &config, &plugins, store).context(PluginBuildSnafu { name: id.clone() })? {
            Some(plugin) => plugins.push(plugin),
            None => log::warn!("plugin {id} is not registered, skipping"),
        }
    }
    Ok(plugins)
}
