use std::collections::HashMap;

use serde::de::DeserializeOwned;
use snafu::ResultExt;
use validator::Validate;

pub mod args;
pub mod def;
pub mod errors;
pub mod option_spec;

use def::Settings;
use errors::*;
use option_spec::OptionSpec;

pub type ConfigResult<T> = Result<T, ConfigError>;

const ENV_PREFIX: &str = "DNSPY__";
pub const RUNTIME_SNAPSHOT_PATH: &str = ".config.runtime";

/// A case-insensitive, flattened view over every `DNSPY__`-prefixed
/// environment variable, keyed by the unprefixed, uppercased suffix.
pub struct EnvTable(HashMap<String, String>);

impl EnvTable {
    pub fn from_process_env() -> Self {
        let mut map = HashMap::new();
        for (key, value) in std::env::vars() {
            if let Some(suffix) = key.strip_prefix(ENV_PREFIX) {
                map.insert(suffix.to_uppercase(), value);
            }
        }
        Self(map)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_uppercase()).map(String::as_str)
    }
}

/// Parses a raw environment string into a JSON value: numbers, booleans and
/// JSON arrays/objects coerce to their native shape; anything else is kept
/// as a JSON string. Mirrors config-layer type coercion from a structured
/// value tree, just fed by flat env strings instead of a parsed document.
fn coerce(raw: &str) -> serde_json::Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn parse_base<T: DeserializeOwned>(env: &EnvTable, key: &str, default: T) -> ConfigResult<T> {
    match env.get(key) {
        Some(raw) => serde_json::from_value(coerce(raw)).map_err(|e| ConfigError::InvalidValue {
            option: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_duration(env: &EnvTable, key: &str, default: &str) -> ConfigResult<std::time::Duration> {
    let raw = env.get(key).unwrap_or(default);
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| ConfigError::InvalidValue {
        option: key.to_string(),
        reason: e.to_string(),
    })
}

/// Resolves one option for plugin `<module>.<class>`: class-scope env var
/// wins over module-scope, which wins over the declared default.
fn resolve_option(
    env: &EnvTable,
    module: &str,
    class: &str,
    spec: &OptionSpec,
) -> ConfigResult<serde_json::Value> {
    let class_key = format!("PLUGIN__{module}.{class}__{}", spec.name);
    let module_key = format!("PLUGIN__{module}__{}", spec.name);

    if let Some(raw) = env.get(&class_key).or_else(|| env.get(&module_key)) {
        return Ok(coerce(raw));
    }
    if let Some(default) = spec.default {
        return serde_json::from_str(default).map_err(|e| ConfigError::InvalidValue {
            option: spec.name.to_string(),
            reason: e.to_string(),
        });
    }
    if spec.required {
        return MissingRequiredSnafu {
            option: format!("{module}.{class}.{}", spec.name),
        }
        .fail();
    }
    Ok(serde_json::Value::Null)
}

/// Builds the merged option object for one active plugin id from the option
/// table the plugin registry declares for it.
pub fn resolve_plugin_config(
    env: &EnvTable,
    module: &str,
    class: &str,
    options: &[OptionSpec],
) -> ConfigResult<serde_json::Value> {
    let mut object = serde_json::Map::new();
    for spec in options {
        object.insert(spec.name.to_string(), resolve_option(env, module, class, spec)?);
    }
    Ok(serde_json::Value::Object(object))
}

/// Resolves the full process settings from the environment, consulting
/// `descriptors` (module, class, declared options) for every plugin named
/// in `DNSPY__PLUGINS`.
pub fn load(descriptors: &[(&str, &str, &[OptionSpec])]) -> ConfigResult<Settings> {
    let env = EnvTable::from_process_env();

    let local_ip = parse_base(&env, "LOCAL_IP", std::net::Ipv4Addr::new(127, 0, 0, 1))?;
    let local_port = parse_base(&env, "LOCAL_PORT", 5053u16)?;
    let upstream_ip = parse_base(&env, "UPSTREAM_IP", std::net::Ipv4Addr::new(8, 8, 8, 8))?;
    let upstream_port = parse_base(&env, "UPSTREAM_PORT", 53u16)?;
    let upstream_timeout = parse_duration(&env, "UPSTREAM_TIMEOUT", "5s")?;
    let plugins: Vec<String> = parse_base(&env, "PLUGINS", Vec::new())?;
    let redis_uri: Option<String> = parse_base(&env, "REDIS_URI", None)?;

    let mut plugin_config = HashMap::new();
    for id in &plugins {
        let Some((module, class)) = id.split_once('.') else {
            continue;
        };
        if let Some((_, _, options)) = descriptors
            .iter()
            .find(|(m, c, _)| *m == module && *c == class)
        {
            let config = resolve_plugin_config(&env, module, class, options)?;
            plugin_config.insert(id.clone(), config);
        }
    }

    let settings = Settings {
        local_ip,
        local_port,
        upstream_ip,
        upstream_port,
        upstream_timeout,
        plugins,
        redis_uri,
        plugin_config,
    };
    settings.validate().context(ValidationSnafu)?;
    Ok(settings)
}

/// Atomically writes the resolved settings to the runtime snapshot file
/// (write to a temp path, then rename) for advisory introspection by other
/// processes in the same tree.
pub fn write_snapshot(settings: &Settings) -> ConfigResult<()> {
    let tmp_path = format!("{RUNTIME_SNAPSHOT_PATH}.tmp");
    let body = serde_json::to_vec_pretty(settings).expect("Settings always serializes");
    std::fs::write(&tmp_path, body).context(SnapshotSnafu {
        path: tmp_path.clone(),
    })?;
    std::fs::rename(&tmp_path, RUNTIME_SNAPSHOT_PATH).context(SnapshotSnafu {
        path: RUNTIME_SNAPSHOT_PATH.to_string(),
    })
}

/// Removes the runtime snapshot on clean process exit. Missing-file is not
/// an error — the process may exit before ever writing one (e.g. `--list-env`).
pub fn remove_snapshot() {
    let _ = std::fs::remove_file(RUNTIME_SNAPSHOT_PATH);
}

/// Renders the full discoverable option schema (every registered plugin,
/// not only the active ones) as a JSON document, for `--list-env`.
pub fn describe_schema(descriptors: &[(&str, &str, &[OptionSpec])]) -> serde_json::Value {
    let mut plugins = serde_json::Map::new();
    for (module, class, options) in descriptors {
        let mut entries = serde_json::Map::new();
        for spec in options.iter() {
            entries.insert(
                spec.name.to_string(),
                serde_json::json!({
                    "required": spec.required,
                    "default": spec.default,
                }),
            );
        }
        plugins.insert(format!("{module}.{class}"), serde_json::Value::Object(entries));
    }
    serde_json::json!({ "plugins": plugins })
}
