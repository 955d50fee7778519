use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::Message;
use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::config::option_spec::OptionSpec;
use crate::core::rrset::a_questions;
use crate::core::Filter;
use crate::plugins::authoritative::deny_set::DenySet;
use crate::plugins::errors::PluginError;
use crate::plugins::{field, PluginResult};
use crate::store::KvStore;

pub const MODULE: &str = "Probe";
pub const CLASS: &str = "ActiveProbe";

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional("queue_key", "\"Probe_que\""),
    OptionSpec::optional("open_key", "\"Probe_open\""),
    OptionSpec::optional("blocked_key", "\"Probe_block\""),
    OptionSpec::optional("unknown_key", "\"Probe_unknown\""),
    OptionSpec::optional("probe_timeout", "\"60s\""),
    OptionSpec::optional(
        "block_marker",
        "\"Your client does not have permission to get URL\"",
    ),
];

pub fn create(
    config: &serde_json::Value,
    peers: &[Box<dyn Filter>],
    store: Option<&Arc<dyn KvStore>>,
) -> PluginResult<Box<dyn Filter>> {
    let id = format!("{MODULE}.{CLASS}");
    let store = store.cloned().ok_or_else(|| PluginError::MissingPeer {
        name: id.clone(),
        peer: "key-value store connection".to_string(),
    })?;

    let deny_set = peers
        .iter()
        .find_map(|peer| peer.as_any().downcast_ref::<DenySet>())
        .ok_or_else(|| PluginError::MissingPeer {
            name: id.clone(),
            peer: "Authoritative.DenySet".to_string(),
        })?;
    let deny_set_key = deny_set.redis_key().to_string();

    let queue_key: String = field(config, "queue_key", &id)?;
    let open_key: String = field(config, "open_key", &id)?;
    let blocked_key: String = field(config, "blocked_key", &id)?;
    let unknown_key: String = field(config, "unknown_key", &id)?;
    let probe_timeout_raw: String = field(config, "probe_timeout", &id)?;
    let probe_timeout = humantime_serde::re::humantime::parse_duration(&probe_timeout_raw)
        .unwrap_or(Duration::from_secs(60));
    let block_marker: String = field(config, "block_marker", &id)?;

    let client = reqwest::Client::builder()
        .timeout(probe_timeout)
        .build()
        .expect("reqwest client always builds from static config");

    let classifier = ClassifierTask {
        store: store.clone(),
        queue_key: queue_key.clone(),
        open_key: open_key.clone(),
        blocked_key: blocked_key.clone(),
        unknown_key: unknown_key.clone(),
        deny_set_key,
        block_marker,
        client,
    };
    let handle = tokio::spawn(classifier.run());

    Ok(Box::new(ActiveProbe {
        store,
        queue_key,
        open_key,
        blocked_key,
        unknown_key,
        handle,
    }))
}

/// Queues unclassified A-question names for out-of-band HTTP classification
/// and, via its background task, writes `blocked` verdicts into a bound
/// `DenySet`'s backing set.
pub struct ActiveProbe {
    store: Arc<dyn KvStore>,
    queue_key: String,
    open_key: String,
    blocked_key: String,
    unknown_key: String,
    handle: JoinHandle<()>,
}

#[async_trait]
impl Filter for ActiveProbe {
    async fn before_resolve(
        &self,
        query: Message,
        response: Message,
        _client_addr: SocketAddr,
    ) -> (Message, Message) {
        for question in a_questions(&query) {
            let name = question.name().to_utf8();
            let name = name.trim_end_matches('.').to_string();
            let already_classified = matches!(self.store.sismember(&self.open_key, &name).await, Ok(true))
                || matches!(self.store.sismember(&self.blocked_key, &name).await, Ok(true))
                || matches!(self.store.sismember(&self.unknown_key, &name).await, Ok(true));
            if !already_classified {
                if let Err(e) = self.store.sadd(&self.queue_key, &[name]).await {
                    warn!("active-probe: failed to queue name for classification: {e}");
                }
            }
        }
        (query, response)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

struct ClassifierTask {
    store: Arc<dyn KvStore>,
    queue_key: String,
    open_key: String,
    blocked_key: String,
    unknown_key: String,
    deny_set_key: String,
    block_marker: String,
    client: reqwest::Client,
}

enum Classification {
    Open,
    Blocked,
    Unknown,
}

impl ClassifierTask {
    async fn run(self) {
        self.resync_deny_set().await;
        loop {
            match self.store.spop(&self.queue_key).await {
                Ok(Some(name)) => self.classify_and_record(name).await,
                Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
                Err(e) => {
                    warn!("active-probe: queue pop failed: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Re-syncs previously-classified-blocked names (and their `*.`
    /// wildcards) into the bound `DenySet`'s backing set, so a restart
    /// doesn't silently drop domains this plugin already classified as
    /// blocked in an earlier run.
    async fn resync_deny_set(&self) {
        let blocked = match self.store.smembers(&self.blocked_key).await {
            Ok(names) => names,
            Err(e) => {
                warn!("active-probe: failed to read {}: {e}", self.blocked_key);
                return;
            }
        };
        if blocked.is_empty() {
            return;
        }
        let members: Vec<String> = blocked
            .iter()
            .flat_map(|name| [name.clone(), format!("*.{name}")])
            .collect();
        if let Err(e) = self.store.sadd(&self.deny_set_key, &members).await {
            warn!(
                "active-probe: failed to resync {} blocked names into {}: {e}",
                blocked.len(),
                self.deny_set_key
            );
        }
    }

    async fn classify_and_record(&self, name: String) {
        let classification = self.probe(&name).await;
        let (key, is_blocked) = match classification {
            Classification::Open => (&self.open_key, false),
            Classification::Blocked => (&self.blocked_key, true),
            Classification::Unknown => (&self.unknown_key, false),
        };
        if let Err(e) = self.store.sadd(key, &[name.clone()]).await {
            warn!("active-probe: failed to record classification for {name}: {e}");
        }
        if is_blocked {
            let wildcard = format!("*.{name}");
            if let Err(e) = self
                .store
                .sadd(&self.deny_set_key, &[name.clone(), wildcard])
                .await
            {
                warn!("active-probe: failed to write {name} into deny set: {e}");
            }
        }
    }

    /// Probes `https://<name>` then `http://<name>`; a 403 bearing the
    /// configured marker classifies the name as blocked, any other
    /// successful response as open, and a transport failure on every
    /// attempt as unknown.
    async fn probe(&self, name: &str) -> Classification {
        for scheme in ["https", "http"] {
            let url = format!("{scheme}://{name}/");
            match self.client.get(&url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    if status.as_u16() == 403 && body.to_lowercase().contains(&self.block_marker.to_lowercase())
                    {
                        return Classification::Blocked;
                    }
                    return Classification::Open;
                }
                Err(e) => {
                    debug!("active-probe: {scheme} probe of {name} failed: {e}");
                }
            }
        }
        Classification::Unknown
    }
}
