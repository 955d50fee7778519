use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::Message;

use crate::config::option_spec::OptionSpec;
use crate::core::rrset::{a_questions, a_rrset, answer_and_remove};
use crate::core::wildcard::resolve_wildcard;
use crate::core::{DomainName, Filter};
use crate::plugins::authoritative::{AuthoritativeBase, MODULE};
use crate::plugins::errors::PluginError;
use crate::plugins::{field, PluginResult};
use crate::store::KvStore;

pub const CLASS: &str = "AllowSet";

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional("redis_key_a", "\"WLDB\""),
    OptionSpec::required("response_ip"),
    OptionSpec::nullable("ttl"),
    OptionSpec::optional("default_ttl", "300"),
];

pub fn create(
    config: &serde_json::Value,
    _peers: &[Box<dyn Filter>],
    store: Option<&Arc<dyn KvStore>>,
) -> PluginResult<Box<dyn Filter>> {
    let id = format!("{MODULE}.{CLASS}");
    let store = store.cloned().ok_or_else(|| PluginError::MissingPeer {
        name: id.clone(),
        peer: "key-value store connection".to_string(),
    })?;
    let redis_key: String = field(config, "redis_key_a", &id)?;
    let response_ip: Vec<Ipv4Addr> = field(config, "response_ip", &id)?;
    let ttl: Option<u32> = field(config, "ttl", &id)?;
    let default_ttl: u32 = field(config, "default_ttl", &id)?;
    Ok(Box::new(AllowSet {
        base: AuthoritativeBase { store, default_ttl },
        redis_key,
        response_ip,
        ttl: ttl.unwrap_or(default_ttl),
    }))
}

/// Inverse of `DenySet`: names in the allow set pass through untouched;
/// everything else is answered with the fixed `response_ip`.
pub struct AllowSet {
    base: AuthoritativeBase,
    redis_key: String,
    response_ip: Vec<Ipv4Addr>,
    ttl: u32,
}

#[async_trait]
impl Filter for AllowSet {
    async fn before_resolve(
        &self,
        mut query: Message,
        mut response: Message,
        _client_addr: SocketAddr,
    ) -> (Message, Message) {
        for question in a_questions(&query) {
            let name = DomainName::from(question.name());
            let store = &self.base.store;
            let key = self.redis_key.as_str();
            let allowed = resolve_wildcard(&name, |search_key| async move {
                match store.sismember(key, &search_key).await {
                    Ok(true) => Some(()),
                    _ => None,
                }
            })
            .await;

            if allowed.is_none() {
                let records = a_rrset(question.name(), self.ttl, &self.response_ip);
                answer_and_remove(&mut query, &mut response, &question, records);
            }
        }
        (query, response)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
