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

pub const CLASS: &str = "DenySet";

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional("redis_key_a", "\"BLDB\""),
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
    Ok(Box::new(DenySet {
        base: AuthoritativeBase { store, default_ttl },
        redis_key,
        response_ip,
        ttl: ttl.unwrap_or(default_ttl),
    }))
}

/// Synthesizes a fixed `response_ip` answer for any A-question whose name
/// (or an ancestor wildcard) is a member of the deny set; everything else
/// passes through untouched.
pub struct DenySet {
    base: AuthoritativeBase,
    redis_key: String,
    response_ip: Vec<Ipv4Addr>,
    ttl: u32,
}

impl DenySet {
    pub fn redis_key(&self) -> &str {
        &self.redis_key
    }
}

#[async_trait]
impl Filter for DenySet {
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
            let denied = resolve_wildcard(&name, |search_key| async move {
                match store.sismember(key, &search_key).await {
                    Ok(true) => Some(()),
                    _ => None,
                }
            })
            .await;

            if denied.is_some() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rrset::make_response;
    use crate::store::fake::FakeStore;
    use hickory_proto::op::{MessageType, Query};
    use hickory_proto::rr::{Name, RData, Record, RecordType};
    use std::str::FromStr;

    fn a_query(name: &str) -> Message {
        let mut query = Message::new();
        query.set_message_type(MessageType::Query);
        query.add_query(Query::query(Name::from_str(name).unwrap(), RecordType::A));
        query
    }

    fn record_addr(record: &Record) -> Ipv4Addr {
        match record.data() {
            Some(RData::A(addr)) => addr.0,
            other => panic!("expected an A record, got {other:?}"),
        }
    }

    fn deny_set(store: Arc<dyn KvStore>, ttl: u32, default_ttl: u32) -> DenySet {
        DenySet {
            base: AuthoritativeBase { store, default_ttl },
            redis_key: "BLDB".to_string(),
            response_ip: vec![Ipv4Addr::new(10, 0, 0, 1)],
            ttl,
        }
    }

    #[tokio::test]
    async fn wildcard_member_is_answered_with_response_ip() {
        let fake = Arc::new(FakeStore::new());
        fake.sadd_sync("BLDB", "*.test.com").await;
        let filter = deny_set(fake, 300, 300);

        let query = a_query("x.test.com.");
        let response = make_response(&query);
        let client: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let (query, response) = filter.before_resolve(query, response, client).await;

        assert!(query.queries().is_empty());
        assert_eq!(record_addr(&response.answers()[0]), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[tokio::test]
    async fn exact_name_not_covered_by_narrower_wildcard_passes_through() {
        let fake = Arc::new(FakeStore::new());
        fake.sadd_sync("BLDB", "*.test.com").await;
        let filter = deny_set(fake, 300, 300);

        let query = a_query("test.com.");
        let response = make_response(&query);
        let client: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let (query, response) = filter.before_resolve(query, response, client).await;

        assert_eq!(query.queries().len(), 1);
        assert!(response.answers().is_empty());
    }

    #[tokio::test]
    async fn explicit_ttl_overrides_module_default_ttl() {
        let fake = Arc::new(FakeStore::new());
        fake.sadd_sync("BLDB", "blocked.com").await;
        let filter = deny_set(fake, 60, 300);

        let query = a_query("blocked.com.");
        let response = make_response(&query);
        let client: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let (_, response) = filter.before_resolve(query, response, client).await;

        assert_eq!(response.answers()[0].ttl(), 60);
    }
}
