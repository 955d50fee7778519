use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
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

pub const CLASS: &str = "LocalDB";

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional("redis_key_a", "\"LocalDB\""),
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
    let default_ttl: u32 = field(config, "default_ttl", &id)?;
    Ok(Box::new(LocalDb {
        base: AuthoritativeBase { store, default_ttl },
        redis_key,
    }))
}

/// Reads a hash of `name -> ";"-joined IPv4 list` and answers matching
/// A-questions from it, using the wildcard resolver for lookup.
pub struct LocalDb {
    base: AuthoritativeBase,
    redis_key: String,
}

#[async_trait]
impl Filter for LocalDb {
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
            let found = resolve_wildcard(&name, |search_key| async move {
                store.hget(key, &search_key).await.ok().flatten()
            })
            .await;

            if let Some(raw) = found {
                let addresses: Vec<Ipv4Addr> = raw
                    .split(';')
                    .filter_map(|part| Ipv4Addr::from_str(part.trim()).ok())
                    .collect();
                if !addresses.is_empty() {
                    let records = a_rrset(question.name(), self.base.default_ttl, &addresses);
                    answer_and_remove(&mut query, &mut response, &question, records);
                }
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

    fn local_db(store: Arc<dyn KvStore>, redis_key: &str, default_ttl: u32) -> LocalDb {
        LocalDb {
            base: AuthoritativeBase { store, default_ttl },
            redis_key: redis_key.to_string(),
        }
    }

    #[tokio::test]
    async fn exact_match_answers_from_store_without_upstream() {
        let fake = Arc::new(FakeStore::new());
        fake.hset("LocalDB", "test.com", "1.2.3.4;5.6.7.8").await;
        let filter = local_db(fake, "LocalDB", 300);

        let query = a_query("test.com.");
        let response = make_response(&query);
        let client: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let (query, response) = filter.before_resolve(query, response, client).await;

        assert!(query.queries().is_empty());
        let addrs: Vec<Ipv4Addr> = response.answers().iter().map(record_addr).collect();
        assert_eq!(addrs, vec![Ipv4Addr::new(1, 2, 3, 4), Ipv4Addr::new(5, 6, 7, 8)]);
    }

    #[tokio::test]
    async fn store_miss_leaves_question_for_upstream() {
        let fake = Arc::new(FakeStore::new());
        fake.hset("LocalDB", "test.com", "1.2.3.4").await;
        let filter = local_db(fake, "LocalDB", 300);

        let query = a_query("test.test.com.");
        let response = make_response(&query);
        let client: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let (query, response) = filter.before_resolve(query, response, client).await;

        assert_eq!(query.queries().len(), 1);
        assert!(response.answers().is_empty());
    }

    #[tokio::test]
    async fn exact_and_wildcard_records_coexist_with_exact_precedence() {
        let fake = Arc::new(FakeStore::new());
        fake.hset("LocalDB", "test.com", "1.2.3.4").await;
        fake.hset("LocalDB", "*.test.com", "9.9.9.9").await;
        let filter = local_db(fake, "LocalDB", 300);
        let client: SocketAddr = "127.0.0.1:9".parse().unwrap();

        for (name, expected) in [
            ("test.com.", Ipv4Addr::new(1, 2, 3, 4)),
            ("a.test.com.", Ipv4Addr::new(9, 9, 9, 9)),
            ("b.a.test.com.", Ipv4Addr::new(9, 9, 9, 9)),
        ] {
            let query = a_query(name);
            let response = make_response(&query);
            let (query, response) = filter.before_resolve(query, response, client).await;
            assert!(query.queries().is_empty());
            let addr = record_addr(&response.answers()[0]);
            assert_eq!(addr, expected);
        }
    }
}
