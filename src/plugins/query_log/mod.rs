use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::Message;
use log::Level;

use crate::config::option_spec::OptionSpec;
use crate::core::Filter;
use crate::plugins::{field, PluginResult};
use crate::store::KvStore;

pub const MODULE: &str = "QueryLog";
pub const CLASS: &str = "Log";

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional("log_level", "\"info\""),
    OptionSpec::optional("question", "false"),
    OptionSpec::optional("answer", "true"),
];

pub fn create(
    config: &serde_json::Value,
    _peers: &[Box<dyn Filter>],
    _store: Option<&Arc<dyn KvStore>>,
) -> PluginResult<Box<dyn Filter>> {
    let id = format!("{MODULE}.{CLASS}");
    let log_level: String = field(config, "log_level", &id)?;
    let level = log_level.parse::<Level>().unwrap_or(Level::Info);
    let question: bool = field(config, "question", &id)?;
    let answer: bool = field(config, "answer", &id)?;
    Ok(Box::new(Log {
        level,
        question,
        answer,
    }))
}

/// Formats one log line per invocation: client address, question name(s)/
/// type(s) before resolution, and question(s) plus answer(s) after.
/// Embedded newlines are escaped so one log event is always one line.
pub struct Log {
    level: Level,
    question: bool,
    answer: bool,
}

fn one_line(text: impl std::fmt::Display) -> String {
    text.to_string().replace('\n', "\\n")
}

fn format_questions(message: &Message) -> String {
    message
        .queries()
        .iter()
        .map(|q| format!("{}/{:?}", q.name(), q.query_type()))
        .collect::<Vec<_>>()
        .join(",")
}

fn format_answers(message: &Message) -> String {
    message
        .answers()
        .iter()
        .map(|r| format!("{}={}", r.name(), r.data().map(|d| d.to_string()).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl Filter for Log {
    async fn before_resolve(
        &self,
        query: Message,
        response: Message,
        client_addr: SocketAddr,
    ) -> (Message, Message) {
        if self.question {
            log::log!(
                self.level,
                "{}",
                one_line(format!("client={client_addr} question={}", format_questions(&query)))
            );
        }
        (query, response)
    }

    async fn after_resolve(
        &self,
        query: Message,
        response: Message,
        client_addr: SocketAddr,
    ) -> (Message, Message) {
        if self.answer {
            log::log!(
                self.level,
                "{}",
                one_line(format!(
                    "client={client_addr} question={} answer={}",
                    format_questions(&query),
                    format_answers(&response)
                ))
            );
        }
        (query, response)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
