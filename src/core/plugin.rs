use std::net::SocketAddr;

use async_trait::async_trait;
use hickory_proto::op::Message;

/// A constructed filter in the pipeline.
///
/// Both phases return the possibly-mutated `(query, response)` pair so the
/// next filter in the chain observes the full effect of its predecessors.
/// Default bodies are pass-through, so a filter only overrides the phases
/// it cares about.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn before_resolve(
        &self,
        query: Message,
        response: Message,
        _client_addr: SocketAddr,
    ) -> (Message, Message) {
        (query, response)
    }

    async fn after_resolve(
        &self,
        query: Message,
        response: Message,
        _client_addr: SocketAddr,
    ) -> (Message, Message) {
        (query, response)
    }

    /// Narrowing hook for cross-plugin peer binding: a plugin that wants to
    /// be locatable by a later plugin (e.g. `DenySet` for the active-probe
    /// filter) exposes itself through `as_any` so the binder can
    /// `downcast_ref` by concrete type. No global registry keyed by class
    /// name is needed.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Tears down any background resources the plugin owns (e.g. the
    /// active-probe filter's classifier loop). Called once at process
    /// shutdown; most plugins own nothing and keep the default no-op.
    fn shutdown(&self) {}
}
