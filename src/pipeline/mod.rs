use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::Message;
use log::{debug, warn};
use snafu::ResultExt;
use tokio::net::UdpSocket;

pub mod errors;

use crate::core::rrset::make_response;
use crate::core::Filter;
use errors::*;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Per-datagram state machine: parse, run the pre-resolve chain, forward
/// any residual questions upstream, run the post-resolve chain, reply.
/// A single datagram's failure never propagates past this function — every
/// error is logged and the best response built so far is still sent.
pub async fn process_datagram(
    bytes: &[u8],
    client_addr: SocketAddr,
    plugins: &[Box<dyn Filter>],
    upstream_addr: SocketAddr,
    upstream_timeout: Duration,
    socket: &Arc<UdpSocket>,
) {
    let query = match Message::from_vec(bytes) {
        Ok(message) => message,
        Err(e) => {
            debug!("dropping malformed datagram from {client_addr}: {e}");
            return;
        }
    };

    let mut response = make_response(&query);
    let mut query = query;

    for plugin in plugins {
        let (q, r) = plugin.before_resolve(query, response, client_addr).await;
        query = q;
        response = r;
    }

    if !query.queries().is_empty() {
        match forward_upstream(&query, upstream_addr, upstream_timeout).await {
            Ok(upstream_reply) => {
                for record in upstream_reply.answers() {
                    response.add_answer(record.clone());
                }
            }
            Err(e) => warn!("upstream forwarding skipped for {client_addr}: {e}"),
        }
    }

    for plugin in plugins {
        let (q, r) = plugin.after_resolve(query, response, client_addr).await;
        query = q;
        response = r;
    }
    let _ = query;

    match response.to_vec() {
        Ok(wire) => {
            if let Err(e) = socket.send_to(&wire, client_addr).await {
                warn!("failed to send response to {client_addr}: {e}");
            }
        }
        Err(e) => warn!("failed to serialize response for {client_addr}: {e}"),
    }
}

/// Sends `query` to `upstream_addr` over a fresh ephemeral UDP socket and
/// waits for its reply with a bounded timeout.
async fn forward_upstream(
    query: &Message,
    upstream_addr: SocketAddr,
    timeout: Duration,
) -> PipelineResult<Message> {
    let upstream = upstream_addr.to_string();
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context(UpstreamIoSnafu {
            upstream: upstream.clone(),
        })?;
    socket
        .connect(upstream_addr)
        .await
        .context(UpstreamIoSnafu {
            upstream: upstream.clone(),
        })?;

    let wire = query.to_vec().context(UpstreamMalformedSnafu {
        upstream: upstream.clone(),
    })?;
    socket.send(&wire).await.context(UpstreamIoSnafu {
        upstream: upstream.clone(),
    })?;

    let mut buf = [0u8; 4096];
    let read = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| PipelineError::UpstreamTimeout {
            upstream: upstream.clone(),
        })?
        .context(UpstreamIoSnafu {
            upstream: upstream.clone(),
        })?;

    Message::from_vec(&buf[..read]).context(UpstreamMalformedSnafu { upstream })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{MessageType, Query};
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{Name, RData, Record, RecordType};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn a_query(id: u16, name: &str) -> Message {
        let mut query = Message::new();
        query.set_id(id);
        query.set_message_type(MessageType::Query);
        query.set_recursion_desired(true);
        query.add_query(Query::query(Name::from_str(name).unwrap(), RecordType::A));
        query
    }

    async fn spawn_fake_upstream(answer: Ipv4Addr) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            if let Ok((len, from)) = socket.recv_from(&mut buf).await {
                if let Ok(query) = Message::from_vec(&buf[..len]) {
                    let mut response = make_response(&query);
                    if let Some(q) = query.queries().first() {
                        response.add_answer(Record::from_rdata(q.name().clone(), 60, RData::A(A(answer))));
                    }
                    let wire = response.to_vec().unwrap();
                    let _ = socket.send_to(&wire, from).await;
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn transparent_passthrough_returns_upstream_answer() {
        let upstream_addr = spawn_fake_upstream(Ipv4Addr::new(93, 184, 216, 34)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr = client_socket.local_addr().unwrap();

        let wire = a_query(42, "example.com.").to_vec().unwrap();
        let plugins: Vec<Box<dyn Filter>> = Vec::new();

        process_datagram(
            &wire,
            client_addr,
            &plugins,
            upstream_addr,
            Duration::from_secs(2),
            &server_socket,
        )
        .await;

        let mut buf = [0u8; 4096];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client_socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        let response = Message::from_vec(&buf[..len]).unwrap();
        assert_eq!(response.id(), 42);
        assert_eq!(response.answers().len(), 1);
    }

    #[tokio::test]
    async fn upstream_timeout_still_yields_a_reply_with_no_answers() {
        // nothing bound at this address: the connect succeeds (UDP is
        // connectionless) but no reply ever arrives, so the timeout fires.
        let dead_upstream: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let client_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr = client_socket.local_addr().unwrap();

        let wire = a_query(7, "example.com.").to_vec().unwrap();
        let plugins: Vec<Box<dyn Filter>> = Vec::new();

        process_datagram(
            &wire,
            client_addr,
            &plugins,
            dead_upstream,
            Duration::from_millis(200),
            &server_socket,
        )
        .await;

        let mut buf = [0u8; 4096];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client_socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        let response = Message::from_vec(&buf[..len]).unwrap();
        assert_eq!(response.id(), 7);
        assert!(response.answers().is_empty());
    }

    #[tokio::test]
    async fn malformed_datagram_is_dropped_without_a_reply() {
        let server_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client_addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let plugins: Vec<Box<dyn Filter>> = Vec::new();

        process_datagram(
            b"not a dns message",
            client_addr,
            &plugins,
            "127.0.0.1:1".parse().unwrap(),
            Duration::from_millis(100),
            &server_socket,
        )
        .await;
    }
}
