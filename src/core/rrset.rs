use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};

/// Builds the empty response shell for an inbound query: mirrored id/op-code,
/// `recursion_available` set, original question section preserved (standard
/// DNS `make_response` behavior — the reply's question section reflects the
/// client's original questions, not whatever the pre-resolve chain pruned).
pub fn make_response(query: &Message) -> Message {
    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(query.op_code());
    response.set_recursion_desired(query.recursion_desired());
    response.set_recursion_available(true);
    for query in query.queries() {
        response.add_query(query.clone());
    }
    response
}

/// Constructs a single A-type resource record for `name` carrying `addr`.
pub fn a_record(name: Name, ttl: u32, addr: Ipv4Addr) -> Record {
    Record::from_rdata(name, ttl, RData::A(A(addr)))
}

/// Constructs an A-RRSet (one record per address) all bearing `name`.
pub fn a_rrset(name: &Name, ttl: u32, addresses: &[Ipv4Addr]) -> Vec<Record> {
    addresses
        .iter()
        .map(|addr| a_record(name.clone(), ttl, *addr))
        .collect()
}

/// Removes `question` from `query`'s question section and appends `records`
/// to `response`'s answer section — the answered-question move every
/// authoritative filter performs when it short-circuits a question.
pub fn answer_and_remove(query: &mut Message, response: &mut Message, question: &Query, records: Vec<Record>) {
    query.queries_mut().retain(|q| q != question);
    for record in records {
        response.add_answer(record);
    }
}

/// The questions in `query` of type A, snapshotted so callers can mutate
/// `query.queries_mut()` while iterating without borrow conflicts.
pub fn a_questions(query: &Message) -> Vec<Query> {
    query
        .queries()
        .iter()
        .filter(|q| q.query_type() == RecordType::A)
        .cloned()
        .collect()
}
