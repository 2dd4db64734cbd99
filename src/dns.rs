use crate::libdns::proto::op::{Message, MessageType, OpCode, Query};

pub use crate::libdns::proto::{
    error::{ProtoError, ProtoResult},
    op::{self, ResponseCode},
    rr::{self, DNSClass, Name, RData, Record, RecordType},
};

/// A query as handed over by the wire listener.
pub type DnsRequest = Message;
/// A complete reply message.
pub type DnsResponse = Message;

/// Builds a recursive query message carrying a single question.
pub fn build_message(query: Query) -> Message {
    let mut message: Message = Message::new();
    let id: u16 = rand::random();
    message
        .add_query(query)
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message
}

/// Reply skeleton for `request`: same id, opcode and question.
pub fn response_to(request: &Message) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .add_queries(request.queries().iter().cloned());
    response
}

/// Short `name type` form of the first question, for logs.
pub fn question_of(message: &Message) -> String {
    match message.queries().first() {
        Some(query) => format!("{} {}", query.name(), query.query_type()),
        None => "<no question>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_build_message() {
        let query = Query::query(Name::from_str("example.com.").unwrap(), RecordType::A);
        let message = build_message(query.clone());

        assert_eq!(message.message_type(), MessageType::Query);
        assert!(message.recursion_desired());
        assert_eq!(message.queries(), &[query]);
    }

    #[test]
    fn test_response_to() {
        let query = Query::query(Name::from_str("example.com.").unwrap(), RecordType::MX);
        let request = build_message(query);
        let response = response_to(&request);

        assert_eq!(response.id(), request.id());
        assert_eq!(response.message_type(), MessageType::Response);
        assert_eq!(response.queries(), request.queries());
        assert_eq!(question_of(&response), "example.com. MX");
    }
}
