use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Upstream;
use crate::dns::{
    build_message, response_to, DnsRequest, DnsResponse, Name, RData, Record, RecordType,
    ResponseCode,
};
use crate::dns_error::UpstreamError;
use crate::libdns::proto::{
    op::{Message, Query},
    rr::rdata::{A, SOA},
};

/// How the mock upstream answers the next queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// NOERROR with one A record
    Answer,
    /// NOERROR with a SOA in the authority section only
    NoData,
    /// NOERROR with every section empty
    Empty,
    /// the given response code, empty sections
    Rcode(ResponseCode),
    /// connection refused
    Fail,
    /// panics inside the relay
    Panic,
}

#[derive(Debug)]
struct State {
    behavior: Behavior,
    queried: Vec<Name>,
}

/// Upstream double recording every name it was asked for.
#[derive(Debug, Clone)]
pub struct MockUpstream(Arc<Mutex<State>>);

impl MockUpstream {
    pub fn new(behavior: Behavior) -> Self {
        Self(Arc::new(Mutex::new(State {
            behavior,
            queried: Vec::new(),
        })))
    }

    pub fn set(&self, behavior: Behavior) {
        self.0.lock().behavior = behavior;
    }

    /// Number of relays seen for `name`.
    pub fn calls_for(&self, name: &str) -> usize {
        let name = Name::from_str(name).unwrap();
        self.0.lock().queried.iter().filter(|n| **n == name).count()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn send(&self, request: &DnsRequest) -> Result<DnsResponse, UpstreamError> {
        let behavior = {
            let mut state = self.0.lock();
            if let Some(query) = request.queries().first() {
                state.queried.push(query.name().clone());
            }
            state.behavior
        };

        let mut response = response_to(request);
        match behavior {
            Behavior::Answer => {
                let name = request.queries()[0].name().clone();
                response.add_answer(Record::from_rdata(name, 60, RData::A(A::new(192, 0, 2, 7))));
            }
            Behavior::NoData => {
                response.add_name_server(soa_record());
            }
            Behavior::Empty => (),
            Behavior::Rcode(code) => {
                response.set_response_code(code);
            }
            Behavior::Fail => {
                return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into())
            }
            Behavior::Panic => panic!("relay blew up"),
        }
        Ok(response)
    }
}

pub fn query(name: &str) -> Message {
    build_message(Query::query(Name::from_str(name).unwrap(), RecordType::A))
}

pub fn soa_record() -> Record {
    Record::from_rdata(
        Name::from_str("example.com.").unwrap(),
        3600,
        RData::SOA(SOA::new(
            Name::from_str("ns1.example.com.").unwrap(),
            Name::from_str("hostmaster.example.com.").unwrap(),
            1,
            3600,
            600,
            86400,
            300,
        )),
    )
}
