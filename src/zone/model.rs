use chrono::{DateTime, Utc};

use crate::dns::{response_to, DNSClass, DnsRequest, DnsResponse, Name, RData, Record, RecordType, ResponseCode};
use crate::libdns::proto::{op::Query, rr::rdata::SOA};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ZoneError {
    #[error("record {record} is outside of zone {zone}")]
    RecordOutOfZone { zone: Name, record: Name },
    #[error("zone copy {copy} does not match zone {zone}")]
    ZoneMismatch { zone: Name, copy: Name },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneKind {
    /// Served from local data
    Primary,
    /// Replicated from `primary_dns`, last fetched at `downloaded`
    Secondary {
        primary_dns: String,
        downloaded: Option<DateTime<Utc>>,
    },
}

/// A zone and all of its records.
///
/// Every record name lies at or below the zone origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    id: Option<i64>,
    origin: Name,
    class: DNSClass,
    kind: ZoneKind,
    records: Vec<Record>,
}

impl Zone {
    pub fn new(
        origin: Name,
        class: DNSClass,
        kind: ZoneKind,
        records: Vec<Record>,
    ) -> Result<Self, ZoneError> {
        if let Some(record) = records.iter().find(|r| !origin.zone_of(r.name())) {
            return Err(ZoneError::RecordOutOfZone {
                zone: origin,
                record: record.name().clone(),
            });
        }

        Ok(Self {
            id: None,
            origin,
            class,
            kind,
            records,
        })
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Persistence key, if the zone came from a store.
    #[inline]
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    #[inline]
    pub fn origin(&self) -> &Name {
        &self.origin
    }

    #[inline]
    pub fn class(&self) -> DNSClass {
        self.class
    }

    #[inline]
    pub fn kind(&self) -> &ZoneKind {
        &self.kind
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn soa_record(&self) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.record_type() == RecordType::SOA && r.name() == &self.origin)
    }

    pub fn soa(&self) -> Option<&SOA> {
        self.soa_record()
            .and_then(|r| r.data())
            .and_then(RData::as_soa)
    }

    pub fn serial(&self) -> Option<u32> {
        self.soa().map(SOA::serial)
    }

    #[inline]
    pub fn is_authoritative_for(&self, name: &Name) -> bool {
        self.origin.zone_of(name)
    }

    /// Records answering `query`, falling back to a CNAME at the same name.
    pub fn lookup(&self, query: &Query) -> Vec<&Record> {
        let qname = query.name();
        let qtype = query.query_type();

        let at_name = self.records.iter().filter(|r| r.name() == qname);

        let found = at_name
            .clone()
            .filter(|r| qtype == RecordType::ANY || r.record_type() == qtype)
            .collect::<Vec<_>>();

        if !found.is_empty() || qtype == RecordType::CNAME {
            return found;
        }

        at_name
            .filter(|r| r.record_type() == RecordType::CNAME)
            .collect()
    }

    /// Authoritative reply to the first question of `request`.
    pub fn answer(&self, request: &DnsRequest) -> DnsResponse {
        let mut response = response_to(request);
        response.set_authoritative(true);

        let Some(query) = request.queries().first() else {
            response.set_response_code(ResponseCode::FormErr);
            return response;
        };

        let answers = self.lookup(query);
        if !answers.is_empty() {
            response.add_answers(answers.into_iter().cloned());
            return response;
        }

        let qname = query.name();
        // empty non-terminals exist, they just own no records
        let exists = self.records.iter().any(|r| qname.zone_of(r.name()));
        if !exists {
            response.set_response_code(ResponseCode::NXDomain);
        }

        if let Some(soa) = self.soa_record() {
            response.add_name_server(soa.clone());
        }

        response
    }
}
