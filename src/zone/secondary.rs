use chrono::{DateTime, Utc};

use super::{Zone, ZoneError};
use crate::dns::{DNSClass, Name};

/// Which provider produced a [`SecondaryZone`] handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneSource {
    /// Row `zone_id` of the database provider named `provider`
    Db { provider: String, zone_id: i64 },
    /// Built outside of any provider
    Detached,
}

/// Runtime handle passed between the zone transfer driver and a provider.
#[derive(Debug, Clone)]
pub struct SecondaryZone {
    source: ZoneSource,
    name: Name,
    primary_dns: String,
    class: DNSClass,
    zone_copy: Option<Zone>,
    downloaded: Option<DateTime<Utc>>,
}

impl SecondaryZone {
    pub fn new<S: Into<String>>(name: Name, primary_dns: S, class: DNSClass) -> Self {
        Self::with_source(ZoneSource::Detached, name, primary_dns, class)
    }

    pub fn with_source<S: Into<String>>(
        source: ZoneSource,
        name: Name,
        primary_dns: S,
        class: DNSClass,
    ) -> Self {
        Self {
            source,
            name,
            primary_dns: primary_dns.into(),
            class,
            zone_copy: None,
            downloaded: None,
        }
    }

    #[inline]
    pub fn source(&self) -> &ZoneSource {
        &self.source
    }

    /// Persistence key of the zone, when the handle came from a store.
    pub fn zone_id(&self) -> Option<i64> {
        match &self.source {
            ZoneSource::Db { zone_id, .. } => Some(*zone_id),
            ZoneSource::Detached => None,
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn primary_dns(&self) -> &str {
        &self.primary_dns
    }

    #[inline]
    pub fn class(&self) -> DNSClass {
        self.class
    }

    #[inline]
    pub fn zone_copy(&self) -> Option<&Zone> {
        self.zone_copy.as_ref()
    }

    /// The zone copy, rejected when its origin is not this zone's name.
    pub fn matching_copy(&self) -> Result<Option<&Zone>, ZoneError> {
        match &self.zone_copy {
            Some(copy) if copy.origin() != &self.name => Err(ZoneError::ZoneMismatch {
                zone: self.name.clone(),
                copy: copy.origin().clone(),
            }),
            copy => Ok(copy.as_ref()),
        }
    }

    pub fn set_zone_copy(&mut self, zone: Zone) {
        self.zone_copy = Some(zone);
    }

    #[inline]
    pub fn downloaded(&self) -> Option<DateTime<Utc>> {
        self.downloaded
    }

    pub fn set_downloaded(&mut self, downloaded: DateTime<Utc>) {
        self.downloaded = Some(downloaded);
    }
}
