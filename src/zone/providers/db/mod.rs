mod config;
mod store;

use chrono::Utc;

pub use config::{Driver, ZoneStoreConfig};
pub use store::{StoreError, StoredSecondary, ZoneMeta, ZoneRow, ZoneStore};

use crate::log::{debug, error, info, warn};
use crate::zone::{SecondaryZone, Zone, ZoneProvider, ZoneSource};

/// Zones kept in a SQLite database.
pub struct DbZoneProvider {
    name: String,
    store: ZoneStore,
}

impl DbZoneProvider {
    pub async fn open(cfg: &ZoneStoreConfig) -> Result<Self, StoreError> {
        if cfg.username.is_some() || cfg.password.is_some() {
            debug!(
                "zone provider {}: username and password are not used by {:?}",
                cfg.name, cfg.driver
            );
        }

        let store = match cfg.driver {
            Driver::Sqlite => ZoneStore::open(&cfg.url).await?,
        };

        Ok(Self::new(cfg.name.clone(), store))
    }

    pub fn new<S: Into<String>>(name: S, store: ZoneStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn store(&self) -> &ZoneStore {
        &self.store
    }

    /// Zone id of `zone` if this provider produced the handle.
    fn own_zone_id(&self, zone: &SecondaryZone, operation: &str) -> Option<i64> {
        match zone.source() {
            ZoneSource::Db { provider, zone_id } if *provider == self.name => Some(*zone_id),
            source => {
                warn!(
                    "zone provider {} ignoring {} of zone {} from {:?}",
                    self.name,
                    operation,
                    zone.name(),
                    source
                );
                None
            }
        }
    }

    fn meta(zone: &SecondaryZone) -> ZoneMeta {
        ZoneMeta {
            serial: zone.zone_copy().and_then(Zone::serial),
            downloaded: zone.downloaded().unwrap_or_else(Utc::now),
        }
    }

    fn log_write_error(&self, operation: &str, zone: &SecondaryZone, zone_id: i64, err: StoreError) {
        match err {
            StoreError::ZoneNotFound(_) => warn!(
                "zone provider {}: unable to find secondary zone {} with zone id {}, dropping {}",
                self.name,
                zone.name(),
                zone_id,
                operation
            ),
            err => error!(
                "zone provider {}: {} of zone {} failed: {}",
                self.name,
                operation,
                zone.name(),
                err
            ),
        }
    }
}

#[async_trait::async_trait]
impl ZoneProvider for DbZoneProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn primary_zones(&self) -> Option<Vec<Zone>> {
        match self.store.load_primary_zones().await {
            Ok(zones) => Some(zones),
            Err(err) => {
                error!("zone provider {}: loading primary zones failed: {}", self.name, err);
                None
            }
        }
    }

    async fn secondary_zones(&self) -> Option<Vec<SecondaryZone>> {
        let stored = match self.store.load_secondary_zones().await {
            Ok(stored) => stored,
            Err(err) => {
                error!("zone provider {}: loading secondary zones failed: {}", self.name, err);
                return None;
            }
        };

        let zones = stored
            .into_iter()
            .map(|StoredSecondary { row, copy }| {
                let mut zone = SecondaryZone::with_source(
                    ZoneSource::Db {
                        provider: self.name.clone(),
                        zone_id: row.zone_id,
                    },
                    row.name,
                    row.primary_dns.unwrap_or_default(),
                    row.class,
                );
                if let Some(copy) = copy {
                    zone.set_zone_copy(copy);
                    if let Some(downloaded) = row.downloaded {
                        zone.set_downloaded(downloaded);
                    }
                }
                zone
            })
            .collect();

        Some(zones)
    }

    async fn zone_updated(&self, zone: &SecondaryZone) {
        let Some(zone_id) = self.own_zone_id(zone, "update") else {
            return;
        };

        let copy = match zone.matching_copy() {
            Ok(Some(copy)) => copy,
            Ok(None) => {
                warn!(
                    "zone provider {}: update of zone {} carries no zone data",
                    self.name,
                    zone.name()
                );
                return;
            }
            Err(err) => {
                warn!("zone provider {}: dropping update: {}", self.name, err);
                return;
            }
        };

        match self
            .store
            .replace_zone_contents(zone_id, &Self::meta(zone), copy.records())
            .await
        {
            Ok(()) => info!(
                "zone provider {}: stored {} records of zone {}",
                self.name,
                copy.records().len(),
                zone.name()
            ),
            Err(err) => self.log_write_error("update", zone, zone_id, err),
        }
    }

    async fn zone_checked(&self, zone: &SecondaryZone) {
        let Some(zone_id) = self.own_zone_id(zone, "check") else {
            return;
        };

        match self.store.touch_zone(zone_id, &Self::meta(zone)).await {
            Ok(()) => debug!("zone provider {}: zone {} checked", self.name, zone.name()),
            Err(err) => self.log_write_error("check", zone, zone_id, err),
        }
    }

    async fn unload(&self) {
        self.store.pool().close().await;
        debug!("zone provider {} unloaded", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::store::temp_store;
    use super::*;
    use crate::dns::DNSClass;
    use crate::zone::model::fixtures::*;
    use crate::zone::ZoneKind;
    use chrono::{TimeZone, Utc};

    const PROVIDER: &str = "db";

    fn secondary_kind() -> ZoneKind {
        ZoneKind::Secondary {
            primary_dns: "192.0.2.53".to_string(),
            downloaded: None,
        }
    }

    async fn provider_with_secondary() -> (DbZoneProvider, i64, tempfile::TempDir) {
        let (store, dir) = temp_store().await;
        let zone_id = store.insert_zone(&example_zone(secondary_kind(), 1)).await.unwrap();
        (DbZoneProvider::new(PROVIDER, store), zone_id, dir)
    }

    fn handle(provider: &str, zone_id: i64, serial: u32) -> SecondaryZone {
        let mut zone = SecondaryZone::with_source(
            ZoneSource::Db {
                provider: provider.to_string(),
                zone_id,
            },
            name("example.com."),
            "192.0.2.53",
            DNSClass::IN,
        );
        zone.set_zone_copy(
            Zone::new(
                name("example.com."),
                DNSClass::IN,
                secondary_kind(),
                vec![soa("example.com.", serial), a("www.example.com.", 99)],
            )
            .unwrap(),
        );
        zone.set_downloaded(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        zone
    }

    #[tokio::test]
    async fn test_secondary_zones_attach_stored_copy() {
        let (provider, zone_id, _dir) = provider_with_secondary().await;
        provider
            .store()
            .touch_zone(
                zone_id,
                &ZoneMeta {
                    serial: None,
                    downloaded: Utc.timestamp_millis_opt(42_000).unwrap(),
                },
            )
            .await
            .unwrap();

        let zones = provider.secondary_zones().await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].zone_id(), Some(zone_id));
        assert_eq!(
            zones[0].source(),
            &ZoneSource::Db {
                provider: PROVIDER.to_string(),
                zone_id
            }
        );
        assert_eq!(zones[0].zone_copy().unwrap().serial(), Some(1));
        assert_eq!(zones[0].downloaded().unwrap().timestamp_millis(), 42_000);
        assert!(provider.primary_zones().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zone_updated_replaces_records() {
        let (provider, zone_id, _dir) = provider_with_secondary().await;

        provider.zone_updated(&handle(PROVIDER, zone_id, 2)).await;

        let records = provider.store().load_records(zone_id).await.unwrap();
        assert_eq!(records, vec![soa("example.com.", 2), a("www.example.com.", 99)]);

        let row = provider.store().zone_row(zone_id).await.unwrap().unwrap();
        assert_eq!(row.serial, Some(2));
        assert_eq!(row.downloaded.unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_zone_updated_unknown_id_changes_nothing() {
        let (provider, zone_id, _dir) = provider_with_secondary().await;

        provider.zone_updated(&handle(PROVIDER, zone_id + 1, 2)).await;

        let records = provider.store().load_records(zone_id).await.unwrap();
        assert_eq!(records, example_records(1));
        assert!(provider.store().load_records(zone_id + 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_handles_are_ignored() {
        let (provider, zone_id, _dir) = provider_with_secondary().await;

        let mut detached = SecondaryZone::new(name("example.com."), "192.0.2.53", DNSClass::IN);
        detached.set_zone_copy(handle(PROVIDER, zone_id, 2).zone_copy().cloned().unwrap());

        for zone in [detached, handle("other", zone_id, 2)] {
            provider.zone_updated(&zone).await;
            provider.zone_checked(&zone).await;
        }

        let row = provider.store().zone_row(zone_id).await.unwrap().unwrap();
        assert_eq!(row.serial, Some(1));
        assert_eq!(row.downloaded, None);
        assert_eq!(provider.store().load_records(zone_id).await.unwrap(), example_records(1));
    }

    #[tokio::test]
    async fn test_zone_checked_is_idempotent() {
        let (provider, zone_id, _dir) = provider_with_secondary().await;
        let zone = handle(PROVIDER, zone_id, 1);

        for _ in 0..3 {
            provider.zone_checked(&zone).await;
            assert_eq!(provider.store().load_records(zone_id).await.unwrap(), example_records(1));
        }

        let row = provider.store().zone_row(zone_id).await.unwrap().unwrap();
        assert_eq!(row.downloaded.unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_update_with_mismatched_copy_is_dropped() {
        let (provider, zone_id, _dir) = provider_with_secondary().await;
        let mut zone = handle(PROVIDER, zone_id, 2);
        zone.set_zone_copy(
            Zone::new(
                name("example.org."),
                DNSClass::IN,
                secondary_kind(),
                vec![soa("example.org.", 2)],
            )
            .unwrap(),
        );

        provider.zone_updated(&zone).await;
        assert_eq!(provider.store().load_records(zone_id).await.unwrap(), example_records(1));
    }

    #[tokio::test]
    async fn test_open_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ZoneStoreConfig::sqlite("db", dir.path().join("zones.db").to_str().unwrap());
        cfg.username = Some("dns".to_string());

        let provider = DbZoneProvider::open(&cfg).await.unwrap();
        assert_eq!(provider.name(), "db");
        assert!(provider.primary_zones().await.unwrap().is_empty());
        provider.unload().await;
    }
}
