//! SQLite persistence of zones and their records.
//!
//! Each record is kept as its wire-format encoding next to indexed lookup
//! columns. Replacing the contents of a zone happens in one transaction.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use crate::dns::{DNSClass, Name, Record};
use crate::libdns::proto::serialize::binary::{BinDecodable, BinEncodable};
use crate::log::{info, warn};
use crate::zone::{Zone, ZoneError, ZoneKind};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("zone {0} not found")]
    ZoneNotFound(i64),
    #[error("zone {zone_id} is malformed: {reason}")]
    InvalidZone { zone_id: i64, reason: String },
    #[error("record {record_id} of zone {zone_id} is malformed: {reason}")]
    InvalidRecord {
        zone_id: i64,
        record_id: i64,
        reason: String,
    },
    #[error(transparent)]
    Zone(#[from] ZoneError),
}

impl StoreError {
    /// Errors limited to one zone's data; the rest of a batch can proceed.
    fn is_malformed(&self) -> bool {
        !matches!(self, StoreError::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A row of the `zones` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRow {
    pub zone_id: i64,
    pub name: Name,
    pub class: DNSClass,
    pub secondary: bool,
    pub primary_dns: Option<String>,
    pub serial: Option<u32>,
    pub downloaded: Option<DateTime<Utc>>,
}

impl ZoneRow {
    fn kind(&self) -> ZoneKind {
        if self.secondary {
            ZoneKind::Secondary {
                primary_dns: self.primary_dns.clone().unwrap_or_default(),
                downloaded: self.downloaded,
            }
        } else {
            ZoneKind::Primary
        }
    }
}

/// Metadata written whenever a secondary zone was updated or checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneMeta {
    pub serial: Option<u32>,
    pub downloaded: DateTime<Utc>,
}

/// A stored secondary zone and, when it has records, its materialized copy.
#[derive(Debug, Clone)]
pub struct StoredSecondary {
    pub row: ZoneRow,
    pub copy: Option<Zone>,
}

pub struct ZoneStore {
    pool: SqlitePool,
}

impl ZoneStore {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens or creates the database at `url`, a sqlite URL or a plain path.
    pub async fn open(url: &str) -> Result<Self> {
        let url = if url.starts_with("sqlite:") {
            url.to_string()
        } else {
            format!("sqlite:{}", url)
        };

        let options = SqliteConnectOptions::from_str(&url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.create_tables().await?;
        info!("zone store opened at {}", url);
        Ok(store)
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS zones (
                zone_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                dclass TEXT NOT NULL DEFAULT 'IN',
                secondary BOOLEAN NOT NULL DEFAULT 0,
                primary_dns TEXT,
                serial INTEGER,
                downloaded INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_zones_secondary ON zones(secondary)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                record_id INTEGER PRIMARY KEY AUTOINCREMENT,
                zone_id INTEGER NOT NULL REFERENCES zones(zone_id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                rtype TEXT NOT NULL,
                dclass TEXT NOT NULL,
                ttl INTEGER NOT NULL,
                data BLOB NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_zone ON records(zone_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn zone_row(&self, zone_id: i64) -> Result<Option<ZoneRow>> {
        let row = sqlx::query(
            "SELECT zone_id, name, dclass, secondary, primary_dns, serial, downloaded \
             FROM zones WHERE zone_id = ?",
        )
        .bind(zone_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_zone_row).transpose()
    }

    async fn zone_rows(&self, secondary: bool) -> Result<Vec<SqliteRow>> {
        let rows = sqlx::query(
            "SELECT zone_id, name, dclass, secondary, primary_dns, serial, downloaded \
             FROM zones WHERE secondary = ? ORDER BY zone_id",
        )
        .bind(secondary)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All records of `zone_id` in insertion order.
    pub async fn load_records(&self, zone_id: i64) -> Result<Vec<Record>> {
        let rows = sqlx::query("SELECT record_id, data FROM records WHERE zone_id = ? ORDER BY record_id")
            .bind(zone_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let record_id: i64 = row.try_get("record_id")?;
                let data: Vec<u8> = row.try_get("data")?;
                Record::from_bytes(&data).map_err(|e| StoreError::InvalidRecord {
                    zone_id,
                    record_id,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    async fn load_zone(&self, row: &ZoneRow) -> Result<Zone> {
        let records = self.load_records(row.zone_id).await?;
        let zone = Zone::new(row.name.clone(), row.class, row.kind(), records)?;
        Ok(zone.with_id(row.zone_id))
    }

    /// Primary zones with their records. A malformed zone is logged and left out.
    pub async fn load_primary_zones(&self) -> Result<Vec<Zone>> {
        let mut zones = vec![];

        for row in self.zone_rows(false).await? {
            let loaded = match decode_zone_row(&row) {
                Ok(row) => self.load_zone(&row).await,
                Err(err) => Err(err),
            };

            match loaded {
                Ok(zone) => zones.push(zone),
                Err(err) if err.is_malformed() => warn!("skipping primary zone: {}", err),
                Err(err) => return Err(err),
            }
        }

        Ok(zones)
    }

    /// Secondary zones. Those with stored records carry a materialized copy.
    pub async fn load_secondary_zones(&self) -> Result<Vec<StoredSecondary>> {
        let mut zones = vec![];

        for row in self.zone_rows(true).await? {
            let row = match decode_zone_row(&row) {
                Ok(row) => row,
                Err(err) if err.is_malformed() => {
                    warn!("skipping secondary zone: {}", err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            let copy = match self.load_zone(&row).await {
                Ok(zone) if zone.records().is_empty() => None,
                Ok(zone) => Some(zone),
                Err(err) if err.is_malformed() => {
                    warn!("ignoring stored copy of secondary zone {}: {}", row.name, err);
                    None
                }
                Err(err) => return Err(err),
            };

            zones.push(StoredSecondary { row, copy });
        }

        Ok(zones)
    }

    /// Swaps every record of `zone_id` for `records` and refreshes its metadata.
    ///
    /// Either all of it becomes visible or none of it does.
    pub async fn replace_zone_contents(
        &self,
        zone_id: i64,
        meta: &ZoneMeta,
        records: &[Record],
    ) -> Result<()> {
        let encoded = records
            .iter()
            .map(|r| encode_record(zone_id, r))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;

        update_meta(&mut tx, zone_id, meta).await?;

        sqlx::query("DELETE FROM records WHERE zone_id = ?")
            .bind(zone_id)
            .execute(&mut *tx)
            .await?;

        for record in &encoded {
            record.insert(&mut tx, zone_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Refreshes the metadata of `zone_id` without touching its records.
    pub async fn touch_zone(&self, zone_id: i64, meta: &ZoneMeta) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_meta(&mut tx, zone_id, meta).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Stores `zone` and its records, returning the new zone id.
    pub async fn insert_zone(&self, zone: &Zone) -> Result<i64> {
        let (secondary, primary_dns, downloaded) = match zone.kind() {
            ZoneKind::Primary => (false, None, None),
            ZoneKind::Secondary {
                primary_dns,
                downloaded,
            } => (true, Some(primary_dns.clone()), downloaded.map(|d| d.timestamp_millis())),
        };

        let mut tx = self.pool.begin().await?;

        let zone_id = sqlx::query(
            "INSERT INTO zones (name, dclass, secondary, primary_dns, serial, downloaded) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(zone.origin().to_string())
        .bind(zone.class().to_string())
        .bind(secondary)
        .bind(primary_dns)
        .bind(zone.serial().map(i64::from))
        .bind(downloaded)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for record in zone.records() {
            encode_record(zone_id, record)?.insert(&mut tx, zone_id).await?;
        }

        tx.commit().await?;
        Ok(zone_id)
    }

    /// Appends one record to `zone_id` without any zone consistency check.
    pub async fn insert_record(&self, zone_id: i64, record: &Record) -> Result<i64> {
        let encoded = encode_record(zone_id, record)?;
        let mut conn = self.pool.acquire().await?;
        encoded.insert(&mut conn, zone_id).await
    }
}

async fn update_meta(conn: &mut SqliteConnection, zone_id: i64, meta: &ZoneMeta) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE zones SET serial = COALESCE(?, serial), downloaded = ? WHERE zone_id = ?",
    )
    .bind(meta.serial.map(i64::from))
    .bind(meta.downloaded.timestamp_millis())
    .bind(zone_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::ZoneNotFound(zone_id));
    }
    Ok(())
}

struct EncodedRecord {
    name: String,
    rtype: String,
    dclass: String,
    ttl: i64,
    data: Vec<u8>,
}

impl EncodedRecord {
    async fn insert(&self, conn: &mut SqliteConnection, zone_id: i64) -> Result<i64> {
        let record_id = sqlx::query(
            "INSERT INTO records (zone_id, name, rtype, dclass, ttl, data) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(zone_id)
        .bind(&self.name)
        .bind(&self.rtype)
        .bind(&self.dclass)
        .bind(self.ttl)
        .bind(&self.data)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(record_id)
    }
}

fn encode_record(zone_id: i64, record: &Record) -> Result<EncodedRecord> {
    let data = record.to_bytes().map_err(|e| StoreError::InvalidRecord {
        zone_id,
        record_id: 0,
        reason: e.to_string(),
    })?;

    Ok(EncodedRecord {
        name: record.name().to_string(),
        rtype: record.record_type().to_string(),
        dclass: record.dns_class().to_string(),
        ttl: i64::from(record.ttl()),
        data,
    })
}

fn decode_zone_row(row: &SqliteRow) -> Result<ZoneRow> {
    let zone_id: i64 = row.try_get("zone_id")?;
    let invalid = |reason: String| StoreError::InvalidZone { zone_id, reason };

    let name: String = row.try_get("name")?;
    let mut name = Name::from_str(&name).map_err(|e| invalid(e.to_string()))?;
    name.set_fqdn(true);

    let class: String = row.try_get("dclass")?;
    let class = DNSClass::from_str(&class).map_err(|e| invalid(e.to_string()))?;

    let serial = row
        .try_get::<Option<i64>, _>("serial")?
        .map(|s| u32::try_from(s).map_err(|_| invalid(format!("serial {} out of range", s))))
        .transpose()?;

    let downloaded = row
        .try_get::<Option<i64>, _>("downloaded")?
        .map(|ms| {
            Utc.timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| invalid(format!("downloaded {} out of range", ms)))
        })
        .transpose()?;

    Ok(ZoneRow {
        zone_id,
        name,
        class,
        secondary: row.try_get("secondary")?,
        primary_dns: row.try_get("primary_dns")?,
        serial,
        downloaded,
    })
}

#[cfg(test)]
pub(crate) async fn temp_store() -> (ZoneStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.db");
    let store = ZoneStore::open(path.to_str().unwrap()).await.unwrap();
    (store, dir)
}
