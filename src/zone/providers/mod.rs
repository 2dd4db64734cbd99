mod db;

pub use db::{DbZoneProvider, ZoneStoreConfig};
