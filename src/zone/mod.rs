mod manager;
mod model;
mod provider;
mod providers;
mod secondary;

pub use manager::{ZoneManager, ZoneResolver};
pub use model::{Zone, ZoneError, ZoneKind};
pub use provider::ZoneProvider;
pub use providers::{DbZoneProvider, ZoneStoreConfig};
pub use secondary::{SecondaryZone, ZoneSource};

#[cfg(test)]
pub(crate) use model::fixtures;
