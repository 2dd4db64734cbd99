use super::{SecondaryZone, Zone};

/// A source of zones.
///
/// Reads return `None` when the backing store could not be read this time.
/// Callbacks never fail; problems are logged and the call is dropped.
#[async_trait::async_trait]
pub trait ZoneProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn primary_zones(&self) -> Option<Vec<Zone>>;

    /// Secondary zones, with the stored copy attached when one exists.
    async fn secondary_zones(&self) -> Option<Vec<SecondaryZone>>;

    /// A transfer produced new content for `zone`; replace what is stored.
    async fn zone_updated(&self, zone: &SecondaryZone);

    /// A transfer found `zone` unchanged; refresh its metadata only.
    async fn zone_checked(&self, zone: &SecondaryZone);

    async fn unload(&self) {}
}
