use std::sync::Arc;

use futures::future::join_all;

use super::{Zone, ZoneProvider};
use crate::dns::{DNSClass, DnsRequest, DnsResponse, Name};
use crate::log::{info, warn};
use crate::resolver::Resolver;

#[derive(Default)]
pub struct ZoneManager {
    providers: Vec<Arc<dyn ZoneProvider>>,
}

impl ZoneManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider<P: ZoneProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn providers(&self) -> &[Arc<dyn ZoneProvider>] {
        &self.providers
    }

    /// Collects primary zones and stored secondary copies from every provider.
    pub async fn load(&self) -> ZoneResolver {
        let loaded = join_all(self.providers.iter().map(|p| load_provider(p.as_ref()))).await;

        ZoneResolver::new(loaded.into_iter().flatten().collect())
    }

    pub async fn unload(&self) {
        for provider in &self.providers {
            provider.unload().await;
        }
    }
}

async fn load_provider(provider: &dyn ZoneProvider) -> Vec<Zone> {
    let mut zones = match provider.primary_zones().await {
        Some(zones) => zones,
        None => {
            warn!("no primary zones from zone provider {} this time", provider.name());
            Vec::new()
        }
    };
    let primaries = zones.len();

    match provider.secondary_zones().await {
        Some(secondaries) => {
            let total = secondaries.len();
            zones.extend(
                secondaries
                    .into_iter()
                    .filter_map(|z| z.zone_copy().cloned()),
            );
            info!(
                "zone provider {}: {} primary zones, {} secondary zones ({} with stored data)",
                provider.name(),
                primaries,
                total,
                zones.len() - primaries
            );
        }
        None => {
            warn!("no secondary zones from zone provider {} this time", provider.name());
        }
    }

    zones
}

/// Answers from loaded zones, most specific origin first.
pub struct ZoneResolver {
    zones: Vec<Zone>,
}

impl ZoneResolver {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Most specific zone of `class` containing `name`.
    fn find(&self, name: &Name, class: DNSClass) -> Option<&Zone> {
        self.zones
            .iter()
            .filter(|z| z.class() == class && z.is_authoritative_for(name))
            .max_by_key(|z| z.origin().num_labels())
    }
}

#[async_trait::async_trait]
impl Resolver for ZoneResolver {
    fn name(&self) -> &str {
        "zones"
    }

    async fn generate_reply(&self, request: &DnsRequest) -> Option<DnsResponse> {
        let query = request.queries().first()?;
        let zone = self.find(query.name(), query.query_class())?;
        Some(zone.answer(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{build_message, DNSClass, RecordType, ResponseCode};
    use crate::libdns::proto::op::Query;
    use crate::zone::model::fixtures::*;
    use crate::zone::{SecondaryZone, ZoneKind};
    use parking_lot::Mutex;

    struct StaticProvider {
        primaries: Option<Vec<Zone>>,
        secondaries: Vec<SecondaryZone>,
        unloaded: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl ZoneProvider for Arc<StaticProvider> {
        fn name(&self) -> &str {
            "static"
        }

        async fn primary_zones(&self) -> Option<Vec<Zone>> {
            self.primaries.clone()
        }

        async fn secondary_zones(&self) -> Option<Vec<SecondaryZone>> {
            Some(self.secondaries.clone())
        }

        async fn zone_updated(&self, _zone: &SecondaryZone) {}

        async fn zone_checked(&self, _zone: &SecondaryZone) {}

        async fn unload(&self) {
            *self.unloaded.lock() = true;
        }
    }

    fn sub_zone() -> Zone {
        Zone::new(
            name("sub.example.com."),
            DNSClass::IN,
            ZoneKind::Primary,
            vec![soa("sub.example.com.", 5), a("www.sub.example.com.", 5)],
        )
        .unwrap()
    }

    fn secondary(with_copy: bool) -> SecondaryZone {
        let mut zone = SecondaryZone::new(name("example.org."), "192.0.2.53", DNSClass::IN);
        if with_copy {
            zone.set_zone_copy(
                Zone::new(
                    name("example.org."),
                    DNSClass::IN,
                    ZoneKind::Secondary {
                        primary_dns: "192.0.2.53".to_string(),
                        downloaded: None,
                    },
                    vec![soa("example.org.", 1), a("www.example.org.", 3)],
                )
                .unwrap(),
            );
        }
        zone
    }

    fn ask(qname: &str) -> DnsRequest {
        build_message(Query::query(name(qname), RecordType::A))
    }

    #[tokio::test]
    async fn test_load_and_resolve() {
        let provider = Arc::new(StaticProvider {
            primaries: Some(vec![example_zone(ZoneKind::Primary, 1), sub_zone()]),
            secondaries: vec![secondary(true), secondary(false)],
            unloaded: Mutex::new(false),
        });
        let manager = ZoneManager::new().with_provider(provider.clone());

        let resolver = manager.load().await;
        assert_eq!(resolver.zones().len(), 3);

        let response = resolver.generate_reply(&ask("www.sub.example.com.")).await.unwrap();
        assert_eq!(response.answers(), &[a("www.sub.example.com.", 5)]);

        let response = resolver.generate_reply(&ask("www.example.org.")).await.unwrap();
        assert_eq!(response.answers(), &[a("www.example.org.", 3)]);

        let response = resolver.generate_reply(&ask("nope.example.com.")).await.unwrap();
        assert_eq!(response.response_code(), ResponseCode::NXDomain);

        assert!(resolver.generate_reply(&ask("www.example.net.")).await.is_none());

        manager.unload().await;
        assert!(*provider.unloaded.lock());
    }

    #[tokio::test]
    async fn test_unreadable_primaries_still_load_secondaries() {
        let manager = ZoneManager::new().with_provider(Arc::new(StaticProvider {
            primaries: None,
            secondaries: vec![secondary(true)],
            unloaded: Mutex::new(false),
        }));

        let resolver = manager.load().await;
        assert_eq!(resolver.zones().len(), 1);
        assert_eq!(manager.providers().len(), 1);
    }

    #[tokio::test]
    async fn test_other_class_subzone_does_not_hide_parent() {
        let chaos_sub = Zone::new(
            name("sub.example.com."),
            DNSClass::CH,
            ZoneKind::Primary,
            vec![soa("sub.example.com.", 7)],
        )
        .unwrap();
        let resolver = ZoneResolver::new(vec![example_zone(ZoneKind::Primary, 1), chaos_sub]);

        let response = resolver.generate_reply(&ask("www.sub.example.com.")).await.unwrap();
        assert_eq!(response.response_code(), ResponseCode::NXDomain);
        assert_eq!(
            resolver.find(&name("www.sub.example.com."), DNSClass::IN).unwrap().origin(),
            &name("example.com.")
        );
        assert_eq!(
            resolver.find(&name("www.sub.example.com."), DNSClass::CH).unwrap().origin(),
            &name("sub.example.com.")
        );
    }
}
