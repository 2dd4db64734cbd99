use std::sync::Arc;

use anyhow::Context;

use crate::{
    dns::{DnsRequest, DnsResponse},
    dns_conf::RuntimeConfig,
    forward::{ForwardingResolver, ForwardingResolverConfig},
    log::info,
    resolver::ResolverChain,
    zone::{DbZoneProvider, ZoneManager, ZoneResolver, ZoneStoreConfig},
};

/// Zone providers and forwarding resolvers built from one configuration.
pub struct App {
    manager: ZoneManager,
    forwarders: Vec<Arc<ForwardingResolver>>,
    zones: Arc<ZoneResolver>,
    chain: ResolverChain,
}

impl App {
    /// Opens every zone provider, loads the zones once and creates every
    /// forwarding resolver.
    ///
    /// Must run inside a tokio runtime.
    pub async fn build(cfg: &RuntimeConfig) -> anyhow::Result<Self> {
        let mut manager = ZoneManager::new();
        for item in cfg.zone_providers() {
            let provider_cfg = ZoneStoreConfig::from_options(item)?;
            let provider = DbZoneProvider::open(&provider_cfg)
                .await
                .with_context(|| format!("failed to open zone provider {}", provider_cfg.name))?;
            manager = manager.with_provider(provider);
        }

        let forwarders = cfg
            .resolvers()
            .iter()
            .map(|item| {
                ForwardingResolverConfig::from_options(item)
                    .map(|cfg| Arc::new(ForwardingResolver::new(&cfg)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "{} zone providers, {} forwarding resolvers",
            manager.providers().len(),
            forwarders.len()
        );

        let zones = Arc::new(manager.load().await);
        let chain = Self::make_chain(&zones, &forwarders);

        Ok(Self {
            manager,
            forwarders,
            zones,
            chain,
        })
    }

    /// Local zones first, then the forwarders in configuration order.
    fn make_chain(
        zones: &Arc<ZoneResolver>,
        forwarders: &[Arc<ForwardingResolver>],
    ) -> ResolverChain {
        let mut chain = ResolverChain::new().with_resolver(zones.clone());
        for forwarder in forwarders {
            chain = chain.with_resolver(forwarder.clone());
        }
        chain
    }

    pub fn forwarders(&self) -> &[Arc<ForwardingResolver>] {
        &self.forwarders
    }

    /// Zones loaded by [`App::build`].
    pub fn zones(&self) -> &ZoneResolver {
        &self.zones
    }

    pub async fn resolve(&self, request: &DnsRequest) -> Option<DnsResponse> {
        self.chain.resolve(request).await
    }

    pub async fn unload(&self) {
        self.manager.unload().await;
    }
}
