use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub use crate::config::*;
use crate::log::{debug, info, warn, Level};

/// Everything read from a configuration file.
#[derive(Debug, Default)]
pub struct RuntimeConfig {
    log_level: Option<Level>,
    log_filter: Option<String>,
    resolvers: Vec<NamedOptions>,
    zone_providers: Vec<NamedOptions>,
}

impl RuntimeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        debug!("loading configuration from {:?}", path);

        let reader = BufReader::new(File::open(path)?);
        let mut cfg = Self::default();
        for line in reader.lines() {
            cfg.config(line?.as_str());
        }
        Ok(cfg)
    }

    pub fn load_from_str(text: &str) -> Self {
        let mut cfg = Self::default();
        for line in text.lines() {
            cfg.config(line);
        }
        cfg
    }

    pub fn config(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }

        match parse_config(line) {
            Ok((rest, item)) => {
                if !rest.trim().is_empty() {
                    warn!("ignoring trailing {:?} in config line {:?}", rest, line);
                }
                match item {
                    OneConfig::LogLevel(v) => self.log_level = Some(v),
                    OneConfig::LogFilter(v) => self.log_filter = Some(v),
                    OneConfig::Resolver(v) => self.add_named(v, Kind::Resolver),
                    OneConfig::ZoneProvider(v) => self.add_named(v, Kind::ZoneProvider),
                }
            }
            Err(err) => {
                warn!("unrecognized config line {:?}, {}", line, err);
            }
        }
    }

    fn add_named(&mut self, item: NamedOptions, kind: Kind) {
        let list = match kind {
            Kind::Resolver => &mut self.resolvers,
            Kind::ZoneProvider => &mut self.zone_providers,
        };
        if list.iter().any(|i| i.name == item.name) {
            warn!("duplicate {} {}, ignoring the later one", kind, item.name);
            return;
        }
        list.push(item);
    }

    #[inline]
    pub fn log_level(&self) -> Option<Level> {
        self.log_level
    }

    #[inline]
    pub fn log_filter(&self) -> Option<&str> {
        self.log_filter.as_deref()
    }

    #[inline]
    pub fn resolvers(&self) -> &[NamedOptions] {
        &self.resolvers
    }

    #[inline]
    pub fn zone_providers(&self) -> &[NamedOptions] {
        &self.zone_providers
    }

    /// Makes every resolver forward over TCP.
    pub fn force_tcp(&mut self) {
        for resolver in self.resolvers.iter_mut() {
            resolver.options.push(("tcp".to_string(), Some("yes".to_string())));
        }
    }

    /// Print the config summary.
    pub fn summary(&self) {
        for resolver in self.resolvers.iter() {
            info!(
                "resolver {}: server {}",
                resolver.name,
                resolver.get("server").unwrap_or("<unset>")
            );
        }

        for provider in self.zone_providers.iter() {
            info!(
                "zone provider {}: driver {}",
                provider.name,
                provider.get("driver").unwrap_or("<unset>")
            );
        }

        if self.resolvers.is_empty() {
            info!("no forwarding resolvers configured");
        }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Resolver,
    ZoneProvider,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Resolver => write!(f, "resolver"),
            Kind::ZoneProvider => write!(f, "zone-provider"),
        }
    }
}
