use std::time::Duration;

use crate::config::{parse_value, NamedOptions};
use crate::dns::Name;
use crate::error::ConfigError;
use crate::log::warn;

pub const DEFAULT_PORT: u16 = 53;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_VALIDATION_QUERY: &str = "google.com.";
pub const DEFAULT_VALIDATION_INTERVAL: Duration = Duration::from_secs(5);

/// Largest accepted `maxerrors`; the error window keeps that many instants.
pub const MAX_ERRORS_LIMIT: u64 = 10_000;

/// Settings of one forwarding resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingResolverConfig {
    /// Resolver name, used in logs
    pub name: String,

    /// Upstream host name or address
    pub server: String,

    /// Upstream port
    pub port: u16,

    /// Relay timeout, `None` means [`DEFAULT_TIMEOUT`]
    pub timeout: Option<Duration>,

    /// Relay over TCP instead of UDP
    pub tcp: bool,

    /// Number of errors tolerated inside the error window
    pub max_errors: Option<usize>,

    /// Length of the error window
    pub error_window: Option<Duration>,

    /// Name queried while the upstream is offline
    pub validation_query: Name,

    /// Pause between two health checks
    pub validation_interval: Duration,
}

impl ForwardingResolverConfig {
    pub fn new<N: Into<String>, S: Into<String>>(name: N, server: S) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            port: DEFAULT_PORT,
            timeout: None,
            tcp: false,
            max_errors: None,
            error_window: None,
            validation_query: default_validation_query(),
            validation_interval: DEFAULT_VALIDATION_INTERVAL,
        }
    }

    /// Reads the options of a `resolver` config line.
    ///
    /// A malformed value is reported and the default kept. Only a missing
    /// `server` is fatal.
    pub fn from_options(item: &NamedOptions) -> Result<Self, ConfigError> {
        let server = item
            .get("server")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingServer(item.name.clone()))?;

        let mut cfg = Self::new(item.name.as_str(), server);

        for (key, value) in item.options.iter() {
            cfg.set(key, value.as_deref());
        }

        Ok(cfg)
    }

    fn set(&mut self, key: &str, value: Option<&str>) {
        let name = self.name.as_str();
        let raw = value.unwrap_or_default();

        match key.to_ascii_lowercase().as_str() {
            "server" => (),
            "port" => match parse_value::<u16>(raw).filter(|p| *p >= 1) {
                Some(port) => self.port = port,
                None => warn!(
                    "resolver {}: invalid port {:?} specified, sticking to {}",
                    name, raw, self.port
                ),
            },
            "timeout" => match positive(raw) {
                Some(secs) => self.timeout = Some(Duration::from_secs(secs)),
                None => warn!("resolver {}: invalid timeout {:?} specified", name, raw),
            },
            "tcp" => match value {
                None => self.tcp = true,
                Some(v) => match parse_value::<bool>(v) {
                    Some(tcp) => self.tcp = tcp,
                    None => warn!("resolver {}: invalid tcp flag {:?} specified", name, v),
                },
            },
            "maxerrors" => match positive(raw)
                .filter(|n| *n <= MAX_ERRORS_LIMIT)
                .and_then(|n| usize::try_from(n).ok())
            {
                Some(n) => self.max_errors = Some(n),
                None => warn!(
                    "resolver {}: invalid max error value {:?} specified, must be 1..={}",
                    name, raw, MAX_ERRORS_LIMIT
                ),
            },
            "errorwindowssize" => match positive(raw) {
                Some(secs) => self.error_window = Some(Duration::from_secs(secs)),
                None => warn!("resolver {}: invalid error window size {:?} specified", name, raw),
            },
            "validationquery" => match Name::from_ascii(raw) {
                Ok(mut query) if !raw.is_empty() => {
                    query.set_fqdn(true);
                    self.validation_query = query;
                }
                _ => warn!("resolver {}: invalid validation query {:?} specified", name, raw),
            },
            "validationinterval" => match positive(raw) {
                Some(secs) => self.validation_interval = Duration::from_secs(secs),
                None => warn!("resolver {}: invalid validation interval {:?} specified", name, raw),
            },
            _ => warn!("resolver {}: unknown option {}", name, key),
        }
    }

    /// Error budget and window, present only when both are configured.
    pub fn failure_detection(&self) -> Option<(usize, Duration)> {
        self.max_errors.zip(self.error_window)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

fn positive(value: &str) -> Option<u64> {
    parse_value::<u64>(value).filter(|v| *v >= 1)
}

fn default_validation_query() -> Name {
    Name::from_ascii(DEFAULT_VALIDATION_QUERY).unwrap_or_else(|_| Name::root())
}
