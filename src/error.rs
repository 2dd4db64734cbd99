/// Fatal problems found while turning configuration into running components.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no server set for resolver {0}")]
    MissingServer(String),
    #[error("no driver set for zone provider {0}")]
    MissingDriver(String),
    #[error("zone provider {provider}: unsupported driver {driver}")]
    UnsupportedDriver { provider: String, driver: String },
    #[error("no url set for zone provider {0}")]
    MissingUrl(String),
}
