use std::fmt;
use std::str::FromStr;

use crate::config::NamedOptions;
use crate::error::ConfigError;
use crate::log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
}

impl FromStr for Driver {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            _ => Err(()),
        }
    }
}

/// Connection settings of one database zone provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ZoneStoreConfig {
    pub name: String,
    pub driver: Driver,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ZoneStoreConfig {
    pub fn sqlite<N: Into<String>, U: Into<String>>(name: N, url: U) -> Self {
        Self {
            name: name.into(),
            driver: Driver::Sqlite,
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn from_options(item: &NamedOptions) -> Result<Self, ConfigError> {
        let name = item.name.clone();

        let driver = item
            .get("driver")
            .ok_or_else(|| ConfigError::MissingDriver(name.clone()))?;
        let driver = driver
            .parse::<Driver>()
            .map_err(|_| ConfigError::UnsupportedDriver {
                provider: name.clone(),
                driver: driver.to_string(),
            })?;

        let url = item
            .get("url")
            .ok_or_else(|| ConfigError::MissingUrl(name.clone()))?
            .to_string();

        for (key, _) in item.options.iter() {
            if !["driver", "url", "username", "password"]
                .iter()
                .any(|k| k.eq_ignore_ascii_case(key))
            {
                warn!("zone provider {}: unknown option {}", name, key);
            }
        }

        Ok(Self {
            driver,
            url,
            username: item.get("username").map(ToString::to_string),
            password: item.get("password").map(ToString::to_string),
            name,
        })
    }
}

impl fmt::Debug for ZoneStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneStoreConfig")
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NomParser;

    fn options(line: &str) -> NamedOptions {
        NamedOptions::parse(line).unwrap().1
    }

    #[test]
    fn test_from_options() {
        let cfg = ZoneStoreConfig::from_options(&options(
            "db -driver SQLite -url sqlite://zones.db -username dns -password secret",
        ))
        .unwrap();

        assert_eq!(cfg.driver, Driver::Sqlite);
        assert_eq!(cfg.url, "sqlite://zones.db");
        assert_eq!(cfg.username.as_deref(), Some("dns"));
        assert!(!format!("{:?}", cfg).contains("secret"));
    }

    #[test]
    fn test_unsupported_driver() {
        let err = ZoneStoreConfig::from_options(&options(
            "db -driver com.mysql.jdbc.Driver -url mysql://localhost/dns",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDriver { driver, .. } if driver == "com.mysql.jdbc.Driver"));
    }

    #[test]
    fn test_missing_driver_and_url() {
        assert!(matches!(
            ZoneStoreConfig::from_options(&options("db -url sqlite://zones.db")),
            Err(ConfigError::MissingDriver(_))
        ));
        assert!(matches!(
            ZoneStoreConfig::from_options(&options("db -driver sqlite")),
            Err(ConfigError::MissingUrl(_))
        ));
    }
}
