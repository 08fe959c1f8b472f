use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use rendezvous_base::pal::http::HttpServerConfig;
use rendezvous_base::{PalHandle, RendezvousError, RendezvousResult, ResultExt};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Configuration for a rendezvous server.
///
/// Every field is optional in the TOML file; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendezvousConfig {
    /// Address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Remove entries registered longer ago than this many seconds. Unset keeps entries forever.
    pub idle_expiry_secs: Option<u64>,
    /// How often the idle sweep runs when expiry is enabled.
    pub sweep_interval_secs: u64,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            idle_expiry_secs: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl RendezvousConfig {
    /// Parse a TOML document.
    pub fn from_toml(source: &str) -> RendezvousResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| {
            Box::new(RendezvousError::message(format!(
                "Invalid configuration: {}",
                e
            )))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RendezvousResult<()> {
        if self.host.is_empty() {
            return Err(Box::new(RendezvousError::invalid_input("host must not be empty")));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Box::new(RendezvousError::invalid_input(
                "sweep_interval_secs must be at least 1",
            )));
        }
        Ok(())
    }

    /// The idle limit, if expiry is enabled.
    pub fn idle_expiry(&self) -> Option<Duration> {
        self.idle_expiry_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Settings for the HTTP listener.
    pub fn http_server_config(&self) -> HttpServerConfig {
        HttpServerConfig::new(self.host.clone()).with_port(self.port)
    }
}

/// Load configuration from a TOML file via the PAL.
pub fn load_config(pal: &PalHandle, path: &Path) -> RendezvousResult<RendezvousConfig> {
    let source = pal.read_file_to_string(path)?;
    RendezvousConfig::from_toml(&source)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_base::{ErrorKind, MockPal};

    #[test]
    fn test_defaults() {
        let config = RendezvousConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.idle_expiry(), None);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.http_server_config().address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(
            RendezvousConfig::from_toml("").unwrap(),
            RendezvousConfig::default()
        );
    }

    #[test]
    fn test_partial_file() {
        let config = RendezvousConfig::from_toml("port = 8080\nidle_expiry_secs = 600\n").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.idle_expiry(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(RendezvousConfig::from_toml("hostname = \"x\"").is_err());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let err = RendezvousConfig::from_toml("sweep_interval_secs = 0").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInput { .. }));
    }

    #[test]
    fn test_load_config_through_pal() {
        let mock = MockPal::new();
        mock.add_file("rendezvous.toml", "host = \"0.0.0.0\"\nport = 4000\n");
        let pal = PalHandle::new(mock);

        let config = load_config(&pal, Path::new("rendezvous.toml")).unwrap();
        assert_eq!(config.http_server_config().address(), "0.0.0.0:4000");
    }

    #[test]
    fn test_load_config_reports_path() {
        let mock = MockPal::new();
        mock.add_file("rendezvous.toml", "port = \"not a number\"");
        let pal = PalHandle::new(mock);

        let err = load_config(&pal, Path::new("rendezvous.toml")).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Failed to load configuration from rendezvous.toml: Invalid configuration:")
        );
    }
}
