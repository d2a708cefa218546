use camino::Utf8Path;
use config::{Config, ConfigBuilder, ConfigError, FileFormat};
use config::builder::DefaultState;

pub use hdg_api::config::*;

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("boiler.name", "HDG Boiler")?
        .set_default("boiler.timeout_secs", 15)?
        .set_default("server.ipaddress", "0.0.0.0")?
        .set_default("server.http_port", 8080)
}

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = with_defaults()?
        .add_source(config::File::with_name(filename.as_str()))
        .build()?;

    settings.try_deserialize()
}

pub fn parse_str(yaml: &str) -> Result<AppConfig, ConfigError> {
    let settings = with_defaults()?
        .add_source(config::File::from_str(yaml, FileFormat::Yaml))
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::config::parse_str;

    #[test]
    fn minimal_config() {
        let config = parse_str("boiler:\n  url: http://10.0.0.5\n").unwrap();
        assert_eq!(config.boiler.name, "HDG Boiler");
        assert_eq!(config.boiler.timeout_secs, 15);
        assert_eq!(config.boiler.url.as_str(), "http://10.0.0.5/");
        assert_eq!(config.server.ipaddress, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.polling.failure_threshold, 3);
        assert_eq!(config.setter.debounce_ms, 2000);
    }

    #[test]
    fn missing_url_is_an_error() {
        assert!(parse_str("boiler:\n  name: Keller\n").is_err());
    }
}
