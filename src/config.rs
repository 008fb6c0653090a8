// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

//! Client configuration.
//!
//! Values come from three layers, each overriding the one before: built-in defaults, an
//! optional configuration file, and options given on the command line.

use std::convert::TryFrom;
use std::time::Duration;

use crate::ntp::client::parse_source;
use crate::ntp::protocol::NTP_CURRENT_VERSION;

const DEFAULT_TIMEOUT_SECS: i64 = 1;
const DEFAULT_ATTEMPTS: i64 = 1;

/// Settings that can be given both in the file and on the command line, as pairs of setting key
/// and argument name.
const OVERRIDABLE_KEYS: [(&str, &str); 3] = [
    ("version", "ntp_version"),
    ("timeout", "timeout"),
    ("attempts", "attempts"),
];

/// Configuration for querying an NTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Protocol version written into the request.
    pub version: u8,
    /// How long each attempt waits for a reply.
    pub timeout: Duration,
    /// Maximum number of requests sent before giving up.
    pub attempts: u32,
}

fn message(text: &str) -> config::ConfigError {
    config::ConfigError::Message(String::from(text))
}

/// Create a settings object holding only the built-in defaults.
pub fn default_settings() -> Result<config::Config, config::ConfigError> {
    let mut settings = config::Config::new();
    settings.set_default("version", i64::from(NTP_CURRENT_VERSION))?;
    settings.set_default("timeout", DEFAULT_TIMEOUT_SECS)?;
    settings.set_default("attempts", DEFAULT_ATTEMPTS)?;
    Ok(settings)
}

impl ClientConfig {
    /// Build a config from command-line arguments.
    ///
    /// # Errors
    ///
    /// Anything returned by [`ClientConfig::from_settings`], plus whatever the `config` crate
    /// reports when the file named by `--file` can't be read or parsed.
    pub fn from_matches<'a>(
        matches: &clap::ArgMatches<'a>,
    ) -> Result<ClientConfig, config::ConfigError> {
        let mut settings = default_settings()?;

        if let Some(filename) = matches.value_of("configfile") {
            settings.merge(config::File::with_name(filename))?;
        }

        for (key, arg) in OVERRIDABLE_KEYS.iter() {
            if let Some(value) = matches.value_of(arg) {
                settings.set(key, value)?;
            }
        }

        // `source` is a required argument, clap refuses to go on without it.
        let source = matches.value_of("source").unwrap_or_default();
        ClientConfig::from_settings(source, &settings)
    }

    /// Build a config for `source` (`host[:port]`) from already merged settings.
    ///
    /// # Errors
    ///
    /// `config::ConfigError::Message` when the port in `source` is not a valid `u16`, when the
    /// version doesn't fit in 3 bits, or when the timeout or the number of attempts is not a
    /// positive number.
    ///
    /// Type errors from the `config` crate when a value is not an integer at all.
    pub fn from_settings(
        source: &str,
        settings: &config::Config,
    ) -> Result<ClientConfig, config::ConfigError> {
        let (host, port) = match parse_source(source) {
            Ok(val) => val,
            Err(err) => {
                return Err(config::ConfigError::Message(format!(
                    "invalid port in source `{}`: {}",
                    source, err
                )))
            }
        };
        if host.is_empty() {
            return Err(message("the source address has no host"));
        }

        let version = match u8::try_from(settings.get_int("version")?) {
            Ok(val) if val <= 7 => val,
            _ => return Err(message("the NTP version must be between 0 and 7")),
        };

        let timeout = match u64::try_from(settings.get_int("timeout")?) {
            Ok(val) if val > 0 => Duration::from_secs(val),
            _ => return Err(message("the timeout must be a positive number of seconds")),
        };

        let attempts = match u32::try_from(settings.get_int("attempts")?) {
            Ok(val) if val > 0 => val,
            _ => return Err(message("the number of attempts must be positive")),
        };

        Ok(ClientConfig {
            host,
            port,
            version,
            timeout,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from(toml: &str) -> config::Config {
        let mut settings = default_settings().unwrap();
        settings
            .merge(config::File::from_str(toml, config::FileFormat::Toml))
            .unwrap();
        settings
    }

    #[test]
    fn test_defaults() {
        let settings = default_settings().unwrap();
        let config = ClientConfig::from_settings("pool.ntp.org", &settings).unwrap();
        assert_eq!(
            config,
            ClientConfig {
                host: String::from("pool.ntp.org"),
                port: 123,
                version: 4,
                timeout: Duration::from_secs(1),
                attempts: 1,
            }
        );
    }

    #[test]
    fn test_file_values() {
        let settings = settings_from("version = 3\ntimeout = 5\nattempts = 4\n");
        let config = ClientConfig::from_settings("10.0.0.1:1123", &settings).unwrap();
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 1123);
        assert_eq!(config.version, 3);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.attempts, 4);
    }

    #[test]
    fn test_command_line_overrides_file() {
        let mut settings = settings_from("attempts = 4\n");
        settings.set("attempts", "2").unwrap();
        let config = ClientConfig::from_settings("10.0.0.1", &settings).unwrap();
        assert_eq!(config.attempts, 2);
    }

    #[test]
    fn test_invalid_values() {
        for toml in &["version = 8", "version = -1", "timeout = 0", "attempts = 0"] {
            let settings = settings_from(toml);
            match ClientConfig::from_settings("10.0.0.1", &settings) {
                Err(config::ConfigError::Message(_)) => {}
                other => panic!("{}: expected a message error, got {:?}", toml, other),
            }
        }
    }

    #[test]
    fn test_invalid_source() {
        let settings = default_settings().unwrap();
        for source in &["10.0.0.1:ntp", "127.0.0.1:1:2", "10.0.0.1:70000"] {
            match ClientConfig::from_settings(source, &settings) {
                Err(config::ConfigError::Message(text)) => {
                    assert!(text.starts_with("invalid port in source"), "{}", text);
                    assert!(text.contains(source), "{}", text);
                }
                other => panic!("{}: expected a message error, got {:?}", source, other),
            }
        }
        assert!(ClientConfig::from_settings(":123", &settings).is_err());
    }

    #[test]
    fn test_from_matches() {
        let matches = crate::cmd::create_clap_command()
            .get_matches_from(vec!["ntp-probe", "-a", "3", "-v", "2", "127.0.0.1:1234"]);
        let config = ClientConfig::from_matches(&matches).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 1234);
        assert_eq!(config.version, 2);
        assert_eq!(config.attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }
}
