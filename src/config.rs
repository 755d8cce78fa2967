//! Configuration file management for ATS Checker.
//!
//! Settings come from three places, merged with clear precedence:
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (`ats_checker.toml` or specified with `--config`)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! insecure = false
//! check_signature = true
//! timeout_secs = 10
//! output = "summary"
//! exit_code = 1
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::ats::Checker;
use crate::report::OutputFormat;
use crate::FetchOptions;

/// Name of the configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ats_checker.toml";

/// Exit code for a run that could not connect at all.
pub const TRANSPORT_FAILURE_EXIT_CODE: i32 = 2;

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Skip certificate and hostname verification
    pub insecure: Option<bool>,
    /// Require an acceptable leaf certificate signature algorithm
    pub check_signature: Option<bool>,
    /// Connect, read and write timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Extra CA bundle (PEM) used to verify the server
    pub ca_file: Option<String>,
    /// Output format: text, json, summary
    pub output: Option<String>,
    /// Exit code to use when the URL is not acceptable for ATS
    pub exit_code: Option<i32>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus Push Gateway settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    /// Enable prometheus metrics pushing
    pub enabled: Option<bool>,
    /// Prometheus push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

impl Default for Config {
    /// Defaults: strict checking, verification on, 30 second timeout,
    /// text output, exit code 1 on non-compliance, metrics off.
    fn default() -> Self {
        Config {
            insecure: Some(false),
            check_signature: Some(true),
            timeout_secs: Some(30),
            ca_file: None,
            output: Some("text".to_string()),
            exit_code: Some(1),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ats_checker::config::Config;
    /// let config = Config::from_file("ats_checker.toml")?;
    /// # Ok::<(), ats_checker::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// An empty configuration, every field unset.
    pub fn empty() -> Self {
        Config {
            insecure: None,
            check_signature: None,
            timeout_secs: None,
            ca_file: None,
            output: None,
            exit_code: None,
            prometheus: None,
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// ```
    /// # use ats_checker::config::Config;
    /// let mut cli = Config::empty();
    /// cli.insecure = Some(true);
    /// let merged = Config::default().merge_with(cli);
    /// assert_eq!(merged.insecure, Some(true));
    /// assert_eq!(merged.exit_code, Some(1));
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.insecure.is_some() {
            self.insecure = other.insecure;
        }
        if other.check_signature.is_some() {
            self.check_signature = other.check_signature;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.ca_file.is_some() {
            self.ca_file = other.ca_file;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Checks values that TOML alone cannot constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(output) = &self.output {
            OutputFormat::from_str(output).map_err(|_| {
                ConfigError::Validation(format!(
                    "unknown output format '{}', expected text, json or summary",
                    output
                ))
            })?;
        }
        match self.exit_code {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "exit_code 0 is reserved for acceptable URLs".to_string(),
                ))
            }
            Some(TRANSPORT_FAILURE_EXIT_CODE) => {
                return Err(ConfigError::Validation(format!(
                    "exit_code {} is reserved for connection failures",
                    TRANSPORT_FAILURE_EXIT_CODE
                )))
            }
            _ => {}
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.prometheus_enabled() && self.prometheus_address().is_none() {
            return Err(ConfigError::Validation(
                "prometheus is enabled but no address is set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output
            .as_deref()
            .and_then(|o| OutputFormat::from_str(o).ok())
            .unwrap_or(OutputFormat::Text)
    }

    pub fn checker(&self) -> Checker {
        Checker {
            check_signature: self.check_signature.unwrap_or(true),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        let defaults = FetchOptions::default();
        FetchOptions {
            insecure: self.insecure.unwrap_or(defaults.insecure),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            ca_file: self.ca_file.as_ref().map(PathBuf::from),
        }
    }

    pub fn failure_exit_code(&self) -> i32 {
        self.exit_code.unwrap_or(1)
    }

    pub fn prometheus_enabled(&self) -> bool {
        self.prometheus
            .as_ref()
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    pub fn prometheus_address(&self) -> Option<&str> {
        self.prometheus.as_ref().and_then(|p| p.address.as_deref())
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            insecure: Some(false),
            check_signature: Some(true),
            timeout_secs: Some(10),
            ca_file: Some("/etc/ssl/certs/ca-certificates.crt".to_string()),
            output: Some("summary".to_string()),
            exit_code: Some(1),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (invalid values)
    #[error("Validation Error: {0}")]
    Validation(String),
}
