//! Process configuration for both peers
//!
//! Both structs deserialize from JSON with every field optional; the
//! binaries then apply their command-line overrides on top.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_SCALE_FACTOR;
use crate::error::{Error, Result};
use crate::params::SchemeParams;
use crate::pipeline::DEFAULT_SAVINGS_RATE;
use crate::protocol::SessionVariant;
use crate::transport::{TransportLimits, DEFAULT_IO_TIMEOUT, DEFAULT_MAX_FRAME_LEN};

/// Largest scale factor an owner may pick; one unit times a rate of 1.0
/// must still fit the plaintext range at exponent 2.
pub const MAX_SCALE_FACTOR: u64 = 100_000;

/// Named scheme parameter sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamPreset {
    #[default]
    #[serde(rename = "secure-d2048")]
    Secure128D2048,
    #[serde(rename = "insecure-d256")]
    InsecureD256,
}

impl ParamPreset {
    pub fn params(&self) -> SchemeParams {
        match self {
            ParamPreset::Secure128D2048 => SchemeParams::secure_128_d2048(),
            ParamPreset::InsecureD256 => SchemeParams::insecure_d256(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ParamPreset::Secure128D2048 => "secure-d2048",
            ParamPreset::InsecureD256 => "insecure-d256",
        }
    }
}

impl fmt::Display for ParamPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "secure-d2048" => Ok(ParamPreset::Secure128D2048),
            "insecure-d256" => Ok(ParamPreset::InsecureD256),
            other => Err(format!(
                "unknown preset '{}' (expected secure-d2048 or insecure-d256)",
                other
            )),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_IO_TIMEOUT.as_secs()
}

fn default_max_frame_len() -> u64 {
    DEFAULT_MAX_FRAME_LEN
}

fn limits(io_timeout_secs: u64, max_frame_len: u64) -> TransportLimits {
    TransportLimits {
        max_frame_len,
        io_timeout: (io_timeout_secs > 0).then(|| Duration::from_secs(io_timeout_secs)),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Compute-party settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Per-frame read/write deadline; 0 disables it
    pub io_timeout_secs: u64,
    pub max_frame_len: u64,
    pub allowed_variants: Vec<SessionVariant>,
    /// Accept parameter sets marked insecure (tests and demos only)
    pub allow_insecure_params: bool,
    pub savings_rate: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            io_timeout_secs: default_timeout_secs(),
            max_frame_len: default_max_frame_len(),
            allowed_variants: SessionVariant::ALL.to_vec(),
            allow_insecure_params: false,
            savings_rate: DEFAULT_SAVINGS_RATE,
        }
    }
}

impl ServerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn limits(&self) -> TransportLimits {
        limits(self.io_timeout_secs, self.max_frame_len)
    }

    pub fn allows(&self, variant: SessionVariant) -> bool {
        self.allowed_variants.contains(&variant)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_frame_len == 0 {
            return Err(Error::Config("max_frame_len must be positive".into()));
        }
        if self.allowed_variants.is_empty() {
            return Err(Error::Config("allowed_variants is empty".into()));
        }
        if !self.savings_rate.is_finite() || !(0.0..=1.0).contains(&self.savings_rate) {
            return Err(Error::Config(format!(
                "savings_rate {} must lie in [0, 1]",
                self.savings_rate
            )));
        }
        Ok(())
    }
}

/// Data-owner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerConfig {
    pub connect: String,
    pub preset: ParamPreset,
    pub scale_factor: u64,
    pub io_timeout_secs: u64,
    pub max_frame_len: u64,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            connect: "127.0.0.1:8080".to_string(),
            preset: ParamPreset::default(),
            scale_factor: DEFAULT_SCALE_FACTOR,
            io_timeout_secs: default_timeout_secs(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl OwnerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn limits(&self) -> TransportLimits {
        limits(self.io_timeout_secs, self.max_frame_len)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SCALE_FACTOR).contains(&self.scale_factor) {
            return Err(Error::Config(format!(
                "scale_factor {} must lie in [1, {}]",
                self.scale_factor, MAX_SCALE_FACTOR
            )));
        }
        if self.max_frame_len == 0 {
            return Err(Error::Config("max_frame_len must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{ "bind": "127.0.0.1:9000", "allowed_variants": ["budget"] }"#).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.allowed_variants, vec![SessionVariant::Budget]);
        assert_eq!(config.savings_rate, DEFAULT_SAVINGS_RATE);
        assert!(!config.allow_insecure_params);
        assert!(config.allows(SessionVariant::Budget));
        assert!(!config.allows(SessionVariant::Itemized));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = OwnerConfig {
            io_timeout_secs: 0,
            ..OwnerConfig::default()
        };
        assert_eq!(config.limits().io_timeout, None);
        assert_eq!(
            OwnerConfig::default().limits().io_timeout,
            Some(DEFAULT_IO_TIMEOUT)
        );
    }

    #[test]
    fn test_preset_names() {
        assert_eq!("insecure-d256".parse::<ParamPreset>().unwrap(), ParamPreset::InsecureD256);
        assert!("d4096".parse::<ParamPreset>().is_err());
        let config: OwnerConfig = serde_json::from_str(r#"{ "preset": "insecure-d256" }"#).unwrap();
        assert_eq!(config.preset.params(), SchemeParams::insecure_d256());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = ServerConfig {
            savings_rate: 1.5,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = OwnerConfig {
            scale_factor: 0,
            ..OwnerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = OwnerConfig {
            scale_factor: MAX_SCALE_FACTOR + 1,
            ..OwnerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        let config = OwnerConfig {
            scale_factor: 10_000,
            ..OwnerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ServerConfig::from_json_file("/nonexistent/fincrypt.json").unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
