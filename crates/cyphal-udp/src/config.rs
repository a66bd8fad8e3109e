//! Transport configuration.
//!
//! The engine never reads files or the environment on its own. A caller that
//! wants file-based configuration loads a [`TransportConfig`] explicitly and
//! hands it to `Instance::from_config` / `TxQueue::from_config`.
//!
//! ```toml
//! [node]
//! id = 42
//! local_ip_addr = "192.168.1.10"
//!
//! [tx]
//! mtu_bytes = 1408
//! queue_capacity = 1024
//!
//! [rx]
//! transfer_id_timeout_usec = 2000000
//! verify_header_crc = false
//! ```

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::wire::{DEFAULT_TRANSFER_ID_TIMEOUT_USEC, HEADER_SIZE, MTU_MAX, NODE_ID_MAX};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub node: NodeConfig,
    pub tx: TxConfig,
    pub rx: RxConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Local node-ID. Absent = anonymous.
    pub id: Option<u16>,
    /// Local interface address; its upper 16 bits prefix the source route.
    pub local_ip_addr: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    /// Frame size including the header. Values above 1408 are clamped.
    pub mtu_bytes: usize,
    /// Maximum number of frames held in the queue.
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RxConfig {
    /// Transfer-ID timeout for the caller to pass to `rx_subscribe`; exposed
    /// as `Instance::default_transfer_id_timeout_usec`, never applied
    /// implicitly.
    pub transfer_id_timeout_usec: u64,
    /// Drop frames whose header CRC does not match.
    pub verify_header_crc: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            local_ip_addr: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            mtu_bytes: MTU_MAX,
            queue_capacity: 1024,
        }
    }
}

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            transfer_id_timeout_usec: DEFAULT_TRANSFER_ID_TIMEOUT_USEC,
            verify_header_crc: false,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TransportConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: TransportConfig =
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            node_id = ?config.node.id,
            "transport config loaded"
        );
        Ok(config)
    }

    /// Parse and validate config text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: TransportConfig = toml::from_str(text)
            .map_err(|e| ConfigError::ParseFailed(PathBuf::from("<string>"), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = self.node.id {
            if id > NODE_ID_MAX {
                return Err(ConfigError::Invalid(format!("node.id {id} exceeds {NODE_ID_MAX}")));
            }
        }
        if self.tx.mtu_bytes <= HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "tx.mtu_bytes {} must exceed the {HEADER_SIZE}-byte header",
                self.tx.mtu_bytes
            )));
        }
        Ok(())
    }
}
