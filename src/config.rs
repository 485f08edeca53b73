//! Configuration - connection parameters and destination bindings.
//!
//! Nothing here is interpreted by the pool. [`ConnectionConfig`] describes how
//! a transport should reach the broker; [`DestinationConfig`] lists which
//! message kinds go to which queue or topic, and is applied with
//! [`PoolBuilder::configure`](crate::PoolBuilder::configure).
//!
//! ## Example
//!
//! ```ignore
//! let config: PoolConfig = serde_json::from_str(r#"{
//!     "connection": { "endpoint": "sb://contoso.servicebus.windows.net/" },
//!     "destinations": {
//!         "queues": { "OrderPlaced": { "path": "orders" } },
//!         "topics": { "ForecastUpdated": { "path": "forecasts" } }
//!     }
//! }"#)?;
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::{QueueOptions, RetryPolicy, TopicOptions};

/// Host suffix appended to a bare namespace name.
pub const NAMESPACE_SUFFIX: &str = "servicebus.windows.net";

/// Error type for configuration parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("malformed connection string segment: {0}")]
    MalformedSegment(String),
    #[error("connection string is missing {0}")]
    MissingField(&'static str),
    #[error("unsupported transport type: {0}")]
    UnsupportedTransport(String),
    #[error("invalid configuration document: {0}")]
    Document(String),
}

/// Wire transport between client and broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    #[default]
    Amqp,
    AmqpWebSockets,
}

/// How the client authenticates to the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Token acquired from the host's managed identity.
    #[default]
    ManagedIdentity,
    SharedAccessKey {
        key_name: String,
        key: String,
    },
    SharedAccessSignature {
        token: String,
    },
}

/// Connection parameters handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub endpoint: String,
    #[serde(default)]
    pub credential: Credential,
    #[serde(default)]
    pub transport: TransportMode,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Entity the connection string was scoped to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_path: Option<String>,
}

impl ConnectionConfig {
    /// Connect to `namespace` with the host's managed identity.
    pub fn managed_identity(namespace: &str) -> Self {
        Self {
            endpoint: format!("sb://{}.{}/", namespace, NAMESPACE_SUFFIX),
            credential: Credential::ManagedIdentity,
            transport: TransportMode::default(),
            retry_policy: RetryPolicy::default(),
            entity_path: None,
        }
    }

    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Parse a `Key=Value;` connection string.
    ///
    /// Recognized keys (case-insensitive): `Endpoint`, `SharedAccessKeyName`,
    /// `SharedAccessKey`, `SharedAccessSignature`, `EntityPath`, `TransportType`.
    /// Without key material the credential falls back to managed identity.
    pub fn from_connection_string(input: &str) -> Result<Self, ConfigError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut signature = None;
        let mut entity_path = None;
        let mut transport = TransportMode::default();

        for segment in input.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            // Values (keys, signatures) may themselves contain '='
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedSegment(segment.to_string()))?;
            let value = value.trim().to_string();

            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                "sharedaccesssignature" => signature = Some(value),
                "entitypath" => entity_path = Some(value),
                "transporttype" => {
                    transport = match value.to_ascii_lowercase().as_str() {
                        "amqp" => TransportMode::Amqp,
                        "amqpwebsockets" => TransportMode::AmqpWebSockets,
                        _ => return Err(ConfigError::UnsupportedTransport(value)),
                    }
                }
                _ => {}
            }
        }

        let credential = match (key_name, key, signature) {
            (_, _, Some(token)) => Credential::SharedAccessSignature { token },
            (Some(key_name), Some(key), None) => Credential::SharedAccessKey { key_name, key },
            (Some(_), None, None) => return Err(ConfigError::MissingField("SharedAccessKey")),
            (None, Some(_), None) => return Err(ConfigError::MissingField("SharedAccessKeyName")),
            (None, None, None) => Credential::ManagedIdentity,
        };

        Ok(Self {
            endpoint: endpoint.ok_or(ConfigError::MissingField("Endpoint"))?,
            credential,
            transport,
            retry_policy: RetryPolicy::default(),
            entity_path,
        })
    }

    /// Host name of the endpoint, without scheme or trailing slash.
    pub fn host(&self) -> &str {
        let host = self
            .endpoint
            .split_once("://")
            .map_or(self.endpoint.as_str(), |(_, rest)| rest);
        host.trim_end_matches('/')
    }
}

/// A kind routed to a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBinding {
    pub path: String,
    #[serde(flatten)]
    pub options: QueueOptions,
}

/// A kind routed to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBinding {
    pub path: String,
    #[serde(flatten)]
    pub options: TopicOptions,
}

/// Message kind to destination bindings, keyed by kind tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub queues: BTreeMap<String, QueueBinding>,
    pub topics: BTreeMap<String, TopicBinding>,
}

/// Full pool configuration: how to connect and where each kind goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub destinations: DestinationConfig,
}

impl PoolConfig {
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(|e| ConfigError::Document(e.to_string()))
    }
}
