use std::sync::LazyLock;

use ahash::HashMap;
use battler_wamp_uri::Uri;
use battler_wamp_values::Dictionary;
use regex::Regex;

use crate::core::{
    error::InvalidConfigError,
    options::Serializer,
};

/// An HTTP proxy to connect through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

/// Configuration for a connection to a router.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URI of the router (e.g., `ws://localhost:8080/ws`).
    pub uri: String,
    /// Realm joined by sessions on this connection.
    pub realm: String,
    /// Extra data made available to authenticators.
    pub extra: Dictionary,
    /// Serializers offered to the router, in order of preference.
    pub serializers: Vec<Serializer>,
    pub proxy: Option<ProxyConfig>,
    /// Headers added to the WebSocket handshake.
    pub headers: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Creates a new configuration for the router and realm, with defaults for everything else.
    pub fn new<U, R>(uri: U, realm: R) -> Self
    where
        U: Into<String>,
        R: Into<String>,
    {
        Self {
            uri: uri.into(),
            realm: realm.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        static WEB_SOCKET_URI: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^wss?://[^\s/:?#]+(:\d{1,5})?([/?#]\S*)?$").unwrap());
        if !WEB_SOCKET_URI.is_match(&self.uri) {
            return Err(InvalidConfigError::new(format!(
                "invalid router URI: {}",
                self.uri
            )));
        }
        if Uri::try_from(self.realm.as_str()).is_err() {
            return Err(InvalidConfigError::new(format!(
                "invalid realm: {}",
                self.realm
            )));
        }
        if self.serializers.is_empty() {
            return Err(InvalidConfigError::new(
                "at least one serializer must be offered",
            ));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.host.is_empty() {
                return Err(InvalidConfigError::new("proxy host cannot be empty"));
            }
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: "ws://localhost:8080/ws".to_owned(),
            realm: "realm1".to_owned(),
            extra: Dictionary::default(),
            serializers: Vec::from_iter([Serializer::Json, Serializer::MessagePack]),
            proxy: None,
            headers: HashMap::default(),
        }
    }
}
