use crate::runtime::{AttributeSpec, Check, PolicyRuntime, SectionPolicy};
use crate::socket::{SocketConfig, TransportName};
use crate::state::SessionConfig;
use crate::process::Outcome;
use ipnetwork::IpNetwork;
use radius_proto::dictionary::Dictionary;
use radius_proto::DecodeOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    /// Reply attributes added when the user authenticates, by dictionary name
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Client IP address or network (supports CIDR notation)
    pub address: String,
    /// Shared secret for this client; empty uses the server secret
    #[serde(default)]
    pub secret: String,
    /// Optional client name/description
    #[serde(default)]
    pub name: Option<String>,
    /// Enable/disable this client
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Client {
    /// Parse the client address as an IP network
    pub fn parse_network(&self) -> Result<IpNetwork, ConfigError> {
        if let Ok(network) = self.address.parse::<IpNetwork>() {
            return Ok(network);
        }
        if let Ok(ip) = self.address.parse::<IpAddr>() {
            return Ok(IpNetwork::from(ip));
        }
        Err(ConfigError::Invalid(format!(
            "Invalid client address: {}",
            self.address
        )))
    }

    /// Check if a source IP address matches this client
    pub fn matches(&self, source_ip: IpAddr) -> Result<bool, ConfigError> {
        let network = self.parse_network()?;
        Ok(network.contains(source_ip))
    }

    /// Name used in logs: the configured name, else the address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// What gets logged for Access-Accept and Access-Reject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthLogConfig {
    /// Log a line for every accept and reject
    pub auth: bool,
    /// Include the password of accepted users
    pub auth_goodpass: bool,
    /// Include the password of rejected users
    pub auth_badpass: bool,
    /// Prefer the stripped user name
    pub stripped_names: bool,
    pub msg_goodpass: Option<String>,
    pub msg_badpass: Option<String>,
}

/// Access-Request handling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRequestConfig {
    pub session: SessionConfig,
    pub log: AuthLogConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// UDP listener
    #[serde(default)]
    pub listen: SocketConfig,

    /// Optional TCP listener
    #[serde(default)]
    pub tcp_listen: Option<SocketConfig>,

    /// Shared secret for clients that do not set their own
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Authorized clients; packets from anyone else are dropped
    #[serde(default)]
    pub clients: Vec<Client>,

    /// Users for the built-in pap and chap checks
    #[serde(default)]
    pub users: Vec<User>,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// Audit log file path (JSON lines, optional)
    #[serde(default)]
    pub audit_log_path: Option<String>,

    /// Virtual server name; keys the session tokens
    #[serde(default = "default_virtual_server")]
    pub virtual_server: String,

    /// Maximum attributes per packet, 0 = unlimited
    #[serde(default = "default_max_attributes")]
    pub max_attributes: usize,

    /// Drop Access-Requests without a Message-Authenticator
    #[serde(default)]
    pub require_message_authenticator: bool,

    #[serde(default)]
    pub access_request: AccessRequestConfig,

    /// Section policies, keyed by section name (`recv Access-Request`, ...)
    #[serde(default)]
    pub sections: HashMap<String, SectionPolicy>,
}

fn default_secret() -> String {
    "testing123".to_string()
}

fn default_virtual_server() -> String {
    "default".to_string()
}

fn default_max_attributes() -> usize {
    200
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: SocketConfig::default(),
            tcp_listen: None,
            secret: default_secret(),
            clients: vec![],
            users: vec![],
            log_level: None,
            audit_log_path: None,
            virtual_server: default_virtual_server(),
            max_attributes: default_max_attributes(),
            require_message_authenticator: false,
            access_request: AccessRequestConfig::default(),
            sections: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Structural limits for received packets. The Message-Authenticator
    /// requirement is enforced per code at verification instead.
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_attributes: self.max_attributes,
            require_message_authenticator: false,
        }
    }

    /// Find a client by source IP address
    ///
    /// Returns the first enabled client that matches the source IP.
    pub fn find_client(&self, source_ip: IpAddr) -> Option<&Client> {
        self.clients
            .iter()
            .filter(|client| client.enabled)
            .find(|client| matches!(client.matches(source_ip), Ok(true)))
    }

    /// Secret shared with `client`
    pub fn client_secret<'a>(&'a self, client: &'a Client) -> &'a [u8] {
        if client.secret.is_empty() {
            self.secret.as_bytes()
        } else {
            client.secret.as_bytes()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |e: crate::socket::SocketError| ConfigError::Invalid(e.to_string());

        if self.listen.transport != TransportName::Udp {
            return Err(ConfigError::Invalid("listen must be a udp socket".to_string()));
        }
        self.listen.validate().map_err(invalid)?;
        if let Some(tcp) = &self.tcp_listen {
            if tcp.transport != TransportName::Tcp {
                return Err(ConfigError::Invalid("tcp_listen must be a tcp socket".to_string()));
            }
            tcp.validate().map_err(invalid)?;
        }

        if self.secret.is_empty() {
            return Err(ConfigError::Invalid("Secret cannot be empty".to_string()));
        }
        if self.virtual_server.is_empty() {
            return Err(ConfigError::Invalid("virtual_server cannot be empty".to_string()));
        }
        if let Some(level) = &self.log_level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::Invalid(format!("Invalid log level: {level}")));
            }
        }

        for client in &self.clients {
            client.parse_network()?;
        }
        for user in &self.users {
            if user.username.is_empty() {
                return Err(ConfigError::Invalid("User has empty username".to_string()));
            }
        }

        // Sections and user attributes must compile against the dictionary.
        PolicyRuntime::new(&self.sections, &self.users, &mut Dictionary::standard())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        let sections = HashMap::from([
            (
                "recv Access-Request".to_string(),
                SectionPolicy {
                    auth_type: Some("pap".to_string()),
                    strip_realm: true,
                    ..Default::default()
                },
            ),
            (
                "authenticate pap".to_string(),
                SectionPolicy {
                    check: Some(Check::Pap),
                    ..Default::default()
                },
            ),
            (
                "send Access-Accept".to_string(),
                SectionPolicy {
                    reply: vec![AttributeSpec {
                        name: "Reply-Message".to_string(),
                        value: "Welcome".to_string(),
                    }],
                    ..Default::default()
                },
            ),
            (
                "recv Status-Server".to_string(),
                SectionPolicy {
                    outcome: Some(Outcome::Ok),
                    ..Default::default()
                },
            ),
            (
                "accounting Start".to_string(),
                SectionPolicy {
                    outcome: Some(Outcome::Ok),
                    ..Default::default()
                },
            ),
        ]);

        Config {
            clients: vec![
                Client {
                    address: "192.168.1.0/24".to_string(),
                    secret: "client_secret_1".to_string(),
                    name: Some("Internal Network".to_string()),
                    enabled: true,
                },
                Client {
                    address: "10.0.0.1".to_string(),
                    secret: "client_secret_2".to_string(),
                    name: Some("VPN Gateway".to_string()),
                    enabled: true,
                },
            ],
            users: vec![
                User {
                    username: "admin".to_string(),
                    password: "admin123".to_string(),
                    attributes: HashMap::from([(
                        "Session-Timeout".to_string(),
                        "3600".to_string(),
                    )]),
                },
                User {
                    username: "user1".to_string(),
                    password: "password1".to_string(),
                    attributes: HashMap::new(),
                },
            ],
            log_level: Some("info".to_string()),
            audit_log_path: Some("/var/log/radius/audit.log".to_string()),
            access_request: AccessRequestConfig {
                log: AuthLogConfig {
                    auth: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            sections,
            ..Default::default()
        }
    }
}
