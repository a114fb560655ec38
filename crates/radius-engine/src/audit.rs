//! Audit log
//!
//! One JSON object per line for every decision the server makes about a
//! packet: replies sent, replies withheld and packets dropped before
//! processing.

use crate::process::Disposition;
use radius_proto::Code;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Access-Accept sent
    LoginOk,
    /// Access-Reject sent
    LoginIncorrect,
    /// Access-Challenge sent
    Challenge,
    /// Any other reply sent
    Reply,
    /// Request processed, nothing sent
    NoReply,
    /// Source address matches no client
    UnknownClient,
    /// Frame failed structural validation
    MalformedPacket,
    /// Authenticator or Message-Authenticator mismatch
    IntegrityFailure,
    /// Packet type the server does not process
    UnsupportedPacket,
    ServerStart,
    ServerStop,
}

impl AuditEventType {
    /// Event for a finished request.
    pub fn for_disposition(disposition: Disposition) -> Self {
        match disposition {
            Disposition::Reply(Code::AccessAccept) => AuditEventType::LoginOk,
            Disposition::Reply(Code::AccessReject) => AuditEventType::LoginIncorrect,
            Disposition::Reply(Code::AccessChallenge) => AuditEventType::Challenge,
            Disposition::Reply(_) => AuditEventType::Reply,
            Disposition::NoReply => AuditEventType::NoReply,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    /// Client name from the configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u8>,
    /// Packet code, e.g. `Access-Request`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub server_version: String,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        AuditEntry {
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            event_type,
            username: None,
            client_ip: None,
            client_name: None,
            request_id: None,
            code: None,
            details: None,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip.to_string());
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_request_id(mut self, id: u8) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_code(mut self, code: Code) -> Self {
        self.code = Some(code.name().to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Appends entries to a file; a logger without a file discards them.
#[derive(Debug, Default)]
pub struct AuditLogger {
    file: Option<Mutex<std::fs::File>>,
}

impl AuditLogger {
    pub fn new(path: Option<&Path>) -> std::io::Result<Self> {
        let file = match path {
            Some(path) => Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => None,
        };
        Ok(AuditLogger { file })
    }

    pub async fn log(&self, entry: AuditEntry) {
        let Some(file) = &self.file else {
            return;
        };
        match serde_json::to_string(&entry) {
            Ok(json) => {
                let mut f = file.lock().await;
                if let Err(e) = writeln!(f, "{}", json) {
                    error!("Failed to write audit log: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize audit entry: {}", e),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }
}
