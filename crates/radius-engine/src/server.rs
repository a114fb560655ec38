use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::config::{Config, ConfigError};
use crate::process::{Disposition, Process, ProcessError, Request};
use crate::runtime::{PolicyRuntime, RuntimeError, SectionRuntime};
use crate::socket::{self, SocketError};
use crate::state::SessionTracker;
use crate::transport::{self, Endpoint, TcpEndpoint, TransportError, UdpEndpoint};
use radius_proto::auth::{verify, SignError};
use radius_proto::debug::log_hex;
use radius_proto::dictionary::Dictionary;
use radius_proto::{Attribute, AttributeType, Code, Packet, PacketError};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Level};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),
    #[error("Policy error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Everything a request handler task needs.
pub struct ServerConfig {
    pub config: Arc<Config>,
    pub process: Arc<Process>,
    pub audit_logger: Arc<AuditLogger>,
}

impl ServerConfig {
    /// Build the dictionary, policy runtime and session tracker for `config`.
    pub fn from_config(config: Config) -> Result<Self, ServerError> {
        let mut dictionary = Dictionary::standard();
        let runtime = PolicyRuntime::new(&config.sections, &config.users, &mut dictionary)?;
        info!(sections = ?runtime.section_names(), "policy loaded");
        Self::with_runtime(config, dictionary, Arc::new(runtime))
    }

    /// Use a caller-supplied section runtime.
    ///
    /// `dictionary` must already hold every Auth-Type value the runtime selects.
    pub fn with_runtime(
        config: Config,
        dictionary: Dictionary,
        runtime: Arc<dyn SectionRuntime>,
    ) -> Result<Self, ServerError> {
        let audit_logger = AuditLogger::new(config.audit_log_path.as_deref().map(Path::new))?;
        let sessions = SessionTracker::new(&config.access_request.session, &config.virtual_server);
        let process = Process::new(
            Arc::new(dictionary),
            Arc::new(sessions),
            runtime,
            config.access_request.log.clone(),
        );
        Ok(ServerConfig {
            config: Arc::new(config),
            process: Arc::new(process),
            audit_logger: Arc::new(audit_logger),
        })
    }
}

/// RADIUS Server
pub struct RadiusServer {
    shared: Arc<ServerConfig>,
    udp: Arc<UdpEndpoint>,
    tcp: Option<TcpListener>,
}

impl RadiusServer {
    /// Bind the configured sockets.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let udp = socket::open_udp(&config.config.listen).await?;
        let udp = UdpEndpoint::new(udp);
        info!(addr = ?udp.local_addr(), server = %config.config.virtual_server, "RADIUS server listening (udp)");

        let tcp = match &config.config.tcp_listen {
            Some(tcp_config) => {
                let listener = socket::open_tcp_listener(tcp_config)?;
                info!(addr = ?listener.local_addr().ok(), "RADIUS server listening (tcp)");
                Some(listener)
            }
            None => None,
        };

        Ok(RadiusServer {
            shared: Arc::new(config),
            udp: Arc::new(udp),
            tcp,
        })
    }

    /// Get the local address the server is listening on
    ///
    /// This is useful for testing when binding to port 0 (OS-assigned port)
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.udp.local_addr().ok_or_else(|| {
            ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "udp socket has no local address",
            ))
        })
    }

    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|listener| listener.local_addr().ok())
    }

    /// Serve until a socket error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        self.shared
            .audit_logger
            .log(AuditEntry::new(AuditEventType::ServerStart))
            .await;

        if let Some(listener) = self.tcp {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                if let Err(e) = accept_loop(listener, shared).await {
                    error!(error = %e, "tcp listener stopped");
                }
            });
        }

        let options = self.shared.config.decode_options();
        loop {
            match transport::receive(self.udp.as_ref(), &options).await {
                Ok(Some(packet)) => {
                    let shared = Arc::clone(&self.shared);
                    let endpoint: Arc<dyn Endpoint> = self.udp.clone();
                    tokio::spawn(async move {
                        handle_packet(shared, endpoint, packet).await;
                    });
                }
                Ok(None) => continue,
                Err(TransportError::Io(e)) => {
                    self.shared
                        .audit_logger
                        .log(AuditEntry::new(AuditEventType::ServerStop).with_details(e.to_string()))
                        .await;
                    return Err(ServerError::Io(e));
                }
                Err(e) => log_dropped_frame(&self.shared, e).await,
            }
        }
    }
}

async fn log_dropped_frame(shared: &ServerConfig, e: TransportError) {
    warn!(error = %e, "dropping frame");
    if let TransportError::Malformed(_) = e {
        shared
            .audit_logger
            .log(AuditEntry::new(AuditEventType::MalformedPacket).with_details(e.to_string()))
            .await;
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<ServerConfig>) -> Result<(), ServerError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        if shared.config.find_client(peer.ip()).is_none() {
            warn!(client_ip = %peer.ip(), "Rejected connection from unknown client");
            shared
                .audit_logger
                .log(AuditEntry::new(AuditEventType::UnknownClient).with_client_ip(peer.ip()))
                .await;
            continue;
        }

        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let endpoint: Arc<dyn Endpoint> = Arc::new(TcpEndpoint::new(stream));
            let options = shared.config.decode_options();
            loop {
                match transport::receive(endpoint.as_ref(), &options).await {
                    Ok(Some(packet)) => {
                        handle_packet(Arc::clone(&shared), Arc::clone(&endpoint), packet).await
                    }
                    Ok(None) => continue,
                    Err(TransportError::Empty) => {
                        debug!(peer = %peer, "connection closed");
                        return;
                    }
                    Err(TransportError::Io(e)) => {
                        warn!(peer = %peer, error = %e, "closing connection");
                        return;
                    }
                    // Bad frames are consumed whole, so the stream stays in sync.
                    Err(e) => log_dropped_frame(&shared, e).await,
                }
            }
        });
    }
}

/// Authorize, verify, process and answer one packet.
async fn handle_packet(shared: Arc<ServerConfig>, endpoint: Arc<dyn Endpoint>, packet: Packet) {
    let Some(src) = packet.socket.src else {
        return;
    };
    let config = &shared.config;
    let audit = &shared.audit_logger;

    let Some(client) = config.find_client(src.ip()) else {
        warn!(
            client_ip = %src.ip(),
            request_id = packet.identifier,
            "Rejected request from unknown client"
        );
        audit
            .log(
                AuditEntry::new(AuditEventType::UnknownClient)
                    .with_client_ip(src.ip())
                    .with_request_id(packet.identifier)
                    .with_code(packet.code),
            )
            .await;
        return;
    };
    let client_name = client.display_name().to_string();
    let secret = config.client_secret(client).to_vec();

    if let Some(data) = packet.data() {
        if tracing::enabled!(Level::TRACE) {
            log_hex(data, Some(&packet.socket), Some(shared.process.dictionary()));
        }
        let require_ma =
            config.require_message_authenticator && packet.code == Code::AccessRequest;
        if let Err(e) = verify(data, None, &secret, require_ma) {
            warn!(
                client = %client_name,
                request_id = packet.identifier,
                code = %packet.code,
                error = %e,
                "Dropping packet that failed integrity check"
            );
            audit
                .log(
                    AuditEntry::new(AuditEventType::IntegrityFailure)
                        .with_client_ip(src.ip())
                        .with_client_name(&client_name)
                        .with_request_id(packet.identifier)
                        .with_code(packet.code)
                        .with_details(e.to_string()),
                )
                .await;
            return;
        }
    }

    debug!(
        code = %packet.code,
        id = packet.identifier,
        client = %client_name,
        "Received RADIUS packet"
    );

    let mut request = Request::new(packet, secret, client_name.clone());
    let disposition = match shared.process.run(&mut request).await {
        Ok(disposition) => disposition,
        Err(e @ ProcessError::UnsupportedPacketType(_)) => {
            warn!(client = %client_name, error = %e, "Dropping request");
            audit
                .log(
                    AuditEntry::new(AuditEventType::UnsupportedPacket)
                        .with_client_ip(src.ip())
                        .with_client_name(&client_name)
                        .with_code(request.packet.code),
                )
                .await;
            return;
        }
        Err(e) => {
            error!(client = %client_name, error = %e, "Request processing failed");
            return;
        }
    };

    let mut entry = AuditEntry::new(AuditEventType::for_disposition(disposition))
        .with_client_ip(src.ip())
        .with_client_name(&client_name)
        .with_request_id(request.packet.identifier)
        .with_code(request.packet.code);
    if let Some(user) = request.user_name() {
        entry = entry.with_username(user);
    }
    audit.log(entry).await;

    if disposition == Disposition::NoReply {
        debug!(client = %client_name, id = request.packet.identifier, "No reply");
        return;
    }

    let original = request.packet.authenticator;
    let request_has_ma = request.packet.has_message_authenticator();
    let secret = std::mem::take(&mut request.secret);
    let Some(mut reply) = request.into_reply() else {
        return;
    };
    match transport::send(endpoint.as_ref(), &mut reply, Some(&original), &secret).await {
        Ok(_) => {}
        Err(TransportError::Sign(SignError::Packet(PacketError::PacketTooLarge(len)))) => {
            warn!(client = %client_name, code = %reply.code, len, "Reply too large, sending a minimal one");
            let mut minimal = minimal_reply(&reply, request_has_ma);
            if let Err(e) =
                transport::send(endpoint.as_ref(), &mut minimal, Some(&original), &secret).await
            {
                warn!(client = %client_name, code = %minimal.code, error = %e, "Failed to send minimal reply");
            }
        }
        Err(e) => {
            warn!(client = %client_name, code = %reply.code, error = %e, "Failed to send reply");
        }
    }
}

/// Same code and identifier, keeping only Proxy-State, plus a
/// Message-Authenticator when the request carried one.
fn minimal_reply(reply: &Packet, with_message_authenticator: bool) -> Packet {
    let mut minimal = Packet::new(reply.code, reply.identifier, [0u8; 16]);
    minimal.socket = reply.socket.clone();
    minimal.attributes = reply
        .attributes
        .iter()
        .filter(|attr| attr.is(AttributeType::ProxyState))
        .cloned()
        .collect();
    if with_message_authenticator {
        minimal.add_attribute(Attribute::message_authenticator());
    }
    minimal
}
