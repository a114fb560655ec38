//! Listener socket configuration
//!
//! Sockets are built with socket2 so buffer sizes, IPv6-only and the bound
//! device can be set before bind, then handed to tokio.

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};
use tracing::debug;

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid socket configuration: {0}")]
    Invalid(String),
    #[error("{0} listeners are not supported")]
    Unsupported(TransportName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportName {
    #[default]
    Udp,
    Tcp,
    Unix,
}

impl std::fmt::Display for TransportName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransportName::Udp => "udp",
            TransportName::Tcp => "tcp",
            TransportName::Unix => "unix",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Inet,
    Inet6,
    Unix,
}

/// One listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    #[serde(default)]
    pub transport: TransportName,

    /// Derived from the address when absent
    #[serde(default)]
    pub af: Option<AddressFamily>,

    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Peer for connected sockets
    #[serde(default)]
    pub connect_address: Option<String>,

    #[serde(default)]
    pub connect_port: Option<u16>,

    /// Bind to a network device (Linux only)
    #[serde(default)]
    pub interface: Option<String>,

    #[serde(default)]
    pub recv_buff: Option<usize>,

    #[serde(default)]
    pub send_buff: Option<usize>,

    /// Socket path for the unix transport
    #[serde(default)]
    pub path: Option<String>,

    /// Octal file mode for the unix socket path, e.g. `"0600"`
    #[serde(default)]
    pub permissions: Option<String>,

    #[serde(default)]
    pub uid: Option<u32>,

    #[serde(default)]
    pub gid: Option<u32>,

    /// Must stay false; the listener is asynchronous
    #[serde(default)]
    pub blocking: bool,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1812
}

impl Default for SocketConfig {
    fn default() -> Self {
        SocketConfig {
            transport: TransportName::Udp,
            af: None,
            address: default_address(),
            port: default_port(),
            connect_address: None,
            connect_port: None,
            interface: None,
            recv_buff: None,
            send_buff: None,
            path: None,
            permissions: None,
            uid: None,
            gid: None,
            blocking: false,
        }
    }
}

impl SocketConfig {
    /// UDP listener on `address`.
    pub fn udp(address: SocketAddr) -> Self {
        SocketConfig {
            address: address.ip().to_string(),
            port: address.port(),
            ..Default::default()
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, SocketError> {
        let ip: IpAddr = self
            .address
            .parse()
            .map_err(|_| SocketError::Invalid(format!("Invalid bind address: {}", self.address)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn connect_addr(&self) -> Result<Option<SocketAddr>, SocketError> {
        let Some(address) = &self.connect_address else {
            return Ok(None);
        };
        let ip: IpAddr = address
            .parse()
            .map_err(|_| SocketError::Invalid(format!("Invalid connect address: {address}")))?;
        let port = self
            .connect_port
            .ok_or_else(|| SocketError::Invalid("connect_address needs connect_port".to_string()))?;
        Ok(Some(SocketAddr::new(ip, port)))
    }

    pub fn validate(&self) -> Result<(), SocketError> {
        if self.blocking {
            return Err(SocketError::Invalid("blocking sockets are not supported".to_string()));
        }

        if self.transport == TransportName::Unix {
            if self.af.is_some_and(|af| af != AddressFamily::Unix) {
                return Err(SocketError::Invalid("unix transport needs af = unix".to_string()));
            }
            if self.path.as_deref().map_or(true, str::is_empty) {
                return Err(SocketError::Invalid("unix transport needs a path".to_string()));
            }
            if let Some(mode) = &self.permissions {
                u32::from_str_radix(mode, 8)
                    .map_err(|_| SocketError::Invalid(format!("Invalid permissions: {mode}")))?;
            }
            return Ok(());
        }

        let bind = self.bind_addr()?;
        match (self.af, bind) {
            (Some(AddressFamily::Inet), SocketAddr::V6(_))
            | (Some(AddressFamily::Inet6), SocketAddr::V4(_))
            | (Some(AddressFamily::Unix), _) => {
                return Err(SocketError::Invalid(format!(
                    "address {} does not match af {:?}",
                    self.address, self.af
                )));
            }
            _ => {}
        }
        if let Some(peer) = self.connect_addr()? {
            if peer.is_ipv4() != bind.is_ipv4() {
                return Err(SocketError::Invalid(
                    "connect address family differs from bind address".to_string(),
                ));
            }
        }
        if self.permissions.is_some() || self.uid.is_some() || self.gid.is_some() {
            return Err(SocketError::Invalid(
                "permissions, uid and gid only apply to unix sockets".to_string(),
            ));
        }
        Ok(())
    }

    fn build(&self, socket_type: Type, protocol: Protocol) -> Result<Socket, SocketError> {
        self.validate()?;
        let bind = self.bind_addr()?;
        let domain = match bind {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };

        let socket = Socket::new(domain, socket_type, Some(protocol))?;
        socket.set_reuse_address(true)?;
        if let Some(size) = self.recv_buff {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buff {
            socket.set_send_buffer_size(size)?;
        }
        if let SocketAddr::V6(addr) = bind {
            socket.set_only_v6(!addr.ip().is_unspecified())?;
        }
        if let Some(interface) = &self.interface {
            bind_device(&socket, interface)?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&bind.into())?;
        Ok(socket)
    }
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_device(socket: &Socket, interface: &str) -> Result<(), SocketError> {
    socket.bind_device(Some(interface.as_bytes()))?;
    Ok(())
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_device(_socket: &Socket, interface: &str) -> Result<(), SocketError> {
    Err(SocketError::Invalid(format!(
        "binding to interface {interface} is not supported on this platform"
    )))
}

/// Open a UDP socket, connected when a peer is configured.
pub async fn open_udp(config: &SocketConfig) -> Result<UdpSocket, SocketError> {
    if config.transport != TransportName::Udp {
        return Err(SocketError::Invalid(format!(
            "expected a udp socket, got {}",
            config.transport
        )));
    }
    let socket = config.build(Type::DGRAM, Protocol::UDP)?;
    let socket = UdpSocket::from_std(socket.into())?;
    if let Some(peer) = config.connect_addr()? {
        socket.connect(peer).await?;
    }
    debug!(addr = ?socket.local_addr().ok(), "udp socket open");
    Ok(socket)
}

/// Open a TCP listening socket.
pub fn open_tcp_listener(config: &SocketConfig) -> Result<TcpListener, SocketError> {
    match config.transport {
        TransportName::Tcp => {}
        TransportName::Unix => return Err(SocketError::Unsupported(TransportName::Unix)),
        TransportName::Udp => {
            return Err(SocketError::Invalid("expected a tcp socket, got udp".to_string()))
        }
    }
    let socket = config.build(Type::STREAM, Protocol::TCP)?;
    socket.listen(128)?;
    let listener = TcpListener::from_std(socket.into())?;
    debug!(addr = ?listener.local_addr().ok(), "tcp listener open");
    Ok(listener)
}
