use std::fmt;
use std::net::SocketAddr;

/// Transport a packet travelled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Udp,
    Tcp,
    Unix,
}

impl TransportKind {
    /// Stream transports are framed by the RADIUS length field.
    pub fn is_stream(self) -> bool {
        matches!(self, TransportKind::Tcp | TransportKind::Unix)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Udp => "udp",
            TransportKind::Tcp => "tcp",
            TransportKind::Unix => "unix",
        })
    }
}

/// Opaque handle of the endpoint that owns the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub u64);

/// Socket metadata attached to a packet.
///
/// The endpoint is owned by the transport layer; the packet only refers to it.
/// A packet without a handle is synthetic and is never written to a socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketInfo {
    pub transport: TransportKind,
    pub src: Option<SocketAddr>,
    pub dst: Option<SocketAddr>,
    pub handle: Option<EndpointId>,
}

impl SocketInfo {
    /// Metadata for a packet that never touches the wire.
    pub fn synthetic() -> Self {
        SocketInfo::default()
    }

    pub fn is_synthetic(&self) -> bool {
        self.handle.is_none()
    }

    /// Metadata for the answer to a packet received with `self`.
    pub fn reversed(&self) -> Self {
        SocketInfo {
            transport: self.transport,
            src: self.dst,
            dst: self.src,
            handle: self.handle,
        }
    }
}
