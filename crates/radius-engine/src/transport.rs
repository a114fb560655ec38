//! Frame transport
//!
//! Moves whole RADIUS frames between a socket and [`Packet`]s. Datagram
//! endpoints get one frame per datagram; stream endpoints are framed by the
//! length field in the header.

use async_trait::async_trait;
use radius_proto::auth::{sign, SignError};
use radius_proto::validation::DecodeError;
use radius_proto::{DecodeOptions, EndpointId, Packet, PacketError, SocketInfo, TransportKind};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tracing::{debug, trace};

const MAX_FRAME: usize = Packet::MAX_PACKET_SIZE;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("empty read")]
    Empty,
    #[error("frame of {0} bytes exceeds the maximum packet size")]
    Oversize(usize),
    #[error("malformed packet: {0}")]
    Malformed(DecodeError),
    #[error("packet error: {0}")]
    Packet(PacketError),
    #[error("signing failed: {0}")]
    Sign(#[from] SignError),
    #[error("packet has no destination address")]
    NoDestination,
}

impl From<PacketError> for TransportError {
    fn from(e: PacketError) -> Self {
        match e {
            PacketError::Malformed(decode) => TransportError::Malformed(decode),
            other => TransportError::Packet(other),
        }
    }
}

fn next_endpoint_id() -> EndpointId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    EndpointId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// A socket that carries RADIUS frames.
#[async_trait]
pub trait Endpoint: Send + Sync {
    fn id(&self) -> EndpointId;

    fn kind(&self) -> TransportKind;

    fn local_addr(&self) -> Option<SocketAddr>;

    /// Read one frame into `buf`.
    ///
    /// A length above [`Packet::MAX_PACKET_SIZE`] means the frame was too
    /// large and has been discarded.
    async fn recv_frame(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)>;

    /// Write one frame. Datagram endpoints need a destination.
    async fn send_frame(&self, frame: &[u8], destination: Option<SocketAddr>) -> io::Result<usize>;
}

/// Datagram endpoint over a tokio UDP socket.
#[derive(Debug, Clone)]
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
    id: EndpointId,
}

impl UdpEndpoint {
    pub fn new(socket: UdpSocket) -> Self {
        UdpEndpoint {
            socket: Arc::new(socket),
            id: next_endpoint_id(),
        }
    }
}

#[async_trait]
impl Endpoint for UdpEndpoint {
    fn id(&self) -> EndpointId {
        self.id
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        let (len, src) = self.socket.recv_from(buf).await?;
        Ok((len, Some(src)))
    }

    async fn send_frame(&self, frame: &[u8], destination: Option<SocketAddr>) -> io::Result<usize> {
        match destination {
            Some(dst) => self.socket.send_to(frame, dst).await,
            None => self.socket.send(frame).await,
        }
    }
}

/// Stream endpoint over one TCP connection.
#[derive(Debug)]
pub struct TcpEndpoint {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer: Option<SocketAddr>,
    local: Option<SocketAddr>,
    id: EndpointId,
}

impl TcpEndpoint {
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let local = stream.local_addr().ok();
        let (reader, writer) = stream.into_split();
        TcpEndpoint {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer,
            local,
            id: next_endpoint_id(),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

#[async_trait]
impl Endpoint for TcpEndpoint {
    fn id(&self) -> EndpointId {
        self.id
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        let mut reader = self.reader.lock().await;
        let mut header = [0u8; 4];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok((0, self.peer)),
            Err(e) => return Err(e),
        }

        let declared = u16::from_be_bytes([header[2], header[3]]) as usize;
        if declared < Packet::MIN_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stream frame declares {declared} bytes"),
            ));
        }
        if declared > MAX_FRAME || declared > buf.len() {
            let mut rest = (&mut *reader).take((declared - header.len()) as u64);
            tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
            return Ok((declared.max(MAX_FRAME + 1), self.peer));
        }

        buf[..4].copy_from_slice(&header);
        reader.read_exact(&mut buf[4..declared]).await?;
        Ok((declared, self.peer))
    }

    async fn send_frame(&self, frame: &[u8], _destination: Option<SocketAddr>) -> io::Result<usize> {
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        Ok(frame.len())
    }
}

/// Read and structurally validate one packet.
///
/// `Ok(None)` when the read would block or was interrupted. Oversize and
/// malformed frames are dropped whole; no partial packet is ever returned.
pub async fn receive(
    endpoint: &dyn Endpoint,
    options: &DecodeOptions,
) -> Result<Option<Packet>, TransportError> {
    let mut buf = vec![0u8; MAX_FRAME + 1];
    let (len, src) = match endpoint.recv_frame(&mut buf).await {
        Ok(read) => read,
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            return Ok(None)
        }
        Err(e) => return Err(TransportError::Io(e)),
    };

    if len == 0 {
        return Err(TransportError::Empty);
    }
    if len > MAX_FRAME {
        return Err(TransportError::Oversize(len));
    }
    buf.truncate(len);
    trace!(len, src = ?src, "frame received");

    let socket = SocketInfo {
        transport: endpoint.kind(),
        src,
        dst: endpoint.local_addr(),
        handle: Some(endpoint.id()),
    };
    Ok(Some(Packet::from_wire(buf, socket, options)?))
}

/// Write a packet, encoding and signing it first if it has no wire image.
///
/// Synthetic packets are not written and report zero bytes.
pub async fn send(
    endpoint: &dyn Endpoint,
    packet: &mut Packet,
    original: Option<&[u8; 16]>,
    secret: &[u8],
) -> Result<usize, TransportError> {
    if packet.socket.is_synthetic() {
        return Ok(0);
    }
    if packet.data().is_none() {
        sign(packet, original, secret)?;
    }

    let destination = if endpoint.kind().is_stream() {
        None
    } else {
        Some(packet.socket.dst.ok_or(TransportError::NoDestination)?)
    };
    let frame = packet.data().ok_or(TransportError::Empty)?;
    let written = endpoint.send_frame(frame, destination).await?;
    debug!(code = %packet.code, id = packet.identifier, len = written, dst = ?destination, "sent");
    Ok(written)
}
