mod code;
#[allow(clippy::module_inception)]
mod packet;
mod socket;

pub use code::{Code, VectorKind};
pub use packet::{Packet, PacketError};
pub use socket::{EndpointId, SocketInfo, TransportKind};
