//! RADIUS request processing engine
//!
//! Built on top of the `radius-proto` codec. A request is received by the
//! [`transport`] layer, authorized and verified by the [`server`], then driven
//! through `recv`, an optional sub-section and `send` by [`process::Process`].
//! What each section does is up to a [`runtime::SectionRuntime`]; the
//! configuration-driven [`runtime::PolicyRuntime`] is the default.
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_engine::{Config, RadiusServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.json")?;
//!     let server = RadiusServer::new(ServerConfig::from_config(config)?).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod process;
pub mod runtime;
pub mod server;
pub mod socket;
pub mod state;
pub mod transport;

pub use audit::{AuditEntry, AuditEventType, AuditLogger};
pub use config::{AccessRequestConfig, AuthLogConfig, Client, Config, ConfigError, User};
pub use process::{Disposition, Outcome, Process, ProcessError, ProcessState, Request, Step};
pub use runtime::{PolicyRuntime, RuntimeError, SectionPolicy, SectionRuntime};
pub use server::{RadiusServer, ServerConfig, ServerError};
pub use socket::{SocketConfig, SocketError};
pub use state::{SessionConfig, SessionTracker, StateError};
pub use transport::{Endpoint, TcpEndpoint, TransportError, UdpEndpoint};
