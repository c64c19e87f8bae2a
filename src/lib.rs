mod client;
mod config;
mod coordinator;
mod diff;
mod error;
mod logger;
pub mod protocol;
mod transport;
mod types;

pub use client::{ProAirClient, ProAirClientBuilder};
pub use config::Config;
pub use coordinator::{
    DEFAULT_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL, RefreshCoordinator, RefreshCoordinatorBuilder, RefreshState,
};
pub use error::{Error, ErrorCategory, Result};
pub use logger::MessageLogMode;
pub use protocol::{ResultCode, UnitUpdate, ZoneUpdate};
pub use transport::{TcpTransport, TransportConfig};
pub use types::*;
