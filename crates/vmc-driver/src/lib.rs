//! Driver for vending machine controller boards.
//!
//! Sits on top of [`vmc_protocol`] and owns everything with a clock or a
//! socket in it:
//!
//! - [`Transport`]: byte links ([`SerialTransport`], [`TcpTransport`],
//!   [`SimulatedBoard`]).
//! - [`Correlator`]: one request in flight at a time, reply reassembly,
//!   per-request timeouts.
//! - [`VendingController`]: runs catalog commands and interprets replies.
//! - [`poll_channels`]: sequential channel-existence scan.
//! - [`ControllerConfig`]: YAML configuration.
//!
//! # Example
//!
//! ```rust
//! use vmc_driver::{SimulatedBoard, VendingController};
//! use vmc_protocol::{Channel, Command, Reply};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = VendingController::new(SimulatedBoard::with_channels(1..=10));
//! controller.open()?;
//!
//! let reply = controller
//!     .execute(Command::VendWithDropCheck { channel: Channel::new(3)? })
//!     .await?;
//! assert!(matches!(reply, Reply::Vend(ref vend) if vend.dropped == Some(true)));
//! # Ok(())
//! # }
//! ```

mod config;
mod controller;
mod correlator;
mod error;
mod poller;
mod serial;
mod simulator;
mod transport;

pub use config::{ConfigError, ControllerConfig, LinkConfig, PollConfig};
pub use controller::{timeout_from_millis, TimeoutTable, VendingController};
pub use correlator::{Correlator, Dispatch};
pub use error::{ControllerError, ControllerResult, ErrorCode, ErrorReport};
pub use poller::{
    poll_channels, ChannelProbe, PollOptions, ProbeOutcome, DEFAULT_INTER_CHANNEL_DELAY,
    DEFAULT_MAX_CHANNEL, DEFAULT_PROBE_TIMEOUT,
};
pub use serial::{SerialTransport, TcpTransport, DEFAULT_BAUD_RATE};
pub use simulator::{BoardHandle, SimulatedBoard};
pub use transport::{ReplySink, Transport, TransportError};
