//! Vending Machine Controller Serial Protocol
//!
//! This crate provides types and utilities for talking to vending machine
//! controller boards over their UART link. The protocol is strictly
//! half-duplex: the host sends one fixed-size request and the board answers
//! with one fixed-size response before anything else may be sent.
//!
//! # Protocol Overview
//!
//! - **Requests** (host → board): 6 bytes, each of group, command and
//!   parameter followed by its complement (`0xFF - x`).
//! - **Responses** (board → host): 5 bytes, `group, status, data, aux,
//!   checksum`, the checksum being the low byte of the sum of the other four.
//! - **Status**: `0x5D` (OK) or `0x5C` (ERROR). On ERROR the data byte carries
//!   a mechanical fault in its high nibble and an optical fault in its low
//!   nibble.
//!
//! Commands are described declaratively in [`CATALOG`]; each row says how
//! the request bytes are derived and how the reply is interpreted.
//!
//! # Example
//!
//! ```rust
//! use vmc_protocol::{Channel, Command, ResponseFrame, Reply, STATUS_OK};
//!
//! let command = Command::VendWithDropCheck { channel: Channel::new(12)? };
//! assert_eq!(command.encode(), [0x00, 0xFF, 0x0C, 0xF3, 0xAA, 0x55]);
//!
//! let frame = ResponseFrame::decode(&[0x00, STATUS_OK, 0x00, 0xAA, 0x07])?;
//! let reply = (command.spec().interpret)(&command, &frame);
//! assert!(matches!(reply, Reply::Vend(ref vend) if vend.dropped == Some(true)));
//! # Ok::<(), vmc_protocol::ProtocolError>(())
//! ```

mod catalog;
mod commands;
mod constants;
mod error;
mod fault;
mod frame;
mod responses;
mod types;

pub use catalog::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use fault::*;
pub use frame::*;
pub use responses::*;
pub use types::*;
