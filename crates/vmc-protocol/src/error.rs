//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or validating frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame does not have the fixed size for its direction.
    #[error("bad frame length: expected {expected} bytes, got {actual}")]
    BadLength {
        /// Required length.
        expected: usize,
        /// Actual length received.
        actual: usize,
        /// The bytes as received.
        raw: Vec<u8>,
    },

    /// Response checksum does not match the sum of the preceding bytes.
    #[error("bad checksum: computed 0x{expected:02X}, frame carries 0x{actual:02X}")]
    BadChecksum {
        /// Checksum computed from the frame contents.
        expected: u8,
        /// Checksum byte carried in the frame.
        actual: u8,
        /// The bytes as received.
        raw: Vec<u8>,
    },

    /// A request byte and its redundant complement disagree.
    #[error("bad complement at offset {offset}: 0x{value:02X} paired with 0x{complement:02X}")]
    BadComplement {
        /// Offset of the source byte within the request.
        offset: usize,
        /// Source byte.
        value: u8,
        /// Byte found where its complement should be.
        complement: u8,
    },

    /// Status byte is neither OK nor ERROR.
    #[error("unexpected status byte 0x{status:02X}")]
    UnexpectedStatus {
        /// Status byte received.
        status: u8,
        /// The full reply.
        raw: Vec<u8>,
    },

    /// Channel number outside the addressable range.
    #[error("channel {0} is outside 1..=80")]
    ChannelOutOfRange(i64),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
