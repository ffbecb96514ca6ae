//! Error taxonomy for the driver.
//!
//! Every failure maps onto one of seven [`ErrorCode`]s so that callers (and
//! any façade in front of them) can tell a broken wire protocol from a jammed
//! dispenser without parsing messages.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use vmc_protocol::{ControllerFault, ProtocolError, ResponseFrame};

/// Closed set of failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The link is closed or refused the write.
    PortNotOpen,
    /// No complete reply arrived in time.
    CommTimeout,
    /// Reply had the wrong number of bytes.
    ProtocolBadLength,
    /// Reply (or request) failed its redundancy check.
    ProtocolBadChecksum,
    /// Reply status was neither OK nor ERROR.
    ProtocolUnexpectedStatus,
    /// Rejected locally before anything was sent.
    InvalidArgument,
    /// The board reported a mechanical or optical fault.
    ControllerError,
}

impl ErrorCode {
    /// Wire-style name, e.g. `COMM_TIMEOUT`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PortNotOpen => "PORT_NOT_OPEN",
            ErrorCode::CommTimeout => "COMM_TIMEOUT",
            ErrorCode::ProtocolBadLength => "PROTOCOL_BAD_LENGTH",
            ErrorCode::ProtocolBadChecksum => "PROTOCOL_BAD_CHECKSUM",
            ErrorCode::ProtocolUnexpectedStatus => "PROTOCOL_UNEXPECTED_STATUS",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::ControllerError => "CONTROLLER_ERROR",
        }
    }

    /// Fixed English description.
    pub const fn description(&self) -> &'static str {
        match self {
            ErrorCode::PortNotOpen => "Serial port is not open",
            ErrorCode::CommTimeout => "Timed out waiting for the controller to reply",
            ErrorCode::ProtocolBadLength => "Reply frame has the wrong length",
            ErrorCode::ProtocolBadChecksum => "Reply frame failed its checksum",
            ErrorCode::ProtocolUnexpectedStatus => "Reply frame carries an unknown status byte",
            ErrorCode::InvalidArgument => "Invalid argument",
            ErrorCode::ControllerError => "Controller reported a fault",
        }
    }

    /// Whether this code describes a malformed or unexpected frame.
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            ErrorCode::ProtocolBadLength
                | ErrorCode::ProtocolBadChecksum
                | ErrorCode::ProtocolUnexpectedStatus
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the driver.
#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    /// The transport is closed or refused the frame.
    #[error("serial port is not open: {reason}")]
    PortNotOpen {
        /// What the transport reported.
        reason: String,
    },

    /// A request was already awaiting its reply.
    #[error("another request in progress: {pending}")]
    RequestInProgress {
        /// Description of the outstanding request.
        pending: String,
        /// Description of the rejected request.
        requested: String,
    },

    /// Timeout that is zero, negative or not finite.
    #[error("invalid timeout {millis} ms: must be finite and greater than zero")]
    InvalidTimeout {
        /// The rejected value.
        millis: f64,
    },

    /// No complete reply arrived in time.
    #[error("no reply to {description} within {timeout_ms} ms")]
    CommTimeout {
        /// Description of the request.
        description: String,
        /// Timeout that was armed.
        timeout_ms: u64,
        /// Time actually waited.
        elapsed_ms: u64,
        /// Bytes of a partial reply discarded at expiry.
        partial: Vec<u8>,
    },

    /// Frame-level validation failure, or a channel outside the logical range.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The board answered with an ERROR status.
    #[error("controller fault during {description}: {fault}")]
    Controller {
        /// Description of the request.
        description: String,
        /// Decoded fault nibbles.
        fault: ControllerFault,
        /// The reply frame.
        frame: ResponseFrame,
    },
}

impl ControllerError {
    /// The taxonomy code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ControllerError::PortNotOpen { .. } => ErrorCode::PortNotOpen,
            ControllerError::RequestInProgress { .. } | ControllerError::InvalidTimeout { .. } => {
                ErrorCode::InvalidArgument
            }
            ControllerError::CommTimeout { .. } => ErrorCode::CommTimeout,
            ControllerError::Protocol(err) => match err {
                ProtocolError::BadLength { .. } => ErrorCode::ProtocolBadLength,
                ProtocolError::BadChecksum { .. } | ProtocolError::BadComplement { .. } => {
                    ErrorCode::ProtocolBadChecksum
                }
                ProtocolError::UnexpectedStatus { .. } => ErrorCode::ProtocolUnexpectedStatus,
                ProtocolError::ChannelOutOfRange(_) => ErrorCode::InvalidArgument,
            },
            ControllerError::Controller { .. } => ErrorCode::ControllerError,
        }
    }

    /// The reply bytes that caused this error, when there were any.
    pub fn raw_reply(&self) -> Option<&[u8]> {
        match self {
            ControllerError::Protocol(ProtocolError::BadLength { raw, .. })
            | ControllerError::Protocol(ProtocolError::BadChecksum { raw, .. })
            | ControllerError::Protocol(ProtocolError::UnexpectedStatus { raw, .. }) => {
                Some(raw.as_slice())
            }
            ControllerError::Controller { frame, .. } => Some(&frame.raw),
            _ => None,
        }
    }

    /// Structured context for logs and façades.
    pub fn details(&self) -> Value {
        match self {
            ControllerError::PortNotOpen { reason } => json!({ "reason": reason }),
            ControllerError::RequestInProgress { pending, requested } => json!({
                "reason": "another request in progress",
                "pending": pending,
                "requested": requested,
            }),
            ControllerError::InvalidTimeout { millis } => json!({
                "reason": "timeout must be finite and greater than zero",
                "timeoutMs": millis,
            }),
            ControllerError::CommTimeout {
                description,
                timeout_ms,
                elapsed_ms,
                partial,
            } => json!({
                "description": description,
                "timeoutMs": timeout_ms,
                "elapsedMs": elapsed_ms,
                "partialBytes": hex::encode(partial),
            }),
            ControllerError::Protocol(err) => protocol_details(err),
            ControllerError::Controller {
                description,
                fault,
                frame,
            } => json!({
                "description": description,
                "status": frame.status,
                "data": frame.data,
                "aux": frame.aux,
                "fault": fault.summary(),
            }),
        }
    }

    /// Serializable summary.
    pub fn report(&self) -> ErrorReport {
        let code = self.code();
        ErrorReport {
            code,
            message: code.description(),
            detail: self.to_string(),
            details: self.details(),
            raw_reply: self.raw_reply().map(hex::encode),
        }
    }
}

fn protocol_details(err: &ProtocolError) -> Value {
    match err {
        ProtocolError::BadLength {
            expected, actual, ..
        } => json!({ "expectedLength": expected, "actualLength": actual }),
        ProtocolError::BadChecksum {
            expected, actual, ..
        } => json!({ "expectedChecksum": expected, "actualChecksum": actual }),
        ProtocolError::BadComplement {
            offset,
            value,
            complement,
        } => json!({ "offset": offset, "value": value, "complement": complement }),
        ProtocolError::UnexpectedStatus { status, .. } => json!({ "status": status }),
        ProtocolError::ChannelOutOfRange(channel) => json!({
            "reason": "channel must be an integer in 1..=80",
            "channel": channel,
        }),
    }
}

/// Serializable form of a [`ControllerError`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Taxonomy code.
    pub code: ErrorCode,
    /// Fixed description of the code.
    pub message: &'static str,
    /// Specific description of this occurrence.
    pub detail: String,
    /// Structured context.
    pub details: Value,
    /// Offending reply as hex, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_reply: Option<String>,
}

/// Result type alias for driver operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vmc_protocol::{decode_controller_error, GROUP_ID, STATUS_ERROR};

    #[test]
    fn test_codes() {
        let err = ControllerError::RequestInProgress {
            pending: "vend channel 1".into(),
            requested: "read-door".into(),
        };
        assert_eq!(err.code(), ErrorCode::InvalidArgument);

        let err = ControllerError::from(ProtocolError::ChannelOutOfRange(81));
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.raw_reply().is_none());

        let err = ControllerError::from(ProtocolError::UnexpectedStatus {
            status: 0x42,
            raw: vec![0x00, 0x42, 0x00, 0x00, 0x42],
        });
        assert_eq!(err.code(), ErrorCode::ProtocolUnexpectedStatus);
        assert!(err.code().is_protocol());
        assert_eq!(err.raw_reply(), Some(&[0x00, 0x42, 0x00, 0x00, 0x42][..]));
    }

    #[test]
    fn test_controller_error_report() {
        let frame = vmc_protocol::ResponseFrame::new(GROUP_ID, STATUS_ERROR, 0x53, 0x00);
        let err = ControllerError::Controller {
            description: "vend channel 7".into(),
            fault: decode_controller_error(frame.data),
            frame,
        };
        let report = err.report();
        assert_eq!(report.code, ErrorCode::ControllerError);
        assert_eq!(report.message, "Controller reported a fault");
        assert_eq!(report.details["fault"]["mechanicalText"], "motor rotation timeout");
        assert_eq!(report.details["fault"]["opticalCode"], 3);
        assert_eq!(report.raw_reply.as_deref(), Some("005c5300af"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["code"], "CONTROLLER_ERROR");
        assert_eq!(json["rawReply"], "005c5300af");
    }

    #[test]
    fn test_timeout_details() {
        let err = ControllerError::CommTimeout {
            description: "read-temperature".into(),
            timeout_ms: 1000,
            elapsed_ms: 1001,
            partial: vec![0x00, 0x5D],
        };
        let details = err.details();
        assert_eq!(details["description"], "read-temperature");
        assert_eq!(details["elapsedMs"], 1001);
        assert_eq!(details["partialBytes"], "005d");
        assert_eq!(err.code().as_str(), "COMM_TIMEOUT");
    }
}
