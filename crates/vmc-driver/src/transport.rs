//! Byte transports underneath the correlator.
//!
//! A [`Transport`] writes request frames and pushes whatever it receives
//! into the [`ReplySink`] it was opened with. It knows nothing about frame
//! boundaries; reassembly happens in the correlator.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::correlator::LinkShared;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is not open.
    #[error("link is closed")]
    Closed,

    /// Socket or device I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The serial device could not be configured.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
}

/// Receiving end of a link.
///
/// Cloned into reader tasks; each received chunk is handed to the
/// correlator in arrival order.
#[derive(Clone)]
pub struct ReplySink {
    pub(crate) shared: Arc<LinkShared>,
}

impl ReplySink {
    /// Deliver bytes received from the board.
    pub fn deliver(&self, chunk: &[u8]) {
        self.shared.on_bytes(chunk);
    }

    /// Report that the link went down. An outstanding request fails with
    /// `PORT_NOT_OPEN` instead of waiting for its timeout.
    pub fn fail(&self, reason: &str) {
        self.shared.fail_pending(reason);
    }
}

impl std::fmt::Debug for ReplySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySink").finish_non_exhaustive()
    }
}

/// A byte-oriented full-duplex link to a controller board.
pub trait Transport: Send + 'static {
    /// Open the link. Received bytes go to `sink`.
    fn open(&mut self, sink: ReplySink) -> Result<(), TransportError>;

    /// Close the link. Closing a closed link is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Whether the link is open.
    fn is_open(&self) -> bool;

    /// Queue a frame for sending.
    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Port path or address, for logs and metric labels.
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, sink: ReplySink) -> Result<(), TransportError> {
        (**self).open(sink)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).write(frame)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
