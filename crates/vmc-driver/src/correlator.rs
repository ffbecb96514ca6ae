//! Request/response correlation over a half-duplex link.
//!
//! The board answers exactly one frame per request and has no request ids,
//! so at most one request may be outstanding. [`Correlator`] enforces that
//! with an explicit `LinkState`: a new request is admitted only from
//! `Idle`, and the link returns to `Idle` on reply, timeout, write failure or
//! loss of the link.
//! The pending request owns its reply timer, so finishing it always disarms
//! the timer exactly once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use vmc_metrics::{metric_defs, metrics, LinkLabels};
use vmc_protocol::{
    decode_controller_error, encode_request, ProtocolError, ResponseAssembler, ResponseFrame,
    RESPONSE_FRAME_SIZE, STATUS_ERROR, STATUS_OK,
};

use crate::error::{ControllerError, ControllerResult};
use crate::transport::{ReplySink, Transport};

/// One request to put on the wire.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Command byte.
    pub cmd: u8,
    /// Parameter byte.
    pub sub_param: u8,
    /// How long to wait for the complete reply.
    pub timeout: Duration,
    /// Human-readable description for logs and errors.
    pub description: String,
    /// Accept an ERROR status instead of failing.
    pub allow_status_error: bool,
    /// Operation name for metric labels.
    pub operation: &'static str,
}

enum Completion {
    Frame([u8; RESPONSE_FRAME_SIZE]),
    TimedOut { elapsed: Duration, partial: Vec<u8> },
    LinkDown { reason: String },
}

/// Timer armed for a pending request.
struct ReplyTimer(AbortHandle);

impl ReplyTimer {
    fn arm(shared: Arc<LinkShared>, id: u64, timeout: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            shared.expire(id);
        });
        ReplyTimer(handle.abort_handle())
    }

    fn cancel(self) {
        self.0.abort();
    }
}

struct PendingRequest {
    id: u64,
    description: String,
    operation: &'static str,
    started: Instant,
    timer: ReplyTimer,
    completion: oneshot::Sender<Completion>,
}

impl PendingRequest {
    /// Deliver a reply. Disarms the timer.
    fn complete(self, frame: [u8; RESPONSE_FRAME_SIZE], labels: &LinkLabels) {
        self.timer.cancel();
        let elapsed = self.started.elapsed();
        metrics::histogram!(
            metric_defs::LINK_ROUND_TRIP.name,
            &labels.with_operation(self.operation).to_labels()
        )
        .record(elapsed.as_secs_f64() * 1000.0);
        // The receiver is gone only if the caller's future was dropped.
        let _ = self.completion.send(Completion::Frame(frame));
    }

    /// Report expiry. The timer has already fired.
    fn expire(self, partial: Vec<u8>) {
        let elapsed = self.started.elapsed();
        let _ = self
            .completion
            .send(Completion::TimedOut { elapsed, partial });
    }

    /// Report that the link went down. Disarms the timer.
    fn fail(self, reason: String) {
        self.timer.cancel();
        let _ = self.completion.send(Completion::LinkDown { reason });
    }

    /// Drop without answering, e.g. when the write failed.
    fn abandon(self) {
        self.timer.cancel();
    }
}

enum LinkState {
    Idle,
    AwaitingReply(PendingRequest),
}

struct LinkInner {
    state: LinkState,
    assembler: ResponseAssembler,
    next_id: u64,
}

impl LinkInner {
    fn owns(&self, id: u64) -> bool {
        matches!(&self.state, LinkState::AwaitingReply(pending) if pending.id == id)
    }
}

/// State shared between the caller side, the receive path and reply timers.
pub(crate) struct LinkShared {
    inner: Mutex<LinkInner>,
    labels: LinkLabels,
}

impl LinkShared {
    fn new(labels: LinkLabels) -> Self {
        LinkShared {
            inner: Mutex::new(LinkInner {
                state: LinkState::Idle,
                assembler: ResponseAssembler::new(),
                next_id: 0,
            }),
            labels,
        }
    }

    fn set_busy(&self, busy: bool) {
        metrics::gauge!(metric_defs::LINK_BUSY.name, &self.labels.to_labels())
            .set(if busy { 1.0 } else { 0.0 });
    }

    /// Receive path: accumulate bytes and complete the pending request once
    /// a whole frame is buffered.
    pub(crate) fn on_bytes(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }

        let mut inner = self.inner.lock();
        let LinkInner {
            state, assembler, ..
        } = &mut *inner;

        if matches!(state, LinkState::Idle) {
            warn!(
                kind = "rx-unsolicited",
                hex = %hex::encode(chunk),
                "discarding bytes received with no request outstanding"
            );
            metrics::counter!(
                metric_defs::LINK_UNSOLICITED_BYTES.name,
                &self.labels.to_labels()
            )
            .increment(chunk.len() as u64);
            return;
        }

        assembler.push(chunk);
        debug!(
            kind = "rx",
            hex = %hex::encode(chunk),
            buffered = assembler.buffered_len(),
            "received bytes"
        );

        let Some(frame) = assembler.take_frame() else {
            return;
        };
        if assembler.buffered_len() > 0 {
            warn!(
                kind = "rx-trailing",
                hex = %hex::encode(assembler.buffered()),
                "bytes left over after reply frame"
            );
        }

        if let LinkState::AwaitingReply(pending) = std::mem::replace(state, LinkState::Idle) {
            debug!(
                kind = "rx-frame",
                description = %pending.description,
                hex = %hex::encode(frame),
                "reply complete"
            );
            self.set_busy(false);
            pending.complete(frame, &self.labels);
        }
    }

    /// Timer path. Only acts if `id` is still the outstanding request.
    fn expire(&self, id: u64) {
        let mut inner = self.inner.lock();
        if !inner.owns(id) {
            return;
        }
        let LinkState::AwaitingReply(pending) =
            std::mem::replace(&mut inner.state, LinkState::Idle)
        else {
            return;
        };

        let partial = inner.assembler.buffered().to_vec();
        inner.assembler.clear();
        drop(inner);
        self.set_busy(false);

        warn!(
            kind = "timeout",
            description = %pending.description,
            partial = %hex::encode(&partial),
            "no reply before timeout"
        );
        metrics::counter!(
            metric_defs::LINK_TIMEOUTS.name,
            &self.labels.with_operation(pending.operation).to_labels()
        )
        .increment(1);
        pending.expire(partial);
    }

    /// Write-failure path. Only acts if `id` is still the outstanding request.
    fn abandon(&self, id: u64) {
        let mut inner = self.inner.lock();
        if !inner.owns(id) {
            return;
        }
        let LinkState::AwaitingReply(pending) =
            std::mem::replace(&mut inner.state, LinkState::Idle)
        else {
            return;
        };
        drop(inner);
        self.set_busy(false);
        pending.abandon();
    }

    /// Link-down path, reported by the transport's I/O task.
    pub(crate) fn fail_pending(&self, reason: &str) {
        let mut inner = self.inner.lock();
        inner.assembler.clear();
        let LinkState::AwaitingReply(pending) =
            std::mem::replace(&mut inner.state, LinkState::Idle)
        else {
            return;
        };
        drop(inner);
        self.set_busy(false);

        warn!(
            kind = "link-down",
            description = %pending.description,
            reason,
            "link lost while awaiting reply"
        );
        metrics::counter!(
            metric_defs::LINK_PROTOCOL_ERRORS.name,
            &self.labels.with_operation(pending.operation).to_labels()
        )
        .increment(1);
        pending.fail(reason.to_string());
    }

    fn is_awaiting_reply(&self) -> bool {
        matches!(self.inner.lock().state, LinkState::AwaitingReply(_))
    }
}

/// Serializes requests over a [`Transport`] and matches replies to them.
pub struct Correlator<T: Transport> {
    transport: Mutex<T>,
    shared: Arc<LinkShared>,
}

impl<T: Transport> Correlator<T> {
    /// Wrap a transport. The link starts closed.
    pub fn new(transport: T) -> Self {
        let labels = LinkLabels::new(transport.describe());
        Correlator {
            transport: Mutex::new(transport),
            shared: Arc::new(LinkShared::new(labels)),
        }
    }

    /// Open the transport.
    pub fn open(&self) -> ControllerResult<()> {
        let sink = ReplySink {
            shared: self.shared.clone(),
        };
        self.transport
            .lock()
            .open(sink)
            .map_err(|e| ControllerError::PortNotOpen {
                reason: e.to_string(),
            })
    }

    /// Close the transport. Closing twice is harmless.
    pub fn close(&self) -> ControllerResult<()> {
        self.transport
            .lock()
            .close()
            .map_err(|e| ControllerError::PortNotOpen {
                reason: e.to_string(),
            })
    }

    /// Whether the transport is open.
    pub fn is_open(&self) -> bool {
        self.transport.lock().is_open()
    }

    /// Whether a request is waiting for its reply.
    pub fn is_awaiting_reply(&self) -> bool {
        self.shared.is_awaiting_reply()
    }

    /// Port path or address of the underlying transport.
    pub fn port(&self) -> &str {
        &self.shared.labels.port
    }

    /// Send one request and wait for its validated reply frame.
    ///
    /// Fails without touching the wire if the port is closed or another
    /// request is outstanding.
    pub async fn dispatch(&self, request: Dispatch) -> ControllerResult<ResponseFrame> {
        if request.timeout.is_zero() {
            return Err(ControllerError::InvalidTimeout { millis: 0.0 });
        }
        if !self.is_open() {
            return Err(ControllerError::PortNotOpen {
                reason: "port is closed".to_string(),
            });
        }

        let op_labels = self.shared.labels.with_operation(request.operation);
        let frame = encode_request(request.cmd, request.sub_param);
        let (tx, rx) = oneshot::channel();

        let id = {
            let mut inner = self.shared.inner.lock();
            if let LinkState::AwaitingReply(pending) = &inner.state {
                debug!(
                    kind = "rejected",
                    description = %request.description,
                    pending = %pending.description,
                    "request rejected while another is outstanding"
                );
                metrics::counter!(metric_defs::LINK_REJECTED.name, &op_labels.to_labels())
                    .increment(1);
                return Err(ControllerError::RequestInProgress {
                    pending: pending.description.clone(),
                    requested: request.description,
                });
            }

            let id = inner.next_id;
            inner.next_id = inner.next_id.wrapping_add(1);
            inner.state = LinkState::AwaitingReply(PendingRequest {
                id,
                description: request.description.clone(),
                operation: request.operation,
                started: Instant::now(),
                timer: ReplyTimer::arm(self.shared.clone(), id, request.timeout),
                completion: tx,
            });
            id
        };
        self.shared.set_busy(true);

        debug!(
            kind = "tx",
            description = %request.description,
            hex = %hex::encode(frame),
            "writing request"
        );
        let written = self.transport.lock().write(&frame);
        if let Err(e) = written {
            self.shared.abandon(id);
            warn!(
                kind = "tx-failed",
                description = %request.description,
                error = %e,
                "write rejected"
            );
            return Err(ControllerError::PortNotOpen {
                reason: e.to_string(),
            });
        }
        metrics::counter!(metric_defs::LINK_REQUESTS.name, &op_labels.to_labels()).increment(1);

        let completion = rx.await.map_err(|_| ControllerError::PortNotOpen {
            reason: "link dropped while awaiting reply".to_string(),
        })?;

        match completion {
            Completion::Frame(bytes) => {
                let result = validate(&bytes, &request);
                match &result {
                    Err(ControllerError::Controller { .. }) => {
                        metrics::counter!(
                            metric_defs::LINK_CONTROLLER_ERRORS.name,
                            &op_labels.to_labels()
                        )
                        .increment(1);
                    }
                    Err(_) => {
                        metrics::counter!(
                            metric_defs::LINK_PROTOCOL_ERRORS.name,
                            &op_labels.to_labels()
                        )
                        .increment(1);
                    }
                    Ok(_) => {}
                }
                result
            }
            Completion::TimedOut { elapsed, partial } => Err(ControllerError::CommTimeout {
                description: request.description,
                timeout_ms: request.timeout.as_millis() as u64,
                elapsed_ms: elapsed.as_millis() as u64,
                partial,
            }),
            Completion::LinkDown { reason } => Err(ControllerError::PortNotOpen { reason }),
        }
    }
}

impl<T: Transport> Drop for Correlator<T> {
    fn drop(&mut self) {
        let _ = self.transport.get_mut().close();
        let mut inner = self.shared.inner.lock();
        if let LinkState::AwaitingReply(pending) =
            std::mem::replace(&mut inner.state, LinkState::Idle)
        {
            pending.abandon();
        }
    }
}

/// Check a complete reply against the request it answers.
fn validate(bytes: &[u8], request: &Dispatch) -> ControllerResult<ResponseFrame> {
    let frame = ResponseFrame::decode(bytes)?;
    match frame.status {
        STATUS_OK => Ok(frame),
        STATUS_ERROR if request.allow_status_error => Ok(frame),
        STATUS_ERROR => {
            let fault = decode_controller_error(frame.data);
            warn!(
                kind = "controller-error",
                description = %request.description,
                hex = %frame.to_hex(),
                %fault,
                "controller reported a fault"
            );
            Err(ControllerError::Controller {
                description: request.description.clone(),
                fault,
                frame,
            })
        }
        status => Err(ProtocolError::UnexpectedStatus {
            status,
            raw: bytes.to_vec(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmc_protocol::GROUP_ID;

    fn request(allow_status_error: bool) -> Dispatch {
        Dispatch {
            cmd: 0x01,
            sub_param: 0x55,
            timeout: Duration::from_millis(100),
            description: "vend channel 1".to_string(),
            allow_status_error,
            operation: "vend",
        }
    }

    #[test]
    fn test_validate_ok() {
        let bytes = ResponseFrame::new(GROUP_ID, STATUS_OK, 0x00, 0x00).encode();
        let frame = validate(&bytes, &request(false)).unwrap();
        assert!(frame.is_ok());
    }

    #[test]
    fn test_validate_error_status() {
        let bytes = ResponseFrame::new(GROUP_ID, STATUS_ERROR, 0x53, 0x00).encode();
        match validate(&bytes, &request(false)) {
            Err(ControllerError::Controller { fault, .. }) => {
                assert_eq!(fault.mechanical.code(), 5);
                assert_eq!(fault.optical.code(), 3);
            }
            other => panic!("unexpected result {other:?}"),
        }

        let frame = validate(&bytes, &request(true)).unwrap();
        assert!(frame.is_error());
    }

    #[test]
    fn test_validate_unexpected_status() {
        let bytes = ResponseFrame::new(GROUP_ID, 0x42, 0x00, 0x00).encode();
        let err = validate(&bytes, &request(true)).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Protocol(ProtocolError::UnexpectedStatus { status: 0x42, .. })
        ));
    }

    #[test]
    fn test_validate_bad_checksum_before_status() {
        let err = validate(&[0x00, 0x42, 0x00, 0x00, 0x00], &request(false)).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Protocol(ProtocolError::BadChecksum { .. })
        ));
    }
}
