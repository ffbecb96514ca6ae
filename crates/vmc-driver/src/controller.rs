//! Catalog-driven command execution.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};
use vmc_protocol::{Channel, Command, Operation, Reply};

use crate::correlator::{Correlator, Dispatch};
use crate::error::{ControllerError, ControllerResult};
use crate::poller::{poll_channels, ChannelProbe, PollOptions};
use crate::transport::Transport;

/// Convert a millisecond timeout, rejecting zero, negative, non-finite and
/// unrepresentably large values.
pub fn timeout_from_millis(millis: f64) -> ControllerResult<Duration> {
    if !(millis.is_finite() && millis > 0.0) {
        return Err(ControllerError::InvalidTimeout { millis });
    }
    Duration::try_from_secs_f64(millis / 1000.0)
        .map_err(|_| ControllerError::InvalidTimeout { millis })
}

/// Per-operation reply timeouts.
///
/// Starts from each catalog row's default; entries set here replace it.
#[derive(Debug, Clone, Default)]
pub struct TimeoutTable {
    overrides: HashMap<Operation, Duration>,
}

impl TimeoutTable {
    /// Catalog defaults only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default for one operation.
    pub fn set(&mut self, operation: Operation, timeout: Duration) -> ControllerResult<()> {
        if timeout.is_zero() {
            return Err(ControllerError::InvalidTimeout { millis: 0.0 });
        }
        self.overrides.insert(operation, timeout);
        Ok(())
    }

    /// Timeout for `operation`.
    pub fn get(&self, operation: Operation) -> Duration {
        self.overrides
            .get(&operation)
            .copied()
            .unwrap_or_else(|| Duration::from_millis(operation.spec().timeout_ms))
    }
}

/// A vending controller board behind a transport.
pub struct VendingController<T: Transport> {
    link: Correlator<T>,
    timeouts: TimeoutTable,
}

impl<T: Transport> VendingController<T> {
    /// Controller using the catalog's default timeouts.
    pub fn new(transport: T) -> Self {
        Self::with_timeouts(transport, TimeoutTable::default())
    }

    /// Controller with overridden timeouts.
    pub fn with_timeouts(transport: T, timeouts: TimeoutTable) -> Self {
        VendingController {
            link: Correlator::new(transport),
            timeouts,
        }
    }

    /// Open the link.
    pub fn open(&self) -> ControllerResult<()> {
        self.link.open()?;
        info!(port = %self.link.port(), "controller link open");
        Ok(())
    }

    /// Close the link. Idempotent.
    pub fn close(&self) -> ControllerResult<()> {
        self.link.close()
    }

    /// Whether the link is open.
    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Whether a request is waiting for its reply.
    pub fn is_busy(&self) -> bool {
        self.link.is_awaiting_reply()
    }

    /// The underlying correlator.
    pub fn link(&self) -> &Correlator<T> {
        &self.link
    }

    /// Effective timeout for `operation`.
    pub fn timeout_for(&self, operation: Operation) -> Duration {
        self.timeouts.get(operation)
    }

    /// Run a command with its configured timeout.
    pub async fn execute(&self, command: Command) -> ControllerResult<Reply> {
        let timeout = self.timeout_for(command.operation());
        self.execute_with_timeout(command, timeout).await
    }

    /// Run a command with an explicit timeout.
    pub async fn execute_with_timeout(
        &self,
        command: Command,
        timeout: Duration,
    ) -> ControllerResult<Reply> {
        if timeout.is_zero() {
            return Err(ControllerError::InvalidTimeout { millis: 0.0 });
        }

        let spec = command.spec();
        let argument = command.argument();
        let description = command.describe();
        debug!(operation = spec.name, %description, ?timeout, "executing");

        let frame = self
            .link
            .dispatch(Dispatch {
                cmd: spec.cmd_byte(argument),
                sub_param: spec.sub_param(argument),
                timeout,
                description,
                allow_status_error: spec.allow_status_error,
                operation: spec.name,
            })
            .await?;

        Ok((spec.interpret)(&command, &frame))
    }

    /// Probe one channel. A board ERROR means "not fitted".
    pub async fn channel_exists(
        &self,
        channel: Channel,
        timeout: Duration,
    ) -> ControllerResult<bool> {
        match self
            .execute_with_timeout(Command::ChannelExists { channel }, timeout)
            .await?
        {
            Reply::ChannelPresence { exists, .. } => Ok(exists),
            other => Ok(other.frame().is_ok()),
        }
    }

    /// Probe channels `1..=max_channel` in turn.
    pub async fn poll_channels(&self, options: PollOptions) -> ControllerResult<Vec<ChannelProbe>> {
        poll_channels(self, options).await
    }
}
