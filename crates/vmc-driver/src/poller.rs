//! Sequential channel-existence scan.
//!
//! Probes channels one at a time, waiting between probes so the board is
//! never asked twice at once. A failed probe is recorded against its channel
//! and the scan carries on.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use vmc_protocol::{Channel, MAX_CHANNEL, MIN_CHANNEL};

use crate::controller::VendingController;
use crate::error::{ControllerError, ControllerResult, ErrorCode, ErrorReport};
use crate::transport::Transport;

/// Default highest channel probed.
pub const DEFAULT_MAX_CHANNEL: i64 = 60;
/// Default pause between probes.
pub const DEFAULT_INTER_CHANNEL_DELAY: Duration = Duration::from_millis(50);
/// Default timeout for each probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Highest channel to probe, clamped to `1..=80`.
    pub max_channel: i64,
    /// Pause before every probe after the first.
    pub inter_channel_delay: Duration,
    /// Reply timeout for each probe.
    pub per_request_timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            max_channel: DEFAULT_MAX_CHANNEL,
            inter_channel_delay: DEFAULT_INTER_CHANNEL_DELAY,
            per_request_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl PollOptions {
    /// `max_channel` clamped to the logical channel range.
    pub fn effective_max_channel(&self) -> u8 {
        self.max_channel.clamp(MIN_CHANNEL as i64, MAX_CHANNEL as i64) as u8
    }
}

/// How a probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeOutcome {
    /// The board answered, with OK or ERROR status.
    Ok,
    /// No reply in time.
    Timeout,
    /// The board reported a fault.
    ControllerError,
    /// Malformed reply or a local failure.
    ProtocolError,
}

impl ProbeOutcome {
    fn classify(err: &ControllerError) -> Self {
        match err.code() {
            ErrorCode::CommTimeout => ProbeOutcome::Timeout,
            ErrorCode::ControllerError => ProbeOutcome::ControllerError,
            _ => ProbeOutcome::ProtocolError,
        }
    }
}

/// Result for one channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProbe {
    /// Probed channel.
    pub channel: Channel,
    /// Whether the board confirmed the channel is fitted.
    pub exists: bool,
    /// How the probe ended.
    pub outcome: ProbeOutcome,
    /// The failure, when the probe did not end `Ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

/// Probe channels `1..=options.max_channel` in ascending order.
///
/// Returns one entry per channel. Only invalid options fail the whole scan.
pub async fn poll_channels<T: Transport>(
    controller: &VendingController<T>,
    options: PollOptions,
) -> ControllerResult<Vec<ChannelProbe>> {
    if options.per_request_timeout.is_zero() {
        return Err(ControllerError::InvalidTimeout { millis: 0.0 });
    }

    let max_channel = options.effective_max_channel();
    let mut probes = Vec::with_capacity(max_channel as usize);

    for number in MIN_CHANNEL..=max_channel {
        if number > MIN_CHANNEL && !options.inter_channel_delay.is_zero() {
            tokio::time::sleep(options.inter_channel_delay).await;
        }

        let channel = Channel::new(number as i64)?;
        let probe = match controller
            .channel_exists(channel, options.per_request_timeout)
            .await
        {
            Ok(exists) => ChannelProbe {
                channel,
                exists,
                outcome: ProbeOutcome::Ok,
                error: None,
            },
            Err(err) => {
                debug!(%channel, error = %err, "probe failed");
                ChannelProbe {
                    channel,
                    exists: false,
                    outcome: ProbeOutcome::classify(&err),
                    error: Some(err.report()),
                }
            }
        };
        probes.push(probe);
    }

    let fitted = probes.iter().filter(|probe| probe.exists).count();
    let failed = probes
        .iter()
        .filter(|probe| probe.outcome != ProbeOutcome::Ok)
        .count();
    info!(probed = probes.len(), fitted, failed, "channel scan finished");

    Ok(probes)
}
