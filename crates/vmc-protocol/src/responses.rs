//! Typed interpretation of board replies.
//!
//! Interpreters only ever see frames that already passed checksum and status
//! validation, so they cannot fail.

use serde::Serialize;

use crate::commands::Command;
use crate::constants::*;
use crate::frame::ResponseFrame;
use crate::types::*;

/// Typed result of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Reply {
    /// Command acknowledged; nothing further to report.
    Ack {
        /// Operation name.
        operation: &'static str,
        /// The reply frame.
        frame: ResponseFrame,
    },

    /// A vend completed.
    Vend(VendReply),

    /// Result of a channel-existence probe.
    #[serde(rename_all = "camelCase")]
    ChannelPresence {
        /// Probed channel.
        channel: Channel,
        /// Whether the channel is fitted.
        exists: bool,
        /// The reply frame.
        frame: ResponseFrame,
    },

    /// Cabinet temperature.
    Temperature {
        /// Temperature in °C.
        celsius: i16,
        /// The reply frame.
        frame: ResponseFrame,
    },

    /// Door sensor.
    Door {
        /// Door state.
        state: DoorState,
        /// The reply frame.
        frame: ResponseFrame,
    },

    /// The board's previous reply, resent. Its status may be ERROR.
    #[serde(rename_all = "camelCase")]
    Echo {
        /// Whether the echoed reply carried an ERROR status.
        status_error: bool,
        /// The echoed frame.
        frame: ResponseFrame,
    },
}

impl Reply {
    /// The frame this reply was interpreted from.
    pub fn frame(&self) -> &ResponseFrame {
        match self {
            Reply::Ack { frame, .. }
            | Reply::ChannelPresence { frame, .. }
            | Reply::Temperature { frame, .. }
            | Reply::Door { frame, .. }
            | Reply::Echo { frame, .. } => frame,
            Reply::Vend(vend) => &vend.frame,
        }
    }
}

/// Outcome of a vend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendReply {
    /// Channel that was driven.
    pub channel: Channel,
    /// Whether the drop sensor was consulted.
    pub drop_checked: bool,
    /// Drop sensor verdict; `None` when it was not consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<bool>,
    /// The reply frame.
    pub frame: ResponseFrame,
}

pub(crate) fn interpret_ack(command: &Command, frame: &ResponseFrame) -> Reply {
    Reply::Ack {
        operation: command.spec().name,
        frame: *frame,
    }
}

pub(crate) fn interpret_vend(command: &Command, frame: &ResponseFrame) -> Reply {
    match command.channel() {
        Some(channel) => Reply::Vend(VendReply {
            channel,
            drop_checked: false,
            dropped: None,
            frame: *frame,
        }),
        None => interpret_ack(command, frame),
    }
}

pub(crate) fn interpret_drop_check(command: &Command, frame: &ResponseFrame) -> Reply {
    match command.channel() {
        Some(channel) => Reply::Vend(VendReply {
            channel,
            drop_checked: true,
            // 0x00 means the motor turned but nothing crossed the beam.
            dropped: Some(frame.aux == AUX_DROP_DETECTED),
            frame: *frame,
        }),
        None => interpret_ack(command, frame),
    }
}

pub(crate) fn interpret_presence(command: &Command, frame: &ResponseFrame) -> Reply {
    match command.channel() {
        Some(channel) => Reply::ChannelPresence {
            channel,
            exists: frame.is_ok(),
            frame: *frame,
        },
        None => interpret_ack(command, frame),
    }
}

pub(crate) fn interpret_temperature(_command: &Command, frame: &ResponseFrame) -> Reply {
    Reply::Temperature {
        celsius: temperature_from_byte(frame.data),
        frame: *frame,
    }
}

pub(crate) fn interpret_door(_command: &Command, frame: &ResponseFrame) -> Reply {
    Reply::Door {
        state: DoorState::from(frame.data),
        frame: *frame,
    }
}

pub(crate) fn interpret_echo(_command: &Command, frame: &ResponseFrame) -> Reply {
    Reply::Echo {
        status_error: frame.is_error(),
        frame: *frame,
    }
}
