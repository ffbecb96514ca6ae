//! Operation descriptors.
//!
//! Every command the board understands is described by one row of
//! [`CATALOG`]: how its command byte and parameter are derived, how long the
//! board may take to answer, whether an ERROR status is a normal answer, and
//! how the reply is interpreted. Adding a command means adding a row and a
//! [`Command`](crate::Command) variant; the execution path is shared.

use crate::commands::{Argument, Command};
use crate::constants::*;
use crate::frame::ResponseFrame;
use crate::responses::{self, Reply};

/// How the command byte is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Constant command byte.
    Fixed(u8),
    /// `(base + channel) & 0xFF`.
    ChannelOffset(u8),
}

/// How the parameter byte is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRule {
    /// Constant marker.
    Fixed(u8),
    /// The channel number.
    Channel,
    /// The command's numeric value.
    Value,
    /// One of two markers. Each command has its own pair.
    Switch {
        /// Byte sent for "on".
        on: u8,
        /// Byte sent for "off".
        off: u8,
    },
}

/// Turns a validated reply frame into a typed result.
pub type Interpreter = fn(&Command, &ResponseFrame) -> Reply;

/// Catalog entries, one per [`Command`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// See [`Command::Vend`].
    Vend,
    /// See [`Command::VendWithDropCheck`].
    VendWithDropCheck,
    /// See [`Command::SelfTest`].
    SelfTest,
    /// See [`Command::ResetAll`].
    ResetAll,
    /// See [`Command::RepeatLastReply`].
    RepeatLastReply,
    /// See [`Command::SetSpringType`].
    SetSpringType,
    /// See [`Command::SetBeltType`].
    SetBeltType,
    /// See [`Command::AllSpring`].
    AllSpring,
    /// See [`Command::AllBelt`].
    AllBelt,
    /// See [`Command::MakeSingle`].
    MakeSingle,
    /// See [`Command::MakeDouble`].
    MakeDouble,
    /// See [`Command::MakeAllSingle`].
    MakeAllSingle,
    /// See [`Command::ChannelExists`].
    ChannelExists,
    /// See [`Command::SetTemperature`].
    SetTemperature,
    /// See [`Command::SetHysteresis`].
    SetHysteresis,
    /// See [`Command::SetCompensation`].
    SetCompensation,
    /// See [`Command::SetDefrostMinutes`].
    SetDefrostMinutes,
    /// See [`Command::SetCompressorRunMinutes`].
    SetCompressorRunMinutes,
    /// See [`Command::SetFanIdleOffDelay`].
    SetFanIdleOffDelay,
    /// See [`Command::SetGlassHeater`].
    SetGlassHeater,
    /// See [`Command::SetLighting`].
    SetLighting,
    /// See [`Command::SetBuzzer`].
    SetBuzzer,
    /// See [`Command::SetTempControl`].
    SetTempControl,
    /// See [`Command::SetThermoMode`].
    SetThermoMode,
    /// See [`Command::ReadTemperature`].
    ReadTemperature,
    /// See [`Command::ReadDoor`].
    ReadDoor,
    /// See [`Command::OpenDoor`].
    OpenDoor,
    /// See [`Command::EnableAccelerometer`].
    EnableAccelerometer,
}

impl Operation {
    /// The descriptor for this operation.
    pub fn spec(self) -> &'static OperationSpec {
        // CATALOG rows are declared in variant order.
        &CATALOG[self as usize]
    }

    /// Stable kebab-case name, used in logs and configuration.
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Look an operation up by its [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Operation> {
        CATALOG
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.operation)
    }

    /// Every operation, in catalog order.
    pub fn all() -> impl Iterator<Item = Operation> {
        CATALOG.iter().map(|spec| spec.operation)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One catalog row.
#[derive(Clone, Copy)]
pub struct OperationSpec {
    /// The operation this row describes.
    pub operation: Operation,
    /// Stable kebab-case name.
    pub name: &'static str,
    /// Command byte derivation.
    pub opcode: Opcode,
    /// Parameter byte derivation.
    pub param: ParamRule,
    /// Default reply timeout.
    pub timeout_ms: u64,
    /// Whether an ERROR status is passed to the interpreter instead of failing.
    pub allow_status_error: bool,
    /// Reply interpretation.
    pub interpret: Interpreter,
}

impl std::fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("opcode", &self.opcode)
            .field("param", &self.param)
            .field("timeout_ms", &self.timeout_ms)
            .field("allow_status_error", &self.allow_status_error)
            .finish_non_exhaustive()
    }
}

impl OperationSpec {
    /// Command byte for the given argument.
    pub fn cmd_byte(&self, argument: Argument) -> u8 {
        match (self.opcode, argument) {
            (Opcode::Fixed(cmd), _) => cmd,
            (Opcode::ChannelOffset(base), Argument::Channel(channel)) => {
                base.wrapping_add(channel.number())
            }
            // Only channel-addressed commands use offset opcodes.
            (Opcode::ChannelOffset(base), _) => base,
        }
    }

    /// Parameter byte for the given argument.
    pub fn sub_param(&self, argument: Argument) -> u8 {
        match (self.param, argument) {
            (ParamRule::Fixed(marker), _) => marker,
            (ParamRule::Channel, Argument::Channel(channel)) => channel.number(),
            (ParamRule::Value, Argument::Value(value)) => value,
            (ParamRule::Switch { on, off }, Argument::Switch(enabled)) => {
                if enabled {
                    on
                } else {
                    off
                }
            }
            _ => MARKER_NONE,
        }
    }
}

const fn row(
    operation: Operation,
    name: &'static str,
    opcode: Opcode,
    param: ParamRule,
    timeout_ms: u64,
    interpret: Interpreter,
) -> OperationSpec {
    OperationSpec {
        operation,
        name,
        opcode,
        param,
        timeout_ms,
        allow_status_error: false,
        interpret,
    }
}

const fn lenient(spec: OperationSpec) -> OperationSpec {
    OperationSpec {
        allow_status_error: true,
        ..spec
    }
}

const ON_OFF: ParamRule = ParamRule::Switch {
    on: SWITCH_ON,
    off: SWITCH_OFF,
};
const ACTIVE_NONE: ParamRule = ParamRule::Switch {
    on: MARKER_ACTIVE,
    off: MARKER_NONE,
};

/// The command catalog.
pub static CATALOG: [OperationSpec; 28] = {
    use responses::{interpret_ack, interpret_door, interpret_drop_check, interpret_echo};
    use responses::{interpret_presence, interpret_temperature, interpret_vend};
    use Opcode::*;
    use Operation as Op;
    use ParamRule::{Channel as Ch, Fixed as Mark, Value as Val};

    [
        row(Op::Vend, "vend", ChannelOffset(0x00), Mark(MARKER_NONE), TIMEOUT_VEND_MS, interpret_vend),
        row(Op::VendWithDropCheck, "vend-drop-check", ChannelOffset(0x00), Mark(MARKER_ACTIVE), TIMEOUT_VEND_DROP_CHECK_MS, interpret_drop_check),
        row(Op::SelfTest, "self-test", Fixed(CMD_SELF_TEST), Mark(MARKER_NONE), TIMEOUT_SELF_TEST_MS, interpret_ack),
        row(Op::ResetAll, "reset-all", Fixed(CMD_RESET_ALL), Mark(MARKER_NONE), TIMEOUT_RESET_ALL_MS, interpret_ack),
        lenient(row(Op::RepeatLastReply, "repeat-last-reply", Fixed(CMD_REPEAT_LAST_REPLY), Mark(MARKER_NONE), TIMEOUT_QUICK_MS, interpret_echo)),
        row(Op::SetSpringType, "set-spring-type", Fixed(CMD_SET_SPRING_TYPE), Ch, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetBeltType, "set-belt-type", Fixed(CMD_SET_BELT_TYPE), Ch, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::AllSpring, "all-spring", Fixed(CMD_ALL_SPRING), Mark(MARKER_NONE), TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::AllBelt, "all-belt", Fixed(CMD_ALL_BELT), Mark(MARKER_NONE), TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::MakeSingle, "make-single", Fixed(CMD_MAKE_SINGLE), Ch, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::MakeDouble, "make-double", Fixed(CMD_MAKE_DOUBLE), Ch, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::MakeAllSingle, "make-all-single", Fixed(CMD_MAKE_ALL_SINGLE), Mark(MARKER_NONE), TIMEOUT_CONFIG_MS, interpret_ack),
        lenient(row(Op::ChannelExists, "channel-exists", ChannelOffset(CMD_CHANNEL_EXISTS_BASE), Ch, TIMEOUT_QUICK_MS, interpret_presence)),
        row(Op::SetTemperature, "set-temperature", Fixed(CMD_SET_TEMPERATURE), Val, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetHysteresis, "set-hysteresis", Fixed(CMD_SET_HYSTERESIS), Val, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetCompensation, "set-compensation", Fixed(CMD_SET_COMPENSATION), Val, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetDefrostMinutes, "set-defrost-minutes", Fixed(CMD_SET_DEFROST_MINUTES), Val, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetCompressorRunMinutes, "set-compressor-run-minutes", Fixed(CMD_SET_COMPRESSOR_RUN_MINUTES), Val, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetFanIdleOffDelay, "set-fan-idle-off-delay", Fixed(CMD_SET_FAN_IDLE_OFF_DELAY), Val, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetGlassHeater, "set-glass-heater", Fixed(CMD_SET_GLASS_HEATER), ON_OFF, TIMEOUT_QUICK_MS, interpret_ack),
        row(Op::SetLighting, "set-lighting", Fixed(CMD_SET_LIGHTING), ACTIVE_NONE, TIMEOUT_QUICK_MS, interpret_ack),
        row(Op::SetBuzzer, "set-buzzer", Fixed(CMD_SET_BUZZER), ON_OFF, TIMEOUT_QUICK_MS, interpret_ack),
        row(Op::SetTempControl, "set-temp-control", Fixed(CMD_SET_TEMP_CONTROL), ON_OFF, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::SetThermoMode, "set-thermo-mode", Fixed(CMD_SET_THERMO_MODE), Val, TIMEOUT_CONFIG_MS, interpret_ack),
        row(Op::ReadTemperature, "read-temperature", Fixed(CMD_READ_TEMPERATURE), Mark(MARKER_NONE), TIMEOUT_QUICK_MS, interpret_temperature),
        row(Op::ReadDoor, "read-door", Fixed(CMD_READ_DOOR), Mark(MARKER_NONE), TIMEOUT_QUICK_MS, interpret_door),
        row(Op::OpenDoor, "open-door", Fixed(CMD_OPEN_DOOR), Mark(MARKER_ACTIVE), TIMEOUT_QUICK_MS, interpret_ack),
        row(Op::EnableAccelerometer, "enable-accelerometer", Fixed(CMD_ENABLE_ACCELEROMETER), Mark(MARKER_ACTIVE), TIMEOUT_QUICK_MS, interpret_ack),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rows_follow_variant_order() {
        for (index, spec) in CATALOG.iter().enumerate() {
            assert_eq!(spec.operation as usize, index, "{} is out of order", spec.name);
            assert_eq!(spec.operation.spec().name, spec.name);
        }
    }

    #[test]
    fn test_names_unique_and_resolvable() {
        let names: HashSet<_> = CATALOG.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), CATALOG.len());
        for operation in Operation::all() {
            assert_eq!(Operation::from_name(operation.name()), Some(operation));
        }
        assert_eq!(Operation::from_name("factory-reset"), None);
    }

    #[test]
    fn test_fixed_opcodes_do_not_overlap_channel_ranges() {
        let vend_range = MIN_CHANNEL..=MAX_CHANNEL;
        let exists_range =
            CMD_CHANNEL_EXISTS_BASE + MIN_CHANNEL..=CMD_CHANNEL_EXISTS_BASE + MAX_CHANNEL;
        let mut seen = HashSet::new();
        for spec in CATALOG.iter() {
            if let Opcode::Fixed(cmd) = spec.opcode {
                assert!(!vend_range.contains(&cmd), "{} collides with vend", spec.name);
                assert!(!exists_range.contains(&cmd), "{} collides with probe", spec.name);
                assert!(seen.insert(cmd), "{} reuses 0x{:02X}", spec.name, cmd);
            }
        }
    }

    #[test]
    fn test_only_echo_and_probe_accept_error_status() {
        let lenient: Vec<_> = CATALOG
            .iter()
            .filter(|spec| spec.allow_status_error)
            .map(|spec| spec.operation)
            .collect();
        assert_eq!(lenient, vec![Operation::RepeatLastReply, Operation::ChannelExists]);
    }

    #[test]
    fn test_timeouts_positive() {
        assert!(CATALOG.iter().all(|spec| spec.timeout_ms > 0));
    }
}
