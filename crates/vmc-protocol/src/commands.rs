//! Commands that can be sent to the controller board.

use crate::catalog::{Operation, OperationSpec};
use crate::constants::*;
use crate::frame::RequestFrame;
use crate::types::*;

/// Commands that can be sent to the controller board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Dispense from a channel without consulting the drop sensor.
    Vend {
        /// Channel to dispense from.
        channel: Channel,
    },

    /// Dispense from a channel and report whether the drop sensor saw the item.
    VendWithDropCheck {
        /// Channel to dispense from.
        channel: Channel,
    },

    /// Run the board self-test.
    SelfTest,

    /// Home every motor.
    ResetAll,

    /// Resend the previous reply. May legitimately echo an ERROR status.
    RepeatLastReply,

    /// Configure a channel as a spring channel.
    SetSpringType {
        /// Channel to configure.
        channel: Channel,
    },

    /// Configure a channel as a belt channel.
    SetBeltType {
        /// Channel to configure.
        channel: Channel,
    },

    /// Configure every channel as a spring channel.
    AllSpring,

    /// Configure every channel as a belt channel.
    AllBelt,

    /// Split a merged channel.
    MakeSingle {
        /// Channel to split.
        channel: Channel,
    },

    /// Merge a channel with its neighbour.
    MakeDouble {
        /// Left-hand channel of the pair.
        channel: Channel,
    },

    /// Split every merged channel.
    MakeAllSingle,

    /// Probe whether a channel is fitted. An ERROR status means "not fitted".
    ChannelExists {
        /// Channel to probe.
        channel: Channel,
    },

    /// Set the cabinet temperature setpoint.
    SetTemperature {
        /// Setpoint in °C.
        celsius: i16,
    },

    /// Set the thermostat hysteresis.
    SetHysteresis {
        /// Band width in °C.
        celsius: u8,
    },

    /// Set the sensor compensation offset.
    SetCompensation {
        /// Offset in °C.
        celsius: i16,
    },

    /// Set the defrost duration.
    SetDefrostMinutes {
        /// Duration in minutes.
        minutes: u8,
    },

    /// Set the maximum continuous compressor run.
    SetCompressorRunMinutes {
        /// Duration in minutes.
        minutes: u8,
    },

    /// Set how long the fan keeps running after the compressor stops.
    SetFanIdleOffDelay {
        /// Delay in minutes.
        minutes: u8,
    },

    /// Switch the glass heater.
    SetGlassHeater {
        /// Heater on.
        on: bool,
    },

    /// Switch the cabinet lighting.
    SetLighting {
        /// Lights on.
        on: bool,
    },

    /// Switch the buzzer.
    SetBuzzer {
        /// Buzzer on.
        on: bool,
    },

    /// Enable or disable the thermostat.
    SetTempControl {
        /// Thermostat enabled.
        enabled: bool,
    },

    /// Select cooling or heating.
    SetThermoMode {
        /// Thermostat direction.
        mode: ThermoMode,
    },

    /// Read the cabinet temperature.
    ReadTemperature,

    /// Read the door sensor.
    ReadDoor,

    /// Release the door lock.
    OpenDoor,

    /// Arm the accelerometer.
    EnableAccelerometer,
}

/// The variable part of a command, fed to its descriptor's derivation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    /// Fixed-parameter command.
    None,
    /// Channel-addressed command.
    Channel(Channel),
    /// Numeric setting, already masked to a byte.
    Value(u8),
    /// On/off setting.
    Switch(bool),
}

impl Command {
    /// The catalog entry for this command.
    pub fn operation(&self) -> Operation {
        match self {
            Command::Vend { .. } => Operation::Vend,
            Command::VendWithDropCheck { .. } => Operation::VendWithDropCheck,
            Command::SelfTest => Operation::SelfTest,
            Command::ResetAll => Operation::ResetAll,
            Command::RepeatLastReply => Operation::RepeatLastReply,
            Command::SetSpringType { .. } => Operation::SetSpringType,
            Command::SetBeltType { .. } => Operation::SetBeltType,
            Command::AllSpring => Operation::AllSpring,
            Command::AllBelt => Operation::AllBelt,
            Command::MakeSingle { .. } => Operation::MakeSingle,
            Command::MakeDouble { .. } => Operation::MakeDouble,
            Command::MakeAllSingle => Operation::MakeAllSingle,
            Command::ChannelExists { .. } => Operation::ChannelExists,
            Command::SetTemperature { .. } => Operation::SetTemperature,
            Command::SetHysteresis { .. } => Operation::SetHysteresis,
            Command::SetCompensation { .. } => Operation::SetCompensation,
            Command::SetDefrostMinutes { .. } => Operation::SetDefrostMinutes,
            Command::SetCompressorRunMinutes { .. } => Operation::SetCompressorRunMinutes,
            Command::SetFanIdleOffDelay { .. } => Operation::SetFanIdleOffDelay,
            Command::SetGlassHeater { .. } => Operation::SetGlassHeater,
            Command::SetLighting { .. } => Operation::SetLighting,
            Command::SetBuzzer { .. } => Operation::SetBuzzer,
            Command::SetTempControl { .. } => Operation::SetTempControl,
            Command::SetThermoMode { .. } => Operation::SetThermoMode,
            Command::ReadTemperature => Operation::ReadTemperature,
            Command::ReadDoor => Operation::ReadDoor,
            Command::OpenDoor => Operation::OpenDoor,
            Command::EnableAccelerometer => Operation::EnableAccelerometer,
        }
    }

    /// The descriptor that drives encoding and interpretation.
    pub fn spec(&self) -> &'static OperationSpec {
        self.operation().spec()
    }

    /// The variable part of the command.
    pub fn argument(&self) -> Argument {
        match *self {
            Command::Vend { channel }
            | Command::VendWithDropCheck { channel }
            | Command::SetSpringType { channel }
            | Command::SetBeltType { channel }
            | Command::MakeSingle { channel }
            | Command::MakeDouble { channel }
            | Command::ChannelExists { channel } => Argument::Channel(channel),

            Command::SetTemperature { celsius } | Command::SetCompensation { celsius } => {
                Argument::Value(signed_to_byte(celsius))
            }
            Command::SetHysteresis { celsius } => Argument::Value(celsius),
            Command::SetDefrostMinutes { minutes }
            | Command::SetCompressorRunMinutes { minutes }
            | Command::SetFanIdleOffDelay { minutes } => Argument::Value(minutes),
            Command::SetThermoMode { mode } => Argument::Value(mode.into()),

            Command::SetGlassHeater { on }
            | Command::SetLighting { on }
            | Command::SetBuzzer { on } => Argument::Switch(on),
            Command::SetTempControl { enabled } => Argument::Switch(enabled),

            Command::SelfTest
            | Command::ResetAll
            | Command::RepeatLastReply
            | Command::AllSpring
            | Command::AllBelt
            | Command::MakeAllSingle
            | Command::ReadTemperature
            | Command::ReadDoor
            | Command::OpenDoor
            | Command::EnableAccelerometer => Argument::None,
        }
    }

    /// The channel this command addresses, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self.argument() {
            Argument::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    /// Build the request frame.
    pub fn request(&self) -> RequestFrame {
        let spec = self.spec();
        let argument = self.argument();
        RequestFrame::new(spec.cmd_byte(argument), spec.sub_param(argument))
    }

    /// Encode the command as wire bytes.
    pub fn encode(&self) -> [u8; REQUEST_FRAME_SIZE] {
        self.request().encode()
    }

    /// Short description for logs and error details.
    pub fn describe(&self) -> String {
        let name = self.spec().name;
        match self.argument() {
            Argument::None => name.to_string(),
            Argument::Channel(channel) => format!("{} channel {}", name, channel),
            Argument::Value(value) => format!("{} 0x{:02X}", name, value),
            Argument::Switch(on) => format!("{} {}", name, if on { "on" } else { "off" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(n: i64) -> Channel {
        Channel::new(n).unwrap()
    }

    #[test]
    fn test_vend_encoding() {
        let cmd = Command::Vend { channel: ch(12) };
        assert_eq!(cmd.encode(), [0x00, 0xFF, 0x0C, 0xF3, 0x55, 0xAA]);

        let cmd = Command::VendWithDropCheck { channel: ch(12) };
        assert_eq!(cmd.encode(), [0x00, 0xFF, 0x0C, 0xF3, 0xAA, 0x55]);
    }

    #[test]
    fn test_channel_exists_encoding() {
        let cmd = Command::ChannelExists { channel: ch(5) };
        let request = cmd.request();
        assert_eq!(request.cmd, 0x7D);
        assert_eq!(request.sub_param, 5);

        let request = Command::ChannelExists { channel: ch(80) }.request();
        assert_eq!(request.cmd, 0xC8);
    }

    #[test]
    fn test_topology_uses_channel_parameter() {
        let request = Command::MakeDouble { channel: ch(7) }.request();
        assert_eq!(request.cmd, CMD_MAKE_DOUBLE);
        assert_eq!(request.sub_param, 7);

        let request = Command::SetBeltType { channel: ch(33) }.request();
        assert_eq!(request.cmd, CMD_SET_BELT_TYPE);
        assert_eq!(request.sub_param, 33);
    }

    #[test]
    fn test_fixed_parameter_commands() {
        for cmd in [
            Command::SelfTest,
            Command::ResetAll,
            Command::AllSpring,
            Command::AllBelt,
            Command::MakeAllSingle,
        ] {
            assert_eq!(cmd.request().sub_param, MARKER_NONE, "{:?}", cmd);
        }
        assert_eq!(Command::OpenDoor.request().sub_param, MARKER_ACTIVE);
        assert_eq!(Command::EnableAccelerometer.request().sub_param, MARKER_ACTIVE);
    }

    #[test]
    fn test_signed_setpoint_is_masked() {
        let request = Command::SetTemperature { celsius: -5 }.request();
        assert_eq!(request.cmd, CMD_SET_TEMPERATURE);
        assert_eq!(request.sub_param, 0xFB);

        let request = Command::SetCompensation { celsius: 2 }.request();
        assert_eq!(request.sub_param, 0x02);
    }

    #[test]
    fn test_switch_markers_are_per_command() {
        assert_eq!(Command::SetLighting { on: true }.request().sub_param, MARKER_ACTIVE);
        assert_eq!(Command::SetLighting { on: false }.request().sub_param, MARKER_NONE);
        assert_eq!(Command::SetBuzzer { on: true }.request().sub_param, SWITCH_ON);
        assert_eq!(Command::SetBuzzer { on: false }.request().sub_param, SWITCH_OFF);
        assert_eq!(Command::SetGlassHeater { on: true }.request().sub_param, SWITCH_ON);
        assert_eq!(
            Command::SetTempControl { enabled: false }.request().sub_param,
            SWITCH_OFF
        );
    }

    #[test]
    fn test_thermo_mode() {
        let heating = Command::SetThermoMode { mode: ThermoMode::Heating }.request();
        let cooling = Command::SetThermoMode { mode: ThermoMode::Cooling }.request();
        assert_eq!(heating.sub_param, 0x01);
        assert_eq!(cooling.sub_param, 0x00);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Command::Vend { channel: ch(3) }.describe(), "vend channel 3");
        assert_eq!(Command::SetLighting { on: true }.describe(), "set-lighting on");
        assert_eq!(Command::ReadDoor.describe(), "read-door");
        assert_eq!(Command::SetDefrostMinutes { minutes: 20 }.describe(), "set-defrost-minutes 0x14");
    }
}
