//! Command-line definitions.
//!
//! One subcommand per catalog operation, named as in the catalog, plus
//! `poll` for the channel scan.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use vmc_driver::{ControllerConfig, LinkConfig, PollOptions, DEFAULT_BAUD_RATE};
use vmc_protocol::{Channel, Command, ProtocolResult, ThermoMode};

/// Drive a vending machine controller board over its serial link.
#[derive(Debug, Parser)]
#[command(name = "vmc", author, version, about)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Serial device, overriding the configured link
    #[arg(long, global = true, conflicts_with_all = ["tcp", "simulate"])]
    pub port: Option<String>,

    /// Baud rate for --port
    #[arg(long, global = true, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// UART-over-TCP bridge address (host:port), overriding the configured link
    #[arg(long, global = true, conflicts_with = "simulate")]
    pub tcp: Option<String>,

    /// Talk to an in-process simulated board
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Reply timeout in milliseconds, replacing the operation default
    #[arg(long, global = true)]
    pub timeout_ms: Option<f64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CommandArgs,
}

/// On/off argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(switch: Switch) -> bool {
        switch == Switch::On
    }
}

/// Refrigeration mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Cooling,
    Heating,
}

impl From<ModeArg> for ThermoMode {
    fn from(mode: ModeArg) -> ThermoMode {
        match mode {
            ModeArg::Cooling => ThermoMode::Cooling,
            ModeArg::Heating => ThermoMode::Heating,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CommandArgs {
    /// Dispense from a channel
    Vend { channel: i64 },
    /// Dispense from a channel and report the drop sensor verdict
    VendDropCheck { channel: i64 },
    /// Run the board self-test
    SelfTest,
    /// Reset every channel
    ResetAll,
    /// Ask the board to resend its previous reply
    RepeatLastReply,
    /// Configure a channel as a spring channel
    SetSpringType { channel: i64 },
    /// Configure a channel as a belt channel
    SetBeltType { channel: i64 },
    /// Configure every channel as spring
    AllSpring,
    /// Configure every channel as belt
    AllBelt,
    /// Pair a channel's motor as single
    MakeSingle { channel: i64 },
    /// Pair a channel with its neighbour
    MakeDouble { channel: i64 },
    /// Make every channel single
    MakeAllSingle,
    /// Check whether a channel is fitted
    ChannelExists { channel: i64 },
    /// Set the target temperature (°C)
    SetTemperature {
        #[arg(allow_hyphen_values = true)]
        celsius: i16,
    },
    /// Set the temperature hysteresis (°C)
    SetHysteresis { celsius: u8 },
    /// Set the temperature sensor compensation (°C)
    SetCompensation {
        #[arg(allow_hyphen_values = true)]
        celsius: i16,
    },
    /// Set the defrost duration (minutes)
    SetDefrostMinutes { minutes: u8 },
    /// Set the compressor run time (minutes)
    SetCompressorRunMinutes { minutes: u8 },
    /// Set the fan idle-off delay (minutes)
    SetFanIdleOffDelay { minutes: u8 },
    /// Switch the glass heater
    SetGlassHeater { state: Switch },
    /// Switch the cabinet lighting
    SetLighting { state: Switch },
    /// Switch the buzzer
    SetBuzzer { state: Switch },
    /// Switch temperature control
    SetTempControl { state: Switch },
    /// Select cooling or heating
    SetThermoMode { mode: ModeArg },
    /// Read the cabinet temperature
    ReadTemperature,
    /// Read the door sensor
    ReadDoor,
    /// Unlock the door
    OpenDoor,
    /// Enable the accelerometer
    EnableAccelerometer,
    /// Probe channels in turn and report which are fitted
    Poll {
        /// Highest channel to probe
        #[arg(long, allow_hyphen_values = true)]
        max_channel: Option<i64>,
        /// Pause between probes in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
}

/// What the invocation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Execute(Command),
    Poll(PollOptions),
}

impl CommandArgs {
    /// Resolve into an action, validating channel numbers.
    pub fn action(&self, poll_defaults: PollOptions) -> ProtocolResult<Action> {
        let ch = Channel::new;
        let command = match *self {
            CommandArgs::Vend { channel } => Command::Vend { channel: ch(channel)? },
            CommandArgs::VendDropCheck { channel } => Command::VendWithDropCheck {
                channel: ch(channel)?,
            },
            CommandArgs::SelfTest => Command::SelfTest,
            CommandArgs::ResetAll => Command::ResetAll,
            CommandArgs::RepeatLastReply => Command::RepeatLastReply,
            CommandArgs::SetSpringType { channel } => Command::SetSpringType {
                channel: ch(channel)?,
            },
            CommandArgs::SetBeltType { channel } => Command::SetBeltType {
                channel: ch(channel)?,
            },
            CommandArgs::AllSpring => Command::AllSpring,
            CommandArgs::AllBelt => Command::AllBelt,
            CommandArgs::MakeSingle { channel } => Command::MakeSingle {
                channel: ch(channel)?,
            },
            CommandArgs::MakeDouble { channel } => Command::MakeDouble {
                channel: ch(channel)?,
            },
            CommandArgs::MakeAllSingle => Command::MakeAllSingle,
            CommandArgs::ChannelExists { channel } => Command::ChannelExists {
                channel: ch(channel)?,
            },
            CommandArgs::SetTemperature { celsius } => Command::SetTemperature { celsius },
            CommandArgs::SetHysteresis { celsius } => Command::SetHysteresis { celsius },
            CommandArgs::SetCompensation { celsius } => Command::SetCompensation { celsius },
            CommandArgs::SetDefrostMinutes { minutes } => Command::SetDefrostMinutes { minutes },
            CommandArgs::SetCompressorRunMinutes { minutes } => {
                Command::SetCompressorRunMinutes { minutes }
            }
            CommandArgs::SetFanIdleOffDelay { minutes } => Command::SetFanIdleOffDelay { minutes },
            CommandArgs::SetGlassHeater { state } => Command::SetGlassHeater { on: state.into() },
            CommandArgs::SetLighting { state } => Command::SetLighting { on: state.into() },
            CommandArgs::SetBuzzer { state } => Command::SetBuzzer { on: state.into() },
            CommandArgs::SetTempControl { state } => Command::SetTempControl {
                enabled: state.into(),
            },
            CommandArgs::SetThermoMode { mode } => Command::SetThermoMode { mode: mode.into() },
            CommandArgs::ReadTemperature => Command::ReadTemperature,
            CommandArgs::ReadDoor => Command::ReadDoor,
            CommandArgs::OpenDoor => Command::OpenDoor,
            CommandArgs::EnableAccelerometer => Command::EnableAccelerometer,
            CommandArgs::Poll {
                max_channel,
                delay_ms,
            } => {
                let mut options = poll_defaults;
                if let Some(max_channel) = max_channel {
                    options.max_channel = max_channel;
                }
                if let Some(delay_ms) = delay_ms {
                    options.inter_channel_delay = Duration::from_millis(delay_ms);
                }
                return Ok(Action::Poll(options));
            }
        };
        Ok(Action::Execute(command))
    }
}

impl Cli {
    /// Apply link flags on top of a loaded configuration.
    pub fn apply_link_overrides(&self, config: &mut ControllerConfig) {
        if self.simulate {
            if !matches!(config.link, LinkConfig::Simulated { .. }) {
                config.link = LinkConfig::Simulated {
                    channels: vmc_driver::DEFAULT_MAX_CHANNEL as u8,
                };
            }
        } else if let Some(path) = &self.port {
            config.link = LinkConfig::Serial {
                path: path.clone(),
                baud_rate: self.baud,
            };
        } else if let Some(address) = &self.tcp {
            config.link = LinkConfig::Tcp {
                address: address.clone(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use vmc_protocol::Operation;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vmc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_every_operation_has_a_subcommand() {
        let command = Cli::command();
        for operation in Operation::all() {
            assert!(
                command.find_subcommand(operation.name()).is_some(),
                "missing subcommand {}",
                operation.name()
            );
        }
        assert!(command.find_subcommand("poll").is_some());
    }

    #[test]
    fn test_vend_action() {
        let cli = parse(&["--simulate", "vend-drop-check", "12"]);
        assert!(cli.simulate);
        let action = cli.command.action(PollOptions::default()).unwrap();
        match action {
            Action::Execute(command) => {
                assert_eq!(command.encode(), [0x00, 0xFF, 0x0C, 0xF3, 0xAA, 0x55]);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_channel_out_of_range() {
        let cli = parse(&["vend", "81"]);
        assert!(cli.command.action(PollOptions::default()).is_err());
        let cli = parse(&["channel-exists", "0"]);
        assert!(cli.command.action(PollOptions::default()).is_err());
    }

    #[test]
    fn test_negative_temperature() {
        let cli = parse(&["set-temperature", "-5"]);
        let action = cli.command.action(PollOptions::default()).unwrap();
        assert_eq!(
            action,
            Action::Execute(Command::SetTemperature { celsius: -5 })
        );
    }

    #[test]
    fn test_switch_arguments() {
        let cli = parse(&["set-lighting", "off"]);
        let action = cli.command.action(PollOptions::default()).unwrap();
        assert_eq!(action, Action::Execute(Command::SetLighting { on: false }));

        let cli = parse(&["set-thermo-mode", "heating"]);
        let action = cli.command.action(PollOptions::default()).unwrap();
        assert_eq!(
            action,
            Action::Execute(Command::SetThermoMode {
                mode: ThermoMode::Heating
            })
        );
    }

    #[test]
    fn test_poll_overrides() {
        let cli = parse(&["poll", "--max-channel", "20", "--delay-ms", "5"]);
        match cli.command.action(PollOptions::default()).unwrap() {
            Action::Poll(options) => {
                assert_eq!(options.max_channel, 20);
                assert_eq!(options.inter_channel_delay, Duration::from_millis(5));
                assert_eq!(options.per_request_timeout, Duration::from_millis(1000));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_link_overrides() {
        let mut config = ControllerConfig::default();
        parse(&["--tcp", "10.0.0.2:4001", "read-door"]).apply_link_overrides(&mut config);
        assert_eq!(
            config.link,
            LinkConfig::Tcp {
                address: "10.0.0.2:4001".to_string()
            }
        );

        parse(&["--port", "/dev/ttyS2", "--baud", "19200", "read-door"])
            .apply_link_overrides(&mut config);
        assert_eq!(
            config.link,
            LinkConfig::Serial {
                path: "/dev/ttyS2".to_string(),
                baud_rate: 19200
            }
        );

        assert!(Cli::try_parse_from(["vmc", "--port", "/dev/ttyS2", "--simulate", "read-door"]).is_err());
    }
}
