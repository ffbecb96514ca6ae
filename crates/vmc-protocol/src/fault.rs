//! Decoding of the fault byte carried by ERROR replies.
//!
//! The high nibble reports the motor drive, the low nibble the drop sensor.
//! Boards have been seen to set nibble values outside the documented tables;
//! those decode as `Unknown` rather than failing.

use serde::Serialize;

use crate::constants::*;

/// Text used for nibble values outside the documented tables.
pub const UNKNOWN_FAULT_TEXT: &str = "unknown";

/// Motor drive fault (high nibble).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanicalFault {
    /// No fault.
    Ok,
    /// P-channel MOSFET shorted.
    PMosfetShort,
    /// N-channel MOSFET shorted.
    NMosfetShort,
    /// Motor winding shorted.
    MotorShort,
    /// Motor open circuit.
    MotorOpen,
    /// Motor did not finish its rotation in time.
    MotorRotationTimeout,
    /// Undocumented code.
    Unknown(u8),
}

impl MechanicalFault {
    /// The raw nibble.
    pub fn code(&self) -> u8 {
        match self {
            MechanicalFault::Ok => MECH_OK,
            MechanicalFault::PMosfetShort => MECH_P_MOSFET_SHORT,
            MechanicalFault::NMosfetShort => MECH_N_MOSFET_SHORT,
            MechanicalFault::MotorShort => MECH_MOTOR_SHORT,
            MechanicalFault::MotorOpen => MECH_MOTOR_OPEN,
            MechanicalFault::MotorRotationTimeout => MECH_MOTOR_ROTATION_TIMEOUT,
            MechanicalFault::Unknown(code) => *code,
        }
    }

    /// Human-readable description.
    pub fn text(&self) -> &'static str {
        match self {
            MechanicalFault::Ok => "OK",
            MechanicalFault::PMosfetShort => "P-MOSFET short",
            MechanicalFault::NMosfetShort => "N-MOSFET short",
            MechanicalFault::MotorShort => "motor short",
            MechanicalFault::MotorOpen => "motor open",
            MechanicalFault::MotorRotationTimeout => "motor rotation timeout",
            MechanicalFault::Unknown(_) => UNKNOWN_FAULT_TEXT,
        }
    }
}

impl From<u8> for MechanicalFault {
    fn from(code: u8) -> Self {
        match code {
            MECH_OK => MechanicalFault::Ok,
            MECH_P_MOSFET_SHORT => MechanicalFault::PMosfetShort,
            MECH_N_MOSFET_SHORT => MechanicalFault::NMosfetShort,
            MECH_MOTOR_SHORT => MechanicalFault::MotorShort,
            MECH_MOTOR_OPEN => MechanicalFault::MotorOpen,
            MECH_MOTOR_ROTATION_TIMEOUT => MechanicalFault::MotorRotationTimeout,
            _ => MechanicalFault::Unknown(code),
        }
    }
}

impl std::fmt::Display for MechanicalFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Drop sensor fault (low nibble).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpticalFault {
    /// No fault.
    Ok,
    /// Beam interrupted with no vend in progress.
    FalseTrigger,
    /// No response when the emitter was toggled.
    NoSignalOnToggle,
    /// Beam blocked for the whole vend window.
    ConstantSignalDuringVend,
    /// Undocumented code.
    Unknown(u8),
}

impl OpticalFault {
    /// The raw nibble.
    pub fn code(&self) -> u8 {
        match self {
            OpticalFault::Ok => OPT_OK,
            OpticalFault::FalseTrigger => OPT_FALSE_TRIGGER,
            OpticalFault::NoSignalOnToggle => OPT_NO_SIGNAL_ON_TOGGLE,
            OpticalFault::ConstantSignalDuringVend => OPT_CONSTANT_SIGNAL_DURING_VEND,
            OpticalFault::Unknown(code) => *code,
        }
    }

    /// Human-readable description.
    pub fn text(&self) -> &'static str {
        match self {
            OpticalFault::Ok => "OK",
            OpticalFault::FalseTrigger => "false trigger",
            OpticalFault::NoSignalOnToggle => "no signal on toggle",
            OpticalFault::ConstantSignalDuringVend => "constant signal during vend",
            OpticalFault::Unknown(_) => UNKNOWN_FAULT_TEXT,
        }
    }
}

impl From<u8> for OpticalFault {
    fn from(code: u8) -> Self {
        match code {
            OPT_OK => OpticalFault::Ok,
            OPT_FALSE_TRIGGER => OpticalFault::FalseTrigger,
            OPT_NO_SIGNAL_ON_TOGGLE => OpticalFault::NoSignalOnToggle,
            OPT_CONSTANT_SIGNAL_DURING_VEND => OpticalFault::ConstantSignalDuringVend,
            _ => OpticalFault::Unknown(code),
        }
    }
}

impl std::fmt::Display for OpticalFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Both halves of a decoded fault byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerFault {
    /// High nibble.
    pub mechanical: MechanicalFault,
    /// Low nibble.
    pub optical: OpticalFault,
}

impl ControllerFault {
    /// Flattened view for structured error details.
    pub fn summary(&self) -> FaultSummary {
        FaultSummary {
            mechanical_code: self.mechanical.code(),
            mechanical_text: self.mechanical.text(),
            optical_code: self.optical.code(),
            optical_text: self.optical.text(),
        }
    }
}

impl std::fmt::Display for ControllerFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mechanical: {}, optical: {}", self.mechanical, self.optical)
    }
}

/// Serializable form of [`ControllerFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultSummary {
    /// High nibble.
    pub mechanical_code: u8,
    /// Description of the high nibble.
    pub mechanical_text: &'static str,
    /// Low nibble.
    pub optical_code: u8,
    /// Description of the low nibble.
    pub optical_text: &'static str,
}

/// Split a fault byte into its mechanical and optical halves.
pub fn decode_controller_error(data: u8) -> ControllerFault {
    let fault = ControllerFault {
        mechanical: MechanicalFault::from((data >> 4) & 0x0F),
        optical: OpticalFault::from(data & 0x0F),
    };
    if matches!(fault.mechanical, MechanicalFault::Unknown(_))
        || matches!(fault.optical, OpticalFault::Unknown(_))
    {
        log::debug!("undocumented fault nibble in data byte 0x{:02X}", data);
    }
    fault
}
