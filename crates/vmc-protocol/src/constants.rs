//! Protocol constants
//!
//! These constants define the frame layout, status codes, marker bytes and
//! command codes used on the controller board's serial link.

// ============================================================================
// Frame Layout
// ============================================================================

/// Size of a request frame (host → board).
pub const REQUEST_FRAME_SIZE: usize = 6;
/// Size of a response frame (board → host).
pub const RESPONSE_FRAME_SIZE: usize = 5;
/// Group address. Reserved for multi-board buses; always zero in this deployment.
pub const GROUP_ID: u8 = 0x00;

// ============================================================================
// Status Codes (board → host)
// ============================================================================

/// Command accepted and executed.
pub const STATUS_OK: u8 = 0x5D;
/// Command failed; the data byte carries the fault nibbles.
pub const STATUS_ERROR: u8 = 0x5C;

// ============================================================================
// Marker Bytes
// ============================================================================

/// "No parameter" / "no drop check" / "off" marker.
pub const MARKER_NONE: u8 = 0x55;
/// "Drop check" / "enable" / "on" marker.
pub const MARKER_ACTIVE: u8 = 0xAA;
/// Aux byte reported when the drop sensor saw the item fall.
pub const AUX_DROP_DETECTED: u8 = 0xAA;
/// Data byte reported by the door sensor when the door is open.
pub const DOOR_OPEN: u8 = 0x01;
/// Plain boolean switch, on.
pub const SWITCH_ON: u8 = 0x01;
/// Plain boolean switch, off.
pub const SWITCH_OFF: u8 = 0x00;

// ============================================================================
// Channel Range
// ============================================================================

/// Lowest addressable channel.
pub const MIN_CHANNEL: u8 = 1;
/// Highest logical channel. Boards in the field implement at most 60.
pub const MAX_CHANNEL: u8 = 80;

// ============================================================================
// Command Codes (host → board)
// ============================================================================

// Vend commands have no fixed code: the command byte is the channel number
// itself (0x01..=0x50).

/// Run the board self-test.
pub const CMD_SELF_TEST: u8 = 0x64;
/// Reset every motor to its home position.
pub const CMD_RESET_ALL: u8 = 0x65;
/// Ask the board to resend its previous reply.
pub const CMD_REPEAT_LAST_REPLY: u8 = 0x66;
/// Configure one channel as a spring (coil) channel.
pub const CMD_SET_SPRING_TYPE: u8 = 0x68;
/// Configure one channel as a belt channel.
pub const CMD_SET_BELT_TYPE: u8 = 0x69;
/// Configure every channel as a spring channel.
pub const CMD_ALL_SPRING: u8 = 0x6A;
/// Configure every channel as a belt channel.
pub const CMD_ALL_BELT: u8 = 0x6B;

/// Base for channel-existence probes. The command byte is `base + channel`
/// (0x79..=0xC8).
pub const CMD_CHANNEL_EXISTS_BASE: u8 = 0x78;

/// Split a merged (double-width) channel back into single channels.
pub const CMD_MAKE_SINGLE: u8 = 0xC9;
/// Merge a channel with its right-hand neighbour into one double-width channel.
pub const CMD_MAKE_DOUBLE: u8 = 0xCA;
/// Split every merged channel.
pub const CMD_MAKE_ALL_SINGLE: u8 = 0xCB;

/// Cabinet temperature setpoint (signed °C).
pub const CMD_SET_TEMPERATURE: u8 = 0xCC;
/// Thermostat hysteresis (°C).
pub const CMD_SET_HYSTERESIS: u8 = 0xCD;
/// Sensor compensation offset (signed °C).
pub const CMD_SET_COMPENSATION: u8 = 0xCE;
/// Defrost duration (minutes).
pub const CMD_SET_DEFROST_MINUTES: u8 = 0xCF;
/// Maximum continuous compressor run (minutes).
pub const CMD_SET_COMPRESSOR_RUN_MINUTES: u8 = 0xD0;
/// Delay before the evaporator fan stops once the compressor idles (minutes).
pub const CMD_SET_FAN_IDLE_OFF_DELAY: u8 = 0xD1;
/// Enable or disable the thermostat.
pub const CMD_SET_TEMP_CONTROL: u8 = 0xD2;
/// Select cooling or heating.
pub const CMD_SET_THERMO_MODE: u8 = 0xD3;
/// Anti-fog glass heater.
pub const CMD_SET_GLASS_HEATER: u8 = 0xD4;

/// Read the cabinet temperature.
pub const CMD_READ_TEMPERATURE: u8 = 0xDC;
/// Cabinet lighting.
pub const CMD_SET_LIGHTING: u8 = 0xDD;
/// Buzzer.
pub const CMD_SET_BUZZER: u8 = 0xDE;
/// Read the door sensor.
pub const CMD_READ_DOOR: u8 = 0xDF;
/// Release the door lock.
pub const CMD_OPEN_DOOR: u8 = 0xE0;
/// Arm the tilt/shock accelerometer.
pub const CMD_ENABLE_ACCELEROMETER: u8 = 0xE1;

// ============================================================================
// Fault Nibbles (data byte of an ERROR reply)
// ============================================================================

/// Mechanical: no fault.
pub const MECH_OK: u8 = 0x0;
/// Mechanical: P-channel MOSFET shorted.
pub const MECH_P_MOSFET_SHORT: u8 = 0x1;
/// Mechanical: N-channel MOSFET shorted.
pub const MECH_N_MOSFET_SHORT: u8 = 0x2;
/// Mechanical: motor winding shorted.
pub const MECH_MOTOR_SHORT: u8 = 0x3;
/// Mechanical: motor open circuit.
pub const MECH_MOTOR_OPEN: u8 = 0x4;
/// Mechanical: motor did not complete its rotation in time.
pub const MECH_MOTOR_ROTATION_TIMEOUT: u8 = 0x5;

/// Optical: no fault.
pub const OPT_OK: u8 = 0x0;
/// Optical: beam triggered without a vend.
pub const OPT_FALSE_TRIGGER: u8 = 0x1;
/// Optical: no signal change when the emitter was toggled.
pub const OPT_NO_SIGNAL_ON_TOGGLE: u8 = 0x2;
/// Optical: beam stayed blocked for the whole vend.
pub const OPT_CONSTANT_SIGNAL_DURING_VEND: u8 = 0x3;

// ============================================================================
// Default Timeouts (milliseconds)
// ============================================================================

/// Motor-driven commands: a full spring/belt revolution plus margin.
pub const TIMEOUT_VEND_MS: u64 = 15_000;
/// Drop-check vends wait for the optical sensor window as well.
pub const TIMEOUT_VEND_DROP_CHECK_MS: u64 = 20_000;
/// Self-test cycles every installed motor.
pub const TIMEOUT_SELF_TEST_MS: u64 = 60_000;
/// Homing every motor.
pub const TIMEOUT_RESET_ALL_MS: u64 = 30_000;
/// Configuration writes that touch board EEPROM.
pub const TIMEOUT_CONFIG_MS: u64 = 3_000;
/// Plain reads and peripheral toggles.
pub const TIMEOUT_QUICK_MS: u64 = 1_000;
