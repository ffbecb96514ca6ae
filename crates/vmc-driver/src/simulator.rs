//! In-process controller board.
//!
//! [`SimulatedBoard`] is a [`Transport`] that decodes each request the way
//! the board firmware does and answers with a checksummed reply. A
//! [`BoardHandle`] reaches the same state from outside, so tests can fit
//! channels, inject faults, silence commands or push stray bytes while a
//! controller owns the transport.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};
use vmc_protocol::{
    signed_to_byte, DoorState, Opcode, Operation, RequestFrame, ResponseFrame, AUX_DROP_DETECTED,
    CATALOG, CMD_CHANNEL_EXISTS_BASE, CMD_REPEAT_LAST_REPLY, DOOR_OPEN, GROUP_ID, MARKER_ACTIVE,
    MAX_CHANNEL, MECH_MOTOR_OPEN, MIN_CHANNEL, REQUEST_FRAME_SIZE, RESPONSE_FRAME_SIZE,
    STATUS_ERROR, STATUS_OK,
};

use crate::poller::DEFAULT_MAX_CHANNEL;
use crate::transport::{ReplySink, Transport, TransportError};

/// Fault byte reported when vending from an unfitted channel.
const FAULT_NO_MOTOR: u8 = MECH_MOTOR_OPEN << 4;

struct BoardState {
    open: bool,
    sink: Option<ReplySink>,
    channels: BTreeSet<u8>,
    faults: HashMap<u8, u8>,
    silent: HashSet<u8>,
    scripted: HashMap<u8, Vec<u8>>,
    settings: HashMap<Operation, u8>,
    temperature: i16,
    door: DoorState,
    drop_detected: bool,
    reply_delay: Duration,
    chunk_size: usize,
    fail_writes: bool,
    last_reply: Option<[u8; RESPONSE_FRAME_SIZE]>,
    requests: Vec<[u8; REQUEST_FRAME_SIZE]>,
}

impl BoardState {
    fn new(channels: BTreeSet<u8>) -> Self {
        BoardState {
            open: false,
            sink: None,
            channels,
            faults: HashMap::new(),
            silent: HashSet::new(),
            scripted: HashMap::new(),
            settings: HashMap::new(),
            temperature: 4,
            door: DoorState::Closed,
            drop_detected: true,
            reply_delay: Duration::ZERO,
            chunk_size: 0,
            fail_writes: false,
            last_reply: None,
            requests: Vec::new(),
        }
    }

    fn fitted(&self, channel: u8) -> bool {
        self.channels.contains(&channel)
    }

    /// Bytes to send back for one request, or `None` to stay silent.
    fn respond(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        let request = match RequestFrame::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "board ignoring malformed request");
                return None;
            }
        };
        if let Ok(raw) = <[u8; REQUEST_FRAME_SIZE]>::try_from(frame) {
            self.requests.push(raw);
        }

        if self.silent.contains(&request.cmd) {
            trace!(cmd = request.cmd, "board silent");
            return None;
        }
        if let Some(raw) = self.scripted.get(&request.cmd) {
            return Some(raw.clone());
        }

        let reply = self.handle(request);
        if request.cmd != CMD_REPEAT_LAST_REPLY {
            self.last_reply = Some(reply.encode());
        }
        Some(reply.encode().to_vec())
    }

    fn handle(&mut self, request: RequestFrame) -> ResponseFrame {
        let ok = |data: u8, aux: u8| ResponseFrame::new(GROUP_ID, STATUS_OK, data, aux);
        let error = |data: u8| ResponseFrame::new(GROUP_ID, STATUS_ERROR, data, 0x00);

        let cmd = request.cmd;
        let param = request.sub_param;

        if (MIN_CHANNEL..=MAX_CHANNEL).contains(&cmd) {
            if !self.fitted(cmd) {
                return error(FAULT_NO_MOTOR);
            }
            if let Some(&fault) = self.faults.get(&cmd) {
                return error(fault);
            }
            let aux = if param == MARKER_ACTIVE && self.drop_detected {
                AUX_DROP_DETECTED
            } else {
                0x00
            };
            return ok(0x00, aux);
        }

        let probe_range =
            CMD_CHANNEL_EXISTS_BASE + MIN_CHANNEL..=CMD_CHANNEL_EXISTS_BASE + MAX_CHANNEL;
        if probe_range.contains(&cmd) {
            return if self.fitted(cmd - CMD_CHANNEL_EXISTS_BASE) {
                ok(0x00, 0x00)
            } else {
                error(0x00)
            };
        }

        let Some(operation) = fixed_operation(cmd) else {
            debug!(cmd, "board rejecting unknown command");
            return error(0x00);
        };

        match operation {
            Operation::RepeatLastReply => match self.last_reply {
                Some(raw) => ResponseFrame::new(raw[0], raw[1], raw[2], raw[3]),
                None => ok(0x00, 0x00),
            },
            Operation::SetSpringType
            | Operation::SetBeltType
            | Operation::MakeSingle
            | Operation::MakeDouble => {
                if self.fitted(param) {
                    self.settings.insert(operation, param);
                    ok(0x00, 0x00)
                } else {
                    error(0x00)
                }
            }
            Operation::ReadTemperature => ok(signed_to_byte(self.temperature), 0x00),
            Operation::ReadDoor => {
                let data = if self.door == DoorState::Open {
                    DOOR_OPEN
                } else {
                    0x00
                };
                ok(data, 0x00)
            }
            Operation::OpenDoor => {
                self.door = DoorState::Open;
                ok(0x00, 0x00)
            }
            _ => {
                self.settings.insert(operation, param);
                ok(0x00, 0x00)
            }
        }
    }
}

fn fixed_operation(cmd: u8) -> Option<Operation> {
    CATALOG
        .iter()
        .find(|spec| spec.opcode == Opcode::Fixed(cmd))
        .map(|spec| spec.operation)
}

fn deliver(sink: &ReplySink, bytes: &[u8], chunk_size: usize) {
    if chunk_size == 0 {
        sink.deliver(bytes);
    } else {
        for chunk in bytes.chunks(chunk_size) {
            sink.deliver(chunk);
        }
    }
}

/// Simulated controller board.
pub struct SimulatedBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimulatedBoard {
    /// Board with channels `1..=60` fitted.
    pub fn new() -> Self {
        Self::with_channels(MIN_CHANNEL..=DEFAULT_MAX_CHANNEL as u8)
    }

    /// Board with the given channels fitted.
    pub fn with_channels(channels: impl IntoIterator<Item = u8>) -> Self {
        SimulatedBoard {
            state: Arc::new(Mutex::new(BoardState::new(channels.into_iter().collect()))),
        }
    }

    /// Handle for inspecting and steering the board.
    pub fn handle(&self) -> BoardHandle {
        BoardHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatedBoard {
    fn open(&mut self, sink: ReplySink) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.open = true;
        state.sink = Some(sink);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.open = false;
        state.sink = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )));
        }

        let Some(reply) = state.respond(frame) else {
            return Ok(());
        };
        let Some(sink) = state.sink.clone() else {
            return Ok(());
        };
        let delay = state.reply_delay;
        let chunk_size = state.chunk_size;
        drop(state);

        if delay.is_zero() {
            deliver(&sink, &reply, chunk_size);
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                deliver(&sink, &reply, chunk_size);
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}

/// Shared access to a [`SimulatedBoard`]'s state.
#[derive(Clone)]
pub struct BoardHandle {
    state: Arc<Mutex<BoardState>>,
}

impl BoardHandle {
    /// Fit a channel.
    pub fn install(&self, channel: u8) {
        self.state.lock().channels.insert(channel);
    }

    /// Remove a channel.
    pub fn remove(&self, channel: u8) {
        self.state.lock().channels.remove(&channel);
    }

    /// Fitted channels, ascending.
    pub fn channels(&self) -> Vec<u8> {
        self.state.lock().channels.iter().copied().collect()
    }

    /// Make vends on `channel` fail with the given fault byte.
    pub fn set_fault(&self, channel: u8, fault: u8) {
        self.state.lock().faults.insert(channel, fault);
    }

    /// Clear a channel's fault.
    pub fn clear_fault(&self, channel: u8) {
        self.state.lock().faults.remove(&channel);
    }

    /// Never answer requests with this command byte.
    pub fn silence(&self, cmd: u8) {
        self.state.lock().silent.insert(cmd);
    }

    /// Answer requests with this command byte again.
    pub fn unsilence(&self, cmd: u8) {
        self.state.lock().silent.remove(&cmd);
    }

    /// Answer this command byte with fixed raw bytes.
    pub fn script(&self, cmd: u8, reply: impl Into<Vec<u8>>) {
        self.state.lock().scripted.insert(cmd, reply.into());
    }

    /// Cabinet temperature reported by read-temperature.
    pub fn set_temperature(&self, celsius: i16) {
        self.state.lock().temperature = celsius;
    }

    /// Current door state.
    pub fn door(&self) -> DoorState {
        self.state.lock().door
    }

    /// Set the door state.
    pub fn set_door(&self, door: DoorState) {
        self.state.lock().door = door;
    }

    /// Whether drop-checked vends see the product fall.
    pub fn set_drop_detected(&self, detected: bool) {
        self.state.lock().drop_detected = detected;
    }

    /// Delay before each reply is sent.
    pub fn set_reply_delay(&self, delay: Duration) {
        self.state.lock().reply_delay = delay;
    }

    /// Split replies into chunks of this many bytes (0 sends whole frames).
    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.state.lock().chunk_size = chunk_size;
    }

    /// Make every write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Last parameter byte stored by a setting command.
    pub fn setting(&self, operation: Operation) -> Option<u8> {
        self.state.lock().settings.get(&operation).copied()
    }

    /// Request frames received so far.
    pub fn requests(&self) -> Vec<[u8; REQUEST_FRAME_SIZE]> {
        self.state.lock().requests.clone()
    }

    /// Number of request frames received so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Push bytes to the host as if the board had sent them unprompted.
    pub fn inject(&self, bytes: &[u8]) {
        let sink = self.state.lock().sink.clone();
        if let Some(sink) = sink {
            sink.deliver(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmc_protocol::{Channel, Command, ThermoMode};

    fn reply(state: &mut BoardState, command: Command) -> ResponseFrame {
        let bytes = state.respond(&command.encode()).unwrap();
        ResponseFrame::decode(&bytes).unwrap()
    }

    fn ch(n: i64) -> Channel {
        Channel::new(n).unwrap()
    }

    #[test]
    fn test_vend_and_drop_sensor() {
        let mut state = BoardState::new((1..=10).collect());
        let frame = reply(&mut state, Command::Vend { channel: ch(3) });
        assert!(frame.is_ok());
        assert_eq!(frame.aux, 0x00);

        let frame = reply(&mut state, Command::VendWithDropCheck { channel: ch(3) });
        assert_eq!(frame.aux, AUX_DROP_DETECTED);

        state.drop_detected = false;
        let frame = reply(&mut state, Command::VendWithDropCheck { channel: ch(3) });
        assert!(frame.is_ok());
        assert_eq!(frame.aux, 0x00);

        let frame = reply(&mut state, Command::Vend { channel: ch(11) });
        assert!(frame.is_error());
        assert_eq!(frame.data, FAULT_NO_MOTOR);
    }

    #[test]
    fn test_channel_probe() {
        let mut state = BoardState::new([1, 2, 5].into_iter().collect());
        assert!(reply(&mut state, Command::ChannelExists { channel: ch(5) }).is_ok());
        assert!(reply(&mut state, Command::ChannelExists { channel: ch(4) }).is_error());
    }

    #[test]
    fn test_repeat_last_reply() {
        let mut state = BoardState::new((1..=10).collect());
        state.faults.insert(2, 0x53);
        let vend = reply(&mut state, Command::Vend { channel: ch(2) });
        let echo = reply(&mut state, Command::RepeatLastReply);
        assert_eq!(echo, vend);
        let echo = reply(&mut state, Command::RepeatLastReply);
        assert_eq!(echo, vend);
    }

    #[test]
    fn test_settings_recorded() {
        let mut state = BoardState::new((1..=10).collect());
        reply(&mut state, Command::SetLighting { on: true });
        reply(&mut state, Command::SetThermoMode { mode: ThermoMode::Heating });
        reply(&mut state, Command::SetTemperature { celsius: -5 });
        assert_eq!(state.settings.get(&Operation::SetLighting), Some(&0xAA));
        assert_eq!(state.settings.get(&Operation::SetThermoMode), Some(&0x01));
        assert_eq!(state.settings.get(&Operation::SetTemperature), Some(&0xFB));
    }

    #[test]
    fn test_malformed_request_ignored() {
        let mut state = BoardState::new((1..=10).collect());
        assert!(state.respond(&[0x00, 0xFF, 0x01, 0x00, 0x55, 0xAA]).is_none());
        assert!(state.respond(&[0x00, 0xFF]).is_none());
        assert!(state.requests.is_empty());
    }

    #[test]
    fn test_door() {
        let mut state = BoardState::new(BTreeSet::new());
        assert_eq!(reply(&mut state, Command::ReadDoor).data, 0x00);
        reply(&mut state, Command::OpenDoor);
        assert_eq!(reply(&mut state, Command::ReadDoor).data, DOOR_OPEN);
    }
}
