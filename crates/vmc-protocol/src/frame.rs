//! Frame encoding/decoding utilities.
//!
//! Requests carry every meaningful byte twice, the second copy complemented:
//!
//! ```text
//! +-------+--------+-----+------+-----------+------------+
//! | group | ~group | cmd | ~cmd | sub_param | ~sub_param |
//! +-------+--------+-----+------+-----------+------------+
//! ```
//!
//! Responses are a fixed five bytes closed by an additive checksum:
//!
//! ```text
//! +-------+--------+------+-----+----------------------------------+
//! | group | status | data | aux | (group + status + data + aux) & FF |
//! +-------+--------+------+-----+----------------------------------+
//! ```

use bytes::{Buf, BytesMut};

use crate::constants::*;
use crate::error::*;

/// Redundancy byte paired with `value` in a request.
pub const fn complement(value: u8) -> u8 {
    0xFF - value
}

/// Additive checksum over the first four response bytes.
pub fn checksum(group_id: u8, status: u8, data: u8, aux: u8) -> u8 {
    group_id
        .wrapping_add(status)
        .wrapping_add(data)
        .wrapping_add(aux)
}

/// Encode a request for the deployment's group.
pub fn encode_request(cmd: u8, sub_param: u8) -> [u8; REQUEST_FRAME_SIZE] {
    RequestFrame::new(cmd, sub_param).encode()
}

/// Decode and validate a response.
pub fn decode_response(bytes: &[u8]) -> ProtocolResult<ResponseFrame> {
    ResponseFrame::decode(bytes)
}

/// A host → board request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    /// Group address.
    pub group_id: u8,
    /// Command byte.
    pub cmd: u8,
    /// Command parameter.
    pub sub_param: u8,
}

impl RequestFrame {
    /// Create a request addressed to [`GROUP_ID`].
    pub fn new(cmd: u8, sub_param: u8) -> Self {
        RequestFrame {
            group_id: GROUP_ID,
            cmd,
            sub_param,
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> [u8; REQUEST_FRAME_SIZE] {
        [
            self.group_id,
            complement(self.group_id),
            self.cmd,
            complement(self.cmd),
            self.sub_param,
            complement(self.sub_param),
        ]
    }

    /// Parse wire bytes, checking every complement pair.
    ///
    /// This is the board's side of the link; the host only ever encodes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() != REQUEST_FRAME_SIZE {
            return Err(ProtocolError::BadLength {
                expected: REQUEST_FRAME_SIZE,
                actual: bytes.len(),
                raw: bytes.to_vec(),
            });
        }

        for offset in [0, 2, 4] {
            let (value, paired) = (bytes[offset], bytes[offset + 1]);
            if paired != complement(value) {
                return Err(ProtocolError::BadComplement {
                    offset,
                    value,
                    complement: paired,
                });
            }
        }

        Ok(RequestFrame {
            group_id: bytes[0],
            cmd: bytes[2],
            sub_param: bytes[4],
        })
    }
}

/// A board → host response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    /// Group address echoed by the board.
    pub group_id: u8,
    /// [`STATUS_OK`] or [`STATUS_ERROR`] on a well-behaved board.
    pub status: u8,
    /// Command-specific payload, or fault nibbles on error.
    pub data: u8,
    /// Secondary payload (drop sensor result for drop-check vends).
    pub aux: u8,
    /// The frame as it appeared on the wire.
    pub raw: [u8; RESPONSE_FRAME_SIZE],
}

impl ResponseFrame {
    /// Build a response the way the board does, computing the checksum.
    pub fn new(group_id: u8, status: u8, data: u8, aux: u8) -> Self {
        ResponseFrame {
            group_id,
            status,
            data,
            aux,
            raw: [
                group_id,
                status,
                data,
                aux,
                checksum(group_id, status, data, aux),
            ],
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> [u8; RESPONSE_FRAME_SIZE] {
        self.raw
    }

    /// Parse and validate wire bytes.
    ///
    /// Only length and checksum are checked here; status classification is
    /// left to the caller so that a foreign status can still be reported with
    /// the full frame attached.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let raw: [u8; RESPONSE_FRAME_SIZE] =
            bytes.try_into().map_err(|_| ProtocolError::BadLength {
                expected: RESPONSE_FRAME_SIZE,
                actual: bytes.len(),
                raw: bytes.to_vec(),
            })?;

        let [group_id, status, data, aux, received] = raw;
        let expected = checksum(group_id, status, data, aux);
        if expected != received {
            return Err(ProtocolError::BadChecksum {
                expected,
                actual: received,
                raw: raw.to_vec(),
            });
        }

        Ok(ResponseFrame {
            group_id,
            status,
            data,
            aux,
            raw,
        })
    }

    /// Whether the board reported success.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Whether the board reported a fault.
    pub fn is_error(&self) -> bool {
        self.status == STATUS_ERROR
    }

    /// Hex rendering of the raw bytes, for logs.
    pub fn to_hex(&self) -> String {
        crate::types::hex_encode(&self.raw)
    }
}

/// Accumulates received bytes until a whole response frame is available.
///
/// The board never sends more than one frame per request, so anything past
/// the first five bytes is kept for the next extraction rather than dropped.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl ResponseAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        ResponseAssembler {
            buffer: BytesMut::with_capacity(RESPONSE_FRAME_SIZE * 2),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the first complete frame's bytes, if enough have arrived.
    pub fn take_frame(&mut self) -> Option<[u8; RESPONSE_FRAME_SIZE]> {
        if self.buffer.len() < RESPONSE_FRAME_SIZE {
            return None;
        }

        let mut frame = [0u8; RESPONSE_FRAME_SIZE];
        self.buffer.copy_to_slice(&mut frame);
        Some(frame)
    }

    /// Bytes received so far that do not yet form a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request_layout() {
        let frame = encode_request(0x03, MARKER_NONE);
        assert_eq!(frame, [0x00, 0xFF, 0x03, 0xFC, 0x55, 0xAA]);
    }

    #[test]
    fn test_complement_invariant_all_bytes() {
        for cmd in 0..=255u8 {
            for sub_param in 0..=255u8 {
                let frame = encode_request(cmd, sub_param);
                assert_eq!(frame[1], 0xFF - frame[0]);
                assert_eq!(frame[3], 0xFF - frame[2]);
                assert_eq!(frame[5], 0xFF - frame[4]);
            }
        }
    }

    #[test]
    fn test_request_decode_round_trip() {
        let frame = RequestFrame::new(0xDC, 0x55);
        assert_eq!(RequestFrame::decode(&frame.encode()), Ok(frame));
    }

    #[test]
    fn test_request_decode_bad_complement() {
        let mut bytes = encode_request(0x10, 0x55);
        bytes[3] = 0x00;
        assert_eq!(
            RequestFrame::decode(&bytes),
            Err(ProtocolError::BadComplement {
                offset: 2,
                value: 0x10,
                complement: 0x00,
            })
        );
    }

    #[test]
    fn test_decode_ok_response() {
        let frame = decode_response(&[0x00, 0x5D, 0x00, 0x00, 0x5D]).expect("valid frame");
        assert!(frame.is_ok());
        assert_eq!(frame.data, 0x00);
        assert_eq!(frame.raw, [0x00, 0x5D, 0x00, 0x00, 0x5D]);
    }

    #[test]
    fn test_checksum_wraps() {
        // 0x5D + 0xAA + 0xAA = 0x1B1
        let frame = ResponseFrame::new(0x00, STATUS_OK, 0xAA, 0xAA);
        assert_eq!(frame.raw[4], 0xB1);
        assert_eq!(decode_response(&frame.encode()), Ok(frame));
    }

    #[test]
    fn test_decode_accepts_only_matching_checksum() {
        let (group, status, data, aux) = (0x00, STATUS_ERROR, 0x53, 0x07);
        let good = checksum(group, status, data, aux);
        for supplied in 0..=255u8 {
            let result = decode_response(&[group, status, data, aux, supplied]);
            assert_eq!(result.is_ok(), supplied == good, "checksum byte {supplied:#04X}");
        }
    }

    #[test]
    fn test_checksum_over_every_data_and_aux() {
        for group in [0x00, 0x01, 0xFF] {
            for status in [STATUS_OK, STATUS_ERROR, 0x42] {
                for data in 0..=255u8 {
                    for aux in 0..=255u8 {
                        let sum = (group as u16 + status as u16 + data as u16 + aux as u16) & 0xFF;
                        let good = sum as u8;
                        assert_eq!(checksum(group, status, data, aux), good);
                        assert!(decode_response(&[group, status, data, aux, good]).is_ok());
                        assert!(matches!(
                            decode_response(&[group, status, data, aux, good.wrapping_add(1)]),
                            Err(ProtocolError::BadChecksum { .. })
                        ));
                    }
                }
            }
        }
    }

    #[test]
    fn test_decode_bad_checksum_carries_both_values() {
        let err = decode_response(&[0x00, 0x5D, 0x01, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::BadChecksum {
                expected: 0x5E,
                actual: 0x00,
                raw: vec![0x00, 0x5D, 0x01, 0x00, 0x00],
            }
        );
    }

    #[test]
    fn test_decode_bad_length() {
        for len in [0usize, 4, 6] {
            let bytes = vec![0u8; len];
            match decode_response(&bytes) {
                Err(ProtocolError::BadLength { expected, actual, .. }) => {
                    assert_eq!(expected, RESPONSE_FRAME_SIZE);
                    assert_eq!(actual, len);
                }
                other => panic!("expected BadLength, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_assembler_partial_chunks() {
        let mut assembler = ResponseAssembler::new();
        assembler.push(&[0x00, 0x5D]);
        assert!(assembler.take_frame().is_none());
        assembler.push(&[0x00, 0x00]);
        assert!(assembler.take_frame().is_none());
        assembler.push(&[0x5D]);
        assert_eq!(assembler.take_frame(), Some([0x00, 0x5D, 0x00, 0x00, 0x5D]));
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_assembler_keeps_remainder() {
        let mut assembler = ResponseAssembler::new();
        assembler.push(&[0x00, 0x5D, 0x00, 0x00, 0x5D, 0x00, 0x5C]);
        assert_eq!(assembler.take_frame(), Some([0x00, 0x5D, 0x00, 0x00, 0x5D]));
        assert_eq!(assembler.buffered_len(), 2);
        assembler.clear();
        assert_eq!(assembler.buffered_len(), 0);
    }
}
