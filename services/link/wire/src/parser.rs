//! Resynchronizing stream parser.
//!
//! Consumes an unbounded byte stream one byte at a time and emits fully
//! CRC-verified frames. Malformed input never raises an error: a bad length
//! byte or a CRC mismatch drops the frame attempt and the parser goes back
//! to hunting for the next sync marker, so noise on the line costs at most
//! the frames it touches.

use crate::crc;
use crate::frame::{RxFrame, MAX_PAYLOAD, SYNC_BYTE};
use bytes::{BufMut, BytesMut};
use tracing::debug;

/// Position within the frame currently being decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Hunting for the sync marker
    Sync,
    /// Expecting the length byte
    Len,
    /// Accumulating DATA bytes
    Data,
    /// Expecting the CRC high byte
    CrcHi,
    /// Expecting the CRC low byte
    CrcLo,
}

/// Running diagnostics counters for one parser instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames emitted with a matching CRC
    pub frames_ok: u64,
    /// Length bytes outside `1..=max_payload`
    pub bad_length: u64,
    /// Completed frames whose CRC did not match
    pub crc_errors: u64,
}

/// Stream parser state machine.
///
/// One instance per byte stream; multiple links run independent parsers.
/// The CRC is folded incrementally as bytes arrive, so decode and verify
/// are a single linear pass regardless of how the transport chunks reads.
#[derive(Debug)]
pub struct FrameParser {
    state: ParseState,
    max_payload: usize,
    expected_len: usize,
    data: BytesMut,
    raw: BytesMut,
    crc: u16,
    crc_hi: u8,
    stats: ParserStats,
}

impl FrameParser {
    /// Create a parser accepting frames up to [`MAX_PAYLOAD`] data bytes.
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD)
    }

    /// Create a parser with a custom payload limit (clamped to `1..=255`,
    /// the range a one-byte length field can express).
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            state: ParseState::Sync,
            max_payload: max_payload.clamp(1, u8::MAX as usize),
            expected_len: 0,
            data: BytesMut::new(),
            raw: BytesMut::new(),
            crc: crc::CRC_INIT,
            crc_hi: 0,
            stats: ParserStats::default(),
        }
    }

    /// Advance the state machine by one byte.
    ///
    /// Returns a frame when this byte completes one with a valid CRC. Never
    /// fails: every malformed sequence is recovered by resynchronizing.
    pub fn push_byte(&mut self, b: u8) -> Option<RxFrame> {
        match self.state {
            ParseState::Sync => {
                if b == SYNC_BYTE {
                    self.begin_frame();
                }
                None
            }
            ParseState::Len => {
                if b == 0 || b as usize > self.max_payload {
                    self.stats.bad_length += 1;
                    debug!(len = b, "invalid length byte, resynchronizing");
                    self.state = ParseState::Sync;
                    return None;
                }
                self.expected_len = b as usize;
                self.crc = crc::step(self.crc, b);
                self.raw.put_u8(b);
                self.state = ParseState::Data;
                None
            }
            ParseState::Data => {
                self.data.put_u8(b);
                self.raw.put_u8(b);
                self.crc = crc::step(self.crc, b);
                if self.data.len() == self.expected_len {
                    self.state = ParseState::CrcHi;
                }
                None
            }
            ParseState::CrcHi => {
                self.crc_hi = b;
                self.raw.put_u8(b);
                self.state = ParseState::CrcLo;
                None
            }
            ParseState::CrcLo => {
                self.raw.put_u8(b);
                let received = u16::from_be_bytes([self.crc_hi, b]);
                self.state = ParseState::Sync;
                if received == self.crc {
                    self.stats.frames_ok += 1;
                    let data = std::mem::take(&mut self.data).freeze();
                    let raw = std::mem::take(&mut self.raw).freeze();
                    Some(RxFrame { data, raw })
                } else {
                    self.stats.crc_errors += 1;
                    debug!(
                        computed = self.crc,
                        received, "crc mismatch, frame dropped"
                    );
                    None
                }
            }
        }
    }

    /// Feed a read chunk of any size, collecting every completed frame.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<RxFrame> {
        let mut frames = Vec::new();
        for &b in bytes {
            if let Some(frame) = self.push_byte(b) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Snapshot of the diagnostics counters.
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Drop any partially decoded frame and go back to hunting for sync.
    /// Counters are cumulative and survive a reset.
    pub fn reset(&mut self) {
        self.state = ParseState::Sync;
        self.expected_len = 0;
        self.data.clear();
        self.raw.clear();
        self.crc = crc::CRC_INIT;
    }

    fn begin_frame(&mut self) {
        self.crc = crc::CRC_INIT;
        self.expected_len = 0;
        self.data.clear();
        self.raw.clear();
        self.raw.put_u8(SYNC_BYTE);
        self.state = ParseState::Len;
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_frame;

    #[test]
    fn test_round_trip_all_lengths() {
        for len in 1..=MAX_PAYLOAD {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let frame = encode_frame(&payload).unwrap();

            let mut parser = FrameParser::new();
            let frames = parser.feed(&frame);
            assert_eq!(frames.len(), 1, "len {len}");
            assert_eq!(&frames[0].data[..], &payload[..]);
            assert_eq!(&frames[0].raw[..], &frame[..]);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let frame = encode_frame(b"hello").unwrap();
        let mut parser = FrameParser::new();

        let mut emitted = Vec::new();
        for &b in frame.iter() {
            if let Some(f) = parser.push_byte(b) {
                emitted.push(f);
            }
        }
        assert_eq!(emitted.len(), 1);
        assert_eq!(&emitted[0].data[..], b"hello");
    }

    #[test]
    fn test_split_reads() {
        let frame = encode_frame(b"split me").unwrap();
        let mut parser = FrameParser::new();

        assert!(parser.feed(&frame[..3]).is_empty());
        let frames = parser.feed(&frame[3..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], b"split me");
    }

    #[test]
    fn test_noise_before_frame() {
        let frame = encode_frame(b"clean").unwrap();
        let mut stream = vec![0x00, 0xFF, 0x13, 0x37, 0x55];
        stream.extend_from_slice(&frame);

        let mut parser = FrameParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], b"clean");
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_frame(b"one").unwrap());
        stream.extend_from_slice(&encode_frame(b"two").unwrap());

        let mut parser = FrameParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0].data[..], b"one");
        assert_eq!(&frames[1].data[..], b"two");
        assert_eq!(parser.stats().frames_ok, 2);
    }

    #[test]
    fn test_zero_length_resyncs() {
        let mut stream = vec![SYNC_BYTE, 0x00];
        stream.extend_from_slice(&encode_frame(b"after").unwrap());

        let mut parser = FrameParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], b"after");
        assert_eq!(parser.stats().bad_length, 1);
    }

    #[test]
    fn test_oversize_length_resyncs() {
        let mut stream = vec![SYNC_BYTE, (MAX_PAYLOAD + 1) as u8];
        stream.extend_from_slice(&encode_frame(b"after").unwrap());

        let mut parser = FrameParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(parser.stats().bad_length, 1);
    }

    #[test]
    fn test_crc_corruption_rejected() {
        let frame = encode_frame(b"corrupt me").unwrap();
        let crc_start = frame.len() - 2;

        for bit in 0..16 {
            let mut bad = frame.to_vec();
            bad[crc_start + bit / 8] ^= 1 << (bit % 8);

            let mut parser = FrameParser::new();
            let frames = parser.feed(&bad);
            assert!(frames.is_empty(), "bit {bit} slipped through");
            assert_eq!(parser.stats().crc_errors, 1);
        }
    }

    #[test]
    fn test_resync_after_crc_error() {
        // Hand-built frame attempt whose CRC bytes are the bitwise
        // complement of the real value, guaranteeing a mismatch.
        let mut stream = vec![SYNC_BYTE, 0x02, 0x61, 0x62];
        let wrong = !crc::compute(&[0x02, 0x61, 0x62]);
        stream.extend_from_slice(&wrong.to_be_bytes());
        stream.extend_from_slice(&encode_frame(b"ok").unwrap());

        let mut parser = FrameParser::new();
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], b"ok");
        assert_eq!(parser.stats().crc_errors, 1);
        assert_eq!(parser.stats().frames_ok, 1);
    }

    #[test]
    fn test_sync_byte_inside_data() {
        // 0xAA is ordinary data once a frame is underway.
        let payload = [SYNC_BYTE, SYNC_BYTE, 0x01];
        let frame = encode_frame(&payload).unwrap();

        let mut parser = FrameParser::new();
        let frames = parser.feed(&frame);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], &payload[..]);
    }

    #[test]
    fn test_custom_max_payload() {
        let mut parser = FrameParser::with_max_payload(8);

        // A length of 9 is over this parser's limit.
        assert!(parser.feed(&[SYNC_BYTE, 9]).is_empty());
        assert_eq!(parser.stats().bad_length, 1);

        let small = encode_frame(&[0x22; 8]).unwrap();
        let frames = parser.feed(&small);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.len(), 8);
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let frame = encode_frame(b"partial").unwrap();
        let mut parser = FrameParser::new();

        assert!(parser.feed(&frame[..4]).is_empty());
        parser.reset();

        // Leftover payload bytes (none of them 0xAA) are noise to the
        // fresh state machine.
        assert!(parser.feed(&frame[4..9]).is_empty());
        let frames = parser.feed(&frame);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], b"partial");
    }
}
