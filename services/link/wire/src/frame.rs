//! Frame layout and encoding for the serial link.
//!
//! A frame is `SYNC | LEN | DATA | CRC16` with the CRC big-endian over
//! `LEN || DATA`. Encoding produces complete frames here; decoding is owned
//! by the stream parser, which is driven byte-by-byte so the transport may
//! deliver reads in arbitrary chunks.

use crate::crc;
use bytes::{BufMut, Bytes, BytesMut};

/// Synchronization marker that starts every frame
pub const SYNC_BYTE: u8 = 0xAA;
/// Largest DATA field a frame may carry
pub const MAX_PAYLOAD: usize = 64;
/// Framing bytes around DATA (sync + length + crc)
pub const FRAME_OVERHEAD: usize = 4;
/// Largest complete frame on the wire
pub const MAX_FRAME: usize = MAX_PAYLOAD + FRAME_OVERHEAD;

/// One CRC-verified frame delivered by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    /// DATA field of the frame
    pub data: Bytes,
    /// Full frame bytes as seen on the wire
    pub raw: Bytes,
}

/// Encode a payload into a complete wire frame.
///
/// Fails on an empty payload or one longer than [`MAX_PAYLOAD`]; that is a
/// caller bug, not a link condition, and is never silently swallowed.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, crate::WireError> {
    if payload.is_empty() {
        return Err(crate::WireError::Empty);
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(crate::WireError::Size(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
    buf.put_u8(SYNC_BYTE);
    buf.put_u8(payload.len() as u8);
    buf.put_slice(payload);

    // CRC domain is the length byte plus the payload.
    let mut c = crc::step(crc::CRC_INIT, payload.len() as u8);
    for &b in payload {
        c = crc::step(c, b);
    }
    buf.put_u16(c);

    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = encode_frame(b"a").unwrap();
        let crc = crc::compute(&[0x01, 0x61]);
        assert_eq!(
            &frame[..],
            &[SYNC_BYTE, 0x01, 0x61, (crc >> 8) as u8, crc as u8]
        );
    }

    #[test]
    fn test_encode_max_payload() {
        let payload = [0x5A; MAX_PAYLOAD];
        let frame = encode_frame(&payload).unwrap();
        assert_eq!(frame.len(), MAX_FRAME);
        assert_eq!(frame[1] as usize, MAX_PAYLOAD);
    }

    #[test]
    fn test_encode_empty_rejected() {
        assert!(matches!(encode_frame(&[]), Err(crate::WireError::Empty)));
    }

    #[test]
    fn test_encode_oversize_rejected() {
        let payload = [0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(crate::WireError::Size(n)) if n == MAX_PAYLOAD + 1
        ));
    }
}
