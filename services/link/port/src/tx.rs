//! Transmit path: encode payloads and pace frames onto the transport.

use std::time::Duration;

use anyhow::Result;
use link_wire::{encode_frame, split, split_raw};
use tracing::debug;

use crate::transport::Transport;

/// Writer for the transport's write half. Writes go through `&mut self`, so
/// frames from one transmitter never interleave on the wire. Blocking;
/// drive it from `tokio::task::spawn_blocking` in an async program.
pub struct Transmitter<T> {
    transport: T,
    pacing: Duration,
}

impl<T: Transport> Transmitter<T> {
    /// Create a transmitter. `pacing` is slept after every written frame,
    /// for receivers that drain slowly; zero disables it.
    pub fn new(transport: T, pacing: Duration) -> Self {
        Self { transport, pacing }
    }

    /// Encode `payload` into one frame and write it.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let frame = encode_frame(payload)?;
        self.write_paced(&frame)
    }

    /// Split `data` into segment chunks and send them in offset order for
    /// reassembly on the far side.
    pub fn send_segmented(&mut self, data: &[u8], transfer_id: u8) -> Result<()> {
        let chunks = split(data, transfer_id)?;
        debug!(
            "Sending {} bytes as {} segment frames (transfer {})",
            data.len(),
            chunks.len(),
            transfer_id
        );
        for chunk in chunks {
            let frame = encode_frame(&chunk)?;
            self.write_paced(&frame)?;
        }
        Ok(())
    }

    /// Slice `data` into plain frame payloads and send them in order. The
    /// far side sees independent frames and does no reassembly.
    pub fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        let slices = split_raw(data);
        debug!("Sending {} bytes as {} raw frames", data.len(), slices.len());
        for slice in slices {
            let frame = encode_frame(&slice)?;
            self.write_paced(&frame)?;
        }
        Ok(())
    }

    fn write_paced(&mut self, frame: &[u8]) -> Result<()> {
        self.transport.write_all(frame)?;
        if !self.pacing.is_zero() {
            std::thread::sleep(self.pacing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use link_wire::{FrameParser, Reassembler, SegmentOutcome, MAX_PAYLOAD};

    /// Captures everything written to it; reads are always idle.
    #[derive(Default)]
    struct RecordingTransport {
        written: Vec<u8>,
    }

    impl Transport for RecordingTransport {
        fn read_available(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
            Ok(0)
        }

        fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
            self.written.extend_from_slice(data);
            Ok(())
        }
    }

    #[test]
    fn test_send_frame_writes_wire_bytes() {
        let mut tx = Transmitter::new(RecordingTransport::default(), Duration::ZERO);
        tx.send_frame(b"ping").unwrap();
        let expected = encode_frame(b"ping").unwrap();
        assert_eq!(tx.transport.written, expected.to_vec());
    }

    #[test]
    fn test_send_frame_rejects_oversize() {
        let mut tx = Transmitter::new(RecordingTransport::default(), Duration::ZERO);
        assert!(tx.send_frame(&[0u8; MAX_PAYLOAD + 1]).is_err());
        assert!(tx.transport.written.is_empty());
    }

    #[test]
    fn test_send_segmented_reassembles_on_receive() {
        let payload: Vec<u8> = (0..150u16).map(|i| (i % 251) as u8).collect();
        let mut tx = Transmitter::new(RecordingTransport::default(), Duration::ZERO);
        tx.send_segmented(&payload, 3).unwrap();

        let mut parser = FrameParser::new();
        let mut reassembler = Reassembler::new();
        let mut complete = None;
        for frame in parser.feed(&tx.transport.written) {
            if let SegmentOutcome::Complete {
                transfer_id,
                payload: body,
            } = reassembler.accept(&frame.data)
            {
                complete = Some((transfer_id, body));
            }
        }
        let (transfer_id, body) = complete.expect("transfer should complete");
        assert_eq!(transfer_id, 3);
        assert_eq!(&body[..], &payload[..]);
        assert!(!reassembler.is_active(3));
    }

    #[test]
    fn test_send_raw_concatenates_on_receive() {
        let payload: Vec<u8> = (0..130u16).map(|i| (i % 251) as u8).collect();
        let mut tx = Transmitter::new(RecordingTransport::default(), Duration::ZERO);
        tx.send_raw(&payload).unwrap();

        let mut parser = FrameParser::new();
        let frames = parser.feed(&tx.transport.written);
        assert_eq!(frames.len(), 3);
        let rebuilt: Vec<u8> = frames.iter().flat_map(|f| f.data.to_vec()).collect();
        assert_eq!(rebuilt, payload);
    }
}
