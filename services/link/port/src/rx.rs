//! Receive worker: poll the transport, run the parser, dispatch events.
//!
//! One blocking worker owns the whole receive path. It is the only task
//! touching the parser and reassembler, so the path is lock-free; consumers
//! see the stream as [`LinkEvent`]s on an mpsc channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use link_wire::{FrameParser, ParserStats, Reassembler, RxFrame, SegmentOutcome};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::transport::Transport;

/// Read buffer size for one transport poll.
const READ_CHUNK: usize = 256;

/// Events emitted by the receive path.
#[derive(Debug)]
pub enum LinkEvent {
    /// Received a CRC-valid frame that carries no segment header
    Frame {
        /// The verified frame
        frame: RxFrame,
    },
    /// A segmented transfer absorbed a chunk and is still incomplete
    SegmentProgress {
        /// Transfer the chunk belongs to
        transfer_id: u8,
        /// Raw chunk bytes accepted so far (duplicates count again)
        received: usize,
        /// Declared total payload length
        total: usize,
    },
    /// A segmented transfer completed
    PayloadComplete {
        /// Transfer that finished
        transfer_id: u8,
        /// The reassembled payload
        payload: Bytes,
    },
}

/// Consumer of verified frames, invoked once per frame in arrival order on
/// the receive worker.
pub trait FrameSink: Send {
    /// Handle one CRC-valid frame. A failure is logged by the worker and
    /// does not stop the receive loop or disturb parser state.
    fn on_frame(&mut self, frame: RxFrame) -> Result<()>;
}

/// A [`FrameSink`] that feeds frames through a [`Reassembler`] and forwards
/// the results as [`LinkEvent`]s.
pub struct ChannelSink {
    reassembler: Reassembler,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl ChannelSink {
    /// Create a sink forwarding onto `events`.
    pub fn new(events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self {
            reassembler: Reassembler::new(),
            events,
        }
    }
}

impl FrameSink for ChannelSink {
    fn on_frame(&mut self, frame: RxFrame) -> Result<()> {
        let event = match self.reassembler.accept(&frame.data) {
            SegmentOutcome::NotSegmented => LinkEvent::Frame { frame },
            SegmentOutcome::Progress {
                transfer_id,
                received,
                total,
            } => LinkEvent::SegmentProgress {
                transfer_id,
                received,
                total,
            },
            SegmentOutcome::Complete {
                transfer_id,
                payload,
            } => LinkEvent::PayloadComplete {
                transfer_id,
                payload,
            },
        };
        self.events.send(event).context("event channel closed")?;
        Ok(())
    }
}

/// Handle for stopping a running [`RxWorker`] from another task.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the worker to exit after its current poll.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Blocking receive worker: transport poll, parser, sink dispatch.
pub struct RxWorker<T, S> {
    transport: T,
    parser: FrameParser,
    sink: S,
    stop: Arc<AtomicBool>,
}

impl<T: Transport, S: FrameSink> RxWorker<T, S> {
    /// Create a worker over the transport's read half.
    pub fn new(transport: T, sink: S) -> Self {
        Self {
            transport,
            parser: FrameParser::new(),
            sink,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for asking the running worker to stop.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Run until stopped or the transport fails. Blocking; drive it from
    /// `tokio::task::spawn_blocking` in an async program. Returns the final
    /// parser counters.
    pub fn run(mut self) -> ParserStats {
        let mut buf = [0u8; READ_CHUNK];
        while !self.stop.load(Ordering::SeqCst) {
            let n = match self.transport.read_available(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    error!("Receive loop stopping on transport error: {}", e);
                    break;
                }
            };
            if n == 0 {
                continue;
            }
            for frame in self.parser.feed(&buf[..n]) {
                if let Err(e) = self.sink.on_frame(frame) {
                    warn!("Frame handler failed: {:#}", e);
                }
            }
        }
        let stats = self.parser.stats();
        info!(
            "Receive worker stopped: {} frames ok, {} length errors, {} crc errors",
            stats.frames_ok, stats.bad_length, stats.crc_errors
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use link_wire::{encode_frame, split};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Feeds scripted reads to the worker, then fails like a vanished port.
    struct ScriptedTransport {
        reads: Vec<Vec<u8>>,
        next: usize,
    }

    impl ScriptedTransport {
        fn new(reads: Vec<Vec<u8>>) -> Self {
            Self { reads, next: 0 }
        }
    }

    impl Transport for ScriptedTransport {
        fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            if self.next < self.reads.len() {
                let chunk = &self.reads[self.next];
                self.next += 1;
                buf[..chunk.len()].copy_from_slice(chunk);
                return Ok(chunk.len());
            }
            Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "script exhausted",
            )))
        }

        fn write_all(&mut self, _data: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Sink recording frames behind a shared handle, optionally failing on
    /// every call.
    #[derive(Clone)]
    struct SharedSink {
        frames: Arc<Mutex<Vec<RxFrame>>>,
        fail: bool,
    }

    impl SharedSink {
        fn new(fail: bool) -> Self {
            Self {
                frames: Arc::new(Mutex::new(Vec::new())),
                fail,
            }
        }

        fn frame_data(&self) -> Vec<Vec<u8>> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| f.data.to_vec())
                .collect()
        }
    }

    impl FrameSink for SharedSink {
        fn on_frame(&mut self, frame: RxFrame) -> Result<()> {
            self.frames.lock().unwrap().push(frame);
            if self.fail {
                anyhow::bail!("handler rejected frame");
            }
            Ok(())
        }
    }

    #[test]
    fn test_worker_parses_split_reads() {
        let frame = encode_frame(b"worker").unwrap();
        let sink = SharedSink::new(false);
        let worker = RxWorker::new(
            ScriptedTransport::new(vec![frame[..3].to_vec(), frame[3..].to_vec()]),
            sink.clone(),
        );
        let stats = worker.run();
        assert_eq!(sink.frame_data(), vec![b"worker".to_vec()]);
        assert_eq!(stats.frames_ok, 1);
    }

    #[test]
    fn test_worker_survives_sink_failure() {
        let first = encode_frame(b"one").unwrap();
        let second = encode_frame(b"two").unwrap();
        let sink = SharedSink::new(true);
        let worker = RxWorker::new(
            ScriptedTransport::new(vec![first.to_vec(), second.to_vec()]),
            sink.clone(),
        );
        let stats = worker.run();
        // Both frames still reach the sink and the parser stays in sync.
        assert_eq!(sink.frame_data(), vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(stats.frames_ok, 2);
    }

    #[test]
    fn test_worker_stops_on_transport_error() {
        let sink = SharedSink::new(false);
        let worker = RxWorker::new(ScriptedTransport::new(Vec::new()), sink.clone());
        let stats = worker.run();
        assert_eq!(stats.frames_ok, 0);
        assert!(sink.frame_data().is_empty());
    }

    #[test]
    fn test_stop_handle_exits_idle_worker() {
        struct IdleTransport;
        impl Transport for IdleTransport {
            fn read_available(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
                std::thread::sleep(Duration::from_millis(1));
                Ok(0)
            }
            fn write_all(&mut self, _data: &[u8]) -> Result<(), TransportError> {
                Ok(())
            }
        }

        let worker = RxWorker::new(IdleTransport, SharedSink::new(false));
        let stop = worker.stop_handle();
        let handle = std::thread::spawn(move || worker.run());
        stop.stop();
        let stats = handle.join().unwrap();
        assert_eq!(stats.frames_ok, 0);
    }

    #[tokio::test]
    async fn test_channel_sink_event_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);

        // A plain frame first.
        let plain = encode_frame(b"hello").unwrap();
        let mut parser = FrameParser::new();
        for frame in parser.feed(&plain) {
            sink.on_frame(frame).unwrap();
        }

        // Then a two-chunk segmented transfer.
        let payload: Vec<u8> = (0..80u8).collect();
        for chunk in split(&payload, 9).unwrap() {
            let encoded = encode_frame(&chunk).unwrap();
            for frame in parser.feed(&encoded) {
                sink.on_frame(frame).unwrap();
            }
        }

        match rx.recv().await.unwrap() {
            LinkEvent::Frame { frame } => assert_eq!(&frame.data[..], b"hello"),
            other => panic!("expected Frame, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            LinkEvent::SegmentProgress {
                transfer_id,
                received,
                total,
            } => {
                assert_eq!(transfer_id, 9);
                assert_eq!(received, 57);
                assert_eq!(total, 80);
            }
            other => panic!("expected SegmentProgress, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            LinkEvent::PayloadComplete {
                transfer_id,
                payload: body,
            } => {
                assert_eq!(transfer_id, 9);
                assert_eq!(&body[..], &payload[..]);
            }
            other => panic!("expected PayloadComplete, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        let frame = encode_frame(b"x").unwrap();
        let mut parser = FrameParser::new();
        let rx_frame = parser.feed(&frame).pop().unwrap();
        assert!(sink.on_frame(rx_frame).is_err());
    }
}
