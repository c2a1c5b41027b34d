//! Serial transport, receive worker and transmit path for the serial link.
//!
//! This crate owns the serial port and the two halves of the link: a
//! blocking receive worker that polls the port, runs the frame parser and
//! reassembler, and publishes [`LinkEvent`]s; and a transmitter that encodes
//! payloads into frames and paces them onto the wire.
//!
//! ## Features
//!
//! - **Serial Transport**: `serialport`-backed byte transport with
//!   poll-timeout reads and cloned read/write halves
//! - **Blocking Receive Worker**: one task owns parser and reassembly state,
//!   no locks on the receive path
//! - **Event Channel**: frames, transfer progress and completed payloads as
//!   mpsc events
//! - **Paced Transmit**: single-frame, segmented and raw sends with an
//!   optional inter-frame delay
//!
//! ## Example
//!
//! ```rust,no_run
//! use link_port::{ChannelSink, LinkEvent, RxWorker, SerialTransport, Transmitter};
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let port = SerialTransport::open("/dev/ttyUSB0", 115200, Duration::from_millis(50))?;
//! let writer = port.try_clone()?;
//!
//! let (event_tx, mut event_rx) = mpsc::unbounded_channel();
//! let worker = RxWorker::new(port, ChannelSink::new(event_tx));
//! let stop = worker.stop_handle();
//! let rx_task = tokio::task::spawn_blocking(move || worker.run());
//!
//! let mut tx = Transmitter::new(writer, Duration::from_millis(10));
//! tokio::task::spawn_blocking(move || tx.send_frame(b"hello")).await??;
//!
//! while let Some(event) = event_rx.recv().await {
//!     match event {
//!         LinkEvent::Frame { frame } => {
//!             println!("frame: {:02X?}", &frame.data[..]);
//!         }
//!         LinkEvent::SegmentProgress { transfer_id, received, total } => {
//!             println!("transfer {}: {}/{} bytes", transfer_id, received, total);
//!         }
//!         LinkEvent::PayloadComplete { transfer_id, payload } => {
//!             println!("transfer {} complete: {} bytes", transfer_id, payload.len());
//!             break;
//!         }
//!     }
//! }
//!
//! stop.stop();
//! rx_task.await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod rx;
pub mod transport;
pub mod tx;

// Re-export main types
pub use rx::{ChannelSink, FrameSink, LinkEvent, RxWorker, StopHandle};
pub use transport::{
    available_port_names, SerialTransport, Transport, TransportError, DEFAULT_READ_TIMEOUT,
};
pub use tx::Transmitter;
