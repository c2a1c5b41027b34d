//! Frame codec, resynchronizing stream parser, segmentation and TLV messages
//! for the serial link.
//!
//! This crate provides the byte-level protocol implementation for the link:
//! frame encoding with a CRC-16 trailer, an incremental parser that recovers
//! framing from an arbitrary byte stream, segmentation of payloads too large
//! for one frame, and the small TLV message layer carried inside frames.
//!
//! ## Features
//!
//! - **Silent Resynchronization**: The parser hunts for the sync byte and
//!   drops malformed input without ever failing the stream
//! - **Incremental CRC**: The checksum is folded per byte while parsing, so
//!   no frame is buffered twice
//! - **Zero-Copy Handoff**: Uses `Bytes`/`BytesMut`; completed frames are
//!   frozen and handed out without copying
//! - **Segmented Transfers**: Automatic splitting and reassembly of payloads
//!   larger than one frame, keyed by transfer id
//! - **TLV Messages**: Id/length/value records for structured payloads
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | sync (1B) = 0xAA     | start-of-frame marker      |
//! +----------------------+----------------------------+
//! | len (1B)             | payload length, 1..=64     |
//! +----------------------+----------------------------+
//! | data (len B)         | payload                    |
//! +----------------------+----------------------------+
//! | crc (2B, big-endian) | CRC-16 over len + data     |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod crc;
pub mod error;
pub mod frame;
pub mod parser;
pub mod segment;
pub mod tlv;

// Re-export main types
pub use error::WireError;
pub use frame::{
    encode_frame, RxFrame, FRAME_OVERHEAD, MAX_FRAME, MAX_PAYLOAD, SYNC_BYTE,
};
pub use parser::{FrameParser, ParserStats};
pub use segment::{
    split, split_raw, Reassembler, SegmentHeader, SegmentOutcome, SEGMENT_CHUNK_MAX,
    SEGMENT_HEADER_SIZE, SEGMENT_TYPE_DATA,
};
pub use tlv::{get_u16_le, TlvMsg, MAX_VALUE, TLV_ERROR, TLV_OVERHEAD, TLV_VERSION};
