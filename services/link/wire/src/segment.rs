//! Segmentation of payloads larger than one frame, and their reassembly.
//!
//! A payload that does not fit one frame is split into chunks, each carried
//! in its own frame behind a 7-byte header:
//!
//! ```text
//! +---------+-------------+------------------+------------+--------------+
//! | type(1) | transfer(1) | total_length(2BE)| offset(2BE)| chunk_len(1) |
//! +---------+-------------+------------------+------------+--------------+
//! ```
//!
//! Transfers are keyed by `transfer_id`, so chunks of different transfers
//! may interleave freely on the wire and still reassemble independently.

use crate::frame::MAX_PAYLOAD;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use tracing::warn;

/// Size of the segment header at the front of a chunk's DATA
pub const SEGMENT_HEADER_SIZE: usize = 7;
/// Chunk data capacity of one frame when segmented
pub const SEGMENT_CHUNK_MAX: usize = MAX_PAYLOAD - SEGMENT_HEADER_SIZE;
/// Header type marking a data chunk
pub const SEGMENT_TYPE_DATA: u8 = 0x01;

/// In-payload header describing one chunk of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Chunk type ([`SEGMENT_TYPE_DATA`] for data chunks)
    pub typ: u8,
    /// Transfer this chunk belongs to
    pub transfer_id: u8,
    /// Full reassembled payload size
    pub total_length: u16,
    /// Position of this chunk within the payload
    pub offset: u16,
    /// Data bytes following the header in this frame
    pub chunk_length: u8,
}

impl SegmentHeader {
    /// Append the header to a buffer (big-endian fields).
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.typ);
        buf.put_u8(self.transfer_id);
        buf.put_u16(self.total_length);
        buf.put_u16(self.offset);
        buf.put_u8(self.chunk_length);
    }

    /// Read a header from the front of a frame's DATA, if there is room.
    pub fn decode(mut data: &[u8]) -> Option<Self> {
        if data.len() < SEGMENT_HEADER_SIZE {
            return None;
        }

        let typ = data.get_u8();
        let transfer_id = data.get_u8();
        let total_length = data.get_u16();
        let offset = data.get_u16();
        let chunk_length = data.get_u8();

        Some(Self {
            typ,
            transfer_id,
            total_length,
            offset,
            chunk_length,
        })
    }
}

/// Split a payload into frame-sized chunks, each behind a segment header.
///
/// Chunks come out in strictly increasing offset order covering the whole
/// payload with no gaps or overlaps; each is ready to be framed and sent.
/// Fails on an empty payload or one whose length does not fit the header's
/// 16-bit `total_length`.
pub fn split(data: &[u8], transfer_id: u8) -> Result<Vec<Bytes>, crate::WireError> {
    if data.is_empty() {
        return Err(crate::WireError::Empty);
    }
    if data.len() > u16::MAX as usize {
        return Err(crate::WireError::TransferSize(data.len()));
    }

    let total = data.len();
    let mut chunks = Vec::with_capacity((total + SEGMENT_CHUNK_MAX - 1) / SEGMENT_CHUNK_MAX);
    let mut offset = 0;

    while offset < total {
        let end = std::cmp::min(offset + SEGMENT_CHUNK_MAX, total);
        let header = SegmentHeader {
            typ: SEGMENT_TYPE_DATA,
            transfer_id,
            total_length: total as u16,
            offset: offset as u16,
            chunk_length: (end - offset) as u8,
        };

        let mut buf = BytesMut::with_capacity(SEGMENT_HEADER_SIZE + (end - offset));
        header.encode(&mut buf);
        buf.put_slice(&data[offset..end]);
        chunks.push(buf.freeze());

        offset = end;
    }

    Ok(chunks)
}

/// Slice a payload into bare frame-sized pieces with no headers.
///
/// For data the receiver consumes piecewise rather than reassembling into
/// one logical unit; never mix with [`split`] chunks for the same transfer.
pub fn split_raw(data: &[u8]) -> Vec<Bytes> {
    data.chunks(MAX_PAYLOAD)
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Result of offering one frame's DATA to the reassembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// No usable segment header: hand the payload to the caller as-is
    NotSegmented,
    /// Chunk absorbed, transfer still incomplete
    Progress {
        /// Transfer the chunk belongs to
        transfer_id: u8,
        /// Raw chunk bytes accepted so far; duplicates count again, so this
        /// can overshoot the true unique-byte position
        received: usize,
        /// Target payload size
        total: usize,
    },
    /// Every byte of the transfer is covered
    Complete {
        /// Transfer that finished
        transfer_id: u8,
        /// The reassembled payload
        payload: Bytes,
    },
}

/// State of one in-flight transfer
#[derive(Debug)]
struct Reassembly {
    total: usize,
    buf: Vec<u8>,
    received: usize,
    // Sorted, merged [start, end) ranges of bytes written so far.
    covered: Vec<(usize, usize)>,
}

impl Reassembly {
    fn new(total: usize) -> Self {
        Self {
            total,
            buf: vec![0; total],
            received: 0,
            covered: Vec::new(),
        }
    }

    fn write(&mut self, offset: usize, chunk: &[u8]) {
        self.buf[offset..offset + chunk.len()].copy_from_slice(chunk);
        self.received += chunk.len();
        self.cover(offset, offset + chunk.len());
    }

    fn cover(&mut self, start: usize, end: usize) {
        let mut merged = Vec::with_capacity(self.covered.len() + 1);
        let mut new = (start, end);
        let mut placed = false;

        for &(s, e) in &self.covered {
            if e < new.0 {
                merged.push((s, e));
            } else if s > new.1 {
                if !placed {
                    merged.push(new);
                    placed = true;
                }
                merged.push((s, e));
            } else {
                new.0 = new.0.min(s);
                new.1 = new.1.max(e);
            }
        }
        if !placed {
            merged.push(new);
        }

        self.covered = merged;
    }

    fn is_complete(&self) -> bool {
        self.total == 0 || self.covered == [(0, self.total)]
    }
}

/// Reassembler for multi-frame transfers.
///
/// Completion is coverage-based: a transfer finishes when every byte of
/// `[0, total_length)` has been written, so duplicate chunks cannot force
/// an early finish with holes in the buffer. The raw received counter is
/// still reported through [`SegmentOutcome::Progress`] and keeps its
/// duplicate-inflation quirk.
#[derive(Debug, Default)]
pub struct Reassembler {
    active: HashMap<u8, Reassembly>,
}

impl Reassembler {
    /// Create a reassembler with no active transfers.
    pub fn new() -> Self {
        Self {
            active: HashMap::new(),
        }
    }

    /// Offer one verified frame's DATA.
    ///
    /// Data without a plausible segment header is reported as
    /// [`SegmentOutcome::NotSegmented`] and leaves no state behind; the
    /// caller decides what the raw payload means. A header whose
    /// `total_length` disagrees with an active transfer restarts that
    /// transfer from this chunk.
    pub fn accept(&mut self, data: &[u8]) -> SegmentOutcome {
        let header = match SegmentHeader::decode(data) {
            Some(h) if h.typ == SEGMENT_TYPE_DATA => h,
            _ => return SegmentOutcome::NotSegmented,
        };

        let chunk = &data[SEGMENT_HEADER_SIZE..];
        let total = header.total_length as usize;
        let offset = header.offset as usize;

        if header.chunk_length as usize != chunk.len() {
            return SegmentOutcome::NotSegmented;
        }
        if offset + chunk.len() > total {
            return SegmentOutcome::NotSegmented;
        }

        let state = self
            .active
            .entry(header.transfer_id)
            .or_insert_with(|| Reassembly::new(total));

        if state.total != total {
            warn!(
                transfer_id = header.transfer_id,
                stored = state.total,
                claimed = total,
                "total length changed mid-transfer, restarting"
            );
            *state = Reassembly::new(total);
        }

        state.write(offset, chunk);
        let received = state.received;

        if state.is_complete() {
            if let Some(done) = self.active.remove(&header.transfer_id) {
                return SegmentOutcome::Complete {
                    transfer_id: header.transfer_id,
                    payload: Bytes::from(done.buf),
                };
            }
        }

        SegmentOutcome::Progress {
            transfer_id: header.transfer_id,
            received,
            total,
        }
    }

    /// Number of transfers with buffered state.
    pub fn active_transfers(&self) -> usize {
        self.active.len()
    }

    /// Whether a transfer id currently has buffered state.
    pub fn is_active(&self, transfer_id: u8) -> bool {
        self.active.contains_key(&transfer_id)
    }
}
