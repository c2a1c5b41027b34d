//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Empty payload passed to an encoder
    #[error("empty payload")]
    Empty,

    /// Payload exceeds the per-frame limit
    #[error("payload too large: {0}")]
    Size(usize),

    /// Total length exceeds what a segment header can carry
    #[error("transfer too large: {0}")]
    TransferSize(usize),

    /// TLV value exceeds the space left in a frame
    #[error("tlv value too large: {0}")]
    ValueSize(usize),

    /// TLV shorter than its two-byte header
    #[error("tlv truncated")]
    Truncated,

    /// TLV length byte points past the end of the data
    #[error("tlv value overruns data")]
    ValueOverrun,
}
