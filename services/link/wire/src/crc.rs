//! CRC-16/CCITT-FALSE engine.
//!
//! Polynomial 0x1021, init 0xFFFF, MSB-first, no input/output reflection,
//! no final XOR. The stream parser folds bytes into a running value as they
//! arrive, so the one-byte [`step`] is the primitive and [`compute`] is the
//! fold over it.

/// Initial value for a running CRC.
pub const CRC_INIT: u16 = 0xFFFF;

/// Advance a running CRC by one byte.
pub fn step(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ ((byte as u16) << 8);
    for _ in 0..8 {
        if crc & 0x8000 != 0 {
            crc = (crc << 1) ^ 0x1021;
        } else {
            crc <<= 1;
        }
    }
    crc
}

/// CRC over a whole buffer, starting from [`CRC_INIT`].
pub fn compute(data: &[u8]) -> u16 {
    data.iter().fold(CRC_INIT, |crc, &b| step(crc, b))
}
