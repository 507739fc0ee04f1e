//! CRC-16/XMODEM checksum
//!
//! Polynomial `0x1021`, initial value `0`, no reflection, no final xor.
//! Table-driven, one lookup per byte.

const POLY: u16 = 0x1021;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut crc = (byte as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[byte] = crc;
        byte += 1;
    }
    table
}

#[inline]
const fn step(crc: u16, byte: u8) -> u16 {
    (crc << 8) ^ TABLE[((crc >> 8) as u8 ^ byte) as usize]
}

/// Checksum of `bytes`
///
/// # Examples
/// ```
/// use tidepool_support::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x31C3);
/// assert_eq!(crc16(b""), 0);
/// ```
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0, |crc, &byte| step(crc, byte))
}

/// Incremental CRC-16/XMODEM
///
/// Feeding the input in pieces gives the same result as [`crc16`] over the
/// concatenation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    crc: u16,
}

impl Crc16 {
    /// Fresh hasher
    pub const fn new() -> Self {
        Self { crc: 0 }
    }

    /// Feeds more bytes
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.crc = bytes.iter().fold(self.crc, |crc, &byte| step(crc, byte));
        self
    }

    /// Checksum of everything fed so far
    pub const fn value(&self) -> u16 {
        self.crc
    }

    /// Starts over
    pub fn reset(&mut self) {
        self.crc = 0;
    }
}

impl std::hash::Hasher for Crc16 {
    fn finish(&self) -> u64 {
        u64::from(self.crc)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }
}
