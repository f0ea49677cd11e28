//! P25 capture record reader.
//!
//! A capture is a concatenation of pre-framed data units as written by the
//! upstream recorder: a 5-byte header (DUID, NAC, big-endian payload length)
//! followed by the payload bytes. The reader surfaces units verbatim; body
//! error correction happens downstream and only for the fields that need it.

use crate::error::Result;
use std::io::Read;

/// Data Unit ID - the one-byte tag of a P25 frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duid {
    /// Header Data Unit (0x00).
    Hdu,
    /// Terminator Data Unit (0x03, 0x07, 0x0F).
    Tdu,
    /// Logical Data Unit 1 - voice (0x05).
    Ldu1,
    /// Logical Data Unit 2 - voice plus encryption sync (0x0A).
    Ldu2,
    /// Packet Data Unit (0x0C).
    Pdu,
    /// Trunking System Block (0x12).
    Tsbk,
    /// Anything else; recorded but carries no voice.
    Other(u8),
}

impl Duid {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Duid::Hdu,
            0x03 | 0x07 | 0x0F => Duid::Tdu,
            0x05 => Duid::Ldu1,
            0x0A => Duid::Ldu2,
            0x0C => Duid::Pdu,
            0x12 => Duid::Tsbk,
            other => Duid::Other(other),
        }
    }

    /// True for LDU1/LDU2, the units that carry IMBE voice.
    pub fn is_voice(&self) -> bool {
        matches!(self, Duid::Ldu1 | Duid::Ldu2)
    }

    /// Display name matching the classic frame dump output.
    pub fn name(&self) -> &'static str {
        match self {
            Duid::Hdu => "HDU (Header Data Unit)",
            Duid::Tdu => "TDU (Terminator Data Unit)",
            Duid::Ldu1 => "LDU1 (Logical Data Unit 1)",
            Duid::Ldu2 => "LDU2 (Logical Data Unit 2)",
            Duid::Pdu => "PDU (Packet Data Unit)",
            Duid::Tsbk => "TSBK (Trunking System Block)",
            Duid::Other(_) => "Unknown DUID",
        }
    }
}

/// One record from a capture stream.
#[derive(Debug, Clone)]
pub struct DataUnit {
    pub duid: Duid,
    /// Full 16 header bits; the lower 12 are the Network Access Code, the
    /// upper 4 are reserved framing and are preserved uninterpreted.
    pub nac: u16,
    pub payload: Vec<u8>,
}

impl DataUnit {
    /// The 12-bit Network Access Code.
    pub fn nac_12(&self) -> u16 {
        self.nac & 0x0FFF
    }
}

/// Outcome of reading the next unit.
#[derive(Debug)]
pub enum FrameRead {
    /// A complete unit.
    Unit(DataUnit),
    /// Clean end of the capture.
    EndOfStream,
    /// The final unit's payload short-read; callers must treat this as end
    /// of capture, not as a recoverable error.
    Truncated(DataUnit),
}

/// Sequential reader over a capture byte stream. Reads strictly
/// front-to-back; never seeks.
pub struct FrameReader<R: Read> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next data unit.
    pub fn next_unit(&mut self) -> Result<FrameRead> {
        let mut header = [0u8; 5];
        if !self.read_fully(&mut header)? {
            return Ok(FrameRead::EndOfStream);
        }

        let duid = Duid::from_byte(header[0]);
        let nac = u16::from_be_bytes([header[1], header[2]]);
        let length = u16::from_be_bytes([header[3], header[4]]) as usize;

        let mut payload = vec![0u8; length];
        let got = self.read_up_to(&mut payload)?;
        if got < length {
            payload.truncate(got);
            return Ok(FrameRead::Truncated(DataUnit { duid, nac, payload }));
        }

        Ok(FrameRead::Unit(DataUnit { duid, nac, payload }))
    }

    /// Read exactly `buf.len()` bytes; false on clean EOF at the first byte
    /// or anywhere within the header.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<bool> {
        let got = self.read_up_to(buf)?;
        Ok(got == buf.len())
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }
}
