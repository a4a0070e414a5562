use byteorder::{BigEndian, ReadBytesExt};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::io::{self, Read};
use tracing::warn;

use crate::error::{Error, Result};

#[allow(non_camel_case_types)]
#[derive(PartialEq, Eq, PartialOrd, FromPrimitive, Debug, Clone, Copy)]
pub enum JPEGMarker {
    TEM = 0xFF01,

    SOF0 = 0xFFC0, // Baseline DCT
    SOF1 = 0xFFC1, // Extended sequential DCT
    SOF2 = 0xFFC2, // Progressive DCT
    SOF3 = 0xFFC3, // Lossless
    DHT = 0xFFC4,
    SOF5 = 0xFFC5,
    SOF6 = 0xFFC6,
    SOF7 = 0xFFC7,
    JPG = 0xFFC8,
    SOF9 = 0xFFC9,
    SOF10 = 0xFFCA,
    SOF11 = 0xFFCB,
    DAC = 0xFFCC,
    SOF13 = 0xFFCD,
    SOF14 = 0xFFCE,
    SOF15 = 0xFFCF,

    RST0 = 0xFFD0,
    RST1 = 0xFFD1,
    RST2 = 0xFFD2,
    RST3 = 0xFFD3,
    RST4 = 0xFFD4,
    RST5 = 0xFFD5,
    RST6 = 0xFFD6,
    RST7 = 0xFFD7,

    SOI = 0xFFD8,
    EOI = 0xFFD9,
    SOS = 0xFFDA,
    DQT = 0xFFDB,
    DNL = 0xFFDC,
    DRI = 0xFFDD,
    DHP = 0xFFDE,
    EXP = 0xFFDF,

    APP0 = 0xFFE0,
    APP1 = 0xFFE1,
    APP2 = 0xFFE2,
    APP3 = 0xFFE3,
    APP4 = 0xFFE4,
    APP5 = 0xFFE5,
    APP6 = 0xFFE6,
    APP7 = 0xFFE7,
    APP8 = 0xFFE8,
    APP9 = 0xFFE9,
    APP10 = 0xFFEA,
    APP11 = 0xFFEB,
    APP12 = 0xFFEC,
    APP13 = 0xFFED,
    APP14 = 0xFFEE,
    APP15 = 0xFFEF,

    JPG0 = 0xFFF0,
    JPG1 = 0xFFF1,
    JPG2 = 0xFFF2,
    JPG3 = 0xFFF3,
    JPG4 = 0xFFF4,
    JPG5 = 0xFFF5,
    JPG6 = 0xFFF6,
    JPG7 = 0xFFF7,
    JPG8 = 0xFFF8,
    JPG9 = 0xFFF9,
    JPG10 = 0xFFFA,
    JPG11 = 0xFFFB,
    JPG12 = 0xFFFC,
    JPG13 = 0xFFFD,
    COM = 0xFFFE,
}

impl JPEGMarker {
    /// Returns the second byte of the marker, the one following `0xFF`.
    pub fn code(self) -> u8 {
        (self as u16 & 0xFF) as u8
    }

    /// True for RST0 through RST7.
    pub fn is_restart(self) -> bool {
        self >= JPEGMarker::RST0 && self <= JPEGMarker::RST7
    }
}

/// Byte-level reader for a JPEG stream.
///
/// Reads straight from the underlying source so that only the bytes the decoder actually needs
/// are ever requested from it. Up to two bytes can be pushed back, which is how the entropy
/// decoder returns a marker it ran into.
pub struct JPEGParser<R> {
    source: R,
    pushback: [u8; 2],
    pushed: usize,
    position: u64,
}

impl<R: Read> JPEGParser<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            pushback: [0; 2],
            pushed: 0,
            position: 0,
        }
    }

    pub fn to_marker(word: u16) -> Result<JPEGMarker> {
        FromPrimitive::from_u16(word).ok_or(Error::Format("unknown marker"))
    }

    pub fn read_next_byte(&mut self) -> Result<u8> {
        let byte = if self.pushed > 0 {
            self.pushed -= 1;
            self.pushback[self.pushed]
        } else {
            self.source.read_u8()?
        };
        self.position += 1;
        Ok(byte)
    }

    pub fn read_next_word(&mut self) -> Result<u16> {
        if self.pushed > 0 {
            let high = self.read_next_byte()?;
            let low = self.read_next_byte()?;
            return Ok(u16::from_be_bytes([high, low]));
        }
        let word = self.source.read_u16::<BigEndian>()?;
        self.position += 2;
        Ok(word)
    }

    /// Fills `buf` completely or fails with the source's error.
    pub fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() && self.pushed > 0 {
            buf[filled] = self.read_next_byte()?;
            filled += 1;
        }
        self.source.read_exact(&mut buf[filled..])?;
        self.position += (buf.len() - filled) as u64;
        Ok(())
    }

    /// Returns `bytes` to the stream; the next reads yield them in order.
    pub fn push_back(&mut self, bytes: &[u8]) {
        debug_assert!(self.pushed + bytes.len() <= self.pushback.len());
        for &byte in bytes.iter().rev() {
            self.pushback[self.pushed] = byte;
            self.pushed += 1;
            self.position -= 1;
        }
    }

    /// Reads the next marker, skipping fill bytes and any garbage in front of it.
    pub fn read_next_marker(&mut self) -> Result<JPEGMarker> {
        let mut skipped = 0usize;
        loop {
            if self.read_next_byte()? != 0xFF {
                skipped += 1;
                continue;
            }

            // Any number of 0xFF fill bytes may precede the marker code.
            let mut code = self.read_next_byte()?;
            while code == 0xFF {
                code = self.read_next_byte()?;
            }
            if code == 0x00 {
                skipped += 2;
                continue;
            }

            if skipped > 0 {
                warn!(skipped, "skipped extraneous bytes before marker");
            }
            return Self::to_marker(0xFF00 | code as u16);
        }
    }

    /// Reads a segment length word and returns the number of payload bytes that follow it.
    pub fn read_segment_length(&mut self) -> Result<usize> {
        match self.read_next_word()?.checked_sub(2) {
            Some(length) => Ok(length as usize),
            None => Err(Error::Format("segment length shorter than its own field")),
        }
    }

    pub fn skip_marker_with_length(&mut self) -> Result<()> {
        let length = self.read_segment_length()?;
        self.skip(length)
    }

    pub fn skip(&mut self, mut count: usize) -> Result<()> {
        while count > 0 && self.pushed > 0 {
            self.read_next_byte()?;
            count -= 1;
        }
        let skipped = io::copy(&mut (&mut self.source).take(count as u64), &mut io::sink())?;
        self.position += skipped;
        if skipped < count as u64 {
            return Err(Error::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}
