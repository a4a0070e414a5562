use std::io::Read;

use crate::error::{Error, Result};
use crate::jpeg::{header::HuffmanTable, jpeg_reader::JPEGParser};

/// The entropy-decoding operations scan decoding is built on.
///
/// [`Bitstream`] is the real implementation; anything else implementing this can drive the
/// coefficient decoder, which is how the decoder is tested against hand-written symbol streams.
pub trait EntropySource {
    /// Decodes one Huffman-coded symbol.
    fn decode_huffman(&mut self, table: &HuffmanTable) -> Result<u8>;
    fn decode_bit(&mut self) -> Result<bool>;
    /// Reads `count` (at most 16) raw bits, most significant first.
    fn decode_bits(&mut self, count: u8) -> Result<u32>;
    /// Fills `buf` from the byte stream underneath the bits. Used to read restart markers.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<()>;
    /// Drops any buffered bits so the next read starts on a byte boundary.
    fn reset(&mut self);

    /// RECEIVE then EXTEND, as specified in section F.2.2.1.
    fn receive_extend(&mut self, size: u8) -> Result<i32> {
        if size == 0 {
            return Ok(0);
        }
        let value = self.decode_bits(size)? as i32;
        if value < 1 << (size - 1) {
            // A leading 0 bit marks a negative value.
            Ok(value - (1 << size) + 1)
        } else {
            Ok(value)
        }
    }
}

/// Bitstream reader over the entropy-coded segment of a scan.
///
/// Removes stuffed zero bytes. Bits are only fetched when a symbol needs them, so a valid scan
/// never reads into the marker that ends it. Running into a marker anyway means the scan was cut
/// short: the marker goes back to the parser and the read fails.
pub struct Bitstream<'p, R> {
    parser: &'p mut JPEGParser<R>,
    accumulator: u32,
    available: u8,
}

impl<'p, R: Read> Bitstream<'p, R> {
    pub fn new(parser: &'p mut JPEGParser<R>) -> Self {
        Self {
            parser,
            accumulator: 0,
            available: 0,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let byte = match self.parser.read_next_byte()? {
            0xFF => {
                let mut next = self.parser.read_next_byte()?;
                while next == 0xFF {
                    next = self.parser.read_next_byte()?;
                }
                if next != 0x00 {
                    self.parser.push_back(&[0xFF, next]);
                    return Err(Error::Format("short Huffman data"));
                }
                0xFF
            }
            byte => byte,
        };
        self.accumulator = (self.accumulator << 8) | byte as u32;
        self.available += 8;
        Ok(())
    }

    fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 16);
        while self.available < count {
            self.fill()?;
        }
        self.available -= count;
        let value = (self.accumulator >> self.available) & ((1u32 << count) - 1);
        self.accumulator &= (1u32 << self.available) - 1;
        Ok(value)
    }
}

impl<R: Read> EntropySource for Bitstream<'_, R> {
    /// Decodes a symbol with the procedure of section F.2.2.3, one bit at a time.
    fn decode_huffman(&mut self, table: &HuffmanTable) -> Result<u8> {
        let mut code = self.read_bits(1)? as i32;
        for length in 1..=16 {
            if code <= table.max_code[length] {
                let index = table.val_ptr[length] + (code - table.min_code[length]) as usize;
                return Ok(table.symbols[index]);
            }
            if length < 16 {
                code = (code << 1) | self.read_bits(1)? as i32;
            }
        }
        Err(Error::Format("bad Huffman code"))
    }

    fn decode_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    fn decode_bits(&mut self, count: u8) -> Result<u32> {
        if count == 0 {
            return Ok(0);
        }
        self.read_bits(count)
    }

    fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        self.parser.read_full(buf)
    }

    fn reset(&mut self) {
        self.accumulator = 0;
        self.available = 0;
    }
}
