//! Builds small JPEG streams for the decoding tests.
#![allow(dead_code)]

/// Zig-zag position to natural index.
#[rustfmt::skip]
pub const UNZIG: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

pub type Block = [i32; 64];

/// DC table: sizes 0 through 11, all with 4-bit codes.
pub fn dc_table() -> ([u8; 16], Vec<u8>) {
    let mut counts = [0u8; 16];
    counts[3] = 12;
    (counts, (0..12).collect())
}

/// AC table covering every possible symbol: 128 8-bit codes, then 128 9-bit codes.
pub fn ac_table() -> ([u8; 16], Vec<u8>) {
    let mut counts = [0u8; 16];
    counts[7] = 128;
    counts[8] = 128;
    (counts, (0..=255).collect())
}

fn canonical_codes((counts, symbols): ([u8; 16], Vec<u8>)) -> Vec<(u32, u8)> {
    let mut codes = vec![(0, 0); 256];
    let mut code = 0u32;
    let mut k = 0;
    for (length, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            codes[symbols[k] as usize] = (code, length as u8 + 1);
            code += 1;
            k += 1;
        }
        code <<= 1;
    }
    codes
}

/// Writes bits MSB first, stuffing a zero byte after every 0xFF.
#[derive(Default)]
pub struct BitWriter {
    pub out: Vec<u8>,
    accumulator: u32,
    count: u8,
}

impl BitWriter {
    pub fn write(&mut self, value: u32, length: u8) {
        for i in (0..length).rev() {
            self.accumulator = (self.accumulator << 1) | ((value >> i) & 1);
            self.count += 1;
            if self.count == 8 {
                let byte = self.accumulator as u8;
                self.out.push(byte);
                if byte == 0xFF {
                    self.out.push(0x00);
                }
                self.accumulator = 0;
                self.count = 0;
            }
        }
    }

    /// Pads the last byte with one bits.
    pub fn flush(&mut self) {
        if self.count > 0 {
            let padding = 8 - self.count;
            self.write((1 << padding) - 1, padding);
        }
    }
}

fn magnitude(value: i32) -> (u8, u32) {
    if value == 0 {
        return (0, 0);
    }
    let size = (32 - value.unsigned_abs().leading_zeros()) as u8;
    let bits = if value > 0 { value } else { value + (1 << size) - 1 };
    (size, bits as u32)
}

enum Pending {
    Zero,
    Correction(bool),
}

/// Entropy-codes blocks with [`dc_table`] and [`ac_table`]. Every block ends its own band, so
/// no end-of-band run spans blocks.
pub struct ScanEncoder {
    bits: BitWriter,
    dc_codes: Vec<(u32, u8)>,
    ac_codes: Vec<(u32, u8)>,
    predictions: [i32; 4],
    next_restart: u8,
}

impl Default for ScanEncoder {
    fn default() -> Self {
        Self {
            bits: BitWriter::default(),
            dc_codes: canonical_codes(dc_table()),
            ac_codes: canonical_codes(ac_table()),
            predictions: [0; 4],
            next_restart: 0,
        }
    }
}

impl ScanEncoder {
    fn dc_symbol(&mut self, symbol: u8) {
        let (code, length) = self.dc_codes[symbol as usize];
        self.bits.write(code, length);
    }

    fn ac_symbol(&mut self, symbol: u8) {
        let (code, length) = self.ac_codes[symbol as usize];
        self.bits.write(code, length);
    }

    fn bit(&mut self, bit: bool) {
        self.bits.write(bit as u32, 1);
    }

    /// A sequential block: DC and all 63 AC coefficients.
    pub fn baseline(&mut self, component: usize, block: &Block) {
        self.dc_first(component, block[0], 0);
        self.ac_first(block, 1, 63, 0);
    }

    pub fn dc_first(&mut self, component: usize, dc: i32, al: u8) {
        let value = dc >> al;
        let (size, bits) = magnitude(value - self.predictions[component]);
        self.predictions[component] = value;
        self.dc_symbol(size);
        self.bits.write(bits, size);
    }

    pub fn ac_first(&mut self, block: &Block, zig_start: usize, zig_end: usize, al: u8) {
        let mut run = 0u8;
        for &u in &UNZIG[zig_start..=zig_end] {
            let c = block[u];
            let value = c.signum() * (c.abs() >> al);
            if value == 0 {
                run += 1;
                continue;
            }
            while run >= 16 {
                self.ac_symbol(0xF0);
                run -= 16;
            }
            let (size, bits) = magnitude(value);
            self.ac_symbol((run << 4) | size);
            self.bits.write(bits, size);
            run = 0;
        }
        if run > 0 {
            self.ac_symbol(0x00);
        }
    }

    pub fn dc_refine(&mut self, dc: i32, al: u8) {
        self.bit((dc >> al) & 1 == 1);
    }

    pub fn ac_refine(&mut self, block: &Block, zig_start: usize, zig_end: usize, al: u8) {
        let mut pending: Vec<Pending> = Vec::new();
        for &u in &UNZIG[zig_start..=zig_end] {
            let level = block[u].abs();
            if level >> (al + 1) != 0 {
                pending.push(Pending::Correction((level >> al) & 1 == 1));
                continue;
            }
            if (level >> al) & 1 == 0 {
                pending.push(Pending::Zero);
                continue;
            }

            while pending.iter().filter(|p| matches!(p, Pending::Zero)).count() >= 16 {
                self.ac_symbol(0xF0);
                let mut zeros = 0;
                let mut consumed = 0;
                let mut corrections = Vec::new();
                for p in &pending {
                    consumed += 1;
                    match p {
                        Pending::Zero => {
                            zeros += 1;
                            if zeros == 16 {
                                break;
                            }
                        }
                        Pending::Correction(bit) => corrections.push(*bit),
                    }
                }
                pending.drain(..consumed);
                for bit in corrections {
                    self.bit(bit);
                }
            }

            let zeros = pending.iter().filter(|p| matches!(p, Pending::Zero)).count() as u8;
            self.ac_symbol((zeros << 4) | 1);
            self.bit(block[u] > 0);
            for p in pending.drain(..) {
                if let Pending::Correction(bit) = p {
                    self.bit(bit);
                }
            }
        }
        if !pending.is_empty() {
            self.ac_symbol(0x00);
            for p in pending {
                if let Pending::Correction(bit) = p {
                    self.bit(bit);
                }
            }
        }
    }

    /// Ends a restart interval: pads to a byte, writes the next RSTn and resets DC prediction.
    pub fn restart(&mut self) {
        self.bits.flush();
        self.bits.out.extend_from_slice(&[0xFF, 0xD0 + self.next_restart]);
        self.next_restart = (self.next_restart + 1) % 8;
        self.predictions = [0; 4];
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bits.flush();
        self.bits.out
    }
}

/// Component id, horizontal and vertical sampling, quantization table.
pub type FrameComponentSpec = (u8, u8, u8, u8);

/// Assembles marker segments into a JPEG stream, starting with SOI.
pub struct JpegWriter {
    bytes: Vec<u8>,
}

impl Default for JpegWriter {
    fn default() -> Self {
        Self {
            bytes: vec![0xFF, 0xD8],
        }
    }
}

impl JpegWriter {
    pub fn segment(&mut self, marker: u8, payload: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(&[0xFF, marker]);
        self.bytes
            .extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    /// An 8-bit quantization table, given in zig-zag order.
    pub fn dqt(&mut self, id: u8, table: &[u8; 64]) -> &mut Self {
        let mut payload = vec![id];
        payload.extend_from_slice(table);
        self.segment(0xDB, &payload)
    }

    pub fn dht(&mut self, class: u8, id: u8, (counts, symbols): ([u8; 16], Vec<u8>)) -> &mut Self {
        let mut payload = vec![(class << 4) | id];
        payload.extend_from_slice(&counts);
        payload.extend_from_slice(&symbols);
        self.segment(0xC4, &payload)
    }

    /// DC and AC table 0, matching [`ScanEncoder`].
    pub fn huffman_tables(&mut self) -> &mut Self {
        self.dht(0, 0, dc_table()).dht(1, 0, ac_table())
    }

    pub fn dri(&mut self, interval: u16) -> &mut Self {
        self.segment(0xDD, &interval.to_be_bytes())
    }

    pub fn sof(
        &mut self,
        marker: u8,
        width: u16,
        height: u16,
        components: &[FrameComponentSpec],
    ) -> &mut Self {
        let mut payload = vec![8];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.push(components.len() as u8);
        for &(id, h, v, tq) in components {
            payload.extend_from_slice(&[id, (h << 4) | v, tq]);
        }
        self.segment(marker, &payload)
    }

    /// An SOS header using table 0 for everything, followed by its entropy-coded data.
    pub fn sos(
        &mut self,
        ids: &[u8],
        zig_start: u8,
        zig_end: u8,
        ah: u8,
        al: u8,
        data: &[u8],
    ) -> &mut Self {
        let mut payload = vec![ids.len() as u8];
        for &id in ids {
            payload.extend_from_slice(&[id, 0x00]);
        }
        payload.extend_from_slice(&[zig_start, zig_end, (ah << 4) | al]);
        self.segment(0xDA, &payload);
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        let mut bytes = std::mem::take(&mut self.bytes);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }
}

/// What a grey sample looks like once packed.
pub fn grey565(level: u8) -> u16 {
    let level = level as u16;
    ((level & 0xF8) << 8) | ((level & 0xFC) << 3) | (level >> 3)
}

/// A block with only a DC coefficient, which comes out flat at `dc / 8 + 128` when the
/// quantizer is 1.
pub fn flat(dc: i32) -> Block {
    let mut block = [0; 64];
    block[0] = dc;
    block
}
