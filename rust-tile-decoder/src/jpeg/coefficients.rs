use crate::{
    bitstream::EntropySource,
    error::{Error, Result},
    jpeg::{
        header::{HuffmanTable, MAX_COMPONENTS},
        scan_header::ScanDescriptor,
    },
};

/// 64 DCT coefficients in natural (row-major) order.
pub type Block = [i32; 64];

/// Maps a zig-zag position to its natural-order index.
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

/// Entropy decoding state that lives across the blocks of a scan: the DC predictors and the
/// end-of-band run.
#[derive(Debug, Default)]
pub struct CoefficientDecoder {
    dc_predictions: [i32; MAX_COMPONENTS],
    eob_run: u32,
}

impl CoefficientDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Clears the DC predictors and any pending end-of-band run. Called at the start of each
    /// scan and at every restart marker.
    pub fn reset(&mut self) {
        self.dc_predictions = [0; MAX_COMPONENTS];
        self.eob_run = 0;
    }

    /// Blocks still to be skipped by the current end-of-band run.
    pub fn eob_run(&self) -> u32 {
        self.eob_run
    }

    /// Decodes one block's share of a scan into `block`.
    ///
    /// `block` must hold whatever earlier scans produced for this position (all zeros for
    /// sequential images). A table is only looked up if the scan needs it.
    pub fn decode_block<E: EntropySource>(
        &mut self,
        source: &mut E,
        block: &mut Block,
        component_index: usize,
        dc_table: Option<&HuffmanTable>,
        ac_table: Option<&HuffmanTable>,
        scan: &ScanDescriptor,
    ) -> Result<()> {
        if scan.is_refinement() {
            self.refine(source, block, ac_table, scan)
        } else {
            self.decode_first(source, block, component_index, dc_table, ac_table, scan)
        }
    }

    fn decode_first<E: EntropySource>(
        &mut self,
        source: &mut E,
        block: &mut Block,
        component_index: usize,
        dc_table: Option<&HuffmanTable>,
        ac_table: Option<&HuffmanTable>,
        scan: &ScanDescriptor,
    ) -> Result<()> {
        let zig_end = scan.zig_end as usize;
        let mut zig = scan.zig_start as usize;
        if zig == 0 {
            zig += 1;
            // Decode the DC coefficient, as specified in section F.2.2.1.
            let dc_table = dc_table.ok_or(Error::Format("missing DC Huffman table"))?;
            let size = source.decode_huffman(dc_table)?;
            if size > 16 {
                return Err(Error::Unsupported("excessive DC component"));
            }
            let delta = source.receive_extend(size)?;
            let prediction = &mut self.dc_predictions[component_index];
            *prediction = prediction.wrapping_add(delta);
            block[0] = *prediction << scan.al;
        }

        if zig > zig_end {
            return Ok(());
        }
        if self.eob_run > 0 {
            self.eob_run -= 1;
            return Ok(());
        }

        // Decode the AC coefficients, as specified in sections F.2.2.2 and G.1.2.2.
        let ac_table = ac_table.ok_or(Error::Format("missing AC Huffman table"))?;
        while zig <= zig_end {
            let symbol = source.decode_huffman(ac_table)?;
            let run = symbol >> 4;
            let size = symbol & 0x0F;
            if size != 0 {
                zig += run as usize;
                if zig > zig_end {
                    return Err(Error::Format("too many coefficients"));
                }
                let value = source.receive_extend(size)?;
                block[UNZIG[zig]] = value << scan.al;
            } else if run == 0x0F {
                // ZRL: sixteen zeros, counting the increment below.
                zig += 15;
            } else {
                self.start_eob_run(source, run)?;
                self.eob_run -= 1;
                break;
            }
            zig += 1;
        }
        Ok(())
    }

    /// EOBn: this block and the next `(1 << run) + bits(run) - 1` have no more coefficients
    /// in the band.
    fn start_eob_run<E: EntropySource>(&mut self, source: &mut E, run: u8) -> Result<()> {
        self.eob_run = 1 << run;
        if run > 0 {
            self.eob_run += source.decode_bits(run)?;
        }
        Ok(())
    }

    /// Decodes a successive approximation refinement block, as specified in section G.1.2.
    fn refine<E: EntropySource>(
        &mut self,
        source: &mut E,
        block: &mut Block,
        ac_table: Option<&HuffmanTable>,
        scan: &ScanDescriptor,
    ) -> Result<()> {
        let delta = 1i32 << scan.al;

        // Refining a DC coefficient is one bit.
        if scan.zig_start == 0 {
            if source.decode_bit()? {
                block[0] |= delta;
            }
            return Ok(());
        }

        let zig_end = scan.zig_end as usize;
        let mut zig = scan.zig_start as usize;
        if self.eob_run == 0 {
            let ac_table = ac_table.ok_or(Error::Format("missing AC Huffman table"))?;
            while zig <= zig_end {
                let symbol = source.decode_huffman(ac_table)?;
                let run = symbol >> 4;
                let mut value = 0;
                match symbol & 0x0F {
                    0 => {
                        if run != 0x0F {
                            self.start_eob_run(source, run)?;
                            break;
                        }
                        // ZRL: skip sixteen zero coefficients, refining the nonzero ones
                        // along the way.
                    }
                    1 => {
                        value = if source.decode_bit()? { delta } else { -delta };
                    }
                    _ => return Err(Error::Format("unexpected Huffman code")),
                }

                zig = Self::refine_non_zeroes(source, block, zig, zig_end, run as i32, delta)?;
                if zig > zig_end {
                    return Err(Error::Format("too many coefficients"));
                }
                if value != 0 {
                    block[UNZIG[zig]] = value;
                }
                zig += 1;
            }
        }

        if self.eob_run > 0 {
            self.eob_run -= 1;
            Self::refine_non_zeroes(source, block, zig, zig_end, -1, delta)?;
        }
        Ok(())
    }

    /// Walks zig-zag positions from `zig`, reading a correction bit for every nonzero
    /// coefficient. Stops on the zero that follows `zeros` skipped zeros and returns its
    /// position; a negative `zeros` never stops early.
    fn refine_non_zeroes<E: EntropySource>(
        source: &mut E,
        block: &mut Block,
        mut zig: usize,
        zig_end: usize,
        mut zeros: i32,
        delta: i32,
    ) -> Result<usize> {
        while zig <= zig_end {
            let u = UNZIG[zig];
            if block[u] == 0 {
                if zeros == 0 {
                    break;
                }
                zeros -= 1;
            } else if source.decode_bit()? {
                // The magnitude grows; the sign stays.
                if block[u] >= 0 {
                    block[u] += delta;
                } else {
                    block[u] -= delta;
                }
            }
            zig += 1;
        }
        Ok(zig)
    }
}
