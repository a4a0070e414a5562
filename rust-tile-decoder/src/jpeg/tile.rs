use tracing::trace;

use crate::{
    error::Result,
    image::{Tile, TileSink},
    jpeg::{
        color::{pack_rgb565, to_rgb},
        header::FrameInfo,
    },
};

/// Largest MCU side in pixels: eight times the largest sampling factor.
const MAX_CELL: usize = 8 * 4;

/// Builds one MCU worth of pixels at a time and hands it to a [`TileSink`].
///
/// The cell is the size of an MCU (16x16 for 4:2:0, 8x8 for grayscale). Chroma blocks are
/// stretched over it by repeating each sample as often as the luma sampling factors call for.
/// Both buffers are sized for the largest possible MCU and reused for every cell.
pub struct TileAssembler {
    // Y, Cb and Cr interleaved, MAX_CELL samples per row.
    samples: [u8; MAX_CELL * MAX_CELL * 3],
    pixels: [u16; MAX_CELL * MAX_CELL],
    cell_width: usize,
    cell_height: usize,
    color: bool,
}

impl Default for TileAssembler {
    fn default() -> Self {
        Self {
            samples: [0; MAX_CELL * MAX_CELL * 3],
            pixels: [0; MAX_CELL * MAX_CELL],
            cell_width: 8,
            cell_height: 8,
            color: false,
        }
    }
}

impl TileAssembler {
    /// Sizes the cell for `frame`'s MCU and clears it.
    pub fn configure(&mut self, frame: &FrameInfo) {
        self.cell_width = 8 * frame.max_xy_sampling_factor.0 as usize;
        self.cell_height = 8 * frame.max_xy_sampling_factor.1 as usize;
        self.color = frame.components.len() == 3;
        self.samples.fill(0);
    }

    /// Copies an 8x8 sample block of a component into the cell. `bx` and `by` are the block's
    /// position in the component's block grid; only their offset within the MCU matters here.
    pub fn place_block(
        &mut self,
        frame: &FrameInfo,
        component_index: usize,
        bx: usize,
        by: usize,
        block: &[u8; 64],
    ) {
        let (h, v) = frame.components[component_index].xy_sampling_factor;
        let (h_max, v_max) = frame.max_xy_sampling_factor;
        let repeat_x = (h_max / h) as usize;
        let repeat_y = (v_max / v) as usize;
        let origin_x = (bx % h as usize) * 8 * repeat_x;
        let origin_y = (by % v as usize) * 8 * repeat_y;

        for (row, samples) in block.chunks_exact(8).enumerate() {
            for (column, &sample) in samples.iter().enumerate() {
                let x = origin_x + column * repeat_x;
                let y = origin_y + row * repeat_y;
                for dy in 0..repeat_y {
                    for dx in 0..repeat_x {
                        self.samples[((y + dy) * MAX_CELL + x + dx) * 3 + component_index] = sample;
                    }
                }
            }
        }
    }

    /// Converts the cell of MCU `(mx, my)` to RGB565 and emits it.
    pub fn emit<S: TileSink + ?Sized>(
        &mut self,
        sink: &mut S,
        frame: &FrameInfo,
        mx: usize,
        my: usize,
    ) -> Result<()> {
        for y in 0..self.cell_height {
            for x in 0..self.cell_width {
                let sample = &self.samples[(y * MAX_CELL + x) * 3..][..3];
                let (r, g, b) = if self.color {
                    to_rgb(sample[0], sample[1], sample[2])
                } else {
                    (sample[0], sample[0], sample[0])
                };
                self.pixels[y * self.cell_width + x] = pack_rgb565(r, g, b);
            }
        }

        let tile = Tile {
            pixels: &self.pixels[..self.cell_width * self.cell_height],
            x: (mx * self.cell_width) as u16,
            y: (my * self.cell_height) as u16,
            width: self.cell_width as u16,
            height: self.cell_height as u16,
            image_width: frame.image_size.0,
            image_height: frame.image_size.1,
        };
        trace!(x = tile.x, y = tile.y, "emit tile");
        sink.emit_tile(&tile)
    }
}
