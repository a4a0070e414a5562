use std::f64::consts::PI;

use crate::jpeg::{
    coefficients::{Block, UNZIG},
    header::QuantizationTable,
};

/// Turns decoded coefficient blocks into 8x8 sample blocks.
///
/// Owns the cosine table and the intermediate buffer so that reconstructing a block allocates
/// nothing.
pub struct BlockReconstructor {
    // cosines[x][u] = C(u) / 2 * cos((2x + 1) * u * pi / 16)
    cosines: [[f64; 8]; 8],
    workspace: [f64; 64],
}

impl Default for BlockReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockReconstructor {
    pub fn new() -> Self {
        let mut cosines = [[0f64; 8]; 8];
        for (x, row) in cosines.iter_mut().enumerate() {
            for (u, cosine) in row.iter_mut().enumerate() {
                let cu = if u == 0 { 1.0 / 2f64.sqrt() } else { 1.0 };
                *cosine = cu / 2.0 * f64::cos((2.0 * x as f64 + 1.0) * u as f64 * PI / 16.0);
            }
        }
        Self {
            cosines,
            workspace: [0f64; 64],
        }
    }

    /// Dequantizes `block`, applies the inverse DCT, then level shifts and clamps into `out`,
    /// which is row-major.
    pub fn reconstruct(&mut self, block: &Block, table: &QuantizationTable, out: &mut [u8; 64]) {
        let mut coefficients = [0f64; 64];
        for (zig, &quant) in table.table.iter().enumerate() {
            let natural = UNZIG[zig];
            coefficients[natural] = block[natural] as f64 * quant as f64;
        }

        self.idct(&coefficients);

        for (sample, &value) in out.iter_mut().zip(self.workspace.iter()) {
            *sample = level_shift(value.round());
        }
    }

    /// Separable form of the IDCT in section A.3.3. Leaves the samples, still centred on zero,
    /// in the workspace.
    fn idct(&mut self, coefficients: &[f64; 64]) {
        // Rows: rows[v][x] = sum over u of C(u)/2 cos(..x..u..) F(v, u)
        let mut rows = [0f64; 64];
        for v in 0..8 {
            for x in 0..8 {
                rows[v * 8 + x] = (0..8)
                    .map(|u| self.cosines[x][u] * coefficients[v * 8 + u])
                    .sum();
            }
        }
        // Columns.
        for y in 0..8 {
            for x in 0..8 {
                self.workspace[y * 8 + x] =
                    (0..8).map(|v| self.cosines[y][v] * rows[v * 8 + x]).sum();
            }
        }
    }
}

fn level_shift(value: f64) -> u8 {
    if value < -128.0 {
        0
    } else if value > 127.0 {
        255
    } else {
        (value as i32 + 128) as u8
    }
}
