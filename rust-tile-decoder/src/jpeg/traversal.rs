use crate::jpeg::{header::FrameInfo, scan_header::ScanDescriptor};

/// One block of a scan, in the order its data appears in the bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockVisit {
    /// Position of the component in the scan header.
    pub scan_index: usize,
    /// Position of the component in the frame header.
    pub component_index: usize,
    /// Block column and row in the component's block grid.
    pub bx: usize,
    pub by: usize,
    /// This block completes an MCU, so a restart marker may follow it.
    pub ends_mcu: bool,
}

/// Enumerates the blocks of one scan.
///
/// Interleaved scans walk MCU by MCU. For 4:2:0 there are four Y blocks in every 16x16 MCU,
/// so a 32x16 image visits its Y blocks in this order:
///
/// ```text
/// 0 1 4 5
/// 2 3 6 7
/// ```
///
/// Non-interleaved scans walk the component's own block grid left to right, top to bottom,
/// and carry no data for blocks that lie inside the last MCU but outside the image. A 24x16
/// 4:2:0 image has 8 Y blocks in its two MCUs, but a non-interleaved scan visits only 6:
///
/// ```text
/// 0 1 2
/// 3 4 5
/// ```
pub struct BlockTraversal<'a> {
    frame: &'a FrameInfo,
    scan: &'a ScanDescriptor,
    mcus_wide: usize,
    mcu_total: usize,
    // Interleaved cursor: MCU number, component within the scan, block within the MCU.
    mcu: usize,
    slot: usize,
    block: usize,
    // Non-interleaved cursor, a raster index into the padded block grid.
    raster: usize,
}

impl<'a> BlockTraversal<'a> {
    pub fn new(frame: &'a FrameInfo, scan: &'a ScanDescriptor) -> Self {
        let (mxx, myy) = frame.mcu_counts();
        Self {
            frame,
            scan,
            mcus_wide: mxx,
            mcu_total: mxx * myy,
            mcu: 0,
            slot: 0,
            block: 0,
            raster: 0,
        }
    }

    /// Number of MCUs in the scan, which is what a restart interval counts. In a
    /// non-interleaved scan every coded block is an MCU of its own.
    pub fn mcu_count(&self) -> usize {
        if self.scan.is_interleaved() {
            self.mcu_total
        } else {
            let index = self.scan.components[0].component_index;
            let (width, height) = self.frame.component_size(index);
            width.div_ceil(8) * height.div_ceil(8)
        }
    }

    fn next_interleaved(&mut self) -> Option<BlockVisit> {
        if self.mcu >= self.mcu_total {
            return None;
        }
        let scan_component = self.scan.components[self.slot];
        let component = &self.frame.components[scan_component.component_index];
        let (h, v) = (
            component.xy_sampling_factor.0 as usize,
            component.xy_sampling_factor.1 as usize,
        );
        let (mx, my) = (self.mcu % self.mcus_wide, self.mcu / self.mcus_wide);

        let mut visit = BlockVisit {
            scan_index: self.slot,
            component_index: scan_component.component_index,
            bx: h * mx + self.block % h,
            by: v * my + self.block / h,
            ends_mcu: false,
        };

        self.block += 1;
        if self.block == h * v {
            self.block = 0;
            self.slot += 1;
            if self.slot == self.scan.components.len() {
                self.slot = 0;
                self.mcu += 1;
                visit.ends_mcu = true;
            }
        }
        Some(visit)
    }

    fn next_single(&mut self) -> Option<BlockVisit> {
        let component_index = self.scan.components[0].component_index;
        let (blocks_wide, blocks_high) = self.frame.component_blocks(component_index);
        let (width, height) = self.frame.component_size(component_index);

        while self.raster < blocks_wide * blocks_high {
            let bx = self.raster % blocks_wide;
            let by = self.raster / blocks_wide;
            self.raster += 1;
            if bx * 8 >= width || by * 8 >= height {
                continue;
            }
            return Some(BlockVisit {
                scan_index: 0,
                component_index,
                bx,
                by,
                ends_mcu: true,
            });
        }
        None
    }
}

impl Iterator for BlockTraversal<'_> {
    type Item = BlockVisit;

    fn next(&mut self) -> Option<BlockVisit> {
        if self.scan.is_interleaved() {
            self.next_interleaved()
        } else {
            self.next_single()
        }
    }
}
