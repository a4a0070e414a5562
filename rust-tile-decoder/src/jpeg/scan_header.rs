use std::io::Read;

use tracing::debug;

use crate::{
    error::{Error, Result},
    jpeg::{
        header::{FrameInfo, MAX_COMPONENTS, MAX_TABLES},
        jpeg_reader::JPEGParser,
    },
};

/// Largest legal SOS payload: the component count, two bytes per component, Ss, Se and Ah/Al.
const MAX_PAYLOAD: usize = 4 + 2 * MAX_COMPONENTS;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index into the frame's component list.
    pub component_index: usize,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// One validated SOS header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanDescriptor {
    /// In header order, which is also the order of the blocks in each MCU.
    pub components: Vec<ScanComponent>,
    /// Spectral selection bounds, in zig-zag positions. Called Ss and Se in T.81.
    pub zig_start: u8,
    pub zig_end: u8,
    /// Successive approximation bit positions, high and low.
    pub ah: u8,
    pub al: u8,
}

impl ScanDescriptor {
    /// Reads an SOS segment and leaves the parser at the first byte of entropy-coded data.
    pub fn read<R: Read>(reader: &mut JPEGParser<R>, frame: &FrameInfo) -> Result<Self> {
        let length = reader.read_segment_length()?;
        if length < 6 || length > 4 + 2 * frame.components.len() || length % 2 != 0 {
            return Err(Error::Format("SOS has wrong length"));
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        reader.read_full(&mut payload[..length])?;
        Self::parse(&payload[..length], frame)
    }

    /// Validates an SOS payload against the frame it belongs to, as specified in section B.2.3
    /// and, for progressive frames, section G.1.1.1.
    pub fn parse(payload: &[u8], frame: &FrameInfo) -> Result<Self> {
        let component_count = *payload
            .first()
            .ok_or(Error::Format("SOS has wrong length"))? as usize;
        if component_count == 0 || component_count > frame.components.len() {
            return Err(Error::Format("bad number of scan components"));
        }
        if payload.len() != 4 + 2 * component_count {
            return Err(Error::Format("SOS length inconsistent with number of components"));
        }

        let mut components: Vec<ScanComponent> = Vec::with_capacity(component_count);
        let mut total_hv = 0;
        for i in 0..component_count {
            let selector = payload[1 + 2 * i];
            let component_index = frame
                .components
                .iter()
                .position(|c| c.identifier == selector)
                .ok_or(Error::Format("unknown component selector"))?;
            // Frame identifiers are unique, so comparing indexes is enough.
            if components.iter().any(|c| c.component_index == component_index) {
                return Err(Error::Format("repeated component selector"));
            }
            total_hv += frame.components[component_index].blocks_per_mcu();

            let tables = payload[2 + 2 * i];
            let dc_table = tables >> 4;
            let ac_table = tables & 0x0F;
            // Baseline frames may only use tables 0 and 1 (table B.3).
            if dc_table as usize >= MAX_TABLES || (frame.baseline && dc_table > 1) {
                return Err(Error::Format("bad Td value"));
            }
            if ac_table as usize >= MAX_TABLES || (frame.baseline && ac_table > 1) {
                return Err(Error::Format("bad Ta value"));
            }

            components.push(ScanComponent {
                component_index,
                dc_table,
                ac_table,
            });
        }
        if component_count > 1 && total_hv > 10 {
            return Err(Error::Format("total sampling factors too large"));
        }

        let mut scan = Self {
            components,
            zig_start: 0,
            zig_end: 63,
            ah: 0,
            al: 0,
        };

        // Sequential scans always cover every coefficient at full precision, whatever the
        // header bytes say.
        if frame.progressive {
            let spectral = &payload[1 + 2 * component_count..];
            scan.zig_start = spectral[0];
            scan.zig_end = spectral[1];
            scan.ah = spectral[2] >> 4;
            scan.al = spectral[2] & 0x0F;

            if (scan.zig_start == 0 && scan.zig_end != 0)
                || scan.zig_start > scan.zig_end
                || scan.zig_end > 63
            {
                return Err(Error::Format("bad spectral selection bounds"));
            }
            if scan.zig_start != 0 && component_count != 1 {
                return Err(Error::Format(
                    "progressive AC coefficients for more than one component",
                ));
            }
            if scan.ah != 0 && scan.ah != scan.al + 1 {
                return Err(Error::Format("bad successive approximation values"));
            }
            // Shifting an i32 coefficient by more than this is meaningless.
            if scan.al > 13 {
                return Err(Error::Format("bad successive approximation values"));
            }
        }

        debug!(
            components = component_count,
            zig_start = scan.zig_start,
            zig_end = scan.zig_end,
            ah = scan.ah,
            al = scan.al,
            "start of scan"
        );
        Ok(scan)
    }

    /// More than one component, so blocks are grouped into MCUs.
    pub fn is_interleaved(&self) -> bool {
        self.components.len() > 1
    }

    pub fn is_refinement(&self) -> bool {
        self.ah != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::header::FrameComponent;
    use test_log::test;

    fn frame(progressive: bool) -> FrameInfo {
        FrameInfo {
            image_size: (24, 16),
            components: vec![
                FrameComponent {
                    identifier: 1,
                    xy_sampling_factor: (2, 2),
                    qtable_id: 0,
                },
                FrameComponent {
                    identifier: 2,
                    xy_sampling_factor: (1, 1),
                    qtable_id: 1,
                },
                FrameComponent {
                    identifier: 3,
                    xy_sampling_factor: (1, 1),
                    qtable_id: 1,
                },
            ],
            max_xy_sampling_factor: (2, 2),
            baseline: !progressive,
            progressive,
        }
    }

    #[test]
    fn parses_baseline_scan() {
        let payload = [3, 1, 0x00, 2, 0x11, 3, 0x11, 0, 63, 0];
        let scan = ScanDescriptor::parse(&payload, &frame(false)).unwrap();
        assert_eq!(scan.components.len(), 3);
        assert_eq!(scan.components[1].component_index, 1);
        assert_eq!((scan.components[2].dc_table, scan.components[2].ac_table), (1, 1));
        assert_eq!((scan.zig_start, scan.zig_end, scan.ah, scan.al), (0, 63, 0, 0));
        assert!(scan.is_interleaved());
    }

    #[test]
    fn baseline_ignores_spectral_bytes() {
        let payload = [1, 1, 0x00, 5, 9, 0x21];
        let scan = ScanDescriptor::parse(&payload, &frame(false)).unwrap();
        assert_eq!((scan.zig_start, scan.zig_end, scan.ah, scan.al), (0, 63, 0, 0));
    }

    #[test]
    fn parses_progressive_refinement() {
        let payload = [1, 2, 0x01, 1, 5, 0x21];
        let scan = ScanDescriptor::parse(&payload, &frame(true)).unwrap();
        assert_eq!((scan.zig_start, scan.zig_end, scan.ah, scan.al), (1, 5, 2, 1));
        assert!(scan.is_refinement());
        assert!(!scan.is_interleaved());
    }

    #[test]
    fn rejects_dc_scan_with_ac_coefficients() {
        let payload = [1, 1, 0x00, 0, 5, 0x00];
        assert!(matches!(
            ScanDescriptor::parse(&payload, &frame(true)),
            Err(Error::Format("bad spectral selection bounds"))
        ));
    }

    #[test]
    fn rejects_interleaved_ac_scan() {
        let payload = [2, 2, 0x00, 3, 0x00, 1, 5, 0x00];
        assert!(matches!(
            ScanDescriptor::parse(&payload, &frame(true)),
            Err(Error::Format(
                "progressive AC coefficients for more than one component"
            ))
        ));
    }

    #[test]
    fn rejects_repeated_selector() {
        let payload = [2, 2, 0x00, 2, 0x00, 0, 0, 0x00];
        assert!(matches!(
            ScanDescriptor::parse(&payload, &frame(true)),
            Err(Error::Format("repeated component selector"))
        ));
    }

    #[test]
    fn rejects_bad_headers() {
        let progressive = frame(true);
        let baseline = frame(false);

        // Unknown selector.
        assert!(ScanDescriptor::parse(&[1, 9, 0x00, 0, 0, 0], &progressive).is_err());
        // Length does not match the count.
        assert!(ScanDescriptor::parse(&[2, 1, 0x00, 0, 0, 0], &progressive).is_err());
        // Table 2 is not allowed in baseline frames.
        assert!(matches!(
            ScanDescriptor::parse(&[1, 1, 0x20, 0, 63, 0], &baseline),
            Err(Error::Format("bad Td value"))
        ));
        assert!(matches!(
            ScanDescriptor::parse(&[1, 1, 0x02, 0, 63, 0], &baseline),
            Err(Error::Format("bad Ta value"))
        ));
        assert!(ScanDescriptor::parse(&[1, 1, 0x22, 1, 63, 0], &progressive).is_ok());
        // Successive approximation must step by exactly one bit.
        assert!(matches!(
            ScanDescriptor::parse(&[1, 1, 0x00, 1, 63, 0x30], &progressive),
            Err(Error::Format("bad successive approximation values"))
        ));
        // Spectral end past the block.
        assert!(ScanDescriptor::parse(&[1, 1, 0x00, 1, 64, 0], &progressive).is_err());
        assert!(ScanDescriptor::parse(&[1, 1, 0x00, 6, 5, 0], &progressive).is_err());
    }

    #[test]
    fn rejects_oversized_mcu() {
        let mut frame = frame(false);
        frame.components[1].xy_sampling_factor = (4, 2);
        frame.components[2].xy_sampling_factor = (1, 1);
        let payload = [3, 1, 0x00, 2, 0x11, 3, 0x11, 0, 63, 0];
        assert!(matches!(
            ScanDescriptor::parse(&payload, &frame),
            Err(Error::Format("total sampling factors too large"))
        ));
    }

    #[test]
    fn reads_from_stream() {
        let data = [0, 8, 1, 1, 0x00, 0, 0, 0x01, 0xAB];
        let mut reader = JPEGParser::new(&data[..]);
        let scan = ScanDescriptor::read(&mut reader, &frame(true)).unwrap();
        assert_eq!(scan.al, 1);
        assert_eq!(reader.read_next_byte().unwrap(), 0xAB);

        let data = [0, 20, 1, 1, 0x00, 0, 0, 0x01];
        let mut reader = JPEGParser::new(&data[..]);
        assert!(matches!(
            ScanDescriptor::read(&mut reader, &frame(true)),
            Err(Error::Format("SOS has wrong length"))
        ));
    }
}
