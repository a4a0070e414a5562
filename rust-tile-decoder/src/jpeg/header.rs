use std::io::Read;

use tracing::debug;

use crate::{
    error::{Error, Result},
    jpeg::jpeg_reader::*,
};

/// Most components a frame may declare.
pub const MAX_COMPONENTS: usize = 4;
/// Number of quantization and Huffman table slots per class.
pub const MAX_TABLES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanTableType {
    Dc,
    Ac,
}

/// Defines a JPEG huffman table, with the lookup arrays of T.81 F.2.2.3 already built.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    pub symbols: Vec<u8>,
    // Indexed by code length, 1 through 16. A max_code of -1 means no codes of that length.
    pub(crate) min_code: [i32; 17],
    pub(crate) max_code: [i32; 17],
    pub(crate) val_ptr: [usize; 17],
}

impl HuffmanTable {
    pub fn new(bitcode_counts: [u8; 16], symbols: Vec<u8>) -> Result<Self> {
        let total: usize = bitcode_counts.iter().map(|&count| count as usize).sum();
        if total == 0 || total > 256 || total != symbols.len() {
            return Err(Error::Format("bad Huffman table length"));
        }

        let mut min_code = [0i32; 17];
        let mut max_code = [-1i32; 17];
        let mut val_ptr = [0usize; 17];

        let mut code = 0i32;
        let mut k = 0usize;
        for length in 1..=16 {
            let count = bitcode_counts[length - 1] as i32;
            if count > 0 {
                val_ptr[length] = k;
                min_code[length] = code;
                code += count;
                max_code[length] = code - 1;
                k += count as usize;
            }
            if code > 1 << length {
                return Err(Error::Format("bad Huffman table"));
            }
            code <<= 1;
        }

        Ok(Self {
            symbols,
            min_code,
            max_code,
            val_ptr,
        })
    }
}

#[derive(Debug, Clone)]
pub struct QuantizationTable {
    /// Multipliers in zig-zag order.
    pub table: [u16; 64],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    pub identifier: u8,
    pub xy_sampling_factor: (u8, u8),
    pub qtable_id: u8,
}

impl FrameComponent {
    pub fn blocks_per_mcu(&self) -> usize {
        self.xy_sampling_factor.0 as usize * self.xy_sampling_factor.1 as usize
    }
}

#[derive(Debug, Default, Clone)]
pub struct FrameInfo {
    /// Width and height in pixels.
    pub image_size: (u16, u16),
    pub components: Vec<FrameComponent>,
    pub max_xy_sampling_factor: (u8, u8),
    /// SOF0. Limits scans to two Huffman tables of each class.
    pub baseline: bool,
    /// SOF2.
    pub progressive: bool,
}

impl FrameInfo {
    /// Number of MCU columns and rows covering the image.
    pub fn mcu_counts(&self) -> (usize, usize) {
        let mcu_width = 8 * self.max_xy_sampling_factor.0 as usize;
        let mcu_height = 8 * self.max_xy_sampling_factor.1 as usize;
        (
            (self.image_size.0 as usize).div_ceil(mcu_width),
            (self.image_size.1 as usize).div_ceil(mcu_height),
        )
    }

    /// The size of a component's sample plane in pixels, before any padding to whole blocks.
    pub fn component_size(&self, index: usize) -> (usize, usize) {
        let (h, v) = self.components[index].xy_sampling_factor;
        let (h_max, v_max) = self.max_xy_sampling_factor;
        (
            (self.image_size.0 as usize * h as usize).div_ceil(h_max as usize),
            (self.image_size.1 as usize * v as usize).div_ceil(v_max as usize),
        )
    }

    /// Width and height of a component's block grid, padded out to whole MCUs.
    pub fn component_blocks(&self, index: usize) -> (usize, usize) {
        let (mxx, myy) = self.mcu_counts();
        let (h, v) = self.components[index].xy_sampling_factor;
        (mxx * h as usize, myy * v as usize)
    }

    pub fn pixel_count(&self) -> u64 {
        self.image_size.0 as u64 * self.image_size.1 as u64
    }

    /// Reads an SOF segment. The marker decides between baseline, extended and progressive.
    pub fn read_start_of_frame<R: Read>(
        reader: &mut JPEGParser<R>,
        marker: JPEGMarker,
    ) -> Result<Self> {
        let (baseline, progressive) = match marker {
            JPEGMarker::SOF0 => (true, false),
            JPEGMarker::SOF1 => (false, false),
            JPEGMarker::SOF2 => (false, true),
            JPEGMarker::SOF3 | JPEGMarker::SOF7 | JPEGMarker::SOF11 | JPEGMarker::SOF15 => {
                return Err(Error::Unsupported("lossless JPEG"))
            }
            JPEGMarker::SOF5 | JPEGMarker::SOF6 | JPEGMarker::SOF13 | JPEGMarker::SOF14 => {
                return Err(Error::Unsupported("hierarchical JPEG"))
            }
            _ => return Err(Error::Unsupported("arithmetic-coded JPEG")),
        };

        let length = reader.read_segment_length()?;

        let precision = reader.read_next_byte()?;
        if precision != 8 {
            return Err(Error::Unsupported("sample precision other than 8 bits"));
        }

        let height = reader.read_next_word()?;
        let width = reader.read_next_word()?;
        if width == 0 {
            return Err(Error::Format("zero image width"));
        }
        if height == 0 {
            return Err(Error::Unsupported("image height defined by DNL"));
        }

        let component_count = reader.read_next_byte()? as usize;
        match component_count {
            1 | 3 => {}
            4 => return Err(Error::Unsupported("four-component (CMYK) images")),
            _ => return Err(Error::Format("wrong number of components")),
        }
        if length != 6 + 3 * component_count {
            return Err(Error::Format("SOF has wrong length"));
        }

        let mut components: Vec<FrameComponent> = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            let identifier = reader.read_next_byte()?;
            if components.iter().any(|c| c.identifier == identifier) {
                return Err(Error::Format("repeated component identifier"));
            }

            let sample_factors = reader.read_next_byte()?;
            let xy_sampling_factor = (sample_factors >> 4, sample_factors & 0x0F);
            let (h, v) = xy_sampling_factor;
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                return Err(Error::Format("bad sampling factor"));
            }

            let qtable_id = reader.read_next_byte()?;
            if qtable_id as usize >= MAX_TABLES {
                return Err(Error::Format("bad Tq value"));
            }

            components.push(FrameComponent {
                identifier,
                xy_sampling_factor,
                qtable_id,
            })
        }

        if component_count == 1 {
            // A single component is never interleaved, so its MCU is one block whatever the
            // declared factors say.
            components[0].xy_sampling_factor = (1, 1);
        } else {
            check_subsampling(&components)?;
        }

        let frame = Self {
            image_size: (width, height),
            max_xy_sampling_factor: components[0].xy_sampling_factor,
            components,
            baseline,
            progressive,
        };
        debug!(
            width,
            height,
            components = component_count,
            progressive,
            sampling = ?frame.max_xy_sampling_factor,
            "start of frame"
        );
        Ok(frame)
    }
}

/// Accepts only the 4:4:4, 4:4:0, 4:2:2, 4:2:0, 4:1:1 and 4:1:0 layouts, with luma carrying
/// the largest sampling factors and both chroma planes sampled alike.
fn check_subsampling(components: &[FrameComponent]) -> Result<()> {
    let (y_h, y_v) = components[0].xy_sampling_factor;
    let (cb_h, cb_v) = components[1].xy_sampling_factor;
    if components[2].xy_sampling_factor != (cb_h, cb_v) {
        return Err(Error::Unsupported("Cb and Cr sampling factors differ"));
    }
    if y_h % cb_h != 0 || y_v % cb_v != 0 {
        return Err(Error::Unsupported("luma sampling is not a multiple of chroma sampling"));
    }
    match (y_h / cb_h, y_v / cb_v) {
        (1, 1) | (1, 2) | (2, 1) | (2, 2) | (4, 1) | (4, 2) => Ok(()),
        _ => Err(Error::Unsupported("subsampling ratio")),
    }
}

/// Image-wide tables. Slots may be redefined between scans.
#[derive(Debug, Default)]
pub struct Tables {
    pub quant: [Option<QuantizationTable>; MAX_TABLES],
    pub dc: [Option<HuffmanTable>; MAX_TABLES],
    pub ac: [Option<HuffmanTable>; MAX_TABLES],
}

impl Tables {
    pub fn read_quantization_tables<R: Read>(&mut self, reader: &mut JPEGParser<R>) -> Result<()> {
        let struct_size = reader.read_segment_length()?;

        let end_of_table = reader.position() + struct_size as u64;
        while reader.position() < end_of_table {
            let table_info = reader.read_next_byte()?;
            let precision = table_info >> 4;
            let destination_id = (table_info & 0x0F) as usize;
            if destination_id >= MAX_TABLES {
                return Err(Error::Format("bad Tq value"));
            }

            let mut table = [0u16; 64];
            for value in table.iter_mut() {
                *value = match precision {
                    0 => reader.read_next_byte()? as u16,
                    1 => reader.read_next_word()?,
                    _ => return Err(Error::Format("bad Pq value")),
                }
            }

            self.quant[destination_id] = Some(QuantizationTable { table });
        }

        if reader.position() != end_of_table {
            return Err(Error::Format("DQT has wrong length"));
        }
        Ok(())
    }

    pub fn read_huffman_tables<R: Read>(&mut self, reader: &mut JPEGParser<R>) -> Result<()> {
        let struct_size = reader.read_segment_length()?;

        let end_of_table = reader.position() + struct_size as u64;
        while reader.position() < end_of_table {
            let table_info = reader.read_next_byte()?;
            let table_type = match table_info >> 4 {
                0 => HuffmanTableType::Dc,
                1 => HuffmanTableType::Ac,
                _ => return Err(Error::Format("bad Tc value")),
            };

            let destination_id = (table_info & 0x0F) as usize;
            if destination_id >= MAX_TABLES {
                return Err(Error::Format("bad Th value"));
            }

            let mut bitcode_counts = [0u8; 16];
            reader.read_full(&mut bitcode_counts)?;

            let size: usize = bitcode_counts.iter().map(|&count| count as usize).sum();
            if size == 0 || size > 256 {
                return Err(Error::Format("bad Huffman table length"));
            }

            let mut symbols = vec![0u8; size];
            reader.read_full(&mut symbols)?;

            let table = HuffmanTable::new(bitcode_counts, symbols)?;
            match table_type {
                HuffmanTableType::Dc => self.dc[destination_id] = Some(table),
                HuffmanTableType::Ac => self.ac[destination_id] = Some(table),
            }
        }

        if reader.position() != end_of_table {
            return Err(Error::Format("DHT has wrong length"));
        }
        Ok(())
    }
}

pub fn read_restart_interval<R: Read>(reader: &mut JPEGParser<R>) -> Result<u16> {
    if reader.read_segment_length()? != 2 {
        return Err(Error::Format("DRI has wrong length"));
    }
    reader.read_next_word()
}
