pub(crate) mod coefficients;
pub(crate) mod color;
pub(crate) mod header;
pub(crate) mod idct;
pub(crate) mod jpeg_reader;
pub(crate) mod restart;
pub(crate) mod scan_header;
pub(crate) mod store;
pub(crate) mod tile;
pub(crate) mod traversal;

use std::io::Read;

use tracing::{debug, warn};

use crate::{
    bitstream::Bitstream,
    error::{Error, Result},
    image::{Bitmap, ImageDecoder, TileSink},
};
use coefficients::{Block, CoefficientDecoder};
use header::{FrameInfo, Tables};
use idct::BlockReconstructor;
use jpeg_reader::{JPEGMarker, JPEGParser};
use restart::RestartState;
use scan_header::ScanDescriptor;
use store::CoefficientStore;
use tile::TileAssembler;
use traversal::BlockTraversal;

/// Limits applied while decoding.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Images with more pixels than this are rejected when their frame header is read.
    pub max_pixels: u64,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_pixels: 64 * 1024 * 1024,
        }
    }
}

/// What a finished decode found out about the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// 1 for grayscale, 3 for YCbCr
    pub components: u8,
    /// Whether the frame was progressive
    pub progressive: bool,
}

/// Streaming JPEG decoder.
///
/// Reads baseline, extended sequential and progressive Huffman-coded JPEGs from any
/// [`Read`] and emits the image as MCU-sized RGB565 tiles. Sequential images whose scan
/// interleaves every component are emitted while they are read, so only one MCU of pixels is
/// ever held in memory. Progressive images, and sequential images split over several scans,
/// keep their coefficients until the end of the image and are emitted from a final pass.
pub struct JPEGDecoder<R> {
    parser: JPEGParser<R>,
    options: DecoderOptions,
    tables: Tables,
    restart_interval: u16,
    frame: Option<FrameInfo>,
    store: CoefficientStore,
    coefficients: CoefficientDecoder,
    reconstructor: BlockReconstructor,
    assembler: TileAssembler,
    samples: [u8; 64],
}

impl<R: Read> JPEGDecoder<R> {
    /// Creates a decoder reading from `source`, with default options
    pub fn new(source: R) -> Self {
        Self::with_options(source, DecoderOptions::default())
    }

    /// Creates a decoder reading from `source`
    pub fn with_options(source: R, options: DecoderOptions) -> Self {
        Self {
            parser: JPEGParser::new(source),
            options,
            tables: Tables::default(),
            restart_interval: 0,
            frame: None,
            store: CoefficientStore::new(),
            coefficients: CoefficientDecoder::new(),
            reconstructor: BlockReconstructor::new(),
            assembler: TileAssembler::default(),
            samples: [0; 64],
        }
    }

    /// Forgets everything learned about the current image: tables, frame header, restart
    /// interval and stored coefficients. Called at the start of every [`decode_tiles`]; after an
    /// error the decoder can be reused for an image that starts where the byte source now is.
    ///
    /// [`decode_tiles`]: Self::decode_tiles
    pub fn reset(&mut self) {
        self.tables = Tables::default();
        self.restart_interval = 0;
        self.frame = None;
        self.store.clear();
        self.coefficients.reset();
    }

    /// Returns the byte source. Anything after the EOI marker has not been read.
    pub fn into_inner(self) -> R {
        self.parser.into_inner()
    }

    /// Decodes one image, from SOI to EOI, passing every tile to `sink` in raster order.
    pub fn decode_tiles<S: TileSink + ?Sized>(&mut self, sink: &mut S) -> Result<ImageInfo> {
        self.reset();

        let soi = self.parser.read_next_word()?;
        if soi != JPEGMarker::SOI as u16 {
            return Err(Error::Format("missing SOI marker"));
        }

        loop {
            let marker = self.parser.read_next_marker()?;
            match marker {
                JPEGMarker::DQT => self.tables.read_quantization_tables(&mut self.parser)?,
                JPEGMarker::DHT => self.tables.read_huffman_tables(&mut self.parser)?,
                JPEGMarker::DRI => {
                    self.restart_interval = header::read_restart_interval(&mut self.parser)?;
                    debug!(interval = self.restart_interval, "restart interval");
                }
                JPEGMarker::SOF0
                | JPEGMarker::SOF1
                | JPEGMarker::SOF2
                | JPEGMarker::SOF3
                | JPEGMarker::SOF5
                | JPEGMarker::SOF6
                | JPEGMarker::SOF7
                | JPEGMarker::SOF9
                | JPEGMarker::SOF10
                | JPEGMarker::SOF11
                | JPEGMarker::SOF13
                | JPEGMarker::SOF14
                | JPEGMarker::SOF15 => self.read_frame(marker)?,
                JPEGMarker::SOS => {
                    let frame = self.frame.take().ok_or(Error::Format("missing SOF marker"))?;
                    let result = match ScanDescriptor::read(&mut self.parser, &frame) {
                        Ok(scan) => self.decode_scan(&frame, &scan, sink),
                        Err(err) => Err(err),
                    };
                    self.frame = Some(frame);
                    result?;
                }
                JPEGMarker::EOI => break,
                JPEGMarker::SOI => return Err(Error::Format("unexpected SOI marker")),
                JPEGMarker::DNL => return Err(Error::Unsupported("DNL marker")),
                JPEGMarker::DHP | JPEGMarker::EXP => {
                    return Err(Error::Unsupported("hierarchical JPEG"))
                }
                // Restart markers outside of entropy-coded data carry nothing.
                marker if marker.is_restart() => warn!(?marker, "stray restart marker"),
                JPEGMarker::TEM => {}
                _ => self.parser.skip_marker_with_length()?,
            }
        }

        let frame = self.frame.take().ok_or(Error::Format("missing SOF marker"))?;
        if !self.store.is_empty() {
            self.emit_stored(&frame, sink)?;
        }
        self.store.clear();

        Ok(ImageInfo {
            width: frame.image_size.0,
            height: frame.image_size.1,
            components: frame.components.len() as u8,
            progressive: frame.progressive,
        })
    }

    fn read_frame(&mut self, marker: JPEGMarker) -> Result<()> {
        if self.frame.is_some() {
            return Err(Error::Format("multiple SOF markers"));
        }
        let frame = FrameInfo::read_start_of_frame(&mut self.parser, marker)?;
        if frame.pixel_count() > self.options.max_pixels {
            return Err(Error::Unsupported("image too large"));
        }
        self.assembler.configure(&frame);
        self.frame = Some(frame);
        Ok(())
    }

    /// Decodes the entropy-coded segment that follows an SOS header.
    fn decode_scan<S: TileSink + ?Sized>(
        &mut self,
        frame: &FrameInfo,
        scan: &ScanDescriptor,
        sink: &mut S,
    ) -> Result<()> {
        // A sequential scan carrying every component is the whole image, so it can go straight
        // to the sink.
        let streaming = !frame.progressive
            && scan.components.len() == frame.components.len()
            && self.store.is_empty();

        let needs_dc = scan.zig_start == 0 && !scan.is_refinement();
        for scan_component in &scan.components {
            if needs_dc && self.tables.dc[scan_component.dc_table as usize].is_none() {
                return Err(Error::Format("missing Huffman table"));
            }
            if scan.zig_end > 0 && self.tables.ac[scan_component.ac_table as usize].is_none() {
                return Err(Error::Format("missing Huffman table"));
            }
        }
        if streaming {
            self.check_quantization_tables(frame)?;
        }

        let Self {
            parser,
            tables,
            restart_interval,
            store,
            coefficients,
            reconstructor,
            assembler,
            samples,
            ..
        } = self;

        let traversal = BlockTraversal::new(frame, scan);
        let mcu_total = traversal.mcu_count();
        let mut restart = RestartState::new(*restart_interval);
        let mut bitstream = Bitstream::new(parser);
        coefficients.reset();

        let mut mcus_done = 0;
        for visit in traversal {
            let scan_component = scan.components[visit.scan_index];
            let dc_table = tables.dc[scan_component.dc_table as usize].as_ref();
            let ac_table = tables.ac[scan_component.ac_table as usize].as_ref();

            if streaming {
                let mut block: Block = [0; 64];
                coefficients.decode_block(
                    &mut bitstream,
                    &mut block,
                    visit.component_index,
                    dc_table,
                    ac_table,
                    scan,
                )?;
                let component = &frame.components[visit.component_index];
                let quantization = tables.quant[component.qtable_id as usize]
                    .as_ref()
                    .ok_or(Error::Format("missing quantization table"))?;
                reconstructor.reconstruct(&block, quantization, samples);
                assembler.place_block(frame, visit.component_index, visit.bx, visit.by, samples);

                if visit.ends_mcu {
                    let (h, v) = component.xy_sampling_factor;
                    assembler.emit(sink, frame, visit.bx / h as usize, visit.by / v as usize)?;
                }
            } else {
                let (blocks_wide, blocks_high) = frame.component_blocks(visit.component_index);
                let block = store
                    .ensure(visit.component_index, blocks_wide, blocks_high)?
                    .block_mut(visit.bx, visit.by);
                coefficients.decode_block(
                    &mut bitstream,
                    block,
                    visit.component_index,
                    dc_table,
                    ac_table,
                    scan,
                )?;
            }

            if visit.ends_mcu {
                mcus_done += 1;
                if restart.is_due(mcus_done, mcu_total) {
                    restart.resync(&mut bitstream, coefficients)?;
                }
            }
        }
        if coefficients.eob_run() > 0 {
            warn!(
                blocks = coefficients.eob_run(),
                "end-of-band run continues past the end of the scan"
            );
        }
        Ok(())
    }

    fn check_quantization_tables(&self, frame: &FrameInfo) -> Result<()> {
        if frame
            .components
            .iter()
            .any(|component| self.tables.quant[component.qtable_id as usize].is_none())
        {
            return Err(Error::Format("missing quantization table"));
        }
        Ok(())
    }

    /// Reconstructs every MCU from the coefficient store and emits it. Components no scan
    /// touched come out as mid-grey.
    fn emit_stored<S: TileSink + ?Sized>(&mut self, frame: &FrameInfo, sink: &mut S) -> Result<()> {
        self.check_quantization_tables(frame)?;
        let zero: Block = [0; 64];
        let (mxx, myy) = frame.mcu_counts();
        debug!(mcus = mxx * myy, "reconstructing stored coefficients");

        for my in 0..myy {
            for mx in 0..mxx {
                for (index, component) in frame.components.iter().enumerate() {
                    let quantization = self.tables.quant[component.qtable_id as usize]
                        .as_ref()
                        .ok_or(Error::Format("missing quantization table"))?;
                    let (h, v) = component.xy_sampling_factor;
                    let (h, v) = (h as usize, v as usize);
                    for j in 0..h * v {
                        let (bx, by) = (mx * h + j % h, my * v + j / h);
                        let block = self.store.get(index).map_or(&zero, |c| c.block(bx, by));
                        self.reconstructor.reconstruct(block, quantization, &mut self.samples);
                        self.assembler.place_block(frame, index, bx, by, &self.samples);
                    }
                }
                self.assembler.emit(sink, frame, mx, my)?;
            }
        }
        Ok(())
    }
}

impl<R: Read> ImageDecoder for JPEGDecoder<R> {
    fn decode(&mut self) -> Result<Bitmap> {
        let mut bitmap = Bitmap::default();
        self.decode_tiles(&mut bitmap)?;
        Ok(bitmap)
    }
}
