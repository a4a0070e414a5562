use std::{fs::File, io::Write, path::Path};

use crate::{error::Result, jpeg::color::unpack_rgb565};

/// A rectangle of decoded pixels, handed to a [`TileSink`] as soon as it is complete.
///
/// Tiles cover whole MCUs, so the last row and column of tiles may reach past the image. The
/// sink is responsible for clipping them against `image_width` and `image_height`.
#[derive(Debug, Clone, Copy)]
pub struct Tile<'a> {
    /// Packed RGB565 pixels, row-major, `width * height` of them.
    pub pixels: &'a [u16],
    /// Top-left corner of the tile in the image.
    pub x: u16,
    /// Top-left corner of the tile in the image.
    pub y: u16,
    /// Tile width in pixels.
    pub width: u16,
    /// Tile height in pixels.
    pub height: u16,
    /// Width of the whole image.
    pub image_width: u16,
    /// Height of the whole image.
    pub image_height: u16,
}

impl Tile<'_> {
    /// The pixel at `(column, row)` of the tile.
    pub fn pixel(&self, column: u16, row: u16) -> u16 {
        self.pixels[row as usize * self.width as usize + column as usize]
    }
}

/// Receives decoded tiles, in raster order of their top-left corners.
///
/// An error returned from the sink stops decoding and is passed back to the caller unchanged.
pub trait TileSink {
    /// Called once per completed tile.
    fn emit_tile(&mut self, tile: &Tile<'_>) -> Result<()>;
}

impl<F> TileSink for F
where
    F: FnMut(&Tile<'_>) -> Result<()>,
{
    fn emit_tile(&mut self, tile: &Tile<'_>) -> Result<()> {
        self(tile)
    }
}

/// Stores a single frame of image data in a simple bitmap form
#[derive(Debug, Default)]
pub struct Bitmap {
    /// The number of color channels in the image. Ex. RGBA = 4
    pub channels: u8,

    /// The size of the image
    pub size: (u16, u16),
    /// The raw bitmap data
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Creates a black RGB bitmap.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            channels: 3,
            size: (width, height),
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    /// The RGB value at `(x, y)`.
    pub fn rgb(&self, x: u16, y: u16) -> (u8, u8, u8) {
        let index = (y as usize * self.size.0 as usize + x as usize) * self.channels as usize;
        (self.data[index], self.data[index + 1], self.data[index + 2])
    }
}

/// Collects tiles into a full RGB888 bitmap, sized by the first tile it receives.
impl TileSink for Bitmap {
    fn emit_tile(&mut self, tile: &Tile<'_>) -> Result<()> {
        if self.data.is_empty() || self.size != (tile.image_width, tile.image_height) {
            *self = Bitmap::new(tile.image_width, tile.image_height);
        }

        let columns = tile.width.min(tile.image_width.saturating_sub(tile.x));
        let rows = tile.height.min(tile.image_height.saturating_sub(tile.y));
        for row in 0..rows {
            for column in 0..columns {
                let (r, g, b) = unpack_rgb565(tile.pixel(column, row));
                let (x, y) = ((tile.x + column) as usize, (tile.y + row) as usize);
                let index = (y * self.size.0 as usize + x) * 3;
                self.data[index..index + 3].copy_from_slice(&[r, g, b]);
            }
        }
        Ok(())
    }
}

/// Used to decode an image. This trait can be implemented for any image format I want to decode.
pub trait ImageDecoder {
    /// Decodes the whole image into a bitmap
    fn decode(&mut self) -> Result<Bitmap>;
}

/// Used to encode an image. This trait can be implemented for any image format I want to encode.
pub trait ImageEncoder<'bitmap> {
    /// Supplies the encoder with a raw bitmap to encode.
    fn new(bitmap: &'bitmap Bitmap) -> Self;
    /// Encodes the bitmap into `writer`.
    fn encode<W: Write>(&self, writer: W) -> Result<()>;

    /// Encodes the bitmap and saves the result to a file at the given path.
    fn encode_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.encode(std::io::BufWriter::new(File::create(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn bitmap_clips_tiles_to_the_image() {
        let pixels = [0xF800u16; 16 * 16];
        let mut bitmap = Bitmap::default();
        let tile = Tile {
            pixels: &pixels,
            x: 16,
            y: 0,
            width: 16,
            height: 16,
            image_width: 20,
            image_height: 10,
        };
        bitmap.emit_tile(&tile).unwrap();

        assert_eq!(bitmap.size, (20, 10));
        assert_eq!(bitmap.data.len(), 20 * 10 * 3);
        assert_eq!(bitmap.rgb(15, 0), (0, 0, 0));
        assert_eq!(bitmap.rgb(16, 0), (255, 0, 0));
        assert_eq!(bitmap.rgb(19, 9), (255, 0, 0));
    }

    #[test]
    fn closures_are_sinks() {
        let pixels = [0u16; 64];
        let mut seen = Vec::new();
        let mut sink = |tile: &Tile<'_>| -> Result<()> {
            seen.push((tile.x, tile.y));
            Ok(())
        };
        for x in [0, 8] {
            let tile = Tile {
                pixels: &pixels,
                x,
                y: 0,
                width: 8,
                height: 8,
                image_width: 16,
                image_height: 8,
            };
            sink.emit_tile(&tile).unwrap();
        }
        assert_eq!(seen, [(0, 0), (8, 0)]);
    }
}
