use std::io::Write;

use crate::{
    error::{Error, Result},
    image::{Bitmap, ImageEncoder},
};

/// Binary (P6) PPM encoder
pub struct PPMEncoder<'bitmap> {
    bitmap: &'bitmap Bitmap,
}

impl<'bitmap> ImageEncoder<'bitmap> for PPMEncoder<'bitmap> {
    fn new(bitmap: &'bitmap Bitmap) -> Self {
        Self { bitmap }
    }

    fn encode<W: Write>(&self, mut writer: W) -> Result<()> {
        if self.bitmap.channels < 3 {
            return Err(Error::Unsupported("PPM output needs an RGB bitmap"));
        }
        write!(writer, "P6\n{} {}\n255\n", self.bitmap.size.0, self.bitmap.size.1)?;

        let channels = self.bitmap.channels as usize;
        for pixel in self.bitmap.data.chunks_exact(channels) {
            writer.write_all(&pixel[..3])?;
        }
        writer.flush()?;
        Ok(())
    }
}
