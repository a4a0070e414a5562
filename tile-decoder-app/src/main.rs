use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Parser;
use rust_tile_decoder::{
    image::{Bitmap, ImageEncoder, Tile},
    jpeg::{DecoderOptions, JPEGDecoder},
    ppm::PPMEncoder,
    Error,
};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[derive(Parser)]
struct Opt {
    /// Input JPEG file
    input: PathBuf,

    /// Output image file, written as binary PPM
    #[clap(required_unless_present = "tiles")]
    output: Option<PathBuf>,

    /// Log decoder progress down to the debug level
    #[clap(short, long)]
    verbose: bool,

    /// Reject images with more pixels than this
    #[clap(long, default_value_t = DecoderOptions::default().max_pixels)]
    max_pixels: u64,

    /// Log every tile as it is emitted instead of writing an image
    #[clap(long)]
    tiles: bool,
}

fn main() -> Result<(), Error> {
    let opt = Opt::parse();

    let filter = if opt.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let file = File::open(&opt.input)?;
    let options = DecoderOptions {
        max_pixels: opt.max_pixels,
    };
    let mut decoder = JPEGDecoder::with_options(BufReader::new(file), options);

    if opt.tiles {
        let mut count = 0usize;
        let mut sink = |tile: &Tile<'_>| -> Result<(), Error> {
            info!(x = tile.x, y = tile.y, width = tile.width, height = tile.height, "tile");
            count += 1;
            Ok(())
        };
        let image = decoder.decode_tiles(&mut sink)?;
        info!(?image, tiles = count, "decoded");
        return Ok(());
    }

    let mut bitmap = Bitmap::default();
    let image = decoder.decode_tiles(&mut bitmap)?;
    info!(?image, "decoded");

    if let Some(output) = opt.output {
        PPMEncoder::new(&bitmap).encode_to_file(&output)?;
        info!(path = %output.display(), "wrote PPM");
    }
    Ok(())
}
