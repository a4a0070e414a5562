use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Describes an error encountered while decoding an image.
///
/// Every variant is fatal to the image being decoded. The decoder itself stays usable once
/// [`reset`](crate::jpeg::JPEGDecoder::reset) has been called.
#[derive(Error, Debug)]
pub enum Error {
    /// The image violates the structural rules of the format. The string describes how.
    #[error("invalid JPEG format: {0}")]
    Format(&'static str),
    /// The image is valid but uses a feature this decoder does not implement.
    #[error("unsupported JPEG feature: {0}")]
    Unsupported(&'static str),
    /// The byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
