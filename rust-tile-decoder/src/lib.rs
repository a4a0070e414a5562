#![warn(missing_docs)]

//! Streaming JPEG decoder for small memory budgets. Emits the image as RGB565 tiles, one MCU
//! at a time, instead of building a full frame.
mod bitstream;
mod error;
/// Defines types for decoding images and receiving their tiles
pub mod image;
/// Decoder for JPEG images
pub mod jpeg;
/// Encoder for PPM images
pub mod ppm;

pub use error::{Error, Result};
