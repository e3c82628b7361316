//! Pairwise Nearest Neighbour (PNN) colour quantisation.
//!
//! Reduces an image to a palette of `k` representative colours by
//! agglomerative clustering: every distinct colour starts as its own
//! cluster, and the cheapest pair (by increase in squared error) is merged
//! repeatedly until `k` clusters remain. Unlike median-cut or k-means, PNN
//! is deterministic and makes no random choices.
//!
//! ## Usage
//!
//! ```
//! use pnnquant::{quantize, remap, Dither, ImageSource, Rgba8};
//!
//! struct Pixels(Vec<Rgba8>);
//!
//! impl ImageSource for Pixels {
//!     fn width(&self) -> u32 { self.0.len() as u32 }
//!     fn height(&self) -> u32 { 1 }
//!     fn pixel(&self, x: u32, _y: u32) -> Rgba8 { self.0[x as usize] }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Pixels(vec![
//!     Rgba8::new(0, 0, 0, 255),
//!     Rgba8::new(255, 255, 255, 255),
//! ]);
//! let palette = quantize(&source, 2)?;
//! let paletted = remap(&source, &palette, Dither::FloydSteinberg);
//! assert_eq!(paletted.width, 2);
//! # Ok(())
//! # }
//! ```
#![forbid(
    absolute_paths_not_starting_with_crate,
    missing_docs,
    non_ascii_idents,
    noop_method_call,
    unsafe_code,
    unused_results
)]
#![warn(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod cluster;
pub mod color;
pub mod compositor;
pub mod error;
pub mod heap;
#[cfg(feature = "image")]
pub mod io;
pub mod pnn;
pub mod remap;

pub use color::{colour_key, Rgba8};
pub use compositor::{compose_frame, Frame};
pub use error::QuantizeError;
#[cfg(feature = "image")]
pub use io::{DynImageSource, FfmpegFrameSink, FrameSink, ImageSink, PngImageSink};
pub use pnn::{quantize, Palette};
pub use remap::{remap, Dither, PalettedImage};

/// Row-major, 8-bit RGBA pixel source. The histogram and remapper only ever
/// read through this trait; they have no notion of any particular image
/// codec, which keeps the core buildable without the `image` crate.
pub trait ImageSource {
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// The pixel at `(x, y)`. Callers never pass coordinates outside
    /// `0..width` / `0..height`.
    fn pixel(&self, x: u32, y: u32) -> Rgba8;
}
