//! `ImageSink` and `FrameSink` adapters — the external collaborators the
//! core quantiser treats as opaque (decoding, encoding, and the encoder
//! subprocess are all outside the algorithmic core; [`crate::ImageSource`]
//! itself lives at the crate root since the histogram and remapper depend
//! on it with no need for the `image` crate). This module supplies one
//! concrete adapter for each, built on the `image` crate and a piped
//! `ffmpeg` subprocess, so the CLI binary has something to drive.

use std::io::Write;
use std::process::{Child, Command, Stdio};

use crate::color::Rgba8;
use crate::compositor::Frame;
use crate::error::QuantizeError;
use crate::pnn::Palette;
use crate::remap::PalettedImage;
use crate::ImageSource;

/// Destination for a quantised, optionally-dithered image.
pub trait ImageSink {
    /// # Errors
    /// Returns [`QuantizeError::SinkFailure`] if the write fails.
    fn write_image(&mut self, image: &PalettedImage, palette: &Palette) -> Result<(), QuantizeError>;
}

/// Destination for composited visualisation frames (one per `k`).
pub trait FrameSink {
    /// # Errors
    /// Returns [`QuantizeError::SinkFailure`] if the write fails.
    fn write_frame(&mut self, frame: &Frame) -> Result<(), QuantizeError>;

    /// Signal end-of-stream and wait for any underlying process to finish.
    ///
    /// # Errors
    /// Returns [`QuantizeError::SinkFailure`] if the sink reports a
    /// diagnostic on shutdown.
    fn finish(&mut self) -> Result<(), QuantizeError>;
}

/// An [`ImageSource`] backed by an in-memory `image::RgbaImage`.
pub struct DynImageSource {
    inner: image::RgbaImage,
}

impl DynImageSource {
    /// Wrap an already-decoded `image::RgbaImage`.
    #[must_use]
    pub fn new(inner: image::RgbaImage) -> Self {
        Self { inner }
    }
}

impl ImageSource for DynImageSource {
    #[inline]
    fn width(&self) -> u32 {
        self.inner.width()
    }

    #[inline]
    fn height(&self) -> u32 {
        self.inner.height()
    }

    #[inline]
    fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        let p = self.inner.get_pixel(x, y);
        Rgba8::new(p[0], p[1], p[2], p[3])
    }
}

/// Expand a [`PalettedImage`] through its palette into a flat RGBA buffer
/// suitable for `image::RgbaImage`/PNG encoding.
#[must_use]
pub fn expand_to_rgba(image: &PalettedImage, palette: &Palette) -> image::RgbaImage {
    let mut buf = image::RgbaImage::new(image.width, image.height);
    for y in 0..image.height {
        for x in 0..image.width {
            let c = palette.as_slice()[image.index_at(x, y) as usize];
            buf.put_pixel(x, y, image::Rgba([c.r, c.g, c.b, c.a]));
        }
    }
    buf
}

/// Writes a [`Frame`] into an `image::RgbaImage` buffer, for reuse by any
/// encoder that wants one.
#[must_use]
pub fn frame_to_rgba_image(frame: &Frame) -> image::RgbaImage {
    let mut buf = image::RgbaImage::new(frame.width, frame.height);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let c = frame.pixels[(y * frame.width + x) as usize];
            buf.put_pixel(x, y, image::Rgba([c.r, c.g, c.b, c.a]));
        }
    }
    buf
}

/// Writes a paletted image to disk as a PNG, expanding indices through the
/// palette (true indexed PNG output would need a palette-aware encoder
/// feature the `image` crate's default PNG path doesn't expose, so this
/// mirrors the teacher's own save path of writing plain RGB/RGBA buffers).
pub struct PngImageSink {
    path: std::path::PathBuf,
}

impl PngImageSink {
    /// Write to `path` on [`ImageSink::write_image`].
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageSink for PngImageSink {
    fn write_image(&mut self, image: &PalettedImage, palette: &Palette) -> Result<(), QuantizeError> {
        let buf = expand_to_rgba(image, palette);
        buf.save(&self.path)
            .map_err(|e| QuantizeError::SinkFailure(format!("writing {}: {e}", self.path.display())))
    }
}

/// Pipes composited PNG frames into an `ffmpeg` subprocess, closing stdin on
/// `finish()` to signal end-of-stream and surfacing captured stderr as a
/// [`QuantizeError::SinkFailure`] if the process exits non-zero.
///
/// Grounded directly in `original_source/quantise/cmd/main.go`'s
/// `exec.Command("ffmpeg", ...)` pipeline.
pub struct FfmpegFrameSink {
    child: Child,
}

impl FfmpegFrameSink {
    /// Spawn `ffmpeg`, writing PNG frames at `framerate` fps into `output_path`.
    ///
    /// # Errors
    /// Returns [`QuantizeError::SinkFailure`] if `ffmpeg` cannot be spawned.
    pub fn spawn(output_path: &std::path::Path, framerate: u32) -> Result<Self, QuantizeError> {
        let child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "image2pipe",
                "-c:v",
                "png",
                "-r",
            ])
            .arg(framerate.to_string())
            .args(["-i", "-", "-y", "-an", "-pix_fmt", "yuv420p"])
            .arg(output_path)
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| QuantizeError::SinkFailure(format!("spawning ffmpeg: {e}")))?;

        Ok(Self { child })
    }
}

impl FrameSink for FfmpegFrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), QuantizeError> {
        let buf = frame_to_rgba_image(frame);
        let mut png_bytes = Vec::new();
        buf.write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| QuantizeError::SinkFailure(format!("encoding frame: {e}")))?;

        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| QuantizeError::SinkFailure("ffmpeg stdin unavailable".into()))?;
        stdin
            .write_all(&png_bytes)
            .map_err(|e| QuantizeError::SinkFailure(format!("writing frame to ffmpeg: {e}")))?;

        #[cfg(feature = "log")]
        log::debug!("wrote frame {}x{} to ffmpeg", frame.width, frame.height);

        Ok(())
    }

    fn finish(&mut self) -> Result<(), QuantizeError> {
        // Dropping the stdin handle closes the pipe, telling ffmpeg to stop.
        drop(self.child.stdin.take());

        let output = self
            .child
            .wait_with_output_compat()
            .map_err(|e| QuantizeError::SinkFailure(format!("waiting for ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(QuantizeError::SinkFailure(format!("ffmpeg: {stderr}")));
        }

        Ok(())
    }
}

/// `Child::wait_with_output` consumes `self`, which doesn't fit `finish`'s
/// `&mut self` signature (the sink may be polled for frame writes right up
/// until shutdown). This reads stderr and waits without requiring ownership.
trait WaitWithOutputCompat {
    fn wait_with_output_compat(&mut self) -> std::io::Result<std::process::Output>;
}

impl WaitWithOutputCompat for Child {
    fn wait_with_output_compat(&mut self) -> std::io::Result<std::process::Output> {
        let mut stderr = Vec::new();
        if let Some(mut pipe) = self.stderr.take() {
            let _ = std::io::Read::read_to_end(&mut pipe, &mut stderr)?;
        }
        let status = self.wait()?;
        Ok(std::process::Output {
            status,
            stdout: Vec::new(),
            stderr,
        })
    }
}
