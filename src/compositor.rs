//! Compose a paletted image and its palette swatch strip into one frame for
//! the animated per-k visualisation.

use crate::color::Rgba8;
use crate::pnn::Palette;
use crate::remap::PalettedImage;

/// An RGBA frame of pixels in row-major order, ready to hand to a
/// [`crate::io::FrameSink`].
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels. Always even (see [`compose_frame`]).
    pub width: u32,
    /// Frame height in pixels. Always even (see [`compose_frame`]).
    pub height: u32,
    /// Row-major RGBA pixels, `width * height` long.
    pub pixels: Vec<Rgba8>,
}

impl Frame {
    fn filled(width: u32, height: u32, colour: Rgba8) -> Self {
        Self {
            width,
            height,
            pixels: vec![colour; (width as usize) * (height as usize)],
        }
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32, colour: Rgba8) {
        if x < self.width && y < self.height {
            let i = (y * self.width + x) as usize;
            self.pixels[i] = colour;
        }
    }
}

const BLACK: Rgba8 = Rgba8 { r: 0, g: 0, b: 0, a: 255 };

fn round_up_even(n: u32) -> u32 {
    if n % 2 != 0 {
        n + 1
    } else {
        n
    }
}

/// Build the palette swatch strip: `k` solid-colour rectangles each
/// `image_width / k` pixels wide (integer division), `height` tall. Any
/// trailing pixels left over from the division stay black.
fn build_swatch_strip(palette: &Palette, image_width: u32, height: u32) -> Frame {
    let k = palette.len() as u32;
    let swatch_width = if k == 0 { 0 } else { image_width / k };
    let mut strip = Frame::filled(image_width, height, BLACK);

    for (i, colour) in palette.as_slice().iter().enumerate() {
        let x0 = i as u32 * swatch_width;
        let x1 = x0 + swatch_width;
        for y in 0..height {
            for x in x0..x1 {
                strip.set(x, y, *colour);
            }
        }
    }

    strip
}

/// Compose the quantised image `top` over a centred palette swatch strip of
/// height `swatch_height` into one even-dimensioned, black-filled frame.
#[must_use]
pub fn compose_frame(
    top: &PalettedImage,
    palette: &Palette,
    swatch_height: u32,
) -> Frame {
    let strip = build_swatch_strip(palette, top.width, swatch_height);

    let raw_width = top.width;
    let raw_height = top.height + strip.height;
    let width = round_up_even(raw_width);
    let height = round_up_even(raw_height);

    let mut frame = Frame::filled(width, height, BLACK);

    for y in 0..top.height {
        for x in 0..top.width {
            let colour = palette.as_slice()[top.index_at(x, y) as usize];
            frame.set(x, y, colour);
        }
    }

    let x_offset = (width - strip.width) / 2;
    for y in 0..strip.height {
        for x in 0..strip.width {
            let colour = strip.pixels[(y * strip.width + x) as usize];
            frame.set(x_offset + x, top.height + y, colour);
        }
    }

    frame
}
