//! Map source pixels onto a quantised palette, with or without
//! Floyd–Steinberg error diffusion.

use crate::color::Rgba8;
use crate::pnn::Palette;
use crate::ImageSource;

/// Dithering strategy applied while remapping pixels onto a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dither {
    /// Assign each pixel its nearest palette entry, with no error diffusion.
    #[default]
    None,
    /// Diffuse quantisation error to neighbouring pixels with the standard
    /// 7/16, 3/16, 5/16, 1/16 kernel.
    FloydSteinberg,
}

/// Source image remapped onto a palette: same dimensions, one palette index
/// per pixel.
#[derive(Debug, Clone)]
pub struct PalettedImage {
    /// Width in pixels, matching the source image.
    pub width: u32,
    /// Height in pixels, matching the source image.
    pub height: u32,
    /// Row-major palette indices, `width * height` long.
    pub indices: Vec<u8>,
}

impl PalettedImage {
    /// The palette index assigned to the pixel at `(x, y)`.
    #[inline]
    #[must_use]
    pub fn index_at(&self, x: u32, y: u32) -> u8 {
        self.indices[(y * self.width + x) as usize]
    }
}

/// Index of the palette entry closest to `pixel` in squared Euclidean RGBA
/// distance, ties broken toward the lowest index.
fn nearest_index(palette: &Palette, pixel: Rgba8) -> u8 {
    let mut best_index = 0u8;
    let mut best_dist = u32::MAX;
    for (i, entry) in palette.as_slice().iter().enumerate() {
        let dist = sqr_dist(*entry, pixel);
        if dist < best_dist {
            best_dist = dist;
            best_index = i as u8;
        }
    }
    best_index
}

#[inline]
fn sqr_dist(a: Rgba8, b: Rgba8) -> u32 {
    let dr = i32::from(a.r) - i32::from(b.r);
    let dg = i32::from(a.g) - i32::from(b.g);
    let db = i32::from(a.b) - i32::from(b.b);
    let da = i32::from(a.a) - i32::from(b.a);
    (dr * dr + dg * dg + db * db + da * da) as u32
}

/// Remap `source` onto `palette`, without dithering: every pixel gets the
/// index of its nearest palette entry.
pub fn remap_none<S: ImageSource>(source: &S, palette: &Palette) -> PalettedImage {
    let width = source.width();
    let height = source.height();
    let mut indices = Vec::with_capacity((width as usize) * (height as usize));
    for y in 0..height {
        for x in 0..width {
            indices.push(nearest_index(palette, source.pixel(x, y)));
        }
    }
    PalettedImage {
        width,
        height,
        indices,
    }
}

/// Remap `source` onto `palette` with Floyd–Steinberg error diffusion: a
/// forward scan distributing each pixel's quantisation error 7/16, 3/16,
/// 5/16, 1/16 to its right, down-left, down, and down-right neighbours.
pub fn remap_floyd_steinberg<S: ImageSource>(source: &S, palette: &Palette) -> PalettedImage {
    let width = source.width();
    let height = source.height();
    let w = width as usize;
    let h = height as usize;

    // Signed error accumulator per channel, working buffer the size of the
    // image; seeded from the source pixels.
    let mut buf: Vec<[f32; 4]> = Vec::with_capacity(w * h);
    for y in 0..height {
        for x in 0..width {
            let p = source.pixel(x, y);
            buf.push([f32::from(p.r), f32::from(p.g), f32::from(p.b), f32::from(p.a)]);
        }
    }

    let mut indices = vec![0u8; w * h];

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let current = buf[i];
            let clamped = Rgba8::new(
                clamp_channel(current[0]),
                clamp_channel(current[1]),
                clamp_channel(current[2]),
                clamp_channel(current[3]),
            );
            let index = nearest_index(palette, clamped);
            indices[i] = index;

            let chosen = palette.as_slice()[index as usize];
            let error = [
                current[0] - f32::from(chosen.r),
                current[1] - f32::from(chosen.g),
                current[2] - f32::from(chosen.b),
                current[3] - f32::from(chosen.a),
            ];

            diffuse(&mut buf, w, h, x, y, 1, 0, error, 7.0 / 16.0);
            diffuse(&mut buf, w, h, x, y, -1, 1, error, 3.0 / 16.0);
            diffuse(&mut buf, w, h, x, y, 0, 1, error, 5.0 / 16.0);
            diffuse(&mut buf, w, h, x, y, 1, 1, error, 1.0 / 16.0);
        }
    }

    PalettedImage {
        width,
        height,
        indices,
    }
}

#[inline]
fn clamp_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn diffuse(
    buf: &mut [[f32; 4]],
    w: usize,
    h: usize,
    x: usize,
    y: usize,
    dx: isize,
    dy: isize,
    error: [f32; 4],
    weight: f32,
) {
    let nx = x as isize + dx;
    let ny = y as isize + dy;
    if nx < 0 || ny < 0 || nx as usize >= w || ny as usize >= h {
        return;
    }
    let n = ny as usize * w + nx as usize;
    for c in 0..4 {
        buf[n][c] += error[c] * weight;
    }
}

/// Dispatch to [`remap_none`] or [`remap_floyd_steinberg`] based on `dither`.
pub fn remap<S: ImageSource>(source: &S, palette: &Palette, dither: Dither) -> PalettedImage {
    match dither {
        Dither::None => remap_none(source, palette),
        Dither::FloydSteinberg => remap_floyd_steinberg(source, palette),
    }
}
