//! Colour key packing and the histogram that seeds the cluster arena.
use fxhash::FxHashMap;

use crate::cluster::{ClusterArena, ClusterId};
use crate::ImageSource;

/// An 8-bit RGBA colour, channel order matching the spec's `(r, g, b, a)`
/// tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Construct a colour from its four channels.
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Pack an 8-bit RGBA colour into the 16-bit key used to bin histogram
/// entries: top 4 bits of alpha, red, green, and the top 4 bits of blue at
/// the low nibble.
///
/// Deliberately coarse — this caps the number of initial clusters at 65 536
/// regardless of image size and is not meant to be "improved" (see spec §9).
#[inline]
#[must_use]
pub fn colour_key(c: Rgba8) -> u16 {
    let a = u16::from(c.a) & 0xF0;
    let r = u16::from(c.r) & 0xF0;
    let g = u16::from(c.g) & 0xF0;
    let b = u16::from(c.b) >> 4;
    (a << 8) | (r << 4) | g | b
}

/// Running channel sums for one colour-key bin, before normalisation.
#[derive(Debug, Clone, Copy, Default)]
struct Bin {
    r: f64,
    g: f64,
    b: f64,
    a: f64,
    n: f64,
}

/// Bin every pixel of `source` by [`colour_key`], then build the initial
/// cluster arena with clusters linked in ascending key order.
///
/// Returns the arena and the head of the list. Returns `None` if the image
/// has zero pixels.
pub fn build_histogram<S: ImageSource>(source: &S) -> Option<ClusterArena> {
    let total_pixels = usize::try_from(source.width()).unwrap_or(0)
        * usize::try_from(source.height()).unwrap_or(0);
    if total_pixels == 0 {
        return None;
    }

    let mut bins: FxHashMap<u16, Bin> = FxHashMap::default();
    for y in 0..source.height() {
        for x in 0..source.width() {
            let pixel = source.pixel(x, y);
            let key = colour_key(pixel);
            let bin = bins.entry(key).or_default();
            bin.r += f64::from(pixel.r);
            bin.g += f64::from(pixel.g);
            bin.b += f64::from(pixel.b);
            bin.a += f64::from(pixel.a);
            bin.n += 1.0;
        }
    }

    let mut keys: Vec<u16> = bins.keys().copied().collect();
    keys.sort_unstable();

    let mut arena = ClusterArena::with_capacity(keys.len());
    let mut ids: Vec<ClusterId> = Vec::with_capacity(keys.len());
    for key in &keys {
        let bin = bins[key];
        let id = arena.push_empty();
        let cluster = arena.get_mut(id);
        cluster.r = bin.r / bin.n;
        cluster.g = bin.g / bin.n;
        cluster.b = bin.b / bin.n;
        cluster.a = bin.a / bin.n;
        cluster.n = bin.n;
        ids.push(id);
    }

    arena.head = ids.first().copied();
    for pair in ids.windows(2) {
        arena.link(pair[0], pair[1]);
    }

    Some(arena)
}
