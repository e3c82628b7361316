//! The Pairwise Nearest Neighbour driver: repeated revalidate/merge until
//! exactly `k` clusters remain.
//!
//! Reference: Virmajoki, O., & Fränti, P. (2003). Multilevel thresholding by
//! fast PNN-based algorithm. Image Processing: Algorithms and Systems II.

use crate::cluster::{ClusterArena, ClusterId, MERGED_SENTINEL};
use crate::color::{build_histogram, Rgba8};
use crate::error::QuantizeError;
use crate::heap::ClusterHeap;
use crate::ImageSource;

/// Cost of merging clusters `a` (left) and `b` (right): the increase in
/// squared error from replacing them with their joint centroid.
#[inline]
fn merge_cost(arena: &ClusterArena, a: ClusterId, b: ClusterId) -> f64 {
    let a = arena.get(a);
    let b = arena.get(b);
    let weight = (a.n * b.n) / (a.n + b.n);
    let d = sqr(b.a - a.a) + sqr(b.r - a.r) + sqr(b.g - a.g) + sqr(b.b - a.b);
    weight * d
}

#[inline]
fn sqr(x: f64) -> f64 {
    x * x
}

/// Scan `c`'s successors for the cheapest merge partner, ties broken toward
/// the leftmost (first-encountered) candidate. Updates `c.nn` and `c.d` in
/// place. A tail cluster gets `nn = None`, `d = +inf`.
fn rescan_nearest_neighbour(arena: &mut ClusterArena, c: ClusterId) {
    let mut best: Option<(ClusterId, f64)> = None;
    let mut cursor = arena.get(c).next;
    while let Some(candidate) = cursor {
        let cost = merge_cost(arena, c, candidate);
        if best.map_or(true, |(_, best_cost)| cost < best_cost) {
            best = Some((candidate, cost));
        }
        cursor = arena.get(candidate).next;
    }
    let node = arena.get_mut(c);
    match best {
        Some((nn, d)) => {
            node.nn = Some(nn);
            node.d = d;
        }
        None => {
            node.nn = None;
            node.d = f64::INFINITY;
        }
    }
}

/// Result of an initial histogram pass: the arena, its heap, and the live
/// cluster count.
struct Seeded {
    arena: ClusterArena,
    heap: ClusterHeap,
    live_count: usize,
}

fn seed(arena: ClusterArena) -> Seeded {
    let mut arena = arena;
    let mut heap = ClusterHeap::with_capacity(arena.len());
    let mut live_count = 0;

    let ids: Vec<ClusterId> = arena.iter().map(|(id, _)| id).collect();
    for id in ids {
        rescan_nearest_neighbour(&mut arena, id);
        live_count += 1;
        if !arena.get(id).is_tail() {
            heap.push(&mut arena, id);
        }
    }

    Seeded {
        arena,
        heap,
        live_count,
    }
}

/// Repeat the stale-top check at the heap root until its cached `(nn, d)`
/// is authoritative, rescanning and re-heapifying as needed. Returns the
/// now-trustworthy root.
fn revalidate(arena: &mut ClusterArena, heap: &mut ClusterHeap, count: u32) -> ClusterId {
    loop {
        let top = heap.peek().expect("heap must be non-empty while m != k");
        let (update_count, merge_count, nn) = {
            let node = arena.get(top);
            (node.update_count, node.merge_count, node.nn.expect("non-tail cluster must have nn"))
        };
        let nn_merge_count = arena.get(nn).merge_count;
        if update_count >= merge_count && update_count >= nn_merge_count {
            return top;
        }
        rescan_nearest_neighbour(arena, top);
        let index = arena.get(top).heap_index.expect("root must be queued");
        heap.fix(arena, index as usize);
        arena.get_mut(top).update_count = count;
    }
}

/// Merge victim `b` into target `a`: absorb `b`'s mass into `a`'s weighted
/// centroid, unlink `b` from the list, and drop both from the heap as
/// required (`b` always; `a` too if it becomes a tail).
fn merge(arena: &mut ClusterArena, heap: &mut ClusterHeap, a: ClusterId, b: ClusterId, count: u32) {
    let (an, bn) = (arena.get(a).n, arena.get(b).n);
    let nq = an + bn;
    {
        let (a_rgba, b_rgba) = {
            let bc = *arena.get(b);
            let ac = *arena.get(a);
            ((ac.r, ac.g, ac.b, ac.a), (bc.r, bc.g, bc.b, bc.a))
        };
        let node = arena.get_mut(a);
        node.r = (an * a_rgba.0 + bn * b_rgba.0) / nq;
        node.g = (an * a_rgba.1 + bn * b_rgba.1) / nq;
        node.b = (an * a_rgba.2 + bn * b_rgba.2) / nq;
        node.a = (an * a_rgba.3 + bn * b_rgba.3) / nq;
        node.n = nq;
    }

    arena.unlink(b);
    heap.remove_cluster(arena, b);

    if arena.get(a).is_tail() {
        heap.remove_cluster(arena, a);
    }

    arena.get_mut(a).merge_count = count + 1;
    arena.get_mut(b).merge_count = MERGED_SENTINEL;
}

/// Palette produced by [`quantize`]: `k` representative RGBA colours in
/// ascending-key list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(
    /// The `k` colours, in ascending colour-key list order.
    pub Vec<Rgba8>,
);

impl Palette {
    /// Borrow the palette's colours as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Rgba8] {
        &self.0
    }

    /// Number of colours in the palette.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the palette has no colours.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Truncate a centroid channel toward zero into `0..=255`. Values are
/// already within range by construction (weighted averages of 8-bit inputs).
#[inline]
fn round_channel(x: f64) -> u8 {
    x as u8
}

fn extract_palette(arena: &ClusterArena) -> Palette {
    let colours = arena
        .iter()
        .map(|(_, c)| {
            Rgba8::new(
                round_channel(c.r),
                round_channel(c.g),
                round_channel(c.b),
                round_channel(c.a),
            )
        })
        .collect();
    Palette(colours)
}

/// Reduce `source`'s colours to a palette of `k` entries using Pairwise
/// Nearest Neighbour agglomerative clustering.
///
/// # Errors
///
/// Returns [`QuantizeError::EmptyImage`] if the source has no pixels, or
/// [`QuantizeError::InvalidK`] if `k < 2` or `k` exceeds the number of
/// distinct colour-key bins present in the image.
pub fn quantize<S: ImageSource>(source: &S, k: usize) -> Result<Palette, QuantizeError> {
    let arena = build_histogram(source).ok_or(QuantizeError::EmptyImage)?;
    quantize_histogram(arena, k)
}

fn quantize_histogram(arena: ClusterArena, k: usize) -> Result<Palette, QuantizeError> {
    let available = arena.len();
    if k < 2 || k > available {
        return Err(QuantizeError::InvalidK {
            requested: k,
            available,
        });
    }

    let Seeded {
        mut arena,
        mut heap,
        mut live_count,
    } = seed(arena);

    let mut count: u32 = 0;
    while live_count != k {
        let target = revalidate(&mut arena, &mut heap, count);
        let victim = arena.get(target).nn.expect("revalidated cluster must have nn");
        merge(&mut arena, &mut heap, target, victim, count);
        live_count -= 1;
        count += 1;
    }

    Ok(extract_palette(&arena))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba8;

    struct VecSource {
        width: u32,
        height: u32,
        pixels: Vec<Rgba8>,
    }

    impl ImageSource for VecSource {
        fn width(&self) -> u32 {
            self.width
        }
        fn height(&self) -> u32 {
            self.height
        }
        fn pixel(&self, x: u32, y: u32) -> Rgba8 {
            self.pixels[(y * self.width + x) as usize]
        }
    }

    fn source(pixels: Vec<Rgba8>) -> VecSource {
        let width = pixels.len() as u32;
        VecSource {
            width,
            height: 1,
            pixels,
        }
    }

    #[test]
    fn single_pixel_rejects_k_too_large() {
        let src = source(vec![Rgba8::new(200, 100, 50, 255)]);
        let err = quantize(&src, 2).unwrap_err();
        assert!(matches!(err, QuantizeError::InvalidK { requested: 2, available: 1 }));
    }

    #[test]
    fn two_colours_pass_through_unmerged() {
        let src = source(vec![Rgba8::new(0, 0, 0, 255), Rgba8::new(255, 255, 255, 255)]);
        let pal = quantize(&src, 2).unwrap();
        assert_eq!(
            pal.0,
            vec![Rgba8::new(0, 0, 0, 255), Rgba8::new(255, 255, 255, 255)]
        );
    }

    /// With pixels at 0, 128, 255, the cheapest single merge is grey+white
    /// (squared channel gap 127) rather than black+grey (gap 128): the
    /// midpoint isn't exactly equidistant, so black is left untouched.
    #[test]
    fn three_colours_merges_cheapest_adjacent_pair() {
        let src = source(vec![
            Rgba8::new(0, 0, 0, 255),
            Rgba8::new(128, 128, 128, 255),
            Rgba8::new(255, 255, 255, 255),
        ]);
        let pal = quantize(&src, 2).unwrap();
        assert_eq!(
            pal.0,
            vec![Rgba8::new(0, 0, 0, 255), Rgba8::new(191, 191, 191, 255)]
        );
    }

    /// When two successors of a cluster tie exactly on merge cost, the
    /// leftmost (first list-order, i.e. lowest colour key) one wins.
    #[test]
    fn nearest_neighbour_scan_breaks_ties_leftmost() {
        let mut arena = ClusterArena::with_capacity(3);
        let a = arena.push_empty();
        let b = arena.push_empty();
        let c = arena.push_empty();
        arena.head = Some(a);
        arena.link(a, b);
        arena.link(b, c);
        for id in [a, b, c] {
            arena.get_mut(id).n = 1.0;
        }
        arena.get_mut(b).r = 10.0;
        arena.get_mut(c).g = 10.0;

        rescan_nearest_neighbour(&mut arena, a);

        assert_eq!(arena.get(a).nn, Some(b));
    }

    #[test]
    fn uniform_image_rejects_k_too_large() {
        let pixels = vec![Rgba8::new(0, 0, 0, 255); 100];
        let src = VecSource {
            width: 10,
            height: 10,
            pixels,
        };
        let err = quantize(&src, 2).unwrap_err();
        assert!(matches!(err, QuantizeError::InvalidK { requested: 2, available: 1 }));
    }

    #[test]
    fn exact_k_colours_performs_zero_merges_and_keeps_means() {
        let src = source(vec![
            Rgba8::new(10, 20, 30, 255),
            Rgba8::new(40, 50, 60, 255),
            Rgba8::new(70, 80, 90, 255),
        ]);
        let pal = quantize(&src, 3).unwrap();
        assert_eq!(pal.len(), 3);
        assert_eq!(pal.0[0], Rgba8::new(10, 20, 30, 255));
        assert_eq!(pal.0[1], Rgba8::new(40, 50, 60, 255));
        assert_eq!(pal.0[2], Rgba8::new(70, 80, 90, 255));
    }

    #[test]
    fn quantization_is_deterministic() {
        let src = source(vec![
            Rgba8::new(0, 0, 0, 255),
            Rgba8::new(10, 10, 10, 255),
            Rgba8::new(200, 200, 200, 255),
            Rgba8::new(255, 255, 255, 255),
        ]);
        let a = quantize(&src, 2).unwrap();
        let b = quantize(&src, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_k_one_is_rejected() {
        let src = source(vec![Rgba8::new(0, 0, 0, 255), Rgba8::new(255, 255, 255, 255)]);
        let err = quantize(&src, 1).unwrap_err();
        assert!(matches!(err, QuantizeError::InvalidK { requested: 1, .. }));
    }

    #[test]
    fn empty_image_is_rejected() {
        let src = VecSource {
            width: 0,
            height: 0,
            pixels: vec![],
        };
        let err = quantize(&src, 2).unwrap_err();
        assert!(matches!(err, QuantizeError::EmptyImage));
    }

    fn six_colour_fixture() -> Vec<Rgba8> {
        vec![
            Rgba8::new(0, 0, 0, 255),
            Rgba8::new(10, 10, 10, 255),
            Rgba8::new(20, 20, 20, 255),
            Rgba8::new(200, 200, 200, 255),
            Rgba8::new(220, 220, 220, 255),
            Rgba8::new(255, 255, 255, 255),
        ]
    }

    /// Invariant #1: live-cluster count after iteration i equals
    /// `initial_count - i`.
    #[test]
    fn live_count_decreases_by_exactly_one_per_iteration() {
        let src = source(six_colour_fixture());
        let arena = build_histogram(&src).unwrap();
        let initial_count = arena.len();
        let Seeded {
            mut arena,
            mut heap,
            mut live_count,
        } = seed(arena);
        assert_eq!(live_count, initial_count);

        let mut count: u32 = 0;
        while live_count > 2 {
            let target = revalidate(&mut arena, &mut heap, count);
            let victim = arena.get(target).nn.expect("revalidated cluster must have nn");
            merge(&mut arena, &mut heap, target, victim, count);
            live_count -= 1;
            count += 1;
            assert_eq!(live_count, initial_count - count as usize);
        }
    }

    /// Invariant #3: no tail cluster (`next == None`) is ever present in the
    /// heap, before or after any merge.
    #[test]
    fn tail_cluster_never_enters_heap() {
        let src = source(six_colour_fixture());
        let arena = build_histogram(&src).unwrap();
        let Seeded {
            mut arena,
            mut heap,
            mut live_count,
        } = seed(arena);

        let assert_no_tail_queued = |arena: &ClusterArena| {
            for (id, cluster) in arena.iter() {
                if cluster.is_tail() {
                    assert_eq!(cluster.heap_index, None, "tail cluster {id:?} is queued");
                }
            }
        };
        assert_no_tail_queued(&arena);

        let mut count: u32 = 0;
        while live_count > 2 {
            let target = revalidate(&mut arena, &mut heap, count);
            let victim = arena.get(target).nn.expect("revalidated cluster must have nn");
            merge(&mut arena, &mut heap, target, victim, count);
            live_count -= 1;
            count += 1;
            assert_no_tail_queued(&arena);
        }
    }

    /// Invariants #4/#5: the total mass and channel sums over live clusters
    /// always equal the source totals, through every merge.
    #[test]
    fn merges_preserve_total_mass_and_channel_sums() {
        let pixels = six_colour_fixture();
        let total_n = pixels.len() as f64;
        let total_r: f64 = pixels.iter().map(|p| f64::from(p.r)).sum();
        let total_g: f64 = pixels.iter().map(|p| f64::from(p.g)).sum();
        let total_b: f64 = pixels.iter().map(|p| f64::from(p.b)).sum();
        let total_a: f64 = pixels.iter().map(|p| f64::from(p.a)).sum();

        let src = source(pixels);
        let arena = build_histogram(&src).unwrap();
        let Seeded {
            mut arena,
            mut heap,
            mut live_count,
        } = seed(arena);

        let mut count: u32 = 0;
        while live_count > 1 {
            let target = revalidate(&mut arena, &mut heap, count);
            let victim = arena.get(target).nn.expect("revalidated cluster must have nn");
            merge(&mut arena, &mut heap, target, victim, count);
            live_count -= 1;
            count += 1;

            let summed_n: f64 = arena.iter().map(|(_, c)| c.n).sum();
            let summed_r: f64 = arena.iter().map(|(_, c)| c.r * c.n).sum();
            let summed_g: f64 = arena.iter().map(|(_, c)| c.g * c.n).sum();
            let summed_b: f64 = arena.iter().map(|(_, c)| c.b * c.n).sum();
            let summed_a: f64 = arena.iter().map(|(_, c)| c.a * c.n).sum();

            assert!((summed_n - total_n).abs() < 1e-9);
            assert!((summed_r - total_r).abs() < 1e-6);
            assert!((summed_g - total_g).abs() < 1e-6);
            assert!((summed_b - total_b).abs() < 1e-6);
            assert!((summed_a - total_a).abs() < 1e-6);
        }
    }

    /// Invariant #9: the merge cost returned by `revalidate` at the popped
    /// root is monotone nondecreasing across iterations.
    #[test]
    fn revalidated_root_cost_is_monotone_nondecreasing() {
        let src = source(six_colour_fixture());
        let arena = build_histogram(&src).unwrap();
        let Seeded {
            mut arena,
            mut heap,
            mut live_count,
        } = seed(arena);

        let mut costs = Vec::new();
        let mut count: u32 = 0;
        while live_count > 1 {
            let target = revalidate(&mut arena, &mut heap, count);
            costs.push(arena.get(target).d);
            let victim = arena.get(target).nn.expect("revalidated cluster must have nn");
            merge(&mut arena, &mut heap, target, victim, count);
            live_count -= 1;
            count += 1;
        }

        for pair in costs.windows(2) {
            assert!(pair[1] >= pair[0], "costs regressed: {costs:?}");
        }
    }
}
