//! Explicit SIMD kernels using the `wide` crate for portable vectorization.
//!
//! Every kernel processes 8 lanes per iteration with fused multiply-add and
//! finishes the tail with scalar code. The `wide` crate picks AVX2/SSE,
//! NEON or SIMD128 at compile time and falls back to scalar elsewhere.
//!
//! Callers guarantee equal lengths; this is only checked in debug builds
//! because the kernels sit on the traversal hot path.

use wide::f32x8;

const LANES: usize = 8;

/// Computes the dot product of two vectors.
#[inline]
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / LANES;
    let mut sum = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * LANES;
        let va = f32x8::from(&a[offset..offset + LANES]);
        let vb = f32x8::from(&b[offset..offset + LANES]);
        sum = va.mul_add(vb, sum);
    }

    let mut result = sum.reduce_add();
    let base = simd_len * LANES;
    for (x, y) in a[base..].iter().zip(&b[base..]) {
        result += x * y;
    }

    result
}

/// Computes the squared L2 distance between two vectors.
#[inline]
#[must_use]
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / LANES;
    let mut sum = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * LANES;
        let va = f32x8::from(&a[offset..offset + LANES]);
        let vb = f32x8::from(&b[offset..offset + LANES]);
        let diff = va - vb;
        sum = diff.mul_add(diff, sum);
    }

    let mut result = sum.reduce_add();
    let base = simd_len * LANES;
    for (x, y) in a[base..].iter().zip(&b[base..]) {
        let diff = x - y;
        result += diff * diff;
    }

    result
}

/// Computes the L1 (Manhattan) distance between two vectors.
#[inline]
#[must_use]
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / LANES;
    let mut sum = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * LANES;
        let va = f32x8::from(&a[offset..offset + LANES]);
        let vb = f32x8::from(&b[offset..offset + LANES]);
        sum += (va - vb).abs();
    }

    let mut result = sum.reduce_add();
    let base = simd_len * LANES;
    for (x, y) in a[base..].iter().zip(&b[base..]) {
        result += (x - y).abs();
    }

    result
}

/// Single-pass computation of `(|a|², |b|², a·b)`.
///
/// Used by the angular metric to avoid three separate passes.
#[inline]
#[must_use]
#[allow(clippy::similar_names)]
pub fn fused_norms_and_dot(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let simd_len = a.len() / LANES;
    let mut aa = f32x8::ZERO;
    let mut bb = f32x8::ZERO;
    let mut ab = f32x8::ZERO;

    for i in 0..simd_len {
        let offset = i * LANES;
        let va = f32x8::from(&a[offset..offset + LANES]);
        let vb = f32x8::from(&b[offset..offset + LANES]);
        aa = va.mul_add(va, aa);
        bb = vb.mul_add(vb, bb);
        ab = va.mul_add(vb, ab);
    }

    let (mut pp, mut qq, mut pq) = (aa.reduce_add(), bb.reduce_add(), ab.reduce_add());
    let base = simd_len * LANES;
    for (x, y) in a[base..].iter().zip(&b[base..]) {
        pp += x * x;
        qq += y * y;
        pq += x * y;
    }

    (pp, qq, pq)
}
