//! Similarity Engine
//!
//! Pure numeric operations on fixed-length `f32` vectors. Nothing here
//! validates its input on the scoring path: callers are expected to run
//! [`validate_vector`] once at ingestion time and keep dimensions consistent.
//!
//! Sums of products are accumulated in `f64` and narrowed once at the end.
//! Squares of `f32` components underflow below about `1e-19` and overflow
//! above about `1e19`.

#[cfg(test)]
mod tests;

use crate::{Result, RetrievalError};

/// Sum of element-wise products.
///
/// # Errors
/// Returns [`RetrievalError::LengthMismatch`] when the vectors differ in length.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    ensure_same_length(a, b)?;
    Ok(dot_f64(a, b) as f32)
}

/// Euclidean norm. Zero for the zero vector and for an empty slice.
#[inline]
pub fn vector_norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

/// Cosine of the angle between `a` and `b`.
///
/// A zero vector is dissimilar to everything, itself included, so any zero
/// norm yields `0.0` instead of `NaN`.
///
/// # Errors
/// Returns [`RetrievalError::LengthMismatch`] when the vectors differ in length.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    cosine_similarity_with_norms(a, b, None, None)
}

/// Cosine similarity using precomputed norms where available.
///
/// A supplied norm must equal `vector_norm` of its vector; it is trusted as-is.
///
/// # Errors
/// Returns [`RetrievalError::LengthMismatch`] when the vectors differ in length.
#[inline]
pub fn cosine_similarity_with_norms(
    a: &[f32],
    b: &[f32],
    norm_a: Option<f32>,
    norm_b: Option<f32>,
) -> Result<f32> {
    cosine_from_parts(a, b, norm_a.map(f64::from), norm_b.map(f64::from))
}

/// Cosine with the norms already widened to `f64`
pub(crate) fn cosine_from_parts(
    a: &[f32],
    b: &[f32],
    norm_a: Option<f64>,
    norm_b: Option<f64>,
) -> Result<f32> {
    ensure_same_length(a, b)?;
    let dot = dot_f64(a, b);

    let norm_a = norm_a.unwrap_or_else(|| norm_f64(a));
    let norm_b = norm_b.unwrap_or_else(|| norm_f64(b));

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)) as f32)
}

/// True iff `v` is non-empty and every element is finite.
#[inline]
pub fn validate_vector(v: &[f32]) -> bool {
    !v.is_empty() && v.iter().all(|x| x.is_finite())
}

/// Narrow a generic numeric list to the 32-bit representation used for
/// embeddings. Precision loss is expected.
#[inline]
pub fn to_float32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&x| x as f32).collect()
}

/// Widen an embedding back to `f64`.
#[inline]
pub fn from_float32(values: &[f32]) -> Vec<f64> {
    values.iter().map(|&x| f64::from(x)).collect()
}

/// Scale `v` to unit length.
///
/// Returns `None` when the norm is zero or not finite, since such a vector
/// has no direction to preserve.
#[inline]
pub fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    let norm = norm_f64(v);
    if norm <= 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|&x| (f64::from(x) / norm) as f32).collect())
}

pub(crate) fn norm_f64(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

fn ensure_same_length(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(RetrievalError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}
