//! Vector math primitives shared by projection and search

use rand::Rng;

/// Magnitudes below this are treated as zero by [`l2_normalize`]
pub const NORM_EPSILON: f32 = 1e-10;

/// Half-width of the components of the replacement vector for near-zero input
const FALLBACK_MAGNITUDE: f32 = 0.005;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn magnitude(v: &[f32]) -> f32 {
	v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn is_finite(v: &[f32]) -> bool {
	v.iter().all(|x| x.is_finite())
}

/// Cosine similarity in [-1.0, 1.0].
///
/// Returns 0.0 when either vector has zero magnitude, which also covers
/// zero-length input. Callers must pass vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	debug_assert_eq!(a.len(), b.len(), "cosine_similarity on unequal lengths");

	let mag_a = magnitude(a);
	let mag_b = magnitude(b);
	if mag_a == 0.0 || mag_b == 0.0 {
		return 0.0;
	}

	(dot(a, b) / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Standard L2 distance between two equal-length vectors
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
	debug_assert_eq!(a.len(), b.len(), "euclidean_distance on unequal lengths");

	a.iter()
		.zip(b.iter())
		.map(|(x, y)| (x - y) * (x - y))
		.sum::<f32>()
		.sqrt()
}

/// Scales `v` to unit length.
///
/// A vector whose magnitude is below [`NORM_EPSILON`] cannot be normalized
/// without producing NaN, so a small random vector of the same length is
/// returned instead. Downstream code must accept that replacement.
pub fn l2_normalize<R: Rng + ?Sized>(v: &[f32], rng: &mut R) -> Vec<f32> {
	let norm = magnitude(v);
	if norm.is_finite() && norm >= NORM_EPSILON {
		v.iter().map(|x| x / norm).collect()
	} else {
		random_vector(v.len(), FALLBACK_MAGNITUDE, rng)
	}
}

/// Vector with components uniform in `[-half_width, half_width]`
pub fn random_vector<R: Rng + ?Sized>(len: usize, half_width: f32, rng: &mut R) -> Vec<f32> {
	(0..len)
		.map(|_| rng.random_range(-half_width..=half_width))
		.collect()
}
