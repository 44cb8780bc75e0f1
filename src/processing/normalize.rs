//! Rescaling projected points into the display range
//!
//! Every axis is mapped independently so that its minimum lands on
//! `-scale / 2` and its maximum on `+scale / 2`. An axis with no spread
//! collapses to 0.

use serde::{Deserialize, Serialize};

use crate::core::Point3;

/// Per-axis extent of a raw point set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
	pub min: Point3,
	pub max: Point3,
}

impl Bounds {
	/// Extent over the finite components of `points`. `None` when empty.
	pub fn of(points: &[Point3]) -> Option<Self> {
		if points.is_empty() {
			return None;
		}

		let mut min = [f32::INFINITY; 3];
		let mut max = [f32::NEG_INFINITY; 3];

		for p in points {
			for axis in 0..3 {
				let v = p[axis];
				if !v.is_finite() {
					continue;
				}
				min[axis] = min[axis].min(v);
				max[axis] = max[axis].max(v);
			}
		}

		Some(Self { min, max })
	}

	pub fn range(&self, axis: usize) -> f32 {
		self.max[axis] - self.min[axis]
	}

	/// True when the axis carries no information (zero or non-finite range)
	pub fn is_collapsed(&self, axis: usize) -> bool {
		let range = self.range(axis);
		!range.is_finite() || range == 0.0
	}

	/// Map one raw point into `[-scale/2, scale/2]` using these bounds
	pub fn apply(&self, point: &Point3, scale: f32) -> Point3 {
		let mut out = [0.0; 3];
		for axis in 0..3 {
			if self.is_collapsed(axis) {
				continue;
			}
			let t = (point[axis] - self.min[axis]) / self.range(axis);
			let v = (t - 0.5) * scale;
			out[axis] = if v.is_finite() { v } else { 0.0 };
		}
		out
	}
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
	scale: f32,
}

impl Normalizer {
	pub fn new(scale: f32) -> Self {
		Self { scale }
	}

	pub fn scale(&self) -> f32 {
		self.scale
	}

	/// Full recompute: bounds are taken from `points` themselves
	pub fn normalize(&self, points: &[Point3]) -> Vec<Point3> {
		self.fit(points).map(|(_, normalized)| normalized).unwrap_or_default()
	}

	/// Like [`Normalizer::normalize`] but also returns the bounds used, so
	/// later points can be placed into the same frame.
	pub fn fit(&self, points: &[Point3]) -> Option<(Bounds, Vec<Point3>)> {
		let bounds = Bounds::of(points)?;
		let normalized = points.iter().map(|p| bounds.apply(p, self.scale)).collect();
		Some((bounds, normalized))
	}

	/// Incremental placement: map one new raw point with frozen bounds.
	/// Existing normalized points are untouched.
	pub fn place(&self, bounds: &Bounds, point: &Point3) -> Point3 {
		bounds.apply(point, self.scale)
	}
}

impl Default for Normalizer {
	fn default() -> Self {
		Self::new(crate::config::NORMALIZE_SCALE)
	}
}
