//! Progress reporting for long-running stages

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
	/// 0.0 - 100.0
	pub percentage: f32,
	pub status: String,
}

impl Progress {
	pub fn new(percentage: f32, status: impl Into<String>) -> Self {
		Self {
			percentage,
			status: status.into(),
		}
	}

	/// Map this progress (0-100 of a sub-task) into `[start, end]` of the parent
	pub fn scaled(&self, start: f32, end: f32) -> Self {
		let fraction = (self.percentage / 100.0).clamp(0.0, 1.0);
		Self {
			percentage: start + (end - start) * fraction,
			status: self.status.clone(),
		}
	}
}

/// Keeps reported percentages non-decreasing within one run
#[derive(Debug, Default)]
pub struct ProgressTracker {
	last: f32,
}

impl ProgressTracker {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn observe(&mut self, progress: Progress) -> Progress {
		let pct = if progress.percentage.is_finite() {
			progress.percentage.clamp(0.0, 100.0)
		} else {
			self.last
		};
		self.last = self.last.max(pct);

		Progress {
			percentage: self.last,
			status: progress.status,
		}
	}

	pub fn last(&self) -> f32 {
		self.last
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tracker_never_goes_backwards() {
		let mut tracker = ProgressTracker::new();
		assert_eq!(tracker.observe(Progress::new(40.0, "a")).percentage, 40.0);
		assert_eq!(tracker.observe(Progress::new(10.0, "b")).percentage, 40.0);
		assert_eq!(tracker.observe(Progress::new(f32::NAN, "c")).percentage, 40.0);
		assert_eq!(tracker.observe(Progress::new(250.0, "d")).percentage, 100.0);
	}

	#[test]
	fn test_scaled_maps_into_range() {
		let p = Progress::new(50.0, "half").scaled(10.0, 50.0);
		assert!((p.percentage - 30.0).abs() < 1e-5);
		assert_eq!(p.status, "half");
	}
}
