//! Execution provider selection

use anyhow::{Context, Result};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use std::path::Path;

use crate::ui;

pub use crate::cli::Provider;

const CPU: &str = "cpu";

/// Create a session for `model_path`, returning it with the name of the
/// device that ended up running it.
pub fn create_session(model_path: &Path, provider: Provider) -> Result<(Session, &'static str)> {
	let mut builder = Session::builder().context("Failed to create session builder")?;

	let device = match provider {
		Provider::Auto => register_best(&mut builder),
		Provider::Cpu => {
			ui::info("Using CPU execution provider (forced)");
			CPU
		}
		Provider::Cuda => try_cuda(&mut builder).unwrap_or_else(|| {
			ui::error("CUDA requested but unavailable, falling back to CPU");
			CPU
		}),
		Provider::Tensorrt => try_tensorrt(&mut builder).unwrap_or_else(|| {
			ui::error("TensorRT requested but unavailable, falling back to CPU");
			CPU
		}),
		Provider::Coreml => {
			#[cfg(target_os = "macos")]
			let device = try_coreml(&mut builder).unwrap_or_else(|| {
				ui::error("CoreML requested but unavailable, falling back to CPU");
				CPU
			});
			#[cfg(not(target_os = "macos"))]
			let device = {
				ui::error("CoreML only available on macOS, falling back to CPU");
				CPU
			};
			device
		}
		Provider::Xnnpack => try_xnnpack(&mut builder).unwrap_or_else(|| {
			ui::error("XNNPACK requested but unavailable, falling back to CPU");
			CPU
		}),
	};

	let session = builder
		.with_optimization_level(GraphOptimizationLevel::Level3)
		.map_err(ort::Error::<()>::from)
		.context("Failed to set optimization level")?
		.with_intra_threads(4)
		.map_err(ort::Error::<()>::from)
		.context("Failed to set thread count")?
		.commit_from_file(model_path)
		.with_context(|| format!("Failed to load model: {}", model_path.display()))?;

	Ok((session, device))
}

fn register_best(builder: &mut SessionBuilder) -> &'static str {
	if let Some(device) = try_tensorrt(builder) {
		return device;
	}
	if let Some(device) = try_cuda(builder) {
		return device;
	}

	#[cfg(target_os = "macos")]
	if let Some(device) = try_coreml(builder) {
		return device;
	}

	if let Some(device) = try_xnnpack(builder) {
		return device;
	}

	ui::info("Using CPU execution provider");
	CPU
}

macro_rules! try_provider {
	($builder:expr, $provider_type:ty, $name:expr, $device:expr) => {{
		use ort::ep::ExecutionProvider;

		crate::ui::debug(&format!("Trying provider: {}", $name));

		let provider = <$provider_type>::default();
		if !provider.is_available().unwrap_or(false) {
			crate::ui::debug(&format!("{} not available", $name));
			return None;
		}

		match provider.register($builder) {
			Ok(_) => {
				crate::ui::success(&format!("Using {} execution provider", $name));
				Some($device)
			}
			Err(e) => {
				crate::ui::debug(&format!("{} registration failed: {}", $name, e));
				None
			}
		}
	}};
}

fn try_cuda(builder: &mut SessionBuilder) -> Option<&'static str> {
	use ort::ep::CUDA;
	try_provider!(builder, CUDA, "CUDA", "cuda")
}

#[cfg(target_os = "macos")]
fn try_coreml(builder: &mut SessionBuilder) -> Option<&'static str> {
	use ort::ep::CoreML;
	try_provider!(builder, CoreML, "CoreML", "coreml")
}

fn try_tensorrt(builder: &mut SessionBuilder) -> Option<&'static str> {
	use ort::ep::TensorRT;
	try_provider!(builder, TensorRT, "TensorRT", "tensorrt")
}

fn try_xnnpack(builder: &mut SessionBuilder) -> Option<&'static str> {
	use ort::ep::XNNPACK;
	try_provider!(builder, XNNPACK, "XNNPACK", "xnnpack")
}
