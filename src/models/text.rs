//! Sentence embedding model (BERT-style ONNX export + HuggingFace tokenizer)

use anyhow::{anyhow, bail, Context, Result};
use ort::session::Session;
use ort::value::Value;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tokenizers::Tokenizer;

use super::Embedder;
use crate::cli::Provider;
use crate::config::{self, MAX_SEQUENCE_LEN};
use crate::core::{vector, Embedding};
use crate::pipeline::Progress;
use crate::ui;

struct Loaded {
	model_id: String,
	session: Session,
	tokenizer: Tokenizer,
}

/// Mean-pooled, L2-normalized sentence embeddings
pub struct SentenceModel {
	models_dir: PathBuf,
	provider: Provider,
	loaded: Option<Loaded>,
	rng: StdRng,
}

impl SentenceModel {
	pub fn new(models_dir: PathBuf, provider: Provider) -> Self {
		Self {
			models_dir,
			provider,
			loaded: None,
			rng: StdRng::from_os_rng(),
		}
	}

	/// Checks if model files are available for `model_id`
	pub fn is_available(&self, model_id: &str) -> bool {
		config::model_path(&self.models_dir, model_id).exists()
			&& config::tokenizer_path(&self.models_dir, model_id).exists()
	}

	fn encode(&mut self, text: &str) -> Result<Vec<f32>> {
		let loaded = self.loaded.as_mut().context("Model not loaded")?;

		let encoding = loaded
			.tokenizer
			.encode(text, true)
			.map_err(|e| anyhow!("Tokenization failed: {}", e))?;

		let seq_len = encoding.get_ids().len().min(MAX_SEQUENCE_LEN);
		let input_ids: Vec<i64> = encoding.get_ids()[..seq_len].iter().map(|&x| x as i64).collect();
		let attention_mask: Vec<i64> = encoding.get_attention_mask()[..seq_len]
			.iter()
			.map(|&x| x as i64)
			.collect();
		let token_type_ids: Vec<i64> = vec![0i64; seq_len];

		let shape = vec![1, seq_len];
		let input_ids_val = Value::from_array((shape.clone(), input_ids))?;
		let attention_mask_val = Value::from_array((shape.clone(), attention_mask.clone()))?;
		let token_type_ids_val = Value::from_array((shape, token_type_ids))?;

		let outputs = loaded.session.run(ort::inputs![
			"input_ids" => input_ids_val,
			"attention_mask" => attention_mask_val,
			"token_type_ids" => token_type_ids_val,
		])?;

		let output = outputs
			.get("last_hidden_state")
			.or_else(|| outputs.get("token_embeddings"))
			.context("Model output not found")?;

		let (shape, data) = output.try_extract_tensor::<f32>()?;
		let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();

		let pooled = match dims.as_slice() {
			[1, seq, hidden] => mean_pool(data, *seq, *hidden, &attention_mask),
			[1, _hidden] => Some(data.to_vec()),
			_ => bail!("Unexpected output shape: {:?}", dims),
		};
		drop(outputs);

		let pooled = match pooled {
			Some(p) => p,
			None => {
				ui::debug("No usable tokens after pooling, using a small random vector");
				let hidden = dims.last().copied().unwrap_or(0);
				vector::random_vector(hidden, 0.005, &mut self.rng)
			}
		};

		Ok(vector::l2_normalize(&pooled, &mut self.rng))
	}
}

impl Embedder for SentenceModel {
	fn load(&mut self, model_id: &str, progress: &mut dyn FnMut(Progress)) -> Result<String> {
		let model_path = config::model_path(&self.models_dir, model_id);
		let tokenizer_path = config::tokenizer_path(&self.models_dir, model_id);

		progress(Progress::new(0.0, format!("[1/3] Locating {}", model_id)));
		if !model_path.exists() {
			bail!("Model file does not exist: {}", model_path.display());
		}
		if !tokenizer_path.exists() {
			bail!("Tokenizer file does not exist: {}", tokenizer_path.display());
		}

		progress(Progress::new(20.0, "[2/3] Loading tokenizer"));
		let tokenizer =
			Tokenizer::from_file(&tokenizer_path).map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

		progress(Progress::new(40.0, "[3/3] Creating inference session"));
		ui::debug(&format!("Loading model: {}", model_path.display()));
		let (session, device) =
			crate::runtime::create_session(&model_path, self.provider).context("Failed to load text model")?;

		self.loaded = Some(Loaded {
			model_id: model_id.to_string(),
			session,
			tokenizer,
		});

		progress(Progress::new(100.0, "Model ready"));
		Ok(device.to_string())
	}

	fn embed(&mut self, texts: &[String], progress: &mut dyn FnMut(Progress)) -> Result<Vec<Embedding>> {
		let model_id = match &self.loaded {
			Some(loaded) => loaded.model_id.clone(),
			None => bail!("Model not loaded"),
		};

		let total = texts.len().max(1) as f32;
		let mut out = Vec::with_capacity(texts.len());

		for (i, text) in texts.iter().enumerate() {
			let vec = self
				.encode(text)
				.with_context(|| format!("Failed to embed text {} with {}", i, model_id))?;
			out.push(Embedding::raw(vec));

			progress(Progress::new(
				(i + 1) as f32 / total * 100.0,
				format!("Embedded {}/{}", i + 1, texts.len()),
			));
		}

		let invalid = out.iter().filter(|e| !e.is_finite()).count();
		if invalid > 0 {
			bail!("{} of {} embeddings contain NaN or infinite values", invalid, out.len());
		}

		Ok(out)
	}
}

/// Mean over masked tokens, skipping non-finite components.
/// `None` when no component had a finite value.
fn mean_pool(data: &[f32], seq_len: usize, hidden_size: usize, attention_mask: &[i64]) -> Option<Vec<f32>> {
	let mut sum = vec![0.0f32; hidden_size];
	let mut counts = vec![0u32; hidden_size];

	for t in 0..seq_len {
		if attention_mask.get(t).copied().unwrap_or(0) != 1 {
			continue;
		}
		let offset = t * hidden_size;
		let Some(row) = data.get(offset..offset + hidden_size) else {
			break;
		};
		for (j, &v) in row.iter().enumerate() {
			if v.is_finite() {
				sum[j] += v;
				counts[j] += 1;
			}
		}
	}

	if counts.iter().all(|&c| c == 0) {
		return None;
	}

	Some(
		sum.into_iter()
			.zip(counts)
			.map(|(s, c)| if c > 0 { s / c as f32 } else { 0.0 })
			.collect(),
	)
}
