//! Qwen2-family causal LM generator on candle.
//!
//! Covers the DeepSeek-R1 distills and Qwen2/2.5 instruct checkpoints. The
//! model keeps its KV cache internally and needs `&mut` access, so it sits
//! behind a `Mutex`: concurrent generations on one loaded model serialize.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::qwen2::{Config, ModelForCausalLM};
use legal_engine::{
    CancellationToken, FinishReason, Generation, GenerationError, GenerationParams,
    TextGenerator, TokenId,
};
use legal_sampling::Sampler;
use tokenizers::Tokenizer;

use crate::device::{select_device, DevicePreference};
use crate::hub;
use crate::telemetry::{GenerationTimer, TelemetryHook, TracingTelemetry};
use crate::LoadError;

/// Tokens tried when a repo ships no `generation_config.json`.
const FALLBACK_EOS_TOKENS: &[&str] = &[
    "<｜end▁of▁sentence｜>",
    "<|endoftext|>",
    "<|im_end|>",
    "</s>",
];

/// Where to load a model from and which device to put it on.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub model_id: String,
    pub revision: String,
    pub device: DevicePreference,
}

impl LoadOptions {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: "main".to_string(),
            device: DevicePreference::Auto,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }
}

/// A loaded Qwen2 model plus tokenizer.
pub struct QwenGenerator {
    model_id: String,
    device_label: String,
    device: Device,
    model: Mutex<ModelForCausalLM>,
    tokenizer: Tokenizer,
    eos_token_ids: Vec<TokenId>,
    telemetry: Arc<dyn TelemetryHook>,
}

impl QwenGenerator {
    /// Download (or reuse cached) files and build the model on the chosen device.
    pub fn load(options: &LoadOptions) -> Result<Self, LoadError> {
        let started = Instant::now();
        let selected = select_device(options.device)?;
        tracing::info!(
            model_id = %options.model_id,
            revision = %options.revision,
            device = %selected.kind,
            dtype = ?selected.dtype,
            "loading model"
        );

        let files = hub::fetch(&options.model_id, &options.revision)?;
        let config: Config = serde_json::from_slice(&std::fs::read(&files.config)?)?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| LoadError::Tokenizer(e.to_string()))?;
        let eos_token_ids = resolve_eos(files.generation_config.as_deref(), &tokenizer)?;

        // SAFETY: the safetensors files live in the hub cache and are not
        // modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&files.weights, selected.dtype, &selected.device)?
        };
        let model = ModelForCausalLM::new(&config, vb)?;

        tracing::info!(
            model_id = %options.model_id,
            device = %selected.kind,
            layers = config.num_hidden_layers,
            vocab = config.vocab_size,
            eos = ?eos_token_ids,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model ready"
        );

        Ok(Self {
            model_id: options.model_id.clone(),
            device_label: selected.kind.to_string(),
            device: selected.device,
            model: Mutex::new(model),
            tokenizer,
            eos_token_ids,
            telemetry: Arc::new(TracingTelemetry),
        })
    }

    /// Replace the telemetry hook (defaults to [`TracingTelemetry`]).
    pub fn with_telemetry(mut self, hook: Arc<dyn TelemetryHook>) -> Self {
        self.telemetry = hook;
        self
    }

    fn encode(&self, text: &str) -> legal_engine::Result<Vec<TokenId>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| GenerationError::Tokenization(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Logits for the position after `ids`, given `offset` tokens already cached.
    fn next_logits(
        &self,
        model: &mut ModelForCausalLM,
        ids: &[TokenId],
        offset: usize,
    ) -> candle_core::Result<Vec<f32>> {
        let input = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        model
            .forward(&input, offset)?
            .squeeze(0)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()
    }
}

impl TextGenerator for QwenGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn device(&self) -> &str {
        &self.device_label
    }

    fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> legal_engine::Result<Generation> {
        params.validate()?;

        let prompt_ids = self.encode(prompt)?;
        if prompt_ids.is_empty() {
            return Err(GenerationError::Tokenization(
                "prompt encoded to zero tokens".to_string(),
            ));
        }

        let mut sampler = Sampler::new(params.seed.unwrap_or_else(rand::random))
            .with_temperature(params.temperature)
            .with_top_k(params.top_k)
            .with_top_p(Some(params.top_p));

        let mut model = self
            .model
            .lock()
            .map_err(|_| GenerationError::Inference("model lock poisoned".to_string()))?;
        model.clear_kv_cache();

        let mut timer =
            GenerationTimer::new(self.device_label.clone(), prompt_ids.len(), self.telemetry.clone());
        let mut all_ids = prompt_ids.clone();
        let mut pending = prompt_ids.clone();
        let mut offset = 0;
        let mut finish_reason = FinishReason::Length;

        for step in 0..params.max_new_tokens {
            if cancel.is_cancelled() {
                tracing::debug!(step, "generation cancelled");
                return Err(GenerationError::Cancelled);
            }

            let logits = self
                .next_logits(&mut model, &pending, offset)
                .map_err(|e| GenerationError::Inference(e.to_string()))?;
            if step == 0 {
                timer.mark_prefill_complete();
            }
            offset += pending.len();

            let token = sampler
                .sample(&logits)
                .map_err(|e| GenerationError::Sampling(e.to_string()))? as TokenId;
            if self.eos_token_ids.contains(&token) {
                finish_reason = FinishReason::Stop;
                break;
            }

            all_ids.push(token);
            timer.mark_token();
            pending.clear();
            pending.push(token);
        }
        drop(model);

        let text = render(&self.tokenizer, prompt, &prompt_ids, &all_ids)?;
        let metrics = timer.finish();

        Ok(Generation {
            text,
            prompt_tokens: metrics.prompt_tokens,
            generated_tokens: metrics.generated_tokens,
            finish_reason,
        })
    }
}

fn decode(tokenizer: &Tokenizer, ids: &[TokenId]) -> legal_engine::Result<String> {
    tokenizer
        .decode(ids, true)
        .map_err(|e| GenerationError::Tokenization(e.to_string()))
}

/// Prompt text followed by the decoded continuation.
///
/// The whole sequence is decoded once and the decoded prompt is cut off its
/// front, so tokens that merge across the boundary decode correctly. When the
/// decoded sequence does not start with the decoded prompt, only the
/// generated ids are decoded.
fn render(
    tokenizer: &Tokenizer,
    prompt: &str,
    prompt_ids: &[TokenId],
    all_ids: &[TokenId],
) -> legal_engine::Result<String> {
    let generated = all_ids.get(prompt_ids.len()..).unwrap_or_default();
    if generated.is_empty() {
        return Ok(prompt.to_string());
    }

    let full = decode(tokenizer, all_ids)?;
    let decoded_prompt = decode(tokenizer, prompt_ids)?;
    let continuation = match full.strip_prefix(decoded_prompt.as_str()) {
        Some(rest) => rest.to_string(),
        None => {
            tracing::debug!("decoded prompt is not a prefix; decoding generated ids alone");
            decode(tokenizer, generated)?
        }
    };
    Ok(format!("{prompt}{continuation}"))
}

fn resolve_eos(
    generation_config: Option<&std::path::Path>,
    tokenizer: &Tokenizer,
) -> Result<Vec<TokenId>, LoadError> {
    if let Some(path) = generation_config {
        let ids = hub::eos_token_ids(&std::fs::read_to_string(path)?)?;
        if !ids.is_empty() {
            return Ok(ids);
        }
    }

    let ids: Vec<TokenId> = FALLBACK_EOS_TOKENS
        .iter()
        .filter_map(|token| tokenizer.token_to_id(token))
        .collect();
    if ids.is_empty() {
        return Err(LoadError::NoEosToken);
    }
    Ok(ids)
}
