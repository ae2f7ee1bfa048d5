//! # legal-engine
//!
//! The narrow waist of the legal-assist stack. Defines the [`TextGenerator`]
//! trait that the HTTP service calls, plus the parameter and result types that
//! cross it. Backends (candle on CPU/CUDA/Metal, the in-process mock) plug in
//! behind the trait without the server knowing which one it holds.
//!
//! ## Design Notes
//!
//! ### Shared access
//! `TextGenerator::generate` takes `&self` so one loaded model can be held in
//! an `Arc` and shared by every request. Backends that need mutable state (a
//! KV cache, for instance) are responsible for their own locking.
//!
//! ### Blocking
//! `generate` is synchronous and may run for seconds. Callers on an async
//! runtime must move it onto a blocking thread.

use std::fmt;

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Token ID type used by the tokenizer and model backends.
pub type TokenId = u32;

/// Top-level error type for all generation operations.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),
    #[error("tokenization failed: {0}")]
    Tokenization(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("sampling failed: {0}")]
    Sampling(String),
    #[error("invalid generation parameters: {0}")]
    InvalidParams(String),
    #[error("generation cancelled")]
    Cancelled,
}

/// Sampling and length parameters applied to every generation.
///
/// The defaults are the service's fixed pipeline settings: 300 new tokens,
/// temperature 0.7, nucleus probability 0.9 and a top-k of 50.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on tokens produced after the prompt.
    pub max_new_tokens: usize,
    /// Softmax temperature. Must be > 0.
    pub temperature: f32,
    /// Nucleus sampling probability mass, in `(0, 1]`.
    pub top_p: f32,
    /// Only sample among the `k` most likely tokens.
    pub top_k: Option<usize>,
    /// Fixed RNG seed. `None` draws a fresh seed per generation.
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 300,
            temperature: 0.7,
            top_p: 0.9,
            top_k: Some(50),
            seed: None,
        }
    }
}

impl GenerationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_new_tokens(mut self, n: usize) -> Self {
        self.max_new_tokens = n;
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_top_p(mut self, p: f32) -> Self {
        self.top_p = p;
        self
    }

    pub fn with_top_k(mut self, k: Option<usize>) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Reject parameter combinations no backend can honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_new_tokens == 0 {
            return Err(GenerationError::InvalidParams(
                "max_new_tokens must be at least 1".to_string(),
            ));
        }
        if self.temperature.is_nan() || self.temperature <= 0.0 {
            return Err(GenerationError::InvalidParams(format!(
                "temperature must be > 0 (got {})",
                self.temperature
            )));
        }
        if self.top_p.is_nan() || self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(GenerationError::InvalidParams(format!(
                "top_p must be in (0, 1] (got {})",
                self.top_p
            )));
        }
        if self.top_k == Some(0) {
            return Err(GenerationError::InvalidParams(
                "top_k must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model emitted an end-of-sequence token.
    Stop,
    /// `max_new_tokens` was reached.
    Length,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
        }
    }
}

/// Output of a single generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The prompt followed by the generated continuation.
    pub text: String,
    /// Number of tokens in the encoded prompt.
    pub prompt_tokens: usize,
    /// Number of tokens produced after the prompt.
    pub generated_tokens: usize,
    pub finish_reason: FinishReason,
}

impl Generation {
    /// The portion of `text` after `prompt`, if `text` starts with it.
    pub fn continuation(&self, prompt: &str) -> Option<&str> {
        self.text.strip_prefix(prompt)
    }
}

/// The generation capability: a loaded model and tokenizer bound together.
///
/// Implementations return the prompt concatenated with the continuation, the
/// same contract as a standard text-generation pipeline. They must check
/// `cancel` between decode steps and return [`GenerationError::Cancelled`]
/// once it fires.
pub trait TextGenerator: Send + Sync {
    /// Identifier of the loaded model (e.g. a hub repo id).
    fn model_id(&self) -> &str;

    /// Human-readable name of the device the model runs on.
    fn device(&self) -> &str;

    /// Generate a continuation of `prompt`.
    fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<Generation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_match_pipeline_settings() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 300);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!((params.top_p - 0.9).abs() < f32::EPSILON);
        assert_eq!(params.top_k, Some(50));
        assert_eq!(params.seed, None);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(GenerationParams::new()
            .with_temperature(0.0)
            .validate()
            .is_err());
        assert!(GenerationParams::new().with_top_p(1.5).validate().is_err());
        assert!(GenerationParams::new().with_top_p(0.0).validate().is_err());
        assert!(GenerationParams::new()
            .with_max_new_tokens(0)
            .validate()
            .is_err());
        assert!(GenerationParams::new()
            .with_top_k(Some(0))
            .validate()
            .is_err());
        assert!(GenerationParams::new()
            .with_temperature(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn finish_reason_display() {
        assert_eq!(FinishReason::Stop.to_string(), "stop");
        assert_eq!(FinishReason::Length.to_string(), "length");
    }

    #[test]
    fn continuation_strips_prompt() {
        let generation = Generation {
            text: "User: hi\nAI: hello".to_string(),
            prompt_tokens: 4,
            generated_tokens: 1,
            finish_reason: FinishReason::Stop,
        };
        assert_eq!(generation.continuation("User: hi\nAI:"), Some(" hello"));
        assert_eq!(generation.continuation("nope"), None);
    }
}
