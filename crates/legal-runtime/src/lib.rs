//! # legal-runtime
//!
//! Concrete generation backends for legal-assist and the machinery to load
//! them: device selection, Hugging Face Hub file resolution, a candle-based
//! Qwen2 generator, telemetry hooks (TTFT, tok/s) and a scripted mock.

pub mod device;
pub mod hub;
pub mod mock;
pub mod qwen;
pub mod telemetry;

pub use device::{select_device, DeviceError, DeviceKind, DevicePreference, SelectedDevice};
pub use mock::MockGenerator;
pub use qwen::{LoadOptions, QwenGenerator};
pub use telemetry::{
    GenerationMetrics, GenerationTimer, NoopTelemetry, RecordingTelemetry, TelemetryHook,
    TracingTelemetry,
};

/// Errors raised while loading a model at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("hub error: {0}")]
    Hub(String),
    #[error("no safetensors weights found for {0}")]
    NoWeights(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("no end-of-sequence token configured")]
    NoEosToken,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl From<LoadError> for legal_engine::GenerationError {
    fn from(err: LoadError) -> Self {
        legal_engine::GenerationError::ModelLoad(err.to_string())
    }
}
