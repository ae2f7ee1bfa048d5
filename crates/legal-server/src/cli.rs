//! Command-line configuration for the `legal-assist` binary.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use legal_engine::{GenerationParams, Result};
use legal_runtime::{
    DevicePreference, LoadOptions, NoopTelemetry, TelemetryHook, TracingTelemetry,
};

use crate::state::{ServerConfig, DEFAULT_PORT};

/// legal-assist: legal Q&A over a local causal language model
#[derive(Debug, Parser)]
#[command(name = "legal-assist", version)]
pub struct Cli {
    /// Interface to bind.
    #[arg(long, env = "LEGAL_ASSIST_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "LEGAL_ASSIST_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Hugging Face model repository.
    #[arg(
        long,
        env = "LEGAL_ASSIST_MODEL",
        default_value = "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B"
    )]
    pub model: String,

    /// Model revision (branch, tag or commit).
    #[arg(long, env = "LEGAL_ASSIST_REVISION", default_value = "main")]
    pub revision: String,

    /// Compute device: auto, cpu, cuda or metal.
    #[arg(long, env = "LEGAL_ASSIST_DEVICE", default_value = "auto")]
    pub device: DevicePreference,

    /// Maximum number of tokens to generate per request.
    #[arg(long, default_value_t = 300)]
    pub max_new_tokens: usize,

    /// Sampling temperature (> 0; very small values decode greedily).
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Nucleus sampling threshold in (0, 1].
    #[arg(long, default_value_t = 0.9)]
    pub top_p: f32,

    /// Keep only the k most likely tokens (0 disables).
    #[arg(long, default_value_t = 50)]
    pub top_k: usize,

    /// Fixed sampling seed. Random per request when unset.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Generations allowed to run at once.
    #[arg(long, default_value_t = 1)]
    pub max_concurrent: usize,

    /// Per-request deadline in seconds (0 = none).
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Do not log per-generation timing (TTFT, tokens/sec).
    #[arg(long, env = "LEGAL_ASSIST_NO_METRICS")]
    pub no_metrics: bool,

    /// Serve a canned generator instead of loading model weights.
    #[arg(long)]
    pub mock: bool,
}

impl Cli {
    /// Build the server configuration, rejecting invalid sampling settings.
    pub fn server_config(&self) -> Result<ServerConfig> {
        let top_k = (self.top_k > 0).then_some(self.top_k);
        let params = GenerationParams::new()
            .with_max_new_tokens(self.max_new_tokens)
            .with_temperature(self.temperature)
            .with_top_p(self.top_p)
            .with_top_k(top_k)
            .with_seed(self.seed);
        params.validate()?;

        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        Ok(ServerConfig::new()
            .with_addr(SocketAddr::new(self.host, self.port))
            .with_generation(params)
            .with_max_concurrent_generations(self.max_concurrent)
            .with_request_timeout(timeout))
    }

    /// Where generation timing goes.
    pub fn telemetry(&self) -> Arc<dyn TelemetryHook> {
        if self.no_metrics {
            Arc::new(NoopTelemetry)
        } else {
            Arc::new(TracingTelemetry)
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::new(&self.model)
            .with_revision(&self.revision)
            .with_device(self.device)
    }
}
