//! Telemetry hooks for generation performance.
//!
//! Provides:
//! - [`GenerationMetrics`]: TTFT, tokens/sec and a per-run summary
//! - [`TelemetryHook`]: callback interface for metric reporting
//! - [`GenerationTimer`]: records timestamps and computes metrics
//! - [`NoopTelemetry`] / [`TracingTelemetry`] / [`RecordingTelemetry`]

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Aggregate metrics from one generation.
#[derive(Debug, Clone)]
pub struct GenerationMetrics {
    /// Device the generation ran on.
    pub device: String,
    /// Time to first token in milliseconds (prefill latency).
    pub ttft_ms: f64,
    /// Decode throughput, excluding prefill.
    pub tokens_per_sec: f64,
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
    /// Wall-clock time in milliseconds (prefill + decode).
    pub total_time_ms: f64,
}

/// Callback trait for generation telemetry.
///
/// All methods default to no-ops so hooks can be selective.
pub trait TelemetryHook: Send + Sync {
    fn on_prefill_complete(&self, _ttft_ms: f64) {}

    fn on_token_generated(&self, _token_idx: usize, _elapsed_ms: f64) {}

    fn on_generation_complete(&self, _metrics: &GenerationMetrics) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetryHook for NoopTelemetry {}

/// Emits one `tracing` event per finished generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetryHook for TracingTelemetry {
    fn on_prefill_complete(&self, ttft_ms: f64) {
        tracing::debug!(ttft_ms, "prefill complete");
    }

    fn on_generation_complete(&self, m: &GenerationMetrics) {
        tracing::info!(
            device = %m.device,
            prompt_tokens = m.prompt_tokens,
            generated_tokens = m.generated_tokens,
            ttft_ms = m.ttft_ms,
            tokens_per_sec = m.tokens_per_sec,
            total_ms = m.total_time_ms,
            "generation complete"
        );
    }
}

/// Keeps the most recent metrics for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    last: Arc<Mutex<Option<GenerationMetrics>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_metrics(&self) -> Option<GenerationMetrics> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }
}

impl TelemetryHook for RecordingTelemetry {
    fn on_generation_complete(&self, metrics: &GenerationMetrics) {
        if let Ok(mut guard) = self.last.lock() {
            *guard = Some(metrics.clone());
        }
    }
}

/// Records timestamps during a generation to compute [`GenerationMetrics`].
///
/// 1. [`GenerationTimer::new`] at generation start
/// 2. [`GenerationTimer::mark_prefill_complete`] after the prompt forward pass
/// 3. [`GenerationTimer::mark_token`] after each accepted token
/// 4. [`GenerationTimer::finish`] to compute and report
pub struct GenerationTimer {
    device: String,
    prompt_tokens: usize,
    start: Instant,
    prefill_end: Option<Instant>,
    token_count: usize,
    hook: Arc<dyn TelemetryHook>,
}

impl GenerationTimer {
    pub fn new(device: impl Into<String>, prompt_tokens: usize, hook: Arc<dyn TelemetryHook>) -> Self {
        Self {
            device: device.into(),
            prompt_tokens,
            start: Instant::now(),
            prefill_end: None,
            token_count: 0,
            hook,
        }
    }

    pub fn mark_prefill_complete(&mut self) {
        let now = Instant::now();
        self.prefill_end = Some(now);
        self.hook
            .on_prefill_complete(now.duration_since(self.start).as_secs_f64() * 1000.0);
    }

    pub fn mark_token(&mut self) {
        self.token_count += 1;
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.hook.on_token_generated(self.token_count, elapsed_ms);
    }

    pub fn finish(self) -> GenerationMetrics {
        let total_time_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        let ttft_ms = self
            .prefill_end
            .map(|t| t.duration_since(self.start).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        let decode_ms = total_time_ms - ttft_ms;
        let tokens_per_sec = if decode_ms > 0.0 && self.token_count > 0 {
            self.token_count as f64 / (decode_ms / 1000.0)
        } else {
            0.0
        };

        let metrics = GenerationMetrics {
            device: self.device,
            ttft_ms,
            tokens_per_sec,
            prompt_tokens: self.prompt_tokens,
            generated_tokens: self.token_count,
            total_time_ms,
        };
        self.hook.on_generation_complete(&metrics);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_counts_tokens_and_fires_hook() {
        let recorder = RecordingTelemetry::new();
        let mut timer = GenerationTimer::new("cpu", 7, Arc::new(recorder.clone()));
        timer.mark_prefill_complete();
        timer.mark_token();
        timer.mark_token();
        let metrics = timer.finish();

        assert_eq!(metrics.device, "cpu");
        assert_eq!(metrics.prompt_tokens, 7);
        assert_eq!(metrics.generated_tokens, 2);
        assert!(metrics.total_time_ms >= metrics.ttft_ms);

        let captured = recorder.last_metrics().unwrap();
        assert_eq!(captured.generated_tokens, 2);
    }

    #[test]
    fn timer_without_prefill_reports_zero_ttft() {
        let metrics = GenerationTimer::new("cpu", 1, Arc::new(NoopTelemetry)).finish();
        assert_eq!(metrics.ttft_ms, 0.0);
        assert_eq!(metrics.tokens_per_sec, 0.0);
    }

    #[test]
    fn recording_starts_empty() {
        assert!(RecordingTelemetry::new().last_metrics().is_none());
    }

    #[test]
    fn tracing_hook_accepts_metrics() {
        let mut timer = GenerationTimer::new("cuda", 3, Arc::new(TracingTelemetry));
        timer.mark_prefill_complete();
        timer.mark_token();
        assert_eq!(timer.finish().generated_tokens, 1);
    }
}
