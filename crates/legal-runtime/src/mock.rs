//! In-process generator that needs no weights.
//!
//! Used by `--mock` for local development and by the server's tests. It
//! honors the [`TextGenerator`] contract: the returned text is the prompt
//! followed by the scripted continuation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use legal_engine::{
    CancellationToken, FinishReason, Generation, GenerationError, GenerationParams,
    TextGenerator,
};

const DEFAULT_REPLY: &str = " I can explain general legal principles, but for advice on your \
     specific situation please consult a qualified attorney in your jurisdiction.";

const CANCEL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Fail(String),
}

/// Scripted generator with optional artificial latency.
#[derive(Debug)]
pub struct MockGenerator {
    script: Script,
    latency: Duration,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    /// Replies with a generic legal disclaimer.
    pub fn new() -> Self {
        Self::with_reply(DEFAULT_REPLY)
    }

    /// Appends `continuation` verbatim to every prompt.
    pub fn with_reply(continuation: impl Into<String>) -> Self {
        Self {
            script: Script::Reply(continuation.into()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Fails every call with an inference error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Script::Fail(message.into()),
            ..Self::new()
        }
    }

    /// Sleep this long before answering, checking for cancellation meanwhile.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The prompt passed to the most recent `generate` call.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|guard| guard.clone())
    }

    fn wait(&self, cancel: &CancellationToken) -> legal_engine::Result<()> {
        let deadline = Instant::now() + self.latency;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            std::thread::sleep(CANCEL_POLL.min(deadline.saturating_duration_since(Instant::now())));
        }
        Ok(())
    }
}

impl TextGenerator for MockGenerator {
    fn model_id(&self) -> &str {
        "mock"
    }

    fn device(&self) -> &str {
        "cpu"
    }

    fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> legal_engine::Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_prompt.lock() {
            *guard = Some(prompt.to_string());
        }

        params.validate()?;
        self.wait(cancel)?;
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let continuation = match &self.script {
            Script::Reply(text) => text,
            Script::Fail(message) => return Err(GenerationError::Inference(message.clone())),
        };

        // Whitespace-separated words stand in for tokens.
        let words = continuation.split_whitespace().count();
        let (continuation, generated_tokens, finish_reason) = if words > params.max_new_tokens {
            let kept: Vec<&str> = continuation
                .split_whitespace()
                .take(params.max_new_tokens)
                .collect();
            (format!(" {}", kept.join(" ")), kept.len(), FinishReason::Length)
        } else {
            (continuation.clone(), words, FinishReason::Stop)
        };

        Ok(Generation {
            text: format!("{prompt}{continuation}"),
            prompt_tokens: prompt.split_whitespace().count(),
            generated_tokens,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_is_appended_to_prompt() {
        let mock = MockGenerator::with_reply("\nA tort is a civil wrong.  ");
        let out = mock
            .generate("User: q\nAI:", &GenerationParams::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(out.text, "User: q\nAI:\nA tort is a civil wrong.  ");
        assert_eq!(out.finish_reason, FinishReason::Stop);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.last_prompt().as_deref(), Some("User: q\nAI:"));
    }

    #[test]
    fn long_reply_is_truncated_to_max_new_tokens() {
        let mock = MockGenerator::with_reply(" one two three four five");
        let params = GenerationParams::new().with_max_new_tokens(2);
        let out = mock
            .generate("p", &params, &CancellationToken::new())
            .unwrap();
        assert_eq!(out.text, "p one two");
        assert_eq!(out.generated_tokens, 2);
        assert_eq!(out.finish_reason, FinishReason::Length);
    }

    #[test]
    fn failing_mock_reports_inference_error() {
        let mock = MockGenerator::failing("CUDA out of memory");
        let err = mock
            .generate("p", &GenerationParams::default(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, GenerationError::Inference(ref m) if m == "CUDA out of memory"));
    }

    #[test]
    fn latency_is_interrupted_by_cancellation() {
        let mock = MockGenerator::new().with_latency(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = mock
            .generate("p", &GenerationParams::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
