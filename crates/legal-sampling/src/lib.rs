//! # legal-sampling
//!
//! Next-token selection for the legal-assist generators.
//!
//! Applied in this order, matching common text-generation pipelines:
//! 1. Temperature scaling
//! 2. Top-k filtering (on logits)
//! 3. Softmax
//! 4. Top-p (nucleus) filtering (on probabilities)
//! 5. A draw from a seeded xorshift RNG
//!
//! A very low temperature degenerates to greedy argmax.

use std::cmp::Ordering;

/// Sampling error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("logits array is empty")]
    EmptyLogits,
    #[error("logits contain NaN")]
    NanLogits,
    #[error("temperature must be > 0 (got {0})")]
    InvalidTemperature(f32),
    #[error("top_p must be in (0, 1] (got {0})")]
    InvalidTopP(f32),
    #[error("no valid tokens after filtering")]
    NoValidTokens,
}

pub type SamplingResult<T> = std::result::Result<T, SamplingError>;

/// Temperatures below this are treated as greedy decoding.
const GREEDY_TEMPERATURE: f32 = 1e-3;

/// Deterministic RNG for reproducible sampling (xorshift64).
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        // xorshift never leaves the zero state.
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    /// Next float in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Sampling configuration plus RNG state.
#[derive(Debug, Clone)]
pub struct Sampler {
    /// Softmax temperature. < 1.0 sharpens, > 1.0 flattens.
    pub temperature: f32,
    /// Keep only the `k` highest logits.
    pub top_k: Option<usize>,
    /// Keep the smallest set of tokens whose cumulative probability reaches `p`.
    pub top_p: Option<f32>,
    rng: SeededRng,
}

impl Sampler {
    /// A sampler with temperature 1.0 and no filtering.
    pub fn new(seed: u64) -> Self {
        Self {
            temperature: 1.0,
            top_k: None,
            top_p: None,
            rng: SeededRng::new(seed),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, k: Option<usize>) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_top_p(mut self, p: Option<f32>) -> Self {
        self.top_p = p;
        self
    }

    /// Pick a token index from raw logits.
    pub fn sample(&mut self, logits: &[f32]) -> SamplingResult<usize> {
        if logits.is_empty() {
            return Err(SamplingError::EmptyLogits);
        }
        if logits.iter().any(|l| l.is_nan()) {
            return Err(SamplingError::NanLogits);
        }
        if self.temperature.is_nan() || self.temperature <= 0.0 {
            return Err(SamplingError::InvalidTemperature(self.temperature));
        }
        if let Some(p) = self.top_p {
            if p.is_nan() || p <= 0.0 || p > 1.0 {
                return Err(SamplingError::InvalidTopP(p));
            }
        }

        if self.temperature < GREEDY_TEMPERATURE {
            return Ok(argmax(logits));
        }

        let mut scaled: Vec<f32> = logits.iter().map(|l| l / self.temperature).collect();

        if let Some(k) = self.top_k {
            apply_top_k(&mut scaled, k);
        }

        let mut probs = softmax(&scaled);

        if let Some(p) = self.top_p {
            apply_top_p(&mut probs, p);
        }

        self.draw(&probs)
    }

    fn draw(&mut self, probs: &[f32]) -> SamplingResult<usize> {
        let r = self.rng.next_f32();
        let mut cumsum = 0.0;
        for (i, &prob) in probs.iter().enumerate() {
            cumsum += prob;
            if r < cumsum {
                return Ok(i);
            }
        }

        // Rounding left r above the final cumulative sum.
        probs
            .iter()
            .rposition(|&prob| prob > 0.0)
            .ok_or(SamplingError::NoValidTokens)
    }
}

fn by_value_desc(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal)
}

fn apply_top_k(logits: &mut [f32], k: usize) {
    if k == 0 || k >= logits.len() {
        return;
    }
    let mut indexed: Vec<(usize, f32)> = logits.iter().copied().enumerate().collect();
    indexed.sort_by(by_value_desc);
    let threshold = indexed[k - 1].1;
    for logit in logits.iter_mut() {
        if *logit < threshold {
            *logit = f32::NEG_INFINITY;
        }
    }
}

fn apply_top_p(probs: &mut [f32], p: f32) {
    let mut indexed: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    indexed.sort_by(by_value_desc);

    let mut cumsum = 0.0;
    let mut cutoff = indexed[indexed.len() - 1].1;
    for &(_, prob) in &indexed {
        cumsum += prob;
        if cumsum >= p {
            cutoff = prob;
            break;
        }
    }

    for prob in probs.iter_mut() {
        if *prob < cutoff {
            *prob = 0.0;
        }
    }

    let sum: f32 = probs.iter().sum();
    if sum > 0.0 {
        for prob in probs.iter_mut() {
            *prob /= sum;
        }
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![1.0 / logits.len() as f32; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}
