//! Behavioral tests for the public `Sampler` API.

use legal_sampling::{Sampler, SamplingError};
use std::collections::HashMap;

fn histogram(sampler: &mut Sampler, logits: &[f32], draws: usize) -> HashMap<usize, usize> {
    let mut counts = HashMap::new();
    for _ in 0..draws {
        *counts.entry(sampler.sample(logits).unwrap()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn lower_temperature_concentrates_mass() {
    let logits = [1.0, 2.0, 3.0];
    let mut hot = Sampler::new(11).with_temperature(2.0);
    let mut cold = Sampler::new(11).with_temperature(0.3);

    let hot_top = histogram(&mut hot, &logits, 2000)
        .get(&2)
        .copied()
        .unwrap_or(0);
    let cold_top = histogram(&mut cold, &logits, 2000)
        .get(&2)
        .copied()
        .unwrap_or(0);

    assert!(cold_top > hot_top, "cold={cold_top} hot={hot_top}");
}

#[test]
fn top_p_never_samples_outside_nucleus() {
    // softmax([10, 9, 0, 0]) puts ~0.73 / ~0.27 on the first two tokens.
    let logits = [10.0, 9.0, 0.0, 0.0];
    let mut sampler = Sampler::new(5).with_top_p(Some(0.9));
    let counts = histogram(&mut sampler, &logits, 1000);
    assert!(counts.keys().all(|&token| token < 2), "{counts:?}");
}

#[test]
fn top_k_never_samples_outside_k() {
    let logits = [0.5, 0.4, 0.3, 0.2, 0.1];
    let mut sampler = Sampler::new(9).with_top_k(Some(3));
    let counts = histogram(&mut sampler, &logits, 1000);
    assert!(counts.keys().all(|&token| token < 3), "{counts:?}");
}

#[test]
fn masked_logits_are_skipped() {
    let logits = [f32::NEG_INFINITY, 0.0, f32::NEG_INFINITY];
    let mut sampler = Sampler::new(1).with_top_p(Some(0.9));
    for _ in 0..20 {
        assert_eq!(sampler.sample(&logits).unwrap(), 1);
    }
}

#[test]
fn error_messages_are_descriptive() {
    assert_eq!(
        SamplingError::InvalidTemperature(-1.0).to_string(),
        "temperature must be > 0 (got -1)"
    );
    assert_eq!(
        SamplingError::NoValidTokens.to_string(),
        "no valid tokens after filtering"
    );
}
