//! Model file resolution from the Hugging Face Hub.
//!
//! Downloads (or finds in the local hub cache) everything a causal LM needs:
//! `config.json`, `tokenizer.json`, the optional `generation_config.json`, and
//! the safetensors weights. Weights come from a single `model.safetensors` or,
//! for sharded repos, the files named in `model.safetensors.index.json`.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::Deserialize;

use crate::LoadError;

/// Local paths of a resolved model repo.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub generation_config: Option<PathBuf>,
    pub weights: Vec<PathBuf>,
}

/// Resolve all files for `model_id` at `revision`.
pub fn fetch(model_id: &str, revision: &str) -> Result<ModelFiles, LoadError> {
    let api = Api::new().map_err(|e| LoadError::Hub(e.to_string()))?;
    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = get(&repo, "config.json")?;
    let tokenizer = get(&repo, "tokenizer.json")?;
    let generation_config = repo.get("generation_config.json").ok();
    let weights = fetch_weights(&repo, model_id)?;

    tracing::debug!(
        model_id,
        revision,
        shards = weights.len(),
        "resolved model files"
    );

    Ok(ModelFiles {
        config,
        tokenizer,
        generation_config,
        weights,
    })
}

fn get(repo: &ApiRepo, filename: &str) -> Result<PathBuf, LoadError> {
    repo.get(filename)
        .map_err(|e| LoadError::Hub(format!("failed to fetch {filename}: {e}")))
}

fn fetch_weights(repo: &ApiRepo, model_id: &str) -> Result<Vec<PathBuf>, LoadError> {
    if let Ok(path) = repo.get("model.safetensors") {
        return Ok(vec![path]);
    }

    let index_path = repo
        .get("model.safetensors.index.json")
        .map_err(|_| LoadError::NoWeights(model_id.to_string()))?;
    let index = std::fs::read_to_string(index_path)?;

    shard_filenames(&index)?
        .iter()
        .map(|filename| get(repo, filename))
        .collect()
}

#[derive(Deserialize)]
struct ShardIndex {
    weight_map: HashMap<String, String>,
}

/// Distinct shard filenames listed in a safetensors index, sorted.
pub fn shard_filenames(index_json: &str) -> Result<Vec<String>, serde_json::Error> {
    let index: ShardIndex = serde_json::from_str(index_json)?;
    let unique: BTreeSet<String> = index.weight_map.into_values().collect();
    Ok(unique.into_iter().collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(u32),
    Many(Vec<u32>),
}

#[derive(Deserialize)]
struct GenerationConfig {
    #[serde(default)]
    eos_token_id: Option<OneOrMany>,
}

/// End-of-sequence ids declared in a `generation_config.json`.
///
/// Returns an empty list when the file does not declare any.
pub fn eos_token_ids(generation_config_json: &str) -> Result<Vec<u32>, serde_json::Error> {
    let config: GenerationConfig = serde_json::from_str(generation_config_json)?;
    Ok(match config.eos_token_id {
        Some(OneOrMany::One(id)) => vec![id],
        Some(OneOrMany::Many(ids)) => ids,
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_filenames_are_deduplicated_and_sorted() {
        let index = r#"{
            "metadata": {"total_size": 123},
            "weight_map": {
                "model.embed_tokens.weight": "model-00002-of-00002.safetensors",
                "model.layers.0.mlp.up_proj.weight": "model-00001-of-00002.safetensors",
                "lm_head.weight": "model-00002-of-00002.safetensors"
            }
        }"#;
        assert_eq!(
            shard_filenames(index).unwrap(),
            vec![
                "model-00001-of-00002.safetensors".to_string(),
                "model-00002-of-00002.safetensors".to_string(),
            ]
        );
    }

    #[test]
    fn shard_index_without_weight_map_fails() {
        assert!(shard_filenames(r#"{"metadata": {}}"#).is_err());
    }

    #[test]
    fn eos_single_id() {
        let json = r#"{"bos_token_id": 151646, "eos_token_id": 151643, "do_sample": true}"#;
        assert_eq!(eos_token_ids(json).unwrap(), vec![151643]);
    }

    #[test]
    fn eos_id_list() {
        let json = r#"{"eos_token_id": [151645, 151643]}"#;
        assert_eq!(eos_token_ids(json).unwrap(), vec![151645, 151643]);
    }

    #[test]
    fn eos_missing_is_empty() {
        assert!(eos_token_ids(r#"{"temperature": 0.6}"#).unwrap().is_empty());
    }
}
