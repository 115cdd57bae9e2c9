use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Cache, Repo, RepoType};
use log::{debug, info};
use serde::Deserialize;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Local paths of everything needed to build the model and tokenizer.
#[derive(Debug, Clone)]
pub struct CheckpointFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

#[derive(Deserialize)]
struct SafetensorsIndex {
    weight_map: HashMap<String, String>,
}

/// Resolve a checkpoint that is either a local directory or a Hub model id.
pub fn resolve(checkpoint: &str, revision: &str) -> Result<CheckpointFiles> {
    let path = Path::new(checkpoint);
    if path.is_dir() {
        info!("Using local checkpoint {}", path.display());
        from_dir(path)
    } else {
        info!("Fetching checkpoint {} ({}) from the Hub", checkpoint, revision);
        from_hub(checkpoint, revision)
    }
}

fn from_dir(dir: &Path) -> Result<CheckpointFiles> {
    let config = existing(dir.join(CONFIG_FILE))?;
    let tokenizer = existing(dir.join(TOKENIZER_FILE))?;

    let single = dir.join(WEIGHTS_FILE);
    let weights = if single.is_file() {
        vec![single]
    } else {
        let index = existing(dir.join(WEIGHTS_INDEX_FILE)).with_context(|| {
            format!("No {} or {} in {}", WEIGHTS_FILE, WEIGHTS_INDEX_FILE, dir.display())
        })?;
        shard_names(&read(&index)?)?
            .into_iter()
            .map(|name| existing(dir.join(name)))
            .collect::<Result<Vec<_>>>()?
    };

    Ok(CheckpointFiles { config, tokenizer, weights })
}

fn from_hub(model_id: &str, revision: &str) -> Result<CheckpointFiles> {
    let api = ApiBuilder::from_cache(Cache::from_env())
        .with_progress(true)
        .build()
        .context("Failed to initialize Hugging Face Hub client")?;
    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = fetch(&repo, model_id, CONFIG_FILE)?;
    let tokenizer = fetch(&repo, model_id, TOKENIZER_FILE)?;
    let weights = match repo.get(WEIGHTS_FILE) {
        Ok(path) => vec![path],
        Err(e) => {
            debug!("{} unavailable ({}), trying sharded weights", WEIGHTS_FILE, e);
            let index = fetch(&repo, model_id, WEIGHTS_INDEX_FILE)?;
            shard_names(&read(&index)?)?
                .iter()
                .map(|name| fetch(&repo, model_id, name))
                .collect::<Result<Vec<_>>>()?
        }
    };

    Ok(CheckpointFiles { config, tokenizer, weights })
}

fn fetch(repo: &ApiRepo, model_id: &str, file: &str) -> Result<PathBuf> {
    repo.get(file)
        .with_context(|| format!("Failed to fetch {} for checkpoint {}", file, model_id))
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(anyhow!("Missing checkpoint file {}", path.display()))
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Distinct shard file names listed in a safetensors index, in sorted order.
fn shard_names(index_json: &str) -> Result<Vec<String>> {
    let index: SafetensorsIndex =
        serde_json::from_str(index_json).context("Invalid safetensors index")?;
    let shards: BTreeSet<String> = index.weight_map.into_values().collect();
    if shards.is_empty() {
        return Err(anyhow!("Safetensors index lists no shards"));
    }
    Ok(shards.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REVISION;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"{}").unwrap();
    }

    #[test]
    fn dedups_and_sorts_shards() {
        let json = r#"{
            "metadata": {"total_size": 10},
            "weight_map": {
                "encoder.a": "model-00002-of-00002.safetensors",
                "encoder.b": "model-00001-of-00002.safetensors",
                "decoder.a": "model-00002-of-00002.safetensors"
            }
        }"#;
        assert_eq!(
            shard_names(json).unwrap(),
            vec![
                "model-00001-of-00002.safetensors".to_string(),
                "model-00002-of-00002.safetensors".to_string(),
            ]
        );
    }

    #[test]
    fn empty_index_is_an_error() {
        assert!(shard_names(r#"{"weight_map": {}}"#).is_err());
        assert!(shard_names("not json").is_err());
    }

    #[test]
    fn resolves_single_file_dir() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), CONFIG_FILE);
        touch(dir.path(), TOKENIZER_FILE);
        touch(dir.path(), WEIGHTS_FILE);

        let files = resolve(dir.path().to_str().unwrap(), DEFAULT_REVISION).unwrap();
        assert_eq!(files.config, dir.path().join(CONFIG_FILE));
        assert_eq!(files.tokenizer, dir.path().join(TOKENIZER_FILE));
        assert_eq!(files.weights, vec![dir.path().join(WEIGHTS_FILE)]);
    }

    #[test]
    fn resolves_sharded_dir() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), CONFIG_FILE);
        touch(dir.path(), TOKENIZER_FILE);
        touch(dir.path(), "a.safetensors");
        touch(dir.path(), "b.safetensors");
        fs::write(
            dir.path().join(WEIGHTS_INDEX_FILE),
            r#"{"weight_map": {"x": "b.safetensors", "y": "a.safetensors"}}"#,
        )
        .unwrap();

        let files = from_dir(dir.path()).unwrap();
        assert_eq!(
            files.weights,
            vec![dir.path().join("a.safetensors"), dir.path().join("b.safetensors")]
        );
    }

    #[test]
    fn missing_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), CONFIG_FILE);
        let err = from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains(TOKENIZER_FILE));

        touch(dir.path(), TOKENIZER_FILE);
        assert!(from_dir(dir.path()).is_err());
    }
}
