use std::fs;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5;
use log::{debug, info};
use tokenizers::Tokenizer;

use crate::checkpoint::CheckpointFiles;
use crate::config::GenerationConfig;
use crate::prompt::{build_prompt, truncate_ids};

/// Anything that can turn a dialogue into a summary.
pub trait Summarize {
    fn summarize(&mut self, text: &str, gen: &GenerationConfig) -> Result<String>;
}

pub struct Summarizer {
    model: t5::T5ForConditionalGeneration,
    tokenizer: Tokenizer,
    config: t5::Config,
    device: Device,
}

impl Summarizer {
    pub fn load(files: &CheckpointFiles) -> Result<Self> {
        let device = Device::Cpu;

        let raw = fs::read_to_string(&files.config)
            .with_context(|| format!("Failed to read {}", files.config.display()))?;
        let config: t5::Config =
            serde_json::from_str(&raw).context("Failed to parse model config")?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        info!("Loading {} weight file(s)", files.weights.len());
        // Safety: the safetensors files are not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, DType::F32, &device)? };
        let model = t5::T5ForConditionalGeneration::load(vb, &config)
            .context("Failed to build T5 model from weights")?;

        Ok(Self { model, tokenizer, config, device })
    }

    fn encode_prompt(&self, prompt: &str, max_len: usize) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow!("Failed to encode input: {}", e))?;
        let ids = encoding.get_ids();
        let eos = self.config.eos_token_id as u32;
        if ids.len() > max_len {
            debug!("Truncating prompt from {} to {} tokens", ids.len(), max_len);
        }
        Ok(truncate_ids(ids, max_len, eos))
    }

    fn generate(&mut self, input_ids: &[u32], gen: &GenerationConfig) -> Result<Vec<u32>> {
        let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        let encoder_output = self.model.encode(&input)?;

        let start = self
            .config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32;
        let eos = self.config.eos_token_id as u32;
        let use_cache = self.config.use_cache;
        let mut sampler = LogitsProcessor::from_sampling(gen.sampler_seed(), gen.sampling());

        let model = &mut self.model;
        let device = &self.device;
        sample_tokens(start, eos, gen.max_new_tokens, &mut sampler, |step, tokens| {
            // With the KV cache only the newest token is fed after the first step.
            let fed = if step == 0 || !use_cache {
                tokens
            } else {
                &tokens[tokens.len() - 1..]
            };
            let decoder_ids = Tensor::new(fed, device)?.unsqueeze(0)?;
            Ok(model
                .decode(&decoder_ids, &encoder_output)?
                .squeeze(0)?
                .to_dtype(DType::F32)?)
        })
    }
}

/// Autoregressive sampling loop. Returns `start` followed by at most
/// `max_new_tokens` sampled ids; the EOS token itself is not included.
fn sample_tokens<F>(
    start: u32,
    eos: u32,
    max_new_tokens: usize,
    sampler: &mut LogitsProcessor,
    mut next_logits: F,
) -> Result<Vec<u32>>
where
    F: FnMut(usize, &[u32]) -> Result<Tensor>,
{
    let mut tokens = vec![start];
    for step in 0..max_new_tokens {
        let logits = next_logits(step, &tokens)?;
        let next = sampler.sample(&logits)?;
        if next == eos {
            break;
        }
        tokens.push(next);
    }
    Ok(tokens)
}

impl Summarize for Summarizer {
    fn summarize(&mut self, text: &str, gen: &GenerationConfig) -> Result<String> {
        let prompt = build_prompt(text);
        let input_ids = self.encode_prompt(&prompt, gen.max_input_tokens)?;
        debug!("Prompt is {} tokens", input_ids.len());

        let generated = self.generate(&input_ids, gen);
        self.model.clear_kv_cache();
        let tokens = generated?;
        debug!("Generated {} tokens", tokens.len() - 1);

        let summary = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| anyhow!("Failed to decode output: {}", e))?;
        Ok(summary.trim().to_string())
    }
}
