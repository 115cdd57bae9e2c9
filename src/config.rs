use candle_transformers::generation::Sampling;
use thiserror::Error;

pub const DEFAULT_CHECKPOINT: &str = "google/flan-t5-base";
pub const DEFAULT_REVISION: &str = "main";
pub const DEFAULT_MAX_NEW_TOKENS: usize = 120;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
// Same as the transformers generate() default
pub const DEFAULT_TOP_K: usize = 50;
// Below this the scaled f32 logits overflow, so sampling degrades to argmax.
pub const GREEDY_TEMPERATURE: f64 = 1e-5;
// T5 tokenizers ship with model_max_length = 512
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 512;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("temperature must be a finite number >= 0, got {0}")]
    InvalidTemperature(f64),
    #[error("max_new_tokens must be at least 1")]
    ZeroMaxNewTokens,
    #[error("max_input_tokens must be at least 2, got {0}")]
    InputBudgetTooSmall(usize),
}

/// Sampling parameters shared by every generation in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub temperature: f64,
    /// Sample among the k most likely tokens. 0 samples the whole vocabulary.
    pub top_k: usize,
    pub max_input_tokens: usize,
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            seed: None,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.max_new_tokens == 0 {
            return Err(ConfigError::ZeroMaxNewTokens);
        }
        // Room for at least one prompt token plus EOS
        if self.max_input_tokens < 2 {
            return Err(ConfigError::InputBudgetTooSmall(self.max_input_tokens));
        }
        Ok(())
    }

    /// Sampling strategy for the decoder.
    pub fn sampling(&self) -> Sampling {
        let temperature = self.temperature;
        if temperature < GREEDY_TEMPERATURE {
            Sampling::ArgMax
        } else if self.top_k == 0 {
            Sampling::All { temperature }
        } else {
            Sampling::TopK { k: self.top_k, temperature }
        }
    }

    pub fn sampler_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}
