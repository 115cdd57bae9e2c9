use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;
use std::io::{self, Write};
use std::path::PathBuf;
use anyhow::{Context, Result};
use log::info;

mod checkpoint;
mod config;
mod input;
mod model;
mod prompt;

use config::GenerationConfig;
use input::Input;
use model::{Summarize, Summarizer};


#[derive(Parser, Debug)]
#[command(version, about = "Summarize dialogues with a pretrained T5 model", long_about = None)]
struct Args {
    /// Dialogue text to summarize
    #[arg(long)]
    text: Option<String>,

    /// Path to a text file with one dialogue per line
    #[arg(long)]
    file: Option<PathBuf>,

    /// Hugging Face model id or local checkpoint directory
    #[arg(long, default_value = config::DEFAULT_CHECKPOINT)]
    checkpoint: String,

    /// Hub revision to fetch when the checkpoint is a model id
    #[arg(long, default_value = config::DEFAULT_REVISION)]
    revision: String,

    /// Maximum number of tokens to generate per summary
    #[arg(long = "max_new_tokens", default_value_t = config::DEFAULT_MAX_NEW_TOKENS)]
    max_new_tokens: usize,

    /// Sampling temperature, 0 for greedy decoding
    #[arg(long, default_value_t = config::DEFAULT_TEMPERATURE)]
    temperature: f64,

    /// Sample among the k most likely tokens, 0 for the whole vocabulary
    #[arg(long = "top_k", default_value_t = config::DEFAULT_TOP_K)]
    top_k: usize,

    /// Prompts longer than this many tokens are truncated
    #[arg(long = "max_input_tokens", default_value_t = config::DEFAULT_MAX_INPUT_TOKENS)]
    max_input_tokens: usize,

    /// Sampler seed, random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            max_new_tokens: self.max_new_tokens,
            temperature: self.temperature,
            top_k: self.top_k,
            max_input_tokens: self.max_input_tokens,
            seed: self.seed,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Usage problems are reported before any model is touched.
    let Some(input) = Input::select(args.text.clone(), args.file.clone()) else {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Provide --text or --file")
            .exit()
    };
    let gen = args.generation_config();
    if let Err(e) = gen.validate() {
        Args::command().error(ErrorKind::ValueValidation, e).exit()
    }

    let files = checkpoint::resolve(&args.checkpoint, &args.revision)
        .with_context(|| format!("Failed to resolve checkpoint {}", args.checkpoint))?;
    let mut summarizer = Summarizer::load(&files)
        .with_context(|| format!("Failed to load checkpoint {}", args.checkpoint))?;
    info!("Model ready");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&mut summarizer, &input, &gen, &mut out)?;
    out.flush()?;

    Ok(())
}

/// Summarize every dialogue in `input`, writing results to `out`.
/// Any failure aborts the remaining lines.
fn run<S: Summarize, W: Write>(
    summarizer: &mut S,
    input: &Input,
    gen: &GenerationConfig,
    out: &mut W,
) -> Result<()> {
    match input {
        Input::Text(text) => {
            let summary = summarizer.summarize(text, gen)?;
            writeln!(out, "{}", summary)?;
        }
        Input::File(path) => {
            let contents = input::read_file(path)?;
            for (i, line) in input::dialogues(&contents).enumerate() {
                let summary = summarizer
                    .summarize(line, gen)
                    .with_context(|| format!("Failed to summarize example {}", i + 1))?;
                writeln!(out, "--- Example {} ---", i + 1)?;
                writeln!(out, "{}", summary)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}
