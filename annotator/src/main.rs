use annotator::{responses_path, source_options, ChatClient, ModelParams, DEFAULT_API_BASE};
use anyhow::{Context, Result};
use clap::Parser;
use dreamcore::prompt::{PromptTemplate, Task};
use dreamcore::source::{load_items, sample, DatasetKind};
use dreamcore::{Driver, JsonFileStore, RetryPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "annotator")]
#[command(about = "Annotate dream reports with a chat-completion model, resuming from saved responses")]
struct Cli {
    /// Dataset export: a csv/tsv/json/jsonl file or a directory of them
    #[arg(long)]
    input: PathBuf,
    /// Dataset kind (dreamviews, sddb, flying, generic)
    #[arg(short, long)]
    dataset: DatasetKind,
    /// Annotation task (isdream, islucid, annotate, thematicD, thematicM, thematicT)
    #[arg(short, long)]
    task: Task,
    /// Directory holding prompt-system_task-<task>.txt and prompt-user_task-<task>.txt
    #[arg(long, default_value = ".")]
    prompts_dir: PathBuf,
    /// Directory for the responses file
    #[arg(long, default_value = "../derivatives")]
    output_dir: PathBuf,
    /// Explicit responses file, overrides --output-dir naming
    #[arg(long)]
    output: Option<PathBuf>,
    /// Start from scratch instead of resuming an existing responses file
    #[arg(short, long, default_value_t = false)]
    overwrite: bool,
    /// Only annotate a fixed sample of the reports
    #[arg(long, default_value_t = false)]
    test: bool,
    /// Sample size used with --test
    #[arg(long, default_value_t = 100)]
    test_size: usize,
    /// Seed for the --test sample
    #[arg(long, default_value_t = 32)]
    seed: u64,
    /// Flying dataset: annotate comments as well as dream reports
    #[arg(long, default_value_t = false)]
    include_comments: bool,
    /// Override the id column of the dataset
    #[arg(long)]
    id_column: Option<String>,
    /// Override the text column of the dataset
    #[arg(long)]
    text_column: Option<String>,
    #[arg(long, default_value = "gpt-4")]
    model: String,
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,
    /// Wait between rate-limited attempts, milliseconds
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,
    /// Give up on an item after this many rate-limited attempts (default: never)
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Request timeout seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;

    let opts = source_options(
        args.dataset,
        args.id_column.as_deref(),
        args.text_column.as_deref(),
        args.include_comments,
    );
    let mut items = load_items(&args.input, &opts)?;
    if args.test {
        items = sample(items, args.test_size, args.seed);
    }

    let prompt = PromptTemplate::load(&args.prompts_dir, args.task)?;
    let store_path = args
        .output
        .clone()
        .unwrap_or_else(|| responses_path(&args.output_dir, args.dataset.as_str(), args.task));
    tracing::info!(
        dataset = %args.dataset,
        task = %args.task,
        items = items.len(),
        store = %store_path.display(),
        overwrite = args.overwrite,
        "annotator configured"
    );

    let params = ModelParams {
        model: args.model.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        ..ModelParams::default()
    };
    let mut client = ChatClient::new(&args.api_base, api_key, params, prompt, Duration::from_secs(args.timeout_secs))?;
    let policy = RetryPolicy::fixed(Duration::from_millis(args.backoff_ms)).with_max_attempts(args.max_attempts);
    let mut store = JsonFileStore::new(&store_path);

    match Driver::new(policy).overwrite(args.overwrite).run(&items, &mut store, &mut client) {
        Ok(summary) => {
            tracing::info!(
                results = summary.results.len(),
                requested = summary.stats.requested,
                skipped = summary.stats.skipped,
                store = %store_path.display(),
                "done"
            );
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                saved = err.results.len(),
                store = %store_path.display(),
                "run aborted; rerun without --overwrite to resume"
            );
            Err(err.into())
        }
    }
}
