use anyhow::Result;
use clap::{Parser, Subcommand};
use dreamcore::extract::ChoiceMode;
use dreamcore::source::{DatasetKind, SourceOptions};
use exporter::{create_output, export_choices, export_lucidity, load_existing, status_report};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "exporter")]
#[command(about = "Inspect annotation responses and flatten them into tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report how many items have responses and how many remain
    Status {
        /// Responses file
        #[arg(long)]
        store: PathBuf,
        /// Dataset export to compare against
        #[arg(long, requires = "dataset")]
        input: Option<PathBuf>,
        /// Dataset kind of --input (dreamviews, sddb, flying, generic)
        #[arg(short, long)]
        dataset: Option<DatasetKind>,
        /// Flying dataset: count comments as well as dream reports
        #[arg(long, default_value_t = false)]
        include_comments: bool,
    },
    /// Write the completion text of every response as CSV (id,choice,content)
    Choices {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// One row per completion choice instead of the first choice only
        #[arg(long, default_value_t = false)]
        all_choices: bool,
    },
    /// Write lucid / non-lucid labels from islucid responses as CSV (id,lucidity),
    /// one row per completion choice
    Lucidity {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Only label the first completion choice of each response
        #[arg(long, default_value_t = false)]
        first_choice: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Status { store, input, dataset, include_comments } => {
            let opts = dataset.map(|kind| {
                let mut opts = SourceOptions::for_kind(kind);
                if include_comments { opts.dreams_only = false; }
                opts
            });
            let input = input.as_deref().zip(opts.as_ref());
            println!("{}", status_report(&store, input)?);
        }
        Commands::Choices { store, output, all_choices } => {
            let results = load_existing(&store)?;
            let mode = if all_choices { ChoiceMode::All } else { ChoiceMode::First };
            let rows = export_choices(&results, create_output(&output)?, mode)?;
            tracing::info!(responses = results.len(), rows, output = %output.display(), "wrote choices");
        }
        Commands::Lucidity { store, output, first_choice } => {
            let results = load_existing(&store)?;
            let mode = if first_choice { ChoiceMode::First } else { ChoiceMode::All };
            let rows = export_lucidity(&results, create_output(&output)?, mode)?;
            tracing::info!(responses = results.len(), rows, output = %output.display(), "wrote lucidity labels");
        }
    }
    Ok(())
}
