//! CLI for Memory Merge - AI photo merging.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use memory_merge::{
    Config, MergeOutcome, MergeProvider, MergeSession, Retrying, Slot, View, DEFAULT_PROMPT,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memory-merge")]
#[command(about = "Merge a childhood photo and a current photo into one Polaroid via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two photos into one image
    Merge(MergeArgs),

    /// Print the default prompt
    Prompt,

    /// Check that the provider is reachable and the API key works
    Check,
}

#[derive(Args)]
struct MergeArgs {
    /// The earlier photo (e.g. you as a child)
    #[arg(long)]
    before: PathBuf,

    /// The recent photo
    #[arg(long)]
    after: PathBuf,

    /// Prompt text (defaults to the Polaroid prompt)
    #[arg(short, long, conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the prompt from a file
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Directory to save ai-memory.png in
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Gemini model (flash, pro, or a full model id)
    #[arg(short, long)]
    model: Option<String>,

    /// Retries on transient provider errors
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Merge(args) => merge(args, config, cli.json).await,
        Commands::Prompt => {
            print_prompt(cli.json)?;
            Ok(())
        }
        Commands::Check => check(config, cli.json).await,
    }
}

async fn merge(args: MergeArgs, mut config: Config, json_output: bool) -> anyhow::Result<()> {
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    let provider = config.gemini_provider()?;
    let http = provider.http_client().clone();
    let session = MergeSession::new(Retrying::new(provider, args.retries))
        .with_intake(config.intake())
        .with_http_client(http);

    for (slot, path) in [(Slot::Before, &args.before), (Slot::After, &args.after)] {
        session
            .select_image(slot, path)
            .await
            .with_context(|| format!("loading {slot} photo"))?;
    }

    if let Some(text) = args.prompt {
        session.set_prompt(text).await;
    } else if let Some(path) = args.prompt_file {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading prompt file {}", path.display()))?;
        session.set_prompt(text).await;
    }

    let progress = tokio::spawn(report_progress(session.clone(), json_output));
    let outcome = session.attempt_merge().await;
    progress.abort();

    let saved = match &outcome {
        MergeOutcome::Completed(_) => session.download(&config.output_dir).await?,
        _ => None,
    };
    let view = session.view();

    if json_output {
        let result = serde_json::json!({
            "success": matches!(outcome, MergeOutcome::Completed(_)),
            "view": view.label(),
            "status": session.status(),
            "output": saved.as_ref().map(|p| p.display().to_string()),
            "model": config.model,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{view}");
        if let Some(path) = &saved {
            println!("Saved: {}", path.display());
        }
    }

    match view {
        View::Failure { message } => anyhow::bail!(message),
        _ => Ok(()),
    }
}

/// Prints the loading view once the request is in flight.
async fn report_progress(session: MergeSession, json_output: bool) {
    let mut rx = session.subscribe();
    if rx.wait_for(|s| s.is_loading).await.is_ok() && !json_output {
        eprintln!("{}", View::Loading);
    }
}

async fn check(config: Config, json_output: bool) -> anyhow::Result<()> {
    let provider = config.gemini_provider()?;
    let result = provider.health_check().await;

    if json_output {
        let report = serde_json::json!({
            "provider": provider.name(),
            "model": provider.model().as_str(),
            "ok": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &result {
            Ok(()) => println!("✓ {} ({}) is reachable", provider.name(), provider.model()),
            Err(e) => println!("✗ {} ({}): {e}", provider.name(), provider.model()),
        }
    }

    result.map_err(Into::into)
}

fn print_prompt(json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "prompt": DEFAULT_PROMPT }))?
        );
    } else {
        println!("{DEFAULT_PROMPT}");
    }
    Ok(())
}
