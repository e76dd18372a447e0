//! Run a batch of prompts against one answer engine and print the results.
//!
//! Credentials and endpoints come from the environment (a `.env` file is
//! loaded if present). Results are written to stdout as JSON; logs go to
//! stderr.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use answer_engine::{BatchOrchestrator, EngineConfig, Locale, ReconciledResponse, SharedParams};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "answer-run")]
#[command(about = "Submit prompts to an answer engine and print attributed answers")]
struct Cli {
    /// Model to run, e.g. chatgpt, perplexity, gemini, linkup
    #[arg(short, long, env = "ANSWER_MODEL", default_value = "chatgpt")]
    model: String,

    /// Country code answers are localized to
    #[arg(short, long, default_value = "US")]
    country: String,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    city: Option<String>,

    /// Ask for answers without live web search
    #[arg(long)]
    no_web_search: bool,

    /// File with one prompt per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// List configured models and exit
    #[arg(long)]
    list_models: bool,

    /// Prompts to run, after any read from --file
    prompts: Vec<String>,
}

impl Cli {
    fn params(&self) -> SharedParams {
        let mut locale = Locale::country(self.country.as_str());
        if let Some(region) = &self.region {
            locale = locale.with_region(region.as_str());
        }
        if let Some(city) = &self.city {
            locale = locale.with_city(city.as_str());
        }
        SharedParams::new(locale).with_web_search(!self.no_web_search)
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    model: &'a str,
    locale: String,
    responses: &'a [ReconciledResponse],
    total_cost: f64,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "answer_engine=info,answer_run=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::from_env().context("Failed to load configuration")?;
    let orchestrator =
        BatchOrchestrator::from_config(&config).context("Failed to build orchestrator")?;

    if cli.list_models {
        for model in orchestrator.registry().models() {
            println!("{model}");
        }
        return Ok(());
    }

    let prompts = load_prompts(cli.file.as_deref(), &cli.prompts)?;
    if prompts.is_empty() {
        bail!("no prompts given; pass them as arguments or with --file");
    }
    let params = cli.params();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_signal.cancel();
        }
    });

    info!(model = %cli.model, locale = %params.locale, prompts = prompts.len(), "Starting run");
    let responses = orchestrator
        .run_batch(&cli.model, &prompts, &params, &cancel)
        .await
        .with_context(|| format!("Run against {} failed", cli.model))?;

    let output = RunOutput {
        model: &cli.model,
        locale: params.locale.to_string(),
        responses: &responses,
        total_cost: responses.iter().map(|r| r.cost).sum(),
        failed: responses.iter().filter(|r| !r.succeeded).count(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize results")?
    );

    Ok(())
}

/// Prompts from `file` (one per line) followed by `inline`.
fn load_prompts(file: Option<&Path>, inline: &[String]) -> Result<Vec<String>> {
    let mut prompts = match file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompts from {}", path.display()))?;
            prompt_lines(&contents)
        }
        None => Vec::new(),
    };
    prompts.extend(
        inline
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    );
    Ok(prompts)
}

fn prompt_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lines_skip_blanks() {
        let prompts = prompt_lines("best crm?\n\n   \n  best ats for startups?  \r\n");
        assert_eq!(prompts, vec!["best crm?", "best ats for startups?"]);
    }

    #[test]
    fn test_inline_prompts_follow_file_prompts() {
        let path = std::env::temp_dir().join(format!("answer-run-prompts-{}.txt", std::process::id()));
        std::fs::write(&path, "from file\n").unwrap();

        let prompts = load_prompts(Some(&path), &["inline".to_string(), " ".to_string()]).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(prompts, vec!["from file", "inline"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_prompts(Some(Path::new("/nonexistent/prompts.txt")), &[]).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/prompts.txt"));
    }

    #[test]
    fn test_params_from_flags() {
        let cli = Cli::parse_from([
            "answer-run", "--country", "GB", "--city", "London", "--no-web-search", "best crm?",
        ]);
        let params = cli.params();
        assert_eq!(params.locale, Locale::country("GB").with_city("London"));
        assert!(!params.web_search);
        assert_eq!(cli.prompts, vec!["best crm?"]);
    }
}
