use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use carbon_core::{build_estimation_prompt, Gazetteer, Item, RecalculationRequest};
use carbon_estimator::{
    FootprintEstimator, GeminiConfig, GeminiProvider, DEFAULT_GEMINI_ENDPOINT,
};
use carbon_observability::{init_tracing, AppMetrics};
use carbon_service::RecalculationService;
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "carboncart")]
#[command(about = "CarbonCart basket footprint recalculation")]
struct Cli {
    /// JSON file of extra pincodes, merged over the built-in table.
    #[arg(long, env = "CARBON_GAZETTEER_PATH")]
    gazetteer: Option<PathBuf>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "CARBON_GEMINI_ENDPOINT", default_value = DEFAULT_GEMINI_ENDPOINT)]
    gemini_endpoint: String,

    #[arg(long, env = "CARBON_ESTIMATOR_TIMEOUT_SECONDS", default_value_t = 10)]
    timeout_seconds: u64,

    #[arg(long, env = "CARBON_ESTIMATOR_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recalculate footprints for a basket file.
    Recalculate {
        #[arg(long)]
        pincode: Option<String>,
        /// JSON array of items, or a full `{pincode, items}` request.
        #[arg(long)]
        items: PathBuf,
    },
    /// Distance in km between two known pincodes.
    Distance { from: String, to: String },
    /// List the gazetteer.
    Pincodes,
    /// Print the estimator prompt for one item.
    Prompt {
        #[arg(long)]
        items: PathBuf,
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        pincode: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("carboncart");
    let cli = Cli::parse();

    let service = build_service(&cli)?;

    match cli.command {
        Command::Recalculate { pincode, items } => {
            let request = load_request(&items, pincode)?;
            let response = service.recalculate(request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Distance { from, to } => {
            let Some(km) = service.distance_between(&from, &to) else {
                bail!("unknown pincode: {} or {} is not in the gazetteer", from, to);
            };
            println!("{km}");
        }
        Command::Pincodes => {
            println!(
                "{}",
                serde_json::to_string_pretty(&service.gazetteer().entries())?
            );
        }
        Command::Prompt {
            items,
            index,
            pincode,
        } => {
            let request = load_request(&items, pincode)?;
            let item = request
                .items
                .get(index)
                .with_context(|| format!("no item at index {index}"))?;
            let distance_km = item
                .resolved_pincode()
                .and_then(|code| service.distance_between(&request.pincode, code));
            println!("{}", build_estimation_prompt(item, distance_km));
        }
    }

    Ok(())
}

fn build_service(cli: &Cli) -> Result<RecalculationService<GeminiProvider>> {
    let mut gazetteer = Gazetteer::builtin();
    if let Some(path) = cli.gazetteer.as_ref() {
        let overrides = Gazetteer::from_json_file(path)
            .with_context(|| format!("failed loading gazetteer from {}", path.display()))?;
        gazetteer = gazetteer.extended_with(overrides);
    }

    let provider = cli
        .gemini_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            GeminiProvider::new(
                GeminiConfig::new(key)
                    .with_endpoint(cli.gemini_endpoint.clone())
                    .with_timeout(Duration::from_secs(cli.timeout_seconds.max(1))),
            )
        })
        .transpose()
        .context("invalid estimator configuration")?;

    Ok(RecalculationService::new(
        Arc::new(gazetteer),
        FootprintEstimator::new(provider),
        AppMetrics::shared(),
    )
    .with_concurrency(cli.concurrency))
}

fn load_request(path: &Path, pincode: Option<String>) -> Result<RecalculationRequest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    parse_request(&raw, pincode)
}

fn parse_request(raw: &str, pincode: Option<String>) -> Result<RecalculationRequest> {
    let value: Value = serde_json::from_str(raw).context("basket file is not valid JSON")?;
    let request = match value {
        Value::Array(items) => RecalculationRequest::new(
            String::new(),
            items.into_iter().map(Item::from_value).collect(),
        ),
        Value::Object(_) => RecalculationRequest::from(value),
        _ => bail!("basket file must hold an array of items or a request object"),
    };

    Ok(match pincode {
        Some(pincode) => RecalculationRequest::new(pincode, request.items),
        None => request,
    })
}
