//! # News Digest
//!
//! Finds news articles about a company or topic, follows their tracking
//! links to the publisher, extracts the article body and metadata,
//! summarizes it, scores its sentiment, and reports the batch as text and
//! optionally as a JSON file.
//!
//! ## Usage
//!
//! ```sh
//! news_digest "Tata Motors" --max-items 5 --save
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: Query a news search feed for candidate articles
//!    (skipped when URLs are given directly)
//! 2. **Resolving**: Follow each indirection link to its final page
//! 3. **Fetching**: Download the page
//! 4. **Extracting**: Pull out body text and metadata
//! 5. **Summarizing**: Summarize, score sentiment, pick keywords
//! 6. **Output**: Print the batch report and optionally persist it as JSON

use clap::Parser;
use std::error::Error;
use std::io::IsTerminal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod backoff;
mod cli;
mod config;
mod discovery;
mod errors;
mod extractor;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod resolver;
mod summarizer;
mod utils;

use cli::{Cli, Prompter};
use config::Config;
use discovery::Discovery;
use errors::SetupError;
use fetcher::{Fetcher, build_client};
use outputs::{json, report};
use pipeline::{Pipeline, WorkItem};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_digest starting up");

    // Parse CLI and layer it over the config file
    let args = Cli::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    debug!(
        backend = ?config.backend.kind,
        length = ?config.summarize.length,
        concurrency = config.concurrency(),
        delay_ms = config.pipeline.delay_ms,
        "Effective configuration"
    );

    let prompter = Prompter::new(!args.no_prompt && std::io::stdin().is_terminal());

    // Early check: if saving is already decided, the target must be writable
    if args.save_decided() {
        let dir = match args.output.as_deref().and_then(|p| p.parent()) {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            Some(_) => std::path::PathBuf::from("."),
            None => args.output_dir.clone(),
        };
        ensure_writable_dir(&dir).await?;
    }

    // ---- Decide what to process ----
    let (identifier, items) = if !args.urls.is_empty() {
        let identifier = args.query.clone().unwrap_or_default();
        let items: Vec<WorkItem> = args.urls.iter().map(WorkItem::from_url).collect();
        info!(count = items.len(), "Processing URLs given on the command line");
        (identifier, items)
    } else {
        let query = prompter.query(args.query.as_deref())?;
        if query.is_empty() {
            return Err(SetupError::Invalid("a search query or at least one --url is required".into()).into());
        }

        let max_items = prompter.max_items(args.max_items)?;

        let fetcher = Fetcher::new(build_client(config.resolve.max_hops)?, config.fetch.timeout());
        let hits = Discovery::new(fetcher, config.discovery.clone())
            .search(&query, max_items)
            .await?;
        if hits.is_empty() {
            warn!(%query, "Search returned no articles");
            println!("No articles found for \"{query}\".");
            return Ok(());
        }
        (query, hits.into_iter().map(WorkItem::from).collect())
    };

    // ---- Cancellation on Ctrl-C ----
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current item and stopping");
            ctrl_c_token.cancel();
        }
    });

    // ---- Run ----
    let pipeline = Pipeline::from_config(&config, cancel)?;
    let batch = pipeline.run(&identifier, items).await;
    println!("{}", report::render(&batch));

    // ---- Output ----
    let save = prompter.confirm_save(args.save_decided())?;

    if save {
        let path = json::output_path(args.output.as_deref(), &args.output_dir, &identifier);
        json::write_report(&batch, &path).await?;
        println!("Report saved to: {}", path.display());
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        succeeded = batch.succeeded_count,
        failed = batch.failed_count(),
        "Execution complete"
    );

    Ok(())
}
