//! Chunkquery CLI
//!
//! Runs the compliance harness against the in-memory backend, loads the
//! generated chunks into a chunk store and queries them back through the
//! querier.

use anyhow::Context;
use chunkquery::chunk::{now, HOUR};
use chunkquery::config::{generate_default_config, Config};
use chunkquery::querier::{
    ChunkStoreQueryable, MatchType, Matcher, MemoryChunkStore, Querier, Queryable,
    RequestContext, SelectParams,
};
use chunkquery::series::MergeIteratorStrategy;
use chunkquery::testutils::{create_chunks, run_with_fixture, setup, MemoryFixture, USER_ID};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "chunkquery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query synthetic time-series chunks through the chunk-store querier")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of chunk batches to generate
    #[arg(short, long, default_value = "2")]
    batches: usize,

    /// Chunks per batch
    #[arg(short = 's', long, default_value = "5")]
    batch_size: usize,

    /// Regex on the `index` label
    #[arg(short, long)]
    index: Option<String>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    chunkquery::logging::init(&config.logging)?;

    tracing::info!("Chunkquery v{}", env!("CARGO_PKG_VERSION"));

    let end = now();
    let start = end - config.querier.query_window_hours as i64 * HOUR;

    // Generate and persist chunks through the harness
    let fixture = MemoryFixture::new("inmemory");
    let chunks = run_with_fixture(&fixture, || async {
        let (_index, chunk_client) = setup(&fixture, "chunkquery_cli").await?;

        let mut all = Vec::new();
        for batch in 0..cli.batches {
            let (keys, chunks) = create_chunks(batch, cli.batch_size, end);
            chunk_client.put_chunks(&chunks).await?;
            all.extend(chunk_client.get_chunks(&keys).await?);
        }
        Ok(all)
    })
    .await
    .context("harness run failed")?;

    tracing::info!(chunks = chunks.len(), "Generated chunks");

    let store = Arc::new(MemoryChunkStore::new());
    store.put(chunks).await;

    let queryable = ChunkStoreQueryable::new(store, Arc::new(MergeIteratorStrategy));
    let tenant = config.querier.tenant.as_deref().unwrap_or(USER_ID);
    let ctx = RequestContext::with_tenant(tenant)
        .timeout(Duration::from_secs(config.querier.query_timeout_secs));
    let querier = queryable.querier(ctx, start, end)?;

    let mut matchers = vec![Matcher::equal("__name__", "foo")];
    if let Some(re) = &cli.index {
        matchers.push(Matcher::new(MatchType::Regex, "index", re.as_str())?);
    }

    let (series, warnings) = querier
        .select(&SelectParams::new(start, end), &matchers)
        .await?;
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    for s in &series {
        let samples: Vec<String> = s
            .iterator()
            .map(|sample| format!("{}@{}", sample.value, sample.timestamp))
            .collect();
        println!("{} [{} chunks] {}", s.labels(), s.chunks().len(), samples.join(" "));
    }
    println!("{} series", series.len());

    querier.close()?;
    Ok(())
}
