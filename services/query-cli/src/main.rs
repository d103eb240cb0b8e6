//! Point Query CLI
//!
//! Runs lookup and transform queries against the datasets of a registry file
//! and prints the results as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use point_query::{PointQueryConfig, PointQueryError};
use query_cli::{build_engine, lookup_json, read_points_file, transform_json};
use volume_common::DatasetRegistry;

/// Point Query CLI
#[derive(Parser, Debug)]
#[command(name = "query-cli")]
#[command(about = "Batched point lookups and displacement transforms on chunked volumes")]
struct Args {
    /// Dataset registry file
    #[arg(long, default_value = "config/datasets.yaml", env = "POINT_QUERY_REGISTRY")]
    registry: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "POINT_QUERY_LOG_JSON")]
    json_logs: bool,

    /// Number of tokio worker threads
    #[arg(long, env = "POINT_QUERY_RUNTIME_THREADS")]
    worker_threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List datasets with their scales, voxel size and description
    Info,

    /// Value of a dataset at each point
    Lookup {
        #[arg(long)]
        dataset: String,

        #[arg(long, default_value_t = 0)]
        scale: u32,

        /// JSON points file
        #[arg(long)]
        points: PathBuf,
    },

    /// Move each point by a dataset's displacement field
    Transform {
        #[arg(long)]
        dataset: String,

        #[arg(long, default_value_t = 0)]
        scale: u32,

        /// JSON points file
        #[arg(long)]
        points: PathBuf,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }
    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    let result = runtime.block_on(run(args));
    if let Err(e) = &result {
        if let Some(query_error) = e.downcast_ref::<PointQueryError>() {
            tracing::error!(
                status = query_error.http_status_code(),
                client_error = query_error.is_client_error(),
                "Query failed: {}",
                query_error
            );
        }
    }
    result
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: Args) -> Result<()> {
    let registry = Arc::new(
        DatasetRegistry::load_from_file(&args.registry)
            .with_context(|| format!("Failed to load registry: {}", args.registry.display()))?,
    );

    let output = match args.command {
        Command::Info => serde_json::to_value(registry.summaries())?,

        Command::Lookup {
            dataset,
            scale,
            points,
        } => {
            let points = read_points_file(&points)?;
            let engine = build_engine(PointQueryConfig::from_env(), registry)?;
            info!(dataset = %dataset, scale = scale, points = points.len(), "Running lookup");

            let result =
                tokio::task::spawn_blocking(move || engine.lookup(&dataset, scale, &points))
                    .await??;
            lookup_json(&result)
        }

        Command::Transform {
            dataset,
            scale,
            points,
        } => {
            let points = read_points_file(&points)?;
            let engine = build_engine(PointQueryConfig::from_env(), registry)?;
            info!(dataset = %dataset, scale = scale, points = points.len(), "Running transform");

            let result =
                tokio::task::spawn_blocking(move || engine.transform(&dataset, scale, &points))
                    .await??;
            transform_json(&result)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
