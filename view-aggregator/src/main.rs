//! View Aggregator Main Entry Point
//!
//! Command line entry point for composing, resyncing and repairing the
//! denormalized view indices.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde::Serialize;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use view_aggregator::{
    catalog, ComposeSummary, Dependencies, Pipeline, PipelineError, ViewDefinition, ViewRegistry,
};

#[derive(Parser)]
#[command(name = "view-aggregator")]
#[command(about = "Keep denormalized view indices in sync with their sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild one view, or every materialized view
    Repair {
        #[arg(long)]
        view: Option<String>,
    },
    /// Compose and write view documents for source ids
    Compose {
        #[arg(long)]
        view: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Refresh view documents after related documents changed
    Resync {
        #[arg(long)]
        view: String,
        /// Target key of the aggregator reading the changed entity
        #[arg(long)]
        relation: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Propagate a change of entity documents to every affected view
    Changed {
        #[arg(long)]
        entity: String,
        /// Treat the documents as deleted
        #[arg(long)]
        removed: bool,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print composed view documents without writing them
    Preview {
        #[arg(long)]
        view: String,
        ids: Vec<String>,
    },
    /// List the known views
    Views,
}

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), PipelineError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("view_aggregator=info,view_aggregator_repository=info")
    });

    let json_logs = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| PipelineError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "view-aggregator",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .pretty(),
            )
            .try_init()
            .map_err(|e| PipelineError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "view-aggregator",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

/// Print a result as JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<(), PipelineError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::config(format!("Failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

fn ensure_complete(summary: &ComposeSummary) -> Result<(), PipelineError> {
    if summary.failed > 0 {
        return Err(PipelineError::incomplete(format!(
            "{} of {} documents of {} were not written",
            summary.failed, summary.total, summary.view
        )));
    }
    Ok(())
}

fn print_views(registry: &ViewRegistry) -> Result<(), PipelineError> {
    let views: Vec<&ViewDefinition> = registry.iter().map(|v| v.as_ref()).collect();
    print_json(&views)
}

async fn run(pipeline: &Pipeline, command: Commands) -> Result<(), PipelineError> {
    match command {
        Commands::Repair { view: Some(view) } => {
            let summary = pipeline.repair_view(&view).await?;
            print_json(&summary)?;
            if summary.failed > 0 {
                return Err(PipelineError::incomplete(format!(
                    "{} documents of {} were not written",
                    summary.failed, summary.view
                )));
            }
        }
        Commands::Repair { view: None } => {
            let report = pipeline.run_all_repair().await;
            print_json(&report)?;
            let unclean = report.unclean_views();
            if !unclean.is_empty() {
                return Err(PipelineError::incomplete(format!(
                    "views not fully repaired: {}",
                    unclean.join(", ")
                )));
            }
        }
        Commands::Compose { view, ids } => {
            let summary = pipeline.compose_view(&view, ids).await?;
            print_json(&summary)?;
            ensure_complete(&summary)?;
        }
        Commands::Resync {
            view,
            relation,
            ids,
        } => {
            let summary = pipeline.resync_relation(&view, &relation, ids).await?;
            print_json(&summary)?;
            ensure_complete(&summary)?;
        }
        Commands::Changed {
            entity,
            removed,
            ids,
        } => {
            let report = if removed {
                pipeline.entity_removed(&entity, ids).await
            } else {
                pipeline.entity_changed(&entity, ids).await
            };
            print_json(&report)?;
            if report.has_failures() {
                return Err(PipelineError::incomplete(format!(
                    "change of {} was not fully applied",
                    entity
                )));
            }
        }
        Commands::Preview { view, ids } => {
            let documents = if ids.is_empty() {
                pipeline.preview_all(&view, None).await?
            } else {
                pipeline.preview(&view, ids).await?
            };
            print_json(&documents)?;
        }
        Commands::Views => print_views(pipeline.registry())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    init_tracing()?;

    // Listing the catalog needs no connection
    if let Commands::Views = cli.command {
        return print_views(&catalog::default_views()?);
    }

    info!("Starting view aggregator");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match run(&deps.pipeline, cli.command).await {
        Ok(()) => {
            info!("View aggregator completed successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "View aggregator failed");
            Err(e)
        }
    }
}
