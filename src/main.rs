use anyhow::Context;
use clap::Parser;
use warehouse_ingest::utils::{logger, validation::Validate};
use warehouse_ingest::{
    ApiFetcher, CliConfig, IngestEngine, IngestReport, LoadOutcome, MemoryWarehouse, Namespace,
    SnowflakeWarehouse,
};

const DRY_RUN_DATABASE: &str = "DRY_RUN";
const DRY_RUN_SCHEMA: &str = "PUBLIC";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 可選，不存在時直接使用行程環境變數
    dotenvy::dotenv().ok();

    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting warehouse-ingest");
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let sources = config
        .dataset_sources()
        .context("failed to resolve the dataset list")?;
    let fetcher = ApiFetcher::new(sources);

    let outcome = if config.dry_run {
        let namespace = Namespace::new(
            config.snowflake.database.as_deref().unwrap_or(DRY_RUN_DATABASE),
            config.snowflake.schema.as_deref().unwrap_or(DRY_RUN_SCHEMA),
        )
        .context("invalid dry-run namespace")?;

        tracing::info!("DRY RUN MODE - loading into an in-memory warehouse");
        let engine = IngestEngine::new(fetcher, MemoryWarehouse::new(namespace));
        let outcome = engine.run().await;
        let state = engine.warehouse().snapshot();
        for statement in &state.statements {
            tracing::debug!("Planned: {}", statement);
        }
        println!("🔍 Dry run planned {} statements", state.statements.len());
        outcome
    } else {
        IngestEngine::new(fetcher, SnowflakeWarehouse::new(config.snowflake.clone()))
            .run()
            .await
    };

    match outcome {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "Ingestion failed: {} (Category: {:?})",
                e,
                e.category()
            );
            tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }
}

fn print_report(report: &IngestReport) {
    for dataset in &report.datasets {
        match dataset.outcome {
            LoadOutcome::Loaded { rows } => {
                println!("✅ {} → {}: {} rows", dataset.dataset, dataset.table, rows)
            }
            LoadOutcome::Skipped => {
                println!("⏭️  {} → {}: no data, skipped", dataset.dataset, dataset.table)
            }
        }
    }
    println!("📦 {} rows loaded in total", report.rows_loaded());
}
