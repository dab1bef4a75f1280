use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::Instrument;

use gcp_price_sync::aggregator::{build_category_price_sets, build_component_price_sets};
use gcp_price_sync::catalog::{download_catalog, FixtureCatalogSource, RestCatalogSource};
use gcp_price_sync::client::{ApiClient, RetryPolicy};
use gcp_price_sync::config::{get_config, Config};
use gcp_price_sync::logging;
use gcp_price_sync::plans::{derive_plan_drafts, filter_gcp_plans, group_by_family};
use gcp_price_sync::pricing::{bucket_counts, build_price_records};
use gcp_price_sync::report::{self, ReportManager};
use gcp_price_sync::snapshot;
use gcp_price_sync::sync::Synchronizer;

#[derive(Parser)]
#[command(name = "gcp-price-sync")]
#[command(about = "Sync the GCP billing catalog into Morpheus prices, price sets and service plans")]
#[command(version)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the regional SKU catalog and write a snapshot
    DiscoverSkus {
        /// Region to filter SKUs against (defaults to the configured region)
        #[arg(long)]
        region: Option<String>,
        /// Snapshot file to write
        #[arg(long, default_value = "gcp_skus.json")]
        output: PathBuf,
        /// Re-filter an existing snapshot instead of calling the live API
        #[arg(long)]
        from_snapshot: Option<PathBuf>,
    },
    /// Discover GCP service plans on the target system
    DiscoverPlans {
        /// Snapshot file to write
        #[arg(long, default_value = "service_plans.json")]
        output: PathBuf,
    },
    /// Create prices and price sets from a catalog snapshot
    Sync {
        /// Catalog snapshot produced by discover-skus
        #[arg(long)]
        catalog: PathBuf,
        /// Compute and report without writing to the target system
        #[arg(long)]
        dry_run: bool,
        /// Skip the price stage
        #[arg(long)]
        skip_prices: bool,
        /// Skip the price-set stage
        #[arg(long)]
        skip_price_sets: bool,
        /// Also create service plans derived from compute SKUs
        #[arg(long)]
        create_service_plans: bool,
        /// Attach component price sets to discovered plans
        #[arg(long)]
        map_plans: bool,
    },
    /// Compare target-system contents against a catalog snapshot
    Validate {
        #[arg(long)]
        catalog: PathBuf,
    },
    /// Render CSV review tables from snapshots
    Render {
        #[arg(long)]
        catalog: PathBuf,
        /// Optional plan snapshot from discover-plans
        #[arg(long)]
        plans: Option<PathBuf>,
        /// Directory the tables are written into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        env::set_var("LOG_LEVEL", "DEBUG");
    }

    let _guard = logging::init_logging();
    let json = cli.json;

    let span = tracing::info_span!("run", run_id = %logging::run_id());
    match run(cli).instrument(span).await {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = get_config();
    let reporter = ReportManager::new(cli.json);

    match cli.command {
        Commands::DiscoverSkus {
            region,
            output,
            from_snapshot,
        } => discover_skus(config, &reporter, region, output, from_snapshot).await,
        Commands::DiscoverPlans { output } => discover_plans(config, &reporter, output).await,
        Commands::Sync {
            catalog,
            dry_run,
            skip_prices,
            skip_price_sets,
            create_service_plans,
            map_plans,
        } => {
            sync_catalog(
                config,
                &reporter,
                catalog,
                SyncFlags {
                    dry_run,
                    skip_prices,
                    skip_price_sets,
                    create_service_plans,
                    map_plans,
                },
            )
            .await
        }
        Commands::Validate { catalog } => validate(config, &reporter, catalog).await,
        Commands::Render {
            catalog,
            plans,
            out_dir,
        } => render(catalog, plans, out_dir),
    }
}

struct SyncFlags {
    dry_run: bool,
    skip_prices: bool,
    skip_price_sets: bool,
    create_service_plans: bool,
    map_plans: bool,
}

async fn discover_skus(
    config: &Config,
    reporter: &ReportManager,
    region: Option<String>,
    output: PathBuf,
    from_snapshot: Option<PathBuf>,
) -> Result<()> {
    let region = region.unwrap_or_else(|| config.gcp.region.clone());
    let downloaded_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    let catalog = match from_snapshot {
        Some(path) => {
            let source = FixtureCatalogSource::from_file(&path)?;
            download_catalog(&source, &region, &config.gcp.services, downloaded_at).await?
        }
        None => {
            let client = billing_client(config)?;
            let source = RestCatalogSource::new(client).with_currency(&config.gcp.currency);
            download_catalog(&source, &region, &config.gcp.services, downloaded_at).await?
        }
    };

    if catalog.metadata.total_skus == 0 {
        bail!("no SKUs matched region {region}; nothing to write");
    }

    snapshot::save_json(&catalog, &output)?;
    let records = build_price_records(&catalog, &config.target.prefix);
    reporter.catalog_summary(&catalog, &bucket_counts(&records));
    Ok(())
}

async fn discover_plans(config: &Config, reporter: &ReportManager, output: PathBuf) -> Result<()> {
    let client = target_client(config)?;
    let synchronizer = Synchronizer::new(&client, &config.target.prefix);

    let all_plans = synchronizer.fetch_service_plans().await?;
    let gcp_plans = filter_gcp_plans(&all_plans);
    snapshot::save_json(&gcp_plans, &output)?;
    reporter.plans_summary(&group_by_family(&gcp_plans));
    Ok(())
}

async fn sync_catalog(
    config: &Config,
    reporter: &ReportManager,
    catalog_path: PathBuf,
    flags: SyncFlags,
) -> Result<()> {
    let catalog = snapshot::load_catalog(&catalog_path)?;
    let records = build_price_records(&catalog, &config.target.prefix);
    let category_sets = build_category_price_sets(&records, &config.target.prefix);
    reporter.catalog_summary(&catalog, &bucket_counts(&records));

    if flags.dry_run {
        reporter.dry_run_summary(
            records.len(),
            category_sets.len(),
            report::component_group_count(&records),
        );
        return Ok(());
    }

    let client = target_client(config)?;
    let synchronizer = Synchronizer::new(&client, &config.target.prefix);

    if !flags.skip_prices {
        let outcome = synchronizer.sync_prices(&records).await?;
        reporter.stage_summary("prices", &outcome);
    }

    if !flags.skip_price_sets {
        let price_ids = synchronizer.fetch_price_ids().await?;
        let mut sets = category_sets;
        sets.extend(build_component_price_sets(&records, &price_ids, &config.target.prefix));
        let outcome = synchronizer.sync_price_sets(&sets, &price_ids).await?;
        reporter.stage_summary("price-sets", &outcome);
    }

    if flags.create_service_plans {
        let drafts = derive_plan_drafts(&catalog, &catalog.metadata.region);
        let outcome = synchronizer.sync_service_plans(&drafts).await?;
        reporter.stage_summary("service-plans", &outcome);
    }

    if flags.map_plans {
        let plans = filter_gcp_plans(&synchronizer.fetch_service_plans().await?);
        let set_ids = synchronizer.fetch_price_set_ids().await?;
        let outcome = synchronizer.attach_price_sets_to_plans(&plans, &set_ids).await?;
        reporter.stage_summary("plan-mapping", &outcome);
    }

    let coverage = synchronizer.validate_coverage(records.len()).await?;
    reporter.coverage(&coverage);
    Ok(())
}

async fn validate(config: &Config, reporter: &ReportManager, catalog_path: PathBuf) -> Result<()> {
    let catalog = snapshot::load_catalog(&catalog_path)?;
    let records = build_price_records(&catalog, &config.target.prefix);

    let client = target_client(config)?;
    let synchronizer = Synchronizer::new(&client, &config.target.prefix);
    let coverage = synchronizer.validate_coverage(records.len()).await?;
    reporter.coverage(&coverage);
    Ok(())
}

fn render(catalog_path: PathBuf, plans_path: Option<PathBuf>, out_dir: PathBuf) -> Result<()> {
    let catalog = snapshot::load_catalog(&catalog_path)?;

    report::write_services_table(&catalog, &out_dir.join("gcp_services_table.csv"))?;
    report::write_skus_table(&catalog, &out_dir.join("gcp_skus_table.csv"))?;

    if let Some(path) = plans_path {
        let plans: Vec<gcp_price_sync::ServicePlan> = snapshot::load_json(&path)?;
        report::write_plans_table(&plans, &out_dir.join("service_plans_table.csv"))?;
    }

    println!("Review tables written to {}", out_dir.display());
    Ok(())
}

fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy {
        max_attempts: config.client.max_attempts,
        page_delay: Duration::from_millis(config.client.page_delay_ms),
    }
}

fn billing_client(config: &Config) -> Result<ApiClient> {
    ApiClient::builder(&config.gcp.billing_url)
        .bearer_token(&config.gcp.access_token)
        .timeout(Duration::from_secs(config.client.timeout_secs))
        .retry(retry_policy(config))
        .build()
        .context("Failed to build billing catalog client")
}

fn target_client(config: &Config) -> Result<ApiClient> {
    if config.target.token.trim().is_empty() {
        bail!("MORPHEUS_TOKEN is required for target-system operations");
    }
    ApiClient::builder(&config.target.url)
        .bearer_token(&config.target.token)
        .accept_invalid_certs(config.target.insecure)
        .timeout(Duration::from_secs(config.client.timeout_secs))
        .retry(retry_policy(config))
        .build()
        .context("Failed to build target system client")
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "error": e.to_string() }));
    } else {
        eprintln!("Error: {e:#}");
    }
    process::exit(1);
}
