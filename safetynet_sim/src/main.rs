//! SafetyNet generator CLI
//!
//! Run deterministic generation profiles and export the resulting datasets.

use clap::Parser;
use safetynet_core::GeneratorConfig;
use safetynet_env::{GenContext, WallClockContext};
use safetynet_sim::{DatasetExport, ProfileId, ProfileRunner, RunResult, SimContext};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// SafetyNet synthetic record generator CLI
#[derive(Parser, Debug)]
#[command(name = "safetynet-sim")]
#[command(about = "Generate correlated synthetic public-safety records", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random, logged for replay)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Profile to run (smoke, standard, ems_heavy, frequent_callers, jail_heavy, stress, all)
    #[arg(short, long, default_value = "smoke")]
    profile: String,

    /// Number of consecutive seeds to run
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Multiplier applied to every record count
    #[arg(long, default_value = "1.0")]
    scale: f64,

    /// Override the profile's EMS worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// JSON file with weight tables replacing the built-in ones
    #[arg(short, long)]
    config: Option<String>,

    /// Export the dataset to a JSON file (single profile and seed only)
    #[arg(long)]
    export: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose when set
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_max_level(level);
    let installed = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()),
        Err(_) => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("SafetyNet Generator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse profiles
    let profiles: Vec<ProfileId> = if args.profile == "all" {
        ProfileId::all()
    } else {
        vec![args.profile.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!(
                "Available profiles: {}, all",
                ProfileId::all().iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
            );
            std::process::exit(1);
        })]
    };

    let config = match &args.config {
        Some(path) => GeneratorConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => GeneratorConfig::default(),
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        let seed = WallClockContext::new().seed();
        warn!("Seed 0 requested; using random seed {} (pass --seed {} to replay)", seed, seed);
        seed
    } else {
        args.seed
    };

    if args.export.is_some() && (profiles.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export only supports a single profile and seed");
        std::process::exit(1);
    }

    // Track results
    let mut all_results: Vec<RunResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        let runner = ProfileRunner::new(seed)
            .with_config(config.clone())
            .with_scale(args.scale)
            .with_workers(args.workers);

        for profile in &profiles {
            let result = runner.run(*profile);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED - {} records",
                        profile.name(),
                        seed,
                        result.dataset.total_records()
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        profile.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if let Some(path) = &args.export {
                let anchor = SimContext::new(seed).anchor();
                match DatasetExport::from_result(&result, anchor).write_to_file(path) {
                    Ok(()) => info!("Exported {} records to {}", result.dataset.total_records(), path),
                    Err(e) => error!("Failed to write export: {}", e),
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "profile": r.profile.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "records": r.dataset.total_records(),
                    "counts": r.counts,
                    "violations": r.integrity.as_ref().map(|i| i.total_violations()),
                    "identity_reuse_rate": r.metrics.as_ref().map(|m| m.identity_reuse_rate),
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} profile runs passed!", total);
        } else {
            error!("❌ {}/{} profile runs failed!", failed_count, total);

            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.profile.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    if failed_count > 0 {
        std::process::exit(1);
    }
}
