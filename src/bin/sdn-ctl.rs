use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use serde_json::json;

use sdn_balancer::config::{load_config, parse_config, ConfigError, ControllerConfig};
use sdn_balancer::flow::FlowRuleBuilder;
use sdn_balancer::load_balancer::LoadBalancingPolicy;

#[derive(Parser)]
#[command(name = "sdn-ctl")]
#[command(about = "Management CLI for the SDN load-balancing controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file and list every problem
    Validate { config: PathBuf },
    /// Print the bootstrap rules a switch would receive, as JSON
    Bootstrap { config: PathBuf },
    /// Run backend selections and print the resulting distribution
    Simulate {
        config: PathBuf,
        #[arg(short = 'n', long, default_value_t = 6000)]
        count: usize,
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Bootstrap { config } => {
            let config = load_config(&config)?;
            let policy = LoadBalancingPolicy::from_config(&config.balancer.backends)?;
            let rules = FlowRuleBuilder::from_config(&config.balancer).build_bootstrap(&policy.pool());
            println!("{}", serde_json::to_string_pretty(&rules)?);
            Ok(())
        }
        Commands::Simulate {
            config,
            count,
            threads,
        } => simulate(&load_config(&config)?, count, threads.max(1)),
    }
}

fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    match parse_config(&content) {
        Ok(config) => {
            println!(
                "OK: {} backends, steering priority {}",
                config.balancer.backends.len(),
                config.balancer.steering_priority
            );
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            for error in &errors {
                eprintln!("error: {}", error);
            }
            Err(format!("{} validation error(s)", errors.len()).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn simulate(
    config: &ControllerConfig,
    count: usize,
    threads: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = Arc::new(LoadBalancingPolicy::from_config(&config.balancer.backends)?);
    let client = Ipv4Addr::new(10, 0, 5, 9);

    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let policy = Arc::clone(&policy);
            let share = count / threads + usize::from(worker < count % threads);
            thread::spawn(move || {
                let mut counts: BTreeMap<Ipv4Addr, usize> = BTreeMap::new();
                for _ in 0..share {
                    *counts.entry(policy.select_backend(client).address).or_default() += 1;
                }
                counts
            })
        })
        .collect();

    let mut totals: BTreeMap<Ipv4Addr, usize> = BTreeMap::new();
    for handle in handles {
        let counts = handle
            .join()
            .map_err(|_| "selection worker panicked")?;
        for (address, n) in counts {
            *totals.entry(address).or_default() += n;
        }
    }

    let pool = policy.pool();
    let total_weight = pool.total_weight() as f64;
    let report: Vec<_> = pool
        .iter()
        .map(|backend| {
            let selected = totals.get(&backend.address).copied().unwrap_or(0);
            json!({
                "address": backend.address.to_string(),
                "weight": backend.weight,
                "selected": selected,
                "observed_share": if count == 0 { 0.0 } else { selected as f64 / count as f64 },
                "expected_share": backend.weight as f64 / total_weight,
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "selections": count,
            "threads": threads,
            "backends": report,
        }))?
    );
    Ok(())
}
