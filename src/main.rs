//! modhost - run a directory of modules
//!
//! Usage:
//!   modhost [--modules-dir <dir>] [--config <path>] [--host-config <file>] [--check]

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use modhost::module::builtin::register_builtin;
use modhost::module::system::DEFAULT_LOG_PREFIX;
use modhost::module::{LogLevel, ModuleDependencies, ModuleDiscovery};
use modhost::utils::{init_logging_from_config, wait_for_shutdown_signal};
use modhost::{EntryRegistry, HostConfig, HostLogger, InitOptions, ModuleManager};

#[derive(Parser, Debug)]
#[command(name = "modhost", version, about = "Module lifecycle runtime")]
struct Args {
    /// Module configuration document
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory scanned for modules
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Host configuration file (JSON or TOML)
    #[arg(long)]
    host_config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the load order without initializing anything
    #[arg(long)]
    check: bool,

    /// Keep running when some modules fail to load
    #[arg(long)]
    allow_partial: bool,
}

impl Args {
    /// Host configuration with file, environment and flags applied in that order
    fn host_config(&self) -> anyhow::Result<HostConfig> {
        let mut config = match &self.host_config {
            Some(path) => HostConfig::from_file(path)
                .with_context(|| format!("Failed to load host config {:?}", path))?,
            None => HostConfig::default(),
        };
        config.apply_env_overrides();

        if let Some(path) = &self.config {
            config.config_path = path.clone();
        }
        if let Some(dir) = &self.modules_dir {
            config.modules_dir = dir.clone();
        }
        if self.debug {
            config.logging.filter = Some("debug".to_string());
            config.logging.level = Some(LogLevel::Debug);
        }
        if self.allow_partial {
            config.allow_partial_start = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.host_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging_from_config(&config.logging);

    let result = if args.check {
        check(&config).await
    } else {
        run(&config).await
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Dry run: print the planned load order
async fn check(config: &HostConfig) -> anyhow::Result<ExitCode> {
    let discovery = ModuleDiscovery::new(&config.modules_dir);
    let (discovered, failures) = discovery.discover_modules().await?;
    for (id, e) in &failures {
        error!("Module {}: {}", id, e);
    }

    let plan = ModuleDependencies::plan(&discovered)?;
    for (position, id) in plan.load_order.iter().enumerate() {
        println!("{:>3}. {}", position + 1, id);
    }
    for (id, missing) in &plan.blocked {
        println!("  blocked: {} (missing {})", id, missing.join(", "));
    }

    if failures.is_empty() && plan.blocked.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run(config: &HostConfig) -> anyhow::Result<ExitCode> {
    let mut entries = EntryRegistry::new();
    register_builtin(&mut entries);

    let logger = HostLogger::new(DEFAULT_LOG_PREFIX, config.logging.module_log_level());
    let mut manager = ModuleManager::new(&config.modules_dir, entries).with_logger(logger);
    manager.initialize_runtime(&config.config_path).await?;

    let report = manager
        .discover_and_load_all(&config.modules_dir, InitOptions::new())
        .await?;

    if !report.is_complete() {
        if config.allow_partial_start {
            warn!(
                "{} modules failed to load, continuing with partial start",
                report.failed.len()
            );
        } else if report.has_structural_failures() {
            error!("Module structure errors, shutting down");
            manager.unload_all_modules().await;
            return Ok(ExitCode::FAILURE);
        }
    }

    info!("Running with modules: {}", report.loaded.join(", "));

    let signal = wait_for_shutdown_signal().await;
    info!("Received {}, shutting down gracefully...", signal);

    let shutdown = manager.unload_all_modules().await;
    if !shutdown.failures.is_empty() {
        warn!("{} modules failed to clean up", shutdown.failures.len());
    }
    Ok(ExitCode::SUCCESS)
}
