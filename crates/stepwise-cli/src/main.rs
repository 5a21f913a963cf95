use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use stepwise_installer::StoreIdentity;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod render;

use completion::CliCompletionShell;
use dispatch::run_cli;

const LOG_ENV_VAR: &str = "STEPWISE_LOG";

#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(about = "Inspect and repair schema version records", long_about = None)]
struct Cli {
    /// Install root holding version records and the update lock.
    #[arg(long, global = true)]
    install_root: Option<PathBuf>,
    /// Config file to use instead of `<install-root>/stepwise.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the recorded version and lock state.
    Status {
        #[command(flatten)]
        target: PackageArgs,
    },
    /// List the merged catalog of a rules directory.
    Catalog {
        #[arg(long)]
        rules_dir: Option<PathBuf>,
    },
    /// Preview the hops needed to move the recorded version to `--to`.
    Plan {
        #[arg(long)]
        to: String,
        #[command(flatten)]
        target: PackageArgs,
        #[arg(long)]
        rules_dir: Option<PathBuf>,
    },
    /// Overwrite a version record by hand.
    SetVersion {
        version: String,
        #[command(flatten)]
        target: PackageArgs,
    },
    /// Remove a stranded update lock marker.
    Unlock,
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

/// Selects a package record; without both flags the kernel record is used.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
struct PackageArgs {
    #[arg(long, requires = "package")]
    vendor: Option<String>,
    #[arg(long, requires = "vendor")]
    package: Option<String>,
}

impl PackageArgs {
    fn identity(&self) -> Result<StoreIdentity> {
        match (self.vendor.as_deref(), self.package.as_deref()) {
            (None, None) => Ok(StoreIdentity::Kernel),
            (Some(vendor), Some(name)) => Ok(StoreIdentity::package(vendor, name)?),
            _ => bail!("--vendor and --package must be given together"),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    run_cli(Cli::parse())
}

#[cfg(test)]
mod tests;
