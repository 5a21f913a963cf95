use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use stepwise_core::{plan_hops, SchemaVersion, VersionCatalog};
use stepwise_installer::{
    default_install_root, InstallLayout, StepwiseConfig, StoreIdentity, UpdateLock, VersionStore,
};

use crate::completion::write_completions_script;
use crate::render::{
    current_output_style, format_catalog_lines, format_plan_lines, format_status_lines,
    render_status_line, OutputStyle,
};
use crate::{Cli, Commands};

/// Install root and config resolved from global flags.
#[derive(Debug, Clone)]
pub(crate) struct CliContext {
    pub(crate) config: StepwiseConfig,
    pub(crate) layout: InstallLayout,
}

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut stdout = io::stdout().lock();
        return write_completions_script(shell, &mut stdout);
    }

    let context = resolve_cli_context(cli.install_root.as_deref(), cli.config.as_deref())?;
    for line in run_command(&context, cli.command, current_output_style())? {
        println!("{line}");
    }
    Ok(())
}

/// Without `--config`, the config file is looked up inside the install root
/// named by `--install-root` or the default root. A root named inside that
/// file still loses to `--install-root`.
pub(crate) fn resolve_cli_context(
    install_root: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<CliContext> {
    let config = match config_path {
        Some(path) => StepwiseConfig::load(path)?,
        None => {
            let root = match install_root {
                Some(root) => root.to_path_buf(),
                None => default_install_root()?,
            };
            StepwiseConfig::load_or_default(&InstallLayout::new(root).config_path())?
        }
    };

    let root = config.resolve_install_root(install_root)?;
    tracing::debug!(
        root = %root.display(),
        policy = config.failure_policy.as_str(),
        "resolved install root"
    );
    Ok(CliContext {
        layout: InstallLayout::new(root),
        config,
    })
}

pub(crate) fn run_command(
    context: &CliContext,
    command: Commands,
    style: OutputStyle,
) -> Result<Vec<String>> {
    match command {
        Commands::Status { target } => {
            let identity = target.identity()?;
            let version = VersionStore::new(context.layout.clone()).get(&identity)?;
            let lock = UpdateLock::new(context.layout.clone());
            let held_lock = lock.is_locked()?.then(|| lock.path());
            Ok(format_status_lines(
                &identity,
                &version,
                held_lock.as_deref(),
                style,
            ))
        }
        Commands::Catalog { rules_dir } => {
            let rules_dir = rules_dir.unwrap_or_else(|| context.layout.kernel_rules_dir());
            let catalog = load_catalog(&rules_dir)?;
            Ok(format_catalog_lines(
                &catalog,
                &context.config.registry(),
                style,
            ))
        }
        Commands::Plan {
            to,
            target,
            rules_dir,
        } => {
            let to = parse_version(&to)?;
            let identity = target.identity()?;
            let rules_dir = rules_dir_for(&context.layout, &identity, rules_dir)?;
            let catalog = load_catalog(&rules_dir)?;
            let current = VersionStore::new(context.layout.clone()).get(&identity)?;
            let hops = plan_hops(&catalog, &current, &to)?;
            Ok(format_plan_lines(
                &identity,
                &current,
                &to,
                &hops,
                &catalog,
                &context.config.registry(),
                style,
            ))
        }
        Commands::SetVersion { version, target } => {
            let version = parse_version(&version)?;
            let identity = target.identity()?;
            let lock = UpdateLock::new(context.layout.clone());
            if lock.is_locked()? {
                bail!(
                    "update lock is held ({}); wait for the running update or clear a stale marker with `stepwise unlock`",
                    lock.path().display()
                );
            }

            VersionStore::new(context.layout.clone()).set(&identity, &version)?;
            tracing::info!(%identity, %version, "version record set by hand");
            Ok(vec![render_status_line(
                style,
                "ok",
                &format!("{identity} version set to {version}"),
            )])
        }
        Commands::Unlock => {
            let lock = UpdateLock::new(context.layout.clone());
            let path = lock.path();
            if !lock.is_locked()? {
                return Ok(vec![render_status_line(
                    style,
                    "info",
                    &format!("no update lock at {}", path.display()),
                )]);
            }

            lock.release()?;
            tracing::warn!(path = %path.display(), "update lock cleared by hand");
            Ok(vec![render_status_line(
                style,
                "ok",
                &format!("removed update lock {}", path.display()),
            )])
        }
        Commands::Completions { shell } => {
            let mut script = Vec::new();
            write_completions_script(shell, &mut script)?;
            Ok(String::from_utf8_lossy(&script)
                .lines()
                .map(str::to_string)
                .collect())
        }
    }
}

fn parse_version(raw: &str) -> Result<SchemaVersion> {
    SchemaVersion::parse(raw).with_context(|| format!("invalid version argument '{raw}'"))
}

fn load_catalog(rules_dir: &Path) -> Result<VersionCatalog> {
    VersionCatalog::load_dir(rules_dir).with_context(|| {
        format!(
            "failed to load version catalog from {}",
            rules_dir.display()
        )
    })
}

fn rules_dir_for(
    layout: &InstallLayout,
    identity: &StoreIdentity,
    rules_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    match (identity, rules_dir) {
        (_, Some(dir)) => Ok(dir),
        (StoreIdentity::Kernel, None) => Ok(layout.kernel_rules_dir()),
        (StoreIdentity::Package(_), None) => Err(anyhow!(
            "--rules-dir is required to plan package {identity}"
        )),
    }
}
