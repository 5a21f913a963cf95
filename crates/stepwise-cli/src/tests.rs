use super::*;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::error::ErrorKind;
use stepwise_core::{plan_hops, SchemaVersion, VersionCatalog, BASE_CATALOG_FILE};
use stepwise_installer::{InstallLayout, StepwiseConfig, VersionStore};

use crate::dispatch::{resolve_cli_context, run_command, CliContext};
use crate::render::{
    format_plan_lines, format_status_lines, render_status_line, resolve_output_style, OutputStyle,
};

static TEST_LAYOUT_COUNTER: AtomicU64 = AtomicU64::new(0);

const STANDARD_CATALOG: &str = r#"{
  "details": {
    "1.0": { "class": "CreateUsers" },
    "1.1": { "class": "AddEmail" },
    "2.0": { "class": "SplitNames", "namespace": "Acme\\Legacy" }
  }
}"#;

fn test_layout() -> InstallLayout {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_LAYOUT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!(
        "stepwise-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    fs::create_dir_all(&path).expect("must create install root");
    InstallLayout::new(path)
}

fn test_context(layout: &InstallLayout) -> CliContext {
    resolve_cli_context(Some(layout.root()), None).expect("must resolve context")
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments must parse")
}

fn v(raw: &str) -> SchemaVersion {
    SchemaVersion::parse(raw).expect("version should parse")
}

#[test]
fn cli_parses_global_flags_after_subcommand() {
    let cli = parse(&[
        "stepwise",
        "status",
        "--install-root",
        "/srv/app",
        "--vendor",
        "acme",
        "--package",
        "billing",
    ]);

    assert_eq!(cli.install_root.as_deref(), Some(Path::new("/srv/app")));
    match cli.command {
        Commands::Status { target } => {
            assert_eq!(
                target.identity().expect("valid identity"),
                StoreIdentity::package("acme", "billing").expect("valid identity")
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_requires_vendor_and_package_together() {
    let err = Cli::try_parse_from(["stepwise", "status", "--vendor", "acme"])
        .expect_err("package flag is missing");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_plan_requires_target_version() {
    let err = Cli::try_parse_from(["stepwise", "plan"]).expect_err("--to is missing");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn package_args_default_to_kernel() {
    assert_eq!(
        PackageArgs::default().identity().expect("kernel identity"),
        StoreIdentity::Kernel
    );

    let invalid = PackageArgs {
        vendor: Some("acme".to_string()),
        package: Some("../etc".to_string()),
    };
    invalid.identity().expect_err("path segments are rejected");
}

#[test]
fn resolve_output_style_uses_rich_only_on_tty_without_no_color() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "kernel version set to 1.1"),
        "kernel version set to 1.1"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "kernel version set to 1.1"),
        "[OK] kernel version set to 1.1"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "lock: held"),
        "[WARN] lock: held"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "info", "2 hops"),
        "[..] 2 hops"
    );
}

#[test]
fn format_status_lines_plain_reports_sentinel_and_lock() {
    let lines = format_status_lines(
        &StoreIdentity::Kernel,
        &SchemaVersion::sentinel(),
        Some(Path::new("/srv/app/updating.lock")),
        OutputStyle::Plain,
    );
    assert_eq!(
        lines,
        vec![
            "identity: kernel",
            "version: 0 (nothing applied)",
            "lock: held (/srv/app/updating.lock)",
        ]
    );
}

#[test]
fn format_status_lines_rich_starts_with_section_header() {
    let lines = format_status_lines(
        &StoreIdentity::Kernel,
        &v("1.1"),
        None,
        OutputStyle::Rich,
    );
    assert!(lines[0].contains("== kernel =="));
    assert_eq!(lines[1], "[OK] version: 1.1");
    assert_eq!(lines[2], "[OK] lock: free");
}

#[test]
fn format_plan_lines_names_handlers_per_hop() {
    let layout = test_layout();
    fs::write(layout.root().join(BASE_CATALOG_FILE), STANDARD_CATALOG)
        .expect("must write catalog");
    let catalog = VersionCatalog::load_dir(layout.root()).expect("must load catalog");
    let registry = stepwise_installer::MigrationRegistry::with_default_namespace("App");
    let hops = plan_hops(&catalog, &v("2.0"), &v("1.0")).expect("must plan");

    let lines = format_plan_lines(
        &StoreIdentity::Kernel,
        &v("2.0"),
        &v("1.0"),
        &hops,
        &catalog,
        &registry,
        OutputStyle::Plain,
    );

    assert_eq!(
        lines,
        vec![
            "kernel: 2.0 -> 1.0 (2 hops)",
            "down 2.0 -> 1.1 via Acme\\Legacy\\SplitNames",
            "down 1.1 -> 1.0 via App\\AddEmail",
        ]
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn resolve_cli_context_reads_config_from_install_root() {
    let layout = test_layout();
    fs::write(
        layout.config_path(),
        "default_namespace = \"App\"\nfailure_policy = \"best-effort\"\n",
    )
    .expect("must write config");

    let context = test_context(&layout);

    assert_eq!(context.layout, layout);
    assert_eq!(context.config.default_namespace.as_deref(), Some("App"));
    assert_eq!(
        context.config.failure_policy,
        stepwise_installer::FailurePolicy::BestEffort
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn resolve_cli_context_explicit_config_names_install_root() {
    let layout = test_layout();
    let config_path = layout.root().join("elsewhere.toml");
    let install_root = layout.root().join("install");
    fs::write(
        &config_path,
        format!(
            "install_root = {:?}\n",
            install_root.display().to_string()
        ),
    )
    .expect("must write config");

    let context = resolve_cli_context(None, Some(&config_path)).expect("must resolve context");
    assert_eq!(context.layout.root(), install_root.as_path());

    let overridden = resolve_cli_context(Some(Path::new("/override")), Some(&config_path))
        .expect("must resolve context");
    assert_eq!(overridden.layout.root(), Path::new("/override"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn resolve_cli_context_rejects_malformed_config() {
    let layout = test_layout();
    fs::write(layout.config_path(), "failure_policy = 3\n").expect("must write config");

    resolve_cli_context(Some(layout.root()), None).expect_err("config is malformed");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn set_version_then_status_reports_new_record() {
    let layout = test_layout();
    let context = test_context(&layout);

    let lines = run_command(
        &context,
        parse(&["stepwise", "set-version", "1.1"]).command,
        OutputStyle::Plain,
    )
    .expect("must set version");
    assert_eq!(lines, vec!["kernel version set to 1.1"]);
    assert_eq!(
        fs::read_to_string(layout.kernel_version_path()).expect("must read record"),
        "1.1"
    );

    let lines = run_command(
        &context,
        parse(&["stepwise", "status"]).command,
        OutputStyle::Plain,
    )
    .expect("must report status");
    assert_eq!(lines, vec!["identity: kernel", "version: 1.1", "lock: free"]);

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn set_version_writes_package_record() {
    let layout = test_layout();
    let context = test_context(&layout);

    run_command(
        &context,
        parse(&[
            "stepwise",
            "set-version",
            "0.3",
            "--vendor",
            "acme",
            "--package",
            "billing",
        ])
        .command,
        OutputStyle::Plain,
    )
    .expect("must set package version");

    assert_eq!(
        VersionStore::new(layout.clone())
            .get_package_version("acme", "billing")
            .expect("must read"),
        v("0.3")
    );
    assert!(!layout.kernel_version_path().exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn set_version_refuses_while_lock_is_held() {
    let layout = test_layout();
    fs::write(layout.update_lock_path(), "").expect("must seed lock marker");
    let context = test_context(&layout);

    let err = run_command(
        &context,
        parse(&["stepwise", "set-version", "1.0"]).command,
        OutputStyle::Plain,
    )
    .expect_err("lock is held");

    assert!(err.to_string().contains("stepwise unlock"));
    assert!(!layout.kernel_version_path().exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn set_version_rejects_malformed_version() {
    let layout = test_layout();
    let context = test_context(&layout);

    let err = run_command(
        &context,
        parse(&["stepwise", "set-version", "one.two"]).command,
        OutputStyle::Plain,
    )
    .expect_err("version is malformed");
    assert!(err.to_string().contains("invalid version argument 'one.two'"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn unlock_removes_stranded_marker_and_is_idempotent() {
    let layout = test_layout();
    fs::write(layout.update_lock_path(), "").expect("must seed lock marker");
    let context = test_context(&layout);

    let lines = run_command(
        &context,
        parse(&["stepwise", "unlock"]).command,
        OutputStyle::Plain,
    )
    .expect("must unlock");
    assert!(lines[0].starts_with("removed update lock"));
    assert!(!layout.update_lock_path().exists());

    let lines = run_command(
        &context,
        parse(&["stepwise", "unlock"]).command,
        OutputStyle::Plain,
    )
    .expect("unlocking twice is fine");
    assert!(lines[0].starts_with("no update lock at"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn catalog_lists_versions_with_handler_keys_and_max() {
    let layout = test_layout();
    fs::write(layout.root().join(BASE_CATALOG_FILE), STANDARD_CATALOG)
        .expect("must write catalog");
    fs::write(layout.config_path(), "default_namespace = \"App\"\n").expect("must write config");
    let context = test_context(&layout);

    let lines = run_command(
        &context,
        parse(&["stepwise", "catalog"]).command,
        OutputStyle::Plain,
    )
    .expect("must list catalog");

    assert_eq!(
        lines,
        vec![
            "1.0 App\\CreateUsers",
            "1.1 App\\AddEmail",
            "2.0 Acme\\Legacy\\SplitNames",
            "max version: 2.0",
        ]
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn catalog_reports_missing_rules_dir() {
    let layout = test_layout();
    let context = test_context(&layout);

    let err = run_command(
        &context,
        parse(&["stepwise", "catalog"]).command,
        OutputStyle::Plain,
    )
    .expect_err("no catalog present");
    assert!(err.to_string().contains("failed to load version catalog"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn plan_previews_without_writes_or_lock() {
    let layout = test_layout();
    fs::write(layout.root().join(BASE_CATALOG_FILE), STANDARD_CATALOG)
        .expect("must write catalog");
    let context = test_context(&layout);

    let lines = run_command(
        &context,
        parse(&["stepwise", "plan", "--to", "1.1"]).command,
        OutputStyle::Plain,
    )
    .expect("must plan");

    assert_eq!(
        lines,
        vec![
            "kernel: 0 -> 1.1 (2 hops)",
            "up 0 -> 1.0 via CreateUsers",
            "up 1.0 -> 1.1 via AddEmail",
        ]
    );
    assert!(!layout.kernel_version_path().exists());
    assert!(!layout.update_lock_path().exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn plan_for_package_requires_rules_dir() {
    let layout = test_layout();
    let context = test_context(&layout);

    let err = run_command(
        &context,
        parse(&[
            "stepwise",
            "plan",
            "--to",
            "1.0",
            "--vendor",
            "acme",
            "--package",
            "billing",
        ])
        .command,
        OutputStyle::Plain,
    )
    .expect_err("rules dir is required");
    assert!(err.to_string().contains("--rules-dir is required"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn plan_to_unlisted_version_is_unreachable() {
    let layout = test_layout();
    fs::write(layout.root().join(BASE_CATALOG_FILE), STANDARD_CATALOG)
        .expect("must write catalog");
    let context = test_context(&layout);

    let err = run_command(
        &context,
        parse(&["stepwise", "plan", "--to", "1.5"]).command,
        OutputStyle::Plain,
    )
    .expect_err("1.5 is not listed");
    assert!(err.downcast_ref::<stepwise_core::GraphError>().is_some());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn completions_script_names_the_binary() {
    let layout = test_layout();
    let context = CliContext {
        config: StepwiseConfig::default(),
        layout: layout.clone(),
    };

    let lines = run_command(
        &context,
        parse(&["stepwise", "completions", "bash"]).command,
        OutputStyle::Plain,
    )
    .expect("must generate completions");
    assert!(lines.iter().any(|line| line.contains("stepwise")));

    let _ = fs::remove_dir_all(layout.root());
}
