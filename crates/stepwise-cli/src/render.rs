use std::io::IsTerminal;
use std::path::Path;

use anstyle::{AnsiColor, Effects, Style};
use stepwise_core::{max_version, Hop, SchemaVersion, VersionCatalog};
use stepwise_installer::{MigrationRegistry, StoreIdentity};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    resolve_output_style(std::io::stdout().is_terminal(), no_color)
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// Plain output keeps the message only so scripts can parse it.
pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn format_status_lines(
    identity: &StoreIdentity,
    version: &SchemaVersion,
    held_lock: Option<&Path>,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = Vec::new();
    match render_section_header(style, &identity.to_string()) {
        Some(header) => lines.push(header),
        None => lines.push(format!("identity: {identity}")),
    }

    let version_line = if version.is_sentinel() {
        format!("version: {version} (nothing applied)")
    } else {
        format!("version: {version}")
    };
    lines.push(render_status_line(style, "ok", &version_line));

    match held_lock {
        Some(path) => lines.push(render_status_line(
            style,
            "warn",
            &format!("lock: held ({})", path.display()),
        )),
        None => lines.push(render_status_line(style, "ok", "lock: free")),
    }
    lines
}

pub(crate) fn format_catalog_lines(
    catalog: &VersionCatalog,
    registry: &MigrationRegistry,
    style: OutputStyle,
) -> Vec<String> {
    if catalog.is_empty() {
        return vec![render_status_line(style, "warn", "catalog lists no versions")];
    }

    let mut lines = Vec::new();
    if let Some(header) = render_section_header(style, "catalog") {
        lines.push(header);
    }
    for descriptor in catalog.iter() {
        lines.push(format!(
            "{} {}",
            descriptor.version,
            registry.key_for(descriptor)
        ));
    }
    if let Some(max) = max_version(catalog) {
        lines.push(render_status_line(style, "ok", &format!("max version: {max}")));
    }
    lines
}

pub(crate) fn format_plan_lines(
    identity: &StoreIdentity,
    current: &SchemaVersion,
    target: &SchemaVersion,
    hops: &[Hop],
    catalog: &VersionCatalog,
    registry: &MigrationRegistry,
    style: OutputStyle,
) -> Vec<String> {
    if hops.is_empty() {
        return vec![render_status_line(
            style,
            "ok",
            &format!("{identity} already at {current}"),
        )];
    }

    let mut lines = vec![render_status_line(
        style,
        "info",
        &format!(
            "{identity}: {current} -> {target} ({} hop{})",
            hops.len(),
            if hops.len() == 1 { "" } else { "s" }
        ),
    )];
    for hop in hops {
        let key = catalog
            .get(&hop.step)
            .map(|descriptor| registry.key_for(descriptor))
            .unwrap_or_else(|| hop.step.to_string());
        lines.push(format!(
            "{} {} -> {} via {key}",
            hop.direction.as_str(),
            hop.from,
            hop.to
        ));
    }
    lines
}
