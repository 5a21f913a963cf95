use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use stepwise_core::SchemaVersion;

use crate::{InstallLayout, StoreIdentity};

/// One failed reconciliation, as recorded for operators.
#[derive(Debug)]
pub struct FailureRecord<'a> {
    pub identity: &'a StoreIdentity,
    pub from: &'a SchemaVersion,
    pub to: &'a SchemaVersion,
    pub error: &'a (dyn Error + 'static),
}

/// Appends `record` to the install root's error log. The log is a side
/// channel: a write failure is only traced.
pub fn append_failure(layout: &InstallLayout, record: &FailureRecord<'_>) -> Option<PathBuf> {
    let path = layout.error_log_path();
    match write_failure(&path, record) {
        Ok(()) => Some(path),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to append update error log"
            );
            None
        }
    }
}

pub(crate) fn render_failure(record: &FailureRecord<'_>, at_unix: u64) -> String {
    let mut payload = String::new();
    payload.push_str(&format!("at_unix={at_unix} error in stepwise migration runner\n"));
    payload.push_str(&format!("update from {} to {}\n", record.from, record.to));
    if let StoreIdentity::Package(package) = record.identity {
        payload.push_str(&format!("package = {package}\n"));
    }
    payload.push_str(&format!("error: {}\n", record.error));

    let mut source = record.error.source();
    while let Some(cause) = source {
        payload.push_str(&format!("caused by: {cause}\n"));
        source = cause.source();
    }
    payload.push('\n');
    payload
}

fn write_failure(path: &Path, record: &FailureRecord<'_>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let at_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();

    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(render_failure(record, at_unix).as_bytes())?;
    file.flush()
}
