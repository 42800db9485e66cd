//! `u2post registry` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use u2post_core::SpoolPosition;
use u2post_core::config::U2PostConfig;
use u2post_ingest::SpoolReader;

use crate::cli::{RegistryAction, RegistryArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `registry` command.
pub async fn execute(
    args: RegistryArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RegistryAction::Show => {
            let config = U2PostConfig::load(config_path).await?;
            let report = registry_report(&config).await?;
            writer.render(&report)
        }
    }
}

/// Read the checkpoint without touching it and measure the backlog behind it.
///
/// The daemon's registrar probes for write access on startup; this command
/// only reads, so it also works against a live daemon's registry.
pub async fn registry_report(config: &U2PostConfig) -> Result<RegistryReport, CliError> {
    let path = Path::new(&config.registry.file);
    info!(path = %path.display(), "reading registry");

    let position = match tokio::fs::read(path).await {
        Ok(bytes) => Some(serde_json::from_slice::<SpoolPosition>(&bytes).map_err(|e| {
            CliError::Command(format!("malformed registry file {}: {e}", path.display()))
        })?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let (reader, _closed_rx) = SpoolReader::new(
        &config.spool.directory,
        config.spool.prefix.clone(),
        config.spool.max_record_bytes,
    )?;
    let candidates = reader.candidates().await?;

    let current = position.as_ref().map(|p| p.source.as_str()).unwrap_or("");
    let offset = position.as_ref().map_or(0, |p| p.offset);

    let mut backlog = Backlog::default();
    for name in &candidates {
        let len = tokio::fs::metadata(reader.dir().join(name)).await?.len();
        if !current.is_empty() && name.as_str() == current {
            backlog.current_file_len = Some(len);
            backlog.bytes += len.saturating_sub(offset);
        } else if name.as_str() > current {
            backlog.files += 1;
            backlog.bytes += len;
        }
    }
    debug!(files = backlog.files, bytes = backlog.bytes, "spool backlog measured");

    Ok(RegistryReport {
        path: path.display().to_string(),
        spool_directory: reader.dir().display().to_string(),
        checkpoint: position,
        current_file_len: backlog.current_file_len,
        pending_files: backlog.files,
        backlog_bytes: backlog.bytes,
    })
}

#[derive(Default)]
struct Backlog {
    current_file_len: Option<u64>,
    files: usize,
    bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct RegistryReport {
    pub path: String,
    pub spool_directory: String,
    /// `None` when no registry file exists yet
    pub checkpoint: Option<SpoolPosition>,
    /// Size of the checkpointed file, if it is still in the spool
    pub current_file_len: Option<u64>,
    /// Spool files that sort after the checkpointed one
    pub pending_files: usize,
    /// Unread bytes in the current file plus all pending files
    pub backlog_bytes: u64,
}

impl Render for RegistryReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Registry: {}", self.path.bold())?;
        match &self.checkpoint {
            Some(position) if !position.is_empty() => {
                writeln!(w, "  Source:  {}", position.source)?;
                match self.current_file_len {
                    Some(len) => writeln!(w, "  Offset:  {} / {len}", position.offset)?,
                    None => writeln!(
                        w,
                        "  Offset:  {} ({})",
                        position.offset,
                        "file no longer in spool".yellow()
                    )?,
                }
            }
            _ => writeln!(w, "  {}", "no checkpoint (reads start at the first spool file)".yellow())?,
        }
        writeln!(w)?;
        writeln!(w, "Spool: {}", self.spool_directory)?;
        writeln!(w, "  Pending files: {}", self.pending_files)?;
        writeln!(w, "  Backlog bytes: {}", self.backlog_bytes)
    }
}
