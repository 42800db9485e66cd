//! `u2post rules` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use u2post_core::config::U2PostConfig;
use u2post_ingest::{LoadSummary, RuleIndex, RuleKey, RuleLoader};

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = U2PostConfig::load(config_path).await?;
    let index = load_index(&config).await?;

    match args.action {
        RulesAction::Check => writer.render(&check_report(&index)),
        RulesAction::Lookup { key } => {
            let report = lookup_report(&index, &key)?;
            writer.render(&report)?;
            if report.found {
                Ok(())
            } else {
                Err(CliError::Rule(format!("no rule indexed for {}", report.key)))
            }
        }
    }
}

/// Load the rule index the daemon would load for `config`.
pub async fn load_index(config: &U2PostConfig) -> Result<RuleIndex, CliError> {
    info!(
        gen_msg_map = %config.rules.gen_msg_map_path,
        paths = ?config.rules.paths,
        "loading signature rules"
    );
    Ok(RuleLoader::load(&config.rules.gen_msg_map_path, &config.rules.paths).await?)
}

pub fn check_report(index: &RuleIndex) -> RuleCheckReport {
    RuleCheckReport {
        summary: index.summary(),
        sources: index
            .sources()
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    }
}

/// Resolve `key` (`gid:sid` or bare `sid`) against `index`.
pub fn lookup_report(index: &RuleIndex, key: &str) -> Result<RuleLookupReport, CliError> {
    let key: RuleKey = key.parse().map_err(CliError::Command)?;

    let report = match index.lookup(key) {
        Some(rule) => RuleLookupReport {
            key: key.to_string(),
            found: true,
            msg: Some(rule.msg.clone()),
            source_file: index.source_path(rule).map(|p| p.display().to_string()),
            line: Some(rule.line_number),
            raw: Some(rule.raw.clone()),
        },
        None => RuleLookupReport {
            key: key.to_string(),
            found: false,
            msg: None,
            source_file: None,
            line: None,
            raw: None,
        },
    };
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct RuleCheckReport {
    pub summary: LoadSummary,
    pub sources: Vec<String>,
}

impl Render for RuleCheckReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Signature Rules ({} loaded)",
            self.summary.rules_loaded.to_string().bold()
        )?;
        writeln!(w, "  Files read:          {}", self.summary.files_read)?;
        writeln!(
            w,
            "  Multi-line rejected: {}",
            warn_if_nonzero(self.summary.multi_line_rejected)
        )?;
        writeln!(
            w,
            "  Duplicates rejected: {}",
            warn_if_nonzero(self.summary.duplicate_rejected)
        )?;

        if !self.sources.is_empty() {
            writeln!(w)?;
            writeln!(w, "Sources:")?;
            for source in &self.sources {
                writeln!(w, "  {source}")?;
            }
        }
        Ok(())
    }
}

fn warn_if_nonzero(n: usize) -> colored::ColoredString {
    use colored::Colorize;

    if n > 0 {
        n.to_string().yellow()
    } else {
        n.to_string().normal()
    }
}

#[derive(Debug, Serialize)]
pub struct RuleLookupReport {
    pub key: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Render for RuleLookupReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if !self.found {
            return writeln!(w, "Rule {}: {}", self.key.bold(), "NOT FOUND".red().bold());
        }

        writeln!(w, "Rule {}", self.key.bold())?;
        if let Some(msg) = &self.msg {
            writeln!(w, "  Message: {}", msg.green())?;
        }
        match (&self.source_file, self.line) {
            (Some(file), Some(line)) => writeln!(w, "  Source:  {file}:{line}")?,
            (Some(file), None) => writeln!(w, "  Source:  {file}")?,
            _ => {}
        }
        if let Some(raw) = &self.raw {
            writeln!(w, "  Rule:    {raw}")?;
        }
        Ok(())
    }
}
