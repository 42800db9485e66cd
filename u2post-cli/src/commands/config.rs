//! `u2post config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use u2post_core::config::U2PostConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
pub const SECTIONS: &[&str] = &[
    "general", "spool", "rules", "registry", "spooler", "output", "metrics",
];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration, reporting the first error found.
///
/// # Errors
///
/// Returns `CliError::Config` after rendering the report if validation fails.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validation_report(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

pub async fn validation_report(config_path: &Path) -> ConfigValidationReport {
    let errors = match U2PostConfig::load(config_path).await {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };
    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Show the effective configuration (file + env overrides + defaults).
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = U2PostConfig::load(config_path).await?;
    let report = show_report(&config, config_path, section.as_deref())?;
    writer.render(&report)
}

pub fn show_report(
    config: &U2PostConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section {
        None => to_toml(config)?,
        Some("general") => to_toml(&config.general)?,
        Some("spool") => to_toml(&config.spool)?,
        Some("rules") => to_toml(&config.rules)?,
        Some("registry") => to_toml(&config.registry)?,
        Some("spooler") => to_toml(&config.spooler)?,
        Some("output") => to_toml(&config.output)?,
        Some("metrics") => to_toml(&config.metrics)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config: toml::from_str(&config_toml)
            .map_err(|e| CliError::Config(format!("failed to re-read rendered config: {e}")))?,
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> Result<String, CliError> {
    toml::to_string_pretty(value)
        .map_err(|e| CliError::Config(format!("failed to serialize config: {e}")))
}

/// Configuration display report.
///
/// JSON output carries the structured `config`; text output prints the TOML.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: toml::Table,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

/// Configuration validation report.
#[derive(Debug, Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Empty if valid
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_full_config_contains_every_section() {
        let report = show_report(&U2PostConfig::default(), Path::new("u2post.toml"), None).unwrap();
        for section in SECTIONS {
            assert!(
                report.config.contains_key(*section),
                "missing section {section}"
            );
        }
        assert!(report.config_toml.contains("[spool]"));
    }

    #[test]
    fn show_single_section() {
        let mut config = U2PostConfig::default();
        config.spool.prefix = "unified2.alert.".to_owned();

        let report = show_report(&config, Path::new("u2post.toml"), Some("spool")).unwrap();
        assert_eq!(report.section.as_deref(), Some("spool"));
        assert_eq!(
            report.config["prefix"].as_str(),
            Some("unified2.alert.")
        );

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("config_toml").is_none());
        assert_eq!(json["config"]["prefix"], "unified2.alert.");
    }

    #[test]
    fn unknown_section_is_rejected() {
        let err = show_report(&U2PostConfig::default(), Path::new("u2post.toml"), Some("ebpf"))
            .unwrap_err();
        assert!(err.to_string().contains("unknown section: ebpf"));
    }

    #[test]
    fn validation_report_renders_errors() {
        let report = ConfigValidationReport {
            source: "/etc/u2post/u2post.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'spool.prefix'".to_owned()],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("INVALID"));
        assert!(output.contains("spool.prefix"));
    }
}
