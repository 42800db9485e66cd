//! Publisher construction from the `[output]` section.

use std::sync::Arc;

use anyhow::{Context, Result};
use u2post_core::config::OutputConfig;
use u2post_ingest::{JsonLinesPublisher, Publisher};

/// Build the downstream publisher selected by `output.kind`.
///
/// * `"stdout"` - one JSON alert per line on standard output
/// * `"file"` - one JSON alert per line appended to `output.path`
///
/// # Errors
///
/// Returns an error for an unknown kind or an output file that cannot be opened.
pub async fn build_publisher(config: &OutputConfig) -> Result<Arc<dyn Publisher>> {
    match config.kind.as_str() {
        "stdout" => Ok(Arc::new(JsonLinesPublisher::stdout())),
        "file" => {
            let publisher = JsonLinesPublisher::file(&config.path)
                .await
                .with_context(|| format!("failed to open output file {}", config.path))?;
            Ok(Arc::new(publisher))
        }
        other => Err(anyhow::anyhow!(
            "unknown output kind '{}', expected 'stdout' or 'file'",
            other
        )),
    }
}
