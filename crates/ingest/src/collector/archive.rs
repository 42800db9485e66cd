//! 처리 완료 파일 보관
//!
//! [`Archiver`]는 닫힘 알림을 받은 스풀 파일을
//! `<디렉토리>/<archive_prefix><unix초>.<파일명>`으로 이름을 바꿉니다.
//! 보관된 파일은 스풀 접두어와 일치하지 않으므로 다시 스캔되지 않습니다.
//! 알림은 플러시 태스크가 해당 파일의 알림을 모두 발행하고
//! 체크포인트를 다음 파일로 옮긴 뒤에야 전달됩니다.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use u2post_core::metrics as m;

use super::ClosedFile;
use crate::error::IngestError;

/// 스풀 파일 보관기
#[derive(Debug, Clone)]
pub struct Archiver {
    prefix: String,
    enabled: bool,
}

impl Archiver {
    /// 새 보관기를 생성합니다. `enabled`가 false면 알림을 기록만 합니다.
    pub fn new(prefix: impl Into<String>, enabled: bool) -> Self {
        Self {
            prefix: prefix.into(),
            enabled,
        }
    }

    /// 보관 후 경로
    pub fn archived_path(&self, closed: &ClosedFile, unix_secs: u64) -> Option<PathBuf> {
        let name = closed.path.file_name()?.to_string_lossy();
        let dir = closed.path.parent()?;
        Some(dir.join(format!("{}{unix_secs}.{name}", self.prefix)))
    }

    /// 파일 하나를 보관합니다.
    ///
    /// 보관이 꺼져 있으면 `Ok(None)`입니다.
    pub async fn archive(&self, closed: &ClosedFile) -> Result<Option<PathBuf>, IngestError> {
        if !self.enabled {
            tracing::debug!(path = %closed.path.display(), "archiving disabled, leaving file in place");
            return Ok(None);
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let Some(target) = self.archived_path(closed, now) else {
            return Err(IngestError::Spool {
                path: closed.path.display().to_string(),
                reason: "not a file path".to_owned(),
            });
        };

        let result = tokio::fs::rename(&closed.path, &target).await;
        let label = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!(m::SPOOL_FILES_ARCHIVED_TOTAL, m::LABEL_RESULT => label).increment(1);
        result.map_err(|e| IngestError::Spool {
            path: closed.path.display().to_string(),
            reason: format!("failed to archive: {e}"),
        })?;

        tracing::info!(
            path = %closed.path.display(),
            archived = %target.display(),
            "archived spool file"
        );
        Ok(Some(target))
    }

    /// 채널이 닫힐 때까지 알림을 받아 보관합니다.
    ///
    /// 개별 실패는 경고만 남깁니다.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<ClosedFile>) {
        while let Some(closed) = rx.recv().await {
            if let Err(e) = self.archive(&closed).await {
                tracing::warn!(error = %e, "spool file archive failed");
            }
        }
        tracing::debug!("archiver stopped");
    }
}
