//! 레지스트라 -- 스풀 읽기 위치 체크포인트
//!
//! 체크포인트는 한 칸짜리 저장소입니다. 마지막으로 발행이 확인된 위치
//! `(파일명, 오프셋)`만 `{"offset": N, "source": "..."}` JSON으로 디스크에 남깁니다.
//!
//! - 생성 시 같은 디렉토리에 `<파일>.access.test`를 만들고 지워 보며
//!   쓰기 권한을 확인합니다. 실패하면 시작 자체가 실패합니다.
//! - [`Registrar::load`]는 최선 노력입니다. 파일이 없거나 깨졌으면 빈 상태로 시작합니다.
//! - [`Registrar::persist`]는 임시 파일에 쓴 뒤 rename하므로 읽는 쪽은
//!   반쯤 쓰인 파일을 보지 않습니다.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use u2post_core::SpoolPosition;
use u2post_core::metrics as m;

use crate::error::IngestError;

/// 체크포인트 저장소
#[derive(Debug)]
pub struct Registrar {
    path: PathBuf,
    state: Mutex<SpoolPosition>,
}

impl Registrar {
    /// 레지스트라를 생성하고 체크포인트 경로의 쓰기 권한을 확인합니다.
    ///
    /// # Errors
    /// 탐침 파일을 만들거나 닫거나 지울 수 없으면 [`IngestError::Checkpoint`].
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let path = std::path::absolute(path).map_err(|e| checkpoint_err(path, e))?;

        let probe = sibling(&path, ".access.test");
        let file = tokio::fs::File::create(&probe)
            .await
            .map_err(|e| checkpoint_err(&path, format!("create access probe: {e}")))?;
        drop(file);
        tokio::fs::remove_file(&probe)
            .await
            .map_err(|e| checkpoint_err(&path, format!("remove access probe: {e}")))?;

        tracing::debug!(path = %path.display(), "registry path is writable");
        Ok(Self {
            path,
            state: Mutex::new(SpoolPosition::default()),
        })
    }

    /// 체크포인트 파일 경로 (절대 경로)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 디스크에서 체크포인트를 읽어 메모리 상태로 만듭니다.
    ///
    /// 실패하면 경고만 남기고 빈 상태를 유지합니다.
    pub async fn load(&self) -> SpoolPosition {
        let loaded = match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<SpoolPosition>(&bytes) {
                Ok(pos) => pos,
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "malformed registry file, starting from the beginning"
                    );
                    SpoolPosition::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no registry file, starting fresh");
                SpoolPosition::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read registry file, starting from the beginning"
                );
                SpoolPosition::default()
            }
        };

        let mut state = self.state.lock().await;
        *state = loaded.clone();
        loaded
    }

    /// 현재 메모리 상태
    pub async fn state(&self) -> SpoolPosition {
        self.state.lock().await.clone()
    }

    /// 메모리 상태를 바꿉니다 (디스크에는 쓰지 않음).
    pub async fn update(&self, position: SpoolPosition) {
        *self.state.lock().await = position;
    }

    /// 메모리 상태를 디스크에 씁니다.
    ///
    /// 쓰는 동안 잠금을 잡고 있으므로 동시에 호출된 `update`는 쓰기가 끝난 뒤 반영됩니다.
    pub async fn persist(&self) -> Result<(), IngestError> {
        let state = self.state.lock().await;
        let json = serde_json::to_vec(&*state).map_err(|e| checkpoint_err(&self.path, e))?;

        let result = self.write_atomic(&json).await;
        let label = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!(m::CHECKPOINT_PERSIST_TOTAL, m::LABEL_RESULT => label).increment(1);

        match &result {
            Ok(()) => tracing::debug!(position = %*state, "registry persisted"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to persist registry"
            ),
        }
        result
    }

    /// 상태를 바꾸고 곧바로 디스크에 씁니다.
    pub async fn checkpoint(&self, position: SpoolPosition) -> Result<(), IngestError> {
        self.update(position).await;
        self.persist().await
    }

    async fn write_atomic(&self, json: &[u8]) -> Result<(), IngestError> {
        let tmp = sibling(&self.path, ".tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| checkpoint_err(&self.path, format!("create temp file: {e}")))?;
        file.write_all(json)
            .await
            .map_err(|e| checkpoint_err(&self.path, format!("write temp file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| checkpoint_err(&self.path, format!("sync temp file: {e}")))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| checkpoint_err(&self.path, format!("rename temp file: {e}")))
    }
}

/// `<path><suffix>` 경로
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn checkpoint_err(path: &Path, reason: impl ToString) -> IngestError {
    IngestError::Checkpoint {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
