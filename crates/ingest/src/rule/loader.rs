//! 룰 파일 로더 -- gen-msg.map과 룰 경로를 디스크에서 읽습니다.
//!
//! 룰 경로는 glob 패턴, 단일 파일, 디렉토리 중 하나입니다. 디렉토리는 바로 아래의
//! 일반 파일을 이름순으로 모두 룰 파일로 취급하고 하위 디렉토리는 건너뜁니다.
//! 아무것도 매칭하지 않는 경로, 읽을 수 없는 파일은 로딩 에러입니다.

use std::path::{Path, PathBuf};

use crate::error::IngestError;

use super::{RuleIndex, RuleIndexBuilder};

/// 룰 파일 하나의 최대 크기 (64MB)
const MAX_RULE_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// 룰 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// gen-msg.map과 룰 경로에서 인덱스를 만듭니다.
    ///
    /// `gen_msg_map_path`가 비어 있으면 gen-msg.map 없이 룰 파일만 읽습니다.
    ///
    /// # Errors
    /// - gen-msg.map 또는 룰 파일을 읽을 수 없는 경우
    /// - glob 패턴이 잘못되었거나 아무 파일도 매칭하지 않는 경우
    pub async fn load(
        gen_msg_map_path: &str,
        rule_paths: &[String],
    ) -> Result<RuleIndex, IngestError> {
        let mut builder = RuleIndexBuilder::new();

        if !gen_msg_map_path.is_empty() {
            let path = absolute(Path::new(gen_msg_map_path))?;
            let content = read_rule_file(&path).await?;
            builder.add_gen_msg_map(path, &content);
        }

        for path in Self::expand_paths(rule_paths).await? {
            let content = read_rule_file(&path).await?;
            tracing::debug!(path = %path.display(), "reading rule file");
            builder.add_rule_file(path, &content);
        }

        let index = builder.build();
        let summary = index.summary();
        metrics::gauge!(u2post_core::metrics::RULES_LOADED).set(summary.rules_loaded as f64);
        tracing::info!(
            files = summary.files_read,
            rules = summary.rules_loaded,
            multi_line_rejected = summary.multi_line_rejected,
            duplicate_rejected = summary.duplicate_rejected,
            "loaded signature rules"
        );
        Ok(index)
    }

    /// 룰 경로 목록을 실제 파일 목록으로 펼칩니다.
    ///
    /// 결과는 절대 경로이며, 경로 목록 순서와 각 패턴 안의 정렬 순서를 따릅니다.
    pub async fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>, IngestError> {
        let mut files = Vec::new();

        for pattern in patterns {
            let mut matched = 0usize;
            for entry in glob::glob(pattern)? {
                let path = entry.map_err(|e| IngestError::RuleLoad {
                    path: pattern.clone(),
                    reason: e.to_string(),
                })?;
                matched += 1;

                let metadata =
                    tokio::fs::metadata(&path)
                        .await
                        .map_err(|e| IngestError::RuleLoad {
                            path: path.display().to_string(),
                            reason: format!("failed to stat: {e}"),
                        })?;

                if metadata.is_dir() {
                    files.extend(list_directory(&path).await?);
                } else {
                    files.push(absolute(&path)?);
                }
            }

            if matched == 0 {
                return Err(IngestError::RuleLoad {
                    path: pattern.clone(),
                    reason: "pattern matched no files".to_owned(),
                });
            }
        }

        Ok(files)
    }
}

/// 디렉토리 바로 아래의 일반 파일을 이름순으로 나열합니다.
async fn list_directory(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let load_err = |reason: String| IngestError::RuleLoad {
        path: dir.display().to_string(),
        reason,
    };

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| load_err(format!("failed to read directory: {e}")))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| load_err(format!("failed to read directory entry: {e}")))?
    {
        let path = entry.path();
        // 심볼릭 링크는 따라간 결과로 판단
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(absolute(&path)?),
            Ok(_) => {
                tracing::debug!(path = %path.display(), "skipping non-file entry in rule directory");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable rule entry");
            }
        }
    }

    files.sort();
    Ok(files)
}

async fn read_rule_file(path: &Path) -> Result<String, IngestError> {
    let load_err = |reason: String| IngestError::RuleLoad {
        path: path.display().to_string(),
        reason,
    };

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| load_err(format!("failed to read file metadata: {e}")))?;
    if metadata.len() > MAX_RULE_FILE_SIZE {
        return Err(load_err(format!(
            "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
            metadata.len()
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| load_err(format!("failed to read file: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn absolute(path: &Path) -> Result<PathBuf, IngestError> {
    std::path::absolute(path).map_err(|e| IngestError::RuleLoad {
        path: path.display().to_string(),
        reason: format!("failed to resolve absolute path: {e}"),
    })
}
