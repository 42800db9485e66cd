//! 스풀 디렉토리 tail 리더
//!
//! 디렉토리에서 접두어가 같은 파일을 이름순으로 읽어 하나의 끝없는 레코드
//! 스트림으로 만듭니다. 이름순이 곧 생성순이어야 합니다 (Snort의
//! `snort.log.<unix초>` 명명 규칙).
//!
//! # 상태
//! ```text
//! 열린 파일 없음 ──(후보 있음)──▶ 파일 열림 ──EOF──▶ 다음 파일 있음? ──예──▶ 파일 열림
//!       ▲                                              │
//!       └──────────────────(없음: 유휴)─────────────────┘
//! ```
//!
//! 다음 파일로 넘어갈 때 이전 파일은 닫히고, 새 파일을 열기 전에
//! [`ClosedFile`] 알림이 채널로 나갑니다. 알림 순서는 파일 순서와 같고,
//! 파일마다 정확히 한 번입니다.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use u2post_core::SpoolPosition;
use u2post_core::metrics as m;
use u2post_unified2::{ReadOutcome, Record, RecordReader, Unified2Error};

use crate::error::IngestError;

/// 다 읽고 넘어간 스풀 파일 알림
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedFile {
    /// 닫힌 파일의 절대 경로
    pub path: PathBuf,
    /// 이어서 연 파일명
    pub successor: String,
}

/// 스풀 디렉토리 tail 리더
pub struct SpoolReader {
    dir: PathBuf,
    prefix: String,
    max_record_len: u32,
    current: Option<RecordReader>,
    current_name: String,
    record_start: u64,
    closed_tx: mpsc::UnboundedSender<ClosedFile>,
}

impl SpoolReader {
    /// 리더와 닫힘 알림 수신 채널을 생성합니다.
    pub fn new(
        dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        max_record_len: u32,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClosedFile>), IngestError> {
        let dir = dir.as_ref();
        let dir = std::path::absolute(dir).map_err(|e| IngestError::Spool {
            path: dir.display().to_string(),
            reason: format!("failed to resolve absolute path: {e}"),
        })?;
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                dir,
                prefix: prefix.into(),
                max_record_len,
                current: None,
                current_name: String::new(),
                record_start: 0,
                closed_tx,
            },
            closed_rx,
        ))
    }

    /// 스풀 디렉토리 (절대 경로)
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 현재 열린 파일 경로
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(RecordReader::path)
    }

    /// 마지막으로 반환한 레코드 직후 위치
    ///
    /// 아직 아무 파일도 열지 않았다면 빈 위치입니다.
    pub fn position(&self) -> SpoolPosition {
        let offset = self.current.as_ref().map_or(0, RecordReader::offset);
        SpoolPosition::new(self.current_name.clone(), offset)
    }

    /// 마지막으로 반환한 레코드의 시작 위치
    pub fn record_start(&self) -> SpoolPosition {
        SpoolPosition::new(self.current_name.clone(), self.record_start)
    }

    /// 체크포인트 위치에서 읽기를 재개하도록 설정합니다.
    ///
    /// 해당 파일이 없으면 처음부터 시작하고, 오프셋이 파일 크기보다 크면
    /// 그 파일을 처음부터 다시 읽습니다.
    pub async fn seek(&mut self, position: &SpoolPosition) -> Result<(), IngestError> {
        self.current = None;
        self.current_name.clear();
        self.record_start = 0;

        if position.is_empty() {
            return Ok(());
        }

        let path = self.dir.join(&position.source);
        let len = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                tracing::info!(
                    path = %path.display(),
                    "checkpointed spool file is gone, starting from the first file"
                );
                return Ok(());
            }
        };

        let offset = if position.offset > len {
            tracing::warn!(
                path = %path.display(),
                offset = position.offset,
                len,
                "checkpoint offset is past end of file, rereading from start"
            );
            0
        } else {
            position.offset
        };

        self.open(&position.source, offset).await?;
        tracing::info!(path = %path.display(), offset, "resuming spool from checkpoint");
        Ok(())
    }

    /// 접두어가 일치하는 일반 파일의 이름을 정렬해 반환합니다.
    pub async fn candidates(&self) -> Result<Vec<String>, IngestError> {
        let spool_err = |reason: String| IngestError::Spool {
            path: self.dir.display().to_string(),
            reason,
        };

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| spool_err(format!("failed to read directory: {e}")))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| spool_err(format!("failed to read directory entry: {e}")))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(&self.prefix) {
                continue;
            }
            if tokio::fs::metadata(entry.path())
                .await
                .is_ok_and(|meta| meta.is_file())
            {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// 다음에 열 파일명
    ///
    /// 열린 파일이 없으면 첫 후보, 있으면 현재 파일명보다 뒤에 오는 첫 후보입니다.
    async fn successor(&self) -> Result<Option<String>, IngestError> {
        let names = self.candidates().await?;
        Ok(names.into_iter().find(|name| *name > self.current_name))
    }

    /// 다음 레코드를 읽습니다.
    ///
    /// 현재 파일이 끝났고 다음 파일이 있으면 같은 호출 안에서 넘어갑니다.
    /// 더 읽을 것이 없으면 `Ok(None)`입니다. 디코딩 에러는 해당 레코드만의
    /// 문제이며, 위치는 이미 그 뒤로 이동해 있습니다.
    pub async fn next(&mut self) -> Result<Option<Record>, IngestError> {
        let mut rechecked = false;

        loop {
            if self.current.is_none() {
                match self.successor().await? {
                    Some(name) => self.open(&name, 0).await?,
                    None => return Ok(None),
                }
            }
            let Some(reader) = self.current.as_mut() else {
                continue;
            };

            let start = reader.offset();
            let outcome = match reader.next_raw().await {
                Ok(outcome) => outcome,
                Err(Unified2Error::RecordTooLarge {
                    offset,
                    length,
                    max,
                }) => {
                    let Some(next) = self.successor().await? else {
                        return Err(Unified2Error::RecordTooLarge {
                            offset,
                            length,
                            max,
                        }
                        .into());
                    };
                    tracing::warn!(
                        path = %self.current_path_display(),
                        offset,
                        length,
                        max,
                        "abandoning spool file with oversized record"
                    );
                    self.roll_to(next).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match outcome {
                ReadOutcome::Record(raw) => {
                    rechecked = false;
                    self.record_start = start;
                    match raw.decode() {
                        Ok(Some(record)) => {
                            metrics::counter!(
                                m::SPOOL_RECORDS_READ_TOTAL,
                                m::LABEL_RECORD_KIND => record.kind_name()
                            )
                            .increment(1);
                            return Ok(Some(record));
                        }
                        Ok(None) => {
                            metrics::counter!(m::SPOOL_RECORDS_UNKNOWN_TOTAL).increment(1);
                            tracing::debug!(
                                path = %self.current_path_display(),
                                offset = start,
                                record_type = raw.record_type,
                                "skipping unknown record type"
                            );
                        }
                        Err(e) => {
                            metrics::counter!(m::DECODE_ERRORS_TOTAL).increment(1);
                            return Err(Unified2Error::Decode(e).into());
                        }
                    }
                }
                outcome @ (ReadOutcome::Eof | ReadOutcome::Partial) => {
                    let Some(next) = self.successor().await? else {
                        return Ok(None);
                    };
                    // 후속 파일이 생기기 직전에 덧붙은 레코드가 있을 수 있어 한 번 더 읽는다
                    if !rechecked {
                        rechecked = true;
                        continue;
                    }
                    if matches!(outcome, ReadOutcome::Partial) {
                        tracing::warn!(
                            path = %self.current_path_display(),
                            offset = start,
                            "spool file ends with a truncated record, moving on"
                        );
                    }
                    self.roll_to(next).await?;
                    rechecked = false;
                }
            }
        }
    }

    async fn open(&mut self, name: &str, offset: u64) -> Result<(), IngestError> {
        let path = self.dir.join(name);
        let reader = RecordReader::open_at(&path, offset)
            .await?
            .with_max_record_len(self.max_record_len);
        tracing::info!(path = %path.display(), offset, "opened spool file");
        self.current = Some(reader);
        self.current_name = name.to_owned();
        self.record_start = offset;
        Ok(())
    }

    /// 현재 파일을 닫고 알림을 보낸 뒤 `next`를 엽니다.
    async fn roll_to(&mut self, next: String) -> Result<(), IngestError> {
        if let Some(reader) = self.current.take() {
            let path = reader.path().to_path_buf();
            drop(reader);
            metrics::counter!(m::SPOOL_FILES_ROLLED_TOTAL).increment(1);
            tracing::info!(path = %path.display(), next = %next, "finished spool file");
            // 수신측이 없어도 읽기는 계속한다
            let _ = self.closed_tx.send(ClosedFile {
                path,
                successor: next.clone(),
            });
        }
        self.open(&next, 0).await
    }

    fn current_path_display(&self) -> String {
        self.current_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}
