//! unified2 파일 리더
//!
//! [`RecordReader`]는 파일 하나에서 헤더+본문 프레임을 순서대로 읽습니다.
//! 쓰기 중인 파일을 tail하는 용도이므로, 헤더나 본문이 일부만 기록된
//! 상태를 만나면 레코드 시작 위치로 되돌린 뒤 [`ReadOutcome::Partial`]을
//! 반환합니다. 호출자는 나중에 같은 위치에서 다시 시도하면 됩니다.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::error::Unified2Error;
use crate::record::{HEADER_LEN, RawRecord, Record};

/// 기본 레코드 최대 크기 (16MB)
pub const DEFAULT_MAX_RECORD_LEN: u32 = 16 * 1024 * 1024;

/// 읽기 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// 완전한 레코드
    Record(T),
    /// 레코드 경계에서 파일이 끝남
    Eof,
    /// 레코드 일부만 기록되어 있음. 오프셋은 레코드 시작으로 되돌려졌다.
    Partial,
}

/// 단일 unified2 파일 리더
#[derive(Debug)]
pub struct RecordReader {
    file: File,
    path: PathBuf,
    offset: u64,
    max_record_len: u32,
}

impl RecordReader {
    /// 파일을 처음부터 읽도록 엽니다.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Unified2Error> {
        Self::open_at(path, 0).await
    }

    /// 파일을 열고 `offset`으로 이동합니다.
    pub async fn open_at(path: impl AsRef<Path>, offset: u64) -> Result<Self, Unified2Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(Self {
            file,
            path,
            offset,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        })
    }

    /// 레코드 본문 최대 크기를 지정합니다.
    pub fn with_max_record_len(mut self, max: u32) -> Self {
        self.max_record_len = max;
        self
    }

    /// 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 마지막으로 반환한 레코드 직후의 바이트 오프셋
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 현재 파일 크기
    pub async fn file_len(&self) -> Result<u64, Unified2Error> {
        Ok(self.file.metadata().await?.len())
    }

    /// 다음 원시 레코드를 읽습니다.
    pub async fn next_raw(&mut self) -> Result<ReadOutcome<RawRecord>, Unified2Error> {
        let start = self.offset;

        let mut header = [0u8; HEADER_LEN];
        let n = read_full(&mut self.file, &mut header).await?;
        if n == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if n < HEADER_LEN {
            self.rewind(start).await?;
            return Ok(ReadOutcome::Partial);
        }

        let record_type = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

        if length > self.max_record_len {
            self.rewind(start).await?;
            return Err(Unified2Error::RecordTooLarge {
                offset: start,
                length,
                max: self.max_record_len,
            });
        }

        let mut body = BytesMut::zeroed(length as usize);
        let n = read_full(&mut self.file, &mut body).await?;
        if n < body.len() {
            tracing::trace!(
                path = %self.path.display(),
                offset = start,
                have = n,
                want = length,
                "partial record body, rewinding"
            );
            self.rewind(start).await?;
            return Ok(ReadOutcome::Partial);
        }

        self.offset = start + (HEADER_LEN as u64) + u64::from(length);
        Ok(ReadOutcome::Record(RawRecord::new(record_type, body.freeze())))
    }

    /// 다음 레코드를 읽고 디코딩합니다.
    ///
    /// 알 수 없는 타입의 레코드는 건너뜁니다. 디코딩 에러가 나도 오프셋은
    /// 이미 해당 레코드 뒤로 이동해 있으므로 다시 호출하면 다음 레코드를 읽습니다.
    pub async fn next_record(&mut self) -> Result<ReadOutcome<Record>, Unified2Error> {
        loop {
            let raw = match self.next_raw().await? {
                ReadOutcome::Record(raw) => raw,
                ReadOutcome::Eof => return Ok(ReadOutcome::Eof),
                ReadOutcome::Partial => return Ok(ReadOutcome::Partial),
            };
            match raw.decode()? {
                Some(record) => return Ok(ReadOutcome::Record(record)),
                None => {
                    tracing::debug!(
                        path = %self.path.display(),
                        record_type = raw.record_type,
                        "skipping unknown record type"
                    );
                }
            }
        }
    }

    async fn rewind(&mut self, offset: u64) -> Result<(), Unified2Error> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.offset = offset;
        Ok(())
    }
}

/// `buf`가 찰 때까지 읽습니다. EOF면 그때까지 읽은 바이트 수를 반환합니다.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
