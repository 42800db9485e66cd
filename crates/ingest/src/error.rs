//! 수집 파이프라인 에러 타입
//!
//! [`IngestError`]는 스풀 tail, 레지스트라, 룰 인덱스, 발행 단계에서 발생하는
//! 에러를 표현합니다. `From<IngestError> for U2PostError` 변환이 있어
//! 상위 레이어에서 `?`로 전파할 수 있습니다.

use u2post_core::error::{ConfigError, PipelineError, PublishError, U2PostError};
use u2post_unified2::Unified2Error;

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// unified2 프레이밍/디코딩 에러
    #[error(transparent)]
    Unified2(#[from] Unified2Error),

    /// 스풀 디렉토리 에러
    #[error("spool error: {path}: {reason}")]
    Spool {
        /// 스풀 디렉토리 또는 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 체크포인트 파일 에러
    #[error("checkpoint error: {path}: {reason}")]
    Checkpoint {
        /// 체크포인트 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 룰 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 룰 파일 또는 패턴
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 다운스트림 발행 실패
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// glob 패턴 에러
    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl IngestError {
    /// 레코드 하나에 국한된 에러인지 확인합니다.
    ///
    /// 이런 에러는 로그를 남기고 다음 레코드로 진행합니다.
    pub fn is_record_local(&self) -> bool {
        matches!(self, Self::Unified2(e) if e.is_record_local())
    }

    /// 이벤트 레코드를 디코딩하지 못했는지
    pub fn is_event_decode(&self) -> bool {
        matches!(self, Self::Unified2(e) if e.is_event_decode())
    }
}

impl From<IngestError> for U2PostError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Unified2(e) => U2PostError::Decode(e.to_string()),
            IngestError::Checkpoint { .. } => U2PostError::Checkpoint(err.to_string()),
            IngestError::RuleLoad { .. } | IngestError::Regex(_) | IngestError::Glob(_) => {
                U2PostError::Rule(err.to_string())
            }
            IngestError::Publish(e) => U2PostError::Publish(e),
            IngestError::Config { field, reason } => {
                U2PostError::Config(ConfigError::InvalidValue { field, reason })
            }
            IngestError::Io(e) => U2PostError::Io(e),
            IngestError::Spool { .. } | IngestError::Channel(_) => {
                U2PostError::Pipeline(PipelineError::InitFailed(err.to_string()))
            }
        }
    }
}
