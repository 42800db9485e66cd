//! 에러 타입 -- 도메인별 에러 정의
//!
//! 각 크레이트는 자체 도메인 에러를 정의하고 `From` 변환으로
//! [`U2PostError`]에 합류합니다.

/// u2post 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum U2PostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// unified2 레코드 디코딩 에러
    #[error("decode error: {0}")]
    Decode(String),

    /// 룰 인덱스 로딩 에러
    #[error("rule error: {0}")]
    Rule(String),

    /// 체크포인트(레지스트라) 에러
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// 다운스트림 발행 에러
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 다운스트림 발행 에러
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// 싱크에 기록 실패
    #[error("sink write failed: {0}")]
    Sink(String),

    /// 직렬화 실패
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// 수신측이 닫힘
    #[error("publisher closed")]
    Closed,
}
