//! # u2post-core
//!
//! u2post 워크스페이스의 공통 기반 크레이트입니다.
//!
//! - [`error`]: 최상위 에러 [`U2PostError`]와 도메인 에러
//! - [`config`]: `u2post.toml` 설정과 환경변수 오버라이드
//! - [`pipeline`]: 장기 실행 컴포넌트의 [`Pipeline`] trait
//! - [`event`]: 이벤트 메타데이터와 [`Event`] trait
//! - [`types`]: 체크포인트 위치, 심각도 등 공유 타입
//! - [`metrics`]: Prometheus 메트릭 이름

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, PublishError, U2PostError};

// 설정
pub use config::U2PostConfig;

// 이벤트
pub use event::{Event, EventMetadata};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 도메인 타입
pub use types::{Severity, SpoolPosition};
