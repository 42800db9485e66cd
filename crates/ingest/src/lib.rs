//! # u2post-ingest
//!
//! unified2 스풀 디렉토리를 tail하여 알림을 보강하고 다운스트림으로 발행합니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 접두어 스풀 파일 순차 tail, 다 읽은 파일 보관
//! - [`rule`]: gen-msg.map과 Snort/Suricata 룰 파일의 `gid:sid` 인덱스
//! - [`alert`]: 알림 단위 → 출력 레코드 변환과 룰 보강
//! - [`buffer`]: 발행 배치 버퍼
//! - [`publish`]: 다운스트림 발행 인터페이스와 구현체
//! - [`registrar`]: `(파일, 오프셋)` 체크포인트
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! SpoolReader -> EventAggregator -> AlertBuilder -> AlertBuffer -> Publisher -> Registrar
//!     |                                 |                                          |
//!  ClosedFile                       RuleIndex                                  Archiver
//! ```

pub mod alert;
pub mod buffer;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod registrar;

pub mod collector;
pub mod rule;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{IngestPipeline, IngestPipelineBuilder};

// 설정
pub use config::{IngestConfig, IngestConfigBuilder};

// 에러
pub use error::IngestError;

// 수집기
pub use collector::{Archiver, ClosedFile, SpoolReader};

// 룰 인덱스
pub use rule::{LoadSummary, Rule, RuleIndex, RuleIndexBuilder, RuleKey, RuleLoader};

// 알림
pub use alert::{AlertBuilder, AlertEvent, AlertRecord};

// 발행
pub use publish::{ChannelPublisher, JsonLinesPublisher, Publisher};

// 체크포인트
pub use registrar::Registrar;

// 버퍼
pub use buffer::AlertBuffer;
