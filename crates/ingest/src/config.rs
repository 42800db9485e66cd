//! 수집 파이프라인 설정
//!
//! [`IngestConfig`]는 core의 [`U2PostConfig`]에서 스풀/룰/레지스트리/스풀러
//! 섹션을 모아 파이프라인 런타임 설정으로 변환합니다.
//!
//! # 사용 예시
//! ```ignore
//! use u2post_core::U2PostConfig;
//! use u2post_ingest::config::IngestConfig;
//!
//! let core = U2PostConfig::load("/etc/u2post/u2post.toml").await?;
//! let config = IngestConfig::from_core(&core);
//! config.validate()?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use u2post_core::U2PostConfig;
use u2post_core::config::archived_name_matches_prefix;

use crate::error::IngestError;

/// 수집 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// 스풀 디렉토리
    pub spool_dir: PathBuf,
    /// 스풀 파일 접두어
    pub prefix: String,
    /// EOF에서 새 데이터를 기다리는 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 다 읽은 파일을 이름 변경으로 보관할지
    pub archive: bool,
    /// 보관 파일 접두어
    pub archive_prefix: String,
    /// 레코드 본문 최대 크기 (바이트)
    pub max_record_bytes: u32,

    /// gen-msg.map 경로 (빈 문자열이면 건너뜀)
    pub gen_msg_map_path: String,
    /// 룰 파일 경로 목록 (파일, 디렉토리, glob)
    pub rule_paths: Vec<String>,

    /// 체크포인트 파일 경로
    pub registry_file: PathBuf,

    /// 배치 용량
    pub spool_size: usize,
    /// 마지막 플러시 후 이 시간이 지나면 배치를 플러시 (밀리초)
    pub idle_timeout_ms: u64,
    /// 리더가 유휴 상태일 때 보류 중인 알림 단위를 내보내기까지의 시간 (밀리초)
    pub aggregate_flush_ms: u64,
    /// 발행 실패 후 재시도 대기 (밀리초)
    pub publish_retry_backoff_ms: u64,

    /// 모든 알림에 붙는 사용자 정의 필드
    pub fields: BTreeMap<String, String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::from("/var/log/snort"),
            prefix: "snort.log".to_owned(),
            poll_interval_ms: 500,
            archive: true,
            archive_prefix: "indexed_".to_owned(),
            max_record_bytes: u2post_unified2::reader::DEFAULT_MAX_RECORD_LEN,
            gen_msg_map_path: String::new(),
            rule_paths: Vec::new(),
            registry_file: PathBuf::from("/var/lib/u2post/u2post.registry"),
            spool_size: 1024,
            idle_timeout_ms: 1000,
            aggregate_flush_ms: 1000,
            publish_retry_backoff_ms: 1000,
            fields: BTreeMap::new(),
        }
    }
}

impl IngestConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &U2PostConfig) -> Self {
        Self {
            spool_dir: PathBuf::from(&core.spool.directory),
            prefix: core.spool.prefix.clone(),
            poll_interval_ms: core.spool.poll_interval_ms,
            archive: core.spool.archive,
            archive_prefix: core.spool.archive_prefix.clone(),
            max_record_bytes: core.spool.max_record_bytes,
            gen_msg_map_path: core.rules.gen_msg_map_path.clone(),
            rule_paths: core.rules.paths.clone(),
            registry_file: PathBuf::from(&core.registry.file),
            spool_size: core.spooler.spool_size,
            idle_timeout_ms: core.spooler.idle_timeout_ms,
            aggregate_flush_ms: core.spooler.aggregate_flush_ms,
            publish_retry_backoff_ms: core.spooler.publish_retry_backoff_ms,
            fields: core.output.fields.clone(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        const MAX_SPOOL_SIZE: usize = 100_000;
        const MAX_INTERVAL_MS: u64 = 3_600_000;

        if self.spool_dir.as_os_str().is_empty() {
            return Err(config_err("spool_dir", "must not be empty"));
        }

        if self.prefix.is_empty() {
            return Err(config_err("prefix", "must not be empty"));
        }

        if self.prefix.contains('/') {
            return Err(config_err("prefix", "must be a file name prefix, not a path"));
        }

        if self.archive && self.archive_prefix.is_empty() {
            return Err(config_err(
                "archive_prefix",
                "must not be empty when archive is enabled",
            ));
        }

        if self.archive && archived_name_matches_prefix(&self.prefix, &self.archive_prefix) {
            return Err(config_err(
                "archive_prefix",
                "archived files would match the spool prefix",
            ));
        }

        if self.registry_file.as_os_str().is_empty() {
            return Err(config_err("registry_file", "must not be empty"));
        }

        if self.spool_size == 0 || self.spool_size > MAX_SPOOL_SIZE {
            return Err(config_err("spool_size", format!("must be 1-{MAX_SPOOL_SIZE}")));
        }

        for (field, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("aggregate_flush_ms", self.aggregate_flush_ms),
            ("publish_retry_backoff_ms", self.publish_retry_backoff_ms),
        ] {
            if value == 0 || value > MAX_INTERVAL_MS {
                return Err(config_err(field, format!("must be 1-{MAX_INTERVAL_MS}")));
            }
        }

        if self.max_record_bytes < 8 {
            return Err(config_err("max_record_bytes", "must be at least 8"));
        }

        Ok(())
    }

    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 배치 유휴 플러시 주기
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// 보류 알림 단위 플러시 대기
    pub fn aggregate_flush(&self) -> Duration {
        Duration::from_millis(self.aggregate_flush_ms)
    }

    /// 발행 재시도 대기
    pub fn publish_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.publish_retry_backoff_ms)
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> IngestError {
    IngestError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스풀 디렉토리와 접두어를 설정합니다.
    pub fn spool(mut self, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.config.spool_dir = dir.into();
        self.config.prefix = prefix.into();
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 보관 여부를 설정합니다.
    pub fn archive(mut self, archive: bool) -> Self {
        self.config.archive = archive;
        self
    }

    /// gen-msg.map 경로를 설정합니다.
    pub fn gen_msg_map_path(mut self, path: impl Into<String>) -> Self {
        self.config.gen_msg_map_path = path.into();
        self
    }

    /// 룰 경로 목록을 설정합니다.
    pub fn rule_paths(mut self, paths: Vec<String>) -> Self {
        self.config.rule_paths = paths;
        self
    }

    /// 체크포인트 파일 경로를 설정합니다.
    pub fn registry_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.registry_file = path.into();
        self
    }

    /// 배치 용량을 설정합니다.
    pub fn spool_size(mut self, size: usize) -> Self {
        self.config.spool_size = size;
        self
    }

    /// 배치 유휴 플러시 주기(밀리초)를 설정합니다.
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// 보류 알림 단위 플러시 대기(밀리초)를 설정합니다.
    pub fn aggregate_flush_ms(mut self, ms: u64) -> Self {
        self.config.aggregate_flush_ms = ms;
        self
    }

    /// 발행 재시도 대기(밀리초)를 설정합니다.
    pub fn publish_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.publish_retry_backoff_ms = ms;
        self
    }

    /// 사용자 정의 필드를 하나 추가합니다.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.fields.insert(key.into(), value.into());
        self
    }

    /// 설정을 검증하고 `IngestConfig`를 생성합니다.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
