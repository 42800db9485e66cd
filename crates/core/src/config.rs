//! 설정 관리 -- u2post.toml 파싱 및 런타임 설정
//!
//! [`U2PostConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`U2POST_SPOOL_DIRECTORY=/var/log/snort` 형식)
//! 3. 설정 파일 (`u2post.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), u2post_core::error::U2PostError> {
//! use u2post_core::config::U2PostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = U2PostConfig::load("u2post.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = U2PostConfig::parse("[spool]\nprefix = \"snort.log\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, U2PostError};

/// u2post 통합 설정
///
/// `u2post.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct U2PostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스풀 디렉토리 설정
    #[serde(default)]
    pub spool: SpoolConfig,
    /// 시그니처 룰 설정
    #[serde(default)]
    pub rules: RulesConfig,
    /// 체크포인트 설정
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 배치 스풀러 설정
    #[serde(default)]
    pub spooler: SpoolerConfig,
    /// 출력 설정
    #[serde(default)]
    pub output: OutputConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl U2PostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, U2PostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, U2PostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                U2PostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                U2PostError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, U2PostError> {
        toml::from_str(toml_str).map_err(|e| {
            U2PostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `U2POST_{SECTION}_{FIELD}`
    /// 예: `U2POST_SPOOL_PREFIX=snort.log`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "U2POST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "U2POST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "U2POST_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "U2POST_GENERAL_PID_FILE");

        // Spool
        override_string(&mut self.spool.directory, "U2POST_SPOOL_DIRECTORY");
        override_string(&mut self.spool.prefix, "U2POST_SPOOL_PREFIX");
        override_u64(
            &mut self.spool.poll_interval_ms,
            "U2POST_SPOOL_POLL_INTERVAL_MS",
        );
        override_bool(&mut self.spool.archive, "U2POST_SPOOL_ARCHIVE");
        override_string(&mut self.spool.archive_prefix, "U2POST_SPOOL_ARCHIVE_PREFIX");
        override_u32(
            &mut self.spool.max_record_bytes,
            "U2POST_SPOOL_MAX_RECORD_BYTES",
        );

        // Rules
        override_string(
            &mut self.rules.gen_msg_map_path,
            "U2POST_RULES_GEN_MSG_MAP_PATH",
        );
        override_csv(&mut self.rules.paths, "U2POST_RULES_PATHS");

        // Registry
        override_string(&mut self.registry.file, "U2POST_REGISTRY_FILE");

        // Spooler
        override_usize(&mut self.spooler.spool_size, "U2POST_SPOOLER_SPOOL_SIZE");
        override_u64(
            &mut self.spooler.idle_timeout_ms,
            "U2POST_SPOOLER_IDLE_TIMEOUT_MS",
        );
        override_u64(
            &mut self.spooler.aggregate_flush_ms,
            "U2POST_SPOOLER_AGGREGATE_FLUSH_MS",
        );
        override_u64(
            &mut self.spooler.publish_retry_backoff_ms,
            "U2POST_SPOOLER_PUBLISH_RETRY_BACKOFF_MS",
        );

        // Output
        override_string(&mut self.output.kind, "U2POST_OUTPUT_KIND");
        override_string(&mut self.output.path, "U2POST_OUTPUT_PATH");

        // Metrics
        override_bool(&mut self.metrics.enabled, "U2POST_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "U2POST_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "U2POST_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), U2PostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.spool.directory.is_empty() {
            return Err(invalid("spool.directory", "must not be empty"));
        }

        // 빈 접두어는 보관(archive)된 파일까지 다시 스캔 대상으로 만든다
        if self.spool.prefix.is_empty() {
            return Err(invalid("spool.prefix", "must not be empty"));
        }

        if self.spool.archive
            && archived_name_matches_prefix(&self.spool.prefix, &self.spool.archive_prefix)
        {
            return Err(invalid(
                "spool.archive_prefix",
                "archived files would match spool.prefix",
            ));
        }

        if self.spool.poll_interval_ms == 0 {
            return Err(invalid("spool.poll_interval_ms", "must be greater than 0"));
        }

        // unified2 헤더(8바이트)보다 작은 상한은 의미가 없다
        if self.spool.max_record_bytes < 8 {
            return Err(invalid("spool.max_record_bytes", "must be at least 8"));
        }

        if self.registry.file.is_empty() {
            return Err(invalid("registry.file", "must not be empty"));
        }

        const MAX_SPOOL_SIZE: usize = 100_000;
        if self.spooler.spool_size == 0 || self.spooler.spool_size > MAX_SPOOL_SIZE {
            return Err(invalid(
                "spooler.spool_size",
                format!("must be 1-{MAX_SPOOL_SIZE}"),
            ));
        }

        if self.spooler.idle_timeout_ms == 0 {
            return Err(invalid("spooler.idle_timeout_ms", "must be greater than 0"));
        }

        let valid_outputs = ["stdout", "file"];
        if !valid_outputs.contains(&self.output.kind.as_str()) {
            return Err(invalid(
                "output.kind",
                format!("must be one of: {}", valid_outputs.join(", ")),
            ));
        }

        if self.output.kind == "file" && self.output.path.is_empty() {
            return Err(invalid(
                "output.path",
                "path must not be empty when output.kind is 'file'",
            ));
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid("metrics.endpoint", "only '/metrics' is supported"));
        }

        Ok(())
    }
}

/// 보관된 파일 이름(`<archive_prefix><secs>.<name>`)이 스풀 접두어에 걸리는지
///
/// 걸리면 보관된 파일이 새 후속 파일로 다시 읽힌다.
pub fn archived_name_matches_prefix(prefix: &str, archive_prefix: &str) -> bool {
    archive_prefix.starts_with(prefix)
        || prefix
            .strip_prefix(archive_prefix)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

fn invalid(field: &str, reason: impl Into<String>) -> U2PostError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/u2post".to_owned(),
            pid_file: "/var/run/u2post.pid".to_owned(),
        }
    }
}

/// 스풀 디렉토리 설정
///
/// Snort/Suricata가 unified2 파일을 기록하는 디렉토리와 파일명 접두어.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// 스풀 디렉토리
    pub directory: String,
    /// 파일명 접두어 (예: "snort.log")
    pub prefix: String,
    /// EOF 대기 시 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 다 읽은 파일의 이름 변경 여부
    pub archive: bool,
    /// 보관 파일명 접두어
    pub archive_prefix: String,
    /// 단일 레코드 최대 크기 (바이트)
    pub max_record_bytes: u32,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            directory: "/var/log/snort".to_owned(),
            prefix: "snort.log".to_owned(),
            poll_interval_ms: 500,
            archive: true,
            archive_prefix: "indexed_".to_owned(),
            max_record_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// 시그니처 룰 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// gen-msg.map 파일 경로 (빈 문자열이면 생략)
    pub gen_msg_map_path: String,
    /// 룰 파일 경로 목록 (파일, 디렉토리, glob 패턴)
    pub paths: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            gen_msg_map_path: "/etc/snort/gen-msg.map".to_owned(),
            paths: vec!["/etc/snort/rules/*.rules".to_owned()],
        }
    }
}

/// 체크포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 체크포인트 파일 경로
    pub file: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            file: "/var/lib/u2post/u2post.registry".to_owned(),
        }
    }
}

/// 배치 스풀러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolerConfig {
    /// 배치 최대 크기
    pub spool_size: usize,
    /// 마지막 플러시 이후 유휴 플러시까지의 시간 (밀리초)
    pub idle_timeout_ms: u64,
    /// 리더 유휴 시 보류 중인 알림 단위를 내보내기까지의 시간 (밀리초)
    pub aggregate_flush_ms: u64,
    /// 발행 실패 후 재시도 간격 (밀리초)
    pub publish_retry_backoff_ms: u64,
}

impl Default for SpoolerConfig {
    fn default() -> Self {
        Self {
            spool_size: 1024,
            idle_timeout_ms: 1000,
            aggregate_flush_ms: 1000,
            publish_retry_backoff_ms: 1000,
        }
    }
}

/// 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 출력 종류 (stdout, file)
    pub kind: String,
    /// 출력 파일 경로 (kind = "file"일 때)
    pub path: String,
    /// 모든 레코드에 추가할 사용자 정의 필드
    pub fields: BTreeMap<String, String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            kind: "stdout".to_owned(),
            path: String::new(),
            fields: BTreeMap::new(),
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 스크레이프 엔드포인트
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9108,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
