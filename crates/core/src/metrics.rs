//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 컴포넌트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `u2post_`
//! - 컴포넌트명: `spool_`, `decode_`, `rules_`, `publish_`, `checkpoint_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 레코드 종류 레이블 키 (event, packet, extra_data)
pub const LABEL_RECORD_KIND: &str = "kind";

/// 심각도 레이블 키 (info, low, medium, high)
pub const LABEL_SEVERITY: &str = "severity";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 스풀 리더 메트릭 ──────────────────────────────────────────────

/// 스풀에서 읽은 레코드 수 (counter, label: kind)
pub const SPOOL_RECORDS_READ_TOTAL: &str = "u2post_spool_records_read_total";

/// 알 수 없는 타입이라 건너뛴 레코드 수 (counter)
pub const SPOOL_RECORDS_UNKNOWN_TOTAL: &str = "u2post_spool_records_unknown_total";

/// 다음 파일로 넘어간 횟수 (counter)
pub const SPOOL_FILES_ROLLED_TOTAL: &str = "u2post_spool_files_rolled_total";

/// 보관(이름 변경)된 파일 수 (counter, label: result)
pub const SPOOL_FILES_ARCHIVED_TOTAL: &str = "u2post_spool_files_archived_total";

// ─── 디코더 메트릭 ─────────────────────────────────────────────────

/// 디코딩 실패 레코드 수 (counter)
pub const DECODE_ERRORS_TOTAL: &str = "u2post_decode_errors_total";

// ─── 룰 인덱스 메트릭 ──────────────────────────────────────────────

/// 로드된 룰 수 (gauge)
pub const RULES_LOADED: &str = "u2post_rules_loaded";

/// 인덱스에 없는 시그니처 조회 수 (counter)
pub const RULES_MISSING_TOTAL: &str = "u2post_rules_missing_total";

// ─── 발행 메트릭 ───────────────────────────────────────────────────

/// 발행된 알림 수 (counter, label: severity)
pub const PUBLISH_ALERTS_TOTAL: &str = "u2post_publish_alerts_total";

/// 발행 실패 배치 수 (counter)
pub const PUBLISH_FAILURES_TOTAL: &str = "u2post_publish_failures_total";

/// 배치 발행 소요 시간 (histogram, 초)
pub const PUBLISH_DURATION_SECONDS: &str = "u2post_publish_duration_seconds";

// ─── 체크포인트 메트릭 ─────────────────────────────────────────────

/// 체크포인트 저장 시도 수 (counter, label: result)
pub const CHECKPOINT_PERSIST_TOTAL: &str = "u2post_checkpoint_persist_total";

// ─── 데몬 메트릭 ───────────────────────────────────────────────────

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "u2post_daemon_uptime_seconds";

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "u2post_daemon_build_info";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        SPOOL_RECORDS_READ_TOTAL,
        "Total number of unified2 records read from the spool"
    );
    describe_counter!(
        SPOOL_RECORDS_UNKNOWN_TOTAL,
        "Total number of records skipped because of an unknown type tag"
    );
    describe_counter!(
        SPOOL_FILES_ROLLED_TOTAL,
        "Total number of times the reader rolled over to a newer spool file"
    );
    describe_counter!(
        SPOOL_FILES_ARCHIVED_TOTAL,
        "Total number of consumed spool files renamed by the archiver"
    );
    describe_counter!(
        DECODE_ERRORS_TOTAL,
        "Total number of records that failed to decode"
    );
    describe_gauge!(RULES_LOADED, "Number of signature rules in the rule index");
    describe_counter!(
        RULES_MISSING_TOTAL,
        "Total number of alerts whose gid:sid was not in the rule index"
    );
    describe_counter!(
        PUBLISH_ALERTS_TOTAL,
        "Total number of enriched alerts published downstream"
    );
    describe_counter!(
        PUBLISH_FAILURES_TOTAL,
        "Total number of batch publish attempts that failed"
    );
    describe_histogram!(
        PUBLISH_DURATION_SECONDS,
        "Time to publish a single batch in seconds"
    );
    describe_counter!(
        CHECKPOINT_PERSIST_TOTAL,
        "Total number of checkpoint persist attempts"
    );
    describe_gauge!(DAEMON_UPTIME_SECONDS, "u2post daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "u2post daemon build information (always 1, labeled by version)"
    );
}
