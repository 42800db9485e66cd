//! 도메인 타입 -- 크레이트 전역에서 공유하는 타입

use std::fmt;

use serde::{Deserialize, Serialize};

/// 스풀 읽기 위치 -- 체크포인트 한 칸
///
/// 디스크에는 `{"offset": <int>, "source": "<파일명>"}` 형태로 저장됩니다.
/// `source`는 스풀 디렉토리 기준의 파일명(base name)이며, 빈 문자열은
/// 아직 아무것도 처리하지 않은 상태를 뜻합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpoolPosition {
    /// 마지막으로 처리한 레코드 직후의 바이트 오프셋
    pub offset: u64,
    /// 스풀 파일명
    pub source: String,
}

impl SpoolPosition {
    /// 새 위치를 생성합니다.
    pub fn new(source: impl Into<String>, offset: u64) -> Self {
        Self {
            offset,
            source: source.into(),
        }
    }

    /// 처리 이력이 없는 초기 상태인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl fmt::Display for SpoolPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<start>")
        } else {
            write!(f, "{}@{}", self.source, self.offset)
        }
    }
}

/// 심각도 레벨
///
/// Snort 우선순위(priority)에서 파생됩니다. 1이 가장 높습니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 정보성 (priority 4 이상 또는 0)
    #[default]
    Info,
    /// 낮음 (priority 3)
    Low,
    /// 중간 (priority 2)
    Medium,
    /// 높음 (priority 1)
    High,
}

impl Severity {
    /// Snort 우선순위 값을 심각도로 변환합니다.
    pub fn from_priority(priority: u32) -> Self {
        match priority {
            1 => Self::High,
            2 => Self::Medium,
            3 => Self::Low,
            _ => Self::Info,
        }
    }

    /// 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spool_position_json_shape() {
        let pos = SpoolPosition::new("snort.log.1500000000", 128);
        let json = serde_json::to_string(&pos).unwrap();
        assert_eq!(json, r#"{"offset":128,"source":"snort.log.1500000000"}"#);
    }

    #[test]
    fn spool_position_default_is_empty() {
        let pos = SpoolPosition::default();
        assert!(pos.is_empty());
        assert_eq!(pos.to_string(), "<start>");
    }

    #[test]
    fn severity_from_priority() {
        assert_eq!(Severity::from_priority(1), Severity::High);
        assert_eq!(Severity::from_priority(2), Severity::Medium);
        assert_eq!(Severity::from_priority(3), Severity::Low);
        assert_eq!(Severity::from_priority(4), Severity::Info);
        assert_eq!(Severity::from_priority(0), Severity::Info);
        assert!(Severity::High > Severity::Low);
    }
}
