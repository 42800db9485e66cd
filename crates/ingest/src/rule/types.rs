//! 룰 인덱스 데이터 구조

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 룰 식별 키 (`gid:sid`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    /// generator id
    pub gid: u32,
    /// signature id
    pub sid: u32,
}

impl RuleKey {
    /// 새 키를 생성합니다.
    pub fn new(gid: u32, sid: u32) -> Self {
        Self { gid, sid }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.gid, self.sid)
    }
}

impl FromStr for RuleKey {
    type Err = String;

    /// `"gid:sid"` 또는 `"sid"`(gid=1)를 파싱합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid rule key '{s}': {e}"))
        };
        match s.split_once(':') {
            Some((gid, sid)) => Ok(Self::new(parse(gid)?, parse(sid)?)),
            None => Ok(Self::new(1, parse(s)?)),
        }
    }
}

/// 인덱싱된 시그니처 룰
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// generator id
    pub gid: u32,
    /// signature id
    pub sid: u32,
    /// 출처 파일 테이블 인덱스
    pub source_index: usize,
    /// 출처 파일 내 줄 번호 (1부터)
    pub line_number: usize,
    /// 룰 메시지 (`msg:"..."`)
    pub msg: String,
    /// 원문 줄
    pub raw: String,
}

impl Rule {
    /// 인덱스 키
    pub fn key(&self) -> RuleKey {
        RuleKey::new(self.gid, self.sid)
    }
}

/// 룰 로딩 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// 읽은 파일 수 (gen-msg.map 포함)
    pub files_read: usize,
    /// 인덱싱된 룰 수
    pub rules_loaded: usize,
    /// 여러 줄 룰이라 거부된 수
    pub multi_line_rejected: usize,
    /// 키 중복으로 거부된 수
    pub duplicate_rejected: usize,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rules from {} files ({} multi-line rejected, {} duplicates rejected)",
            self.rules_loaded, self.files_read, self.multi_line_rejected, self.duplicate_rejected
        )
    }
}
