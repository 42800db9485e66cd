//! 시그니처 룰 인덱스
//!
//! gen-msg.map과 Snort/Suricata 룰 파일에서 `(gid, sid) → Rule` 인덱스를 만듭니다.
//! 인덱스는 로딩이 끝나면 변경되지 않으며, 파이프라인에 `Arc`로 공유됩니다.
//!
//! # 입력 형식
//! ```text
//! # gen-msg.map
//! 1 || 1 || snort general alert
//! 116 || 150 || (snort decoder) Bad Traffic Loopback IP
//!
//! # *.rules
//! alert tcp any any -> any 80 (msg:"ET WEB_SERVER Possible SQL Injection"; sid:2010963; rev:3;)
//! ```
//!
//! # 충돌 정책
//! 같은 키가 다시 나오면 먼저 등록된 룰이 남고, 뒤의 것은 거부되어
//! [`LoadSummary::duplicate_rejected`]로 집계됩니다. 줄 끝이 `\`인
//! 여러 줄 룰은 파싱하지 않고 [`LoadSummary::multi_line_rejected`]로 집계됩니다.
//!
//! # 아키텍처
//! - [`RuleIndex`]: 조회 전용 인덱스와 출처 파일 테이블
//! - [`RuleIndexBuilder`]: 텍스트를 받아 인덱스를 쌓는 동기 빌더
//! - [`loader`]: 경로 확장과 파일 읽기 (비동기)
//! - [`types`]: [`Rule`], [`RuleKey`], [`LoadSummary`]

pub mod loader;
pub mod types;

pub use loader::RuleLoader;
pub use types::{LoadSummary, Rule, RuleKey};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// 룰 동작 키워드로 시작하는 줄만 후보가 된다
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(alert|log|pass|activate|dynamic|drop|reject|sdrop)")
        .expect("invalid rule action regex")
});
static GID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gid\s*:\s*(\d+);").expect("invalid rule gid regex")
});
static SID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"sid\s*:\s*(\d+);").expect("invalid rule sid regex")
});
static MSG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"msg\s*:\s*"(.*?)";"#).expect("invalid rule msg regex")
});

/// gid가 없는 룰의 기본 generator id (Snort 엔진 본체)
pub const DEFAULT_GID: u32 = 1;

/// 룰 줄 하나의 파싱 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLine<'a> {
    /// 룰이 아닌 줄 (주석, 빈 줄, 필수 필드 누락)
    NotARule,
    /// `\`로 끝나는 여러 줄 룰
    MultiLine,
    /// 인덱싱할 수 있는 룰
    Rule {
        /// 키
        key: RuleKey,
        /// 메시지
        msg: &'a str,
    },
}

/// 룰 파일의 한 줄을 파싱합니다.
///
/// 앞뒤 공백은 무시합니다. `sid`와 `msg`는 필수이고 `gid`는 없으면 1입니다.
/// 숫자가 `u32` 범위를 넘으면 룰이 아닌 것으로 취급합니다.
pub fn parse_rule_line(line: &str) -> RuleLine<'_> {
    let line = line.trim();
    if line.is_empty() || !ACTION_RE.is_match(line) {
        return RuleLine::NotARule;
    }
    if line.ends_with('\\') {
        return RuleLine::MultiLine;
    }

    let gid = match GID_RE.captures(line) {
        Some(caps) => match caps[1].parse::<u32>() {
            Ok(gid) => gid,
            Err(_) => return RuleLine::NotARule,
        },
        None => DEFAULT_GID,
    };
    let Some(sid) = SID_RE
        .captures(line)
        .and_then(|caps| caps[1].parse::<u32>().ok())
    else {
        return RuleLine::NotARule;
    };
    let Some(msg) = MSG_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return RuleLine::NotARule;
    };

    RuleLine::Rule {
        key: RuleKey::new(gid, sid),
        msg,
    }
}

/// gen-msg.map의 한 줄을 파싱합니다 (`gid || sid || message`).
///
/// 필드가 3개 미만이거나 gid/sid가 숫자가 아니면 `None`입니다.
pub fn parse_gen_msg_line(line: &str) -> Option<(RuleKey, &str)> {
    let mut fields = line.split("||");
    let gid = fields.next()?.trim().parse::<u32>().ok()?;
    let sid = fields.next()?.trim().parse::<u32>().ok()?;
    let msg = fields.next()?.trim();
    Some((RuleKey::new(gid, sid), msg))
}

/// 조회 전용 룰 인덱스
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    rules: HashMap<RuleKey, Rule>,
    sources: Vec<PathBuf>,
    summary: LoadSummary,
}

impl RuleIndex {
    /// 빈 인덱스 (룰 보강 없이 동작할 때)
    pub fn empty() -> Self {
        Self::default()
    }

    /// 키로 룰을 찾습니다.
    pub fn get(&self, gid: u32, sid: u32) -> Option<&Rule> {
        self.rules.get(&RuleKey::new(gid, sid))
    }

    /// 키로 룰을 찾습니다.
    pub fn lookup(&self, key: RuleKey) -> Option<&Rule> {
        self.rules.get(&key)
    }

    /// 룰의 출처 파일 경로
    pub fn source_path(&self, rule: &Rule) -> Option<&Path> {
        self.sources.get(rule.source_index).map(PathBuf::as_path)
    }

    /// 출처 파일 테이블
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// 인덱싱된 룰 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 인덱스가 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 로딩 요약
    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// 모든 룰 (순서 없음)
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }
}

/// 텍스트 입력으로 [`RuleIndex`]를 쌓는 빌더
///
/// gen-msg.map을 먼저 넣고 룰 파일을 순서대로 넣으면 디스크 로더와 같은
/// 결과가 나옵니다.
#[derive(Debug, Default)]
pub struct RuleIndexBuilder {
    index: RuleIndex,
}

impl RuleIndexBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// gen-msg.map 내용을 추가합니다.
    pub fn add_gen_msg_map(&mut self, path: impl Into<PathBuf>, content: &str) -> &mut Self {
        let source_index = self.push_source(path.into());
        for (idx, line) in content.lines().enumerate() {
            let Some((key, msg)) = parse_gen_msg_line(line) else {
                continue;
            };
            self.insert(Rule {
                gid: key.gid,
                sid: key.sid,
                source_index,
                line_number: idx + 1,
                msg: msg.to_owned(),
                raw: line.to_owned(),
            });
        }
        self
    }

    /// 룰 파일 내용을 추가합니다.
    pub fn add_rule_file(&mut self, path: impl Into<PathBuf>, content: &str) -> &mut Self {
        let source_index = self.push_source(path.into());
        for (idx, line) in content.lines().enumerate() {
            let line_number = idx + 1;
            match parse_rule_line(line) {
                RuleLine::NotARule => {}
                RuleLine::MultiLine => {
                    self.index.summary.multi_line_rejected += 1;
                    tracing::warn!(
                        path = %self.index.sources[source_index].display(),
                        line = line_number,
                        "ignoring multi-line rule"
                    );
                }
                RuleLine::Rule { key, msg } => {
                    self.insert(Rule {
                        gid: key.gid,
                        sid: key.sid,
                        source_index,
                        line_number,
                        msg: msg.to_owned(),
                        raw: line.trim().to_owned(),
                    });
                }
            }
        }
        self
    }

    /// 인덱스를 완성합니다.
    pub fn build(mut self) -> RuleIndex {
        self.index.summary.rules_loaded = self.index.rules.len();
        self.index
    }

    fn push_source(&mut self, path: PathBuf) -> usize {
        self.index.sources.push(path);
        self.index.summary.files_read += 1;
        self.index.sources.len() - 1
    }

    fn insert(&mut self, rule: Rule) {
        let key = rule.key();
        if let Some(existing) = self.index.rules.get(&key) {
            self.index.summary.duplicate_rejected += 1;
            tracing::warn!(
                key = %key,
                path = %self.index.sources[rule.source_index].display(),
                line = rule.line_number,
                kept_path = %self.index.sources[existing.source_index].display(),
                kept_line = existing.line_number,
                "ignoring duplicate rule"
            );
            return;
        }
        self.index.rules.insert(key, rule);
    }
}
