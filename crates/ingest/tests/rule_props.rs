//! 룰 줄 파서 속성 테스트
//!
//! - 임의의 문자열은 패닉 없이 파싱된다
//! - 생성한 룰 줄은 gid/sid/msg가 그대로 추출된다
//! - `\`로 끝나는 룰 줄은 항상 여러 줄 룰이다

use proptest::prelude::*;
use u2post_ingest::RuleKey;
use u2post_ingest::rule::{RuleLine, parse_rule_line};

fn actions() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "alert", "log", "pass", "activate", "dynamic", "drop", "reject", "sdrop",
    ])
}

proptest! {
    #[test]
    fn arbitrary_lines_never_panic(line in ".*") {
        let _ = parse_rule_line(&line);
    }

    #[test]
    fn generated_rules_extract_fields(
        action in actions(),
        gid in proptest::option::of(any::<u32>()),
        sid in any::<u32>(),
        msg in "[A-Za-z0-9 ._-]{1,40}",
    ) {
        let gid_opt = gid.map(|g| format!(" gid:{g};")).unwrap_or_default();
        let line = format!(
            "{action} tcp any any -> any any (msg:\"{msg}\";{gid_opt} sid:{sid}; rev:1;)"
        );
        let parsed = parse_rule_line(&line);
        prop_assert_eq!(
            parsed,
            RuleLine::Rule { key: RuleKey::new(gid.unwrap_or(1), sid), msg: msg.as_str() }
        );
    }

    #[test]
    fn trailing_backslash_is_multi_line(action in actions(), body in "[a-z :;()\"]{0,40}") {
        let line = format!("{action} {body} \\");
        prop_assert_eq!(parse_rule_line(&line), RuleLine::MultiLine);
    }
}
