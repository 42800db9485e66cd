#![no_main]

use libfuzzer_sys::fuzz_target;

use u2post_ingest::rule::{RuleLine, parse_gen_msg_line, parse_rule_line};

fuzz_target!(|line: &str| {
    // 임의의 줄에서도 패닉 없이 분류되어야 한다
    if let RuleLine::Rule { msg, .. } = parse_rule_line(line) {
        assert!(!msg.contains('\n'));
    }
    let _ = parse_gen_msg_line(line);
});
