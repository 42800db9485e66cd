#![no_main]

use libfuzzer_sys::fuzz_target;

use u2post_ingest::RuleIndexBuilder;

fuzz_target!(|files: Vec<String>| {
    let mut builder = RuleIndexBuilder::new();
    for (i, content) in files.iter().enumerate() {
        if i == 0 {
            builder.add_gen_msg_map("gen-msg.map", content);
        } else {
            builder.add_rule_file(format!("{i}.rules"), content);
        }
    }
    let index = builder.build();

    // 요약은 실제 인덱스 내용과 일치해야 한다
    let summary = index.summary();
    assert_eq!(summary.rules_loaded, index.len());
    assert_eq!(summary.files_read, files.len());
    for rule in index.rules() {
        assert!(index.source_path(rule).is_some());
        assert!(rule.line_number >= 1);
    }
});
