//! 통합 테스트 -- 디스크의 룰 파일에서 인덱스 구성

use std::path::Path;

use u2post_ingest::{RuleKey, RuleLoader};

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[tokio::test]
async fn first_rule_wins_across_map_and_rule_files() {
    let dir = tempfile::tempdir().unwrap();
    let map = write(
        dir.path(),
        "gen-msg.map",
        "# generator map\n\
         1 || 2000001 || map message\n\
         116 || 1 || (snort_decoder) WARNING: Not IPv4 datagram\n",
    );
    let rules_dir = dir.path().join("rules");
    std::fs::create_dir(&rules_dir).unwrap();
    write(
        &rules_dir,
        "a.rules",
        "alert tcp any any -> any 22 (msg:\"SSH scan\"; sid:2000001; rev:1;)\n\
         alert udp any any -> any 53 (msg:\"DNS query\"; sid:2000002; rev:1;)\n",
    );
    write(
        &rules_dir,
        "b.rules",
        "alert tcp any any -> any 53 (msg:\"DNS over TCP\"; sid:2000002; rev:2;)\n\
         drop tcp any any -> any 445 (msg:\"SMB\"; \\\n\
         # disabled rule\n\
         reject icmp any any -> any any (msg:\"ICMP\"; gid:3; sid:7;)\n",
    );

    let index = RuleLoader::load(&map, &[rules_dir.display().to_string()])
        .await
        .unwrap();

    // gen-msg.map이 먼저 읽히므로 같은 키의 룰 파일 항목은 중복
    assert_eq!(index.get(1, 2_000_001).unwrap().msg, "map message");
    // a.rules가 b.rules보다 먼저
    let dns = index.lookup(RuleKey::new(1, 2_000_002)).unwrap();
    assert_eq!(dns.msg, "DNS query");
    assert_eq!(dns.line_number, 2);
    assert!(index.source_path(dns).unwrap().ends_with("a.rules"));

    assert_eq!(index.get(3, 7).unwrap().msg, "ICMP");
    assert!(index.get(116, 1).is_some());

    let summary = index.summary();
    assert_eq!(summary.files_read, 3);
    assert_eq!(summary.rules_loaded, 4);
    assert_eq!(summary.duplicate_rejected, 2);
    assert_eq!(summary.multi_line_rejected, 1);
}

#[tokio::test]
async fn missing_gid_defaults_to_core_generator() {
    let dir = tempfile::tempdir().unwrap();
    let rules = write(
        dir.path(),
        "local.rules",
        "alert ip any any -> any any (msg:\"no gid\"; sid:9000001;)\n",
    );

    let index = RuleLoader::load("", &[rules]).await.unwrap();
    let rule = index.get(1, 9_000_001).unwrap();
    assert_eq!(rule.gid, 1);
    assert_eq!(rule.msg, "no gid");
    assert_eq!(
        rule.raw,
        "alert ip any any -> any any (msg:\"no gid\"; sid:9000001;)"
    );
}

#[tokio::test]
async fn glob_and_file_paths_combine_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "x.rules",
        "alert tcp any any -> any any (msg:\"x\"; sid:1;)\n",
    );
    write(
        dir.path(),
        "y.rules",
        "alert tcp any any -> any any (msg:\"y\"; sid:1;)\n",
    );
    let single = write(
        dir.path(),
        "z.conf",
        "alert tcp any any -> any any (msg:\"z\"; sid:2;)\n",
    );

    let pattern = format!("{}/*.rules", dir.path().display());
    let index = RuleLoader::load("", &[pattern, single]).await.unwrap();

    assert_eq!(index.get(1, 1).unwrap().msg, "x");
    assert_eq!(index.get(1, 2).unwrap().msg, "z");
    assert_eq!(index.summary().duplicate_rejected, 1);
    assert_eq!(index.sources().len(), 3);
}
