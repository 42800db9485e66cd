//! Integration tests for `u2post` commands against real config and spool files.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use u2post_cli::commands::{config, registry, rules};
use u2post_cli::error::CliError;
use u2post_core::config::U2PostConfig;

fn write_config(root: &Path, rule_paths: &[String]) -> PathBuf {
    let spool = root.join("spool");
    fs::create_dir_all(&spool).unwrap();
    let rule_paths = rule_paths
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let content = format!(
        r#"
[general]
log_level = "info"

[spool]
directory = "{spool}"
prefix = "snort.log."

[rules]
gen_msg_map_path = "{root}/gen-msg.map"
paths = [{rule_paths}]

[registry]
file = "{root}/u2post.registry"
"#,
        spool = spool.display(),
        root = root.display(),
    );
    let path = root.join("u2post.toml");
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_rules_check_and_lookup_from_config() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(
        root.join("gen-msg.map"),
        "# generator map\n116 || 59 || snort_decoder: WARNING: TCP Window Scale Option Scale Factor exceeds 14\n",
    )
    .unwrap();
    let rules_dir = root.join("rules");
    fs::create_dir(&rules_dir).unwrap();
    fs::write(
        rules_dir.join("emerging.rules"),
        "alert tcp any any -> any any (msg:\"ET POLICY curl\"; sid:2013028; rev:3;)\n\
         alert tcp any any -> any any (msg:\"shadowed\"; gid:116; sid:59;)\n",
    )
    .unwrap();

    let config_path = write_config(root, &[rules_dir.display().to_string()]);
    let config = U2PostConfig::load(&config_path).await.unwrap();
    let index = rules::load_index(&config).await.unwrap();

    let check = rules::check_report(&index);
    assert_eq!(check.summary.files_read, 2);
    assert_eq!(check.summary.rules_loaded, 2);
    assert_eq!(check.summary.duplicate_rejected, 1);

    // gen-msg.map이 먼저 로드되므로 같은 키의 룰 파일 항목보다 우선한다
    let decoder = rules::lookup_report(&index, "116:59").unwrap();
    assert!(decoder.found);
    assert!(decoder.msg.unwrap().starts_with("snort_decoder"));

    let policy = rules::lookup_report(&index, "2013028").unwrap();
    assert_eq!(policy.line, Some(1));
    assert!(policy.source_file.unwrap().ends_with("emerging.rules"));
}

#[tokio::test]
async fn test_rules_load_fails_for_unmatched_glob() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("gen-msg.map"), "").unwrap();
    let config_path = write_config(root, &[format!("{}/none/*.rules", root.display())]);

    let config = U2PostConfig::load(&config_path).await.unwrap();
    let err = rules::load_index(&config).await.unwrap_err();
    assert!(matches!(err, CliError::Rule(_)));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_config_validate_reports_invalid_value() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("u2post.toml");
    fs::write(&path, "[spooler]\nspool_size = 0\n").unwrap();

    let report = config::validation_report(&path).await;
    assert!(!report.valid);
    assert!(report.errors[0].contains("spooler.spool_size"));
}

#[tokio::test]
async fn test_config_validate_malformed_and_missing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    fs::write(&path, "[general\nlog_level = \"info\"\n").unwrap();

    assert!(!config::validation_report(&path).await.valid);
    assert!(
        !config::validation_report(Path::new("/nonexistent/u2post.toml"))
            .await
            .valid
    );
}

#[tokio::test]
async fn test_config_show_reflects_file_values() {
    let temp = TempDir::new().unwrap();
    let config_path = write_config(temp.path(), &["/etc/snort/rules".to_owned()]);
    let config = U2PostConfig::load(&config_path).await.unwrap();

    let report = config::show_report(&config, &config_path, Some("rules")).unwrap();
    assert!(report.config_toml.contains("/etc/snort/rules"));
    assert_eq!(report.config["paths"][0].as_str(), Some("/etc/snort/rules"));
}

#[tokio::test]
async fn test_registry_show_after_checkpoint() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let config_path = write_config(root, &[]);
    fs::write(root.join("spool/snort.log.1700000000"), vec![0u8; 64]).unwrap();
    fs::write(
        root.join("u2post.registry"),
        r#"{"offset":64,"source":"snort.log.1700000000"}"#,
    )
    .unwrap();

    let config = U2PostConfig::load(&config_path).await.unwrap();
    let report = registry::registry_report(&config).await.unwrap();
    assert_eq!(report.backlog_bytes, 0);
    assert_eq!(report.pending_files, 0);
    assert_eq!(report.current_file_len, Some(64));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["checkpoint"]["source"], "snort.log.1700000000");
}
