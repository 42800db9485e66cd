//! 통합 테스트 -- 스풀에서 발행, 체크포인트, 보관, 재시작까지의 전체 흐름

use std::net::{IpAddr, Ipv6Addr};
use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use u2post_core::pipeline::Pipeline;
use u2post_ingest::{AlertEvent, IngestConfig, IngestConfigBuilder, IngestPipelineBuilder};
use u2post_unified2::record::UNIFIED2_IDS_EVENT_IP6_V2;
use u2post_unified2::{
    EventKind, EventRecord, ExtraDataRecord, RawRecord, Record, encode_record,
};

fn event(event_id: u32, signature_id: u32) -> Record {
    Record::Event(EventRecord {
        kind: EventKind::V6V2,
        sensor_id: 1,
        event_id,
        event_second: 1_700_000_000,
        event_microsecond: 250,
        signature_id,
        generator_id: 1,
        signature_revision: 2,
        classification_id: 4,
        priority: 1,
        src_ip: IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
        dst_ip: IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2)),
        sport_itype: 51000,
        dport_icode: 443,
        protocol: 6,
        impact_flag: 0,
        impact: 0,
        blocked: 1,
        mpls_label: Some(0),
        vlan_id: Some(12),
    })
}

fn extra(event_id: u32) -> Record {
    Record::ExtraData(ExtraDataRecord {
        event_type: 4,
        event_length: 0,
        sensor_id: 1,
        event_id,
        event_second: 1_700_000_000,
        data_type: 10,
        data_subtype: 1,
        data_length: 5,
        data: Bytes::from_static(b"admin"),
    })
}

fn frames(records: &[Record]) -> Vec<u8> {
    let mut buf = Vec::new();
    for record in records {
        buf.extend_from_slice(&encode_record(record).unwrap().to_frame().unwrap());
    }
    buf
}

fn config(dir: &Path, rules: &Path) -> IngestConfig {
    IngestConfigBuilder::new()
        .spool(dir.join("spool"), "snort.log.")
        .registry_file(dir.join("u2post.registry"))
        .rule_paths(vec![rules.display().to_string()])
        .poll_interval_ms(10)
        .idle_timeout_ms(20)
        .aggregate_flush_ms(20)
        .publish_retry_backoff_ms(10)
        .archive(true)
        .field("environment", "test")
        .build()
        .unwrap()
}

async fn recv(rx: &mut mpsc::Receiver<AlertEvent>) -> AlertEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for alert")
        .expect("alert channel closed")
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn archived(spool: &Path) -> Vec<String> {
    std::fs::read_dir(spool)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("indexed_"))
        .collect()
}

#[tokio::test]
async fn publishes_checkpoints_archives_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let spool = dir.path().join("spool");
    std::fs::create_dir(&spool).unwrap();
    let rules = dir.path().join("local.rules");
    std::fs::write(
        &rules,
        "alert tcp any any -> any 443 (msg:\"TLS probe\"; sid:3000001; rev:2;)\n",
    )
    .unwrap();

    std::fs::write(
        spool.join("snort.log.1700000000"),
        frames(&[event(1, 3_000_001), extra(1)]),
    )
    .unwrap();
    std::fs::write(spool.join("snort.log.1700000100"), frames(&[event(2, 42)])).unwrap();

    // 첫 실행
    let (mut pipeline, rx) = IngestPipelineBuilder::new()
        .config(config(dir.path(), &rules))
        .build()
        .unwrap();
    let mut rx = rx.unwrap();
    pipeline.start().await.unwrap();
    assert_eq!(pipeline.rule_count(), 1);

    let first = recv(&mut rx).await;
    assert_eq!(first.alert.event_id, 1);
    assert_eq!(first.alert.signature.as_deref(), Some("TLS probe"));
    assert_eq!(first.alert.rule_line, Some(1));
    assert_eq!(first.alert.extra_data.len(), 1);
    assert_eq!(first.alert.extra_data[0].data_printable, "admin");
    assert_eq!(first.alert.vlan_id, Some(12));
    assert_eq!(first.alert.fields["environment"], "test");
    assert!(first.alert.source.ends_with("snort.log.1700000000"));

    let second = recv(&mut rx).await;
    assert_eq!(second.alert.event_id, 2);
    assert_eq!(second.alert.signature, None);
    assert_eq!(second.alert.source_offset, 0);

    // 첫 파일은 발행 후 보관된다
    wait_for(|| archived(&spool).len() == 1).await;
    let name = &archived(&spool)[0];
    assert!(name.ends_with(".snort.log.1700000000"), "{name}");
    assert!(!spool.join("snort.log.1700000000").exists());

    pipeline.stop().await.unwrap();

    let second_len = std::fs::metadata(spool.join("snort.log.1700000100"))
        .unwrap()
        .len();
    let registry = std::fs::read_to_string(dir.path().join("u2post.registry")).unwrap();
    assert_eq!(
        registry,
        format!(r#"{{"offset":{second_len},"source":"snort.log.1700000100"}}"#)
    );

    // 두 번째 실행: 덧붙은 레코드만 발행한다
    let mut appended = std::fs::read(spool.join("snort.log.1700000100")).unwrap();
    appended.extend_from_slice(&frames(&[event(3, 42)]));
    std::fs::write(spool.join("snort.log.1700000100"), appended).unwrap();

    let (mut pipeline, rx) = IngestPipelineBuilder::new()
        .config(config(dir.path(), &rules))
        .build()
        .unwrap();
    let mut rx = rx.unwrap();
    pipeline.start().await.unwrap();

    let third = recv(&mut rx).await;
    assert_eq!(third.alert.event_id, 3);
    assert_eq!(third.alert.source_offset, second_len);

    pipeline.stop().await.unwrap();
    assert!(rx.try_recv().is_err());
    assert_eq!(pipeline.alerts_published(), 1);
}

#[tokio::test]
async fn stop_flushes_pending_unit_before_aggregate_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let spool = dir.path().join("spool");
    std::fs::create_dir(&spool).unwrap();
    let rules = dir.path().join("empty.rules");
    std::fs::write(&rules, "").unwrap();
    std::fs::write(spool.join("snort.log.1"), frames(&[event(7, 1)])).unwrap();

    let mut config = config(dir.path(), &rules);
    config.aggregate_flush_ms = 3_600_000;
    config.idle_timeout_ms = 3_600_000;

    let (mut pipeline, rx) = IngestPipelineBuilder::new().config(config).build().unwrap();
    let mut rx = rx.unwrap();
    pipeline.start().await.unwrap();

    wait_for(|| pipeline.records_read() == 1).await;
    assert!(rx.try_recv().is_err());

    pipeline.stop().await.unwrap();
    assert_eq!(recv(&mut rx).await.alert.event_id, 7);

    let len = std::fs::metadata(spool.join("snort.log.1")).unwrap().len();
    let registry = std::fs::read_to_string(dir.path().join("u2post.registry")).unwrap();
    assert_eq!(registry, format!(r#"{{"offset":{len},"source":"snort.log.1"}}"#));
}

#[tokio::test]
async fn undecodable_event_ends_previous_unit() {
    let dir = tempfile::tempdir().unwrap();
    let spool = dir.path().join("spool");
    std::fs::create_dir(&spool).unwrap();
    let rules = dir.path().join("empty.rules");
    std::fs::write(&rules, "").unwrap();

    // 이벤트 1 + 추가 데이터, 본문이 잘린 이벤트, 그 이벤트의 추가 데이터, 이벤트 3
    let broken = RawRecord::new(UNIFIED2_IDS_EVENT_IP6_V2, vec![0; 10])
        .to_frame()
        .unwrap();
    let mut contents = frames(&[event(1, 1), extra(1)]);
    contents.extend_from_slice(&broken);
    contents.extend_from_slice(&frames(&[extra(2), event(3, 1)]));
    std::fs::write(spool.join("snort.log.1"), contents).unwrap();

    let (mut pipeline, rx) = IngestPipelineBuilder::new()
        .config(config(dir.path(), &rules))
        .build()
        .unwrap();
    let mut rx = rx.unwrap();
    pipeline.start().await.unwrap();

    let first = recv(&mut rx).await;
    assert_eq!(first.alert.event_id, 1);
    assert_eq!(first.alert.extra_data.len(), 1);

    let next = recv(&mut rx).await;
    assert_eq!(next.alert.event_id, 3);
    assert!(next.alert.extra_data.is_empty());

    pipeline.stop().await.unwrap();
    assert_eq!(pipeline.decode_errors(), 1);
    assert!(rx.try_recv().is_err());
}
