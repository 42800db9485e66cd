//! 알림 보강 -- 알림 단위를 발행용 레코드로 변환합니다.
//!
//! [`AlertBuilder`]는 [`AlertUnit`]의 이벤트 필드를 펼치고, 룰 인덱스에서
//! `(gid, sid)`를 찾아 시그니처 메시지와 출처를 붙이며, 딸린 패킷/추가
//! 데이터를 hex와 출력 가능 문자열로 변환해 [`AlertEvent`]를 만듭니다.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use u2post_core::event::{EVENT_TYPE_ALERT, Event, EventMetadata, MODULE_INGEST};
use u2post_core::metrics as m;
use u2post_core::{Severity, SpoolPosition};
use u2post_unified2::{AlertUnit, ExtraDataRecord, PacketRecord};

use crate::rule::RuleIndex;

/// 발행용 알림 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// 수집 시각
    pub indexed_at: DateTime<Utc>,
    /// 이벤트 발생 시각
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    /// 스풀 파일 절대 경로
    pub source: String,
    /// 스풀 파일 내 이벤트 레코드 시작 오프셋
    pub source_offset: u64,

    pub sensor_id: u32,
    pub event_id: u32,
    pub event_second: u32,
    pub event_microsecond: u32,
    pub generator_id: u32,
    pub signature_id: u32,
    pub signature_revision: u32,
    pub classification_id: u32,
    pub priority: u32,
    /// priority에서 파생된 심각도
    pub severity: Severity,

    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    /// 출발지 포트 또는 ICMP type
    pub sport: u16,
    /// 목적지 포트 또는 ICMP code
    pub dport: u16,
    pub protocol: u8,
    pub impact_flag: u8,
    pub impact: u8,
    pub blocked: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpls_label: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,

    /// 룰 메시지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// 룰 출처 파일
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_source_file: Option<String>,
    /// 룰 출처 줄 번호
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_line: Option<usize>,
    /// 룰 원문
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_raw: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packets: Vec<PacketInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_data: Vec<ExtraDataInfo>,

    /// 사용자 정의 필드
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// 알림에 딸린 패킷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketInfo {
    pub packet_second: u32,
    pub packet_microsecond: u32,
    pub link_type: u32,
    pub length: u32,
    /// 공백으로 구분한 소문자 hex
    pub data_hex: String,
    /// 출력 가능한 ASCII(0x20..=0x7e)만 남긴 본문
    pub data_printable: String,
}

/// 알림에 딸린 추가 데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraDataInfo {
    pub event_type: u32,
    pub data_type: u32,
    pub data_subtype: u32,
    pub data_length: u32,
    pub data_hex: String,
    pub data_printable: String,
}

impl From<&PacketRecord> for PacketInfo {
    fn from(p: &PacketRecord) -> Self {
        Self {
            packet_second: p.packet_second,
            packet_microsecond: p.packet_microsecond,
            link_type: p.linktype,
            length: p.length,
            data_hex: to_hex(&p.data),
            data_printable: to_printable(&p.data),
        }
    }
}

impl From<&ExtraDataRecord> for ExtraDataInfo {
    fn from(x: &ExtraDataRecord) -> Self {
        Self {
            event_type: x.event_type,
            data_type: x.data_type,
            data_subtype: x.data_subtype,
            data_length: x.data_length,
            data_hex: to_hex(&x.data),
            data_printable: to_printable(&x.data),
        }
    }
}

/// 공백으로 구분한 소문자 hex (`"de ad be ef"`)
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// 출력 가능한 ASCII만 남긴 문자열
pub fn to_printable(data: &[u8]) -> String {
    data.iter()
        .filter(|b| (0x20..=0x7e).contains(*b))
        .map(|&b| char::from(b))
        .collect()
}

/// 발행 단위 이벤트
///
/// `position`은 이 알림까지 발행되었을 때 저장할 체크포인트입니다.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 메타데이터
    pub metadata: EventMetadata,
    /// 발행 후 체크포인트
    pub position: SpoolPosition,
    /// 알림 레코드
    pub alert: AlertRecord,
}

impl Event for AlertEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_ALERT
    }
}

/// 알림 단위 → [`AlertEvent`] 변환기
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    rules: Arc<RuleIndex>,
    fields: BTreeMap<String, String>,
}

impl AlertBuilder {
    /// 새 변환기를 생성합니다.
    pub fn new(rules: Arc<RuleIndex>, fields: BTreeMap<String, String>) -> Self {
        Self { rules, fields }
    }

    /// 룰 인덱스
    pub fn rules(&self) -> &RuleIndex {
        &self.rules
    }

    /// 알림 단위를 변환합니다.
    ///
    /// - `source`: 알림 단위를 읽은 스풀 파일
    /// - `source_offset`: 이벤트 레코드 시작 오프셋
    /// - `position`: 발행 후 저장할 체크포인트
    pub fn build(
        &self,
        unit: &AlertUnit,
        source: &Path,
        source_offset: u64,
        position: SpoolPosition,
    ) -> AlertEvent {
        let e = &unit.event;

        let mut alert = AlertRecord {
            indexed_at: Utc::now(),
            timestamp: event_time(e.event_second, e.event_microsecond),
            source: source.display().to_string(),
            source_offset,
            sensor_id: e.sensor_id,
            event_id: e.event_id,
            event_second: e.event_second,
            event_microsecond: e.event_microsecond,
            generator_id: e.generator_id,
            signature_id: e.signature_id,
            signature_revision: e.signature_revision,
            classification_id: e.classification_id,
            priority: e.priority,
            severity: Severity::from_priority(e.priority),
            src_ip: e.src_ip,
            dst_ip: e.dst_ip,
            sport: e.sport_itype,
            dport: e.dport_icode,
            protocol: e.protocol,
            impact_flag: e.impact_flag,
            impact: e.impact,
            blocked: e.blocked,
            mpls_label: e.mpls_label,
            vlan_id: e.vlan_id,
            signature: None,
            rule_source_file: None,
            rule_line: None,
            rule_raw: None,
            packets: unit.packets().map(PacketInfo::from).collect(),
            extra_data: unit.extra_data().map(ExtraDataInfo::from).collect(),
            fields: self.fields.clone(),
        };

        match self.rules.get(e.generator_id, e.signature_id) {
            Some(rule) => {
                alert.signature = Some(rule.msg.clone());
                alert.rule_source_file = self
                    .rules
                    .source_path(rule)
                    .map(|p| p.display().to_string());
                alert.rule_line = Some(rule.line_number);
                alert.rule_raw = Some(rule.raw.clone());
            }
            None => {
                metrics::counter!(m::RULES_MISSING_TOTAL).increment(1);
                tracing::debug!(
                    gid = e.generator_id,
                    sid = e.signature_id,
                    "no rule found for event"
                );
            }
        }

        AlertEvent {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_INGEST),
            position,
            alert,
        }
    }
}

fn event_time(second: u32, microsecond: u32) -> DateTime<Utc> {
    let nanos = microsecond.saturating_mul(1000).min(999_999_999);
    Utc.timestamp_opt(i64::from(second), nanos)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    use bytes::Bytes;
    use u2post_unified2::{EventKind, EventRecord, Record, EventAggregator};

    use super::*;
    use crate::rule::RuleIndexBuilder;

    fn event(gid: u32, sid: u32) -> Record {
        Record::Event(EventRecord {
            kind: EventKind::V4V2,
            sensor_id: 1,
            event_id: 77,
            event_second: 1_500_000_000,
            event_microsecond: 250_000,
            signature_id: sid,
            generator_id: gid,
            signature_revision: 3,
            classification_id: 5,
            priority: 1,
            src_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            dst_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            sport_itype: 4444,
            dport_icode: 80,
            protocol: 6,
            impact_flag: 0,
            impact: 0,
            blocked: 1,
            mpls_label: Some(0),
            vlan_id: Some(10),
        })
    }

    fn packet(data: &'static [u8]) -> Record {
        Record::Packet(PacketRecord {
            sensor_id: 1,
            event_id: 77,
            event_second: 1_500_000_000,
            packet_second: 1_500_000_000,
            packet_microsecond: 1,
            linktype: 1,
            length: data.len() as u32,
            data: Bytes::from_static(data),
        })
    }

    fn unit(records: Vec<Record>) -> AlertUnit {
        let mut agg = EventAggregator::new();
        for record in records {
            assert!(agg.add(record).is_none());
        }
        agg.flush().unwrap()
    }

    fn builder() -> AlertBuilder {
        let mut rules = RuleIndexBuilder::new();
        rules.add_rule_file(
            "/etc/snort/rules/local.rules",
            "alert tcp any any -> any 80 (msg:\"LOCAL web probe\"; sid:1000001; rev:3;)\n",
        );
        let mut fields = BTreeMap::new();
        fields.insert("site".to_owned(), "dc1".to_owned());
        AlertBuilder::new(Arc::new(rules.build()), fields)
    }

    #[test]
    fn hex_and_printable_rendering() {
        assert_eq!(to_hex(&[0xde, 0xad, 0x01]), "de ad 01");
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_printable(b"GET /\r\n\x00\x7f~"), "GET /~");
    }

    #[test]
    fn build_enriches_with_rule() {
        let unit = unit(vec![event(1, 1_000_001), packet(b"GET / HTTP/1.1\r\n")]);
        let ev = builder().build(
            &unit,
            &PathBuf::from("/var/log/snort/snort.log.1"),
            512,
            SpoolPosition::new("snort.log.1", 700),
        );

        let a = &ev.alert;
        assert_eq!(a.signature.as_deref(), Some("LOCAL web probe"));
        assert_eq!(
            a.rule_source_file.as_deref(),
            Some("/etc/snort/rules/local.rules")
        );
        assert_eq!(a.rule_line, Some(1));
        assert_eq!(a.severity, Severity::High);
        assert_eq!(a.source, "/var/log/snort/snort.log.1");
        assert_eq!(a.source_offset, 512);
        assert_eq!(a.timestamp.timestamp(), 1_500_000_000);
        assert_eq!(a.timestamp.timestamp_subsec_micros(), 250_000);
        assert_eq!(a.packets.len(), 1);
        assert_eq!(a.packets[0].data_printable, "GET / HTTP/1.1");
        assert_eq!(a.fields.get("site").map(String::as_str), Some("dc1"));
        assert_eq!(ev.position, SpoolPosition::new("snort.log.1", 700));
        assert_eq!(ev.event_type(), "alert");
        assert_eq!(ev.metadata().source_module, "ingest");
    }

    #[test]
    fn missing_rule_leaves_signature_empty() {
        let unit = unit(vec![event(3, 42)]);
        let ev = builder().build(&unit, Path::new("/s/u2.1"), 0, SpoolPosition::default());
        assert!(ev.alert.signature.is_none());
        assert!(ev.alert.rule_raw.is_none());
    }

    #[test]
    fn serialized_shape_uses_timestamp_field_and_skips_empty() {
        let unit = unit(vec![event(3, 42)]);
        let mut builder = builder();
        builder.fields.clear();
        let ev = builder.build(&unit, Path::new("/s/u2.1"), 0, SpoolPosition::default());

        let json = serde_json::to_value(&ev.alert).unwrap();
        assert!(json.get("@timestamp").is_some());
        assert_eq!(json["src_ip"], "10.0.0.1");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["vlan_id"], 10);
        assert!(json.get("packets").is_none());
        assert!(json.get("fields").is_none());
        assert!(json.get("signature").is_none());

        let back: AlertRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev.alert);
    }
}
