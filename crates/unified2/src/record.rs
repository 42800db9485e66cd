//! unified2 레코드 타입
//!
//! 와이어 단위는 8바이트 빅엔디언 헤더 `{type: u32, length: u32}`와
//! `length` 바이트 본문으로 구성됩니다. 본문은 타입 태그에 따라
//! [`EventRecord`], [`PacketRecord`], [`ExtraDataRecord`] 중 하나로 해석됩니다.

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;

// ─── 와이어 상수 ───────────────────────────────────────────────────

/// 레코드 헤더 길이 (type + length)
pub const HEADER_LEN: usize = 8;

/// 패킷 레코드 고정 헤더 길이
pub const PACKET_HEADER_LEN: usize = 28;

/// 추가 데이터 레코드 고정 헤더 길이
pub const EXTRA_DATA_HEADER_LEN: usize = 32;

/// 패킷 레코드 타입
pub const UNIFIED2_PACKET: u32 = 2;
/// IPv4 이벤트 (legacy)
pub const UNIFIED2_IDS_EVENT: u32 = 7;
/// IPv6 이벤트 (legacy)
pub const UNIFIED2_IDS_EVENT_IP6: u32 = 72;
/// IPv4 이벤트 (MPLS/VLAN 포함)
pub const UNIFIED2_IDS_EVENT_V2: u32 = 104;
/// IPv6 이벤트 (MPLS/VLAN 포함)
pub const UNIFIED2_IDS_EVENT_IP6_V2: u32 = 105;
/// 추가 데이터 레코드 타입
pub const UNIFIED2_EXTRA_DATA: u32 = 110;

/// 디코딩 전의 원시 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 레코드 타입 태그
    pub record_type: u32,
    /// 본문 바이트
    pub data: Bytes,
}

impl RawRecord {
    /// 새 원시 레코드를 생성합니다.
    pub fn new(record_type: u32, data: impl Into<Bytes>) -> Self {
        Self {
            record_type,
            data: data.into(),
        }
    }

    /// 헤더를 포함한 전체 프레임 길이
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.data.len()
    }
}

/// 이벤트 레코드의 세부 형식
///
/// 타입 태그 하나로 주소 폭(4/16바이트)과 MPLS/VLAN 필드 유무가 결정됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// IPv4, legacy (태그 7)
    V4,
    /// IPv6, legacy (태그 72)
    V6,
    /// IPv4 + MPLS/VLAN (태그 104)
    V4V2,
    /// IPv6 + MPLS/VLAN (태그 105)
    V6V2,
}

impl EventKind {
    /// 타입 태그에서 이벤트 형식을 찾습니다.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            UNIFIED2_IDS_EVENT => Some(Self::V4),
            UNIFIED2_IDS_EVENT_IP6 => Some(Self::V6),
            UNIFIED2_IDS_EVENT_V2 => Some(Self::V4V2),
            UNIFIED2_IDS_EVENT_IP6_V2 => Some(Self::V6V2),
            _ => None,
        }
    }

    /// 타입 태그
    pub fn tag(self) -> u32 {
        match self {
            Self::V4 => UNIFIED2_IDS_EVENT,
            Self::V6 => UNIFIED2_IDS_EVENT_IP6,
            Self::V4V2 => UNIFIED2_IDS_EVENT_V2,
            Self::V6V2 => UNIFIED2_IDS_EVENT_IP6_V2,
        }
    }

    /// IPv6 주소를 쓰는 형식인지
    pub fn is_ipv6(self) -> bool {
        matches!(self, Self::V6 | Self::V6V2)
    }

    /// MPLS 라벨과 VLAN ID를 포함하는 형식인지
    pub fn is_v2(self) -> bool {
        matches!(self, Self::V4V2 | Self::V6V2)
    }

    /// 주소 필드 하나의 바이트 수
    pub fn addr_len(self) -> usize {
        if self.is_ipv6() { 16 } else { 4 }
    }

    /// 디코딩에 필요한 최소 본문 길이
    pub fn min_len(self) -> usize {
        // 9 x u32 + 주소 2개 + 포트 2개(u16) + u8 4개 (+ mpls u32 + vlan u16)
        let base = 36 + 2 * self.addr_len() + 4 + 4;
        if self.is_v2() { base + 6 } else { base }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::V4 => "event",
            Self::V6 => "event_ip6",
            Self::V4V2 => "event_v2",
            Self::V6V2 => "event_ip6_v2",
        };
        f.write_str(name)
    }
}

/// 알림 이벤트 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// 세부 형식
    pub kind: EventKind,
    pub sensor_id: u32,
    pub event_id: u32,
    pub event_second: u32,
    pub event_microsecond: u32,
    pub signature_id: u32,
    pub generator_id: u32,
    pub signature_revision: u32,
    pub classification_id: u32,
    pub priority: u32,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    /// 출발지 포트 또는 ICMP type
    pub sport_itype: u16,
    /// 목적지 포트 또는 ICMP code
    pub dport_icode: u16,
    pub protocol: u8,
    pub impact_flag: u8,
    pub impact: u8,
    pub blocked: u8,
    /// V2 형식에만 존재
    pub mpls_label: Option<u32>,
    /// V2 형식에만 존재
    pub vlan_id: Option<u16>,
}

/// 이벤트에 딸린 패킷 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub sensor_id: u32,
    pub event_id: u32,
    pub event_second: u32,
    pub packet_second: u32,
    pub packet_microsecond: u32,
    pub linktype: u32,
    /// 헤더에 선언된 패킷 길이
    pub length: u32,
    /// 고정 헤더 뒤의 나머지 바이트
    pub data: Bytes,
}

/// 이벤트에 딸린 추가 데이터 레코드 (XFF, HTTP URI 등)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraDataRecord {
    pub event_type: u32,
    pub event_length: u32,
    pub sensor_id: u32,
    pub event_id: u32,
    pub event_second: u32,
    /// 추가 데이터 종류
    pub data_type: u32,
    /// 데이터 인코딩 하위 종류
    pub data_subtype: u32,
    /// 헤더에 선언된 데이터 길이
    pub data_length: u32,
    /// 고정 헤더 뒤의 나머지 바이트
    pub data: Bytes,
}

/// 디코딩된 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Event(EventRecord),
    Packet(PacketRecord),
    ExtraData(ExtraDataRecord),
}

impl Record {
    /// 이벤트 레코드인지
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event(_))
    }

    /// 레코드 종류 이름 (event, packet, extra_data)
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::Packet(_) => "packet",
            Self::ExtraData(_) => "extra_data",
        }
    }

    /// 센서 ID
    pub fn sensor_id(&self) -> u32 {
        match self {
            Self::Event(e) => e.sensor_id,
            Self::Packet(p) => p.sensor_id,
            Self::ExtraData(x) => x.sensor_id,
        }
    }

    /// 소속 이벤트 ID
    pub fn event_id(&self) -> u32 {
        match self {
            Self::Event(e) => e.event_id,
            Self::Packet(p) => p.event_id,
            Self::ExtraData(x) => x.event_id,
        }
    }

    /// 소속 이벤트의 발생 초
    pub fn event_second(&self) -> u32 {
        match self {
            Self::Event(e) => e.event_second,
            Self::Packet(p) => p.event_second,
            Self::ExtraData(x) => x.event_second,
        }
    }

    /// 레코드 타입 태그
    pub fn tag(&self) -> u32 {
        match self {
            Self::Event(e) => e.kind.tag(),
            Self::Packet(_) => UNIFIED2_PACKET,
            Self::ExtraData(_) => UNIFIED2_EXTRA_DATA,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(e) => write!(
                f,
                "{} sensor={} event={} sig={}:{}:{} {}:{} -> {}:{} proto={}",
                e.kind,
                e.sensor_id,
                e.event_id,
                e.generator_id,
                e.signature_id,
                e.signature_revision,
                e.src_ip,
                e.sport_itype,
                e.dst_ip,
                e.dport_icode,
                e.protocol,
            ),
            Self::Packet(p) => write!(
                f,
                "packet sensor={} event={} linktype={} length={}",
                p.sensor_id,
                p.event_id,
                p.linktype,
                p.data.len(),
            ),
            Self::ExtraData(x) => write!(
                f,
                "extra_data sensor={} event={} type={} length={}",
                x.sensor_id,
                x.event_id,
                x.data_type,
                x.data.len(),
            ),
        }
    }
}
