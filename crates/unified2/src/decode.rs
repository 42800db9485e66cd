//! 레코드 본문 디코더
//!
//! 타입 태그 → 디코더 함수 디스패치 테이블로 본문을 [`Record`]로 변환합니다.
//! 모든 스칼라 필드는 패딩 없는 빅엔디언 고정 폭입니다.
//! 테이블에 없는 태그는 에러가 아니라 `Ok(None)`으로 보고됩니다.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, Bytes};

use crate::error::DecodeError;
use crate::record::{
    EXTRA_DATA_HEADER_LEN, EventKind, EventRecord, ExtraDataRecord, PACKET_HEADER_LEN,
    PacketRecord, RawRecord, Record, UNIFIED2_EXTRA_DATA, UNIFIED2_IDS_EVENT,
    UNIFIED2_IDS_EVENT_IP6, UNIFIED2_IDS_EVENT_IP6_V2, UNIFIED2_IDS_EVENT_V2, UNIFIED2_PACKET,
};

/// 태그별 디코더 함수
pub type DecodeFn = fn(Bytes) -> Result<Record, DecodeError>;

const DECODERS: &[(u32, DecodeFn)] = &[
    (UNIFIED2_PACKET, decode_packet_record),
    (UNIFIED2_IDS_EVENT, decode_event_v4),
    (UNIFIED2_IDS_EVENT_IP6, decode_event_v6),
    (UNIFIED2_IDS_EVENT_V2, decode_event_v4_v2),
    (UNIFIED2_IDS_EVENT_IP6_V2, decode_event_v6_v2),
    (UNIFIED2_EXTRA_DATA, decode_extra_data_record),
];

/// 태그에 해당하는 디코더를 찾습니다.
pub fn decoder_for(record_type: u32) -> Option<DecodeFn> {
    DECODERS
        .iter()
        .find(|(tag, _)| *tag == record_type)
        .map(|(_, f)| *f)
}

/// 본문을 디코딩합니다.
///
/// 알 수 없는 태그면 `Ok(None)`을 반환하여 호출자가 건너뛸 수 있게 합니다.
pub fn decode(record_type: u32, data: Bytes) -> Result<Option<Record>, DecodeError> {
    match decoder_for(record_type) {
        Some(decoder) => decoder(data).map(Some),
        None => Ok(None),
    }
}

impl RawRecord {
    /// 이 원시 레코드를 디코딩합니다.
    pub fn decode(&self) -> Result<Option<Record>, DecodeError> {
        decode(self.record_type, self.data.clone())
    }
}

fn decode_event_v4(data: Bytes) -> Result<Record, DecodeError> {
    decode_event(EventKind::V4, &data).map(Record::Event)
}

fn decode_event_v6(data: Bytes) -> Result<Record, DecodeError> {
    decode_event(EventKind::V6, &data).map(Record::Event)
}

fn decode_event_v4_v2(data: Bytes) -> Result<Record, DecodeError> {
    decode_event(EventKind::V4V2, &data).map(Record::Event)
}

fn decode_event_v6_v2(data: Bytes) -> Result<Record, DecodeError> {
    decode_event(EventKind::V6V2, &data).map(Record::Event)
}

fn decode_packet_record(data: Bytes) -> Result<Record, DecodeError> {
    decode_packet(data).map(Record::Packet)
}

fn decode_extra_data_record(data: Bytes) -> Result<Record, DecodeError> {
    decode_extra_data(data).map(Record::ExtraData)
}

/// 이벤트 본문을 디코딩합니다.
///
/// 주소 폭과 MPLS/VLAN 필드 유무는 `kind`가 결정합니다.
/// 필요한 길이 뒤의 바이트(V2의 패딩 등)는 무시합니다.
pub fn decode_event(kind: EventKind, data: &[u8]) -> Result<EventRecord, DecodeError> {
    let mut r = FieldReader::new("event", data);

    let sensor_id = r.u32("sensor_id")?;
    let event_id = r.u32("event_id")?;
    let event_second = r.u32("event_second")?;
    let event_microsecond = r.u32("event_microsecond")?;
    let signature_id = r.u32("signature_id")?;
    let generator_id = r.u32("generator_id")?;
    let signature_revision = r.u32("signature_revision")?;
    let classification_id = r.u32("classification_id")?;
    let priority = r.u32("priority")?;
    let src_ip = r.ip("src_ip", kind.is_ipv6())?;
    let dst_ip = r.ip("dst_ip", kind.is_ipv6())?;
    let sport_itype = r.u16("sport_itype")?;
    let dport_icode = r.u16("dport_icode")?;
    let protocol = r.u8("protocol")?;
    let impact_flag = r.u8("impact_flag")?;
    let impact = r.u8("impact")?;
    let blocked = r.u8("blocked")?;

    let (mpls_label, vlan_id) = if kind.is_v2() {
        (Some(r.u32("mpls_label")?), Some(r.u16("vlan_id")?))
    } else {
        (None, None)
    };

    Ok(EventRecord {
        kind,
        sensor_id,
        event_id,
        event_second,
        event_microsecond,
        signature_id,
        generator_id,
        signature_revision,
        classification_id,
        priority,
        src_ip,
        dst_ip,
        sport_itype,
        dport_icode,
        protocol,
        impact_flag,
        impact,
        blocked,
        mpls_label,
        vlan_id,
    })
}

/// 패킷 본문을 디코딩합니다. 페이로드는 원본 버퍼의 zero-copy 슬라이스입니다.
pub fn decode_packet(data: Bytes) -> Result<PacketRecord, DecodeError> {
    let mut r = FieldReader::new("packet", &data);

    let sensor_id = r.u32("sensor_id")?;
    let event_id = r.u32("event_id")?;
    let event_second = r.u32("event_second")?;
    let packet_second = r.u32("packet_second")?;
    let packet_microsecond = r.u32("packet_microsecond")?;
    let linktype = r.u32("linktype")?;
    let length = r.u32("length")?;

    Ok(PacketRecord {
        sensor_id,
        event_id,
        event_second,
        packet_second,
        packet_microsecond,
        linktype,
        length,
        data: data.slice(PACKET_HEADER_LEN..),
    })
}

/// 추가 데이터 본문을 디코딩합니다.
pub fn decode_extra_data(data: Bytes) -> Result<ExtraDataRecord, DecodeError> {
    let mut r = FieldReader::new("extra_data", &data);

    let event_type = r.u32("event_type")?;
    let event_length = r.u32("event_length")?;
    let sensor_id = r.u32("sensor_id")?;
    let event_id = r.u32("event_id")?;
    let event_second = r.u32("event_second")?;
    let data_type = r.u32("data_type")?;
    let data_subtype = r.u32("data_subtype")?;
    let data_length = r.u32("data_length")?;

    Ok(ExtraDataRecord {
        event_type,
        event_length,
        sensor_id,
        event_id,
        event_second,
        data_type,
        data_subtype,
        data_length,
        data: data.slice(EXTRA_DATA_HEADER_LEN..),
    })
}

// ─── 필드 리더 ─────────────────────────────────────────────────────

/// 길이 검사를 거쳐 빅엔디언 필드를 순서대로 읽는 커서
struct FieldReader<'a> {
    record: &'static str,
    buf: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(record: &'static str, buf: &'a [u8]) -> Self {
        Self {
            record,
            buf,
            offset: 0,
        }
    }

    fn need(&self, field: &'static str, width: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < width {
            return Err(DecodeError::Truncated {
                record: self.record,
                field,
                offset: self.offset,
                needed: width,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        self.need(field, 1)?;
        self.offset += 1;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        self.need(field, 2)?;
        self.offset += 2;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        self.need(field, 4)?;
        self.offset += 4;
        Ok(self.buf.get_u32())
    }

    fn ip(&mut self, field: &'static str, v6: bool) -> Result<IpAddr, DecodeError> {
        if v6 {
            self.need(field, 16)?;
            self.offset += 16;
            Ok(IpAddr::V6(Ipv6Addr::from(self.buf.get_u128())))
        } else {
            self.need(field, 4)?;
            self.offset += 4;
            Ok(IpAddr::V4(Ipv4Addr::from(self.buf.get_u32())))
        }
    }
}
