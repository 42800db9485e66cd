//! 레코드 인코더
//!
//! 디코더의 역방향입니다. 테스트 픽스처 생성, 알림 단위 추출(CLI `extract`)에 쓰입니다.
//! V2 이벤트는 Snort와 같은 레이아웃으로 2바이트 패딩을 덧붙입니다.

use std::net::IpAddr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::EncodeError;
use crate::record::{
    EXTRA_DATA_HEADER_LEN, EventKind, EventRecord, ExtraDataRecord, HEADER_LEN, PACKET_HEADER_LEN,
    PacketRecord, RawRecord, Record, UNIFIED2_EXTRA_DATA, UNIFIED2_PACKET,
};

const V2_PADDING: usize = 2;

/// 이벤트 레코드 본문을 인코딩합니다.
///
/// 주소 체계가 `kind`와 다르면 에러입니다.
pub fn encode_event(event: &EventRecord) -> Result<Bytes, EncodeError> {
    let kind = event.kind;
    let mut buf = BytesMut::with_capacity(kind.min_len() + V2_PADDING);

    for v in [
        event.sensor_id,
        event.event_id,
        event.event_second,
        event.event_microsecond,
        event.signature_id,
        event.generator_id,
        event.signature_revision,
        event.classification_id,
        event.priority,
    ] {
        buf.put_u32(v);
    }

    put_ip(&mut buf, event.src_ip, kind, "src_ip")?;
    put_ip(&mut buf, event.dst_ip, kind, "dst_ip")?;

    buf.put_u16(event.sport_itype);
    buf.put_u16(event.dport_icode);
    buf.put_u8(event.protocol);
    buf.put_u8(event.impact_flag);
    buf.put_u8(event.impact);
    buf.put_u8(event.blocked);

    if kind.is_v2() {
        buf.put_u32(event.mpls_label.unwrap_or(0));
        buf.put_u16(event.vlan_id.unwrap_or(0));
        buf.put_bytes(0, V2_PADDING);
    }

    Ok(buf.freeze())
}

fn put_ip(
    buf: &mut BytesMut,
    ip: IpAddr,
    kind: EventKind,
    field: &'static str,
) -> Result<(), EncodeError> {
    match (ip, kind.is_ipv6()) {
        (IpAddr::V4(v4), false) => buf.put_slice(&v4.octets()),
        (IpAddr::V6(v6), true) => buf.put_slice(&v6.octets()),
        _ => {
            return Err(EncodeError::AddressFamily {
                kind: kind.to_string(),
                field,
            });
        }
    }
    Ok(())
}

/// 패킷 레코드 본문을 인코딩합니다.
pub fn encode_packet(packet: &PacketRecord) -> Bytes {
    let mut buf = BytesMut::with_capacity(PACKET_HEADER_LEN + packet.data.len());
    for v in [
        packet.sensor_id,
        packet.event_id,
        packet.event_second,
        packet.packet_second,
        packet.packet_microsecond,
        packet.linktype,
        packet.length,
    ] {
        buf.put_u32(v);
    }
    buf.put_slice(&packet.data);
    buf.freeze()
}

/// 추가 데이터 레코드 본문을 인코딩합니다.
pub fn encode_extra_data(extra: &ExtraDataRecord) -> Bytes {
    let mut buf = BytesMut::with_capacity(EXTRA_DATA_HEADER_LEN + extra.data.len());
    for v in [
        extra.event_type,
        extra.event_length,
        extra.sensor_id,
        extra.event_id,
        extra.event_second,
        extra.data_type,
        extra.data_subtype,
        extra.data_length,
    ] {
        buf.put_u32(v);
    }
    buf.put_slice(&extra.data);
    buf.freeze()
}

/// 디코딩된 레코드를 원시 레코드로 되돌립니다.
pub fn encode_record(record: &Record) -> Result<RawRecord, EncodeError> {
    Ok(match record {
        Record::Event(e) => RawRecord::new(e.kind.tag(), encode_event(e)?),
        Record::Packet(p) => RawRecord::new(UNIFIED2_PACKET, encode_packet(p)),
        Record::ExtraData(x) => RawRecord::new(UNIFIED2_EXTRA_DATA, encode_extra_data(x)),
    })
}

impl RawRecord {
    /// 헤더를 붙여 파일에 그대로 쓸 수 있는 프레임을 만듭니다.
    pub fn to_frame(&self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(self.frame_len());
        self.write_frame(&mut buf)?;
        Ok(buf.freeze())
    }

    /// 헤더와 본문을 `buf`에 이어 씁니다.
    pub fn write_frame(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = u32::try_from(self.data.len())
            .map_err(|_| EncodeError::TooLarge {
                len: self.data.len(),
            })?;
        buf.reserve(HEADER_LEN + self.data.len());
        buf.put_u32(self.record_type);
        buf.put_u32(len);
        buf.put_slice(&self.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::decode::{decode, decode_event};

    fn sample_event(kind: EventKind) -> EventRecord {
        let (src, dst) = if kind.is_ipv6() {
            (
                IpAddr::V6(Ipv6Addr::LOCALHOST),
                IpAddr::V6("2001:db8::9".parse().unwrap()),
            )
        } else {
            (
                IpAddr::V4(Ipv4Addr::new(10, 1, 1, 1)),
                IpAddr::V4(Ipv4Addr::new(10, 2, 2, 2)),
            )
        };
        EventRecord {
            kind,
            sensor_id: 0,
            event_id: 9,
            event_second: 1_600_000_000,
            event_microsecond: 999_999,
            signature_id: 1000001,
            generator_id: 1,
            signature_revision: 2,
            classification_id: 3,
            priority: 1,
            src_ip: src,
            dst_ip: dst,
            sport_itype: 8,
            dport_icode: 0,
            protocol: 1,
            impact_flag: 0,
            impact: 0,
            blocked: 0,
            mpls_label: kind.is_v2().then_some(16),
            vlan_id: kind.is_v2().then_some(4094),
        }
    }

    #[test]
    fn event_roundtrip_for_every_kind() {
        for kind in [EventKind::V4, EventKind::V6, EventKind::V4V2, EventKind::V6V2] {
            let event = sample_event(kind);
            let bytes = encode_event(&event).unwrap();
            assert_eq!(decode_event(kind, &bytes).unwrap(), event, "{kind}");
        }
    }

    #[test]
    fn v2_events_use_snort_padded_length() {
        assert_eq!(encode_event(&sample_event(EventKind::V4V2)).unwrap().len(), 60);
        assert_eq!(encode_event(&sample_event(EventKind::V6V2)).unwrap().len(), 84);
        assert_eq!(encode_event(&sample_event(EventKind::V4)).unwrap().len(), 52);
    }

    #[test]
    fn mismatched_address_family_is_rejected() {
        let mut event = sample_event(EventKind::V4);
        event.dst_ip = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let err = encode_event(&event).unwrap_err();
        assert_eq!(
            err,
            EncodeError::AddressFamily {
                kind: "event".to_owned(),
                field: "dst_ip",
            }
        );
    }

    #[test]
    fn frame_has_big_endian_header() {
        let raw = RawRecord::new(UNIFIED2_PACKET, Bytes::from_static(b"abc"));
        let frame = raw.to_frame().unwrap();
        assert_eq!(&frame[..8], &[0, 0, 0, 2, 0, 0, 0, 3]);
        assert_eq!(&frame[8..], b"abc");
    }

    #[test]
    fn packet_and_extra_roundtrip_through_record() {
        let packet = Record::Packet(PacketRecord {
            sensor_id: 1,
            event_id: 2,
            event_second: 3,
            packet_second: 4,
            packet_microsecond: 5,
            linktype: 1,
            length: 3,
            data: Bytes::from_static(b"\x00\x01\x02"),
        });
        let raw = encode_record(&packet).unwrap();
        assert_eq!(decode(raw.record_type, raw.data).unwrap(), Some(packet));

        let extra = Record::ExtraData(ExtraDataRecord {
            event_type: 4,
            event_length: 40,
            sensor_id: 1,
            event_id: 2,
            event_second: 3,
            data_type: 10,
            data_subtype: 1,
            data_length: 8,
            data: Bytes::from_static(b"evil.com"),
        });
        let raw = encode_record(&extra).unwrap();
        assert_eq!(decode(raw.record_type, raw.data).unwrap(), Some(extra));
    }
}
