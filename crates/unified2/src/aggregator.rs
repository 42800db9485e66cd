//! 이벤트 집계기
//!
//! 이벤트 레코드 하나와 그 뒤를 잇는 패킷/추가 데이터 레코드를 묶어
//! 논리적 알림 하나([`AlertUnit`])를 만듭니다. 다음 이벤트 레코드가
//! 도착하면 이전 묶음이 완성됩니다.

use crate::record::{EventRecord, ExtraDataRecord, PacketRecord, Record};

/// 이벤트에 딸린 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Packet(PacketRecord),
    ExtraData(ExtraDataRecord),
}

/// 이벤트 하나와 딸린 레코드들
///
/// 첫 요소는 항상 정확히 하나의 이벤트이며, 이는 타입으로 보장됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertUnit {
    /// 선두 이벤트
    pub event: EventRecord,
    /// 도착 순서를 유지한 패킷/추가 데이터
    pub attachments: Vec<Attachment>,
}

impl AlertUnit {
    /// 이벤트로 새 묶음을 시작합니다.
    pub fn new(event: EventRecord) -> Self {
        Self {
            event,
            attachments: Vec::new(),
        }
    }

    /// 딸린 패킷 레코드
    pub fn packets(&self) -> impl Iterator<Item = &PacketRecord> {
        self.attachments.iter().filter_map(|a| match a {
            Attachment::Packet(p) => Some(p),
            Attachment::ExtraData(_) => None,
        })
    }

    /// 딸린 추가 데이터 레코드
    pub fn extra_data(&self) -> impl Iterator<Item = &ExtraDataRecord> {
        self.attachments.iter().filter_map(|a| match a {
            Attachment::ExtraData(x) => Some(x),
            Attachment::Packet(_) => None,
        })
    }

    /// 전체 레코드 수 (이벤트 포함)
    pub fn len(&self) -> usize {
        1 + self.attachments.len()
    }

    /// 이벤트만 있고 딸린 레코드가 없는지
    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// 원래 순서의 레코드 목록으로 펼칩니다.
    pub fn into_records(self) -> Vec<Record> {
        let mut records = Vec::with_capacity(self.len());
        records.push(Record::Event(self.event));
        records.extend(self.attachments.into_iter().map(|a| match a {
            Attachment::Packet(p) => Record::Packet(p),
            Attachment::ExtraData(x) => Record::ExtraData(x),
        }));
        records
    }
}

/// 레코드 스트림을 알림 단위로 묶는 집계기
#[derive(Debug, Default)]
pub struct EventAggregator {
    pending: Option<AlertUnit>,
    discarded: u64,
}

impl EventAggregator {
    /// 빈 집계기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드를 추가합니다.
    ///
    /// 새 이벤트가 들어와 이전 묶음이 완성되면 그것을 반환합니다.
    /// 소속 이벤트 없이 도착한 패킷/추가 데이터는 버립니다.
    pub fn add(&mut self, record: Record) -> Option<AlertUnit> {
        let attachment = match record {
            Record::Event(event) => return self.pending.replace(AlertUnit::new(event)),
            Record::Packet(p) => Attachment::Packet(p),
            Record::ExtraData(x) => Attachment::ExtraData(x),
        };

        match self.pending.as_mut() {
            Some(unit) => unit.attachments.push(attachment),
            None => {
                self.discarded += 1;
                tracing::debug!(
                    discarded = self.discarded,
                    "dropping record with no preceding event"
                );
            }
        }
        None
    }

    /// 보류 중인 묶음을 무조건 내보냅니다.
    pub fn flush(&mut self) -> Option<AlertUnit> {
        self.pending.take()
    }

    /// 보류 중인 묶음이 있는지
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 지금까지 버린 레코드 수
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use bytes::Bytes;

    use super::*;
    use crate::record::EventKind;

    fn event(id: u32) -> Record {
        Record::Event(EventRecord {
            kind: EventKind::V4,
            sensor_id: 0,
            event_id: id,
            event_second: 100,
            event_microsecond: 0,
            signature_id: 1,
            generator_id: 1,
            signature_revision: 1,
            classification_id: 0,
            priority: 3,
            src_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            dst_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            sport_itype: 0,
            dport_icode: 0,
            protocol: 6,
            impact_flag: 0,
            impact: 0,
            blocked: 0,
            mpls_label: None,
            vlan_id: None,
        })
    }

    fn packet(id: u32) -> Record {
        Record::Packet(PacketRecord {
            sensor_id: 0,
            event_id: id,
            event_second: 100,
            packet_second: 100,
            packet_microsecond: 0,
            linktype: 1,
            length: 0,
            data: Bytes::new(),
        })
    }

    fn extra(id: u32) -> Record {
        Record::ExtraData(ExtraDataRecord {
            event_type: 4,
            event_length: 32,
            sensor_id: 0,
            event_id: id,
            event_second: 100,
            data_type: 1,
            data_subtype: 1,
            data_length: 0,
            data: Bytes::new(),
        })
    }

    #[test]
    fn groups_records_between_events() {
        let mut agg = EventAggregator::new();
        assert!(agg.add(event(1)).is_none());
        assert!(agg.add(packet(1)).is_none());
        assert!(agg.add(extra(1)).is_none());

        let first = agg.add(event(2)).expect("e1 unit completes");
        assert_eq!(first.into_records(), vec![event(1), packet(1), extra(1)]);

        assert!(agg.add(packet(2)).is_none());
        let second = agg.flush().expect("trailing unit");
        assert_eq!(second.into_records(), vec![event(2), packet(2)]);
        assert!(agg.flush().is_none());
    }

    #[test]
    fn orphan_records_are_discarded() {
        let mut agg = EventAggregator::new();
        assert!(agg.add(packet(9)).is_none());
        assert!(agg.add(extra(9)).is_none());
        assert!(!agg.has_pending());
        assert_eq!(agg.discarded(), 2);
    }

    #[test]
    fn unit_accessors_split_attachments() {
        let mut agg = EventAggregator::new();
        agg.add(event(1));
        agg.add(packet(1));
        agg.add(extra(1));
        agg.add(packet(1));
        let unit = agg.flush().unwrap();
        assert_eq!(unit.len(), 4);
        assert_eq!(unit.packets().count(), 2);
        assert_eq!(unit.extra_data().count(), 1);
    }

    #[test]
    fn back_to_back_events_emit_bare_units() {
        let mut agg = EventAggregator::new();
        agg.add(event(1));
        let unit = agg.add(event(2)).unwrap();
        assert!(unit.is_empty());
        assert_eq!(unit.event.event_id, 1);
    }
}
