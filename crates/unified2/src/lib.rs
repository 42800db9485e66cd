//! # u2post-unified2
//!
//! Snort/Suricata unified2 바이너리 알림 로그 형식을 다룹니다.
//!
//! - [`record`]: 와이어 상수와 레코드 타입 ([`Record`] = Event | Packet | ExtraData)
//! - [`decode`]: 타입 태그 → 디코더 디스패치
//! - [`encode`]: 레코드 → 바이트 (픽스처, 추출)
//! - [`reader`]: 파일 하나를 tail하는 [`RecordReader`]
//! - [`aggregator`]: 이벤트와 딸린 레코드를 묶는 [`EventAggregator`]
//!
//! # 사용 예시
//! ```ignore
//! use u2post_unified2::{EventAggregator, ReadOutcome, RecordReader};
//!
//! let mut reader = RecordReader::open("snort.log.1500000000").await?;
//! let mut aggregator = EventAggregator::new();
//! while let ReadOutcome::Record(record) = reader.next_record().await? {
//!     if let Some(unit) = aggregator.add(record) {
//!         println!("event {} with {} records", unit.event.event_id, unit.len());
//!     }
//! }
//! ```

pub mod aggregator;
pub mod decode;
pub mod encode;
pub mod error;
pub mod reader;
pub mod record;

pub use aggregator::{AlertUnit, Attachment, EventAggregator};
pub use decode::decode;
pub use encode::encode_record;
pub use error::{DecodeError, EncodeError, Unified2Error};
pub use reader::{ReadOutcome, RecordReader};
pub use record::{EventKind, EventRecord, ExtraDataRecord, PacketRecord, RawRecord, Record};
