//! `u2post dump` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use u2post_unified2::{ReadOutcome, Record, RecordReader};

use crate::cli::DumpArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `dump` command.
pub async fn execute(args: DumpArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = dump_file(&args.file, args.offset, args.limit).await?;
    writer.render(&report)
}

/// Decode records from `path` starting at `offset`.
///
/// Undecodable bodies and unknown record types are reported inline and
/// reading continues. A record whose declared length is implausible stops
/// the dump with an error since framing is lost from that point on.
pub async fn dump_file(
    path: &Path,
    offset: u64,
    limit: Option<usize>,
) -> Result<DumpReport, CliError> {
    info!(path = %path.display(), offset, "dumping unified2 file");

    let mut reader = RecordReader::open_at(path, offset).await?;
    let mut report = DumpReport {
        file: path.display().to_string(),
        start_offset: offset,
        end_offset: offset,
        records: Vec::new(),
        unknown: 0,
        decode_errors: 0,
        truncated_tail: false,
    };

    while limit.is_none_or(|max| report.records.len() < max) {
        let start = reader.offset();
        let raw = match reader.next_raw().await? {
            ReadOutcome::Record(raw) => raw,
            ReadOutcome::Eof => break,
            ReadOutcome::Partial => {
                debug!(offset = start, "file ends inside a record");
                report.truncated_tail = true;
                break;
            }
        };

        let entry = match raw.decode() {
            Ok(Some(record)) => DumpEntry::from_record(start, &record),
            Ok(None) => {
                report.unknown += 1;
                DumpEntry {
                    offset: start,
                    record_type: raw.record_type,
                    kind: "unknown".to_owned(),
                    event_id: None,
                    event_second: None,
                    summary: format!("{} bytes", raw.data.len()),
                }
            }
            Err(e) => {
                report.decode_errors += 1;
                DumpEntry {
                    offset: start,
                    record_type: raw.record_type,
                    kind: "invalid".to_owned(),
                    event_id: None,
                    event_second: None,
                    summary: e.to_string(),
                }
            }
        };
        report.records.push(entry);
    }

    report.end_offset = reader.offset();
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct DumpReport {
    pub file: String,
    pub start_offset: u64,
    /// Offset just past the last record printed
    pub end_offset: u64,
    pub records: Vec<DumpEntry>,
    pub unknown: usize,
    pub decode_errors: usize,
    /// The file ends inside a record (still being written, or cut short)
    pub truncated_tail: bool,
}

#[derive(Debug, Serialize)]
pub struct DumpEntry {
    pub offset: u64,
    pub record_type: u32,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_second: Option<u32>,
    pub summary: String,
}

impl DumpEntry {
    fn from_record(offset: u64, record: &Record) -> Self {
        Self {
            offset,
            record_type: record.tag(),
            kind: record.kind_name().to_owned(),
            event_id: Some(record.event_id()),
            event_second: Some(record.event_second()),
            summary: record.to_string(),
        }
    }
}

impl Render for DumpReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} ({} records, offset {}..{})",
            self.file.bold(),
            self.records.len(),
            self.start_offset,
            self.end_offset
        )?;
        writeln!(w)?;
        writeln!(w, "{:<10} {:<6} {:<11} {:<10} Summary", "Offset", "Type", "Kind", "Event")?;
        writeln!(w, "{}", "-".repeat(80))?;

        for r in &self.records {
            let kind = match r.kind.as_str() {
                "event" => r.kind.cyan(),
                "invalid" => r.kind.red(),
                "unknown" => r.kind.yellow(),
                _ => r.kind.normal(),
            };
            let event = r.event_id.map(|id| id.to_string()).unwrap_or_default();
            writeln!(
                w,
                "{:<10} {:<6} {:<11} {:<10} {}",
                r.offset, r.record_type, kind, event, r.summary
            )?;
        }

        if self.unknown > 0 || self.decode_errors > 0 {
            writeln!(w)?;
            writeln!(
                w,
                "{} unknown, {} undecodable",
                self.unknown,
                self.decode_errors.to_string().red()
            )?;
        }
        if self.truncated_tail {
            writeln!(w, "{}", "file ends inside a partial record".yellow())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use bytes::Bytes;
    use u2post_unified2::{EventKind, EventRecord, PacketRecord, RawRecord, encode_record};

    fn event(event_id: u32) -> Record {
        Record::Event(EventRecord {
            kind: EventKind::V4,
            sensor_id: 0,
            event_id,
            event_second: 1_700_000_000,
            event_microsecond: 0,
            signature_id: 1000,
            generator_id: 1,
            signature_revision: 1,
            classification_id: 0,
            priority: 3,
            src_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            dst_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            sport_itype: 1234,
            dport_icode: 80,
            protocol: 6,
            impact_flag: 0,
            impact: 0,
            blocked: 0,
            mpls_label: None,
            vlan_id: None,
        })
    }

    fn packet(event_id: u32) -> Record {
        Record::Packet(PacketRecord {
            sensor_id: 0,
            event_id,
            event_second: 1_700_000_000,
            packet_second: 1_700_000_000,
            packet_microsecond: 0,
            linktype: 1,
            length: 2,
            data: Bytes::from_static(b"hi"),
        })
    }

    fn frame(record: &Record) -> Bytes {
        encode_record(record).unwrap().to_frame().unwrap()
    }

    #[tokio::test]
    async fn dump_reports_every_record_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snort.log.1");
        let mut buf = Vec::new();
        buf.extend_from_slice(&frame(&event(1)));
        buf.extend_from_slice(&frame(&packet(1)));
        buf.extend_from_slice(&RawRecord::new(999, vec![0u8; 4]).to_frame().unwrap());
        // 이벤트 태그에 본문이 너무 짧은 레코드
        buf.extend_from_slice(&RawRecord::new(7, vec![0u8; 3]).to_frame().unwrap());
        std::fs::write(&path, &buf).unwrap();

        let report = dump_file(&path, 0, None).await.unwrap();
        let kinds: Vec<_> = report.records.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["event", "packet", "unknown", "invalid"]);
        assert_eq!(report.unknown, 1);
        assert_eq!(report.decode_errors, 1);
        assert_eq!(report.end_offset, buf.len() as u64);
        assert!(!report.truncated_tail);
        assert_eq!(report.records[1].offset, 60);
    }

    #[tokio::test]
    async fn dump_flags_partial_tail_and_honours_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snort.log.2");
        let mut buf = frame(&event(1)).to_vec();
        let second = frame(&event(2));
        buf.extend_from_slice(&second[..20]);
        std::fs::write(&path, &buf).unwrap();

        let report = dump_file(&path, 0, None).await.unwrap();
        assert_eq!(report.records.len(), 1);
        assert!(report.truncated_tail);
        assert_eq!(report.end_offset, 60);

        let limited = dump_file(&path, 0, Some(0)).await.unwrap();
        assert!(limited.records.is_empty());
        assert!(!limited.truncated_tail);
    }

    #[tokio::test]
    async fn dump_fails_on_oversized_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        let mut header = Vec::new();
        header.extend_from_slice(&7u32.to_be_bytes());
        header.extend_from_slice(&u32::MAX.to_be_bytes());
        std::fs::write(&path, header).unwrap();

        let err = dump_file(&path, 0, None).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn dump_missing_file_is_io_error() {
        let err = dump_file(Path::new("/nonexistent/snort.log.1"), 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn text_render_lists_records() {
        let report = DumpReport {
            file: "snort.log.1".to_owned(),
            start_offset: 0,
            end_offset: 60,
            records: vec![DumpEntry::from_record(0, &event(7))],
            unknown: 0,
            decode_errors: 0,
            truncated_tail: true,
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("snort.log.1"));
        assert!(output.contains("sig=1:1000:1"));
        assert!(output.contains("partial record"));
    }
}
