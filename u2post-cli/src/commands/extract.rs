//! `u2post extract` command handler

use std::io::Write;
use std::path::Path;

use bytes::BytesMut;
use serde::Serialize;
use tracing::{info, warn};

use u2post_unified2::{AlertUnit, EventAggregator, ReadOutcome, RecordReader, encode_record};

use crate::cli::ExtractArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `extract` command.
pub async fn execute(args: ExtractArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let unit = find_unit(&args.file, args.event_id, args.event_second)
        .await?
        .ok_or_else(|| {
            CliError::Command(match args.event_second {
                Some(second) => format!(
                    "no alert unit with event id {} at second {second} in {}",
                    args.event_id,
                    args.file.display()
                ),
                None => format!(
                    "no alert unit with event id {} in {}",
                    args.event_id,
                    args.file.display()
                ),
            })
        })?;

    let report = write_unit(&args.file, unit, &args.out).await?;
    writer.render(&report)
}

/// Scan `path` for the first alert unit whose event matches.
///
/// Undecodable records are skipped with a warning; the aggregator sees the
/// same stream the ingest pipeline would.
pub async fn find_unit(
    path: &Path,
    event_id: u32,
    event_second: Option<u32>,
) -> Result<Option<AlertUnit>, CliError> {
    let matches = |unit: &AlertUnit| {
        unit.event.event_id == event_id
            && event_second.is_none_or(|second| unit.event.event_second == second)
    };

    let mut reader = RecordReader::open(path).await?;
    let mut aggregator = EventAggregator::new();

    loop {
        let record = match reader.next_record().await {
            Ok(ReadOutcome::Record(record)) => record,
            Ok(ReadOutcome::Eof | ReadOutcome::Partial) => break,
            Err(e) if e.is_record_local() => {
                warn!(offset = reader.offset(), error = %e, "skipping undecodable record");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(unit) = aggregator.add(record).filter(|unit| matches(unit)) {
            return Ok(Some(unit));
        }
    }

    Ok(aggregator.flush().filter(|unit| matches(unit)))
}

/// Frame every record of `unit` and write them to `out`.
pub async fn write_unit(
    source: &Path,
    unit: AlertUnit,
    out: &Path,
) -> Result<ExtractReport, CliError> {
    let event_id = unit.event.event_id;
    let event_second = unit.event.event_second;
    let signature = format!(
        "{}:{}:{}",
        unit.event.generator_id, unit.event.signature_id, unit.event.signature_revision
    );

    let records = unit.into_records();
    let mut buf = BytesMut::new();
    for record in &records {
        encode_record(record)
            .and_then(|raw| raw.write_frame(&mut buf))
            .map_err(|e| CliError::Command(format!("failed to encode {}: {e}", record.kind_name())))?;
    }

    tokio::fs::write(out, &buf).await?;
    info!(out = %out.display(), records = records.len(), bytes = buf.len(), "alert unit extracted");

    Ok(ExtractReport {
        source: source.display().to_string(),
        output: out.display().to_string(),
        event_id,
        event_second,
        signature,
        records: records.len(),
        bytes: buf.len(),
    })
}

#[derive(Debug, Serialize)]
pub struct ExtractReport {
    pub source: String,
    pub output: String,
    pub event_id: u32,
    pub event_second: u32,
    /// `gid:sid:rev`
    pub signature: String,
    pub records: usize,
    pub bytes: usize,
}

impl Render for ExtractReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Extracted event {} ({}) from {}",
            self.event_id.to_string().bold(),
            self.signature,
            self.source
        )?;
        writeln!(
            w,
            "  {} records, {} bytes -> {}",
            self.records,
            self.bytes,
            self.output.green()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv6Addr};

    use bytes::Bytes;
    use u2post_unified2::{EventKind, EventRecord, ExtraDataRecord, Record};

    fn event(event_id: u32, event_second: u32) -> Record {
        Record::Event(EventRecord {
            kind: EventKind::V6V2,
            sensor_id: 0,
            event_id,
            event_second,
            event_microsecond: 5,
            signature_id: 2_013_028,
            generator_id: 1,
            signature_revision: 3,
            classification_id: 2,
            priority: 1,
            src_ip: IpAddr::V6(Ipv6Addr::LOCALHOST),
            dst_ip: IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
            sport_itype: 40000,
            dport_icode: 443,
            protocol: 6,
            impact_flag: 0,
            impact: 0,
            blocked: 1,
            mpls_label: Some(0),
            vlan_id: Some(7),
        })
    }

    fn extra(event_id: u32, event_second: u32) -> Record {
        Record::ExtraData(ExtraDataRecord {
            event_type: 4,
            event_length: 0,
            sensor_id: 0,
            event_id,
            event_second,
            data_type: 9,
            data_subtype: 1,
            data_length: 11,
            data: Bytes::from_static(b"example.org"),
        })
    }

    fn write_file(path: &Path, records: &[Record]) {
        let mut buf = BytesMut::new();
        for record in records {
            encode_record(record).unwrap().write_frame(&mut buf).unwrap();
        }
        std::fs::write(path, &buf).unwrap();
    }

    #[tokio::test]
    async fn extracts_unit_with_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("snort.log.1");
        write_file(
            &source,
            &[event(1, 100), extra(1, 100), event(2, 100), extra(2, 100), event(3, 100)],
        );

        let unit = find_unit(&source, 2, None).await.unwrap().unwrap();
        assert_eq!(unit.len(), 2);

        let out = dir.path().join("event2.u2");
        let report = write_unit(&source, unit.clone(), &out).await.unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.signature, "1:2013028:3");
        assert_eq!(report.bytes as u64, std::fs::metadata(&out).unwrap().len());

        // 추출한 파일을 다시 읽으면 같은 묶음이 나온다
        let reread = find_unit(&out, 2, Some(100)).await.unwrap().unwrap();
        assert_eq!(reread, unit);
    }

    #[tokio::test]
    async fn last_unit_is_found_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("snort.log.1");
        write_file(&source, &[event(1, 100), event(2, 100), extra(2, 100)]);

        let unit = find_unit(&source, 2, None).await.unwrap().unwrap();
        assert_eq!(unit.extra_data().count(), 1);
    }

    #[tokio::test]
    async fn event_second_disambiguates_reused_ids() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("snort.log.1");
        write_file(&source, &[event(1, 100), event(1, 200), extra(1, 200)]);

        let first = find_unit(&source, 1, None).await.unwrap().unwrap();
        assert_eq!(first.event.event_second, 100);

        let second = find_unit(&source, 1, Some(200)).await.unwrap().unwrap();
        assert_eq!(second.event.event_second, 200);
        assert_eq!(second.len(), 2);

        assert!(find_unit(&source, 1, Some(300)).await.unwrap().is_none());
    }
}
