//! Human-readable rendering of identifier records

use chrono::{Local, NaiveDateTime, TimeZone, Utc};

use crate::identifier::IdentifierTranslator;
use crate::record::IdentifierRecord;

const SERVICE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%A, %B %d, %Y %H:%M:%S %Z";

/// Line placed between records
pub fn separator() -> String {
    format!("\n{}", "-".repeat(80))
}

/// Byte counts as `200 bytes`, `1.5KB`, `12.0GB`, ...
pub fn human_size(size: u64) -> String {
    const UNITS: [&str; 7] = ["KB", "MB", "GB", "TB", "PB", "EB", "ZB"];
    if size < 1024 {
        return format!("{} bytes", size);
    }
    let mut value = size as f64 / 1024.0;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}YB", value)
}

/// Service timestamps are naive UTC; show them in local time
pub fn local_datetime(timestamp: &str) -> String {
    match NaiveDateTime::parse_from_str(timestamp, SERVICE_DATE_FORMAT) {
        Ok(naive) => Utc
            .from_utc_datetime(&naive)
            .with_timezone(&Local)
            .format(DATE_FORMAT)
            .to_string(),
        Err(_) => timestamp.to_string(),
    }
}

/// Render one record as aligned `Field: value` lines
pub fn pretty_record(translator: &IdentifierTranslator, record: &IdentifierRecord) -> String {
    let as_minid = |id: &str| translator.to_minid(id).unwrap_or_else(|_| id.to_string());

    let checksums = record
        .checksums
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    let fields = [
        ("Minid", as_minid(&record.identifier)),
        ("Title", record.title().unwrap_or_default().to_string()),
        ("Checksums", checksums),
        ("Size", human_size(record.length().unwrap_or(0))),
        ("Created", record.created.as_deref().map(local_datetime).unwrap_or_default()),
        ("Updated", record.updated.as_deref().map(local_datetime).unwrap_or_default()),
        ("Landing Page", record.landing_page.clone().unwrap_or_default()),
        ("Locations", record.location.join(", ")),
        ("Active", record.active.to_string()),
        ("Replaces", record.replaces.as_deref().map(as_minid).unwrap_or_default()),
        ("Replaced By", record.replaced_by.as_deref().map(as_minid).unwrap_or_default()),
    ];

    let lines: Vec<String> = fields
        .iter()
        .map(|(title, text)| format!("{:20} {}", format!("{}:", title), text))
        .collect();
    format!("\n{}", lines.join("\n"))
}

/// Render several records separated by [`separator`]
pub fn pretty_records(translator: &IdentifierTranslator, records: &[IdentifierRecord]) -> String {
    records
        .iter()
        .map(|r| pretty_record(translator, r))
        .collect::<Vec<_>>()
        .join(&separator())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 bytes");
        assert_eq!(human_size(200), "200 bytes");
        assert_eq!(human_size(1536), "1.5KB");
        assert_eq!(human_size(12 * 1024 * 1024 * 1024), "12.0GB");
    }

    #[test]
    fn test_unparseable_timestamp_passes_through() {
        assert_eq!(local_datetime("yesterday"), "yesterday");
        assert_ne!(local_datetime("2020-04-08T14:17:53.212592"), "2020-04-08T14:17:53.212592");
    }

    #[test]
    fn test_pretty_record() {
        let record: IdentifierRecord = serde_json::from_value(json!({
            "identifier": "hdl:20.500.12633/1234567",
            "checksums": [{"function": "sha256", "value": "abc"}],
            "metadata": {"title": "foo.txt", "length": 76},
            "location": ["https://example.com/foo.txt"],
            "replaces": "hdl:20.500.12633/789",
        }))
        .unwrap();

        let out = pretty_record(&IdentifierTranslator::default(), &record);
        assert!(out.contains("Minid:               minid.test:1234567"));
        assert!(out.contains("Title:               foo.txt"));
        assert!(out.contains("Checksums:           abc (sha256)"));
        assert!(out.contains("Size:                76 bytes"));
        assert!(out.contains("Replaces:            minid.test:789"));
    }
}
