//! Remote file manifests
//!
//! A manifest lists files by name, location and checksum. It comes either as
//! a single JSON array:
//!
//! ```json
//! [
//!   {"filename": "a.txt", "url": "https://example.com/a.txt", "sha256": "..."},
//!   {"filename": "b.txt", "url": "https://example.com/b.txt", "md5": "..."}
//! ]
//! ```
//!
//! or as a stream with one JSON object per line. [`ManifestReader`] detects
//! which by looking at the first non-whitespace character.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;

use crate::checksum::{Algorithm, Checksum};
use crate::error::{MinidError, Result};

/// One record of a manifest.
///
/// Field order and any extra fields (`length`, ...) are kept as read. Only
/// `url` is ever rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ManifestEntry {
    fields: Map<String, Value>,
}

impl ManifestEntry {
    /// Validate a JSON object as a manifest entry
    pub fn from_map(fields: Map<String, Value>) -> Result<Self> {
        match fields.get("filename") {
            Some(Value::String(_)) => {}
            _ => {
                return Err(MinidError::Validation(
                    "manifest entry is missing a string \"filename\"".to_string(),
                ))
            }
        }
        let url_ok = match fields.get("url") {
            Some(Value::String(_)) => true,
            Some(Value::Array(items)) => !items.is_empty() && items.iter().all(Value::is_string),
            _ => false,
        };
        if !url_ok {
            return Err(MinidError::Validation(format!(
                "manifest entry {:?} needs \"url\" as a string or a list of strings",
                fields.get("filename")
            )));
        }
        Ok(Self { fields })
    }

    pub fn filename(&self) -> &str {
        self.fields
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Every location listed under `url`, in order
    pub fn locations(&self) -> Vec<String> {
        match self.fields.get("url") {
            Some(Value::String(url)) => vec![url.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Replace `url` with a single identifier
    pub fn set_url(&mut self, identifier: impl Into<String>) {
        // Map::insert keeps the existing position of the key
        self.fields
            .insert("url".to_string(), Value::String(identifier.into()));
    }

    /// Checksum fields, split into supported ones and names we do not know.
    ///
    /// Any string-valued field other than `filename` and `url` whose name is
    /// not a supported algorithm but looks like a hash name is reported as
    /// unsupported.
    pub fn checksums(&self) -> (Vec<Checksum>, Vec<String>) {
        let mut supported = Vec::new();
        let mut unsupported = Vec::new();
        for (key, value) in &self.fields {
            if key == "filename" || key == "url" {
                continue;
            }
            match key.parse::<Algorithm>() {
                Ok(algorithm) => match value.as_str() {
                    Some(digest) => supported.push(Checksum::new(algorithm, digest)),
                    None => unsupported.push(key.clone()),
                },
                Err(_) if looks_like_hash_name(key) => unsupported.push(key.clone()),
                Err(_) => {}
            }
        }
        (supported, unsupported)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

fn looks_like_hash_name(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    ["md", "sha", "blake", "crc", "xxh"]
        .iter()
        .any(|family| lower.starts_with(family))
}

impl TryFrom<Map<String, Value>> for ManifestEntry {
    type Error = MinidError;

    fn try_from(fields: Map<String, Value>) -> Result<Self> {
        Self::from_map(fields)
    }
}

impl TryFrom<Value> for ManifestEntry {
    type Error = MinidError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            other => Err(MinidError::Validation(format!(
                "manifest entries must be JSON objects, got {}",
                other
            ))),
        }
    }
}

impl From<ManifestEntry> for Map<String, Value> {
    fn from(entry: ManifestEntry) -> Self {
        entry.fields
    }
}

/// Lazily yields the entries of a manifest, in source order
pub struct ManifestReader<R: BufRead> {
    inner: Source<R>,
}

enum Source<R: BufRead> {
    Stream(Lines<R>),
    Array(std::vec::IntoIter<Value>),
}

impl ManifestReader<BufReader<File>> {
    /// Open a manifest file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MinidError::FileNotFound(path.to_path_buf()));
        }
        let reader = Self::new(BufReader::new(File::open(path)?))?;
        tracing::info!(
            path = %path.display(),
            format = if reader.is_stream() { "stream" } else { "file" },
            "parsing manifest"
        );
        Ok(reader)
    }
}

impl<R: BufRead> ManifestReader<R> {
    /// Wrap any buffered reader, such as locked stdin.
    ///
    /// Only leading whitespace is consumed while deciding the format.
    pub fn new(mut reader: R) -> Result<Self> {
        let inner = if starts_with_object(&mut reader)? {
            Source::Stream(reader.lines())
        } else {
            let values: Vec<Value> = serde_json::from_reader(reader)?;
            Source::Array(values.into_iter())
        };
        Ok(Self { inner })
    }

    /// True if the input is one object per line rather than a JSON array
    pub fn is_stream(&self) -> bool {
        matches!(self.inner, Source::Stream(_))
    }
}

/// Peek past whitespace at the first meaningful byte
fn starts_with_object(reader: &mut impl BufRead) -> Result<bool> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(false);
        }
        let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if skip < buf.len() {
            let first = buf[skip];
            reader.consume(skip);
            return Ok(first == b'{');
        }
        reader.consume(skip);
    }
}

impl<R: BufRead> Iterator for ManifestReader<R> {
    type Item = Result<ManifestEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Source::Stream(lines) => loop {
                let line = match lines.next()? {
                    Ok(line) => line,
                    Err(e) => return Some(Err(e.into())),
                };
                if line.trim().is_empty() {
                    continue;
                }
                return Some(
                    serde_json::from_str::<Value>(&line)
                        .map_err(MinidError::from)
                        .and_then(ManifestEntry::try_from),
                );
            },
            Source::Array(values) => values.next().map(ManifestEntry::try_from),
        }
    }
}

/// Write entries back out as a JSON array
pub fn write_manifest<W: Write>(entries: &[ManifestEntry], mut writer: W, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, entries)?;
    } else {
        serde_json::to_writer(&mut writer, entries)?;
    }
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_all(input: &str) -> Vec<ManifestEntry> {
        ManifestReader::new(input.as_bytes())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_stream_format() {
        let input = "{\"filename\": \"a.txt\", \"url\": \"https://x/a\", \"sha256\": \"A\"}\n\
                     {\"filename\": \"b.txt\", \"url\": \"https://x/b\", \"sha256\": \"B\"}\n";
        let reader = ManifestReader::new(input.as_bytes()).unwrap();
        assert!(reader.is_stream());
        let entries: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filename(), "a.txt");
        assert_eq!(entries[1].filename(), "b.txt");
    }

    #[test]
    fn test_array_format() {
        let input = r#"[{"filename": "a.txt", "url": "https://x/a", "sha256": "A"},
                        {"filename": "b.txt", "url": "https://x/b", "sha256": "B"}]"#;
        let reader = ManifestReader::new(input.as_bytes()).unwrap();
        assert!(!reader.is_stream());
        let entries: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filename(), "a.txt");
        assert_eq!(entries[1].filename(), "b.txt");
    }

    #[test]
    fn test_leading_whitespace_and_blank_lines() {
        let input = "\n\n   {\"filename\": \"a.txt\", \"url\": \"u\", \"md5\": \"M\"}\n\n{\"filename\": \"b.txt\", \"url\": \"u\", \"md5\": \"N\"}";
        let entries = read_all(input);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filename(), "a.txt");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(ManifestReader::new("".as_bytes()).is_err());
        assert!(read_all("[]").is_empty());
    }

    #[test]
    fn test_bad_line_is_reported_lazily() {
        let input = "{\"filename\": \"a.txt\", \"url\": \"u\", \"md5\": \"M\"}\n{not json\n";
        let mut reader = ManifestReader::new(input.as_bytes()).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(reader.next(), Some(Err(MinidError::Json(_)))));
    }

    #[test]
    fn test_entry_validation() {
        assert!(ManifestEntry::try_from(json!({"url": "u"})).is_err());
        assert!(ManifestEntry::try_from(json!({"filename": "a", "url": 3})).is_err());
        assert!(ManifestEntry::try_from(json!({"filename": "a", "url": []})).is_err());
        assert!(ManifestEntry::try_from(json!(["not", "an", "object"])).is_err());
        let entry = ManifestEntry::try_from(json!({"filename": "a", "url": ["u1", "u2"]})).unwrap();
        assert_eq!(entry.locations(), vec!["u1", "u2"]);
    }

    #[test]
    fn test_checksum_extraction() {
        let entry = ManifestEntry::try_from(json!({
            "length": 47,
            "filename": "a.txt",
            "url": "u",
            "sha256": "S",
            "md5": "M",
            "sha3_256": "X",
        }))
        .unwrap();
        let (supported, unsupported) = entry.checksums();
        assert_eq!(
            supported,
            vec![
                Checksum::new(Algorithm::Sha256, "S"),
                Checksum::new(Algorithm::Md5, "M"),
            ]
        );
        assert_eq!(unsupported, vec!["sha3_256".to_string()]);
    }

    #[test]
    fn test_set_url_keeps_field_order() {
        let mut entry = ManifestEntry::try_from(json!({
            "length": 47,
            "filename": "a.txt",
            "url": "https://example.com/a.txt",
            "sha256": "S",
        }))
        .unwrap();
        entry.set_url("hdl:20.500.12633/abc");
        let keys: Vec<_> = entry.as_map().keys().cloned().collect();
        assert_eq!(keys, vec!["length", "filename", "url", "sha256"]);
        assert_eq!(entry.locations(), vec!["hdl:20.500.12633/abc"]);
    }

    #[test]
    fn test_write_manifest() {
        let entries = read_all(r#"[{"filename": "a.txt", "url": "u", "md5": "M"}]"#);
        let mut out = Vec::new();
        write_manifest(&entries, &mut out, false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[{\"filename\":\"a.txt\",\"url\":\"u\",\"md5\":\"M\"}]\n"
        );
    }
}
