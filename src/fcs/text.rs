//! FCS HEADER and TEXT segment parsing.
//!
//! The HEADER is a fixed 58-byte ASCII block: a six character version tag, four spaces and
//! six right-justified 8-byte offsets (TEXT, DATA and ANALYSIS begin/end, end inclusive).
//! The TEXT segment is a delimiter separated list of alternating keys and values in which a
//! doubled delimiter stands for a literal one.
//!
//! Keys are normalized on read: a leading `$` is stripped and the key is lower-cased, so every
//! lookup in [`Metadata`] is case-insensitive and `$TOT`, `tot` and `TOT` are the same key.

use crate::error::{AppResult, CytoError};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Length of the fixed HEADER block.
pub const HEADER_LEN: usize = 58;

/// FCS versions this reader understands.
pub const SUPPORTED_VERSIONS: [&str; 3] = ["FCS2.0", "FCS3.0", "FCS3.1"];

/// Byte range of a segment, both ends inclusive as written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First byte of the segment.
    pub begin: usize,
    /// Last byte of the segment.
    pub end: usize,
}

impl Segment {
    /// A segment is empty when both offsets are zero (FCS 3.x large-file convention).
    pub fn is_empty(&self) -> bool {
        self.begin == 0 && self.end == 0
    }

    /// Slice the segment out of the file, failing if it runs past the end.
    pub fn slice<'a>(&self, bytes: &'a [u8], what: &str) -> AppResult<&'a [u8]> {
        if self.end < self.begin {
            // `end = begin - 1` is how writers express a zero-length segment.
            if self.end + 1 == self.begin {
                return Ok(&[]);
            }
            return Err(CytoError::Parse(format!(
                "{what} segment ends ({}) before it begins ({})",
                self.end, self.begin
            )));
        }
        bytes.get(self.begin..=self.end).ok_or_else(|| {
            CytoError::Parse(format!(
                "{what} segment {}..={} exceeds file length {}",
                self.begin,
                self.end,
                bytes.len()
            ))
        })
    }
}

/// Parsed fixed-size HEADER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Version tag, e.g. `FCS3.1`.
    pub version: String,
    /// Primary TEXT segment.
    pub text: Segment,
    /// DATA segment; may be empty, in which case `$BEGINDATA`/`$ENDDATA` apply.
    pub data: Segment,
    /// ANALYSIS segment, unused by the loader.
    pub analysis: Segment,
}

impl Header {
    /// Parse the HEADER from the start of the file.
    pub fn parse(bytes: &[u8]) -> AppResult<Self> {
        let raw = bytes.get(..HEADER_LEN).ok_or_else(|| {
            CytoError::Parse(format!(
                "file is {} bytes, shorter than the {HEADER_LEN} byte FCS header",
                bytes.len()
            ))
        })?;

        let version = String::from_utf8_lossy(&raw[..6]).to_string();
        if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
            return Err(CytoError::Parse(format!(
                "unsupported or missing FCS version tag '{}'",
                version.escape_debug()
            )));
        }

        let offset = |index: usize| -> AppResult<usize> {
            let start = 10 + index * 8;
            let field = String::from_utf8_lossy(&raw[start..start + 8]);
            let field = field.trim();
            if field.is_empty() {
                return Ok(0);
            }
            field.parse::<usize>().map_err(|_| {
                CytoError::Parse(format!("header offset {index} is not a number: '{field}'"))
            })
        };

        let header = Self {
            version,
            text: Segment {
                begin: offset(0)?,
                end: offset(1)?,
            },
            data: Segment {
                begin: offset(2)?,
                end: offset(3)?,
            },
            analysis: Segment {
                begin: offset(4)?,
                end: offset(5)?,
            },
        };
        debug!(
            version = %header.version,
            text = ?header.text,
            data = ?header.data,
            "Parsed FCS header"
        );
        Ok(header)
    }
}

/// Normalized TEXT dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

/// Normalize a TEXT keyword: strip a leading `$`, trim and lower-case.
pub fn normalize_key(key: &str) -> String {
    key.trim().trim_start_matches('$').to_lowercase()
}

impl Metadata {
    /// Look up a key case-insensitively, with or without the `$` prefix.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&normalize_key(key)).map(String::as_str)
    }

    /// Look up a key, falling back to `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Whether the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    /// Insert a value under the normalized key, replacing any previous value.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(normalize_key(key), value.into());
    }

    /// Parse an integer keyword, `None` when absent.
    pub fn get_usize(&self, key: &str) -> AppResult<Option<usize>> {
        self.get(key)
            .map(|v| {
                v.trim().parse::<usize>().map_err(|_| {
                    CytoError::Parse(format!("keyword '{key}' is not an integer: '{v}'"))
                })
            })
            .transpose()
    }

    /// Merge another dictionary in; keys already present are kept.
    pub fn merge_missing(&mut self, other: Metadata) {
        for (key, value) in other.entries {
            self.entries.entry(key).or_insert(value);
        }
    }

    /// Number of keywords.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary holds no keywords.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate keywords in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a TEXT segment (first byte is the delimiter).
pub fn parse_text(segment: &[u8]) -> AppResult<Metadata> {
    let (&delimiter, body) = segment
        .split_first()
        .ok_or_else(|| CytoError::Parse("TEXT segment is empty".to_string()))?;

    let mut tokens: Vec<Vec<u8>> = Vec::new();
    let mut current = Vec::new();
    let mut i = 0;
    while i < body.len() {
        if body[i] != delimiter {
            current.push(body[i]);
            i += 1;
            continue;
        }
        // Runs of delimiters: each pair is one escaped literal, an odd one out is a separator
        // and the literals it leaves open the next token.
        let run = body[i..].iter().take_while(|&&b| b == delimiter).count();
        if run % 2 == 1 {
            tokens.push(std::mem::take(&mut current));
        }
        current.extend(std::iter::repeat(delimiter).take(run / 2));
        i += run;
    }
    if !current.iter().all(u8::is_ascii_whitespace) {
        // Segment not terminated by a delimiter; tolerated. Trailing padding is dropped.
        tokens.push(current);
    }

    if tokens.len() % 2 != 0 {
        return Err(CytoError::Parse(format!(
            "TEXT segment holds an odd number of tokens ({}); keywords and values must pair up",
            tokens.len()
        )));
    }

    let mut metadata = Metadata::default();
    for pair in tokens.chunks_exact(2) {
        let key = String::from_utf8_lossy(&pair[0]);
        let value = String::from_utf8_lossy(&pair[1]);
        if key.trim().is_empty() {
            warn!("Skipping TEXT entry with an empty keyword");
            continue;
        }
        metadata.insert(&key, value.trim().to_string());
    }
    Ok(metadata)
}

/// Parse HEADER, primary TEXT and, when present, supplemental TEXT.
pub fn read_header_and_text(bytes: &[u8]) -> AppResult<(Header, Metadata)> {
    let header = Header::parse(bytes)?;
    let mut metadata = parse_text(header.text.slice(bytes, "TEXT")?)?;

    let supplemental = Segment {
        begin: metadata.get_usize("beginstext")?.unwrap_or(0),
        end: metadata.get_usize("endstext")?.unwrap_or(0),
    };
    if !supplemental.is_empty() && supplemental != header.text {
        match supplemental
            .slice(bytes, "supplemental TEXT")
            .and_then(parse_text)
        {
            Ok(extra) => metadata.merge_missing(extra),
            Err(e) => warn!(error = %e, "Ignoring unreadable supplemental TEXT segment"),
        }
    }

    debug!(keywords = metadata.len(), "Parsed TEXT segment");
    Ok((header, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let meta = parse_text(b"|$TOT|100|$P1N|FSC-A|Tube Name|T1|").unwrap();
        assert_eq!(meta.get("tot"), Some("100"));
        assert_eq!(meta.get("$TOT"), Some("100"));
        assert_eq!(meta.get("p1n"), Some("FSC-A"));
        assert_eq!(meta.get("tube name"), Some("T1"));
        assert_eq!(meta.get_or("cyt", "Unknown"), "Unknown");
    }

    #[test]
    fn doubled_delimiter_is_literal() {
        let meta = parse_text(b"/$FIL/a//b.fcs/$SYS/Linux/").unwrap();
        assert_eq!(meta.get("fil"), Some("a/b.fcs"));
        assert_eq!(meta.get("sys"), Some("Linux"));
    }

    #[test]
    fn value_may_start_with_escaped_delimiter() {
        let meta = parse_text(b"|$FIL|||x|$TOT|3|").unwrap();
        assert_eq!(meta.get("fil"), Some("|x"));
        assert_eq!(meta.get("tot"), Some("3"));

        let meta = parse_text(b"/$FIL/////x//y/$SYS/Linux/").unwrap();
        assert_eq!(meta.get("fil"), Some("//x/y"));
        assert_eq!(meta.get("sys"), Some("Linux"));
    }

    #[test]
    fn odd_token_count_is_rejected() {
        assert!(matches!(
            parse_text(b"|$TOT|100|$PAR|"),
            Err(CytoError::Parse(_))
        ));
    }

    #[test]
    fn zero_length_segment_slices_empty() {
        let bytes = [0u8; 10];
        let empty = Segment { begin: 5, end: 4 };
        assert!(empty.slice(&bytes, "DATA").unwrap().is_empty());
        assert!(Segment { begin: 5, end: 2 }.slice(&bytes, "DATA").is_err());
        assert!(Segment { begin: 5, end: 10 }.slice(&bytes, "DATA").is_err());
    }

    #[test]
    fn header_rejects_unknown_version() {
        let mut raw = b"XYZ1.0    ".to_vec();
        raw.extend_from_slice(&[b' '; 48]);
        assert!(matches!(Header::parse(&raw), Err(CytoError::Parse(_))));
        assert!(Header::parse(b"FCS3.0").is_err());
    }

    #[test]
    fn header_parses_offsets() {
        let raw = format!(
            "FCS3.1    {:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            58, 300, 301, 700, 0, 0
        );
        let header = Header::parse(raw.as_bytes()).unwrap();
        assert_eq!(header.version, "FCS3.1");
        assert_eq!(header.text, Segment { begin: 58, end: 300 });
        assert_eq!(header.data, Segment { begin: 301, end: 700 });
        assert!(header.analysis.is_empty());
    }
}
