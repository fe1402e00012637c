//! Binary string sweep
//!
//! Recovers candidate strings from bytes with no structural knowledge, for
//! containers that fail to load. Four independent strategies run over the
//! same buffer and their results are unioned:
//!
//! - runs of printable bytes (ASCII plus the high band used by UTF-8 and
//!   Latin-1 accents)
//! - UTF-16LE runs of `(printable, 0x00)` pairs
//! - length-prefixed records with 2, 4 or 8 byte little-endian lengths
//! - quoted values of JSON-like `{"key": "value"}` fragments
//!
//! Every candidate is trimmed and must pass
//! [`relevance::is_valid_text_candidate`].
//!
//! [`analyze_structure`] is the pre-pass for opaque containers: signature
//! sniffing, entropy estimate, then the decompression ladder.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::compression::{LadderHit, decompress_ladder};
use crate::relevance;

/// Minimum length of a run, in characters
pub const MIN_RUN_CHARS: usize = 4;

/// Plausible record lengths for length-prefixed extraction
pub const PREFIXED_LEN_RANGE: std::ops::RangeInclusive<usize> = 5..=500;

/// Prefix widths tried at each offset, Unity's native 4-byte length first
pub const PREFIX_WIDTHS: [usize; 3] = [4, 2, 8];

/// Entropy (bits per byte) above which content is flagged as likely encrypted
pub const ENCRYPTED_ENTROPY: f64 = 7.5;

/// Bytes sampled for the entropy estimate
const ENTROPY_SAMPLE: usize = 1 << 20;

static JSON_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*"[^"{}]+"\s*:\s*"[^{}]*\}"#).expect("valid regex"));

static JSON_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex"));

fn is_printable_ascii(b: u8) -> bool {
    (0x20..=0x7E).contains(&b) || b == b'\t'
}

fn is_run_byte(b: u8) -> bool {
    is_printable_ascii(b) || b >= 0x80
}

/// Decode a run as UTF-8, falling back to Latin-1
fn decode_run(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn has_control_chars(s: &str) -> bool {
    s.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

/// Mostly-ASCII check so runs of filler bytes like `0xFF` are dropped
fn mostly_ascii(s: &str) -> bool {
    let total = s.chars().count();
    s.chars().filter(char::is_ascii).count() * 2 >= total
}

/// Maximal runs of printable bytes
///
/// High bytes are allowed inside a run for accented text, but a run must
/// be at least half ASCII.
#[must_use]
pub fn extract_byte_runs(data: &[u8]) -> Vec<String> {
    data.split(|&b| !is_run_byte(b))
        .filter(|run| run.len() >= MIN_RUN_CHARS)
        .map(decode_run)
        .filter(|s| s.chars().count() >= MIN_RUN_CHARS && mostly_ascii(s))
        .collect()
}

/// Maximal runs of UTF-16LE encoded printable ASCII, at both byte parities
#[must_use]
pub fn extract_utf16_runs(data: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for parity in 0..2 {
        let mut run = String::new();
        let mut i = parity;
        while i + 1 < data.len() {
            if is_printable_ascii(data[i]) && data[i + 1] == 0 {
                run.push(data[i] as char);
            } else if !run.is_empty() {
                if run.len() >= MIN_RUN_CHARS {
                    out.push(std::mem::take(&mut run));
                }
                run.clear();
            }
            i += 2;
        }
        if run.len() >= MIN_RUN_CHARS {
            out.push(run);
        }
    }
    out
}

fn read_prefix(data: &[u8], offset: usize, width: usize) -> Option<usize> {
    let bytes = data.get(offset..offset + width)?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    usize::try_from(u64::from_le_bytes(buf)).ok()
}

fn decode_record(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        if !has_control_chars(s) {
            return Some(s.to_string());
        }
    }
    if bytes.len() % 2 == 0 {
        let units = bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]));
        let decoded: Result<String, _> = char::decode_utf16(units).collect();
        if let Ok(s) = decoded {
            if !has_control_chars(&s) {
                return Some(s);
            }
        }
    }
    None
}

/// Greedy scan for length-prefixed UTF-8 or UTF-16LE records
///
/// At each offset the next 4, 2 and 8 bytes are tried as a little-endian
/// length. A plausible length whose payload decodes cleanly is accepted
/// and the scan resumes after it; otherwise the scan advances one byte.
#[must_use]
pub fn extract_length_prefixed(data: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    'scan: while i < data.len() {
        for width in PREFIX_WIDTHS {
            let Some(len) = read_prefix(data, i, width) else {
                continue;
            };
            if !PREFIXED_LEN_RANGE.contains(&len) {
                continue;
            }
            let start = i + width;
            let Some(payload) = data.get(start..start + len) else {
                continue;
            };
            if let Some(text) = decode_record(payload) {
                out.push(text);
                i = start + len;
                continue 'scan;
            }
        }
        i += 1;
    }
    out
}

/// Quoted values of JSON-like key/value fragments
#[must_use]
pub fn extract_json_fragments(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data);
    JSON_FRAGMENT
        .find_iter(&text)
        .flat_map(|fragment| {
            JSON_VALUE
                .captures_iter(fragment.as_str())
                .filter_map(|c| c.get(1).map(|m| unescape_json(m.as_str())))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn unescape_json(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

/// Run every strategy and keep the valid, deduplicated candidates
#[must_use]
pub fn sweep(data: &[u8]) -> BTreeSet<String> {
    let candidates = extract_byte_runs(data)
        .into_iter()
        .chain(extract_utf16_runs(data))
        .chain(extract_length_prefixed(data))
        .chain(extract_json_fragments(data));

    let found: BTreeSet<String> = candidates
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().count() >= MIN_RUN_CHARS && relevance::is_valid_text_candidate(s))
        .collect();
    tracing::debug!("Sweep of {} bytes kept {} strings", data.len(), found.len());
    found
}

/// Shannon entropy of `data` in bits per byte (0.0 to 8.0)
#[must_use]
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let n = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Known leading magic of container or compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signature {
    UnityFs,
    UnityWeb,
    UnityRaw,
    UnityArchive,
    Gzip,
    Zlib,
    Lz4Frame,
    Zip,
    SevenZip,
}

impl Signature {
    const MAGICS: [(&'static [u8], Signature); 9] = [
        (b"UnityFS\0", Signature::UnityFs),
        (b"UnityWeb\0", Signature::UnityWeb),
        (b"UnityRaw\0", Signature::UnityRaw),
        (b"UnityArchive\0", Signature::UnityArchive),
        (&[0x1F, 0x8B], Signature::Gzip),
        (&[0x04, 0x22, 0x4D, 0x18], Signature::Lz4Frame),
        (b"PK\x03\x04", Signature::Zip),
        (b"7z\xBC\xAF\x27\x1C", Signature::SevenZip),
        (&[0x78, 0x9C], Signature::Zlib),
    ];

    /// Identify the leading magic of `data`
    #[must_use]
    pub fn detect(data: &[u8]) -> Option<Self> {
        if let Some(&(_, sig)) = Self::MAGICS.iter().find(|(magic, _)| data.starts_with(magic)) {
            return Some(sig);
        }
        match data {
            [0x78, 0x01 | 0xDA, ..] => Some(Signature::Zlib),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Signature::UnityFs => "UnityFS",
            Signature::UnityWeb => "UnityWeb",
            Signature::UnityRaw => "UnityRaw",
            Signature::UnityArchive => "UnityArchive",
            Signature::Gzip => "gzip",
            Signature::Zlib => "zlib",
            Signature::Lz4Frame => "lz4-frame",
            Signature::Zip => "zip",
            Signature::SevenZip => "7z",
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the structure-analysis pre-pass
#[derive(Debug, Clone)]
pub struct StructureAnalysis {
    pub size: usize,
    pub signature: Option<Signature>,
    /// Entropy of the leading sample, bits per byte
    pub entropy: f64,
    pub likely_encrypted: bool,
    /// First successful decompression ladder step
    pub decompressed: Option<LadderHit>,
}

/// Sniff signature and entropy, then run the decompression ladder
#[must_use]
pub fn analyze_structure(data: &[u8]) -> StructureAnalysis {
    let signature = Signature::detect(data);
    let entropy = shannon_entropy(&data[..data.len().min(ENTROPY_SAMPLE)]);
    let decompressed = match decompress_ladder(data) {
        Ok(hit) => Some(hit),
        Err(e) => {
            tracing::debug!("No decompression strategy applies: {e}");
            None
        }
    };
    let likely_encrypted = entropy > ENCRYPTED_ENTROPY && decompressed.is_none();
    tracing::debug!(
        "Structure: {} bytes, signature {}, entropy {entropy:.2}{}",
        data.len(),
        signature.map_or("none", Signature::as_str),
        if likely_encrypted { " (likely encrypted)" } else { "" }
    );
    StructureAnalysis {
        size: data.len(),
        signature,
        entropy,
        likely_encrypted,
        decompressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::lz4;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_byte_runs() {
        let mut data = vec![0, 1, 2];
        data.extend(b"Hello traveller");
        data.extend([0, 0xFF - 0x7F, 3]);
        data.extend("Café crème".as_bytes());
        data.push(0);
        data.extend(b"abc");
        let runs = extract_byte_runs(&data);
        assert!(runs.contains(&"Hello traveller".to_string()));
        assert!(runs.contains(&"Café crème".to_string()));
        assert!(!runs.iter().any(|r| r == "abc"));
        assert!(extract_byte_runs(&[0xFF; 40]).is_empty());
    }

    #[test]
    fn test_utf16_runs_odd_offset() {
        let mut data = vec![0xFF];
        data.extend(utf16("Open the door"));
        data.extend([0xFF, 0xFF]);
        let runs = extract_utf16_runs(&data);
        assert!(runs.contains(&"Open the door".to_string()));
    }

    #[test]
    fn test_length_prefixed_widths() {
        let mut data = vec![0xFF, 0xFE];
        data.extend(7u32.to_le_bytes());
        data.extend(b"Welcome");
        data.extend([0xFF; 3]);
        data.extend(6u16.to_le_bytes());
        data.extend(b"Goodby");
        data.extend([0xFF; 3]);
        let wide = utf16("Merci");
        data.extend((wide.len() as u64).to_le_bytes());
        data.extend(&wide);
        let found = extract_length_prefixed(&data);
        assert!(found.contains(&"Welcome".to_string()));
        assert!(found.contains(&"Goodby".to_string()));
        assert!(found.contains(&"Merci".to_string()));
    }

    #[test]
    fn test_length_prefixed_rejects_implausible() {
        let mut data = Vec::new();
        data.extend(3u32.to_le_bytes());
        data.extend(b"abc");
        data.extend(600u32.to_le_bytes());
        assert!(extract_length_prefixed(&data).iter().all(|s| s != "abc"));
    }

    #[test]
    fn test_json_fragments() {
        let data = br#"junk{"speaker": "Mara", "line": "Stay close to me"}junk"#;
        let values = extract_json_fragments(data);
        assert_eq!(values, vec!["Mara".to_string(), "Stay close to me".to_string()]);
    }

    #[test]
    fn test_sweep_filters_and_dedups() {
        let mut data = b"Find the lost key\0Find the lost key\0".to_vec();
        data.extend(b"\0deadbeefdeadbeef\0v1.2.3\0PLAYER_SPEED\0");
        data.extend(utf16("Find the lost key"));
        let found = sweep(&data);
        assert!(found.contains("Find the lost key"));
        assert!(!found.contains("deadbeefdeadbeef"));
        assert!(!found.contains("v1.2.3"));
        assert!(!found.contains("PLAYER_SPEED"));
        assert_eq!(found.iter().filter(|s| s.as_str() == "Find the lost key").count(), 1);
    }

    #[test]
    fn test_entropy() {
        assert!((shannon_entropy(&[7; 100]) - 0.0).abs() < f64::EPSILON);
        let all: Vec<u8> = (0..=255).collect();
        assert!((shannon_entropy(&all) - 8.0).abs() < 1e-9);
        assert!(shannon_entropy(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_analyze_structure() {
        let payload = b"Subtitle: the ship is sinking, everyone to the boats".repeat(4);
        let mut data = vec![0u8; 16];
        data.extend(lz4::compress_frame(&payload).unwrap());
        let analysis = analyze_structure(&data);
        assert_eq!(analysis.signature, None);
        assert!(!analysis.likely_encrypted);
        let hit = analysis.decompressed.unwrap();
        assert_eq!(hit.skip, 16);
        assert_eq!(hit.data, payload);

        assert_eq!(Signature::detect(b"UnityFS\0\0\0\0\x06"), Some(Signature::UnityFs));
        assert_eq!(Signature::detect(&[0x78, 0xDA, 1]), Some(Signature::Zlib));
    }
}
