//! CSV source with encoding and delimiter auto-detection.
//!
//! Converts CSV rows into JSON objects keyed by header. Every value is a
//! trimmed string; typing is left to the mapping.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{SourceError, SourceResult};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    /// Parsed records as JSON objects
    pub records: Vec<Value>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    [',', ';', '\t', '|']
        .iter()
        .copied()
        .max_by_key(|sep| (first_line.matches(*sep).count(), sep_priority(*sep)))
        .filter(|sep| first_line.contains(*sep))
        .unwrap_or(',')
}

/// Tie-break order when counts are equal
fn sep_priority(sep: char) -> u8 {
    match sep {
        ',' => 3,
        ';' => 2,
        '\t' => 1,
        _ => 0,
    }
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// let parsed = parse_str("name;age\nAlice;30", ';')?;
/// assert_eq!(parsed.records[0]["name"], "Alice");
/// ```
pub fn parse_str(content: &str, delimiter: char) -> SourceResult<ParsedCsv> {
    if content.trim().is_empty() {
        return Err(SourceError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(1, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(SourceError::Csv { line: 1, message: "No headers found".into() });
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| csv_error(idx + 2, e))?;
        if row.iter().all(|v| v.is_empty()) {
            continue;
        }

        let obj: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), Value::String(row.get(i).unwrap_or("").to_string())))
            .collect();
        records.push(Value::Object(obj));
    }

    Ok(ParsedCsv {
        records,
        encoding: "utf-8".to_string(),
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> SourceResult<ParsedCsv> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut parsed = parse_str(&content, delimiter)?;
    parsed.encoding = encoding;
    Ok(parsed)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto(path: impl AsRef<Path>) -> SourceResult<ParsedCsv> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

fn csv_error(line: usize, err: csv::Error) -> SourceError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(line);
    SourceError::Csv { line, message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let parsed = parse_str("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0]["name"], "Alice");
        assert_eq!(parsed.records[1]["age"], "25");
        assert_eq!(parsed.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_quoted_delimiters_kept() {
        let parsed = parse_str("title,keywords\n\"A, B\",\"x,y,z\"", ',').unwrap();
        assert_eq!(parsed.records[0]["title"], "A, B");
        assert_eq!(parsed.records[0]["keywords"], "x,y,z");
    }

    #[test]
    fn test_empty_lines_skipped_and_missing_values() {
        let parsed = parse_str("a;b;c\n1;;3\n\n4\n", ';').unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0]["b"], "");
        assert_eq!(parsed.records[1]["c"], "");
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_str("  ", ','), Err(SourceError::Empty)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let parsed = parse_bytes_auto("name;age\nAlice;30".as_bytes()).unwrap();
        assert_eq!(parsed.delimiter, ';');
        assert_eq!(parsed.encoding, "utf-8");
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "id,name\n1,Jo\n").unwrap();
        assert_eq!(parse_file_auto(&path).unwrap().records[0]["name"], "Jo");
    }
}
