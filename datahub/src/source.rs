//! Reading and writing delimited sources.
//!
//! Bytes are decoded with a configured or auto-detected encoding, then split
//! into records with the `csv` crate (quote-aware). Field values are kept
//! verbatim; only quoting is removed.
//! No tabular semantics here: headers and orientation belong to
//! [`crate::tabular`].

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{SourceError, SourceResult};

/// Delimiters considered when sniffing, in tie-break order
pub const DELIMITER_CANDIDATES: [char; 4] = [';', ',', '\t', '|'];

/// A decoded text payload together with the encoding used
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub content: String,
    pub encoding: &'static Encoding,
}

impl DecodedText {
    /// Canonical name of the encoding (`UTF-8`, `windows-1252`, ...)
    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Delimiter sniffed from the header line, if any candidate occurs
    pub fn sniff_delimiter(&self) -> Option<char> {
        detect_delimiter(&self.content)
    }
}

/// One logical record of a delimited source
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based source line the record starts on
    pub line: u64,
    pub fields: Vec<String>,
}

/// Resolve an encoding label such as `utf-8`, `latin1` or `cp1252`
pub fn encoding_for_label(label: &str) -> SourceResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| SourceError::Encoding(format!("unsupported encoding '{}'", label)))
}

/// Guess the encoding of raw bytes.
///
/// Valid UTF-8 wins outright; otherwise chardet's guess is mapped onto an
/// `encoding_rs` encoding, with windows-1252 as the single-byte fallback.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    let (charset, _confidence, _language) = chardet::detect(bytes);
    Encoding::for_label(chardet::charset2encoding(&charset).as_bytes()).unwrap_or(WINDOWS_1252)
}

/// Decode bytes, dropping a byte order mark if present
pub fn decode_content(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _actual, _had_errors) = encoding.decode(bytes);
    text.into_owned()
}

/// Decode bytes with the given encoding label, or a detected one if `None`
pub fn decode_bytes(bytes: &[u8], encoding: Option<&str>) -> SourceResult<DecodedText> {
    let encoding = match encoding {
        Some(label) => encoding_for_label(label)?,
        None => detect_encoding(bytes),
    };
    let content = decode_content(bytes, encoding);
    Ok(DecodedText { content, encoding })
}

/// Read and decode a whole file
pub fn read_file(path: impl AsRef<Path>, encoding: Option<&str>) -> SourceResult<DecodedText> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_bytes(&bytes, encoding)
}

/// Read and decode a whole stream
pub fn read_stream<R: Read>(mut reader: R, encoding: Option<&str>) -> SourceResult<DecodedText> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_bytes(&bytes, encoding)
}

/// Most frequent candidate delimiter on the first non-blank line.
///
/// Delimiters inside double quotes are not counted. Ties go to the earlier
/// entry of [`DELIMITER_CANDIDATES`].
pub fn detect_delimiter(content: &str) -> Option<char> {
    let line = content.lines().find(|l| !l.trim().is_empty())?;

    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut quoted = false;
    for c in line.chars() {
        if c == '"' {
            quoted = !quoted;
        } else if !quoted {
            if let Some(i) = DELIMITER_CANDIDATES.iter().position(|&d| d == c) {
                counts[i] += 1;
            }
        }
    }

    let (best, count) = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &n)| if n > best.1 { (i, n) } else { best });
    (count > 0).then(|| DELIMITER_CANDIDATES[best])
}

fn delimiter_byte(delimiter: char) -> SourceResult<u8> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(SourceError::InvalidDelimiter(delimiter))
    }
}

/// Split decoded content into records.
///
/// Fields are unquoted but not trimmed; records may have differing lengths.
/// Blank lines are skipped, while a line of bare delimiters (or `""`) is a
/// record of empty fields.
pub fn split_records(content: &str, delimiter: char) -> SourceResult<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter_byte(delimiter)?)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let fields: Vec<String> = record.iter().map(String::from).collect();
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        records.push(RawRecord { line, fields });
    }

    Ok(records)
}

/// Serialize records with the given delimiter.
///
/// Fields containing the delimiter, quotes or line breaks are quoted. A record
/// made of one empty field is written as `""` so it does not read back as a
/// blank line.
pub fn write_records<W, I, R>(writer: W, records: I, delimiter: char) -> SourceResult<()>
where
    W: Write,
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .flexible(true)
        .delimiter(delimiter_byte(delimiter)?)
        .from_writer(writer);

    for record in records {
        let fields: Vec<R::Item> = record.into_iter().collect();
        if let [only] = fields.as_slice() {
            if only.as_ref().is_empty() {
                csv_writer.flush()?;
                csv_writer.write_record(&fields)?; // csv writes a lone empty field as `""\n`
                continue;
            }
        }
        csv_writer.write_record(&fields)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Serialize records into a string
pub fn records_to_string<I, R>(records: I, delimiter: char) -> SourceResult<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut buffer = Vec::new();
    write_records(&mut buffer, records, delimiter)?;
    String::from_utf8(buffer).map_err(|e| SourceError::Encoding(e.to_string()))
}

/// Write records to a file, replacing its content
pub fn write_file<I, R>(path: impl AsRef<Path>, records: I, delimiter: char) -> SourceResult<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let file = std::fs::File::create(path.as_ref())?;
    write_records(std::io::BufWriter::new(file), records, delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        let records = split_records("Name;City\nAnn;Linz", ';').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields, vec!["Name", "City"]);
        assert_eq!(records[1].fields, vec!["Ann", "Linz"]);
        assert_eq!(records[1].line, 2);
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Alice\";\"Hello; World\"";
        let records = split_records(csv, ';').unwrap();

        assert_eq!(records[1].fields, vec!["Alice", "Hello; World"]);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let records = split_records("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_ragged_records_allowed() {
        let records = split_records("Name;Ann;Bo\nCity;Linz", ';').unwrap();
        assert_eq!(records[0].fields.len(), 3);
        assert_eq!(records[1].fields.len(), 2);
    }

    #[test]
    fn test_write_quotes_delimiter() {
        let out = records_to_string(vec![vec!["a", "b;c"]], ';').unwrap();
        assert_eq!(out, "a;\"b;c\"\n");
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let result = split_records("a§b", '§');
        assert!(matches!(result, Err(SourceError::InvalidDelimiter('§'))));
    }

    #[test]
    fn test_empty_fields_kept_verbatim() {
        let records = split_records("a;b\n;\n\"\"\n  x ;y\n", ';').unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].fields, vec!["", ""]);
        assert_eq!(records[2].fields, vec![""]);
        assert_eq!(records[3].fields, vec!["  x ", "y"]);
    }

    #[test]
    fn test_write_single_empty_field() {
        let out = records_to_string(vec![vec!["Note"], vec![""], vec!["x"]], ';').unwrap();
        assert_eq!(out, "Note\n\"\"\nx\n");

        let records = split_records(&out, ';').unwrap();
        assert_eq!(records[1].fields, vec![""]);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), Some(';'));
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), Some(','));
        assert_eq!(detect_delimiter("\n\na\tb\tc"), Some('\t'));
        assert_eq!(detect_delimiter("a|b|c"), Some('|'));
        assert_eq!(detect_delimiter("single"), None);
    }

    #[test]
    fn test_detect_delimiter_ignores_quoted() {
        assert_eq!(detect_delimiter("\"a,b,c\";d;e"), Some(';'));
        let decoded = decode_bytes(b"x,y", None).unwrap();
        assert_eq!(decoded.sniff_delimiter(), Some(','));
    }

    #[test]
    fn test_encoding_labels() {
        assert_eq!(decode_bytes(b"Name", None).unwrap().encoding_name(), "UTF-8");
        assert!(matches!(encoding_for_label("klingon"), Err(SourceError::Encoding(_))));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, encoding_for_label("iso-8859-1").unwrap());
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_bom_stripped() {
        let decoded = decode_content(b"\xEF\xBB\xBFName", UTF_8);
        assert_eq!(decoded, "Name");
    }
}
