//! # LDIF — the textual dump codec
//!
//! Reads and writes the directory-exchange format used as the backing dump
//! file: records separated by blank lines, one attribute value per logical
//! line, `type: value` for safe values and `type:: <base64>` for anything
//! that could be mangled by a text pipeline.
//!
//! ## Record shape
//!
//! ```text
//! dn: ou=People,dc=example,dc=com
//! objectClass: top
//! objectClass: organizationalUnit
//! ou: People
//! description:: VGhpcyB2YWx1ZSBpcyBiYXNlNjQ=
//!
//! dn: cn=next entry...
//! ```
//!
//! Logical lines longer than the writer's wrap column are folded;
//! continuation lines begin with exactly one space. The reader accepts any
//! wrap column (including none) and unfolds before parsing. `#` comment
//! lines and an optional leading `version: 1` line are skipped.
//!
//! ## Error discipline
//!
//! A malformed record yields [`LdifError::Record`], which is recoverable
//! ([`LdifError::can_continue`]): the reader has already consumed the whole
//! record, so the caller may log the problem and move on to the next one.
//! I/O errors are not recoverable and abort the stream.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dn::Dn;
use entry::Entry;
use thiserror::Error;

/// Errors that can occur while reading or writing LDIF.
#[derive(Debug, Error)]
pub enum LdifError {
    /// An underlying I/O error. Not recoverable.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A single record could not be decoded. Recoverable: the stream is
    /// positioned at the next record boundary.
    #[error("malformed record at line {line}: {message}")]
    Record { line: usize, message: String },
}

impl LdifError {
    /// True when the reader can keep going after this error.
    pub fn can_continue(&self) -> bool {
        matches!(self, LdifError::Record { .. })
    }
}

/// Streaming LDIF writer with optional line wrapping.
pub struct LdifWriter<W: Write> {
    out: W,
    wrap_column: usize,
    entries_written: u64,
}

impl<W: Write> LdifWriter<W> {
    /// Creates a writer with wrapping disabled.
    pub fn new(out: W) -> LdifWriter<W> {
        LdifWriter {
            out,
            wrap_column: 0,
            entries_written: 0,
        }
    }

    /// Sets the wrap column. `0` disables wrapping; columns below 2 cannot
    /// hold a continuation marker plus content and are treated as disabled.
    pub fn with_wrap_column(mut self, wrap_column: usize) -> LdifWriter<W> {
        self.wrap_column = wrap_column;
        self
    }

    /// Number of entries written so far.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Writes one record followed by a blank separator line.
    pub fn write_entry(&mut self, entry: &Entry) -> Result<(), LdifError> {
        let dn = entry.dn().to_string();
        self.write_value_line("dn", dn.as_bytes())?;

        for attr in entry.attributes() {
            for value in attr.values() {
                self.write_value_line(attr.name(), value)?;
            }
        }

        self.out.write_all(b"\n")?;
        self.entries_written += 1;
        Ok(())
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<(), LdifError> {
        self.out.flush()?;
        Ok(())
    }

    /// Consumes the writer, returning the sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_value_line(&mut self, name: &str, value: &[u8]) -> Result<(), LdifError> {
        let line = if needs_base64(value) {
            format!("{}:: {}", name, BASE64.encode(value))
        } else {
            format!("{}: {}", name, String::from_utf8_lossy(value))
        };
        self.write_folded(&line)
    }

    fn write_folded(&mut self, line: &str) -> Result<(), LdifError> {
        let wrap = self.wrap_column;
        if wrap < 2 || line.len() <= wrap {
            self.out.write_all(line.as_bytes())?;
            self.out.write_all(b"\n")?;
            return Ok(());
        }

        let bytes = line.as_bytes();
        self.out.write_all(&bytes[..wrap])?;
        self.out.write_all(b"\n")?;
        // continuation lines: one space marker plus wrap-1 content bytes
        for chunk in bytes[wrap..].chunks(wrap - 1) {
            self.out.write_all(b" ")?;
            self.out.write_all(chunk)?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// True when a value cannot be emitted verbatim on a `type: value` line.
fn needs_base64(value: &[u8]) -> bool {
    if value.is_empty() {
        return false;
    }
    if matches!(value[0], b' ' | b':' | b'<') || *value.last().unwrap() == b' ' {
        return true;
    }
    value.iter().any(|&b| !(0x20..=0x7e).contains(&b))
}

/// Streaming LDIF reader with per-record error recovery.
///
/// The reader keeps the three counters surfaced by an import:
/// records decoded (`entries_read`), records rejected either by a decode
/// failure or by the caller via [`reject_last_entry`](Self::reject_last_entry)
/// (`entries_rejected`), and records skipped without processing
/// (`entries_ignored`).
pub struct LdifReader<R: BufRead> {
    input: R,
    line_no: usize,
    at_start: bool,
    entries_read: u64,
    entries_rejected: u64,
    entries_ignored: u64,
}

impl LdifReader<BufReader<File>> {
    /// Opens a file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LdifReader<BufReader<File>>, LdifError> {
        Ok(LdifReader::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> LdifReader<R> {
    /// Wraps any buffered reader.
    pub fn new(input: R) -> LdifReader<R> {
        LdifReader {
            input,
            line_no: 0,
            at_start: true,
            entries_read: 0,
            entries_rejected: 0,
            entries_ignored: 0,
        }
    }

    /// Records decoded successfully so far.
    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Records rejected, by decode failure or by the caller.
    pub fn entries_rejected(&self) -> u64 {
        self.entries_rejected
    }

    /// Records skipped without being processed.
    pub fn entries_ignored(&self) -> u64 {
        self.entries_ignored
    }

    /// Marks the most recently returned entry as rejected. The caller is
    /// expected to log the reason.
    pub fn reject_last_entry(&mut self) {
        self.entries_rejected += 1;
    }

    /// Reads the next record, or `None` at end of input.
    ///
    /// On a recoverable [`LdifError::Record`] the whole offending record has
    /// been consumed and counted, so calling again yields the next one.
    pub fn read_entry(&mut self) -> Result<Option<Entry>, LdifError> {
        loop {
            let lines = match self.next_paragraph()? {
                Some(lines) => lines,
                None => return Ok(None),
            };

            let mut logical = match self.unfold(lines) {
                Ok(logical) => logical,
                Err(e) => {
                    self.entries_rejected += 1;
                    return Err(e);
                }
            };

            // an optional version marker may lead the first record
            if self.at_start {
                self.at_start = false;
                if logical
                    .first()
                    .map(|(_, l)| l.starts_with("version:"))
                    .unwrap_or(false)
                {
                    logical.remove(0);
                    if logical.is_empty() {
                        continue;
                    }
                }
            }

            match self.parse_record(logical) {
                Ok(entry) => {
                    self.entries_read += 1;
                    return Ok(Some(entry));
                }
                Err(e) => {
                    self.entries_rejected += 1;
                    return Err(e);
                }
            }
        }
    }

    /// Collects the physical lines of the next record, skipping blank
    /// separators and comment lines. `None` at end of input.
    fn next_paragraph(&mut self) -> Result<Option<Vec<(usize, String)>>, LdifError> {
        let mut lines: Vec<(usize, String)> = Vec::new();
        let mut in_comment = false;

        loop {
            let mut raw = String::new();
            let n = self.input.read_line(&mut raw)?;
            if n == 0 {
                return Ok(if lines.is_empty() { None } else { Some(lines) });
            }
            self.line_no += 1;

            let line = raw.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                if lines.is_empty() {
                    in_comment = false;
                    continue; // leading blank lines between records
                }
                return Ok(Some(lines));
            }

            if line.starts_with('#') {
                in_comment = true;
                continue;
            }
            if in_comment && line.starts_with(' ') {
                continue; // folded continuation of a comment
            }
            in_comment = false;

            lines.push((self.line_no, line.to_string()));
        }
    }

    /// Joins continuation lines onto their logical line.
    fn unfold(&self, lines: Vec<(usize, String)>) -> Result<Vec<(usize, String)>, LdifError> {
        let mut logical: Vec<(usize, String)> = Vec::new();
        for (no, line) in lines {
            if let Some(rest) = line.strip_prefix(' ') {
                match logical.last_mut() {
                    Some((_, prev)) => prev.push_str(rest),
                    None => {
                        return Err(LdifError::Record {
                            line: no,
                            message: "continuation line with nothing to continue".to_string(),
                        })
                    }
                }
            } else {
                logical.push((no, line));
            }
        }
        Ok(logical)
    }

    fn parse_record(&self, logical: Vec<(usize, String)>) -> Result<Entry, LdifError> {
        let mut iter = logical.into_iter();
        let (dn_line_no, dn_line) = iter.next().expect("paragraph is never empty");

        let (name, value) = split_attr_line(&dn_line).ok_or(LdifError::Record {
            line: dn_line_no,
            message: "line has no attribute separator".to_string(),
        })?;
        if !name.eq_ignore_ascii_case("dn") {
            return Err(LdifError::Record {
                line: dn_line_no,
                message: format!("record starts with '{}' instead of 'dn'", name),
            });
        }
        let dn_bytes = decode_value(value, dn_line_no)?;
        let dn_str = String::from_utf8(dn_bytes).map_err(|_| LdifError::Record {
            line: dn_line_no,
            message: "entry DN is not valid UTF-8".to_string(),
        })?;
        let dn = Dn::parse(&dn_str).map_err(|e| LdifError::Record {
            line: dn_line_no,
            message: format!("invalid entry DN '{}': {}", dn_str, e),
        })?;

        let mut entry = Entry::new(dn);
        for (no, line) in iter {
            let (name, value) = split_attr_line(&line).ok_or(LdifError::Record {
                line: no,
                message: "line has no attribute separator".to_string(),
            })?;
            if name.eq_ignore_ascii_case("dn") {
                return Err(LdifError::Record {
                    line: no,
                    message: "record contains a second dn line".to_string(),
                });
            }
            entry.put(name, decode_value(value, no)?);
        }
        Ok(entry)
    }
}

/// Splits `name: value` (or `name:: value`), keeping the `:` option marker
/// at the front of the value part. `None` when there is no colon or the
/// attribute name is empty.
fn split_attr_line(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let name = line[..colon].trim();
    if name.is_empty() {
        return None;
    }
    Some((name, &line[colon + 1..]))
}

/// Decodes the value part of a logical line, handling the `::` base64 form.
fn decode_value(value: &str, line: usize) -> Result<Vec<u8>, LdifError> {
    if let Some(b64) = value.strip_prefix(':') {
        BASE64
            .decode(b64.trim())
            .map_err(|e| LdifError::Record {
                line,
                message: format!("invalid base64 value: {}", e),
            })
    } else if let Some(url) = value.strip_prefix('<') {
        Err(LdifError::Record {
            line,
            message: format!("URL-valued attributes are not supported: {}", url.trim()),
        })
    } else {
        Ok(value.strip_prefix(' ').unwrap_or(value).as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests;
