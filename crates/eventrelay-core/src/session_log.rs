//! Session log: a flat, append-only, human-readable record of every
//! decoded record's values.
//!
//! One line per record: `[1, 2, 'blink']`. This is debug output, not a
//! replay format.

use crate::record::Record;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Line-oriented writer for decoded records.
#[derive(Debug)]
pub struct SessionLog<W: Write> {
    out: W,
    lines: u64,
}

impl SessionLog<BufWriter<File>> {
    /// Open (or create) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> SessionLog<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Append one line for `record` and flush it.
    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        let mut line = render_values(record.raw_values());
        line.push('\n');
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        self.lines += 1;
        Ok(())
    }

    /// Lines written by this handle.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Render values as a bracketed list: `[1, 'a', [2]]`.
pub fn render_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> String {
    let mut out = String::from("[");
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render_value(&mut out, value);
    }
    out.push(']');
    out
}

/// Render one value the way it appears inside a log line: `True`, `None`,
/// `'a'`, `{'k': 1}`.
pub fn render_scalar(value: &Value) -> String {
    let mut out = String::new();
    render_value(&mut out, value);
    out
}

fn render_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => render_str(out, s),
        Value::Array(items) => out.push_str(&render_values(items)),
        Value::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_str(out, k);
                out.push_str(": ");
                render_value(out, v);
            }
            out.push('}');
        }
    }
}

fn render_str(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::decode_record;

    #[test]
    fn renders_numbers_in_field_order() {
        let rec = decode_record(r#"{"data":{"x":1,"y":2,"time":3}}"#).unwrap();
        assert_eq!(render_values(rec.raw_values()), "[1, 2, 3]");
    }

    #[test]
    fn renders_mixed_values() {
        let rec = decode_record(
            r#"{"data":{"x":1.5,"label":"it's","seq":[4],"ok":true,"n":null,"o":{"k":"v"}}}"#,
        )
        .unwrap();
        assert_eq!(
            render_values(rec.raw_values()),
            r#"[1.5, 'it\'s', [4], True, None, {'k': 'v'}]"#
        );
    }

    #[test]
    fn one_line_per_record() {
        let mut log = SessionLog::new(Vec::new());
        log.append(&decode_record(r#"{"data":{"x":1}}"#).unwrap()).unwrap();
        log.append(&decode_record(r#"{"data":{"label":"blink"}}"#).unwrap()).unwrap();
        assert_eq!(log.lines_written(), 2);
        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(text, "[1]\n['blink']\n");
    }

    #[test]
    fn open_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "[0]\n").unwrap();

        let mut log = SessionLog::open(&path).unwrap();
        log.append(&decode_record(r#"{"data":{"x":7}}"#).unwrap()).unwrap();
        drop(log);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[0]\n[7]\n");
    }
}
