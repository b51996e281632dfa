//! Failure extraction from a JUnit XML result file.
use super::{FailureKind, FailureRecord};
use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

const UNKNOWN: &str = "Unknown";

/// Parse `path` if it exists. Unreadable or malformed XML is logged and
/// whatever was parsed before the problem is returned.
pub fn parse_junit_file(path: &Path) -> Vec<FailureRecord> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no junit file");
        return Vec::new();
    }
    let xml = match fs::read_to_string(path) {
        Ok(xml) => xml,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "could not read JUnit XML");
            return Vec::new();
        }
    };
    let mut failures = Vec::new();
    if let Err(err) = parse_junit_xml(&xml, &mut failures) {
        let error = format!("{err:#}");
        tracing::warn!(path = %path.display(), %error, "could not parse JUnit XML");
    }
    failures
}

struct TestCase {
    name: String,
    file: String,
    line: Option<u32>,
    depth: usize,
}

struct Defect {
    kind: FailureKind,
    message_attr: String,
    subtype: String,
    text: String,
}

impl Defect {
    fn into_record(self, case: &TestCase) -> FailureRecord {
        let message = if self.text.is_empty() {
            self.message_attr
        } else {
            self.text
        };
        FailureRecord {
            test_name: case.name.clone(),
            message,
            file: case.file.clone(),
            line: case.line,
            kind: self.kind,
            subtype: Some(self.subtype),
        }
    }
}

/// Stream `xml`, pushing one record per `failure`/`error` child of every
/// `testcase`, wherever the testcase is nested.
pub(super) fn parse_junit_xml(xml: &str, out: &mut Vec<FailureRecord>) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut case: Option<TestCase> = None;
    let mut defect: Option<Defect> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("read XML at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => {
                depth += 1;
                open_element(&start, depth, &mut case, &mut defect, out)?;
            }
            Event::Empty(start) => {
                // A self-closing element opens and closes at depth + 1.
                let opened = open_element(&start, depth + 1, &mut case, &mut defect, out)?;
                if opened {
                    if let (Some(open), Some(current)) = (defect.take(), case.as_ref()) {
                        out.push(open.into_record(current));
                    }
                }
                if case.as_ref().is_some_and(|current| current.depth == depth + 1) {
                    case = None;
                }
            }
            Event::Text(text) => {
                if let Some(open) = defect.as_mut() {
                    open.text.push_str(&text.unescape().context("unescape failure text")?);
                }
            }
            Event::CData(data) => {
                if let Some(open) = defect.as_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(current) = case.as_ref() {
                    if current.depth + 1 == depth {
                        if let Some(open) = defect.take() {
                            out.push(open.into_record(current));
                        }
                    } else if current.depth == depth {
                        case = None;
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// Track a newly opened element. Returns true when it starts a defect.
fn open_element(
    start: &BytesStart<'_>,
    depth: usize,
    case: &mut Option<TestCase>,
    defect: &mut Option<Defect>,
    out: &mut Vec<FailureRecord>,
) -> Result<bool> {
    let tag = start.local_name();
    match case.as_ref() {
        None if tag.as_ref() == b"testcase" => {
            *case = Some(read_test_case(start, depth)?);
        }
        Some(current) if depth == current.depth + 1 => {
            let kind = match tag.as_ref() {
                b"failure" => FailureKind::Failure,
                b"error" => FailureKind::Error,
                _ => return Ok(false),
            };
            if let Some(open) = defect.take() {
                out.push(open.into_record(current));
            }
            *defect = Some(Defect {
                kind,
                message_attr: attr(start, b"message")?.unwrap_or_default(),
                subtype: attr(start, b"type")?.unwrap_or_else(|| UNKNOWN.to_string()),
                text: String::new(),
            });
            return Ok(true);
        }
        _ => {}
    }
    Ok(false)
}

fn read_test_case(start: &BytesStart<'_>, depth: usize) -> Result<TestCase> {
    let name = attr(start, b"name")?.unwrap_or_else(|| UNKNOWN.to_string());
    let class = match attr(start, b"class")? {
        Some(class) => class,
        None => attr(start, b"classname")?.unwrap_or_else(|| UNKNOWN.to_string()),
    };
    let file = attr(start, b"file")?.unwrap_or_else(|| UNKNOWN.to_string());
    let line = attr(start, b"line")?
        .filter(|raw| !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|raw| raw.parse().ok());
    Ok(TestCase {
        name: format!("{class}::{name}"),
        file,
        line,
        depth,
    })
}

fn attr(start: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attribute in start.attributes() {
        let attribute = attribute.context("read XML attribute")?;
        if attribute.key.as_ref() == key {
            let value = attribute
                .unescape_value()
                .context("unescape XML attribute")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
