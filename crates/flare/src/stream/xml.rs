//! Bidirectional XML issue stream.
//!
//! Wire format: one root `<issue>` element whose children are an ordered
//! sequence of alternating `<key>name</key>` / `<string>value</string>`
//! pairs, one pair per table entry. Reserved keys (`class`, `message`,
//! `severity`, `time`) come first, followed by the attribute map in
//! map-iteration order. Only the top-level issue is serialized; the cause
//! chain does not survive a round trip.
//!
//! quick-xml reports only hard errors, never recoverable parser warnings,
//! so there is no warning path to downgrade into warning-severity issues:
//! anything the parser rejects surfaces as a [`FlareError::ParseError`].

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::context::Context;
use crate::error::FlareError;
use crate::factory::IssueFactory;
use crate::issue::{Issue, IssueRecord};
use crate::severity::Severity;
use crate::stream::Stream;

const ISSUE_TAG: &str = "issue";
const KEY_TAG: &str = "key";
const VALUE_TAG: &str = "string";

const CLASS_KEY: &str = "class";
const MESSAGE_KEY: &str = "message";
const SEVERITY_KEY: &str = "severity";
const TIME_KEY: &str = "time";

pub struct XmlStream {
    path: PathBuf,
}

impl XmlStream {
    pub fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
        }
    }

    fn parse_error(&self, line: u64, element: impl Into<String>) -> FlareError {
        FlareError::ParseError {
            file: self.path.display().to_string(),
            line,
            element: element.into(),
        }
    }

    /// Serialize the issue's table into a pretty-printed document.
    fn document(issue: &dyn Issue) -> Result<Vec<u8>, FlareError> {
        let to_sink = |e| FlareError::sink("xml", io::Error::new(io::ErrorKind::Other, e));
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(to_sink)?;
        writer
            .write_event(Event::Start(BytesStart::new(ISSUE_TAG)))
            .map_err(to_sink)?;

        let mut write_pair = |key: &str, value: &str| -> Result<(), FlareError> {
            for (tag, text) in [(KEY_TAG, key), (VALUE_TAG, value)] {
                writer
                    .write_event(Event::Start(BytesStart::new(tag)))
                    .map_err(to_sink)?;
                writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(to_sink)?;
                writer
                    .write_event(Event::End(BytesEnd::new(tag)))
                    .map_err(to_sink)?;
            }
            Ok(())
        };

        write_pair(CLASS_KEY, issue.class_tag())?;
        write_pair(MESSAGE_KEY, issue.message())?;
        write_pair(SEVERITY_KEY, issue.severity().as_str())?;
        write_pair(TIME_KEY, &issue.time().to_rfc3339())?;
        for (key, value) in issue.attributes() {
            write_pair(key, value)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(ISSUE_TAG)))
            .map_err(to_sink)?;
        Ok(writer.into_inner())
    }

    /// Parse the document into its flat key/value table.
    fn parse_table(&self, content: &str) -> Result<Option<BTreeMap<String, String>>, FlareError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Field {
            Key,
            Value,
        }

        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut table = BTreeMap::new();
        let mut in_root = false;
        let mut current: Option<Field> = None;
        let mut key = String::new();

        loop {
            let event = reader.read_event();
            let line = line_of(content, reader.buffer_position() as usize);
            match event {
                Ok(Event::Start(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if !in_root {
                        if tag != ISSUE_TAG {
                            return Err(self.parse_error(
                                line,
                                format!("root element <{tag}> (expected <{ISSUE_TAG}>)"),
                            ));
                        }
                        in_root = true;
                    } else {
                        current = match tag.as_str() {
                            KEY_TAG => Some(Field::Key),
                            VALUE_TAG => Some(Field::Value),
                            _ => {
                                return Err(self.parse_error(line, format!("element <{tag}>")));
                            }
                        };
                    }
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| self.parse_error(line, e.to_string()))?
                        .into_owned();
                    match current {
                        Some(Field::Key) => key = text,
                        Some(Field::Value) => {
                            table.insert(key.clone(), text);
                        }
                        // Interstitial text between elements is ignored.
                        None => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    match tag.as_str() {
                        ISSUE_TAG if !in_root => in_root = true,
                        KEY_TAG if in_root => key = String::new(),
                        VALUE_TAG if in_root => {
                            table.insert(key.clone(), String::new());
                        }
                        _ => {
                            return Err(self.parse_error(line, format!("element <{tag}/>")));
                        }
                    }
                }
                Ok(Event::End(_)) => current = None,
                // Comments and document plumbing are skipped silently.
                Ok(Event::Comment(_)) | Ok(Event::Decl(_)) | Ok(Event::DocType(_)) => {}
                Ok(Event::CData(_)) => {
                    return Err(self.parse_error(line, "CDATA section"));
                }
                Ok(Event::PI(_)) => {
                    return Err(self.parse_error(line, "processing instruction"));
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(self.parse_error(line, e.to_string())),
            }
        }

        if !in_root {
            return Ok(None);
        }
        Ok(Some(table))
    }
}

fn line_of(content: &str, pos: usize) -> u64 {
    let upto = pos.min(content.len());
    content.as_bytes()[..upto].iter().filter(|b| **b == b'\n').count() as u64 + 1
}

impl Stream for XmlStream {
    /// Write the issue as a document, atomically: serialize to a buffer,
    /// write a `.tmp` sibling, rename over the target. A failed send never
    /// leaves a partially-written readable file.
    fn send(&mut self, issue: &dyn Issue) -> Result<(), FlareError> {
        let document = Self::document(issue)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &document).map_err(|e| FlareError::sink("xml", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| FlareError::sink("xml", e))
    }

    /// Read one issue back. Missing file or a document with no root issue
    /// element is `Ok(None)`; malformed content is a `ParseError` carrying
    /// the file, line, and offending element.
    fn receive(&mut self) -> Result<Option<Box<dyn Issue>>, FlareError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FlareError::sink("xml", e)),
        };
        let Some(mut table) = self.parse_table(&content)? else {
            return Ok(None);
        };

        let class_tag = table.remove(CLASS_KEY).unwrap_or_default();
        let message = table.remove(MESSAGE_KEY).unwrap_or_default();
        let severity = table
            .remove(SEVERITY_KEY)
            .and_then(|s| Severity::from_name(&s))
            .unwrap_or(Severity::Error);
        let time = table
            .remove(TIME_KEY)
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let context = Context::capture(
            env!("CARGO_PKG_NAME"),
            &self.path.display().to_string(),
            0,
            "XmlStream::receive",
        );
        let record = IssueRecord::new(context, severity, message)
            .with_time(time)
            .with_attributes(table);
        Ok(Some(IssueFactory::build(&class_tag, record)))
    }
}
