//! Reading the xunit reports written by the runner.
//!
//! The reporter writes one `<testsuite>` (sometimes wrapped in
//! `<testsuites>`) holding `<testcase>` elements:
//!
//! ```xml
//! <testsuite name="Mocha Tests" tests="2" failures="1">
//!   <testcase classname="Math" name="adds" time="0.01"/>
//!   <testcase classname="Math" name="divides" time="0.002">
//!     <failure>expected 1 to equal 2</failure>
//!   </testcase>
//! </testsuite>
//! ```

mod correlator;

pub use correlator::{apply_report, discard_report, track, track_until, FileWatcher, PollingWatcher};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const TESTSUITE_TAG: &[u8] = b"testsuite";
const TESTCASE_TAG: &[u8] = b"testcase";
const FAILURE_TAG: &[u8] = b"failure";
const ERROR_TAG: &[u8] = b"error";
const SKIPPED_TAG: &[u8] = b"skipped";

/// Errors raised while reading a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed report at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Invalid report: {0}")]
    Invalid(String),
}

/// How a single case ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    Failed { message: String },
    Skipped,
}

/// One `<testcase>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCase {
    pub name: String,
    pub classname: String,
    pub time: Duration,
    pub outcome: CaseOutcome,
}

impl ReportCase {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Failed { .. })
    }
}

/// A parsed report: every case across its suites, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub cases: Vec<ReportCase>,
}

impl Report {
    /// Read and parse a report file.
    pub async fn read(path: &Path) -> Result<Self, ReportError> {
        let xml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ReportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&xml)
    }

    pub fn parse(xml: &str) -> Result<Self, ReportError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut saw_suite = false;
        let mut cases = Vec::new();
        let mut current: Option<ReportCase> = None;
        // Text of an open <failure>/<error> with no message attribute
        let mut capture: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    TESTSUITE_TAG => saw_suite = true,
                    TESTCASE_TAG => current = Some(read_case(&e).map_err(|s| xml_error(&reader, s))??),
                    FAILURE_TAG | ERROR_TAG => {
                        if let Some(case) = current.as_mut() {
                            let message = attribute(&e, b"message").map_err(|s| xml_error(&reader, s))?;
                            if message.is_none() {
                                capture = Some(String::new());
                            }
                            case.outcome = CaseOutcome::Failed {
                                message: message.unwrap_or_default(),
                            };
                        }
                    }
                    SKIPPED_TAG => {
                        if let Some(case) = current.as_mut() {
                            case.outcome = CaseOutcome::Skipped;
                        }
                    }
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    TESTSUITE_TAG => saw_suite = true,
                    TESTCASE_TAG => cases.push(read_case(&e).map_err(|s| xml_error(&reader, s))??),
                    FAILURE_TAG | ERROR_TAG => {
                        if let Some(case) = current.as_mut() {
                            let message = attribute(&e, b"message").map_err(|s| xml_error(&reader, s))?;
                            case.outcome = CaseOutcome::Failed {
                                message: message.unwrap_or_default(),
                            };
                        }
                    }
                    SKIPPED_TAG => {
                        if let Some(case) = current.as_mut() {
                            case.outcome = CaseOutcome::Skipped;
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(t)) => {
                    if let Some(buf) = capture.as_mut() {
                        let text = t.unescape().map_err(|s| xml_error(&reader, s))?;
                        buf.push_str(&text);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(buf) = capture.as_mut() {
                        buf.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    FAILURE_TAG | ERROR_TAG => {
                        if let (Some(text), Some(case)) = (capture.take(), current.as_mut()) {
                            case.outcome = CaseOutcome::Failed {
                                message: text.trim().to_string(),
                            };
                        }
                    }
                    TESTCASE_TAG => cases.extend(current.take()),
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(source) => return Err(xml_error(&reader, source)),
            }
        }

        if !saw_suite {
            return Err(ReportError::Invalid("no testsuite element".to_string()));
        }
        Ok(Self { cases })
    }

    /// Sum of every case's time.
    pub fn total_time(&self) -> Duration {
        self.cases.iter().map(|c| c.time).sum()
    }

    pub fn failures(&self) -> usize {
        self.cases.iter().filter(|c| c.is_failed()).count()
    }
}

fn xml_error(reader: &Reader<&[u8]>, source: quick_xml::Error) -> ReportError {
    ReportError::Xml {
        position: reader.buffer_position(),
        source,
    }
}

/// Decoded value of attribute `key`.
fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// A passing case from a `<testcase>` element's attributes.
///
/// The outer error is malformed XML, the inner one bad attribute values.
fn read_case(element: &BytesStart<'_>) -> Result<Result<ReportCase, ReportError>, quick_xml::Error> {
    let name = attribute(element, b"name")?.unwrap_or_default();
    let classname = attribute(element, b"classname")?.unwrap_or_default();
    let time = match attribute(element, b"time")? {
        None => Ok(Duration::ZERO),
        Some(raw) => parse_seconds(&raw),
    };
    Ok(time.map(|time| ReportCase {
        name,
        classname,
        time,
        outcome: CaseOutcome::Passed,
    }))
}

fn parse_seconds(raw: &str) -> Result<Duration, ReportError> {
    let invalid = || ReportError::Invalid(format!("bad time attribute: {}", raw));
    let seconds: f64 = raw.trim().parse().map_err(|_| invalid())?;
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}
