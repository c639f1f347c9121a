//! Log sinks: where request entries go.
//!
//! The logger middleware only decides *what* to log. A [`LogSink`] decides how
//! the entry is formatted and where it is written. Three sinks ship with the
//! crate:
//!
//! | Sink | Output |
//! |---|---|
//! | [`TracingSink`] | a `tracing` event, rendered by whatever subscriber is installed |
//! | [`TextSink`] | one logfmt line per entry: `time=… level=info bytes_in=0 …` |
//! | [`JsonSink`] | one JSON object per line |
//!
//! [`WithFields`] wraps any sink with fields attached to every entry.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::fields::{Fields, rfc3339, write_logfmt_value};

/// `tracing` target of events emitted by [`TracingSink`].
pub const REQUEST_TARGET: &str = "tsu::request";

/// Entry severity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Info,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// One log entry, borrowed for the duration of [`LogSink::emit`].
#[derive(Debug)]
pub struct Record<'a> {
    pub severity: Severity,
    pub message: Option<&'a str>,
    pub fields: &'a Fields,
    pub time: DateTime<Utc>,
}

/// Destination for structured log entries.
///
/// Shared by every in-flight request, so implementations synchronise their
/// own output. `emit` cannot fail: a sink that cannot write drops the entry.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, record: &Record<'_>);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn emit(&self, record: &Record<'_>) {
        (**self).emit(record);
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn emit(&self, record: &Record<'_>) {
        (**self).emit(record);
    }
}

// ── TracingSink ───────────────────────────────────────────────────────────────

/// Emits entries as `tracing` events under [`REQUEST_TARGET`].
///
/// The fields are recorded as a single logfmt-rendered `request` value; the
/// error message, when there is one, becomes the event message.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self { Self }
}

impl LogSink for TracingSink {
    fn emit(&self, record: &Record<'_>) {
        let fields = record.fields;
        match (record.severity, record.message) {
            (Severity::Error, Some(msg)) => {
                tracing::error!(target: REQUEST_TARGET, request = %fields, "{msg}");
            }
            (Severity::Error, None) => {
                tracing::error!(target: REQUEST_TARGET, request = %fields);
            }
            (Severity::Info, Some(msg)) => {
                tracing::info!(target: REQUEST_TARGET, request = %fields, "{msg}");
            }
            (Severity::Info, None) => {
                tracing::info!(target: REQUEST_TARGET, request = %fields);
            }
        }
    }
}

// ── TextSink ──────────────────────────────────────────────────────────────────

/// Writes one logfmt line per entry:
///
/// ```text
/// time="2026-10-16T09:30:00Z" level=error msg=ups bytes_in=0 bytes_out=35 … status=500
/// ```
///
/// `msg` is omitted when the entry has no message.
pub struct TextSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    /// Renders a record without writing it.
    pub fn format(record: &Record<'_>) -> String {
        let mut line = String::with_capacity(128);
        // Writing into a String cannot fail.
        line.push_str("time=");
        let _ = write_logfmt_value(&mut line, &rfc3339(&record.time));
        let _ = write!(line, " level={}", record.severity.as_str());
        if let Some(msg) = record.message {
            line.push_str(" msg=");
            let _ = write_logfmt_value(&mut line, msg);
        }
        if !record.fields.is_empty() {
            let _ = write!(line, " {}", record.fields);
        }
        line.push('\n');
        line
    }
}

impl<W: Write + Send + 'static> LogSink for TextSink<W> {
    fn emit(&self, record: &Record<'_>) {
        let line = Self::format(record);
        let mut writer = self.writer.lock();
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|()| writer.flush()) {
            tracing::debug!("text sink write failed: {e}");
        }
    }
}

// ── JsonSink ──────────────────────────────────────────────────────────────────

/// Writes one JSON object per line:
///
/// ```text
/// {"bytes_in":"0","host":"example.com",…,"level":"info","time":"2026-10-16T09:30:00Z"}
/// ```
///
/// `time`, `level` and `msg` are reserved; a field with one of those names is
/// kept as `fields.<name>`.
pub struct JsonSink<W> {
    writer: Mutex<W>,
}

const RESERVED_KEYS: [&str; 3] = ["time", "level", "msg"];

impl<W: Write + Send + 'static> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    /// Builds the JSON object for a record.
    pub fn to_value(record: &Record<'_>) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(record.fields.len() + 3);
        for (k, v) in record.fields.iter() {
            let key = if RESERVED_KEYS.contains(&k) { format!("fields.{k}") } else { k.to_owned() };
            map.insert(key, v.into());
        }
        map.insert("time".to_owned(), rfc3339(&record.time).into());
        map.insert("level".to_owned(), record.severity.as_str().into());
        if let Some(msg) = record.message {
            map.insert("msg".to_owned(), msg.into());
        }
        serde_json::Value::Object(map)
    }
}

impl<W: Write + Send + 'static> LogSink for JsonSink<W> {
    fn emit(&self, record: &Record<'_>) {
        let value = Self::to_value(record);
        let mut writer = self.writer.lock();
        let res = serde_json::to_writer(&mut *writer, &value)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush());
        if let Err(e) = res {
            tracing::debug!("json sink write failed: {e}");
        }
    }
}

// ── WithFields ────────────────────────────────────────────────────────────────

/// A sink with fields bound to every entry it forwards.
///
/// Entry fields win over bound fields with the same key.
///
/// ```rust
/// use tsu_logger::{Fields, JsonSink, WithFields};
///
/// let sink = WithFields::new(
///     JsonSink::new(std::io::stdout()),
///     Fields::new().with("service", "users"),
/// );
/// ```
pub struct WithFields<S> {
    inner: S,
    bound: Fields,
}

impl<S: LogSink> WithFields<S> {
    pub fn new(inner: S, bound: Fields) -> Self {
        Self { inner, bound }
    }
}

impl<S: LogSink> LogSink for WithFields<S> {
    fn emit(&self, record: &Record<'_>) {
        let mut fields = self.bound.clone();
        fields.extend(record.fields);
        self.inner.emit(&Record { fields: &fields, ..*record });
    }
}
