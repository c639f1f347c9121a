//! Sink output tests: what a request entry looks like once written.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tsu_logger::{Fields, JsonSink, LogSink, Record, Severity, TextSink, TracingSink, WithFields};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn noon() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-16T12:00:00Z").unwrap().with_timezone(&Utc)
}

fn request_fields() -> Fields {
    Fields::new()
        .with("bytes_in", "0")
        .with("bytes_out", "35")
        .with("host", "example.com")
        .with("status", 500_u16)
        .with("method", "GET")
        .with("path", "/err")
}

#[test]
fn json_sink_writes_one_object_per_line() {
    let buf = SharedBuf::default();
    let sink = JsonSink::new(buf.clone());
    let fields = request_fields();

    sink.emit(&Record { severity: Severity::Error, message: Some("ups"), fields: &fields, time: noon() });
    sink.emit(&Record { severity: Severity::Info, message: None, fields: &fields, time: noon() });

    let out = buf.contents();
    let lines: Vec<serde_json::Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0]["level"], "error");
    assert_eq!(lines[0]["msg"], "ups");
    assert_eq!(lines[0]["status"], 500);
    assert_eq!(lines[0]["bytes_out"], "35");
    assert_eq!(lines[0]["time"], "2026-10-16T12:00:00Z");

    assert_eq!(lines[1]["level"], "info");
    assert!(lines[1].get("msg").is_none());
}

#[test]
fn text_sink_appends_lines() {
    let buf = SharedBuf::default();
    let sink = TextSink::new(buf.clone());
    let fields = Fields::new().with("path", "/a b");

    sink.emit(&Record { severity: Severity::Info, message: None, fields: &fields, time: noon() });
    sink.emit(&Record { severity: Severity::Error, message: Some("two words"), fields: &fields, time: noon() });

    assert_eq!(
        buf.contents(),
        "time=\"2026-10-16T12:00:00Z\" level=info path=\"/a b\"\n\
         time=\"2026-10-16T12:00:00Z\" level=error msg=\"two words\" path=\"/a b\"\n",
    );
}

#[test]
fn bound_fields_are_merged_under_entry_fields() {
    let buf = SharedBuf::default();
    let sink = WithFields::new(
        TextSink::new(buf.clone()),
        Fields::new().with("service", "users").with("host", "bound"),
    );
    let fields = Fields::new().with("host", "example.com");

    sink.emit(&Record { severity: Severity::Info, message: None, fields: &fields, time: noon() });

    assert_eq!(
        buf.contents(),
        "time=\"2026-10-16T12:00:00Z\" level=info service=users host=example.com\n",
    );
}

#[test]
fn tracing_sink_emits_request_event() {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    let fields = request_fields();
    tracing::subscriber::with_default(subscriber, || {
        TracingSink::new().emit(&Record {
            severity: Severity::Error,
            message: Some("ups"),
            fields: &fields,
            time: noon(),
        });
        TracingSink::new().emit(&Record {
            severity: Severity::Info,
            message: None,
            fields: &fields,
            time: noon(),
        });
    });

    let out = buf.contents();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 2, "{out}");
    assert!(lines[0].contains("ERROR"), "{out}");
    assert!(lines[0].contains("tsu::request"), "{out}");
    assert!(lines[0].contains("ups"), "{out}");
    assert!(lines[0].contains("status=500"), "{out}");
    assert!(lines[1].contains("INFO"), "{out}");
    assert!(lines[1].contains("host=example.com"), "{out}");
}
