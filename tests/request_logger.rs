//! Integration tests for the request logger middleware.
//!
//! Requests are dispatched in-process through `Router::handle` or by running a
//! wrapped `Next` against a context directly; no sockets are opened.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::StatusCode;
use http::header::CONTENT_LENGTH;
use parking_lot::Mutex;
use tsu_logger::middleware::logger::default_fields;
use tsu_logger::{
    Context, Error, Fields, LogSink, Middleware, Next, Record, RequestLogger, Router, Severity,
    TextSink, Timestamp, Value, human_duration,
};

// ── helpers ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Entry {
    severity: Severity,
    message: Option<String>,
    fields: Fields,
}

/// Keeps an owned copy of every entry it receives.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<Entry>>>);

impl Capture {
    fn entries(&self) -> parking_lot::MutexGuard<'_, Vec<Entry>> {
        self.0.lock()
    }

    fn only(&self) -> Entry {
        let mut entries = self.0.lock();
        assert_eq!(entries.len(), 1, "expected exactly one entry, got {entries:?}");
        entries.remove(0)
    }
}

impl LogSink for Capture {
    fn emit(&self, record: &Record<'_>) {
        self.0.lock().push(Entry {
            severity: record.severity,
            message: record.message.map(str::to_owned),
            fields: record.fields.clone(),
        });
    }
}

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

fn get(path: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method("GET")
        .uri(path)
        .header("host", "example.com")
        .body(Bytes::new())
        .unwrap()
}

fn str_field<'a>(entry: &'a Entry, key: &str) -> &'a str {
    match entry.fields.get(key) {
        Some(Value::Str(s)) => s,
        other => panic!("field `{key}` is not a string: {other:?}"),
    }
}

async fn ok_test(c: Context) -> Result<(), Error> {
    c.text(StatusCode::OK, "test")
}

async fn ups(_c: Context) -> Result<(), Error> {
    Err(Error::msg("ups"))
}

const DEFAULT_KEYS: [&str; 10] = [
    "bytes_in", "bytes_out", "host", "start_time", "end_time",
    "status", "method", "path", "latency_ns", "latency",
];

// ── scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_is_logged_at_info_with_default_fields() {
    let sink = Capture::default();
    let app = Router::new().with(RequestLogger::new(sink.clone())).get("/", ok_test);

    let res = app.handle(get("/")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let entry = sink.only();
    assert_eq!(entry.severity, Severity::Info);
    assert_eq!(entry.message, None);
    assert_eq!(entry.fields.keys().collect::<Vec<_>>(), DEFAULT_KEYS);
    assert_eq!(str_field(&entry, "bytes_out"), "4");
    assert_eq!(str_field(&entry, "host"), "example.com");
    assert_eq!(str_field(&entry, "method"), "GET");
    assert_eq!(str_field(&entry, "path"), "/");
    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(200)));
}

#[tokio::test]
async fn handler_error_is_rendered_logged_and_returned() {
    let sink = Capture::default();
    let router = Router::new();
    let chain = RequestLogger::new(sink.clone()).wrap(Next::new(ups));

    let c = router.context(get("/"));
    let result = chain.run(c.clone()).await;

    // Still returned to the caller, unchanged.
    match result {
        Err(Error::Handler(e)) => assert_eq!(e.to_string(), "ups"),
        other => panic!("expected handler error, got {other:?}"),
    }
    // Rendered through the error handler before the entry was built.
    assert_eq!(c.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(c.size(), 35);

    let entry = sink.only();
    assert_eq!(entry.severity, Severity::Error);
    assert_eq!(entry.message.as_deref(), Some("ups"));
    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(500)));
    assert_eq!(str_field(&entry, "bytes_out"), "35");

    let res = c.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn error_response_is_written_once_through_router() {
    let sink = Capture::default();
    let app = Router::new().with(RequestLogger::new(sink.clone())).get("/", ups);

    let res = app.handle(get("/")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers()[CONTENT_LENGTH], "35");
    assert_eq!(sink.entries().len(), 1);
}

#[tokio::test]
async fn missing_content_length_defaults_to_zero() {
    let sink = Capture::default();
    let app = Router::new().with(RequestLogger::new(sink.clone())).get("/", ok_test);

    app.handle(get("/")).await;

    assert_eq!(str_field(&sink.only(), "bytes_in"), "0");
}

#[tokio::test]
async fn empty_content_length_defaults_to_zero() {
    let sink = Capture::default();
    let app = Router::new().with(RequestLogger::new(sink.clone())).get("/", ok_test);

    let mut req = get("/");
    req.headers_mut().insert(CONTENT_LENGTH, http::HeaderValue::from_static(""));
    app.handle(req).await;

    assert_eq!(str_field(&sink.only(), "bytes_in"), "0");
}

#[tokio::test]
async fn content_length_is_reported_as_sent() {
    let sink = Capture::default();
    let app = Router::new()
        .with(RequestLogger::new(sink.clone()))
        .post("/users", |c: Context| async move { c.no_content(StatusCode::CREATED) });

    let req = http::Request::builder()
        .method("POST")
        .uri("/users")
        .header("host", "example.com")
        .header(CONTENT_LENGTH, "16")
        .body(Bytes::from_static(br#"{"name":"alice"}"#))
        .unwrap();
    app.handle(req).await;

    let entry = sink.only();
    assert_eq!(str_field(&entry, "bytes_in"), "16");
    assert_eq!(str_field(&entry, "method"), "POST");
    assert_eq!(str_field(&entry, "bytes_out"), "0");
    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(201)));
}

#[tokio::test]
async fn always_skip_emits_nothing_and_passes_through() {
    let sink = Capture::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let logger = RequestLogger::builder()
        .sink(sink.clone())
        .skipper(|_| true)
        .build();
    let app = Router::new()
        .with(logger)
        .get("/", move |c: Context| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                c.text(StatusCode::ACCEPTED, "queued")
            }
        })
        .get("/err", ups);

    for _ in 0..5 {
        let res = app.handle(get("/")).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }
    let res = app.handle(get("/err")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn skipper_sees_the_request() {
    let sink = Capture::default();
    let logger = RequestLogger::builder()
        .sink(sink.clone())
        .skipper(|c| c.request().path() == "/healthz")
        .build();
    let app = Router::new()
        .with(logger)
        .get("/healthz", |c: Context| async move { c.text(StatusCode::OK, "ok") })
        .get("/", ok_test);

    app.handle(get("/healthz")).await;
    app.handle(get("/")).await;

    assert_eq!(str_field(&sink.only(), "path"), "/");
}

#[tokio::test]
async fn custom_fields_replace_the_defaults() {
    let sink = Capture::default();
    let logger = RequestLogger::builder()
        .sink(sink.clone())
        .fields(|c, start, end| {
            Fields::new()
                .with("host", c.request().host())
                .with("start_time", start.rfc3339())
                .with("end_time", end.rfc3339())
        })
        .build();
    let app = Router::new().with(logger).get("/", ok_test);

    app.handle(get("/")).await;

    let entry = sink.only();
    assert_eq!(entry.fields.keys().collect::<Vec<_>>(), ["host", "start_time", "end_time"]);
    assert_eq!(str_field(&entry, "host"), "example.com");
}

#[tokio::test]
async fn field_builder_gets_the_timestamps_used_for_latency() {
    let sink = Capture::default();
    let seen: Arc<Mutex<Option<(Timestamp, Timestamp)>>> = Arc::default();
    let slot = Arc::clone(&seen);

    let logger = RequestLogger::builder()
        .sink(sink.clone())
        .fields(move |c, start, end| {
            *slot.lock() = Some((*start, *end));
            default_fields(c, start, end).with("route", "root")
        })
        .build();
    let app = Router::new().with(logger).get("/", ok_test);

    let before = chrono::Utc::now();
    app.handle(get("/")).await;

    let (start, end) = seen.lock().take().expect("field builder was not called");
    assert!(start.wall() >= before - chrono::Duration::seconds(1));
    assert!(end.instant() >= start.instant());

    let entry = sink.only();
    assert_eq!(str_field(&entry, "route"), "root");
    assert_eq!(
        str_field(&entry, "latency_ns"),
        end.duration_since(&start).as_nanos().to_string(),
    );
    assert_eq!(str_field(&entry, "latency"), human_duration(end.duration_since(&start)));
}

// ── severity law ─────────────────────────────────────────────────────────────

async fn severity_for(handler: impl tsu_logger::Handler) -> Entry {
    let sink = Capture::default();
    let app = Router::new().with(RequestLogger::new(sink.clone())).get("/", handler);
    app.handle(get("/")).await;
    sink.only()
}

#[tokio::test]
async fn client_error_with_error_is_info() {
    let entry = severity_for(|_: Context| async {
        Err::<(), _>(Error::http(StatusCode::NOT_FOUND).with_message("no such user"))
    })
    .await;

    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(404)));
    assert_eq!(entry.severity, Severity::Info);
    assert_eq!(entry.message, None);
}

#[tokio::test]
async fn server_error_without_error_is_info() {
    let entry = severity_for(|c: Context| async move {
        c.text(StatusCode::SERVICE_UNAVAILABLE, "maintenance")
    })
    .await;

    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(503)));
    assert_eq!(entry.severity, Severity::Info);
    assert_eq!(entry.message, None);
}

#[tokio::test]
async fn error_after_committed_success_is_info() {
    let entry = severity_for(|c: Context| async move {
        c.text(StatusCode::OK, "partial")?;
        Err::<(), Error>(Error::msg("late failure"))
    })
    .await;

    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(200)));
    assert_eq!(str_field(&entry, "bytes_out"), "7");
    assert_eq!(entry.severity, Severity::Info);
}

#[tokio::test]
async fn http_server_error_keeps_its_message() {
    let entry = severity_for(|_: Context| async {
        Err::<(), _>(Error::http(StatusCode::BAD_GATEWAY).with_message("upstream down"))
    })
    .await;

    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(502)));
    assert_eq!(entry.severity, Severity::Error);
    assert_eq!(entry.message.as_deref(), Some("upstream down"));
}

// ── chain behaviour ──────────────────────────────────────────────────────────

#[tokio::test]
async fn not_found_is_logged() {
    let sink = Capture::default();
    let app = Router::new().with(RequestLogger::new(sink.clone())).get("/", ok_test);

    let res = app.handle(get("/missing")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let entry = sink.only();
    assert_eq!(entry.fields.get("status"), Some(&Value::Uint(404)));
    assert_eq!(str_field(&entry, "path"), "/missing");
    assert_eq!(entry.severity, Severity::Info);
}

#[tokio::test]
async fn repeated_requests_yield_identical_field_shapes() {
    let sink = Capture::default();
    let logger = RequestLogger::new(sink.clone());
    let app = Router::new().with(logger.clone()).get("/", ok_test);

    app.handle(get("/")).await;
    app.handle(get("/")).await;

    let entries = sink.entries();
    assert_eq!(entries.len(), 2);
    for key in ["bytes_in", "bytes_out", "host", "status", "method", "path"] {
        assert_eq!(entries[0].fields.get(key), entries[1].fields.get(key), "field `{key}`");
    }
    assert_eq!(
        entries[0].fields.keys().collect::<Vec<_>>(),
        entries[1].fields.keys().collect::<Vec<_>>(),
    );
    assert!(logger.options().fields.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_each_log_once() {
    let sink = Capture::default();
    let app = Arc::new(
        Router::new()
            .with(RequestLogger::new(sink.clone()))
            .get("/items/{id}", |c: Context| async move {
                let id = c.param("id").unwrap_or_default().to_owned();
                c.text(StatusCode::OK, id)
            }),
    );

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..32 {
        let app = Arc::clone(&app);
        tasks.spawn(async move { app.handle(get(&format!("/items/{i}"))).await });
    }
    while let Some(res) = tasks.join_next().await {
        assert_eq!(res.unwrap().status(), StatusCode::OK);
    }

    let entries = sink.entries();
    assert_eq!(entries.len(), 32);
    let mut paths: Vec<_> = entries.iter().map(|e| str_field(e, "path").to_owned()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 32);
}

// ── text sink, end to end ────────────────────────────────────────────────────

#[tokio::test]
async fn text_sink_renders_info_entry() {
    let buf = SharedBuf::default();
    let app = Router::new()
        .with(RequestLogger::new(TextSink::new(buf.clone())))
        .get("/", ok_test);

    app.handle(get("/")).await;

    let out = buf.contents();
    assert!(out.contains("level=info"), "{out}");
    assert!(out.contains("bytes_out=4"), "{out}");
    assert!(out.contains("host=example.com"), "{out}");
    assert!(out.contains("method=GET"), "{out}");
    assert!(out.contains("path=/"), "{out}");
    assert!(out.contains("status=200"), "{out}");
    assert!(!out.contains("msg="), "{out}");
}

#[tokio::test]
async fn text_sink_renders_error_entry() {
    let buf = SharedBuf::default();
    let app = Router::new()
        .with(RequestLogger::new(TextSink::new(buf.clone())))
        .get("/", ups);

    app.handle(get("/")).await;

    let out = buf.contents();
    assert!(out.contains("level=error"), "{out}");
    assert!(out.contains("msg=ups"), "{out}");
    assert!(out.contains("bytes_out=35"), "{out}");
    assert!(out.contains("status=500"), "{out}");
    assert_eq!(out.lines().count(), 1);
}
