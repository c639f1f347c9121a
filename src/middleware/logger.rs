//! Request logging middleware.
//!
//! [`RequestLogger`] times every request and emits one structured entry to a
//! [`LogSink`] once the handler chain behind it has finished:
//!
//! ```text
//! time="2026-10-16T09:30:00Z" level=info bytes_in=0 bytes_out=4 host=example.com
//!   start_time="2026-10-16T09:30:00Z" end_time="2026-10-16T09:30:00Z" status=200
//!   method=GET path=/ latency_ns=48211 latency=48.211µs
//! ```
//!
//! The entry is logged at error severity, with the error as its message, only
//! when the handler returned an error *and* the response status is 5xx.
//! Everything else is info with no message.
//!
//! ```rust
//! use tsu_logger::{Fields, JsonSink, RequestLogger, Router};
//!
//! let logger = RequestLogger::builder()
//!     .sink(JsonSink::new(std::io::stdout()))
//!     .skipper(|c| c.request().path() == "/healthz")
//!     .build();
//!
//! let app = Router::new().with(logger);
//! ```

use std::sync::Arc;

use http::header::CONTENT_LENGTH;
use tracing::trace;

use crate::context::Context;
use crate::error::Error;
use crate::fields::{Fields, Timestamp, human_duration};
use crate::handler::Next;
use crate::middleware::Middleware;
use crate::sink::{LogSink, Record, Severity, TracingSink};

/// Decides per request whether to bypass logging entirely.
pub type Skipper = Arc<dyn Fn(&Context) -> bool + Send + Sync + 'static>;

/// Builds the field set from the context and the request's start and end time.
pub type FieldBuilder = Arc<dyn Fn(&Context, &Timestamp, &Timestamp) -> Fields + Send + Sync + 'static>;

/// Configuration of a [`RequestLogger`].
///
/// | Option | Default |
/// |---|---|
/// | `skipper` | never skip |
/// | `sink` | a new [`TracingSink`] |
/// | `fields` | `None`: the default field set |
#[derive(Clone)]
pub struct Options {
    pub skipper: Skipper,
    pub sink: Arc<dyn LogSink>,
    /// Replaces the default field set when set. The default fields are not
    /// merged in.
    pub fields: Option<FieldBuilder>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            skipper: Arc::new(|_: &Context| false),
            sink: Arc::new(TracingSink::new()),
            fields: None,
        }
    }
}

/// Middleware that logs one structured entry per request.
///
/// Cheap to clone; the options are shared and never mutated after
/// construction.
#[derive(Clone, Default)]
pub struct RequestLogger {
    options: Arc<Options>,
}

impl RequestLogger {
    /// A logger writing to `sink` with every other option at its default.
    pub fn new(sink: impl LogSink) -> Self {
        Self::with_options(Options { sink: Arc::new(sink), ..Options::default() })
    }

    pub fn with_options(options: Options) -> Self {
        Self { options: Arc::new(options) }
    }

    pub fn builder() -> RequestLoggerBuilder {
        RequestLoggerBuilder { options: Options::default() }
    }

    pub fn options(&self) -> &Options { &self.options }
}

impl Middleware for RequestLogger {
    fn wrap(&self, next: Next) -> Next {
        let options = Arc::clone(&self.options);
        Next::new(move |c: Context| {
            let options = Arc::clone(&options);
            let next = next.clone();
            async move { log_request(&options, &next, c).await }
        })
    }
}

/// Runs `next` for one request and logs the outcome.
async fn log_request(options: &Options, next: &Next, c: Context) -> Result<(), Error> {
    if (options.skipper)(&c) {
        return next.run(c).await;
    }

    let start = Timestamp::now();
    let result = next.run(c.clone()).await;
    if let Err(e) = &result {
        c.error(e);
    }
    let end = Timestamp::now();

    let fields = match &options.fields {
        Some(build) => build(&c, &start, &end),
        None => default_fields(&c, &start, &end),
    };

    let status = c.status();
    let (severity, message) = match &result {
        Err(e) if status.as_u16() >= 500 => (Severity::Error, Some(e.to_string())),
        _ => (Severity::Info, None),
    };
    trace!(%status, severity = severity.as_str(), "request logged");

    options.sink.emit(&Record {
        severity,
        message: message.as_deref(),
        fields: &fields,
        time: end.wall(),
    });

    result
}

/// The ten default fields.
pub fn default_fields(c: &Context, start: &Timestamp, end: &Timestamp) -> Fields {
    let req = c.request();
    let bytes_in = match req.header(CONTENT_LENGTH.as_str()) {
        Some(v) if !v.is_empty() => v,
        _ => "0",
    };
    let latency = end.duration_since(start);

    Fields::new()
        .with("bytes_in", bytes_in)
        .with("bytes_out", c.size().to_string())
        .with("host", req.host())
        .with("start_time", start.rfc3339())
        .with("end_time", end.rfc3339())
        .with("status", c.status().as_u16())
        .with("method", req.method().as_str())
        .with("path", req.path())
        .with("latency_ns", latency.as_nanos().to_string())
        .with("latency", human_duration(latency))
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Fluent builder for [`RequestLogger`]. Obtain via [`RequestLogger::builder`].
pub struct RequestLoggerBuilder {
    options: Options,
}

impl RequestLoggerBuilder {
    pub fn skipper(mut self, skipper: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        self.options.skipper = Arc::new(skipper);
        self
    }

    pub fn sink(mut self, sink: impl LogSink) -> Self {
        self.options.sink = Arc::new(sink);
        self
    }

    pub fn fields(
        mut self,
        fields: impl Fn(&Context, &Timestamp, &Timestamp) -> Fields + Send + Sync + 'static,
    ) -> Self {
        self.options.fields = Some(Arc::new(fields));
        self
    }

    pub fn build(self) -> RequestLogger {
        RequestLogger::with_options(self.options)
    }
}
