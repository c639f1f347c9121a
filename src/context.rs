//! Per-request context.
//!
//! A [`Context`] is handed to every handler and middleware. It owns the
//! inbound [`Request`] and the response being built. Cloning is one atomic
//! increment: middleware keeps its own handle while passing another down the
//! chain, then reads the final status and size once `next` returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use parking_lot::Mutex;

use crate::error::Error;
use crate::request::Request;
use crate::response::{ContentType, ResponseState};

/// Renders an error into the response. See [`Router::error_handler`](crate::Router::error_handler).
pub type ErrorHandler = Arc<dyn Fn(&Error, &Context) + Send + Sync + 'static>;

/// Per-request handle shared by the handler and every middleware around it.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    request: Request,
    response: Mutex<ResponseState>,
    error_handler: ErrorHandler,
    reported: AtomicBool,
}

impl Context {
    pub(crate) fn new(request: Request, error_handler: ErrorHandler) -> Self {
        Self {
            inner: Arc::new(Inner {
                request,
                response: Mutex::new(ResponseState::new()),
                error_handler,
                reported: AtomicBool::new(false),
            }),
        }
    }

    pub fn request(&self) -> &Request { &self.inner.request }

    /// Shorthand for `self.request().param(key)`.
    pub fn param(&self, key: &str) -> Option<&str> { self.inner.request.param(key) }

    // ── Response readers ─────────────────────────────────────────────────────

    /// Status written so far (`200 OK` before anything is committed).
    pub fn status(&self) -> StatusCode { self.inner.response.lock().status }

    /// Response body size in bytes.
    pub fn size(&self) -> u64 { self.inner.response.lock().size() }

    /// Whether a response has been written.
    pub fn committed(&self) -> bool { self.inner.response.lock().committed }

    // ── Response writers ─────────────────────────────────────────────────────

    /// Adds a response header. Has no effect on the wire once committed.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response.lock().set_header(name, value);
    }

    /// `text/plain; charset=utf-8` response.
    pub fn text(&self, status: StatusCode, body: impl Into<String>) -> Result<(), Error> {
        let body = Bytes::from(body.into());
        self.write(status, Some(ContentType::Text.as_str()), body)
    }

    /// `application/json` response. Pass bytes from your serialiser directly.
    pub fn json(&self, status: StatusCode, body: impl Into<Bytes>) -> Result<(), Error> {
        self.write(status, Some(ContentType::Json.as_str()), body.into())
    }

    /// Response with no body (e.g. `204 No Content`).
    pub fn no_content(&self, status: StatusCode) -> Result<(), Error> {
        self.write(status, None, Bytes::new())
    }

    fn write(
        &self,
        status: StatusCode,
        content_type: Option<&'static str>,
        body: Bytes,
    ) -> Result<(), Error> {
        self.inner.response.lock().commit(status, content_type, body)
    }

    // ── Errors ───────────────────────────────────────────────────────────────

    /// Reports `err` to the router's error handler, which renders the error
    /// response unless one is already committed.
    ///
    /// The error is only borrowed: callers still return it up the chain.
    /// Marks the context as reported, see [`error_reported`](Context::error_reported).
    pub fn error(&self, err: &Error) {
        self.inner.reported.store(true, Ordering::Release);
        (self.inner.error_handler)(err, self);
    }

    /// Whether [`error`](Context::error) has been called for this request.
    ///
    /// The router only reports an error that reaches it when nothing in the
    /// chain reported one already, so the error handler runs once per request.
    pub fn error_reported(&self) -> bool {
        self.inner.reported.load(Ordering::Acquire)
    }

    /// Takes the response out of the context.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        self.inner.response.lock().take()
    }
}
