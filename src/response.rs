//! Outgoing response state.
//!
//! Handlers never build a response value directly: they write through the
//! [`Context`](crate::Context), which keeps the state below until the server
//! turns it into an `http::Response`. Keeping it on the context is what lets
//! middleware read the final status and body size after `next` returns.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

use crate::error::Error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Body types the context writers produce.
pub(crate) enum ContentType {
    Json,  // application/json
    Text,  // text/plain; charset=utf-8
}

impl ContentType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

// ── ResponseState ─────────────────────────────────────────────────────────────

/// What has been written for the current request so far.
///
/// Status defaults to `200 OK` and size to zero until a handler commits a body.
pub(crate) struct ResponseState {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) committed: bool,
}

impl ResponseState {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            committed: false,
        }
    }

    pub(crate) fn size(&self) -> u64 {
        self.body.len() as u64
    }

    pub(crate) fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Writes the full response. Fails with [`Error::Committed`] if one was
    /// already written.
    pub(crate) fn commit(
        &mut self,
        status: StatusCode,
        content_type: Option<&'static str>,
        body: Bytes,
    ) -> Result<(), Error> {
        if self.committed {
            return Err(Error::Committed);
        }
        if let Some(ct) = content_type {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        self.status = status;
        self.body = body;
        self.committed = true;
        Ok(())
    }

    /// Moves the state out into the wire type, leaving an empty state behind.
    pub(crate) fn take(&mut self) -> http::Response<Full<Bytes>> {
        let state = std::mem::replace(self, Self::new());
        let len = state.body.len();
        let mut res = http::Response::new(Full::new(state.body));
        *res.status_mut() = state.status;
        *res.headers_mut() = state.headers;
        res.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
        res
    }
}
