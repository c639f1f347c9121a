//! Middleware layer.
//!
//! Middleware intercepts a request on its way to the handler and the outcome
//! on its way back. It is the right place for cross-cutting concerns such as
//! request logging, request-id injection, or header inspection.
//!
//! A middleware turns one [`Next`] into another. Register it with
//! [`Router::with`](crate::Router::with); the first one registered is the
//! outermost.
//!
//! Any `Fn(Next) -> Next` closure is a middleware:
//!
//! ```rust
//! use tsu_logger::{Context, Next, Router};
//! use http::header::{HeaderName, HeaderValue};
//!
//! let app = Router::new().with(|next: Next| {
//!     Next::new(move |c: Context| {
//!         let next = next.clone();
//!         async move {
//!             c.set_header(HeaderName::from_static("x-powered-by"), HeaderValue::from_static("tsu"));
//!             next.run(c).await
//!         }
//!     })
//! });
//! ```
//!
//! Built-in middleware:
//! - [`logger::RequestLogger`] — one structured entry per request with method,
//!   path, status, byte counts, and latency

pub mod logger;

use crate::handler::Next;

pub use logger::RequestLogger;

/// Wraps a handler chain step with extra behaviour.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: Next) -> Next;
}

impl<F> Middleware for F
where
    F: Fn(Next) -> Next + Send + Sync + 'static,
{
    fn wrap(&self, next: Next) -> Next {
        self(next)
    }
}
