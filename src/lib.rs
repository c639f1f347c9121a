//! # tsu-logger
//!
//! Structured request logging for the tsu HTTP framework.
//!
//! [`RequestLogger`] wraps a router's handler chain, times each request, and
//! emits exactly one structured entry per request once the handler has
//! finished: method, path, host, status, bytes in and out, start and end time,
//! and latency.
//!
//! What the entry looks like and where it goes is up to the [`LogSink`]:
//! [`TracingSink`] (the default), [`TextSink`] for logfmt lines, or
//! [`JsonSink`] for one JSON object per line.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use tsu_logger::{Context, Error, JsonSink, RequestLogger, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .with(RequestLogger::new(JsonSink::new(std::io::stdout())))
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(c: Context) -> Result<(), Error> {
//!     let id = c.param("id").unwrap_or("unknown").to_owned();
//!     c.json(StatusCode::OK, format!(r#"{{"id":"{id}"}}"#))
//! }
//! ```
//!
//! ## Severity
//!
//! An entry is logged at error severity, with the handler's error as its
//! message, only when the handler returned an error **and** the final status
//! is 5xx. A 4xx produced by an error, or a 5xx written without one, is logged
//! at info with no message.

mod context;
mod error;
mod fields;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod sink;

pub use context::{Context, ErrorHandler};
pub use error::Error;
pub use fields::{Fields, Timestamp, Value, human_duration};
pub use handler::{BoxFuture, Handler, Next};
pub use middleware::{Middleware, RequestLogger};
pub use request::Request;
pub use router::{Router, default_error_handler};
pub use server::{Server, serve_listener};
pub use sink::{JsonSink, LogSink, Record, Severity, TextSink, TracingSink, WithFields};
