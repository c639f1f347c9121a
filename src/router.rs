//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered with
//! [`Router::with`] wraps every route, including the not-found fallback, so a
//! request logger sees 404s too.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::Full;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::context::{Context, ErrorHandler};
use crate::error::Error;
use crate::handler::{Handler, Next};
use crate::middleware::Middleware;
use crate::request::Request;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Next>>,
    middleware: Vec<Arc<dyn Middleware>>,
    error_handler: ErrorHandler,
    not_found: Next,
    method_not_allowed: Next,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            middleware: Vec::new(),
            error_handler: Arc::new(default_error_handler),
            not_found: Next::new(|_: Context| async { Err::<(), _>(Error::http(StatusCode::NOT_FOUND)) }),
            method_not_allowed: Next::new(|_: Context| async {
                Err::<(), _>(Error::http(StatusCode::METHOD_NOT_ALLOWED))
            }),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax — `c.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, Next::new(handler))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a middleware. The first one registered runs outermost.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the error handler that renders handler errors into responses.
    ///
    /// It is invoked through [`Context::error`] and must leave an already
    /// committed response alone.
    pub fn error_handler(mut self, handler: impl Fn(&Error, &Context) + Send + Sync + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// A context for `req`, bound to this router's error handler.
    pub fn context(&self, req: http::Request<Bytes>) -> Context {
        let params = self
            .lookup(req.method(), req.uri().path())
            .map(|(_, params)| params)
            .unwrap_or_default();
        Context::new(Request::new(req, params), Arc::clone(&self.error_handler))
    }

    /// Routes one request through the middleware chain and its handler.
    ///
    /// An error that reaches this point is handed to the error handler unless
    /// a middleware already reported it through [`Context::error`].
    pub async fn handle(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let (handler, params) = match self.lookup(req.method(), req.uri().path()) {
            Some(found) => found,
            None => (self.fallback(req.method(), req.uri().path()), HashMap::new()),
        };

        let c = Context::new(Request::new(req, params), Arc::clone(&self.error_handler));
        let chain = self.middleware.iter().rev().fold(handler, |next, m| m.wrap(next));

        if let Err(e) = chain.run(c.clone()).await {
            if !c.error_reported() {
                c.error(&e);
            }
        }
        c.into_response()
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Next, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = matched.value.clone();
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// 405 when the path is routed under another method, 404 otherwise.
    fn fallback(&self, method: &Method, path: &str) -> Next {
        let routed_elsewhere = self.routes.iter()
            .any(|(m, tree)| m != method && tree.at(path).is_ok());
        if routed_elsewhere {
            self.method_not_allowed.clone()
        } else {
            self.not_found.clone()
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// Renders `err` as `{"message": …}` with the error's status.
///
/// [`Error::Http`] keeps its status and message. Every other error becomes
/// `500` with `{"message":"Internal Server Error"}` so internal details never
/// reach the client. Does nothing once a response is committed.
pub fn default_error_handler(err: &Error, c: &Context) {
    if c.committed() {
        return;
    }

    let status = err.status();
    let message = match err {
        Error::Http { message, .. } => message.as_str(),
        _ => status.canonical_reason().unwrap_or("Internal Server Error"),
    };
    debug!(error = %err, %status, "rendering error response");

    let body = serde_json::json!({ "message": message }).to_string();
    if let Err(e) = c.json(status, body) {
        debug!("error response not written: {e}");
    }
}
